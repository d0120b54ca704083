//! Last-writer-wins reconciliation with a sync peer.
//!
//! Records are compared by `updated_at` as whole units. When the remote copy
//! wins, attachment lists are unioned by attachment id instead of replaced, so
//! files attached on either side survive. The losing side's content edits are
//! discarded.

use crate::core::VaultCore;
use crate::core::error::VaultError;
use crate::core::file_storage::check_attachment_id;
use crate::types::value::versioned_value::latest_value;
use crate::types::{Attachment, AttachmentPayload, ExportedRecord, RecordId};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// Counters reported by a merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeOutcome {
    /// Local records the peer lacks or holds an older copy of.
    pub sent: usize,
    /// Remote records examined.
    pub received: usize,
    /// Records written to the local vault.
    pub updated: usize,
    /// Records present on both sides with different `updated_at`.
    pub conflicts: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeAction {
    /// Absent locally, stored as received.
    Insert(RecordId, ExportedRecord),
    /// Remote copy is newer, stored with the attachment union.
    Overwrite(RecordId, ExportedRecord),
    /// Local copy is newer and stays. The peer needs it.
    KeepLocal(RecordId),
    /// Same `updated_at` on both sides.
    Unchanged(RecordId),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergePlan {
    pub actions: Vec<MergeAction>,
    pub outcome: MergeOutcome,
}

/// Unions attachment lists by id. On a shared id the copy with the larger
/// `uploaded_at` wins, the remote one on a tie, unless only the other copy
/// carries a payload. Remote order comes first, then attachments only the
/// local side has.
fn union_attachments(local: &ExportedRecord, remote: &ExportedRecord) -> ExportedRecord {
    let local_by_id: HashMap<&str, &Attachment> = local
        .attachments
        .iter()
        .map(|a| (a.id.as_str(), a))
        .collect();

    let mut attachments = Vec::new();
    let mut payloads = Vec::new();
    let mut seen = HashSet::new();

    let mut take = |attachment: &Attachment, source: &ExportedRecord| {
        match source.payload(&attachment.id) {
            Some(bytes) => payloads.push(AttachmentPayload {
                attachment_id: attachment.id.clone(),
                bytes: bytes.to_vec(),
            }),
            None => warn!(
                record = %remote.id,
                attachment = %attachment.id,
                "merged attachment has no payload"
            ),
        }
        attachments.push(attachment.clone());
    };

    for attachment in &remote.attachments {
        if !seen.insert(attachment.id.as_str()) {
            continue;
        }
        let (preferred, fallback) = match local_by_id.get(attachment.id.as_str()) {
            Some(local_copy) if local_copy.uploaded_at > attachment.uploaded_at => {
                ((*local_copy, local), Some((attachment, remote)))
            }
            Some(local_copy) => ((attachment, remote), Some((*local_copy, local))),
            None => ((attachment, remote), None),
        };
        let (chosen, source) = match fallback {
            Some(other)
                if preferred.1.payload(&attachment.id).is_none()
                    && other.1.payload(&attachment.id).is_some() =>
            {
                other
            }
            _ => preferred,
        };
        take(chosen, source);
    }
    for attachment in &local.attachments {
        if seen.insert(attachment.id.as_str()) {
            take(attachment, local);
        }
    }

    ExportedRecord {
        attachments,
        attachment_payloads: payloads,
        ..remote.clone()
    }
}

/// Normalizes a remote record for storage. `None` when it cannot be stored.
fn accept_remote(incoming: &ExportedRecord) -> Option<(RecordId, ExportedRecord)> {
    let id = match RecordId::try_new(incoming.id.clone()) {
        Ok(id) => id,
        Err(e) => {
            warn!(id = %incoming.id, error = %e, "skipping remote record with invalid id");
            return None;
        }
    };

    let attachment_ids = incoming
        .attachments
        .iter()
        .map(|a| a.id.as_str())
        .chain(incoming.attachment_payloads.iter().map(|p| p.attachment_id.as_str()));
    for attachment_id in attachment_ids {
        if let Err(e) = check_attachment_id(attachment_id) {
            warn!(%id, error = %e, "skipping remote record with invalid attachment id");
            return None;
        }
    }

    let record = ExportedRecord {
        id: id.to_string(),
        ..incoming.clone()
    };
    Some((id, record))
}

/// Tombstones carry no attachments.
fn without_deleted_attachments(mut record: ExportedRecord) -> ExportedRecord {
    if record.deleted_at.is_some() {
        record.attachments.clear();
        record.attachment_payloads.clear();
    }
    record
}

/// Decides what to do with each remote record. Pure: nothing is written.
pub fn plan_merge(local: &[ExportedRecord], remote: &[ExportedRecord]) -> MergePlan {
    let mut current: HashMap<String, ExportedRecord> =
        local.iter().map(|r| (r.id.clone(), r.clone())).collect();
    let mut remote_ids = HashSet::new();
    let mut plan = MergePlan::default();
    plan.outcome.received = remote.len();

    for incoming in remote {
        let Some((id, incoming)) = accept_remote(incoming) else {
            continue;
        };
        remote_ids.insert(id.to_string());

        let action = match current.get(id.as_str()) {
            None => MergeAction::Insert(id, without_deleted_attachments(incoming)),
            Some(existing) if incoming.updated_at > existing.updated_at => {
                plan.outcome.conflicts += 1;
                let resolved = union_attachments(existing, &incoming);
                MergeAction::Overwrite(id, without_deleted_attachments(resolved))
            }
            Some(existing) if incoming.updated_at < existing.updated_at => {
                plan.outcome.conflicts += 1;
                plan.outcome.sent += 1;
                MergeAction::KeepLocal(id)
            }
            Some(_) => MergeAction::Unchanged(id),
        };

        if let MergeAction::Insert(id, resolved) | MergeAction::Overwrite(id, resolved) = &action {
            plan.outcome.updated += 1;
            current.insert(id.to_string(), resolved.clone());
        }
        plan.actions.push(action);
    }

    plan.outcome.sent += local
        .iter()
        .filter(|r| !remote_ids.contains(&r.id))
        .count();

    plan
}

fn apply(core: &mut VaultCore, id: &RecordId, record: ExportedRecord) -> Result<(), VaultError> {
    let attachment_ids: HashSet<&str> = record.attachments.iter().map(|a| a.id.as_str()).collect();
    let payloads: Vec<(String, Vec<u8>)> = record
        .attachment_payloads
        .iter()
        .filter(|p| attachment_ids.contains(p.attachment_id.as_str()))
        .map(|p| (p.attachment_id.clone(), p.bytes.clone()))
        .collect();

    let value = latest_value::Value {
        content: record.content,
        updated_at: record.updated_at,
        deleted_at: record.deleted_at,
        attachments: record.attachments.into_iter().map(Into::into).collect(),
    };

    core.apply_merged(id, value, &payloads)?;
    debug!(%id, "merged record written");
    Ok(())
}

/// Applies [`plan_merge`] to the vault. Each record is written in its own
/// transaction; the decrypt cache is cleared afterwards, also on failure.
pub fn merge(
    core: &mut VaultCore,
    local: &[ExportedRecord],
    remote: &[ExportedRecord],
) -> Result<MergeOutcome, VaultError> {
    let plan = plan_merge(local, remote);

    let written = plan.actions.into_iter().try_for_each(|action| match action {
        MergeAction::Insert(id, record) | MergeAction::Overwrite(id, record) => {
            apply(core, &id, record)
        }
        MergeAction::KeepLocal(_) | MergeAction::Unchanged(_) => Ok(()),
    });

    core.clear_cache();
    written?;

    let outcome = plan.outcome;
    info!(
        sent = outcome.sent,
        received = outcome.received,
        updated = outcome.updated,
        conflicts = outcome.conflicts,
        "merge completed"
    );
    Ok(outcome)
}

/// Merges `remote` against the vault's current contents.
pub fn sync_with(core: &mut VaultCore, remote: &[ExportedRecord]) -> Result<MergeOutcome, VaultError> {
    let local = core.export()?;
    merge(core, &local, remote)
}
