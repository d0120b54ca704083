use t3vo_core::crypto::VaultIdentity;
use t3vo_core::sync::{MergeOutcome, sync_with};
use t3vo_core::types::{Config, ExportedRecord, NewAttachment, Timestamp};
use t3vo_core::VaultCore;
use tempfile::TempDir;

fn ts(ms: i64) -> Timestamp {
    Timestamp::from_millis(ms)
}

/// Two devices sharing one passphrase, each with its own data directory.
fn device(identity: &VaultIdentity) -> (VaultCore, TempDir) {
    let temp = TempDir::new().unwrap();
    let config = Config {
        base_path: temp.path().to_path_buf(),
        namespace: identity.namespace().to_string(),
    };
    (VaultCore::open(config, identity).unwrap(), temp)
}

fn attach(core: &mut VaultCore, id: &t3vo_core::types::RecordId, name: &str, now: i64) {
    core.add_attachments(
        id,
        vec![NewAttachment {
            name: name.to_string(),
            mime_type: "text/plain".to_string(),
            bytes: name.as_bytes().to_vec(),
        }],
        ts(now),
    )
    .unwrap();
}

/// Verify a newer remote edit wins while attachments from both sides survive.
#[test]
fn test_concurrent_edits_keep_both_attachments() {
    let identity = VaultIdentity::derive("shared");
    let (mut laptop, _l) = device(&identity);
    let (mut phone, _p) = device(&identity);

    let id = laptop.add("original", ts(10)).unwrap();
    sync_with(&mut phone, &laptop.export().unwrap()).unwrap();

    attach(&mut laptop, &id, "laptop.txt", 100);
    phone.update(&id, "edited on phone", ts(150)).unwrap();
    attach(&mut phone, &id, "phone.txt", 200);

    let outcome = sync_with(&mut laptop, &phone.export().unwrap()).unwrap();

    assert_eq!(outcome.updated, 1);
    assert_eq!(outcome.conflicts, 1);
    let record = laptop.get(&id).unwrap().unwrap();
    assert_eq!(record.content.as_deref(), Some("edited on phone"));
    let mut names: Vec<_> = record.attachments.iter().map(|a| a.name.as_str()).collect();
    names.sort();
    assert_eq!(names, ["laptop.txt", "phone.txt"]);
    for attachment in &record.attachments {
        let bytes = laptop.attachment_payload(&id, &attachment.id).unwrap().unwrap();
        assert_eq!(bytes, attachment.name.as_bytes());
    }
}

/// Verify syncing both ways converges and a repeated sync is a no-op.
#[test]
fn test_sync_converges() {
    let identity = VaultIdentity::derive("shared");
    let (mut a, _ta) = device(&identity);
    let (mut b, _tb) = device(&identity);

    a.add("from a", ts(1)).unwrap();
    b.add("from b", ts(2)).unwrap();

    sync_with(&mut a, &b.export().unwrap()).unwrap();
    sync_with(&mut b, &a.export().unwrap()).unwrap();

    let normalize = |mut records: Vec<ExportedRecord>| {
        records.sort_by(|x, y| x.id.cmp(&y.id));
        records
    };
    assert_eq!(normalize(a.export().unwrap()), normalize(b.export().unwrap()));

    let again = sync_with(&mut a, &b.export().unwrap()).unwrap();
    assert_eq!(
        again,
        MergeOutcome {
            received: 2,
            ..Default::default()
        }
    );
}

/// Verify a deletion made on one device propagates and stays hidden.
#[test]
fn test_deletion_propagates() {
    let identity = VaultIdentity::derive("shared");
    let (mut a, _ta) = device(&identity);
    let (mut b, _tb) = device(&identity);

    let id = a.add("short lived", ts(1)).unwrap();
    sync_with(&mut b, &a.export().unwrap()).unwrap();
    a.soft_delete(&id, ts(5)).unwrap();

    sync_with(&mut b, &a.export().unwrap()).unwrap();

    assert!(b.get(&id).unwrap().is_none());
    assert_eq!(b.deleted_ids().unwrap(), [id]);
}

/// Verify the exported form survives a JSON hop between devices.
#[test]
fn test_export_json_transport() {
    let identity = VaultIdentity::derive("shared");
    let (mut a, _ta) = device(&identity);
    let (mut b, _tb) = device(&identity);

    let id = a.add("over the wire", ts(1)).unwrap();
    attach(&mut a, &id, "wire.txt", 2);

    let json = serde_json::to_string(&a.export().unwrap()).unwrap();
    let received: Vec<ExportedRecord> = serde_json::from_str(&json).unwrap();
    sync_with(&mut b, &received).unwrap();

    let record = b.get(&id).unwrap().unwrap();
    assert_eq!(record.content.as_deref(), Some("over the wire"));
    let attachment = &record.attachments[0];
    assert_eq!(
        b.attachment_payload(&id, &attachment.id).unwrap().unwrap(),
        b"wire.txt"
    );
}
