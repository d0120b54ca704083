use super::*;
use crate::core::maintenance::MaintenanceScheduler;
use crate::types::{MaintenanceConfig, NewAttachment};
use tempfile::TempDir;

mod common {
    use super::*;

    pub(super) fn config(temp: &TempDir) -> Config {
        Config {
            base_path: temp.path().to_path_buf(),
            namespace: "T3VO-core".to_string(),
        }
    }

    pub(super) fn create_test_core() -> (VaultCore, TempDir) {
        let temp = TempDir::new().unwrap();
        let core = VaultCore::open(config(&temp), &VaultIdentity::derive("passphrase")).unwrap();
        (core, temp)
    }

    pub(super) fn ts(ms: i64) -> Timestamp {
        Timestamp::from_millis(ms)
    }

    pub(super) fn file(name: &str, bytes: &[u8]) -> NewAttachment {
        NewAttachment {
            name: name.to_string(),
            mime_type: "application/octet-stream".to_string(),
            bytes: bytes.to_vec(),
        }
    }

    pub(super) fn page_contents(core: &VaultCore, query: &PageQuery) -> Vec<String> {
        core.fetch_page(query)
            .unwrap()
            .into_iter()
            .map(|r| r.content.unwrap())
            .collect()
    }
}

mod content {
    use super::common::*;
    use super::*;

    #[test]
    fn test_add_then_get() {
        let (mut core, _temp) = create_test_core();

        let id = core.add("#@title=Gmail\nbody", ts(100)).unwrap();
        let record = core.get(&id).unwrap().unwrap();

        assert_eq!(record.content.as_deref(), Some("#@title=Gmail\nbody"));
        assert_eq!(record.updated_at, ts(100));
        assert_eq!(record.parse().unwrap().title, "Gmail");
    }

    #[test]
    fn test_content_is_encrypted_at_rest() {
        let (mut core, _temp) = create_test_core();
        let id = core.add("top secret", ts(1)).unwrap();

        let exported = core.export().unwrap();
        let stored = exported.iter().find(|r| r.id == id.as_str()).unwrap();
        assert!(!stored.content.contains("top secret"));
    }

    #[test]
    fn test_identical_adds_get_distinct_ids() {
        let temp = TempDir::new().unwrap();
        let mut core = VaultCore::open(config(&temp), &VaultIdentity::derive("")).unwrap();

        let a = core.add("same", ts(1)).unwrap();
        let b = core.add("same", ts(1)).unwrap();

        assert_ne!(a, b);
        assert_eq!(core.live_count().unwrap(), 2);
    }

    #[test]
    fn test_add_structured() {
        let (mut core, _temp) = create_test_core();
        let fields: Fields = [("title", "Docs"), ("url", "https://docs.rs")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        let id = core
            .add_structured(NoteType::Bookmark, &fields, ts(1))
            .unwrap();
        let parsed = core.get(&id).unwrap().unwrap().parse().unwrap();

        assert_eq!(parsed.note_type, NoteType::Bookmark);
        assert_eq!(parsed.title, "Docs");
    }

    #[test]
    fn test_update() {
        let (mut core, _temp) = create_test_core();
        let id = core.add("first", ts(100)).unwrap();

        let record = core.update(&id, "second", ts(200)).unwrap();

        assert_eq!(record.content.as_deref(), Some("second"));
        assert_eq!(record.updated_at, ts(200));
        assert_eq!(
            core.get(&id).unwrap().unwrap().content.as_deref(),
            Some("second")
        );
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let (mut core, _temp) = create_test_core();
        let id = RecordId::try_from("missing".to_string()).unwrap();

        let err = core.update(&id, "x", ts(1)).unwrap_err();
        assert!(matches!(err, VaultError::NotFound));
    }
}

mod lifecycle {
    use super::common::*;
    use super::*;

    #[test]
    fn test_soft_deleted_record_is_invisible() {
        let (mut core, _temp) = create_test_core();
        let id = core.add("gone soon", ts(100)).unwrap();
        core.add("stays", ts(50)).unwrap();

        core.soft_delete(&id, ts(200)).unwrap();

        assert!(core.get(&id).unwrap().is_none());
        assert_eq!(page_contents(&core, &PageQuery::new(1, 10)), ["stays"]);
        assert_eq!(
            page_contents(&core, &PageQuery::new(1, 10).with_search("gone")),
            Vec::<String>::new()
        );
    }

    #[test]
    fn test_update_does_not_resurrect() {
        let (mut core, _temp) = create_test_core();
        let id = core.add("note", ts(100)).unwrap();
        core.soft_delete(&id, ts(200)).unwrap();

        assert!(matches!(
            core.update(&id, "back?", ts(300)).unwrap_err(),
            VaultError::NotFound
        ));
        assert!(matches!(
            core.soft_delete(&id, ts(300)).unwrap_err(),
            VaultError::NotFound
        ));
        assert!(core.get(&id).unwrap().is_none());
    }

    #[test]
    fn test_restore() {
        let (mut core, _temp) = create_test_core();
        let id = core.add("note", ts(100)).unwrap();

        assert!(matches!(
            core.restore(&id, ts(150)).unwrap_err(),
            VaultError::NotFound
        ));

        core.soft_delete(&id, ts(200)).unwrap();
        let record = core.restore(&id, ts(300)).unwrap();

        assert_eq!(record.content.as_deref(), Some("note"));
        assert!(core.get(&id).unwrap().is_some());
        assert!(core.deleted_ids().unwrap().is_empty());
    }

    #[test]
    fn test_soft_delete_drops_attachments() {
        let (mut core, temp) = create_test_core();
        let id = core.add("note", ts(100)).unwrap();
        let attachment_ids = core
            .add_attachments(&id, vec![file("a.bin", b"abc")], ts(200))
            .unwrap();

        core.soft_delete(&id, ts(300)).unwrap();

        let exported = core.export().unwrap();
        let tombstone = exported.iter().find(|r| r.id == id.as_str()).unwrap();
        assert!(tombstone.deleted_at.is_some());
        assert!(tombstone.attachments.is_empty());
        assert!(tombstone.attachment_payloads.is_empty());
        let blobs = config(&temp).blobs_path();
        assert_eq!(std::fs::read_dir(blobs).unwrap().count(), 0);

        let restored = core.restore(&id, ts(400)).unwrap();
        assert!(restored.attachments.is_empty());
        assert_eq!(
            core.attachment_payload(&id, &attachment_ids[0]).unwrap(),
            None
        );
    }

    #[test]
    fn test_purge_removes_attachment_files() {
        let (mut core, temp) = create_test_core();
        let id = core.add("note", ts(100)).unwrap();
        core.add_attachments(&id, vec![file("a.bin", b"abc")], ts(200))
            .unwrap();

        core.purge(&id).unwrap();

        assert!(core.get(&id).unwrap().is_none());
        let blobs = config(&temp).blobs_path();
        assert_eq!(std::fs::read_dir(blobs).unwrap().count(), 0);
    }
}

mod paging {
    use super::common::*;
    use super::*;

    fn seeded() -> (VaultCore, TempDir) {
        let (mut core, temp) = create_test_core();
        core.add("#@title=Gmail\n#@email=a@b.com\n#@password=x", ts(10))
            .unwrap();
        core.add("#@url=https://docs.rs\nRust docs", ts(20)).unwrap();
        core.add("shopping: milk", ts(30)).unwrap();
        core.add("#@title=Bank\n#@password=y\n#@username=me", ts(40))
            .unwrap();
        core.add("meeting notes", ts(50)).unwrap();
        (core, temp)
    }

    #[test]
    fn test_unfiltered_pages_are_newest_first() {
        let (core, _temp) = seeded();

        let first = page_contents(&core, &PageQuery::new(1, 2));
        let third = page_contents(&core, &PageQuery::new(3, 2));

        assert_eq!(first, ["meeting notes", "#@title=Bank\n#@password=y\n#@username=me"]);
        assert_eq!(third, ["#@title=Gmail\n#@email=a@b.com\n#@password=x"]);
        assert!(core.fetch_page(&PageQuery::new(4, 2)).unwrap().is_empty());
    }

    #[test]
    fn test_search_is_case_insensitive_over_raw_text() {
        let (core, _temp) = seeded();

        let hits = page_contents(&core, &PageQuery::new(1, 10).with_search("MILK"));
        assert_eq!(hits, ["shopping: milk"]);

        // Tag values are part of the raw text.
        let hits = page_contents(&core, &PageQuery::new(1, 10).with_search("a@b.com"));
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_type_filter_and_paging() {
        let (core, _temp) = seeded();
        let passwords = PageQuery::new(1, 1).with_type(NoteType::Password);

        let first = core.fetch_page(&passwords).unwrap();
        let second = core
            .fetch_page(&PageQuery {
                page: 2,
                ..passwords.clone()
            })
            .unwrap();

        assert_eq!(first[0].parse().unwrap().title, "Bank");
        assert_eq!(second[0].parse().unwrap().title, "Gmail");
    }

    #[test]
    fn test_blank_search_is_unfiltered() {
        let (core, _temp) = seeded();
        assert!(!PageQuery::new(1, 10).with_search("  ").is_filtered());
        assert_eq!(
            core.fetch_page(&PageQuery::new(1, 10).with_search("  "))
                .unwrap()
                .len(),
            5
        );
    }

    #[test]
    fn test_invalid_page_requests() {
        let (core, _temp) = seeded();

        for query in [PageQuery::new(0, 10), PageQuery::new(1, 0)] {
            let err = core.fetch_page(&query).unwrap_err();
            assert!(matches!(
                err,
                VaultError::Validation(ValidationError::InvalidPage(_))
            ));
        }
    }
}

mod attachments {
    use super::common::*;
    use super::*;

    #[test]
    fn test_add_and_read_attachment() {
        let (mut core, _temp) = create_test_core();
        let id = core.add("note", ts(100)).unwrap();

        let ids = core
            .add_attachments(&id, vec![file("a.txt", b"alpha"), file("b.txt", b"beta")], ts(200))
            .unwrap();

        assert_eq!(ids.len(), 2);
        let record = core.get(&id).unwrap().unwrap();
        assert_eq!(record.updated_at, ts(200));
        assert_eq!(record.attachments.len(), 2);
        assert_eq!(record.attachments[0].name, "a.txt");
        assert_eq!(record.attachments[0].size, 5);
        assert_eq!(
            core.attachment_payload(&id, &ids[1]).unwrap().as_deref(),
            Some(&b"beta"[..])
        );
    }

    #[test]
    fn test_oversized_attachment_is_rejected_before_any_write() {
        let (mut core, temp) = create_test_core();
        let id = core.add("note", ts(100)).unwrap();
        let big = vec![0u8; 11 * 1024 * 1024];

        let err = core
            .add_attachments(&id, vec![file("small", b"ok"), file("big", &big)], ts(200))
            .unwrap_err();

        assert!(matches!(
            err,
            VaultError::Validation(ValidationError::AttachmentTooLarge { .. })
        ));
        let record = core.get(&id).unwrap().unwrap();
        assert!(record.attachments.is_empty());
        assert_eq!(record.updated_at, ts(100));
        assert!(!config(&temp).blobs_path().exists());
    }

    #[test]
    fn test_attach_to_deleted_record_fails() {
        let (mut core, _temp) = create_test_core();
        let id = core.add("note", ts(100)).unwrap();
        core.soft_delete(&id, ts(150)).unwrap();

        let err = core
            .add_attachments(&id, vec![file("a", b"x")], ts(200))
            .unwrap_err();
        assert!(matches!(err, VaultError::NotFound));
    }

    #[test]
    fn test_remove_attachment() {
        let (mut core, _temp) = create_test_core();
        let id = core.add("note", ts(100)).unwrap();
        let ids = core
            .add_attachments(&id, vec![file("a", b"x")], ts(200))
            .unwrap();

        core.remove_attachment(&id, &ids[0], ts(300)).unwrap();

        assert!(core.get(&id).unwrap().unwrap().attachments.is_empty());
        assert!(core.attachment_payload(&id, &ids[0]).unwrap().is_none());
        assert!(matches!(
            core.remove_attachment(&id, &ids[0], ts(400)).unwrap_err(),
            VaultError::NotFound
        ));
    }
}

mod decryption {
    use super::common::*;
    use super::*;

    #[test]
    fn test_wrong_key_yields_none_and_is_skipped_by_search() {
        let temp = TempDir::new().unwrap();
        let config = config(&temp);

        let id = {
            let mut core = VaultCore::open(config.clone(), &VaultIdentity::derive("right")).unwrap();
            core.add("findable text", ts(100)).unwrap()
        };

        // Same namespace file, different key.
        let wrong = CipherCodec::new(&VaultIdentity::derive("wrong"));
        let core = VaultCore::open_with_codec(config, wrong).unwrap();

        let record = core.get(&id).unwrap().unwrap();
        assert!(record.content.is_none());

        let hits = core
            .fetch_page(&PageQuery::new(1, 10).with_search("findable"))
            .unwrap();
        assert!(hits.is_empty());

        // Unfiltered pages flag the record instead of dropping it.
        let page = core.fetch_page(&PageQuery::new(1, 10)).unwrap();
        assert_eq!(page.len(), 1);
        assert!(page[0].content.is_none());
    }

    #[test]
    fn test_cache_fills_on_read_and_clears() {
        let (mut core, _temp) = create_test_core();
        let id = core.add("note", ts(1)).unwrap();

        core.clear_cache();
        core.get(&id).unwrap();
        assert_eq!(core.cache_len(), 1);

        core.clear_cache();
        assert_eq!(core.cache_len(), 0);
    }
}

mod maintenance {
    use super::common::*;
    use super::*;

    const HOUR_MS: i64 = 60 * 60 * 1000;
    const DAY_MS: i64 = 24 * HOUR_MS;

    #[test]
    fn test_prunes_expired_records() {
        let (mut core, temp) = create_test_core();
        let id = core.add("old", ts(0)).unwrap();
        core.add_attachments(&id, vec![file("a", b"x")], ts(1))
            .unwrap();
        core.soft_delete(&id, ts(DAY_MS)).unwrap();
        let kept = core.add("kept", ts(2)).unwrap();

        let scheduler = MaintenanceScheduler::new(MaintenanceConfig::default());
        let outcome = scheduler
            .maybe_run(&mut core, ts(92 * DAY_MS))
            .unwrap()
            .unwrap();

        assert_eq!(outcome.records_pruned, [id.clone()]);
        assert!(core.export().unwrap().iter().all(|r| r.id != id.as_str()));
        assert!(core.get(&kept).unwrap().is_some());
        let blobs = config(&temp).blobs_path();
        assert_eq!(std::fs::read_dir(blobs).unwrap().count(), 0);
    }

    #[test]
    fn test_second_run_within_interval_is_skipped() {
        let (mut core, _temp) = create_test_core();
        let id = core.add("old", ts(0)).unwrap();
        core.soft_delete(&id, ts(1)).unwrap();

        let scheduler = MaintenanceScheduler::new(MaintenanceConfig {
            interval: Duration::from_secs(24 * 60 * 60),
            retention: Duration::from_secs(60),
        });

        let t0 = ts(10 * DAY_MS);
        let first = scheduler.maybe_run(&mut core, t0).unwrap();
        assert!(first.is_some());
        assert_eq!(core.last_maintenance_run().unwrap(), Some(t0));

        // A record that becomes prunable meanwhile is left for the next run.
        let late = core.add("late", ts(t0.as_millis())).unwrap();
        core.soft_delete(&late, ts(t0.as_millis() + 1)).unwrap();

        let second = scheduler.maybe_run(&mut core, ts(t0.as_millis() + HOUR_MS)).unwrap();
        assert!(second.is_none());
        assert_eq!(core.last_maintenance_run().unwrap(), Some(t0));
        assert_eq!(core.deleted_ids().unwrap(), [late]);
    }

    #[test]
    fn test_orphaned_blob_directories_are_swept() {
        let (mut core, temp) = create_test_core();
        core.add("note", ts(0)).unwrap();
        let orphan = config(&temp).blobs_path().join("deadbeef");
        std::fs::create_dir_all(&orphan).unwrap();
        std::fs::write(orphan.join("x.bin"), b"junk").unwrap();

        let outcome = core.maintenance(ts(1), Duration::from_secs(60)).unwrap();

        assert_eq!(outcome.orphaned_dirs_removed, 1);
        assert!(!orphan.exists());
    }

    #[test]
    fn test_run_logged_reports_outcome() {
        let (mut core, _temp) = create_test_core();
        let scheduler = MaintenanceScheduler::default();

        assert!(scheduler.run_logged(&mut core, ts(0)).is_some());
        assert!(scheduler.run_logged(&mut core, ts(1)).is_none());
    }
}

mod reopen {
    use super::common::*;
    use super::*;

    #[test]
    fn test_records_survive_reopen() {
        let temp = TempDir::new().unwrap();
        let identity = VaultIdentity::derive("passphrase");

        let id = {
            let mut core = VaultCore::open(config(&temp), &identity).unwrap();
            core.add("persisted", ts(1)).unwrap()
        };

        let core = VaultCore::open(config(&temp), &identity).unwrap();
        assert_eq!(core.upgrade_report().from_version, CURRENT_SCHEMA);
        assert_eq!(
            core.get(&id).unwrap().unwrap().content.as_deref(),
            Some("persisted")
        );
    }
}
