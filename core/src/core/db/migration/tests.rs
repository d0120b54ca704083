use super::*;
use crate::crypto::VaultIdentity;
use crate::parser::parse;
use crate::types::Config;
use tempfile::TempDir;

mod common {
    use super::*;

    pub(super) fn config(temp: &TempDir) -> Config {
        Config {
            base_path: temp.path().to_path_buf(),
            namespace: "T3VO-legacy".to_string(),
        }
    }

    pub(super) fn codec(passphrase: &str) -> CipherCodec {
        CipherCodec::new(&VaultIdentity::derive(passphrase))
    }

    pub(super) fn fields(pairs: &[(&str, &str)]) -> Fields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    pub(super) fn legacy_row(codec: &CipherCodec, data: Fields, updated_at: i64) -> Vec<u8> {
        let entry = LegacyEntry {
            data: codec.encrypt(&Payload::Structured(data)).unwrap(),
            updated_at: Timestamp::from_millis(updated_at),
            deleted_at: None,
        };
        postcard::to_allocvec(&entry).unwrap()
    }

    pub(super) fn typed_row(
        codec: &CipherCodec,
        entry_type: &str,
        data: Fields,
        updated_at: i64,
        deleted_at: Option<i64>,
    ) -> Vec<u8> {
        let entry = TypedEntry {
            entry_type: entry_type.to_string(),
            data: codec.encrypt(&Payload::Structured(data)).unwrap(),
            updated_at: Timestamp::from_millis(updated_at),
            deleted_at: deleted_at.map(Timestamp::from_millis),
        };
        postcard::to_allocvec(&entry).unwrap()
    }

    /// Typed entry whose payload is arbitrary JSON text, as the structured
    /// generations stored it.
    pub(super) fn json_row(codec: &CipherCodec, entry_type: &str, data: &str, updated_at: i64) -> Vec<u8> {
        let entry = TypedEntry {
            entry_type: entry_type.to_string(),
            data: codec.encrypt_text(data.to_string()).unwrap(),
            updated_at: Timestamp::from_millis(updated_at),
            deleted_at: None,
        };
        postcard::to_allocvec(&entry).unwrap()
    }

    /// Writes rows into `table` of a store that has no schema entry yet.
    pub(super) fn seed(
        config: &Config,
        table: TableDefinition<&str, &[u8]>,
        rows: &[(&str, Vec<u8>)],
    ) {
        std::fs::create_dir_all(&config.base_path).unwrap();
        let db = redb::Database::create(config.db_path()).unwrap();
        let txn = db.begin_write().unwrap();
        {
            let mut t = txn.open_table(table).unwrap();
            for (id, bytes) in rows {
                t.insert(*id, bytes.as_slice()).unwrap();
            }
        }
        txn.commit().unwrap();
    }

    pub(super) fn contents(db: &Database, codec: &CipherCodec) -> Vec<(String, String)> {
        db.all_records()
            .unwrap()
            .into_iter()
            .map(|(id, value)| (id.into_inner(), codec.decrypt_raw(&value.content).unwrap()))
            .collect()
    }

    pub(super) fn table_exists(db: &Database, name: &str) -> bool {
        let txn = db.db.begin_read().unwrap();
        txn.list_tables().unwrap().any(|t| t.name() == name)
    }
}

mod per_type_tables {
    use super::common::*;
    use super::*;

    fn seed_v1(config: &Config, codec: &CipherCodec) {
        seed(
            config,
            PASSWORDS_TABLE,
            &[(
                "pw1",
                legacy_row(
                    codec,
                    fields(&[
                        ("title", "GitHub"),
                        ("email", "me@example.com"),
                        ("password", "hunter2"),
                        ("totpSecret", "JBSWY3DPEHPK3PXP"),
                        ("urls", "github.com"),
                        ("note", "work account"),
                    ]),
                    100,
                ),
            )],
        );
        seed(
            config,
            BOOKMARKS_TABLE,
            &[(
                "bm1",
                legacy_row(
                    codec,
                    fields(&[("title", "Docs"), ("url", "https://docs.rs")]),
                    200,
                ),
            )],
        );
        seed(
            config,
            NOTES_TABLE,
            &[(
                "nt1",
                legacy_row(
                    codec,
                    fields(&[("title", "Groceries"), ("content", "milk\neggs")]),
                    300,
                ),
            )],
        );
    }

    #[test]
    fn upgrades_to_unified_notes() {
        let temp = TempDir::new().unwrap();
        let config = config(&temp);
        let codec = codec("correct horse");
        seed_v1(&config, &codec);

        let mut db = Database::new(&config).unwrap();
        let report = db.upgrade(&codec).unwrap();

        assert_eq!(report.from_version, 1);
        assert_eq!(report.to_version, CURRENT_SCHEMA);
        assert_eq!(db.schema_version().unwrap(), Some(CURRENT_SCHEMA));
        for legacy in ["passwords", "bookmarks", "notes", "entries"] {
            assert!(!table_exists(&db, legacy), "{legacy} should be gone");
        }

        let by_id: std::collections::HashMap<_, _> = contents(&db, &codec).into_iter().collect();

        let password = parse(&by_id["pw1"]);
        assert_eq!(password.note_type, NoteType::Password);
        assert_eq!(password.title, "GitHub");
        assert_eq!(password.tag("2fa"), Some("JBSWY3DPEHPK3PXP"));
        assert_eq!(password.domains(), ["github.com"]);
        assert_eq!(password.clean_content, "work account");

        let bookmark = parse(&by_id["bm1"]);
        assert_eq!(bookmark.note_type, NoteType::Bookmark);
        assert_eq!(bookmark.tag("bookmark"), Some("https://docs.rs"));

        let note = parse(&by_id["nt1"]);
        assert_eq!(note.note_type, NoteType::Note);
        assert_eq!(note.clean_content, "milk\neggs");

        let live: Vec<_> = db
            .live_records()
            .unwrap()
            .into_iter()
            .map(|(id, v)| (id.into_inner(), v.updated_at.as_millis()))
            .collect();
        assert_eq!(
            live,
            [
                ("nt1".to_string(), 300),
                ("bm1".to_string(), 200),
                ("pw1".to_string(), 100)
            ]
        );
    }

    #[test]
    fn second_upgrade_is_a_no_op() {
        let temp = TempDir::new().unwrap();
        let config = config(&temp);
        let codec = codec("correct horse");
        seed_v1(&config, &codec);

        let mut db = Database::new(&config).unwrap();
        db.upgrade(&codec).unwrap();
        let before = db.all_records().unwrap();

        let report = db.upgrade(&codec).unwrap();

        assert_eq!(
            report,
            UpgradeReport {
                from_version: CURRENT_SCHEMA,
                to_version: CURRENT_SCHEMA,
                migrated: 0,
            }
        );
        assert_eq!(db.all_records().unwrap(), before);
    }
}

mod typed_entries {
    use super::common::*;
    use super::*;

    #[test]
    fn keeps_lifecycle_timestamps() {
        let temp = TempDir::new().unwrap();
        let config = config(&temp);
        let codec = codec("pass");
        seed(
            &config,
            ENTRIES_TABLE,
            &[
                (
                    "e1",
                    typed_row(&codec, "note", fields(&[("title", "Kept")]), 10, None),
                ),
                (
                    "e2",
                    typed_row(&codec, "note", fields(&[("title", "Gone")]), 20, Some(25)),
                ),
            ],
        );

        let mut db = Database::new(&config).unwrap();
        let report = db.upgrade(&codec).unwrap();
        assert_eq!(report.from_version, 2);

        let gone = db.get(&RecordId::try_from("e2").unwrap()).unwrap().unwrap();
        assert_eq!(gone.deleted_at, Some(Timestamp::from_millis(25)));
        assert!(gone.attachments.is_empty());
        assert_eq!(db.deleted_ids().unwrap(), [RecordId::try_from("e2").unwrap()]);
        assert_eq!(db.live_count().unwrap(), 1);
    }

    #[test]
    fn list_and_scalar_fields_are_flattened() {
        let temp = TempDir::new().unwrap();
        let config = config(&temp);
        let codec = codec("pass");
        seed(
            &config,
            ENTRIES_TABLE,
            &[
                (
                    "n1",
                    json_row(
                        &codec,
                        "note",
                        r#"{"title":"Shopping","content":"milk","tags":[]}"#,
                        10,
                    ),
                ),
                (
                    "p1",
                    json_row(
                        &codec,
                        "password",
                        r#"{"title":"GitHub","email":"me@x.com","password":"p","urls":["github.com","gitlab.com"],"note":null,"pinned":true}"#,
                        20,
                    ),
                ),
            ],
        );

        let mut db = Database::new(&config).unwrap();
        let report = db.upgrade(&codec).unwrap();
        assert_eq!(report.migrated, 2);

        let by_id: std::collections::HashMap<_, _> = contents(&db, &codec).into_iter().collect();

        let note = parse(&by_id["n1"]);
        assert_eq!(note.title, "Shopping");
        assert_eq!(note.clean_content, "milk");

        let password = parse(&by_id["p1"]);
        assert_eq!(password.note_type, NoteType::Password);
        assert_eq!(password.domains(), ["github.com", "gitlab.com"]);
        assert_eq!(password.tag("pinned"), Some("true"));
        assert_eq!(password.clean_content, "");
    }

    #[test]
    fn undecodable_payload_is_reported_apart_from_wrong_key() {
        let temp = TempDir::new().unwrap();
        let config = config(&temp);
        let codec = codec("pass");
        seed(
            &config,
            ENTRIES_TABLE,
            &[("e1", json_row(&codec, "note", "{not json", 10))],
        );

        let mut db = Database::new(&config).unwrap();
        let DatabaseError::Corrupt(message) = db.upgrade(&codec).unwrap_err() else {
            panic!("expected a corrupt store error");
        };
        assert!(message.contains("payload"), "{message}");
        assert!(!message.contains("passphrase"), "{message}");
        assert!(table_exists(&db, "entries"));
    }

    #[test]
    fn wrong_key_aborts_and_leaves_store_untouched() {
        let temp = TempDir::new().unwrap();
        let config = config(&temp);
        let right = codec("right");
        seed(
            &config,
            ENTRIES_TABLE,
            &[(
                "e1",
                typed_row(&right, "note", fields(&[("title", "Secret")]), 10, None),
            )],
        );

        {
            let mut db = Database::new(&config).unwrap();
            let err = db.upgrade(&codec("wrong")).unwrap_err();
            assert!(matches!(err, DatabaseError::Corrupt(_)));
            assert!(table_exists(&db, "entries"));
            assert_eq!(db.schema_version().unwrap(), None);
        }

        let mut db = Database::new(&config).unwrap();
        db.upgrade(&right).unwrap();
        let contents = contents(&db, &right);
        assert_eq!(contents, [("e1".to_string(), "#@title=Secret".to_string())]);
    }
}

mod unified_without_attachments {
    use super::*;
    use crate::types::value::versioned_value::{ValueVariant, latest_value};

    #[test]
    fn backfills_attachment_lists() {
        let temp = TempDir::new().unwrap();
        let config = common::config(&temp);
        let codec = common::codec("pass");
        let id = RecordId::try_from("r1").unwrap();

        let mut db = Database::new(&config).unwrap();
        {
            let txn = db.db.begin_write().unwrap();
            Database::init_tables(&txn).unwrap();
            let value = v1::Value {
                content: codec.encrypt(&Payload::Raw("hello".into())).unwrap(),
                updated_at: Timestamp::from_millis(5),
                deleted_at: None,
            };
            {
                let mut main = txn.open_table(MAIN_TABLE).unwrap();
                main.insert(&id, &VersionedValue::V1(value.clone())).unwrap();
            }
            Database::index(&txn, &id, &VersionedValue::V1(value).into_latest()).unwrap();
            Database::set_schema_version_in(&txn, 3).unwrap();
            txn.commit().unwrap();
        }

        let report = db.upgrade(&codec).unwrap();
        assert_eq!((report.from_version, report.migrated), (3, 1));

        let txn = db.db.begin_read().unwrap();
        let main = txn.open_table(MAIN_TABLE).unwrap();
        let stored = main.get(&id).unwrap().unwrap().value();
        assert_eq!(stored.version(), latest_value::Value::VERSION);
        assert_eq!(db.live_count().unwrap(), 1);
    }

    #[test]
    fn newer_store_is_refused() {
        let temp = TempDir::new().unwrap();
        let config = common::config(&temp);
        let mut db = Database::new(&config).unwrap();
        {
            let txn = db.db.begin_write().unwrap();
            Database::set_schema_version_in(&txn, CURRENT_SCHEMA + 1).unwrap();
            txn.commit().unwrap();
        }

        let err = db.upgrade(&common::codec("pass")).unwrap_err();
        assert!(matches!(err, DatabaseError::Corrupt(_)));
    }
}
