//! End-to-end scenarios through the facade.

use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use bytes::Bytes;
use proptest::prelude::*;

use knowledge::store::{MemoryContentStore, MemoryStore, MetadataStore, PermissionStore};
use knowledge::{
    Action, CapabilitySet, ErrorKind, Knowledge, KnowledgeConfig, KnowledgeError, MetadataUpdate,
    UserId,
};
use knowledge_testkit::{
    content_ops, new_user, sample_bytes, sample_draft, ContentOp, Fault, FaultyStore, TestFixture,
};

type TestKnowledge = Knowledge<FaultyStore<MemoryStore>, FaultyStore<MemoryContentStore>>;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn knowledge(fx: &TestFixture) -> TestKnowledge {
    init_tracing();
    Knowledge::new(fx.db.clone(), fx.content.clone(), KnowledgeConfig::default())
}

fn kind<T: std::fmt::Debug>(result: knowledge::Result<T>) -> ErrorKind {
    result.expect_err("expected an error").kind()
}

// ─────────────────────────────────────────────────────────────────────────────
// Sharing
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_share_then_revoke_read() -> Result<()> {
    let fx = TestFixture::new();
    let kb = knowledge(&fx);
    let (a, b) = (fx.user(), fx.user());

    let receipt = kb
        .upload(&a, sample_draft("Report.pdf"), sample_bytes(1024, 0))
        .await?;
    let doc = receipt.document.document_id;
    assert_eq!(kb.get_capabilities(&a, &doc).await, CapabilitySet::FULL);

    let denied = kind(kb.get_metadata(&b, &doc).await);
    assert_eq!(denied, ErrorKind::PermissionDenied);
    assert_eq!(denied.public(), ErrorKind::NotFound);

    kb.share_permissions(&a, &b, &doc, &["read"]).await?;
    assert_eq!(kb.get_content(&b, &doc, None).await?, sample_bytes(1024, 0));

    kb.remove_permissions(&a, &b, &doc, &["read"]).await?;
    assert_eq!(
        kind(kb.get_content(&b, &doc, None).await),
        ErrorKind::PermissionDenied
    );
    assert!(kb.get_capabilities(&b, &doc).await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_share_requires_share_capability() -> Result<()> {
    let fx = TestFixture::new();
    let kb = knowledge(&fx);
    let (a, b, c) = (fx.user(), fx.user(), fx.user());

    let doc = kb
        .upload(&a, sample_draft("notes.txt"), sample_bytes(8, 1))
        .await?
        .document
        .document_id;
    kb.share_permissions(&a, &b, &doc, &["read", "write"]).await?;

    assert_eq!(
        kind(kb.share_permissions(&b, &c, &doc, &["read"]).await),
        ErrorKind::PermissionDenied
    );
    assert_eq!(
        kind(kb.share_permissions(&a, &c, &doc, &["admin"]).await),
        ErrorKind::Validation
    );
    assert_eq!(
        kind(kb.share_permissions::<&str>(&a, &c, &doc, &[]).await),
        ErrorKind::Validation
    );
    assert!(kb.get_capabilities(&c, &doc).await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_share_is_idempotent() -> Result<()> {
    let fx = TestFixture::new();
    let kb = knowledge(&fx);
    let (a, b) = (fx.user(), fx.user());

    let doc = kb
        .upload(&a, sample_draft("a.md"), sample_bytes(4, 0))
        .await?
        .document
        .document_id;
    let once = kb.share_permissions(&a, &b, &doc, &["read", "share"]).await?;
    let twice = kb.share_permissions(&a, &b, &doc, &["share", "read"]).await?;
    assert_eq!(once, twice);
    assert_eq!(kb.get_capabilities(&b, &doc).await, twice);
    Ok(())
}

#[tokio::test]
async fn test_write_does_not_imply_delete() -> Result<()> {
    let fx = TestFixture::new();
    let kb = knowledge(&fx);
    let (a, b) = (fx.user(), fx.user());

    let doc = kb
        .upload(&a, sample_draft("plan.docx"), sample_bytes(16, 0))
        .await?
        .document
        .document_id;
    kb.share_permissions(&a, &b, &doc, &["read", "write"]).await?;

    kb.update_content(&b, &doc, sample_bytes(16, 9)).await?;
    assert_eq!(
        kind(kb.delete_document(&b, &doc).await),
        ErrorKind::PermissionDenied
    );
    assert!(kb.get_metadata(&a, &doc).await.is_ok());
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Versions
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_sequential_updates_keep_history() -> Result<()> {
    let fx = TestFixture::new();
    let kb = knowledge(&fx);
    let a = fx.user();

    let doc = kb
        .upload(&a, sample_draft("Report.pdf"), sample_bytes(32, 1))
        .await?
        .document
        .document_id;

    let v2 = kb.update_content(&a, &doc, sample_bytes(32, 2)).await?;
    let v3 = kb.update_content(&a, &doc, sample_bytes(32, 3)).await?;
    assert_eq!((v2.version_number, v3.version_number), (2, 3));

    let meta = kb.get_metadata(&a, &doc).await?;
    assert_eq!(meta.current_version, 3);
    assert_eq!(kb.get_all_versions(&a, &doc).await?.len(), 3);

    assert_eq!(kb.get_content(&a, &doc, Some(1)).await?, sample_bytes(32, 1));
    assert_eq!(kb.get_content(&a, &doc, None).await?, sample_bytes(32, 3));

    let v1 = kb.get_specific_version(&a, &doc, 1).await?;
    assert_eq!(v1.current_version, 1);
    assert_eq!(v1.versions.len(), 1);
    assert!(matches!(
        kb.get_specific_version(&a, &doc, 9).await,
        Err(KnowledgeError::VersionNotFound { version: 9, .. })
    ));
    Ok(())
}

#[tokio::test]
async fn test_restore_appends_copy_of_old_version() -> Result<()> {
    let fx = TestFixture::new();
    let kb = knowledge(&fx);
    let a = fx.user();

    let doc = kb
        .upload(&a, sample_draft("Report.pdf"), sample_bytes(64, 1))
        .await?
        .document
        .document_id;
    kb.update_content(&a, &doc, sample_bytes(64, 2)).await?;
    kb.update_content(&a, &doc, sample_bytes(64, 3)).await?;

    let restored = kb.restore_version(&a, &doc, 1).await?;
    assert_eq!(restored.version_number, 4);
    assert_eq!(kb.get_content(&a, &doc, None).await?, sample_bytes(64, 1));

    let versions = kb.get_all_versions(&a, &doc).await?;
    let numbers: Vec<u32> = versions.iter().map(|v| v.version_number).collect();
    assert_eq!(numbers, vec![1, 2, 3, 4]);
    assert_eq!(kb.get_metadata(&a, &doc).await?.current_version, 4);

    assert_eq!(
        kind(kb.restore_version(&a, &doc, 7).await),
        ErrorKind::NotFound
    );
    Ok(())
}

#[tokio::test]
async fn test_metadata_update_keeps_versions() -> Result<()> {
    let fx = TestFixture::new();
    let kb = knowledge(&fx);
    let a = fx.user();

    let uploaded = kb
        .upload(&a, sample_draft("draft.md"), sample_bytes(8, 0))
        .await?
        .document;
    kb.update_content(&a, &uploaded.document_id, sample_bytes(8, 1))
        .await?;

    let current = kb.get_metadata(&a, &uploaded.document_id).await?;
    let mut update = MetadataUpdate::from_document(&current);
    update.name = "final.md".into();
    update.tags.insert("published".into());

    let updated = kb
        .update_metadata(&a, &uploaded.document_id, update.clone())
        .await?;
    assert_eq!(updated.name, "final.md");
    assert_eq!(updated.versions, current.versions);
    assert_eq!(updated.current_version, 2);

    update.name = "   ".into();
    assert_eq!(
        kind(kb.update_metadata(&a, &uploaded.document_id, update).await),
        ErrorKind::Validation
    );
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Failures and cleanup
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_failed_content_write_leaves_nothing_behind() -> Result<()> {
    let fx = TestFixture::new();
    let kb = knowledge(&fx);
    let a = fx.user();

    fx.content.inject(Fault::ContentPut);
    let err = kb
        .upload(&a, sample_draft("Report.pdf"), sample_bytes(1024, 0))
        .await
        .expect_err("content store is down");
    assert_eq!(err.kind(), ErrorKind::PartialWrite);

    assert!(fx.db.list_documents().await?.is_empty());
    assert!(fx.db.permissions_for_user(&a).await?.is_empty());
    assert_eq!(fx.blob_count(), 0);
    assert!(kb.get_doc_ids_for_user(&a).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_failed_append_keeps_current_version() -> Result<()> {
    let fx = TestFixture::new();
    let kb = knowledge(&fx);
    let a = fx.user();

    let doc = kb
        .upload(&a, sample_draft("Report.pdf"), sample_bytes(16, 0))
        .await?
        .document
        .document_id;

    fx.db.inject(Fault::MetadataAppend);
    assert_eq!(
        kind(kb.update_content(&a, &doc, sample_bytes(16, 5)).await),
        ErrorKind::PartialWrite
    );
    fx.db.heal_all();

    assert_eq!(kb.get_metadata(&a, &doc).await?.current_version, 1);
    assert_eq!(fx.blob_count(), 1);
    assert_eq!(kb.get_content(&a, &doc, None).await?, sample_bytes(16, 0));
    Ok(())
}

#[tokio::test]
async fn test_delete_cascades() -> Result<()> {
    let fx = TestFixture::new();
    let kb = knowledge(&fx);
    let (a, b) = (fx.user(), fx.user());

    let doc = kb
        .upload(&a, sample_draft("Report.pdf"), sample_bytes(16, 0))
        .await?
        .document
        .document_id;
    kb.update_content(&a, &doc, sample_bytes(16, 1)).await?;
    kb.share_permissions(&a, &b, &doc, &["read"]).await?;

    let report = kb.delete_document(&a, &doc).await?;
    assert!(report.is_clean());
    assert_eq!(report.blobs_removed, 2);
    assert_eq!(report.permissions_removed, 2);

    assert_eq!(fx.blob_count(), 0);
    assert!(kb.get_doc_ids_for_user(&b).await?.is_empty());
    assert_eq!(
        kind(kb.get_metadata(&a, &doc).await).public(),
        ErrorKind::NotFound
    );
    Ok(())
}

#[tokio::test]
async fn test_activity_failure_does_not_fail_operation() -> Result<()> {
    let fx = TestFixture::new();
    let kb = knowledge(&fx);
    let a = fx.user();

    fx.db.inject(Fault::ActivityRecord);
    let doc = kb
        .upload(&a, sample_draft("Report.pdf"), sample_bytes(4, 0))
        .await?
        .document
        .document_id;
    fx.db.heal(Fault::ActivityRecord);

    kb.update_content(&a, &doc, sample_bytes(4, 1)).await?;
    let log = kb.get_activity(&a, &doc).await?;
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].action, Action::UpdateContent);
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Listings and activity
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_listings_respect_read() -> Result<()> {
    let fx = TestFixture::new();
    let kb = knowledge(&fx);
    let (a, b) = (fx.user(), fx.user());

    let first = kb
        .upload(&a, sample_draft("one.txt"), sample_bytes(4, 0))
        .await?
        .document
        .document_id;
    let second = kb
        .upload(&a, sample_draft("two.txt"), sample_bytes(4, 1))
        .await?
        .document
        .document_id;
    let theirs = kb
        .upload(&b, sample_draft("three.txt"), sample_bytes(4, 2))
        .await?
        .document
        .document_id;

    kb.share_permissions(&a, &b, &second, &["read"]).await?;
    kb.share_permissions(&a, &b, &first, &["write"]).await?;

    let visible: Vec<_> = kb
        .list_accessible_metadata(&b)
        .await?
        .into_iter()
        .map(|d| d.document_id)
        .collect();
    assert_eq!(visible, vec![second, theirs]);

    let mut ids = kb.get_doc_ids_for_user(&b).await?;
    ids.sort();
    let mut expected = vec![first, second, theirs];
    expected.sort();
    assert_eq!(ids, expected);

    let owned = kb.list_owned_documents(&a).await?;
    assert_eq!(owned.len(), 2);

    assert_eq!(
        kb.find_document_by_name(&b, "two.txt").await?.document_id,
        second
    );
    assert_eq!(
        kind(kb.find_document_by_name(&b, "one.txt").await),
        ErrorKind::PermissionDenied
    );
    assert_eq!(
        kind(kb.find_document_by_name(&b, "missing.txt").await),
        ErrorKind::NotFound
    );
    Ok(())
}

#[tokio::test]
async fn test_find_by_name_skips_unreadable_namesakes() -> Result<()> {
    let fx = TestFixture::new();
    let kb = knowledge(&fx);
    let (a, b, c) = (fx.user(), fx.user(), fx.user());

    let theirs = kb
        .upload(&a, sample_draft("Report.pdf"), sample_bytes(8, 0))
        .await?
        .document
        .document_id;
    let mine = kb
        .upload(&b, sample_draft("Report.pdf"), sample_bytes(8, 1))
        .await?
        .document
        .document_id;

    assert_eq!(kb.find_document_by_name(&a, "Report.pdf").await?.document_id, theirs);
    assert_eq!(kb.find_document_by_name(&b, "Report.pdf").await?.document_id, mine);

    // Once both are readable the earlier one wins.
    kb.share_permissions(&a, &b, &theirs, &["read"]).await?;
    assert_eq!(kb.find_document_by_name(&b, "Report.pdf").await?.document_id, theirs);

    assert_eq!(
        kind(kb.find_document_by_name(&c, "Report.pdf").await),
        ErrorKind::PermissionDenied
    );
    Ok(())
}

#[tokio::test]
async fn test_share_accepts_padded_mixed_case_names() -> Result<()> {
    let fx = TestFixture::new();
    let kb = knowledge(&fx);
    let (a, b) = (fx.user(), fx.user());

    let doc = kb
        .upload(&a, sample_draft("Report.pdf"), sample_bytes(8, 0))
        .await?
        .document
        .document_id;

    let granted = kb.share_permissions(&a, &b, &doc, &[" Read ", "WRITE"]).await?;
    assert_eq!(granted, CapabilitySet::parse(["read", "write"])?);
    assert_eq!(kb.get_content(&b, &doc, None).await?, sample_bytes(8, 0));

    let removed = kb.remove_permissions(&a, &b, &doc, &["Write "]).await?;
    assert_eq!(removed, CapabilitySet::parse(["write"])?);

    let log = kb.get_activity(&a, &doc).await?;
    assert!(log.iter().any(|e| e.description == format!("granted read, write to {}", b)));
    Ok(())
}

#[tokio::test]
async fn test_activity_log_follows_mutations() -> Result<()> {
    let fx = TestFixture::new();
    let kb = knowledge(&fx);
    let (a, b) = (fx.user(), fx.user());

    let doc = kb
        .upload(&a, sample_draft("Report.pdf"), sample_bytes(4, 0))
        .await?
        .document
        .document_id;
    kb.update_content(&a, &doc, sample_bytes(4, 1)).await?;
    kb.restore_version(&a, &doc, 1).await?;
    kb.share_permissions(&a, &b, &doc, &["read"]).await?;

    let actions: Vec<Action> = kb
        .get_activity(&a, &doc)
        .await?
        .into_iter()
        .map(|e| e.action)
        .collect();
    assert_eq!(
        actions,
        vec![
            Action::Upload,
            Action::UpdateContent,
            Action::RestoreVersion,
            Action::Share
        ]
    );

    // Read is enough to see the log.
    assert_eq!(kb.get_activity(&b, &doc).await?.len(), 4);
    let stranger = UserId::new();
    assert!(kb.get_activity(&stranger, &doc).await.is_err());
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Accounts
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_sign_up_and_login() -> Result<()> {
    let fx = TestFixture::new();
    let kb = knowledge(&fx);

    let ada = kb.sign_up(new_user("Ada"), "correct horse").await?;
    assert_eq!(kb.login("ada@example.edu", "correct horse").await?, ada);
    assert_eq!(kb.get_user_by_email("ada@example.edu").await?, ada);
    assert_eq!(kb.get_user(&ada.user_id).await?, ada);

    assert_eq!(
        kind(kb.login("ada@example.edu", "battery staple").await),
        ErrorKind::Unauthenticated
    );
    assert_eq!(
        kind(kb.login("bob@example.edu", "correct horse").await),
        ErrorKind::Unauthenticated
    );
    assert_eq!(
        kind(kb.sign_up(new_user("Ada"), "another").await),
        ErrorKind::Conflict
    );
    assert_eq!(
        kind(kb.get_user_by_email("bob@example.edu").await),
        ErrorKind::NotFound
    );
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// SQLite
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_sqlite_round_trip_with_signed_urls() -> Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("knowledge.db");

    let mut config = KnowledgeConfig::default();
    config.storage.database = path.to_string_lossy().into_owned();
    config.storage.url_base = Some("http://files.test/content".into());
    config.storage.url_secret = Some(hex_secret());

    let (owner, doc) = {
        let kb = Knowledge::open_sqlite(config.clone())?;
        let owner = kb.sign_up(new_user("Grace"), "pw").await?.user_id;
        let receipt = kb
            .upload(&owner, sample_draft("Report.pdf"), sample_bytes(256, 7))
            .await?;
        assert!(receipt.content_url.is_some());
        kb.update_content(&owner, &receipt.document.document_id, sample_bytes(256, 8))
            .await?;
        (owner, receipt.document.document_id)
    };

    let kb = Knowledge::open_sqlite(config.clone())?;
    assert_eq!(kb.login("grace@example.edu", "pw").await?.user_id, owner);
    assert_eq!(kb.get_metadata(&owner, &doc).await?.current_version, 2);
    assert_eq!(kb.get_content(&owner, &doc, Some(1)).await?, sample_bytes(256, 7));

    let url = kb
        .get_content_url(&owner, &doc, None)
        .await?
        .expect("signer configured");
    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
    let signer = config.url_signer()?.expect("signer configured");
    let key = signer.verify(&url, now)?;
    assert_eq!((key.document_id, key.version), (doc, 2));
    Ok(())
}

fn hex_secret() -> String {
    "2a".repeat(32)
}

#[tokio::test]
async fn test_memory_backend_from_config() -> Result<()> {
    init_tracing();
    let kb = Knowledge::in_memory(KnowledgeConfig::from_toml_str("max_content_bytes = 8")?)?;
    let a = UserId::new();

    assert_eq!(
        kind(kb.upload(&a, sample_draft("big.txt"), sample_bytes(9, 0)).await),
        ErrorKind::Validation
    );
    let doc = kb
        .upload(&a, sample_draft("small.txt"), sample_bytes(8, 0))
        .await?
        .document
        .document_id;
    assert!(kb.get_content_url(&a, &doc, None).await?.is_none());
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Properties
// ─────────────────────────────────────────────────────────────────────────────

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime")
        .block_on(future)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_history_stays_contiguous(ops in content_ops(12)) {
        block_on(async {
            let fx = TestFixture::with_signer();
            let kb = Knowledge::new(fx.db.clone(), fx.content.clone(), KnowledgeConfig::default());
            let a = fx.user();
            let doc = kb
                .upload(&a, sample_draft("prop.bin"), Bytes::from_static(b"v1"))
                .await
                .unwrap()
                .document
                .document_id;

            let mut count = 1u32;
            for op in ops {
                let version = match op {
                    ContentOp::Update(bytes) => kb.update_content(&a, &doc, bytes.into()).await.unwrap(),
                    ContentOp::Restore { pick } => {
                        let target = ContentOp::restore_target(pick, count);
                        kb.restore_version(&a, &doc, target).await.unwrap()
                    }
                };
                count += 1;
                assert_eq!(version.version_number, count);
            }

            let meta = kb.get_metadata(&a, &doc).await.unwrap();
            let numbers: Vec<u32> = meta.versions.iter().map(|v| v.version_number).collect();
            assert_eq!(numbers, (1..=count).collect::<Vec<_>>());
            assert!(meta.has_version(meta.current_version));
            assert_eq!(meta.current_version, count);
            assert_eq!(fx.blob_count(), count as usize);
        });
    }
}
