//! The sharing service: recipients, uploads, shares, opens and bookkeeping.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use iryshare::access::Signer;
use iryshare::core::{Address, Envelope, Locator};
use iryshare::store::{
    self, tag_value, FileId, FileRecord, InsertResult, MemoryMetadataStore, MetadataStore,
    NewFileRecord, Precondition, ShareGrant, StoreError,
};
use iryshare::telemetry::init_test_tracing;
use iryshare::{no_progress, IryshareConfig, IryshareError, SharingError, UploadRequest};
use iryshare_testkit::{members_config, test_config, text_upload, wallet, Harness};

#[tokio::test]
async fn upload_share_open_by_username() {
    init_test_tracing();
    let harness = Harness::members();
    let alice = wallet(1);
    let bob = wallet(2);

    harness
        .service
        .register_username("Bob", &bob.address())
        .await
        .unwrap();

    let record = harness.upload(&alice, b"for bob", &["@bob"]).await.unwrap();
    assert_eq!(record.owner, alice.address());
    assert_eq!(record.revision, 1);
    assert_eq!(record.size_bytes, 7);
    assert!(record.encrypted);

    let grants = harness.service.shares_for(&record.id).await.unwrap();
    assert_eq!(grants.len(), 1);
    assert_eq!(grants[0].recipient, bob.address());
    assert_eq!(grants[0].recipient_label.as_deref(), Some("@bob"));

    let shared = harness.service.files_shared_with(&bob.address()).await.unwrap();
    assert_eq!(shared, vec![record.clone()]);

    let opened = harness.open(&bob, &record.id).await.unwrap();
    assert_eq!(opened.bytes, b"for bob");
}

#[tokio::test]
async fn resolve_recipient_forms() {
    let harness = Harness::new();
    let carol = wallet(3);
    harness
        .service
        .register_username("carol.eth", &carol.address())
        .await
        .unwrap();

    let by_name = harness.service.resolve_recipient("@Carol.ETH").await.unwrap();
    assert_eq!(by_name.address, carol.address());
    assert_eq!(by_name.label.as_deref(), Some("@carol.eth"));

    let bare = harness.service.resolve_recipient("carol.eth").await.unwrap();
    assert_eq!(bare.address, carol.address());

    let upper = carol.address().as_str().to_ascii_uppercase().replacen("0X", "0x", 1);
    let by_address = harness.service.resolve_recipient(&upper).await.unwrap();
    assert_eq!(by_address.address, carol.address());
    assert_eq!(by_address.label, None);

    assert!(matches!(
        harness.service.resolve_recipient("@nobody").await,
        Err(IryshareError::UnknownRecipient(_))
    ));
    assert!(matches!(
        harness.service.resolve_recipient("not a name!").await,
        Err(IryshareError::UnknownRecipient(_))
    ));
    assert!(matches!(
        harness.service.resolve_recipient("0xnothex").await,
        Err(IryshareError::InvalidAddress(_))
    ));
}

#[tokio::test]
async fn username_cannot_be_taken_twice() {
    let harness = Harness::new();
    harness
        .service
        .register_username("dave", &wallet(4).address())
        .await
        .unwrap();
    // Same binding again is fine.
    harness
        .service
        .register_username("@Dave", &wallet(4).address())
        .await
        .unwrap();

    let taken = harness
        .service
        .register_username("dave", &wallet(5).address())
        .await;
    assert!(matches!(
        taken,
        Err(IryshareError::Store(StoreError::UsernameTaken(_)))
    ));
}

#[tokio::test]
async fn upload_drops_duplicates_and_self() {
    let harness = Harness::new();
    let alice = wallet(1);
    let bob = wallet(2);
    let bob_upper = bob.address().as_str().to_ascii_uppercase().replacen("0X", "0x", 1);

    let record = harness
        .upload(
            &alice,
            b"x",
            &[bob.address().as_str(), bob_upper.as_str(), alice.address().as_str()],
        )
        .await
        .unwrap();

    let grants = harness.service.shares_for(&record.id).await.unwrap();
    assert_eq!(grants.len(), 1);
    assert_eq!(grants[0].recipient, bob.address());

    let bytes = harness.content.get(record.locator.object_id()).unwrap();
    let envelope = Envelope::decode(&bytes).unwrap();
    assert_eq!(envelope.recipients, vec![bob.address()]);
}

#[tokio::test]
async fn unknown_recipient_uploads_nothing() {
    let harness = Harness::new();
    let result = harness.upload(&wallet(1), b"x", &["@ghost"]).await;

    assert!(matches!(result, Err(IryshareError::UnknownRecipient(_))));
    assert!(harness.content.is_empty());
}

#[tokio::test]
async fn upload_progress() {
    let harness = Harness::new();
    let seen = Mutex::new(Vec::new());
    let record = |p: u8| seen.lock().unwrap().push(p);

    harness
        .service
        .upload_file(
            &wallet(1),
            text_upload(b"x", &[]),
            &record,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![10, 20, 30, 50, 60, 100]);
}

#[tokio::test]
async fn failed_upload_persists_nothing() {
    let harness = Harness::new();
    let alice = wallet(1);
    harness.content.set_fail_uploads(true);

    let result = harness
        .upload(&alice, b"x", &[wallet(2).address().as_str()])
        .await;

    assert!(matches!(
        result,
        Err(IryshareError::Sharing(SharingError::UploadFailed(_)))
    ));
    assert!(harness.service.files_owned_by(&alice.address()).await.unwrap().is_empty());
    assert!(harness
        .service
        .files_shared_with(&wallet(2).address())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn quota_is_enforced_per_owner() {
    let harness = Harness::with_config(IryshareConfig {
        storage_quota_bytes: Some(10),
        ..test_config()
    });
    let alice = wallet(1);

    harness.upload(&alice, b"12345678", &[]).await.unwrap();
    let over = harness.upload(&alice, b"12345678", &[]).await;
    assert!(matches!(
        over,
        Err(IryshareError::QuotaExceeded {
            used: 8,
            requested: 8,
            quota: 10
        })
    ));
    assert_eq!(harness.service.storage_usage(&alice.address()).await.unwrap(), 8);

    // Someone else's usage is separate.
    harness.upload(&wallet(2), b"12345678", &[]).await.unwrap();
}

#[tokio::test]
async fn no_quota_when_unset() {
    let harness = Harness::with_config(IryshareConfig {
        storage_quota_bytes: None,
        ..test_config()
    });
    let alice = wallet(1);
    for _ in 0..3 {
        harness.upload(&alice, &[0u8; 64], &[]).await.unwrap();
    }
    assert_eq!(harness.service.storage_usage(&alice.address()).await.unwrap(), 192);
}

#[tokio::test]
async fn share_moves_locator_and_keeps_old_envelope() {
    let harness = Harness::members();
    let alice = wallet(1);
    let bob = wallet(2);
    let carol = wallet(3);

    let record = harness
        .upload(&alice, b"shared", &[bob.address().as_str()])
        .await
        .unwrap();
    let outcome = harness
        .service
        .share_file(&alice.address(), &record.id, &[carol.address().to_string()])
        .await
        .unwrap();

    assert_ne!(outcome.locator, record.locator);
    assert_eq!(outcome.revision, 2);
    assert_eq!(outcome.added, vec![carol.address()]);

    let stored = harness.service.get_file(&record.id).await.unwrap().unwrap();
    assert_eq!(stored.locator, outcome.locator);
    assert_eq!(stored.revision, 2);

    // Bob and Carol both open the current envelope.
    assert_eq!(harness.open(&bob, &record.id).await.unwrap().bytes, b"shared");
    assert_eq!(harness.open(&carol, &record.id).await.unwrap().bytes, b"shared");

    // The first envelope is still stored, with its original recipients.
    let old = harness.content.get(record.locator.object_id()).unwrap();
    let old = Envelope::decode(&old).unwrap();
    assert_eq!(old.recipients, vec![bob.address()]);

    let grants: Vec<Address> = harness
        .service
        .shares_for(&record.id)
        .await
        .unwrap()
        .into_iter()
        .map(|g| g.recipient)
        .collect();
    assert_eq!(grants, vec![bob.address(), carol.address()]);
}

#[tokio::test]
async fn resharing_existing_recipients_changes_nothing() {
    let harness = Harness::new();
    let alice = wallet(1);
    let bob = wallet(2);

    let record = harness
        .upload(&alice, b"x", &[bob.address().as_str()])
        .await
        .unwrap();
    let objects = harness.content.len();

    let outcome = harness
        .service
        .share_file(
            &alice.address(),
            &record.id,
            &[bob.address().to_string(), alice.address().to_string()],
        )
        .await
        .unwrap();

    assert!(outcome.added.is_empty());
    assert_eq!(outcome.locator, record.locator);
    assert_eq!(outcome.revision, 1);
    assert_eq!(harness.content.len(), objects);
}

#[tokio::test]
async fn only_the_owner_can_share() {
    let harness = Harness::new();
    let alice = wallet(1);
    let mallory = wallet(6);

    let record = harness.upload(&alice, b"x", &[]).await.unwrap();
    let result = harness
        .service
        .share_file(&mallory.address(), &record.id, &[mallory.address().to_string()])
        .await;

    assert!(matches!(result, Err(IryshareError::NotOwner { .. })));
    assert!(harness.service.shares_for(&record.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_file() {
    let harness = Harness::new();
    let missing = FileId::new();

    assert!(matches!(
        harness
            .service
            .share_file(&wallet(1).address(), &missing, &[])
            .await,
        Err(IryshareError::FileNotFound(id)) if id == missing
    ));
    assert!(matches!(
        harness.open(&wallet(1), &missing).await,
        Err(IryshareError::FileNotFound(_))
    ));
}

#[tokio::test]
async fn members_mode_denies_unshared_reader() {
    let harness = Harness::with_config(members_config());
    let alice = wallet(1);

    let record = harness.upload(&alice, b"private", &[]).await.unwrap();
    let result = harness.open(&wallet(7), &record.id).await;

    assert!(matches!(
        result,
        Err(IryshareError::Sharing(SharingError::AccessDenied(_)))
    ));
}

#[tokio::test]
async fn open_retries_until_envelope_propagates() {
    let harness = Harness::new();
    let alice = wallet(1);

    harness.content.set_propagation_delay(2);
    let record = harness.upload(&alice, b"eventually", &[]).await.unwrap();

    let opened = harness.open(&alice, &record.id).await.unwrap();
    assert_eq!(opened.bytes, b"eventually");
}

#[tokio::test]
async fn open_gives_up_after_configured_attempts() {
    let harness = Harness::new();
    let alice = wallet(1);

    harness.content.set_propagation_delay(10);
    let record = harness.upload(&alice, b"never", &[]).await.unwrap();

    let result = harness.open(&alice, &record.id).await;
    assert!(matches!(
        result,
        Err(IryshareError::Sharing(SharingError::EnvelopeNotFound(_)))
    ));
}

#[tokio::test]
async fn open_of_corrupt_envelope_is_not_retried() {
    let harness = Harness::new();
    let alice = wallet(1);

    let record = harness.upload(&alice, b"x", &[]).await.unwrap();
    harness
        .content
        .corrupt(record.locator.object_id(), Bytes::from_static(b"not json"));

    assert!(matches!(
        harness.open(&alice, &record.id).await,
        Err(IryshareError::Sharing(SharingError::MalformedEnvelope(_)))
    ));
}

#[tokio::test]
async fn plain_upload_roundtrip() {
    let harness = Harness::new();
    let alice = wallet(1);
    let bob = wallet(2);

    let record = harness
        .service
        .upload_file(
            &alice,
            UploadRequest {
                bytes: Bytes::from_static(b"public notes"),
                file_name: "notes.md".to_string(),
                content_type: "text/markdown".to_string(),
                recipients: vec![bob.address().to_string()],
                encrypt: false,
                is_public: true,
            },
            &no_progress,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert!(!record.encrypted);
    assert!(record.is_public);

    let tags = harness.content.tags(record.locator.object_id()).unwrap();
    assert_eq!(tag_value(&tags, "File-Name"), Some("notes.md"));
    assert_eq!(tag_value(&tags, "Content-Type"), Some("text/markdown"));

    let opened = harness.open(&bob, &record.id).await.unwrap();
    assert_eq!(opened.bytes, b"public notes");
    assert_eq!(opened.file_name, "notes.md");

    // Sharing a plain file records the grant without a new object.
    let outcome = harness
        .service
        .share_file(&alice.address(), &record.id, &[wallet(3).address().to_string()])
        .await
        .unwrap();
    assert_eq!(outcome.locator, record.locator);
    assert_eq!(outcome.revision, 1);
    assert_eq!(harness.content.len(), 1);
}

/// Delegates to a memory store, but lets a competing writer move the locator
/// right before the first conditional update lands.
struct RacingMetadata {
    inner: MemoryMetadataStore,
    competitor: Locator,
    raced: AtomicBool,
}

#[async_trait]
impl MetadataStore for RacingMetadata {
    async fn insert_file(&self, file: NewFileRecord) -> store::Result<FileRecord> {
        self.inner.insert_file(file).await
    }

    async fn get_file(&self, id: &FileId) -> store::Result<Option<FileRecord>> {
        self.inner.get_file(id).await
    }

    async fn files_owned_by(&self, owner: &Address) -> store::Result<Vec<FileRecord>> {
        self.inner.files_owned_by(owner).await
    }

    async fn update_locator(
        &self,
        id: &FileId,
        locator: &Locator,
        precondition: Precondition,
    ) -> store::Result<FileRecord> {
        if !self.raced.swap(true, Ordering::SeqCst) {
            self.inner
                .update_locator(id, &self.competitor, Precondition::Any)
                .await?;
        }
        self.inner.update_locator(id, locator, precondition).await
    }

    async fn storage_usage(&self, owner: &Address) -> store::Result<u64> {
        self.inner.storage_usage(owner).await
    }

    async fn insert_share(&self, grant: &ShareGrant) -> store::Result<InsertResult> {
        self.inner.insert_share(grant).await
    }

    async fn shares_for(&self, file_id: &FileId) -> store::Result<Vec<ShareGrant>> {
        self.inner.shares_for(file_id).await
    }

    async fn files_shared_with(&self, recipient: &Address) -> store::Result<Vec<FileRecord>> {
        self.inner.files_shared_with(recipient).await
    }

    async fn register_username(&self, username: &str, address: &Address) -> store::Result<InsertResult> {
        self.inner.register_username(username, address).await
    }

    async fn resolve_username(&self, username: &str) -> store::Result<Option<Address>> {
        self.inner.resolve_username(username).await
    }
}

#[tokio::test]
async fn stale_revision_is_a_conflict() {
    let competitor = Locator::parse("https://gateway.irys.xyz/competitor").unwrap();
    let metadata = Arc::new(RacingMetadata {
        inner: MemoryMetadataStore::new(),
        competitor: competitor.clone(),
        raced: AtomicBool::new(false),
    });
    let harness = Harness::with_metadata(metadata, test_config());
    let alice = wallet(1);

    let record = harness.upload(&alice, b"x", &[]).await.unwrap();
    let result = harness
        .service
        .share_file(&alice.address(), &record.id, &[wallet(2).address().to_string()])
        .await;

    match result {
        Err(IryshareError::Conflict {
            expected, actual, ..
        }) => {
            assert_eq!(expected, 1);
            assert_eq!(actual, 2);
        }
        other => panic!("expected a conflict, got {other:?}"),
    }

    // The competing write stands and no grant was recorded.
    let stored = harness.service.get_file(&record.id).await.unwrap().unwrap();
    assert_eq!(stored.locator, competitor);
    assert!(harness.service.shares_for(&record.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn listings_by_owner_and_recipient() {
    let harness = Harness::new();
    let alice = wallet(1);
    let bob = wallet(2);

    let first = harness.upload(&alice, b"1", &[bob.address().as_str()]).await.unwrap();
    let second = harness.upload(&alice, b"22", &[]).await.unwrap();
    let bobs = harness.upload(&bob, b"333", &[]).await.unwrap();

    let owned: Vec<FileId> = harness
        .service
        .files_owned_by(&alice.address())
        .await
        .unwrap()
        .into_iter()
        .map(|f| f.id)
        .collect();
    assert_eq!(owned, vec![first.id, second.id]);

    let shared = harness.service.files_shared_with(&bob.address()).await.unwrap();
    assert_eq!(shared.len(), 1);
    assert_eq!(shared[0].id, first.id);

    assert_eq!(harness.service.storage_usage(&alice.address()).await.unwrap(), 3);
    assert_eq!(harness.service.storage_usage(&bob.address()).await.unwrap(), bobs.size_bytes);
}
