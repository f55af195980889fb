//! Behaviour shared by every MetadataStore backend.

use iryshare_core::{Address, Locator};
use iryshare_store::records::now;
use iryshare_store::{
    FileId, InsertResult, MemoryMetadataStore, MetadataStore, NewFileRecord, Precondition,
    ShareGrant, SqliteMetadataStore, StoreError,
};

fn addr(s: &str) -> Address {
    Address::parse(s).unwrap()
}

fn locator(id: &str) -> Locator {
    Locator::parse(&format!("https://gateway.irys.xyz/{id}")).unwrap()
}

fn new_file(owner: &str, name: &str, size: u64) -> NewFileRecord {
    NewFileRecord {
        owner: addr(owner),
        file_name: name.to_string(),
        content_type: "text/plain".to_string(),
        size_bytes: size,
        locator: locator("v1"),
        encrypted: true,
        is_public: false,
    }
}

fn grant(file_id: FileId, recipient: &str) -> ShareGrant {
    ShareGrant {
        file_id,
        recipient: addr(recipient),
        recipient_label: Some(format!("@{}", &recipient[2..])),
        created_at: now(),
    }
}

async fn files_roundtrip(store: &dyn MetadataStore) {
    let a = store.insert_file(new_file("0xaaa", "a.txt", 3)).await.unwrap();
    let b = store.insert_file(new_file("0xAAA", "b.txt", 4)).await.unwrap();
    store.insert_file(new_file("0xbbb", "c.txt", 5)).await.unwrap();

    assert_eq!(store.get_file(&a.id).await.unwrap(), Some(a.clone()));
    assert_eq!(store.get_file(&FileId::new()).await.unwrap(), None);

    let owned: Vec<_> = store
        .files_owned_by(&addr("0xaaa"))
        .await
        .unwrap()
        .into_iter()
        .map(|f| f.file_name)
        .collect();
    assert_eq!(owned, vec!["a.txt", "b.txt"]);

    assert_eq!(store.storage_usage(&addr("0xaaa")).await.unwrap(), 7);
    assert_eq!(store.storage_usage(&addr("0xccc")).await.unwrap(), 0);
    assert_ne!(a.id, b.id);
}

async fn conditional_updates(store: &dyn MetadataStore) {
    let file = store.insert_file(new_file("0xaaa", "a.txt", 1)).await.unwrap();
    assert_eq!(file.revision, 1);

    let v2 = store
        .update_locator(&file.id, &locator("v2"), Precondition::Revision(1))
        .await
        .unwrap();
    assert_eq!(v2.revision, 2);
    assert_eq!(v2.locator, locator("v2"));

    // A writer that read revision 1 loses.
    let stale = store
        .update_locator(&file.id, &locator("v3"), Precondition::Revision(1))
        .await;
    assert!(matches!(
        stale,
        Err(StoreError::Conflict {
            expected: 1,
            actual: 2,
            ..
        })
    ));
    assert_eq!(
        store.get_file(&file.id).await.unwrap().unwrap().locator,
        locator("v2")
    );

    // Unconditional updates always land.
    let v3 = store
        .update_locator(&file.id, &locator("v3"), Precondition::Any)
        .await
        .unwrap();
    assert_eq!(v3.revision, 3);

    let missing = store
        .update_locator(&FileId::new(), &locator("v9"), Precondition::Any)
        .await;
    assert!(matches!(missing, Err(StoreError::NotFound(_))));
}

async fn shares(store: &dyn MetadataStore) {
    let file = store.insert_file(new_file("0xaaa", "a.txt", 1)).await.unwrap();
    let other = store.insert_file(new_file("0xaaa", "b.txt", 1)).await.unwrap();

    assert_eq!(
        store.insert_share(&grant(file.id, "0xbbb")).await.unwrap(),
        InsertResult::Inserted
    );
    assert_eq!(
        store.insert_share(&grant(file.id, "0xccc")).await.unwrap(),
        InsertResult::Inserted
    );
    assert_eq!(
        store.insert_share(&grant(file.id, "0xbbb")).await.unwrap(),
        InsertResult::AlreadyExists
    );
    store.insert_share(&grant(other.id, "0xbbb")).await.unwrap();

    let recipients: Vec<_> = store
        .shares_for(&file.id)
        .await
        .unwrap()
        .into_iter()
        .map(|g| g.recipient)
        .collect();
    assert_eq!(recipients, vec![addr("0xbbb"), addr("0xccc")]);

    let shared: Vec<_> = store
        .files_shared_with(&addr("0xbbb"))
        .await
        .unwrap()
        .into_iter()
        .map(|f| f.id)
        .collect();
    assert_eq!(shared, vec![file.id, other.id]);
    assert!(store
        .files_shared_with(&addr("0xddd"))
        .await
        .unwrap()
        .is_empty());
}

async fn usernames(store: &dyn MetadataStore) {
    assert_eq!(
        store.register_username("Alice", &addr("0xaaa")).await.unwrap(),
        InsertResult::Inserted
    );
    assert_eq!(
        store.register_username("@alice", &addr("0xAAA")).await.unwrap(),
        InsertResult::AlreadyExists
    );
    assert!(matches!(
        store.register_username("alice", &addr("0xbbb")).await,
        Err(StoreError::UsernameTaken(_))
    ));

    assert_eq!(
        store.resolve_username("@ALICE").await.unwrap(),
        Some(addr("0xaaa"))
    );
    assert_eq!(store.resolve_username("bob").await.unwrap(), None);
    assert!(store.resolve_username("not valid").await.is_err());
}

macro_rules! conformance {
    ($name:ident, $make:expr) => {
        mod $name {
            use super::*;

            #[tokio::test]
            async fn test_files_roundtrip() {
                files_roundtrip(&$make).await;
            }

            #[tokio::test]
            async fn test_conditional_updates() {
                conditional_updates(&$make).await;
            }

            #[tokio::test]
            async fn test_shares() {
                shares(&$make).await;
            }

            #[tokio::test]
            async fn test_usernames() {
                usernames(&$make).await;
            }
        }
    };
}

conformance!(memory, MemoryMetadataStore::new());
conformance!(sqlite, SqliteMetadataStore::open_memory().unwrap());

#[tokio::test]
async fn test_sqlite_file_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteMetadataStore::open(dir.path().join("meta.db")).unwrap();
    files_roundtrip(&store).await;
    shares(&store).await;
}
