//! Property tests for the content-addressed memory gateway.

use bytes::Bytes;
use proptest::prelude::*;

use iryshare_core::Locator;
use iryshare_store::{content_id, tag_value, ContentStore, MemoryContentStore, Tag};

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(future)
}

proptest! {
    #[test]
    fn locator_resolves_to_uploaded_bytes(data in prop::collection::vec(any::<u8>(), 0..1024)) {
        let store = MemoryContentStore::new();
        let (locator, fetched) = block_on(async {
            let id = store.upload(Bytes::from(data.clone()), &[]).await.unwrap();
            let locator = store.locator(&id).unwrap();
            let fetched = store.fetch(&locator).await.unwrap();
            (locator, fetched)
        });

        prop_assert_eq!(locator.object_id(), &content_id(&data));
        prop_assert_eq!(Locator::parse(locator.as_str()).unwrap(), locator);
        prop_assert_eq!(fetched.as_ref(), data.as_slice());
    }

    #[test]
    fn reupload_keeps_first_tags(
        data in prop::collection::vec(any::<u8>(), 0..256),
        first in "[a-z]{1,8}",
        second in "[a-z]{1,8}",
    ) {
        let store = MemoryContentStore::new();
        let (a, b) = block_on(async {
            let a = store.upload(Bytes::from(data.clone()), &[Tag::new("Owner", &first)]).await.unwrap();
            let b = store.upload(Bytes::from(data.clone()), &[Tag::new("Owner", &second)]).await.unwrap();
            (a, b)
        });

        prop_assert_eq!(&a, &b);
        prop_assert_eq!(store.len(), 1);
        let tags = store.tags(&a).unwrap();
        prop_assert_eq!(tag_value(&tags, "Owner"), Some(first.as_str()));
    }

    #[test]
    fn distinct_payloads_get_distinct_ids(
        left in prop::collection::vec(any::<u8>(), 0..128),
        right in prop::collection::vec(any::<u8>(), 0..128),
    ) {
        prop_assume!(left != right);
        prop_assert_ne!(content_id(&left), content_id(&right));
    }
}
