//! Property tests over the pipelines.

use std::collections::BTreeSet;
use std::sync::Arc;

use bytes::Bytes;
use proptest::prelude::*;
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

use iryshare::access::{LocalAccessNode, Signer};
use iryshare::core::{Address, Envelope, PolicyCompiler, PolicyMode};
use iryshare::store::{ContentStore, MemoryContentStore};
use iryshare::{no_progress, PublishRequest, Sharing};
use iryshare_testkit::generators::{content_type, file_name, payload, recipients, wallet};

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn sharing(mode: PolicyMode) -> Sharing<MemoryContentStore, LocalAccessNode> {
    Sharing::new(
        Arc::new(MemoryContentStore::new()),
        Arc::new(LocalAccessNode::generate()),
        PolicyCompiler::new(mode),
        "iryshare-test",
        "https://iryshare.test",
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn owner_always_reads_back_what_they_published(
        owner in wallet(),
        bytes in payload(2048),
        name in file_name(),
        kind in content_type(),
        members in any::<bool>(),
    ) {
        let mode = if members { PolicyMode::Members } else { PolicyMode::HasBalance };
        let sharing = sharing(mode);

        let opened = runtime().block_on(async {
            let request = PublishRequest {
                bytes: Bytes::from(bytes.clone()),
                file_name: name.clone(),
                file_type: kind.clone(),
                recipients: Vec::new(),
            };
            let locator = sharing
                .publish(request, &owner, &no_progress, &CancellationToken::new())
                .await
                .unwrap();
            sharing
                .open(&locator, &owner, &no_progress, &CancellationToken::new())
                .await
                .unwrap()
        });

        prop_assert_eq!(opened.bytes, bytes);
        prop_assert_eq!(opened.file_name, name);
        prop_assert_eq!(opened.file_type, kind);
    }

    #[test]
    fn republished_recipients_are_the_union(
        owner in wallet(),
        initial in recipients(4),
        added in recipients(4),
    ) {
        let sharing = sharing(PolicyMode::Members);
        let owner_address = owner.address();

        let (first, second) = runtime().block_on(async {
            let request = PublishRequest {
                bytes: Bytes::from_static(b"payload"),
                file_name: "p.bin".to_string(),
                file_type: "application/octet-stream".to_string(),
                recipients: initial.clone(),
            };
            let first = sharing
                .publish(request, &owner, &no_progress, &CancellationToken::new())
                .await
                .unwrap();
            let second = sharing
                .add_recipients(&first, &added, &owner_address)
                .await
                .unwrap();
            let fetch = |locator| {
                let content = sharing.content().clone();
                async move { Envelope::decode(&content.fetch(&locator).await.unwrap()).unwrap() }
            };
            (fetch(first).await, fetch(second).await)
        });

        let expected: BTreeSet<Address> = initial
            .iter()
            .chain(added.iter())
            .filter(|a| **a != owner_address)
            .cloned()
            .collect();
        let actual: BTreeSet<Address> = second.recipients.iter().cloned().collect();

        prop_assert_eq!(actual, expected);
        prop_assert_eq!(second.recipients.len(), second.recipients.iter().collect::<BTreeSet<_>>().len());
        prop_assert_eq!(&second.ciphertext, &first.ciphertext);
        prop_assert_eq!(&second.ciphertext_hash, &first.ciphertext_hash);
    }
}
