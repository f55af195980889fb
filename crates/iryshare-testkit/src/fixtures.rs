//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use iryshare::{
    no_progress, FetchRetryConfig, FileId, FileRecord, Iryshare, IryshareConfig, OpenedFile,
    PolicyMode, UploadRequest,
};
use iryshare_access::{AccessError, AuthSig, LocalAccessNode, LocalWallet, Signer};
use iryshare_core::Address;
use iryshare_store::{MemoryContentStore, MemoryMetadataStore, MetadataStore};

/// A deterministic wallet. The same `n` always gives the same address.
pub fn wallet(n: u8) -> LocalWallet {
    let mut seed = [0u8; 32];
    seed[0] = n;
    seed[31] = 0xa5;
    LocalWallet::from_seed(seed)
}

/// `count` distinct deterministic wallets.
pub fn wallets(count: usize) -> Vec<LocalWallet> {
    (0..count).map(|i| wallet(i as u8)).collect()
}

/// A signer whose holder declines every prompt.
#[derive(Debug)]
pub struct DecliningSigner {
    address: Address,
}

impl DecliningSigner {
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    /// Decline on behalf of `wallet`.
    pub fn of(wallet: &LocalWallet) -> Self {
        Self::new(wallet.address())
    }
}

#[async_trait]
impl Signer for DecliningSigner {
    fn address(&self) -> Address {
        self.address.clone()
    }

    async fn sign_message(&self, _message: &str) -> Result<AuthSig, AccessError> {
        Err(AccessError::SigningRejected("user rejected the request".to_string()))
    }
}

/// A signer whose prompt is never answered.
#[derive(Debug)]
pub struct PendingSigner {
    address: Address,
}

impl PendingSigner {
    pub fn of(wallet: &LocalWallet) -> Self {
        Self {
            address: wallet.address(),
        }
    }
}

#[async_trait]
impl Signer for PendingSigner {
    fn address(&self) -> Address {
        self.address.clone()
    }

    async fn sign_message(&self, _message: &str) -> Result<AuthSig, AccessError> {
        std::future::pending().await
    }
}

/// Configuration tuned for tests: the default policy mode and a fast fetch
/// backoff.
pub fn test_config() -> IryshareConfig {
    IryshareConfig {
        fetch: FetchRetryConfig {
            attempts: 4,
            backoff_ms: 1,
        },
        ..IryshareConfig::default()
    }
}

/// [`test_config`] with membership policies.
pub fn members_config() -> IryshareConfig {
    IryshareConfig {
        policy_mode: PolicyMode::Members,
        ..test_config()
    }
}

/// Service over in-memory collaborators.
pub type MemoryIryshare<M = MemoryMetadataStore> = Iryshare<MemoryContentStore, LocalAccessNode, M>;

/// A service plus direct handles on its collaborators.
pub struct Harness<M = MemoryMetadataStore> {
    pub service: MemoryIryshare<M>,
    pub content: Arc<MemoryContentStore>,
    pub network: Arc<LocalAccessNode>,
    pub metadata: Arc<M>,
}

impl Harness<MemoryMetadataStore> {
    /// In-memory everything, default policy mode.
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    /// In-memory everything with membership policies.
    pub fn members() -> Self {
        Self::with_config(members_config())
    }

    pub fn with_config(config: IryshareConfig) -> Self {
        Self::with_metadata(Arc::new(MemoryMetadataStore::new()), config)
    }
}

impl Default for Harness<MemoryMetadataStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: MetadataStore> Harness<M> {
    /// In-memory content and network over the given metadata store.
    pub fn with_metadata(metadata: Arc<M>, config: IryshareConfig) -> Self {
        let content = Arc::new(MemoryContentStore::new());
        let network = Arc::new(LocalAccessNode::generate());
        let service = Iryshare::new(content.clone(), network.clone(), metadata.clone(), config);
        Self {
            service,
            content,
            network,
            metadata,
        }
    }

    /// Upload `bytes` as `file.txt`, encrypted, shared with `recipients`.
    pub async fn upload(
        &self,
        signer: &dyn Signer,
        bytes: &[u8],
        recipients: &[&str],
    ) -> iryshare::Result<FileRecord> {
        self.service
            .upload_file(
                signer,
                text_upload(bytes, recipients),
                &no_progress,
                &CancellationToken::new(),
            )
            .await
    }

    /// Open a file without progress reporting or cancellation.
    pub async fn open(&self, signer: &dyn Signer, file_id: &FileId) -> iryshare::Result<OpenedFile> {
        self.service
            .open_file(signer, file_id, &no_progress, &CancellationToken::new())
            .await
    }
}

/// An encrypted, private `text/plain` upload named `file.txt`.
pub fn text_upload(bytes: &[u8], recipients: &[&str]) -> UploadRequest {
    UploadRequest {
        bytes: Bytes::copy_from_slice(bytes),
        file_name: "file.txt".to_string(),
        content_type: "text/plain".to_string(),
        recipients: recipients.iter().map(|r| r.to_string()).collect(),
        encrypt: true,
        is_public: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallets_are_deterministic() {
        assert_eq!(wallet(1).address(), wallet(1).address());
        assert_ne!(wallet(1).address(), wallet(2).address());

        let all = wallets(5);
        assert_eq!(all.len(), 5);
        assert_eq!(all[3].address(), wallet(3).address());
    }

    #[tokio::test]
    async fn test_declining_signer() {
        let signer = DecliningSigner::of(&wallet(1));
        assert_eq!(signer.address(), wallet(1).address());
        assert!(matches!(
            signer.sign_message("hello").await,
            Err(AccessError::SigningRejected(_))
        ));
    }

    #[tokio::test]
    async fn test_harness_roundtrip() {
        let harness = Harness::new();
        let owner = wallet(1);

        let record = harness.upload(&owner, b"hello", &[]).await.unwrap();
        let opened = harness.open(&owner, &record.id).await.unwrap();

        assert_eq!(opened.bytes, b"hello");
        assert_eq!(opened.file_name, "file.txt");
        assert_eq!(harness.content.len(), 1);
    }
}
