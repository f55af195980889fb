//! The sharing service.
//!
//! [`Iryshare`] drives the pipelines and keeps the metadata store in step
//! with them: a file record per upload, its current locator, and one share
//! grant per recipient.

use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use iryshare_access::{AccessControlNetwork, Signer};
use iryshare_core::{Address, Locator};
use iryshare_store::records::now;
use iryshare_store::{
    normalize_username, ContentStore, FileId, FileRecord, HttpContentStore, InsertResult,
    MetadataStore, NewFileRecord, Precondition, ShareGrant, Tag,
};

use crate::config::IryshareConfig;
use crate::error::{IryshareError, Result, SharingError};
use crate::pipeline::{tags, OpenedFile, Progress, PublishRequest, Sharing};

/// A file to upload.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub bytes: Bytes,
    pub file_name: String,
    pub content_type: String,
    /// Addresses or `@username` references.
    pub recipients: Vec<String>,
    pub encrypt: bool,
    pub is_public: bool,
}

/// A recipient reference resolved to an address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub address: Address,
    /// `@username` when the reference was a username.
    pub label: Option<String>,
}

/// Result of [`Iryshare::share_file`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareOutcome {
    /// The file's locator after the share.
    pub locator: Locator,
    pub revision: u64,
    /// Recipients that did not hold a grant before.
    pub added: Vec<Address>,
}

/// The sharing service over explicit collaborator handles.
pub struct Iryshare<C, A, M> {
    sharing: Sharing<C, A>,
    metadata: Arc<M>,
    config: IryshareConfig,
}

impl<A, M> Iryshare<HttpContentStore, A, M>
where
    A: AccessControlNetwork,
    M: MetadataStore,
{
    /// Create a service that talks to the configured gateway and upload
    /// endpoint over HTTP.
    pub fn connect(network: Arc<A>, metadata: Arc<M>, config: IryshareConfig) -> Result<Self> {
        let content = HttpContentStore::new(
            config.gateway_url.clone(),
            config.upload_url.clone(),
            config.http_timeout(),
        )?;
        info!(gateway = %config.gateway_url, upload = %config.upload_url, "connected content store");
        Ok(Self::new(Arc::new(content), network, metadata, config))
    }
}

impl<C, A, M> Iryshare<C, A, M>
where
    C: ContentStore,
    A: AccessControlNetwork,
    M: MetadataStore,
{
    /// Create a service instance.
    pub fn new(content: Arc<C>, network: Arc<A>, metadata: Arc<M>, config: IryshareConfig) -> Self {
        let sharing = Sharing::new(
            content,
            network,
            config.policy_compiler(),
            config.app_name.clone(),
            config.app_uri.clone(),
        );
        Self {
            sharing,
            metadata,
            config,
        }
    }

    /// The underlying pipelines.
    pub fn sharing(&self) -> &Sharing<C, A> {
        &self.sharing
    }

    pub fn metadata(&self) -> &M {
        &self.metadata
    }

    pub fn config(&self) -> &IryshareConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Recipients
    // ─────────────────────────────────────────────────────────────────────────

    /// Register `username` for `address`.
    pub async fn register_username(&self, username: &str, address: &Address) -> Result<()> {
        if self.metadata.register_username(username, address).await? == InsertResult::Inserted {
            info!(username, %address, "registered username");
        }
        Ok(())
    }

    /// Resolve an address, `@username` or bare username.
    pub async fn resolve_recipient(&self, reference: &str) -> Result<Recipient> {
        let reference = reference.trim();

        if reference.starts_with("0x") || reference.starts_with("0X") {
            let address = Address::parse(reference)
                .map_err(|e| IryshareError::InvalidAddress(e.to_string()))?;
            return Ok(Recipient {
                address,
                label: None,
            });
        }

        let username = normalize_username(reference)
            .map_err(|_| IryshareError::UnknownRecipient(reference.to_string()))?;
        let address = self
            .metadata
            .resolve_username(&username)
            .await?
            .ok_or_else(|| IryshareError::UnknownRecipient(reference.to_string()))?;

        Ok(Recipient {
            address,
            label: Some(format!("@{username}")),
        })
    }

    /// Resolve references, dropping duplicates and `owner`.
    async fn resolve_all(&self, references: &[String], owner: &Address) -> Result<Vec<Recipient>> {
        let mut resolved: Vec<Recipient> = Vec::with_capacity(references.len());
        for reference in references {
            let recipient = self.resolve_recipient(reference).await?;
            if &recipient.address == owner {
                debug!(%owner, "dropping self-share");
                continue;
            }
            if resolved.iter().all(|r| r.address != recipient.address) {
                resolved.push(recipient);
            }
        }
        Ok(resolved)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Upload
    // ─────────────────────────────────────────────────────────────────────────

    /// Upload a file for the signer and share it with `request.recipients`.
    ///
    /// Nothing is recorded unless the upload succeeds.
    pub async fn upload_file(
        &self,
        signer: &dyn Signer,
        request: UploadRequest,
        progress: &dyn Progress,
        cancel: &CancellationToken,
    ) -> Result<FileRecord> {
        let owner = signer.address();
        let recipients = self.resolve_all(&request.recipients, &owner).await?;

        let size_bytes = request.bytes.len() as u64;
        self.check_quota(&owner, size_bytes).await?;

        let locator = if request.encrypt {
            let publish = PublishRequest {
                bytes: request.bytes,
                file_name: request.file_name.clone(),
                file_type: request.content_type.clone(),
                recipients: recipients.iter().map(|r| r.address.clone()).collect(),
            };
            self.sharing.publish(publish, signer, progress, cancel).await?
        } else {
            self.upload_plain(&owner, &request, progress).await?
        };

        let record = self
            .metadata
            .insert_file(NewFileRecord {
                owner: owner.clone(),
                file_name: request.file_name,
                content_type: request.content_type,
                size_bytes,
                locator,
                encrypted: request.encrypt,
                is_public: request.is_public,
            })
            .await?;

        self.grant_all(&record.id, &recipients).await?;

        info!(
            file_id = %record.id,
            %owner,
            locator = %record.locator,
            recipients = recipients.len(),
            encrypted = record.encrypted,
            "uploaded file"
        );
        Ok(record)
    }

    async fn check_quota(&self, owner: &Address, requested: u64) -> Result<()> {
        let Some(quota) = self.config.storage_quota_bytes else {
            return Ok(());
        };
        let used = self.metadata.storage_usage(owner).await?;
        if used.saturating_add(requested) > quota {
            warn!(%owner, used, requested, quota, "storage quota exceeded");
            return Err(IryshareError::QuotaExceeded {
                used,
                requested,
                quota,
            });
        }
        Ok(())
    }

    async fn upload_plain(
        &self,
        owner: &Address,
        request: &UploadRequest,
        progress: &dyn Progress,
    ) -> Result<Locator> {
        let content = self.sharing.content();
        let upload_tags = [
            Tag::new(tags::CONTENT_TYPE, &request.content_type),
            Tag::new(tags::APP_NAME, self.sharing.app_name()),
            Tag::new(tags::OWNER, owner),
            Tag::new(tags::FILE_NAME, &request.file_name),
        ];
        progress.report(10);

        let id = content
            .upload(request.bytes.clone(), &upload_tags)
            .await
            .map_err(|e| SharingError::UploadFailed(e.to_string()))?;
        let locator = content
            .locator(&id)
            .map_err(|e| SharingError::UploadFailed(e.to_string()))?;

        progress.report(100);
        Ok(locator)
    }

    async fn grant_all(&self, file_id: &FileId, recipients: &[Recipient]) -> Result<()> {
        for recipient in recipients {
            let grant = ShareGrant {
                file_id: *file_id,
                recipient: recipient.address.clone(),
                recipient_label: recipient.label.clone(),
                created_at: now(),
            };
            self.metadata.insert_share(&grant).await?;
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Share
    // ─────────────────────────────────────────────────────────────────────────

    /// Share an existing file with more recipients.
    ///
    /// Encrypted files get a new envelope and the file's locator moves to it,
    /// conditional on the revision read at the start. Recipients that already
    /// hold a grant are carried over, not re-added.
    pub async fn share_file(
        &self,
        owner: &Address,
        file_id: &FileId,
        recipients: &[String],
    ) -> Result<ShareOutcome> {
        let record = self.file(file_id).await?;
        if &record.owner != owner {
            return Err(IryshareError::NotOwner {
                file_id: *file_id,
                caller: owner.clone(),
            });
        }

        let requested = self.resolve_all(recipients, owner).await?;
        let existing: Vec<Address> = self
            .metadata
            .shares_for(file_id)
            .await?
            .into_iter()
            .map(|g| g.recipient)
            .collect();
        let added: Vec<Recipient> = requested
            .into_iter()
            .filter(|r| !existing.contains(&r.address))
            .collect();

        if added.is_empty() {
            debug!(%file_id, "no new recipients");
            return Ok(ShareOutcome {
                locator: record.locator,
                revision: record.revision,
                added: Vec::new(),
            });
        }

        let (locator, revision) = if record.encrypted {
            let additions: Vec<Address> = added.iter().map(|r| r.address.clone()).collect();
            let new_locator = self
                .sharing
                .add_recipients(&record.locator, &additions, owner)
                .await?;

            let updated = self
                .metadata
                .update_locator(file_id, &new_locator, Precondition::Revision(record.revision))
                .await
                .map_err(IryshareError::from_store)?;
            (updated.locator, updated.revision)
        } else {
            (record.locator, record.revision)
        };

        self.grant_all(file_id, &added).await?;

        info!(
            %file_id,
            %owner,
            %locator,
            added = added.len(),
            "shared file"
        );
        Ok(ShareOutcome {
            locator,
            revision,
            added: added.into_iter().map(|r| r.address).collect(),
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Open
    // ─────────────────────────────────────────────────────────────────────────

    /// Fetch a file for the signer, decrypting it when encrypted.
    ///
    /// A locator the gateway does not serve yet is retried with exponential
    /// backoff; every other failure is returned at once.
    pub async fn open_file(
        &self,
        signer: &dyn Signer,
        file_id: &FileId,
        progress: &dyn Progress,
        cancel: &CancellationToken,
    ) -> Result<OpenedFile> {
        let record = self.file(file_id).await?;

        if record.encrypted {
            let opened = self
                .with_fetch_retry(&record.locator, cancel, || {
                    self.sharing.open(&record.locator, signer, progress, cancel)
                })
                .await?;
            return Ok(opened);
        }

        let content = self.sharing.content();
        let locator = &record.locator;
        let bytes = self
            .with_fetch_retry(locator, cancel, || async move {
                content
                    .fetch(locator)
                    .await
                    .map_err(|e| SharingError::EnvelopeNotFound(e.to_string()))
            })
            .await?;
        progress.report(100);

        Ok(OpenedFile {
            bytes: bytes.to_vec(),
            file_name: record.file_name,
            file_type: record.content_type,
        })
    }

    async fn with_fetch_retry<T, F, Fut>(
        &self,
        locator: &Locator,
        cancel: &CancellationToken,
        mut op: F,
    ) -> std::result::Result<T, SharingError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, SharingError>>,
    {
        let retry = self.config.fetch;
        let attempts = retry.attempts.max(1);
        let mut attempt = 1;

        loop {
            match op().await {
                Err(SharingError::EnvelopeNotFound(reason)) if attempt < attempts => {
                    let delay = retry.delay(attempt);
                    debug!(%locator, attempt, ?delay, %reason, "envelope not available yet, retrying");
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(SharingError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    async fn file(&self, file_id: &FileId) -> Result<FileRecord> {
        self.metadata
            .get_file(file_id)
            .await?
            .ok_or(IryshareError::FileNotFound(*file_id))
    }

    /// Get a file record.
    pub async fn get_file(&self, file_id: &FileId) -> Result<Option<FileRecord>> {
        Ok(self.metadata.get_file(file_id).await?)
    }

    /// Files owned by `owner`.
    pub async fn files_owned_by(&self, owner: &Address) -> Result<Vec<FileRecord>> {
        Ok(self.metadata.files_owned_by(owner).await?)
    }

    /// Files shared with `recipient`.
    pub async fn files_shared_with(&self, recipient: &Address) -> Result<Vec<FileRecord>> {
        Ok(self.metadata.files_shared_with(recipient).await?)
    }

    /// Grants on a file.
    pub async fn shares_for(&self, file_id: &FileId) -> Result<Vec<ShareGrant>> {
        Ok(self.metadata.shares_for(file_id).await?)
    }

    /// Bytes stored by `owner`.
    pub async fn storage_usage(&self, owner: &Address) -> Result<u64> {
        Ok(self.metadata.storage_usage(owner).await?)
    }
}
