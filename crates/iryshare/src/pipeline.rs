//! The three sharing pipelines.
//!
//! - [`Sharing::publish`]: compile a policy, sign in, encrypt, wrap the
//!   ciphertext in an envelope and upload it.
//! - [`Sharing::add_recipients`]: fetch an envelope, widen its recipient set
//!   and upload a new envelope over the same ciphertext.
//! - [`Sharing::open`]: fetch, sign in, and let the access-control network
//!   decide whether to decrypt.
//!
//! None of them touch the metadata store. Nothing is mutated in place: a
//! failed call leaves no trace, and a successful republish leaves the old
//! envelope fetchable at its old locator.

use std::sync::Arc;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use iryshare_access::{
    request_session, AccessControlNetwork, AccessError, AuthSig, SessionRequest, Signer,
};
use iryshare_core::{merge_recipients, Address, Envelope, Locator, PolicyCompiler, PolicyMode};
use iryshare_store::{ContentStore, StoreError, Tag};

use crate::error::SharingError;

/// `Content-Type` of every envelope upload.
pub const ENVELOPE_CONTENT_TYPE: &str = "application/json";

/// Statement shown in the sign-in message.
pub const SESSION_STATEMENT: &str = "Sign in to Iryshare to encrypt and decrypt shared files.";

/// Upload tag names.
pub mod tags {
    pub const CONTENT_TYPE: &str = "Content-Type";
    pub const APP_NAME: &str = "App-Name";
    pub const OWNER: &str = "Owner";
    pub const RECIPIENT_COUNT: &str = "Recipient-Count";
    pub const ENVELOPE_VERSION: &str = "Envelope-Version";
    pub const FILE_NAME: &str = "File-Name";
}

/// Receives advisory progress percentages.
///
/// Values passed by one call never decrease.
pub trait Progress: Send + Sync {
    fn report(&self, percent: u8);
}

impl<F> Progress for F
where
    F: Fn(u8) + Send + Sync,
{
    fn report(&self, percent: u8) {
        self(percent)
    }
}

/// A [`Progress`] that discards updates.
pub fn no_progress(_percent: u8) {}

/// What to publish.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub bytes: Bytes,
    pub file_name: String,
    pub file_type: String,
    pub recipients: Vec<Address>,
}

/// A decrypted file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedFile {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub file_type: String,
}

/// The publish / republish / open pipelines over explicit collaborator
/// handles.
pub struct Sharing<C, A> {
    content: Arc<C>,
    network: Arc<A>,
    compiler: PolicyCompiler,
    app_name: String,
    app_uri: String,
}

impl<C, A> Sharing<C, A>
where
    C: ContentStore,
    A: AccessControlNetwork,
{
    pub fn new(
        content: Arc<C>,
        network: Arc<A>,
        compiler: PolicyCompiler,
        app_name: impl Into<String>,
        app_uri: impl Into<String>,
    ) -> Self {
        if compiler.mode() == PolicyMode::HasBalance {
            warn!(
                chain = compiler.chain(),
                "balance-check policies admit any signer; recipient lists are not enforced at decrypt time"
            );
        }
        Self {
            content,
            network,
            compiler,
            app_name: app_name.into(),
            app_uri: app_uri.into(),
        }
    }

    pub fn content(&self) -> &Arc<C> {
        &self.content
    }

    pub fn network(&self) -> &Arc<A> {
        &self.network
    }

    pub fn compiler(&self) -> &PolicyCompiler {
        &self.compiler
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Encrypt-and-Publish
    // ─────────────────────────────────────────────────────────────────────────

    /// Encrypt `request.bytes` for the signer plus `request.recipients` and
    /// upload the envelope.
    pub async fn publish(
        &self,
        request: PublishRequest,
        signer: &dyn Signer,
        progress: &dyn Progress,
        cancel: &CancellationToken,
    ) -> Result<Locator, SharingError> {
        let owner = signer.address();
        let policy = self.compiler.compile(&request.recipients, &owner);
        progress.report(10);

        let session = self
            .sign_in(signer, cancel, SharingError::EncryptionFailed)
            .await?;
        progress.report(20);

        let encrypted = self
            .network
            .encrypt(&request.bytes, &policy, &session)
            .await
            .map_err(encryption_error)?;
        progress.report(30);

        let envelope = Envelope::encode(
            encrypted.ciphertext,
            encrypted.data_to_encrypt_hash,
            policy,
            request.file_name,
            request.file_type,
            owner,
            request.recipients,
        );
        progress.report(50);

        let locator = self.upload_envelope(&envelope).await?;
        progress.report(60);

        info!(
            %locator,
            owner = %envelope.owner,
            recipients = envelope.recipients.len(),
            "published envelope"
        );
        progress.report(100);
        Ok(locator)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Resolve-and-Republish
    // ─────────────────────────────────────────────────────────────────────────

    /// Publish a new envelope over the same ciphertext, shared with the
    /// existing recipients plus `new_recipients`.
    ///
    /// The envelope at `current` is left untouched. Returns the new locator;
    /// updating whatever points at `current` is the caller's job. Fails with
    /// [`SharingError::OwnerMismatch`] unless `owner` is the envelope's owner.
    pub async fn add_recipients(
        &self,
        current: &Locator,
        new_recipients: &[Address],
        owner: &Address,
    ) -> Result<Locator, SharingError> {
        let envelope = self.fetch_envelope(current).await?;
        if envelope.owner != *owner {
            return Err(SharingError::OwnerMismatch {
                recorded: envelope.owner,
                claimed: owner.clone(),
            });
        }

        let recipients = merge_recipients(&envelope.recipients, new_recipients, owner);
        let policy = self.compiler.compile(&recipients, owner);
        let republished = envelope.republish(recipients, policy);

        let locator = self.upload_envelope(&republished).await?;

        info!(
            from = %current,
            to = %locator,
            recipients = republished.recipients.len(),
            "republished envelope"
        );
        Ok(locator)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Fetch-and-Decrypt
    // ─────────────────────────────────────────────────────────────────────────

    /// Fetch the envelope at `locator` and ask the network to decrypt it for
    /// the signer.
    ///
    /// No membership check happens here; the network's policy evaluation is
    /// the only gate.
    pub async fn open(
        &self,
        locator: &Locator,
        signer: &dyn Signer,
        progress: &dyn Progress,
        cancel: &CancellationToken,
    ) -> Result<OpenedFile, SharingError> {
        let envelope = self.fetch_envelope(locator).await?;
        progress.report(10);

        let session = self
            .sign_in(signer, cancel, SharingError::DecryptionFailed)
            .await?;
        progress.report(40);

        let bytes = self
            .network
            .decrypt(
                &envelope.ciphertext,
                &envelope.ciphertext_hash,
                &envelope.access_policy,
                &session,
            )
            .await
            .map_err(decryption_error)?;
        progress.report(100);

        debug!(%locator, signer = %session.address, bytes = bytes.len(), "opened envelope");
        Ok(OpenedFile {
            bytes,
            file_name: envelope.original_file_name,
            file_type: envelope.original_file_type,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Steps
    // ─────────────────────────────────────────────────────────────────────────

    /// Wait for the signer, or for `cancel`.
    ///
    /// `unavailable` wraps signer failures other than an explicit rejection.
    async fn sign_in(
        &self,
        signer: &dyn Signer,
        cancel: &CancellationToken,
        unavailable: fn(String) -> SharingError,
    ) -> Result<AuthSig, SharingError> {
        let request = SessionRequest::new(&self.app_name, &self.app_uri, SESSION_STATEMENT);

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(signer = %signer.address(), "signature wait cancelled");
                return Err(SharingError::Cancelled);
            }
            result = request_session(signer, &request) => result,
        };

        result.map_err(|err| match err {
            AccessError::SigningRejected(msg) => SharingError::SigningRejected(msg),
            other => unavailable(other.to_string()),
        })
    }

    async fn fetch_envelope(&self, locator: &Locator) -> Result<Envelope, SharingError> {
        let bytes = self
            .content
            .fetch(locator)
            .await
            .map_err(|err| SharingError::EnvelopeNotFound(fetch_failure(locator, err)))?;

        Envelope::decode(&bytes).map_err(|e| SharingError::MalformedEnvelope(e.to_string()))
    }

    async fn upload_envelope(&self, envelope: &Envelope) -> Result<Locator, SharingError> {
        let upload_tags = [
            Tag::new(tags::CONTENT_TYPE, ENVELOPE_CONTENT_TYPE),
            Tag::new(tags::APP_NAME, &self.app_name),
            Tag::new(tags::OWNER, &envelope.owner),
            Tag::new(tags::RECIPIENT_COUNT, envelope.recipients.len()),
            Tag::new(tags::ENVELOPE_VERSION, envelope.version),
        ];

        let bytes = envelope
            .to_bytes()
            .map_err(|e| SharingError::UploadFailed(e.to_string()))?;
        let id = self
            .content
            .upload(Bytes::from(bytes), &upload_tags)
            .await
            .map_err(|e| SharingError::UploadFailed(e.to_string()))?;

        self.content
            .locator(&id)
            .map_err(|e| SharingError::UploadFailed(e.to_string()))
    }
}

fn fetch_failure(locator: &Locator, err: StoreError) -> String {
    match err {
        StoreError::NotFound(_) => locator.to_string(),
        other => format!("{locator}: {other}"),
    }
}

fn encryption_error(err: AccessError) -> SharingError {
    match err {
        AccessError::SigningRejected(msg) => SharingError::SigningRejected(msg),
        other => SharingError::EncryptionFailed(other.to_string()),
    }
}

fn decryption_error(err: AccessError) -> SharingError {
    match err {
        AccessError::AccessDenied(msg) | AccessError::InvalidSession(msg) => {
            SharingError::AccessDenied(msg)
        }
        AccessError::SigningRejected(msg) => SharingError::SigningRejected(msg),
        other => SharingError::DecryptionFailed(other.to_string()),
    }
}
