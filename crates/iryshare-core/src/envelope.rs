//! The envelope: the unit stored at a locator.
//!
//! An envelope carries the ciphertext, the integrity hash the access-control
//! network binds it to, the access policy, and the original file metadata.
//! Envelopes are immutable once published. Changing who may decrypt a file
//! produces a *new* envelope (see [`Envelope::republish`]) that reuses the
//! ciphertext verbatim; the old one stays retrievable at its old locator.
//!
//! ## Wire Format
//!
//! ```text
//! {
//!   "ciphertext": string,
//!   "dataToEncryptHash": string,
//!   "accessControlConditions": object[],
//!   "originalFileName": string,
//!   "originalFileType": string,
//!   "ownerAddress": string,
//!   "recipientAddresses": string[],
//!   "encryptedAt": ISO-8601,
//!   "updatedAt"?: ISO-8601,
//!   "version": "1.0" | "1.1"
//! }
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::address::{normalize_recipients, Address};
use crate::error::{CoreError, Result};
use crate::policy::AccessPolicy;

/// Fields that must be present for an envelope to be usable at all.
const REQUIRED_FIELDS: [&str; 3] = ["ciphertext", "dataToEncryptHash", "accessControlConditions"];

/// Envelope format version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FormatVersion {
    /// Written by the initial publish.
    V1_0,
    /// Written by every republish.
    V1_1,
}

impl FormatVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormatVersion::V1_0 => "1.0",
            FormatVersion::V1_1 => "1.1",
        }
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub ciphertext: String,
    pub ciphertext_hash: String,
    pub access_policy: AccessPolicy,
    pub original_file_name: String,
    pub original_file_type: String,
    pub owner: Address,
    /// Lower-cased, deduplicated, owner excluded.
    pub recipients: Vec<Address>,
    pub encrypted_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub version: FormatVersion,
}

/// Body shared by every version. The version itself is the tag.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnvelopeBody {
    ciphertext: String,
    data_to_encrypt_hash: String,
    access_control_conditions: AccessPolicy,
    #[serde(default)]
    original_file_name: String,
    #[serde(default)]
    original_file_type: String,
    owner_address: Address,
    #[serde(default)]
    recipient_addresses: Vec<Address>,
    encrypted_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "version")]
enum WireEnvelope {
    #[serde(rename = "1.0")]
    V1_0(EnvelopeBody),
    #[serde(rename = "1.1")]
    V1_1(EnvelopeBody),
}

impl Envelope {
    /// Assemble a fresh envelope, stamped `1.0` and `encryptedAt = now`.
    pub fn encode(
        ciphertext: impl Into<String>,
        ciphertext_hash: impl Into<String>,
        policy: AccessPolicy,
        file_name: impl Into<String>,
        file_type: impl Into<String>,
        owner: Address,
        recipients: impl IntoIterator<Item = Address>,
    ) -> Self {
        let recipients = normalize_recipients(recipients, &owner);
        Self {
            ciphertext: ciphertext.into(),
            ciphertext_hash: ciphertext_hash.into(),
            access_policy: policy,
            original_file_name: file_name.into(),
            original_file_type: file_type.into(),
            owner,
            recipients,
            encrypted_at: Utc::now(),
            updated_at: None,
            version: FormatVersion::V1_0,
        }
    }

    /// A new envelope over the same ciphertext with a replacement policy and
    /// recipient list.
    ///
    /// `ciphertext`, `ciphertext_hash`, file metadata, owner and
    /// `encrypted_at` carry over unchanged.
    pub fn republish(&self, recipients: impl IntoIterator<Item = Address>, policy: AccessPolicy) -> Self {
        Self {
            access_policy: policy,
            recipients: normalize_recipients(recipients, &self.owner),
            updated_at: Some(Utc::now()),
            version: FormatVersion::V1_1,
            ..self.clone()
        }
    }

    /// Serialise to the JSON wire format.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let body = EnvelopeBody {
            ciphertext: self.ciphertext.clone(),
            data_to_encrypt_hash: self.ciphertext_hash.clone(),
            access_control_conditions: self.access_policy.clone(),
            original_file_name: self.original_file_name.clone(),
            original_file_type: self.original_file_type.clone(),
            owner_address: self.owner.clone(),
            recipient_addresses: self.recipients.clone(),
            encrypted_at: self.encrypted_at,
            updated_at: self.updated_at,
        };
        let wire = match self.version {
            FormatVersion::V1_0 => WireEnvelope::V1_0(body),
            FormatVersion::V1_1 => WireEnvelope::V1_1(body),
        };
        serde_json::to_vec(&wire).map_err(|e| CoreError::Serialization(e.to_string()))
    }

    /// Parse and validate an envelope from wire bytes.
    ///
    /// Fails with [`CoreError::MalformedEnvelope`] when the input is not a
    /// JSON object, a required field is missing or empty, the version is
    /// unknown, or the access policy is structurally invalid. A missing
    /// `version` is read as `1.0`. The recipient list is normalised the same
    /// way [`Envelope::encode`] does it.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let malformed = CoreError::MalformedEnvelope;

        let mut value: serde_json::Value =
            serde_json::from_slice(bytes).map_err(|e| malformed(e.to_string()))?;
        let object = value
            .as_object_mut()
            .ok_or_else(|| malformed("expected a JSON object".to_string()))?;

        for field in REQUIRED_FIELDS {
            if !object.contains_key(field) {
                return Err(malformed(format!("missing field `{field}`")));
            }
        }
        object
            .entry("version")
            .or_insert_with(|| serde_json::Value::String(FormatVersion::V1_0.as_str().to_string()));

        let wire: WireEnvelope = serde_json::from_value(value).map_err(|e| malformed(e.to_string()))?;
        let (version, body) = match wire {
            WireEnvelope::V1_0(body) => (FormatVersion::V1_0, body),
            WireEnvelope::V1_1(body) => (FormatVersion::V1_1, body),
        };

        if body.ciphertext.is_empty() {
            return Err(malformed("`ciphertext` is empty".to_string()));
        }
        if body.data_to_encrypt_hash.is_empty() {
            return Err(malformed("`dataToEncryptHash` is empty".to_string()));
        }
        body.access_control_conditions
            .validate()
            .map_err(|e| malformed(e.to_string()))?;

        let recipients = normalize_recipients(body.recipient_addresses, &body.owner_address);
        Ok(Self {
            ciphertext: body.ciphertext,
            ciphertext_hash: body.data_to_encrypt_hash,
            access_policy: body.access_control_conditions,
            original_file_name: body.original_file_name,
            original_file_type: body.original_file_type,
            owner: body.owner_address,
            recipients,
            encrypted_at: body.encrypted_at,
            updated_at: body.updated_at,
            version,
        })
    }

    /// Latest modification time: `updatedAt` if republished, else `encryptedAt`.
    pub fn last_modified(&self) -> DateTime<Utc> {
        self.updated_at.unwrap_or(self.encrypted_at)
    }
}
