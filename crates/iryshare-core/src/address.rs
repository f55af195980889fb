//! Wallet addresses.
//!
//! An [`Address`] is the identity a wallet signs with. Addresses are compared
//! case-insensitively, so parsing lower-cases them once and every comparison
//! after that is a plain string comparison.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// A wallet identity: `0x` followed by hex digits, stored lower-cased.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Parse and normalise an address.
    ///
    /// Surrounding whitespace is ignored and the result is lower-cased.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let invalid = |reason| CoreError::InvalidAddress {
            input: input.to_string(),
            reason,
        };

        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| invalid("missing 0x prefix"))?;

        if digits.is_empty() {
            return Err(invalid("no digits after 0x"));
        }
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid("non-hex character"));
        }

        Ok(Self(format!("0x{}", digits.to_ascii_lowercase())))
    }

    /// Build an address from raw 20-byte account bytes.
    pub fn from_bytes(bytes: &[u8; 20]) -> Self {
        Self(format!("0x{}", hex::encode(bytes)))
    }

    /// The normalised string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Address {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Deduplicate recipients and drop the owner, keeping first-seen order.
///
/// The owner is always implicitly allowed, so it never appears as a
/// separate recipient entry.
pub fn normalize_recipients<I>(recipients: I, owner: &Address) -> Vec<Address>
where
    I: IntoIterator<Item = Address>,
{
    let mut seen = BTreeSet::new();
    recipients
        .into_iter()
        .filter(|r| r != owner && seen.insert(r.clone()))
        .collect()
}

/// Union an existing recipient list with additions.
///
/// Existing recipients keep their position; new ones are appended in the
/// order given.
pub fn merge_recipients(existing: &[Address], additions: &[Address], owner: &Address) -> Vec<Address> {
    normalize_recipients(existing.iter().chain(additions).cloned(), owner)
}
