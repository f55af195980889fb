//! Content locators.
//!
//! A [`Locator`] is `https://<gateway-host>/<objectId>`: opaque to callers and
//! resolvable with a plain GET.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{CoreError, Result};

/// Identifier the content store assigns to an uploaded object.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectId(String);

impl ObjectId {
    /// Validate an object id: non-empty, no path or query separators.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() || id.contains(['/', '?', '#']) || id.chars().any(char::is_whitespace) {
            return Err(CoreError::InvalidObjectId(id));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ObjectId {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self> {
        Self::new(s)
    }
}

impl From<ObjectId> for String {
    fn from(id: ObjectId) -> Self {
        id.0
    }
}

/// Where a published object lives.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Locator {
    url: Url,
    object_id: ObjectId,
}

impl Locator {
    /// Join a gateway base URL and an object id.
    pub fn new(gateway: &Url, object_id: ObjectId) -> Result<Self> {
        let base = gateway.as_str().trim_end_matches('/');
        Self::parse(&format!("{base}/{object_id}"))
    }

    /// Parse a locator URL. The last path segment is the object id.
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = |reason: String| CoreError::InvalidLocator {
            input: input.to_string(),
            reason,
        };

        let url = Url::parse(input).map_err(|e| invalid(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme {:?}", url.scheme())));
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(invalid("query or fragment present".to_string()));
        }

        let last = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or_default();
        let object_id = ObjectId::new(last).map_err(|_| invalid("missing object id".to_string()))?;

        Ok(Self { url, object_id })
    }

    pub fn object_id(&self) -> &ObjectId {
        &self.object_id
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }
}

impl fmt::Debug for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Locator({})", self.url)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

impl FromStr for Locator {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Locator {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<Locator> for String {
    fn from(locator: Locator) -> Self {
        locator.url.into()
    }
}
