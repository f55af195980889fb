//! The content store: append-only, content-addressed object storage.
//!
//! Objects are written once and never mutated. Uploading returns an
//! [`ObjectId`]; the store turns it into a [`Locator`] under its gateway.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use iryshare_core::{Locator, ObjectId};

use crate::error::Result;

/// A name/value tag attached to an uploaded object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub value: String,
}

impl Tag {
    pub fn new(name: impl Into<String>, value: impl fmt::Display) -> Self {
        Self {
            name: name.into(),
            value: value.to_string(),
        }
    }
}

/// Find a tag value by name.
pub fn tag_value<'a>(tags: &'a [Tag], name: &str) -> Option<&'a str> {
    tags.iter()
        .find(|t| t.name == name)
        .map(|t| t.value.as_str())
}

/// Async interface for the content store.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Upload an object. Never overwrites an existing object.
    async fn upload(&self, data: Bytes, tags: &[Tag]) -> Result<ObjectId>;

    /// Fetch an object.
    ///
    /// Fails with [`StoreError::NotFound`](crate::StoreError::NotFound) when
    /// the gateway does not (yet) serve it.
    async fn fetch(&self, locator: &Locator) -> Result<Bytes>;

    /// Locator for an object id under this store's gateway.
    fn locator(&self, id: &ObjectId) -> Result<Locator>;
}
