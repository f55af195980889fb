//! In-memory content store.
//!
//! Content-addressed: the object id is the unpadded base64url SHA-256 of the
//! payload, so uploading the same bytes twice yields the same id. Can inject
//! upload failures and simulate gateway propagation delay for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use base64ct::{Base64UrlUnpadded, Encoding};
use bytes::Bytes;
use sha2::{Digest, Sha256};
use tracing::debug;
use url::Url;

use iryshare_core::{Locator, ObjectId};

use crate::content::{ContentStore, Tag};
use crate::error::{Result, StoreError};

/// Gateway used when none is given.
pub const DEFAULT_GATEWAY: &str = "https://gateway.irys.xyz";

struct StoredObject {
    data: Bytes,
    tags: Vec<Tag>,
    /// Fetches left before the object becomes visible.
    pending_misses: u32,
}

/// In-memory content store.
pub struct MemoryContentStore {
    gateway: Url,
    objects: RwLock<HashMap<ObjectId, StoredObject>>,
    fail_uploads: AtomicBool,
    propagation_misses: AtomicU32,
}

impl MemoryContentStore {
    /// Create an empty store under [`DEFAULT_GATEWAY`].
    pub fn new() -> Self {
        Self::with_gateway(default_gateway())
    }

    /// Create an empty store under the given gateway.
    pub fn with_gateway(gateway: Url) -> Self {
        Self {
            gateway,
            objects: RwLock::new(HashMap::new()),
            fail_uploads: AtomicBool::new(false),
            propagation_misses: AtomicU32::new(0),
        }
    }

    /// Make every subsequent upload fail (or succeed again).
    pub fn set_fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    /// Objects uploaded from now on answer `NotFound` for their first
    /// `misses` fetches.
    pub fn set_propagation_delay(&self, misses: u32) {
        self.propagation_misses.store(misses, Ordering::SeqCst);
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tags an object was uploaded with.
    pub fn tags(&self, id: &ObjectId) -> Option<Vec<Tag>> {
        self.objects.read().unwrap().get(id).map(|o| o.tags.clone())
    }

    /// Raw bytes of an object, ignoring propagation delay.
    pub fn get(&self, id: &ObjectId) -> Option<Bytes> {
        self.objects.read().unwrap().get(id).map(|o| o.data.clone())
    }

    /// Replace an object's bytes in place.
    ///
    /// A real gateway never does this; it exists to test how readers cope
    /// with corrupted objects.
    pub fn corrupt(&self, id: &ObjectId, data: Bytes) {
        if let Some(object) = self.objects.write().unwrap().get_mut(id) {
            object.data = data;
        }
    }

    /// Drop an object, as if the gateway had lost it.
    pub fn remove(&self, id: &ObjectId) {
        self.objects.write().unwrap().remove(id);
    }
}

impl Default for MemoryContentStore {
    fn default() -> Self {
        Self::new()
    }
}

fn default_gateway() -> Url {
    // Constant input, parsing cannot fail.
    Url::parse(DEFAULT_GATEWAY).expect("default gateway is a valid URL")
}

/// Content address for a payload.
pub fn content_id(data: &[u8]) -> ObjectId {
    let digest = Sha256::digest(data);
    // base64url never contains separators, so the id is always valid.
    ObjectId::new(Base64UrlUnpadded::encode_string(&digest)).expect("base64url id is valid")
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn upload(&self, data: Bytes, tags: &[Tag]) -> Result<ObjectId> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(StoreError::Upload("upload rejected by gateway".to_string()));
        }

        let id = content_id(&data);
        let mut objects = self.objects.write().unwrap();
        objects.entry(id.clone()).or_insert_with(|| StoredObject {
            data,
            tags: tags.to_vec(),
            pending_misses: self.propagation_misses.load(Ordering::SeqCst),
        });

        debug!(object_id = %id, "stored object");
        Ok(id)
    }

    async fn fetch(&self, locator: &Locator) -> Result<Bytes> {
        let mut objects = self.objects.write().unwrap();
        let object = objects
            .get_mut(locator.object_id())
            .ok_or_else(|| StoreError::NotFound(locator.to_string()))?;

        if object.pending_misses > 0 {
            object.pending_misses -= 1;
            return Err(StoreError::NotFound(format!("{locator} (not yet propagated)")));
        }
        Ok(object.data.clone())
    }

    fn locator(&self, id: &ObjectId) -> Result<Locator> {
        Ok(Locator::new(&self.gateway, id.clone())?)
    }
}
