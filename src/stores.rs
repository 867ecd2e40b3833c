//! Collaborator contracts for advertisement data, plus thread-safe in-memory
//! implementations.
//!
//! The selection core only ever reads: content by marketplace, targeting groups by
//! content. Embedders back the traits with their own storage; the in-memory stores here
//! serve tests and single-process embedders. Stored values are returned as snapshots,
//! so readers are never affected by concurrent writes.

use std::{
    collections::HashMap,
    sync::RwLock,
};

use crate::{error::StoreError, AdvertisementContent, Str, TargetingGroup};

/// Read-only source of advertisement content, keyed by marketplace id.
pub trait ContentStore: Send + Sync {
    /// All content renderable in the marketplace. An unknown marketplace yields an
    /// empty list, not an error.
    ///
    /// # Errors
    ///
    /// [`StoreError`] if the backing store cannot serve the lookup.
    fn get(&self, marketplace_id: &str) -> Result<Vec<AdvertisementContent>, StoreError>;
}

/// Read-only source of targeting groups, keyed by the content id they qualify.
pub trait TargetingGroupStore: Send + Sync {
    /// All targeting groups for the content. Content without groups yields an empty
    /// list.
    ///
    /// # Errors
    ///
    /// [`StoreError`] if the backing store cannot serve the lookup.
    fn get(&self, content_id: &str) -> Result<Vec<TargetingGroup>, StoreError>;
}

/// In-memory [`ContentStore`] that allows concurrent readers and writers.
#[derive(Default)]
pub struct InMemoryContentStore {
    contents: RwLock<HashMap<Str, Vec<AdvertisementContent>>>,
}

impl InMemoryContentStore {
    /// Create an empty store.
    pub fn new() -> InMemoryContentStore {
        InMemoryContentStore::default()
    }

    /// Add content, keyed by its marketplace id.
    pub fn put(&self, content: AdvertisementContent) {
        // .write() fails only if the lock is poisoned (a writer panicked while holding
        // it), which should never happen.
        let mut contents = self
            .contents
            .write()
            .expect("thread holding content store lock should not panic");

        contents
            .entry(content.marketplace_id.clone())
            .or_default()
            .push(content);
    }
}

impl ContentStore for InMemoryContentStore {
    fn get(&self, marketplace_id: &str) -> Result<Vec<AdvertisementContent>, StoreError> {
        let contents = self
            .contents
            .read()
            .expect("thread holding content store lock should not panic");

        Ok(contents.get(marketplace_id).cloned().unwrap_or_default())
    }
}

/// In-memory [`TargetingGroupStore`] that allows concurrent readers and writers.
#[derive(Default)]
pub struct InMemoryTargetingGroupStore {
    groups: RwLock<HashMap<Str, Vec<TargetingGroup>>>,
}

impl InMemoryTargetingGroupStore {
    /// Create an empty store.
    pub fn new() -> InMemoryTargetingGroupStore {
        InMemoryTargetingGroupStore::default()
    }

    /// Add a targeting group, keyed by the content id it qualifies.
    pub fn put(&self, group: TargetingGroup) {
        let mut groups = self
            .groups
            .write()
            .expect("thread holding targeting store lock should not panic");

        groups.entry(group.content_id.clone()).or_default().push(group);
    }
}

impl TargetingGroupStore for InMemoryTargetingGroupStore {
    fn get(&self, content_id: &str) -> Result<Vec<TargetingGroup>, StoreError> {
        let groups = self
            .groups
            .read()
            .expect("thread holding targeting store lock should not panic");

        Ok(groups.get(content_id).cloned().unwrap_or_default())
    }
}
