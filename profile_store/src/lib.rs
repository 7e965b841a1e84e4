//! Durable storage of player profiles.
//!
//! The session layer only sees the [`ProfileStore`] capability: load, save and
//! release by [`ProfileKey`], each resolving asynchronously with a
//! [`StoreError`] on failure. Backends:
//! - [`MemoryProfileStore`]: process-local map, used by tests and local play
//! - [`RonFileStore`]: one RON file per profile under a saves directory

mod file;
mod memory;

pub use {file::RonFileStore, memory::MemoryProfileStore};

use {
    bevy::prelude::*,
    progress_components::{AccountProgress, ProfileKey},
    serde::{Deserialize, Serialize},
    std::{future::Future, path::PathBuf, pin::Pin, sync::Arc},
    thiserror::Error,
};

pub type StoreFuture<T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'static>>;

/// Load/save/release of profiles by key.
///
/// Returned futures must not borrow the store; they are polled on the IO task
/// pool, possibly after the caller has moved on. A store is shared by every
/// session and may delay or reject any request.
pub trait ProfileStore: Send + Sync + 'static {
    /// `Ok(None)` when no profile exists for `key`.
    fn load(&self, key: &ProfileKey) -> StoreFuture<Option<AccountProgress>>;

    /// Persists a snapshot of `progress` taken when this is called.
    fn save(&self, key: &ProfileKey, progress: &AccountProgress) -> StoreFuture<()>;

    /// Gives up the session's claim on `key`.
    fn release(&self, key: &ProfileKey) -> StoreFuture<()>;
}

/// The store every session shares.
#[derive(Resource, Clone, Deref)]
pub struct ProfileStoreHandle(pub Arc<dyn ProfileStore>);

impl ProfileStoreHandle {
    pub fn new(store: impl ProfileStore) -> Self {
        Self(Arc::new(store))
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("profile {key} is corrupt: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("failed to serialize profile {key}: {reason}")]
    Serialize { key: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreBackend {
    Memory,
    #[default]
    File,
}

/// Which backend to open and where it keeps its data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    pub saves_dir: PathBuf,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::File,
            saves_dir: PathBuf::from("saves"),
        }
    }
}

impl StoreSettings {
    pub fn open(&self) -> Result<ProfileStoreHandle, StoreError> {
        match self.backend {
            StoreBackend::Memory => Ok(ProfileStoreHandle::new(MemoryProfileStore::default())),
            StoreBackend::File => {
                let store = RonFileStore::open(&self.saves_dir)?;
                info!("profiles stored under {}", self.saves_dir.display());
                Ok(ProfileStoreHandle::new(store))
            }
        }
    }
}
