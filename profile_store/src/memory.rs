use {
    crate::{ProfileStore, StoreFuture},
    bevy::platform::collections::{HashMap, HashSet},
    progress_components::{AccountProgress, ProfileKey},
    std::sync::{Arc, Mutex, MutexGuard, PoisonError},
};

/// In-process store. Clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryProfileStore {
    inner: Arc<Mutex<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    profiles: HashMap<ProfileKey, AccountProgress>,
    held: HashSet<ProfileKey>,
    saves: u64,
}

impl MemoryProfileStore {
    pub fn insert(&self, key: ProfileKey, progress: AccountProgress) {
        self.state().profiles.insert(key, progress);
    }

    pub fn get(&self, key: &ProfileKey) -> Option<AccountProgress> {
        self.state().profiles.get(key).cloned()
    }

    /// Loaded and not yet released.
    pub fn is_held(&self, key: &ProfileKey) -> bool {
        self.state().held.contains(key)
    }

    pub fn save_count(&self) -> u64 {
        self.state().saves
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ProfileStore for MemoryProfileStore {
    fn load(&self, key: &ProfileKey) -> StoreFuture<Option<AccountProgress>> {
        let store = self.clone();
        let key = key.clone();
        Box::pin(async move {
            let mut state = store.state();
            state.held.insert(key.clone());
            Ok(state.profiles.get(&key).cloned())
        })
    }

    fn save(&self, key: &ProfileKey, progress: &AccountProgress) -> StoreFuture<()> {
        let store = self.clone();
        let key = key.clone();
        let snapshot = progress.clone();
        Box::pin(async move {
            let mut state = store.state();
            state.profiles.insert(key, snapshot);
            state.saves += 1;
            Ok(())
        })
    }

    fn release(&self, key: &ProfileKey) -> StoreFuture<()> {
        let store = self.clone();
        let key = key.clone();
        Box::pin(async move {
            store.state().held.remove(&key);
            Ok(())
        })
    }
}
