use {
    crate::{ProfileStore, StoreError, StoreFuture},
    bevy::prelude::*,
    progress_components::{AccountProgress, ProfileKey},
    ron::ser::PrettyConfig,
    std::{
        fs,
        io::ErrorKind,
        path::{Path, PathBuf},
    },
};

/// Stores each profile as `<dir>/<key>.profile.ron`.
///
/// Writes go to a `.tmp` sibling first and are renamed into place, so a
/// crash mid-write leaves the previous save intact.
#[derive(Debug, Clone)]
pub struct RonFileStore {
    dir: PathBuf,
}

impl RonFileStore {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, key: &ProfileKey) -> PathBuf {
        self.dir.join(format!("{key}.profile.ron"))
    }
}

impl ProfileStore for RonFileStore {
    fn load(&self, key: &ProfileKey) -> StoreFuture<Option<AccountProgress>> {
        let path = self.path_for(key);
        let key = key.clone();
        Box::pin(async move {
            let contents = match fs::read_to_string(&path) {
                Ok(contents) => contents,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!("no save file for {key}");
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            };

            ron::from_str::<AccountProgress>(&contents)
                .map(Some)
                .map_err(|e| StoreError::Corrupt {
                    key: key.to_string(),
                    reason: e.to_string(),
                })
        })
    }

    fn save(&self, key: &ProfileKey, progress: &AccountProgress) -> StoreFuture<()> {
        let path = self.path_for(key);
        let serialized = ron::ser::to_string_pretty(progress, PrettyConfig::default()).map_err(|e| {
            StoreError::Serialize {
                key: key.to_string(),
                reason: e.to_string(),
            }
        });
        Box::pin(async move {
            let serialized = serialized?;
            let tmp = path.with_extension("ron.tmp");
            fs::write(&tmp, serialized.as_bytes())?;
            fs::rename(&tmp, &path)?;
            trace!("wrote {}", path.display());
            Ok(())
        })
    }

    fn release(&self, key: &ProfileKey) -> StoreFuture<()> {
        // Files carry no session lock
        let key = key.clone();
        Box::pin(async move {
            trace!("released {key}");
            Ok(())
        })
    }
}
