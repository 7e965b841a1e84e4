use {
    bevy::prelude::*,
    profile_store::{ProfileStoreHandle, StoreError, StoreSettings},
    progression_resources::{InvalidProgressionConfig, ProgressionConfig},
    serde::{Deserialize, Serialize},
    session::{InvalidSessionSettings, SessionPlugin, SessionSettings},
    session_events::{ProfileLoaded, SessionRejected},
    std::{
        fs, io,
        path::{Path, PathBuf},
    },
    thiserror::Error,
};

/// Everything configurable about the server, read from one RON file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub progression: ProgressionConfig,
    pub session: SessionSettings,
    pub store: StoreSettings,
}

impl ServerConfig {
    pub fn from_ron(contents: &str) -> Result<Self, ConfigError> {
        ron::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Reads `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(contents) => {
                let config = Self::from_ron(&contents)?;
                info!("loaded config from {}", path.display());
                Ok(config)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("no config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.progression.validate()?;
        self.session.validate()?;
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid progression config: {0}")]
    Progression(#[from] InvalidProgressionConfig),

    #[error("invalid session settings: {0}")]
    Session(#[from] InvalidSessionSettings),

    #[error("failed to open profile store: {0}")]
    Store(#[from] StoreError),
}

/// Wires config, the profile store and the session synchronizer into an app.
pub struct ServerPlugin {
    config: ServerConfig,
    store: ProfileStoreHandle,
}

impl ServerPlugin {
    /// Validates `config` and opens the store it names.
    pub fn new(config: ServerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let store = config.store.open()?;
        Ok(Self { config, store })
    }

    /// Uses `store` instead of the one `config.store` describes.
    pub fn with_store(config: ServerConfig, store: ProfileStoreHandle) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config, store })
    }
}

impl Plugin for ServerPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(self.config.progression.clone())
            .insert_resource(self.config.session.clone())
            .insert_resource(self.store.clone())
            .add_plugins(SessionPlugin)
            .add_observer(announce_profile_loaded)
            .add_systems(Update, log_rejections);

        info!(
            "candy server ready: max level {}, load timeout {}s, autosave every {}s",
            self.config.progression.max_level,
            self.config.session.load_timeout_secs,
            self.config.session.autosave_interval_secs
        );
    }
}

fn announce_profile_loaded(trigger: On<ProfileLoaded>) {
    let event = trigger.event();
    if event.is_new {
        info!("welcome, new player {}", event.player_id);
    }
}

fn log_rejections(mut rejected: MessageReader<SessionRejected>) {
    for SessionRejected { player_id, reason } in rejected.read() {
        warn!("kicking {player_id}: {reason}");
    }
}
