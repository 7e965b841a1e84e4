//! Session synchronizer: owns the authoritative in-memory profile of every
//! connected player and keeps the profile store and the presentation layer
//! in step with it.
//!
//! Each player is one entity moving through
//! `Unloaded -> Loading -> Active -> Unloaded`:
//! - `Loading`: [`Player`] + [`LoadingProfile`] (store load in flight)
//! - `Active`: [`Player`] + `AccountProgress` + [`ActiveSession`]
//! - `Unloaded`: no entity, no registry entry
//!
//! All clicks are applied by one system reading messages in arrival order,
//! so a player's clicks never interleave and their `StateUpdated` messages
//! come out in the same order.

use {
    bevy::{
        platform::collections::HashMap,
        prelude::*,
        tasks::{IoTaskPool, Task},
    },
    chrono::{DateTime, Utc},
    profile_store::StoreError,
    progress_components::{AccountProgress, MalformedRecord, PlayerId, ProfileKey},
    progression_resources::ProgressionConfig,
    serde::{Deserialize, Serialize},
    session_events::SessionEventsPlugin,
    std::time::Duration,
    system_schedule::{SessionSchedule, configure_session_schedule},
    thiserror::Error,
};

pub mod systems;


pub struct SessionPlugin;

impl Plugin for SessionPlugin {
    fn build(&self, app: &mut App) {
        configure_session_schedule(app);
        app.add_plugins(SessionEventsPlugin)
            .init_resource::<SessionSettings>()
            .init_resource::<ProgressionConfig>()
            .init_resource::<SessionRegistry>()
            .init_resource::<ProfileFlushes>()
            .add_systems(Startup, systems::start_autosave_timer)
            .add_systems(
                Update,
                (
                    systems::begin_sessions.in_set(SessionSchedule::Intake),
                    systems::resolve_profile_loads.in_set(SessionSchedule::ResolveLoads),
                    systems::apply_clicks.in_set(SessionSchedule::ApplyClicks),
                    systems::end_sessions.in_set(SessionSchedule::Release),
                    (
                        systems::autosave_profiles,
                        systems::poll_pending_saves,
                        systems::poll_profile_flushes,
                    )
                        .chain()
                        .in_set(SessionSchedule::Persist),
                ),
            );
    }
}

// --- Settings ---

#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// A load still pending after this long rejects the session
    pub load_timeout_secs: f32,
    /// How often dirty profiles are written to the store
    pub autosave_interval_secs: f32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            load_timeout_secs: 30.0,
            autosave_interval_secs: 30.0,
        }
    }
}

impl SessionSettings {
    pub fn validate(&self) -> Result<(), InvalidSessionSettings> {
        if !(self.load_timeout_secs.is_finite() && self.load_timeout_secs > 0.0) {
            return Err(InvalidSessionSettings::LoadTimeout(self.load_timeout_secs));
        }
        if !(self.autosave_interval_secs.is_finite() && self.autosave_interval_secs > 0.0) {
            return Err(InvalidSessionSettings::AutosaveInterval(
                self.autosave_interval_secs,
            ));
        }
        Ok(())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvalidSessionSettings {
    #[error("load_timeout_secs must be positive, got {0}")]
    LoadTimeout(f32),

    #[error("autosave_interval_secs must be positive, got {0}")]
    AutosaveInterval(f32),
}

// --- Components ---

/// A connected player's session entity.
#[derive(Component, Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub username: String,
    pub key: ProfileKey,
}

/// Profile load in flight. Dropping the component cancels the load.
///
/// `task` stays `None` while the previous session's final save for the same
/// key is still running; the timeout counts that wait too.
#[derive(Component)]
pub struct LoadingProfile {
    task: Option<Task<Result<Option<AccountProgress>, StoreError>>>,
    timeout: Timer,
}

/// The session accepts clicks.
#[derive(Component, Debug)]
pub struct ActiveSession {
    pub started_at: DateTime<Utc>,
    /// Changed since the last save was issued
    pub dirty: bool,
}

/// A save issued by autosave that has not resolved yet. At most one per player.
#[derive(Component)]
pub struct PendingSave(Option<Task<Result<(), StoreError>>>);

// --- Resources ---

/// Session entity of every player that is Loading or Active.
#[derive(Resource, Default)]
pub struct SessionRegistry {
    players: HashMap<PlayerId, Entity>,
}

impl SessionRegistry {
    pub fn get(&self, player_id: PlayerId) -> Option<Entity> {
        self.players.get(&player_id).copied()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

/// Final save and release of ended sessions, by key. A key is not loaded
/// again until its entry is gone.
#[derive(Resource, Default)]
pub struct ProfileFlushes {
    pending: HashMap<ProfileKey, Task<()>>,
}

impl ProfileFlushes {
    pub fn is_pending(&self, key: &ProfileKey) -> bool {
        self.pending.contains_key(key)
    }
}

#[derive(Resource)]
pub struct AutosaveTimer(pub Timer);

impl AutosaveTimer {
    pub fn new(interval: Duration) -> Self {
        Self(Timer::new(interval, TimerMode::Repeating))
    }
}

// --- Lifecycle ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Unloaded,
    Loading,
    Active,
}

pub fn session_phase(world: &World, player_id: PlayerId) -> SessionPhase {
    let Some(entity) = world
        .get_resource::<SessionRegistry>()
        .and_then(|registry| registry.get(player_id))
    else {
        return SessionPhase::Unloaded;
    };
    let Ok(entity) = world.get_entity(entity) else {
        return SessionPhase::Unloaded;
    };

    if entity.contains::<ActiveSession>() {
        SessionPhase::Active
    } else if entity.contains::<LoadingProfile>() {
        SessionPhase::Loading
    } else {
        SessionPhase::Unloaded
    }
}

/// Why a session could not become active.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("profile load failed: {0}")]
    Load(#[from] StoreError),

    #[error("stored profile is malformed: {0}")]
    Malformed(#[from] MalformedRecord),

    #[error("profile load timed out after {0:?}")]
    LoadTimedOut(Duration),
}

/// Kick text shown to a player whose session was rejected.
pub const LOAD_FAILED_REASON: &str = "Unable to load your data. Please try again later.";

fn spawn_release(store: &profile_store::ProfileStoreHandle, key: &ProfileKey) {
    let release = store.release(key);
    let key = key.clone();
    IoTaskPool::get()
        .spawn(async move {
            if let Err(error) = release.await {
                warn!("failed to release profile {key}: {error}");
            }
        })
        .detach();
}
