//! Messages exchanged with the presentation layer, plus lifecycle observer
//! events raised by the session synchronizer.
//!
//! Inbound messages are written by whatever transport fronts the server.
//! Outbound messages are read by it and forwarded to the owning player.
//! Delivery is at most once; nothing is acknowledged or replayed.

use {
    bevy::prelude::*,
    progress_components::{AccountProgress, PlayerId},
    progression::LevelProgress,
};

pub struct SessionEventsPlugin;

impl Plugin for SessionEventsPlugin {
    fn build(&self, app: &mut App) {
        app.add_message::<PlayerJoined>()
            .add_message::<PlayerLeft>()
            .add_message::<ClickRequested>()
            .add_message::<StateUpdated>()
            .add_message::<VisualRefresh>()
            .add_message::<SessionRejected>();
    }
}

// --- Inbound ---

/// The host accepted a player connection.
#[derive(Message, Debug, Clone)]
pub struct PlayerJoined {
    pub player_id: PlayerId,
    pub username: String,
}

/// The player's connection is gone.
#[derive(Message, Debug, Clone)]
pub struct PlayerLeft {
    pub player_id: PlayerId,
}

/// The player clicked their candy. Identified by the sending connection.
#[derive(Message, Debug, Clone)]
pub struct ClickRequested {
    pub player_id: PlayerId,
}

// --- Outbound ---

/// Full snapshot of a player's progress after a load or a click.
#[derive(Message, Debug, Clone)]
pub struct StateUpdated {
    pub player_id: PlayerId,
    pub progress: AccountProgress,
    /// `None` once the candy is at max level
    pub next_level: Option<LevelProgress>,
}

/// The candy should be (re)spawned at `level`.
#[derive(Message, Debug, Clone, PartialEq, Eq)]
pub struct VisualRefresh {
    pub player_id: PlayerId,
    pub level: u32,
}

/// The session could not start; the transport should drop the player with `reason`.
#[derive(Message, Debug, Clone)]
pub struct SessionRejected {
    pub player_id: PlayerId,
    pub reason: String,
}

// --- Lifecycle (observers) ---

/// A session became active.
///
/// This **Observer** event fires once per session, after the profile was
/// loaded (or created) and validated, and before the initial `StateUpdated`
/// is read by the transport.
#[derive(Event, Debug, Clone)]
pub struct ProfileLoaded {
    pub player_id: PlayerId,
    /// The session entity carrying the player's `AccountProgress`
    pub entity: Entity,
    /// No stored profile existed; a default one was created
    pub is_new: bool,
}

/// A click pushed the candy to a new level.
#[derive(Event, Debug, Clone, PartialEq, Eq)]
pub struct CandyLeveledUp {
    pub player_id: PlayerId,
    pub level: u32,
    pub reached_max: bool,
}

/// The store refused a save. The in-memory profile stays authoritative.
#[derive(Event, Debug, Clone)]
pub struct ProfileSaveFailed {
    pub player_id: PlayerId,
    pub error: String,
}
