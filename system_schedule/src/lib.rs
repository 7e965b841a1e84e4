use bevy::prelude::*;

/// Per-frame order of session processing.
///
/// Clicks are applied after loads resolve and before sessions end, so a click
/// and a leave arriving in the same frame are handled in that order.
#[derive(SystemSet, Debug, Hash, PartialEq, Eq, Clone)]
pub enum SessionSchedule {
    /// Accept new connections and start profile loads. A player rejoining in
    /// the frame their session ends is taken in on the next frame.
    Intake,
    /// Poll in-flight loads, activate or reject sessions
    ResolveLoads,
    /// Apply click requests to active sessions
    ApplyClicks,
    /// End sessions, flush and release profiles
    Release,
    /// Autosave dirty profiles and poll in-flight saves
    Persist,
}

/// Chains all [`SessionSchedule`] sets in `Update`.
pub fn configure_session_schedule(app: &mut App) {
    app.configure_sets(
        Update,
        (
            SessionSchedule::Intake,
            SessionSchedule::ResolveLoads,
            SessionSchedule::ApplyClicks,
            SessionSchedule::Release,
            SessionSchedule::Persist,
        )
            .chain(),
    );
}
