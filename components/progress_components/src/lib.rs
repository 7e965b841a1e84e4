//! Per-player progress data: the candy sub-state and the account aggregate
//! that owns it. These are the shapes persisted by the profile store and
//! published to the presentation layer.

use {
    bevy::prelude::*,
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    std::fmt,
    thiserror::Error,
};

/// Identifier the host assigns to a connected player.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Reflect,
)]
pub struct PlayerId(pub u64);

impl PlayerId {
    pub fn profile_key(self) -> ProfileKey {
        ProfileKey::for_player(self)
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Store key for a player's profile, always `Player_<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProfileKey(String);

impl ProfileKey {
    pub fn for_player(player_id: PlayerId) -> Self {
        Self(format!("Player_{}", player_id.0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProfileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Level, click counters and click value of a player's candy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressRecord {
    /// 1-based, never above the configured max level
    pub level: u32,
    pub points_per_click: u64,
    /// Reset to 0 on every level-up
    pub clicks_at_current_level: u64,
    pub total_clicks_lifetime: u64,
    pub last_click_at: Option<DateTime<Utc>>,
}

impl ProgressRecord {
    pub fn starting(points_per_click: u64) -> Self {
        Self {
            level: 1,
            points_per_click,
            clicks_at_current_level: 0,
            total_clicks_lifetime: 0,
            last_click_at: None,
        }
    }
}

impl Default for ProgressRecord {
    fn default() -> Self {
        Self::starting(1)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileStats {
    pub created_at: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
    pub playtime_secs: u64,
}

/// Everything persisted for one player.
///
/// Lives as a component on the player's session entity while the session is
/// active; that copy is authoritative until the session ends.
#[derive(Component, Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountProgress {
    pub player_id: PlayerId,
    pub username: String,
    pub current_points: u64,
    pub total_points_lifetime: u64,
    pub total_clicks_lifetime: u64,
    pub candy: ProgressRecord,
    pub stats: ProfileStats,
}

impl AccountProgress {
    /// Fresh profile for a player seen for the first time.
    pub fn new(
        player_id: PlayerId,
        username: impl Into<String>,
        starting_points_per_click: u64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            player_id,
            username: username.into(),
            candy: ProgressRecord::starting(starting_points_per_click),
            stats: ProfileStats {
                created_at: Some(now),
                last_login: Some(now),
                playtime_secs: 0,
            },
            ..default()
        }
    }

    /// Checks the structural invariants that do not depend on click thresholds.
    pub fn validate(&self, max_level: u32) -> Result<(), MalformedRecord> {
        let candy = &self.candy;
        if candy.level < 1 || candy.level > max_level {
            return Err(MalformedRecord::LevelOutOfRange {
                level: candy.level,
                max_level,
            });
        }
        if candy.points_per_click == 0 {
            return Err(MalformedRecord::ZeroPointsPerClick);
        }
        if candy.clicks_at_current_level > candy.total_clicks_lifetime {
            return Err(MalformedRecord::LevelClicksExceedLifetime {
                at_level: candy.clicks_at_current_level,
                lifetime: candy.total_clicks_lifetime,
            });
        }
        if self.total_clicks_lifetime < candy.total_clicks_lifetime {
            return Err(MalformedRecord::AccountClicksBehindCandy {
                account: self.total_clicks_lifetime,
                candy: candy.total_clicks_lifetime,
            });
        }
        if self.current_points > self.total_points_lifetime {
            return Err(MalformedRecord::PointsExceedLifetime {
                current: self.current_points,
                lifetime: self.total_points_lifetime,
            });
        }
        Ok(())
    }
}

/// A stored profile that violates a progress invariant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedRecord {
    #[error("candy level {level} outside 1..={max_level}")]
    LevelOutOfRange { level: u32, max_level: u32 },

    #[error("points per click is 0")]
    ZeroPointsPerClick,

    #[error("{at_level} clicks at current level exceed {lifetime} lifetime clicks")]
    LevelClicksExceedLifetime { at_level: u64, lifetime: u64 },

    #[error("account lifetime clicks {account} behind candy lifetime clicks {candy}")]
    AccountClicksBehindCandy { account: u64, candy: u64 },

    #[error("current points {current} exceed lifetime points {lifetime}")]
    PointsExceedLifetime { current: u64, lifetime: u64 },

    #[error("{clicks} clicks at level {level} already meet the {required} required to level up")]
    ThresholdAlreadyMet {
        level: u32,
        clicks: u64,
        required: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> AccountProgress {
        AccountProgress::new(PlayerId(7), "alice", 1, Utc::now())
    }

    #[test]
    fn test_profile_key_is_deterministic() {
        assert_eq!(PlayerId(42).profile_key().as_str(), "Player_42");
        assert_eq!(PlayerId(42).profile_key(), ProfileKey::for_player(PlayerId(42)));
    }

    #[test]
    fn test_new_profile_defaults() {
        let progress = profile();
        assert_eq!(progress.candy.level, 1);
        assert_eq!(progress.candy.points_per_click, 1);
        assert_eq!(progress.current_points, 0);
        assert!(progress.stats.created_at.is_some());
        assert_eq!(progress.validate(6), Ok(()));
    }

    #[test]
    fn test_validate_rejects_level_out_of_range() {
        let mut progress = profile();
        progress.candy.level = 0;
        assert_eq!(
            progress.validate(6),
            Err(MalformedRecord::LevelOutOfRange {
                level: 0,
                max_level: 6
            })
        );

        progress.candy.level = 7;
        assert!(progress.validate(6).is_err());
        assert!(progress.validate(7).is_ok());
    }

    #[test]
    fn test_validate_rejects_inconsistent_counters() {
        let mut progress = profile();
        progress.candy.clicks_at_current_level = 3;
        assert!(matches!(
            progress.validate(6),
            Err(MalformedRecord::LevelClicksExceedLifetime { .. })
        ));

        let mut progress = profile();
        progress.candy.total_clicks_lifetime = 5;
        assert!(matches!(
            progress.validate(6),
            Err(MalformedRecord::AccountClicksBehindCandy { .. })
        ));

        let mut progress = profile();
        progress.current_points = 1;
        assert!(matches!(
            progress.validate(6),
            Err(MalformedRecord::PointsExceedLifetime { .. })
        ));
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        // Older saves without newer fields still load
        let progress: AccountProgress =
            ron::from_str("(username: \"bob\", current_points: 4, total_points_lifetime: 9)")
                .unwrap();
        assert_eq!(progress.username, "bob");
        assert_eq!(progress.candy, ProgressRecord::default());
        assert_eq!(progress.stats.playtime_secs, 0);
    }
}
