//! Candy progression: what a single click does to a player's progress.
//!
//! Everything here is pure. The caller supplies the current time and owns
//! the record; nothing is stored or published from this crate.

use {
    chrono::{DateTime, Utc},
    growth::GrowthStrategy,
    progress_components::{AccountProgress, MalformedRecord, ProgressRecord},
    progression_resources::ProgressionConfig,
    serde::{Deserialize, Serialize},
};

#[cfg(test)]
mod tests;

/// Result of applying one click to a [`ProgressRecord`].
#[derive(Debug, Clone, PartialEq)]
pub struct ClickOutcome {
    pub record: ProgressRecord,
    /// Points per click before any level-up this click caused
    pub points_earned: u64,
    pub level_changed: bool,
}

/// How far the candy is from its next level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelProgress {
    pub required: u64,
    pub remaining: u64,
}

/// Clicks needed at `target_level - 1` to reach `target_level`.
///
/// Level 1 -> 2 uses step 0 of the click curve, so with the default curve
/// this is `floor(10 * 1.5^(target_level - 2))`: 10, 15, 22, 33, 50.
/// Indexing the curve by the current level instead would shift every
/// threshold one step up and ask 15 clicks for the first level.
pub fn required_clicks_for_level(config: &ProgressionConfig, target_level: u32) -> u64 {
    config
        .click_curve
        .floor_at(target_level.saturating_sub(2))
        .max(1)
}

/// Applies one click. Levels up at most once.
///
/// `record` must already have passed [`validate_progress`].
pub fn apply_click(
    config: &ProgressionConfig,
    record: &ProgressRecord,
    now: DateTime<Utc>,
) -> ClickOutcome {
    let mut next = record.clone();
    let points_earned = record.points_per_click;

    next.clicks_at_current_level = next.clicks_at_current_level.saturating_add(1);
    next.total_clicks_lifetime = next.total_clicks_lifetime.saturating_add(1);
    // A clock stepping backwards must not move the timestamp back
    next.last_click_at = Some(match record.last_click_at {
        Some(previous) if previous > now => previous,
        _ => now,
    });

    let mut level_changed = false;
    if next.level < config.max_level {
        let required = required_clicks_for_level(config, next.level + 1);
        if next.clicks_at_current_level >= required {
            next.level += 1;
            next.clicks_at_current_level = 0;
            next.points_per_click = grow_points_per_click(config, next.points_per_click);
            level_changed = true;
        }
    }

    ClickOutcome {
        record: next,
        points_earned,
        level_changed,
    }
}

/// Applies one click to the account aggregate and credits the points.
pub fn apply_account_click(
    config: &ProgressionConfig,
    progress: &mut AccountProgress,
    now: DateTime<Utc>,
) -> ClickOutcome {
    let outcome = apply_click(config, &progress.candy, now);
    progress.candy = outcome.record.clone();
    progress.current_points = progress.current_points.saturating_add(outcome.points_earned);
    progress.total_points_lifetime = progress
        .total_points_lifetime
        .saturating_add(outcome.points_earned);
    progress.total_clicks_lifetime = progress.total_clicks_lifetime.saturating_add(1);
    outcome
}

/// `None` once the candy is at max level.
pub fn level_progress(config: &ProgressionConfig, record: &ProgressRecord) -> Option<LevelProgress> {
    if record.level >= config.max_level {
        return None;
    }
    let required = required_clicks_for_level(config, record.level + 1);
    Some(LevelProgress {
        required,
        remaining: required.saturating_sub(record.clicks_at_current_level),
    })
}

/// Full invariant check for a profile coming out of the store.
pub fn validate_progress(
    config: &ProgressionConfig,
    progress: &AccountProgress,
) -> Result<(), MalformedRecord> {
    progress.validate(config.max_level)?;

    let candy = &progress.candy;
    if candy.level < config.max_level {
        let required = required_clicks_for_level(config, candy.level + 1);
        if candy.clicks_at_current_level >= required {
            return Err(MalformedRecord::ThresholdAlreadyMet {
                level: candy.level,
                clicks: candy.clicks_at_current_level,
                required,
            });
        }
    }
    Ok(())
}

fn grow_points_per_click(config: &ProgressionConfig, points_per_click: u64) -> u64 {
    let grown = (points_per_click as f64 * config.points_per_click_growth).floor();
    if grown.is_finite() && grown > points_per_click as f64 {
        grown as u64
    } else {
        points_per_click
    }
}
