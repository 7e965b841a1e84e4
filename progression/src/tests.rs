use {
    crate::*,
    chrono::{Duration, TimeZone},
    progress_components::PlayerId,
    proptest::prelude::*,
};

fn config() -> ProgressionConfig {
    ProgressionConfig::default()
}

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn click_n(record: &ProgressRecord, n: u64) -> (ProgressRecord, Vec<bool>) {
    let config = config();
    let mut current = record.clone();
    let mut changes = Vec::new();
    for i in 0..n {
        let outcome = apply_click(&config, &current, at(i as i64));
        changes.push(outcome.level_changed);
        current = outcome.record;
    }
    (current, changes)
}

#[test]
fn test_required_clicks_follow_default_curve() {
    let config = config();
    assert_eq!(required_clicks_for_level(&config, 2), 10);
    assert_eq!(required_clicks_for_level(&config, 3), 15);
    assert_eq!(required_clicks_for_level(&config, 4), 22);
    assert_eq!(required_clicks_for_level(&config, 5), 33);
    assert_eq!(required_clicks_for_level(&config, 6), 50);
}

#[test]
fn test_ten_clicks_reach_level_two() {
    let (record, changes) = click_n(&ProgressRecord::default(), 10);
    assert_eq!(record.level, 2);
    assert_eq!(record.points_per_click, 1);
    assert_eq!(record.clicks_at_current_level, 0);
    assert_eq!(record.total_clicks_lifetime, 10);
    assert_eq!(changes.iter().filter(|c| **c).count(), 1);
    assert!(changes[9]);
}

#[test]
fn test_fifteen_clicks_from_level_two_reach_level_three() {
    let start = ProgressRecord {
        level: 2,
        total_clicks_lifetime: 10,
        ..default_record()
    };
    let (record, changes) = click_n(&start, 15);
    assert_eq!(record.level, 3);
    assert_eq!(record.points_per_click, 1);
    assert!(changes[14]);
    assert!(!changes[13]);
}

#[test]
fn test_points_per_click_grows_and_floors() {
    let start = ProgressRecord {
        points_per_click: 5,
        clicks_at_current_level: 9,
        total_clicks_lifetime: 9,
        ..default_record()
    };
    let outcome = apply_click(&config(), &start, at(0));
    assert!(outcome.level_changed);
    // Earned at the old rate, then grows floor(5 * 1.2) = 6
    assert_eq!(outcome.points_earned, 5);
    assert_eq!(outcome.record.points_per_click, 6);

    let start = ProgressRecord {
        points_per_click: 3,
        ..start
    };
    // floor(3 * 1.2) = 3
    assert_eq!(apply_click(&config(), &start, at(0)).record.points_per_click, 3);
}

#[test]
fn test_level_caps_at_max() {
    let (record, changes) = click_n(&ProgressRecord::default(), 500);
    assert_eq!(record.level, 6);
    assert_eq!(changes.iter().filter(|c| **c).count(), 5);
    // Clicks keep counting at max level
    assert_eq!(record.total_clicks_lifetime, 500);
    assert_eq!(record.clicks_at_current_level, 500 - 130);
    assert_eq!(level_progress(&config(), &record), None);
}

#[test]
fn test_timestamp_never_moves_back() {
    let start = ProgressRecord {
        last_click_at: Some(at(100)),
        ..default_record()
    };
    let outcome = apply_click(&config(), &start, at(100) - Duration::seconds(30));
    assert_eq!(outcome.record.last_click_at, Some(at(100)));

    let outcome = apply_click(&config(), &start, at(200));
    assert_eq!(outcome.record.last_click_at, Some(at(200)));
}

#[test]
fn test_account_click_credits_points() {
    let config = config();
    let mut progress = AccountProgress::new(PlayerId(1), "alice", 2, at(0));
    let outcome = apply_account_click(&config, &mut progress, at(1));
    assert_eq!(outcome.points_earned, 2);
    assert_eq!(progress.current_points, 2);
    assert_eq!(progress.total_points_lifetime, 2);
    assert_eq!(progress.total_clicks_lifetime, 1);
    assert_eq!(progress.candy.total_clicks_lifetime, 1);
    assert_eq!(progress.candy.last_click_at, Some(at(1)));
}

#[test]
fn test_level_progress_counts_down() {
    let record = ProgressRecord {
        clicks_at_current_level: 4,
        total_clicks_lifetime: 4,
        ..default_record()
    };
    assert_eq!(
        level_progress(&config(), &record),
        Some(LevelProgress {
            required: 10,
            remaining: 6
        })
    );
}

#[test]
fn test_validate_progress_rejects_met_threshold() {
    let config = config();
    let mut progress = AccountProgress::new(PlayerId(1), "alice", 1, at(0));
    progress.candy.clicks_at_current_level = 10;
    progress.candy.total_clicks_lifetime = 10;
    progress.total_clicks_lifetime = 10;
    assert_eq!(
        validate_progress(&config, &progress),
        Err(MalformedRecord::ThresholdAlreadyMet {
            level: 1,
            clicks: 10,
            required: 10
        })
    );

    progress.candy.clicks_at_current_level = 9;
    assert_eq!(validate_progress(&config, &progress), Ok(()));

    progress.candy.level = 9;
    assert!(matches!(
        validate_progress(&config, &progress),
        Err(MalformedRecord::LevelOutOfRange { .. })
    ));
}

fn default_record() -> ProgressRecord {
    ProgressRecord::default()
}

/// Any record that passes validation under the default config.
fn valid_record() -> impl Strategy<Value = ProgressRecord> {
    (1u32..=6, 1u64..10_000, 0u64..100_000).prop_flat_map(|(level, points_per_click, extra)| {
        let config = ProgressionConfig::default();
        let limit = if level < config.max_level {
            required_clicks_for_level(&config, level + 1)
        } else {
            1_000
        };
        (0..limit).prop_map(move |clicks| ProgressRecord {
            level,
            points_per_click,
            clicks_at_current_level: clicks,
            total_clicks_lifetime: clicks + extra,
            last_click_at: None,
        })
    })
}

proptest! {
    #[test]
    fn prop_click_never_decreases_progress(record in valid_record(), secs in 0i64..1_000_000) {
        let outcome = apply_click(&config(), &record, at(secs));
        prop_assert!(outcome.record.level >= record.level);
        prop_assert!(outcome.record.level <= record.level + 1);
        prop_assert!(outcome.record.level <= config().max_level);
        prop_assert!(outcome.record.points_per_click >= record.points_per_click);
        prop_assert_eq!(outcome.record.total_clicks_lifetime, record.total_clicks_lifetime + 1);
        prop_assert!(outcome.record.total_clicks_lifetime >= outcome.record.clicks_at_current_level);
        prop_assert_eq!(outcome.points_earned, record.points_per_click);
        prop_assert_eq!(outcome.level_changed, outcome.record.level != record.level);
    }

    #[test]
    fn prop_required_clicks_level_up_exactly_once(level in 1u32..6, points_per_click in 1u64..10_000) {
        let config = config();
        let required = required_clicks_for_level(&config, level + 1);
        let mut record = ProgressRecord {
            level,
            points_per_click,
            ..default_record()
        };
        for i in 0..required {
            let outcome = apply_click(&config, &record, at(i as i64));
            prop_assert_eq!(outcome.level_changed, i + 1 == required);
            record = outcome.record;
        }
        prop_assert_eq!(record.level, level + 1);
        prop_assert_eq!(record.clicks_at_current_level, 0);
    }

    #[test]
    fn prop_level_never_exceeds_max(clicks in 0u64..400) {
        let (record, _) = click_n(&default_record(), clicks);
        prop_assert!(record.level >= 1 && record.level <= config().max_level);
    }
}
