use {
    bevy::prelude::*,
    growth::{ExponentialGrowth, Growth, GrowthStrategy},
    serde::{Deserialize, Serialize},
    thiserror::Error,
};

/// Tuning for candy progression.
#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressionConfig {
    pub max_level: u32,
    /// Clicks needed to leave a level. Step 0 is level 1 -> 2.
    pub click_curve: Growth,
    /// Points per click is multiplied by this and floored on every level-up.
    pub points_per_click_growth: f64,
    pub starting_points_per_click: u64,
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            max_level: 6,
            click_curve: Growth::Exponential(ExponentialGrowth::new(10.0, 1.5)),
            points_per_click_growth: 1.2,
            starting_points_per_click: 1,
        }
    }
}

impl ProgressionConfig {
    pub fn validate(&self) -> Result<(), InvalidProgressionConfig> {
        if self.max_level < 1 {
            return Err(InvalidProgressionConfig::MaxLevel(self.max_level));
        }
        if !self.points_per_click_growth.is_finite() || self.points_per_click_growth < 1.0 {
            return Err(InvalidProgressionConfig::PointsGrowth(
                self.points_per_click_growth,
            ));
        }
        if self.starting_points_per_click == 0 {
            return Err(InvalidProgressionConfig::StartingPoints);
        }
        if !self.click_curve.is_non_decreasing() {
            return Err(InvalidProgressionConfig::DecreasingCurve);
        }
        if self.max_level > 1 && self.click_curve.floor_at(0) == 0 {
            return Err(InvalidProgressionConfig::ZeroThreshold);
        }
        Ok(())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvalidProgressionConfig {
    #[error("max_level must be at least 1, got {0}")]
    MaxLevel(u32),

    #[error("points_per_click_growth must be a finite value >= 1.0, got {0}")]
    PointsGrowth(f64),

    #[error("starting_points_per_click must be positive")]
    StartingPoints,

    #[error("click_curve must never decrease")]
    DecreasingCurve,

    #[error("click_curve yields 0 clicks for the first level-up")]
    ZeroThreshold,
}

#[cfg(test)]
mod tests {
    use {super::*, growth::LinearGrowth};

    #[test]
    fn test_default_is_valid() {
        assert_eq!(ProgressionConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_rejects_bad_values() {
        let config = ProgressionConfig {
            max_level: 0,
            ..default()
        };
        assert_eq!(config.validate(), Err(InvalidProgressionConfig::MaxLevel(0)));

        let config = ProgressionConfig {
            points_per_click_growth: 0.9,
            ..default()
        };
        assert!(matches!(
            config.validate(),
            Err(InvalidProgressionConfig::PointsGrowth(_))
        ));

        let config = ProgressionConfig {
            click_curve: Growth::Linear(LinearGrowth::new(10.0, -1.0)),
            ..default()
        };
        assert_eq!(
            config.validate(),
            Err(InvalidProgressionConfig::DecreasingCurve)
        );

        let config = ProgressionConfig {
            click_curve: Growth::Linear(LinearGrowth::new(0.5, 1.0)),
            ..default()
        };
        assert_eq!(config.validate(), Err(InvalidProgressionConfig::ZeroThreshold));
    }

    #[test]
    fn test_partial_ron_keeps_defaults() {
        let config: ProgressionConfig = ron::from_str("(max_level: 10)").unwrap();
        assert_eq!(config.max_level, 10);
        assert_eq!(config.points_per_click_growth, 1.2);
        assert_eq!(config.click_curve, ProgressionConfig::default().click_curve);
    }
}
