use serde::{Deserialize, Serialize};

/// A curve mapping a step index to a value.
///
/// Step 0 is the base value. Callers decide what a step means; the click
/// thresholds use `current level - 1`.
pub trait GrowthStrategy {
    fn calculate(&self, step: u32) -> f64;

    /// Value at `step`, floored to a whole number. Negative values clamp to 0.
    fn floor_at(&self, step: u32) -> u64 {
        let value = self.calculate(step).floor();
        if value.is_finite() && value > 0.0 {
            value as u64
        } else {
            0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearGrowth {
    /// Value at step 0
    pub base: f64,
    /// Added per step
    pub increment: f64,
}

impl LinearGrowth {
    pub fn new(base: f64, increment: f64) -> Self {
        Self { base, increment }
    }
}

impl GrowthStrategy for LinearGrowth {
    fn calculate(&self, step: u32) -> f64 {
        self.base + (self.increment * step as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExponentialGrowth {
    /// Value at step 0
    pub base: f64,
    /// Multiplier per step (e.g. 1.5 for +50%)
    pub factor: f64,
}

impl ExponentialGrowth {
    pub fn new(base: f64, factor: f64) -> Self {
        Self { base, factor }
    }
}

impl GrowthStrategy for ExponentialGrowth {
    fn calculate(&self, step: u32) -> f64 {
        self.base * self.factor.powi(step as i32)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StaticGrowth {
    pub base: f64,
}

impl GrowthStrategy for StaticGrowth {
    fn calculate(&self, _: u32) -> f64 {
        self.base
    }
}

/// Serializable choice of curve, used in config files.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Growth {
    Linear(LinearGrowth),
    Exponential(ExponentialGrowth),
    Static(StaticGrowth),
}

impl Growth {
    /// True when no step ever yields a smaller value than the step before it.
    pub fn is_non_decreasing(&self) -> bool {
        match self {
            Growth::Linear(g) => g.increment >= 0.0,
            Growth::Exponential(g) => g.base >= 0.0 && g.factor >= 1.0,
            Growth::Static(_) => true,
        }
    }
}

impl GrowthStrategy for Growth {
    fn calculate(&self, step: u32) -> f64 {
        match self {
            Growth::Linear(g) => g.calculate(step),
            Growth::Exponential(g) => g.calculate(step),
            Growth::Static(g) => g.calculate(step),
        }
    }
}
