//! Black-box predictor seam. The tracker treats its models as opaque:
//! feature vectors in, numeric predictions out. The trait is the declared
//! interface; the baseline implementation is a deterministic heuristic
//! over the population thresholds, and a trained model can be swapped in
//! behind the same trait without touching the core.

mod baseline;

use std::sync::Arc;

use serde::Serialize;
use verdant_core::{ScoringContext, UtilityReading};

pub use baseline::BaselineEfficiencyModel;

/// Feature slice handed to an efficiency model.
#[derive(Debug, Clone, Serialize)]
pub struct UsageFeatures {
    pub reading: UtilityReading,
    pub household_size: u32,
    pub feature_count: usize,
}

impl UsageFeatures {
    pub fn from_reading(reading: &UtilityReading, context: Option<&ScoringContext>) -> Self {
        Self {
            reading: *reading,
            household_size: context.map_or(1, |ctx| ctx.household_size.max(1)),
            feature_count: context.map_or(0, |ctx| ctx.energy_features.len()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EfficiencyPrediction {
    /// 0-100 composite efficiency score.
    pub score: f64,
    pub model: &'static str,
}

pub trait EfficiencyModel: Send + Sync {
    fn predict(&self, features: &UsageFeatures) -> EfficiencyPrediction;
}

#[derive(Clone)]
pub struct VerdantMlStack {
    pub efficiency: Arc<dyn EfficiencyModel>,
}

impl VerdantMlStack {
    pub fn load_default() -> Self {
        Self {
            efficiency: Arc::new(BaselineEfficiencyModel),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_stack_predicts_in_range() {
        let stack = VerdantMlStack::load_default();
        let features =
            UsageFeatures::from_reading(&UtilityReading::new(40.0, 12.0, 4.0), None);
        let prediction = stack.efficiency.predict(&features);
        assert!((0.0..=100.0).contains(&prediction.score));
    }
}
