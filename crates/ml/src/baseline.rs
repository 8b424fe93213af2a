use verdant_core::efficiency_score;

use crate::{EfficiencyModel, EfficiencyPrediction, UsageFeatures};

/// Deterministic heuristic standing in for a trained regressor: the
/// population-baseline composite, relaxed slightly for larger households
/// since the thresholds it measures against are per-home, not per-person.
#[derive(Debug, Default, Clone)]
pub struct BaselineEfficiencyModel;

impl EfficiencyModel for BaselineEfficiencyModel {
    fn predict(&self, features: &UsageFeatures) -> EfficiencyPrediction {
        let raw = efficiency_score(&features.reading);

        // +2 per member beyond the first, capped; a six-person home is
        // not graded like a studio apartment.
        let household_relief = f64::from(features.household_size.saturating_sub(1)).min(5.0) * 2.0;

        EfficiencyPrediction {
            score: (raw + household_relief).clamp(0.0, 100.0),
            model: "baseline-threshold",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use verdant_core::UtilityReading;

    #[test]
    fn score_decreases_with_heavier_usage() {
        let model = BaselineEfficiencyModel;
        let light = model.predict(&UsageFeatures {
            reading: UtilityReading::new(20.0, 8.0, 3.0),
            household_size: 1,
            feature_count: 0,
        });
        let heavy = model.predict(&UsageFeatures {
            reading: UtilityReading::new(300.0, 80.0, 30.0),
            household_size: 1,
            feature_count: 0,
        });
        assert!(heavy.score < light.score);
    }

    #[test]
    fn household_relief_is_capped() {
        let model = BaselineEfficiencyModel;
        let reading = UtilityReading::new(120.0, 30.0, 12.0);
        let six = model.predict(&UsageFeatures {
            reading,
            household_size: 6,
            feature_count: 0,
        });
        let twenty = model.predict(&UsageFeatures {
            reading,
            household_size: 20,
            feature_count: 0,
        });
        assert_eq!(six.score, twenty.score);
    }
}
