use crate::assess::default_bounds;
use crate::models::{EnvironmentalClass, UsageBand, Utility, UtilityReading};

/// Per-day band cuts used for the environmental class: at or below the
/// first value is Low, at or above the second is High.
const BAND_CUTS: [(Utility, f64, f64); 3] = [
    (Utility::Water, 50.0, 150.0),
    (Utility::Electricity, 15.0, 40.0),
    (Utility::Gas, 5.0, 18.0),
];

/// Tri-level sustainability rating over a history snapshot: Class A when
/// at least two utilities average Low, Class C when at least two average
/// High, Class B otherwise. Pure function of the history: recomputing
/// after every save is idempotent, there is no incremental state.
pub fn environmental_class(history: &[UtilityReading]) -> EnvironmentalClass {
    if history.is_empty() {
        return EnvironmentalClass::B;
    }

    let mut low = 0;
    let mut high = 0;

    for (utility, low_cut, high_cut) in BAND_CUTS {
        let mean =
            history.iter().map(|reading| reading.get(utility)).sum::<f64>() / history.len() as f64;
        match band_for(mean, low_cut, high_cut) {
            UsageBand::Low => low += 1,
            UsageBand::High => high += 1,
            UsageBand::Normal => {}
        }
    }

    if low >= 2 {
        EnvironmentalClass::A
    } else if high >= 2 {
        EnvironmentalClass::C
    } else {
        EnvironmentalClass::B
    }
}

pub fn band_for(mean: f64, low_cut: f64, high_cut: f64) -> UsageBand {
    if mean <= low_cut {
        UsageBand::Low
    } else if mean >= high_cut {
        UsageBand::High
    } else {
        UsageBand::Normal
    }
}

/// 0-100 composite of usage relative to the population baselines (the
/// Normal boundary of each default threshold table). Zero usage scores
/// 100, the baseline scores 50, and twice the baseline or more scores 0;
/// the composite is the mean across the three utilities. Monotonically
/// non-increasing in every utility.
pub fn efficiency_score(reading: &UtilityReading) -> f64 {
    let per_utility = Utility::ALL.map(|utility| {
        let baseline = default_bounds(utility)[3];
        let ratio = reading.get(utility) / baseline;
        (1.0 - ratio / 2.0).clamp(0.0, 1.0) * 100.0
    });

    per_utility.iter().sum::<f64>() / per_utility.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(water: f64, electricity: f64, gas: f64) -> UtilityReading {
        UtilityReading::new(water, electricity, gas)
    }

    #[test]
    fn empty_history_defaults_to_class_b() {
        assert_eq!(environmental_class(&[]), EnvironmentalClass::B);
    }

    #[test]
    fn frugal_history_earns_class_a() {
        let history = vec![reading(20.0, 8.0, 2.0); 6];
        assert_eq!(environmental_class(&history), EnvironmentalClass::A);
    }

    #[test]
    fn heavy_history_earns_class_c() {
        let history = vec![reading(300.0, 60.0, 25.0); 6];
        assert_eq!(environmental_class(&history), EnvironmentalClass::C);
    }

    #[test]
    fn mixed_history_is_class_b() {
        // Water Low, electricity High, gas Normal.
        let history = vec![reading(20.0, 60.0, 10.0); 6];
        assert_eq!(environmental_class(&history), EnvironmentalClass::B);
    }

    #[test]
    fn class_recompute_is_idempotent() {
        let history = vec![reading(80.0, 20.0, 6.0); 12];
        assert_eq!(environmental_class(&history), environmental_class(&history));
    }

    #[test]
    fn efficiency_score_bounds() {
        assert_eq!(efficiency_score(&reading(0.0, 0.0, 0.0)), 100.0);
        assert_eq!(efficiency_score(&reading(5000.0, 500.0, 200.0)), 0.0);

        let mid = efficiency_score(&reading(120.0, 30.0, 12.0));
        assert!((mid - 50.0).abs() < 1e-9);
    }

    #[test]
    fn efficiency_score_decreases_with_usage() {
        let lighter = efficiency_score(&reading(40.0, 10.0, 4.0));
        let heavier = efficiency_score(&reading(80.0, 10.0, 4.0));
        assert!(heavier < lighter);
    }
}
