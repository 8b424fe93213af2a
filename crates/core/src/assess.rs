use crate::models::{
    ClimateZone, HousingType, ScoringContext, UsageStatus, UsageStatuses, Utility, UtilityReading,
};

/// Ascending per-day boundaries, one per status in `LADDER`. Readings above
/// the last boundary fall to `Emergency`.
const LADDER: [UsageStatus; 8] = [
    UsageStatus::Excellent,
    UsageStatus::VeryGood,
    UsageStatus::Good,
    UsageStatus::Normal,
    UsageStatus::AboveNormal,
    UsageStatus::High,
    UsageStatus::VeryHigh,
    UsageStatus::Critical,
];

const WATER_BOUNDS: [f64; 8] = [10.0, 30.0, 60.0, 120.0, 200.0, 400.0, 800.0, 1500.0];
const ELECTRICITY_BOUNDS: [f64; 8] = [5.0, 10.0, 18.0, 30.0, 45.0, 70.0, 110.0, 180.0];
const GAS_BOUNDS: [f64; 8] = [2.0, 4.0, 7.0, 12.0, 20.0, 35.0, 60.0, 100.0];

/// Personalized mode activates only past this many historical readings.
const PERSONAL_HISTORY_MIN: usize = 10;

/// Energy features the assessor recognizes, with the threshold reduction
/// each one applies. Efficient homes are held to a stricter bar.
const FEATURE_FACTORS: &[(&str, Utility, f64)] = &[
    ("led_lighting", Utility::Electricity, 0.90),
    ("smart_thermostat", Utility::Electricity, 0.95),
    ("smart_thermostat", Utility::Gas, 0.85),
    ("energy_star_appliances", Utility::Electricity, 0.85),
    ("solar_panels", Utility::Electricity, 0.70),
    ("insulation", Utility::Gas, 0.80),
    ("low_flow_fixtures", Utility::Water, 0.85),
    ("rainwater_harvesting", Utility::Water, 0.90),
];

pub fn default_bounds(utility: Utility) -> [f64; 8] {
    match utility {
        Utility::Water => WATER_BOUNDS,
        Utility::Electricity => ELECTRICITY_BOUNDS,
        Utility::Gas => GAS_BOUNDS,
    }
}

/// Population-default assessment: fixed thresholds, no household context.
pub fn default_assessment(reading: &UtilityReading) -> UsageStatuses {
    UsageStatuses {
        water: status_for(reading.water_gallons, &WATER_BOUNDS),
        electricity: status_for(reading.electricity_kwh, &ELECTRICITY_BOUNDS),
        gas: status_for(reading.gas_cubic_m, &GAS_BOUNDS),
    }
}

/// Context-aware assessment. With enough history (> 10 readings) each
/// utility is graded against ±30% bands around the household's own mean,
/// so a habitually high-usage home is measured against its own norm.
/// Otherwise the default thresholds are scaled by household composition,
/// climate, housing type, and energy features; all factors compose
/// multiplicatively.
pub fn personalized_assessment(reading: &UtilityReading, context: &ScoringContext) -> UsageStatuses {
    if context.historical_readings.len() > PERSONAL_HISTORY_MIN {
        return UsageStatuses {
            water: personal_status(reading.water_gallons, historical_mean(context, Utility::Water)),
            electricity: personal_status(
                reading.electricity_kwh,
                historical_mean(context, Utility::Electricity),
            ),
            gas: personal_status(reading.gas_cubic_m, historical_mean(context, Utility::Gas)),
        };
    }

    UsageStatuses {
        water: status_for(
            reading.water_gallons,
            &adjusted_bounds(Utility::Water, context),
        ),
        electricity: status_for(
            reading.electricity_kwh,
            &adjusted_bounds(Utility::Electricity, context),
        ),
        gas: status_for(reading.gas_cubic_m, &adjusted_bounds(Utility::Gas, context)),
    }
}

fn status_for(value: f64, bounds: &[f64; 8]) -> UsageStatus {
    for (bound, status) in bounds.iter().zip(LADDER.iter()) {
        if value <= *bound {
            return *status;
        }
    }
    UsageStatus::Emergency
}

fn historical_mean(context: &ScoringContext, utility: Utility) -> f64 {
    let history = &context.historical_readings;
    if history.is_empty() {
        return 0.0;
    }
    history.iter().map(|reading| reading.get(utility)).sum::<f64>() / history.len() as f64
}

/// Maps a value onto the ordinal ladder relative to the personal mean.
/// Within ±30% of the mean is Normal; a mean of zero degrades to the
/// safe middle status rather than dividing.
fn personal_status(value: f64, mean: f64) -> UsageStatus {
    if mean <= 0.0 {
        return UsageStatus::Normal;
    }

    let ratio = value / mean;
    if ratio <= 0.4 {
        UsageStatus::Excellent
    } else if ratio <= 0.7 {
        UsageStatus::Good
    } else if ratio <= 1.3 {
        UsageStatus::Normal
    } else if ratio <= 2.0 {
        UsageStatus::High
    } else if ratio <= 3.0 {
        UsageStatus::VeryHigh
    } else {
        UsageStatus::Critical
    }
}

fn adjusted_bounds(utility: Utility, context: &ScoringContext) -> [f64; 8] {
    let factor = context_factor(utility, context);
    let mut bounds = default_bounds(utility);
    for bound in &mut bounds {
        *bound *= factor;
    }
    bounds
}

fn context_factor(utility: Utility, context: &ScoringContext) -> f64 {
    let mut factor = household_factor(context.household_size);
    factor *= climate_factor(utility, context.climate_zone);
    factor *= housing_factor(utility, context.housing_type);

    for (feature, target, reduction) in FEATURE_FACTORS {
        if *target == utility && context.energy_features.contains(*feature) {
            factor *= reduction;
        }
    }

    factor
}

/// Sub-linear in household size: shared resources scale with economies
/// of scale, not per-capita.
fn household_factor(size: u32) -> f64 {
    f64::from(size.max(1)).powf(0.75)
}

fn climate_factor(utility: Utility, zone: ClimateZone) -> f64 {
    match (zone, utility) {
        (ClimateZone::Tropical | ClimateZone::Hot, Utility::Electricity) => 1.3,
        (ClimateZone::Tropical | ClimateZone::Hot, Utility::Gas) => 0.8,
        (ClimateZone::Cold | ClimateZone::Continental, Utility::Gas) => 1.4,
        _ => 1.0,
    }
}

fn housing_factor(utility: Utility, housing: HousingType) -> f64 {
    match (housing, utility) {
        (HousingType::House, Utility::Electricity | Utility::Gas) => 1.25,
        (HousingType::Apartment, Utility::Electricity | Utility::Gas) => 0.75,
        _ => 1.0,
    }
}

/// Actionable advice keyed off the worst statuses in an assessment.
pub fn recommendations(statuses: &UsageStatuses) -> Vec<String> {
    let mut advice = Vec::new();

    if statuses.water.rank() > UsageStatus::Normal.rank() {
        advice.push(
            "Water is above your target band: shorter showers and fixing leaks typically save 20+ gallons a day.".to_string(),
        );
    }
    if statuses.electricity.rank() > UsageStatus::Normal.rank() {
        advice.push(
            "Electricity is running high: switch to LED lighting and unplug idle electronics to cut standby drain.".to_string(),
        );
    }
    if statuses.gas.rank() > UsageStatus::Normal.rank() {
        advice.push(
            "Gas usage is elevated: lowering the thermostat 1-2 degrees and sealing drafts makes a measurable dent.".to_string(),
        );
    }

    if advice.is_empty() {
        advice.push(
            "All utilities are within or better than their target bands. Keep it up to hold your efficiency streak.".to_string(),
        );
    }

    advice
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(water: f64, electricity: f64, gas: f64) -> UtilityReading {
        UtilityReading::new(water, electricity, gas)
    }

    #[test]
    fn low_water_reading_is_excellent() {
        let statuses = default_assessment(&reading(3.5, 50.0, 5.0));
        assert_eq!(statuses.water, UsageStatus::Excellent);
        // 50 kWh sits between the 45 and 70 boundaries.
        assert_eq!(statuses.electricity, UsageStatus::High);
        assert_eq!(statuses.gas, UsageStatus::Good);
    }

    #[test]
    fn extreme_reading_is_emergency() {
        let statuses = default_assessment(&reading(2000.0, 500.0, 500.0));
        assert_eq!(statuses.water, UsageStatus::Emergency);
        assert_eq!(statuses.electricity, UsageStatus::Emergency);
        assert_eq!(statuses.gas, UsageStatus::Emergency);
    }

    #[test]
    fn assessment_is_idempotent() {
        let sample = reading(80.0, 22.0, 9.0);
        assert_eq!(default_assessment(&sample), default_assessment(&sample));
    }

    #[test]
    fn status_never_improves_as_usage_grows() {
        let mut last_rank = 0;
        for gallons in [1.0, 15.0, 45.0, 90.0, 150.0, 300.0, 600.0, 1000.0, 5000.0] {
            let statuses = default_assessment(&reading(gallons, 10.0, 3.0));
            assert!(statuses.water.rank() >= last_rank);
            last_rank = statuses.water.rank();
        }
    }

    #[test]
    fn personal_bands_grade_against_own_mean() {
        let mut context = ScoringContext::default();
        context.historical_readings = (0..15).map(|_| reading(4000.0, 30.0, 10.0)).collect();

        // 5000 is within +30% of a 4000 mean, so it grades Normal even
        // though the fixed bands would call it Emergency.
        let statuses = personalized_assessment(&reading(5000.0, 30.0, 10.0), &context);
        assert_eq!(statuses.water, UsageStatus::Normal);

        let fixed = default_assessment(&reading(5000.0, 30.0, 10.0));
        assert_eq!(fixed.water, UsageStatus::Emergency);
    }

    #[test]
    fn sparse_history_falls_back_to_adjusted_defaults() {
        let mut context = ScoringContext::default();
        context.historical_readings = vec![reading(4000.0, 30.0, 10.0); 3];

        let statuses = personalized_assessment(&reading(5000.0, 30.0, 10.0), &context);
        assert_eq!(statuses.water, UsageStatus::Emergency);
    }

    #[test]
    fn larger_households_get_looser_thresholds() {
        let small = ScoringContext::default();
        let large = ScoringContext::default().with_household_size(5);
        let sample = reading(200.0, 30.0, 10.0);

        let small_status = personalized_assessment(&sample, &small).water;
        let large_status = personalized_assessment(&sample, &large).water;
        assert!(large_status.rank() <= small_status.rank());
    }

    #[test]
    fn energy_features_tighten_the_bar() {
        let plain = ScoringContext::default();
        let mut efficient = ScoringContext::default();
        efficient.energy_features.insert("solar_panels".to_string());

        // 4 kWh passes the base Excellent bound but not the solar-adjusted one.
        let sample = reading(5.0, 4.0, 1.0);
        assert_eq!(
            personalized_assessment(&sample, &plain).electricity,
            UsageStatus::Excellent
        );
        assert_eq!(
            personalized_assessment(&sample, &efficient).electricity,
            UsageStatus::VeryGood
        );
    }

    #[test]
    fn hot_climate_raises_electricity_threshold() {
        let mut hot = ScoringContext::default();
        hot.climate_zone = ClimateZone::Tropical;
        let sample = reading(5.0, 6.0, 1.0);

        assert_eq!(
            personalized_assessment(&sample, &ScoringContext::default()).electricity,
            UsageStatus::VeryGood
        );
        assert_eq!(
            personalized_assessment(&sample, &hot).electricity,
            UsageStatus::Excellent
        );
    }

    #[test]
    fn recommendations_target_elevated_utilities() {
        let advice = recommendations(&UsageStatuses {
            water: UsageStatus::Excellent,
            electricity: UsageStatus::High,
            gas: UsageStatus::Normal,
        });
        assert_eq!(advice.len(), 1);
        assert!(advice[0].contains("Electricity"));
    }

    #[test]
    fn clean_assessment_gets_praise() {
        let advice = recommendations(&UsageStatuses {
            water: UsageStatus::Good,
            electricity: UsageStatus::Excellent,
            gas: UsageStatus::Normal,
        });
        assert_eq!(advice.len(), 1);
        assert!(advice[0].contains("within"));
    }
}
