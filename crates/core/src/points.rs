use crate::models::{
    PointsResult, ScoringContext, UsageStatus, UsageStatuses, Utility, UtilityReading,
    ValidationPenalty,
};

/// A utility at `Excellent` earns this much; three Excellents sum to 9.99
/// and the context bonus can lift the total to the 10-point ceiling.
const EXCELLENT_POINTS: f64 = 3.33;
const MAX_POINTS: f64 = 10.0;

const HOUSEHOLD_BONUS_PER_MEMBER: f64 = 0.1;
const HOUSEHOLD_BONUS_CAP: f64 = 0.5;
const FEATURE_BONUS_PER_FEATURE: f64 = 0.05;
const FEATURE_BONUS_CAP: f64 = 0.5;

/// Flat subtraction per utility reading an implausibly low magnitude.
const FLOOR_PENALTY_POINTS: f64 = 2.0;

/// Per-day plausibility ceilings. At or beyond `extreme` the reading is
/// almost certainly a data-entry error.
const REALISTIC_MAX: [(Utility, f64, f64); 3] = [
    (Utility::Water, 1500.0, 5000.0),
    (Utility::Electricity, 150.0, 600.0),
    (Utility::Gas, 100.0, 400.0),
];

/// Per-day floors below which a reading looks like a dead or misread
/// meter rather than a frugal household.
const MINIMUM_FLOOR: [(Utility, f64); 3] = [
    (Utility::Water, 1.0),
    (Utility::Electricity, 0.2),
    (Utility::Gas, 0.02),
];

/// Features the bonus recognizes; unknown strings earn nothing.
const RECOGNIZED_FEATURES: &[&str] = &[
    "led_lighting",
    "smart_thermostat",
    "energy_star_appliances",
    "solar_panels",
    "insulation",
    "low_flow_fixtures",
    "rainwater_harvesting",
];

/// Magnitude sanity check. Never rejects: implausible values produce a
/// multiplicative penalty plus a warning string, and computation proceeds.
pub fn validate(reading: &UtilityReading) -> ValidationPenalty {
    let mut penalties = [1.0_f64; 3];
    let mut warnings = Vec::new();

    for (idx, (utility, realistic, extreme)) in REALISTIC_MAX.iter().enumerate() {
        let value = reading.get(*utility);
        penalties[idx] = if value >= *extreme {
            warnings.push(format!(
                "{} reading of {:.1} {} is beyond any plausible household figure",
                utility.as_str(),
                value,
                utility.unit()
            ));
            0.1
        } else if value >= *realistic {
            warnings.push(format!(
                "{} reading of {:.1} {} exceeds the realistic daily maximum",
                utility.as_str(),
                value,
                utility.unit()
            ));
            0.4
        } else if value >= realistic * 0.8 {
            warnings.push(format!(
                "{} reading of {:.1} {} is close to the realistic daily maximum",
                utility.as_str(),
                value,
                utility.unit()
            ));
            0.7
        } else {
            1.0
        };
    }

    ValidationPenalty {
        water_penalty: penalties[0],
        electricity_penalty: penalties[1],
        gas_penalty: penalties[2],
        overall_penalty: penalties.iter().sum::<f64>() / penalties.len() as f64,
        warnings,
    }
}

/// Converts statuses + efficiency + context into a bounded point value.
///
/// Order of operations: status base sum, efficiency step modifier,
/// additive context bonus, magnitude penalty multiplier, penalty-tier
/// hard cap, flat floor subtraction, final clamp to [0, 10]. The tier
/// cap guarantees a garbage entry cannot score highly no matter how
/// favorable the other components are.
pub fn score(
    statuses: &UsageStatuses,
    efficiency_score: f64,
    context: Option<&ScoringContext>,
    reading: &UtilityReading,
) -> PointsResult {
    let water_points = base_points(statuses.water);
    let electricity_points = base_points(statuses.electricity);
    let gas_points = base_points(statuses.gas);
    let base_sum = water_points + electricity_points + gas_points;

    let efficiency_modifier = efficiency_modifier(efficiency_score);
    let context_bonus = context.map_or(0.0, context_bonus);

    let penalty = validate(reading);
    let nominal = base_sum * efficiency_modifier + context_bonus;
    let scaled = nominal * penalty.overall_penalty;
    let capped = scaled.min(penalty_tier_cap(penalty.overall_penalty));

    let (floor_deduction, floor_warnings, valid) = floor_penalty(reading);
    let mut penalty = penalty;
    penalty.warnings.extend(floor_warnings);

    let final_points = (capped - floor_deduction).clamp(0.0, MAX_POINTS);

    PointsResult {
        water_points,
        electricity_points,
        gas_points,
        efficiency_modifier,
        context_bonus,
        penalty,
        final_points,
        valid,
    }
}

fn base_points(status: UsageStatus) -> f64 {
    match status {
        UsageStatus::Excellent => EXCELLENT_POINTS,
        UsageStatus::VeryGood => 3.0,
        UsageStatus::Good => 2.5,
        UsageStatus::Normal => 2.0,
        UsageStatus::AboveNormal => 1.5,
        UsageStatus::High => 1.0,
        UsageStatus::VeryHigh => 0.6,
        UsageStatus::Critical => 0.3,
        UsageStatus::Emergency => 0.0,
    }
}

/// Step reward for holistic efficiency beyond per-category status.
fn efficiency_modifier(efficiency_score: f64) -> f64 {
    if efficiency_score >= 90.0 {
        1.00
    } else if efficiency_score >= 80.0 {
        0.95
    } else if efficiency_score >= 70.0 {
        0.90
    } else if efficiency_score >= 50.0 {
        0.85
    } else if efficiency_score >= 30.0 {
        0.75
    } else {
        0.60
    }
}

/// +0.1 per household member beyond the first and +0.05 per recognized
/// energy feature, each capped at 0.5; the total bonus never exceeds 1.0.
fn context_bonus(context: &ScoringContext) -> f64 {
    let extra_members = f64::from(context.household_size.saturating_sub(1));
    let household = (extra_members * HOUSEHOLD_BONUS_PER_MEMBER).min(HOUSEHOLD_BONUS_CAP);

    let recognized = context
        .energy_features
        .iter()
        .filter(|feature| RECOGNIZED_FEATURES.contains(&feature.as_str()))
        .count();
    let features = (recognized as f64 * FEATURE_BONUS_PER_FEATURE).min(FEATURE_BONUS_CAP);

    household + features
}

fn penalty_tier_cap(overall_penalty: f64) -> f64 {
    // Tolerance keeps the mean of exact tier multipliers (e.g. 2.1 / 3)
    // from drifting past a boundary through float rounding.
    const EPS: f64 = 1e-9;

    if overall_penalty <= 0.2 + EPS {
        1.0
    } else if overall_penalty <= 0.4 + EPS {
        3.0
    } else if overall_penalty <= 0.7 + EPS {
        6.0
    } else {
        MAX_POINTS
    }
}

fn floor_penalty(reading: &UtilityReading) -> (f64, Vec<String>, bool) {
    let mut deduction = 0.0;
    let mut warnings = Vec::new();

    for (utility, floor) in MINIMUM_FLOOR {
        if reading.get(utility) < floor {
            deduction += FLOOR_PENALTY_POINTS;
            warnings.push(format!(
                "{} reading below the {:.2} {} plausibility floor; entry flagged invalid",
                utility.as_str(),
                floor,
                utility.unit()
            ));
        }
    }

    (deduction, warnings, deduction == 0.0)
}
