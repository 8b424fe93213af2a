use std::collections::{BTreeMap, BTreeSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Utility {
    Water,
    Electricity,
    Gas,
}

impl Utility {
    pub const ALL: [Utility; 3] = [Utility::Water, Utility::Electricity, Utility::Gas];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Water => "water",
            Self::Electricity => "electricity",
            Self::Gas => "gas",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Self::Water => "gal",
            Self::Electricity => "kWh",
            Self::Gas => "m³",
        }
    }
}

/// One day of metered usage. Negative inputs are clamped at construction;
/// a reading is never mutated after it has been assessed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UtilityReading {
    pub water_gallons: f64,
    pub electricity_kwh: f64,
    pub gas_cubic_m: f64,
    pub recorded_at: DateTime<Utc>,
}

impl UtilityReading {
    pub fn new(water_gallons: f64, electricity_kwh: f64, gas_cubic_m: f64) -> Self {
        Self {
            water_gallons: water_gallons.max(0.0),
            electricity_kwh: electricity_kwh.max(0.0),
            gas_cubic_m: gas_cubic_m.max(0.0),
            recorded_at: Utc::now(),
        }
    }

    pub fn get(&self, utility: Utility) -> f64 {
        match utility {
            Utility::Water => self.water_gallons,
            Utility::Electricity => self.electricity_kwh,
            Utility::Gas => self.gas_cubic_m,
        }
    }
}

/// Ordinal status vocabulary, best first. Lower usage maps to a better
/// status for every consumption metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageStatus {
    Excellent,
    VeryGood,
    Good,
    Normal,
    AboveNormal,
    High,
    VeryHigh,
    Critical,
    Emergency,
}

impl UsageStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::VeryGood => "Very Good",
            Self::Good => "Good",
            Self::Normal => "Normal",
            Self::AboveNormal => "Above Normal",
            Self::High => "High",
            Self::VeryHigh => "Very High",
            Self::Critical => "Critical",
            Self::Emergency => "Emergency",
        }
    }

    /// Ordinal rank, 0 = best.
    pub fn rank(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStatuses {
    pub water: UsageStatus,
    pub electricity: UsageStatus,
    pub gas: UsageStatus,
}

impl UsageStatuses {
    pub fn get(&self, utility: Utility) -> UsageStatus {
        match utility {
            Utility::Water => self.water,
            Utility::Electricity => self.electricity,
            Utility::Gas => self.gas,
        }
    }
}

/// Low/Normal/High framing used for the environmental class bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageBand {
    Low,
    Normal,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EnvironmentalClass {
    A,
    B,
    C,
}

impl EnvironmentalClass {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
        }
    }

    pub fn from_optional_str(value: Option<&str>) -> Option<Self> {
        match value.map(|v| v.trim().to_uppercase()) {
            Some(v) if v == "A" => Some(Self::A),
            Some(v) if v == "B" => Some(Self::B),
            Some(v) if v == "C" => Some(Self::C),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HousingType {
    Apartment,
    Townhouse,
    House,
    Unknown,
}

impl HousingType {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "apartment" | "flat" | "condo" => Self::Apartment,
            "townhouse" | "duplex" => Self::Townhouse,
            "house" | "detached" | "villa" => Self::House,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationType {
    Urban,
    Suburban,
    Rural,
    Unknown,
}

impl LocationType {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "urban" | "city" => Self::Urban,
            "suburban" | "suburb" => Self::Suburban,
            "rural" | "countryside" | "village" => Self::Rural,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClimateZone {
    Tropical,
    Hot,
    Temperate,
    Continental,
    Cold,
    Unknown,
}

impl ClimateZone {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "tropical" => Self::Tropical,
            "hot" | "arid" | "desert" => Self::Hot,
            "temperate" | "mediterranean" | "mild" => Self::Temperate,
            "continental" => Self::Continental,
            "cold" | "polar" | "subarctic" => Self::Cold,
            _ => Self::Unknown,
        }
    }
}

/// Household profile consumed by assessment and scoring. Every field has a
/// declared default so callers never reach for permissive attribute lookup;
/// the struct is read-only to the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringContext {
    pub household_size: u32,
    pub adults: u32,
    pub children: u32,
    pub seniors: u32,
    pub housing_type: HousingType,
    pub location_type: LocationType,
    pub climate_zone: ClimateZone,
    pub energy_features: BTreeSet<String>,
    /// Most recent first.
    pub historical_readings: Vec<UtilityReading>,
}

impl Default for ScoringContext {
    fn default() -> Self {
        Self {
            household_size: 1,
            adults: 1,
            children: 0,
            seniors: 0,
            housing_type: HousingType::Unknown,
            location_type: LocationType::Unknown,
            climate_zone: ClimateZone::Unknown,
            energy_features: BTreeSet::new(),
            historical_readings: Vec::new(),
        }
    }
}

impl ScoringContext {
    pub fn with_household_size(mut self, size: u32) -> Self {
        self.household_size = size.max(1);
        self
    }
}

/// Multiplicative reduction triggered by unrealistic raw magnitudes.
/// Invalidity is signalled through `warnings`, never through errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationPenalty {
    pub water_penalty: f64,
    pub electricity_penalty: f64,
    pub gas_penalty: f64,
    pub overall_penalty: f64,
    pub warnings: Vec<String>,
}

impl ValidationPenalty {
    pub fn clean() -> Self {
        Self {
            water_penalty: 1.0,
            electricity_penalty: 1.0,
            gas_penalty: 1.0,
            overall_penalty: 1.0,
            warnings: Vec::new(),
        }
    }
}

/// Per-reading point breakdown. Computed fresh per reading and never
/// mutated afterwards; `final_points` is always within [0, 10].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointsResult {
    pub water_points: f64,
    pub electricity_points: f64,
    pub gas_points: f64,
    pub efficiency_modifier: f64,
    pub context_bonus: f64,
    pub penalty: ValidationPenalty,
    pub final_points: f64,
    pub valid: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Greeting,
    UtilityHelp,
    RecyclingHelp,
    Comparison,
    Recommendations,
    EnvironmentalEducation,
    Troubleshooting,
    Fundamentals,
    PointsScoring,
    GlobalCommunity,
    General,
}

impl Intent {
    pub const ALL: [Intent; 11] = [
        Intent::Greeting,
        Intent::UtilityHelp,
        Intent::RecyclingHelp,
        Intent::Comparison,
        Intent::Recommendations,
        Intent::EnvironmentalEducation,
        Intent::Troubleshooting,
        Intent::Fundamentals,
        Intent::PointsScoring,
        Intent::GlobalCommunity,
        Intent::General,
    ];
}

/// Entities pulled from a single normalized message. Transient; sets are
/// ordered so extraction output is stable across runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entities {
    pub utilities: BTreeSet<Utility>,
    pub materials: BTreeSet<String>,
    pub numbers: Vec<f64>,
    pub time_references: Vec<String>,
    pub comparison_terms: Vec<String>,
}

/// Bounded rolling window of recent raw user inputs. Only used to bias
/// fallback responses; nothing here is persisted long-term.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationWindow {
    entries: VecDeque<String>,
}

impl ConversationWindow {
    pub const CAPACITY: usize = 10;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, raw: impl Into<String>) {
        if self.entries.len() >= Self::CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(raw.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// Most recent entries first.
    pub fn recent(&self, count: usize) -> impl Iterator<Item = &str> {
        self.entries.iter().rev().take(count).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingEntry {
    pub username: String,
    pub total_points: f64,
    pub class: EnvironmentalClass,
    pub location: String,
}

/// Community aggregate snapshot. Served through a short-TTL read-through
/// cache; staleness is acceptable by design.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalInsights {
    pub total_users: u64,
    pub average_points: f64,
    pub class_distribution: BTreeMap<EnvironmentalClass, u64>,
    pub top_performers: Vec<RankingEntry>,
}

/// Individual profile slice handed to the response composer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserContext {
    pub user_id: String,
    pub username: String,
    pub total_points: f64,
    pub class: Option<EnvironmentalClass>,
    pub scoring: ScoringContext,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub at: DateTime<Utc>,
    pub user_text: String,
    pub assistant_text: String,
    pub intent: Intent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSession {
    pub session_id: String,
    pub user_id: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub turns: Vec<ConversationTurn>,
}

impl ConversationSession {
    /// Window of the most recent raw user inputs, oldest first.
    pub fn window(&self) -> ConversationWindow {
        let mut window = ConversationWindow::new();
        let skip = self.turns.len().saturating_sub(ConversationWindow::CAPACITY);
        for turn in self.turns.iter().skip(skip) {
            window.push(turn.user_text.clone());
        }
        window
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatInput {
    pub session_id: Option<String>,
    pub text: String,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EcoReply {
    pub reply_text: String,
    pub intent: Intent,
    pub normalized_text: String,
    pub entities: Entities,
    pub session_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reading_clamps_negative_values() {
        let reading = UtilityReading::new(-5.0, 12.0, -0.1);
        assert_eq!(reading.water_gallons, 0.0);
        assert_eq!(reading.electricity_kwh, 12.0);
        assert_eq!(reading.gas_cubic_m, 0.0);
    }

    #[test]
    fn status_rank_is_ordinal() {
        assert!(UsageStatus::Excellent.rank() < UsageStatus::Normal.rank());
        assert!(UsageStatus::Critical.rank() < UsageStatus::Emergency.rank());
    }

    #[test]
    fn conversation_window_is_bounded() {
        let mut window = ConversationWindow::new();
        for i in 0..25 {
            window.push(format!("message {i}"));
        }
        assert_eq!(window.len(), ConversationWindow::CAPACITY);
        assert_eq!(window.recent(1).next(), Some("message 24"));
    }

    #[test]
    fn housing_type_parses_synonyms() {
        assert_eq!(HousingType::parse("Condo"), HousingType::Apartment);
        assert_eq!(HousingType::parse("detached"), HousingType::House);
        assert_eq!(HousingType::parse("yurt"), HousingType::Unknown);
    }
}
