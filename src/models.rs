use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub cohort: String,
}

impl Participant {
    /// Id derived from the email, so offline imports stay stable across runs.
    pub fn from_email(full_name: &str, email: &str, cohort: &str) -> Self {
        let email = email.trim().to_lowercase();
        Self {
            id: Uuid::new_v5(&Uuid::NAMESPACE_OID, email.as_bytes()),
            full_name: full_name.trim().to_string(),
            email,
            cohort: cohort.trim().to_string(),
        }
    }
}

/// Self-reported matching attributes. Any field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub experience_level: Option<String>,
    pub industry: Option<String>,
    pub time_zone: Option<String>,
    pub communication_style: Option<String>,
    pub team_size: Option<String>,
    pub goals: Option<String>,
}

impl Profile {
    /// Trims every field and treats blank values as not filled in.
    pub fn normalized(&self) -> Self {
        fn clean(value: &Option<String>) -> Option<String> {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        }

        Self {
            experience_level: clean(&self.experience_level),
            industry: clean(&self.industry),
            time_zone: clean(&self.time_zone),
            communication_style: clean(&self.communication_style),
            team_size: clean(&self.team_size),
            goals: clean(&self.goals),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Candidate {
    pub participant: Participant,
    pub profile: Profile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    ExperienceLevel,
    Industry,
    TimeZone,
    CommunicationStyle,
    TeamSize,
    Goals,
}

impl Dimension {
    pub const ALL: [Dimension; 6] = [
        Dimension::ExperienceLevel,
        Dimension::Industry,
        Dimension::TimeZone,
        Dimension::CommunicationStyle,
        Dimension::TeamSize,
        Dimension::Goals,
    ];

    pub fn max_points(self) -> u32 {
        match self {
            Dimension::ExperienceLevel => 20,
            Dimension::Industry => 15,
            Dimension::TimeZone => 25,
            Dimension::CommunicationStyle => 20,
            Dimension::TeamSize => 10,
            Dimension::Goals => 10,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Dimension::ExperienceLevel => "experience level",
            Dimension::Industry => "industry",
            Dimension::TimeZone => "time zone",
            Dimension::CommunicationStyle => "communication style",
            Dimension::TeamSize => "team size",
            Dimension::Goals => "goals",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionScore {
    pub dimension: Dimension,
    pub earned: u32,
    pub possible: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityResult {
    /// Percentage in `0..=100`.
    pub score: u8,
    pub earned: u32,
    pub possible: u32,
    pub dimensions: Vec<DimensionScore>,
}

/// Pre-aggregated activity for one participant over the caller's current and
/// previous periods.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivitySnapshot {
    pub user_id: Uuid,
    pub logins_current: Option<u32>,
    pub logins_previous: Option<u32>,
    pub posts_current: Option<u32>,
    pub posts_previous: Option<u32>,
    pub responses_current: Option<u32>,
    pub responses_previous: Option<u32>,
    pub last_login: Option<DateTime<Utc>>,
    pub last_partner_interaction: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct ActivityRecord {
    pub participant: Participant,
    pub snapshot: ActivitySnapshot,
}

/// Whole days elapsed since an event, or `Never` when it was not observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaysSince {
    Never,
    Days(i64),
}

impl DaysSince {
    pub fn at_least(self, days: i64) -> bool {
        match self {
            DaysSince::Never => true,
            DaysSince::Days(value) => value >= days,
        }
    }

    pub fn as_days(self) -> Option<i64> {
        match self {
            DaysSince::Never => None,
            DaysSince::Days(value) => Some(value),
        }
    }
}

/// A snapshot with absent counts read as zero and absent timestamps read as
/// never observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityCounters {
    pub logins_current: u32,
    pub logins_previous: u32,
    pub posts_current: u32,
    pub posts_previous: u32,
    pub responses_current: u32,
    pub responses_previous: u32,
    pub days_since_last_login: DaysSince,
    pub days_since_partner_interaction: DaysSince,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagType {
    Red,
    Yellow,
    Green,
}

impl FlagType {
    pub fn as_str(self) -> &'static str {
        match self {
            FlagType::Red => "red",
            FlagType::Yellow => "yellow",
            FlagType::Green => "green",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "red" => Some(FlagType::Red),
            "yellow" => Some(FlagType::Yellow),
            "green" => Some(FlagType::Green),
            _ => None,
        }
    }
}

impl fmt::Display for FlagType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagReason {
    ProlongedAbsence,
    SuddenSilence,
    PartnerDisconnect,
    LurkerPattern,
    DecliningEngagement,
    Breakthrough,
    ConsistentEngagement,
    /// Free-text reason supplied by the nuance layer.
    Nuanced(String),
}

impl FlagReason {
    pub fn code(&self) -> &str {
        match self {
            FlagReason::ProlongedAbsence => "prolonged_absence",
            FlagReason::SuddenSilence => "sudden_silence",
            FlagReason::PartnerDisconnect => "partner_disconnect",
            FlagReason::LurkerPattern => "lurker_pattern",
            FlagReason::DecliningEngagement => "declining_engagement",
            FlagReason::Breakthrough => "breakthrough",
            FlagReason::ConsistentEngagement => "consistent_engagement",
            FlagReason::Nuanced(_) => "nuanced",
        }
    }

    pub fn description(&self) -> &str {
        match self {
            FlagReason::ProlongedAbsence => "Prolonged absence",
            FlagReason::SuddenSilence => "Sudden silence despite continued presence",
            FlagReason::PartnerDisconnect => "Partner relationship may be broken",
            FlagReason::LurkerPattern => "Lurker pattern: high consumption, zero contribution",
            FlagReason::DecliningEngagement => "Declining engagement trend",
            FlagReason::Breakthrough => "Breakthrough: lurker became contributor",
            FlagReason::ConsistentEngagement => "Consistent high-quality engagement",
            FlagReason::Nuanced(text) => text.as_str(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flag {
    pub user_id: Uuid,
    pub flag_type: FlagType,
    pub reason: FlagReason,
    pub context: BTreeMap<String, serde_json::Value>,
    pub recommended_action: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_profile_drops_blank_fields() {
        let profile = Profile {
            industry: Some("  Tech ".to_string()),
            goals: Some("   ".to_string()),
            team_size: Some(String::new()),
            ..Profile::default()
        };

        let normalized = profile.normalized();
        assert_eq!(normalized.industry.as_deref(), Some("Tech"));
        assert_eq!(normalized.goals, None);
        assert_eq!(normalized.team_size, None);
    }

    #[test]
    fn dimension_weights_total_one_hundred() {
        let total: u32 = Dimension::ALL.iter().map(|d| d.max_points()).sum();
        assert_eq!(total, 100);
    }

    #[test]
    fn never_observed_satisfies_any_threshold() {
        assert!(DaysSince::Never.at_least(10_000));
        assert!(DaysSince::Days(14).at_least(14));
        assert!(!DaysSince::Days(13).at_least(14));
    }

    #[test]
    fn participant_ids_follow_email() {
        let a = Participant::from_email("Avery Lee", "Avery.Lee@groupscholar.com", "2026");
        let b = Participant::from_email("Avery L.", "avery.lee@groupscholar.com ", "2026");
        assert_eq!(a.id, b.id);
        assert_eq!(a.email, "avery.lee@groupscholar.com");
    }

    #[test]
    fn flag_type_parses_case_insensitively() {
        assert_eq!(FlagType::parse("RED"), Some(FlagType::Red));
        assert_eq!(FlagType::parse(" green"), Some(FlagType::Green));
        assert_eq!(FlagType::parse("orange"), None);
    }
}
