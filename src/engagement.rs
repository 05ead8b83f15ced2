use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::models::{ActivityCounters, ActivitySnapshot, DaysSince, Flag, FlagReason, FlagType};

pub const ABSENCE_DAYS: i64 = 10;
pub const PARTNER_SILENCE_DAYS: i64 = 14;

struct Rule {
    flag_type: FlagType,
    reason: FlagReason,
    applies: fn(&ActivityCounters) -> bool,
    evidence: fn(&ActivityCounters) -> Vec<(&'static str, Value)>,
    recommended_action: &'static str,
}

// Evaluated in order; every rule sees the same counters and none suppresses another.
static RULES: [Rule; 7] = [
    Rule {
        flag_type: FlagType::Red,
        reason: FlagReason::ProlongedAbsence,
        applies: |c: &ActivityCounters| c.days_since_last_login.at_least(ABSENCE_DAYS),
        evidence: |c: &ActivityCounters| {
            vec![("days_since_last_login", days_value(c.days_since_last_login))]
        },
        recommended_action: "Reach out personally to check in and invite them back to the cohort.",
    },
    Rule {
        flag_type: FlagType::Red,
        reason: FlagReason::SuddenSilence,
        applies: |c: &ActivityCounters| {
            c.posts_previous >= 3 && c.posts_current == 0 && c.logins_current > 0
        },
        evidence: |c: &ActivityCounters| {
            vec![
                ("posts_previous", json!(c.posts_previous)),
                ("posts_current", json!(c.posts_current)),
                ("logins_current", json!(c.logins_current)),
            ]
        },
        recommended_action: "Send a private note asking how things are going; they are still reading but stopped sharing.",
    },
    Rule {
        flag_type: FlagType::Red,
        reason: FlagReason::PartnerDisconnect,
        applies: |c: &ActivityCounters| {
            c.days_since_partner_interaction.at_least(PARTNER_SILENCE_DAYS) && c.logins_current > 0
        },
        evidence: |c: &ActivityCounters| {
            vec![
                (
                    "days_since_partner_interaction",
                    days_value(c.days_since_partner_interaction),
                ),
                ("logins_current", json!(c.logins_current)),
            ]
        },
        recommended_action: "Check in with both partners and consider re-matching if the pairing has stalled.",
    },
    Rule {
        flag_type: FlagType::Yellow,
        reason: FlagReason::LurkerPattern,
        applies: |c: &ActivityCounters| {
            c.logins_current >= 4 && c.posts_current == 0 && c.responses_current == 0
        },
        evidence: |c: &ActivityCounters| {
            vec![
                ("logins_current", json!(c.logins_current)),
                ("posts_current", json!(c.posts_current)),
                ("responses_current", json!(c.responses_current)),
            ]
        },
        recommended_action: "Invite them to answer a low-stakes discussion prompt.",
    },
    Rule {
        flag_type: FlagType::Yellow,
        reason: FlagReason::DecliningEngagement,
        applies: |c: &ActivityCounters| {
            c.logins_previous >= 4 && c.logins_current > 0 && c.logins_current <= 2
        },
        evidence: |c: &ActivityCounters| {
            vec![
                ("logins_previous", json!(c.logins_previous)),
                ("logins_current", json!(c.logins_current)),
            ]
        },
        recommended_action: "Watch next period's activity and mention upcoming sessions in the weekly update.",
    },
    Rule {
        flag_type: FlagType::Green,
        reason: FlagReason::Breakthrough,
        applies: |c: &ActivityCounters| {
            c.posts_previous == 0 && c.posts_current >= 2 && c.logins_previous >= 3
        },
        evidence: |c: &ActivityCounters| {
            vec![
                ("posts_previous", json!(c.posts_previous)),
                ("posts_current", json!(c.posts_current)),
                ("logins_previous", json!(c.logins_previous)),
            ]
        },
        recommended_action: "Celebrate their first contributions publicly and reply to their posts.",
    },
    Rule {
        flag_type: FlagType::Green,
        reason: FlagReason::ConsistentEngagement,
        applies: |c: &ActivityCounters| {
            c.logins_current >= 5 && c.posts_current >= 2 && c.responses_current >= 3
        },
        evidence: |c: &ActivityCounters| {
            vec![
                ("logins_current", json!(c.logins_current)),
                ("posts_current", json!(c.posts_current)),
                ("responses_current", json!(c.responses_current)),
            ]
        },
        recommended_action: "Recognise their contribution and consider inviting them to mentor peers.",
    },
];

fn days_value(days: DaysSince) -> Value {
    match days.as_days() {
        Some(value) => json!(value),
        None => Value::Null,
    }
}

/// Whole days between `at` and `now`; events stamped in the future count as today.
pub fn days_since(at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DaysSince {
    match at {
        None => DaysSince::Never,
        Some(at) => DaysSince::Days((now - at).num_days().max(0)),
    }
}

impl ActivitySnapshot {
    pub fn normalize(&self, now: DateTime<Utc>) -> ActivityCounters {
        ActivityCounters {
            logins_current: self.logins_current.unwrap_or(0),
            logins_previous: self.logins_previous.unwrap_or(0),
            posts_current: self.posts_current.unwrap_or(0),
            posts_previous: self.posts_previous.unwrap_or(0),
            responses_current: self.responses_current.unwrap_or(0),
            responses_previous: self.responses_previous.unwrap_or(0),
            days_since_last_login: days_since(self.last_login, now),
            days_since_partner_interaction: days_since(self.last_partner_interaction, now),
        }
    }
}

pub fn classify(snapshot: &ActivitySnapshot, now: DateTime<Utc>) -> Vec<Flag> {
    let counters = snapshot.normalize(now);

    RULES
        .iter()
        .filter(|rule| (rule.applies)(&counters))
        .map(|rule| Flag {
            user_id: snapshot.user_id,
            flag_type: rule.flag_type,
            reason: rule.reason.clone(),
            context: (rule.evidence)(&counters)
                .into_iter()
                .map(|(key, value)| (key.to_string(), value))
                .collect::<BTreeMap<_, _>>(),
            recommended_action: rule.recommended_action.to_string(),
        })
        .collect()
}

pub fn classify_batch(snapshots: &[ActivitySnapshot], now: DateTime<Utc>) -> Vec<Flag> {
    let flags: Vec<Flag> = snapshots
        .iter()
        .flat_map(|snapshot| classify(snapshot, now))
        .collect();

    tracing::info!(
        participants = snapshots.len(),
        flags = flags.len(),
        "classified engagement"
    );

    flags
}
