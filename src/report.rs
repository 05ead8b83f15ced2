use std::collections::HashMap;
use std::fmt::Write;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::models::{Flag, FlagType, Participant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagTypeSummary {
    pub flag_type: FlagType,
    pub count: usize,
    pub participants: usize,
}

pub fn summarize_by_type(flags: &[Flag]) -> Vec<FlagTypeSummary> {
    let mut map: HashMap<FlagType, (usize, std::collections::HashSet<Uuid>)> = HashMap::new();

    for flag in flags {
        let entry = map.entry(flag.flag_type).or_default();
        entry.0 += 1;
        entry.1.insert(flag.user_id);
    }

    let mut summaries: Vec<FlagTypeSummary> = map
        .into_iter()
        .map(|(flag_type, (count, users))| FlagTypeSummary {
            flag_type,
            count,
            participants: users.len(),
        })
        .collect();

    summaries.sort_by_key(|summary| summary.flag_type);
    summaries
}

pub fn build_report(
    cohort: Option<&str>,
    evaluated_on: NaiveDate,
    participants: &[Participant],
    flags: &[Flag],
) -> String {
    let names: HashMap<Uuid, &Participant> = participants.iter().map(|p| (p.id, p)).collect();
    let summaries = summarize_by_type(flags);

    let mut output = String::new();
    let cohort_label = cohort.unwrap_or("all cohorts");

    let _ = writeln!(output, "# Cohort Engagement Report");
    let _ = writeln!(
        output,
        "Generated for {} ({} participants, evaluated {})",
        cohort_label,
        participants.len(),
        evaluated_on
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Flag Mix");

    if summaries.is_empty() {
        let _ = writeln!(output, "No flags raised for this period.");
    } else {
        for summary in summaries.iter() {
            let _ = writeln!(
                output,
                "- {}: {} flags across {} participants",
                summary.flag_type, summary.count, summary.participants
            );
        }
    }

    let sections = [
        (FlagType::Red, "Attention Required", "Nobody needs immediate attention."),
        (FlagType::Yellow, "Monitor", "Nothing to monitor this period."),
        (FlagType::Green, "Celebrate", "No celebrations this period."),
    ];

    for (flag_type, heading, empty) in sections {
        let _ = writeln!(output);
        let _ = writeln!(output, "## {heading}");

        let mut any = false;
        for flag in flags.iter().filter(|f| f.flag_type == flag_type) {
            any = true;
            let who = names
                .get(&flag.user_id)
                .map(|p| format!("{} ({})", p.full_name, p.email))
                .unwrap_or_else(|| flag.user_id.to_string());
            let _ = writeln!(
                output,
                "- {}: {}. {}",
                who,
                flag.reason.description(),
                flag.recommended_action
            );
        }

        if !any {
            let _ = writeln!(output, "{empty}");
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FlagReason;
    use std::collections::BTreeMap;

    fn flag(user_id: Uuid, flag_type: FlagType, reason: FlagReason) -> Flag {
        Flag {
            user_id,
            flag_type,
            reason,
            context: BTreeMap::new(),
            recommended_action: "Follow up.".to_string(),
        }
    }

    #[test]
    fn summary_counts_flags_and_people() {
        let avery = Uuid::new_v4();
        let jules = Uuid::new_v4();
        let flags = vec![
            flag(avery, FlagType::Red, FlagReason::SuddenSilence),
            flag(avery, FlagType::Red, FlagReason::PartnerDisconnect),
            flag(jules, FlagType::Green, FlagReason::Breakthrough),
        ];

        let summaries = summarize_by_type(&flags);
        assert_eq!(
            summaries,
            vec![
                FlagTypeSummary {
                    flag_type: FlagType::Red,
                    count: 2,
                    participants: 1
                },
                FlagTypeSummary {
                    flag_type: FlagType::Green,
                    count: 1,
                    participants: 1
                },
            ]
        );
    }

    #[test]
    fn report_groups_flags_by_color() {
        let avery = Participant::from_email("Avery Lee", "avery.lee@groupscholar.com", "2026");
        let flags = vec![flag(avery.id, FlagType::Red, FlagReason::ProlongedAbsence)];
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();

        let report = build_report(Some("2026"), date, &[avery], &flags);
        assert!(report.contains("Generated for 2026 (1 participants, evaluated 2026-03-02)"));
        assert!(report.contains("- red: 1 flags across 1 participants"));
        assert!(report.contains("- Avery Lee (avery.lee@groupscholar.com): Prolonged absence. Follow up."));
        assert!(report.contains("Nothing to monitor this period."));
        assert!(report.contains("No celebrations this period."));
    }
}
