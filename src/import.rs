use std::io::Read;
use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::models::{ActivityRecord, ActivitySnapshot, Candidate, Participant, Profile};

#[derive(Debug, Deserialize)]
struct ActivityRow {
    full_name: String,
    email: String,
    cohort: String,
    logins_current: Option<u32>,
    logins_previous: Option<u32>,
    posts_current: Option<u32>,
    posts_previous: Option<u32>,
    responses_current: Option<u32>,
    responses_previous: Option<u32>,
    last_login: Option<DateTime<Utc>>,
    last_partner_interaction: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct ProfileRow {
    full_name: String,
    email: String,
    cohort: String,
    experience_level: Option<String>,
    industry: Option<String>,
    time_zone: Option<String>,
    communication_style: Option<String>,
    team_size: Option<String>,
    goals: Option<String>,
}

pub fn read_activity<R: Read>(reader: R) -> anyhow::Result<Vec<ActivityRecord>> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut records = Vec::new();

    for (line, result) in reader.deserialize::<ActivityRow>().enumerate() {
        let row = result.with_context(|| format!("invalid activity row {}", line + 1))?;
        let participant = Participant::from_email(&row.full_name, &row.email, &row.cohort);
        records.push(ActivityRecord {
            snapshot: ActivitySnapshot {
                user_id: participant.id,
                logins_current: row.logins_current,
                logins_previous: row.logins_previous,
                posts_current: row.posts_current,
                posts_previous: row.posts_previous,
                responses_current: row.responses_current,
                responses_previous: row.responses_previous,
                last_login: row.last_login,
                last_partner_interaction: row.last_partner_interaction,
            },
            participant,
        });
    }

    Ok(records)
}

pub fn read_profiles<R: Read>(reader: R) -> anyhow::Result<Vec<Candidate>> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut candidates = Vec::new();

    for (line, result) in reader.deserialize::<ProfileRow>().enumerate() {
        let row = result.with_context(|| format!("invalid profile row {}", line + 1))?;
        candidates.push(Candidate {
            participant: Participant::from_email(&row.full_name, &row.email, &row.cohort),
            profile: Profile {
                experience_level: row.experience_level,
                industry: row.industry,
                time_zone: row.time_zone,
                communication_style: row.communication_style,
                team_size: row.team_size,
                goals: row.goals,
            }
            .normalized(),
        });
    }

    Ok(candidates)
}

pub fn read_activity_file(path: &Path) -> anyhow::Result<Vec<ActivityRecord>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    read_activity(file)
}

pub fn read_profiles_file(path: &Path) -> anyhow::Result<Vec<Candidate>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    read_profiles(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const ACTIVITY: &str = "\
full_name,email,cohort,logins_current,logins_previous,posts_current,posts_previous,responses_current,responses_previous,last_login,last_partner_interaction
Avery Lee,avery.lee@groupscholar.com,2026,2,5,0,4,1,3,2026-02-28T10:00:00Z,
Jules Moreno,jules.moreno@groupscholar.com,2025,,,,,,,,
";

    const PROFILES: &str = "\
full_name,email,cohort,experience_level,industry,time_zone,communication_style,team_size,goals
Kiara Patel,kiara.patel@groupscholar.com,2026,senior,Healthcare,America/Chicago,direct,10-50,Run better one-on-ones
Jules Moreno,jules.moreno@groupscholar.com,2025,,,, ,,
";

    #[test]
    fn reads_activity_with_blank_cells_as_absent() {
        let records = read_activity(ACTIVITY.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);

        let avery = &records[0].snapshot;
        assert_eq!(avery.user_id, records[0].participant.id);
        assert_eq!(avery.posts_previous, Some(4));
        assert_eq!(
            avery.last_login,
            Some(Utc.with_ymd_and_hms(2026, 2, 28, 10, 0, 0).unwrap())
        );
        assert_eq!(avery.last_partner_interaction, None);

        let jules = &records[1].snapshot;
        assert_eq!(jules.logins_current, None);
        assert_eq!(jules.last_login, None);
    }

    #[test]
    fn reads_profiles_and_normalizes_blanks() {
        let candidates = read_profiles(PROFILES.as_bytes()).unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].profile.industry.as_deref(), Some("Healthcare"));
        assert_eq!(candidates[1].profile, Profile::default());
    }

    #[test]
    fn reports_the_offending_row() {
        let bad = "\
full_name,email,cohort,logins_current,logins_previous,posts_current,posts_previous,responses_current,responses_previous,last_login,last_partner_interaction
Avery Lee,avery.lee@groupscholar.com,2026,-1,,,,,,,
";
        let err = read_activity(bad.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("row 1"));
    }
}
