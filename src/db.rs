use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Row};
use uuid::Uuid;

use crate::import;
use crate::models::{ActivityRecord, ActivitySnapshot, Candidate, Flag, Participant, Profile};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Inserts or refreshes a participant keyed by email and returns the stored id.
pub async fn upsert_participant(
    pool: &PgPool,
    participant: &Participant,
) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO cohort_engagement.participants (id, full_name, email, cohort)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (email) DO UPDATE
        SET full_name = EXCLUDED.full_name, cohort = EXCLUDED.cohort
        RETURNING id
        "#,
    )
    .bind(participant.id)
    .bind(&participant.full_name)
    .bind(&participant.email)
    .bind(&participant.cohort)
    .fetch_one(pool)
    .await?
    .get("id");

    Ok(id)
}

pub async fn upsert_profile(
    pool: &PgPool,
    participant_id: Uuid,
    profile: &Profile,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO cohort_engagement.profiles
        (participant_id, experience_level, industry, time_zone, communication_style, team_size, goals)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (participant_id) DO UPDATE
        SET experience_level = EXCLUDED.experience_level,
            industry = EXCLUDED.industry,
            time_zone = EXCLUDED.time_zone,
            communication_style = EXCLUDED.communication_style,
            team_size = EXCLUDED.team_size,
            goals = EXCLUDED.goals,
            updated_at = now()
        "#,
    )
    .bind(participant_id)
    .bind(&profile.experience_level)
    .bind(&profile.industry)
    .bind(&profile.time_zone)
    .bind(&profile.communication_style)
    .bind(&profile.team_size)
    .bind(&profile.goals)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn upsert_snapshot(
    pool: &PgPool,
    participant_id: Uuid,
    period_start: NaiveDate,
    snapshot: &ActivitySnapshot,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO cohort_engagement.activity_snapshots
        (participant_id, period_start, logins_current, logins_previous, posts_current,
         posts_previous, responses_current, responses_previous, last_login, last_partner_interaction)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (participant_id, period_start) DO UPDATE
        SET logins_current = EXCLUDED.logins_current,
            logins_previous = EXCLUDED.logins_previous,
            posts_current = EXCLUDED.posts_current,
            posts_previous = EXCLUDED.posts_previous,
            responses_current = EXCLUDED.responses_current,
            responses_previous = EXCLUDED.responses_previous,
            last_login = EXCLUDED.last_login,
            last_partner_interaction = EXCLUDED.last_partner_interaction
        "#,
    )
    .bind(participant_id)
    .bind(period_start)
    .bind(to_db_count(snapshot.logins_current))
    .bind(to_db_count(snapshot.logins_previous))
    .bind(to_db_count(snapshot.posts_current))
    .bind(to_db_count(snapshot.posts_previous))
    .bind(to_db_count(snapshot.responses_current))
    .bind(to_db_count(snapshot.responses_previous))
    .bind(snapshot.last_login)
    .bind(snapshot.last_partner_interaction)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn seed(pool: &PgPool, now: DateTime<Utc>) -> anyhow::Result<()> {
    let period_start = now.date_naive() - Duration::days(7);
    let ago = |days: i64| Some(now - Duration::days(days));

    let scholars = vec![
        (
            Participant::from_email("Avery Lee", "avery.lee@groupscholar.com", "2026"),
            Profile {
                experience_level: Some("senior".to_string()),
                industry: Some("Healthcare".to_string()),
                time_zone: Some("America/New_York".to_string()),
                communication_style: Some("direct".to_string()),
                team_size: Some("10-50".to_string()),
                goals: Some("Delegate more of the weekly planning".to_string()),
            },
            ActivitySnapshot {
                logins_current: Some(2),
                logins_previous: Some(5),
                posts_current: Some(0),
                posts_previous: Some(4),
                responses_current: Some(1),
                responses_previous: Some(3),
                last_login: ago(2),
                last_partner_interaction: ago(3),
                ..ActivitySnapshot::default()
            },
        ),
        (
            Participant::from_email("Jules Moreno", "jules.moreno@groupscholar.com", "2026"),
            Profile {
                experience_level: Some("mid".to_string()),
                industry: Some("healthcare".to_string()),
                time_zone: Some("America/Chicago".to_string()),
                communication_style: Some("reflective".to_string()),
                team_size: None,
                goals: None,
            },
            ActivitySnapshot {
                logins_current: Some(0),
                logins_previous: Some(2),
                posts_current: Some(0),
                posts_previous: Some(0),
                responses_current: Some(0),
                responses_previous: Some(1),
                last_login: ago(15),
                last_partner_interaction: ago(20),
                ..ActivitySnapshot::default()
            },
        ),
        (
            Participant::from_email("Kiara Patel", "kiara.patel@groupscholar.com", "2026"),
            Profile {
                experience_level: Some("senior".to_string()),
                industry: Some("Education".to_string()),
                time_zone: Some("America/New_York".to_string()),
                communication_style: Some("direct".to_string()),
                team_size: Some("10-50".to_string()),
                goals: Some("Prepare for a director role".to_string()),
            },
            ActivitySnapshot {
                logins_current: Some(6),
                logins_previous: Some(4),
                posts_current: Some(3),
                posts_previous: Some(0),
                responses_current: Some(4),
                responses_previous: Some(0),
                last_login: ago(1),
                last_partner_interaction: ago(4),
                ..ActivitySnapshot::default()
            },
        ),
    ];

    let mut ids = Vec::with_capacity(scholars.len());
    for (participant, profile, mut snapshot) in scholars {
        let id = upsert_participant(pool, &participant).await?;
        upsert_profile(pool, id, &profile).await?;

        snapshot.user_id = id;
        upsert_snapshot(pool, id, period_start, &snapshot).await?;
        ids.push(id);
    }

    // Avery and Jules are partners; Kiara is left unpaired.
    insert_partnership(pool, ids[0], ids[1]).await?;

    Ok(())
}

pub async fn import_activity(
    pool: &PgPool,
    csv_path: &Path,
    period_start: NaiveDate,
) -> anyhow::Result<usize> {
    let records = import::read_activity_file(csv_path)?;
    let mut stored = 0usize;

    for record in records {
        let id = upsert_participant(pool, &record.participant).await?;
        upsert_snapshot(pool, id, period_start, &record.snapshot)
            .await
            .with_context(|| {
                format!("failed to store activity for {}", record.participant.email)
            })?;
        stored += 1;
    }

    Ok(stored)
}

pub async fn import_profiles(pool: &PgPool, csv_path: &Path) -> anyhow::Result<usize> {
    let candidates = import::read_profiles_file(csv_path)?;
    let mut stored = 0usize;

    for candidate in candidates {
        let id = upsert_participant(pool, &candidate.participant).await?;
        upsert_profile(pool, id, &candidate.profile)
            .await
            .with_context(|| {
                format!("failed to store profile for {}", candidate.participant.email)
            })?;
        stored += 1;
    }

    Ok(stored)
}

/// Latest snapshot for every participant, optionally limited to one cohort.
/// Participants without any snapshot row come back with an empty snapshot.
pub async fn fetch_activity(
    pool: &PgPool,
    cohort: Option<&str>,
) -> anyhow::Result<Vec<ActivityRecord>> {
    let mut query = String::from(
        "SELECT DISTINCT ON (p.id) p.id, p.full_name, p.email, p.cohort, \
         a.logins_current, a.logins_previous, a.posts_current, a.posts_previous, \
         a.responses_current, a.responses_previous, a.last_login, a.last_partner_interaction \
         FROM cohort_engagement.participants p \
         LEFT JOIN cohort_engagement.activity_snapshots a ON a.participant_id = p.id",
    );

    if cohort.is_some() {
        query.push_str(" WHERE p.cohort = $1");
    }
    query.push_str(" ORDER BY p.id, a.period_start DESC NULLS LAST");

    let mut rows = sqlx::query(&query);
    if let Some(value) = cohort {
        rows = rows.bind(value);
    }

    let records = rows.fetch_all(pool).await?;
    let mut activity = Vec::with_capacity(records.len());

    for row in records {
        let participant = participant_from_row(&row);
        let columns = SnapshotRow::from_row(&row)?;
        activity.push(ActivityRecord {
            snapshot: columns.into_snapshot(participant.id),
            participant,
        });
    }

    Ok(activity)
}

pub async fn fetch_candidate(pool: &PgPool, email: &str) -> anyhow::Result<Option<Candidate>> {
    let row = sqlx::query(&format!("{CANDIDATE_SELECT} WHERE p.email = $1"))
        .bind(email.trim().to_lowercase())
        .fetch_optional(pool)
        .await?;

    Ok(row.as_ref().map(candidate_from_row))
}

/// Participants in `cohort` who have no accountability partner yet.
pub async fn fetch_unpaired_candidates(
    pool: &PgPool,
    cohort: &str,
) -> anyhow::Result<Vec<Candidate>> {
    let rows = sqlx::query(&format!(
        "{CANDIDATE_SELECT} WHERE p.cohort = $1 \
         AND NOT EXISTS (SELECT 1 FROM cohort_engagement.partnerships s \
                         WHERE s.participant_a = p.id OR s.participant_b = p.id) \
         ORDER BY p.created_at, p.email"
    ))
    .bind(cohort)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(candidate_from_row).collect())
}

/// Stored order of a pair, so (a, b) and (b, a) land on the same row.
pub fn partnership_key(a: Uuid, b: Uuid) -> anyhow::Result<(Uuid, Uuid)> {
    if a == b {
        anyhow::bail!("a participant cannot be paired with themselves");
    }
    Ok(if a < b { (a, b) } else { (b, a) })
}

/// Records an accountability pairing. Returns `false` when either participant
/// already has a partner.
pub async fn insert_partnership(pool: &PgPool, a: Uuid, b: Uuid) -> anyhow::Result<bool> {
    let (first, second) = partnership_key(a, b)?;

    let result = sqlx::query(
        r#"
        INSERT INTO cohort_engagement.partnerships (participant_a, participant_b)
        SELECT $1, $2
        WHERE NOT EXISTS (
            SELECT 1 FROM cohort_engagement.partnerships s
            WHERE s.participant_a IN ($1, $2) OR s.participant_b IN ($1, $2)
        )
        ON CONFLICT (participant_a, participant_b) DO NOTHING
        "#,
    )
    .bind(first)
    .bind(second)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Stores flags for `evaluated_on`; repeats of the same reason that day are skipped.
pub async fn insert_flags(
    pool: &PgPool,
    flags: &[Flag],
    evaluated_on: NaiveDate,
) -> anyhow::Result<usize> {
    let mut inserted = 0usize;

    for flag in flags {
        let result = sqlx::query(
            r#"
            INSERT INTO cohort_engagement.engagement_flags
            (id, participant_id, flag_type, reason_code, reason, context, recommended_action, evaluated_on)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (participant_id, reason, evaluated_on) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(flag.user_id)
        .bind(flag.flag_type.as_str())
        .bind(flag.reason.code())
        .bind(flag.reason.description())
        .bind(sqlx::types::Json(&flag.context))
        .bind(&flag.recommended_action)
        .bind(evaluated_on)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    Ok(inserted)
}

const CANDIDATE_SELECT: &str = "SELECT p.id, p.full_name, p.email, p.cohort, \
     f.experience_level, f.industry, f.time_zone, f.communication_style, f.team_size, f.goals \
     FROM cohort_engagement.participants p \
     LEFT JOIN cohort_engagement.profiles f ON f.participant_id = p.id";

fn participant_from_row(row: &PgRow) -> Participant {
    Participant {
        id: row.get("id"),
        full_name: row.get("full_name"),
        email: row.get("email"),
        cohort: row.get("cohort"),
    }
}

fn candidate_from_row(row: &PgRow) -> Candidate {
    Candidate {
        participant: participant_from_row(row),
        profile: Profile {
            experience_level: row.get("experience_level"),
            industry: row.get("industry"),
            time_zone: row.get("time_zone"),
            communication_style: row.get("communication_style"),
            team_size: row.get("team_size"),
            goals: row.get("goals"),
        },
    }
}

/// Snapshot columns of an activity query; all NULL when the participant has
/// no snapshot row yet.
#[derive(Debug, Default, sqlx::FromRow)]
struct SnapshotRow {
    logins_current: Option<i32>,
    logins_previous: Option<i32>,
    posts_current: Option<i32>,
    posts_previous: Option<i32>,
    responses_current: Option<i32>,
    responses_previous: Option<i32>,
    last_login: Option<DateTime<Utc>>,
    last_partner_interaction: Option<DateTime<Utc>>,
}

impl SnapshotRow {
    fn into_snapshot(self, user_id: Uuid) -> ActivitySnapshot {
        ActivitySnapshot {
            user_id,
            logins_current: self.logins_current.map(from_db_count),
            logins_previous: self.logins_previous.map(from_db_count),
            posts_current: self.posts_current.map(from_db_count),
            posts_previous: self.posts_previous.map(from_db_count),
            responses_current: self.responses_current.map(from_db_count),
            responses_previous: self.responses_previous.map(from_db_count),
            last_login: self.last_login,
            last_partner_interaction: self.last_partner_interaction,
        }
    }
}

fn from_db_count(value: i32) -> u32 {
    value.max(0) as u32
}

fn to_db_count(value: Option<u32>) -> Option<i32> {
    value.map(|v| i32::try_from(v).unwrap_or(i32::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_round_trip_through_postgres_integers() {
        assert_eq!(to_db_count(Some(7)), Some(7));
        assert_eq!(to_db_count(None), None);
        assert_eq!(to_db_count(Some(u32::MAX)), Some(i32::MAX));
        assert_eq!(from_db_count(-3), 0);
    }

    #[test]
    fn participant_without_snapshot_is_flagged_absent() {
        let user_id = Uuid::new_v4();
        let snapshot = SnapshotRow::default().into_snapshot(user_id);
        assert_eq!(
            snapshot,
            ActivitySnapshot {
                user_id,
                ..ActivitySnapshot::default()
            }
        );

        let flags = crate::engagement::classify(&snapshot, Utc::now());
        let reasons: Vec<&str> = flags.iter().map(|f| f.reason.code()).collect();
        assert_eq!(reasons, vec!["prolonged_absence"]);
    }

    #[test]
    fn snapshot_columns_map_onto_counts() {
        let seen = Utc::now() - Duration::days(3);
        let snapshot = SnapshotRow {
            logins_current: Some(4),
            posts_previous: Some(-2),
            last_login: Some(seen),
            ..SnapshotRow::default()
        }
        .into_snapshot(Uuid::nil());

        assert_eq!(snapshot.logins_current, Some(4));
        assert_eq!(snapshot.posts_previous, Some(0));
        assert_eq!(snapshot.posts_current, None);
        assert_eq!(snapshot.last_login, Some(seen));
    }

    #[test]
    fn partnership_key_is_order_independent() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(partnership_key(a, b).unwrap(), partnership_key(b, a).unwrap());
        assert!(partnership_key(a, a).is_err());
    }
}
