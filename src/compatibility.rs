use crate::models::{Candidate, CompatibilityResult, Dimension, DimensionScore, Profile};

/// Credit for two different experience levels.
pub const EXPERIENCE_PARTIAL: u32 = 10;
/// Credit for two different time zones.
pub const TIME_ZONE_PARTIAL: u32 = 10;
/// Credit for complementary communication styles.
pub const COMMUNICATION_PARTIAL: u32 = 12;

#[derive(Debug, Clone)]
pub struct RankedCandidate<'a> {
    pub candidate: &'a Candidate,
    pub result: CompatibilityResult,
}

/// Compatibility percentage. Both profiles go through [`Profile::normalized`]
/// first, so surrounding whitespace is ignored and blank answers count as missing.
pub fn score(a: &Profile, b: &Profile) -> u8 {
    score_breakdown(a, b).score
}

pub fn score_breakdown(a: &Profile, b: &Profile) -> CompatibilityResult {
    let a = a.normalized();
    let b = b.normalized();

    let mut earned = 0u32;
    let mut possible = 0u32;
    let mut dimensions = Vec::with_capacity(Dimension::ALL.len());

    for dimension in Dimension::ALL {
        let points = dimension_points(dimension, &a, &b);
        earned += points;
        possible += dimension.max_points();
        dimensions.push(DimensionScore {
            dimension,
            earned: points,
            possible: dimension.max_points(),
        });
    }

    let score = if possible == 0 {
        0
    } else {
        ((earned as f64 / possible as f64) * 100.0).round().clamp(0.0, 100.0) as u8
    };

    CompatibilityResult {
        score,
        earned,
        possible,
        dimensions,
    }
}

fn dimension_points(dimension: Dimension, a: &Profile, b: &Profile) -> u32 {
    let max = dimension.max_points();
    match dimension {
        Dimension::ExperienceLevel => {
            graded(&a.experience_level, &b.experience_level, max, EXPERIENCE_PARTIAL)
        }
        Dimension::Industry => match (&a.industry, &b.industry) {
            (Some(x), Some(y)) if x.to_lowercase() == y.to_lowercase() => max,
            _ => 0,
        },
        Dimension::TimeZone => graded(&a.time_zone, &b.time_zone, max, TIME_ZONE_PARTIAL),
        Dimension::CommunicationStyle => graded(
            &a.communication_style,
            &b.communication_style,
            max,
            COMMUNICATION_PARTIAL,
        ),
        // Two unanswered team sizes count as a match.
        Dimension::TeamSize => {
            if a.team_size == b.team_size {
                max
            } else {
                0
            }
        }
        Dimension::Goals => match (&a.goals, &b.goals) {
            (Some(_), Some(_)) => max,
            _ => 0,
        },
    }
}

fn graded(a: &Option<String>, b: &Option<String>, full: u32, partial: u32) -> u32 {
    match (a, b) {
        (Some(x), Some(y)) if x == y => full,
        (Some(_), Some(_)) => partial,
        _ => 0,
    }
}

/// Scores every candidate against `target`, best first. Ties keep the order
/// the candidates were supplied in.
pub fn rank_candidates<'a>(
    target: &Candidate,
    candidates: &'a [Candidate],
    limit: usize,
) -> Vec<RankedCandidate<'a>> {
    let mut ranked: Vec<RankedCandidate<'a>> = candidates
        .iter()
        .filter(|candidate| candidate.participant.id != target.participant.id)
        .map(|candidate| RankedCandidate {
            candidate,
            result: score_breakdown(&target.profile, &candidate.profile),
        })
        .collect();

    ranked.sort_by(|a, b| b.result.score.cmp(&a.result.score));
    ranked.truncate(limit);

    tracing::debug!(
        participant = %target.participant.email,
        pool = candidates.len(),
        returned = ranked.len(),
        "ranked partner candidates"
    );

    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Participant;

    fn profile(
        experience: Option<&str>,
        industry: Option<&str>,
        time_zone: Option<&str>,
        style: Option<&str>,
        team_size: Option<&str>,
        goals: Option<&str>,
    ) -> Profile {
        Profile {
            experience_level: experience.map(str::to_string),
            industry: industry.map(str::to_string),
            time_zone: time_zone.map(str::to_string),
            communication_style: style.map(str::to_string),
            team_size: team_size.map(str::to_string),
            goals: goals.map(str::to_string),
        }
    }

    fn full_profile() -> Profile {
        profile(
            Some("senior"),
            Some("Tech"),
            Some("America/New_York"),
            Some("direct"),
            Some("10-50"),
            Some("Lead a cross-functional team"),
        )
    }

    fn candidate(name: &str, profile: Profile) -> Candidate {
        let email = format!("{}@groupscholar.com", name.to_lowercase());
        Candidate {
            participant: Participant::from_email(name, &email, "2026"),
            profile,
        }
    }

    #[test]
    fn identical_full_profiles_score_one_hundred() {
        let a = full_profile();
        assert_eq!(score(&a, &a.clone()), 100);
    }

    #[test]
    fn empty_profiles_only_earn_team_size() {
        let empty = Profile::default();
        let result = score_breakdown(&empty, &empty);
        assert_eq!(result.score, 10);
        assert_eq!(result.possible, 100);
        assert!(result.score < score(&full_profile(), &full_profile()));
    }

    #[test]
    fn blank_strings_count_as_missing() {
        let blank = profile(Some(" "), Some(""), None, None, Some(""), Some("  "));
        assert_eq!(score(&blank, &Profile::default()), 10);
    }

    #[test]
    fn padded_values_match_their_trimmed_form() {
        let a = profile(Some(" senior"), None, None, None, None, None);
        let b = profile(Some("senior "), None, None, None, None, None);
        assert_eq!(score(&a, &b), 30);
    }

    #[test]
    fn partial_credit_for_different_values() {
        let a = profile(Some("senior"), Some("Tech"), Some("UTC"), Some("direct"), None, None);
        let b = profile(
            Some("junior"),
            Some("Finance"),
            Some("Asia/Tokyo"),
            Some("reflective"),
            None,
            None,
        );
        let result = score_breakdown(&a, &b);
        let earned: Vec<u32> = result.dimensions.iter().map(|d| d.earned).collect();
        assert_eq!(earned, vec![10, 0, 10, 12, 10, 0]);
        assert_eq!(result.score, 42);
    }

    #[test]
    fn industry_match_ignores_case() {
        let a = profile(None, Some("Healthcare"), None, None, Some("5"), None);
        let b = profile(None, Some("HEALTHCARE"), None, None, Some("5"), None);
        assert_eq!(score(&a, &b), 25);
    }

    #[test]
    fn scoring_is_symmetric_and_bounded() {
        let profiles = vec![
            full_profile(),
            Profile::default(),
            profile(Some("mid"), None, Some("UTC"), None, Some("1-5"), None),
            profile(None, Some("tech"), None, Some("analytical"), None, Some("grow")),
            profile(Some("senior"), Some("TECH"), Some("UTC"), Some("direct"), None, Some("x")),
        ];

        for a in &profiles {
            for b in &profiles {
                let forward = score(a, b);
                assert_eq!(forward, score(b, a));
                assert!(forward <= 100);
            }
        }
    }

    #[test]
    fn ranking_orders_by_score_descending() {
        let target = candidate("Target", full_profile());
        let pool = vec![
            candidate(
                "Blake",
                profile(
                    Some("mid"),
                    Some("Finance"),
                    Some("America/New_York"),
                    Some("collaborative"),
                    None,
                    None,
                ),
            ),
            candidate(
                "Casey",
                profile(
                    None,
                    Some("TECH"),
                    Some("America/New_York"),
                    None,
                    Some("10-50"),
                    Some("Delegate better"),
                ),
            ),
            candidate(
                "Avery",
                profile(
                    Some("senior"),
                    Some("tech"),
                    Some("Europe/London"),
                    Some("direct"),
                    Some("10-50"),
                    Some("Build trust"),
                ),
            ),
            target.clone(),
        ];

        let ranked = rank_candidates(&target, &pool, 10);
        let order: Vec<(&str, u8)> = ranked
            .iter()
            .map(|r| (r.candidate.participant.full_name.as_str(), r.result.score))
            .collect();
        assert_eq!(order, vec![("Avery", 85), ("Casey", 60), ("Blake", 47)]);
    }

    #[test]
    fn ranking_ties_keep_input_order_and_respect_limit() {
        let target = candidate("Target", full_profile());
        let pool = vec![
            candidate("First", Profile::default()),
            candidate("Second", Profile::default()),
            candidate("Third", Profile::default()),
        ];

        let ranked = rank_candidates(&target, &pool, 2);
        let names: Vec<&str> = ranked
            .iter()
            .map(|r| r.candidate.participant.full_name.as_str())
            .collect();
        assert_eq!(names, vec!["First", "Second"]);
    }
}
