use std::path::PathBuf;

use anyhow::Context;
use chrono::{Duration, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use cohort_engagement::compatibility::{self, RankedCandidate};
use cohort_engagement::models::{ActivityRecord, Candidate, Flag, Participant};
use cohort_engagement::nuance::{self, NoNuance, NuanceAnalyzer, ResponseFileAnalyzer};
use cohort_engagement::{db, engagement, import, report};

#[derive(Parser)]
#[command(name = "cohort-engagement")]
#[command(about = "Engagement flags and partner matching for cohort programs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a small realistic cohort
    Seed,
    /// Import activity snapshots or partner profiles from CSV
    Import {
        #[arg(long, required_unless_present = "profiles")]
        activity: Option<PathBuf>,
        #[arg(long)]
        profiles: Option<PathBuf>,
        /// First day of the current period; defaults to seven days ago
        #[arg(long)]
        period_start: Option<NaiveDate>,
    },
    /// Classify the latest snapshot of every participant
    Flag {
        #[arg(long)]
        cohort: Option<String>,
        /// Store the flags for review
        #[arg(long)]
        persist: bool,
        /// Saved text-generation response with extra flags
        #[arg(long)]
        nuance: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Rank unpaired partner candidates for one participant
    Match {
        #[arg(long)]
        email: String,
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
    /// Record two participants as accountability partners
    Pair {
        #[arg(long)]
        a: String,
        #[arg(long)]
        b: String,
    },
    /// Generate a markdown engagement report
    Report {
        #[arg(long)]
        cohort: Option<String>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Classify activity from a CSV export without a database
    Classify {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long)]
        nuance: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Rank partner candidates from a CSV export without a database
    Rank {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long)]
        email: String,
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
}

async fn connect() -> anyhow::Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}

fn analyzer(path: Option<PathBuf>) -> Box<dyn NuanceAnalyzer> {
    match path {
        Some(path) => Box::new(ResponseFileAnalyzer { path }),
        None => Box::new(NoNuance),
    }
}

fn evaluate(records: &[ActivityRecord], nuance_path: Option<PathBuf>) -> Vec<Flag> {
    let snapshots: Vec<_> = records.iter().map(|r| r.snapshot.clone()).collect();
    let mut flags = engagement::classify_batch(&snapshots, Utc::now());
    flags.extend(nuance::augment(&*analyzer(nuance_path), &snapshots));
    flags
}

fn print_flags(records: &[ActivityRecord], flags: &[Flag], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(flags)?);
        return Ok(());
    }

    if flags.is_empty() {
        println!("No flags raised for {} participants.", records.len());
        return Ok(());
    }

    for flag in flags {
        let name = records
            .iter()
            .find(|r| r.participant.id == flag.user_id)
            .map(|r| r.participant.full_name.as_str())
            .unwrap_or("unknown participant");
        println!(
            "[{}] {}: {} -> {}",
            flag.flag_type,
            name,
            flag.reason.description(),
            flag.recommended_action
        );
    }

    Ok(())
}

fn print_ranking(target: &Candidate, ranked: &[RankedCandidate<'_>]) {
    if ranked.is_empty() {
        println!("No unpaired candidates for {}.", target.participant.full_name);
        return;
    }

    println!("Best partner matches for {}:", target.participant.full_name);
    for entry in ranked {
        let matched: Vec<String> = entry
            .result
            .dimensions
            .iter()
            .filter(|d| d.earned > 0)
            .map(|d| format!("{} {}/{}", d.dimension.label(), d.earned, d.possible))
            .collect();
        println!(
            "- {} ({}) {}% [{}]",
            entry.candidate.participant.full_name,
            entry.candidate.participant.email,
            entry.result.score,
            matched.join(", ")
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::InitDb => {
            let pool = connect().await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect().await?;
            db::seed(&pool, Utc::now()).await?;
            println!("Seed data inserted.");
        }
        Commands::Import {
            activity,
            profiles,
            period_start,
        } => {
            let pool = connect().await?;
            if let Some(csv) = activity {
                let period_start =
                    period_start.unwrap_or_else(|| Utc::now().date_naive() - Duration::days(7));
                let stored = db::import_activity(&pool, &csv, period_start).await?;
                println!("Stored {stored} activity snapshots from {}.", csv.display());
            }
            if let Some(csv) = profiles {
                let stored = db::import_profiles(&pool, &csv).await?;
                println!("Stored {stored} profiles from {}.", csv.display());
            }
        }
        Commands::Flag {
            cohort,
            persist,
            nuance,
            json,
        } => {
            let pool = connect().await?;
            let records = db::fetch_activity(&pool, cohort.as_deref()).await?;
            let flags = evaluate(&records, nuance);
            print_flags(&records, &flags, json)?;

            if persist {
                let inserted = db::insert_flags(&pool, &flags, Utc::now().date_naive()).await?;
                tracing::info!(inserted, skipped = flags.len() - inserted, "stored flags");
            }
        }
        Commands::Match { email, limit } => {
            let pool = connect().await?;
            let target = db::fetch_candidate(&pool, &email)
                .await?
                .with_context(|| format!("no participant with email {email}"))?;
            let pool_candidates =
                db::fetch_unpaired_candidates(&pool, &target.participant.cohort).await?;
            let ranked = compatibility::rank_candidates(&target, &pool_candidates, limit);
            print_ranking(&target, &ranked);
        }
        Commands::Pair { a, b } => {
            let pool = connect().await?;
            let first = db::fetch_candidate(&pool, &a)
                .await?
                .with_context(|| format!("no participant with email {a}"))?;
            let second = db::fetch_candidate(&pool, &b)
                .await?
                .with_context(|| format!("no participant with email {b}"))?;

            if db::insert_partnership(&pool, first.participant.id, second.participant.id).await? {
                println!(
                    "Paired {} with {}.",
                    first.participant.full_name, second.participant.full_name
                );
            } else {
                anyhow::bail!(
                    "{} or {} already has a partner",
                    first.participant.email,
                    second.participant.email
                );
            }
        }
        Commands::Report { cohort, out } => {
            let pool = connect().await?;
            let records = db::fetch_activity(&pool, cohort.as_deref()).await?;
            let flags = evaluate(&records, None);
            let participants: Vec<Participant> =
                records.iter().map(|r| r.participant.clone()).collect();
            let report = report::build_report(
                cohort.as_deref(),
                Utc::now().date_naive(),
                &participants,
                &flags,
            );
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Classify { csv, nuance, json } => {
            let records = import::read_activity_file(&csv)?;
            let flags = evaluate(&records, nuance);
            print_flags(&records, &flags, json)?;
        }
        Commands::Rank { csv, email, limit } => {
            let candidates = import::read_profiles_file(&csv)?;
            let email = email.trim().to_lowercase();
            let target = candidates
                .iter()
                .find(|c| c.participant.email == email)
                .with_context(|| format!("{email} is not in {}", csv.display()))?;
            let ranked = compatibility::rank_candidates(target, &candidates, limit);
            print_ranking(target, &ranked);
        }
    }

    Ok(())
}
