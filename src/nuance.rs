//! Optional, best-effort flags from an external text-generation service.
//!
//! The rule-based classifier never depends on this layer. Analyzers return a
//! typed error and [`augment`] turns any failure into "no additional flags".

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use serde::Deserialize;
use uuid::Uuid;

use crate::error::{NuanceError, Result};
use crate::models::{ActivitySnapshot, Flag, FlagReason, FlagType};

const DEFAULT_ACTION: &str = "Review with the program lead.";

pub trait NuanceAnalyzer {
    fn analyze(&self, snapshots: &[ActivitySnapshot]) -> Result<Vec<Flag>>;
}

/// Analyzer used when augmentation is disabled.
pub struct NoNuance;

impl NuanceAnalyzer for NoNuance {
    fn analyze(&self, _snapshots: &[ActivitySnapshot]) -> Result<Vec<Flag>> {
        Ok(Vec::new())
    }
}

/// Reads a model response that was fetched ahead of time and saved as JSON.
pub struct ResponseFileAnalyzer {
    pub path: PathBuf,
}

impl NuanceAnalyzer for ResponseFileAnalyzer {
    fn analyze(&self, snapshots: &[ActivitySnapshot]) -> Result<Vec<Flag>> {
        let text = std::fs::read_to_string(&self.path)?;
        let known: HashSet<Uuid> = snapshots.iter().map(|s| s.user_id).collect();

        Ok(parse_response(&text)?
            .into_iter()
            .filter(|flag| known.contains(&flag.user_id))
            .collect())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ResponseBody {
    List(Vec<RawFlag>),
    Wrapped { flags: Vec<RawFlag> },
}

#[derive(Deserialize)]
struct RawFlag {
    user_id: Uuid,
    flag_type: String,
    reason: String,
    #[serde(default)]
    context: BTreeMap<String, serde_json::Value>,
    recommended_action: Option<String>,
}

/// Parses either a bare JSON array of flags or `{"flags": [...]}`.
pub fn parse_response(text: &str) -> Result<Vec<Flag>> {
    let body: ResponseBody = serde_json::from_str(text.trim())?;
    let raw = match body {
        ResponseBody::List(flags) => flags,
        ResponseBody::Wrapped { flags } => flags,
    };

    raw.into_iter()
        .map(|flag| {
            let flag_type = FlagType::parse(&flag.flag_type)
                .ok_or_else(|| NuanceError::UnknownFlagType(flag.flag_type.clone()))?;
            let reason = flag.reason.trim();
            if reason.is_empty() {
                return Err(NuanceError::MissingReason);
            }

            Ok(Flag {
                user_id: flag.user_id,
                flag_type,
                reason: FlagReason::Nuanced(reason.to_string()),
                context: flag.context,
                recommended_action: flag
                    .recommended_action
                    .filter(|action| !action.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_ACTION.to_string()),
            })
        })
        .collect()
}

pub fn augment(analyzer: &dyn NuanceAnalyzer, snapshots: &[ActivitySnapshot]) -> Vec<Flag> {
    match analyzer.analyze(snapshots) {
        Ok(flags) => {
            tracing::info!(flags = flags.len(), "nuance analysis added flags");
            flags
        }
        Err(err) => {
            tracing::warn!(error = %err, "nuance analysis failed, continuing without it");
            Vec::new()
        }
    }
}
