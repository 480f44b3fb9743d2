//! Persisted JSON form of the playbook collection.
//!
//! Decoding happens in three passes: JSON syntax (`ParseError`), per-entry
//! shape (`ValidationError::Malformed`), then normalization of string targets
//! into [`Target`] followed by the collection invariants. Nothing is returned
//! unless every entry passes.

use serde::{Deserialize, Serialize};

use crate::error::{BrainmapError, Result, ValidationError};
use crate::model::{Branch, Color, Playbook, Step, StepKind, Target};
use crate::validate::validate_collection;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPlaybook {
    pub title: String,
    pub index: u32,
    pub color: String,
    pub steps: Vec<RawStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawStep {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub kind: RawStepKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<RawBranch>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<RawBranch>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RawStepKind {
    #[default]
    Standard,
    Condition,
}

/// Shared shape of conditions and links on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBranch {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_step: Option<usize>,
}

/// Decode and validate a JSON array of playbooks.
pub fn decode_playbooks(json: &str, capacity: u32) -> Result<Vec<Playbook>> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    let entries = match value {
        serde_json::Value::Array(entries) => entries,
        _ => return Err(ValidationError::NotAnArray.into()),
    };

    let mut playbooks = Vec::with_capacity(entries.len());
    for (position, entry) in entries.into_iter().enumerate() {
        let raw: RawPlaybook =
            serde_json::from_value(entry).map_err(|e| ValidationError::Malformed {
                position,
                message: e.to_string(),
            })?;
        playbooks.push(normalize_playbook(raw)?);
    }

    validate_collection(&playbooks, capacity)?;
    Ok(playbooks)
}

/// Encode playbooks as pretty-printed JSON.
pub fn encode_playbooks(playbooks: &[Playbook]) -> Result<String> {
    let raw: Vec<RawPlaybook> = playbooks.iter().map(RawPlaybook::from).collect();
    serde_json::to_string_pretty(&raw).map_err(BrainmapError::Encode)
}

/// Convert one raw entry, resolving `"next"` and `"step:N"` targets.
pub fn normalize_playbook(raw: RawPlaybook) -> std::result::Result<Playbook, ValidationError> {
    let color = raw
        .color
        .parse::<Color>()
        .map_err(|color| ValidationError::InvalidColor {
            playbook: raw.title.clone(),
            color,
        })?;

    let mut steps = Vec::with_capacity(raw.steps.len());
    for (i, step) in raw.steps.into_iter().enumerate() {
        let conditions = step
            .conditions
            .into_iter()
            .map(|b| normalize_branch(&raw.title, i, b, true))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let links = step
            .links
            .into_iter()
            .map(|b| normalize_branch(&raw.title, i, b, false))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        steps.push(Step {
            title: step.title,
            description: step.description,
            kind: match step.kind {
                RawStepKind::Standard => StepKind::Standard,
                RawStepKind::Condition => StepKind::Condition,
            },
            conditions,
            links,
        });
    }

    Ok(Playbook {
        title: raw.title,
        index: raw.index,
        color,
        steps,
    })
}

fn normalize_branch(
    playbook: &str,
    step: usize,
    raw: RawBranch,
    is_condition: bool,
) -> std::result::Result<Branch, ValidationError> {
    let invalid = |target: &str| ValidationError::InvalidTarget {
        playbook: playbook.to_string(),
        step: step + 1,
        target: target.to_string(),
    };

    let target = if raw.target == Target::NEXT {
        if !is_condition {
            return Err(invalid(&raw.target));
        }
        Target::Step(step + 1)
    } else if let Some(parsed) = Target::parse_step_ref(&raw.target) {
        if !is_condition {
            return Err(invalid(&raw.target));
        }
        Target::Step(parsed.map_err(|t| invalid(&t))?)
    } else if raw.target.trim().is_empty() {
        return Err(invalid(&raw.target));
    } else {
        Target::Playbook {
            title: raw.target,
            index: raw.target_index,
            step: raw.target_step,
        }
    };

    Ok(Branch {
        title: raw.title,
        description: raw.description,
        target,
    })
}

impl From<&Playbook> for RawPlaybook {
    fn from(playbook: &Playbook) -> Self {
        Self {
            title: playbook.title.clone(),
            index: playbook.index,
            color: playbook.color.to_string(),
            steps: playbook.steps.iter().map(RawStep::from).collect(),
        }
    }
}

impl From<&Step> for RawStep {
    fn from(step: &Step) -> Self {
        Self {
            title: step.title.clone(),
            description: step.description.clone(),
            kind: match step.kind {
                StepKind::Standard => RawStepKind::Standard,
                StepKind::Condition => RawStepKind::Condition,
            },
            conditions: step.conditions.iter().map(RawBranch::from).collect(),
            links: step.links.iter().map(RawBranch::from).collect(),
        }
    }
}

impl From<&Branch> for RawBranch {
    fn from(branch: &Branch) -> Self {
        let (target_index, target_step) = match &branch.target {
            Target::Step(_) => (None, None),
            Target::Playbook { index, step, .. } => (*index, *step),
        };
        Self {
            title: branch.title.clone(),
            description: branch.description.clone(),
            target: branch.target.wire_target(),
            target_index,
            target_step,
        }
    }
}
