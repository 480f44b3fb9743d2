//! Error types for the playbook core.

use thiserror::Error;

/// Top-level brainmap error.
#[derive(Debug, Error)]
pub enum BrainmapError {
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("serialization error: {0}")]
    Encode(serde_json::Error),
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("navigation error: {0}")]
    Navigation(#[from] NavigationError),
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),
    #[error("node slot {index} exceeds capacity of {capacity} slots")]
    CapacityExceeded { index: u32, capacity: u32 },
    #[error("configuration error: {0}")]
    Config(String),
}

/// Structurally invalid playbook data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("expected a JSON array of playbooks")]
    NotAnArray,
    #[error("playbook #{position} is malformed: {message}")]
    Malformed { position: usize, message: String },
    #[error("playbook at node slot {index} has an empty title")]
    EmptyTitle { index: u32 },
    #[error("playbook title '{0}' is reserved for step references")]
    ReservedTitle(String),
    #[error("link '{link}' on step {step} of playbook '{playbook}' has no targetIndex")]
    MissingTargetIndex {
        playbook: String,
        step: usize,
        link: String,
    },
    #[error("playbook '{playbook}' has no steps")]
    EmptySteps { playbook: String },
    #[error("step {step} of playbook '{playbook}' has an empty title")]
    EmptyStepTitle { playbook: String, step: usize },
    #[error("playbook '{playbook}' has invalid color '{color}'")]
    InvalidColor { playbook: String, color: String },
    #[error("step {step} of playbook '{playbook}' has invalid target '{target}'")]
    InvalidTarget {
        playbook: String,
        step: usize,
        target: String,
    },
    #[error(
        "step {step} of playbook '{playbook}' targets step {target} but the playbook has {len} steps"
    )]
    StepOutOfRange {
        playbook: String,
        step: usize,
        target: usize,
        len: usize,
    },
    #[error("playbook '{playbook}' uses node slot {index}, capacity is {capacity}")]
    IndexOutOfRange {
        playbook: String,
        index: u32,
        capacity: u32,
    },
    #[error("duplicate playbook title '{0}'")]
    DuplicateTitle(String),
    #[error("node slot {index} is used by both '{first}' and '{second}'")]
    DuplicateIndex {
        index: u32,
        first: String,
        second: String,
    },
    #[error("playbook '{0}' not found")]
    NotFound(String),
}

/// Why a navigation request produced no navigation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavigationError {
    #[error("no playbook is currently displayed")]
    NoActivePlaybook,
    #[error("malformed step reference '{0}'")]
    MalformedStepRef(String),
    #[error("step {number} is out of range for '{playbook}' ({len} steps)")]
    StepOutOfRange {
        playbook: String,
        number: usize,
        len: usize,
    },
    #[error("no playbook titled '{title}' (fallback index {index:?})")]
    UnknownPlaybook { title: String, index: Option<u32> },
    #[error("current step has no {kind} #{position}")]
    NoSuchBranch { kind: &'static str, position: usize },
}

/// Failures writing to or reading from a playbook repository.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("writes are disabled for this repository")]
    WriteDisabled,
    #[error("remote store rejected the request with status {status}")]
    Rejected { status: u16 },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BrainmapError>;
