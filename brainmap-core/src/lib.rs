//! brainmap core: incident playbooks for the brain network viewer.
//!
//! - **Model & codec:** playbooks, steps, branches and their persisted JSON
//!   form, with string targets normalized into [`Target`] at load time
//! - **Store:** the single owner of the playbook collection, enforcing title
//!   and node-slot uniqueness and the slot capacity
//! - **Repositories:** JSON file and remote HTTP persistence
//! - **Navigation:** the panel state machine that resolves steps, conditions
//!   and cross-playbook links
//! - **Layout:** deterministic placement of node slots in the network

pub mod codec;
pub mod config;
pub mod defaults;
pub mod error;
pub mod layout;
pub mod model;
pub mod navigation;
pub mod repository;
pub mod store;
pub mod validate;

pub use config::{BrainmapConfig, NavigationConfig, StorageConfig, VisualConfig, load_config};
pub use error::{BrainmapError, NavigationError, PersistenceError, Result, ValidationError};
pub use layout::{IncidentNode, NodeLayout};
pub use model::{Branch, Color, Condition, Link, Playbook, Step, StepKind, Target};
pub use navigation::{NavOutcome, NavPhase, NavigationEngine, PanelView, PendingJump};
pub use repository::{
    HttpRepository, InMemoryRepository, JsonFileRepository, PlaybookRepository,
    repository_from_config,
};
pub use store::{ImportMode, ImportSummary, LinkIssue, LinkProblem, PlaybookStore};
