//! Configuration system for brainmap.
//!
//! Uses `figment` for layered configuration: defaults -> user config file ->
//! workspace config file -> environment -> explicit overrides. Files live at
//! `~/.config/brainmap/config.toml` and `.brainmap/config.toml` in the
//! workspace directory.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::BrainmapError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BrainmapConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub navigation: NavigationConfig,
    #[serde(default)]
    pub visual: VisualConfig,
}

/// Where playbooks are persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// JSON file holding the playbook array, relative to the workspace.
    pub path: PathBuf,
    /// Whether saves are permitted. Read-only deployments set this to false.
    pub allow_write: bool,
    /// Base URL of a remote playbook store. Takes precedence over `path`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,
    /// Request timeout for the remote store, in seconds.
    pub timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("playbooks.json"),
            allow_write: true,
            remote_url: None,
            timeout_secs: 10,
        }
    }
}

impl StorageConfig {
    /// Resolve the playbook file against a workspace directory.
    pub fn resolve_path(&self, workspace: &Path) -> PathBuf {
        if self.path.is_absolute() {
            self.path.clone()
        } else {
            workspace.join(&self.path)
        }
    }
}

/// Panel transition timings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NavigationConfig {
    /// Delay before a cross-playbook jump shows the new panel.
    pub transition_ms: u64,
    /// How long an in-page jump keeps the target step highlighted.
    pub highlight_ms: u64,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            transition_ms: 600,
            highlight_ms: 2000,
        }
    }
}

impl NavigationConfig {
    pub fn transition(&self) -> Duration {
        Duration::from_millis(self.transition_ms)
    }

    pub fn highlight(&self) -> Duration {
        Duration::from_millis(self.highlight_ms)
    }
}

/// Node slot layout of the brain network.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VisualConfig {
    /// Number of node slots; playbook indices must be below this.
    pub node_slots: u32,
    /// Seed for the procedural layout.
    pub layout_seed: u64,
    /// Radius of the bounding ellipsoid.
    pub radius: f32,
    /// Nearest neighbours each node is wired to.
    pub connections_per_node: usize,
}

impl VisualConfig {
    /// Reject layouts that cannot be generated.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.node_slots == 0 {
            return Err(BrainmapError::Config("visual.node_slots must be at least 1".into()));
        }
        if self.connections_per_node as u64 >= u64::from(self.node_slots) {
            return Err(BrainmapError::Config(format!(
                "visual.connections_per_node ({}) must be below node_slots ({})",
                self.connections_per_node, self.node_slots
            )));
        }
        if !(self.radius.is_finite() && self.radius > 0.0) {
            return Err(BrainmapError::Config(format!(
                "visual.radius must be positive, got {}",
                self.radius
            )));
        }
        Ok(())
    }
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            node_slots: 200,
            layout_seed: 42,
            radius: 10.0,
            connections_per_node: 3,
        }
    }
}

/// Load configuration from all layers.
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&BrainmapConfig>,
) -> Result<BrainmapConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(BrainmapConfig::default()));

    // User-level config
    if let Some(dirs) = directories::ProjectDirs::from("dev", "brainmap", "brainmap") {
        let user_config = dirs.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    // Workspace-level config
    if let Some(ws) = workspace {
        let ws_config = workspace_config_path(ws);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // BRAINMAP_STORAGE__ALLOW_WRITE, BRAINMAP_VISUAL__NODE_SLOTS, ...
    figment = figment.merge(Env::prefixed("BRAINMAP_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(Box::new)
}

/// `<workspace>/.brainmap/config.toml`
pub fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(".brainmap").join("config.toml")
}
