//! Playbook store: the single owner of the playbook collection.
//!
//! All mutation goes through the methods here so title and node-slot
//! uniqueness hold at every point. Persistence is optimistic: in-memory
//! changes are applied first and a failed save leaves the store dirty.

use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::codec::{decode_playbooks, encode_playbooks};
use crate::defaults::default_playbooks;
use crate::error::{BrainmapError, Result, ValidationError};
use crate::layout::{IncidentNode, NodeLayout};
use crate::model::{Playbook, Target};
use crate::repository::{PlaybookRepository, load_playbooks, save_playbooks};
use crate::validate::{validate_collection, validate_playbook};

/// How an import combines with the current collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImportMode {
    /// Discard the current collection.
    #[default]
    Replace,
    /// Keep current playbooks; incoming ones with the same title replace them.
    Merge,
}

/// What an import changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub added: usize,
    pub replaced: usize,
    pub total: usize,
}

/// A cross-reference that does not resolve cleanly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkIssue {
    pub playbook: String,
    /// 1-based step number holding the branch.
    pub step: usize,
    pub branch: String,
    pub problem: LinkProblem,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkProblem {
    /// Neither title nor fallback index match a playbook.
    Unresolved { title: String, index: Option<u32> },
    /// Only the fallback index matched; the title is stale.
    TitleMismatch { title: String, actual: String },
    /// The landing step is past the end and will fall back to the first step.
    LandingStepOutOfRange { step: usize, len: usize },
}

impl std::fmt::Display for LinkIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} / step {} / '{}': ",
            self.playbook, self.step, self.branch
        )?;
        match &self.problem {
            LinkProblem::Unresolved { title, index } => match index {
                Some(i) => write!(f, "no playbook titled '{title}' or at node slot {i}"),
                None => write!(f, "no playbook titled '{title}'"),
            },
            LinkProblem::TitleMismatch { title, actual } => {
                write!(f, "'{title}' only resolves by index, to '{actual}'")
            }
            LinkProblem::LandingStepOutOfRange { step, len } => write!(
                f,
                "landing step {} is past the end ({len} steps)",
                step + 1
            ),
        }
    }
}

/// In-memory playbook collection.
#[derive(Debug, Clone)]
pub struct PlaybookStore {
    playbooks: Vec<Playbook>,
    capacity: u32,
    dirty: bool,
}

impl PlaybookStore {
    pub fn new(capacity: u32) -> Self {
        Self {
            playbooks: Vec::new(),
            capacity,
            dirty: false,
        }
    }

    /// Create with the built-in incident playbooks.
    pub fn with_defaults(capacity: u32) -> Result<Self> {
        Self::from_playbooks(default_playbooks(), capacity)
    }

    /// Create from an existing collection, validating it.
    pub fn from_playbooks(playbooks: Vec<Playbook>, capacity: u32) -> Result<Self> {
        validate_collection(&playbooks, capacity)?;
        Ok(Self {
            playbooks,
            capacity,
            dirty: false,
        })
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.playbooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.playbooks.is_empty()
    }

    /// Whether there are changes not yet confirmed by a save.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn all(&self) -> &[Playbook] {
        &self.playbooks
    }

    pub fn find_by_title(&self, title: &str) -> Option<&Playbook> {
        self.playbooks.iter().find(|p| p.title == title)
    }

    pub fn find_by_index(&self, index: u32) -> Option<&Playbook> {
        self.playbooks.iter().find(|p| p.index == index)
    }

    /// Look up a reference by title, falling back to the node index.
    pub fn resolve_reference(&self, title: &str, index: Option<u32>) -> Option<&Playbook> {
        self.find_by_title(title)
            .or_else(|| index.and_then(|i| self.find_by_index(i)))
    }

    /// Add a new playbook.
    pub fn add(&mut self, playbook: Playbook) -> Result<()> {
        self.check_capacity(playbook.index)?;
        validate_playbook(&playbook, self.capacity)?;
        self.check_unique(&playbook, None)?;

        info!(title = %playbook.title, index = playbook.index, "Playbook added");
        self.playbooks.push(playbook);
        self.dirty = true;
        Ok(())
    }

    /// Replace the playbook titled `title`.
    ///
    /// A rename (or node slot move) rewrites cross-references in every other
    /// playbook so existing links keep resolving.
    pub fn update(&mut self, title: &str, playbook: Playbook) -> Result<()> {
        let position = self
            .position_of(title)
            .ok_or_else(|| ValidationError::NotFound(title.to_string()))?;
        self.check_capacity(playbook.index)?;
        validate_playbook(&playbook, self.capacity)?;
        self.check_unique(&playbook, Some(position))?;

        let (new_title, new_index) = (playbook.title.clone(), playbook.index);
        let known: HashSet<String> = self.playbooks.iter().map(|p| p.title.clone()).collect();
        let old = std::mem::replace(&mut self.playbooks[position], playbook);
        if new_title != old.title || new_index != old.index {
            let rewritten = self.retarget(&known, &old, &new_title, new_index);
            debug!(from = %old.title, to = %new_title, rewritten, "Cross-references retargeted");
        }

        info!(title = %new_title, index = new_index, "Playbook updated");
        self.dirty = true;
        Ok(())
    }

    /// Remove the playbook occupying node slot `index`.
    ///
    /// References to it from other playbooks are left in place; they show up
    /// in [`PlaybookStore::audit_links`].
    pub fn remove(&mut self, index: u32) -> Result<Playbook> {
        let position = self
            .playbooks
            .iter()
            .position(|p| p.index == index)
            .ok_or_else(|| ValidationError::NotFound(format!("node slot {index}")))?;
        let removed = self.playbooks.remove(position);
        info!(title = %removed.title, index, "Playbook removed");
        self.dirty = true;
        Ok(removed)
    }

    /// Import a JSON document. Nothing changes unless the whole import is valid.
    pub fn import_json(&mut self, json: &str, mode: ImportMode) -> Result<ImportSummary> {
        let incoming = decode_playbooks(json, self.capacity)?;

        let summary = match mode {
            ImportMode::Replace => {
                let summary = ImportSummary {
                    added: incoming.len(),
                    replaced: 0,
                    total: incoming.len(),
                };
                self.playbooks = incoming;
                summary
            }
            ImportMode::Merge => {
                let mut merged = self.playbooks.clone();
                let (mut added, mut replaced) = (0, 0);
                for playbook in incoming {
                    match merged.iter().position(|p| p.title == playbook.title) {
                        Some(pos) => {
                            merged[pos] = playbook;
                            replaced += 1;
                        }
                        None => {
                            merged.push(playbook);
                            added += 1;
                        }
                    }
                }
                validate_collection(&merged, self.capacity)?;
                self.playbooks = merged;
                ImportSummary {
                    added,
                    replaced,
                    total: self.playbooks.len(),
                }
            }
        };

        info!(
            mode = ?mode,
            added = summary.added,
            replaced = summary.replaced,
            total = summary.total,
            "Playbooks imported"
        );
        self.dirty = true;
        Ok(summary)
    }

    /// Serialize the collection to the persisted JSON form.
    pub fn export_json(&self) -> Result<String> {
        encode_playbooks(&self.playbooks)
    }

    /// Find cross-references that are broken or only resolve by fallback.
    pub fn audit_links(&self) -> Vec<LinkIssue> {
        let mut issues = Vec::new();
        for playbook in &self.playbooks {
            for (step, branch) in playbook.branches() {
                let Target::Playbook {
                    title,
                    index,
                    step: landing,
                } = &branch.target
                else {
                    continue;
                };

                let problem = match self.resolve_reference(title, *index) {
                    None => Some(LinkProblem::Unresolved {
                        title: title.clone(),
                        index: *index,
                    }),
                    Some(target) if &target.title != title => Some(LinkProblem::TitleMismatch {
                        title: title.clone(),
                        actual: target.title.clone(),
                    }),
                    Some(target) => (*landing).filter(|s| *s >= target.steps.len()).map(|s| {
                        LinkProblem::LandingStepOutOfRange {
                            step: s,
                            len: target.steps.len(),
                        }
                    }),
                };

                if let Some(problem) = problem {
                    issues.push(LinkIssue {
                        playbook: playbook.title.clone(),
                        step: step + 1,
                        branch: branch.title.clone(),
                        problem,
                    });
                }
            }
        }
        issues
    }

    /// The renderer's view: one node per playbook, ordered by slot.
    pub fn render_nodes(&self, layout: &NodeLayout) -> Vec<IncidentNode> {
        layout.incident_nodes(&self.playbooks)
    }

    /// Replace the collection with what the repository holds.
    ///
    /// Returns `false` (and leaves the store untouched) if the repository is
    /// empty.
    pub async fn load(&mut self, repo: &dyn PlaybookRepository) -> Result<bool> {
        match load_playbooks(repo, self.capacity).await? {
            Some(playbooks) => {
                info!(source = %repo.describe(), count = playbooks.len(), "Playbooks loaded");
                self.playbooks = playbooks;
                self.dirty = false;
                Ok(true)
            }
            None => {
                debug!(source = %repo.describe(), "No saved playbooks");
                Ok(false)
            }
        }
    }

    /// Persist the collection. On failure the in-memory state is kept.
    pub async fn save(&mut self, repo: &dyn PlaybookRepository) -> Result<()> {
        match save_playbooks(repo, &self.playbooks).await {
            Ok(()) => {
                info!(target_store = %repo.describe(), count = self.playbooks.len(), "Playbooks saved");
                self.dirty = false;
                Ok(())
            }
            Err(e) => {
                warn!(target_store = %repo.describe(), error = %e, "Failed to save playbooks");
                Err(e)
            }
        }
    }

    fn position_of(&self, title: &str) -> Option<usize> {
        self.playbooks.iter().position(|p| p.title == title)
    }

    fn check_capacity(&self, index: u32) -> Result<()> {
        if index >= self.capacity {
            return Err(BrainmapError::CapacityExceeded {
                index,
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    fn check_unique(&self, playbook: &Playbook, skip: Option<usize>) -> Result<()> {
        for (i, other) in self.playbooks.iter().enumerate() {
            if Some(i) == skip {
                continue;
            }
            if other.title == playbook.title {
                return Err(ValidationError::DuplicateTitle(playbook.title.clone()).into());
            }
            if other.index == playbook.index {
                return Err(ValidationError::DuplicateIndex {
                    index: playbook.index,
                    first: other.title.clone(),
                    second: playbook.title.clone(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Point every reference that resolved to `old` at its new title and slot.
    ///
    /// `known` holds the titles before the update, so references that only
    /// matched through the index fallback move as well.
    fn retarget(
        &mut self,
        known: &HashSet<String>,
        old: &Playbook,
        new_title: &str,
        new_index: u32,
    ) -> usize {
        let mut count = 0;
        for playbook in &mut self.playbooks {
            for step in &mut playbook.steps {
                for branch in step.conditions.iter_mut().chain(step.links.iter_mut()) {
                    let Target::Playbook { title, index, .. } = &mut branch.target else {
                        continue;
                    };
                    let by_title = title.as_str() == old.title;
                    let by_index = *index == Some(old.index) && !known.contains(title.as_str());
                    let current = title.as_str() == new_title && *index == Some(new_index);
                    if (by_title || by_index) && !current {
                        *title = new_title.to_string();
                        *index = Some(new_index);
                        count += 1;
                    }
                }
            }
        }
        count
    }
}
