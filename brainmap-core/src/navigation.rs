//! Navigation engine: resolves branch targets into the panel to display.
//!
//! The engine tracks one panel: which playbook is shown, the focused step,
//! which step is expanded, and a transient highlight. Cross-playbook jumps go
//! through a short transition (`Navigating`) that [`NavigationEngine::tick`]
//! completes once the delay has passed. A newer jump replaces a pending one.
//!
//! Resolution failures never interrupt the viewer: the non-`try_` methods log
//! a warning and return [`NavOutcome::Ignored`] with the state unchanged.

use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::config::NavigationConfig;
use crate::error::NavigationError;
use crate::model::{Branch, Playbook, Step, Target};
use crate::store::PlaybookStore;

/// The playbook panel as currently displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelView {
    pub playbook: String,
    /// Focused step (0-based).
    pub step: usize,
    /// The one step whose description/conditions are expanded, if any.
    pub expanded: Option<usize>,
    highlight: Option<(usize, Instant)>,
}

impl PanelView {
    fn open(playbook: &str, step: usize) -> Self {
        Self {
            playbook: playbook.to_string(),
            step,
            expanded: None,
            highlight: None,
        }
    }

    /// Step still highlighted at `now`, if any.
    pub fn highlighted(&self, now: Instant) -> Option<usize> {
        self.highlight
            .filter(|(_, until)| now < *until)
            .map(|(step, _)| step)
    }
}

/// A cross-playbook jump waiting for its transition to finish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingJump {
    pub playbook: String,
    pub step: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NavPhase {
    #[default]
    Idle,
    Navigating {
        pending: PendingJump,
        ready_at: Instant,
    },
}

/// Result of a navigation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavOutcome {
    /// No target was given.
    NoTarget,
    /// Legacy `"next"`: the caller keeps rendering the following step.
    ContinueInPlace,
    /// Same-playbook jump to a step, applied immediately.
    InPage { step: usize },
    /// Cross-playbook jump, shown once the transition completes.
    Switching {
        playbook: String,
        step: usize,
        ready_at: Instant,
    },
    /// The target did not resolve; nothing changed.
    Ignored(NavigationError),
}

impl NavOutcome {
    pub fn is_navigation(&self) -> bool {
        matches!(self, NavOutcome::InPage { .. } | NavOutcome::Switching { .. })
    }
}

/// Single-panel navigation state machine.
#[derive(Debug, Clone)]
pub struct NavigationEngine {
    view: Option<PanelView>,
    phase: NavPhase,
    transition: Duration,
    highlight: Duration,
}

impl Default for NavigationEngine {
    fn default() -> Self {
        Self::new(&NavigationConfig::default())
    }
}

impl NavigationEngine {
    pub fn new(config: &NavigationConfig) -> Self {
        Self {
            view: None,
            phase: NavPhase::Idle,
            transition: config.transition(),
            highlight: config.highlight(),
        }
    }

    pub fn view(&self) -> Option<&PanelView> {
        self.view.as_ref()
    }

    pub fn phase(&self) -> &NavPhase {
        &self.phase
    }

    pub fn is_navigating(&self) -> bool {
        matches!(self.phase, NavPhase::Navigating { .. })
    }

    /// The displayed playbook and focused step, looked up in `store`.
    pub fn current<'s>(&self, store: &'s PlaybookStore) -> Option<(&'s Playbook, usize)> {
        let view = self.view.as_ref()?;
        store
            .find_by_title(&view.playbook)
            .map(|playbook| (playbook, view.step))
    }

    /// Open a playbook's panel at its first step (node click).
    ///
    /// Takes effect immediately and drops any pending transition.
    pub fn show_panel(&mut self, playbook: &Playbook) {
        debug!(playbook = %playbook.title, "Panel opened");
        self.view = Some(PanelView::open(&playbook.title, 0));
        self.phase = NavPhase::Idle;
    }

    pub fn close_panel(&mut self) {
        self.view = None;
        self.phase = NavPhase::Idle;
    }

    /// Expand `step`, collapsing any other; expanding it again collapses it.
    pub fn toggle_step(&mut self, step: usize) {
        if let Some(view) = self.view.as_mut() {
            view.expanded = match view.expanded {
                Some(current) if current == step => None,
                _ => Some(step),
            };
        }
    }

    /// Resolve a raw `(target, targetIndex, targetStep)` triple.
    pub fn resolve(
        &mut self,
        store: &PlaybookStore,
        target: Option<&str>,
        target_index: Option<u32>,
        target_step: Option<usize>,
        now: Instant,
    ) -> NavOutcome {
        let result = self.try_resolve(store, target, target_index, target_step, now);
        self.settle(target.unwrap_or_default(), result)
    }

    /// Like [`NavigationEngine::resolve`], but returns resolution failures.
    pub fn try_resolve(
        &mut self,
        store: &PlaybookStore,
        target: Option<&str>,
        target_index: Option<u32>,
        target_step: Option<usize>,
        now: Instant,
    ) -> Result<NavOutcome, NavigationError> {
        let Some(raw) = target else {
            return Ok(NavOutcome::NoTarget);
        };
        if raw == Target::NEXT {
            return Ok(NavOutcome::ContinueInPlace);
        }
        let target = match Target::parse_step_ref(raw) {
            Some(Ok(step)) => Target::Step(step),
            Some(Err(bad)) => return Err(NavigationError::MalformedStepRef(bad)),
            None => Target::Playbook {
                title: raw.to_string(),
                index: target_index,
                step: target_step,
            },
        };
        self.try_resolve_target(store, &target, now)
    }

    /// Resolve a normalized target.
    pub fn resolve_target(
        &mut self,
        store: &PlaybookStore,
        target: &Target,
        now: Instant,
    ) -> NavOutcome {
        let result = self.try_resolve_target(store, target, now);
        self.settle(&target.to_string(), result)
    }

    /// Like [`NavigationEngine::resolve_target`], but returns resolution failures.
    pub fn try_resolve_target(
        &mut self,
        store: &PlaybookStore,
        target: &Target,
        now: Instant,
    ) -> Result<NavOutcome, NavigationError> {
        match target {
            Target::Step(step) => self.jump_in_page(store, *step, now),
            Target::Playbook { title, index, step } => {
                self.jump_to_playbook(store, title, *index, *step, now)
            }
        }
    }

    /// Follow the `position`-th condition of the focused step.
    pub fn follow_condition(
        &mut self,
        store: &PlaybookStore,
        position: usize,
        now: Instant,
    ) -> NavOutcome {
        let branch = self.branch(store, position, "condition", |step| {
            step.active_conditions()
        });
        self.follow(store, branch, now)
    }

    /// Follow the `position`-th link of the focused step.
    pub fn follow_link(&mut self, store: &PlaybookStore, position: usize, now: Instant) -> NavOutcome {
        let branch = self.branch(store, position, "link", |step| step.links.as_slice());
        self.follow(store, branch, now)
    }

    /// Complete a pending transition if its delay has elapsed.
    ///
    /// Returns the newly shown panel when the transition finished on this call.
    pub fn tick(&mut self, now: Instant) -> Option<&PanelView> {
        let NavPhase::Navigating { ready_at, .. } = &self.phase else {
            return None;
        };
        if now < *ready_at {
            return None;
        }
        let NavPhase::Navigating { pending, .. } = std::mem::take(&mut self.phase) else {
            return None;
        };
        debug!(playbook = %pending.playbook, step = pending.step, "Transition complete");
        self.view = Some(PanelView::open(&pending.playbook, pending.step));
        self.view.as_ref()
    }

    fn jump_in_page(
        &mut self,
        store: &PlaybookStore,
        step: usize,
        now: Instant,
    ) -> Result<NavOutcome, NavigationError> {
        let len = {
            let (playbook, _) = self
                .current(store)
                .ok_or(NavigationError::NoActivePlaybook)?;
            if step >= playbook.steps.len() {
                return Err(NavigationError::StepOutOfRange {
                    playbook: playbook.title.clone(),
                    number: step + 1,
                    len: playbook.steps.len(),
                });
            }
            playbook.steps.len()
        };

        let highlight = self.highlight;
        let view = self.view.as_mut().ok_or(NavigationError::NoActivePlaybook)?;
        view.step = step;
        view.expanded = Some(step);
        view.highlight = Some((step, now + highlight));
        debug!(playbook = %view.playbook, step, len, "In-page jump");

        // A newer in-page jump supersedes any pending switch.
        if let NavPhase::Navigating { pending, .. } = std::mem::take(&mut self.phase) {
            debug!(playbook = %pending.playbook, "Pending transition dropped");
        }
        Ok(NavOutcome::InPage { step })
    }

    fn jump_to_playbook(
        &mut self,
        store: &PlaybookStore,
        title: &str,
        index: Option<u32>,
        step: Option<usize>,
        now: Instant,
    ) -> Result<NavOutcome, NavigationError> {
        let playbook =
            store
                .resolve_reference(title, index)
                .ok_or_else(|| NavigationError::UnknownPlaybook {
                    title: title.to_string(),
                    index,
                })?;

        let landing = step.filter(|s| *s < playbook.steps.len()).unwrap_or(0);
        let ready_at = now + self.transition;
        if self.is_navigating() {
            debug!(playbook = %playbook.title, "Replacing pending transition");
        }
        self.phase = NavPhase::Navigating {
            pending: PendingJump {
                playbook: playbook.title.clone(),
                step: landing,
            },
            ready_at,
        };
        debug!(playbook = %playbook.title, step = landing, "Cross-playbook jump");
        Ok(NavOutcome::Switching {
            playbook: playbook.title.clone(),
            step: landing,
            ready_at,
        })
    }

    fn branch<'s>(
        &self,
        store: &'s PlaybookStore,
        position: usize,
        kind: &'static str,
        pick: impl Fn(&'s Step) -> &'s [Branch],
    ) -> Result<&'s Branch, NavigationError> {
        let (playbook, step) = self
            .current(store)
            .ok_or(NavigationError::NoActivePlaybook)?;
        playbook
            .step(step)
            .and_then(|s| pick(s).get(position))
            .ok_or(NavigationError::NoSuchBranch { kind, position })
    }

    fn follow(
        &mut self,
        store: &PlaybookStore,
        branch: Result<&Branch, NavigationError>,
        now: Instant,
    ) -> NavOutcome {
        match branch {
            Ok(branch) => self.resolve_target(store, &branch.target, now),
            Err(e) => self.settle("", Err(e)),
        }
    }

    fn settle(&self, target: &str, result: Result<NavOutcome, NavigationError>) -> NavOutcome {
        result.unwrap_or_else(|e| {
            warn!(target_ref = target, error = %e, "Navigation ignored");
            NavOutcome::Ignored(e)
        })
    }
}
