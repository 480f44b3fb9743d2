//! Structural invariants for playbooks and playbook collections.

use std::collections::{HashMap, HashSet};

use crate::error::ValidationError;
use crate::model::{Playbook, Target};

/// Check a single playbook against the node-slot capacity.
pub fn validate_playbook(playbook: &Playbook, capacity: u32) -> Result<(), ValidationError> {
    if playbook.title.trim().is_empty() {
        return Err(ValidationError::EmptyTitle {
            index: playbook.index,
        });
    }
    if Target::is_reserved_title(&playbook.title) {
        return Err(ValidationError::ReservedTitle(playbook.title.clone()));
    }
    if playbook.index >= capacity {
        return Err(ValidationError::IndexOutOfRange {
            playbook: playbook.title.clone(),
            index: playbook.index,
            capacity,
        });
    }
    if playbook.steps.is_empty() {
        return Err(ValidationError::EmptySteps {
            playbook: playbook.title.clone(),
        });
    }

    let len = playbook.steps.len();
    for (i, step) in playbook.steps.iter().enumerate() {
        if step.title.trim().is_empty() {
            return Err(ValidationError::EmptyStepTitle {
                playbook: playbook.title.clone(),
                step: i + 1,
            });
        }
    }

    for (i, branch) in playbook.branches() {
        match &branch.target {
            Target::Step(target) if *target >= len => {
                return Err(ValidationError::StepOutOfRange {
                    playbook: playbook.title.clone(),
                    step: i + 1,
                    target: target + 1,
                    len,
                });
            }
            Target::Playbook { title, .. }
                if title.trim().is_empty() || Target::is_reserved_title(title) =>
            {
                return Err(ValidationError::InvalidTarget {
                    playbook: playbook.title.clone(),
                    step: i + 1,
                    target: title.clone(),
                });
            }
            _ => {}
        }
    }

    // Links always name another playbook by title and node slot.
    for (i, step) in playbook.steps.iter().enumerate() {
        for link in &step.links {
            match &link.target {
                Target::Step(_) => {
                    return Err(ValidationError::InvalidTarget {
                        playbook: playbook.title.clone(),
                        step: i + 1,
                        target: link.target.wire_target(),
                    });
                }
                Target::Playbook { index: None, .. } => {
                    return Err(ValidationError::MissingTargetIndex {
                        playbook: playbook.title.clone(),
                        step: i + 1,
                        link: link.title.clone(),
                    });
                }
                Target::Playbook { .. } => {}
            }
        }
    }

    Ok(())
}

/// Check every playbook plus title and node-slot uniqueness across the set.
pub fn validate_collection(playbooks: &[Playbook], capacity: u32) -> Result<(), ValidationError> {
    let mut titles: HashSet<&str> = HashSet::with_capacity(playbooks.len());
    let mut slots: HashMap<u32, &str> = HashMap::with_capacity(playbooks.len());

    for playbook in playbooks {
        validate_playbook(playbook, capacity)?;

        if !titles.insert(playbook.title.as_str()) {
            return Err(ValidationError::DuplicateTitle(playbook.title.clone()));
        }
        if let Some(first) = slots.insert(playbook.index, playbook.title.as_str()) {
            return Err(ValidationError::DuplicateIndex {
                index: playbook.index,
                first: first.to_string(),
                second: playbook.title.clone(),
            });
        }
    }
    Ok(())
}
