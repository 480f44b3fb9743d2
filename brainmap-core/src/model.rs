//! Playbook data model.
//!
//! These are the normalized, in-memory types. The persisted JSON shape lives
//! in [`crate::codec`], which converts string targets into [`Target`] once at
//! load time.

use std::fmt;
use std::str::FromStr;

/// An incident response playbook bound to a node slot in the visualization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playbook {
    /// Unique title, also the primary cross-reference key.
    pub title: String,
    /// Node slot index, unique and below the configured capacity.
    pub index: u32,
    /// Node color.
    pub color: Color,
    /// Ordered steps; never empty once validated.
    pub steps: Vec<Step>,
}

impl Playbook {
    /// Get a step by its 0-based position.
    pub fn step(&self, position: usize) -> Option<&Step> {
        self.steps.get(position)
    }

    /// Iterate every branch (conditions then links) with its owning step.
    pub fn branches(&self) -> impl Iterator<Item = (usize, &Branch)> {
        self.steps.iter().enumerate().flat_map(|(i, step)| {
            step.conditions
                .iter()
                .chain(step.links.iter())
                .map(move |b| (i, b))
        })
    }
}

/// One unit of a playbook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub title: String,
    pub description: String,
    pub kind: StepKind,
    /// Decision branches; only shown for [`StepKind::Condition`] steps.
    pub conditions: Vec<Condition>,
    /// "See also" references, shown under any step.
    pub links: Vec<Link>,
}

impl Step {
    /// A plain instruction step.
    pub fn standard(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            kind: StepKind::Standard,
            conditions: Vec::new(),
            links: Vec::new(),
        }
    }

    /// A decision step with the given branches.
    pub fn condition(
        title: impl Into<String>,
        description: impl Into<String>,
        conditions: Vec<Branch>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            kind: StepKind::Condition,
            conditions,
            links: Vec::new(),
        }
    }

    pub fn with_link(mut self, link: Branch) -> Self {
        self.links.push(link);
        self
    }

    /// Conditions that are actually offered to the reader.
    pub fn active_conditions(&self) -> &[Branch] {
        match self.kind {
            StepKind::Condition => &self.conditions,
            StepKind::Standard => &[],
        }
    }
}

/// Step type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepKind {
    #[default]
    Standard,
    Condition,
}

impl StepKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StepKind::Standard => "standard",
            StepKind::Condition => "condition",
        }
    }
}

/// A condition or link: a labeled pointer at a step or another playbook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    pub title: String,
    pub description: String,
    pub target: Target,
}

impl Branch {
    pub fn new(title: impl Into<String>, description: impl Into<String>, target: Target) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            target,
        }
    }
}

/// A decision branch on a condition step.
pub type Condition = Branch;

/// A non-branching cross-reference to another playbook.
pub type Link = Branch;

/// Where a branch leads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// 0-based step in the same playbook.
    Step(usize),
    /// Another playbook, looked up by title then by node index.
    Playbook {
        title: String,
        index: Option<u32>,
        step: Option<usize>,
    },
}

impl Target {
    pub const NEXT: &'static str = "next";
    pub const STEP_PREFIX: &'static str = "step:";

    /// Cross-playbook reference with both lookup keys and a landing step.
    pub fn playbook(title: impl Into<String>, index: u32, step: usize) -> Self {
        Target::Playbook {
            title: title.into(),
            index: Some(index),
            step: Some(step),
        }
    }

    /// Parse a `step:<N>` reference (1-based) into a 0-based position.
    ///
    /// Returns `None` if `raw` does not carry the prefix at all and
    /// `Some(Err(..))` if it does but the number is unusable.
    pub fn parse_step_ref(raw: &str) -> Option<Result<usize, String>> {
        let number = raw.strip_prefix(Self::STEP_PREFIX)?;
        Some(match number.trim().parse::<usize>() {
            Ok(n) if n >= 1 => Ok(n - 1),
            _ => Err(raw.to_string()),
        })
    }

    /// Titles the `target` field would read back as a step reference.
    pub fn is_reserved_title(title: &str) -> bool {
        title == Self::NEXT || title.starts_with(Self::STEP_PREFIX)
    }

    /// The string written to the `target` field.
    pub fn wire_target(&self) -> String {
        match self {
            Target::Step(i) => format!("{}{}", Self::STEP_PREFIX, i + 1),
            Target::Playbook { title, .. } => title.clone(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Step(i) => write!(f, "step {}", i + 1),
            Target::Playbook { title, step, .. } => match step {
                Some(s) => write!(f, "{title} (step {})", s + 1),
                None => write!(f, "{title}"),
            },
        }
    }
}

/// RGB node color, written as `#RRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl FromStr for Color {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s
            .strip_prefix('#')
            .filter(|h| h.len() == 6 && h.bytes().all(|b| b.is_ascii_hexdigit()))
            .ok_or_else(|| s.to_string())?;
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|_| s.to_string())
        };
        Ok(Self {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        })
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl serde::Serialize for Color {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
