//! Exercise phase policies
//!
//! A policy maps one designated joint angle onto a movement phase and
//! names the phase edge that completes a repetition. The built-in table
//! is static data.
//!
//! Angles between the upper and lower threshold fall into a dead zone
//! that never changes phase.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::angles::{AngleVector, Joint};

/// Label reported for frames that could not be classified.
pub const UNKNOWN_EXERCISE: &str = "unknown";

/// Qualitative state of a movement cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Up,
    #[default]
    Down,
    Hold,
    Rest,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Up => "up",
            Phase::Down => "down",
            Phase::Hold => "hold",
            Phase::Rest => "rest",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the primary joint angle selects a phase.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PhaseRule {
    /// `angle > upper` selects `above`, `angle < lower` selects `below`,
    /// anything in between is the dead zone.
    Band {
        upper: f64,
        lower: f64,
        above: Phase,
        below: Phase,
    },
    /// Isometric hold: strictly inside `(low, high)` selects `inside`,
    /// beyond either bound by more than `margin` selects `outside`.
    Window {
        low: f64,
        high: f64,
        margin: f64,
        inside: Phase,
        outside: Phase,
    },
}

impl PhaseRule {
    /// Phase implied by a single angle, `None` inside the dead zone.
    pub fn classify(&self, angle: f64) -> Option<Phase> {
        match *self {
            PhaseRule::Band {
                upper,
                lower,
                above,
                below,
            } => {
                if angle > upper {
                    Some(above)
                } else if angle < lower {
                    Some(below)
                } else {
                    None
                }
            }
            PhaseRule::Window {
                low,
                high,
                margin,
                inside,
                outside,
            } => {
                if angle > low && angle < high {
                    Some(inside)
                } else if angle < low - margin || angle > high + margin {
                    Some(outside)
                } else {
                    None
                }
            }
        }
    }

    /// The (upper, lower) angle bounds of the rule.
    pub fn bounds(&self) -> (f64, f64) {
        match *self {
            PhaseRule::Band { upper, lower, .. } => (upper, lower),
            PhaseRule::Window { low, high, .. } => (high, low),
        }
    }
}

/// The transition that completes one repetition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RepEdge {
    pub from: Phase,
    pub to: Phase,
}

impl RepEdge {
    pub const fn new(from: Phase, to: Phase) -> Self {
        Self { from, to }
    }

    #[inline]
    pub fn matches(&self, from: Phase, to: Phase) -> bool {
        self.from == from && self.to == to
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PhasePolicy {
    pub primary: Joint,
    pub rule: PhaseRule,
    /// Phase a session is anchored to when it starts tracking this exercise.
    pub entry_phase: Phase,
    pub rep_edge: RepEdge,
}

impl PhasePolicy {
    pub fn band(primary: Joint, upper: f64, lower: f64, above: Phase, below: Phase) -> Self {
        Self {
            primary,
            rule: PhaseRule::Band {
                upper,
                lower,
                above,
                below,
            },
            entry_phase: above,
            rep_edge: RepEdge::new(below, above),
        }
    }

    pub fn with_entry(mut self, entry_phase: Phase) -> Self {
        self.entry_phase = entry_phase;
        self
    }

    pub fn with_rep_edge(mut self, from: Phase, to: Phase) -> Self {
        self.rep_edge = RepEdge::new(from, to);
        self
    }

    pub fn primary_angle(&self, angles: &AngleVector) -> f64 {
        angles.get(self.primary)
    }

    pub fn instantaneous_phase(&self, angles: &AngleVector) -> Option<Phase> {
        self.rule.classify(self.primary_angle(angles))
    }
}

/// Trim, lowercase and map `-`/space to `_`.
pub fn normalize_label(label: &str) -> String {
    label
        .trim()
        .chars()
        .map(|c| match c {
            '-' | ' ' => '_',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

/// Exercise label → policy lookup with aliases and a default row.
#[derive(Clone, Debug)]
pub struct PolicyTable {
    policies: HashMap<String, PhasePolicy>,
    aliases: HashMap<String, String>,
    default: PhasePolicy,
}

impl PolicyTable {
    pub fn new(default: PhasePolicy) -> Self {
        Self {
            policies: HashMap::new(),
            aliases: HashMap::new(),
            default,
        }
    }

    pub fn insert(&mut self, label: &str, policy: PhasePolicy) -> &mut Self {
        self.policies.insert(normalize_label(label), policy);
        self
    }

    pub fn alias(&mut self, alias: &str, canonical: &str) -> &mut Self {
        self.aliases
            .insert(normalize_label(alias), normalize_label(canonical));
        self
    }

    /// Normalised label with aliases resolved. Labels without a row are
    /// returned normalised as-is.
    pub fn canonical(&self, label: &str) -> String {
        let key = normalize_label(label);
        match self.aliases.get(&key) {
            Some(c) => c.clone(),
            None => key,
        }
    }

    pub fn contains(&self, label: &str) -> bool {
        self.policies.contains_key(&self.canonical(label))
    }

    /// Policy for a label, falling back to the default row.
    pub fn resolve(&self, label: &str) -> &PhasePolicy {
        self.policies
            .get(&self.canonical(label))
            .unwrap_or(&self.default)
    }

    pub fn default_policy(&self) -> &PhasePolicy {
        &self.default
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.policies.keys().map(String::as_str)
    }

    /// The built-in table shared by every engine unless one is injected.
    pub fn builtin() -> Arc<PolicyTable> {
        Arc::clone(&BUILTIN_POLICIES)
    }
}

static BUILTIN_POLICIES: Lazy<Arc<PolicyTable>> = Lazy::new(|| {
    use Phase::*;

    let mut table = PolicyTable::new(
        PhasePolicy::band(Joint::Elbow, 150.0, 100.0, Up, Down).with_entry(Down),
    );
    table
        .insert("squat", PhasePolicy::band(Joint::Knee, 150.0, 100.0, Up, Down))
        .insert("push_up", PhasePolicy::band(Joint::Elbow, 150.0, 100.0, Up, Down))
        .insert(
            "bicep_curl",
            // extended arm is "down", the curl completes on the way back
            PhasePolicy::band(Joint::Elbow, 150.0, 60.0, Down, Up).with_rep_edge(Up, Down),
        )
        .insert(
            "shoulder_press",
            PhasePolicy::band(Joint::Elbow, 150.0, 90.0, Up, Down).with_entry(Down),
        )
        .insert("deadlift", PhasePolicy::band(Joint::Hip, 160.0, 110.0, Up, Down))
        .insert("lunge", PhasePolicy::band(Joint::Knee, 150.0, 100.0, Up, Down))
        .insert(
            "high_knees",
            PhasePolicy::band(Joint::Knee, 140.0, 90.0, Down, Up).with_rep_edge(Down, Up),
        )
        .insert(
            "butt_kicks",
            PhasePolicy::band(Joint::Knee, 140.0, 90.0, Down, Up).with_rep_edge(Down, Up),
        )
        .insert(
            "wall_sits",
            PhasePolicy {
                primary: Joint::Knee,
                rule: PhaseRule::Window {
                    low: 70.0,
                    high: 110.0,
                    margin: 5.0,
                    inside: Hold,
                    outside: Rest,
                },
                entry_phase: Rest,
                rep_edge: RepEdge::new(Rest, Hold),
            },
        );
    table
        .alias("squats", "squat")
        .alias("pushup", "push_up")
        .alias("push_ups", "push_up")
        .alias("bicep_curls", "bicep_curl")
        .alias("curl", "bicep_curl")
        .alias("deadlifts", "deadlift")
        .alias("lunges", "lunge")
        .alias("high_knee", "high_knees")
        .alias("butt_kick", "butt_kicks")
        .alias("wall_sit", "wall_sits");
    Arc::new(table)
});
