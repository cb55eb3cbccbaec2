//! Transition descriptions consumed by the orchestrator.
//!
//! - `ValueTransition`: how one property animates; every field is optional so
//!   layers can be merged
//! - `Transition`: a base `ValueTransition` plus per-property overrides,
//!   similar to `transition: { duration: 0.3, x: { type: "spring" } }`

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::engine::easing::EasingFunction;

/// Key under which a `Transition` may store its fallback entry.
pub const DEFAULT_TRANSITION_KEY: &str = "default";

/// Which driver advances the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionType {
    /// Duration-based interpolation through the keyframes.
    Tween,
    /// Damped spring toward the final keyframe.
    Spring,
    /// Snap to the final keyframe without animating.
    Instant,
}

/// How a single property animates.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ValueTransition {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<TransitionType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<f32>,
    /// Time already spent in this animation before it was started here.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub easing: Option<EasingFunction>,
    /// Initial velocity override, units per second.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub velocity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stiffness: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub damping: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mass: Option<f64>,
    /// Set when this animation continues one started outside the runtime.
    pub is_handoff: bool,
}

impl ValueTransition {
    pub fn tween(duration_ms: f32) -> Self {
        Self {
            kind: Some(TransitionType::Tween),
            duration_ms: Some(duration_ms),
            ..Default::default()
        }
    }

    pub fn spring() -> Self {
        Self {
            kind: Some(TransitionType::Spring),
            ..Default::default()
        }
    }

    pub fn instant() -> Self {
        Self {
            kind: Some(TransitionType::Instant),
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay_ms: f32) -> Self {
        self.delay_ms = Some(delay_ms);
        self
    }

    pub fn with_easing(mut self, easing: EasingFunction) -> Self {
        self.easing = Some(easing);
        self
    }

    pub fn with_velocity(mut self, velocity: f64) -> Self {
        self.velocity = Some(velocity);
        self
    }

    pub fn is_spring(&self) -> bool {
        self.kind == Some(TransitionType::Spring)
    }

    /// Overlay every field `other` sets on top of `self`.
    pub fn merge(mut self, other: &ValueTransition) -> Self {
        self.kind = other.kind.or(self.kind);
        self.duration_ms = other.duration_ms.or(self.duration_ms);
        self.delay_ms = other.delay_ms.or(self.delay_ms);
        self.elapsed_ms = other.elapsed_ms.or(self.elapsed_ms);
        self.easing = other.easing.or(self.easing);
        self.velocity = other.velocity.or(self.velocity);
        self.stiffness = other.stiffness.or(self.stiffness);
        self.damping = other.damping.or(self.damping);
        self.mass = other.mass.or(self.mass);
        self.is_handoff |= other.is_handoff;
        self
    }
}

/// A transition for a batch of properties.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Transition {
    /// Applies to every property without its own entry.
    #[serde(flatten)]
    pub base: ValueTransition,
    /// Property-specific entries; a `"default"` entry replaces `base`.
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub properties: HashMap<String, ValueTransition>,
}

impl Transition {
    pub fn new(base: ValueTransition) -> Self {
        Self {
            base,
            properties: HashMap::new(),
        }
    }

    /// Add a property-specific entry.
    pub fn with_property(mut self, key: impl Into<String>, transition: ValueTransition) -> Self {
        self.properties.insert(key.into(), transition);
        self
    }

    /// The entry that applies to `key`: the property's own entry, then the
    /// `"default"` entry, then the base.
    pub fn for_property(&self, key: &str) -> &ValueTransition {
        self.properties
            .get(key)
            .or_else(|| self.properties.get(DEFAULT_TRANSITION_KEY))
            .unwrap_or(&self.base)
    }
}

impl From<ValueTransition> for Transition {
    fn from(base: ValueTransition) -> Self {
        Self::new(base)
    }
}
