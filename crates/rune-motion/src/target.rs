//! Animation targets: what each property should animate to.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::transition::Transition;
use crate::value::{AnimatableValue, AnimationType, Keyframes, PropertyKey};

/// Properties rendered through the element's transform.
pub const TRANSFORM_PROPERTIES: &[&str] = &[
    "transformPerspective",
    "x",
    "y",
    "z",
    "translateX",
    "translateY",
    "translateZ",
    "scale",
    "scaleX",
    "scaleY",
    "rotate",
    "rotateX",
    "rotateY",
    "rotateZ",
    "skew",
    "skewX",
    "skewY",
];

pub fn is_transform_property(key: &str) -> bool {
    TRANSFORM_PROPERTIES.contains(&key)
}

/// Desired values per property, in declaration order.
///
/// A `None` entry is declared but undefined and never animates.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Target {
    entries: Vec<(PropertyKey, Option<Keyframes>)>,
}

impl Target {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<PropertyKey>, keyframes: impl Into<Keyframes>) -> Self {
        self.insert(key, Some(keyframes.into()));
        self
    }

    /// Declare `key` without a value.
    pub fn with_undefined(mut self, key: impl Into<PropertyKey>) -> Self {
        self.insert(key, None);
        self
    }

    /// Set or replace the entry for `key`, keeping its original position.
    pub fn insert(&mut self, key: impl Into<PropertyKey>, keyframes: Option<Keyframes>) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = keyframes,
            None => self.entries.push((key, keyframes)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Keyframes> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.as_ref())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&Keyframes>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A target plus the transitions that animate it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetAndTransition {
    pub target: Target,
    /// Batch transition; the element default applies when absent.
    pub transition: Option<Transition>,
    /// Transitions keyed by the animation layer a value is leaving.
    pub transition_from: Option<HashMap<AnimationType, Transition>>,
    /// Values to set once every animation in the batch has settled.
    pub transition_end: Option<Vec<(PropertyKey, AnimatableValue)>>,
}

impl TargetAndTransition {
    pub fn new(target: Target) -> Self {
        Self {
            target,
            ..Default::default()
        }
    }

    pub fn with_transition(mut self, transition: impl Into<Transition>) -> Self {
        self.transition = Some(transition.into());
        self
    }

    pub fn with_transition_from(
        mut self,
        animation_type: AnimationType,
        transition: impl Into<Transition>,
    ) -> Self {
        self.transition_from
            .get_or_insert_with(HashMap::new)
            .insert(animation_type, transition.into());
        self
    }

    pub fn with_transition_end(
        mut self,
        key: impl Into<PropertyKey>,
        value: impl Into<AnimatableValue>,
    ) -> Self {
        self.transition_end
            .get_or_insert_with(Vec::new)
            .push((key.into(), value.into()));
        self
    }
}

impl From<Target> for TargetAndTransition {
    fn from(target: Target) -> Self {
        Self::new(target)
    }
}
