//! Core value types shared by the orchestrator and value handles.
//!
//! - `AnimatableValue`: the values a handle can hold
//! - `Keyframes`: a target resolved once into a scalar or an ordered sequence
//! - `AnimationType`: which animation layer started an animation
//! - `ValueHandle`: the contract a per-property value store fulfils

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::controls::PlaybackControl;
use crate::transition::ValueTransition;

/// Property name such as `"opacity"` or `"x"`.
pub type PropertyKey = String;

/// Unique identifier for an animation instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnimationId(pub u64);

impl AnimationId {
    /// Generate a new unique animation ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for AnimationId {
    fn default() -> Self {
        Self::new()
    }
}

/// Playback state of an animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimationState {
    /// Created, waiting for its delay to elapse.
    #[default]
    Pending,
    /// Actively advancing.
    Running,
    /// Paused by a playback control.
    Paused,
    /// Reached its final keyframe.
    Finished,
    /// Stopped or superseded before completion.
    Cancelled,
}

impl AnimationState {
    /// Finished and cancelled animations never advance again.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Finished | Self::Cancelled)
    }
}

/// The animation layer that requested an animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimationType {
    Initial,
    Animate,
    WhileInView,
    WhileHover,
    WhileTap,
    WhileDrag,
    WhileFocus,
    Exit,
}

impl AnimationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Animate => "animate",
            Self::WhileInView => "while_in_view",
            Self::WhileHover => "while_hover",
            Self::WhileTap => "while_tap",
            Self::WhileDrag => "while_drag",
            Self::WhileFocus => "while_focus",
            Self::Exit => "exit",
        }
    }
}

impl std::fmt::Display for AnimationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value held by a value handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnimatableValue {
    /// Numeric value (opacity, x, scale, width, ...).
    F64 { value: f64 },
    /// RGBA color in linear premultiplied space.
    Color { rgba: [f32; 4] },
    /// Non-interpolable value (`"block"`, `"none"`, ...); switches at the end.
    Keyword { value: String },
}

impl AnimatableValue {
    /// Try to extract an f64 value.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::F64 { value } => Some(*value),
            _ => None,
        }
    }

    /// Try to extract a color value.
    pub fn as_color(&self) -> Option<[f32; 4]> {
        match self {
            Self::Color { rgba } => Some(*rgba),
            _ => None,
        }
    }

    /// Try to extract a keyword.
    pub fn as_keyword(&self) -> Option<&str> {
        match self {
            Self::Keyword { value } => Some(value),
            _ => None,
        }
    }
}

impl From<f64> for AnimatableValue {
    fn from(v: f64) -> Self {
        Self::F64 { value: v }
    }
}

impl From<[f32; 4]> for AnimatableValue {
    fn from(c: [f32; 4]) -> Self {
        Self::Color { rgba: c }
    }
}

impl From<&str> for AnimatableValue {
    fn from(s: &str) -> Self {
        Self::Keyword {
            value: s.to_string(),
        }
    }
}

/// A target for a single property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Keyframes {
    /// Animate from the current value to `value`.
    Scalar { value: AnimatableValue },
    /// Animate through every value in order.
    Sequence { values: Vec<AnimatableValue> },
}

impl Keyframes {
    pub fn scalar(value: impl Into<AnimatableValue>) -> Self {
        Self::Scalar {
            value: value.into(),
        }
    }

    pub fn sequence<V: Into<AnimatableValue>>(values: impl IntoIterator<Item = V>) -> Self {
        Self::Sequence {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Final resting value, `None` for an empty sequence.
    pub fn last(&self) -> Option<&AnimatableValue> {
        match self {
            Self::Scalar { value } => Some(value),
            Self::Sequence { values } => values.last(),
        }
    }

    /// Whether animating to these keyframes would move `current`.
    ///
    /// A sequence counts as changed if any keyframe differs from the current
    /// value.
    pub fn differs_from(&self, current: &AnimatableValue) -> bool {
        match self {
            Self::Scalar { value } => value != current,
            Self::Sequence { values } => values.iter().any(|v| v != current),
        }
    }
}

impl From<AnimatableValue> for Keyframes {
    fn from(value: AnimatableValue) -> Self {
        Self::Scalar { value }
    }
}

impl From<f64> for Keyframes {
    fn from(value: f64) -> Self {
        Self::scalar(value)
    }
}

impl From<&str> for Keyframes {
    fn from(value: &str) -> Self {
        Self::scalar(value)
    }
}

impl From<Vec<f64>> for Keyframes {
    fn from(values: Vec<f64>) -> Self {
        Self::sequence(values)
    }
}

/// Per-property value store driven by a scalar animation engine.
///
/// Handles are shared between the element that owns them and the animations
/// that drive them, so every method takes `&self`.
pub trait ValueHandle {
    /// Current value.
    fn get(&self) -> AnimatableValue;

    /// Set the value immediately, without animating.
    fn set(&self, value: AnimatableValue);

    /// Current velocity in units per second (zero for non-numeric values).
    fn velocity(&self) -> f64;

    /// Start animating `key` toward `keyframes`, superseding any animation
    /// already running on this handle.
    fn start(
        &self,
        key: &str,
        keyframes: &Keyframes,
        transition: &ValueTransition,
    ) -> PlaybackControl;

    /// Animation layer that last started an animation on this handle.
    fn current_animation_type(&self) -> Option<AnimationType>;

    fn set_current_animation_type(&self, animation_type: AnimationType);

    /// The in-flight animation, if any.
    fn animation(&self) -> Option<PlaybackControl>;
}
