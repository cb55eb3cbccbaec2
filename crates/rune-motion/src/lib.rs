//! Rune Motion
//!
//! Two cooperating pieces of the motion runtime:
//!
//! - [`orchestrator`]: given a resolved target, decides per property whether
//!   to start an animation, with which transition, and applies end values once
//!   everything settles.
//! - [`projection`]: a tree mirroring rendered elements that measures layout
//!   before and after a change and animates the difference with transforms,
//!   including shared-element crossfades.
//!
//! The crate is single-threaded: shared state lives in `Rc<RefCell<_>>` and
//! callbacks run on the caller's thread.

pub mod controls;
pub mod element;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod orchestrator;
pub mod projection;
pub mod target;
pub mod transition;
pub mod value;

pub use controls::{GroupPlaybackControls, PlaybackControl, all_settled};
pub use element::{
    AnimationTypeState, ElementProps, MotionElement, VisualElement, WillChange, WillChangeSet,
};
pub use engine::{EasingFunction, EngineDefaults, MotionValue};
pub use error::{ListenerError, Result};
pub use geometry::{Axis, AxisDelta, Delta, LayoutBox, Point};
pub use orchestrator::{
    AnimationOptions, HandoffAnimations, OrchestratorConfig, TargetAnimator, animate_target,
};
pub use projection::{
    LayoutAnimationType, MeasurementHost, NodeEvent, NodeEventKind, NodeId, ProjectionNodeOptions, ProjectionSettings,
    ProjectionTransform, ProjectionTree,
};
pub use rune_motion_config::MotionConfig;
pub use target::{Target, TargetAndTransition};
pub use transition::{Transition, TransitionType, ValueTransition};
pub use value::{AnimatableValue, AnimationId, AnimationState, AnimationType, Keyframes, ValueHandle};
