//! Target animation orchestrator.
//!
//! `TargetAnimator::animate_target` walks every property of a resolved target
//! and decides, per property, whether to start an animation on the element's
//! value handle:
//!
//! ```text
//! for key in target
//!   ├── blocked by the layer's protected keys?       -> skip
//!   ├── no value handle / undefined target?           -> skip
//!   ├── pick transition (transition_from > batch > element default)
//!   ├── merge {delay, elapsed: 0} with the property's entry
//!   ├── handoff from an externally started animation?
//!   ├── nothing would change and nothing is moving?   -> skip
//!   └── start, tag animation type, track will-change
//! transition_end -> applied once every started animation settles
//! ```
//!
//! Nothing here fails: missing collaborators are skipped silently.

use std::fmt;
use std::rc::Rc;

use rune_motion_config::AnimationConfig;
use tracing::trace;

use crate::controls::{PlaybackControl, all_settled};
use crate::element::VisualElement;
use crate::target::{TargetAndTransition, is_transform_property};
use crate::transition::{Transition, ValueTransition};
use crate::value::{AnimationType, ValueHandle};

/// Source of elapsed time for animations started before the runtime took
/// over (for example, entry animations run by the host before hydration).
pub trait HandoffAnimations {
    /// Elapsed milliseconds of the external animation of `key` on the element
    /// identified by `appear_id`, or `None` if there is nothing to hand off.
    fn elapsed(&self, appear_id: &str, key: &str, value: &dyn ValueHandle) -> Option<f32>;
}

impl<F> HandoffAnimations for F
where
    F: Fn(&str, &str, &dyn ValueHandle) -> Option<f32>,
{
    fn elapsed(&self, appear_id: &str, key: &str, value: &dyn ValueHandle) -> Option<f32> {
        self(appear_id, key, value)
    }
}

/// Dependencies and switches for the orchestrator.
#[derive(Clone, Default)]
pub struct OrchestratorConfig {
    /// Injected handoff source; `None` disables handoff.
    pub handoff: Option<Rc<dyn HandoffAnimations>>,
    /// Treat every element as preferring reduced motion.
    pub reduced_motion: bool,
}

impl fmt::Debug for OrchestratorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrchestratorConfig")
            .field("handoff", &self.handoff.is_some())
            .field("reduced_motion", &self.reduced_motion)
            .finish()
    }
}

impl OrchestratorConfig {
    pub fn from_config(config: &AnimationConfig) -> Self {
        Self {
            handoff: None,
            reduced_motion: config.reduced_motion,
        }
    }

    pub fn with_handoff(mut self, handoff: Rc<dyn HandoffAnimations>) -> Self {
        self.handoff = Some(handoff);
        self
    }
}

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct AnimationOptions {
    /// Delay applied to every property unless its transition sets one.
    pub delay_ms: f32,
    /// Replaces the definition's batch transition.
    pub transition_override: Option<Transition>,
    /// Layer requesting the animation; `Animate` when unset.
    pub animation_type: Option<AnimationType>,
}

impl AnimationOptions {
    pub fn for_type(animation_type: AnimationType) -> Self {
        Self {
            animation_type: Some(animation_type),
            ..Default::default()
        }
    }
}

/// Starts value animations toward a target.
#[derive(Debug, Clone, Default)]
pub struct TargetAnimator {
    config: OrchestratorConfig,
}

impl TargetAnimator {
    pub fn new(config: OrchestratorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Animate `element` toward `definition`, returning a control for every
    /// animation actually started.
    pub fn animate_target<E>(
        &self,
        element: &Rc<E>,
        definition: &TargetAndTransition,
        options: &AnimationOptions,
    ) -> Vec<PlaybackControl>
    where
        E: VisualElement + ?Sized + 'static,
    {
        let TargetAndTransition {
            target,
            transition,
            transition_from,
            transition_end,
        } = element.make_target_animatable(definition);

        let transition = options
            .transition_override
            .clone()
            .or(transition)
            .or_else(|| element.default_transition());

        let will_change = element.will_change();
        let type_state = options
            .animation_type
            .and_then(|animation_type| element.animation_type_state(animation_type));
        let props = element.props();
        let reduce_motion = self.config.reduced_motion || element.should_reduce_motion();
        let animation_type = options.animation_type.unwrap_or(AnimationType::Animate);

        let mut controls = Vec::new();

        for (key, keyframes) in target.iter() {
            // Consumes any pending animation request for this key.
            let blocked = type_state
                .as_ref()
                .is_some_and(|state| state.borrow_mut().should_block(key));

            let (Some(value), Some(keyframes)) = (element.get_value(key), keyframes) else {
                trace!(key, "no value handle or target value");
                continue;
            };
            if blocked {
                trace!(key, %animation_type, "blocked by protected key");
                continue;
            }

            let from_layer = transition_from.as_ref().and_then(|from| {
                let layer = value.current_animation_type().unwrap_or(if props.has_initial {
                    AnimationType::Initial
                } else {
                    AnimationType::Animate
                });
                from.get(&layer)
            });

            let mut value_transition = ValueTransition {
                delay_ms: Some(options.delay_ms),
                elapsed_ms: Some(0.0),
                ..Default::default()
            };
            if let Some(chosen) = from_layer.or(transition.as_ref()) {
                value_transition = value_transition.merge(chosen.for_property(key));
            }

            if let (Some(handoff), Some(appear_id)) = (&self.config.handoff, &props.appear_id) {
                if let Some(elapsed) = handoff.elapsed(appear_id, key, value.as_ref()) {
                    value_transition.elapsed_ms = Some(elapsed);
                    value_transition.is_handoff = true;
                }
            }

            let mut can_skip =
                !value_transition.is_handoff && !keyframes.differs_from(&value.get());

            if value_transition.is_spring()
                && (value.velocity() != 0.0 || value_transition.velocity.is_some_and(|v| v != 0.0))
            {
                can_skip = false;
            }

            // A running animation may be heading somewhere else.
            if value.animation().is_some() {
                can_skip = false;
            }

            if can_skip {
                trace!(key, "already at target");
                continue;
            }

            let applied = if reduce_motion && is_transform_property(key) {
                ValueTransition::instant()
            } else {
                value_transition
            };

            if let Some(will_change) = &will_change {
                will_change.add(key);
            }

            let control = value.start(key, keyframes, &applied);
            value.set_current_animation_type(animation_type);
            trace!(key, %animation_type, id = control.id().0, "started animation");

            if let Some(will_change) = will_change.clone() {
                let key = key.to_string();
                control.on_settled(move |_| will_change.remove(&key));
            }

            controls.push(control);
        }

        if let Some(transition_end) = transition_end {
            let element = Rc::downgrade(element);
            all_settled(&controls, move || {
                if let Some(element) = element.upgrade() {
                    for (key, value) in transition_end {
                        element.set_static_value(&key, value);
                    }
                }
            });
        }

        controls
    }
}

/// Animate with a default-configured [`TargetAnimator`].
pub fn animate_target<E>(
    element: &Rc<E>,
    definition: &TargetAndTransition,
    options: &AnimationOptions,
) -> Vec<PlaybackControl>
where
    E: VisualElement + ?Sized + 'static,
{
    TargetAnimator::default().animate_target(element, definition, options)
}
