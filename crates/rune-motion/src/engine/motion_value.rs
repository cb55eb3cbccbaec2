//! `MotionValue`, the built-in value handle.
//!
//! Holds the current value and velocity of one property and advances at most
//! one animation at a time. The host calls `tick` once per frame.

use std::cell::RefCell;
use std::fmt;

use tracing::trace;

use super::driver::{Driver, EngineDefaults};
use crate::controls::PlaybackControl;
use crate::transition::ValueTransition;
use crate::value::{AnimatableValue, AnimationState, AnimationType, Keyframes, ValueHandle};

struct ActiveAnimation {
    control: PlaybackControl,
    driver: Driver,
}

struct MotionValueState {
    current: AnimatableValue,
    velocity: f64,
    animation_type: Option<AnimationType>,
    active: Option<ActiveAnimation>,
}

/// Built-in [`ValueHandle`] backed by the tween/spring drivers.
pub struct MotionValue {
    state: RefCell<MotionValueState>,
    defaults: EngineDefaults,
}

impl fmt::Debug for MotionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("MotionValue")
            .field("current", &state.current)
            .field("velocity", &state.velocity)
            .field("animation_type", &state.animation_type)
            .field("animating", &state.active.is_some())
            .finish()
    }
}

impl MotionValue {
    pub fn new(initial: impl Into<AnimatableValue>) -> Self {
        Self::with_defaults(initial, EngineDefaults::default())
    }

    pub fn with_defaults(initial: impl Into<AnimatableValue>, defaults: EngineDefaults) -> Self {
        Self {
            state: RefCell::new(MotionValueState {
                current: initial.into(),
                velocity: 0.0,
                animation_type: None,
                active: None,
            }),
            defaults,
        }
    }

    /// Whether an animation is in flight.
    pub fn is_animating(&self) -> bool {
        self.state.borrow().active.is_some()
    }

    /// Stop the in-flight animation, leaving the value where it is.
    pub fn stop(&self) {
        let active = self.state.borrow_mut().active.take();
        if let Some(active) = active {
            self.state.borrow_mut().velocity = 0.0;
            active.control.stop();
        }
    }

    /// Advance the in-flight animation by `delta_ms` of frame time.
    pub fn tick(&self, delta_ms: f64) {
        let finished = {
            let mut state = self.state.borrow_mut();
            let previous = state.current.clone();
            let Some(active) = state.active.as_mut() else {
                return;
            };

            match active.control.state() {
                AnimationState::Paused => return,
                AnimationState::Cancelled => {
                    state.active = None;
                    state.velocity = 0.0;
                    return;
                }
                AnimationState::Finished => {
                    // Completed through its control; jump to the end.
                    let last = active.driver.final_value();
                    state.current = last;
                    state.velocity = 0.0;
                    state.active = None;
                    return;
                }
                AnimationState::Pending | AnimationState::Running => {}
            }

            let step = active.driver.advance(delta_ms, &previous);
            if step.active {
                active.control.begin();
            }
            state.current = step.value;
            state.velocity = step.velocity;

            if step.done {
                state.velocity = 0.0;
                state.active.take().map(|active| active.control)
            } else {
                None
            }
        };

        // Settle callbacks may read or write this value.
        if let Some(control) = finished {
            trace!(key = %control.key(), "motion value settled");
            control.complete();
        }
    }
}

impl ValueHandle for MotionValue {
    fn get(&self) -> AnimatableValue {
        self.state.borrow().current.clone()
    }

    fn set(&self, value: AnimatableValue) {
        let mut state = self.state.borrow_mut();
        state.current = value;
        state.velocity = 0.0;
    }

    fn velocity(&self) -> f64 {
        self.state.borrow().velocity
    }

    fn start(
        &self,
        key: &str,
        keyframes: &Keyframes,
        transition: &ValueTransition,
    ) -> PlaybackControl {
        let previous = self.state.borrow_mut().active.take();
        if let Some(previous) = previous {
            previous.control.cancel();
        }

        let mut state = self.state.borrow_mut();
        let driver = Driver::new(
            &state.current,
            state.velocity,
            keyframes,
            transition,
            &self.defaults,
        );
        let control = if driver.is_delayed() {
            PlaybackControl::pending(key)
        } else {
            PlaybackControl::new(key)
        };
        state.active = Some(ActiveAnimation {
            control: control.clone(),
            driver,
        });
        control
    }

    fn current_animation_type(&self) -> Option<AnimationType> {
        self.state.borrow().animation_type
    }

    fn set_current_animation_type(&self, animation_type: AnimationType) {
        self.state.borrow_mut().animation_type = Some(animation_type);
    }

    fn animation(&self) -> Option<PlaybackControl> {
        self.state
            .borrow()
            .active
            .as_ref()
            .map(|active| active.control.clone())
    }
}
