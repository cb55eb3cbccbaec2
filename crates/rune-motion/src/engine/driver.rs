//! Per-animation drivers: tween, spring and instant.
//!
//! A driver owns the timing state of one animation. `advance` moves it forward
//! by a frame delta and reports the sampled value.

use rune_motion_config::AnimationConfig;

use super::easing::EasingFunction;
use super::interpolate::Interpolate;
use crate::transition::{TransitionType, ValueTransition};
use crate::value::{AnimatableValue, Keyframes};

/// Longest integration step for springs, in milliseconds.
const MAX_SPRING_STEP_MS: f64 = 1.0;

/// Longest frame gap a spring integrates over.
const MAX_SPRING_FRAME_MS: f64 = 250.0;

/// Fallbacks for transition fields left unset.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineDefaults {
    pub duration_ms: f64,
    pub easing: EasingFunction,
    pub stiffness: f64,
    pub damping: f64,
    pub mass: f64,
    pub rest_delta: f64,
    pub rest_speed: f64,
}

impl Default for EngineDefaults {
    fn default() -> Self {
        Self::from_config(&AnimationConfig::default())
    }
}

impl EngineDefaults {
    pub fn from_config(config: &AnimationConfig) -> Self {
        Self {
            duration_ms: config.default_duration_ms as f64,
            easing: EasingFunction::from_name(&config.default_easing).unwrap_or_default(),
            stiffness: config.spring.stiffness,
            damping: config.spring.damping,
            mass: config.spring.mass,
            rest_delta: config.spring.rest_delta,
            rest_speed: config.spring.rest_speed,
        }
    }
}

/// Result of advancing a driver by one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub value: AnimatableValue,
    /// Units per second; zero for non-numeric values.
    pub velocity: f64,
    /// The delay has elapsed and the value is moving.
    pub active: bool,
    pub done: bool,
}

#[derive(Debug, Clone)]
pub struct Tween {
    keyframes: Vec<AnimatableValue>,
    duration_ms: f64,
    delay_ms: f64,
    elapsed_ms: f64,
    easing: EasingFunction,
}

impl Tween {
    fn progress(&self) -> f64 {
        if self.elapsed_ms < self.delay_ms {
            return 0.0;
        }
        let active_elapsed = self.elapsed_ms - self.delay_ms;
        if self.duration_ms > 0.0 {
            (active_elapsed / self.duration_ms).clamp(0.0, 1.0)
        } else {
            1.0
        }
    }

    /// Sample the keyframes, easing each segment separately.
    fn sample(&self) -> AnimatableValue {
        let segments = self.keyframes.len().saturating_sub(1);
        if segments == 0 {
            return self.keyframes[0].clone();
        }
        let scaled = self.progress() * segments as f64;
        let index = (scaled.floor() as usize).min(segments - 1);
        let local = scaled - index as f64;
        self.keyframes[index].interpolate(&self.keyframes[index + 1], self.easing.evaluate(local))
    }
}

#[derive(Debug, Clone)]
pub struct Spring {
    position: f64,
    velocity: f64,
    target: f64,
    stiffness: f64,
    damping: f64,
    mass: f64,
    rest_delta: f64,
    rest_speed: f64,
    delay_ms: f64,
    elapsed_ms: f64,
}

impl Spring {
    fn integrate(&mut self, delta_ms: f64) {
        let mut delta_ms = if delta_ms.is_nan() {
            0.0
        } else {
            delta_ms.min(MAX_SPRING_FRAME_MS)
        };
        while delta_ms > 0.0 {
            let step_ms = delta_ms.min(MAX_SPRING_STEP_MS);
            let dt = step_ms / 1000.0;
            let force = -self.stiffness * (self.position - self.target) - self.damping * self.velocity;
            self.velocity += force / self.mass * dt;
            self.position += self.velocity * dt;
            delta_ms -= step_ms;
        }
    }

    fn at_rest(&self) -> bool {
        self.velocity.abs() <= self.rest_speed && (self.target - self.position).abs() <= self.rest_delta
    }
}

#[derive(Debug, Clone)]
pub enum Driver {
    Tween(Tween),
    Spring(Spring),
    Instant(AnimatableValue),
}

impl Driver {
    /// Build the driver for animating `current` toward `keyframes`.
    pub fn new(
        current: &AnimatableValue,
        velocity: f64,
        keyframes: &Keyframes,
        transition: &ValueTransition,
        defaults: &EngineDefaults,
    ) -> Self {
        let Some(last) = keyframes.last().cloned() else {
            return Self::Instant(current.clone());
        };

        let delay_ms = transition.delay_ms.unwrap_or(0.0) as f64;
        let elapsed_ms = transition.elapsed_ms.unwrap_or(0.0) as f64;

        match transition.kind.unwrap_or(TransitionType::Tween) {
            TransitionType::Instant => Self::Instant(last),
            TransitionType::Spring => match (current.as_f64(), last.as_f64()) {
                (Some(position), Some(target)) => Self::Spring(Spring {
                    position,
                    velocity: transition.velocity.unwrap_or(velocity),
                    target,
                    stiffness: transition.stiffness.unwrap_or(defaults.stiffness),
                    damping: transition.damping.unwrap_or(defaults.damping),
                    mass: transition.mass.unwrap_or(defaults.mass).max(f64::EPSILON),
                    rest_delta: defaults.rest_delta,
                    rest_speed: defaults.rest_speed,
                    delay_ms,
                    elapsed_ms,
                }),
                _ => Self::tween(current, keyframes, transition, defaults, delay_ms, elapsed_ms),
            },
            TransitionType::Tween => {
                Self::tween(current, keyframes, transition, defaults, delay_ms, elapsed_ms)
            }
        }
    }

    fn tween(
        current: &AnimatableValue,
        keyframes: &Keyframes,
        transition: &ValueTransition,
        defaults: &EngineDefaults,
        delay_ms: f64,
        elapsed_ms: f64,
    ) -> Self {
        let keyframes = match keyframes {
            Keyframes::Scalar { value } => vec![current.clone(), value.clone()],
            Keyframes::Sequence { values } => values.clone(),
        };
        Self::Tween(Tween {
            keyframes,
            duration_ms: transition
                .duration_ms
                .map(f64::from)
                .unwrap_or(defaults.duration_ms),
            delay_ms,
            elapsed_ms,
            easing: transition.easing.unwrap_or(defaults.easing),
        })
    }

    /// Whether the driver still waits for its delay.
    pub fn is_delayed(&self) -> bool {
        match self {
            Self::Tween(tween) => tween.elapsed_ms < tween.delay_ms,
            Self::Spring(spring) => spring.elapsed_ms < spring.delay_ms,
            Self::Instant(_) => false,
        }
    }

    /// The value the animation settles on.
    pub fn final_value(&self) -> AnimatableValue {
        match self {
            Self::Tween(tween) => tween.keyframes[tween.keyframes.len() - 1].clone(),
            Self::Spring(spring) => AnimatableValue::F64 {
                value: spring.target,
            },
            Self::Instant(value) => value.clone(),
        }
    }

    /// Advance by `delta_ms`.
    pub fn advance(&mut self, delta_ms: f64, previous: &AnimatableValue) -> Step {
        match self {
            Self::Instant(value) => Step {
                value: value.clone(),
                velocity: 0.0,
                active: true,
                done: true,
            },
            Self::Tween(tween) => {
                tween.elapsed_ms += delta_ms;
                let active = tween.elapsed_ms >= tween.delay_ms;
                let done = active && tween.progress() >= 1.0;
                let value = tween.sample();
                let velocity = match (previous.as_f64(), value.as_f64()) {
                    (Some(a), Some(b)) if delta_ms > 0.0 && !done => (b - a) / delta_ms * 1000.0,
                    _ => 0.0,
                };
                Step {
                    value,
                    velocity,
                    active,
                    done,
                }
            }
            Self::Spring(spring) => {
                let before = spring.elapsed_ms;
                spring.elapsed_ms += delta_ms;
                let active = spring.elapsed_ms >= spring.delay_ms;
                if active {
                    let moving_ms = spring.elapsed_ms - before.max(spring.delay_ms);
                    spring.integrate(moving_ms);
                }
                let done = active && spring.at_rest();
                if done {
                    spring.position = spring.target;
                    spring.velocity = 0.0;
                }
                Step {
                    value: AnimatableValue::F64 {
                        value: spring.position,
                    },
                    velocity: spring.velocity,
                    active,
                    done,
                }
            }
        }
    }
}
