//! Built-in scalar animation engine.
//!
//! Hosts with their own engine implement [`ValueHandle`](crate::value::ValueHandle)
//! directly; this one drives [`MotionValue`] from a per-frame `tick`.
//!
//! ```text
//! MotionValue::start(keyframes, transition)
//!   └── Driver (Tween | Spring | Instant)
//!         └── advanced by MotionValue::tick(delta_ms)
//! ```

pub mod driver;
pub mod easing;
pub mod interpolate;
pub mod motion_value;

pub use driver::EngineDefaults;
pub use easing::EasingFunction;
pub use interpolate::{Interpolate, mix};
pub use motion_value::MotionValue;
