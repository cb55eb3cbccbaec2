//! Interpolation between animatable values.
//!
//! Colors interpolate per channel in linear premultiplied space. Keywords and
//! mismatched value kinds cannot blend and switch to the target only at the
//! end of the segment.

use crate::value::AnimatableValue;

/// Types that can be blended between two values.
pub trait Interpolate: Sized {
    /// `t = 0.0` returns `self`, `t = 1.0` returns `to`.
    fn interpolate(&self, to: &Self, t: f64) -> Self;
}

/// Linear interpolation between two numbers.
#[inline]
pub fn mix(from: f64, to: f64, t: f64) -> f64 {
    from + (to - from) * t
}

impl Interpolate for f64 {
    fn interpolate(&self, to: &Self, t: f64) -> Self {
        mix(*self, *to, t)
    }
}

impl Interpolate for [f32; 4] {
    fn interpolate(&self, to: &Self, t: f64) -> Self {
        let t = t as f32;
        [
            self[0] + (to[0] - self[0]) * t,
            self[1] + (to[1] - self[1]) * t,
            self[2] + (to[2] - self[2]) * t,
            self[3] + (to[3] - self[3]) * t,
        ]
    }
}

impl Interpolate for AnimatableValue {
    fn interpolate(&self, to: &Self, t: f64) -> Self {
        match (self, to) {
            (Self::F64 { value: a }, Self::F64 { value: b }) => Self::F64 {
                value: a.interpolate(b, t),
            },
            (Self::Color { rgba: a }, Self::Color { rgba: b }) => Self::Color {
                rgba: a.interpolate(b, t),
            },
            _ => {
                if t >= 1.0 {
                    to.clone()
                } else {
                    self.clone()
                }
            }
        }
    }
}
