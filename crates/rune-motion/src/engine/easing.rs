//! Easing functions for tween timing and crossfades.

use serde::{Deserialize, Serialize};

/// Easing function mapping linear progress (0.0 to 1.0) to eased progress.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EasingFunction {
    /// No easing.
    Linear,

    /// `cubic-bezier(0.25, 0.1, 0.25, 1.0)`.
    #[default]
    Ease,

    /// `cubic-bezier(0.42, 0, 1, 1)`.
    EaseIn,

    /// `cubic-bezier(0, 0, 0.58, 1)`.
    EaseOut,

    /// `cubic-bezier(0.42, 0, 0.58, 1)`.
    EaseInOut,

    /// Circular ease-in, `1 - sqrt(1 - t²)`.
    CircIn,

    /// Circular ease-out, the mirror of `CircIn`.
    CircOut,

    /// Custom cubic bezier curve with control points (x1, y1) and (x2, y2).
    CubicBezier { x1: f64, y1: f64, x2: f64, y2: f64 },
}

impl EasingFunction {
    /// Evaluate the easing function at the given progress.
    ///
    /// Input is clamped to `[0, 1]`; bezier curves may overshoot on output.
    pub fn evaluate(&self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);

        match self {
            Self::Linear => t,
            Self::Ease => cubic_bezier(0.25, 0.1, 0.25, 1.0, t),
            Self::EaseIn => cubic_bezier(0.42, 0.0, 1.0, 1.0, t),
            Self::EaseOut => cubic_bezier(0.0, 0.0, 0.58, 1.0, t),
            Self::EaseInOut => cubic_bezier(0.42, 0.0, 0.58, 1.0, t),
            Self::CircIn => 1.0 - (1.0 - t * t).max(0.0).sqrt(),
            Self::CircOut => 1.0 - Self::CircIn.evaluate(1.0 - t),
            Self::CubicBezier { x1, y1, x2, y2 } => cubic_bezier(*x1, *y1, *x2, *y2, t),
        }
    }

    /// Create a custom cubic bezier easing. X control values are clamped to
    /// `[0, 1]` so the curve stays a function of time.
    pub fn cubic_bezier(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self::CubicBezier {
            x1: x1.clamp(0.0, 1.0),
            y1,
            x2: x2.clamp(0.0, 1.0),
            y2,
        }
    }

    /// Look up a named easing (`"linear"`, `"ease_out"`, `"easeOut"`, ...).
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized: String = name
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();
        match normalized.as_str() {
            "linear" => Some(Self::Linear),
            "ease" => Some(Self::Ease),
            "easein" => Some(Self::EaseIn),
            "easeout" => Some(Self::EaseOut),
            "easeinout" => Some(Self::EaseInOut),
            "circin" => Some(Self::CircIn),
            "circout" => Some(Self::CircOut),
            _ => None,
        }
    }
}

/// Squash `easing` into the `[min, max]` slice of progress: 0 before `min`,
/// 1 after `max`.
pub fn compress(min: f64, max: f64, easing: EasingFunction, t: f64) -> f64 {
    if t < min {
        return 0.0;
    }
    if t > max {
        return 1.0;
    }
    if max <= min {
        return 1.0;
    }
    easing.evaluate((t - min) / (max - min))
}

/// Evaluate a cubic bezier curve at progress `progress` using Newton-Raphson
/// to find the curve parameter for the x coordinate.
fn cubic_bezier(x1: f64, y1: f64, x2: f64, y2: f64, progress: f64) -> f64 {
    if progress <= 0.0 {
        return 0.0;
    }
    if progress >= 1.0 {
        return 1.0;
    }

    let t = solve_bezier_x(x1, x2, progress);
    bezier_y(y1, y2, t)
}

fn solve_bezier_x(x1: f64, x2: f64, target_x: f64) -> f64 {
    let mut t = target_x;

    for _ in 0..8 {
        let x = bezier_x(x1, x2, t) - target_x;
        if x.abs() < 1e-7 {
            break;
        }

        let dx = bezier_x_derivative(x1, x2, t);
        if dx.abs() < 1e-7 {
            break;
        }

        t -= x / dx;
        t = t.clamp(0.0, 1.0);
    }

    t
}

/// x(t) = 3(1-t)²t·x1 + 3(1-t)t²·x2 + t³
#[inline]
fn bezier_x(x1: f64, x2: f64, t: f64) -> f64 {
    let mt = 1.0 - t;
    3.0 * mt * mt * t * x1 + 3.0 * mt * t * t * x2 + t * t * t
}

#[inline]
fn bezier_y(y1: f64, y2: f64, t: f64) -> f64 {
    let mt = 1.0 - t;
    3.0 * mt * mt * t * y1 + 3.0 * mt * t * t * y2 + t * t * t
}

/// dx/dt = 3(1-t)²·x1 + 6(1-t)t·(x2-x1) + 3t²·(1-x2)
#[inline]
fn bezier_x_derivative(x1: f64, x2: f64, t: f64) -> f64 {
    let mt = 1.0 - t;
    3.0 * mt * mt * x1 + 6.0 * mt * t * (x2 - x1) + 3.0 * t * t * (1.0 - x2)
}
