//! Boxes and deltas.
//!
//! A [`Delta`] is a per-axis affine transform: scale around `origin_point`,
//! then translate. `calc_box_delta(source, target)` produces the delta that
//! maps `source` onto `target`; `apply_box_delta` applies it.

use serde::{Deserialize, Serialize};

use crate::engine::mix;

/// Scales this close to 1 are treated as 1.
const SCALE_PRECISION: f64 = 0.0001;
/// Translations this close to 0 are treated as 0.
const TRANSLATE_PRECISION: f64 = 0.01;

/// A 2D point in viewport pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A span along one axis.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Axis {
    pub min: f64,
    pub max: f64,
}

impl Axis {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn length(&self) -> f64 {
        self.max - self.min
    }

    pub fn translate(&mut self, distance: f64) {
        self.min += distance;
        self.max += distance;
    }
}

/// An axis-aligned box.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LayoutBox {
    pub x: Axis,
    pub y: Axis,
}

impl LayoutBox {
    pub fn new(x: Axis, y: Axis) -> Self {
        Self { x, y }
    }

    /// Box from position and size.
    pub fn from_rect(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            x: Axis::new(left, left + width),
            y: Axis::new(top, top + height),
        }
    }

    pub fn width(&self) -> f64 {
        self.x.length()
    }

    pub fn height(&self) -> f64 {
        self.y.length()
    }

    pub fn translate(&mut self, offset: Point) {
        self.x.translate(offset.x);
        self.y.translate(offset.y);
    }

    pub fn translated(mut self, offset: Point) -> Self {
        self.translate(offset);
        self
    }

    /// Whether both boxes have the same size.
    pub fn same_size(&self, other: &LayoutBox) -> bool {
        (self.width() - other.width()).abs() < f64::EPSILON
            && (self.height() - other.height()).abs() < f64::EPSILON
    }
}

/// Transform along one axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisDelta {
    pub translate: f64,
    pub scale: f64,
    /// Relative position of the scale origin within the source axis (0..1).
    pub origin: f64,
    /// Absolute scale origin.
    pub origin_point: f64,
}

impl Default for AxisDelta {
    fn default() -> Self {
        Self {
            translate: 0.0,
            scale: 1.0,
            origin: 0.5,
            origin_point: 0.0,
        }
    }
}

impl AxisDelta {
    pub fn is_identity(&self) -> bool {
        self.translate == 0.0 && self.scale == 1.0
    }
}

/// Transform for a box.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Delta {
    pub x: AxisDelta,
    pub y: AxisDelta,
}

impl Delta {
    pub fn is_identity(&self) -> bool {
        self.x.is_identity() && self.y.is_identity()
    }
}

fn scale_point(point: f64, scale: f64, origin_point: f64) -> f64 {
    origin_point + scale * (point - origin_point)
}

pub fn apply_point_delta(point: f64, translate: f64, scale: f64, origin_point: f64) -> f64 {
    scale_point(point, scale, origin_point) + translate
}

pub fn apply_axis_delta(axis: &mut Axis, delta: &AxisDelta) {
    axis.min = apply_point_delta(axis.min, delta.translate, delta.scale, delta.origin_point);
    axis.max = apply_point_delta(axis.max, delta.translate, delta.scale, delta.origin_point);
}

/// Transform `layout_box` in place by `delta`.
pub fn apply_box_delta(layout_box: &mut LayoutBox, delta: &Delta) {
    apply_axis_delta(&mut layout_box.x, &delta.x);
    apply_axis_delta(&mut layout_box.y, &delta.y);
}

pub fn calc_axis_delta(delta: &mut AxisDelta, source: &Axis, target: &Axis, origin: f64) {
    delta.origin = origin;
    delta.origin_point = mix(source.min, source.max, origin);

    delta.scale = target.length() / source.length();
    if (delta.scale - 1.0).abs() <= SCALE_PRECISION || !delta.scale.is_finite() {
        delta.scale = 1.0;
    }

    delta.translate = mix(target.min, target.max, origin) - delta.origin_point;
    if delta.translate.abs() <= TRANSLATE_PRECISION || !delta.translate.is_finite() {
        delta.translate = 0.0;
    }
}

/// Delta mapping `source` onto `target`, scaling around the centre.
pub fn calc_box_delta(source: &LayoutBox, target: &LayoutBox) -> Delta {
    let mut delta = Delta::default();
    calc_axis_delta(&mut delta.x, &source.x, &target.x, 0.5);
    calc_axis_delta(&mut delta.y, &source.y, &target.y, 0.5);
    delta
}

pub fn calc_relative_axis(relative: &Axis, parent: &Axis) -> Axis {
    let min = parent.min + relative.min;
    Axis::new(min, min + relative.length())
}

/// Resolve a box expressed relative to `parent` into absolute coordinates.
pub fn calc_relative_box(relative: &LayoutBox, parent: &LayoutBox) -> LayoutBox {
    LayoutBox {
        x: calc_relative_axis(&relative.x, &parent.x),
        y: calc_relative_axis(&relative.y, &parent.y),
    }
}

pub fn calc_relative_axis_position(layout: &Axis, parent: &Axis) -> Axis {
    let min = layout.min - parent.min;
    Axis::new(min, min + layout.length())
}

/// Express `layout` relative to `parent`'s top-left corner.
pub fn calc_relative_position(layout: &LayoutBox, parent: &LayoutBox) -> LayoutBox {
    LayoutBox {
        x: calc_relative_axis_position(&layout.x, &parent.x),
        y: calc_relative_axis_position(&layout.y, &parent.y),
    }
}

/// Undo `delta`: the box that `apply_box_delta(_, delta)` maps onto `layout_box`.
pub fn remove_box_delta(layout_box: &mut LayoutBox, delta: &Delta) {
    for (axis, delta) in [(&mut layout_box.x, &delta.x), (&mut layout_box.y, &delta.y)] {
        let scale = if delta.scale == 0.0 { 1.0 } else { delta.scale };
        let remove = |point: f64| delta.origin_point + (point - delta.translate - delta.origin_point) / scale;
        axis.min = remove(axis.min);
        axis.max = remove(axis.max);
    }
}

/// Interpolate `delta` toward the identity transform: `progress == 0`
/// keeps `delta`, `progress == 1` yields the identity.
pub fn mix_delta_to_identity(delta: &Delta, progress: f64) -> Delta {
    let mix_axis = |axis: &AxisDelta| AxisDelta {
        translate: mix(axis.translate, 0.0, progress),
        scale: mix(axis.scale, 1.0, progress),
        origin: axis.origin,
        origin_point: axis.origin_point,
    };
    Delta {
        x: mix_axis(&delta.x),
        y: mix_axis(&delta.y),
    }
}

/// Interpolate every edge of two boxes.
pub fn mix_box(from: &LayoutBox, to: &LayoutBox, progress: f64) -> LayoutBox {
    let mix_axis = |from: &Axis, to: &Axis| {
        Axis::new(mix(from.min, to.min, progress), mix(from.max, to.max, progress))
    };
    LayoutBox {
        x: mix_axis(&from.x, &to.x),
        y: mix_axis(&from.y, &to.y),
    }
}

pub fn is_delta_zero(delta: &Delta) -> bool {
    delta.is_identity()
}
