//! Host measurement interface.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geometry::{LayoutBox, Point};
use crate::value::{AnimatableValue, PropertyKey};

/// Positioning scheme of a measured element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    #[default]
    Static,
    Relative,
    Absolute,
    Fixed,
    Sticky,
}

/// Detaches a resize listener.
pub type Unsubscribe = Box<dyn FnOnce()>;

/// Layout primitives the projection tree reads from (and writes to) the host.
///
/// `Instance` is whatever the host uses to identify a rendered element.
pub trait MeasurementHost {
    type Instance: Clone + fmt::Debug;

    /// Box of `instance` in viewport coordinates, including any transform
    /// currently applied.
    fn measure_viewport_box(&self, instance: &Self::Instance) -> LayoutBox;

    fn measure_scroll(&self, instance: &Self::Instance) -> Point;

    /// Whether `instance` is the document's scrolling element.
    fn check_is_scroll_root(&self, instance: &Self::Instance) -> bool;

    /// Replace the rendered transform of `instance`; `None` clears it so the
    /// next measurement reads pure layout.
    fn reset_transform(&self, instance: &Self::Instance, transform: Option<&str>);

    fn read_position(&self, _instance: &Self::Instance) -> Position {
        Position::Static
    }

    /// Resolved style values recorded into snapshots.
    fn read_values(&self, _instance: &Self::Instance) -> HashMap<PropertyKey, AnimatableValue> {
        HashMap::new()
    }

    /// Call `on_resize` whenever the viewport of `instance` resizes.
    fn attach_resize_listener(
        &self,
        _instance: &Self::Instance,
        _on_resize: Box<dyn Fn()>,
    ) -> Option<Unsubscribe> {
        None
    }
}
