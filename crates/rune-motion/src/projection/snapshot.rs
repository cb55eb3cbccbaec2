//! Point-in-time measurements.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::NodeId;
use super::host::Position;
use crate::geometry::{LayoutBox, Point};
use crate::value::{AnimatableValue, PropertyKey};

/// One measurement of a node. Never mutated once taken.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Frame time the measurement was taken at.
    pub timestamp: f64,
    /// Box as the host reports it, in viewport coordinates.
    pub measured_box: LayoutBox,
    /// Box in page coordinates with element scroll removed.
    pub layout_box: LayoutBox,
    /// `layout_box` relative to the node's relative parent, if it had one.
    pub relative_box: Option<LayoutBox>,
    pub latest_values: HashMap<PropertyKey, AnimatableValue>,
    pub position: Position,
    /// Node that was measured. Differs from the holder for shared elements.
    pub source: NodeId,
}

/// Scroll offset of a node.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScrollState {
    pub offset: Point,
    pub is_root: bool,
}
