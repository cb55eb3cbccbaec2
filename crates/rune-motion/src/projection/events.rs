//! Node lifecycle events and per-node listener registries.
//!
//! Listeners run synchronously in registration order. A listener that returns
//! an error or panics is logged and reported, and the remaining listeners
//! still run.

use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::NodeId;
use crate::error::ListenerError;
use crate::geometry::{Delta, LayoutBox};

/// Event names listeners subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeEventKind {
    WillUpdate,
    DidUpdate,
    BeforeMeasure,
    Measure,
    ProjectionUpdate,
    AnimationStart,
    AnimationComplete,
}

impl NodeEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WillUpdate => "will_update",
            Self::DidUpdate => "did_update",
            Self::BeforeMeasure => "before_measure",
            Self::Measure => "measure",
            Self::ProjectionUpdate => "projection_update",
            Self::AnimationStart => "animation_start",
            Self::AnimationComplete => "animation_complete",
        }
    }
}

impl fmt::Display for NodeEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a layout update, passed to `did_update` listeners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutUpdateData {
    /// The newly measured layout box.
    pub layout: LayoutBox,
    /// The layout box captured before the change.
    pub snapshot: LayoutBox,
    /// Visual delta from the new layout back to the snapshot.
    pub delta: Delta,
    /// Delta between the two layout boxes.
    pub layout_delta: Delta,
    pub has_layout_changed: bool,
    /// The box moved relative to its relative parent.
    pub has_relative_target_changed: bool,
    /// The snapshot came from another node sharing this node's layout id.
    pub is_shared: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeEvent {
    WillUpdate,
    DidUpdate(LayoutUpdateData),
    BeforeMeasure,
    Measure { layout_box: LayoutBox },
    ProjectionUpdate { delta: Delta },
    AnimationStart { origin: Delta },
    AnimationComplete,
}

impl NodeEvent {
    pub fn kind(&self) -> NodeEventKind {
        match self {
            Self::WillUpdate => NodeEventKind::WillUpdate,
            Self::DidUpdate(_) => NodeEventKind::DidUpdate,
            Self::BeforeMeasure => NodeEventKind::BeforeMeasure,
            Self::Measure { .. } => NodeEventKind::Measure,
            Self::ProjectionUpdate { .. } => NodeEventKind::ProjectionUpdate,
            Self::AnimationStart { .. } => NodeEventKind::AnimationStart,
            Self::AnimationComplete => NodeEventKind::AnimationComplete,
        }
    }
}

/// Handle returned when registering a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub type NodeListener = Box<dyn FnMut(&NodeEvent) -> anyhow::Result<()>>;

/// Listeners of one node, keyed by event.
#[derive(Default)]
pub struct Listeners {
    next_id: u64,
    by_kind: HashMap<NodeEventKind, Vec<(ListenerId, NodeListener)>>,
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<NodeEventKind, usize> = self
            .by_kind
            .iter()
            .map(|(kind, listeners)| (*kind, listeners.len()))
            .collect();
        f.debug_struct("Listeners").field("counts", &counts).finish()
    }
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, kind: NodeEventKind, listener: NodeListener) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.by_kind.entry(kind).or_default().push((id, listener));
        id
    }

    pub fn remove(&mut self, id: ListenerId) -> bool {
        for listeners in self.by_kind.values_mut() {
            if let Some(index) = listeners.iter().position(|(l, _)| *l == id) {
                listeners.remove(index);
                return true;
            }
        }
        false
    }

    pub fn has(&self, kind: NodeEventKind) -> bool {
        self.by_kind.get(&kind).is_some_and(|l| !l.is_empty())
    }

    /// Run every listener for `event`, returning the failures.
    pub fn notify(&mut self, node: NodeId, event: &NodeEvent) -> Vec<ListenerError> {
        let kind = event.kind();
        let Some(listeners) = self.by_kind.get_mut(&kind) else {
            return Vec::new();
        };

        let mut errors = Vec::new();
        for (_, listener) in listeners.iter_mut() {
            let error = match catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(Ok(())) => continue,
                Ok(Err(source)) => ListenerError::Failed {
                    node,
                    event: kind,
                    source,
                },
                Err(payload) => {
                    let message = payload
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| payload.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    ListenerError::Panicked {
                        node,
                        event: kind,
                        message,
                    }
                }
            };
            warn!(%node, event = %kind, error = %error, "projection listener failed");
            errors.push(error);
        }
        errors
    }
}
