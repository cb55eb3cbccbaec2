//! Error types for projection listeners.
//!
//! No public operation returns these: listener failures are isolated, logged
//! and reported through [`ProjectionTree::take_listener_errors`](crate::projection::ProjectionTree::take_listener_errors).

use thiserror::Error;

use crate::projection::{NodeEventKind, NodeId};

/// Result type for listener callbacks.
pub type Result<T> = std::result::Result<T, ListenerError>;

/// A listener misbehaved while handling a node event.
#[derive(Error, Debug)]
pub enum ListenerError {
    /// The listener returned an error.
    #[error("{event} listener on node {node} failed: {source}")]
    Failed {
        node: NodeId,
        event: NodeEventKind,
        #[source]
        source: anyhow::Error,
    },

    /// The listener panicked.
    #[error("{event} listener on node {node} panicked: {message}")]
    Panicked {
        node: NodeId,
        event: NodeEventKind,
        message: String,
    },
}

impl ListenerError {
    pub fn node(&self) -> NodeId {
        match self {
            Self::Failed { node, .. } | Self::Panicked { node, .. } => *node,
        }
    }

    pub fn event(&self) -> NodeEventKind {
        match self {
            Self::Failed { event, .. } | Self::Panicked { event, .. } => *event,
        }
    }
}
