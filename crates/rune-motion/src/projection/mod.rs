//! Layout projection.
//!
//! A [`ProjectionTree`] mirrors the host's element tree. Before a layout
//! change the host calls [`ProjectionTree::will_update`]; afterwards
//! [`ProjectionTree::did_update`] measures the new layout and starts layout
//! animations that visually carry each node from its old box to the new one
//! using transforms. Nodes sharing a layout id form a [`NodeStack`] and hand
//! over between each other with an optional crossfade.

pub mod events;
pub mod flat_tree;
pub mod host;
pub mod node;
pub mod snapshot;
pub mod stack;
pub mod tree;

pub use events::{LayoutUpdateData, ListenerId, Listeners, NodeEvent, NodeEventKind, NodeListener};
pub use flat_tree::FlatTree;
pub use host::{MeasurementHost, Position, Unsubscribe};
pub use node::{
    LayoutAnimation, LayoutAnimationType, NodeId, ProjectionNode, ProjectionNodeOptions,
    PromoteOptions, RenderCallback,
};
pub use snapshot::{ScrollState, Snapshot};
pub use stack::NodeStack;
pub use tree::{ProjectionSettings, ProjectionTransform, ProjectionTree};
