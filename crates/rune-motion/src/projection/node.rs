//! Per-node projection state.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use super::events::Listeners;
use super::host::Unsubscribe;
use super::snapshot::{ScrollState, Snapshot};
use crate::engine::driver::Driver;
use crate::geometry::{Delta, LayoutBox, Point};
use crate::transition::ValueTransition;

/// Aspect ratios closer than this count as unchanged.
const ASPECT_RATIO_TOLERANCE: f64 = 0.01;

/// Stable identifier of a mounted node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Callback asking the render layer to redraw a node.
#[derive(Clone)]
pub struct RenderCallback(Rc<dyn Fn(NodeId)>);

impl RenderCallback {
    pub fn new(callback: impl Fn(NodeId) + 'static) -> Self {
        Self(Rc::new(callback))
    }

    pub fn call(&self, node: NodeId) {
        (self.0)(node)
    }
}

impl fmt::Debug for RenderCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RenderCallback")
    }
}

/// Options for promoting a node to lead of its stack.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromoteOptions {
    /// Keep the outgoing lead's opacity instead of fading it out.
    pub preserve_follow_opacity: bool,
    /// Layout transition the new lead animates with from now on.
    pub transition: Option<ValueTransition>,
    /// Clear the new lead's transform and write it again on the next frame.
    pub needs_reset: bool,
}

impl PromoteOptions {
    pub fn with_preserve_follow_opacity(mut self, preserve: bool) -> Self {
        self.preserve_follow_opacity = preserve;
        self
    }

    pub fn with_transition(mut self, transition: ValueTransition) -> Self {
        self.transition = Some(transition);
        self
    }

    pub fn with_needs_reset(mut self, needs_reset: bool) -> Self {
        self.needs_reset = needs_reset;
        self
    }
}

/// Which parts of a layout change are animated. The rest snap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutAnimationType {
    #[default]
    Both,
    /// Animate size; position snaps.
    Size,
    /// Animate position; size snaps.
    Position,
    /// Animate both while the aspect ratio holds, otherwise position only.
    PreserveAspect,
}

impl LayoutAnimationType {
    /// Restrict `origin`, the delta from `layout` back to `snapshot`, to the
    /// animated parts.
    pub fn restrict(self, origin: Delta, snapshot: &LayoutBox, layout: &LayoutBox) -> Delta {
        let mut origin = origin;
        let snap_scale = match self {
            Self::Both => false,
            Self::Position => true,
            Self::Size => {
                origin.x.translate = 0.0;
                origin.y.translate = 0.0;
                false
            }
            Self::PreserveAspect => match (aspect_ratio(snapshot), aspect_ratio(layout)) {
                (Some(before), Some(after)) => (before - after).abs() > ASPECT_RATIO_TOLERANCE,
                _ => true,
            },
        };
        if snap_scale {
            origin.x.scale = 1.0;
            origin.y.scale = 1.0;
        }
        origin
    }
}

fn aspect_ratio(layout_box: &LayoutBox) -> Option<f64> {
    let height = layout_box.y.length();
    (height > 0.0).then(|| layout_box.x.length() / height)
}

#[derive(Debug, Clone, Default)]
pub struct ProjectionNodeOptions {
    /// Shared identifier; nodes with the same id form a stack.
    pub layout_id: Option<String>,
    /// Animate layout changes. Falls back to the tree setting.
    pub animate: Option<bool>,
    /// The node scrolls its children; their layout boxes remove its offset.
    pub layout_scroll: bool,
    /// Children resolve targets relative to this node.
    pub layout_root: bool,
    /// Crossfade with the previous lead. Falls back to the tree setting;
    /// `Some(false)` hides the previous lead on promotion.
    pub crossfade: Option<bool>,
    /// Measure on every update, not only when marked dirty.
    pub always_measure_layout: bool,
    /// Remove the node's current projection from snapshot layout boxes.
    pub snapshot_without_transform: bool,
    /// Applied when the node joins its stack at mount.
    pub initial_promotion: PromoteOptions,
    /// Layout transition. Falls back to the tree's layout duration and
    /// easing.
    pub transition: Option<ValueTransition>,
    pub animation_type: LayoutAnimationType,
    pub schedule_render: Option<RenderCallback>,
}

impl ProjectionNodeOptions {
    pub fn with_layout_id(mut self, layout_id: impl Into<String>) -> Self {
        self.layout_id = Some(layout_id.into());
        self
    }

    pub fn with_animate(mut self, animate: bool) -> Self {
        self.animate = Some(animate);
        self
    }

    pub fn with_layout_root(mut self, layout_root: bool) -> Self {
        self.layout_root = layout_root;
        self
    }

    pub fn with_layout_scroll(mut self, layout_scroll: bool) -> Self {
        self.layout_scroll = layout_scroll;
        self
    }

    pub fn with_crossfade(mut self, crossfade: bool) -> Self {
        self.crossfade = Some(crossfade);
        self
    }

    pub fn with_transition(mut self, transition: ValueTransition) -> Self {
        self.transition = Some(transition);
        self
    }

    pub fn with_animation_type(mut self, animation_type: LayoutAnimationType) -> Self {
        self.animation_type = animation_type;
        self
    }

    pub fn with_schedule_render(mut self, callback: RenderCallback) -> Self {
        self.schedule_render = Some(callback);
        self
    }
}

/// A running layout animation.
#[derive(Debug, Clone)]
pub struct LayoutAnimation {
    /// Delta from the new layout back to where the node was.
    pub origin: Delta,
    /// Starting box relative to the relative parent, for relative animations.
    pub relative_from: Option<LayoutBox>,
    /// 0 at the origin, 1 at the new layout. Springs may overshoot.
    pub progress: f64,
    pub transition: ValueTransition,
    /// Fade between this node and the node it resumes from.
    pub crossfade: bool,
    pub(crate) driver: Driver,
}

/// Root-only bookkeeping for a tree-wide update.
#[derive(Default)]
pub(crate) struct RootState {
    pub(crate) is_updating: bool,
    pub(crate) update_blocked_by_resize: bool,
    pub(crate) resize_unblock_at: Option<f64>,
    pub(crate) resize_signal: Rc<Cell<bool>>,
    pub(crate) resize_unsubscribe: Option<Unsubscribe>,
}

impl fmt::Debug for RootState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootState")
            .field("is_updating", &self.is_updating)
            .field("update_blocked_by_resize", &self.update_blocked_by_resize)
            .field("resize_unblock_at", &self.resize_unblock_at)
            .finish()
    }
}

/// One node of a [`ProjectionTree`](super::ProjectionTree).
#[derive(Debug)]
pub struct ProjectionNode<I> {
    pub(crate) id: NodeId,
    pub(crate) instance: I,
    pub(crate) options: ProjectionNodeOptions,

    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) root: NodeId,
    pub(crate) path: Vec<NodeId>,
    pub(crate) root_state: Option<RootState>,

    pub(crate) snapshot: Option<Rc<Snapshot>>,
    pub(crate) layout: Option<Snapshot>,
    pub(crate) scroll: Option<ScrollState>,

    pub(crate) target: Option<LayoutBox>,
    pub(crate) target_delta: Option<Delta>,
    pub(crate) relative_target: Option<LayoutBox>,
    pub(crate) relative_parent: Option<NodeId>,

    pub(crate) layout_corrected: Option<LayoutBox>,
    pub(crate) tree_scale: Point,
    pub(crate) projection_delta: Option<Delta>,
    pub(crate) projection_delta_with_transform: Option<Delta>,

    pub(crate) is_layout_dirty: bool,
    pub(crate) should_reset_transform: bool,
    pub(crate) update_manually_blocked: bool,

    pub(crate) is_visible: bool,
    pub(crate) is_present: bool,
    pub(crate) resume_from: Option<NodeId>,
    pub(crate) preserve_opacity: bool,
    pub(crate) opacity: f64,
    pub(crate) crossfade_opacity: Option<f64>,
    pub(crate) animation: Option<LayoutAnimation>,

    pub(crate) listeners: Listeners,
}

impl<I> ProjectionNode<I> {
    pub(crate) fn new(
        id: NodeId,
        instance: I,
        options: ProjectionNodeOptions,
        parent: Option<NodeId>,
        path: Vec<NodeId>,
    ) -> Self {
        let root = path.first().copied().unwrap_or(id);
        let root_state = parent.is_none().then(RootState::default);
        Self {
            id,
            instance,
            options,
            parent,
            children: Vec::new(),
            root,
            path,
            root_state,
            snapshot: None,
            layout: None,
            scroll: None,
            target: None,
            target_delta: None,
            relative_target: None,
            relative_parent: None,
            layout_corrected: None,
            tree_scale: Point::new(1.0, 1.0),
            projection_delta: None,
            projection_delta_with_transform: None,
            is_layout_dirty: false,
            should_reset_transform: false,
            update_manually_blocked: false,
            is_visible: true,
            is_present: true,
            resume_from: None,
            preserve_opacity: false,
            opacity: 1.0,
            crossfade_opacity: None,
            animation: None,
            listeners: Listeners::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn instance(&self) -> &I {
        &self.instance
    }

    pub fn options(&self) -> &ProjectionNodeOptions {
        &self.options
    }

    pub fn layout_id(&self) -> Option<&str> {
        self.options.layout_id.as_deref()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Ancestors, root first.
    pub fn path(&self) -> &[NodeId] {
        &self.path
    }

    pub fn depth(&self) -> usize {
        self.path.len()
    }

    /// Snapshot pending for the current update.
    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_deref()
    }

    /// Most recent layout measurement.
    pub fn layout(&self) -> Option<&Snapshot> {
        self.layout.as_ref()
    }

    pub fn scroll(&self) -> Option<ScrollState> {
        self.scroll
    }

    pub fn target(&self) -> Option<LayoutBox> {
        self.target
    }

    pub fn target_delta(&self) -> Option<Delta> {
        self.target_delta
    }

    pub fn relative_target(&self) -> Option<LayoutBox> {
        self.relative_target
    }

    pub fn relative_parent(&self) -> Option<NodeId> {
        self.relative_parent
    }

    /// Layout box with ancestor projections applied.
    pub fn layout_corrected(&self) -> Option<LayoutBox> {
        self.layout_corrected
    }

    /// Accumulated scale of ancestor projections.
    pub fn tree_scale(&self) -> Point {
        self.tree_scale
    }

    pub fn projection_delta(&self) -> Option<Delta> {
        self.projection_delta
    }

    pub fn projection_delta_with_transform(&self) -> Option<Delta> {
        self.projection_delta_with_transform
    }

    pub fn is_layout_dirty(&self) -> bool {
        self.is_layout_dirty
    }

    pub fn is_visible(&self) -> bool {
        self.is_visible
    }

    pub fn is_present(&self) -> bool {
        self.is_present
    }

    pub fn resume_from(&self) -> Option<NodeId> {
        self.resume_from
    }

    pub fn preserve_opacity(&self) -> bool {
        self.preserve_opacity
    }

    pub fn animation(&self) -> Option<&LayoutAnimation> {
        self.animation.as_ref()
    }

    /// A relative parent candidate: it has a layout and either moves or
    /// anchors its children.
    pub(crate) fn is_projecting(&self) -> bool {
        self.layout.is_some()
            && (self.relative_target.is_some()
                || self.target_delta.is_some()
                || self.options.layout_root)
    }

    pub(crate) fn schedule_render(&self) {
        if let Some(callback) = &self.options.schedule_render {
            callback.call(self.id);
        }
    }
}
