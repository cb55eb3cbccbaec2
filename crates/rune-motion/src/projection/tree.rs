//! The projection tree.
//!
//! Nodes live in an arena keyed by [`NodeId`]. Parent to children is the
//! only owning edge; `root`, `relative_parent`, `resume_from` and stack
//! membership are plain ids, cleared when the referenced node unmounts.
//!
//! # Update cycle
//!
//! ```text
//! will_update(node)      snapshot before the host changes layout
//!   ... host mutates layout ...
//! did_update(node)       tree-wide, per root:
//!   ├── reset transforms        (write)
//!   ├── update_layout           (read: before_measure, measure)
//!   ├── did_update listeners, start layout animations
//!   └── schedule projection
//! process_frame(timestamp)
//!   ├── resize blocking
//!   ├── advance layout animation drivers
//!   └── update_projection: resolve_target_delta (parents first),
//!       then calc_projection, then apply changed transforms
//! ```

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use rune_motion_config::{MotionConfig, SpringConfig};
use tracing::{debug, trace, warn};

use super::events::{LayoutUpdateData, ListenerId, NodeEvent, NodeEventKind};
use super::flat_tree::FlatTree;
use super::host::MeasurementHost;
use super::node::{
    LayoutAnimation, NodeId, ProjectionNode, ProjectionNodeOptions, PromoteOptions, RootState,
};
use super::snapshot::{ScrollState, Snapshot};
use super::stack::NodeStack;
use crate::engine::driver::Driver;
use crate::engine::easing::compress;
use crate::engine::{EasingFunction, EngineDefaults, mix};
use crate::error::ListenerError;
use crate::geometry::{
    AxisDelta, Delta, LayoutBox, Point, apply_box_delta, calc_box_delta, calc_relative_box,
    calc_relative_position, is_delta_zero, mix_box, mix_delta_to_identity, remove_box_delta,
};
use crate::transition::ValueTransition;
use crate::value::{AnimatableValue, Keyframes};

/// Layout animations drive a value from 0 to this, read back as progress.
const PROGRESS_SCALE: f64 = 1000.0;

/// Tree-wide projection settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionSettings {
    /// Frame time updates stay blocked after a resize.
    pub resize_unblock_delay_ms: f64,
    /// Crossfade shared elements unless a node opts out.
    pub crossfade: bool,
    /// Animate layout changes unless a node opts out.
    pub animate_layout: bool,
    pub layout_duration_ms: f64,
    pub layout_easing: EasingFunction,
    /// Spring physics for layout transitions of type spring.
    pub layout_spring: SpringConfig,
}

impl ProjectionSettings {
    pub fn from_config(config: &MotionConfig) -> Self {
        Self {
            resize_unblock_delay_ms: config.projection.resize_unblock_delay_ms,
            crossfade: config.projection.crossfade,
            animate_layout: config.projection.animate_layout && !config.animation.reduced_motion,
            layout_duration_ms: f64::from(config.animation.default_duration_ms),
            layout_easing: EasingFunction::from_name(&config.animation.default_easing)
                .unwrap_or_default(),
            layout_spring: config.animation.spring.clone(),
        }
    }

    fn layout_defaults(&self) -> EngineDefaults {
        EngineDefaults {
            duration_ms: self.layout_duration_ms,
            easing: self.layout_easing,
            stiffness: self.layout_spring.stiffness,
            damping: self.layout_spring.damping,
            mass: self.layout_spring.mass,
            rest_delta: self.layout_spring.rest_delta,
            rest_speed: self.layout_spring.rest_speed,
        }
    }
}

impl Default for ProjectionSettings {
    fn default() -> Self {
        Self::from_config(&MotionConfig::default())
    }
}

/// Transform the render layer applies to a node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionTransform {
    /// Translation in the parent's projected space.
    pub translate: Point,
    pub scale: Point,
    /// Transform origin as a fraction of the node's box.
    pub origin: Point,
}

impl ProjectionTransform {
    pub fn is_identity(&self) -> bool {
        self.translate == Point::default() && self.scale == Point::new(1.0, 1.0)
    }

    pub fn to_css(&self) -> String {
        if self.is_identity() {
            return "none".to_string();
        }
        format!(
            "translate3d({}px, {}px, 0) scale({}, {})",
            self.translate.x, self.translate.y, self.scale.x, self.scale.y
        )
    }

    pub fn origin_css(&self) -> String {
        format!("{}% {}% 0", self.origin.x * 100.0, self.origin.y * 100.0)
    }
}

impl fmt::Display for ProjectionTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_css())
    }
}

pub struct ProjectionTree<H: MeasurementHost> {
    host: H,
    settings: ProjectionSettings,
    nodes: HashMap<NodeId, ProjectionNode<H::Instance>>,
    flat_tree: FlatTree,
    stacks: HashMap<String, NodeStack>,
    next_id: u64,
    now: f64,
    last_frame: Option<f64>,
    projection_scheduled: bool,
    listener_errors: Vec<ListenerError>,
}

impl<H: MeasurementHost> fmt::Debug for ProjectionTree<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectionTree")
            .field("nodes", &self.nodes.len())
            .field("stacks", &self.stacks.keys().collect::<Vec<_>>())
            .field("now", &self.now)
            .field("projection_scheduled", &self.projection_scheduled)
            .finish()
    }
}

impl<H: MeasurementHost> ProjectionTree<H> {
    pub fn new(host: H) -> Self {
        Self::with_settings(host, ProjectionSettings::default())
    }

    pub fn with_settings(host: H, settings: ProjectionSettings) -> Self {
        Self {
            host,
            settings,
            nodes: HashMap::new(),
            flat_tree: FlatTree::new(),
            stacks: HashMap::new(),
            next_id: 1,
            now: 0.0,
            last_frame: None,
            projection_scheduled: false,
            listener_errors: Vec::new(),
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn settings(&self) -> &ProjectionSettings {
        &self.settings
    }

    pub fn node(&self, id: NodeId) -> Option<&ProjectionNode<H::Instance>> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every mounted node, parents before children.
    pub fn nodes_in_depth_order(&mut self) -> Vec<NodeId> {
        self.flat_tree.ordered()
    }

    pub fn stack(&self, layout_id: &str) -> Option<&NodeStack> {
        self.stacks.get(layout_id)
    }

    /// Lead of the stack for `layout_id`.
    pub fn get_lead(&self, layout_id: &str) -> Option<NodeId> {
        self.stacks.get(layout_id).and_then(NodeStack::lead)
    }

    /// Listener failures since the last call.
    pub fn take_listener_errors(&mut self) -> Vec<ListenerError> {
        std::mem::take(&mut self.listener_errors)
    }

    // Mounting

    /// Mount a node under `parent`, or as a new root. An unknown parent
    /// mounts the node as a root.
    pub fn mount(
        &mut self,
        parent: Option<NodeId>,
        instance: H::Instance,
        options: ProjectionNodeOptions,
    ) -> NodeId {
        let parent = match parent {
            Some(parent) if self.nodes.contains_key(&parent) => Some(parent),
            Some(parent) => {
                warn!(%parent, "unknown parent, mounting projection node as a root");
                None
            }
            None => None,
        };

        let id = NodeId(self.next_id);
        self.next_id += 1;

        let path = match parent.and_then(|p| self.nodes.get(&p)) {
            Some(parent) => {
                let mut path = parent.path.clone();
                path.push(parent.id);
                path
            }
            None => Vec::new(),
        };
        let depth = path.len();
        let mut node = ProjectionNode::new(id, instance, options, parent, path);

        if let Some(state) = node.root_state.as_mut() {
            let signal = state.resize_signal.clone();
            state.resize_unsubscribe = self
                .host
                .attach_resize_listener(&node.instance, Box::new(move || signal.set(true)));
        }

        if let Some(parent) = parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent.children.push(id);
        }

        if let Some(transition) = node.options.initial_promotion.transition.clone() {
            node.options.transition = Some(transition);
        }
        let layout_id = node.options.layout_id.clone();
        let preserve_follow_opacity = node.options.initial_promotion.preserve_follow_opacity;
        self.nodes.insert(id, node);
        self.flat_tree.add(id, depth);

        if let Some(layout_id) = layout_id {
            let prev = self.stacks.entry(layout_id).or_default().add(id);
            self.apply_promotion(id, prev, preserve_follow_opacity);
        }

        debug!(node = %id, ?parent, depth, "mounted projection node");
        id
    }

    /// Unmount `id` and its subtree. Returns `false` if it was not mounted.
    pub fn unmount(&mut self, id: NodeId) -> bool {
        let Some(children) = self.nodes.get(&id).map(|n| n.children.clone()) else {
            return false;
        };
        for child in children {
            self.unmount(child);
        }

        let Some(mut node) = self.nodes.remove(&id) else {
            return false;
        };
        if let Some(parent) = node.parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent.children.retain(|child| *child != id);
        }
        self.flat_tree.remove(id);

        if let Some(layout_id) = node.options.layout_id.as_deref() {
            let mut next = None;
            let mut emptied = false;
            if let Some(stack) = self.stacks.get_mut(layout_id) {
                next = stack.remove(id);
                emptied = stack.is_empty();
            }
            if emptied {
                self.stacks.remove(layout_id);
            }
            if let Some(next) = next {
                self.apply_promotion(next, None, false);
            }
        }

        if let Some(unsubscribe) = node
            .root_state
            .as_mut()
            .and_then(|state| state.resize_unsubscribe.take())
        {
            unsubscribe();
        }

        for other in self.nodes.values_mut() {
            if other.relative_parent == Some(id) {
                other.relative_parent = None;
                other.relative_target = None;
            }
            if other.resume_from == Some(id) {
                other.resume_from = None;
            }
        }

        debug!(node = %id, "unmounted projection node");
        true
    }

    // Listeners

    pub fn add_event_listener(
        &mut self,
        id: NodeId,
        kind: NodeEventKind,
        listener: impl FnMut(&NodeEvent) -> anyhow::Result<()> + 'static,
    ) -> Option<ListenerId> {
        let node = self.nodes.get_mut(&id)?;
        Some(node.listeners.add(kind, Box::new(listener)))
    }

    pub fn remove_event_listener(&mut self, id: NodeId, listener: ListenerId) -> bool {
        self.nodes
            .get_mut(&id)
            .is_some_and(|node| node.listeners.remove(listener))
    }

    pub fn has_listeners(&self, id: NodeId, kind: NodeEventKind) -> bool {
        self.nodes
            .get(&id)
            .is_some_and(|node| node.listeners.has(kind))
    }

    fn notify(&mut self, id: NodeId, event: NodeEvent) {
        if let Some(node) = self.nodes.get_mut(&id) {
            let errors = node.listeners.notify(id, &event);
            self.listener_errors.extend(errors);
        }
    }

    // Blocking

    fn root_state(&self, id: NodeId) -> Option<&RootState> {
        let root = self.nodes.get(&id)?.root;
        self.nodes.get(&root)?.root_state.as_ref()
    }

    fn root_state_mut(&mut self, id: NodeId) -> Option<&mut RootState> {
        let root = self.nodes.get(&id)?.root;
        self.nodes.get_mut(&root)?.root_state.as_mut()
    }

    pub fn block_update(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.update_manually_blocked = true;
        }
    }

    pub fn unblock_update(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.update_manually_blocked = false;
        }
    }

    /// Manually blocked, or the tree is blocked by a recent resize.
    pub fn is_update_blocked(&self, id: NodeId) -> bool {
        let manual = self
            .nodes
            .get(&id)
            .is_some_and(|node| node.update_manually_blocked);
        manual
            || self
                .root_state(id)
                .is_some_and(|state| state.update_blocked_by_resize)
    }

    /// Whether the tree containing `id` is between `will_update` and
    /// `did_update`.
    pub fn is_updating(&self, id: NodeId) -> bool {
        self.root_state(id).is_some_and(|state| state.is_updating)
    }

    // Measurement

    fn update_scroll(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        if !(node.is_root() || node.options.layout_scroll) {
            return;
        }
        let scroll = ScrollState {
            offset: self.host.measure_scroll(&node.instance),
            is_root: self.host.check_is_scroll_root(&node.instance),
        };
        if let Some(node) = self.nodes.get_mut(&id) {
            node.scroll = Some(scroll);
        }
    }

    /// Page box of `node`: its viewport box plus the scroll offsets of the
    /// root and of scrolling ancestors. A scroll root discards the offsets
    /// accumulated above it.
    fn remove_element_scroll(&self, node: &ProjectionNode<H::Instance>, measured: LayoutBox) -> LayoutBox {
        let mut page = measured;
        for (index, ancestor) in node
            .path
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .enumerate()
        {
            let Some(scroll) = ancestor.scroll else {
                continue;
            };
            if index == 0 || ancestor.options.layout_scroll {
                if scroll.is_root && index > 0 {
                    page = measured;
                }
                page.translate(scroll.offset);
            }
        }
        page
    }

    fn measure(&self, id: NodeId) -> Option<(LayoutBox, LayoutBox)> {
        let node = self.nodes.get(&id)?;
        let measured = self.host.measure_viewport_box(&node.instance);
        Some((measured, self.remove_element_scroll(node, measured)))
    }

    /// Capture the current geometry of `id` as its pending snapshot.
    pub fn take_snapshot(&mut self, id: NodeId) {
        let Some(root) = self.nodes.get(&id).map(|node| node.root) else {
            return;
        };
        self.update_scroll(root);
        if root != id {
            self.update_scroll(id);
        }

        let Some((measured_box, mut layout_box)) = self.measure(id) else {
            return;
        };
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        if node.options.snapshot_without_transform {
            if let Some(delta) = node.projection_delta {
                remove_box_delta(&mut layout_box, &delta);
            }
        }
        let relative_box = node
            .relative_parent
            .and_then(|parent| self.nodes.get(&parent))
            .and_then(|parent| parent.layout.as_ref())
            .map(|parent| calc_relative_position(&layout_box, &parent.layout_box));

        let snapshot = Snapshot {
            timestamp: self.now,
            measured_box,
            layout_box,
            relative_box,
            latest_values: self.host.read_values(&node.instance),
            position: self.host.read_position(&node.instance),
            source: id,
        };
        trace!(node = %id, ?layout_box, "took snapshot");
        if let Some(node) = self.nodes.get_mut(&id) {
            node.snapshot = Some(Rc::new(snapshot));
        }
    }

    /// Measure the current layout of `id`.
    pub fn update_layout(&mut self, id: NodeId) {
        if !self.nodes.contains_key(&id) {
            return;
        }
        self.notify(id, NodeEvent::BeforeMeasure);
        self.update_scroll(id);

        let Some((measured_box, layout_box)) = self.measure(id) else {
            return;
        };
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        let layout = Snapshot {
            timestamp: self.now,
            measured_box,
            layout_box,
            relative_box: None,
            latest_values: self.host.read_values(&node.instance),
            position: self.host.read_position(&node.instance),
            source: id,
        };

        if let Some(node) = self.nodes.get_mut(&id) {
            let changed = node
                .layout
                .as_ref()
                .is_none_or(|previous| previous.layout_box != layout_box);
            if changed {
                node.relative_target = None;
            }
            node.layout = Some(layout);
            node.is_layout_dirty = false;
        }
        self.notify(id, NodeEvent::Measure { layout_box });
    }

    // Update cycle

    /// Prepare `id` for a layout change. Repeated calls before `did_update`
    /// keep the first snapshot.
    pub fn will_update(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        let pending = node.is_layout_dirty || node.snapshot.is_some();
        let path = node.path.clone();

        if let Some(state) = self.root_state_mut(id) {
            if !state.is_updating {
                state.is_updating = true;
                debug!(node = %id, "starting tree update");
            }
        }
        if pending {
            return;
        }

        let mut layout_roots = Vec::new();
        for ancestor in &path {
            if let Some(node) = self.nodes.get_mut(ancestor) {
                node.should_reset_transform = true;
                if node.options.layout_root {
                    layout_roots.push(*ancestor);
                }
            }
        }
        for layout_root in layout_roots {
            self.will_update(layout_root);
        }

        if let Some(node) = self.nodes.get_mut(&id) {
            node.is_layout_dirty = true;
        }
        self.take_snapshot(id);
        self.notify(id, NodeEvent::WillUpdate);
    }

    fn tree_nodes(&mut self, root: NodeId) -> Vec<NodeId> {
        let ordered = self.flat_tree.ordered();
        ordered
            .into_iter()
            .filter(|id| self.nodes.get(id).is_some_and(|node| node.root == root))
            .collect()
    }

    /// Finish the update started by `will_update` on the tree containing
    /// `id`: measure, notify, start layout animations and schedule
    /// projection. A no-op if no update is pending.
    pub fn did_update(&mut self, id: NodeId) {
        let Some(root) = self.nodes.get(&id).map(|node| node.root) else {
            return;
        };
        match self.root_state_mut(root) {
            Some(state) if state.is_updating => state.is_updating = false,
            _ => {
                trace!(node = %id, "did_update without pending update");
                return;
            }
        }

        let tree = self.tree_nodes(root);

        if self.is_update_blocked(root) {
            debug!(%root, "update blocked, discarding snapshots");
            self.clear_update_state(&tree);
            return;
        }

        for id in &tree {
            let needs_reset = self
                .nodes
                .get(id)
                .is_some_and(|node| node.should_reset_transform || node.is_layout_dirty);
            if needs_reset {
                self.reset_node_transform(*id);
            }
        }

        for id in &tree {
            let needs_layout = self.nodes.get(id).is_some_and(|node| {
                node.is_layout_dirty || node.layout.is_none() || node.options.always_measure_layout
            });
            if needs_layout {
                self.update_layout(*id);
            }
        }

        for id in &tree {
            self.notify_layout_update(*id);
        }

        for id in &tree {
            let without_animation = self
                .nodes
                .get(id)
                .is_some_and(|node| node.animation.is_none() && node.resume_from.is_some());
            if without_animation {
                self.release_follow(*id);
            }
        }

        self.clear_update_state(&tree);
        self.projection_scheduled = true;
        debug!(%root, nodes = tree.len(), "tree update complete");
    }

    /// Clear the host transform of `id` and forget its projection, so the
    /// next projection update writes it again.
    fn reset_node_transform(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get_mut(&id) else {
            return;
        };
        node.should_reset_transform = false;
        node.projection_delta = None;
        node.projection_delta_with_transform = None;
        self.host.reset_transform(&node.instance, None);
    }

    fn clear_update_state(&mut self, tree: &[NodeId]) {
        for id in tree {
            if let Some(node) = self.nodes.get_mut(id) {
                node.snapshot = None;
                node.is_layout_dirty = false;
                node.should_reset_transform = false;
            }
        }
    }

    fn notify_layout_update(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        let (Some(snapshot), Some(layout)) = (node.snapshot.clone(), node.layout.as_ref()) else {
            return;
        };
        if node.update_manually_blocked {
            return;
        }

        let is_shared = snapshot.source != id;
        let layout_delta = calc_box_delta(&layout.layout_box, &snapshot.layout_box);
        let delta = if is_shared {
            calc_box_delta(&layout.measured_box, &snapshot.measured_box)
        } else {
            layout_delta
        };
        let relative_now = node
            .relative_parent
            .and_then(|parent| self.nodes.get(&parent))
            .and_then(|parent| parent.layout.as_ref())
            .map(|parent| calc_relative_position(&layout.layout_box, &parent.layout_box));
        let has_relative_target_changed = match (snapshot.relative_box, relative_now) {
            (Some(before), Some(now)) => before != now,
            _ => false,
        };

        let data = LayoutUpdateData {
            layout: layout.layout_box,
            snapshot: snapshot.layout_box,
            delta,
            layout_delta,
            has_layout_changed: !is_delta_zero(&layout_delta),
            has_relative_target_changed,
            is_shared,
        };
        let animate = node.options.animate.unwrap_or(self.settings.animate_layout);
        let origin = node
            .options
            .animation_type
            .restrict(delta, &snapshot.layout_box, &layout.layout_box);

        self.notify(id, NodeEvent::DidUpdate(data));

        if animate && (data.has_layout_changed || has_relative_target_changed || is_shared) {
            self.set_animation_origin(id, origin);
        }
    }

    // Layout animation

    fn layout_driver(&self, transition: &ValueTransition) -> Driver {
        Driver::new(
            &AnimatableValue::from(0.0),
            0.0,
            &Keyframes::scalar(PROGRESS_SCALE),
            transition,
            &self.settings.layout_defaults(),
        )
    }

    /// Start a layout animation whose first frame is `origin` applied to the
    /// new layout. It runs with the node's layout transition.
    pub fn set_animation_origin(&mut self, id: NodeId, origin: Delta) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        let has_relative_parent = node
            .relative_parent
            .and_then(|parent| self.nodes.get(&parent))
            .is_some_and(|parent| parent.layout.is_some());
        let relative_from = node
            .snapshot
            .as_ref()
            .and_then(|snapshot| snapshot.relative_box)
            .filter(|_| has_relative_parent);
        let crossfade = node
            .resume_from
            .is_some_and(|follow| self.nodes.contains_key(&follow))
            && node.options.crossfade.unwrap_or(self.settings.crossfade);

        let transition = node.options.transition.clone().unwrap_or_default();

        let animation = LayoutAnimation {
            origin,
            relative_from,
            progress: 0.0,
            driver: self.layout_driver(&transition),
            transition,
            crossfade,
        };
        if let Some(node) = self.nodes.get_mut(&id) {
            node.animation = Some(animation);
        }
        debug!(node = %id, crossfade, relative = relative_from.is_some(), "layout animation started");
        self.notify(id, NodeEvent::AnimationStart { origin });
        self.set_animation_progress(id, 0.0);
    }

    /// Restart the running layout animation of `id` from its origin with
    /// `transition`. Returns `false` if `id` is not animating.
    pub fn start_animation(&mut self, id: NodeId, transition: ValueTransition) -> bool {
        let driver = self.layout_driver(&transition);
        let Some(animation) = self.nodes.get_mut(&id).and_then(|n| n.animation.as_mut()) else {
            return false;
        };
        animation.driver = driver;
        animation.transition = transition;
        self.set_animation_progress(id, 0.0);
        true
    }

    /// Move the layout animation of `id` to `progress` (0 = origin,
    /// 1 = new layout).
    pub fn set_animation_progress(&mut self, id: NodeId, progress: f64) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        let Some(animation) = node.animation.as_ref() else {
            return;
        };

        let relative_to = node
            .relative_parent
            .and_then(|parent| self.nodes.get(&parent))
            .and_then(|parent| parent.layout.as_ref())
            .zip(node.layout.as_ref())
            .map(|(parent, layout)| calc_relative_position(&layout.layout_box, &parent.layout_box));
        let relative_target = animation
            .relative_from
            .zip(relative_to)
            .map(|(from, to)| mix_box(&from, &to, progress));
        let target_delta = relative_target
            .is_none()
            .then(|| mix_delta_to_identity(&animation.origin, progress));
        let crossfade = animation.crossfade;

        if let Some(node) = self.nodes.get_mut(&id) {
            if let Some(animation) = node.animation.as_mut() {
                animation.progress = progress;
            }
            node.relative_target = relative_target;
            node.target_delta = target_delta;
        }
        if crossfade {
            self.mix_crossfade(id, progress);
        }
        self.projection_scheduled = true;
    }

    fn mix_crossfade(&mut self, lead: NodeId, progress: f64) {
        let Some(node) = self.nodes.get_mut(&lead) else {
            return;
        };
        node.crossfade_opacity = Some(mix(
            0.0,
            node.opacity,
            compress(0.0, 0.5, EasingFunction::CircOut, progress),
        ));
        node.schedule_render();
        let resume_from = node.resume_from;

        let Some(follow) = resume_from.and_then(|id| self.nodes.get_mut(&id)) else {
            return;
        };
        let opacity = if follow.preserve_opacity {
            follow.opacity
        } else {
            mix(
                follow.opacity,
                0.0,
                compress(0.5, 0.95, EasingFunction::Linear, progress),
            )
        };
        follow.crossfade_opacity = Some(opacity);
        follow.schedule_render();
    }

    /// Drop the link between a lead and the node it resumed from.
    fn release_follow(&mut self, lead: NodeId) {
        let Some(node) = self.nodes.get_mut(&lead) else {
            return;
        };
        node.crossfade_opacity = None;
        let Some(follow) = node.resume_from.take() else {
            return;
        };
        if let Some(follow) = self.nodes.get_mut(&follow) {
            follow.crossfade_opacity = None;
            follow.schedule_render();
        }
    }

    /// End the layout animation of `id` at the new layout.
    pub fn finish_animation(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get_mut(&id) else {
            return;
        };
        if node.animation.take().is_none() {
            return;
        }
        node.target_delta = None;
        node.relative_target = None;
        self.release_follow(id);
        self.projection_scheduled = true;
        debug!(node = %id, "layout animation complete");
        self.notify(id, NodeEvent::AnimationComplete);
    }

    fn advance_layout_animations(&mut self, delta_ms: f64) {
        let animating: Vec<NodeId> = self
            .flat_tree
            .ordered()
            .into_iter()
            .filter(|id| self.nodes.get(id).is_some_and(|node| node.animation.is_some()))
            .collect();

        for id in animating {
            let Some(animation) = self.nodes.get_mut(&id).and_then(|n| n.animation.as_mut()) else {
                continue;
            };
            let previous = AnimatableValue::from(animation.progress * PROGRESS_SCALE);
            let step = animation.driver.advance(delta_ms, &previous);
            let progress = step.value.as_f64().map_or(1.0, |value| value / PROGRESS_SCALE);

            self.set_animation_progress(id, progress);
            if step.done {
                self.finish_animation(id);
            }
        }
    }

    // Projection

    /// Move `id` toward `layout + delta` at the next projection update.
    pub fn set_target_delta(&mut self, id: NodeId, delta: Delta) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.target_delta = Some(delta);
            node.relative_target = None;
            self.projection_scheduled = true;
        }
    }

    pub fn schedule_projection(&mut self) {
        self.projection_scheduled = true;
    }

    fn closest_projecting_parent(&self, id: NodeId) -> Option<NodeId> {
        let mut current = self.nodes.get(&id)?.parent;
        while let Some(parent) = current.and_then(|p| self.nodes.get(&p)) {
            if parent.is_projecting() {
                return Some(parent.id);
            }
            current = parent.parent;
        }
        None
    }

    fn skips_projection(&self, id: NodeId) -> bool {
        self.is_update_blocked(id) || self.is_updating(id)
    }

    /// Resolve where `id` should appear. Children with a relative parent
    /// follow that parent's resolved target, so parents must resolve first.
    pub fn resolve_target_delta(&mut self, id: NodeId) {
        if self.skips_projection(id) {
            return;
        }
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        let Some(layout) = node.layout.as_ref().map(|layout| layout.layout_box) else {
            return;
        };

        let target_delta = node.target_delta;
        let mut relative_parent = node.relative_parent;
        let mut relative_target = node.relative_target;

        if target_delta.is_none() && relative_target.is_none() {
            let parent_layout = self.closest_projecting_parent(id).and_then(|parent| {
                let parent_layout = self.nodes.get(&parent)?.layout.as_ref()?.layout_box;
                Some((parent, parent_layout))
            });
            match parent_layout {
                Some((parent, parent_layout)) => {
                    relative_parent = Some(parent);
                    relative_target = Some(calc_relative_position(&layout, &parent_layout));
                }
                None => {
                    relative_parent = None;
                    relative_target = None;
                }
            }
        }

        let parent_target = relative_parent
            .and_then(|parent| self.nodes.get(&parent))
            .and_then(|parent| parent.target);
        let target = match (relative_target, parent_target, target_delta) {
            (Some(relative), Some(parent_target), _) => calc_relative_box(&relative, &parent_target),
            (_, _, Some(delta)) => {
                let mut target = layout;
                apply_box_delta(&mut target, &delta);
                target
            }
            _ => layout,
        };

        if let Some(node) = self.nodes.get_mut(&id) {
            node.relative_parent = relative_parent;
            node.relative_target = relative_target;
            node.target = Some(target);
        }
    }

    /// Compute the delta that moves `id` from where its ancestors' projections
    /// leave it onto its target. Returns whether it changed.
    pub fn calc_projection(&mut self, id: NodeId) -> bool {
        if self.skips_projection(id) {
            return false;
        }
        let Some(node) = self.nodes.get(&id) else {
            return false;
        };
        let (Some(layout), Some(target)) = (node.layout.as_ref(), node.target) else {
            return false;
        };

        let mut corrected = layout.layout_box;
        let mut tree_scale = Point::new(1.0, 1.0);
        for ancestor in node.path.iter().filter_map(|a| self.nodes.get(a)) {
            if let Some(delta) = ancestor.projection_delta {
                apply_box_delta(&mut corrected, &delta);
                tree_scale.x *= delta.x.scale;
                tree_scale.y *= delta.y.scale;
            }
        }

        let delta = calc_box_delta(&corrected, &target);
        let unscale = |translate: f64, scale: f64| if scale == 0.0 { translate } else { translate / scale };
        let with_transform = Delta {
            x: AxisDelta {
                translate: unscale(delta.x.translate, tree_scale.x),
                ..delta.x
            },
            y: AxisDelta {
                translate: unscale(delta.y.translate, tree_scale.y),
                ..delta.y
            },
        };
        let changed = node.projection_delta != Some(delta);

        if let Some(node) = self.nodes.get_mut(&id) {
            node.layout_corrected = Some(corrected);
            node.tree_scale = tree_scale;
            node.projection_delta = Some(delta);
            node.projection_delta_with_transform = Some(with_transform);
            if changed {
                node.schedule_render();
            }
        }
        if changed {
            self.notify(id, NodeEvent::ProjectionUpdate { delta });
        }
        changed
    }

    /// Resolve targets and projections for every node, then write changed
    /// transforms to the host. Runs only when something scheduled it.
    pub fn update_projection(&mut self) {
        if !self.projection_scheduled {
            return;
        }
        self.projection_scheduled = false;

        let order = self.flat_tree.ordered();
        for id in &order {
            self.resolve_target_delta(*id);
        }
        let changed: Vec<NodeId> = order
            .into_iter()
            .filter(|id| self.calc_projection(*id))
            .collect();
        for id in changed {
            if let (Some(node), Some(transform)) = (self.nodes.get(&id), self.projection_transform(id)) {
                self.host
                    .reset_transform(&node.instance, Some(&transform.to_css()));
            }
        }
    }

    /// Run one frame at `timestamp` (milliseconds).
    pub fn process_frame(&mut self, timestamp: f64) {
        let delta_ms = self
            .last_frame
            .map_or(0.0, |last| (timestamp - last).max(0.0));
        self.last_frame = Some(timestamp);
        self.now = timestamp;

        self.handle_resize(timestamp);
        self.advance_layout_animations(delta_ms);
        self.update_projection();
    }

    fn handle_resize(&mut self, timestamp: f64) {
        let delay = self.settings.resize_unblock_delay_ms;
        for node in self.nodes.values_mut() {
            let Some(state) = node.root_state.as_mut() else {
                continue;
            };
            if state.resize_signal.replace(false) {
                state.update_blocked_by_resize = true;
                state.resize_unblock_at = Some(timestamp + delay);
                debug!(root = %node.id, "update blocked by resize");
            } else if state.resize_unblock_at.is_some_and(|at| timestamp >= at) {
                state.update_blocked_by_resize = false;
                state.resize_unblock_at = None;
                debug!(root = %node.id, "resize block lifted");
            }
        }
    }

    /// Transform the render layer should apply to `id`.
    pub fn projection_transform(&self, id: NodeId) -> Option<ProjectionTransform> {
        let delta = self.nodes.get(&id)?.projection_delta_with_transform?;
        Some(ProjectionTransform {
            translate: Point::new(delta.x.translate, delta.y.translate),
            scale: Point::new(delta.x.scale, delta.y.scale),
            origin: Point::new(delta.x.origin, delta.y.origin),
        })
    }

    // Shared elements

    /// Lead of its stack, or not in a stack at all.
    pub fn is_lead(&self, id: NodeId) -> bool {
        let Some(node) = self.nodes.get(&id) else {
            return false;
        };
        match node.options.layout_id.as_deref() {
            Some(layout_id) => self.get_lead(layout_id) == Some(id),
            None => true,
        }
    }

    /// Make `id` the lead of its stack. Returns `false` if it has no stack.
    pub fn promote(&mut self, id: NodeId, options: PromoteOptions) -> bool {
        let Some(layout_id) = self
            .nodes
            .get(&id)
            .and_then(|node| node.options.layout_id.clone())
        else {
            return false;
        };
        let Some(stack) = self.stacks.get_mut(&layout_id) else {
            return false;
        };
        let prev = stack.promote(id);
        if let Some(transition) = options.transition {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.options.transition = Some(transition);
            }
        }
        if options.needs_reset {
            self.reset_node_transform(id);
            self.projection_scheduled = true;
        }
        self.apply_promotion(id, prev, options.preserve_follow_opacity);
        true
    }

    /// Hand the lead of `id`'s stack to another present member. Returns
    /// `false` if `id` is not the lead or no member can take over; in the
    /// latter case the caller treats the element as removed.
    pub fn relegate(&mut self, id: NodeId) -> bool {
        let Some(layout_id) = self
            .nodes
            .get(&id)
            .and_then(|node| node.options.layout_id.clone())
        else {
            return false;
        };
        let nodes = &self.nodes;
        let Some(stack) = self.stacks.get_mut(&layout_id) else {
            return false;
        };
        let Some(next) = stack.relegate(id, |member| {
            nodes.get(&member).is_some_and(|node| node.is_present)
        }) else {
            return false;
        };
        self.apply_promotion(next, Some(id), false);
        true
    }

    fn apply_promotion(&mut self, lead: NodeId, prev: Option<NodeId>, preserve_follow_opacity: bool) {
        let Some(node) = self.nodes.get_mut(&lead) else {
            return;
        };
        node.is_visible = true;
        node.crossfade_opacity = None;
        node.schedule_render();
        let crossfade = node.options.crossfade.unwrap_or(self.settings.crossfade);

        let Some(prev) = prev.filter(|prev| *prev != lead) else {
            return;
        };
        let Some(follow) = self.nodes.get_mut(&prev) else {
            return;
        };
        if preserve_follow_opacity {
            follow.preserve_opacity = true;
        }
        if crossfade {
            follow.crossfade_opacity = Some(follow.opacity);
        } else {
            follow.is_visible = false;
        }
        follow.schedule_render();
        let snapshot = follow.snapshot.clone();

        let updating = self.is_updating(lead);
        if let Some(node) = self.nodes.get_mut(&lead) {
            node.resume_from = Some(prev);
            if snapshot.is_some() {
                node.snapshot = snapshot;
            }
            if updating {
                node.is_layout_dirty = true;
            }
        }
        debug!(%lead, %prev, crossfade, "promoted shared node");
    }

    // Presence and visibility

    /// Mark `id` as exiting (`false`) or present.
    pub fn set_present(&mut self, id: NodeId, is_present: bool) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.is_present = is_present;
        }
    }

    pub fn show(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.is_visible = true;
            node.schedule_render();
        }
    }

    pub fn hide(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.is_visible = false;
            node.schedule_render();
        }
    }

    /// Latest opacity of the element, used as the crossfade endpoint.
    pub fn set_opacity(&mut self, id: NodeId, opacity: f64) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.opacity = opacity;
        }
    }

    /// Opacity to render `id` with, `None` when hidden. Followers fade out
    /// during a crossfade and stay transparent afterwards unless they
    /// preserve their opacity.
    pub fn projected_opacity(&self, id: NodeId) -> Option<f64> {
        let node = self.nodes.get(&id)?;
        if !node.is_visible {
            return None;
        }
        if self.is_lead(id) {
            return Some(node.crossfade_opacity.unwrap_or(node.opacity));
        }
        Some(node.crossfade_opacity.unwrap_or(if node.preserve_opacity {
            node.opacity
        } else {
            0.0
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::host::Unsubscribe;
    use crate::projection::node::{LayoutAnimationType, RenderCallback};
    use crate::transition::TransitionType;
    use std::cell::{Cell, RefCell};

    #[derive(Default)]
    struct FakeHost {
        boxes: RefCell<HashMap<u32, LayoutBox>>,
        scrolls: RefCell<HashMap<u32, Point>>,
        transforms: RefCell<Vec<(u32, Option<String>)>>,
        resize_listeners: RefCell<Vec<Box<dyn Fn()>>>,
    }

    impl FakeHost {
        fn set_box(&self, instance: u32, layout_box: LayoutBox) {
            self.boxes.borrow_mut().insert(instance, layout_box);
        }

        fn set_scroll(&self, instance: u32, offset: Point) {
            self.scrolls.borrow_mut().insert(instance, offset);
        }

        fn fire_resize(&self) {
            for listener in self.resize_listeners.borrow().iter() {
                listener();
            }
        }

        fn transforms_of(&self, instance: u32) -> Vec<Option<String>> {
            self.transforms
                .borrow()
                .iter()
                .filter(|(i, _)| *i == instance)
                .map(|(_, t)| t.clone())
                .collect()
        }
    }

    impl MeasurementHost for FakeHost {
        type Instance = u32;

        fn measure_viewport_box(&self, instance: &u32) -> LayoutBox {
            self.boxes.borrow().get(instance).copied().unwrap_or_default()
        }

        fn measure_scroll(&self, instance: &u32) -> Point {
            self.scrolls.borrow().get(instance).copied().unwrap_or_default()
        }

        fn check_is_scroll_root(&self, _instance: &u32) -> bool {
            false
        }

        fn reset_transform(&self, instance: &u32, transform: Option<&str>) {
            self.transforms
                .borrow_mut()
                .push((*instance, transform.map(str::to_string)));
        }

        fn attach_resize_listener(
            &self,
            _instance: &u32,
            on_resize: Box<dyn Fn()>,
        ) -> Option<Unsubscribe> {
            self.resize_listeners.borrow_mut().push(on_resize);
            None
        }
    }

    fn settings() -> ProjectionSettings {
        ProjectionSettings {
            resize_unblock_delay_ms: 250.0,
            crossfade: true,
            animate_layout: true,
            layout_duration_ms: 100.0,
            layout_easing: EasingFunction::Linear,
            layout_spring: SpringConfig::default(),
        }
    }

    fn tree() -> ProjectionTree<FakeHost> {
        ProjectionTree::with_settings(FakeHost::default(), settings())
    }

    fn settle(tree: &mut ProjectionTree<FakeHost>, id: NodeId) {
        tree.will_update(id);
        tree.did_update(id);
    }

    fn translate(x: f64, y: f64) -> Delta {
        Delta {
            x: AxisDelta {
                translate: x,
                ..AxisDelta::default()
            },
            y: AxisDelta {
                translate: y,
                ..AxisDelta::default()
            },
        }
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-6,
            "expected {expected}, got {actual}"
        );
    }

    fn assert_box_close(actual: LayoutBox, expected: LayoutBox) {
        assert_close(actual.x.min, expected.x.min);
        assert_close(actual.x.max, expected.x.max);
        assert_close(actual.y.min, expected.y.min);
        assert_close(actual.y.max, expected.y.max);
    }

    fn layout_box(tree: &ProjectionTree<FakeHost>, id: NodeId) -> LayoutBox {
        tree.node(id)
            .and_then(|node| node.layout())
            .map(|layout| layout.layout_box)
            .unwrap_or_default()
    }

    #[test]
    fn test_mount_builds_paths() {
        let mut tree = tree();
        let root = tree.mount(None, 1, ProjectionNodeOptions::default());
        let child = tree.mount(Some(root), 2, ProjectionNodeOptions::default());
        let grandchild = tree.mount(Some(child), 3, ProjectionNodeOptions::default());

        let node = tree.node(grandchild).unwrap();
        assert_eq!(node.path(), &[root, child]);
        assert_eq!(node.depth(), 2);
        assert_eq!(node.root(), root);
        assert!(tree.node(root).unwrap().is_root());
        assert_eq!(tree.node(root).unwrap().children(), &[child]);
        assert_eq!(tree.nodes_in_depth_order(), vec![root, child, grandchild]);

        let orphan = tree.mount(Some(NodeId(99)), 4, ProjectionNodeOptions::default());
        assert!(tree.node(orphan).unwrap().is_root());

        assert!(tree.unmount(child));
        assert!(!tree.contains(grandchild));
        assert_eq!(tree.len(), 2);
        assert!(tree.node(root).unwrap().children().is_empty());
        assert!(!tree.unmount(child));
    }

    #[test]
    fn test_did_update_without_will_update_is_noop() {
        let mut tree = tree();
        let root = tree.mount(None, 1, ProjectionNodeOptions::default());
        tree.host().set_box(1, LayoutBox::from_rect(0.0, 0.0, 100.0, 100.0));

        tree.did_update(root);

        assert!(tree.node(root).unwrap().layout().is_none());
        assert!(!tree.is_updating(root));
    }

    #[test]
    fn test_will_update_keeps_first_snapshot() {
        let mut tree = tree();
        let root = tree.mount(None, 1, ProjectionNodeOptions::default());
        let count = Rc::new(Cell::new(0));
        let seen = count.clone();
        tree.add_event_listener(root, NodeEventKind::WillUpdate, move |_| {
            seen.set(seen.get() + 1);
            Ok(())
        });

        let first = LayoutBox::from_rect(0.0, 0.0, 100.0, 100.0);
        tree.host().set_box(1, first);
        tree.will_update(root);
        tree.host().set_box(1, LayoutBox::from_rect(50.0, 0.0, 100.0, 100.0));
        tree.will_update(root);

        assert_eq!(count.get(), 1);
        assert!(tree.is_updating(root));
        assert_eq!(tree.node(root).unwrap().snapshot().unwrap().layout_box, first);
    }

    #[test]
    fn test_update_events_fire_in_order() {
        let mut tree = tree();
        let root = tree.mount(None, 1, ProjectionNodeOptions::default());
        let child = tree.mount(Some(root), 2, ProjectionNodeOptions::default());

        let log = Rc::new(RefCell::new(Vec::new()));
        for (id, name) in [(root, "root"), (child, "child")] {
            for kind in [
                NodeEventKind::WillUpdate,
                NodeEventKind::BeforeMeasure,
                NodeEventKind::Measure,
                NodeEventKind::DidUpdate,
            ] {
                let log = log.clone();
                tree.add_event_listener(id, kind, move |event| {
                    log.borrow_mut().push(format!("{} {}", event.kind(), name));
                    Ok(())
                });
            }
        }

        tree.will_update(root);
        tree.will_update(child);
        tree.did_update(child);

        assert_eq!(
            *log.borrow(),
            vec![
                "will_update root",
                "will_update child",
                "before_measure root",
                "measure root",
                "before_measure child",
                "measure child",
                "did_update root",
                "did_update child",
            ]
        );
        assert!(!tree.is_updating(root));
        assert!(tree.node(child).unwrap().snapshot().is_none());
    }

    #[test]
    fn test_listener_failure_does_not_stop_update() {
        let mut tree = tree();
        let root = tree.mount(None, 1, ProjectionNodeOptions::default());
        let ran = Rc::new(Cell::new(false));
        let flag = ran.clone();
        tree.add_event_listener(root, NodeEventKind::DidUpdate, |_| {
            Err(anyhow::anyhow!("listener failed"))
        });
        tree.add_event_listener(root, NodeEventKind::DidUpdate, move |_| {
            flag.set(true);
            Ok(())
        });

        settle(&mut tree, root);

        assert!(ran.get());
        assert!(tree.node(root).unwrap().layout().is_some());
        let errors = tree.take_listener_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].node(), root);
        assert_eq!(errors[0].event(), NodeEventKind::DidUpdate);
        assert!(tree.take_listener_errors().is_empty());
    }

    #[test]
    fn test_layout_change_animates_to_new_layout() {
        let mut tree = tree();
        let renders = Rc::new(Cell::new(0));
        let counter = renders.clone();
        let root = tree.mount(None, 1, ProjectionNodeOptions::default());
        let child = tree.mount(
            Some(root),
            2,
            ProjectionNodeOptions::default().with_schedule_render(RenderCallback::new(
                move |_| counter.set(counter.get() + 1),
            )),
        );
        tree.host().set_box(1, LayoutBox::from_rect(0.0, 0.0, 500.0, 500.0));
        tree.host().set_box(2, LayoutBox::from_rect(0.0, 0.0, 100.0, 100.0));
        settle(&mut tree, child);
        tree.process_frame(0.0);
        assert!(tree.node(child).unwrap().animation().is_none());

        let events = Rc::new(RefCell::new(Vec::new()));
        for kind in [NodeEventKind::AnimationStart, NodeEventKind::AnimationComplete] {
            let events = events.clone();
            tree.add_event_listener(child, kind, move |event| {
                events.borrow_mut().push(event.kind());
                Ok(())
            });
        }

        tree.will_update(child);
        tree.host().set_box(2, LayoutBox::from_rect(100.0, 0.0, 100.0, 100.0));
        tree.did_update(child);

        let animation = tree.node(child).unwrap().animation().unwrap();
        assert_close(animation.origin.x.translate, -100.0);
        assert_eq!(*tree.host().transforms_of(2).last().unwrap(), None);

        tree.process_frame(16.0);
        let node = tree.node(child).unwrap();
        assert_box_close(node.target().unwrap(), LayoutBox::from_rect(16.0, 0.0, 100.0, 100.0));
        let transform = tree.projection_transform(child).unwrap();
        assert_close(transform.translate.x, -84.0);
        assert_close(transform.translate.y, 0.0);
        assert!(
            tree.host()
                .transforms_of(2)
                .last()
                .unwrap()
                .as_deref()
                .is_some_and(|css| css.starts_with("translate3d("))
        );
        assert!(renders.get() > 0);

        tree.process_frame(200.0);
        let node = tree.node(child).unwrap();
        assert!(node.animation().is_none());
        assert!(node.target_delta().is_none());
        assert_eq!(node.target(), Some(layout_box(&tree, child)));
        assert!(tree.projection_transform(child).unwrap().is_identity());
        assert_eq!(
            *events.borrow(),
            vec![NodeEventKind::AnimationStart, NodeEventKind::AnimationComplete]
        );
    }

    #[test]
    fn test_animate_false_skips_layout_animation() {
        let mut tree = tree();
        let root = tree.mount(None, 1, ProjectionNodeOptions::default().with_animate(false));
        tree.host().set_box(1, LayoutBox::from_rect(0.0, 0.0, 100.0, 100.0));
        settle(&mut tree, root);

        tree.will_update(root);
        tree.host().set_box(1, LayoutBox::from_rect(40.0, 0.0, 100.0, 100.0));
        tree.did_update(root);

        assert!(tree.node(root).unwrap().animation().is_none());
        assert_eq!(layout_box(&tree, root), LayoutBox::from_rect(40.0, 0.0, 100.0, 100.0));
    }

    #[test]
    fn test_blocked_tree_snapshots_but_keeps_layout() {
        let mut tree = tree();
        let root = tree.mount(None, 1, ProjectionNodeOptions::default());
        let child = tree.mount(Some(root), 2, ProjectionNodeOptions::default());
        let original = LayoutBox::from_rect(0.0, 0.0, 100.0, 100.0);
        tree.host().set_box(2, original);
        settle(&mut tree, child);

        tree.block_update(root);
        tree.will_update(child);
        assert!(tree.node(child).unwrap().snapshot().is_some());
        tree.host().set_box(2, LayoutBox::from_rect(60.0, 0.0, 100.0, 100.0));
        tree.did_update(child);

        let node = tree.node(child).unwrap();
        assert!(node.snapshot().is_none());
        assert!(node.animation().is_none());
        assert_eq!(layout_box(&tree, child), original);
    }

    #[test]
    fn test_blocked_node_skips_projection() {
        let mut tree = tree();
        let root = tree.mount(None, 1, ProjectionNodeOptions::default());
        tree.host().set_box(1, LayoutBox::from_rect(0.0, 0.0, 100.0, 100.0));
        settle(&mut tree, root);
        tree.process_frame(0.0);

        tree.block_update(root);
        assert!(tree.is_update_blocked(root));
        tree.set_target_delta(root, translate(25.0, 0.0));
        tree.process_frame(16.0);
        assert!(tree.projection_transform(root).unwrap().is_identity());

        tree.unblock_update(root);
        tree.schedule_projection();
        tree.process_frame(32.0);
        assert_close(tree.projection_transform(root).unwrap().translate.x, 25.0);
    }

    #[test]
    fn test_resize_blocks_updates_until_delay() {
        let mut tree = tree();
        let root = tree.mount(None, 1, ProjectionNodeOptions::default());
        let original = LayoutBox::from_rect(0.0, 0.0, 100.0, 100.0);
        tree.host().set_box(1, original);
        settle(&mut tree, root);
        tree.process_frame(1000.0);
        assert!(!tree.is_update_blocked(root));

        tree.host().fire_resize();
        tree.process_frame(1016.0);
        assert!(tree.is_update_blocked(root));

        tree.will_update(root);
        tree.host().set_box(1, LayoutBox::from_rect(0.0, 0.0, 300.0, 100.0));
        tree.did_update(root);
        assert_eq!(layout_box(&tree, root), original);

        tree.process_frame(1200.0);
        assert!(tree.is_update_blocked(root));
        tree.process_frame(1266.0);
        assert!(!tree.is_update_blocked(root));

        settle(&mut tree, root);
        assert_eq!(layout_box(&tree, root), LayoutBox::from_rect(0.0, 0.0, 300.0, 100.0));
    }

    #[test]
    fn test_layout_scroll_is_added_to_child_layout() {
        let mut tree = tree();
        let root = tree.mount(None, 1, ProjectionNodeOptions::default());
        let scroller = tree.mount(
            Some(root),
            2,
            ProjectionNodeOptions::default().with_layout_scroll(true),
        );
        let item = tree.mount(Some(scroller), 3, ProjectionNodeOptions::default());
        tree.host().set_scroll(1, Point::new(0.0, 100.0));
        tree.host().set_scroll(2, Point::new(0.0, 40.0));
        tree.host().set_box(3, LayoutBox::from_rect(10.0, 10.0, 20.0, 20.0));

        settle(&mut tree, item);

        let layout = tree.node(item).unwrap().layout().unwrap();
        assert_eq!(layout.measured_box, LayoutBox::from_rect(10.0, 10.0, 20.0, 20.0));
        assert_eq!(layout.layout_box, LayoutBox::from_rect(10.0, 150.0, 20.0, 20.0));
        assert_eq!(
            tree.node(scroller).unwrap().scroll().unwrap().offset,
            Point::new(0.0, 40.0)
        );
    }

    #[test]
    fn test_shared_element_crossfades_from_previous_lead() {
        let mut tree = tree();
        let root = tree.mount(None, 1, ProjectionNodeOptions::default());
        tree.host().set_box(1, LayoutBox::from_rect(0.0, 0.0, 1000.0, 1000.0));
        let a_box = LayoutBox::from_rect(0.0, 0.0, 100.0, 100.0);
        tree.host().set_box(10, a_box);
        let a = tree.mount(
            Some(root),
            10,
            ProjectionNodeOptions::default().with_layout_id("card"),
        );
        settle(&mut tree, a);
        tree.process_frame(0.0);
        assert!(tree.is_lead(a));

        tree.will_update(a);
        tree.host().set_box(11, LayoutBox::from_rect(200.0, 200.0, 50.0, 50.0));
        let b = tree.mount(
            Some(root),
            11,
            ProjectionNodeOptions::default().with_layout_id("card"),
        );

        assert!(tree.is_lead(b));
        assert!(!tree.is_lead(a));
        assert_eq!(tree.get_lead("card"), Some(b));
        let node = tree.node(b).unwrap();
        assert_eq!(node.resume_from(), Some(a));
        assert_eq!(node.snapshot().unwrap().source, a);
        assert_eq!(tree.projected_opacity(a), Some(1.0));

        tree.did_update(a);
        let animation = tree.node(b).unwrap().animation().unwrap();
        assert!(animation.crossfade);
        assert_eq!(tree.projected_opacity(b), Some(0.0));
        assert_eq!(tree.projected_opacity(a), Some(1.0));

        tree.process_frame(0.0);
        assert_box_close(tree.node(b).unwrap().target().unwrap(), a_box);

        tree.process_frame(75.0);
        let fading = tree.projected_opacity(a).unwrap();
        assert!(fading > 0.0 && fading < 1.0, "follower opacity {fading}");
        assert_close(tree.projected_opacity(b).unwrap(), 1.0);
        assert!(tree.node(a).unwrap().is_visible());

        tree.process_frame(200.0);
        assert!(tree.node(b).unwrap().animation().is_none());
        assert_eq!(tree.node(b).unwrap().resume_from(), None);
        assert_eq!(tree.projected_opacity(a), Some(0.0));
        assert_eq!(tree.projected_opacity(b), Some(1.0));
        assert_box_close(
            tree.node(b).unwrap().target().unwrap(),
            LayoutBox::from_rect(200.0, 200.0, 50.0, 50.0),
        );
    }

    #[test]
    fn test_promotion_without_crossfade_hides_previous_lead() {
        let mut tree = tree();
        let root = tree.mount(None, 1, ProjectionNodeOptions::default());
        let a = tree.mount(
            Some(root),
            10,
            ProjectionNodeOptions::default().with_layout_id("card"),
        );
        let b = tree.mount(
            Some(root),
            11,
            ProjectionNodeOptions::default()
                .with_layout_id("card")
                .with_crossfade(false),
        );

        assert_eq!(tree.projected_opacity(a), None);
        assert_eq!(tree.projected_opacity(b), Some(1.0));

        assert!(tree.promote(
            a,
            PromoteOptions::default().with_preserve_follow_opacity(true)
        ));
        assert!(tree.is_lead(a));
        assert_eq!(tree.projected_opacity(a), Some(1.0));
        assert!(tree.node(b).unwrap().preserve_opacity());
        assert_eq!(tree.projected_opacity(b), Some(1.0));
        assert!(!tree.promote(root, PromoteOptions::default()));
    }

    #[test]
    fn test_relegate_hands_lead_to_present_member() {
        let mut tree = tree();
        let root = tree.mount(None, 1, ProjectionNodeOptions::default());
        let a = tree.mount(
            Some(root),
            10,
            ProjectionNodeOptions::default().with_layout_id("card"),
        );
        let b = tree.mount(
            Some(root),
            11,
            ProjectionNodeOptions::default().with_layout_id("card"),
        );

        tree.set_present(a, false);
        assert!(!tree.relegate(b));
        assert!(tree.is_lead(b));

        tree.set_present(a, true);
        assert!(tree.relegate(b));
        assert!(tree.is_lead(a));
        assert_eq!(tree.node(a).unwrap().resume_from(), Some(b));
        assert!(tree.is_lead(root));
    }

    #[test]
    fn test_unmounting_lead_promotes_follower() {
        let mut tree = tree();
        let root = tree.mount(None, 1, ProjectionNodeOptions::default());
        let a = tree.mount(
            Some(root),
            10,
            ProjectionNodeOptions::default().with_layout_id("card"),
        );
        let b = tree.mount(
            Some(root),
            11,
            ProjectionNodeOptions::default().with_layout_id("card"),
        );

        tree.hide(a);
        assert!(tree.unmount(b));
        assert!(tree.is_lead(a));
        assert_eq!(tree.projected_opacity(a), Some(1.0));
        assert_eq!(tree.stack("card").map(NodeStack::len), Some(1));

        assert!(tree.unmount(a));
        assert!(tree.stack("card").is_none());
    }

    #[test]
    fn test_child_follows_relative_parent() {
        let mut tree = tree();
        let root = tree.mount(None, 1, ProjectionNodeOptions::default());
        let parent = tree.mount(Some(root), 2, ProjectionNodeOptions::default());
        let child = tree.mount(Some(parent), 3, ProjectionNodeOptions::default());
        tree.host().set_box(1, LayoutBox::from_rect(0.0, 0.0, 1000.0, 1000.0));
        tree.host().set_box(2, LayoutBox::from_rect(100.0, 100.0, 200.0, 200.0));
        tree.host().set_box(3, LayoutBox::from_rect(150.0, 150.0, 50.0, 50.0));
        settle(&mut tree, child);
        tree.process_frame(0.0);
        assert_eq!(tree.node(child).unwrap().relative_parent(), None);

        tree.set_target_delta(parent, translate(30.0, 40.0));
        tree.process_frame(16.0);

        let node = tree.node(child).unwrap();
        assert_eq!(node.relative_parent(), Some(parent));
        assert_box_close(
            node.target().unwrap(),
            LayoutBox::from_rect(180.0, 190.0, 50.0, 50.0),
        );
        assert!(node.projection_delta().unwrap().is_identity());
        let parent_transform = tree.projection_transform(parent).unwrap();
        assert_close(parent_transform.translate.x, 30.0);
        assert_close(parent_transform.translate.y, 40.0);
    }

    #[test]
    fn test_layout_root_anchors_children() {
        let mut tree = tree();
        let root = tree.mount(None, 1, ProjectionNodeOptions::default());
        let parent = tree.mount(
            Some(root),
            2,
            ProjectionNodeOptions::default().with_layout_root(true),
        );
        let child = tree.mount(Some(parent), 3, ProjectionNodeOptions::default());
        tree.host().set_box(2, LayoutBox::from_rect(100.0, 100.0, 200.0, 200.0));
        tree.host().set_box(3, LayoutBox::from_rect(120.0, 130.0, 50.0, 50.0));
        settle(&mut tree, child);
        tree.process_frame(0.0);

        let node = tree.node(child).unwrap();
        assert_eq!(node.relative_parent(), Some(parent));
        assert_eq!(
            node.relative_target(),
            Some(LayoutBox::from_rect(20.0, 30.0, 50.0, 50.0))
        );
    }

    #[test]
    fn test_reset_ancestor_transform_is_written_again() {
        let mut tree = tree();
        let root = tree.mount(None, 1, ProjectionNodeOptions::default());
        let parent = tree.mount(Some(root), 2, ProjectionNodeOptions::default());
        let child = tree.mount(Some(parent), 3, ProjectionNodeOptions::default());
        tree.host().set_box(1, LayoutBox::from_rect(0.0, 0.0, 1000.0, 1000.0));
        tree.host().set_box(2, LayoutBox::from_rect(100.0, 100.0, 200.0, 200.0));
        tree.host().set_box(3, LayoutBox::from_rect(150.0, 150.0, 50.0, 50.0));
        settle(&mut tree, child);
        tree.process_frame(0.0);

        tree.set_target_delta(parent, translate(30.0, 0.0));
        tree.process_frame(16.0);
        let moved = Some("translate3d(30px, 0px, 0) scale(1, 1)".to_string());
        assert_eq!(tree.host().transforms_of(2).last(), Some(&moved));

        settle(&mut tree, child);
        assert_eq!(tree.host().transforms_of(2).last(), Some(&None));
        assert!(tree.node(parent).unwrap().projection_delta().is_none());

        tree.process_frame(32.0);
        tree.process_frame(48.0);
        assert_eq!(tree.host().transforms_of(2).last(), Some(&moved));
        assert_close(tree.projection_transform(parent).unwrap().translate.x, 30.0);
    }

    #[test]
    fn test_relegating_follower_keeps_lead() {
        let mut tree = tree();
        let root = tree.mount(None, 1, ProjectionNodeOptions::default());
        let [a, b, c] = [10, 11, 12].map(|instance| {
            tree.mount(
                Some(root),
                instance,
                ProjectionNodeOptions::default().with_layout_id("card"),
            )
        });
        assert!(tree.is_lead(c));

        assert!(!tree.relegate(a));
        assert!(!tree.relegate(b));
        assert!(tree.is_lead(c));
        assert_eq!(tree.stack("card").unwrap().members(), &[a, b, c]);

        assert!(tree.relegate(c));
        assert!(tree.is_lead(b));
    }

    #[test]
    fn test_node_transition_times_layout_animation() {
        let mut tree = tree();
        let root = tree.mount(
            None,
            1,
            ProjectionNodeOptions::default()
                .with_transition(ValueTransition::tween(200.0).with_easing(EasingFunction::Linear)),
        );
        tree.host().set_box(1, LayoutBox::from_rect(0.0, 0.0, 100.0, 100.0));
        settle(&mut tree, root);
        tree.process_frame(0.0);

        tree.will_update(root);
        tree.host().set_box(1, LayoutBox::from_rect(100.0, 0.0, 100.0, 100.0));
        tree.did_update(root);

        tree.process_frame(50.0);
        assert_close(tree.node(root).unwrap().target().unwrap().x.min, 25.0);
        tree.process_frame(150.0);
        assert_close(tree.node(root).unwrap().target().unwrap().x.min, 75.0);
        assert!(tree.node(root).unwrap().animation().is_some());

        tree.process_frame(250.0);
        assert!(tree.node(root).unwrap().animation().is_none());
        assert_close(tree.node(root).unwrap().target().unwrap().x.min, 100.0);
    }

    #[test]
    fn test_spring_layout_transition_overshoots_and_settles() {
        let mut tree = tree();
        let root = tree.mount(
            None,
            1,
            ProjectionNodeOptions::default().with_transition(ValueTransition::spring()),
        );
        tree.host().set_box(1, LayoutBox::from_rect(0.0, 0.0, 100.0, 100.0));
        settle(&mut tree, root);
        tree.process_frame(0.0);

        tree.will_update(root);
        tree.host().set_box(1, LayoutBox::from_rect(100.0, 0.0, 100.0, 100.0));
        tree.did_update(root);
        assert_eq!(
            tree.node(root).unwrap().animation().unwrap().transition.kind,
            Some(TransitionType::Spring)
        );

        let mut furthest = 0.0_f64;
        let mut timestamp = 0.0;
        while tree.node(root).unwrap().animation().is_some() && timestamp < 10_000.0 {
            timestamp += 16.0;
            tree.process_frame(timestamp);
            furthest = furthest.max(tree.node(root).unwrap().target().unwrap().x.min);
        }

        assert!(tree.node(root).unwrap().animation().is_none());
        assert!(furthest > 100.0, "spring peaked at {furthest}");
        assert_close(tree.node(root).unwrap().target().unwrap().x.min, 100.0);
    }

    #[test]
    fn test_start_animation_replaces_transition() {
        let mut tree = tree();
        let root = tree.mount(None, 1, ProjectionNodeOptions::default());
        tree.host().set_box(1, LayoutBox::from_rect(0.0, 0.0, 100.0, 100.0));
        settle(&mut tree, root);
        tree.process_frame(0.0);
        assert!(!tree.start_animation(root, ValueTransition::instant()));

        tree.will_update(root);
        tree.host().set_box(1, LayoutBox::from_rect(100.0, 0.0, 100.0, 100.0));
        tree.did_update(root);
        tree.process_frame(50.0);
        assert_close(tree.node(root).unwrap().target().unwrap().x.min, 50.0);

        assert!(tree.start_animation(root, ValueTransition::instant()));
        assert_close(tree.node(root).unwrap().animation().unwrap().progress, 0.0);
        tree.process_frame(66.0);
        assert!(tree.node(root).unwrap().animation().is_none());
        assert_close(tree.node(root).unwrap().target().unwrap().x.min, 100.0);
    }

    #[test]
    fn test_promotion_carries_transition_and_reset() {
        let mut tree = tree();
        let root = tree.mount(None, 1, ProjectionNodeOptions::default());
        let a = tree.mount(
            Some(root),
            10,
            ProjectionNodeOptions::default().with_layout_id("card"),
        );
        tree.mount(
            Some(root),
            11,
            ProjectionNodeOptions::default().with_layout_id("card"),
        );
        let before = tree.host().transforms_of(10).len();

        assert!(tree.promote(
            a,
            PromoteOptions::default()
                .with_transition(ValueTransition::instant())
                .with_needs_reset(true),
        ));

        assert!(tree.is_lead(a));
        assert_eq!(
            tree.node(a).unwrap().options().transition,
            Some(ValueTransition::instant())
        );
        let transforms = tree.host().transforms_of(10);
        assert_eq!(transforms.len(), before + 1);
        assert_eq!(transforms.last(), Some(&None));
    }

    #[test]
    fn test_position_animation_snaps_size() {
        let mut tree = tree();
        let root = tree.mount(
            None,
            1,
            ProjectionNodeOptions::default().with_animation_type(LayoutAnimationType::Position),
        );
        tree.host().set_box(1, LayoutBox::from_rect(0.0, 0.0, 100.0, 100.0));
        settle(&mut tree, root);

        tree.will_update(root);
        tree.host().set_box(1, LayoutBox::from_rect(100.0, 0.0, 200.0, 100.0));
        tree.did_update(root);

        let origin = tree.node(root).unwrap().animation().unwrap().origin;
        assert_eq!(origin.x.scale, 1.0);
        assert_close(origin.x.translate, -150.0);
    }

    #[test]
    fn test_snapshot_without_transform_removes_projection() {
        let mut tree = tree();
        let root = tree.mount(
            None,
            1,
            ProjectionNodeOptions {
                snapshot_without_transform: true,
                ..Default::default()
            },
        );
        tree.host().set_box(1, LayoutBox::from_rect(0.0, 0.0, 100.0, 100.0));
        settle(&mut tree, root);
        tree.process_frame(0.0);

        tree.set_target_delta(root, translate(50.0, 0.0));
        tree.process_frame(16.0);
        tree.host().set_box(1, LayoutBox::from_rect(50.0, 0.0, 100.0, 100.0));
        tree.will_update(root);

        let snapshot = tree.node(root).unwrap().snapshot().unwrap();
        assert_eq!(snapshot.measured_box, LayoutBox::from_rect(50.0, 0.0, 100.0, 100.0));
        assert_box_close(snapshot.layout_box, LayoutBox::from_rect(0.0, 0.0, 100.0, 100.0));
    }

    #[test]
    fn test_relative_layout_animation_under_layout_root() {
        let mut tree = tree();
        let root = tree.mount(None, 1, ProjectionNodeOptions::default());
        let parent = tree.mount(
            Some(root),
            2,
            ProjectionNodeOptions::default().with_layout_root(true),
        );
        let child = tree.mount(Some(parent), 3, ProjectionNodeOptions::default());
        tree.host().set_box(1, LayoutBox::from_rect(0.0, 0.0, 1000.0, 1000.0));
        tree.host().set_box(2, LayoutBox::from_rect(100.0, 100.0, 200.0, 200.0));
        tree.host().set_box(3, LayoutBox::from_rect(120.0, 130.0, 50.0, 50.0));
        settle(&mut tree, child);
        tree.process_frame(0.0);
        assert_eq!(tree.node(child).unwrap().relative_parent(), Some(parent));

        let relative_changed = Rc::new(RefCell::new(Vec::new()));
        for id in [parent, child] {
            let seen = relative_changed.clone();
            tree.add_event_listener(id, NodeEventKind::DidUpdate, move |event| {
                if let NodeEvent::DidUpdate(data) = event {
                    seen.borrow_mut().push(data.has_relative_target_changed);
                }
                Ok(())
            });
        }

        tree.will_update(child);
        assert_eq!(
            tree.node(child).unwrap().snapshot().unwrap().relative_box,
            Some(LayoutBox::from_rect(20.0, 30.0, 50.0, 50.0))
        );
        tree.host().set_box(3, LayoutBox::from_rect(200.0, 130.0, 50.0, 50.0));
        tree.did_update(child);

        assert_eq!(*relative_changed.borrow(), vec![false, true]);
        let animation = tree.node(child).unwrap().animation().unwrap();
        assert_eq!(
            animation.relative_from,
            Some(LayoutBox::from_rect(20.0, 30.0, 50.0, 50.0))
        );

        tree.process_frame(0.0);
        assert_close(tree.node(child).unwrap().target().unwrap().x.min, 120.0);
        tree.process_frame(50.0);
        assert_close(tree.node(child).unwrap().target().unwrap().x.min, 160.0);
        assert!(tree.node(child).unwrap().target_delta().is_none());
        tree.process_frame(100.0);
        assert!(tree.node(child).unwrap().animation().is_none());
        assert_close(tree.node(child).unwrap().target().unwrap().x.min, 200.0);
    }

    #[test]
    fn test_projection_transform_css() {
        let identity = ProjectionTransform {
            translate: Point::default(),
            scale: Point::new(1.0, 1.0),
            origin: Point::new(0.5, 0.5),
        };
        assert!(identity.is_identity());
        assert_eq!(identity.to_css(), "none");
        assert_eq!(identity.origin_css(), "50% 50% 0");

        let moved = ProjectionTransform {
            translate: Point::new(10.0, -5.0),
            scale: Point::new(2.0, 1.0),
            ..identity
        };
        assert_eq!(moved.to_string(), "translate3d(10px, -5px, 0) scale(2, 1)");
    }

    #[test]
    fn test_settings_from_config() {
        let mut config = MotionConfig::default();
        config.animation.default_easing = "linear".to_string();
        config.animation.default_duration_ms = 450.0;
        config.projection.crossfade = false;
        let settings = ProjectionSettings::from_config(&config);
        assert_eq!(settings.layout_easing, EasingFunction::Linear);
        assert_eq!(settings.layout_duration_ms, 450.0);
        assert!(!settings.crossfade);
        assert!(settings.animate_layout);

        config.animation.reduced_motion = true;
        config.animation.default_easing = "wobble".to_string();
        let settings = ProjectionSettings::from_config(&config);
        assert!(!settings.animate_layout);
        assert_eq!(settings.layout_easing, EasingFunction::Ease);
    }
}
