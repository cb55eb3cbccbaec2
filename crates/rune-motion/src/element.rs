//! The visual element contract the orchestrator animates, and `MotionElement`,
//! a built-in element over [`MotionValue`]s.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::engine::{EngineDefaults, MotionValue};
use crate::target::TargetAndTransition;
use crate::transition::Transition;
use crate::value::{AnimatableValue, AnimationType, PropertyKey, ValueHandle};

/// Per-layer bookkeeping consulted before animating a property.
///
/// A protected key belongs to a higher-priority layer and is left alone
/// unless that layer explicitly asked for it to animate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnimationTypeState {
    pub protected_keys: HashMap<PropertyKey, bool>,
    pub needs_animating: HashMap<PropertyKey, bool>,
}

impl AnimationTypeState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn protect(&mut self, key: impl Into<PropertyKey>) {
        self.protected_keys.insert(key.into(), true);
    }

    /// Force `key` to animate on the next pass even if protected.
    pub fn request_animation(&mut self, key: impl Into<PropertyKey>) {
        self.needs_animating.insert(key.into(), true);
    }

    /// Whether `key` must not animate in this pass.
    ///
    /// Always clears `needs_animating[key]`: a request is consumed by the pass
    /// that evaluates it, whatever the outcome.
    pub fn should_block(&mut self, key: &str) -> bool {
        let requested = self.needs_animating.get(key).copied() == Some(true);
        let block = self.protected_keys.contains_key(key) && !requested;
        self.needs_animating.insert(key.to_string(), false);
        block
    }
}

/// Element properties the orchestrator reads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementProps {
    /// The element declared an initial state (and is still in its initial phase).
    pub has_initial: bool,
    /// Identifier linking this element to an animation started outside the
    /// runtime, used for handoff.
    pub appear_id: Option<String>,
}

/// Tracks properties that are about to change so the renderer can hint them.
pub trait WillChange {
    fn add(&self, key: &str);
    fn remove(&self, key: &str);
}

/// Ordered set of animating property names.
#[derive(Debug, Default)]
pub struct WillChangeSet {
    members: RefCell<Vec<PropertyKey>>,
}

impl WillChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.members.borrow().iter().any(|k| k == key)
    }

    pub fn members(&self) -> Vec<PropertyKey> {
        self.members.borrow().clone()
    }
}

impl WillChange for WillChangeSet {
    fn add(&self, key: &str) {
        if !self.contains(key) {
            self.members.borrow_mut().push(key.to_string());
        }
    }

    fn remove(&self, key: &str) {
        self.members.borrow_mut().retain(|k| k != key);
    }
}

/// An element whose properties can be animated.
pub trait VisualElement {
    /// Value handle for `key`, if the element has one.
    fn get_value(&self, key: &str) -> Option<Rc<dyn ValueHandle>>;

    /// Transition used when a definition carries none.
    fn default_transition(&self) -> Option<Transition> {
        None
    }

    /// Resolve a definition into concrete keyframes (unit conversion, reading
    /// current values, ...). The default passes it through.
    fn make_target_animatable(&self, definition: &TargetAndTransition) -> TargetAndTransition {
        definition.clone()
    }

    fn props(&self) -> ElementProps;

    /// State for `animation_type`, if that layer has been set up.
    fn animation_type_state(
        &self,
        animation_type: AnimationType,
    ) -> Option<Rc<RefCell<AnimationTypeState>>>;

    /// Whether the user prefers reduced motion for this element.
    fn should_reduce_motion(&self) -> bool;

    fn will_change(&self) -> Option<Rc<dyn WillChange>> {
        None
    }

    /// Set `key` immediately, creating the value if the element lacks it.
    fn set_static_value(&self, key: &str, value: AnimatableValue);
}

/// Built-in [`VisualElement`] over [`MotionValue`]s.
#[derive(Debug, Default)]
pub struct MotionElement {
    values: RefCell<HashMap<PropertyKey, Rc<MotionValue>>>,
    type_states: RefCell<HashMap<AnimationType, Rc<RefCell<AnimationTypeState>>>>,
    props: ElementProps,
    reduce_motion: bool,
    default_transition: Option<Transition>,
    will_change: Option<Rc<WillChangeSet>>,
    defaults: EngineDefaults,
}

impl MotionElement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(self, key: impl Into<PropertyKey>, initial: impl Into<AnimatableValue>) -> Self {
        self.add_value(key, initial);
        self
    }

    pub fn with_props(mut self, props: ElementProps) -> Self {
        self.props = props;
        self
    }

    pub fn with_reduced_motion(mut self, reduce_motion: bool) -> Self {
        self.reduce_motion = reduce_motion;
        self
    }

    pub fn with_default_transition(mut self, transition: impl Into<Transition>) -> Self {
        self.default_transition = Some(transition.into());
        self
    }

    pub fn with_will_change(mut self, will_change: Rc<WillChangeSet>) -> Self {
        self.will_change = Some(will_change);
        self
    }

    pub fn with_engine_defaults(mut self, defaults: EngineDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Add (or replace) the value for `key`.
    pub fn add_value(
        &self,
        key: impl Into<PropertyKey>,
        initial: impl Into<AnimatableValue>,
    ) -> Rc<MotionValue> {
        let value = Rc::new(MotionValue::with_defaults(initial, self.defaults.clone()));
        self.values.borrow_mut().insert(key.into(), value.clone());
        value
    }

    pub fn value(&self, key: &str) -> Option<Rc<MotionValue>> {
        self.values.borrow().get(key).cloned()
    }

    /// State for `animation_type`, created on first use.
    pub fn type_state(&self, animation_type: AnimationType) -> Rc<RefCell<AnimationTypeState>> {
        self.type_states
            .borrow_mut()
            .entry(animation_type)
            .or_default()
            .clone()
    }

    /// Whether any value is animating.
    pub fn is_animating(&self) -> bool {
        self.values.borrow().values().any(|v| v.is_animating())
    }

    /// Advance every value by `delta_ms` of frame time.
    pub fn tick(&self, delta_ms: f64) {
        let values: Vec<Rc<MotionValue>> = self.values.borrow().values().cloned().collect();
        for value in values {
            value.tick(delta_ms);
        }
    }
}

impl VisualElement for MotionElement {
    fn get_value(&self, key: &str) -> Option<Rc<dyn ValueHandle>> {
        self.value(key).map(|v| v as Rc<dyn ValueHandle>)
    }

    fn default_transition(&self) -> Option<Transition> {
        self.default_transition.clone()
    }

    fn props(&self) -> ElementProps {
        self.props.clone()
    }

    fn animation_type_state(
        &self,
        animation_type: AnimationType,
    ) -> Option<Rc<RefCell<AnimationTypeState>>> {
        self.type_states.borrow().get(&animation_type).cloned()
    }

    fn should_reduce_motion(&self) -> bool {
        self.reduce_motion
    }

    fn will_change(&self) -> Option<Rc<dyn WillChange>> {
        self.will_change
            .clone()
            .map(|w| w as Rc<dyn WillChange>)
    }

    fn set_static_value(&self, key: &str, value: AnimatableValue) {
        match self.value(key) {
            Some(existing) => existing.set(value),
            None => {
                self.add_value(key, value);
            }
        }
    }
}
