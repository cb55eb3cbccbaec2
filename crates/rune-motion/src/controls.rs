//! Playback controls for started animations.
//!
//! A `PlaybackControl` is the shared handle between whoever started an
//! animation and the engine advancing it. Engines read its state every tick;
//! callers pause, resume, stop or complete it and register callbacks that run
//! once the animation settles.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::value::{AnimationId, AnimationState};

type SettleCallback = Box<dyn FnOnce(AnimationState)>;

struct ControlInner {
    id: AnimationId,
    key: String,
    state: AnimationState,
    callbacks: Vec<SettleCallback>,
}

/// Handle to a single started animation.
#[derive(Clone)]
pub struct PlaybackControl {
    inner: Rc<RefCell<ControlInner>>,
}

impl fmt::Debug for PlaybackControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("PlaybackControl")
            .field("id", &inner.id)
            .field("key", &inner.key)
            .field("state", &inner.state)
            .finish()
    }
}

impl PlaybackControl {
    /// Create a control for an animation on `key` that is already running.
    pub fn new(key: impl Into<String>) -> Self {
        Self::with_state(key, AnimationState::Running)
    }

    /// Create a control for an animation that waits for a delay first.
    pub fn pending(key: impl Into<String>) -> Self {
        Self::with_state(key, AnimationState::Pending)
    }

    fn with_state(key: impl Into<String>, state: AnimationState) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ControlInner {
                id: AnimationId::new(),
                key: key.into(),
                state,
                callbacks: Vec::new(),
            })),
        }
    }

    pub fn id(&self) -> AnimationId {
        self.inner.borrow().id
    }

    /// Property this animation drives.
    pub fn key(&self) -> String {
        self.inner.borrow().key.clone()
    }

    pub fn state(&self) -> AnimationState {
        self.inner.borrow().state
    }

    pub fn is_settled(&self) -> bool {
        self.state().is_settled()
    }

    /// Whether both handles point at the same animation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Resume a paused animation.
    pub fn play(&self) {
        let mut inner = self.inner.borrow_mut();
        if inner.state == AnimationState::Paused {
            inner.state = AnimationState::Running;
        }
    }

    /// Pause a pending or running animation.
    pub fn pause(&self) {
        let mut inner = self.inner.borrow_mut();
        if matches!(
            inner.state,
            AnimationState::Pending | AnimationState::Running
        ) {
            inner.state = AnimationState::Paused;
        }
    }

    /// Move a pending animation into its running phase.
    pub fn begin(&self) {
        let mut inner = self.inner.borrow_mut();
        if inner.state == AnimationState::Pending {
            inner.state = AnimationState::Running;
        }
    }

    /// Stop the animation where it is.
    pub fn stop(&self) {
        self.settle(AnimationState::Cancelled);
    }

    /// Alias of [`stop`](Self::stop), used when a newer animation supersedes
    /// this one.
    pub fn cancel(&self) {
        self.settle(AnimationState::Cancelled);
    }

    /// Mark the animation as finished. Engines snap the value to its final
    /// keyframe on their next tick.
    pub fn complete(&self) {
        self.settle(AnimationState::Finished);
    }

    /// Run `callback` once the animation settles. Runs immediately if it
    /// already has.
    pub fn on_settled(&self, callback: impl FnOnce(AnimationState) + 'static) {
        let settled = {
            let mut inner = self.inner.borrow_mut();
            if inner.state.is_settled() {
                Some(inner.state)
            } else {
                inner.callbacks.push(Box::new(callback));
                return;
            }
        };
        if let Some(state) = settled {
            callback(state);
        }
    }

    fn settle(&self, state: AnimationState) {
        let callbacks = {
            let mut inner = self.inner.borrow_mut();
            if inner.state.is_settled() {
                return;
            }
            inner.state = state;
            std::mem::take(&mut inner.callbacks)
        };
        // Callbacks may touch value handles or this control again.
        for callback in callbacks {
            callback(state);
        }
    }
}

/// Run `callback` exactly once, after every control in `controls` has settled.
///
/// An empty batch runs the callback immediately.
pub fn all_settled(controls: &[PlaybackControl], callback: impl FnOnce() + 'static) {
    if controls.is_empty() {
        callback();
        return;
    }

    let remaining = Rc::new(Cell::new(controls.len()));
    let pending: Rc<RefCell<Option<Box<dyn FnOnce()>>>> =
        Rc::new(RefCell::new(Some(Box::new(callback))));

    for control in controls {
        let remaining = remaining.clone();
        let pending = pending.clone();
        control.on_settled(move |_| {
            remaining.set(remaining.get().saturating_sub(1));
            if remaining.get() == 0 {
                let callback = pending.borrow_mut().take();
                if let Some(callback) = callback {
                    callback();
                }
            }
        });
    }
}

/// Aggregate controls for every animation started in one batch.
#[derive(Debug, Clone, Default)]
pub struct GroupPlaybackControls {
    controls: Vec<PlaybackControl>,
}

impl GroupPlaybackControls {
    pub fn new(controls: Vec<PlaybackControl>) -> Self {
        Self { controls }
    }

    pub fn controls(&self) -> &[PlaybackControl] {
        &self.controls
    }

    pub fn len(&self) -> usize {
        self.controls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }

    pub fn play(&self) {
        self.controls.iter().for_each(PlaybackControl::play);
    }

    pub fn pause(&self) {
        self.controls.iter().for_each(PlaybackControl::pause);
    }

    pub fn stop(&self) {
        self.controls.iter().for_each(PlaybackControl::stop);
    }

    pub fn complete(&self) {
        self.controls.iter().for_each(PlaybackControl::complete);
    }

    /// Whether every animation in the group has settled.
    pub fn is_settled(&self) -> bool {
        self.controls.iter().all(PlaybackControl::is_settled)
    }

    /// Run `callback` once every animation in the group has settled.
    pub fn then(&self, callback: impl FnOnce() + 'static) {
        all_settled(&self.controls, callback);
    }
}

impl From<Vec<PlaybackControl>> for GroupPlaybackControls {
    fn from(controls: Vec<PlaybackControl>) -> Self {
        Self::new(controls)
    }
}
