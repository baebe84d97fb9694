//! Backtracking plumbing: the variable stack, the two user-facing stores, and the
//! recovery-label stack.
//!
//! Grounded on the reference implementation's `storeDict`/`pushV`/`popV`/`pushRecovery`/
//! `popRecovery` and the `Cloner` interface used to make state-store snapshotting
//! semantically correct for non-trivial values.

use rustc_hash::FxHashMap;
use std::rc::Rc;

use crate::value::{ClonableAny, Value};

/// One entry of the backtrackable state store: either a cheaply-shared value or one that
/// advertises a deep-clone capability.
#[derive(Clone)]
enum StateEntry {
    Shared(Value),
    Cloneable(Rc<Box<dyn ClonableAny>>),
}

impl StateEntry {
    fn snapshot(&self) -> StateEntry {
        match self {
            StateEntry::Shared(v) => StateEntry::Shared(v.clone()),
            StateEntry::Cloneable(v) => StateEntry::Cloneable(Rc::new(v.clone_any())),
        }
    }
}

/// The backtrackable "state" store: cloned on entry to any construct that may backtrack,
/// restored on failure.
#[derive(Clone, Default)]
pub struct StateStore {
    entries: FxHashMap<String, StateEntry>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value that is fine to share by reference across backtracking branches.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.entries.insert(key.into(), StateEntry::Shared(value));
    }

    /// Insert a value that must be deep-copied whenever the store is snapshotted.
    pub fn set_clonable(&mut self, key: impl Into<String>, value: Box<dyn ClonableAny>) {
        self.entries
            .insert(key.into(), StateEntry::Cloneable(Rc::new(value)));
    }

    pub fn get(&self, key: &str) -> Option<&dyn std::any::Any> {
        match self.entries.get(key)? {
            StateEntry::Shared(v) => Some(v.as_ref()),
            StateEntry::Cloneable(v) => Some(v.as_any()),
        }
    }

    pub fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }

    /// Snapshot the store: shared values are reference-counted (cheap), clonable values
    /// are deep-copied (the `Cloner` protocol).
    pub fn snapshot(&self) -> StateStore {
        StateStore {
            entries: self
                .entries
                .iter()
                .map(|(k, v)| (k.clone(), v.snapshot()))
                .collect(),
        }
    }

    pub fn restore(&mut self, snapshot: StateStore) {
        *self = snapshot;
    }
}

/// The non-backtracking global store: only the user mutates it, never rolled back.
pub type GlobalStore = FxHashMap<String, Value>;

/// One frame of labeled bindings, pushed on rule entry and on every predicate/labeled
/// sub-evaluation, popped on exit.
pub type VarFrame = FxHashMap<String, Value>;

/// Stack of variable frames ("vstack" in the reference implementation).
#[derive(Default)]
pub struct VarStack {
    frames: Vec<VarFrame>,
}

impl VarStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self) {
        self.frames.push(VarFrame::default());
    }

    pub fn pop(&mut self) {
        self.frames.pop();
    }

    pub fn bind(&mut self, label: &str, value: Value) {
        if let Some(top) = self.frames.last_mut() {
            top.insert(label.to_string(), value);
        }
    }

    pub fn get(&self, label: &str) -> Option<&Value> {
        self.frames.last().and_then(|f| f.get(label))
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Clone the top frame's bindings, for handing a stable snapshot to a user
    /// action/code closure (which must not be able to mutate the live vstack).
    pub fn top_frame_clone(&self) -> VarFrame {
        self.frames.last().cloned().unwrap_or_default()
    }
}

/// A guard that pushes a [`VarStack`] frame on construction and pops it on drop, so a
/// frame is released on every exit path including early returns via `?`.
pub struct VarFrameGuard<'a> {
    stack: &'a mut VarStack,
}

impl<'a> VarFrameGuard<'a> {
    pub fn new(stack: &'a mut VarStack) -> Self {
        stack.push();
        VarFrameGuard { stack }
    }

    pub fn stack(&mut self) -> &mut VarStack {
        self.stack
    }
}

impl Drop for VarFrameGuard<'_> {
    fn drop(&mut self) {
        self.stack.pop();
    }
}

/// Stack of `{failure_label -> recover_expr_node}` maps; walked top-down on `Throw`.
#[derive(Default)]
pub struct RecoveryStack {
    frames: Vec<FxHashMap<String, crate::ids::NodeId>>,
}

impl RecoveryStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, labels: &[String], recover_expr: crate::ids::NodeId) {
        let mut m = FxHashMap::default();
        for label in labels {
            m.insert(label.clone(), recover_expr);
        }
        self.frames.push(m);
    }

    pub fn pop(&mut self) {
        self.frames.pop();
    }

    /// Find the nearest enclosing recovery expression for `label`, scanning top-down.
    pub fn find(&self, label: &str) -> Option<crate::ids::NodeId> {
        self.frames
            .iter()
            .rev()
            .find_map(|m| m.get(label).copied())
    }
}

/// RAII guard mirroring [`VarFrameGuard`] for the recovery stack.
pub struct RecoveryGuard<'a> {
    stack: &'a mut RecoveryStack,
}

impl<'a> RecoveryGuard<'a> {
    pub fn new(
        stack: &'a mut RecoveryStack,
        labels: &[String],
        recover_expr: crate::ids::NodeId,
    ) -> Self {
        stack.push(labels, recover_expr);
        RecoveryGuard { stack }
    }
}

impl Drop for RecoveryGuard<'_> {
    fn drop(&mut self) {
        self.stack.pop();
    }
}
