//! The dynamically-typed value flowing through a parse.
//!
//! Actions are arbitrary user closures that can return arbitrary Rust types, so the
//! interpreter threads an `Rc<dyn Any>` end to end rather than a closed enum: this mirrors
//! the `any` the reference implementation keeps in `resultTuple.v`, `vstack` entries, and
//! action results.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

/// A value produced by matching an expression: a sub-match list, a captured slice, or
/// whatever a user action returned.
pub type Value = Rc<dyn Any>;

/// Build a [`Value`] from any owned, `'static` type.
pub fn value<T: Any>(v: T) -> Value {
    Rc::new(v)
}

/// The unit value, used by code blocks and successful zero-width matches that carry no
/// payload.
pub fn unit() -> Value {
    value(())
}

/// Values placed in the backtrackable state store advertise how they are copied when the
/// store is snapshotted on entry to a construct that may backtrack.
///
/// Types that are cheap to share (or for which sharing is semantically fine, e.g.
/// append-only structures) need do nothing: storing them as `Rc<dyn Any>` already gives a
/// shallow, reference-counted copy. Types that must be *deeply* copied so that mutations in
/// one speculative branch are invisible to a sibling branch implement [`ClonableAny`]; the
/// state store detects this via a downcast and calls `clone_any` instead of sharing the
/// `Rc`.
pub trait ClonableAny: Any {
    /// Produce an independent deep copy of `self`.
    fn clone_any(&self) -> Box<dyn ClonableAny>;

    /// Upcast for downcasting back to the concrete type.
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any + Clone> ClonableAny for T {
    fn clone_any(&self) -> Box<dyn ClonableAny> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Debug for dyn ClonableAny {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ClonableAny(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_roundtrips_through_any() {
        let v = value(42i64);
        assert_eq!(*v.downcast_ref::<i64>().unwrap(), 42);
    }

    #[test]
    fn clonable_any_deep_copies() {
        #[derive(Clone)]
        struct Counter(i32);

        let c: Box<dyn ClonableAny> = Box::new(Counter(1));
        let d = c.clone_any();
        assert_eq!(d.as_any().downcast_ref::<Counter>().unwrap().0, 1);
    }
}
