//! Handles to BDD nodes.
//!
//! A [`Ref`] is a signed index into the node arena of a [`Bdd`][crate::bdd::Bdd] manager.
//! The sign encodes a complement edge: `-r` is the negation of `r` and costs nothing.
//! Since the manager hash-conses every node, two logically equal functions always
//! share the same `Ref`, which makes it a sound cache key.

use std::fmt::{Display, Formatter};
use std::ops::Neg;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Ref(i32);

impl Ref {
    /// Regular (non-complemented) reference to the node with the given arena id.
    pub const fn positive(id: u32) -> Self {
        assert!(id != 0, "Node id 0 is reserved");
        Self(id as i32)
    }

    /// Complemented reference to the node with the given arena id.
    pub const fn negative(id: u32) -> Self {
        assert!(id != 0, "Node id 0 is reserved");
        Self(-(id as i32))
    }

    pub const fn is_negated(self) -> bool {
        self.0 < 0
    }

    pub const fn negate(self) -> Self {
        Self(-self.0)
    }

    /// Arena id of the referenced node, regardless of the complement bit.
    pub const fn id(self) -> u32 {
        self.0.unsigned_abs()
    }

    /// The regular (non-complemented) version of this reference.
    pub const fn regular(self) -> Self {
        Self(self.0.abs())
    }

    /// Return the internal representation of the reference.
    pub const fn raw(self) -> i32 {
        self.0
    }
}

impl Neg for Ref {
    type Output = Self;

    fn neg(self) -> Self::Output {
        self.negate()
    }
}

impl Display for Ref {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", if self.is_negated() { "~" } else { "" }, self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negation_roundtrip() {
        let r = Ref::positive(5);
        assert!(!r.is_negated());
        assert!((-r).is_negated());
        assert_eq!(-(-r), r);
        assert_eq!((-r).id(), 5);
        assert_eq!((-r).regular(), r);
    }

    #[test]
    fn test_display() {
        assert_eq!(Ref::positive(3).to_string(), "@3");
        assert_eq!(Ref::negative(3).to_string(), "~@3");
    }

    #[test]
    #[should_panic(expected = "Node id 0 is reserved")]
    fn test_zero_id_panics() {
        Ref::positive(0);
    }
}
