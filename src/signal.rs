use std::fmt::{Debug, Display, Formatter};
use std::ops::{BitXor, Not};

/// A possibly inverted edge to an AIG node, encoded as `2·node + inverted`.
///
/// Node 0 is the constant false, so [`Signal::zero`] and [`Signal::one`] are the AIGER
/// literals `0` and `1`. The encoding is internal to one [`Aig`][crate::aig::Aig]; the
/// literals written to a file are renumbered.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Signal(u32);

// Constructors
impl Signal {
    pub const fn zero() -> Self {
        Self(0)
    }

    pub const fn one() -> Self {
        Self(1)
    }

    /// Regular signal of the node `node`. Node 0 is the constant.
    pub const fn from_node(node: u32) -> Self {
        Self(node << 1)
    }
}

// Getters
impl Signal {
    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn node(self) -> u32 {
        self.0 >> 1
    }

    pub const fn regular(self) -> Self {
        Self(self.0 & !1)
    }
}

// Checks
impl Signal {
    pub const fn is_const(self) -> bool {
        self.node() == 0
    }

    pub const fn is_negated(self) -> bool {
        self.0 & 1 != 0
    }
}

impl From<bool> for Signal {
    fn from(value: bool) -> Self {
        Self(value as u32)
    }
}

impl Not for Signal {
    type Output = Self;

    fn not(self) -> Self::Output {
        Self(self.0 ^ 1)
    }
}

/// Inverts the signal when the right-hand side is `true`.
impl BitXor<bool> for Signal {
    type Output = Self;

    fn bitxor(self, invert: bool) -> Self::Output {
        Self(self.0 ^ invert as u32)
    }
}

impl Display for Signal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match (self.is_const(), self.is_negated()) {
            (true, negated) => write!(f, "{}", negated as u8),
            (false, true) => write!(f, "!n{}", self.node()),
            (false, false) => write!(f, "n{}", self.node()),
        }
    }
}

impl Debug for Signal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}
