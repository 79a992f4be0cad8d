//! Variables and literals.
use std::fmt;

/// The backing type used to represent literals and variables.
pub type LitIdx = u32;

/// A boolean variable.
///
/// Variables are dense and 0-based internally. The trace format (and this
/// crate's `Display` impl) use the same 0-based number, unlike DIMACS CNF's
/// 1-based convention — there is no separate "user" numbering here.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Var {
    index: LitIdx,
}

impl Var {
    /// Creates a variable from a 0-based index.
    #[inline]
    pub fn from_index(index: usize) -> Var {
        debug_assert!(index <= Var::max_var().index());
        Var {
            index: index as LitIdx,
        }
    }

    /// Creates a variable from a signed integer's absolute value. See
    /// [`Lit::from_signed`].
    #[cfg(any(test, feature = "test-utils"))]
    #[inline]
    pub fn from_signed(number: isize) -> Var {
        Var::from_index(number.unsigned_abs())
    }

    /// The 0-based index representing this variable.
    #[inline]
    pub const fn index(self) -> usize {
        self.index as usize
    }

    /// The variable with largest index that is supported.
    ///
    /// Leaves the top bits free for a sign bit and the deleted/tag bits used
    /// by some internal encodings.
    pub const fn max_var() -> Var {
        Var {
            index: LitIdx::max_value() >> 4,
        }
    }

    /// Largest number of variables supported.
    pub const fn max_count() -> usize {
        Self::max_var().index() + 1
    }

    /// Creates a literal from this var and a `bool` that is `true` when positive.
    #[inline]
    pub fn lit(self, polarity: bool) -> Lit {
        Lit::from_var(self, polarity)
    }

    /// Creates a positive literal from this var.
    #[inline]
    pub fn positive(self) -> Lit {
        Lit::positive(self)
    }

    /// Creates a negative literal from this var.
    #[inline]
    pub fn negative(self) -> Lit {
        Lit::negative(self)
    }
}

impl fmt::Debug for Var {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.index)
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A boolean literal: a variable together with a polarity.
///
/// Internally encoded as `variable_index << 1 | negated`, so sorting by
/// `code()` sorts by variable first and groups the two polarities of a
/// variable next to each other. This is the same encoding
/// `varisat_formula::Lit` uses, chosen for the same reason: it makes
/// `var()`/`is_negative()` single shift/mask operations.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Lit {
    code: LitIdx,
}

impl Lit {
    /// Creates a literal from a `Var` and a `bool` that is `true` when positive.
    #[inline]
    pub fn from_var(var: Var, polarity: bool) -> Lit {
        Lit::from_litidx(var.index, polarity)
    }

    /// Create a positive literal from a `Var`.
    #[inline]
    pub fn positive(var: Var) -> Lit {
        Lit::from_var(var, true)
    }

    /// Create a negative literal from a `Var`.
    #[inline]
    pub fn negative(var: Var) -> Lit {
        Lit::from_var(var, false)
    }

    /// Create a literal from a variable index and polarity.
    #[inline]
    pub fn from_index(index: usize, polarity: bool) -> Lit {
        Lit::from_var(Var::from_index(index), polarity)
    }

    /// Creates a literal from a signed integer: the absolute value is the
    /// 0-based variable index, the sign is the polarity. Used only to build
    /// test fixtures tersely (mirrors the `lit!`/`lits!` macros the teacher
    /// crate uses, adapted to this crate's 0-based numbering rather than
    /// DIMACS' 1-based one).
    #[cfg(any(test, feature = "test-utils"))]
    #[inline]
    pub fn from_signed(number: isize) -> Lit {
        Lit::from_index(number.unsigned_abs(), number >= 0)
    }

    #[inline]
    fn from_litidx(index: LitIdx, polarity: bool) -> Lit {
        debug_assert!(index <= Var::max_var().index);
        Lit {
            code: (index << 1) | (!polarity as LitIdx),
        }
    }

    /// 0-based index of the literal's variable.
    #[inline]
    pub fn index(self) -> usize {
        (self.code >> 1) as usize
    }

    /// The literal's variable.
    #[inline]
    pub fn var(self) -> Var {
        Var {
            index: self.code >> 1,
        }
    }

    /// Whether the literal is negative, i.e. a negated variable.
    #[inline]
    pub fn is_negative(self) -> bool {
        (self.code & 1) != 0
    }

    /// Whether the literal is positive, i.e. a non-negated variable.
    #[inline]
    pub fn is_positive(self) -> bool {
        !self.is_negative()
    }

    /// Two times the variable's index for positive literals, one more for negative ones.
    #[inline]
    pub fn code(self) -> usize {
        self.code as usize
    }
}

impl std::ops::Not for Lit {
    type Output = Lit;

    #[inline]
    fn not(self) -> Lit {
        Lit {
            code: self.code ^ 1,
        }
    }
}

impl From<Var> for Lit {
    #[inline]
    fn from(var: Var) -> Lit {
        Lit::positive(var)
    }
}

/// Uses the trace's `~n` notation for negative literals, bare `n` for positive.
impl fmt::Debug for Lit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_negative() {
            write!(f, "~{}", self.var())
        } else {
            write!(f, "{}", self.var())
        }
    }
}

impl fmt::Display for Lit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_tilde_for_negative() {
        let v = Var::from_index(2);
        assert_eq!(format!("{}", v.positive()), "2");
        assert_eq!(format!("{}", v.negative()), "~2");
    }

    #[test]
    fn not_flips_polarity_only() {
        let l = Lit::from_index(5, true);
        assert_eq!(!l, Lit::from_index(5, false));
        assert_eq!(!!l, l);
    }

    #[test]
    fn ordering_groups_by_variable() {
        let a = Lit::from_index(1, true);
        let b = Lit::from_index(1, false);
        let c = Lit::from_index(2, true);
        assert!(a < b || b < a);
        assert!(a.var() == b.var());
        assert!(b < c);
    }
}
