//! Basic data types shared by the resolution-proof analyzer: variables,
//! literals, and the immutable clause DAG nodes built from them.

/// Shortcut for tests: builds a `Lit` from a signed integer.
#[cfg(any(test, feature = "test-utils"))]
#[doc(hidden)]
#[macro_export]
macro_rules! lit {
    ($x:expr) => {
        $crate::lit::Lit::from_signed($x)
    };
}

/// Shortcut for tests: builds a `Var` from a signed integer's absolute value.
#[cfg(any(test, feature = "test-utils"))]
#[doc(hidden)]
#[macro_export]
macro_rules! var {
    ($x:expr) => {
        $crate::lit::Var::from_signed($x)
    };
}

/// Shortcut for tests: builds a fixed-size array of `Lit`s.
#[cfg(any(test, feature = "test-utils"))]
#[doc(hidden)]
#[macro_export]
macro_rules! lits {
    ( $( $x:expr ),* ) => { [ $( $crate::lit!( $x ) ),* ] };
    ( $( $x:expr ),* , ) => { $crate::lits! [ $( $ x),* ] };
}

pub mod clause;
pub mod lit;

pub use clause::{resolve, resolve_lits, Clause, ClauseIdx, ClauseKind, ResolutionError};
pub use lit::{Lit, Var};
