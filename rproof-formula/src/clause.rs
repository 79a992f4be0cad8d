//! Immutable nodes of a shared resolution DAG.
//!
//! A [`Clause`] never changes after it is built. Resolvents record the two
//! parents that produced them (by arena index, see [`ClauseIdx`]) together
//! with running aggregates — the removed-variable set, the regularity
//! violation count and the tree-copy cost — computed once at construction
//! time so that reading them later is free.
use std::fmt;

use bitvec::vec::BitVec;
use smallvec::SmallVec;
use thiserror::Error;

use crate::lit::{Lit, Var};

/// Inline capacity before a clause's literals spill to the heap.
///
/// Most learned clauses in practice are short; this avoids an allocation for
/// the common case while still supporting arbitrarily wide clauses.
const INLINE_LITS: usize = 4;

/// Index of a [`Clause`] in the arena that owns it.
///
/// The arena (the shadow's `clauses` vector) is the sole owner of every
/// clause's lifetime; this index is a cheap, `Copy` way to refer to one of
/// its entries without borrowing it. See `spec.md`/`SPEC_FULL.md` §9 for why
/// the arena-of-indices representation was chosen over reference counting.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ClauseIdx(u32);

impl ClauseIdx {
    #[inline]
    pub fn new(index: usize) -> ClauseIdx {
        ClauseIdx(index as u32)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ClauseIdx {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a clause is in the resolution DAG.
///
/// Modeled as a tagged variant rather than a "parents may be absent" sentinel
/// so the type system enforces that axioms never carry a pivot or parents
/// (`spec.md` §9's "tagged variant for clause kind" note).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ClauseKind {
    /// An input clause with no parents.
    Axiom,
    /// A resolvent produced while resolving a conflict, not persisted by the solver.
    Intermediate,
    /// A resolvent the solver persisted as the output of conflict analysis.
    Learned,
}

impl ClauseKind {
    pub fn is_axiom(self) -> bool {
        matches!(self, ClauseKind::Axiom)
    }

    pub fn is_learned(self) -> bool {
        matches!(self, ClauseKind::Learned)
    }

    pub fn is_resolvent(self) -> bool {
        !self.is_axiom()
    }
}

/// Errors produced while resolving two clauses on a pivot variable.
///
/// These are contract violations of the trace (`spec.md` §7): a sound trace
/// never triggers them, so callers treat both as fatal.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("clauses {a:?} and {b:?} share no opposite-polarity variable to resolve on")]
    NoPivot { a: Box<[Lit]>, b: Box<[Lit]> },
    #[error("clauses {a:?} and {b:?} share more than one opposite-polarity variable")]
    MultiplePivots { a: Box<[Lit]>, b: Box<[Lit]> },
}

/// An immutable, structurally sorted clause: a DAG node plus its aggregates.
pub struct Clause {
    literals: SmallVec<[Lit; INLINE_LITS]>,
    kind: ClauseKind,
    parents: Option<(ClauseIdx, ClauseIdx)>,
    pivot: Option<Var>,
    /// Union of all variables resolved away anywhere in this clause's subproof.
    removed_set: BitVec,
    /// Variables resolved away more than once along some root-to-leaf path
    /// of this clause's subproof (a non-empty set here is a witness for
    /// `regularity_violations > 0`, though the count can exceed the set's
    /// cardinality if a variable is re-removed more than once).
    reremoved_set: BitVec,
    regularity_violations: u64,
    /// Size of this clause's tree-form expansion. Saturates at `u128::MAX`
    /// for pathologically large proofs rather than overflow (`SPEC_FULL.md` §3).
    copy_cost: u128,
}

/// Sorts `lits` by variable and removes exact duplicates.
///
/// Panics (a caller bug, not a trace contract violation) if two literals of
/// the same variable disagree in polarity — the trace format never produces
/// that for an axiom clause, which is the only place this is used directly.
fn sort_canonical(lits: &mut SmallVec<[Lit; INLINE_LITS]>) {
    lits.sort_unstable_by_key(|l| l.index());
    lits.dedup();
    for pair in lits.windows(2) {
        assert_ne!(
            pair[0].var(),
            pair[1].var(),
            "variable {:?} appears with both polarities in one clause",
            pair[0].var()
        );
    }
}

impl Clause {
    /// Builds an axiom clause from literals in arbitrary order.
    pub fn axiom(lits: &[Lit]) -> Clause {
        let mut literals: SmallVec<[Lit; INLINE_LITS]> = lits.iter().copied().collect();
        sort_canonical(&mut literals);
        Clause {
            literals,
            kind: ClauseKind::Axiom,
            parents: None,
            pivot: None,
            removed_set: BitVec::new(),
            reremoved_set: BitVec::new(),
            regularity_violations: 0,
            copy_cost: 1,
        }
    }

    /// Builds a resolvent from precomputed literals (see [`resolve`]) and its parents.
    ///
    /// `kind` must be `Intermediate` or `Learned`; aggregates are derived
    /// from `a` and `b` exactly as `spec.md` §4.1 specifies.
    fn resolvent(
        literals: SmallVec<[Lit; INLINE_LITS]>,
        kind: ClauseKind,
        a_idx: ClauseIdx,
        a: &Clause,
        b_idx: ClauseIdx,
        b: &Clause,
        pivot: Var,
        num_vars: usize,
    ) -> Clause {
        debug_assert!(kind.is_resolvent());

        let mut removed_set = wider(&a.removed_set, &b.removed_set, num_vars);
        removed_set.set(pivot.index(), true);

        let violated_regularity =
            bit(&a.removed_set, pivot.index()) || bit(&b.removed_set, pivot.index());

        let mut reremoved_set = wider(&a.reremoved_set, &b.reremoved_set, num_vars);
        if violated_regularity {
            reremoved_set.set(pivot.index(), true);
        }

        let regularity_violations =
            a.regularity_violations + b.regularity_violations + (violated_regularity as u64);

        let copy_cost = 1u128
            .saturating_add(a.copy_cost)
            .saturating_add(b.copy_cost);

        Clause {
            literals,
            kind,
            parents: Some((a_idx, b_idx)),
            pivot: Some(pivot),
            removed_set,
            reremoved_set,
            regularity_violations,
            copy_cost,
        }
    }

    /// Creates a sibling of this resolvent with the `learned` flag set.
    ///
    /// Clauses are immutable, so marking a clause as learned always produces
    /// a new node with identical aggregates rather than mutating one in
    /// place — the one field `spec.md` §5 calls out as mutable in the
    /// original is modeled here as "construct a new sibling" instead, which
    /// keeps every `Clause` fully immutable after construction.
    pub fn mark_learned(&self) -> Clause {
        assert!(
            self.parents.is_some(),
            "only a resolvent can be marked learned"
        );
        Clause {
            literals: self.literals.clone(),
            kind: ClauseKind::Learned,
            parents: self.parents,
            pivot: self.pivot,
            removed_set: self.removed_set.clone(),
            reremoved_set: self.reremoved_set.clone(),
            regularity_violations: self.regularity_violations,
            copy_cost: self.copy_cost,
        }
    }

    pub fn literals(&self) -> &[Lit] {
        &self.literals
    }

    pub fn kind(&self) -> ClauseKind {
        self.kind
    }

    pub fn is_axiom(&self) -> bool {
        self.kind.is_axiom()
    }

    pub fn is_learned(&self) -> bool {
        self.kind.is_learned()
    }

    pub fn is_resolvent(&self) -> bool {
        self.kind.is_resolvent()
    }

    pub fn parents(&self) -> Option<(ClauseIdx, ClauseIdx)> {
        self.parents
    }

    pub fn pivot(&self) -> Option<Var> {
        self.pivot
    }

    pub fn removed_set(&self) -> &BitVec {
        &self.removed_set
    }

    pub fn reremoved_set(&self) -> &BitVec {
        &self.reremoved_set
    }

    pub fn regularity_violations(&self) -> u64 {
        self.regularity_violations
    }

    pub fn copy_cost(&self) -> u128 {
        self.copy_cost
    }

    /// `true` iff this clause has no literals.
    pub fn empty(&self) -> bool {
        self.literals.is_empty()
    }

    /// `true` iff this clause has exactly one literal.
    pub fn unit(&self) -> bool {
        self.literals.len() == 1
    }

    /// The clause's literal count.
    pub fn width(&self) -> usize {
        self.literals.len()
    }

    /// The first literal of a unit clause. Panics if the clause is not unit;
    /// callers are expected to have checked `unit()` first, mirroring the
    /// original's unchecked accessor.
    pub fn first_literal(&self) -> Lit {
        self.literals[0]
    }
}

/// Structural equality: only the literal sequence is compared. Two clauses
/// with identical literals may still be distinct DAG nodes (different
/// parents); this only inspects the formula (`spec.md` §4.1).
impl PartialEq for Clause {
    fn eq(&self, other: &Self) -> bool {
        self.literals == other.literals
    }
}
impl Eq for Clause {}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut first = true;
        for lit in &self.literals {
            if !first {
                write!(f, " ")?;
            }
            first = false;
            write!(f, "{}", lit)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Clause {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({})", self)
    }
}

fn bit(set: &BitVec, index: usize) -> bool {
    set.get(index).map(|b| *b).unwrap_or(false)
}

/// Clones the wider of the two bitsets and unions the narrower one into it,
/// so a resolvent's union only ever allocates once (`SPEC_FULL.md` §3).
fn wider(a: &BitVec, b: &BitVec, num_vars: usize) -> BitVec {
    let (mut base, other) = if a.len() >= b.len() {
        (a.clone(), b)
    } else {
        (b.clone(), a)
    };
    if base.len() < num_vars {
        base.resize(num_vars, false);
    }
    for i in other.iter_ones() {
        base.set(i, true);
    }
    base
}

/// Resolves two clauses on their single opposite-polarity variable.
///
/// Walks both sorted literal sequences by variable (`spec.md` §4.1):
/// - a literal only present in one clause is kept;
/// - the same variable with the same polarity in both is kept once;
/// - the same variable with opposite polarity in both is the pivot and is
///   dropped from both sides.
///
/// Returns [`ResolutionError::NoPivot`] if no such variable exists and
/// [`ResolutionError::MultiplePivots`] if more than one does — a sound trace
/// guarantees exactly one.
pub fn resolve_lits(a: &[Lit], b: &[Lit]) -> Result<(SmallVec<[Lit; INLINE_LITS]>, Var), ResolutionError> {
    let mut out: SmallVec<[Lit; INLINE_LITS]> = SmallVec::new();
    let mut pivot: Option<Var> = None;

    let mut i = 0;
    let mut j = 0;
    while i < a.len() || j < b.len() {
        match (a.get(i), b.get(j)) {
            (Some(&la), Some(&lb)) if la.var() == lb.var() => {
                if la == lb {
                    out.push(la);
                } else if pivot.is_some() {
                    return Err(ResolutionError::MultiplePivots {
                        a: a.into(),
                        b: b.into(),
                    });
                } else {
                    pivot = Some(la.var());
                }
                i += 1;
                j += 1;
            }
            (Some(&la), Some(&lb)) if la.var() < lb.var() => {
                out.push(la);
                i += 1;
            }
            (Some(&la), Some(_)) => {
                let _ = la;
                out.push(b[j]);
                j += 1;
            }
            (Some(&la), None) => {
                out.push(la);
                i += 1;
            }
            (None, Some(&lb)) => {
                out.push(lb);
                j += 1;
            }
            (None, None) => unreachable!(),
        }
    }

    match pivot {
        Some(pivot) => Ok((out, pivot)),
        None => Err(ResolutionError::NoPivot {
            a: a.into(),
            b: b.into(),
        }),
    }
}

/// Resolves two arena clauses, producing a new, as-yet-unstored `Intermediate` clause.
///
/// The caller (the shadow, which owns the arena) is responsible for pushing
/// the result and recording its index.
pub fn resolve(
    a_idx: ClauseIdx,
    a: &Clause,
    b_idx: ClauseIdx,
    b: &Clause,
    num_vars: usize,
) -> Result<Clause, ResolutionError> {
    let (lits, pivot) = resolve_lits(&a.literals, &b.literals)?;
    Ok(Clause::resolvent(
        lits,
        ClauseKind::Intermediate,
        a_idx,
        a,
        b_idx,
        b,
        pivot,
        num_vars,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lit, lits, var};
    use proptest::prelude::*;

    fn axiom(lits: &[Lit]) -> Clause {
        Clause::axiom(lits)
    }

    #[test]
    fn single_resolution() {
        // A = (1 2), B = (~1 3) -> (2 3), pivot 1, copy_cost 3
        let a = axiom(&lits![1, 2]);
        let b = axiom(&lits![-1, 3]);
        let (l, pivot) = resolve_lits(a.literals(), b.literals()).unwrap();
        assert_eq!(pivot, var!(1));
        assert_eq!(&l[..], &lits![2, 3]);

        let r = Clause::resolvent(
            l,
            ClauseKind::Intermediate,
            ClauseIdx::new(0),
            &a,
            ClauseIdx::new(1),
            &b,
            pivot,
            8,
        );
        assert_eq!(r.copy_cost(), 3);
        assert_eq!(r.regularity_violations(), 0);
        assert!(bit(r.removed_set(), var!(1).index()));
        assert!(!bit(r.removed_set(), var!(2).index()));
    }

    #[test]
    fn no_pivot_is_an_error() {
        let a = axiom(&lits![1, 2]);
        let b = axiom(&lits![3, 4]);
        assert_eq!(
            resolve_lits(a.literals(), b.literals()),
            Err(ResolutionError::NoPivot {
                a: a.literals().into(),
                b: b.literals().into()
            })
        );
    }

    #[test]
    fn multiple_pivots_is_an_error() {
        let a = axiom(&lits![1, 2]);
        let b = axiom(&lits![-1, -2]);
        assert!(matches!(
            resolve_lits(a.literals(), b.literals()),
            Err(ResolutionError::MultiplePivots { .. })
        ));
    }

    #[test]
    fn empty_clause_boundary() {
        let c = axiom(&[]);
        assert!(c.empty());
        assert!(!c.unit());
        assert_eq!(c.width(), 0);
    }

    #[test]
    fn unit_clause_boundary() {
        let c = axiom(&lits![5]);
        assert!(c.unit());
        assert_eq!(c.first_literal(), lit!(5));
    }

    #[test]
    fn resolve_is_commutative_in_result_literals() {
        let a = axiom(&lits![1, 2]);
        let b = axiom(&lits![-1, 3]);
        let (l1, p1) = resolve_lits(a.literals(), b.literals()).unwrap();
        let (l2, p2) = resolve_lits(b.literals(), a.literals()).unwrap();
        assert_eq!(p1, p2);
        assert_eq!(l1, l2);
    }

    fn regularity_violation_fixture() -> (Clause, Clause, Clause, Clause) {
        // A=(1 2), B=(~1 3), C=(~2 ~3), D=(1 ~3)
        (
            axiom(&lits![1, 2]),
            axiom(&lits![-1, 3]),
            axiom(&lits![-2, -3]),
            axiom(&lits![1, -3]),
        )
    }

    #[test]
    fn regularity_violation_scenario() {
        // R1 = resolve(A, B) = (2 3) on pivot 1
        let (a, b, _c, d) = regularity_violation_fixture();
        let (l, p) = resolve_lits(a.literals(), b.literals()).unwrap();
        let r1 = Clause::resolvent(l, ClauseKind::Intermediate, ClauseIdx::new(0), &a, ClauseIdx::new(1), &b, p, 8);
        assert_eq!(r1.regularity_violations(), 0);

        // R2 = resolve(R1, D) on pivot 3 -> (1 2)
        let (l, p) = resolve_lits(r1.literals(), d.literals()).unwrap();
        assert_eq!(p, var!(3));
        let r2 = Clause::resolvent(l, ClauseKind::Intermediate, ClauseIdx::new(2), &r1, ClauseIdx::new(3), &d, p, 8);
        assert_eq!(r2.regularity_violations(), 0);

        // R3 = resolve(R2, B) on pivot 1 again -> regularity violation
        let (l, p) = resolve_lits(r2.literals(), b.literals()).unwrap();
        assert_eq!(p, var!(1));
        let r3 = Clause::resolvent(l, ClauseKind::Intermediate, ClauseIdx::new(4), &r2, ClauseIdx::new(1), &b, p, 8);
        assert_eq!(r3.regularity_violations(), 1);
        assert!(bit(r3.reremoved_set(), var!(1).index()));
    }

    #[test]
    fn mark_learned_preserves_aggregates_but_not_identity() {
        let a = axiom(&lits![1, 2]);
        let b = axiom(&lits![-1, 3]);
        let (l, p) = resolve_lits(a.literals(), b.literals()).unwrap();
        let r = Clause::resolvent(l, ClauseKind::Intermediate, ClauseIdx::new(0), &a, ClauseIdx::new(1), &b, p, 8);
        let learned = r.mark_learned();
        assert!(learned.is_learned());
        assert_eq!(learned.copy_cost(), r.copy_cost());
        assert_eq!(learned.regularity_violations(), r.regularity_violations());
        assert_eq!(learned, r);
    }

    #[test]
    #[should_panic]
    fn mark_learned_on_axiom_panics() {
        let a = axiom(&lits![1, 2]);
        a.mark_learned();
    }

    proptest! {
        #[test]
        fn axiom_is_sorted_and_deduplicated(
            mut lits in proptest::collection::hash_set(1i32..16, 0..10)
        ) {
            let lits: Vec<Lit> = lits.drain().map(|v| Lit::from_signed(v as isize)).collect();
            let c = Clause::axiom(&lits);
            let mut prev: Option<Lit> = None;
            for &l in c.literals() {
                if let Some(p) = prev {
                    prop_assert!(p.index() < l.index());
                }
                prev = Some(l);
            }
        }

        #[test]
        fn resolve_is_order_independent(
            v1 in 1i32..6, v2 in 1i32..6
        ) {
            prop_assume!(v1 != v2);
            let a = Clause::axiom(&[Lit::from_signed(v1 as isize), Lit::from_signed(v2 as isize)]);
            let b = Clause::axiom(&[Lit::from_signed(-v1 as isize), Lit::from_signed((v2 + 10) as isize)]);
            let ab = resolve_lits(a.literals(), b.literals());
            let ba = resolve_lits(b.literals(), a.literals());
            prop_assert_eq!(ab.is_ok(), ba.is_ok());
            if let (Ok((la, pa)), Ok((lb, pb))) = (ab, ba) {
                prop_assert_eq!(la, lb);
                prop_assert_eq!(pa, pb);
            }
        }
    }
}
