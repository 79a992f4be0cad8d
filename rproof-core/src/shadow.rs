//! Append-only mirror of the solver's clause database and assignment trail.
//!
//! `SolverShadow` owns the single arena of [`Clause`]s; every clause the
//! solver ever references lives here for the lifetime of the shadow, even
//! after the solver itself has deleted it (`spec.md` §4.2/§5) — this is what
//! lets the graph builder later walk the "unused" part of a proof.
use log::trace;
use rustc_hash::FxHashMap;

use rproof_formula::{resolve, Clause, ClauseIdx, ClauseKind, Lit, Var};

use crate::error::{Cref, CheckerError};

/// How the shadow accounts for literals the solver skipped during conflict
/// analysis — level-0 literals implicitly resolved away via their unit
/// reasons (`spec.md` §4.2).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IgnoreMode {
    /// Skips are disallowed; `skip` is a no-op. Most tree-like DAG, no
    /// regularity violations introduced by skipping.
    None,
    /// Memoize each skip step by `(original clause, skipped-so-far)` and
    /// reuse it across calls — small derivation chains, but skipped
    /// literals can reappear as pivots (and hence regularity violations)
    /// along later conflict-resolution paths.
    Learn,
    /// Resolve the whole skip list in one un-memoized chain — keeps learned
    /// clause derivation trivial and concentrates skip-induced regularity
    /// violations in a single place.
    ResolveUnit,
}

/// One entry of the assignment trail (`spec.md` §3).
#[derive(Copy, Clone, Debug)]
pub struct TrailItem {
    pub decision_level: u32,
    pub lit: Lit,
    /// `None` for a decision; `Some` for a propagation, naming its reason.
    pub reason: Option<ClauseIdx>,
}

/// Append-only mirror of the solver's clause database and trail.
pub struct SolverShadow {
    mode: IgnoreMode,
    /// The arena: every clause ever built, in creation order. Never shrinks.
    clauses: Vec<Clause>,
    /// External clause reference -> arena index, forgotten (not nulled) by
    /// `remove_clause`.
    cref_map: FxHashMap<Cref, ClauseIdx>,
    /// Variable -> arena index of its currently known learned unit.
    unit_map: FxHashMap<Var, ClauseIdx>,
    /// `Learn`-mode memoization: (clause resolved from, variables skipped so
    /// far, in trail order) -> arena index. A structural key
    /// (`SPEC_FULL.md` §4.2), not the original's concatenated string.
    clauses_with_ignored: FxHashMap<(ClauseIdx, Vec<Var>), ClauseIdx>,
    /// Trail position of each variable's current assignment, `-1` if unassigned.
    index: Vec<i64>,
    decision_level: u32,
    trail: Vec<TrailItem>,
    /// Arena index of the first clause ever added with `kind == Learned`.
    first_learned_index: Option<ClauseIdx>,
}

impl SolverShadow {
    pub fn new(mode: IgnoreMode) -> SolverShadow {
        SolverShadow {
            mode,
            clauses: Vec::new(),
            cref_map: FxHashMap::default(),
            unit_map: FxHashMap::default(),
            clauses_with_ignored: FxHashMap::default(),
            index: Vec::new(),
            decision_level: 0,
            trail: Vec::new(),
            first_learned_index: None,
        }
    }

    pub fn mode(&self) -> IgnoreMode {
        self.mode
    }

    pub fn num_vars(&self) -> usize {
        self.index.len()
    }

    pub fn decision_level(&self) -> u32 {
        self.decision_level
    }

    pub fn trail(&self) -> &[TrailItem] {
        &self.trail
    }

    pub fn first_learned_index(&self) -> Option<ClauseIdx> {
        self.first_learned_index
    }

    /// Trail position of `var`'s current assignment, `-1` if unassigned.
    pub fn index_of(&self, var: Var) -> i64 {
        self.index[var.index()]
    }

    pub fn clause_count(&self) -> usize {
        self.clauses.len()
    }

    pub fn clause(&self, idx: ClauseIdx) -> &Clause {
        &self.clauses[idx.index()]
    }

    /// All arena clauses from `first_learned_index` on, including ones the
    /// solver has since deleted — the seed set for the graph builder's
    /// unused-learned-clause phase (`spec.md` §4.3 phase 3).
    pub fn clauses_from<'a>(&'a self, start: ClauseIdx) -> impl Iterator<Item = (ClauseIdx, &'a Clause)> + 'a {
        self.clauses[start.index()..]
            .iter()
            .enumerate()
            .map(move |(i, c)| (ClauseIdx::new(start.index() + i), c))
    }

    /// Grows the variable-indexed tables to cover `n` variables. Idempotent:
    /// never shrinks (`spec.md` §4.2).
    pub fn grow_num_vars(&mut self, n: usize) {
        if self.index.len() < n {
            self.index.resize(n, -1);
        }
    }

    fn push(&mut self, c: Clause) -> ClauseIdx {
        let idx = ClauseIdx::new(self.clauses.len());
        self.clauses.push(c);
        idx
    }

    /// Registers a clause the dispatcher knows by `cref` — an input clause,
    /// or a just-finalized learned clause (`spec.md` §4.2 `add_clause`).
    pub fn add_clause(&mut self, c: Clause, cref: Cref) -> ClauseIdx {
        let learned = c.is_learned();
        let idx = self.push(c);
        self.cref_map.insert(cref, idx);
        if learned && self.first_learned_index.is_none() {
            self.first_learned_index = Some(idx);
        }
        trace!("add_clause cref={} -> {:?}", cref, idx);
        idx
    }

    /// Registers a unit clause under its own literal's variable.
    pub fn add_unit(&mut self, c: Clause) -> ClauseIdx {
        assert!(c.unit(), "add_unit requires a unit clause");
        let l = c.first_literal();
        self.add_unit_as(c, l)
    }

    /// Registers a unit clause under `l`'s variable even though `c` itself
    /// may be wider — needed in skip-enabled modes where the solver's
    /// logical unit has a wider internal representation in the shadow
    /// (`spec.md` §4.2).
    pub fn add_unit_as(&mut self, c: Clause, l: Lit) -> ClauseIdx {
        let idx = self.push(c);
        if c_is_learned_unit_first(self, idx) {
            self.first_learned_index = Some(idx);
        }
        self.unit_map.insert(l.var(), idx);
        trace!("add_unit var={:?} -> {:?}", l.var(), idx);
        idx
    }

    pub fn decide(&mut self, l: Lit) {
        self.decision_level += 1;
        self.index[l.var().index()] = self.trail.len() as i64;
        self.trail.push(TrailItem {
            decision_level: self.decision_level,
            lit: l,
            reason: None,
        });
    }

    /// Propagates `l` using its registered learned unit as the reason.
    pub fn propagate_via_unit(&mut self, l: Lit) -> Result<(), CheckerError> {
        let reason = *self
            .unit_map
            .get(&l.var())
            .ok_or(CheckerError::UnknownUnit { var: l.var() })?;
        self.index[l.var().index()] = self.trail.len() as i64;
        self.trail.push(TrailItem {
            decision_level: self.decision_level,
            lit: l,
            reason: Some(reason),
        });
        Ok(())
    }

    /// Propagates `l` via the clause at `cref`.
    ///
    /// At decision level 0 in a skip-enabled mode, a propagation is
    /// logically equivalent to a learned unit clause — the solver resolved
    /// away every other literal of `reason` implicitly. We synthesize that
    /// clause explicitly and register it as `l`'s learned unit
    /// (`spec.md` §4.2).
    pub fn propagate(&mut self, l: Lit, cref: Cref) -> Result<(), CheckerError> {
        let reason_idx = *self
            .cref_map
            .get(&cref)
            .ok_or(CheckerError::UnknownCref { cref })?;

        let mut via = reason_idx;

        if self.decision_level == 0 && self.mode != IgnoreMode::None {
            let other_lits: Vec<Lit> = self
                .clause(reason_idx)
                .literals()
                .iter()
                .copied()
                .filter(|&lit| lit != l)
                .collect();

            let mut chain = vec![reason_idx];
            for lit in other_lits {
                let unit_idx = *self
                    .unit_map
                    .get(&lit.var())
                    .ok_or(CheckerError::UnknownUnit { var: lit.var() })?;
                chain.push(unit_idx);
            }

            let learned_idx = self.resolve_chain(&chain, ClauseKind::Learned)?;
            self.unit_map.insert(l.var(), learned_idx);
            via = learned_idx;
        }

        self.index[l.var().index()] = self.trail.len() as i64;
        self.trail.push(TrailItem {
            decision_level: self.decision_level,
            lit: l,
            reason: Some(via),
        });
        Ok(())
    }

    /// Pops trail entries above `to_level`, resetting their variables'
    /// assignment index. Never touches the clause arena (`spec.md` §4.2).
    pub fn backtrack(&mut self, to_level: u32) {
        while let Some(item) = self.trail.last() {
            if item.decision_level > to_level {
                self.index[item.lit.var().index()] = -1;
                self.trail.pop();
            } else {
                break;
            }
        }
        self.decision_level = to_level;
    }

    pub fn restart(&mut self) {
        self.backtrack(0);
    }

    pub fn clause_by_cref(&self, cref: Cref) -> Result<ClauseIdx, CheckerError> {
        self.cref_map
            .get(&cref)
            .copied()
            .ok_or(CheckerError::UnknownCref { cref })
    }

    pub fn unit_clause(&self, var: Var) -> Result<ClauseIdx, CheckerError> {
        self.unit_map
            .get(&var)
            .copied()
            .ok_or(CheckerError::UnknownUnit { var })
    }

    /// Forgets the `cref -> index` mapping. The arena entry is *not*
    /// cleared: any live resolvent still reaches it through `parents`, and
    /// the graph builder's unused-learned phase walks it directly by arena
    /// position rather than through `cref_map` (`spec.md` §4.2/§9).
    pub fn remove_clause(&mut self, cref: Cref) -> Result<(), CheckerError> {
        self.cref_map
            .remove(&cref)
            .map(|_| ())
            .ok_or(CheckerError::UnknownCref { cref })
    }

    /// Applies `(from, to)` relocations atomically, all against the mapping
    /// as it stood before this call: each clause that was reachable by
    /// `from` becomes reachable by `to` instead.
    pub fn relocate(&mut self, moves: &[(Cref, Cref)]) {
        let before = self.cref_map.clone();
        for &(from, to) in moves {
            if let Some(&idx) = before.get(&from) {
                self.cref_map.insert(to, idx);
                if from != to {
                    self.cref_map.remove(&from);
                }
            }
        }
    }

    /// Resolves two arena clauses into an `Intermediate` resolvent, pushing
    /// the result. Used directly by the dispatcher for `U` resolution steps.
    pub fn resolve(&mut self, a: ClauseIdx, b: ClauseIdx) -> Result<ClauseIdx, CheckerError> {
        self.push_resolvent(a, b, ClauseKind::Intermediate)
    }

    fn push_resolvent(
        &mut self,
        a: ClauseIdx,
        b: ClauseIdx,
        kind: ClauseKind,
    ) -> Result<ClauseIdx, CheckerError> {
        let num_vars = self.num_vars();
        let resolvent = resolve(a, &self.clauses[a.index()], b, &self.clauses[b.index()], num_vars)?;
        let resolvent = if kind.is_learned() {
            resolvent.mark_learned()
        } else {
            resolvent
        };
        Ok(self.push(resolvent))
    }

    /// Left-folds resolution over `indices` (`spec.md` §4.1 "resolution of a
    /// chain"), pushing every intermediate step into the arena since parents
    /// are arena indices rather than shared pointers — the same DAG shape as
    /// the original's ephemeral fold, just with each step addressable.
    /// The final step is tagged `final_kind`; every earlier step is
    /// `Intermediate`. A single-element chain has nothing to resolve and is
    /// returned unchanged, not re-tagged as `final_kind` — a level-0
    /// propagation whose reason is already the unit clause it names.
    fn resolve_chain(
        &mut self,
        indices: &[ClauseIdx],
        final_kind: ClauseKind,
    ) -> Result<ClauseIdx, CheckerError> {
        assert!(!indices.is_empty(), "resolve_chain needs at least one clause");
        if indices.len() == 1 {
            // Nothing to resolve away: the lone clause is already the result,
            // registered unchanged under `final_kind`'s caller.
            return Ok(indices[0]);
        }
        let mut current = indices[0];
        let last = indices.len() - 2;
        for (i, &next) in indices[1..].iter().enumerate() {
            let kind = if i == last {
                final_kind
            } else {
                ClauseKind::Intermediate
            };
            current = self.push_resolvent(current, next, kind)?;
        }
        Ok(current)
    }

    /// Returns the clause at `cref` minus `literals`, per the configured
    /// ignore mode (`spec.md` §4.2). `literals` need not be pre-sorted; this
    /// sorts them by ascending trail position itself, the canonicalization
    /// `spec.md` requires before building the memoization key.
    pub fn skip(&mut self, cref: Cref, mut literals: Vec<Lit>) -> Result<ClauseIdx, CheckerError> {
        let base_idx = self.clause_by_cref(cref)?;
        if self.mode == IgnoreMode::None {
            return Ok(base_idx);
        }

        literals.sort_by_key(|l| self.index[l.var().index()]);

        match self.mode {
            IgnoreMode::None => unreachable!(),
            IgnoreMode::ResolveUnit => {
                let mut chain = vec![base_idx];
                for l in &literals {
                    chain.push(self.unit_clause(l.var())?);
                }
                self.resolve_chain(&chain, ClauseKind::Intermediate)
            }
            IgnoreMode::Learn => {
                let mut current = base_idx;
                let mut skipped_vars: Vec<Var> = Vec::with_capacity(literals.len());
                for l in &literals {
                    skipped_vars.push(l.var());
                    let key = (base_idx, skipped_vars.clone());
                    if let Some(&memoized) = self.clauses_with_ignored.get(&key) {
                        current = memoized;
                        continue;
                    }
                    let unit_idx = self.unit_clause(l.var())?;
                    let new_idx = self.push_resolvent(current, unit_idx, ClauseKind::Intermediate)?;
                    self.clauses_with_ignored.insert(key, new_idx);
                    current = new_idx;
                }
                Ok(current)
            }
        }
    }

    /// Finds the trail item for `l.var()`'s current assignment.
    fn trail_item_for(&self, var: Var) -> Result<&TrailItem, CheckerError> {
        let pos = self.index[var.index()];
        if pos < 0 {
            return Err(CheckerError::NoReasonOnTrail { var });
        }
        Ok(&self.trail[pos as usize])
    }

    /// Subset (local) minimization: resolves `initial` with the reason
    /// clause of each literal in `to_remove`, in descending trail order
    /// (`spec.md` §4.2 `minimize`).
    pub fn minimize(&mut self, initial: ClauseIdx, mut to_remove: Vec<Lit>) -> Result<ClauseIdx, CheckerError> {
        to_remove.sort_by_key(|l| std::cmp::Reverse(self.index[l.var().index()]));

        let mut remaining = initial;
        for l in to_remove {
            let item = self.trail_item_for(l.var())?;
            let reason = item.reason.ok_or(CheckerError::NoReasonOnTrail { var: l.var() })?;
            remaining = self.resolve(remaining, reason)?;
        }
        Ok(remaining)
    }

    /// Transitive ("recursive") minimization: like [`minimize`], but
    /// literals a reason clause introduces that are neither in `initial`
    /// nor already handled are queued for removal too
    /// (`spec.md` §4.2 `minimize_full`).
    pub fn minimize_full(&mut self, initial: ClauseIdx, mut to_remove: Vec<Lit>) -> Result<ClauseIdx, CheckerError> {
        let mut initial_vars: Vec<bool> = vec![false; self.num_vars()];
        for l in self.clause(initial).literals() {
            initial_vars[l.var().index()] = true;
        }
        let mut handled_vars = initial_vars.clone();

        let mut remaining = initial;

        while !to_remove.is_empty() {
            let (pos, _) = to_remove
                .iter()
                .enumerate()
                .max_by_key(|(_, l)| self.index[l.var().index()])
                .expect("to_remove is non-empty");
            let remove = to_remove.remove(pos);

            let item = self.trail_item_for(remove.var())?;
            let reason = item
                .reason
                .ok_or(CheckerError::NoReasonOnTrail { var: remove.var() })?;

            let reason_lits: Vec<Lit> = self.clause(reason).literals().to_vec();
            for l in reason_lits {
                let v = l.var();
                if v == remove.var() || initial_vars[v.index()] || handled_vars[v.index()] {
                    continue;
                }
                handled_vars[v.index()] = true;
                to_remove.push(l);
            }

            remaining = self.resolve(remaining, reason)?;
        }

        Ok(remaining)
    }
}

/// Helper for `add_unit_as`: whether the just-pushed clause is the first
/// learned clause seen so far. Kept as a free function since it needs to
/// read `self.clauses[idx]` immutably while `add_unit_as` still holds other
/// borrows live at the call site.
fn c_is_learned_unit_first(shadow: &SolverShadow, idx: ClauseIdx) -> bool {
    shadow.clause(idx).is_learned() && shadow.first_learned_index.is_none()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rproof_formula::{lit, lits, var, Clause};

    fn setup(mode: IgnoreMode, n: usize) -> SolverShadow {
        let mut s = SolverShadow::new(mode);
        s.grow_num_vars(n);
        s
    }

    #[test]
    fn num_vars_never_shrinks() {
        let mut s = setup(IgnoreMode::None, 8);
        s.grow_num_vars(3);
        assert_eq!(s.num_vars(), 8);
        s.grow_num_vars(20);
        assert_eq!(s.num_vars(), 20);
    }

    #[test]
    fn backtrack_resets_index_and_keeps_lower_levels() {
        let mut s = setup(IgnoreMode::None, 4);
        s.decide(lit!(1));
        s.decide(lit!(2));
        s.decide(lit!(3));
        assert_eq!(s.decision_level(), 3);

        s.backtrack(1);
        assert_eq!(s.decision_level(), 1);
        assert_eq!(s.trail().len(), 1);
        assert_eq!(s.index[var!(2).index()], -1);
        assert_eq!(s.index[var!(3).index()], -1);
        assert_ne!(s.index[var!(1).index()], -1);
    }

    #[test]
    fn restart_goes_to_level_zero_without_touching_clauses() {
        let mut s = setup(IgnoreMode::None, 4);
        let a = Clause::axiom(&lits![1, 2]);
        s.add_clause(a, 0);
        s.decide(lit!(1));
        s.decide(lit!(2));
        let before = s.clause_count();
        s.restart();
        assert_eq!(s.decision_level(), 0);
        assert!(s.trail().is_empty());
        assert_eq!(s.clause_count(), before);
    }

    #[test]
    fn remove_clause_then_lookup_fails_but_clause_stays_in_arena() {
        let mut s = setup(IgnoreMode::None, 4);
        let a = Clause::axiom(&lits![1, 2]);
        let idx = s.add_clause(a, 7);
        s.remove_clause(7).unwrap();
        assert!(matches!(
            s.clause_by_cref(7),
            Err(CheckerError::UnknownCref { cref: 7 })
        ));
        assert_eq!(s.clause(idx).literals(), &lits![1, 2]);
    }

    #[test]
    fn level_zero_propagation_with_already_unit_reason_does_not_panic() {
        // In Learn/ResolveUnit mode, propagate() resolves away every literal
        // but `l` from the reason clause. When the reason is already a unit
        // (no other literals), the chain folded into resolve_chain has just
        // one element; it must return that clause unchanged rather than
        // asserting on a two-clause minimum.
        let mut s = setup(IgnoreMode::Learn, 4);
        let reason = s.add_clause(Clause::axiom(&lits![1]), 5);
        s.propagate(lit!(1), 5).unwrap();
        assert_eq!(s.unit_clause(var!(1)).unwrap(), reason);

        let mut s = setup(IgnoreMode::ResolveUnit, 4);
        let reason = s.add_clause(Clause::axiom(&lits![1]), 5);
        s.propagate(lit!(1), 5).unwrap();
        assert_eq!(s.unit_clause(var!(1)).unwrap(), reason);
    }

    #[test]
    fn skip_resolve_unit_mode_with_no_literals_to_skip_is_identity() {
        let mut s = setup(IgnoreMode::ResolveUnit, 4);
        let idx = s.add_clause(Clause::axiom(&lits![1, 2, 3]), 1);
        let skipped = s.skip(1, Vec::new()).unwrap();
        assert_eq!(skipped, idx);
    }

    #[test]
    fn skip_none_mode_is_identity() {
        let mut s = setup(IgnoreMode::None, 4);
        let idx = s.add_clause(Clause::axiom(&lits![1, 2, 3]), 1);
        let skipped = s.skip(1, vec![lit!(1)]).unwrap();
        assert_eq!(skipped, idx);
    }

    #[test]
    fn skip_learn_mode_memoizes_by_prefix() {
        let mut s = setup(IgnoreMode::Learn, 4);
        s.add_unit(Clause::axiom(&lits![-1]));
        let cref_idx = s.add_clause(Clause::axiom(&lits![1, 2, 3]), 1);
        let _ = cref_idx;

        let first = s.skip(1, vec![lit!(1)]).unwrap();
        let second = s.skip(1, vec![lit!(1)]).unwrap();
        assert_eq!(first, second, "identical skip prefix must reuse the memoized node");
    }

    #[test]
    fn skip_resolve_unit_mode_never_memoizes() {
        let mut s = setup(IgnoreMode::ResolveUnit, 4);
        s.add_unit(Clause::axiom(&lits![-1]));
        s.add_clause(Clause::axiom(&lits![1, 2, 3]), 1);

        let first = s.skip(1, vec![lit!(1)]).unwrap();
        let second = s.skip(1, vec![lit!(1)]).unwrap();
        assert_ne!(first, second, "resolve_unit mode must not memoize");
    }

    #[test]
    fn minimize_full_resolves_away_temporarily_introduced_literals() {
        // decisions 1, 2 stay; 3 is forced by a bare unit clause, 4 is forced
        // by (~3 4); minimizing away ~4 from (1 2 ~4) must pull in ~3 and
        // then bottom out at the unit clause for 3, leaving just (1 2).
        let mut s = setup(IgnoreMode::None, 5);
        s.decide(lit!(1));
        s.decide(lit!(2));
        let unit_three = s.add_clause(Clause::axiom(&lits![3]), 100);
        s.propagate(lit!(3), 100).unwrap();
        let _ = unit_three;
        let reason_four = s.add_clause(Clause::axiom(&lits![-3, 4]), 101);
        s.propagate(lit!(4), 101).unwrap();
        let _ = reason_four;

        let initial = s.add_clause(Clause::axiom(&lits![1, 2, -4]), 200);
        let result = s.minimize_full(initial, vec![lit!(4)]).unwrap();

        let mut lits: Vec<_> = s.clause(result).literals().to_vec();
        lits.sort_by_key(|l| l.index());
        assert_eq!(lits, vec![lit!(1), lit!(2)]);
    }
}
