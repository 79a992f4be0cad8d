//! Builds the resolution DAG of a single conflict as a `petgraph` graph and
//! derives the statistics the dispatcher reports (`spec.md` §4.3).
//!
//! Three phases, each grounded on the corresponding pass of the original
//! analyzer:
//! - [`resolve_conflict`] walks the trail backwards from a conflicting
//!   clause to the empty clause.
//! - [`build_used_graph`] BFS-explores everything that refutation actually
//!   reaches, detecting where a learned clause is reused (a tree-likeness
//!   violation rather than a regularity one: the same node appears on two
//!   root-to-leaf paths).
//! - [`add_unused`] optionally BFS-explores every learned clause the solver
//!   ever derived but that Phase 2 never reached, to report how much of the
//!   proof a particular conflict leaves unexplained.
use std::collections::HashSet;

use log::debug;
use petgraph::graph::{Graph, NodeIndex};
use rustc_hash::FxHashMap;

use rproof_formula::{ClauseIdx, Var};

use crate::error::{CheckerError, Cref};
use crate::shadow::SolverShadow;

/// One node of the built graph: which arena clause it stands for, and
/// whether Phase 2 (the used-subgraph BFS) reached it.
#[derive(Copy, Clone, Debug)]
pub struct VertexInfo {
    pub clause: ClauseIdx,
    pub used: bool,
}

/// Edge weight: the pivot variable resolved away at the edge's source node,
/// `None` for an axiom (no outgoing edges) — kept on the edge rather than
/// looked up again later so DOT emission doesn't need a second pass.
pub type EdgeLabel = Option<Var>;

/// Per-proof counts reported alongside the graph (`spec.md` §4.3/§6).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Statistics {
    pub used_axioms: u64,
    pub used_intermediate: u64,
    pub used_learned: u64,
    pub unused_axioms: u64,
    pub unused_intermediate: u64,
    pub unused_learned: u64,
    /// Times a BFS in the used subgraph reached an already-indexed learned
    /// clause through a second edge, rather than a fresh traversal.
    pub tree_edge_violations: u64,
    /// Distinct learned clauses that triggered at least one tree edge violation.
    pub tree_vertex_violations: u64,
    /// Sum, over every root-to-leaf path with at least one repeated pivot,
    /// of (uses - 1) for each repeated pivot on that path.
    pub regularity_edge_violations: u64,
    /// Root-to-leaf paths containing at least one repeated pivot.
    pub regularity_path_violations: u64,
    /// Widest clause (literal count) seen among the used-subgraph nodes
    /// (`spec.md` §4.3 phase 2 "the running maximum `width`").
    pub max_width: u64,
}

/// The resolution DAG of one conflict, plus its derived statistics.
pub struct GraphBuilder {
    graph: Graph<VertexInfo, EdgeLabel>,
    empty_clause: ClauseIdx,
    statistics: Statistics,
}

impl GraphBuilder {
    /// Resolves `conflict_cref` down to the empty clause and builds the
    /// graph of everything that refutation uses (phase 2), then seeds a BFS
    /// from every learned clause phase 2 never reached (phase 3). Phase 3
    /// always runs: the reported statistics (`spec.md` §6) include
    /// `unused_axioms`/`unused_intermediate`/`unused_learned` unconditionally,
    /// so they cannot depend on whether the caller later wants unused nodes
    /// in a DOT dump. Use [`remove_unused`](GraphBuilder::remove_unused) to
    /// drop the unused portion from the materialized graph before printing
    /// it — the effect of the CLI's `--include-unused` flag when it is
    /// *not* given.
    pub fn new(shadow: &mut SolverShadow, conflict_cref: Cref) -> Result<GraphBuilder, CheckerError> {
        debug!("phase 1: resolving conflict cref={} down to the empty clause", conflict_cref);
        let empty_clause = resolve_conflict(shadow, conflict_cref)?;

        let mut graph = Graph::new();
        let mut learned_clause_index: FxHashMap<ClauseIdx, NodeIndex> = FxHashMap::default();
        let mut violating_learned: HashSet<ClauseIdx> = HashSet::default();
        let mut statistics = Statistics::default();

        debug!("phase 2: building the used subgraph from {:?}", empty_clause);
        build_used_graph(
            shadow,
            empty_clause,
            &mut graph,
            &mut learned_clause_index,
            &mut violating_learned,
            &mut statistics,
        );
        statistics.tree_vertex_violations = violating_learned.len() as u64;

        debug!(
            "phase 3: seeding unused-learned BFS from first_learned_index={:?}",
            shadow.first_learned_index()
        );
        add_unused(shadow, &mut graph, &mut learned_clause_index, &mut statistics);

        debug!(
            "built graph: {} nodes, {} edges, {:?}",
            graph.node_count(),
            graph.edge_count(),
            statistics
        );

        Ok(GraphBuilder {
            graph,
            empty_clause,
            statistics,
        })
    }

    /// Discards nodes tagged `used = false` from the materialized graph
    /// (`spec.md` §4.3 `remove_unused`). Has no effect on `statistics()`,
    /// which already reflects the full used+unused counts computed at
    /// construction time.
    pub fn remove_unused(&mut self) {
        self.graph.retain_nodes(|g, n| g[n].used);
    }

    pub fn statistics(&self) -> Statistics {
        self.statistics
    }

    pub fn empty_clause(&self) -> ClauseIdx {
        self.empty_clause
    }

    pub fn graph(&self) -> &Graph<VertexInfo, EdgeLabel> {
        &self.graph
    }

    /// Independently recomputes the total regularity-violation count via a
    /// stack-based DFS over root-to-leaf paths, rather than reading the
    /// per-clause aggregate each [`Clause`](rproof_formula::Clause) already
    /// carries. The two are expected to always agree
    /// (`SPEC_FULL.md` §8 "regularity computation agreement"); callers use
    /// this as a cross-check, not as the primary source of the count.
    pub fn calculate_regularity_measures(
        &self,
        shadow: &SolverShadow,
    ) -> (u64, u64) {
        regularity_dfs(shadow, self.empty_clause)
    }
}

/// Phase 1: walks the trail backwards from `conflict_cref`'s clause,
/// resolving in the reason of whichever unresolved literal was assigned
/// latest, until nothing remains.
fn resolve_conflict(shadow: &mut SolverShadow, conflict_cref: Cref) -> Result<ClauseIdx, CheckerError> {
    let mut remaining = shadow.clause_by_cref(conflict_cref)?;

    while !shadow.clause(remaining).empty() {
        let literals = shadow.clause(remaining).literals().to_vec();
        let last = literals
            .iter()
            .copied()
            .max_by_key(|l| shadow.index_of(l.var()))
            .expect("loop guard ensures at least one literal remains");

        let trail_pos = shadow.index_of(last.var());
        if trail_pos < 0 {
            return Err(CheckerError::RefutationNotEmpty {
                cref: conflict_cref,
                remaining: format!("{}", shadow.clause(remaining)),
            });
        }

        let reason = shadow.trail()[trail_pos as usize]
            .reason
            .ok_or(CheckerError::RefutationNotEmpty {
                cref: conflict_cref,
                remaining: format!("{}", shadow.clause(remaining)),
            })?;

        remaining = shadow.resolve(remaining, reason)?;
    }

    Ok(remaining)
}

/// Phase 2: BFS from the empty clause over everything refutation reaches.
/// A learned clause seen a second time closes the BFS there instead of
/// re-descending into its parents — the same clause can legitimately
/// justify more than one conflict step, but re-exploring it wastes work and
/// would double-count its own subtree's statistics. Each such reuse is a
/// tree-likeness violation (`SPEC_FULL.md` §4.3).
fn build_used_graph(
    shadow: &SolverShadow,
    empty_clause: ClauseIdx,
    graph: &mut Graph<VertexInfo, EdgeLabel>,
    learned_clause_index: &mut FxHashMap<ClauseIdx, NodeIndex>,
    violating_learned: &mut HashSet<ClauseIdx>,
    statistics: &mut Statistics,
) {
    let mut queue = std::collections::VecDeque::new();
    let root = graph.add_node(VertexInfo {
        clause: empty_clause,
        used: true,
    });
    queue.push_back((empty_clause, root));

    while let Some((clause_idx, node)) = queue.pop_front() {
        let clause = shadow.clause(clause_idx);

        if clause.is_axiom() {
            statistics.used_axioms += 1;
        } else if clause.is_learned() {
            statistics.used_learned += 1;
        } else {
            statistics.used_intermediate += 1;
        }
        statistics.max_width = statistics.max_width.max(clause.width() as u64);

        if let Some((a, b)) = clause.parents() {
            let pivot = clause.pivot();
            for parent in [a, b] {
                let parent_clause = shadow.clause(parent);
                let reused = parent_clause.is_learned() && learned_clause_index.contains_key(&parent);

                let child_node = if reused {
                    statistics.tree_edge_violations += 1;
                    violating_learned.insert(parent);
                    learned_clause_index[&parent]
                } else {
                    let n = graph.add_node(VertexInfo {
                        clause: parent,
                        used: true,
                    });
                    if parent_clause.is_learned() {
                        learned_clause_index.insert(parent, n);
                    }
                    queue.push_back((parent, n));
                    n
                };

                graph.add_edge(node, child_node, pivot);
            }
        }
    }
}

/// Phase 3: BFS from every learned clause Phase 2 never reached, over the
/// rest of the proof the solver built (including clauses it has since
/// deleted, still reachable through the shadow's append-only arena). Unlike
/// Phase 2, reusing an already-explored learned clause here is expected —
/// the unused part of a proof can itself be non-tree-shaped — so it does
/// not add to `tree_edge_violations`.
fn add_unused(
    shadow: &SolverShadow,
    graph: &mut Graph<VertexInfo, EdgeLabel>,
    learned_clause_index: &mut FxHashMap<ClauseIdx, NodeIndex>,
    statistics: &mut Statistics,
) {
    let start = match shadow.first_learned_index() {
        Some(idx) => idx,
        None => return,
    };

    let mut queue = std::collections::VecDeque::new();
    for (idx, clause) in shadow.clauses_from(start) {
        if clause.is_learned() && !learned_clause_index.contains_key(&idx) {
            let n = graph.add_node(VertexInfo {
                clause: idx,
                used: false,
            });
            learned_clause_index.insert(idx, n);
            queue.push_back((idx, n));
        }
    }

    while let Some((clause_idx, node)) = queue.pop_front() {
        let clause = shadow.clause(clause_idx);

        if clause.is_axiom() {
            statistics.unused_axioms += 1;
        } else if clause.is_learned() {
            statistics.unused_learned += 1;
        } else {
            statistics.unused_intermediate += 1;
        }

        if let Some((a, b)) = clause.parents() {
            let pivot = clause.pivot();
            for parent in [a, b] {
                let parent_clause = shadow.clause(parent);
                let already_explored = parent_clause.is_learned() && learned_clause_index.contains_key(&parent);

                let child_node = if already_explored {
                    learned_clause_index[&parent]
                } else {
                    let n = graph.add_node(VertexInfo {
                        clause: parent,
                        used: false,
                    });
                    if parent_clause.is_learned() {
                        learned_clause_index.insert(parent, n);
                    }
                    queue.push_back((parent, n));
                    n
                };

                graph.add_edge(node, child_node, pivot);
            }
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum DfsStatus {
    Unhandled,
    UsedFirst,
    UsedBoth,
}

/// Stack-based DFS over root-to-leaf paths of the used subgraph, counting
/// regularity violations independently of the per-clause aggregates
/// (`SPEC_FULL.md` §4.3). Goes down the first parent as far as possible,
/// then the second, then on the way back up decrements the pivot's use
/// count — exactly the shape of a recursive depth-first walk, rewritten
/// with an explicit stack so it isn't bounded by the call stack on deep
/// proofs.
fn regularity_dfs(shadow: &SolverShadow, empty_clause: ClauseIdx) -> (u64, u64) {
    let mut edge_violations = 0u64;
    let mut path_violations = 0u64;
    let mut times_used: FxHashMap<Var, i64> = FxHashMap::default();

    let mut stack = vec![(empty_clause, DfsStatus::Unhandled)];

    while let Some((clause_idx, status)) = stack.pop() {
        let clause = shadow.clause(clause_idx);

        if clause.is_axiom() {
            let mut path_has_violation = false;
            for &count in times_used.values() {
                if count > 1 {
                    edge_violations += (count - 1) as u64;
                    path_has_violation = true;
                }
            }
            if path_has_violation {
                path_violations += 1;
            }
            continue;
        }

        match status {
            DfsStatus::Unhandled => {
                let pivot = clause.pivot().expect("non-axiom has a pivot");
                *times_used.entry(pivot).or_insert(0) += 1;
                let (first, _) = clause.parents().expect("non-axiom has parents");
                stack.push((clause_idx, DfsStatus::UsedFirst));
                stack.push((first, DfsStatus::Unhandled));
            }
            DfsStatus::UsedFirst => {
                let (_, second) = clause.parents().expect("non-axiom has parents");
                stack.push((clause_idx, DfsStatus::UsedBoth));
                stack.push((second, DfsStatus::Unhandled));
            }
            DfsStatus::UsedBoth => {
                let pivot = clause.pivot().expect("non-axiom has a pivot");
                *times_used.get_mut(&pivot).expect("pushed before popped") -= 1;
            }
        }
    }

    debug_assert!(
        times_used.values().all(|&count| count == 0),
        "every pivot increment must be matched by a decrement"
    );

    (edge_violations, path_violations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rproof_formula::{lits, Clause};

    use crate::shadow::IgnoreMode;

    /// Builds a small DAG where the same learned clause is a grandparent of
    /// the root through two different children. Phase 2 must stop
    /// re-descending into it the second time it is reached and record
    /// exactly one tree-edge/tree-vertex violation.
    #[test]
    fn reused_learned_clause_is_a_tree_violation() {
        let mut s = SolverShadow::new(IgnoreMode::None);
        s.grow_num_vars(10);

        let p1 = s.add_clause(Clause::axiom(&lits![9, 5]), 1);
        let p2 = s.add_clause(Clause::axiom(&lits![-9, 6]), 2);
        let shared_pre = s.resolve(p1, p2).unwrap(); // (5 6)
        let shared = s.add_clause(s.clause(shared_pre).mark_learned(), 3);

        let leaf_a = s.add_clause(Clause::axiom(&lits![-5, 7]), 4);
        let a = s.resolve(shared, leaf_a).unwrap(); // (6 7)

        let leaf_b = s.add_clause(Clause::axiom(&lits![-5, -7]), 5);
        let c = s.resolve(shared, leaf_b).unwrap(); // (6 ~7)

        let root = s.resolve(a, c).unwrap(); // (6)
        assert_eq!(s.clause(root).width(), 1);

        let mut graph = Graph::new();
        let mut learned_clause_index = FxHashMap::default();
        let mut violating_learned = std::collections::HashSet::default();
        let mut statistics = Statistics::default();

        build_used_graph(
            &s,
            root,
            &mut graph,
            &mut learned_clause_index,
            &mut violating_learned,
            &mut statistics,
        );
        statistics.tree_vertex_violations = violating_learned.len() as u64;

        assert_eq!(statistics.tree_edge_violations, 1);
        assert_eq!(statistics.tree_vertex_violations, 1);
        assert_eq!(statistics.used_learned, 1);
        assert_eq!(statistics.used_axioms, 4);
        assert_eq!(statistics.used_intermediate, 3);
        assert!(violating_learned.contains(&shared));
    }

    /// End-to-end Phase 1 + Phase 2 over a pure unit-propagation refutation
    /// (no decisions, so every trail item has a reason and resolution
    /// reaches the empty clause on its own).
    #[test]
    fn resolve_conflict_reaches_empty_clause_and_counts_used_nodes() {
        let mut s = SolverShadow::new(IgnoreMode::None);
        s.grow_num_vars(4);

        let unit_one = s.add_clause(Clause::axiom(&lits![1]), 1);
        s.propagate(rproof_formula::lit!(1), 1).unwrap();
        let _ = unit_one;

        let reason_two = s.add_clause(Clause::axiom(&lits![-1, 2]), 10);
        s.propagate(rproof_formula::lit!(2), 10).unwrap();
        let _ = reason_two;

        let reason_three = s.add_clause(Clause::axiom(&lits![-2, 3]), 11);
        s.propagate(rproof_formula::lit!(3), 11).unwrap();
        let _ = reason_three;

        let conflict_cref = 20;
        s.add_clause(Clause::axiom(&lits![-1, -3]), conflict_cref);

        let builder = GraphBuilder::new(&mut s, conflict_cref).unwrap();
        assert!(s.clause(builder.empty_clause()).empty());

        let stats = builder.statistics();
        assert_eq!(stats.used_axioms, 4);
        assert_eq!(stats.used_intermediate, 3);
        assert_eq!(stats.used_learned, 0);
        assert_eq!(stats.tree_edge_violations, 0);
        assert_eq!(stats.max_width, 2);

        let (edge_violations, path_violations) = builder.calculate_regularity_measures(&s);
        assert_eq!(edge_violations, 0);
        assert_eq!(path_violations, 0);
    }
}
