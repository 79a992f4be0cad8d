//! The JSON statistics line a `C` command emits when `--print-graph` is not
//! given (`spec.md` §6's field set, unchanged).
use serde::Serialize;

use rproof_core::{GraphBuilder, SolverShadow};

/// One line of statistics summarizing a conflict's resolution refutation.
///
/// `Phase 1` already leaves the totals for the whole subproof sitting on the
/// empty clause's aggregates (`copy_cost`, `regularity_violations`,
/// `reremoved_set`), so most of this is just reading those plus the
/// [`Statistics`](rproof_core::Statistics) the graph builder accumulated
/// during its BFS phases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub used_axioms: u64,
    pub unused_axioms: u64,
    pub used_intermediate: u64,
    pub unused_intermediate: u64,
    pub used_learned: u64,
    pub unused_learned: u64,
    pub tree_edge_violations: u64,
    pub tree_vertex_violations: u64,
    /// A decimal string rather than a JSON number: `copy_cost` is `u128` and
    /// can saturate at `u128::MAX`, which a JSON number cannot always carry
    /// without precision loss (`SPEC_FULL.md` §3/§6).
    pub tree_copy_cost: String,
    pub regularity_violations_total: u64,
    pub regularity_violation_variables: u64,
    pub max_width: u64,
}

impl Report {
    pub fn from_builder(builder: &GraphBuilder, shadow: &SolverShadow) -> Report {
        let stats = builder.statistics();
        let empty = shadow.clause(builder.empty_clause());

        Report {
            used_axioms: stats.used_axioms,
            unused_axioms: stats.unused_axioms,
            used_intermediate: stats.used_intermediate,
            unused_intermediate: stats.unused_intermediate,
            used_learned: stats.used_learned,
            unused_learned: stats.unused_learned,
            tree_edge_violations: stats.tree_edge_violations,
            tree_vertex_violations: stats.tree_vertex_violations,
            tree_copy_cost: empty.copy_cost().to_string(),
            regularity_violations_total: empty.regularity_violations(),
            regularity_violation_variables: empty.reremoved_set().count_ones() as u64,
            max_width: stats.max_width,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rproof_core::IgnoreMode;
    use rproof_formula::{lit, lits, Clause};

    #[test]
    fn report_reads_totals_off_the_empty_clause() {
        let mut s = SolverShadow::new(IgnoreMode::None);
        s.grow_num_vars(4);

        s.add_clause(Clause::axiom(&lits![1]), 1);
        s.propagate(lit!(1), 1).unwrap();
        s.add_clause(Clause::axiom(&lits![-1, 2]), 10);
        s.propagate(lit!(2), 10).unwrap();
        s.add_clause(Clause::axiom(&lits![-2, 3]), 11);
        s.propagate(lit!(3), 11).unwrap();

        let conflict_cref = 20;
        s.add_clause(Clause::axiom(&lits![-1, -3]), conflict_cref);

        let builder = GraphBuilder::new(&mut s, conflict_cref).unwrap();
        let report = Report::from_builder(&builder, &s);

        assert_eq!(report.used_axioms, 4);
        assert_eq!(report.used_intermediate, 3);
        assert_eq!(report.tree_copy_cost, "7");
        assert_eq!(report.regularity_violations_total, 0);
        assert_eq!(report.regularity_violation_variables, 0);
        assert_eq!(report.max_width, 2);

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"used_axioms\":4"));
        assert!(json.contains("\"tree_copy_cost\":\"7\""));
    }
}
