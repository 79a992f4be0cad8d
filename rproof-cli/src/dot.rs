//! DOT (Graphviz) emission for a materialized resolution graph
//! (`spec.md` §4.3 `print_graphviz`).
//!
//! Lives in the CLI binary rather than in `rproof-core` so the core crate
//! never needs a DOT-writing dependency: `rproof-core` exposes the visited
//! node/edge data (clause reference, used flag, pivot-labeled edges) and
//! this module is the only thing that turns it into text
//! (`SPEC_FULL.md` §4.3).
use std::io::{self, Write};

use petgraph::visit::{EdgeRef, IntoEdgeReferences};

use rproof_core::{GraphBuilder, SolverShadow};
use rproof_formula::ClauseKind;

/// Writes `builder`'s materialized graph as a DOT digraph to `out`.
///
/// Axioms are filled boxes, learned clauses a distinct fill color,
/// intermediates plain ellipses; nodes the used-subgraph BFS never reached
/// (`spec.md` §4.3's "unused") are drawn smaller. Edges are labeled with the
/// pivot variable resolved away at their source node.
pub fn write_graphviz<W: Write>(out: &mut W, builder: &GraphBuilder, shadow: &SolverShadow) -> io::Result<()> {
    let graph = builder.graph();

    writeln!(out, "digraph resolution {{")?;
    writeln!(out, "  rankdir=BT;")?;

    for node in graph.node_indices() {
        let info = &graph[node];
        let clause = shadow.clause(info.clause);

        let (shape, fillcolor) = match clause.kind() {
            ClauseKind::Axiom => ("box", "lightgrey"),
            ClauseKind::Learned => ("ellipse", "lightblue"),
            ClauseKind::Intermediate => ("ellipse", "white"),
        };
        let fontsize = if info.used { 14 } else { 9 };

        writeln!(
            out,
            "  n{} [label=\"{}\", shape={}, style=filled, fillcolor={}, fontsize={}];",
            node.index(),
            escape(&clause.to_string()),
            shape,
            fillcolor,
            fontsize,
        )?;
    }

    for edge in graph.edge_references() {
        let label = match edge.weight() {
            Some(var) => var.to_string(),
            None => String::new(),
        };
        writeln!(
            out,
            "  n{} -> n{} [label=\"{}\"];",
            edge.source().index(),
            edge.target().index(),
            label
        )?;
    }

    writeln!(out, "}}")?;
    Ok(())
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rproof_core::IgnoreMode;
    use rproof_core::SolverShadow as Shadow;
    use rproof_formula::{lit, lits, Clause};

    #[test]
    fn emits_one_node_line_per_graph_vertex() {
        let mut s = Shadow::new(IgnoreMode::None);
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
        let mut buf = Vec::new();
        write_graphviz(&mut buf, &builder, &s).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(text.starts_with("digraph resolution {"));
        assert!(text.trim_end().ends_with('}'));
        assert_eq!(
            text.matches("shape=box").count() + text.matches("shape=ellipse").count(),
            builder.graph().node_count()
        );
    }
}
