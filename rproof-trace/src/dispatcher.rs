//! Drives a [`SolverShadow`] from a stream of trace lines (`spec.md` §6).
//!
//! One [`Dispatcher::run`] call consumes a trace to its first `C` command,
//! builds the resolution graph for that conflict, and stops — trailing
//! lines are never read, matching the original analyzer's single-conflict
//! run (`original_source/main.cpp`'s `C` handler `break`s out of the read
//! loop).
use std::io::BufRead;

use rproof_core::{CheckerError, Cref, GraphBuilder, IgnoreMode, SolverShadow};
use rproof_formula::{Clause, ClauseIdx, Lit};

use crate::report::Report;
use crate::token::{ParseError, Tokens};

/// Everything that can go wrong driving a trace to completion.
#[derive(Debug, thiserror::Error)]
pub enum DispatcherError {
    #[error("line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: ParseError,
    },
    #[error("line {line}: {source}")]
    Checker {
        line: usize,
        #[source]
        source: CheckerError,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A single command's failure before the line number is known to `run`.
#[derive(Debug)]
enum LineError {
    Parse(ParseError),
    Checker(CheckerError),
}

impl From<ParseError> for LineError {
    fn from(e: ParseError) -> LineError {
        LineError::Parse(e)
    }
}

impl From<CheckerError> for LineError {
    fn from(e: CheckerError) -> LineError {
        LineError::Checker(e)
    }
}

/// What the final `C` command produced.
pub enum Outcome {
    /// `--print-graph` was requested: the built graph, ready for DOT
    /// emission by the caller.
    Graph(GraphBuilder),
    /// The default: one statistics line.
    Statistics(Report),
}

/// Result of driving a trace to its `C` command, or to end of input if the
/// trace never has one.
pub struct RunResult {
    pub shadow: SolverShadow,
    pub outcome: Option<Outcome>,
}

/// Accumulated state of an in-progress `U`/`S`/.../`L`|`LU` conflict block.
struct ConflictBlock {
    running: Option<ClauseIdx>,
}

pub struct Dispatcher {
    shadow: SolverShadow,
    mode: IgnoreMode,
    print_graph: bool,
    include_unused: bool,
    conflict: Option<ConflictBlock>,
    /// A `U cref` not yet folded into the running conflict clause, together
    /// with every skip literal an `S` has contributed since it was read.
    /// Folding is deferred until the next command that is not itself an `S`,
    /// at which point the accumulated skip list (possibly empty) replaces
    /// the plain clause (`original_source/main.cpp:120-182`).
    pending: Option<(Cref, Vec<Lit>)>,
    relocating: Option<Vec<(Cref, Cref)>>,
}

impl Dispatcher {
    pub fn new(mode: IgnoreMode, print_graph: bool, include_unused: bool) -> Dispatcher {
        Dispatcher {
            shadow: SolverShadow::new(mode),
            mode,
            print_graph,
            include_unused,
            conflict: None,
            pending: None,
            relocating: None,
        }
    }

    /// Reads `reader` line by line, applying each trace command, until a `C`
    /// command is handled or input is exhausted.
    pub fn run<R: BufRead>(mut self, reader: R) -> Result<RunResult, DispatcherError> {
        for (line_number, line) in reader.lines().enumerate() {
            let line = line?;
            let line_number = line_number + 1;
            match self.dispatch_line(&line) {
                Ok(None) => continue,
                Ok(Some(outcome)) => {
                    return Ok(RunResult {
                        shadow: self.shadow,
                        outcome: Some(outcome),
                    })
                }
                Err(LineError::Parse(source)) => {
                    return Err(DispatcherError::Parse { line: line_number, source })
                }
                Err(LineError::Checker(source)) => {
                    return Err(DispatcherError::Checker { line: line_number, source })
                }
            }
        }

        Ok(RunResult {
            shadow: self.shadow,
            outcome: None,
        })
    }

    /// Dispatches one line. Returns `Some(outcome)` only for the `C`
    /// command, which ends the run.
    fn dispatch_line(&mut self, line: &str) -> Result<Option<Outcome>, LineError> {
        let mut tokens = Tokens::new(line);
        let command = match tokens.command() {
            Some(c) => c,
            None => return Ok(None), // blank line
        };

        match command {
            "NV" => {
                let n = tokens.count("variable count")?;
                self.shadow.grow_num_vars(n);
            }
            "I" => {
                let cref = tokens.integer("cref")?;
                let k = tokens.count("literal count")?;
                let literals = tokens.literals(k)?;
                self.shadow.add_clause(Clause::axiom(&literals), cref);
            }
            "D" => {
                let l = tokens.literal()?;
                self.shadow.decide(l);
            }
            "P" => {
                let l = tokens.literal()?;
                let cref = tokens.integer("cref")?;
                self.shadow.propagate(l, cref)?;
            }
            "PU" => {
                let l = tokens.literal()?;
                self.shadow.propagate_via_unit(l)?;
            }
            "U" => {
                let cref = tokens.integer("cref")?;
                self.flush_pending()?;
                self.pending = Some((cref, Vec::new()));
            }
            "S" => {
                let k = tokens.count("skip count")?;
                let literals = tokens.literals(k)?;
                let (_, skip) = self
                    .pending
                    .as_mut()
                    .ok_or(ParseError::UnexpectedEof { expected: "preceding U" })?;
                skip.extend(literals);
            }
            "MNM" => {
                self.flush_pending()?;
                let k = tokens.count("removed count")?;
                let literals = tokens.literals(k)?;
                self.minimize_in_conflict(literals, false)?;
            }
            "MNM2" => {
                self.flush_pending()?;
                let k = tokens.count("removed count")?;
                let literals = tokens.literals(k)?;
                self.minimize_in_conflict(literals, true)?;
            }
            "LU" => {
                self.flush_pending()?;
                let expected = tokens.literal()?;
                self.finalize_unit(expected)?;
            }
            "L" => {
                self.flush_pending()?;
                let cref = tokens.integer("cref")?;
                let k = tokens.count("literal count")?;
                let literals = tokens.literals(k)?;
                self.finalize_learned(cref, literals)?;
            }
            "B" => {
                let level = tokens.count("level")?;
                self.shadow.backtrack(level as u32);
            }
            "RS" => {
                self.shadow.restart();
            }
            "R" => {
                let cref = tokens.integer("cref")?;
                self.shadow.remove_clause(cref)?;
            }
            "M" => {
                let from = tokens.integer("from cref")?;
                let to = tokens.integer("to cref")?;
                self.relocating.get_or_insert_with(Vec::new).push((from, to));
            }
            "RD" => {
                if let Some(moves) = self.relocating.take() {
                    self.shadow.relocate(&moves);
                }
            }
            "C" => {
                let cref = tokens.integer("cref")?;
                return Ok(Some(self.build_graph(cref)?));
            }
            other => {
                return Err(ParseError::UnknownCommand {
                    command: other.to_string(),
                }
                .into())
            }
        }

        Ok(None)
    }

    /// Folds a pending `U`'s clause into the running conflict clause, as
    /// `skip(cref, skip_literals)` — an empty `skip_literals` (no `S` ever
    /// followed the `U`) makes this the plain clause at `cref`, since
    /// `skip` with nothing to skip returns the clause unchanged.
    fn flush_pending(&mut self) -> Result<(), CheckerError> {
        let (cref, skip) = match self.pending.take() {
            Some(p) => p,
            None => return Ok(()),
        };
        let clause = self.shadow.skip(cref, skip)?;
        let block = self.conflict.get_or_insert(ConflictBlock { running: None });
        block.running = Some(match block.running {
            None => clause,
            Some(running) => self.shadow.resolve(running, clause)?,
        });
        Ok(())
    }

    fn minimize_in_conflict(&mut self, literals: Vec<Lit>, full: bool) -> Result<(), LineError> {
        let running = self
            .conflict
            .as_ref()
            .and_then(|b| b.running)
            .ok_or(ParseError::UnexpectedEof { expected: "U block" })?;
        let new_running = if full {
            self.shadow.minimize_full(running, literals)
        } else {
            self.shadow.minimize(running, literals)
        }?;
        self.conflict.as_mut().unwrap().running = Some(new_running);
        Ok(())
    }

    fn finalize_unit(&mut self, expected: Lit) -> Result<(), LineError> {
        let block = self
            .conflict
            .take()
            .ok_or(ParseError::UnexpectedEof { expected: "U block" })?;
        let running = block
            .running
            .ok_or(ParseError::UnexpectedEof { expected: "U block" })?;

        if self.mode == IgnoreMode::None {
            let clause = self.shadow.clause(running);
            if !clause.unit() || clause.first_literal() != expected {
                return Err(CheckerError::LearnedMismatch {
                    computed: clause.to_string(),
                    declared: expected.to_string(),
                }
                .into());
            }
        }

        let learned = self.shadow.clause(running).mark_learned();
        self.shadow.add_unit_as(learned, expected);
        Ok(())
    }

    fn finalize_learned(&mut self, cref: Cref, literals: Vec<Lit>) -> Result<(), LineError> {
        let block = self
            .conflict
            .take()
            .ok_or(ParseError::UnexpectedEof { expected: "U block" })?;
        let running = block
            .running
            .ok_or(ParseError::UnexpectedEof { expected: "U block" })?;

        if self.mode == IgnoreMode::None {
            let mut actual: Vec<_> = self.shadow.clause(running).literals().to_vec();
            actual.sort_by_key(|l| l.index());
            let mut declared = literals.clone();
            declared.sort_by_key(|l| l.index());
            if actual != declared {
                return Err(CheckerError::LearnedMismatch {
                    computed: self.shadow.clause(running).to_string(),
                    declared: format_literals(&literals),
                }
                .into());
            }
        }

        let learned = self.shadow.clause(running).mark_learned();
        self.shadow.add_clause(learned, cref);
        Ok(())
    }

    fn build_graph(&mut self, cref: Cref) -> Result<Outcome, LineError> {
        let mut builder = GraphBuilder::new(&mut self.shadow, cref)?;

        if self.print_graph {
            if !self.include_unused {
                builder.remove_unused();
            }
            Ok(Outcome::Graph(builder))
        } else {
            let report = Report::from_builder(&builder, &self.shadow);
            Ok(Outcome::Statistics(report))
        }
    }
}

fn format_literals(literals: &[Lit]) -> String {
    literals.iter().map(|l| l.to_string()).collect::<Vec<_>>().join(" ")
}
