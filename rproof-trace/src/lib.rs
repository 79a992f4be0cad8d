//! Line-oriented trace protocol parser and dispatcher (`spec.md` §6).
//!
//! This is the "external collaborator" `spec.md` §1 scopes out of the core
//! (a thin tokenizer and command dispatcher); it is implemented here since a
//! complete, buildable crate needs a concrete front end driving
//! [`rproof_core::SolverShadow`] and [`rproof_core::GraphBuilder`]
//! (`SPEC_FULL.md` §2).
pub mod dispatcher;
pub mod report;
pub mod token;

pub use dispatcher::{Dispatcher, DispatcherError, Outcome, RunResult};
pub use report::Report;
pub use token::{parse_literal, ParseError, Tokens};
