//! Error taxonomy for the shadow and graph builder.
//!
//! Every variant here is a fatal contract violation of the trace
//! (`spec.md` §7): a sound trace never triggers one of these, and there is
//! no recovery path — the dispatcher reports the error and stops.
use rproof_formula::{ResolutionError, Var};

/// External clause reference, as chosen by the solver (`spec.md` §3/§6).
pub type Cref = i64;

#[derive(Debug, thiserror::Error)]
pub enum CheckerError {
    /// Two clauses asked to resolve do not share exactly one
    /// opposite-polarity variable.
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// A `cref` arrives that was never registered, or was removed without a
    /// matching relocation (`spec.md` §7 `TraceError::UnknownCref`).
    #[error("reference to unknown or removed clause cref {cref}")]
    UnknownCref { cref: Cref },

    /// `PU`, a level-0 propagation, or a skip asks for the learned unit of a
    /// variable that has none (`spec.md` §7 `TraceError::UnknownUnit`).
    #[error("no learned unit clause registered for variable {var:?}")]
    UnknownUnit { var: Var },

    /// A `to_remove` literal passed to `minimize`/`minimize_full` has no
    /// reason on the trail, i.e. it was decided rather than propagated.
    #[error("variable {var:?} has no reason clause on the trail; it cannot be minimized away")]
    NoReasonOnTrail { var: Var },

    /// `L`/`LU` finalization found the running clause did not match the
    /// declared literals. Only reported in `IgnoreMode::None`, where the
    /// trace never has a legitimate reason for such a mismatch
    /// (`spec.md` §7 `TraceError::LearnedMismatch`); the skip-enabled modes
    /// tolerate a mismatch since the learned clause may legitimately be
    /// smaller than what a naive reading of the trace would expect.
    #[error("finalized learned clause {computed} does not match declared literals {declared}")]
    LearnedMismatch { computed: String, declared: String },

    /// Phase 1 conflict resolution failed to terminate in the empty clause
    /// (`spec.md` §4.3: "Phase 1 MUST terminate with the empty clause;
    /// otherwise the trace is unsound — fatal").
    #[error("conflict resolution for cref {cref} produced a non-empty clause: {remaining}")]
    RefutationNotEmpty { cref: Cref, remaining: String },
}
