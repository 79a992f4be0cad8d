//! CLI-boundary error taxonomy (`spec.md` §7's `CliError`).
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    /// `--ignore-mode` given something outside `0..=2`
    /// (`spec.md` §7 `CliError::BadIgnoreMode`).
    #[error("--ignore-mode must be 0, 1 or 2, got '{raw}'")]
    BadIgnoreMode { raw: String },
}
