//! Process exit codes and machine-readable error output.

use serde::Serialize;

/// Exit codes for the `fili` binary.
///
/// - 0: Success
/// - 1: General error (bad arguments, storage failure, duplicate scan name)
/// - 2: No duplicates found (`dupes list`)
/// - 3: Partial success (items were skipped or failed along the way)
/// - 130: Interrupted by user (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    NoDuplicates = 2,
    PartialSuccess = 3,
    Interrupted = 130,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "FI000",
            Self::GeneralError => "FI001",
            Self::NoDuplicates => "FI002",
            Self::PartialSuccess => "FI003",
            Self::Interrupted => "FI130",
        }
    }
}

/// Structured error information for `--json-errors`.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "FI001")
    pub code: String,
    pub exit_code: i32,
    /// Human-readable message including the context chain
    pub message: String,
    pub interrupted: bool,
}

impl StructuredError {
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{err:#}"),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}
