//! Error types for mpvlink.

use std::fmt;
use std::os::raw::c_int;
use thiserror::Error;

/// Result type alias using mpvlink's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for mpvlink operations.
///
/// None of these are fatal to the host process: a missing library or a missing
/// symbol degrades to a no-op, and native call failures travel as a [`Status`]
/// inside the `Ok` variant rather than through this enum.
#[derive(Error, Debug)]
pub enum Error {
    /// The engine shared library could not be loaded.
    #[error("failed to load engine library: {0}")]
    LoadFailed(String),

    /// No engine library is loaded; the operation was skipped.
    #[error("engine library is not loaded")]
    EngineUnavailable,

    /// A required entry point was not resolved at load time.
    #[error("missing engine entry point: {0}")]
    MissingEntryPoint(&'static str),

    /// The engine returned a null session handle from create.
    #[error("engine returned a null session handle")]
    CreateFailed,

    /// The session was already destroyed (or never created).
    #[error("session has been destroyed")]
    SessionGone,

    /// Text with an interior zero byte cannot cross the boundary.
    #[error("string contains an interior zero byte: {0:?}")]
    Encoding(String),

    /// I/O error (log file side channel).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Raw status code returned by the engine.
///
/// The engine reports success as zero and failures as negative codes. The code
/// is propagated to the caller unchanged; this layer never retries and never
/// converts it into another representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status(pub c_int);

impl Status {
    /// The engine's success code.
    pub const SUCCESS: Status = Status(0);

    /// True if the engine reported success (non-negative code).
    pub fn is_ok(self) -> bool {
        self.0 >= 0
    }

    /// True if the engine reported a failure.
    pub fn is_err(self) -> bool {
        !self.is_ok()
    }

    /// The raw signed code, exactly as the engine returned it.
    pub fn code(self) -> c_int {
        self.0
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
