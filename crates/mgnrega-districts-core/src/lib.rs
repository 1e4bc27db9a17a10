#![forbid(unsafe_code)]

mod identity;
mod record;

pub const CRATE_NAME: &str = "mgnrega-districts-core";

pub use identity::{derived_id, effective_id, ALL_PLACEHOLDER_ID};
pub use record::Record;

/// Process exit codes shared by the CLI entry points.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    Failure = 1,
}

impl ExitCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        Self::from(code as u8)
    }
}
