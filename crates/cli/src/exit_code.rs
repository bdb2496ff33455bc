//! Process exit codes
//!
//! The tool is meant for cron and scripts, so the contract is kept small:
//! zero when every binding synced cleanly, one otherwise.

/// Exit status of an ssbc run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Every binding synced without errors
    Success = 0,

    /// Config missing or invalid, or at least one sync failure
    GeneralError = 1,
}

impl ExitCode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code.as_u8())
    }
}
