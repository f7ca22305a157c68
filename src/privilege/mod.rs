pub mod identity;
pub mod run_as;

pub use crate::shared::fs_atomic::FileOwner;
pub use identity::{
    resolve, ExecutionIdentity, PrivilegeProbe, SystemUserDirectory, UserDirectory, UserRecord,
    INVOKING_USER_ENV,
};
pub use run_as::{probe_as, run_as, run_privileged, CommandOutput, Invocation};

#[derive(Debug, thiserror::Error)]
pub enum PrivilegeError {
    #[error("running with elevated privileges but the target user is ambiguous: {reason}")]
    AmbiguousPrivilege { reason: String },
    #[error("failed to look up user `{user}`: {reason}")]
    UserLookup { user: String, reason: String },
    #[error("no user record for uid {uid}")]
    UnknownUid { uid: u32 },
    #[error("invalid search path entry `{entry}`: {reason}")]
    InvalidSearchPath { entry: String, reason: String },
    #[error("`{program}` requires elevated privileges")]
    NotPrivileged { program: String },
    #[error("command is empty")]
    EmptyCommand,
    #[error("`{program}` is not available on the search path")]
    MissingBinary { program: String },
    #[error("`{program}` exited with {}: {stderr}", render_exit_code(.exit_code))]
    CommandFailed {
        program: String,
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("failed to run `{program}`: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

fn render_exit_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "no exit code (terminated by signal)".to_string(),
    }
}
