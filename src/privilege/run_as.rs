use super::{ExecutionIdentity, PrivilegeError};
use crate::credentials::Secret;
use std::collections::BTreeMap;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Command, Stdio};

const PRIVILEGED_SEARCH_PATH: &str = "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin";

/// A structured external command: program, argument array, explicit
/// environment additions and an optional secret fed through stdin.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub stdin: Option<Secret>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn from_argv<S: AsRef<str>>(argv: &[S]) -> Result<Self, PrivilegeError> {
        let (program, rest) = argv.split_first().ok_or(PrivilegeError::EmptyCommand)?;
        let program = program.as_ref().trim();
        if program.is_empty() {
            return Err(PrivilegeError::EmptyCommand);
        }
        Ok(Self::new(program).args(rest.iter().map(|arg| arg.as_ref().to_string())))
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn envs(mut self, vars: &BTreeMap<String, String>) -> Self {
        for (key, value) in vars {
            self.env.insert(key.clone(), value.clone());
        }
        self
    }

    pub fn stdin_secret(mut self, secret: Secret) -> Self {
        self.stdin = Some(secret);
        self
    }

    pub fn command_form(&self) -> String {
        if self.args.is_empty() {
            return self.program.clone();
        }
        format!("{} {}", self.program, self.args.join(" "))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Runs `invocation` as the target user and fails on a non-zero exit.
pub fn run_as(
    identity: &ExecutionIdentity,
    invocation: &Invocation,
) -> Result<CommandOutput, PrivilegeError> {
    checked(invocation, probe_as(identity, invocation)?)
}

/// Runs `invocation` as the target user and returns the output whatever the
/// exit status. Only a missing binary or spawn failure is an error.
pub fn probe_as(
    identity: &ExecutionIdentity,
    invocation: &Invocation,
) -> Result<CommandOutput, PrivilegeError> {
    let mut command = Command::new(&invocation.program);
    command
        .args(&invocation.args)
        .env_clear()
        .env("HOME", &identity.target_home)
        .env("USER", &identity.target_user)
        .env("LOGNAME", &identity.target_user)
        .env("PATH", identity.search_path()?)
        .current_dir(&identity.target_home);
    #[cfg(unix)]
    if identity.is_privileged {
        command.uid(identity.uid).gid(identity.gid);
    }
    execute(command, invocation)
}

/// Runs a system-scope command as the elevated caller itself, still with a
/// minimal environment.
pub fn run_privileged(
    identity: &ExecutionIdentity,
    invocation: &Invocation,
) -> Result<CommandOutput, PrivilegeError> {
    if !identity.is_privileged {
        return Err(PrivilegeError::NotPrivileged {
            program: invocation.program.clone(),
        });
    }
    let mut command = Command::new(&invocation.program);
    command
        .args(&invocation.args)
        .env_clear()
        .env("HOME", "/root")
        .env("PATH", PRIVILEGED_SEARCH_PATH)
        .current_dir(Path::new("/"));
    let output = execute(command, invocation)?;
    checked(invocation, output)
}

fn execute(mut command: Command, invocation: &Invocation) -> Result<CommandOutput, PrivilegeError> {
    command
        .envs(&invocation.env)
        .stdin(if invocation.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(PrivilegeError::MissingBinary {
                program: invocation.program.clone(),
            })
        }
        Err(source) => {
            return Err(PrivilegeError::Io {
                program: invocation.program.clone(),
                source,
            })
        }
    };

    if let Some(secret) = &invocation.stdin {
        let io_error = |source| PrivilegeError::Io {
            program: invocation.program.clone(),
            source,
        };
        let mut pipe = child
            .stdin
            .take()
            .ok_or_else(|| io_error(std::io::Error::other("missing stdin pipe")))?;
        let written = pipe
            .write_all(secret.expose().as_bytes())
            .and_then(|()| pipe.write_all(b"\n"));
        drop(pipe);
        if let Err(source) = written {
            let _ = child.kill();
            let _ = child.wait();
            return Err(io_error(source));
        }
    }

    let output = child
        .wait_with_output()
        .map_err(|source| PrivilegeError::Io {
            program: invocation.program.clone(),
            source,
        })?;

    Ok(CommandOutput {
        exit_code: output.status.code(),
        success: output.status.success(),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

fn checked(invocation: &Invocation, output: CommandOutput) -> Result<CommandOutput, PrivilegeError> {
    if output.success {
        return Ok(output);
    }
    Err(PrivilegeError::CommandFailed {
        program: invocation.program.clone(),
        exit_code: output.exit_code,
        stderr: output.stderr.trim().to_string(),
    })
}
