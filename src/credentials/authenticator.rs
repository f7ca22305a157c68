use super::Secret;
use crate::privilege::{probe_as, run_as, ExecutionIdentity, Invocation, PrivilegeError};
use std::collections::BTreeMap;

/// The external tool that holds the active login.
pub trait Authenticator {
    /// The secret currently in use, or `None` when logged out.
    fn active_secret(&self, identity: &ExecutionIdentity)
        -> Result<Option<Secret>, PrivilegeError>;

    /// Logs in with `secret`. Implementations must not place the secret in
    /// arguments or environment variables.
    fn login(&self, identity: &ExecutionIdentity, secret: &Secret) -> Result<(), PrivilegeError>;
}

/// Drives an auth CLI: `status` prints the active token, `login` reads a
/// token from stdin.
#[derive(Debug, Clone)]
pub struct CommandAuthenticator {
    status: Vec<String>,
    login: Vec<String>,
    env: BTreeMap<String, String>,
}

impl CommandAuthenticator {
    pub fn new(status: Vec<String>, login: Vec<String>) -> Self {
        Self {
            status,
            login,
            env: BTreeMap::new(),
        }
    }

    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }
}

impl Authenticator for CommandAuthenticator {
    fn active_secret(
        &self,
        identity: &ExecutionIdentity,
    ) -> Result<Option<Secret>, PrivilegeError> {
        let invocation = Invocation::from_argv(&self.status)?.envs(&self.env);
        let output = probe_as(identity, &invocation)?;
        if !output.success {
            return Ok(None);
        }
        let token = Secret::new(output.stdout.trim());
        Ok((!token.is_blank()).then_some(token))
    }

    fn login(&self, identity: &ExecutionIdentity, secret: &Secret) -> Result<(), PrivilegeError> {
        let invocation = Invocation::from_argv(&self.login)?
            .envs(&self.env)
            .stdin_secret(secret.clone());
        run_as(identity, &invocation)?;
        Ok(())
    }
}
