pub mod interrupt;
pub mod plan;
pub mod runner;

pub use plan::{build_plan, PlanInputs};
pub use runner::{RunError, RunProgress, RunSummary, StepReport, StepRunner};

use crate::credentials::CredentialError;
use crate::privilege::{ExecutionIdentity, PrivilegeError};
use crate::profile::ProfileError;
use crate::reconcile::ReconcileError;
use crate::shared::ids::StepName;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepScope {
    /// Machine-wide work that needs elevated privileges.
    System,
    /// Work performed for, and as, the target user.
    User,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Changed,
    Unchanged,
    Skipped(String),
}

impl StepOutcome {
    pub fn from_changed(changed: bool) -> Self {
        if changed {
            Self::Changed
        } else {
            Self::Unchanged
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Changed => "changed",
            Self::Unchanged => "unchanged",
            Self::Skipped(_) => "skipped",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error(transparent)]
    Privilege(#[from] PrivilegeError),
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error("{0}")]
    Message(String),
    #[error("panicked: {0}")]
    Panicked(String),
}

pub type StepAction = Box<dyn Fn(&ExecutionIdentity) -> Result<StepOutcome, StepError>>;

/// One registered unit of provisioning work. Never mutated after
/// registration.
pub struct Step {
    pub ordinal: usize,
    pub name: StepName,
    pub description: String,
    pub scope: StepScope,
    action: StepAction,
}

impl Step {
    pub(crate) fn new(
        ordinal: usize,
        name: StepName,
        description: String,
        scope: StepScope,
        action: StepAction,
    ) -> Self {
        Self {
            ordinal,
            name,
            description,
            scope,
            action,
        }
    }

    pub(crate) fn execute(&self, identity: &ExecutionIdentity) -> Result<StepOutcome, StepError> {
        (self.action)(identity)
    }
}

impl std::fmt::Debug for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Step")
            .field("ordinal", &self.ordinal)
            .field("name", &self.name)
            .field("description", &self.description)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}
