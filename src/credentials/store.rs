use super::{Authenticator, CredentialError, Secret};
use crate::privilege::{ExecutionIdentity, FileOwner};
use crate::shared::fs_atomic::{
    create_file_if_absent, ensure_dir, WriteOptions, OWNER_ONLY_DIR_MODE, OWNER_ONLY_FILE_MODE,
};
use std::fs;
use std::path::{Path, PathBuf};

pub const PRIMARY_SLOT: u32 = 1;
pub const SLOT_FILE_PREFIX: &str = "slot-";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub slot: u32,
    pub storage_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    Created,
    AlreadyPresent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationOutcome {
    Activated,
    AlreadyActive,
}

/// Credential slots for one user: slot 1 comes from the environment, slots
/// 2 and up live in `slot-<n>` files readable only by their owner.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    dir: PathBuf,
    primary: Option<Secret>,
    owner: Option<FileOwner>,
}

impl CredentialStore {
    pub fn new(dir: impl Into<PathBuf>, primary: Option<Secret>, owner: Option<FileOwner>) -> Self {
        Self {
            dir: dir.into(),
            primary: primary.filter(|secret| !secret.is_blank()),
            owner,
        }
    }

    pub fn for_identity(
        identity: &ExecutionIdentity,
        credential_dir: &Path,
        primary: Option<Secret>,
    ) -> Self {
        Self::new(
            identity.home_path(credential_dir),
            primary,
            identity.file_owner(),
        )
    }

    pub fn storage_path(&self, slot: u32) -> PathBuf {
        self.dir.join(format!("{SLOT_FILE_PREFIX}{slot}"))
    }

    pub fn record(&self, slot: u32) -> CredentialRecord {
        CredentialRecord {
            slot,
            storage_path: (slot > PRIMARY_SLOT).then(|| self.storage_path(slot)),
        }
    }

    pub fn store_secondary(&self, slot: u32, secret: &Secret) -> Result<StoreOutcome, CredentialError> {
        if slot <= PRIMARY_SLOT {
            return Err(CredentialError::InvalidSlot { slot });
        }
        let path = self.storage_path(slot);
        if secret.is_blank() {
            return Err(CredentialError::EmptyCredential {
                path: path.display().to_string(),
            });
        }

        ensure_dir(&self.dir, Some(OWNER_ONLY_DIR_MODE), self.owner.as_ref()).map_err(|source| {
            CredentialError::WriteFailure {
                path: self.dir.display().to_string(),
                source,
            }
        })?;

        let options = WriteOptions {
            mode: Some(OWNER_ONLY_FILE_MODE),
            owner: self.owner.clone(),
        };
        let created = create_file_if_absent(&path, secret.expose().as_bytes(), options).map_err(
            |source| CredentialError::WriteFailure {
                path: path.display().to_string(),
                source,
            },
        )?;

        if created {
            tracing::info!(slot, path = %path.display(), "stored secondary credential");
            Ok(StoreOutcome::Created)
        } else {
            tracing::debug!(slot, "secondary credential already stored");
            Ok(StoreOutcome::AlreadyPresent)
        }
    }

    pub fn list_slots(&self) -> Result<Vec<u32>, CredentialError> {
        let mut slots = vec![PRIMARY_SLOT];
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(slots),
            Err(source) => {
                return Err(CredentialError::Read {
                    path: self.dir.display().to_string(),
                    source,
                })
            }
        };

        let mut secondary = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| CredentialError::Read {
                path: self.dir.display().to_string(),
                source,
            })?;
            if !entry.path().is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(slot) = name
                .to_str()
                .and_then(|name| name.strip_prefix(SLOT_FILE_PREFIX))
                .and_then(|raw| raw.parse::<u32>().ok())
            else {
                continue;
            };
            if slot > PRIMARY_SLOT {
                secondary.push(slot);
            }
        }
        secondary.sort_unstable();
        secondary.dedup();
        slots.extend(secondary);
        Ok(slots)
    }

    pub fn resolve(&self, slot: u32) -> Result<Secret, CredentialError> {
        if slot == PRIMARY_SLOT {
            return self
                .primary
                .clone()
                .ok_or(CredentialError::CredentialNotFound { slot, path: None });
        }
        if slot == 0 {
            return Err(CredentialError::InvalidSlot { slot });
        }

        let path = self.storage_path(slot);
        if let Some(owner) = &self.owner {
            owner
                .refuse_symlinks(&path)
                .map_err(|source| CredentialError::Read {
                    path: path.display().to_string(),
                    source,
                })?;
        }
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(CredentialError::CredentialNotFound {
                    slot,
                    path: Some(path.display().to_string()),
                })
            }
            Err(source) => {
                return Err(CredentialError::Read {
                    path: path.display().to_string(),
                    source,
                })
            }
        };
        let secret = Secret::new(raw.trim());
        if secret.is_blank() {
            return Err(CredentialError::EmptyCredential {
                path: path.display().to_string(),
            });
        }
        Ok(secret)
    }

    pub fn activate(
        &self,
        slot: u32,
        authenticator: &dyn Authenticator,
        identity: &ExecutionIdentity,
    ) -> Result<ActivationOutcome, CredentialError> {
        let secret = self.resolve(slot)?;
        let active = authenticator
            .active_secret(identity)
            .map_err(|source| CredentialError::Auth { slot, source })?;
        if active.as_ref() == Some(&secret) {
            tracing::info!(slot, "credential already active");
            return Ok(ActivationOutcome::AlreadyActive);
        }

        authenticator
            .login(identity, &secret)
            .map_err(|source| CredentialError::Auth { slot, source })?;
        tracing::info!(slot, "activated credential");
        Ok(ActivationOutcome::Activated)
    }
}
