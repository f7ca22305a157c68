pub mod patch;

pub use patch::{apply_patch, ConfigPatch, KeyPath, PatchError, PatchOp};

use crate::privilege::FileOwner;
use crate::shared::fs_atomic::{
    atomic_write_file_with, ensure_dir, file_mode, WriteOptions, OWNER_ONLY_FILE_MODE,
};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("existing config {path} cannot be merged: {reason}; fix or move it aside, it was left unchanged")]
    MalformedExistingDocument { path: String, reason: String },
    #[error("invalid config patch for {path}: {reason}")]
    InvalidPatch { path: String, reason: String },
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write config {path}: {source}")]
    WriteFailure {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Merges desired settings into JSON documents owned by one user.
#[derive(Debug, Clone, Default)]
pub struct ConfigReconciler {
    owner: Option<FileOwner>,
}

impl ConfigReconciler {
    pub fn new(owner: Option<FileOwner>) -> Self {
        Self { owner }
    }

    /// Returns whether the document on disk changed.
    pub fn reconcile(&self, path: &Path, patch: &ConfigPatch) -> Result<bool, ReconcileError> {
        let shown = path.display().to_string();
        if let Some(owner) = &self.owner {
            owner
                .refuse_symlinks(path)
                .map_err(|source| ReconcileError::Read {
                    path: shown.clone(),
                    source,
                })?;
        }
        let original = read_document(path)?;
        if original.is_none() && patch.is_empty() {
            tracing::debug!(path = %shown, "nothing to write");
            return Ok(false);
        }

        let mut desired = original.clone().unwrap_or_default();
        apply_patch(&mut desired, patch).map_err(|err| match err {
            PatchError::Shape(reason) => ReconcileError::MalformedExistingDocument {
                path: shown.clone(),
                reason,
            },
            PatchError::Invalid(reason) => ReconcileError::InvalidPatch {
                path: shown.clone(),
                reason,
            },
        })?;

        if original.as_ref() == Some(&desired) {
            tracing::debug!(path = %shown, "config already up to date");
            return Ok(false);
        }

        let mut rendered = serde_json::to_vec_pretty(&Value::Object(desired)).map_err(|err| {
            ReconcileError::WriteFailure {
                path: shown.clone(),
                source: std::io::Error::other(err),
            }
        })?;
        rendered.push(b'\n');

        let write_failure = |source| ReconcileError::WriteFailure {
            path: shown.clone(),
            source,
        };
        let mode = if original.is_some() {
            file_mode(path).map_err(write_failure)?
        } else {
            OWNER_ONLY_FILE_MODE
        };
        if let Some(parent) = path.parent() {
            ensure_dir(parent, None, self.owner.as_ref()).map_err(write_failure)?;
        }
        atomic_write_file_with(
            path,
            &rendered,
            WriteOptions {
                mode: Some(mode),
                owner: self.owner.clone(),
            },
        )
        .map_err(write_failure)?;

        tracing::info!(path = %shown, "config updated");
        Ok(true)
    }
}

fn read_document(path: &Path) -> Result<Option<Map<String, Value>>, ReconcileError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) if err.kind() == std::io::ErrorKind::InvalidData => {
            return Err(ReconcileError::MalformedExistingDocument {
                path: path.display().to_string(),
                reason: "file is not valid UTF-8".to_string(),
            })
        }
        Err(source) => {
            return Err(ReconcileError::Read {
                path: path.display().to_string(),
                source,
            })
        }
    };

    let value: Value =
        serde_json::from_str(&raw).map_err(|err| ReconcileError::MalformedExistingDocument {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;
    match value {
        Value::Object(map) => Ok(Some(map)),
        other => Err(ReconcileError::MalformedExistingDocument {
            path: path.display().to_string(),
            reason: format!("top level is {} rather than an object", json_kind(&other)),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
