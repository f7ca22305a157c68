use crate::privilege::FileOwner;
use crate::shared::fs_atomic::{atomic_write_file_with, ensure_dir, file_mode, WriteOptions};
use std::fs;
use std::path::Path;

const DEFAULT_PROFILE_MODE: u32 = 0o644;

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("profile block marker must be a single non-empty line")]
    InvalidMarker,
    #[error("failed to read profile {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write profile {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub fn block_start(marker: &str) -> String {
    format!("# >>> {marker} >>>")
}

pub fn block_end(marker: &str) -> String {
    format!("# <<< {marker} <<<")
}

pub fn render_block(marker: &str, content: &str) -> String {
    format!(
        "{}\n{}\n{}\n",
        block_start(marker),
        content.trim_end_matches('\n'),
        block_end(marker)
    )
}

/// Appends the marked block once. Returns `false` when the marker is already
/// present; an existing block is never rewritten.
pub fn ensure_profile_block(
    path: &Path,
    marker: &str,
    content: &str,
    owner: Option<&FileOwner>,
) -> Result<bool, ProfileError> {
    let marker = marker.trim();
    if marker.is_empty() || marker.contains('\n') {
        return Err(ProfileError::InvalidMarker);
    }
    let shown = path.display().to_string();
    if let Some(owner) = owner {
        owner.refuse_symlinks(path).map_err(|source| ProfileError::Read {
            path: shown.clone(),
            source,
        })?;
    }

    let existing = match fs::read_to_string(path) {
        Ok(raw) => Some(raw),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
        Err(source) => {
            return Err(ProfileError::Read {
                path: shown,
                source,
            })
        }
    };

    let start = block_start(marker);
    if let Some(raw) = &existing {
        if raw.lines().any(|line| line.trim_end() == start) {
            return Ok(false);
        }
    }

    let mut updated = existing.clone().unwrap_or_default();
    if !updated.is_empty() {
        if !updated.ends_with('\n') {
            updated.push('\n');
        }
        updated.push('\n');
    }
    updated.push_str(&render_block(marker, content));

    let write_error = |source| ProfileError::Write {
        path: shown.clone(),
        source,
    };
    let mode = if existing.is_some() {
        file_mode(path).map_err(write_error)?
    } else {
        DEFAULT_PROFILE_MODE
    };
    if let Some(parent) = path.parent() {
        ensure_dir(parent, None, owner).map_err(write_error)?;
    }
    atomic_write_file_with(
        path,
        updated.as_bytes(),
        WriteOptions {
            mode: Some(mode),
            owner: owner.cloned(),
        },
    )
    .map_err(write_error)?;
    tracing::info!(path = %shown, marker, "added profile block");
    Ok(true)
}
