use nix::unistd::{chown, Gid, Uid};
use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub const OWNER_ONLY_FILE_MODE: u32 = 0o600;
pub const OWNER_ONLY_DIR_MODE: u32 = 0o700;

/// Numeric owner applied to files created on behalf of another user, and the
/// home directory those files must stay inside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOwner {
    pub uid: u32,
    pub gid: u32,
    pub home: PathBuf,
}

impl FileOwner {
    pub fn new(uid: u32, gid: u32, home: impl Into<PathBuf>) -> Self {
        Self {
            uid,
            gid,
            home: home.into(),
        }
    }

    /// Fails when `path`, or any directory between `home` and `path`, is a
    /// symlink. Components that do not exist yet end the walk; a path outside
    /// `home` only has its leaf checked.
    pub fn refuse_symlinks(&self, path: &Path) -> std::io::Result<()> {
        let candidates: Vec<PathBuf> = match path.strip_prefix(&self.home) {
            Ok(relative) => relative
                .components()
                .scan(self.home.clone(), |current, component| {
                    current.push(component);
                    Some(current.clone())
                })
                .collect(),
            Err(_) => vec![path.to_path_buf()],
        };

        for candidate in candidates {
            match fs::symlink_metadata(&candidate) {
                Ok(meta) if meta.file_type().is_symlink() => {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        format!(
                            "refusing to follow symlink {} inside {}",
                            candidate.display(),
                            self.home.display()
                        ),
                    ))
                }
                Ok(_) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    pub fn apply(&self, path: &Path) -> std::io::Result<()> {
        chown(
            path,
            Some(Uid::from_raw(self.uid)),
            Some(Gid::from_raw(self.gid)),
        )
        .map_err(std::io::Error::from)
    }
}

#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    pub mode: Option<u32>,
    pub owner: Option<FileOwner>,
}

pub fn atomic_write_file_with(
    path: &Path,
    content: &[u8],
    options: WriteOptions,
) -> std::io::Result<()> {
    if let Some(owner) = &options.owner {
        owner.refuse_symlinks(path)?;
    }
    let parent = parent_of(path)?;
    let tmp_path = write_temp_sibling(path, content, &options)?;

    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err);
    }
    sync_parent_dir(parent)?;
    Ok(())
}

/// Writes `content` to `path` only when nothing exists there yet.
///
/// Returns `Ok(false)` when the target already existed; its content is left
/// untouched. The new file appears fully written or not at all.
pub fn create_file_if_absent(
    path: &Path,
    content: &[u8],
    options: WriteOptions,
) -> std::io::Result<bool> {
    if let Some(owner) = &options.owner {
        owner.refuse_symlinks(path)?;
    }
    if path.exists() {
        return Ok(false);
    }
    let parent = parent_of(path)?;
    let tmp_path = write_temp_sibling(path, content, &options)?;

    let linked = fs::hard_link(&tmp_path, path);
    let _ = fs::remove_file(&tmp_path);
    match linked {
        Ok(()) => {
            sync_parent_dir(parent)?;
            Ok(true)
        }
        Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
        Err(err) => Err(err),
    }
}

/// Creates `path` and any missing ancestors, handing each newly created
/// directory to `owner` and applying `mode` to the leaf.
pub fn ensure_dir(path: &Path, mode: Option<u32>, owner: Option<&FileOwner>) -> std::io::Result<()> {
    if let Some(owner) = owner {
        owner.refuse_symlinks(path)?;
    }
    let mut missing: Vec<PathBuf> = Vec::new();
    let mut cursor = Some(path);
    while let Some(dir) = cursor {
        if dir.as_os_str().is_empty() || dir.exists() {
            break;
        }
        missing.push(dir.to_path_buf());
        cursor = dir.parent();
    }

    fs::create_dir_all(path)?;
    if let Some(owner) = owner {
        for dir in missing.iter().rev() {
            owner.apply(dir)?;
        }
    }
    if let Some(mode) = mode {
        set_mode(path, mode)?;
    }
    Ok(())
}

pub fn file_mode(path: &Path) -> std::io::Result<u32> {
    #[cfg(unix)]
    {
        Ok(fs::metadata(path)?.permissions().mode() & 0o7777)
    }
    #[cfg(not(unix))]
    {
        let _ = fs::metadata(path)?;
        Ok(0o644)
    }
}

#[cfg(unix)]
pub fn set_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
pub fn set_mode(_path: &Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}

fn parent_of(path: &Path) -> std::io::Result<&Path> {
    path.parent()
        .ok_or_else(|| std::io::Error::other("path has no parent"))
}

fn write_temp_sibling(
    path: &Path,
    content: &[u8],
    options: &WriteOptions,
) -> std::io::Result<PathBuf> {
    let parent = parent_of(path)?;
    let tmp_name = format!(
        ".{}.tmp-{}-{}",
        path.file_name().and_then(|v| v.to_str()).unwrap_or("state"),
        std::process::id(),
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0),
    );
    let tmp_path = parent.join(tmp_name);

    let result = (|| {
        let mut file = fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&tmp_path)?;
        if let Some(mode) = options.mode {
            set_mode(&tmp_path, mode)?;
        }
        if let Some(owner) = &options.owner {
            owner.apply(&tmp_path)?;
        }
        file.write_all(content)?;
        file.sync_all()
    })();

    if let Err(err) = result {
        let _ = fs::remove_file(&tmp_path);
        return Err(err);
    }
    Ok(tmp_path)
}

#[cfg(unix)]
fn sync_parent_dir(parent: &Path) -> std::io::Result<()> {
    fs::File::open(parent)?.sync_all()
}

#[cfg(not(unix))]
fn sync_parent_dir(_parent: &Path) -> std::io::Result<()> {
    Ok(())
}
