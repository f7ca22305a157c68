use super::{FileOwner, PrivilegeError};
use nix::unistd::{geteuid, Uid, User};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

pub const INVOKING_USER_ENV: &str = "SUDO_USER";

const SYSTEM_SEARCH_PATH: [&str; 3] = ["/usr/local/bin", "/usr/bin", "/bin"];
const USER_SEARCH_PATH: [&str; 2] = [".local/bin", ".cargo/bin"];

/// Facts about the invoking process, captured once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivilegeProbe {
    pub effective_uid: u32,
    pub invoking_user: Option<String>,
}

impl PrivilegeProbe {
    pub fn from_process() -> Self {
        Self {
            effective_uid: geteuid().as_raw(),
            invoking_user: std::env::var(INVOKING_USER_ENV).ok(),
        }
    }

    pub fn is_elevated(&self) -> bool {
        self.effective_uid == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub name: String,
    pub uid: u32,
    pub gid: u32,
    pub home: PathBuf,
}

pub trait UserDirectory {
    fn by_name(&self, name: &str) -> Result<Option<UserRecord>, PrivilegeError>;
    fn by_uid(&self, uid: u32) -> Result<Option<UserRecord>, PrivilegeError>;
}

/// Looks users up in the system account database.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemUserDirectory;

impl UserDirectory for SystemUserDirectory {
    fn by_name(&self, name: &str) -> Result<Option<UserRecord>, PrivilegeError> {
        User::from_name(name)
            .map(|user| user.map(user_record))
            .map_err(|errno| PrivilegeError::UserLookup {
                user: name.to_string(),
                reason: errno.desc().to_string(),
            })
    }

    fn by_uid(&self, uid: u32) -> Result<Option<UserRecord>, PrivilegeError> {
        User::from_uid(Uid::from_raw(uid))
            .map(|user| user.map(user_record))
            .map_err(|errno| PrivilegeError::UserLookup {
                user: uid.to_string(),
                reason: errno.desc().to_string(),
            })
    }
}

fn user_record(user: User) -> UserRecord {
    UserRecord {
        name: user.name,
        uid: user.uid.as_raw(),
        gid: user.gid.as_raw(),
        home: user.dir,
    }
}

/// Who provisioning acts for. Built once and passed to every component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionIdentity {
    pub is_privileged: bool,
    pub target_user: String,
    pub uid: u32,
    pub gid: u32,
    pub target_home: PathBuf,
    pub effective_path: Vec<PathBuf>,
}

impl ExecutionIdentity {
    pub fn for_user(record: UserRecord, is_privileged: bool, extra_path: &[PathBuf]) -> Self {
        let mut effective_path: Vec<PathBuf> = USER_SEARCH_PATH
            .iter()
            .map(|segment| record.home.join(segment))
            .collect();
        effective_path.extend(SYSTEM_SEARCH_PATH.iter().map(PathBuf::from));
        for entry in extra_path {
            let resolved = if entry.is_absolute() {
                entry.clone()
            } else {
                record.home.join(entry)
            };
            if !effective_path.contains(&resolved) {
                effective_path.push(resolved);
            }
        }

        Self {
            is_privileged,
            target_user: record.name,
            uid: record.uid,
            gid: record.gid,
            target_home: record.home,
            effective_path,
        }
    }

    /// Owner for files written into the target home. `None` when the process
    /// already runs as the target user.
    pub fn file_owner(&self) -> Option<FileOwner> {
        self.is_privileged
            .then(|| FileOwner::new(self.uid, self.gid, &self.target_home))
    }

    pub fn search_path(&self) -> Result<OsString, PrivilegeError> {
        std::env::join_paths(&self.effective_path).map_err(|err| {
            PrivilegeError::InvalidSearchPath {
                entry: self
                    .effective_path
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(":"),
                reason: err.to_string(),
            }
        })
    }

    /// Resolves `path` against the target home; `~/` prefixes are accepted.
    pub fn home_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            return path.to_path_buf();
        }
        match path.strip_prefix("~") {
            Ok(rest) => self.target_home.join(rest),
            Err(_) => self.target_home.join(path),
        }
    }
}

pub fn resolve(
    probe: &PrivilegeProbe,
    directory: &dyn UserDirectory,
    extra_path: &[PathBuf],
) -> Result<ExecutionIdentity, PrivilegeError> {
    if !probe.is_elevated() {
        let record = directory
            .by_uid(probe.effective_uid)?
            .ok_or(PrivilegeError::UnknownUid {
                uid: probe.effective_uid,
            })?;
        tracing::info!(
            user = %record.name,
            "running unprivileged; system steps will be skipped"
        );
        return Ok(ExecutionIdentity::for_user(record, false, extra_path));
    }

    let invoking = probe
        .invoking_user
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| PrivilegeError::AmbiguousPrivilege {
            reason: format!("{INVOKING_USER_ENV} is not set; run through sudo from the target account"),
        })?;

    let record = directory
        .by_name(invoking)?
        .ok_or_else(|| PrivilegeError::AmbiguousPrivilege {
            reason: format!("{INVOKING_USER_ENV}=`{invoking}` does not name a known user"),
        })?;
    if record.uid == 0 {
        return Err(PrivilegeError::AmbiguousPrivilege {
            reason: format!("{INVOKING_USER_ENV}=`{invoking}` resolves to root"),
        });
    }

    tracing::info!(user = %record.name, home = %record.home.display(), "acting for invoking user");
    Ok(ExecutionIdentity::for_user(record, true, extra_path))
}
