use devprov::privilege::{
    resolve, ExecutionIdentity, PrivilegeError, PrivilegeProbe, UserDirectory, UserRecord,
};
use std::path::{Path, PathBuf};

struct FakeDirectory {
    users: Vec<UserRecord>,
}

impl FakeDirectory {
    fn standard() -> Self {
        Self {
            users: vec![
                user("root", 0, "/root"),
                user("dev", 1000, "/home/dev"),
                user("ops", 1001, "/home/ops"),
            ],
        }
    }
}

impl UserDirectory for FakeDirectory {
    fn by_name(&self, name: &str) -> Result<Option<UserRecord>, PrivilegeError> {
        Ok(self.users.iter().find(|user| user.name == name).cloned())
    }

    fn by_uid(&self, uid: u32) -> Result<Option<UserRecord>, PrivilegeError> {
        Ok(self.users.iter().find(|user| user.uid == uid).cloned())
    }
}

fn user(name: &str, uid: u32, home: &str) -> UserRecord {
    UserRecord {
        name: name.to_string(),
        uid,
        gid: uid,
        home: PathBuf::from(home),
    }
}

fn probe(effective_uid: u32, invoking_user: Option<&str>) -> PrivilegeProbe {
    PrivilegeProbe {
        effective_uid,
        invoking_user: invoking_user.map(str::to_string),
    }
}

#[test]
fn unprivileged_run_targets_the_current_user() {
    let identity =
        resolve(&probe(1000, None), &FakeDirectory::standard(), &[]).expect("resolve");

    assert!(!identity.is_privileged);
    assert_eq!(identity.target_user, "dev");
    assert_eq!(identity.target_home, Path::new("/home/dev"));
    assert_eq!(identity.file_owner(), None);
}

#[test]
fn unprivileged_run_ignores_a_stray_invoking_user() {
    let identity = resolve(&probe(1001, Some("dev")), &FakeDirectory::standard(), &[])
        .expect("resolve");
    assert_eq!(identity.target_user, "ops");
}

#[test]
fn elevated_run_targets_the_invoking_user() {
    let identity = resolve(&probe(0, Some("dev")), &FakeDirectory::standard(), &[])
        .expect("resolve");

    assert!(identity.is_privileged);
    assert_eq!(identity.target_user, "dev");
    assert_eq!(identity.uid, 1000);
    assert_eq!(identity.target_home, Path::new("/home/dev"));
    let owner = identity.file_owner().expect("owner when privileged");
    assert_eq!((owner.uid, owner.gid), (1000, 1000));
    assert_eq!(owner.home, Path::new("/home/dev"));
}

#[test]
fn elevated_run_without_invoking_user_is_ambiguous() {
    for invoking in [None, Some(""), Some("   ")] {
        let err = resolve(&probe(0, invoking), &FakeDirectory::standard(), &[])
            .expect_err("must be ambiguous");
        assert!(
            matches!(err, PrivilegeError::AmbiguousPrivilege { .. }),
            "{invoking:?}: {err}"
        );
    }
}

#[test]
fn elevated_run_refuses_root_and_unknown_invoking_users() {
    let err = resolve(&probe(0, Some("root")), &FakeDirectory::standard(), &[])
        .expect_err("root is not a target");
    assert!(matches!(err, PrivilegeError::AmbiguousPrivilege { .. }), "{err}");

    let err = resolve(&probe(0, Some("ghost")), &FakeDirectory::standard(), &[])
        .expect_err("unknown user");
    assert!(err.to_string().contains("ghost"), "{err}");
}

#[test]
fn unknown_effective_uid_is_reported() {
    let err = resolve(&probe(4242, None), &FakeDirectory::standard(), &[])
        .expect_err("unknown uid");
    assert!(matches!(err, PrivilegeError::UnknownUid { uid: 4242 }), "{err}");
}

#[test]
fn effective_path_puts_user_bins_first_and_appends_extras_once() {
    let extra = vec![
        PathBuf::from(".npm-global/bin"),
        PathBuf::from("/opt/tools/bin"),
        PathBuf::from("/usr/bin"),
    ];
    let identity = ExecutionIdentity::for_user(user("dev", 1000, "/home/dev"), false, &extra);

    assert_eq!(
        identity.effective_path,
        vec![
            PathBuf::from("/home/dev/.local/bin"),
            PathBuf::from("/home/dev/.cargo/bin"),
            PathBuf::from("/usr/local/bin"),
            PathBuf::from("/usr/bin"),
            PathBuf::from("/bin"),
            PathBuf::from("/home/dev/.npm-global/bin"),
            PathBuf::from("/opt/tools/bin"),
        ]
    );
    assert_eq!(
        identity.search_path().expect("joins"),
        "/home/dev/.local/bin:/home/dev/.cargo/bin:/usr/local/bin:/usr/bin:/bin:/home/dev/.npm-global/bin:/opt/tools/bin"
    );
}

#[test]
fn home_path_resolves_relative_and_tilde_paths() {
    let identity = ExecutionIdentity::for_user(user("dev", 1000, "/home/dev"), false, &[]);

    assert_eq!(
        identity.home_path(Path::new(".bashrc")),
        Path::new("/home/dev/.bashrc")
    );
    assert_eq!(
        identity.home_path(Path::new("~/.config/x.json")),
        Path::new("/home/dev/.config/x.json")
    );
    assert_eq!(
        identity.home_path(Path::new("/etc/profile")),
        Path::new("/etc/profile")
    );
}
