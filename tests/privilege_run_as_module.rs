use devprov::credentials::Secret;
use devprov::privilege::{
    probe_as, run_as, run_privileged, ExecutionIdentity, Invocation, PrivilegeError, UserRecord,
};
use std::collections::BTreeMap;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

fn write_script(path: &Path, body: &str) {
    fs::create_dir_all(path.parent().expect("parent")).expect("create script dir");
    fs::write(path, body).expect("write script");
    let mut perms = fs::metadata(path).expect("metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).expect("chmod");
}

fn identity_for(home: &Path) -> ExecutionIdentity {
    ExecutionIdentity::for_user(
        UserRecord {
            name: "dev".to_string(),
            uid: 1000,
            gid: 1000,
            home: home.to_path_buf(),
        },
        false,
        &[],
    )
}

#[test]
fn run_as_uses_a_minimal_environment_rooted_in_the_target_home() {
    let temp = tempfile::tempdir().expect("tempdir");
    let home = temp.path();
    write_script(
        &home.join(".local/bin/show-env"),
        "#!/bin/sh\nprintf 'HOME=%s\\nUSER=%s\\nLOGNAME=%s\\nCWD=%s\\nFORWARDED=%s\\nMANIFEST=%s\\n' \"$HOME\" \"$USER\" \"$LOGNAME\" \"$(pwd)\" \"${FORWARDED:-unset}\" \"${CARGO_MANIFEST_DIR:-unset}\"\n",
    );

    let forwarded = BTreeMap::from([("FORWARDED".to_string(), "yes".to_string())]);
    let output = run_as(
        &identity_for(home),
        &Invocation::new("show-env").envs(&forwarded),
    )
    .expect("run");

    let canonical_home = fs::canonicalize(home).expect("canonical home");
    let lines: Vec<&str> = output.stdout.lines().collect();
    assert_eq!(lines[0], format!("HOME={}", home.display()));
    assert_eq!(lines[1], "USER=dev");
    assert_eq!(lines[2], "LOGNAME=dev");
    assert_eq!(lines[3], format!("CWD={}", canonical_home.display()));
    assert_eq!(lines[4], "FORWARDED=yes");
    assert_eq!(lines[5], "MANIFEST=unset");
}

#[test]
fn secrets_reach_the_command_through_stdin_only() {
    let temp = tempfile::tempdir().expect("tempdir");
    let home = temp.path();
    write_script(
        &home.join(".local/bin/login"),
        "#!/bin/sh\nread token\nprintf 'args=%s token=%s\\n' \"$*\" \"$token\"\n",
    );

    let invocation = Invocation::new("login")
        .arg("--with-token")
        .stdin_secret(Secret::new("ghp_secret"));
    assert!(!invocation.command_form().contains("ghp_secret"));
    assert!(!format!("{invocation:?}").contains("ghp_secret"));

    let output = run_as(&identity_for(home), &invocation).expect("run");
    assert_eq!(output.stdout.trim(), "args=--with-token token=ghp_secret");
}

#[test]
fn run_as_reports_exit_code_and_stderr_on_failure() {
    let temp = tempfile::tempdir().expect("tempdir");
    let home = temp.path();
    write_script(
        &home.join(".local/bin/fails"),
        "#!/bin/sh\necho boom >&2\nexit 3\n",
    );

    let err = run_as(&identity_for(home), &Invocation::new("fails")).expect_err("must fail");
    match err {
        PrivilegeError::CommandFailed {
            program,
            exit_code,
            stderr,
        } => {
            assert_eq!(program, "fails");
            assert_eq!(exit_code, Some(3));
            assert_eq!(stderr, "boom");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn probe_as_returns_non_zero_exits_as_output() {
    let temp = tempfile::tempdir().expect("tempdir");
    let home = temp.path();
    write_script(&home.join(".local/bin/fails"), "#!/bin/sh\nexit 1\n");

    let output = probe_as(&identity_for(home), &Invocation::new("fails")).expect("probe");
    assert!(!output.success);
    assert_eq!(output.exit_code, Some(1));
}

#[test]
fn missing_binaries_and_empty_commands_are_distinct_errors() {
    let temp = tempfile::tempdir().expect("tempdir");
    let identity = identity_for(temp.path());

    let err = run_as(&identity, &Invocation::new("devprov-no-such-binary"))
        .expect_err("missing binary");
    assert!(
        matches!(err, PrivilegeError::MissingBinary { ref program } if program == "devprov-no-such-binary"),
        "{err}"
    );

    let empty: [&str; 0] = [];
    assert!(matches!(
        Invocation::from_argv(&empty),
        Err(PrivilegeError::EmptyCommand)
    ));
    assert!(matches!(
        Invocation::from_argv(&["  "]),
        Err(PrivilegeError::EmptyCommand)
    ));
}

#[test]
fn system_commands_require_elevated_privileges() {
    let temp = tempfile::tempdir().expect("tempdir");
    let err = run_privileged(&identity_for(temp.path()), &Invocation::new("true"))
        .expect_err("unprivileged");
    assert!(matches!(err, PrivilegeError::NotPrivileged { .. }), "{err}");
}
