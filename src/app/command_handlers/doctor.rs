use crate::app::cli::CliOptions;
use crate::app::command_support::{load_cli_settings, resolve_process_identity};
use crate::config::Settings;
use crate::environment::{missing_settings, render_missing_settings, ProcessEnvironment};
use crate::privilege::ExecutionIdentity;
use std::collections::BTreeSet;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Read-only report of what `provision` would need. Fails when anything is
/// missing so scripts can gate on it.
pub fn cmd_doctor(options: &CliOptions) -> Result<String, String> {
    let settings = load_cli_settings(options)?;
    let mut lines = Vec::new();
    let mut problems = 0usize;

    let missing = missing_settings(&settings.environment_spec(), &ProcessEnvironment);
    if missing.is_empty() {
        lines.push("settings: ok".to_string());
    } else {
        problems += 1;
        lines.push(format!("settings: missing {}", render_missing_settings(&missing)));
    }

    match resolve_process_identity(&settings) {
        Ok(identity) => {
            lines.push(format!(
                "identity: {} (uid {}, home {}, privileged: {})",
                identity.target_user,
                identity.uid,
                identity.target_home.display(),
                identity.is_privileged
            ));
            for program in required_programs(&settings) {
                match find_program(&identity, &program) {
                    Some(path) => lines.push(format!("binary {program}: {}", path.display())),
                    None => lines.push(format!("binary {program}: not found")),
                }
            }
        }
        Err(err) => {
            problems += 1;
            lines.push(format!("identity: {err}"));
        }
    }

    let report = lines.join("\n");
    if problems > 0 {
        Err(report)
    } else {
        Ok(report)
    }
}

/// Programs invoked as the target user. Tools that `provision` installs are
/// reported but not counted as problems.
fn required_programs(settings: &Settings) -> BTreeSet<String> {
    let mut programs = BTreeSet::new();
    programs.insert("git".to_string());
    let commands = [
        &settings.credentials.status_command,
        &settings.credentials.login_command,
    ]
    .into_iter()
    .chain(settings.tools.iter().flat_map(|tool| [&tool.check, &tool.install]));
    for argv in commands {
        if let Some(program) = argv.first() {
            programs.insert(program.clone());
        }
    }
    programs
}

fn find_program(identity: &ExecutionIdentity, program: &str) -> Option<PathBuf> {
    if program.contains('/') {
        let path = identity.home_path(Path::new(program));
        return is_executable(&path).then_some(path);
    }
    identity
        .effective_path
        .iter()
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

fn is_executable(path: &Path) -> bool {
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}
