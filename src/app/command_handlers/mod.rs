use crate::app::cli::{help_text, parse_cli, CliVerb};

pub mod accounts;
pub mod doctor;
pub mod provision;

pub fn run_cli(args: Vec<String>) -> Result<String, String> {
    let parsed = parse_cli(&args)?;
    match parsed.verb {
        CliVerb::Provision => provision::cmd_provision(&parsed.options, &parsed.args),
        CliVerb::Steps => provision::cmd_steps(&parsed.options),
        CliVerb::Accounts => accounts::cmd_accounts(&parsed.options),
        CliVerb::Switch => accounts::cmd_switch(&parsed.options, &parsed.args),
        CliVerb::Doctor => doctor::cmd_doctor(&parsed.options),
        CliVerb::Help => Ok(help_text()),
        CliVerb::Unknown => Err(format!(
            "unknown command `{}`\n\n{}",
            parsed.verb_text,
            help_text()
        )),
    }
}
