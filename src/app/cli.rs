use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliVerb {
    Provision,
    Accounts,
    Switch,
    Steps,
    Doctor,
    Help,
    Unknown,
}

pub fn parse_cli_verb(input: &str) -> CliVerb {
    match input {
        "provision" => CliVerb::Provision,
        "accounts" => CliVerb::Accounts,
        "switch" => CliVerb::Switch,
        "steps" => CliVerb::Steps,
        "doctor" => CliVerb::Doctor,
        "help" | "--help" | "-h" => CliVerb::Help,
        _ => CliVerb::Unknown,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOptions {
    pub settings_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCli {
    pub verb: CliVerb,
    pub verb_text: String,
    pub args: Vec<String>,
    pub options: CliOptions,
}

/// Splits global options from the verb and its arguments. With no verb the
/// command provisions.
pub fn parse_cli(args: &[String]) -> Result<ParsedCli, String> {
    let mut options = CliOptions::default();
    let mut positional = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--settings" {
            let value = iter
                .next()
                .ok_or_else(|| "`--settings` requires a path".to_string())?;
            options.settings_path = Some(PathBuf::from(value));
        } else if let Some(value) = arg.strip_prefix("--settings=") {
            if value.is_empty() {
                return Err("`--settings` requires a path".to_string());
            }
            options.settings_path = Some(PathBuf::from(value));
        } else {
            positional.push(arg.clone());
        }
    }

    let (verb_text, rest) = match positional.split_first() {
        Some((verb, rest)) => (verb.clone(), rest.to_vec()),
        None => ("provision".to_string(), Vec::new()),
    };
    Ok(ParsedCli {
        verb: parse_cli_verb(&verb_text),
        verb_text,
        args: rest,
        options,
    })
}

pub fn cli_help_lines() -> Vec<String> {
    vec![
        "Usage: devprov [--settings PATH] [command]".to_string(),
        String::new(),
        "Commands:".to_string(),
        "  provision            Bring this machine to the desired state (default)".to_string(),
        "  accounts             List stored GitHub credential slots".to_string(),
        "  switch <slot>        Log the GitHub CLI in with a stored credential".to_string(),
        "  steps                List provisioning steps in order".to_string(),
        "  doctor               Check settings, identity and required binaries".to_string(),
        "  help                 Show this help".to_string(),
    ]
}

pub fn help_text() -> String {
    cli_help_lines().join("\n")
}
