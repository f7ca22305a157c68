use super::{ConfigError, DEFAULT_CREDENTIAL_DIR, DEFAULT_PROFILE_PATH, DEFAULT_TOOL_CONFIG_PATH};
use crate::environment::EnvironmentSpec;
use crate::reconcile::KeyPath;
use crate::shared::ids::{SettingName, ToolName};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub required_settings: Vec<SettingName>,
    pub secondary_credentials_setting: Option<SettingName>,
    pub forward_env: Vec<SettingName>,
    pub extra_path: Vec<PathBuf>,
    pub packages: PackagesConfig,
    pub git: GitIdentityConfig,
    pub credentials: CredentialsConfig,
    pub tools: Vec<ToolConfig>,
    pub tool_config: ToolConfigDocument,
    pub profile: ProfileConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PackagesConfig {
    pub check: Vec<String>,
    pub install: Vec<String>,
    pub names: Vec<String>,
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GitIdentityConfig {
    pub name_setting: SettingName,
    pub email_setting: SettingName,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CredentialsConfig {
    pub primary_setting: SettingName,
    pub dir: PathBuf,
    pub status_command: Vec<String>,
    pub login_command: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolConfig {
    pub name: ToolName,
    pub check: Vec<String>,
    pub install: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ToolConfigDocument {
    pub path: PathBuf,
    pub values: Vec<ConfigValue>,
    pub collections: Vec<ConfigCollection>,
}

/// One key of the tool config, taken either from a setting or literally.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConfigValue {
    pub key: String,
    #[serde(default)]
    pub from_setting: Option<SettingName>,
    #[serde(default)]
    pub value: Option<Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConfigCollection {
    pub key: String,
    pub id_field: String,
    #[serde(default)]
    pub entries: Vec<Map<String, Value>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProfileConfig {
    pub path: PathBuf,
    pub marker: String,
    pub content: String,
}

fn setting(name: &'static str) -> SettingName {
    SettingName::from_static(name)
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|part| part.to_string()).collect()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            required_settings: [
                "GH_TOKEN",
                "ANTHROPIC_API_KEY",
                "OPENROUTER_API_KEY",
                "GIT_USER_NAME",
                "GIT_USER_EMAIL",
            ]
            .into_iter()
            .map(setting)
            .collect(),
            secondary_credentials_setting: Some(setting("GH_TOKENS_EXTRA")),
            forward_env: Vec::new(),
            extra_path: Vec::new(),
            packages: PackagesConfig::default(),
            git: GitIdentityConfig::default(),
            credentials: CredentialsConfig::default(),
            tools: default_tools(),
            tool_config: ToolConfigDocument::default(),
            profile: ProfileConfig::default(),
        }
    }
}

impl Default for PackagesConfig {
    fn default() -> Self {
        let mut env = BTreeMap::new();
        env.insert("DEBIAN_FRONTEND".to_string(), "noninteractive".to_string());
        Self {
            check: argv(&["dpkg", "-s"]),
            install: argv(&["apt-get", "install", "-y", "--no-install-recommends"]),
            names: argv(&["git", "curl", "jq", "gh", "nodejs", "npm"]),
            env,
        }
    }
}

impl Default for GitIdentityConfig {
    fn default() -> Self {
        Self {
            name_setting: setting("GIT_USER_NAME"),
            email_setting: setting("GIT_USER_EMAIL"),
        }
    }
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            primary_setting: setting("GH_TOKEN"),
            dir: PathBuf::from(DEFAULT_CREDENTIAL_DIR),
            status_command: argv(&["gh", "auth", "token"]),
            login_command: argv(&["gh", "auth", "login", "--with-token"]),
        }
    }
}

fn default_tools() -> Vec<ToolConfig> {
    [
        ("claude", "@anthropic-ai/claude-code"),
        ("opencode", "opencode-ai"),
    ]
    .into_iter()
    .map(|(binary, package)| ToolConfig {
        name: ToolName::from_static(binary),
        check: argv(&[binary, "--version"]),
        install: argv(&["npm", "install", "--global", "--prefix", ".local", package]),
    })
    .collect()
}

impl Default for ToolConfigDocument {
    fn default() -> Self {
        let models = [
            ("anthropic/claude-sonnet-4", "Claude Sonnet 4"),
            ("openai/gpt-4o", "GPT-4o"),
        ]
        .into_iter()
        .map(|(id, name)| {
            let mut entry = Map::new();
            entry.insert("id".to_string(), Value::from(id));
            entry.insert("name".to_string(), Value::from(name));
            entry
        })
        .collect();

        Self {
            path: PathBuf::from(DEFAULT_TOOL_CONFIG_PATH),
            values: vec![
                ConfigValue {
                    key: "apiKey".to_string(),
                    from_setting: Some(setting("OPENROUTER_API_KEY")),
                    value: None,
                },
                ConfigValue {
                    key: "providers.anthropic.apiKey".to_string(),
                    from_setting: Some(setting("ANTHROPIC_API_KEY")),
                    value: None,
                },
            ],
            collections: vec![ConfigCollection {
                key: "models".to_string(),
                id_field: "id".to_string(),
                entries: models,
            }],
        }
    }
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_PROFILE_PATH),
            marker: "devprov account helpers".to_string(),
            content: [
                "gh-accounts() { devprov accounts; }",
                "gh-switch() { devprov switch \"$1\"; }",
            ]
            .join("\n"),
        }
    }
}

impl Settings {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn environment_spec(&self) -> EnvironmentSpec {
        EnvironmentSpec::new(
            self.required_settings.clone(),
            self.secondary_credentials_setting.clone(),
        )
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let required: HashSet<&str> = self
            .required_settings
            .iter()
            .map(SettingName::as_str)
            .collect();
        let require = |field: &str, name: &SettingName| {
            if required.contains(name.as_str()) {
                Ok(())
            } else {
                Err(ConfigError::Settings(format!(
                    "{field} references `{name}` which is not listed in `required_settings`"
                )))
            }
        };

        require("git.name_setting", &self.git.name_setting)?;
        require("git.email_setting", &self.git.email_setting)?;
        require("credentials.primary_setting", &self.credentials.primary_setting)?;

        if !self.packages.names.is_empty() && self.packages.install.is_empty() {
            return Err(ConfigError::Settings(
                "`packages.install` must be non-empty when packages are listed".to_string(),
            ));
        }
        if self.credentials.status_command.is_empty() || self.credentials.login_command.is_empty()
        {
            return Err(ConfigError::Settings(
                "`credentials.status_command` and `credentials.login_command` must be non-empty"
                    .to_string(),
            ));
        }
        if self.credentials.dir.as_os_str().is_empty() {
            return Err(ConfigError::Settings(
                "`credentials.dir` must be non-empty".to_string(),
            ));
        }

        let mut tool_names = HashSet::new();
        for tool in &self.tools {
            if !tool_names.insert(tool.name.as_str()) {
                return Err(ConfigError::Settings(format!(
                    "tool `{}` is listed more than once",
                    tool.name
                )));
            }
            if tool.check.is_empty() || tool.install.is_empty() {
                return Err(ConfigError::Settings(format!(
                    "tool `{}` requires non-empty `check` and `install` commands",
                    tool.name
                )));
            }
        }

        for entry in &self.tool_config.values {
            KeyPath::parse(&entry.key).map_err(ConfigError::Settings)?;
            match (&entry.from_setting, &entry.value) {
                (Some(name), None) => require("tool_config.values", name)?,
                (None, Some(_)) => {}
                _ => {
                    return Err(ConfigError::Settings(format!(
                        "tool config key `{}` needs exactly one of `from_setting` or `value`",
                        entry.key
                    )))
                }
            }
        }
        for collection in &self.tool_config.collections {
            KeyPath::parse(&collection.key).map_err(ConfigError::Settings)?;
            if collection.id_field.trim().is_empty() {
                return Err(ConfigError::Settings(format!(
                    "tool config collection `{}` requires a non-empty `id_field`",
                    collection.key
                )));
            }
            let mut ids = HashSet::new();
            for entry in &collection.entries {
                let id = entry.get(&collection.id_field).ok_or_else(|| {
                    ConfigError::Settings(format!(
                        "an entry of `{}` is missing `{}`",
                        collection.key, collection.id_field
                    ))
                })?;
                if !ids.insert(id.to_string()) {
                    return Err(ConfigError::Settings(format!(
                        "`{}` lists {} more than once",
                        collection.key, id
                    )));
                }
            }
        }

        let marker = self.profile.marker.trim();
        if marker.is_empty() || marker.contains('\n') {
            return Err(ConfigError::Settings(
                "`profile.marker` must be a single non-empty line".to_string(),
            ));
        }

        Ok(())
    }
}
