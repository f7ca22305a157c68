pub const SETTINGS_PATH_ENV: &str = "DEVPROV_SETTINGS";

// Relative paths resolve against the target user's home.
pub const DEFAULT_CREDENTIAL_DIR: &str = ".config/devprov/credentials";
pub const DEFAULT_TOOL_CONFIG_PATH: &str = ".config/devprov/llm.json";
pub const DEFAULT_PROFILE_PATH: &str = ".bashrc";
