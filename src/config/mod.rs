pub mod error;
pub mod load;
pub mod paths;
pub mod settings;

pub use error::ConfigError;
pub use load::{load_settings, resolve_settings_path};
pub use paths::{
    DEFAULT_CREDENTIAL_DIR, DEFAULT_PROFILE_PATH, DEFAULT_TOOL_CONFIG_PATH, SETTINGS_PATH_ENV,
};
pub use settings::{
    ConfigCollection, ConfigValue, CredentialsConfig, GitIdentityConfig, PackagesConfig,
    ProfileConfig, Settings, ToolConfig, ToolConfigDocument,
};
