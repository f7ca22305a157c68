use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

/// Environment-variable style name: letters, digits and `_`, not starting
/// with a digit.
pub fn validate_setting_name(kind: &str, value: &str) -> Result<(), String> {
    let Some(first) = value.chars().next() else {
        return Err(format!("{kind} must be non-empty"));
    };
    if first.is_ascii_digit() {
        return Err(format!("{kind} must not start with a digit"));
    }
    if value.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_') {
        return Ok(());
    }
    Err(format!("{kind} must use only ASCII letters, digits or '_'"))
}

pub fn validate_slug(kind: &str, value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err(format!("{kind} must be non-empty"));
    }
    if value
        .chars()
        .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' || ch == '_')
    {
        return Ok(());
    }
    Err(format!(
        "{kind} must use only lowercase ASCII letters, digits, '-' or '_'"
    ))
}

macro_rules! define_name_type {
    ($name:ident, $kind:literal, $validator:path) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn parse(raw: &str) -> Result<Self, String> {
                let trimmed = raw.trim();
                $validator($kind, trimmed)?;
                Ok(Self(trimmed.to_string()))
            }

            /// For compile-time constants that are known to be valid.
            pub(crate) fn from_static(raw: &'static str) -> Self {
                Self(raw.to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<&str> for $name {
            type Error = String;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                Self::parse(value)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let raw = String::deserialize(deserializer)?;
                Self::parse(&raw).map_err(|err| {
                    D::Error::custom(format!("invalid {} `{}`: {}", $kind, raw, err))
                })
            }
        }
    };
}

define_name_type!(SettingName, "setting name", validate_setting_name);
define_name_type!(StepName, "step name", validate_slug);
define_name_type!(ToolName, "tool name", validate_slug);
