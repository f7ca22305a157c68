use crate::credentials::Secret;
use crate::shared::ids::SettingName;
use std::collections::BTreeMap;

pub trait SettingsLookup {
    fn get(&self, name: &str) -> Option<String>;
}

/// Reads settings from the variables exported to this process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl SettingsLookup for ProcessEnvironment {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl SettingsLookup for BTreeMap<String, String> {
    fn get(&self, name: &str) -> Option<String> {
        BTreeMap::get(self, name).cloned()
    }
}

impl<T: SettingsLookup + ?Sized> SettingsLookup for &T {
    fn get(&self, name: &str) -> Option<String> {
        (**self).get(name)
    }
}

/// Fetches a setting, treating whitespace-only values as absent.
pub fn lookup_value(lookup: &dyn SettingsLookup, name: &str) -> Option<String> {
    lookup
        .get(name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentSpec {
    pub required: Vec<SettingName>,
    pub secondary_credentials: Option<SettingName>,
}

impl EnvironmentSpec {
    pub fn new(required: Vec<SettingName>, secondary_credentials: Option<SettingName>) -> Self {
        Self {
            required,
            secondary_credentials,
        }
    }
}

pub fn missing_settings(spec: &EnvironmentSpec, lookup: &dyn SettingsLookup) -> Vec<SettingName> {
    spec.required
        .iter()
        .filter(|name| lookup_value(lookup, name.as_str()).is_none())
        .cloned()
        .collect()
}

pub fn split_credential_list(raw: &str) -> Vec<Secret> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(Secret::new)
        .collect()
}

pub fn secondary_credential_count(spec: &EnvironmentSpec, lookup: &dyn SettingsLookup) -> usize {
    spec.secondary_credentials
        .as_ref()
        .and_then(|name| lookup.get(name.as_str()))
        .map(|raw| split_credential_list(&raw).len())
        .unwrap_or(0)
}

pub fn render_missing_settings(names: &[SettingName]) -> String {
    names
        .iter()
        .map(SettingName::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
