use devprov::shared::ids::{SettingName, StepName, ToolName};

#[test]
fn shared_ids_module_parses_domain_identifiers() {
    assert_eq!(
        SettingName::parse("GH_TOKEN").expect("name").as_str(),
        "GH_TOKEN"
    );
    assert_eq!(
        SettingName::parse("  _PRIVATE1 ").expect("trimmed").as_str(),
        "_PRIVATE1"
    );
    assert_eq!(
        StepName::parse("tool-config").expect("step").as_str(),
        "tool-config"
    );
    assert_eq!(ToolName::parse("opencode").expect("tool").as_str(), "opencode");

    assert!(SettingName::parse("").is_err());
    assert!(SettingName::parse("1PASSWORD").is_err());
    assert!(SettingName::parse("GH-TOKEN").is_err());
    assert!(StepName::parse("Tool Config").is_err());
    assert!(ToolName::parse("bin/claude").is_err());
}

#[test]
fn setting_names_reject_bad_values_during_deserialization() {
    let err = serde_yaml::from_str::<Vec<SettingName>>("[GH_TOKEN, \"not valid\"]")
        .expect_err("invalid name must fail");
    assert!(err.to_string().contains("not valid"), "{err}");
}
