use std::collections::HashMap;

use super::*;

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn normalizes_plain_file_path_to_sqlite_url() {
    assert_eq!(
        normalize_database_url("./data/test.db"),
        "sqlite://./data/test.db"
    );
    assert_eq!(
        normalize_database_url("sqlite:C:\\cache\\rfi.db"),
        "sqlite://C:/cache/rfi.db"
    );
    assert_eq!(normalize_database_url("sqlite::memory:"), "sqlite::memory:");
}

#[test]
fn blank_database_url_falls_back_to_the_default() {
    assert!(normalize_database_url("  ").starts_with("sqlite://"));
}

#[test]
fn file_values_override_defaults() {
    let mut settings = Settings::default();
    apply_file(
        &mut settings,
        r#"
            api_url = "https://rfi.example.com/api"
            reviewer = "Carol"
            upload_timeout_secs = 120
            demo_fallback = true
        "#,
    )
    .expect("parse");

    assert_eq!(settings.api_url, "https://rfi.example.com/api");
    assert_eq!(settings.reviewer, "Carol");
    assert_eq!(settings.user, "Alice");
    assert_eq!(settings.upload_timeout(), Duration::from_secs(120));
    assert!(settings.demo_fallback);
    assert_eq!(settings.download_url(), "https://rfi.example.com/api");
}

#[test]
fn unknown_file_keys_are_rejected() {
    let mut settings = Settings::default();
    assert!(apply_file(&mut settings, "api_ulr = \"typo\"").is_err());
}

#[test]
fn environment_overrides_file_values() {
    let mut settings = Settings::default();
    apply_file(&mut settings, "api_url = \"http://from-file\"").expect("parse");
    apply_env(
        &mut settings,
        env(&[
            ("RFI_API_URL", "http://from-env"),
            ("RFI_DOWNLOAD_URL", "http://files"),
            ("DATABASE_URL", "./generic.db"),
            ("RFI_DATABASE_URL", "./specific.db"),
            ("RFI_DEMO_FALLBACK", "yes"),
            ("RFI_UPLOAD_TIMEOUT_SECS", "not a number"),
        ]),
    );

    assert_eq!(settings.api_url, "http://from-env");
    assert_eq!(settings.download_url(), "http://files");
    assert_eq!(settings.database_url, "./specific.db");
    assert!(settings.demo_fallback);
    assert_eq!(settings.upload_timeout_secs, 3600);
}

#[test]
fn app_prefixed_api_url_wins() {
    let mut settings = Settings::default();
    apply_env(
        &mut settings,
        env(&[("RFI_API_URL", "http://a"), ("APP__API_URL", "http://b")]),
    );
    assert_eq!(settings.api_url, "http://b");
}

#[test]
fn explicit_config_file_must_exist() {
    let dir = tempfile::tempdir().expect("tempdir");
    let missing = dir.path().join("absent.toml");
    assert!(load_settings(Some(&missing)).is_err());

    let present = dir.path().join("rfi.toml");
    fs::write(&present, "user = \"Dana\"\ndatabase_url = \"./x.db\"\n").expect("write");
    assert!(load_settings(Some(&present)).is_ok());
}
