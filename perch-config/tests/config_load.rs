use perch_config::{PerchConfigLoader, RunMode};
use serial_test::serial;
use std::{fs, path::PathBuf};
use tempfile::TempDir;

/// Helper to write a YAML file in a temp dir and return its path.
fn write_yaml(tmp: &TempDir, name: &str, yaml: &str) -> PathBuf {
    let p = tmp.path().join(name);
    fs::write(&p, yaml).expect("write yaml");
    p
}

#[test]
#[serial]
fn loads_fetch_config_from_file() {
    let tmp = TempDir::new().unwrap();

    let file_yaml = r#"
version: "0.1"
mode: fetch
credentials:
  consumer_key: "ck"
  consumer_secret: "cs"
  access_token: "at"
  access_secret: "as"
fetch:
  subject: "MelissaBenoist"
  count: 200
  friends_count: 50
  timeline_out: "tweets.txt"
  friends_out: "friends.txt"
"#;
    let p = write_yaml(&tmp, "perch.yaml", file_yaml);

    let config = PerchConfigLoader::new()
        .with_file(p)
        .load()
        .expect("load config");

    assert_eq!(config.mode, RunMode::Fetch);
    assert_eq!(config.fetch.subject, "MelissaBenoist");
    assert_eq!(config.fetch.count, 200);
    assert_eq!(config.fetch.friends_count, 50);
    assert_eq!(
        config.fetch.timeline_out.as_deref(),
        Some(std::path::Path::new("tweets.txt"))
    );
    assert!(config.stream.is_none());
}

#[test]
#[serial]
fn expands_credentials_from_environment() {
    let tmp = TempDir::new().unwrap();

    let file_yaml = r#"
mode: stream
credentials:
  consumer_key: "${PERCH_TEST_CK}"
  consumer_secret: "cs"
  access_token: "at"
  access_secret: "as"
fetch:
  subject: "jack"
  count: 0
stream:
  keywords: ["teradata", "rustlang"]
  target_file: "stream.jsonl"
"#;
    let p = write_yaml(&tmp, "perch.yaml", file_yaml);

    temp_env::with_var("PERCH_TEST_CK", Some("from-env"), || {
        let config = PerchConfigLoader::new()
            .with_file(&p)
            .load()
            .expect("load config");

        assert_eq!(config.mode, RunMode::Stream);
        assert_eq!(config.credentials.consumer_key, "from-env");
        let stream = config.stream.expect("stream section");
        assert_eq!(stream.keywords, vec!["teradata", "rustlang"]);
    });
}

#[test]
#[serial]
fn missing_credentials_is_an_error() {
    let loaded = PerchConfigLoader::new()
        .with_yaml_str(
            r#"
fetch:
  subject: "jack"
  count: 5
"#,
        )
        .load();

    assert!(loaded.is_err());
}
