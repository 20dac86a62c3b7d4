use blipsub::config::{Config, ConfigError};

#[test]
fn load_config_matches_toml() {
    let cfg: Config = Config::load(Some("blipsub.toml")).expect("failed to load config");

    assert_eq!(cfg.demo.topic, "my-topic");
    assert_eq!(cfg.demo.subscription, "my-sub");
    assert_eq!(cfg.demo.payload, "hello world!");
    assert_eq!(cfg.consumer.threshold.get(), 10);
    assert_eq!(cfg.emulator.workers, 4);
    assert_eq!(cfg.emulator.page_size, 2);
    assert_eq!(cfg.emulator.backlog, 15);
    assert_eq!(cfg.emulator.topics.len(), 2);
    assert_eq!(cfg.emulator.topics[0].subscriptions, vec!["my-sub", "audit-sub"]);
    assert!(cfg.emulator.topics[1].subscriptions.is_empty());
}

#[test]
fn explicit_missing_file_is_an_error() {
    let err = Config::load(Some("does-not-exist.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

#[test]
fn unknown_section_is_rejected() {
    let err = Config::from_toml_str("[server]\nbind_addr = \"127.0.0.1:8080\"\n").unwrap_err();
    assert!(matches!(err, ConfigError::Toml(_)));
}
