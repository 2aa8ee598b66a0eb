use super::*;
use std::collections::HashMap;

fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn defaults_to_postgres_on_port_3000() {
    let cfg = HubConfig::from_lookup(lookup_from(&[("DATABASE_URL", "postgres://localhost/hub")])).unwrap();
    assert_eq!(cfg.port, DEFAULT_PORT);
    assert_eq!(cfg.bind_addr, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    assert_eq!(cfg.client_queue_depth, DEFAULT_CLIENT_QUEUE_DEPTH);
    assert_eq!(
        cfg.storage,
        StorageConfig::Postgres {
            database_url: "postgres://localhost/hub".into(),
            max_connections: DEFAULT_DB_MAX_CONNECTIONS,
        }
    );
}

#[test]
fn postgres_requires_database_url() {
    let err = HubConfig::from_lookup(lookup_from(&[])).unwrap_err();
    assert_eq!(err, ConfigError::Missing { var: "DATABASE_URL" });
}

#[test]
fn memory_storage_parses_board_list() {
    let cfg = HubConfig::from_lookup(lookup_from(&[
        ("STORAGE", "memory"),
        ("MEMORY_BOARDS", " alpha, beta,,gamma "),
        ("PORT", "8080"),
        ("BIND_ADDR", "127.0.0.1"),
        ("CLIENT_QUEUE_DEPTH", "16"),
    ]))
    .unwrap();

    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.bind_addr, IpAddr::V4(Ipv4Addr::LOCALHOST));
    assert_eq!(cfg.client_queue_depth, 16);
    assert_eq!(
        cfg.storage,
        StorageConfig::Memory { boards: vec!["alpha".into(), "beta".into(), "gamma".into()] }
    );
}

#[test]
fn memory_storage_without_boards_is_empty_catalog() {
    let cfg = HubConfig::from_lookup(lookup_from(&[("STORAGE", "memory")])).unwrap();
    assert_eq!(cfg.storage, StorageConfig::Memory { boards: vec![] });
}

#[test]
fn unknown_storage_errors() {
    let err = HubConfig::from_lookup(lookup_from(&[("STORAGE", "sqlite")])).unwrap_err();
    assert!(err.to_string().contains("invalid STORAGE"));
}

#[test]
fn unparsable_numbers_error() {
    let err = HubConfig::from_lookup(lookup_from(&[("STORAGE", "memory"), ("PORT", "http")])).unwrap_err();
    assert_eq!(err, ConfigError::Invalid { var: "PORT", value: "http".into() });

    let err = HubConfig::from_lookup(lookup_from(&[("STORAGE", "memory"), ("CLIENT_QUEUE_DEPTH", "0")])).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { var: "CLIENT_QUEUE_DEPTH", .. }));
}
