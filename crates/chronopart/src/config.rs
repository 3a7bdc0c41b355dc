//! Typed run configuration.
//!
//! Callers resolve configuration however they like (file, environment,
//! generated); the core only accepts this validated structure. Shape errors
//! surface once, at [`RunConfig::validate`], never inside planning logic.

use crate::calendar::{Granularity, RetentionSpec};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// TLS mode for the database connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TlsMode {
    /// Plain connection.
    #[default]
    Disabled,
    /// TLS against the system CA store.
    SystemCa,
    /// TLS against a custom CA bundle.
    CustomCa {
        /// Path to the CA certificate bundle (PEM).
        ca: String,
    },
}

/// Database connection target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbConfig {
    /// Server hostname; ignored when `socket` is set.
    #[serde(default = "default_host")]
    pub host: String,
    /// Server TCP port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Unix socket path; takes precedence over host/port when set.
    #[serde(default)]
    pub socket: Option<String>,
    /// Connection user.
    pub user: String,
    /// Connection password.
    #[serde(default)]
    pub password: String,
    /// Schema holding the managed tables.
    pub database: String,
    /// TLS mode.
    #[serde(default)]
    pub tls: TlsMode,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    3306
}

/// One managed table: name, period granularity and retention window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableConfig {
    /// Table name; identifiers only ever come from this validated set.
    pub table: String,
    /// Partition period granularity.
    pub granularity: Granularity,
    /// Retention window, e.g. `14d` or `12m`.
    pub retention: RetentionSpec,
}

/// Resolved configuration for one run. Immutable once validated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Connection target.
    pub database: DbConfig,
    /// How many future periods to keep materialized ahead of now.
    #[serde(default = "default_premake")]
    pub premake: u32,
    /// Whether DDL is written to the replication stream. When false, the
    /// session disables binary logging for the run.
    #[serde(default)]
    pub replicate_ddl: bool,
    /// The managed table set, processed in order.
    pub tables: Vec<TableConfig>,
}

fn default_premake() -> u32 {
    10
}

impl RunConfig {
    /// Validates the configured table set.
    ///
    /// A table listed under two granularities would make lookups ambiguous
    /// (last-wins at best), so duplicates are rejected outright.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for entry in &self.tables {
            if !seen.insert(entry.table.as_str()) {
                return Err(Error::DuplicateTable {
                    table: entry.table.clone(),
                });
            }
        }
        Ok(())
    }

    /// Looks up the configuration entry for `table`.
    pub fn table(&self, table: &str) -> Result<&TableConfig> {
        self.tables
            .iter()
            .find(|entry| entry.table == table)
            .ok_or_else(|| Error::UnconfiguredTable {
                table: table.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(name: &str, granularity: Granularity) -> TableConfig {
        TableConfig {
            table: name.to_string(),
            granularity,
            retention: "14d".parse().unwrap(),
        }
    }

    fn config(tables: Vec<TableConfig>) -> RunConfig {
        RunConfig {
            database: DbConfig {
                host: default_host(),
                port: default_port(),
                socket: None,
                user: "monitor".to_string(),
                password: String::new(),
                database: "monitoring".to_string(),
                tls: TlsMode::Disabled,
            },
            premake: 3,
            replicate_ddl: false,
            tables,
        }
    }

    #[test]
    fn test_validate_accepts_unique_tables() {
        let cfg = config(vec![
            table("history", Granularity::Daily),
            table("trends", Granularity::Monthly),
        ]);
        cfg.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_duplicate_across_granularities() {
        let cfg = config(vec![
            table("history", Granularity::Daily),
            table("history", Granularity::Monthly),
        ]);
        assert!(matches!(
            cfg.validate(),
            Err(Error::DuplicateTable { table }) if table == "history"
        ));
    }

    #[test]
    fn test_table_lookup() {
        let cfg = config(vec![table("history", Granularity::Daily)]);
        assert_eq!(cfg.table("history").unwrap().granularity, Granularity::Daily);
        assert!(matches!(
            cfg.table("sessions"),
            Err(Error::UnconfiguredTable { .. })
        ));
    }

    #[test]
    fn test_yaml_deserialization() {
        let yaml = r#"
database:
  host: db.example.net
  user: monitor
  password: secret
  database: monitoring
  tls: system_ca
premake: 5
tables:
  - { table: history, granularity: daily, retention: 14d }
  - { table: trends, granularity: monthly, retention: 12m }
"#;
        let cfg: RunConfig = serde_yaml::from_str(yaml).unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.premake, 5);
        assert_eq!(cfg.database.port, 3306);
        assert_eq!(cfg.database.tls, TlsMode::SystemCa);
        assert!(!cfg.replicate_ddl);
        assert_eq!(cfg.tables[1].retention.to_string(), "12m");
    }

    #[test]
    fn test_yaml_rejects_bad_retention() {
        let yaml = r#"
database: { user: monitor, database: monitoring }
tables:
  - { table: history, granularity: daily, retention: "7" }
"#;
        assert!(serde_yaml::from_str::<RunConfig>(yaml).is_err());
    }
}
