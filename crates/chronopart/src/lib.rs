//! Chronopart - Time-Range Partition Maintenance for MySQL/MariaDB
//!
//! This crate manages native RANGE partitioning on append-mostly tables keyed
//! by a `clock` timestamp column: it pre-creates partitions ahead of incoming
//! data, drops partitions whose entire contents have aged past a retention
//! window, and bootstraps partitioning on tables that do not have it yet.
//!
//! # Components
//!
//! - [`calendar`]: period truncation/advancement and retention parsing
//! - [`plan`]: partition naming, boundaries and plan computation (pure)
//! - [`catalog`]: metadata inspection and dry-run-aware DDL execution
//! - [`run`]: the per-run orchestrator with per-table error isolation
//!
//! # Example
//!
//! ```rust,ignore
//! use chronopart::{Mode, MySqlCatalog, RunConfig, Runner};
//!
//! let config: RunConfig = serde_yaml::from_str(&config_text)?;
//! config.validate()?;
//!
//! let mut catalog = MySqlCatalog::connect(&config.database, false, dry_run)?;
//! let mut runner = Runner::new(&config, &mut catalog);
//! let output = runner.run(&Mode::Maintain, now, &mut |_| true)?;
//! ```

#![deny(missing_docs)]

pub mod calendar;
pub mod catalog;
pub mod config;
pub mod ddl;
pub mod error;
pub mod plan;
pub mod report;
pub mod run;

pub use calendar::{Granularity, RetentionSpec};
pub use catalog::{Catalog, MySqlCatalog};
pub use config::{DbConfig, RunConfig, TableConfig, TlsMode};
pub use error::{Error, Result};
pub use plan::PartitionDescriptor;
pub use report::{DiscoveryEntry, TableStats};
pub use run::{Mode, RunOutput, RunSummary, Runner};
