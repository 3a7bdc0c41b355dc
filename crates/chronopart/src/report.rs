//! Monitoring output: discovery records and per-table statistics.
//!
//! Both shapes are consumed by an external monitoring system, so they are
//! plain serde structs; the caller decides how to serialize and where to
//! print them.

use crate::calendar::from_epoch;
use crate::catalog::Catalog;
use crate::config::RunConfig;
use crate::error::{Error, Result};
use chrono::NaiveDateTime;
use serde::Serialize;

/// One configured (table, period) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveryEntry {
    /// Managed table name.
    pub table: String,
    /// Period granularity name, e.g. `daily`.
    pub period: String,
}

/// Enumerates the configured table/period pairs.
///
/// Pure function of configuration; needs no catalog access, so it can run
/// even when the database is unreachable.
pub fn discovery(config: &RunConfig) -> Vec<DiscoveryEntry> {
    config
        .tables
        .iter()
        .map(|entry| DiscoveryEntry {
            table: entry.table.clone(),
            period: entry.granularity.as_str().to_string(),
        })
        .collect()
}

/// Per-table partitioning statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableStats {
    /// Managed table name.
    pub table: String,
    /// Data plus index bytes on disk.
    pub size_bytes: u64,
    /// Number of named partitions.
    pub partition_count: u64,
    /// Whole days of future coverage left, floored at zero.
    pub days_left: i64,
}

/// Collects statistics for one configured table.
///
/// Errors if the table is not part of the configured set.
pub fn stats<C: Catalog + ?Sized>(
    catalog: &mut C,
    config: &RunConfig,
    table: &str,
    now: NaiveDateTime,
) -> Result<TableStats> {
    let entry = config.table(table)?;
    if !catalog.table_exists(&entry.table)? {
        return Err(Error::TableNotFound {
            table: entry.table.clone(),
        });
    }

    let size_bytes = catalog.table_size_bytes(&entry.table)?;
    let partition_count = catalog.partition_count(&entry.table)?;
    let days_left = match catalog.top_boundary(&entry.table)?.and_then(from_epoch) {
        Some(top) => (top - now).num_days().max(0),
        None => 0,
    };

    Ok(TableStats {
        table: entry.table.clone(),
        size_bytes,
        partition_count,
        days_left,
    })
}
