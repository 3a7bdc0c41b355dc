//! Live catalog access: metadata inspection and DDL execution.
//!
//! [`Catalog`] is the seam between planning and the database. Planning code
//! only ever sees snapshots taken through this trait, which keeps it pure and
//! lets tests substitute a fake; [`MySqlCatalog`] is the production
//! implementation over a single synchronous connection.
//!
//! All metadata reads are parameterized. The only identifiers interpolated
//! into statements are table names, and those come exclusively from the
//! validated configuration.

use crate::config::{DbConfig, TlsMode};
use crate::ddl::quote_ident;
use crate::error::{Error, Result};
use crate::plan::PartitionDescriptor;
use mysql::prelude::Queryable;
use mysql::{Conn, Opts, OptsBuilder, SslOpts};
use std::path::PathBuf;
use tracing::{debug, info};

/// Read and mutate operations against the live catalog.
///
/// Everything except [`Catalog::execute_ddl`] is read-only. Dry-run is
/// honored inside `execute_ddl`, at the lowest point before dispatch, so
/// planning always runs against real catalog state.
pub trait Catalog {
    /// Returns the server version string.
    fn server_version(&mut self) -> Result<String>;

    /// Returns true if `table` exists in the target schema.
    fn table_exists(&mut self, table: &str) -> Result<bool>;

    /// Returns `MIN(clock)` for the table, or `None` when it holds no rows.
    ///
    /// Full-table scan on tables without a leading clock index; this is the
    /// cost the fast bootstrap strategy avoids.
    fn min_clock(&mut self, table: &str) -> Result<Option<i64>>;

    /// Returns the table's partitions with parseable integer boundaries, in
    /// boundary-ascending order.
    ///
    /// Externally created partitions whose boundary is not an integer
    /// (`MAXVALUE`) are excluded here; they still count for
    /// [`Catalog::is_partitioned`] and [`Catalog::partition_count`].
    fn partitions(&mut self, table: &str) -> Result<Vec<PartitionDescriptor>>;

    /// Returns true if the table has any named partition at all, including
    /// ones with unparseable boundaries.
    fn is_partitioned(&mut self, table: &str) -> Result<bool>;

    /// Number of named partitions, including unparseable boundaries.
    fn partition_count(&mut self, table: &str) -> Result<u64>;

    /// Returns true when partitioning by `clock` is legal: either the table
    /// has no primary key, or the primary key includes the clock column.
    fn primary_key_includes_clock(&mut self, table: &str) -> Result<bool>;

    /// Size on disk: data plus index bytes.
    fn table_size_bytes(&mut self, table: &str) -> Result<u64>;

    /// Executes one DDL statement, or logs and skips it under dry-run.
    fn execute_ddl(&mut self, statement: &str) -> Result<()>;

    /// Highest parseable partition boundary, or `None` when the table has no
    /// parseable boundaries.
    fn top_boundary(&mut self, table: &str) -> Result<Option<i64>> {
        Ok(self.partitions(table)?.last().map(|p| p.boundary))
    }
}

/// Parses a `partition_description` value into an epoch-second boundary.
///
/// `MAXVALUE` and any other non-integer description yield `None`.
pub fn parse_boundary(description: &str) -> Option<i64> {
    description.trim().parse::<i64>().ok()
}

/// [`Catalog`] implementation over one `mysql` connection.
///
/// The connection and its session settings (extended `wait_timeout`,
/// optional binary-log suppression) are acquired once and released when the
/// value is dropped, on every exit path of a run.
pub struct MySqlCatalog {
    conn: Conn,
    schema: String,
    dry_run: bool,
}

impl MySqlCatalog {
    /// Connects and applies session settings.
    ///
    /// With `replicate_ddl` false, `sql_log_bin` is disabled for the session
    /// so maintenance DDL stays out of the replication stream. Connection
    /// failure is the one fatal error of a run.
    pub fn connect(db: &DbConfig, replicate_ddl: bool, dry_run: bool) -> Result<Self> {
        let mut builder = OptsBuilder::new()
            .user(Some(db.user.as_str()))
            .pass(Some(db.password.as_str()))
            .db_name(Some(db.database.as_str()));
        builder = match &db.socket {
            Some(socket) => builder.socket(Some(socket.as_str())),
            None => builder
                .ip_or_hostname(Some(db.host.as_str()))
                .tcp_port(db.port),
        };
        builder = match &db.tls {
            TlsMode::Disabled => builder,
            TlsMode::SystemCa => builder.ssl_opts(Some(SslOpts::default())),
            TlsMode::CustomCa { ca } => builder.ssl_opts(Some(
                SslOpts::default().with_root_cert_path(Some(PathBuf::from(ca))),
            )),
        };

        info!(database = %db.database, "connecting");
        let mut conn = Conn::new(Opts::from(builder)).map_err(Error::Connect)?;

        // Session settings live for the whole run. Long DDL on large tables
        // must not be cut off by the server-side idle timeout.
        run(&mut conn, "SET SESSION wait_timeout = 86400")?;
        if !replicate_ddl {
            run(&mut conn, "SET SESSION sql_log_bin = 0")?;
        }

        Ok(Self {
            conn,
            schema: db.database.clone(),
            dry_run,
        })
    }
}

fn run(conn: &mut Conn, statement: &str) -> Result<()> {
    conn.query_drop(statement).map_err(|source| Error::Statement {
        statement: statement.to_string(),
        source,
    })
}

fn statement_error(statement: &str) -> impl FnOnce(mysql::Error) -> Error + '_ {
    move |source| Error::Statement {
        statement: statement.to_string(),
        source,
    }
}

impl Catalog for MySqlCatalog {
    fn server_version(&mut self) -> Result<String> {
        let statement = "SELECT VERSION()";
        let version: Option<String> = self
            .conn
            .query_first(statement)
            .map_err(statement_error(statement))?;
        Ok(version.unwrap_or_default())
    }

    fn table_exists(&mut self, table: &str) -> Result<bool> {
        let statement = "SELECT COUNT(*) FROM `information_schema`.`tables` \
                         WHERE `table_schema` = ? AND `table_name` = ?";
        let count: Option<i64> = self
            .conn
            .exec_first(statement, (self.schema.as_str(), table))
            .map_err(statement_error(statement))?;
        Ok(count.unwrap_or(0) > 0)
    }

    fn min_clock(&mut self, table: &str) -> Result<Option<i64>> {
        let statement = format!("SELECT MIN(`clock`) FROM {}", quote_ident(table));
        let row: Option<Option<i64>> = self
            .conn
            .query_first(&statement)
            .map_err(statement_error(&statement))?;
        Ok(row.flatten())
    }

    fn partitions(&mut self, table: &str) -> Result<Vec<PartitionDescriptor>> {
        let statement = "SELECT `partition_name`, `partition_description` \
                         FROM `information_schema`.`partitions` \
                         WHERE `table_schema` = ? AND `table_name` = ? \
                         AND `partition_name` IS NOT NULL \
                         ORDER BY `partition_ordinal_position` ASC";
        let rows: Vec<(String, Option<String>)> = self
            .conn
            .exec(statement, (self.schema.as_str(), table))
            .map_err(statement_error(statement))?;

        let mut partitions: Vec<PartitionDescriptor> = rows
            .into_iter()
            .filter_map(|(name, description)| {
                let boundary = parse_boundary(description.as_deref()?)?;
                Some(PartitionDescriptor { name, boundary })
            })
            .collect();
        partitions.sort_by_key(|p| p.boundary);
        Ok(partitions)
    }

    fn is_partitioned(&mut self, table: &str) -> Result<bool> {
        Ok(self.partition_count(table)? > 0)
    }

    fn partition_count(&mut self, table: &str) -> Result<u64> {
        let statement = "SELECT COUNT(*) FROM `information_schema`.`partitions` \
                         WHERE `table_schema` = ? AND `table_name` = ? \
                         AND `partition_name` IS NOT NULL";
        let count: Option<u64> = self
            .conn
            .exec_first(statement, (self.schema.as_str(), table))
            .map_err(statement_error(statement))?;
        Ok(count.unwrap_or(0))
    }

    fn primary_key_includes_clock(&mut self, table: &str) -> Result<bool> {
        let statement = "SELECT COUNT(*) FROM `information_schema`.`table_constraints` \
                         WHERE `constraint_type` = 'PRIMARY KEY' \
                         AND `table_schema` = ? AND `table_name` = ?";
        let pk_count: Option<i64> = self
            .conn
            .exec_first(statement, (self.schema.as_str(), table))
            .map_err(statement_error(statement))?;
        if pk_count.unwrap_or(0) == 0 {
            // No primary key, no restriction.
            return Ok(true);
        }

        let statement = "SELECT COUNT(*) FROM `information_schema`.`key_column_usage` k \
                         JOIN `information_schema`.`table_constraints` t \
                         USING (`constraint_name`, `table_schema`, `table_name`) \
                         WHERE t.`constraint_type` = 'PRIMARY KEY' \
                         AND t.`table_schema` = ? AND t.`table_name` = ? \
                         AND k.`column_name` = 'clock'";
        let clock_count: Option<i64> = self
            .conn
            .exec_first(statement, (self.schema.as_str(), table))
            .map_err(statement_error(statement))?;
        Ok(clock_count.unwrap_or(0) > 0)
    }

    fn table_size_bytes(&mut self, table: &str) -> Result<u64> {
        let statement = "SELECT COALESCE(`data_length`, 0) + COALESCE(`index_length`, 0) \
                         FROM `information_schema`.`tables` \
                         WHERE `table_schema` = ? AND `table_name` = ?";
        let size: Option<u64> = self
            .conn
            .exec_first(statement, (self.schema.as_str(), table))
            .map_err(statement_error(statement))?;
        Ok(size.unwrap_or(0))
    }

    fn execute_ddl(&mut self, statement: &str) -> Result<()> {
        if self.dry_run {
            info!(statement, "dry-run: statement not executed");
            return Ok(());
        }
        debug!(statement, "executing");
        run(&mut self.conn, statement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_boundary() {
        assert_eq!(parse_boundary("1704931200"), Some(1704931200));
        assert_eq!(parse_boundary(" 1704931200 "), Some(1704931200));
        assert_eq!(parse_boundary("MAXVALUE"), None);
        assert_eq!(parse_boundary(""), None);
        assert_eq!(parse_boundary("UNIX_TIMESTAMP('2024-01-01')"), None);
    }
}
