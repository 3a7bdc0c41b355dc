//! DDL statement rendering for partition plans.
//!
//! Rendering is pure string construction; statements are executed through
//! [`crate::catalog::Catalog::execute_ddl`], which is where dry-run is
//! honored. Table identifiers come only from the validated configuration and
//! are backtick-quoted; partition boundaries are epoch-second literals, the
//! native form for a `RANGE (clock)` expression.

use crate::plan::{BootstrapPlan, PartitionDescriptor};
use std::fmt::Write;

/// Quotes an identifier for inclusion in a statement.
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

fn partition_clause(partition: &PartitionDescriptor) -> String {
    format!(
        "PARTITION {} VALUES LESS THAN ({}) ENGINE = InnoDB",
        quote_ident(&partition.name),
        partition.boundary
    )
}

/// Renders the initial conversion of an unpartitioned table:
/// `ALTER TABLE … PARTITION BY RANGE (clock) (…)`.
///
/// The archive partition, when present, leads the list so its boundary
/// precedes every granular boundary.
pub fn render_bootstrap(table: &str, plan: &BootstrapPlan) -> String {
    let mut clauses = Vec::with_capacity(plan.len());
    if let Some(archive) = &plan.archive {
        clauses.push(partition_clause(archive));
    }
    clauses.extend(plan.partitions.iter().map(partition_clause));

    let mut statement = format!(
        "ALTER TABLE {} PARTITION BY RANGE ({}) (\n",
        quote_ident(table),
        quote_ident("clock")
    );
    let _ = write!(statement, "{}\n)", clauses.join(",\n"));
    statement
}

/// Renders maintenance growth: `ALTER TABLE … ADD PARTITION (…)` with every
/// new partition in one statement, boundary-ascending.
pub fn render_additions(table: &str, partitions: &[PartitionDescriptor]) -> String {
    let clauses: Vec<String> = partitions.iter().map(partition_clause).collect();
    format!(
        "ALTER TABLE {} ADD PARTITION (\n{}\n)",
        quote_ident(table),
        clauses.join(",\n")
    )
}

/// Renders a single pruning statement: `ALTER TABLE … DROP PARTITION …`.
pub fn render_drop(table: &str, partition: &str) -> String {
    format!(
        "ALTER TABLE {} DROP PARTITION {}",
        quote_ident(table),
        quote_ident(partition)
    )
}
