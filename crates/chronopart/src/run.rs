//! Run orchestration: mode dispatch and per-table error isolation.
//!
//! A run is strictly sequential: one connection, one table at a time, one
//! statement in flight. Connecting happens before the [`Runner`] exists
//! (constructing the catalog is the `Connected` state); per-table failures
//! inside init/maintain are caught and recorded in the [`RunSummary`] while
//! the run continues with the next table. Only a lost connection unwinds the
//! whole run.

use crate::catalog::Catalog;
use crate::config::{RunConfig, TableConfig};
use crate::ddl;
use crate::error::{Error, Result};
use crate::plan::{self, BootstrapPlan};
use crate::report::{self, DiscoveryEntry, TableStats};
use chrono::NaiveDateTime;
use tracing::{error, info, warn};

/// Operating mode for one run. Dry-run is orthogonal: it lives in the
/// catalog executor, not here, so planning and reads stay live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Grow future partitions and prune expired ones (the default).
    Maintain,
    /// Convert unpartitioned tables, scanning each for its oldest row.
    InitScan,
    /// Convert unpartitioned tables from the retention window, with an
    /// archive partition absorbing older rows; skips the table scan.
    InitFast,
    /// Emit the configured table/period pairs for the monitoring system.
    Discovery,
    /// Emit statistics for one configured table.
    Stats(String),
}

/// Bootstrap strategy selected by the init modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InitStrategy {
    Scan,
    Fast,
}

/// What a run produced: a monitoring report or a maintenance summary.
#[derive(Debug)]
pub enum RunOutput {
    /// Discovery records.
    Discovery(Vec<DiscoveryEntry>),
    /// Statistics for one table.
    Stats(TableStats),
    /// Per-table outcome of an init or maintain run.
    Summary(RunSummary),
}

/// Per-table outcome of an init or maintain run.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Tables processed to completion.
    pub completed: Vec<String>,
    /// Tables skipped by a precondition, with the reason. Skips are
    /// expected conditions, not failures.
    pub skipped: Vec<(String, String)>,
    /// Tables that failed outright, with the error.
    pub failed: Vec<(String, Error)>,
}

impl RunSummary {
    /// Returns true if any table failed outright.
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

enum TableOutcome {
    Completed,
    Skipped(String),
}

/// Drives one run over a connected catalog.
pub struct Runner<'a, C: Catalog + ?Sized> {
    config: &'a RunConfig,
    catalog: &'a mut C,
}

impl<'a, C: Catalog + ?Sized> Runner<'a, C> {
    /// Creates a runner over a validated configuration and an open catalog.
    pub fn new(config: &'a RunConfig, catalog: &'a mut C) -> Self {
        Self { config, catalog }
    }

    /// Executes one run in the given mode.
    ///
    /// `now` is the instant all planning is relative to; passing it in keeps
    /// every run deterministic and testable. `confirm` gates each initial
    /// conversion (a blocking, disk-doubling operation); callers wire it to
    /// a prompt, an auto-approval, or a policy of their choosing.
    pub fn run(
        &mut self,
        mode: &Mode,
        now: NaiveDateTime,
        confirm: &mut dyn FnMut(&str) -> bool,
    ) -> Result<RunOutput> {
        let strategy = match mode {
            Mode::Discovery => return Ok(RunOutput::Discovery(report::discovery(self.config))),
            Mode::Stats(table) => {
                return Ok(RunOutput::Stats(report::stats(
                    self.catalog,
                    self.config,
                    table,
                    now,
                )?))
            }
            Mode::Maintain => None,
            Mode::InitScan => Some(InitStrategy::Scan),
            Mode::InitFast => Some(InitStrategy::Fast),
        };

        let version = self.catalog.server_version()?;
        info!(version = %version, "server");

        let mut summary = RunSummary::default();
        let tables = self.config.tables.clone();
        for entry in &tables {
            let outcome = match strategy {
                None => self.maintain_table(entry, now),
                Some(strategy) => self.init_table(entry, strategy, now, confirm),
            };
            match outcome {
                Ok(TableOutcome::Completed) => summary.completed.push(entry.table.clone()),
                Ok(TableOutcome::Skipped(reason)) => {
                    summary.skipped.push((entry.table.clone(), reason))
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    error!(table = %entry.table, error = %err, "table failed");
                    summary.failed.push((entry.table.clone(), err));
                }
            }
        }
        info!(
            completed = summary.completed.len(),
            skipped = summary.skipped.len(),
            failed = summary.failed.len(),
            "run finished"
        );
        Ok(RunOutput::Summary(summary))
    }

    fn maintain_table(&mut self, entry: &TableConfig, now: NaiveDateTime) -> Result<TableOutcome> {
        if !self.catalog.table_exists(&entry.table)? {
            return Err(Error::TableNotFound {
                table: entry.table.clone(),
            });
        }
        if !self.catalog.is_partitioned(&entry.table)? {
            warn!(table = %entry.table, "not partitioned; run init first");
            return Ok(TableOutcome::Skipped("not partitioned".to_string()));
        }

        let top = self.catalog.top_boundary(&entry.table)?;
        let additions = plan::plan_additions(top, now, entry.granularity, self.config.premake)?;
        if !additions.is_empty() {
            info!(
                table = %entry.table,
                count = additions.len(),
                "adding future partitions"
            );
            self.catalog
                .execute_ddl(&ddl::render_additions(&entry.table, &additions))?;
        }

        let cutoff = entry.retention.cutoff(now)?;
        let existing = self.catalog.partitions(&entry.table)?;
        let removals = plan::plan_removals(&existing, cutoff);
        if !removals.is_empty() {
            info!(
                table = %entry.table,
                count = removals.len(),
                retention = %entry.retention,
                "dropping expired partitions"
            );
        }
        for partition in &removals {
            self.catalog
                .execute_ddl(&ddl::render_drop(&entry.table, &partition.name))?;
        }

        Ok(TableOutcome::Completed)
    }

    fn init_table(
        &mut self,
        entry: &TableConfig,
        strategy: InitStrategy,
        now: NaiveDateTime,
        confirm: &mut dyn FnMut(&str) -> bool,
    ) -> Result<TableOutcome> {
        if !self.catalog.table_exists(&entry.table)? {
            return Err(Error::TableNotFound {
                table: entry.table.clone(),
            });
        }
        if !self.catalog.primary_key_includes_clock(&entry.table)? {
            error!(
                table = %entry.table,
                "cannot partition: primary key does not include the clock column"
            );
            return Ok(TableOutcome::Skipped(
                "primary key does not include clock".to_string(),
            ));
        }
        if self.catalog.is_partitioned(&entry.table)? {
            info!(table = %entry.table, "already partitioned");
            return Ok(TableOutcome::Skipped("already partitioned".to_string()));
        }

        let plan = match strategy {
            InitStrategy::Scan => {
                info!(table = %entry.table, "scanning for oldest row (may be slow)");
                let min_clock = self.catalog.min_clock(&entry.table)?;
                plan::plan_bootstrap_scan(min_clock, now, entry.granularity, self.config.premake)?
            }
            InitStrategy::Fast => plan::plan_bootstrap_fast(
                entry.retention,
                now,
                entry.granularity,
                self.config.premake,
            )?,
        };
        if plan.is_empty() {
            info!(table = %entry.table, "nothing to create");
            return Ok(TableOutcome::Skipped("empty bootstrap plan".to_string()));
        }

        warn!(
            table = %entry.table,
            partitions = plan.len(),
            "initial conversion rewrites the whole table: it blocks writes and \
             temporarily doubles disk usage"
        );
        if !confirm(&entry.table) {
            info!(table = %entry.table, "conversion declined");
            return Ok(TableOutcome::Skipped("declined by caller".to_string()));
        }

        self.apply_bootstrap(&entry.table, &plan)
    }

    fn apply_bootstrap(&mut self, table: &str, plan: &BootstrapPlan) -> Result<TableOutcome> {
        info!(table, partitions = plan.len(), "applying initial partitioning");
        self.catalog
            .execute_ddl(&ddl::render_bootstrap(table, plan))?;
        Ok(TableOutcome::Completed)
    }
}
