//! Partition naming, boundary encoding and plan computation.
//!
//! Planning is pure: every function takes the current instant and a snapshot
//! of catalog state as arguments and returns the partition set to create or
//! drop. Executing a plan is the catalog executor's job.
//!
//! # Boundaries
//!
//! A partition named for period start `s` holds rows with
//! `clock < boundary`, where the boundary is the start of the period after
//! `s`. Planning only ever reasons about boundaries; dropping by a
//! partition's start would discard live rows.

use crate::calendar::{advance, from_epoch, to_epoch, truncate, Granularity, RetentionSpec};
use crate::error::{Error, Result};
use chrono::{Datelike, NaiveDateTime, Timelike};

/// Name of the catch-all partition synthesized by fast bootstrap.
pub const ARCHIVE_PARTITION: &str = "p_archive";

/// A planned or discovered partition: name plus exclusive upper bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionDescriptor {
    /// Partition name, unique per period instance.
    pub name: String,
    /// Exclusive upper bound in UNIX epoch seconds.
    pub boundary: i64,
}

/// Derives the partition name for the period containing `instant`.
///
/// Names are fixed-format and lexicographically sortable within one
/// granularity: `p2024_01_10_13h`, `p2024_01_10`, `p2024_02w`, `p2024_01`,
/// `p2024`. Weekly names use the ISO week year and week number, consistent
/// with Monday-anchored truncation.
pub fn partition_name(instant: NaiveDateTime, granularity: Granularity) -> String {
    let start = truncate(instant, granularity);
    match granularity {
        Granularity::Hourly => format!(
            "p{}_{:02}_{:02}_{:02}h",
            start.year(),
            start.month(),
            start.day(),
            start.hour()
        ),
        Granularity::Daily => {
            format!("p{}_{:02}_{:02}", start.year(), start.month(), start.day())
        }
        Granularity::Weekly => {
            let week = start.iso_week();
            format!("p{}_{:02}w", week.year(), week.week())
        }
        Granularity::Monthly => format!("p{}_{:02}", start.year(), start.month()),
        Granularity::Yearly => format!("p{}", start.year()),
    }
}

/// Returns the exclusive upper bound for the period containing `instant`:
/// the start of the immediately following period, in epoch seconds.
pub fn partition_boundary(instant: NaiveDateTime, granularity: Granularity) -> Result<i64> {
    Ok(to_epoch(advance(truncate(instant, granularity), granularity, 1)?))
}

fn descriptor(instant: NaiveDateTime, granularity: Granularity) -> Result<PartitionDescriptor> {
    Ok(PartitionDescriptor {
        name: partition_name(instant, granularity),
        boundary: partition_boundary(instant, granularity)?,
    })
}

/// Computes the future partitions that must exist for maintenance.
///
/// Starts from the highest existing boundary (or the current period if the
/// table has no parseable boundaries) and fills every period up to, but not
/// including, `premake` periods past the current one. An empty plan means no
/// DDL is required. The result is boundary-ascending, which the catalog
/// requires for `ADD PARTITION` on a RANGE-partitioned table.
pub fn plan_additions(
    top_boundary: Option<i64>,
    now: NaiveDateTime,
    granularity: Granularity,
    premake: u32,
) -> Result<Vec<PartitionDescriptor>> {
    let anchor = truncate(now, granularity);
    let mut cursor = match top_boundary {
        Some(boundary) => from_epoch(boundary)
            .ok_or_else(|| Error::DateOutOfRange(format!("partition boundary {boundary}")))?,
        None => anchor,
    };
    let target = advance(anchor, granularity, premake.min(i32::MAX as u32) as i32)?;

    let mut plan = Vec::new();
    while cursor < target {
        plan.push(descriptor(cursor, granularity)?);
        cursor = advance(cursor, granularity, 1)?;
    }
    Ok(plan)
}

/// Selects the partitions whose entire contents have aged past `cutoff`.
///
/// A partition is eligible iff its boundary is at or before the cutoff:
/// every contained row satisfies `clock < boundary <= cutoff`. Partitions are
/// never judged by their start.
pub fn plan_removals(
    existing: &[PartitionDescriptor],
    cutoff: NaiveDateTime,
) -> Vec<PartitionDescriptor> {
    let cutoff = to_epoch(cutoff);
    existing
        .iter()
        .filter(|partition| partition.boundary <= cutoff)
        .cloned()
        .collect()
}

/// The partition set for converting an unpartitioned table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapPlan {
    /// Catch-all partition absorbing rows older than the granular span.
    /// Present only for the fast strategy.
    pub archive: Option<PartitionDescriptor>,
    /// Granular partitions in boundary-ascending order.
    pub partitions: Vec<PartitionDescriptor>,
}

impl BootstrapPlan {
    /// Total number of partitions the plan would create.
    pub fn len(&self) -> usize {
        self.partitions.len() + usize::from(self.archive.is_some())
    }

    /// Returns true if the plan creates no partitions.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Bootstrap plan for the scan strategy.
///
/// The span starts at the oldest row's period (`min_clock`), or at the
/// current period for an empty table, and runs through the premake horizon.
/// No archive partition is created; the full history is partitioned
/// granule-by-granule.
pub fn plan_bootstrap_scan(
    min_clock: Option<i64>,
    now: NaiveDateTime,
    granularity: Granularity,
    premake: u32,
) -> Result<BootstrapPlan> {
    let start = match min_clock {
        Some(clock) => truncate(
            from_epoch(clock)
                .ok_or_else(|| Error::DateOutOfRange(format!("min clock {clock}")))?,
            granularity,
        ),
        None => truncate(now, granularity),
    };
    Ok(BootstrapPlan {
        archive: None,
        partitions: granular_span(start, now, granularity, premake)?,
    })
}

/// Bootstrap plan for the fast strategy.
///
/// The granular span starts at the retention cutoff's period; a catch-all
/// archive partition bounded at that start absorbs every older row, so the
/// RANGE definition covers the whole table without scanning it.
pub fn plan_bootstrap_fast(
    retention: RetentionSpec,
    now: NaiveDateTime,
    granularity: Granularity,
    premake: u32,
) -> Result<BootstrapPlan> {
    let start = truncate(retention.cutoff(now)?, granularity);
    Ok(BootstrapPlan {
        archive: Some(PartitionDescriptor {
            name: ARCHIVE_PARTITION.to_string(),
            boundary: to_epoch(start),
        }),
        partitions: granular_span(start, now, granularity, premake)?,
    })
}

fn granular_span(
    start: NaiveDateTime,
    now: NaiveDateTime,
    granularity: Granularity,
    premake: u32,
) -> Result<Vec<PartitionDescriptor>> {
    let target = advance(
        truncate(now, granularity),
        granularity,
        premake.min(i32::MAX as u32) as i32,
    )?;
    let mut partitions = Vec::new();
    let mut cursor = start;
    while cursor < target {
        partitions.push(descriptor(cursor, granularity)?);
        cursor = advance(cursor, granularity, 1)?;
    }
    Ok(partitions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, mo: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn epoch(y: i32, mo: u32, d: u32) -> i64 {
        to_epoch(at(y, mo, d, 0))
    }

    #[test]
    fn test_partition_names_per_granularity() {
        let t = at(2024, 1, 10, 13);
        assert_eq!(partition_name(t, Granularity::Hourly), "p2024_01_10_13h");
        assert_eq!(partition_name(t, Granularity::Daily), "p2024_01_10");
        assert_eq!(partition_name(t, Granularity::Weekly), "p2024_02w");
        assert_eq!(partition_name(t, Granularity::Monthly), "p2024_01");
        assert_eq!(partition_name(t, Granularity::Yearly), "p2024");
    }

    #[test]
    fn test_monthly_names_sort_lexicographically() {
        let mut names: Vec<String> = (1..=12)
            .map(|month| partition_name(at(2024, month, 5, 0), Granularity::Monthly))
            .collect();
        let sorted = names.clone();
        names.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    fn test_boundary_is_start_of_next_period() {
        let t = at(2024, 1, 10, 13);
        assert_eq!(
            partition_boundary(t, Granularity::Daily).unwrap(),
            epoch(2024, 1, 11)
        );
        assert_eq!(
            partition_boundary(t, Granularity::Monthly).unwrap(),
            epoch(2024, 2, 1)
        );
        // Boundary is strictly greater than any instant in the period.
        assert!(partition_boundary(t, Granularity::Daily).unwrap() > to_epoch(t));
    }

    #[test]
    fn test_plan_additions_without_existing_partitions() {
        // premake=3, daily, no partitions, now=2024-01-10T00:00:
        // exactly 01-10, 01-11 and 01-12.
        let plan = plan_additions(None, at(2024, 1, 10, 0), Granularity::Daily, 3).unwrap();
        assert_eq!(
            plan.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
            ["p2024_01_10", "p2024_01_11", "p2024_01_12"]
        );
        assert_eq!(plan[0].boundary, epoch(2024, 1, 11));
        assert_eq!(plan[2].boundary, epoch(2024, 1, 13));
    }

    #[test]
    fn test_plan_additions_continues_from_top_boundary() {
        // Highest boundary is 01-11; only 01-11 and 01-12 are missing.
        let top = Some(epoch(2024, 1, 11));
        let plan = plan_additions(top, at(2024, 1, 10, 0), Granularity::Daily, 3).unwrap();
        assert_eq!(
            plan.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
            ["p2024_01_11", "p2024_01_12"]
        );
    }

    #[test]
    fn test_plan_additions_fills_gap_after_downtime() {
        // Coverage stops at 01-05; the plan back-fills up to the horizon.
        let top = Some(epoch(2024, 1, 5));
        let plan = plan_additions(top, at(2024, 1, 10, 0), Granularity::Daily, 2).unwrap();
        assert_eq!(plan.len(), 7);
        assert_eq!(plan[0].name, "p2024_01_05");
        assert_eq!(plan[6].name, "p2024_01_11");
    }

    #[test]
    fn test_plan_additions_empty_when_covered() {
        let top = Some(epoch(2024, 1, 20));
        let plan = plan_additions(top, at(2024, 1, 10, 0), Granularity::Daily, 3).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_plan_additions_is_boundary_ascending() {
        let plan = plan_additions(None, at(2024, 1, 10, 0), Granularity::Hourly, 48).unwrap();
        assert!(plan.windows(2).all(|w| w[0].boundary < w[1].boundary));
    }

    #[test]
    fn test_plan_removals_selects_by_upper_bound() {
        let existing = vec![
            PartitionDescriptor {
                name: "a".into(),
                boundary: 100,
            },
            PartitionDescriptor {
                name: "b".into(),
                boundary: 200,
            },
            PartitionDescriptor {
                name: "c".into(),
                boundary: 300,
            },
        ];
        let cutoff = from_epoch(250).unwrap();
        let drops = plan_removals(&existing, cutoff);
        assert_eq!(
            drops.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
            ["a", "b"]
        );
    }

    #[test]
    fn test_plan_removals_boundary_equal_to_cutoff_is_dropped() {
        let existing = vec![PartitionDescriptor {
            name: "edge".into(),
            boundary: 250,
        }];
        assert_eq!(plan_removals(&existing, from_epoch(250).unwrap()).len(), 1);
        assert!(plan_removals(&existing, from_epoch(249).unwrap()).is_empty());
    }

    #[test]
    fn test_bootstrap_scan_empty_table_starts_now() {
        let plan = plan_bootstrap_scan(None, at(2024, 1, 10, 0), Granularity::Daily, 2).unwrap();
        assert!(plan.archive.is_none());
        assert_eq!(
            plan.partitions
                .iter()
                .map(|p| p.name.as_str())
                .collect::<Vec<_>>(),
            ["p2024_01_10", "p2024_01_11"]
        );
    }

    #[test]
    fn test_bootstrap_scan_covers_oldest_row() {
        let min_clock = Some(to_epoch(at(2024, 1, 7, 15)));
        let plan =
            plan_bootstrap_scan(min_clock, at(2024, 1, 10, 0), Granularity::Daily, 1).unwrap();
        assert_eq!(plan.partitions[0].name, "p2024_01_07");
        // First boundary covers the oldest row.
        assert!(plan.partitions[0].boundary > min_clock.unwrap());
        assert_eq!(plan.partitions.last().unwrap().name, "p2024_01_10");
    }

    #[test]
    fn test_bootstrap_fast_archive_boundary_is_truncated_cutoff() {
        let now = at(2024, 1, 15, 10);
        let retention: RetentionSpec = "14d".parse().unwrap();
        let plan = plan_bootstrap_fast(retention, now, Granularity::Daily, 2).unwrap();

        let archive = plan.archive.unwrap();
        assert_eq!(archive.name, ARCHIVE_PARTITION);
        assert_eq!(archive.boundary, epoch(2024, 1, 1));
        // The first granular partition starts exactly at the archive boundary:
        // no row at or after it is left to the archive.
        assert_eq!(plan.partitions[0].name, "p2024_01_01");
        assert_eq!(plan.partitions[0].boundary, epoch(2024, 1, 2));
        assert_eq!(plan.partitions.last().unwrap().name, "p2024_01_16");
    }

    #[test]
    fn test_bootstrap_plan_len() {
        let now = at(2024, 1, 10, 0);
        let fast =
            plan_bootstrap_fast("2d".parse().unwrap(), now, Granularity::Daily, 1).unwrap();
        // Archive + 01-08 through 01-10.
        assert_eq!(fast.len(), 4);
        assert!(!fast.is_empty());
    }
}
