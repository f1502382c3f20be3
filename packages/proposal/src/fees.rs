//! Dollar formatting and fee table layout.

use site_lookup_proposal_models::{FeeSchedule, ScopeTask};

/// Groups digits in threes: `59560` -> `59,560`.
#[must_use]
pub fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}

/// Formats integer cents as US dollars: `$5,000`, or `$1,234.50` when
/// the cents are non-zero.
#[must_use]
pub fn format_usd(cents: u64) -> String {
    let dollars = group_thousands(cents / 100);
    match cents % 100 {
        0 => format!("${dollars}"),
        rem => format!("${dollars}.{rem:02}"),
    }
}

/// One task line in the fee table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeRow {
    pub title: String,
    /// Per-task fee; `None` under a flat schedule.
    pub fee_cents: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeTable {
    pub rows: Vec<FeeRow>,
    pub total_cents: u64,
}

/// Lays out the fee table for a task list.
///
/// Returns `None` when per-task fees are missing or their sum overflows;
/// validation reports both before a document is assembled.
#[must_use]
pub fn fee_table(tasks: &[ScopeTask], schedule: FeeSchedule) -> Option<FeeTable> {
    match schedule {
        FeeSchedule::Flat { total_cents } => Some(FeeTable {
            rows: tasks
                .iter()
                .map(|t| FeeRow {
                    title: t.title.trim().to_string(),
                    fee_cents: None,
                })
                .collect(),
            total_cents,
        }),
        FeeSchedule::PerTask => {
            let mut total_cents = 0u64;
            let mut rows = Vec::with_capacity(tasks.len());
            for task in tasks {
                let fee = task.fee_cents?;
                total_cents = total_cents.checked_add(fee)?;
                rows.push(FeeRow {
                    title: task.title.trim().to_string(),
                    fee_cents: Some(fee),
                });
            }
            Some(FeeTable { rows, total_cents })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(title: &str, fee_cents: Option<u64>) -> ScopeTask {
        ScopeTask {
            id: None,
            title: title.to_string(),
            description: None,
            fee_cents,
        }
    }

    #[test]
    fn formats_dollars_with_grouping() {
        assert_eq!(format_usd(500_000), "$5,000");
        assert_eq!(format_usd(0), "$0");
        assert_eq!(format_usd(99), "$0.99");
        assert_eq!(format_usd(123_450), "$1,234.50");
        assert_eq!(format_usd(100_000_000), "$1,000,000");
        assert_eq!(format_usd(12_345), "$123.45");
        assert_eq!(group_thousands(59_560), "59,560");
        assert_eq!(group_thousands(999), "999");
    }

    #[test]
    fn flat_schedule_has_single_total() {
        let tasks = [task("Survey", Some(100)), task("Site plan", None)];
        let table = fee_table(&tasks, FeeSchedule::Flat { total_cents: 500_000 }).unwrap();
        assert_eq!(table.total_cents, 500_000);
        assert!(table.rows.iter().all(|r| r.fee_cents.is_none()));
    }

    #[test]
    fn per_task_total_is_the_sum() {
        let tasks = [task("Survey", Some(150_000)), task("Site plan", Some(250_050))];
        let table = fee_table(&tasks, FeeSchedule::PerTask).unwrap();
        assert_eq!(table.total_cents, 400_050);
        assert_eq!(table.rows[1].fee_cents, Some(250_050));
    }

    #[test]
    fn per_task_without_fee_has_no_table() {
        let tasks = [task("Survey", Some(150_000)), task("Site plan", None)];
        assert!(fee_table(&tasks, FeeSchedule::PerTask).is_none());
        let overflow = [task("A", Some(u64::MAX)), task("B", Some(1))];
        assert!(fee_table(&overflow, FeeSchedule::PerTask).is_none());
    }
}
