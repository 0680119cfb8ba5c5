use std::time::{Duration, Instant};

use birdbox_client::{ApiClient, Filter, FilterOperator, Query};
use color_eyre::eyre::{Result, WrapErr, bail, eyre};
use futures_util::FutureExt;
use serde_json::{Map, Value};
use tracing::{error, info};

use crate::args::DbType;
use crate::snapshot::assert_rows_snapshot;

const STATUS_MEMBER: &str = "Orders.status";
const COUNT_MEASURE: &str = "Orders.count";
const TOTAL_AMOUNT_MEASURE: &str = "Orders.totalAmount";

/// One label + query pairing driven against the server.
#[derive(Debug, Clone)]
pub struct QueryCase {
    pub name: String,
    pub query: Query,
}

/// A (label, values) row of one filter-operator family's matrix.
#[derive(Debug, Clone, Copy)]
pub struct FilterCase {
    pub name: &'static str,
    pub values: &'static [&'static str],
}

pub const CONTAINS_CASES: &[FilterCase] = &[
    FilterCase {
        name: "contains_e",
        values: &["e"],
    },
    FilterCase {
        name: "contains_es",
        values: &["es"],
    },
    FilterCase {
        name: "contains_es_w",
        values: &["es", "w"],
    },
    FilterCase {
        name: "contains_a",
        values: &["a"],
    },
];

pub const STARTS_WITH_CASES: &[FilterCase] = &[
    FilterCase {
        name: "starts_with_a",
        values: &["a"],
    },
    FilterCase {
        name: "starts_with_n",
        values: &["n"],
    },
    FilterCase {
        name: "starts_with_p",
        values: &["p"],
    },
    FilterCase {
        name: "starts_with_sh",
        values: &["sh"],
    },
    FilterCase {
        name: "starts_with_n_p_s",
        values: &["n", "p", "s"],
    },
];

pub const ENDS_WITH_CASES: &[FilterCase] = &[
    FilterCase {
        name: "ends_with_a",
        values: &["a"],
    },
    FilterCase {
        name: "ends_with_w",
        values: &["w"],
    },
    FilterCase {
        name: "ends_with_sed",
        values: &["sed"],
    },
    FilterCase {
        name: "ends_with_ped",
        values: &["ped"],
    },
    FilterCase {
        name: "ends_with_w_sed_ped",
        values: &["w", "sed", "ped"],
    },
];

/// Total amount grouped by status, the first query every database gets.
fn baseline_case() -> QueryCase {
    QueryCase {
        name: "query_total_amount_by_status".to_string(),
        query: Query {
            measures: vec![TOTAL_AMOUNT_MEASURE.to_string()],
            dimensions: vec![STATUS_MEMBER.to_string()],
            ..Query::default()
        },
    }
}

fn filter_case(operator: FilterOperator, case: &FilterCase) -> QueryCase {
    QueryCase {
        name: case.name.to_string(),
        query: Query {
            measures: vec![COUNT_MEASURE.to_string()],
            filters: vec![Filter {
                member: STATUS_MEMBER.to_string(),
                operator,
                values: case.values.iter().map(|v| v.to_string()).collect(),
            }],
            ..Query::default()
        },
    }
}

/// Every case the driver runs, in execution order: the baseline query, then
/// the three filter-operator families.
pub fn all_cases() -> Vec<QueryCase> {
    let mut cases = vec![baseline_case()];
    cases.extend(
        CONTAINS_CASES
            .iter()
            .map(|c| filter_case(FilterOperator::Contains, c)),
    );
    cases.extend(
        STARTS_WITH_CASES
            .iter()
            .map(|c| filter_case(FilterOperator::StartsWith, c)),
    );
    cases.extend(
        ENDS_WITH_CASES
            .iter()
            .map(|c| filter_case(FilterOperator::EndsWith, c)),
    );
    cases
}

/// Outcome of one full run.
#[derive(Debug, Default)]
pub struct SuiteReport {
    pub passed: Vec<(String, Duration)>,
    pub failed: Vec<(String, color_eyre::eyre::Report)>,
}

impl SuiteReport {
    /// Log the summary and error out if any case failed.
    pub fn finish(self) -> Result<()> {
        for (name, duration) in &self.passed {
            info!("test passed: {} ({:.2}s)", name, duration.as_secs_f64());
        }
        for (name, err) in &self.failed {
            error!("test failed: {}: {:#}", name, err);
        }
        if !self.failed.is_empty() {
            bail!(
                "{} test(s) failed out of {}",
                self.failed.len(),
                self.passed.len() + self.failed.len()
            );
        }
        Ok(())
    }
}

/// Run the whole matrix against a live server, asserting every response
/// against its stored snapshot.
pub async fn run_suite(client: &ApiClient, db_type: DbType) -> SuiteReport {
    run_cases(client, all_cases(), |case, rows| {
        assert_rows_snapshot(db_type, &case.name, rows);
        Ok(())
    })
    .await
}

/// Run cases in order, one blocking round trip at a time. A failing or
/// panicking check marks its case and the run moves on to the siblings.
pub async fn run_cases<F>(client: &ApiClient, cases: Vec<QueryCase>, check: F) -> SuiteReport
where
    F: Fn(&QueryCase, &[Map<String, Value>]) -> Result<()>,
{
    let mut report = SuiteReport::default();

    for case in cases {
        let start = Instant::now();
        info!("running test: {}", case.name);

        let attempt = async {
            let response = client
                .load(&case.query)
                .await
                .wrap_err_with(|| format!("loading query for {}", case.name))?;
            check(&case, response.raw_data())
        };

        match std::panic::AssertUnwindSafe(attempt).catch_unwind().await {
            Ok(Ok(())) => report.passed.push((case.name, start.elapsed())),
            Ok(Err(e)) => report.failed.push((case.name, e)),
            Err(panic_payload) => {
                let msg = if let Some(s) = panic_payload.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic_payload.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "unknown panic".to_string()
                };
                report.failed.push((case.name, eyre!("panic: {msg}")));
            }
        }
    }

    report
}
