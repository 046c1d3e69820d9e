//! Results reporting and formatting.

use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};
use vu_engine::OperationResults;

use crate::runner::RunSummary;

/// Formats test results for output.
pub struct ResultsReport;

impl ResultsReport {
    /// Format results as console tables: run summary, per-operation
    /// statistics, then failure reasons if there were any.
    pub fn format_table(summary: &RunSummary) -> String {
        let results = &summary.results;
        let population = &summary.population;

        let mut overview = Table::new();
        overview
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![format!("Load Test Results: {}", results.name)]);

        overview.add_row(vec![
            "Duration:",
            &format!("{:.1}s", population.elapsed.as_secs_f64()),
        ]);
        overview.add_row(vec!["Users:", &format!("{}", population.users_spawned)]);
        overview.add_row(vec![
            "Iterations:",
            &format!("{}", population.total_iterations),
        ]);
        overview.add_row(vec![
            "Avg user time:",
            &format!("{:.1}s", population.avg_user_time().as_secs_f64()),
        ]);
        overview.add_row(vec![
            "Total Requests:",
            &format!("{}", results.total.requests),
        ]);
        overview.add_row(vec![
            "Success Rate:",
            &format!("{:.1}%", 100.0 - results.total.failure_rate()),
        ]);
        overview.add_row(vec![
            "Requests/sec:",
            &format!("{:.1}", results.total.requests_per_second),
        ]);

        let mut operations = Table::new();
        operations
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![
                "Operation", "Reqs", "Fails", "Fail %", "p50 ms", "p90 ms", "p95 ms", "p99 ms",
                "max ms", "req/s",
            ]);
        for op in results.operations.iter().chain(std::iter::once(&results.total)) {
            operations.add_row(operation_row(op));
        }

        let mut out = format!("{overview}\n{operations}");

        let failures: Vec<(&str, &str, u64)> = results
            .operations
            .iter()
            .flat_map(|op| {
                op.failure_reasons
                    .iter()
                    .map(move |(reason, count)| (op.name.as_str(), reason.as_str(), *count))
            })
            .collect();
        if !failures.is_empty() {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .apply_modifier(UTF8_ROUND_CORNERS)
                .set_header(vec!["Operation", "Reason", "Count"]);
            for (name, reason, count) in failures {
                table.add_row(vec![name.to_string(), reason.to_string(), count.to_string()]);
            }
            out.push('\n');
            out.push_str(&table.to_string());
        }

        out
    }

    /// Format results as JSON.
    pub fn format_json(summary: &RunSummary) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(summary)?)
    }

    /// Format results as CSV rows, one per operation plus the aggregate.
    pub fn format_csv(summary: &RunSummary) -> String {
        let results = &summary.results;
        results
            .operations
            .iter()
            .chain(std::iter::once(&results.total))
            .map(|op| {
                format!(
                    "{},{},{},{},{},{:.1},{:.1},{:.1},{:.1},{:.1}",
                    results.timestamp,
                    results.name,
                    csv_field(&op.name),
                    op.requests,
                    op.failures,
                    op.requests_per_second,
                    op.latency_p50,
                    op.latency_p90,
                    op.latency_p99,
                    op.latency_max
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// CSV header row.
    pub fn csv_header() -> &'static str {
        "timestamp,config,operation,requests,failures,rps,p50,p90,p99,max"
    }
}

fn operation_row(op: &OperationResults) -> Vec<String> {
    vec![
        op.name.clone(),
        op.requests.to_string(),
        op.failures.to_string(),
        format!("{:.1}", op.failure_rate()),
        format!("{:.1}", op.latency_p50),
        format!("{:.1}", op.latency_p90),
        format!("{:.1}", op.latency_p95),
        format!("{:.1}", op.latency_p99),
        format!("{:.1}", op.latency_max),
        format!("{:.1}", op.requests_per_second),
    ]
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
