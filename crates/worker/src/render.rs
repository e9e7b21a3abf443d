//! JSON and HTML renderings of a report.

use askama::Template;
use pipeline_core::{Error, Result};

use crate::report::{ErrorEntry, HourlyStats, Report, ReportMetadata, ReportSummary, TopFile};

/// One row of the hourly table.
#[derive(Debug)]
pub struct HourRow<'a> {
    pub hour: &'a str,
    pub stats: HourlyStats,
}

/// HTML report page. Values are escaped by the template engine.
#[derive(Template, Debug)]
#[template(path = "report.html")]
pub struct ReportPage<'a> {
    pub meta: &'a ReportMetadata,
    pub summary: &'a ReportSummary,
    pub hours: Vec<HourRow<'a>>,
    pub top_files: &'a [TopFile],
    pub errors: &'a [ErrorEntry],
}

impl<'a> ReportPage<'a> {
    pub fn new(report: &'a Report) -> Self {
        Self {
            meta: &report.report_metadata,
            summary: &report.summary,
            hours: report
                .hourly_breakdown
                .iter()
                .map(|(hour, stats)| HourRow {
                    hour: hour.as_str(),
                    stats: *stats,
                })
                .collect(),
            top_files: &report.top_files,
            errors: &report.errors,
        }
    }
}

pub fn render_json(report: &Report) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

pub fn render_html(report: &Report) -> Result<String> {
    ReportPage::new(report)
        .render()
        .map_err(|e| Error::internal(format!("failed to render HTML report: {}", e)))
}
