//! Rendering of analysis reports.
//!
//! Three formatters are provided: [`JsonFormatter`] for programmatic
//! consumption, [`HumanFormatter`] for terminals and logs, and
//! [`MarkdownFormatter`] for tickets and shift reports.
//!
//! # Examples
//!
//! ```rust
//! use warehouse_guard::formatters::{FormatterConfig, HumanFormatter, ReportFormatter};
//!
//! let formatter = HumanFormatter::with_config(FormatterConfig::ci());
//! // let output = formatter.format(&report)?;
//! ```

use std::fmt::{self, Write};

use serde_json::json;

use crate::core::{AnalysisReport, Anomaly, Priority, RuleStatus};
use crate::prelude::*;

/// Configuration options for formatting reports.
#[derive(Debug, Clone)]
pub struct FormatterConfig {
    /// Include the summary counts and per-rule performance
    pub include_metrics: bool,
    /// Include individual anomalies
    pub include_anomalies: bool,
    /// Include the column mapping report
    pub include_mapping: bool,
    /// Include run warnings
    pub include_warnings: bool,
    /// Maximum number of anomalies to display (-1 for all)
    pub max_anomalies: i32,
    /// Whether to use colorized output (human formatter)
    pub use_colors: bool,
    /// Whether to include the reference time
    pub include_timestamps: bool,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            include_metrics: true,
            include_anomalies: true,
            include_mapping: true,
            include_warnings: true,
            max_anomalies: -1,
            use_colors: true,
            include_timestamps: true,
        }
    }
}

impl FormatterConfig {
    /// Summary counts only.
    pub fn minimal() -> Self {
        Self {
            include_metrics: true,
            include_anomalies: false,
            include_mapping: false,
            include_warnings: false,
            max_anomalies: 0,
            use_colors: false,
            include_timestamps: false,
        }
    }

    /// Everything.
    pub fn detailed() -> Self {
        Self::default()
    }

    /// Uncolored output with a bounded anomaly list.
    pub fn ci() -> Self {
        Self {
            include_metrics: true,
            include_anomalies: true,
            include_mapping: false,
            include_warnings: true,
            max_anomalies: 50,
            use_colors: false,
            include_timestamps: true,
        }
    }

    /// Sets whether to include metrics.
    pub fn with_metrics(mut self, include: bool) -> Self {
        self.include_metrics = include;
        self
    }

    /// Sets whether to include individual anomalies.
    pub fn with_anomalies(mut self, include: bool) -> Self {
        self.include_anomalies = include;
        self
    }

    /// Sets the maximum number of anomalies to display.
    pub fn with_max_anomalies(mut self, max: i32) -> Self {
        self.max_anomalies = max;
        self
    }

    /// Sets whether to use colorized output.
    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    fn visible<'a>(&self, anomalies: &'a [Anomaly]) -> &'a [Anomaly] {
        if !self.include_anomalies {
            return &[];
        }
        if self.max_anomalies < 0 {
            anomalies
        } else {
            &anomalies[..anomalies.len().min(self.max_anomalies as usize)]
        }
    }
}

/// Renders an [`AnalysisReport`] into a string.
pub trait ReportFormatter {
    /// Formats a report with the formatter's own configuration.
    fn format(&self, report: &AnalysisReport) -> Result<String>;

    /// Formats a report with a custom configuration.
    fn format_with_config(
        &self,
        report: &AnalysisReport,
        _config: &FormatterConfig,
    ) -> Result<String> {
        self.format(report)
    }
}

fn render_failed(e: fmt::Error) -> WarehouseError {
    WarehouseError::Internal(format!("Failed to render report: {e}"))
}

/// Formats reports as JSON.
#[derive(Debug, Clone)]
pub struct JsonFormatter {
    config: FormatterConfig,
    pretty: bool,
}

impl JsonFormatter {
    /// Creates a JSON formatter with the default configuration.
    pub fn new() -> Self {
        Self {
            config: FormatterConfig::default(),
            pretty: true,
        }
    }

    /// Creates a JSON formatter with the given configuration.
    pub fn with_config(config: FormatterConfig) -> Self {
        Self {
            config,
            pretty: true,
        }
    }

    /// Sets whether to pretty-print.
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportFormatter for JsonFormatter {
    fn format(&self, report: &AnalysisReport) -> Result<String> {
        self.format_with_config(report, &self.config)
    }

    fn format_with_config(
        &self,
        report: &AnalysisReport,
        config: &FormatterConfig,
    ) -> Result<String> {
        let filtered = filter_report(report, config);
        let value = if config.include_metrics {
            serde_json::to_value(&filtered)?
        } else {
            json!({
                "warehouse_id": filtered.warehouse_id,
                "config_fingerprint": filtered.config_fingerprint,
                "anomalies": filtered.anomalies,
                "warnings": filtered.warnings,
            })
        };

        let rendered = if self.pretty {
            serde_json::to_string_pretty(&value)
        } else {
            serde_json::to_string(&value)
        };
        rendered.map_err(|e| WarehouseError::Internal(format!("Failed to serialize report: {e}")))
    }
}

/// Formats reports for terminals.
#[derive(Debug, Clone)]
pub struct HumanFormatter {
    config: FormatterConfig,
}

impl HumanFormatter {
    /// Creates a human formatter with the default configuration.
    pub fn new() -> Self {
        Self {
            config: FormatterConfig::default(),
        }
    }

    /// Creates a human formatter with the given configuration.
    pub fn with_config(config: FormatterConfig) -> Self {
        Self { config }
    }

    fn paint(text: &str, color: &str, config: &FormatterConfig) -> String {
        if config.use_colors {
            format!("\x1b[{color}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    fn priority_color(priority: Priority) -> &'static str {
        match priority {
            Priority::VeryHigh => "1;31",
            Priority::High => "31",
            Priority::Medium => "33",
            Priority::Low => "34",
        }
    }

    fn render_into(
        out: &mut String,
        report: &AnalysisReport,
        config: &FormatterConfig,
    ) -> fmt::Result {
        let summary = &report.summary;
        writeln!(out)?;
        if report.has_anomalies() {
            let headline = format!("{} anomalies found", summary.anomalies);
            writeln!(out, "⚠️  {}", Self::paint(&headline, "31", config))?;
        } else {
            writeln!(out, "✅ {}", Self::paint("No anomalies found", "32", config))?;
        }
        writeln!(out)?;
        writeln!(out, "Warehouse: {}", report.warehouse_id)?;
        if config.include_timestamps {
            writeln!(out, "Reference time: {}", report.reference_time.to_rfc3339())?;
        }

        if config.include_metrics {
            writeln!(out)?;
            writeln!(out, "📊 Summary:")?;
            writeln!(out, "   Records: {}", summary.total_records)?;
            writeln!(
                out,
                "   Locations: {} ({} invalid)",
                summary.distinct_locations, summary.invalid_locations
            )?;
            writeln!(
                out,
                "   Rules: {} evaluated, {} failed, {} skipped",
                summary.rules_evaluated, summary.rules_failed, summary.rules_skipped
            )?;
            writeln!(
                out,
                "   Candidates: {} ({} suppressed, {} narrowed by precedence)",
                summary.candidates, summary.suppressed, summary.narrowed
            )?;
            for (priority, count) in &summary.by_priority {
                let label = Self::paint(priority.as_str(), Self::priority_color(*priority), config);
                writeln!(out, "   {label}: {count}")?;
            }
            writeln!(out, "   Duration: {}ms", summary.total_duration.as_millis())?;

            writeln!(out)?;
            writeln!(out, "⏱️  Rules:")?;
            for rule in &report.rule_performance {
                let status = match &rule.status {
                    RuleStatus::Completed => "ok".to_string(),
                    RuleStatus::Failed { error } => format!("failed: {error}"),
                    RuleStatus::Skipped { reason } => format!("skipped: {reason}"),
                };
                writeln!(
                    out,
                    "   {} ({}) {}/{} in {}µs [{status}]",
                    rule.rule_id,
                    rule.rule_type,
                    rule.retained,
                    rule.candidates,
                    rule.duration.as_micros()
                )?;
            }
        }

        if config.include_mapping {
            if let Some(mapping) = &report.mapping {
                writeln!(out)?;
                writeln!(out, "🧭 Column mapping:")?;
                for field in &mapping.mappings {
                    match &field.column {
                        Some(column) => writeln!(
                            out,
                            "   {} <- '{column}' ({:.2}, {:?})",
                            field.field, field.confidence, field.status
                        )?,
                        None => writeln!(out, "   {} <- (unmapped)", field.field)?,
                    }
                }
            }
        }

        let shown = config.visible(&report.anomalies);
        if !shown.is_empty() {
            writeln!(out)?;
            writeln!(out, "🔍 Anomalies:")?;
            for (i, anomaly) in shown.iter().enumerate() {
                writeln!(out)?;
                let priority = Self::paint(
                    anomaly.priority.as_str(),
                    Self::priority_color(anomaly.priority),
                    config,
                );
                writeln!(out, "   #{} [{priority}] {}", i + 1, anomaly.anomaly_type)?;
                writeln!(out, "      Pallet: {}", anomaly.unit_id)?;
                writeln!(
                    out,
                    "      Location: {} ({})",
                    anomaly.location, anomaly.location_category
                )?;
                if anomaly.affected_count > 1 {
                    writeln!(out, "      Affected: {}", anomaly.affected_count)?;
                }
                writeln!(out, "      Rule: {}", anomaly.rule_id)?;
                writeln!(out, "      Details: {}", anomaly.details)?;
            }
            if report.anomalies.len() > shown.len() {
                writeln!(out)?;
                writeln!(
                    out,
                    "   ... and {} more anomalies",
                    report.anomalies.len() - shown.len()
                )?;
            }
        }

        if config.include_warnings && !report.warnings.is_empty() {
            writeln!(out)?;
            writeln!(out, "⚠️  Warnings:")?;
            for warning in &report.warnings {
                writeln!(out, "   {warning}")?;
            }
        }
        writeln!(out)
    }
}

impl Default for HumanFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportFormatter for HumanFormatter {
    fn format(&self, report: &AnalysisReport) -> Result<String> {
        self.format_with_config(report, &self.config)
    }

    fn format_with_config(
        &self,
        report: &AnalysisReport,
        config: &FormatterConfig,
    ) -> Result<String> {
        let mut output = String::new();
        Self::render_into(&mut output, report, config).map_err(render_failed)?;
        Ok(output)
    }
}

/// Formats reports as Markdown.
#[derive(Debug, Clone)]
pub struct MarkdownFormatter {
    config: FormatterConfig,
    heading_level: u8,
}

impl MarkdownFormatter {
    /// Creates a Markdown formatter with the default configuration.
    pub fn new() -> Self {
        Self {
            config: FormatterConfig::default(),
            heading_level: 2,
        }
    }

    /// Creates a Markdown formatter with the given configuration.
    pub fn with_config(config: FormatterConfig) -> Self {
        Self {
            config,
            heading_level: 2,
        }
    }

    /// Sets the base heading level.
    pub fn with_heading_level(mut self, level: u8) -> Self {
        self.heading_level = level.clamp(1, 6);
        self
    }

    fn render_into(
        &self,
        out: &mut String,
        report: &AnalysisReport,
        config: &FormatterConfig,
    ) -> fmt::Result {
        let h = "#".repeat(self.heading_level as usize);
        let summary = &report.summary;

        if report.has_anomalies() {
            writeln!(out, "{h} ⚠️ Inventory Anomaly Report - {} found", summary.anomalies)?;
        } else {
            writeln!(out, "{h} ✅ Inventory Anomaly Report - clean")?;
        }
        writeln!(out)?;
        writeln!(out, "**Warehouse:** {}", report.warehouse_id)?;
        if config.include_timestamps {
            writeln!(out, "**Reference time:** {}", report.reference_time.to_rfc3339())?;
        }

        if config.include_metrics {
            writeln!(out)?;
            writeln!(out, "{h}# Summary")?;
            writeln!(out)?;
            writeln!(out, "| Metric | Value |")?;
            writeln!(out, "|--------|-------|")?;
            writeln!(out, "| Records | {} |", summary.total_records)?;
            writeln!(out, "| Locations | {} |", summary.distinct_locations)?;
            writeln!(out, "| Invalid locations | {} |", summary.invalid_locations)?;
            writeln!(out, "| Candidates | {} |", summary.candidates)?;
            writeln!(out, "| Suppressed | {} |", summary.suppressed)?;
            writeln!(out, "| Narrowed | {} |", summary.narrowed)?;
            writeln!(out, "| Anomalies | {} |", summary.anomalies)?;
            writeln!(out, "| Duration | {}ms |", summary.total_duration.as_millis())?;

            writeln!(out)?;
            writeln!(out, "{h}# Rules")?;
            writeln!(out)?;
            writeln!(out, "| Rule | Type | Candidates | Retained | Status |")?;
            writeln!(out, "|------|------|------------|----------|--------|")?;
            for rule in &report.rule_performance {
                let status = match &rule.status {
                    RuleStatus::Completed => "completed",
                    RuleStatus::Failed { .. } => "failed",
                    RuleStatus::Skipped { .. } => "skipped",
                };
                writeln!(
                    out,
                    "| {} | {} | {} | {} | {status} |",
                    rule.rule_id, rule.rule_type, rule.candidates, rule.retained
                )?;
            }
        }

        let shown = config.visible(&report.anomalies);
        if !shown.is_empty() {
            writeln!(out)?;
            writeln!(out, "{h}# Anomalies")?;
            writeln!(out)?;
            writeln!(out, "| # | Priority | Type | Pallet | Location | Details |")?;
            writeln!(out, "|---|----------|------|--------|----------|---------|")?;
            for (i, anomaly) in shown.iter().enumerate() {
                writeln!(
                    out,
                    "| {} | {} | {} | {} | {} | {} |",
                    i + 1,
                    anomaly.priority,
                    anomaly.anomaly_type,
                    anomaly.unit_id,
                    anomaly.location,
                    anomaly.details.replace('|', "\\|")
                )?;
            }
            if report.anomalies.len() > shown.len() {
                writeln!(out)?;
                writeln!(
                    out,
                    "> **Note:** {} additional anomalies not shown in this report.",
                    report.anomalies.len() - shown.len()
                )?;
            }
        }

        if config.include_warnings && !report.warnings.is_empty() {
            writeln!(out)?;
            writeln!(out, "{h}# Warnings")?;
            writeln!(out)?;
            for warning in &report.warnings {
                writeln!(out, "- {warning}")?;
            }
        }
        Ok(())
    }
}

impl Default for MarkdownFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportFormatter for MarkdownFormatter {
    fn format(&self, report: &AnalysisReport) -> Result<String> {
        self.format_with_config(report, &self.config)
    }

    fn format_with_config(
        &self,
        report: &AnalysisReport,
        config: &FormatterConfig,
    ) -> Result<String> {
        let mut output = String::new();
        self.render_into(&mut output, report, config)
            .map_err(render_failed)?;
        Ok(output)
    }
}

/// Applies the anomaly, mapping and warning filters of a configuration.
fn filter_report(report: &AnalysisReport, config: &FormatterConfig) -> AnalysisReport {
    let mut filtered = report.clone();
    filtered.anomalies = config.visible(&report.anomalies).to_vec();
    if !config.include_mapping {
        filtered.mapping = None;
    }
    if !config.include_warnings {
        filtered.warnings.clear();
    }
    filtered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{AnalysisSummary, AnomalyType, RulePerformance, RunWarning, WarningKind};
    use crate::location::LocationCategory;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    fn create_test_report() -> AnalysisReport {
        let anomalies = vec![
            Anomaly::builder(AnomalyType::InvalidLocation, "P-1", "XYZ", LocationCategory::Invalid)
                .rule("invalid-location", Priority::High, 1)
                .details("Pallet P-1 is at unresolvable location XYZ")
                .build(),
            Anomaly::builder(AnomalyType::Overcapacity, "P-2", "1230A", LocationCategory::Storage)
                .rule("overcapacity", Priority::High, 2)
                .affected_units(vec!["P-2".into(), "P-3".into()])
                .details("STORAGE location 1230A holds 2 pallets | capacity 1")
                .build(),
        ];
        let mut summary = AnalysisSummary {
            total_records: 3,
            distinct_locations: 2,
            invalid_locations: 1,
            rules_evaluated: 2,
            candidates: 3,
            suppressed: 1,
            ..AnalysisSummary::default()
        };
        summary.count_anomalies(&anomalies);

        AnalysisReport {
            warehouse_id: "WH01".to_string(),
            config_fingerprint: "abc".to_string(),
            reference_time: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            anomalies,
            mapping: None,
            projection: None,
            rule_performance: vec![RulePerformance {
                rule_id: "overcapacity".to_string(),
                rule_name: "Overcapacity".to_string(),
                rule_type: "OVERCAPACITY".to_string(),
                duration: Duration::from_micros(420),
                candidates: 1,
                retained: 1,
                status: RuleStatus::Completed,
            }],
            warnings: vec![RunWarning::for_rule(
                WarningKind::UnknownRuleType,
                "mystery",
                "no evaluator for rule type 'X'",
            )],
            summary,
        }
    }

    #[test]
    fn test_formatter_config() {
        let config = FormatterConfig::default();
        assert!(config.include_anomalies);
        assert!(config.use_colors);

        let minimal = FormatterConfig::minimal();
        assert!(!minimal.include_anomalies);
        assert!(!minimal.use_colors);

        let ci = FormatterConfig::ci();
        assert!(!ci.use_colors);
        assert_eq!(ci.max_anomalies, 50);
    }

    #[test]
    fn test_json_formatter() {
        let report = create_test_report();
        let formatter = JsonFormatter::new();

        let output = formatter.format(&report).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["warehouse_id"], "WH01");
        assert_eq!(value["anomalies"].as_array().unwrap().len(), 2);
        assert_eq!(value["summary"]["suppressed"], 1);

        let limited = FormatterConfig::default().with_max_anomalies(1).with_metrics(false);
        let output = formatter.format_with_config(&report, &limited).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["anomalies"].as_array().unwrap().len(), 1);
        assert!(value.get("summary").is_none());
    }

    #[test]
    fn test_human_formatter() {
        let report = create_test_report();
        let formatter = HumanFormatter::new();

        let output = formatter.format(&report).unwrap();
        assert!(output.contains("2 anomalies found"));
        assert!(output.contains("Warehouse: WH01"));
        assert!(output.contains("Pallet: P-1"));
        assert!(output.contains("Affected: 2"));
        assert!(output.contains("[mystery]"));

        let plain = FormatterConfig::default().with_colors(false).with_max_anomalies(1);
        let output = formatter.format_with_config(&report, &plain).unwrap();
        assert!(!output.contains("\x1b["));
        assert!(output.contains("... and 1 more anomalies"));
    }

    #[test]
    fn test_markdown_formatter() {
        let report = create_test_report();
        let formatter = MarkdownFormatter::new().with_heading_level(1);

        let output = formatter.format(&report).unwrap();
        assert!(output.starts_with("# ⚠️ Inventory Anomaly Report - 2 found"));
        assert!(output.contains("## Summary"));
        assert!(output.contains("| Suppressed | 1 |"));
        assert!(output.contains("holds 2 pallets \\| capacity 1"));
        assert!(output.contains("- [mystery] no evaluator"));
    }

    #[test]
    fn test_minimal_hides_anomalies() {
        let report = create_test_report();
        let output = MarkdownFormatter::with_config(FormatterConfig::minimal())
            .format(&report)
            .unwrap();
        assert!(!output.contains("## Anomalies"));
        assert!(!output.contains("Reference time"));
    }
}
