//! Findings and the aggregated validation report.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Refs printed per finding in the text report; JSON keeps them all.
const REF_DISPLAY_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// Family a finding belongs to; each maps to one error kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum RuleFamily {
    Extraction,
    Schema,
    ReferentialIntegrity,
    Range,
    Temporal,
    Plausibility,
}

impl RuleFamily {
    pub fn error_kind(&self) -> &'static str {
        match self {
            RuleFamily::Extraction => "ExtractionError",
            RuleFamily::Schema => "SchemaError",
            RuleFamily::ReferentialIntegrity => "ReferentialIntegrityError",
            RuleFamily::Range => "RangeViolation",
            RuleFamily::Temporal => "TemporalGapError",
            RuleFamily::Plausibility => "PlausibilityWarning",
        }
    }
}

/// One rule result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    pub rule_name: String,
    #[serde(skip)]
    pub family: RuleFamily,
    pub severity: Severity,
    pub message: String,
    pub affected_row_refs: Vec<String>,
}

impl Finding {
    pub fn new(
        family: RuleFamily,
        severity: Severity,
        rule_name: impl Into<String>,
        message: impl Into<String>,
        affected_row_refs: Vec<String>,
    ) -> Self {
        Self {
            rule_name: rule_name.into(),
            family,
            severity,
            message: message.into(),
            affected_row_refs,
        }
    }

    pub fn error(
        family: RuleFamily,
        rule_name: impl Into<String>,
        message: impl Into<String>,
        affected_row_refs: Vec<String>,
    ) -> Self {
        Self::new(family, Severity::Error, rule_name, message, affected_row_refs)
    }

    pub fn warning(
        family: RuleFamily,
        rule_name: impl Into<String>,
        message: impl Into<String>,
        affected_row_refs: Vec<String>,
    ) -> Self {
        Self::new(family, Severity::Warning, rule_name, message, affected_row_refs)
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn kind(&self) -> &'static str {
        self.family.error_kind()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Ok,
    Warning,
    Fatal,
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportStatus::Ok => write!(f, "OK"),
            ReportStatus::Warning => write!(f, "WARNING"),
            ReportStatus::Fatal => write!(f, "FATAL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub status: ReportStatus,
    pub findings: Vec<Finding>,
    /// Keyed by error kind, e.g. `RangeViolation`
    pub counts_by_family: BTreeMap<String, usize>,
    pub counts_by_severity: BTreeMap<String, usize>,
}

impl ValidationReport {
    pub fn is_fatal(&self) -> bool {
        self.status == ReportStatus::Fatal
    }

    /// Process exit status: 1 on fatal, 0 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.is_fatal() {
            1
        } else {
            0
        }
    }

    pub fn error_count(&self) -> usize {
        self.counts_by_severity.get("error").copied().unwrap_or(0)
    }

    pub fn warning_count(&self) -> usize {
        self.counts_by_severity.get("warning").copied().unwrap_or(0)
    }

    pub fn findings_of(&self, family: RuleFamily) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.family == family)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", "=".repeat(80))?;
        writeln!(
            f,
            "VALIDATION REPORT: {} ({} errors, {} warnings)",
            self.status,
            self.error_count(),
            self.warning_count()
        )?;
        writeln!(f, "{}", "=".repeat(80))?;

        if self.findings.is_empty() {
            writeln!(f, "No findings.")?;
        }
        for finding in &self.findings {
            writeln!(
                f,
                "[{}] {} ({}): {}",
                finding.severity.to_string().to_uppercase(),
                finding.rule_name,
                finding.kind(),
                finding.message
            )?;
            if !finding.affected_row_refs.is_empty() {
                let shown: Vec<&str> = finding
                    .affected_row_refs
                    .iter()
                    .take(REF_DISPLAY_LIMIT)
                    .map(|r| r.as_str())
                    .collect();
                write!(f, "    rows: {}", shown.join(", "))?;
                let hidden = finding.affected_row_refs.len().saturating_sub(REF_DISPLAY_LIMIT);
                if hidden > 0 {
                    write!(f, " ... and {} more", hidden)?;
                }
                writeln!(f)?;
            }
        }

        if !self.counts_by_family.is_empty() {
            writeln!(f, "{}", "-".repeat(80))?;
            for (kind, count) in &self.counts_by_family {
                writeln!(f, "{:<28} {}", kind, count)?;
            }
        }
        Ok(())
    }
}

/// Collects findings from every stage and computes the overall status.
#[derive(Debug, Default)]
pub struct ReportAggregator {
    findings: Vec<Finding>,
}

impl ReportAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, finding: Finding) {
        self.findings.push(finding);
    }

    pub fn extend(&mut self, findings: impl IntoIterator<Item = Finding>) {
        self.findings.extend(findings);
    }

    pub fn len(&self) -> usize {
        self.findings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    /// Findings keep their insertion order.
    pub fn finish(self) -> ValidationReport {
        let mut counts_by_family = BTreeMap::new();
        let mut counts_by_severity = BTreeMap::new();
        for finding in &self.findings {
            *counts_by_family
                .entry(finding.kind().to_string())
                .or_insert(0) += 1;
            *counts_by_severity
                .entry(finding.severity.to_string())
                .or_insert(0) += 1;
        }

        let status = if self.findings.iter().any(Finding::is_error) {
            ReportStatus::Fatal
        } else if self.findings.is_empty() {
            ReportStatus::Ok
        } else {
            ReportStatus::Warning
        };

        ValidationReport {
            status,
            findings: self.findings,
            counts_by_family,
            counts_by_severity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range_warning() -> Finding {
        Finding::warning(
            RuleFamily::Range,
            "range.fact_zone_conditions.air_temp_c",
            "1 row outside [10, 35]",
            vec!["run_B1_BASE/zones.csv#4".to_string()],
        )
    }

    #[test]
    fn test_empty_report_is_ok() {
        let report = ReportAggregator::new().finish();
        assert_eq!(report.status, ReportStatus::Ok);
        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn test_warnings_only() {
        let mut agg = ReportAggregator::new();
        agg.push(range_warning());
        let report = agg.finish();
        assert_eq!(report.status, ReportStatus::Warning);
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.counts_by_family.get("RangeViolation"), Some(&1));
    }

    #[test]
    fn test_any_error_is_fatal_and_order_is_kept() {
        let mut agg = ReportAggregator::new();
        agg.push(range_warning());
        agg.push(Finding::error(
            RuleFamily::Schema,
            "grain.fact_hvac",
            "duplicate grain",
            vec!["a".to_string(), "b".to_string()],
        ));
        let report = agg.finish();
        assert!(report.is_fatal());
        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.findings[0].rule_name, "range.fact_zone_conditions.air_temp_c");
        assert_eq!(report.error_count(), 1);
        assert_eq!(report.warning_count(), 1);
    }

    #[test]
    fn test_json_shape() {
        let mut agg = ReportAggregator::new();
        agg.push(range_warning());
        let json: serde_json::Value =
            serde_json::from_str(&agg.finish().to_json().unwrap()).unwrap();
        let finding = &json["findings"][0];
        assert_eq!(finding["severity"], "warning");
        assert_eq!(finding["affected_row_refs"][0], "run_B1_BASE/zones.csv#4");
        assert!(finding.get("family").is_none());
        assert_eq!(json["status"], "warning");
    }

    #[test]
    fn test_display_truncates_refs() {
        let refs = (0..15).map(|i| format!("r#{}", i)).collect();
        let mut agg = ReportAggregator::new();
        agg.push(Finding::error(RuleFamily::Temporal, "temporal.fact_meters", "gaps", refs));
        let text = agg.finish().to_string();
        assert!(text.contains("FATAL"));
        assert!(text.contains("... and 5 more"));
    }
}
