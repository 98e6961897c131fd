//! Audit report types with JSON persistence and re-audit comparison.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{Audit, Mark, Percentage};
use crate::scoring;

/// A scored audit with its per-section breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    /// Unique report identifier.
    pub id: Uuid,
    /// When the report was created.
    pub created_at: DateTime<Utc>,
    pub audit_id: String,
    /// When the audit itself was recorded.
    pub audited_at: DateTime<Utc>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub auditor: Option<String>,
    pub form: FormSummary,
    pub total_score: Percentage,
    pub total_weight: u64,
    /// Whether any fatal field was marked `no`.
    pub failed: bool,
    pub sections: Vec<SectionReport>,
}

/// Summary of a form (without its field definitions).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormSummary {
    pub id: String,
    pub title: String,
    pub section_count: usize,
    pub field_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionReport {
    pub id: String,
    pub title: String,
    pub weight: u64,
    pub result: Percentage,
    pub flagged: bool,
    pub fields: Vec<FieldReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldReport {
    pub id: String,
    pub title: String,
    pub weight: u32,
    pub fatal: bool,
    /// The recorded mark; `None` when the field was left unscored.
    pub recorded: Option<Mark>,
    /// The mark used for scoring.
    pub mark: Mark,
    /// The field's label for `mark`, if it has one.
    #[serde(default)]
    pub label: Option<String>,
    /// Set when this field raised its section's flag.
    #[serde(default)]
    pub flag: Option<String>,
}

impl AuditReport {
    /// Run a scoring pass over `audit` and capture the result.
    pub fn from_audit(audit: &mut Audit) -> Self {
        let total_score = scoring::result_for_audit(audit);
        let audit: &Audit = audit;
        let form = &audit.form;

        let sections = form
            .sections
            .iter()
            .map(|section| {
                let fields = section
                    .fields
                    .iter()
                    .map(|field| {
                        let recorded = scoring::score_for_field(audit, field).map(|s| s.mark);
                        let mark = scoring::effective_mark(audit, field);
                        let raised = field.fatal && recorded == Some(Mark::No);
                        FieldReport {
                            id: field.id.to_string(),
                            title: field.title.clone(),
                            weight: field.weight,
                            fatal: field.fatal,
                            recorded,
                            mark,
                            label: field.label(mark).map(str::to_string),
                            flag: raised.then(|| {
                                field
                                    .flag_text
                                    .clone()
                                    .unwrap_or_else(|| field.title.clone())
                            }),
                        }
                    })
                    .collect();

                SectionReport {
                    id: section.id.clone(),
                    title: section.title.clone(),
                    weight: scoring::section_weight(section),
                    result: scoring::result_for_section(audit, section),
                    flagged: scoring::section_flag(audit, section),
                    fields,
                }
            })
            .collect();

        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            audit_id: audit.id.clone(),
            audited_at: audit.created_at,
            reference: audit.reference.clone(),
            auditor: audit.auditor.clone(),
            form: FormSummary {
                id: form.id.clone(),
                title: form.title.clone(),
                section_count: form.sections.len(),
                field_count: form.fields().count(),
            },
            total_score,
            total_weight: scoring::total_weight(audit),
            failed: audit.failed,
            sections,
        }
    }

    /// Texts of every raised flag, in form order.
    pub fn flags(&self) -> Vec<&str> {
        self.sections
            .iter()
            .flat_map(|s| s.fields.iter())
            .filter_map(|f| f.flag.as_deref())
            .collect()
    }

    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: AuditReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }

    /// Format the report as markdown.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str(&format!("## {} - {}\n\n", self.form.title, self.audit_id));
        if let Some(reference) = &self.reference {
            md.push_str(&format!("**Reference:** {reference}\n\n"));
        }
        md.push_str(&format!(
            "**Total:** {}% (weight {}){}\n\n",
            self.total_score,
            self.total_weight,
            if self.failed { " - **FAILED**" } else { "" }
        ));

        md.push_str("| Section | Weight | Result | Flag |\n");
        md.push_str("|---------|--------|--------|------|\n");
        for s in &self.sections {
            md.push_str(&format!(
                "| {} | {} | {}% | {} |\n",
                s.title,
                s.weight,
                s.result,
                if s.flagged { "yes" } else { "" }
            ));
        }

        let flags = self.flags();
        if !flags.is_empty() {
            md.push_str("\n### Flags\n\n");
            for flag in flags {
                md.push_str(&format!("- {flag}\n"));
            }
        }

        md
    }

    /// Compare this report against an earlier audit of the same form.
    ///
    /// Sections whose result moved by more than `threshold` percentage
    /// points are reported as regressions or improvements.
    pub fn compare(&self, baseline: &AuditReport, threshold: f64) -> ComparisonReport {
        let baseline_sections: HashMap<&str, &SectionReport> = baseline
            .sections
            .iter()
            .map(|s| (s.id.as_str(), s))
            .collect();

        let mut regressions = Vec::new();
        let mut improvements = Vec::new();
        let mut unchanged = 0usize;
        let mut new_sections = 0usize;

        for current in &self.sections {
            let Some(previous) = baseline_sections.get(current.id.as_str()) else {
                new_sections += 1;
                continue;
            };
            let change = SectionChange {
                section_id: current.id.clone(),
                title: current.title.clone(),
                baseline: previous.result,
                current: current.result,
                delta: current.result.as_f64() - previous.result.as_f64(),
            };
            if change.delta < -threshold {
                regressions.push(change);
            } else if change.delta > threshold {
                improvements.push(change);
            } else {
                unchanged += 1;
            }
        }

        let removed_sections = baseline
            .sections
            .iter()
            .filter(|b| !self.sections.iter().any(|s| s.id == b.id))
            .count();

        if self.form.id != baseline.form.id {
            tracing::warn!(
                "comparing audits of different forms: {} vs {}",
                baseline.form.id,
                self.form.id
            );
        }

        ComparisonReport {
            baseline_audit: baseline.audit_id.clone(),
            current_audit: self.audit_id.clone(),
            baseline_total: baseline.total_score,
            current_total: self.total_score,
            total_delta: self.total_score.as_f64() - baseline.total_score.as_f64(),
            newly_failed: self.failed && !baseline.failed,
            regressions,
            improvements,
            unchanged,
            new_sections,
            removed_sections,
        }
    }
}

/// Result of comparing two audit reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub baseline_audit: String,
    pub current_audit: String,
    pub baseline_total: Percentage,
    pub current_total: Percentage,
    /// Change of the total in percentage points.
    pub total_delta: f64,
    /// The current audit failed while the baseline did not.
    pub newly_failed: bool,
    /// Sections whose result went down.
    pub regressions: Vec<SectionChange>,
    /// Sections whose result went up.
    pub improvements: Vec<SectionChange>,
    /// Sections with no significant change.
    pub unchanged: usize,
    /// Sections in current but not baseline.
    pub new_sections: usize,
    /// Sections in baseline but not current.
    pub removed_sections: usize,
}

/// A section result that moved between two audits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionChange {
    pub section_id: String,
    pub title: String,
    pub baseline: Percentage,
    pub current: Percentage,
    pub delta: f64,
}

impl ComparisonReport {
    /// Format the comparison as markdown.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str(&format!(
            "**Total:** {}% -> {}% ({:+.2})\n\n",
            self.baseline_total, self.current_total, self.total_delta
        ));
        md.push_str(&format!(
            "**Summary:** {} regressions, {} improvements, {} unchanged\n\n",
            self.regressions.len(),
            self.improvements.len(),
            self.unchanged
        ));

        for (heading, changes) in [
            ("Regressions", &self.regressions),
            ("Improvements", &self.improvements),
        ] {
            if changes.is_empty() {
                continue;
            }
            md.push_str(&format!("### {heading}\n\n"));
            md.push_str("| Section | Baseline | Current | Delta |\n");
            md.push_str("|---------|----------|---------|-------|\n");
            for c in changes {
                md.push_str(&format!(
                    "| {} | {}% | {}% | {:+.2} |\n",
                    c.title, c.baseline, c.current, c.delta
                ));
            }
            md.push('\n');
        }

        md
    }

    /// Returns true if any section regressed or the audit newly failed.
    pub fn has_regressions(&self) -> bool {
        !self.regressions.is_empty() || self.newly_failed
    }
}
