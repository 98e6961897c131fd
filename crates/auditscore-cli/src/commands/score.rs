//! The `auditscore score` command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use auditscore_core::config::load_config_from;
use auditscore_core::parser::{self, FormCatalog};
use auditscore_core::report::AuditReport;

pub fn execute(
    audit_path: PathBuf,
    forms_path: Option<PathBuf>,
    format: Option<String>,
    output: Option<PathBuf>,
    fail_on_flag: bool,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let forms_path = forms_path.unwrap_or_else(|| config.forms_dir.clone());
    let format = format.unwrap_or_else(|| config.default_format.clone());
    let output = output.or_else(|| config.output_dir.clone());
    let fail_on_flag = fail_on_flag || config.fail_on_flag;

    anyhow::ensure!(
        matches!(format.as_str(), "text" | "json" | "markdown" | "md"),
        "unknown format '{format}' (expected text, json or markdown)"
    );

    let catalog = FormCatalog::load(&forms_path)
        .with_context(|| format!("failed to load forms from {}", forms_path.display()))?;
    tracing::debug!("loaded {} form(s)", catalog.len());

    let mut audits = if audit_path.is_dir() {
        parser::load_audit_directory(&audit_path, &catalog)?
    } else {
        vec![parser::parse_audit(&audit_path, &catalog)?]
    };
    anyhow::ensure!(!audits.is_empty(), "no audits found in {}", audit_path.display());

    let reports: Vec<AuditReport> = audits.iter_mut().map(AuditReport::from_audit).collect();

    match format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&reports)?);
        }
        "markdown" | "md" => {
            for report in &reports {
                println!("{}", report.to_markdown());
            }
        }
        _ => {
            for report in &reports {
                print_summary(report);
            }
        }
    }

    if let Some(dir) = &output {
        save_reports(&reports, dir)?;
    }

    let failed = reports.iter().filter(|r| r.failed).count();
    if fail_on_flag && failed > 0 {
        eprintln!("{failed} audit(s) failed");
        std::process::exit(1);
    }

    Ok(())
}

fn save_reports(reports: &[AuditReport], dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H%M%S");

    for report in reports {
        let name: String = report
            .audit_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
            .collect();
        let path = dir.join(format!("{name}-{timestamp}.json"));
        report.save_json(&path)?;
        eprintln!("Report saved to: {}", path.display());
    }

    Ok(())
}

fn print_summary(report: &AuditReport) {
    use comfy_table::{Cell, Table};

    let mut table = Table::new();
    table.set_header(vec!["Section", "Weight", "Result", "Flag"]);

    for section in &report.sections {
        table.add_row(vec![
            Cell::new(&section.title),
            Cell::new(section.weight),
            Cell::new(format!("{}%", section.result)),
            Cell::new(if section.flagged { "FLAG" } else { "" }),
        ]);
    }

    println!("Audit: {} ({})", report.audit_id, report.form.title);
    if let Some(reference) = &report.reference {
        println!("Reference: {reference}");
    }
    if let Some(auditor) = &report.auditor {
        println!("Auditor: {auditor}");
    }
    println!("{table}");
    println!(
        "Total: {}% (weight {}){}",
        report.total_score,
        report.total_weight,
        if report.failed { " FAILED" } else { "" }
    );
    for flag in report.flags() {
        println!("  Flag: {flag}");
    }
    println!();
}
