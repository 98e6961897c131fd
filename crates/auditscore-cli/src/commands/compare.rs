//! The `auditscore compare` command.

use std::path::PathBuf;

use anyhow::Result;

use auditscore_core::report::AuditReport;

pub fn execute(
    baseline_path: PathBuf,
    current_path: PathBuf,
    threshold: f64,
    fail_on_regression: bool,
    format: String,
) -> Result<()> {
    anyhow::ensure!(threshold >= 0.0, "threshold must not be negative");

    let baseline = AuditReport::load_json(&baseline_path)?;
    let current = AuditReport::load_json(&current_path)?;

    let report = current.compare(&baseline, threshold);

    match format.as_str() {
        "markdown" | "md" => {
            println!("{}", report.to_markdown());
        }
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            println!(
                "Comparison: {} -> {}: total {}% -> {}% ({:+.2})",
                report.baseline_audit,
                report.current_audit,
                report.baseline_total,
                report.current_total,
                report.total_delta
            );
            println!(
                "{} regressions, {} improvements, {} unchanged",
                report.regressions.len(),
                report.improvements.len(),
                report.unchanged
            );
            if report.newly_failed {
                println!("\nAudit now FAILED (fatal field marked no)");
            }

            if !report.regressions.is_empty() {
                println!("\nRegressions:");
                for r in &report.regressions {
                    println!(
                        "  {} {}% -> {}% ({:+.2})",
                        r.title, r.baseline, r.current, r.delta
                    );
                }
            }

            if !report.improvements.is_empty() {
                println!("\nImprovements:");
                for i in &report.improvements {
                    println!(
                        "  {} {}% -> {}% ({:+.2})",
                        i.title, i.baseline, i.current, i.delta
                    );
                }
            }

            if report.new_sections > 0 {
                println!("\n{} new section(s)", report.new_sections);
            }
            if report.removed_sections > 0 {
                println!("{} removed section(s)", report.removed_sections);
            }
        }
    }

    if fail_on_regression && report.has_regressions() {
        std::process::exit(1);
    }

    Ok(())
}
