//! The `auditscore validate` command.

use std::path::PathBuf;

use anyhow::Result;

use auditscore_core::parser::{self, FormCatalog, ValidationWarning};

pub fn execute(forms_path: PathBuf, audit_path: Option<PathBuf>) -> Result<()> {
    let catalog = FormCatalog::load(&forms_path)?;

    let mut total_warnings = 0;

    for form in catalog.forms() {
        println!(
            "Form: {} ({} sections, {} fields)",
            form.title,
            form.sections.len(),
            form.fields().count()
        );
        let warnings = parser::validate_form(&form);
        print_warnings(&warnings);
        total_warnings += warnings.len();
    }

    if let Some(audit_path) = audit_path {
        let audits = if audit_path.is_dir() {
            parser::load_audit_directory(&audit_path, &catalog)?
        } else {
            vec![parser::parse_audit(&audit_path, &catalog)?]
        };

        for audit in &audits {
            println!(
                "Audit: {} ({} of {} fields scored)",
                audit.id,
                audit.scores().len(),
                audit.form.fields().count()
            );
            let warnings = parser::validate_audit(audit);
            print_warnings(&warnings);
            total_warnings += warnings.len();
        }
    }

    if total_warnings == 0 {
        println!("All forms valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}

fn print_warnings(warnings: &[ValidationWarning]) {
    for w in warnings {
        let prefix = w
            .location
            .as_ref()
            .map(|id| format!("  [{id}]"))
            .unwrap_or_else(|| "  ".to_string());
        println!("{prefix} WARNING: {}", w.message);
    }
}
