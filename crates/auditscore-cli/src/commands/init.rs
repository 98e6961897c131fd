//! The `auditscore init` command.

use std::path::Path;

use anyhow::Result;

pub fn execute() -> Result<()> {
    write_if_missing(Path::new("auditscore.toml"), SAMPLE_CONFIG)?;

    std::fs::create_dir_all("forms")?;
    write_if_missing(Path::new("forms/example.toml"), EXAMPLE_FORM)?;

    std::fs::create_dir_all("audits")?;
    write_if_missing(Path::new("audits/example.toml"), EXAMPLE_AUDIT)?;

    println!("\nNext steps:");
    println!("  1. Edit forms/example.toml to describe your checklist");
    println!("  2. Run: auditscore validate --forms forms --audit audits");
    println!("  3. Run: auditscore score --audit audits/example.toml");

    Ok(())
}

fn write_if_missing(path: &Path, content: &str) -> Result<()> {
    if path.exists() {
        println!("{} already exists, skipping.", path.display());
    } else {
        std::fs::write(path, content)?;
        println!("Created {}", path.display());
    }
    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# auditscore configuration

forms_dir = "forms"
# output_dir = "reports"
default_format = "text"
fail_on_flag = false
"#;

const EXAMPLE_FORM: &str = r#"[form]
id = "example"
title = "Example Site Audit"
description = "A small checklist to get started"

[[sections]]
id = "safety"
title = "Safety"

[[sections.fields]]
id = "fire-exits"
title = "Fire exits are clear"
weight = 3
fatal = true
flag_text = "Blocked fire exit"

[sections.fields.marks]
yes = "All exits clear and signed"
no = "At least one exit blocked"

[[sections.fields]]
id = "first-aid"
title = "First aid kit is stocked"
weight = 1

[sections.fields.marks]
yes = "Fully stocked"
acceptable = "Minor items missing"
no = "Missing or empty"

[[sections]]
id = "housekeeping"
title = "Housekeeping"

[[sections.fields]]
id = "walkways"
title = "Walkways are tidy"
weight = 2

[[sections.fields]]
id = "waste"
title = "Waste is segregated"
weight = 2

[sections.fields.marks]
yes = "Segregated and labelled"
acceptable = "Segregated, not labelled"
no = "Mixed waste"
not_applicable = "No waste produced"
"#;

const EXAMPLE_AUDIT: &str = r#"[audit]
id = "example-001"
form = "example"
reference = "Head office"
auditor = "auditor@example.com"

[scores]
fire-exits = "yes"
first-aid = "acceptable"
walkways = "no"
"#;
