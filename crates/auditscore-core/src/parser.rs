//! TOML form and audit parser.
//!
//! Loads forms and audits from TOML files and directories, and validates them.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::AuditError;
use crate::model::{Audit, Field, FieldId, Form, Mark, Section};
use crate::scoring::score_for_field;

/// Intermediate TOML structure for form files.
#[derive(Debug, Deserialize)]
struct TomlFormFile {
    form: TomlFormHeader,
    #[serde(default)]
    sections: Vec<TomlSection>,
}

#[derive(Debug, Deserialize)]
struct TomlFormHeader {
    id: String,
    title: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TomlSection {
    id: String,
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    fields: Vec<TomlField>,
}

#[derive(Debug, Deserialize)]
struct TomlField {
    id: String,
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default = "default_weight")]
    weight: u32,
    #[serde(default, alias = "flag")]
    fatal: bool,
    #[serde(default)]
    flag_text: Option<String>,
    #[serde(default)]
    marks: BTreeMap<Mark, String>,
}

fn default_weight() -> u32 {
    1
}

/// Intermediate TOML structure for audit files.
#[derive(Debug, Deserialize)]
struct TomlAuditFile {
    audit: TomlAuditHeader,
    #[serde(default)]
    scores: BTreeMap<String, Mark>,
}

#[derive(Debug, Deserialize)]
struct TomlAuditHeader {
    id: String,
    form: String,
    #[serde(default)]
    reference: Option<String>,
    #[serde(default)]
    auditor: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

/// Parse a single TOML file into a `Form`.
pub fn parse_form(path: &Path) -> Result<Form> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read form file: {}", path.display()))?;

    parse_form_str(&content, path)
}

/// Parse a TOML string into a `Form` (useful for testing).
pub fn parse_form_str(content: &str, source_path: &Path) -> Result<Form> {
    let parsed: TomlFormFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let sections = parsed
        .sections
        .into_iter()
        .map(|s| Section {
            id: s.id,
            title: s.title,
            description: s.description,
            fields: s
                .fields
                .into_iter()
                .map(|f| Field {
                    id: FieldId(f.id),
                    title: f.title,
                    description: f.description,
                    weight: f.weight,
                    fatal: f.fatal,
                    flag_text: f.flag_text,
                    marks: f
                        .marks
                        .into_iter()
                        .filter(|(_, label)| !label.trim().is_empty())
                        .collect(),
                })
                .collect(),
        })
        .collect();

    let form = Form {
        id: parsed.form.id,
        title: parsed.form.title,
        description: parsed.form.description,
        sections,
    };
    form.check_field_ids()
        .with_context(|| format!("in form {}", source_path.display()))?;

    Ok(form)
}

/// Recursively load all `.toml` form files from a directory.
pub fn load_form_directory(dir: &Path) -> Result<Vec<Form>> {
    load_directory(dir, &parse_form)
}

/// Forms available to audits, keyed by form id.
#[derive(Debug, Clone, Default)]
pub struct FormCatalog {
    forms: HashMap<String, Arc<Form>>,
}

impl FormCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from loaded forms. Duplicate form ids are rejected.
    pub fn from_forms(forms: impl IntoIterator<Item = Form>) -> Result<Self, AuditError> {
        let mut catalog = Self::new();
        for form in forms {
            catalog.insert(form)?;
        }
        Ok(catalog)
    }

    /// Load a single form file or a directory of them.
    pub fn load(path: &Path) -> Result<Self> {
        let forms = if path.is_dir() {
            load_form_directory(path)?
        } else {
            vec![parse_form(path)?]
        };
        Ok(Self::from_forms(forms)?)
    }

    /// Add a form, rejecting a repeated form id or a form that repeats a field id.
    pub fn insert(&mut self, form: Form) -> Result<Arc<Form>, AuditError> {
        if self.forms.contains_key(&form.id) {
            return Err(AuditError::DuplicateForm(form.id));
        }
        form.check_field_ids()?;
        let form = Arc::new(form);
        self.forms.insert(form.id.clone(), Arc::clone(&form));
        Ok(form)
    }

    pub fn get(&self, id: &str) -> Option<Arc<Form>> {
        self.forms.get(id).cloned()
    }

    /// Forms sorted by id.
    pub fn forms(&self) -> Vec<Arc<Form>> {
        let mut forms: Vec<_> = self.forms.values().cloned().collect();
        forms.sort_by(|a, b| a.id.cmp(&b.id));
        forms
    }

    pub fn len(&self) -> usize {
        self.forms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forms.is_empty()
    }
}

/// Parse a single TOML file into an `Audit` against the catalog's forms.
pub fn parse_audit(path: &Path, catalog: &FormCatalog) -> Result<Audit> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read audit file: {}", path.display()))?;

    parse_audit_str(&content, path, catalog)
}

/// Parse a TOML string into an `Audit` (useful for testing).
pub fn parse_audit_str(content: &str, source_path: &Path, catalog: &FormCatalog) -> Result<Audit> {
    let parsed: TomlAuditFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let form = catalog
        .get(&parsed.audit.form)
        .ok_or_else(|| AuditError::UnknownForm(parsed.audit.form.clone()))
        .with_context(|| format!("in audit {}", source_path.display()))?;

    let mut audit = Audit::new(parsed.audit.id, form);
    audit.reference = parsed.audit.reference;
    audit.auditor = parsed.audit.auditor;
    if let Some(created_at) = parsed.audit.created_at {
        audit.created_at = created_at;
    }

    for (field, mark) in parsed.scores {
        audit
            .record(field, mark)
            .with_context(|| format!("in audit {}", source_path.display()))?;
    }

    Ok(audit)
}

/// Recursively load all `.toml` audit files from a directory.
pub fn load_audit_directory(dir: &Path, catalog: &FormCatalog) -> Result<Vec<Audit>> {
    load_directory(dir, &|path: &Path| parse_audit(path, catalog))
}

fn load_directory<T>(dir: &Path, parse: &dyn Fn(&Path) -> Result<T>) -> Result<Vec<T>> {
    let mut items = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let mut paths = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    paths.sort();

    for path in paths {
        if path.is_dir() {
            items.extend(load_directory(&path, parse)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse(&path) {
                Ok(item) => items.push(item),
                Err(e) => {
                    tracing::warn!("skipping {}: {:#}", path.display(), e);
                }
            }
        }
    }

    Ok(items)
}

/// A warning from form or audit validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The section or field the warning is about (if applicable).
    pub location: Option<String>,
    /// Warning message.
    pub message: String,
}

impl ValidationWarning {
    fn at(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            location: Some(location.into()),
            message: message.into(),
        }
    }
}

/// Validate a form for common authoring issues.
pub fn validate_form(form: &Form) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    if form.sections.is_empty() {
        warnings.push(ValidationWarning {
            location: None,
            message: "form has no sections; every audit of it scores 0.00".into(),
        });
    }

    let mut seen_sections = HashSet::new();
    for section in &form.sections {
        if !seen_sections.insert(&section.id) {
            warnings.push(ValidationWarning::at(
                &section.id,
                format!("duplicate section ID: {}", section.id),
            ));
        }
    }

    for section in &form.sections {
        if section.fields.is_empty() {
            warnings.push(ValidationWarning::at(
                &section.id,
                "section has no fields; it scores 100.00 with no weight",
            ));
        } else if section.fields.iter().all(|f| f.weight == 0) {
            warnings.push(ValidationWarning::at(
                &section.id,
                "all field weights are 0; the section does not count towards the total",
            ));
        }
    }

    for field in form.fields() {
        if field.fatal && !field.marks.is_empty() && !field.marks.contains_key(&Mark::No) {
            warnings.push(ValidationWarning::at(
                field.id.as_str(),
                "fatal field has no label for 'no' and can never raise a flag",
            ));
        }
    }

    warnings
}

/// Validate an audit's scores against its form.
pub fn validate_audit(audit: &Audit) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    for field in audit.form.fields() {
        match score_for_field(audit, field) {
            Some(score) => {
                if !field.marks.is_empty() && !field.marks.contains_key(&score.mark) {
                    warnings.push(ValidationWarning::at(
                        field.id.as_str(),
                        format!("mark '{}' has no label on this field", score.mark),
                    ));
                }
            }
            None if field.fatal => {
                warnings.push(ValidationWarning::at(
                    field.id.as_str(),
                    "fatal field is unscored and counts as 'yes'",
                ));
            }
            None => {}
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const VALID_FORM: &str = r#"
[form]
id = "kitchen"
title = "Kitchen Hygiene"
description = "Monthly kitchen inspection"

[[sections]]
id = "storage"
title = "Cold storage"

[[sections.fields]]
id = "fridge-temp"
title = "Fridge below 5C"
weight = 3
fatal = true
flag_text = "Cold chain broken"

[sections.fields.marks]
yes = "Below 5C"
no = "Above 8C"
acceptable = "Between 5C and 8C"
not_applicable = ""

[[sections.fields]]
id = "labels"
title = "Containers labelled"

[[sections]]
id = "cleaning"
title = "Cleaning"

[[sections.fields]]
id = "surfaces"
title = "Surfaces sanitised"
weight = 2
"#;

    const VALID_AUDIT: &str = r#"
[audit]
id = "kitchen-2024-03"
form = "kitchen"
reference = "Main street"
auditor = "inspector"
created_at = "2024-03-01T09:00:00Z"

[scores]
fridge-temp = "acceptable"
labels = "no"
"#;

    fn catalog() -> FormCatalog {
        let form = parse_form_str(VALID_FORM, &PathBuf::from("kitchen.toml")).unwrap();
        FormCatalog::from_forms([form]).unwrap()
    }

    #[test]
    fn parse_valid_form() {
        let form = parse_form_str(VALID_FORM, &PathBuf::from("kitchen.toml")).unwrap();
        assert_eq!(form.id, "kitchen");
        assert_eq!(form.sections.len(), 2);

        let fridge = &form.sections[0].fields[0];
        assert_eq!(fridge.weight, 3);
        assert!(fridge.fatal);
        assert_eq!(fridge.flag_text.as_deref(), Some("Cold chain broken"));
        assert_eq!(fridge.marks.len(), 3);
        assert_eq!(fridge.label(Mark::NotApplicable), None);

        let labels = &form.sections[0].fields[1];
        assert_eq!(labels.weight, 1);
        assert!(!labels.fatal);
    }

    #[test]
    fn parse_form_rejects_negative_weight() {
        let toml = r#"
[form]
id = "f"
title = "F"

[[sections]]
id = "s"
title = "S"

[[sections.fields]]
id = "a"
title = "A"
weight = -1
"#;
        assert!(parse_form_str(toml, &PathBuf::from("f.toml")).is_err());
    }

    #[test]
    fn parse_form_rejects_unknown_mark_label() {
        let toml = r#"
[form]
id = "f"
title = "F"

[[sections]]
id = "s"
title = "S"

[[sections.fields]]
id = "a"
title = "A"

[sections.fields.marks]
partial = "Somewhat"
"#;
        assert!(parse_form_str(toml, &PathBuf::from("f.toml")).is_err());
    }

    #[test]
    fn parse_form_rejects_repeated_field_id() {
        let toml = r#"
[form]
id = "f"
title = "F"

[[sections]]
id = "a"
title = "A"

[[sections.fields]]
id = "x"
title = "Plain"

[[sections]]
id = "b"
title = "B"

[[sections.fields]]
id = "x"
title = "Fatal"
fatal = true
"#;
        let err = parse_form_str(toml, &PathBuf::from("f.toml")).unwrap_err();
        assert!(format!("{err:#}").contains("duplicate field id 'x' in form 'f'"));
        let err = err.downcast::<AuditError>().unwrap();
        assert!(matches!(err, AuditError::DuplicateField { field, .. } if field == "x"));
    }

    #[test]
    fn catalog_rejects_form_with_repeated_field_id() {
        let form = Form::new(
            "f",
            vec![
                Section::new("a", vec![Field::new("x", 1)]),
                Section::new("b", vec![Field::new("x", 1).with_fatal(true)]),
            ],
        );
        let mut catalog = FormCatalog::new();
        let err = catalog.insert(form).unwrap_err();
        assert!(matches!(err, AuditError::DuplicateField { .. }));
        assert!(catalog.is_empty());
    }

    #[test]
    fn parse_form_flag_alias() {
        let toml = r#"
[form]
id = "f"
title = "F"

[[sections]]
id = "s"
title = "S"

[[sections.fields]]
id = "a"
title = "A"
flag = true
"#;
        let form = parse_form_str(toml, &PathBuf::from("f.toml")).unwrap();
        let field = &form.sections[0].fields[0];
        assert!(field.fatal);
        assert_eq!(field.weight, 1);
    }

    #[test]
    fn parse_valid_audit() {
        let audit =
            parse_audit_str(VALID_AUDIT, &PathBuf::from("audit.toml"), &catalog()).unwrap();
        assert_eq!(audit.id, "kitchen-2024-03");
        assert_eq!(audit.form.id, "kitchen");
        assert_eq!(audit.reference.as_deref(), Some("Main street"));
        assert_eq!(audit.scores().len(), 2);
        assert_eq!(audit.created_at.to_rfc3339(), "2024-03-01T09:00:00+00:00");
    }

    #[test]
    fn parse_audit_unknown_form() {
        let toml = "[audit]\nid = \"a\"\nform = \"bakery\"\n";
        let err = parse_audit_str(toml, &PathBuf::from("a.toml"), &catalog()).unwrap_err();
        assert!(format!("{err:#}").contains("form not found: bakery"));
    }

    #[test]
    fn parse_audit_unknown_field() {
        let toml = "[audit]\nid = \"a\"\nform = \"kitchen\"\n\n[scores]\noven = \"yes\"\n";
        let err = parse_audit_str(toml, &PathBuf::from("a.toml"), &catalog()).unwrap_err();
        assert!(format!("{err:#}").contains("oven"));
    }

    #[test]
    fn parse_audit_invalid_mark() {
        let toml = "[audit]\nid = \"a\"\nform = \"kitchen\"\n\n[scores]\nlabels = \"mostly\"\n";
        let err = parse_audit_str(toml, &PathBuf::from("a.toml"), &catalog()).unwrap_err();
        assert!(format!("{err:#}").contains("invalid mark"));
    }

    #[test]
    fn catalog_rejects_duplicate_ids() {
        let form = parse_form_str(VALID_FORM, &PathBuf::from("kitchen.toml")).unwrap();
        let err = FormCatalog::from_forms([form.clone(), form]).unwrap_err();
        assert!(matches!(err, AuditError::DuplicateForm(id) if id == "kitchen"));
    }

    #[test]
    fn validate_clean_form() {
        let form = parse_form_str(VALID_FORM, &PathBuf::from("kitchen.toml")).unwrap();
        assert!(validate_form(&form).is_empty());
    }

    #[test]
    fn validate_form_issues() {
        let form = Form::new(
            "f",
            vec![
                Section::new("s", vec![Field::new("a", 0)]),
                Section::new("s", vec![]),
                Section::new(
                    "t",
                    vec![
                        Field::new("c", 1),
                        Field::new("b", 1).with_fatal(true).with_label(Mark::Yes, "ok"),
                    ],
                ),
            ],
        );
        let warnings = validate_form(&form);
        let messages: Vec<&str> = warnings.iter().map(|w| w.message.as_str()).collect();
        assert!(messages.iter().any(|m| m.contains("duplicate section ID")));
        assert!(messages.iter().any(|m| m.contains("no fields")));
        assert!(messages.iter().any(|m| m.contains("weights are 0")));
        assert!(messages.iter().any(|m| m.contains("can never raise a flag")));
    }

    #[test]
    fn validate_form_without_sections() {
        let warnings = validate_form(&Form::new("f", vec![]));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].location.is_none());
    }

    #[test]
    fn validate_audit_issues() {
        let catalog = catalog();
        let mut audit = Audit::new("a", catalog.get("kitchen").unwrap());
        audit.record("surfaces", Mark::No).unwrap();
        let warnings = validate_audit(&audit);
        // fridge-temp is fatal and unscored; surfaces has no labels at all
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].location.as_deref(), Some("fridge-temp"));

        audit.record("fridge-temp", Mark::NotApplicable).unwrap();
        let warnings = validate_audit(&audit);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("not_applicable"));
    }

    #[test]
    fn parse_malformed_toml() {
        let bad = "this is not [valid toml }{";
        assert!(parse_form_str(bad, &PathBuf::from("bad.toml")).is_err());
    }

    #[test]
    fn load_directories() {
        let dir = tempfile::tempdir().unwrap();
        let forms = dir.path().join("forms");
        let audits = dir.path().join("audits");
        std::fs::create_dir_all(forms.join("nested")).unwrap();
        std::fs::create_dir_all(&audits).unwrap();
        std::fs::write(forms.join("nested/kitchen.toml"), VALID_FORM).unwrap();
        std::fs::write(forms.join("broken.toml"), "not toml {").unwrap();
        std::fs::write(forms.join("notes.txt"), "ignored").unwrap();
        std::fs::write(audits.join("march.toml"), VALID_AUDIT).unwrap();

        let catalog = FormCatalog::load(&forms).unwrap();
        assert_eq!(catalog.len(), 1);

        let loaded = load_audit_directory(&audits, &catalog).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, "kitchen-2024-03");
    }

    #[test]
    fn load_directory_requires_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("kitchen.toml");
        std::fs::write(&file, VALID_FORM).unwrap();
        assert!(load_form_directory(&file).is_err());
    }
}
