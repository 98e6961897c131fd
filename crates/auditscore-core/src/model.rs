//! Core data model types for auditscore.
//!
//! A `Form` is a reusable template of ordered sections and fields. An `Audit`
//! applies one form and records at most one `Score` per field.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AuditError, MarkError};

/// The answer recorded for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum Mark {
    Yes,
    No,
    Acceptable,
    NotApplicable,
}

impl Mark {
    /// Every mark, in display order.
    pub const ALL: [Mark; 4] = [Mark::Yes, Mark::No, Mark::Acceptable, Mark::NotApplicable];

    pub fn as_str(self) -> &'static str {
        match self {
            Mark::Yes => "yes",
            Mark::No => "no",
            Mark::Acceptable => "acceptable",
            Mark::NotApplicable => "not_applicable",
        }
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mark {
    type Err = MarkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "yes" => Ok(Mark::Yes),
            "no" => Ok(Mark::No),
            "acceptable" => Ok(Mark::Acceptable),
            "not_applicable" | "n/a" | "na" => Ok(Mark::NotApplicable),
            _ => Err(MarkError(s.to_string())),
        }
    }
}

impl TryFrom<String> for Mark {
    type Error = MarkError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Mark> for &'static str {
    fn from(mark: Mark) -> Self {
        mark.as_str()
    }
}

/// A percentage with two decimal places, stored as hundredths of a percent.
///
/// Always rendered with exactly two fraction digits and `.` as the decimal
/// separator, e.g. `"50.00"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Percentage(u32);

impl Percentage {
    pub const ZERO: Percentage = Percentage(0);
    pub const FULL: Percentage = Percentage(10_000);

    pub fn from_hundredths(hundredths: u32) -> Self {
        Self(hundredths)
    }

    pub fn hundredths(self) -> u32 {
        self.0
    }

    /// Round `numerator / denominator` percent half-up to two decimals.
    ///
    /// Returns zero when `denominator` is zero.
    pub fn from_ratio(numerator: u128, denominator: u128) -> Self {
        if denominator == 0 {
            return Self::ZERO;
        }
        let hundredths = (numerator * 200 + denominator) / (denominator * 2);
        Self(hundredths.min(u128::from(u32::MAX)) as u32)
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.0) / 100.0
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl FromStr for Percentage {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AuditError::InvalidPercentage(s.to_string());
        let trimmed = s.trim();
        let (whole, frac) = trimmed.split_once('.').unwrap_or((trimmed, "00"));
        let digits = |p: &str| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit());
        if !digits(whole) || !digits(frac) || frac.len() > 2 {
            return Err(invalid());
        }
        let whole: u32 = whole.parse().map_err(|_| invalid())?;
        let frac: u32 = match frac.len() {
            1 => frac.parse::<u32>().map_err(|_| invalid())? * 10,
            _ => frac.parse().map_err(|_| invalid())?,
        };
        whole
            .checked_mul(100)
            .and_then(|w| w.checked_add(frac))
            .filter(|&hundredths| hundredths <= Self::FULL.0)
            .map(Self)
            .ok_or_else(invalid)
    }
}

impl TryFrom<String> for Percentage {
    type Error = AuditError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Percentage> for String {
    fn from(p: Percentage) -> Self {
        p.to_string()
    }
}

/// Identifier of a field, unique within its form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldId(pub String);

impl FieldId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FieldId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for FieldId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// The smallest scoreable unit of a form.
#[derive(Debug, Clone)]
pub struct Field {
    pub id: FieldId,
    pub title: String,
    pub description: Option<String>,
    /// Contribution of this field to its section's weight.
    pub weight: u32,
    /// A fatal field raises a flag (and fails the audit) when marked `no`.
    pub fatal: bool,
    /// Text shown when this field raises a flag.
    pub flag_text: Option<String>,
    /// Human-readable definition of each mark. Not every mark needs a label.
    pub marks: BTreeMap<Mark, String>,
}

impl Field {
    pub fn new(id: impl Into<FieldId>, weight: u32) -> Self {
        let id = id.into();
        Self {
            title: id.0.clone(),
            id,
            description: None,
            weight,
            fatal: false,
            flag_text: None,
            marks: BTreeMap::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_fatal(mut self, fatal: bool) -> Self {
        self.fatal = fatal;
        self
    }

    /// Attach a label to a mark. Blank labels are ignored.
    pub fn with_label(mut self, mark: Mark, label: impl Into<String>) -> Self {
        let label = label.into();
        if !label.trim().is_empty() {
            self.marks.insert(mark, label);
        }
        self
    }

    pub fn label(&self, mark: Mark) -> Option<&str> {
        self.marks.get(&mark).map(String::as_str)
    }
}

/// An ordered group of fields within a form.
#[derive(Debug, Clone)]
pub struct Section {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub fields: Vec<Field>,
}

impl Section {
    pub fn new(id: impl Into<String>, fields: Vec<Field>) -> Self {
        let id = id.into();
        Self {
            title: id.clone(),
            id,
            description: None,
            fields,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }
}

/// A checklist template: ordered sections of weighted fields.
#[derive(Debug, Clone)]
pub struct Form {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub sections: Vec<Section>,
}

impl Form {
    pub fn new(id: impl Into<String>, sections: Vec<Section>) -> Self {
        let id = id.into();
        Self {
            title: id.clone(),
            id,
            description: None,
            sections,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// All fields of the form, in section order.
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.sections.iter().flat_map(|s| s.fields.iter())
    }

    pub fn field(&self, id: &FieldId) -> Option<&Field> {
        self.fields().find(|f| &f.id == id)
    }

    /// Scores are matched to fields by id, so a form must not repeat one.
    pub fn check_field_ids(&self) -> Result<(), AuditError> {
        let mut seen = HashSet::new();
        match self.fields().find(|f| !seen.insert(&f.id)) {
            Some(field) => Err(AuditError::DuplicateField {
                form: self.id.clone(),
                field: field.id.0.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// A recorded answer for one field of one audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub field: FieldId,
    pub mark: Mark,
}

/// One application of a form, carrying its scores and derived results.
#[derive(Debug, Clone)]
pub struct Audit {
    pub id: String,
    pub form: Arc<Form>,
    /// The audited subject (site, team, ticket, ...).
    pub reference: Option<String>,
    pub auditor: Option<String>,
    pub created_at: DateTime<Utc>,
    scores: Vec<Score>,
    /// Set by the scoring pass when any fatal field is marked `no`.
    pub failed: bool,
    /// Set by the scoring pass.
    pub total_score: Option<Percentage>,
}

impl Audit {
    pub fn new(id: impl Into<String>, form: Arc<Form>) -> Self {
        Self {
            id: id.into(),
            form,
            reference: None,
            auditor: None,
            created_at: Utc::now(),
            scores: Vec::new(),
            failed: false,
            total_score: None,
        }
    }

    pub fn scores(&self) -> &[Score] {
        &self.scores
    }

    /// Record a mark for a field, replacing any earlier score for it.
    ///
    /// Returns the previously recorded mark, if any.
    pub fn record(
        &mut self,
        field: impl Into<FieldId>,
        mark: Mark,
    ) -> Result<Option<Mark>, AuditError> {
        let field = field.into();
        if self.form.field(&field).is_none() {
            return Err(AuditError::UnknownField {
                form: self.form.id.clone(),
                field: field.0,
            });
        }

        if let Some(existing) = self.scores.iter_mut().find(|s| s.field == field) {
            let previous = existing.mark;
            existing.mark = mark;
            return Ok(Some(previous));
        }

        self.scores.push(Score { field, mark });
        Ok(None)
    }

    /// Remove the score for a field, returning its mark.
    pub fn remove_score(&mut self, field: &FieldId) -> Option<Mark> {
        let index = self.scores.iter().position(|s| &s.field == field)?;
        Some(self.scores.remove(index).mark)
    }
}
