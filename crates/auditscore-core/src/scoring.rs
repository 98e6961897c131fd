//! Weighted audit scoring.
//!
//! Field marks map to fixed percentages, sections average their fields, and
//! the audit total is the section results weighted by section weight.
//!
//! Fatal fields are averaged like any other field. A fatal field marked `no`
//! only raises its section's flag, which in turn fails the audit.

use crate::model::{Audit, Field, Mark, Percentage, Score, Section};

/// Mark assumed for a field that has no recorded score.
///
/// Only used for percentages; an unscored fatal field never raises a flag.
pub const DEFAULT_MARK: Mark = Mark::Yes;

/// Result of a section without fields.
pub const EMPTY_SECTION_RESULT: Percentage = Percentage::FULL;

/// Result of an audit whose form has no sections.
pub const EMPTY_FORM_RESULT: Percentage = Percentage::ZERO;

/// Percentage earned by a single mark.
pub fn mark_to_percentage(mark: Mark) -> u32 {
    match mark {
        Mark::Yes | Mark::NotApplicable => 100,
        Mark::Acceptable => 50,
        Mark::No => 0,
    }
}

/// The recorded score for `field`, if any.
pub fn score_for_field<'a>(audit: &'a Audit, field: &Field) -> Option<&'a Score> {
    audit.scores().iter().find(|s| s.field == field.id)
}

/// The recorded mark for `field`, or [`DEFAULT_MARK`].
pub fn effective_mark(audit: &Audit, field: &Field) -> Mark {
    score_for_field(audit, field)
        .map(|s| s.mark)
        .unwrap_or(DEFAULT_MARK)
}

/// Sum of the section's field weights.
pub fn section_weight(section: &Section) -> u64 {
    section.fields.iter().map(|f| u64::from(f.weight)).sum()
}

/// Mean mark percentage over the section's fields.
pub fn result_for_section(audit: &Audit, section: &Section) -> Percentage {
    if section.fields.is_empty() {
        return EMPTY_SECTION_RESULT;
    }

    let achieved: u128 = section
        .fields
        .iter()
        .map(|f| u128::from(mark_to_percentage(effective_mark(audit, f))))
        .sum();

    Percentage::from_ratio(achieved, section.fields.len() as u128)
}

/// Whether any fatal field of the section is marked `no`.
pub fn section_flag(audit: &Audit, section: &Section) -> bool {
    section.fields.iter().any(|f| {
        f.fatal && score_for_field(audit, f).is_some_and(|s| s.mark == Mark::No)
    })
}

/// Score the whole audit.
///
/// Resets and recomputes `audit.failed`, stores the result in
/// `audit.total_score`, and returns it.
pub fn result_for_audit(audit: &mut Audit) -> Percentage {
    let (total, failed) = weighted_total(audit);
    audit.failed = failed;
    audit.total_score = Some(total);
    total
}

/// Sum of all section weights of the audit's form.
pub fn total_weight(audit: &Audit) -> u64 {
    audit.form.sections.iter().map(section_weight).sum()
}

fn weighted_total(audit: &Audit) -> (Percentage, bool) {
    let sections = &audit.form.sections;
    if sections.is_empty() {
        return (EMPTY_FORM_RESULT, false);
    }

    // Accumulate hundredths * weight exactly and divide once.
    let mut weighted: u128 = 0;
    let mut divisor: u128 = 0;
    let mut failed = false;

    for section in sections {
        let percent = result_for_section(audit, section);
        let weight = section_weight(section);
        let flagged = section_flag(audit, section);

        tracing::debug!(
            audit = %audit.id,
            section = %section.id,
            %percent,
            weight,
            flagged,
            "scored section"
        );

        failed |= flagged;
        weighted += u128::from(percent.hundredths()) * u128::from(weight);
        divisor += u128::from(weight);
    }

    // hundredths / 100 = percent
    (Percentage::from_ratio(weighted, divisor * 100), failed)
}
