//! auditscore-core: audit checklist model, scoring engine, and reports.
//!
//! This crate defines the form/audit data model, the weighted scoring logic
//! that rolls field marks up into section and audit percentages, and the
//! document loaders and reports the CLI builds on.

pub mod config;
pub mod error;
pub mod model;
pub mod parser;
pub mod report;
pub mod scoring;

pub use error::{AuditError, MarkError};
pub use model::{Audit, Field, FieldId, Form, Mark, Percentage, Score, Section};
