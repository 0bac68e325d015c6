//! storagereport - Owner-report pipeline for self-storage management exports
//!
//! This crate extracts a fixed schema of occupancy, revenue and delinquency
//! fields from spreadsheet exports produced by self-storage property-management
//! software, and substitutes them into slide-deck or document templates to
//! produce owner-facing reports.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use storagereport::{ReportBuilder, OWNER_REPORT_TEMPLATE};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Create an engine with default settings
//!     let engine = ReportBuilder::new().build()?;
//!
//!     // Extract the field record from an uploaded workbook
//!     let bytes = std::fs::read("management_summary.xlsx")?;
//!     let record = engine.extract_fields(&bytes, "management_summary.xlsx")?;
//!
//!     // Render the bundled owner-report deck
//!     let deck = engine.render_template(OWNER_REPORT_TEMPLATE, &record)?;
//!     std::fs::write("owner_report.pptx", deck)?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Template Validation
//!
//! Before shipping a template asset, check that it carries every token a
//! schema subset requires:
//!
//! ```rust,no_run
//! use storagereport::{ReportBuilder, DELINQUENCY_TOKENS};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = ReportBuilder::new().build()?;
//!     let template = std::fs::read("custom_report.pptx")?;
//!
//!     // Fails with ReportError::TemplateCoverage listing the absent tokens
//!     let scan = engine.validate_template(&template, &DELINQUENCY_TOKENS)?;
//!     println!("{} ({} tokens)", scan.content_hash, scan.all.len());
//!
//!     Ok(())
//! }
//! ```
//!
//! # Delinquency Audit
//!
//! ```rust,no_run
//! use storagereport::{build_audit_rows, render_audit_table, ReportBuilder, DELINQUENCY_TOKENS};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = ReportBuilder::new().build()?;
//!     let bytes = std::fs::read("aging.xlsx")?;
//!
//!     let extraction = engine.extract_with_provenance(&bytes, "aging.xlsx", &DELINQUENCY_TOKENS)?;
//!     let rows = build_audit_rows(&extraction.record, &extraction.provenance, &DELINQUENCY_TOKENS);
//!     println!("{}", render_audit_table(&rows));
//!
//!     Ok(())
//! }
//! ```
//!
//! # Logging
//!
//! The crate logs through the `log` facade and never installs a logger:
//! `debug!` for per-cell match decisions, `info!` for extraction and render
//! summaries, `warn!` for unmatched labels, missing fields and unknown template
//! tokens.

mod api;
mod audit;
mod builder;
mod error;
mod extractor;
mod formatter;
mod matcher;
mod parser;
mod schema;
mod security;
mod template;
mod token;
mod types;

// 公開API
pub use api::{Adjacency, DateFormat};
pub use audit::{build_audit_rows, render_audit_table, write_audit_table, AuditRow, MISSING_SHEET};
pub use builder::{ReportBuilder, ReportEngine};
pub use error::{PlaceholderIssue, ReportError, UnresolvedPlaceholder};
pub use extractor::{Extraction, Provenance, TokenProvenance, UnmatchedLabel};
pub use formatter::display_value;
pub use matcher::{label_key, LabelMatch, LabelMatcher};
pub use schema::{
    Field, FieldKind, FieldRecord, FieldValue, LabelEntry, LabelTable, DELINQUENCY_TOKENS,
};
pub use template::TemplateScan;
pub use token::normalize_token;
pub use types::{CellCoord, CellValue, Sheet, Workbook};

/// 同梱のオーナーレポートテンプレート（PowerPoint）
///
/// すべての正規トークン（延滞関連の9トークンを含む）を持ちます。
pub const OWNER_REPORT_TEMPLATE: &[u8] = include_bytes!("../templates/owner_report.pptx");
