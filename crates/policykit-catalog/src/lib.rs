//! The SOC 2 and GDPR compliance catalog.
//!
//! Policy templates, evidence descriptions, framework requirements, the
//! controls that link them and the security awareness training videos ship
//! as JSON compiled into this crate. They are parsed once, checked for
//! referential integrity and node shape, and exposed as an immutable value.
//!
//! # Main types
//!
//! - [`Catalog`]: The loaded, checked catalog and its lookup accessors.
//! - [`CatalogSources`]: Raw JSON for every catalog, embedded or read from disk.
//! - [`ResolvedControl`]: A control joined against policies, evidence and requirements.
//! - [`CoverageReport`]: Per-framework requirement coverage by controls.
//! - [`JsonCatalogStore`]: Exports a catalog to a directory and loads it back.

/// Catalog construction and lookups.
pub mod catalog;
/// The dataset compiled into the crate.
pub mod embedded;
/// Referential-integrity and shape checks.
pub mod integrity;
/// Catalog persistence to JSON files.
pub mod persistence;
/// Requirement coverage reports.
pub mod report;
/// Joining controls against the other catalogs.
pub mod resolve;

pub use catalog::Catalog;
pub use embedded::CatalogSources;
pub use persistence::{CatalogStore, JsonCatalogStore};
pub use report::{CoverageReport, CoverageStatus, RequirementCoverage};
pub use resolve::{ResolvedControl, ResolvedRequirement};
