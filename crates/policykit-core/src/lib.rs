//! Core types and error definitions for the policykit compliance catalog.
//!
//! This crate provides the shapes shared by the catalog and its consumers:
//! the rich-text document tree used for policy bodies, the record types that
//! the catalog links by id, and the error taxonomy for integrity failures.
//!
//! # Main types
//!
//! - [`PolicyKitError`]: Unified error enum for loading and lookups.
//! - [`IntegrityViolation`]: A single content-authoring defect.
//! - [`Node`]: A node of a policy document tree.
//! - [`Policy`]: Policy metadata plus its document tree.
//! - [`Control`]: Links a policy and evidence to framework requirements.
//! - [`Substitutions`]: Values for `{{organization}}`-style placeholders.

/// Rich-text document tree, traversal and shape validation.
pub mod document;
/// Error types.
pub mod error;
/// Template placeholders and their substitution values.
pub mod placeholder;
/// Catalog record types and their closed enums.
pub mod records;

pub use document::{Mark, Node, NodeKind};
pub use error::{IntegrityViolation, PolicyKitError, PolicyKitResult};
pub use placeholder::{PlaceholderKey, Substitutions};
pub use records::{
    Control, Department, Evidence, Framework, FrameworkId, Frequency, MappedArtifact,
    MappedRequirement, Policy, PolicyMetadata, Requirement, TrainingVideo,
};
