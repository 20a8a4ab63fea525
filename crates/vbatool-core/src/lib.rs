//! Core infrastructure for vbatool.
//!
//! This crate provides language-agnostic infrastructure:
//! - Qualified identities: module names, selections, scopes
//! - The declaration graph store (declarations + references)
//! - Patch IR for representing computed edit sets
//! - Text utilities for byte offset and line:column conversions
//! - Shared error types

pub mod error;
pub mod graph;
pub mod patch;
pub mod text;
pub mod types;

pub use error::PatchError;
pub use graph::{
    Accessibility, Declaration, DeclarationId, DeclarationKind, DeclarationStore, ModuleKind,
    ModuleSuppressions, ProcedureKind, Reference, ReferenceId, ReferenceKind, UnboundUse,
};
pub use patch::{ContentHash, Edit, EditSet, EditSummary, Span};
pub use types::{QualifiedModuleName, QualifiedSelection, Scope, Selection};
