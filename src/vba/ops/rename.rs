//! Rename refactoring.
//!
//! Validates the rename, then computes the full edit set: the defining
//! identifier span plus every reference span, each replaced with the new
//! name. Property accessors sharing the target's name rename together.
//! Computation never mutates the graph; a failed precondition aborts with
//! no edits.

use thiserror::Error;
use tracing::debug;

use vbatool_core::graph::{Declaration, DeclarationId, DeclarationKind, ProcedureKind};
use vbatool_core::{Edit, EditSet};

use crate::vba::engine::{GraphSnapshot, ParserEngine};
use crate::vba::validation::{validate_identifier, ValidationError};

/// Why a rename was rejected. No partial edit set is ever produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefactoringError {
    #[error("no such declaration in this snapshot")]
    UnknownDeclaration,

    #[error("cannot rename {0}")]
    InvalidTarget(String),

    #[error("'{0}' is already the declaration's name")]
    SameName(String),

    #[error("invalid identifier '{name}': {reason}")]
    InvalidIdentifier { name: String, reason: String },

    #[error("'{name}' already identifies a declaration in {existing}")]
    NameConflict { name: String, existing: String },

    /// The engine's published snapshot advanced past the one this rename
    /// was computed against.
    #[error("snapshot is stale: computed against version {computed_against}, current is {current}")]
    StaleSnapshot { computed_against: u64, current: u64 },
}

/// Computes rename edit sets against one unchanging snapshot.
pub struct RenameRefactoring<'a> {
    snapshot: &'a GraphSnapshot,
}

impl<'a> RenameRefactoring<'a> {
    /// Create a refactoring over a snapshot.
    pub fn new(snapshot: &'a GraphSnapshot) -> Self {
        RenameRefactoring { snapshot }
    }

    /// Validate and compute the edit set for renaming `target` to
    /// `new_name`.
    pub fn rename(
        &self,
        target: DeclarationId,
        new_name: &str,
    ) -> Result<EditSet, RefactoringError> {
        let store = &self.snapshot.store;
        let target = store
            .declaration(target)
            .ok_or(RefactoringError::UnknownDeclaration)?;

        if target.is_built_in {
            return Err(RefactoringError::InvalidTarget(format!(
                "'{}' is supplied by the host environment",
                target.name
            )));
        }
        if matches!(
            target.kind,
            DeclarationKind::Module(_) | DeclarationKind::Project
        ) {
            return Err(RefactoringError::InvalidTarget(format!(
                "{} '{}': renaming components is a host operation",
                target.kind.describe(),
                target.name
            )));
        }
        if target.name.eq_ignore_ascii_case(new_name) {
            return Err(RefactoringError::SameName(new_name.to_string()));
        }
        validate_identifier(new_name).map_err(|error: ValidationError| {
            RefactoringError::InvalidIdentifier {
                name: new_name.to_string(),
                reason: error.to_string(),
            }
        })?;
        self.check_conflicts(target, new_name)?;

        // Property accessors share one name; rename the whole group.
        let is_property = matches!(
            target.kind,
            DeclarationKind::Procedure(
                ProcedureKind::PropertyGet | ProcedureKind::PropertyLet | ProcedureKind::PropertySet
            )
        );
        let mut targets = vec![target];
        if is_property {
            targets.extend(store.declarations_in_module(&target.module).filter(|decl| {
                decl.id != target.id
                    && decl.kind.is_procedural()
                    && decl.name.eq_ignore_ascii_case(&target.name)
            }));
        }

        let mut edits = EditSet::new();
        for declaration in &targets {
            edits.push(Edit::new(
                declaration.module.clone(),
                declaration.span,
                declaration.selection,
                new_name,
            ));
            for reference in store.refs_of(declaration.id) {
                edits.push(Edit::new(
                    reference.module.clone(),
                    reference.span,
                    reference.selection,
                    new_name,
                ));
            }
        }
        debug!(
            target = %target.name,
            new_name,
            edits = edits.len(),
            "rename computed"
        );
        Ok(edits)
    }

    /// Reject the rename when `new_name` already identifies a distinct
    /// declaration visible in any scope where the target is visible.
    fn check_conflicts(
        &self,
        target: &Declaration,
        new_name: &str,
    ) -> Result<(), RefactoringError> {
        let store = &self.snapshot.store;

        for candidate in store.declarations_named(new_name) {
            if candidate.id == target.id || candidate.is_built_in {
                continue;
            }
            if matches!(
                candidate.kind,
                DeclarationKind::Module(_) | DeclarationKind::Project
            ) {
                continue;
            }

            // Same module: one of the two would shadow the other.
            let same_module = candidate.module == target.module;
            // A public module-level declaration in the same project is
            // visible everywhere the target is.
            let visible_public = candidate.module.project == target.module.project
                && self.is_public_module_level(candidate);
            // A declaration in a scope holding one of the target's
            // references would capture that reference after the rename.
            let captures_reference = {
                let candidate_scope = store.scope_of(candidate);
                store
                    .refs_of(target.id)
                    .any(|reference| reference.scope == candidate_scope)
            };

            if same_module || visible_public || captures_reference {
                return Err(RefactoringError::NameConflict {
                    name: new_name.to_string(),
                    existing: store.scope_of(candidate).to_string(),
                });
            }
        }
        Ok(())
    }

    fn is_public_module_level(&self, decl: &Declaration) -> bool {
        use vbatool_core::graph::Accessibility;
        let module_level = decl
            .parent
            .and_then(|parent| self.snapshot.store.declaration(parent))
            .is_some_and(|parent| matches!(parent.kind, DeclarationKind::Module(_)));
        if !module_level {
            return false;
        }
        match decl.kind {
            DeclarationKind::Procedure(_)
            | DeclarationKind::Enumeration
            | DeclarationKind::UserDefinedType => decl.accessibility != Accessibility::Private,
            _ => decl.accessibility.is_public(),
        }
    }
}

impl ParserEngine {
    /// Rename against a snapshot, rejecting stale snapshots instead of
    /// silently applying to moved state.
    pub fn rename(
        &self,
        snapshot: &GraphSnapshot,
        target: DeclarationId,
        new_name: &str,
    ) -> Result<EditSet, RefactoringError> {
        if snapshot.version != self.version() {
            return Err(RefactoringError::StaleSnapshot {
                computed_against: snapshot.version,
                current: self.version(),
            });
        }
        RenameRefactoring::new(snapshot).rename(target, new_name)
    }
}

// ============================================================================
// Tests
// ============================================================================
