//! Same-scope duplicate declarations.
//!
//! The binder tie-breaks duplicates by binding to the first declaration;
//! the duplicates themselves are a reportable condition, not a binder
//! error.

use std::collections::HashMap;

use tokio_util::sync::CancellationToken;

use vbatool_core::graph::{DeclarationId, DeclarationKind};

use crate::vba::engine::GraphSnapshot;
use crate::vba::inspections::{Inspection, InspectionResult, ResultTarget, Severity};
use crate::vba::resolver::TypeResolver;

/// Flags every declaration after the first that reuses a name within one
/// scope.
pub struct DuplicateDeclaration;

impl Inspection for DuplicateDeclaration {
    fn name(&self) -> &'static str {
        "DuplicateDeclaration"
    }

    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn run(
        &self,
        snapshot: &GraphSnapshot,
        _resolver: &TypeResolver<'_>,
        cancel: &CancellationToken,
    ) -> Vec<InspectionResult> {
        // (parent scope, case-folded name) → first declaration seen.
        let mut seen: HashMap<(Option<DeclarationId>, String), DeclarationId> = HashMap::new();
        let mut results = Vec::new();

        for decl in snapshot.store.declarations() {
            if cancel.is_cancelled() {
                break;
            }
            if decl.is_built_in
                || !matches!(
                    decl.kind,
                    DeclarationKind::Variable
                        | DeclarationKind::Constant
                        | DeclarationKind::Parameter
                )
            {
                continue;
            }
            let key = (decl.parent, decl.case_key());
            if seen.contains_key(&key) {
                let scope = snapshot.store.scope_of(decl);
                results.push(InspectionResult {
                    inspection: self.name(),
                    severity: self.severity(),
                    description: format!(
                        "'{}' is declared more than once in {}",
                        decl.name, scope
                    ),
                    module: decl.module.clone(),
                    selection: decl.selection,
                    target: ResultTarget::Declaration(decl.id),
                });
            } else {
                seen.insert(key, decl.id);
            }
        }
        results
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use crate::vba::inspections::tests::run_defaults;

    fn count(run: &crate::vba::inspections::InspectionRun, rule: &str) -> usize {
        run.results
            .iter()
            .filter(|result| result.inspection == rule)
            .count()
    }

    #[test]
    fn duplicate_local_is_flagged_once() {
        let run = run_defaults(&[(
            "Module1",
            "Public Sub Foo()\n    Dim x As Long\n    Dim x As Long\n    x = 1\nEnd Sub\n",
        )]);
        assert_eq!(count(&run, "DuplicateDeclaration"), 1);
    }

    #[test]
    fn case_differences_still_collide() {
        let run = run_defaults(&[(
            "Module1",
            "Public Sub Foo()\n    Dim value As Long\n    Dim VALUE As Long\n    value = 1\nEnd Sub\n",
        )]);
        assert_eq!(count(&run, "DuplicateDeclaration"), 1);
    }

    #[test]
    fn same_name_in_different_scopes_is_fine() {
        let run = run_defaults(&[(
            "Module1",
            "Private count As Long\n\nPublic Sub Foo()\n    Dim count As Long\n    count = 1\nEnd Sub\n\nPublic Sub Bar()\n    count = 2\nEnd Sub\n",
        )]);
        assert_eq!(count(&run, "DuplicateDeclaration"), 0);
    }

    #[test]
    fn narrower_scope_shadows_wider_in_binding() {
        // The local `count` shadows the module-level one inside Foo; the
        // module-level variable still has Bar's reference.
        let run = run_defaults(&[(
            "Module1",
            "Private count As Long\n\nPublic Sub Foo()\n    Dim count As Long\n    count = 1\nEnd Sub\n\nPublic Sub Bar()\n    count = 2\nEnd Sub\n",
        )]);
        assert_eq!(count(&run, "VariableNotUsed"), 0);
    }
}
