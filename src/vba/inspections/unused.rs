//! Unused-declaration inspections.

use tokio_util::sync::CancellationToken;

use vbatool_core::graph::{Declaration, DeclarationKind};

use crate::vba::engine::GraphSnapshot;
use crate::vba::inspections::{Inspection, InspectionResult, ResultTarget, Severity};
use crate::vba::resolver::TypeResolver;

/// Interface implementations and event handlers follow the
/// `Interface_Member` naming pattern and are invoked by the host, not by
/// user code; "unused" does not apply to them.
fn is_host_invoked(name: &str) -> bool {
    name.contains('_')
}

fn unused_result(
    rule: &'static str,
    severity: Severity,
    decl: &Declaration,
    noun: &str,
) -> InspectionResult {
    InspectionResult {
        inspection: rule,
        severity,
        description: format!("{} '{}' is declared but never used", noun, decl.name),
        module: decl.module.clone(),
        selection: decl.selection,
        target: ResultTarget::Declaration(decl.id),
    }
}

/// Flags constants with zero references.
pub struct ConstantNotUsed;

impl Inspection for ConstantNotUsed {
    fn name(&self) -> &'static str {
        "ConstantNotUsed"
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
        let mut results = Vec::new();
        for decl in snapshot.store.declarations() {
            if cancel.is_cancelled() {
                break;
            }
            if decl.kind == DeclarationKind::Constant
                && !decl.is_built_in
                && snapshot.store.ref_count(decl.id) == 0
            {
                results.push(unused_result(self.name(), self.severity(), decl, "Constant"));
            }
        }
        results
    }
}

/// Flags variables with zero references.
pub struct VariableNotUsed;

impl Inspection for VariableNotUsed {
    fn name(&self) -> &'static str {
        "VariableNotUsed"
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
        let mut results = Vec::new();
        for decl in snapshot.store.declarations() {
            if cancel.is_cancelled() {
                break;
            }
            if decl.kind == DeclarationKind::Variable
                && !decl.is_built_in
                && snapshot.store.ref_count(decl.id) == 0
            {
                results.push(unused_result(self.name(), self.severity(), decl, "Variable"));
            }
        }
        results
    }
}

/// Flags procedures that are never called or referenced.
pub struct ProcedureNotUsed;

impl Inspection for ProcedureNotUsed {
    fn name(&self) -> &'static str {
        "ProcedureNotUsed"
    }

    fn severity(&self) -> Severity {
        Severity::Suggestion
    }

    fn run(
        &self,
        snapshot: &GraphSnapshot,
        _resolver: &TypeResolver<'_>,
        cancel: &CancellationToken,
    ) -> Vec<InspectionResult> {
        let mut results = Vec::new();
        for decl in snapshot.store.declarations() {
            if cancel.is_cancelled() {
                break;
            }
            if decl.kind.is_procedural()
                && !decl.is_built_in
                && !is_host_invoked(&decl.name)
                && snapshot.store.ref_count(decl.id) == 0
            {
                results.push(unused_result(
                    self.name(),
                    self.severity(),
                    decl,
                    "Procedure",
                ));
            }
        }
        results
    }
}

/// Flags parameters never referenced inside their procedure.
pub struct ParameterNotUsed;

impl Inspection for ParameterNotUsed {
    fn name(&self) -> &'static str {
        "ParameterNotUsed"
    }

    fn severity(&self) -> Severity {
        Severity::Suggestion
    }

    fn run(
        &self,
        snapshot: &GraphSnapshot,
        _resolver: &TypeResolver<'_>,
        cancel: &CancellationToken,
    ) -> Vec<InspectionResult> {
        let mut results = Vec::new();
        for decl in snapshot.store.declarations() {
            if cancel.is_cancelled() {
                break;
            }
            if decl.kind != DeclarationKind::Parameter || decl.is_built_in {
                continue;
            }
            let parent_is_host_invoked = decl
                .parent
                .and_then(|parent| snapshot.store.declaration(parent))
                .is_some_and(|parent| parent.is_built_in || is_host_invoked(&parent.name));
            if !parent_is_host_invoked && snapshot.store.ref_count(decl.id) == 0 {
                results.push(unused_result(
                    self.name(),
                    self.severity(),
                    decl,
                    "Parameter",
                ));
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
    fn unused_constant_yields_one_result() {
        let run = run_defaults(&[(
            "Module1",
            "Public Sub Foo()\n    Const const1 As Integer = 9\nEnd Sub\n",
        )]);
        assert_eq!(count(&run, "ConstantNotUsed"), 1);
    }

    #[test]
    fn two_unused_constants_yield_two_results() {
        let run = run_defaults(&[(
            "Module1",
            "Public Sub Foo()\n    Const const1 As Integer = 9\n    Const const2 As String = \"test\"\nEnd Sub\n",
        )]);
        assert_eq!(count(&run, "ConstantNotUsed"), 2);
    }

    #[test]
    fn two_unused_constants_on_one_statement_yield_two_results() {
        let run = run_defaults(&[(
            "Module1",
            "Public Sub Foo()\n    Const const1 As Integer = 9, const2 As String = \"test\"\nEnd Sub\n",
        )]);
        assert_eq!(count(&run, "ConstantNotUsed"), 2);
    }

    #[test]
    fn used_constant_yields_no_result() {
        let run = run_defaults(&[(
            "Module1",
            "Public Sub Foo()\n    Const const1 As Integer = 9\n    Goo const1\nEnd Sub\n\nPublic Sub Goo(ByVal arg1 As Integer)\nEnd Sub\n",
        )]);
        assert_eq!(count(&run, "ConstantNotUsed"), 0);
    }

    #[test]
    fn mixed_used_and_unused_constants() {
        let run = run_defaults(&[(
            "Module1",
            "Public Sub Foo()\n    Const const1 As Integer = 9\n    Goo const1\n\n    Const const2 As String = \"test\"\nEnd Sub\n\nPublic Sub Goo(ByVal arg1 As Integer)\nEnd Sub\n",
        )]);
        assert_eq!(count(&run, "ConstantNotUsed"), 1);
    }

    #[test]
    fn constant_used_mid_expression_is_not_flagged() {
        let run = run_defaults(&[(
            "Module1",
            "Function UnAccent(ByVal inputString As String) As String\n    Dim Index As Long, Position As Long\n    Const ACCENTED As String = \"abc\"\n    For Index = 1 To Len(inputString)\n        Position = InStr(ACCENTED, Mid(inputString, Index, 1))\n    Next\n    UnAccent = inputString\nEnd Function\n",
        )]);
        assert_eq!(count(&run, "ConstantNotUsed"), 0);
    }

    #[test]
    fn unused_variable_is_flagged() {
        let run = run_defaults(&[(
            "Module1",
            "Public Sub Foo()\n    Dim unused As Long\nEnd Sub\n",
        )]);
        assert_eq!(count(&run, "VariableNotUsed"), 1);
    }

    #[test]
    fn assigned_variable_counts_as_used() {
        let run = run_defaults(&[(
            "Module1",
            "Public Sub Foo()\n    Dim x As Long\n    x = 1\nEnd Sub\n",
        )]);
        assert_eq!(count(&run, "VariableNotUsed"), 0);
    }

    #[test]
    fn uncalled_procedure_is_flagged_called_is_not() {
        let run = run_defaults(&[(
            "Module1",
            "Public Sub Lonely()\nEnd Sub\n\nPublic Sub Caller()\n    Busy\nEnd Sub\n\nPublic Sub Busy()\nEnd Sub\n",
        )]);
        let flagged: Vec<&str> = run
            .results
            .iter()
            .filter(|result| result.inspection == "ProcedureNotUsed")
            .map(|result| result.description.as_str())
            .collect();
        assert!(flagged.iter().any(|d| d.contains("'Lonely'")));
        assert!(flagged.iter().any(|d| d.contains("'Caller'")));
        assert!(!flagged.iter().any(|d| d.contains("'Busy'")));
    }

    #[test]
    fn interface_implementation_is_not_flagged_unused() {
        let run = run_defaults(&[(
            "Module1",
            "Private Sub Interface1_Foo()\nEnd Sub\n",
        )]);
        assert_eq!(count(&run, "ProcedureNotUsed"), 0);
        assert_eq!(count(&run, "ParameterNotUsed"), 0);
    }

    #[test]
    fn unused_parameter_is_flagged() {
        let run = run_defaults(&[(
            "Module1",
            "Public Sub Foo(ByVal unused As Long)\nEnd Sub\n\nPublic Sub Caller()\n    Foo 1\nEnd Sub\n",
        )]);
        assert_eq!(count(&run, "ParameterNotUsed"), 1);
    }

    #[test]
    fn used_parameter_is_not_flagged() {
        let run = run_defaults(&[(
            "Module1",
            "Public Sub Foo(ByVal x As Long)\n    Goo x\nEnd Sub\n\nPublic Sub Goo(ByVal y As Long)\n    Dim z As Long\n    z = y\nEnd Sub\n",
        )]);
        assert_eq!(count(&run, "ParameterNotUsed"), 0);
    }
}
