//! Incompatible object-type arguments.
//!
//! For every recorded call site, arguments passed to object-typed
//! parameters are resolved through the Set-target path. `Unknown` never
//! flags (resolution is conservative); `NotAnObject` and incompatible
//! concrete types do.

use tokio_util::sync::CancellationToken;

use vbatool_core::graph::{Declaration, DeclarationKind};

use crate::vba::engine::GraphSnapshot;
use crate::vba::inspections::{Inspection, InspectionResult, ResultTarget, Severity};
use crate::vba::resolver::{ResolvedType, SetTypeResolution, TypeResolver};

/// Flags arguments whose resolved Set type cannot be bound to the declared
/// parameter type.
pub struct ArgumentWithIncompatibleObjectType;

impl Inspection for ArgumentWithIncompatibleObjectType {
    fn name(&self) -> &'static str {
        "ArgumentWithIncompatibleObjectType"
    }

    fn severity(&self) -> Severity {
        Severity::Error
    }

    fn run(
        &self,
        snapshot: &GraphSnapshot,
        resolver: &TypeResolver<'_>,
        cancel: &CancellationToken,
    ) -> Vec<InspectionResult> {
        let mut results = Vec::new();

        for site in &snapshot.call_sites {
            if cancel.is_cancelled() {
                break;
            }
            let Some(callee) = snapshot.store.declaration(site.callee) else {
                continue;
            };
            let params: Vec<&Declaration> = snapshot
                .store
                .children_of(site.callee)
                .filter(|decl| decl.kind == DeclarationKind::Parameter)
                .collect();
            if params.is_empty() {
                continue;
            }

            for arg in &site.args {
                // Trailing arguments fold onto the last parameter
                // (ParamArray calling convention).
                let param = params[arg.index.min(params.len() - 1)];
                let Some(ResolvedType::Entity(param_type)) = resolver.declared_type(param) else {
                    // Value-typed, Variant/Object, or unresolvable parameter
                    // types never participate.
                    continue;
                };

                match resolver.resolve_set_target_type(&arg.expr, &site.scope) {
                    SetTypeResolution::Universal | SetTypeResolution::Unknown => {}
                    SetTypeResolution::NotAnObject => {
                        results.push(InspectionResult {
                            inspection: self.name(),
                            severity: self.severity(),
                            description: format!(
                                "The argument passed to parameter '{}' of '{}' is not an object",
                                param.name, callee.name
                            ),
                            module: site.module.clone(),
                            selection: arg.selection,
                            target: ResultTarget::Declaration(param.id),
                        });
                    }
                    SetTypeResolution::Object(arg_type) => {
                        if !resolver.object_types_compatible(&param_type, &arg_type) {
                            results.push(InspectionResult {
                                inspection: self.name(),
                                severity: self.severity(),
                                description: format!(
                                    "The argument passed to parameter '{}' of '{}' has set type '{}', which is incompatible with the declared type '{}'",
                                    param.name, callee.name, arg_type, param_type
                                ),
                                module: site.module.clone(),
                                selection: arg.selection,
                                target: ResultTarget::Declaration(param.id),
                            });
                        }
                    }
                }
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
    use tokio_util::sync::CancellationToken;
    use vbatool_core::graph::ModuleKind;
    use vbatool_core::QualifiedModuleName;

    use crate::vba::engine::{EngineConfig, ParserEngine};
    use crate::vba::inspections::{InspectionRun, InspectionRunner};

    const RULE: &str = "ArgumentWithIncompatibleObjectType";

    /// The fixture from the compatibility matrix: Class1 implements
    /// Interface1, Module1 calls `Bar expression`.
    fn run_fixture(param_type: &str, expression_decl: &str) -> InspectionRun {
        let interface1 = "Public Sub Foo()\nEnd Sub\n";
        let class1 = "Implements Interface1\n\nPrivate Sub Interface1_Foo()\nEnd Sub\n";
        let module1 = format!(
            "Private Sub DoIt()\n    {expression_decl}\n    Bar expression\nEnd Sub\n\nPrivate Sub Bar(baz As {param_type})\nEnd Sub\n"
        );

        let mut engine = ParserEngine::new(EngineConfig::default());
        let p = |module: &str| QualifiedModuleName::new("TestProject", module);
        engine.parse_module(p("Interface1"), ModuleKind::Class, interface1);
        engine.parse_module(p("Class1"), ModuleKind::Class, class1);
        engine.parse_module(p("Module1"), ModuleKind::Standard, &module1);
        engine.parse_module(
            QualifiedModuleName::new("OtherProject", "Class1"),
            ModuleKind::Class,
            "",
        );
        engine.parse_module(
            QualifiedModuleName::new("TestProject", "SomethingIncompatible"),
            ModuleKind::Class,
            "",
        );
        engine.resolve(&CancellationToken::new()).unwrap();
        let snapshot = engine.snapshot();
        InspectionRunner::with_defaults().run(&snapshot, &CancellationToken::new())
    }

    fn rule_count(run: &InspectionRun) -> usize {
        run.results
            .iter()
            .filter(|result| result.inspection == RULE)
            .count()
    }

    #[test]
    fn same_class_is_compatible() {
        let run = run_fixture("Class1", "Dim expression As Class1");
        assert_eq!(rule_count(&run), 0);
    }

    #[test]
    fn implementing_class_satisfies_interface_parameter() {
        let run = run_fixture("Interface1", "Dim expression As Class1");
        assert_eq!(rule_count(&run), 0);
    }

    #[test]
    fn interface_satisfies_implementing_class_parameter() {
        let run = run_fixture("Class1", "Dim expression As Interface1");
        assert_eq!(rule_count(&run), 0);
    }

    #[test]
    fn variant_parameter_accepts_anything() {
        let run = run_fixture("Variant", "Dim expression As SomethingIncompatible");
        assert_eq!(rule_count(&run), 0);
    }

    #[test]
    fn object_parameter_accepts_anything() {
        let run = run_fixture("Object", "Dim expression As SomethingIncompatible");
        assert_eq!(rule_count(&run), 0);
    }

    #[test]
    fn variant_argument_is_universal() {
        let run = run_fixture("Class1", "Dim expression As Variant");
        assert_eq!(rule_count(&run), 0);
    }

    #[test]
    fn incompatible_class_in_same_project_is_flagged() {
        let run = run_fixture("Class1", "Dim expression As SomethingIncompatible");
        assert_eq!(rule_count(&run), 1);
    }

    #[test]
    fn same_named_class_in_other_project_is_flagged() {
        let run = run_fixture("Class1", "Dim expression As OtherProject.Class1");
        assert_eq!(rule_count(&run), 1);
    }

    #[test]
    fn interface_parameter_rejects_other_project_class() {
        let run = run_fixture("Interface1", "Dim expression As OtherProject.Class1");
        assert_eq!(rule_count(&run), 1);
    }

    #[test]
    fn value_typed_argument_is_not_an_object() {
        let run = run_fixture("Class1", "Dim expression As Integer");
        assert_eq!(rule_count(&run), 1);
        let result = run
            .results
            .iter()
            .find(|result| result.inspection == RULE)
            .unwrap();
        assert!(result.description.contains("not an object"));
    }

    #[test]
    fn unresolved_argument_type_is_never_flagged() {
        // `expression` is never declared: resolution is conservative.
        let interface1 = "Public Sub Foo()\nEnd Sub\n";
        let module1 = "Private Sub DoIt()\n    Bar expression\nEnd Sub\n\nPrivate Sub Bar(baz As Class1)\nEnd Sub\n";
        let class1 = "";

        let mut engine = ParserEngine::new(EngineConfig::default());
        let p = |module: &str| QualifiedModuleName::new("TestProject", module);
        engine.parse_module(p("Interface1"), ModuleKind::Class, interface1);
        engine.parse_module(p("Class1"), ModuleKind::Class, class1);
        engine.parse_module(p("Module1"), ModuleKind::Standard, module1);
        engine.resolve(&CancellationToken::new()).unwrap();
        let run = InspectionRunner::with_defaults()
            .run(&engine.snapshot(), &CancellationToken::new());
        assert_eq!(rule_count(&run), 0);
    }

    #[test]
    fn missing_optional_arguments_are_skipped() {
        let module1 = "Private Sub DoIt()\n    Bar , Nothing\nEnd Sub\n\nPrivate Sub Bar(Optional baz As Class1 = Nothing, Optional bazBaz As Class1 = Nothing)\nEnd Sub\n";
        let mut engine = ParserEngine::new(EngineConfig::default());
        let p = |module: &str| QualifiedModuleName::new("TestProject", module);
        engine.parse_module(p("Class1"), ModuleKind::Class, "");
        engine.parse_module(p("Module1"), ModuleKind::Standard, module1);
        engine.resolve(&CancellationToken::new()).unwrap();
        let run = InspectionRunner::with_defaults()
            .run(&engine.snapshot(), &CancellationToken::new());
        assert_eq!(rule_count(&run), 0);
    }

    #[test]
    fn param_array_style_calls_are_not_flagged_for_untyped_params() {
        let module1 = "Private Sub DoIt()\n    Bar New Class1, New Class1, 42, 77\nEnd Sub\n\nPrivate Sub Bar(ParamArray baz)\nEnd Sub\n";
        let mut engine = ParserEngine::new(EngineConfig::default());
        let p = |module: &str| QualifiedModuleName::new("TestProject", module);
        engine.parse_module(p("Class1"), ModuleKind::Class, "");
        engine.parse_module(p("Module1"), ModuleKind::Standard, module1);
        engine.resolve(&CancellationToken::new()).unwrap();
        let run = InspectionRunner::with_defaults()
            .run(&engine.snapshot(), &CancellationToken::new());
        assert_eq!(rule_count(&run), 0);
    }

    #[test]
    fn new_expression_argument_checks_against_parameter() {
        let module1 = "Private Sub DoIt()\n    Bar New SomethingIncompatible\nEnd Sub\n\nPrivate Sub Bar(baz As Class1)\nEnd Sub\n";
        let mut engine = ParserEngine::new(EngineConfig::default());
        let p = |module: &str| QualifiedModuleName::new("TestProject", module);
        engine.parse_module(p("Class1"), ModuleKind::Class, "");
        engine.parse_module(p("SomethingIncompatible"), ModuleKind::Class, "");
        engine.parse_module(p("Module1"), ModuleKind::Standard, module1);
        engine.resolve(&CancellationToken::new()).unwrap();
        let run = InspectionRunner::with_defaults()
            .run(&engine.snapshot(), &CancellationToken::new());
        assert_eq!(rule_count(&run), 1);
    }
}
