//! JSON output types for CLI responses.
//!
//! These are information carriers for serialization; the domain types stay
//! free of presentation concerns. Output is deterministic for identical
//! input, apart from the `generated_at` timestamp.

use serde::{Deserialize, Serialize};

use vbatool_core::EditSet;

use crate::vba::engine::{GraphSnapshot, ParseDiagnostic};
use crate::vba::inspections::{InspectionResult, InspectionRun};
use crate::vba::ProjectStatus;

fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

// ============================================================================
// Analyze
// ============================================================================

/// Per-module status line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleStatusInfo {
    pub module: String,
    pub state: String,
    /// Parse diagnostic, present for modules in the error state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

/// One inspection result, flattened for output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectionResultInfo {
    pub inspection: String,
    pub severity: String,
    pub module: String,
    pub start_line: u32,
    pub start_column: u32,
    pub description: String,
}

impl InspectionResultInfo {
    fn from_result(result: &InspectionResult) -> Self {
        InspectionResultInfo {
            inspection: result.inspection.to_string(),
            severity: result.severity.as_str().to_string(),
            module: result.module.to_string(),
            start_line: result.selection.start_line,
            start_column: result.selection.start_column,
            description: result.description.clone(),
        }
    }
}

/// Full `analyze` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeOutput {
    pub status: String,
    pub generated_at: String,
    pub project_status: String,
    pub modules: Vec<ModuleStatusInfo>,
    pub results: Vec<InspectionResultInfo>,
    /// Modules excluded from analysis; results are incomplete when this is
    /// non-empty.
    pub excluded_modules: Vec<String>,
    pub cancelled: bool,
}

impl AnalyzeOutput {
    /// Assemble the analyze response from a snapshot and an inspection run.
    pub fn new(status: ProjectStatus, snapshot: &GraphSnapshot, run: &InspectionRun) -> Self {
        let modules = snapshot
            .module_states
            .iter()
            .map(|(module, state)| ModuleStatusInfo {
                module: module.to_string(),
                state: state.as_str().to_string(),
                diagnostic: snapshot.diagnostics.get(module).map(format_diagnostic),
            })
            .collect();
        AnalyzeOutput {
            status: "ok".to_string(),
            generated_at: timestamp(),
            project_status: status.as_str().to_string(),
            modules,
            results: run.results.iter().map(InspectionResultInfo::from_result).collect(),
            excluded_modules: run
                .excluded_modules
                .iter()
                .map(|module| module.to_string())
                .collect(),
            cancelled: run.cancelled,
        }
    }
}

fn format_diagnostic(diagnostic: &ParseDiagnostic) -> String {
    format!(
        "{}:{}: {}",
        diagnostic.selection.start_line, diagnostic.selection.start_column, diagnostic.message
    )
}

// ============================================================================
// Rename
// ============================================================================

/// One computed edit, flattened for output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditInfo {
    pub module: String,
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
    pub new_text: String,
}

/// Full `rename` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameOutput {
    pub status: String,
    pub generated_at: String,
    pub target: String,
    pub new_name: String,
    pub edits: Vec<EditInfo>,
    pub modules_changed: usize,
    /// Whether edits were applied to the host (absent on dry runs).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied: Option<bool>,
}

impl RenameOutput {
    /// Assemble the rename response from a computed edit set.
    pub fn new(target: &str, new_name: &str, edits: &EditSet, applied: Option<bool>) -> Self {
        let mut infos: Vec<EditInfo> = edits
            .edits()
            .iter()
            .map(|edit| EditInfo {
                module: edit.module.to_string(),
                start_line: edit.selection.start_line,
                start_column: edit.selection.start_column,
                end_line: edit.selection.end_line,
                end_column: edit.selection.end_column,
                new_text: edit.new_text.clone(),
            })
            .collect();
        infos.sort_by(|a, b| {
            (&a.module, a.start_line, a.start_column).cmp(&(&b.module, b.start_line, b.start_column))
        });
        RenameOutput {
            status: "ok".to_string(),
            generated_at: timestamp(),
            target: target.to_string(),
            new_name: new_name.to_string(),
            edits: infos,
            modules_changed: edits.summary().modules_changed,
            applied,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// JSON error payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorOutput {
    pub status: String,
    pub code: u8,
    pub message: String,
}

impl ErrorOutput {
    /// Build the error payload from a unified error.
    pub fn new(error: &crate::error::VbatError) -> Self {
        ErrorOutput {
            status: "error".to_string(),
            code: error.error_code().code(),
            message: error.to_string(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::sync::CancellationToken;
    use vbatool_core::graph::ModuleKind;
    use vbatool_core::{QualifiedModuleName, Selection};

    use crate::vba::engine::{EngineConfig, ParserEngine};
    use crate::vba::inspections::InspectionRunner;

    fn analyzed() -> (ParserEngine, AnalyzeOutput) {
        let mut engine = ParserEngine::new(EngineConfig::default());
        engine.parse_module(
            QualifiedModuleName::new("TestProject", "Module1"),
            ModuleKind::Standard,
            "Public Sub Foo()\n    Const c As Integer = 1\nEnd Sub\n",
        );
        engine.resolve(&CancellationToken::new()).unwrap();
        let snapshot = engine.snapshot();
        let run = InspectionRunner::with_defaults().run(&snapshot, &CancellationToken::new());
        let output = AnalyzeOutput::new(engine.status(), &snapshot, &run);
        (engine, output)
    }

    #[test]
    fn analyze_output_serializes_results() {
        let (_engine, output) = analyzed();
        assert_eq!(output.status, "ok");
        assert_eq!(output.project_status, "ready");
        assert!(output
            .results
            .iter()
            .any(|result| result.inspection == "ConstantNotUsed"));
        let json = serde_json::to_string(&output).unwrap();
        assert!(json.contains("\"project_status\":\"ready\""));
    }

    #[test]
    fn analyze_output_round_trips_through_json() {
        let (_engine, output) = analyzed();
        let json = serde_json::to_string(&output).unwrap();
        let back: AnalyzeOutput = serde_json::from_str(&json).unwrap();
        assert_eq!(back.results.len(), output.results.len());
    }

    #[test]
    fn rename_output_orders_edits_by_position() {
        use vbatool_core::{Edit, Span};

        let qmn = QualifiedModuleName::new("TestProject", "Module1");
        let mut edits = EditSet::new();
        edits.push(Edit::new(
            qmn.clone(),
            Span::new(20, 23),
            Selection::new(3, 1, 3, 3),
            "bar",
        ));
        edits.push(Edit::new(
            qmn,
            Span::new(0, 3),
            Selection::new(1, 1, 1, 3),
            "bar",
        ));
        let output = RenameOutput::new("foo", "bar", &edits, None);
        assert_eq!(output.edits[0].start_line, 1);
        assert_eq!(output.edits[1].start_line, 3);
        let json = serde_json::to_string(&output).unwrap();
        assert!(!json.contains("applied"));
    }
}
