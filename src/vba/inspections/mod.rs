//! Inspection framework: rule registry, execution, and suppression.
//!
//! Each inspection is an independent, side-effect-free rule consuming one
//! immutable [`GraphSnapshot`] and the [`TypeResolver`]. The runner applies
//! the suppression filter uniformly, excludes non-`Ready` modules with an
//! explicit indication, honors cooperative cancellation, and sorts results
//! into a stable order.

pub mod duplicate;
pub mod object_type;
pub mod unused;

use rayon::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use vbatool_core::graph::{DeclarationId, ReferenceId};
use vbatool_core::{QualifiedModuleName, Selection};

use crate::vba::engine::GraphSnapshot;
use crate::vba::resolver::TypeResolver;

pub use duplicate::DuplicateDeclaration;
pub use object_type::ArgumentWithIncompatibleObjectType;
pub use unused::{ConstantNotUsed, ParameterNotUsed, ProcedureNotUsed, VariableNotUsed};

// ============================================================================
// Results
// ============================================================================

/// Severity of an inspection result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Hint,
    Suggestion,
    Warning,
    Error,
}

impl Severity {
    /// Stable string form used in output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Hint => "hint",
            Severity::Suggestion => "suggestion",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

/// What a result points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultTarget {
    Declaration(DeclarationId),
    Reference(ReferenceId),
}

/// One finding. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectionResult {
    /// Rule name, e.g. `ConstantNotUsed`.
    pub inspection: &'static str,
    pub severity: Severity,
    pub description: String,
    pub module: QualifiedModuleName,
    pub selection: Selection,
    pub target: ResultTarget,
}

/// Outcome of one runner invocation.
#[derive(Debug, Clone, Default)]
pub struct InspectionRun {
    /// Surviving results, ordered by (module, selection, discovery order).
    pub results: Vec<InspectionResult>,
    /// Modules whose data was unavailable: results are incomplete, not
    /// silently empty.
    pub excluded_modules: Vec<QualifiedModuleName>,
    /// Whether cancellation cut the run short.
    pub cancelled: bool,
}

// ============================================================================
// Inspection trait and runner
// ============================================================================

/// An independent static-analysis rule.
///
/// `run` must never mutate the graph, must check `cancel` between
/// per-module or per-declaration units of work, and on cancellation returns
/// only fully-evaluated results.
pub trait Inspection: Send + Sync {
    /// Rule name used for registration and suppression matching.
    fn name(&self) -> &'static str;

    /// Default severity for this rule's results.
    fn severity(&self) -> Severity;

    /// Evaluate the rule against one snapshot.
    fn run(
        &self,
        snapshot: &GraphSnapshot,
        resolver: &TypeResolver<'_>,
        cancel: &CancellationToken,
    ) -> Vec<InspectionResult>;
}

/// Registry of inspections, executed against one snapshot per run.
#[derive(Default)]
pub struct InspectionRunner {
    inspections: Vec<Box<dyn Inspection>>,
}

impl InspectionRunner {
    /// An empty registry.
    pub fn new() -> Self {
        InspectionRunner::default()
    }

    /// The full default rule catalog.
    pub fn with_defaults() -> Self {
        let mut runner = InspectionRunner::new();
        runner.register(Box::new(ConstantNotUsed));
        runner.register(Box::new(VariableNotUsed));
        runner.register(Box::new(ProcedureNotUsed));
        runner.register(Box::new(ParameterNotUsed));
        runner.register(Box::new(DuplicateDeclaration));
        runner.register(Box::new(ArgumentWithIncompatibleObjectType));
        runner
    }

    /// Register a rule.
    pub fn register(&mut self, inspection: Box<dyn Inspection>) {
        self.inspections.push(inspection);
    }

    /// Registered rule names, in registration order.
    pub fn names(&self) -> Vec<&'static str> {
        self.inspections.iter().map(|i| i.name()).collect()
    }

    /// Run every registered inspection against the snapshot.
    ///
    /// Inspections execute concurrently against the one shared, read-only
    /// snapshot; they share no mutable state with one another.
    pub fn run(&self, snapshot: &GraphSnapshot, cancel: &CancellationToken) -> InspectionRun {
        let excluded_modules = snapshot.excluded_modules();

        let found: Vec<Vec<InspectionResult>> = self
            .inspections
            .par_iter()
            .map(|inspection| {
                if cancel.is_cancelled() {
                    return Vec::new();
                }
                let resolver = TypeResolver::new(snapshot);
                inspection.run(snapshot, &resolver, cancel)
            })
            .collect();

        let mut results = Vec::new();
        for (inspection, candidates) in self.inspections.iter().zip(found) {
            debug!(
                inspection = inspection.name(),
                candidates = candidates.len(),
                "inspection ran"
            );
            results.extend(candidates.into_iter().filter(|result| {
                snapshot.is_ready(&result.module) && !is_suppressed(snapshot, result)
            }));
        }

        // Stable sort: discovery order breaks ties within one selection.
        results.sort_by(|a, b| {
            (&a.module, &a.selection).cmp(&(&b.module, &b.selection))
        });

        InspectionRun {
            results,
            excluded_modules,
            cancelled: cancel.is_cancelled(),
        }
    }
}

fn is_suppressed(snapshot: &GraphSnapshot, result: &InspectionResult) -> bool {
    snapshot
        .store
        .suppressions(&result.module)
        .is_some_and(|suppressions| {
            suppressions.is_suppressed(result.inspection, result.selection.start_line)
        })
}

// ============================================================================
// Tests
// ============================================================================
