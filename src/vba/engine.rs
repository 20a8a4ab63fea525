//! Parser-state orchestrator.
//!
//! [`ParserEngine`] owns the per-module lifecycle (`Unparsed → Parsing →
//! Parsed → Resolving → Ready`, with `Error` reachable from parsing and
//! resolving), coordinates re-parses, and publishes immutable, versioned
//! [`GraphSnapshot`]s. A snapshot handed out is never mutated; resolution
//! builds a fresh graph and swaps it in, so in-flight consumers keep a
//! consistent view to completion.

use std::collections::BTreeMap;
use std::sync::Arc;

use rayon::prelude::*;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use vbatool_core::graph::{Declaration, DeclarationKind, DeclarationStore, ModuleKind};
use vbatool_core::text::LineIndex;
use vbatool_core::{ContentHash, QualifiedModuleName, QualifiedSelection, Selection};
use vbatool_cst::{parse_module, ModuleTree, ParseError};

use crate::vba::binder::{bind, CallSite, ParsedModule};
use crate::vba::source::{SourceError, SourceProvider};

// ============================================================================
// Configuration
// ============================================================================

/// A declaration supplied by the host environment rather than user source.
#[derive(Debug, Clone)]
pub struct HostDeclaration {
    pub module: String,
    pub name: String,
    pub kind: DeclarationKind,
    pub type_name: Option<String>,
}

impl HostDeclaration {
    /// A host-supplied sub.
    pub fn sub(module: impl Into<String>, name: impl Into<String>) -> Self {
        HostDeclaration {
            module: module.into(),
            name: name.into(),
            kind: DeclarationKind::Procedure(vbatool_core::graph::ProcedureKind::Sub),
            type_name: None,
        }
    }

    /// A host-supplied function with a return type.
    pub fn function(
        module: impl Into<String>,
        name: impl Into<String>,
        returns: impl Into<String>,
    ) -> Self {
        HostDeclaration {
            module: module.into(),
            name: name.into(),
            kind: DeclarationKind::Procedure(vbatool_core::graph::ProcedureKind::Function),
            type_name: Some(returns.into()),
        }
    }
}

/// Engine configuration, threaded through construction instead of ambient
/// global state.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Project name owning host-supplied declarations.
    pub host_project: String,
    /// Host-supplied declarations, flagged built-in in the graph.
    pub host_declarations: Vec<HostDeclaration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            host_project: "VBA".to_string(),
            host_declarations: Vec::new(),
        }
    }
}

// ============================================================================
// States and errors
// ============================================================================

/// Per-module lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    Unparsed,
    Parsing,
    Parsed,
    Resolving,
    Ready,
    Error,
}

impl ModuleState {
    /// Stable string form used in output.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleState::Unparsed => "unparsed",
            ModuleState::Parsing => "parsing",
            ModuleState::Parsed => "parsed",
            ModuleState::Resolving => "resolving",
            ModuleState::Ready => "ready",
            ModuleState::Error => "error",
        }
    }
}

/// Aggregate project-wide status: worst case of all module states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectStatus {
    Pending,
    Parsing,
    Resolving,
    Ready,
    Error,
}

impl ProjectStatus {
    /// Stable string form used in output.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Pending => "pending",
            ProjectStatus::Parsing => "parsing",
            ProjectStatus::Resolving => "resolving",
            ProjectStatus::Ready => "ready",
            ProjectStatus::Error => "error",
        }
    }
}

/// A per-module grammar failure, recorded instead of thrown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDiagnostic {
    pub module: QualifiedModuleName,
    pub message: String,
    pub selection: Selection,
}

/// Engine-level failures.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Cooperative cancellation observed; not a failure.
    #[error("operation cancelled")]
    Cancelled,
}

// ============================================================================
// GraphSnapshot
// ============================================================================

/// An immutable, versioned snapshot of the full declaration graph.
#[derive(Debug, Default)]
pub struct GraphSnapshot {
    /// Monotonically increasing; advances on every publish.
    pub version: u64,
    pub store: DeclarationStore,
    pub call_sites: Vec<CallSite>,
    pub module_states: BTreeMap<QualifiedModuleName, ModuleState>,
    pub diagnostics: BTreeMap<QualifiedModuleName, ParseDiagnostic>,
    pub content_hashes: BTreeMap<QualifiedModuleName, ContentHash>,
}

impl GraphSnapshot {
    /// Whether a module's data is usable in this snapshot.
    pub fn is_ready(&self, module: &QualifiedModuleName) -> bool {
        self.module_states.get(module) == Some(&ModuleState::Ready)
    }

    /// Modules excluded from analysis (not `Ready`), for the explicit
    /// incomplete-results indication.
    pub fn excluded_modules(&self) -> Vec<QualifiedModuleName> {
        self.module_states
            .iter()
            .filter(|(_, state)| **state != ModuleState::Ready)
            .map(|(module, _)| module.clone())
            .collect()
    }

    /// Smallest declaration enclosing the given position.
    pub fn find_declaration(&self, at: &QualifiedSelection) -> Option<&Declaration> {
        if !self.is_ready(&at.module) {
            return None;
        }
        self.store.find_declaration_at(at)
    }
}

// ============================================================================
// ParserEngine
// ============================================================================

struct ModuleEntry {
    kind: ModuleKind,
    source: String,
    hash: ContentHash,
    state: ModuleState,
    tree: Option<Arc<ModuleTree>>,
    line_count: u32,
    diagnostic: Option<ParseDiagnostic>,
}

/// The orchestrator: the only component external consumers talk to.
pub struct ParserEngine {
    config: EngineConfig,
    modules: BTreeMap<QualifiedModuleName, ModuleEntry>,
    snapshot: Arc<GraphSnapshot>,
    version: u64,
}

impl ParserEngine {
    /// Create an engine with the given configuration.
    pub fn new(config: EngineConfig) -> Self {
        ParserEngine {
            config,
            modules: BTreeMap::new(),
            snapshot: Arc::new(GraphSnapshot::default()),
            version: 0,
        }
    }

    /// Parse (or re-parse) one module from source text.
    ///
    /// A grammar failure transitions the module to `Error` and records a
    /// diagnostic; it never propagates to other modules.
    pub fn parse_module(&mut self, name: QualifiedModuleName, kind: ModuleKind, source: &str) {
        let entry = self.parse_entry(&name, kind, source.to_string());
        self.modules.insert(name, entry);
    }

    /// Enumerate and parse every module of a project. Independent modules
    /// parse in parallel; cancellation is checked per module.
    pub fn load_project(
        &mut self,
        provider: &dyn SourceProvider,
        project: &str,
        cancel: &CancellationToken,
    ) -> Result<(), EngineError> {
        let handles = provider.list_modules(project)?;
        let mut inputs = Vec::with_capacity(handles.len());
        for handle in handles {
            let source = provider.module_text(&handle.name)?;
            inputs.push((handle.name, handle.kind, source));
        }
        info!(project, modules = inputs.len(), "parsing project");

        let parsed: Vec<(QualifiedModuleName, Option<ModuleEntry>)> = inputs
            .into_par_iter()
            .map(|(name, kind, source)| {
                if cancel.is_cancelled() {
                    return (name, None);
                }
                let entry = Self::build_entry(&name, kind, source);
                (name, Some(entry))
            })
            .collect();

        for (name, entry) in parsed {
            match entry {
                Some(entry) => {
                    self.modules.insert(name, entry);
                }
                None => {
                    // Cancelled before this module parsed; leave it unparsed.
                    self.modules.entry(name.clone()).or_insert(ModuleEntry {
                        kind: ModuleKind::Standard,
                        source: String::new(),
                        hash: ContentHash::compute(b""),
                        state: ModuleState::Unparsed,
                        tree: None,
                        line_count: 0,
                        diagnostic: None,
                    });
                }
            }
        }

        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        Ok(())
    }

    fn parse_entry(
        &mut self,
        name: &QualifiedModuleName,
        kind: ModuleKind,
        source: String,
    ) -> ModuleEntry {
        // Transition through Parsing so status queries mid-parse are honest.
        if let Some(existing) = self.modules.get_mut(name) {
            existing.state = ModuleState::Parsing;
        }
        Self::build_entry(name, kind, source)
    }

    fn build_entry(name: &QualifiedModuleName, kind: ModuleKind, source: String) -> ModuleEntry {
        let hash = ContentHash::compute(source.as_bytes());
        let line_count = source.lines().count() as u32;
        match parse_module(&source) {
            Ok(tree) => ModuleEntry {
                kind,
                source,
                hash,
                state: ModuleState::Parsed,
                tree: Some(Arc::new(tree)),
                line_count,
                diagnostic: None,
            },
            Err(ParseError { message, selection }) => {
                warn!(module = %name, %message, "parse error");
                ModuleEntry {
                    kind,
                    source,
                    hash,
                    state: ModuleState::Error,
                    tree: None,
                    line_count,
                    diagnostic: Some(ParseDiagnostic {
                        module: name.clone(),
                        message,
                        selection,
                    }),
                }
            }
        }
    }

    /// Rebuild the full declaration graph across all parsed modules and
    /// publish a new snapshot.
    ///
    /// This is a barrier: cross-module binding requires every module's
    /// declarations to exist first. Modules in `Error` stay excluded; their
    /// failure does not abort resolution of the rest.
    pub fn resolve(&mut self, cancel: &CancellationToken) -> Result<(), EngineError> {
        let mut inputs = Vec::new();
        for (name, entry) in &mut self.modules {
            if let Some(tree) = &entry.tree {
                entry.state = ModuleState::Resolving;
                inputs.push(ParsedModule {
                    name: name.clone(),
                    kind: entry.kind,
                    tree: Arc::clone(tree),
                    index: LineIndex::new(&entry.source),
                    line_count: entry.line_count,
                });
            }
        }

        if cancel.is_cancelled() {
            self.revert_resolving();
            return Err(EngineError::Cancelled);
        }

        let bound = bind(
            &inputs,
            &self.config.host_declarations,
            &self.config.host_project,
        );

        if cancel.is_cancelled() {
            self.revert_resolving();
            return Err(EngineError::Cancelled);
        }

        let mut module_states = BTreeMap::new();
        let mut diagnostics = BTreeMap::new();
        let mut content_hashes = BTreeMap::new();
        for (name, entry) in &mut self.modules {
            if entry.state == ModuleState::Resolving {
                entry.state = ModuleState::Ready;
            }
            module_states.insert(name.clone(), entry.state);
            content_hashes.insert(name.clone(), entry.hash.clone());
            if let Some(diagnostic) = &entry.diagnostic {
                diagnostics.insert(name.clone(), diagnostic.clone());
            }
        }

        self.version += 1;
        let snapshot = GraphSnapshot {
            version: self.version,
            store: bound.store,
            call_sites: bound.call_sites,
            module_states,
            diagnostics,
            content_hashes,
        };
        debug!(
            version = snapshot.version,
            declarations = snapshot.store.declaration_count(),
            "published snapshot"
        );
        self.snapshot = Arc::new(snapshot);
        Ok(())
    }

    fn revert_resolving(&mut self) {
        for entry in self.modules.values_mut() {
            if entry.state == ModuleState::Resolving {
                entry.state = ModuleState::Parsed;
            }
        }
    }

    /// The current published snapshot. Cheap to clone and safe to hold
    /// across re-parses.
    pub fn snapshot(&self) -> Arc<GraphSnapshot> {
        Arc::clone(&self.snapshot)
    }

    /// Version of the current published snapshot.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Per-module state.
    pub fn module_state(&self, module: &QualifiedModuleName) -> Option<ModuleState> {
        self.modules.get(module).map(|entry| entry.state)
    }

    /// Aggregate status: the worst case of all module states.
    pub fn status(&self) -> ProjectStatus {
        if self.modules.is_empty() {
            return ProjectStatus::Pending;
        }
        let states: Vec<ModuleState> = self.modules.values().map(|entry| entry.state).collect();
        if states.contains(&ModuleState::Error) {
            ProjectStatus::Error
        } else if states.contains(&ModuleState::Parsing) {
            ProjectStatus::Parsing
        } else if states.contains(&ModuleState::Unparsed) {
            ProjectStatus::Pending
        } else if states.contains(&ModuleState::Parsed) || states.contains(&ModuleState::Resolving)
        {
            ProjectStatus::Resolving
        } else {
            ProjectStatus::Ready
        }
    }

    /// Smallest declaration enclosing a source position, from the current
    /// snapshot.
    pub fn find_declaration(&self, at: &QualifiedSelection) -> Option<&Declaration> {
        self.snapshot.find_declaration(at)
    }

    /// Current module sources, for edit application and round-trip tests.
    pub fn sources(&self) -> BTreeMap<QualifiedModuleName, String> {
        self.modules
            .iter()
            .map(|(name, entry)| (name.clone(), entry.source.clone()))
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vba::source::MemorySourceProvider;

    fn qmn(module: &str) -> QualifiedModuleName {
        QualifiedModuleName::new("TestProject", module)
    }

    fn engine_with(modules: &[(&str, &str)]) -> ParserEngine {
        let mut engine = ParserEngine::new(EngineConfig::default());
        for &(name, source) in modules {
            engine.parse_module(qmn(name), ModuleKind::Standard, source);
        }
        engine
            .resolve(&CancellationToken::new())
            .expect("resolve should succeed");
        engine
    }

    mod state_machine {
        use super::*;

        #[test]
        fn parse_error_is_isolated_per_module() {
            let mut engine = ParserEngine::new(EngineConfig::default());
            engine.parse_module(qmn("Good"), ModuleKind::Standard, "Public Sub Foo()\nEnd Sub\n");
            engine.parse_module(qmn("Bad"), ModuleKind::Standard, "Public Sub (\n");
            engine.resolve(&CancellationToken::new()).unwrap();

            assert_eq!(engine.module_state(&qmn("Good")), Some(ModuleState::Ready));
            assert_eq!(engine.module_state(&qmn("Bad")), Some(ModuleState::Error));
            assert_eq!(engine.status(), ProjectStatus::Error);

            let snapshot = engine.snapshot();
            assert!(snapshot.is_ready(&qmn("Good")));
            assert!(!snapshot.is_ready(&qmn("Bad")));
            assert_eq!(snapshot.excluded_modules(), vec![qmn("Bad")]);
            assert!(snapshot.diagnostics.contains_key(&qmn("Bad")));

            // The good module's declarations made it into the graph.
            assert!(snapshot
                .store
                .declarations_named("Foo")
                .next()
                .is_some());
        }

        #[test]
        fn all_modules_ready_means_project_ready() {
            let engine = engine_with(&[
                ("Module1", "Public Sub Foo()\nEnd Sub\n"),
                ("Module2", "Public Sub Bar()\nEnd Sub\n"),
            ]);
            assert_eq!(engine.status(), ProjectStatus::Ready);
        }

        #[test]
        fn empty_engine_is_pending() {
            let engine = ParserEngine::new(EngineConfig::default());
            assert_eq!(engine.status(), ProjectStatus::Pending);
        }

        #[test]
        fn reparse_after_edit_republishes() {
            let mut engine = ParserEngine::new(EngineConfig::default());
            engine.parse_module(qmn("M"), ModuleKind::Standard, "Public Sub Foo()\nEnd Sub\n");
            engine.resolve(&CancellationToken::new()).unwrap();
            let first = engine.snapshot();

            engine.parse_module(qmn("M"), ModuleKind::Standard, "Public Sub Bar()\nEnd Sub\n");
            assert_eq!(engine.module_state(&qmn("M")), Some(ModuleState::Parsed));
            engine.resolve(&CancellationToken::new()).unwrap();
            let second = engine.snapshot();

            assert!(second.version > first.version);
            // The old snapshot is unchanged: swap-on-publish, not mutation.
            assert!(first.store.declarations_named("Foo").next().is_some());
            assert!(first.store.declarations_named("Bar").next().is_none());
            assert!(second.store.declarations_named("Bar").next().is_some());
        }
    }

    mod snapshots {
        use super::*;

        #[test]
        fn snapshot_survives_engine_reparse() {
            let mut engine = ParserEngine::new(EngineConfig::default());
            engine.parse_module(
                qmn("M"),
                ModuleKind::Standard,
                "Public Sub Foo()\n    Const c = 1\nEnd Sub\n",
            );
            engine.resolve(&CancellationToken::new()).unwrap();

            let held = engine.snapshot();
            let count_before = held.store.declaration_count();

            engine.parse_module(qmn("M"), ModuleKind::Standard, "Public Sub Other()\nEnd Sub\n");
            engine.resolve(&CancellationToken::new()).unwrap();

            assert_eq!(held.store.declaration_count(), count_before);
        }

        #[test]
        fn content_hashes_change_with_source() {
            let mut engine = ParserEngine::new(EngineConfig::default());
            engine.parse_module(qmn("M"), ModuleKind::Standard, "Public Sub A()\nEnd Sub\n");
            engine.resolve(&CancellationToken::new()).unwrap();
            let first = engine.snapshot().content_hashes[&qmn("M")].clone();

            engine.parse_module(qmn("M"), ModuleKind::Standard, "Public Sub B()\nEnd Sub\n");
            engine.resolve(&CancellationToken::new()).unwrap();
            let second = engine.snapshot().content_hashes[&qmn("M")].clone();

            assert_ne!(first, second);
        }
    }

    mod cancellation {
        use super::*;

        #[test]
        fn cancelled_resolve_keeps_previous_snapshot() {
            let mut engine = ParserEngine::new(EngineConfig::default());
            engine.parse_module(qmn("M"), ModuleKind::Standard, "Public Sub Foo()\nEnd Sub\n");
            engine.resolve(&CancellationToken::new()).unwrap();
            let version = engine.version();

            engine.parse_module(qmn("M"), ModuleKind::Standard, "Public Sub Bar()\nEnd Sub\n");
            let cancel = CancellationToken::new();
            cancel.cancel();
            let err = engine.resolve(&cancel).unwrap_err();
            assert!(matches!(err, EngineError::Cancelled));
            assert_eq!(engine.version(), version);
            assert_eq!(engine.module_state(&qmn("M")), Some(ModuleState::Parsed));
        }

        #[test]
        fn cancelled_load_reports_cancelled() {
            let provider = MemorySourceProvider::new().with_module(
                "TestProject",
                "M",
                ModuleKind::Standard,
                "Public Sub Foo()\nEnd Sub\n",
            );
            let mut engine = ParserEngine::new(EngineConfig::default());
            let cancel = CancellationToken::new();
            cancel.cancel();
            let err = engine.load_project(&provider, "TestProject", &cancel).unwrap_err();
            assert!(matches!(err, EngineError::Cancelled));
        }
    }

    mod projects {
        use super::*;

        #[test]
        fn load_project_parses_all_modules() {
            let provider = MemorySourceProvider::new()
                .with_module(
                    "TestProject",
                    "Module1",
                    ModuleKind::Standard,
                    "Public Sub Foo()\nEnd Sub\n",
                )
                .with_module("TestProject", "Class1", ModuleKind::Class, "");
            let mut engine = ParserEngine::new(EngineConfig::default());
            engine
                .load_project(&provider, "TestProject", &CancellationToken::new())
                .unwrap();
            engine.resolve(&CancellationToken::new()).unwrap();
            assert_eq!(engine.status(), ProjectStatus::Ready);

            let snapshot = engine.snapshot();
            let class = snapshot
                .store
                .module_declaration(&qmn("Class1"))
                .expect("class module declared");
            assert_eq!(class.kind, DeclarationKind::Module(ModuleKind::Class));
        }
    }

    mod find_declaration {
        use super::*;

        #[test]
        fn position_maps_to_smallest_enclosing_declaration() {
            let engine = engine_with(&[(
                "Module1",
                "Public Sub Foo()\n    Const c = 1\nEnd Sub\n\nPublic Sub Bar()\nEnd Sub\n",
            )]);
            let snapshot = engine.snapshot();

            // Inside Foo's body but not on an identifier: the procedure.
            let inside_foo = QualifiedSelection::new(qmn("Module1"), Selection::new(2, 2, 2, 2));
            let found = snapshot.find_declaration(&inside_foo).unwrap();
            assert_eq!(found.name, "Foo");

            // On the constant's identifier: the constant itself.
            let on_const = QualifiedSelection::new(qmn("Module1"), Selection::new(2, 11, 2, 11));
            let found = snapshot.find_declaration(&on_const).unwrap();
            assert_eq!(found.name, "c");

            let on_bar_line = QualifiedSelection::new(qmn("Module1"), Selection::new(5, 2, 5, 2));
            let found = snapshot.find_declaration(&on_bar_line).unwrap();
            assert_eq!(found.name, "Bar");
        }
    }
}
