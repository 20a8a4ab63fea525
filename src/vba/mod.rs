//! The VBA-style analysis engine: orchestrator, binder, resolver,
//! inspections, and refactoring operations.

pub mod binder;
pub mod engine;
pub mod inspections;
pub mod ops;
pub mod resolver;
pub mod source;
pub mod validation;

pub use binder::{ArgumentSite, BoundGraph, CallSite, ParsedModule};
pub use engine::{
    EngineConfig, EngineError, GraphSnapshot, HostDeclaration, ModuleState, ParseDiagnostic,
    ParserEngine, ProjectStatus,
};
pub use inspections::{
    Inspection, InspectionResult, InspectionRun, InspectionRunner, ResultTarget, Severity,
};
pub use ops::{RefactoringError, RenameRefactoring};
pub use resolver::{
    IntrinsicType, QualifiedTypeName, ResolvedType, SetTypeResolution, TypeResolver,
};
pub use source::{
    ApplyError, EditApplier, FileEditApplier, FileSourceProvider, MemorySourceProvider,
    ModuleSource, SourceError, SourceProvider,
};
pub use validation::{validate_identifier, ValidationError};
