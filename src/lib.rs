//! vbatool: static analysis and rename refactoring for VBA-style modules.
//!
//! Parses each module into a syntax tree, builds a cross-module declaration
//! graph, resolves expression types where the host language's loose typing
//! allows it, evaluates a catalog of inspections, and computes safe,
//! graph-consistent rename edit sets.

// Core infrastructure - re-exported from vbatool-core
pub use vbatool_core::graph;
pub use vbatool_core::patch;
pub use vbatool_core::text;
pub use vbatool_core::types;

// Syntax tree and parser - re-exported from vbatool-cst
pub use vbatool_cst as cst;

// Unified error and JSON output for the CLI boundary
pub mod error;
pub mod output;

// The analysis engine
pub mod vba;
