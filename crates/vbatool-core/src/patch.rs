//! Patch IR: spans, content hashes, and computed edit sets.
//!
//! A refactoring computes an [`EditSet`] — a collection of text-span
//! replacements — without applying it. Application is a separate step with
//! atomic semantics: the whole set validates (in-bounds, non-overlapping per
//! module) before any text changes, and edits within one module are applied
//! right-to-left by byte position so earlier edits never invalidate later
//! offsets.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::PatchError;
use crate::types::{QualifiedModuleName, Selection};

// ============================================================================
// Content Hash
// ============================================================================

/// Hash of a module's source text (SHA-256, hex-encoded).
///
/// Snapshot identity incorporates per-module content hashes so that staleness
/// is detectable without retaining full source copies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl ContentHash {
    /// Compute the SHA-256 hash of the given bytes.
    pub fn compute(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        ContentHash(hex::encode(hasher.finalize()))
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Span
// ============================================================================

/// Byte offsets into a module's source text.
///
/// Spans are half-open intervals: `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    /// Start byte offset (inclusive).
    pub start: u64,
    /// End byte offset (exclusive).
    pub end: u64,
}

impl Span {
    /// Create a new span.
    ///
    /// # Panics
    /// Panics if `start > end`.
    pub fn new(start: u64, end: u64) -> Self {
        assert!(start <= end, "Span start ({start}) must be <= end ({end})");
        Span { start, end }
    }

    /// Length of the span in bytes.
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    /// Whether the span is empty.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether this span overlaps `other` (shared bytes, not mere adjacency).
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

// ============================================================================
// Edit and EditSet
// ============================================================================

/// A single text-span replacement within one module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edit {
    /// Module the edit applies to.
    pub module: QualifiedModuleName,
    /// Byte span to replace.
    pub span: Span,
    /// Line/column selection of the replaced text, for reporting.
    pub selection: Selection,
    /// Replacement text.
    pub new_text: String,
}

impl Edit {
    /// Create a new edit.
    pub fn new(
        module: QualifiedModuleName,
        span: Span,
        selection: Selection,
        new_text: impl Into<String>,
    ) -> Self {
        Edit {
            module,
            span,
            selection,
            new_text: new_text.into(),
        }
    }
}

/// Summary statistics over an edit set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditSummary {
    /// Number of distinct modules touched.
    pub modules_changed: usize,
    /// Total number of edits.
    pub edit_count: usize,
}

/// The computed collection of text-span replacements produced by a
/// refactoring, not yet applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditSet {
    edits: Vec<Edit>,
}

impl EditSet {
    /// Create an empty edit set.
    pub fn new() -> Self {
        EditSet::default()
    }

    /// Add an edit. Duplicate (module, span) pairs are dropped.
    pub fn push(&mut self, edit: Edit) {
        let duplicate = self
            .edits
            .iter()
            .any(|e| e.module == edit.module && e.span == edit.span);
        if !duplicate {
            self.edits.push(edit);
        }
    }

    /// All edits, in insertion order.
    pub fn edits(&self) -> &[Edit] {
        &self.edits
    }

    /// Number of edits.
    pub fn len(&self) -> usize {
        self.edits.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Distinct modules touched by this set, in deterministic order.
    pub fn modules(&self) -> Vec<&QualifiedModuleName> {
        let mut modules: Vec<&QualifiedModuleName> =
            self.edits.iter().map(|e| &e.module).collect();
        modules.sort();
        modules.dedup();
        modules
    }

    /// Edits for one module, sorted right-to-left by byte position.
    pub fn edits_for(&self, module: &QualifiedModuleName) -> Vec<&Edit> {
        let mut edits: Vec<&Edit> = self.edits.iter().filter(|e| &e.module == module).collect();
        edits.sort_by(|a, b| b.span.start.cmp(&a.span.start));
        edits
    }

    /// Summary statistics.
    pub fn summary(&self) -> EditSummary {
        EditSummary {
            modules_changed: self.modules().len(),
            edit_count: self.edits.len(),
        }
    }

    /// Apply the edit set to the given module sources, producing new texts
    /// for the touched modules.
    ///
    /// Validates the whole set before changing anything: every edit's module
    /// must be present, every span in bounds, and no two edits in one module
    /// may overlap. Any violation aborts with no partial output.
    pub fn apply(
        &self,
        sources: &BTreeMap<QualifiedModuleName, String>,
    ) -> Result<BTreeMap<QualifiedModuleName, String>, PatchError> {
        // Validation pass first; apply is all-or-nothing.
        for edit in &self.edits {
            let source = sources
                .get(&edit.module)
                .ok_or_else(|| PatchError::UnknownModule {
                    module: edit.module.to_string(),
                })?;
            if edit.span.end as usize > source.len() {
                return Err(PatchError::SpanOutOfBounds {
                    module: edit.module.to_string(),
                    span: edit.span,
                });
            }
        }
        for module in self.modules() {
            let edits = self.edits_for(module);
            for pair in edits.windows(2) {
                if pair[0].span.overlaps(&pair[1].span) {
                    return Err(PatchError::OverlappingEdits {
                        module: module.to_string(),
                    });
                }
            }
        }

        let mut output = BTreeMap::new();
        for module in self.modules() {
            let mut text = sources[module].clone();
            for edit in self.edits_for(module) {
                let start = edit.span.start as usize;
                let end = edit.span.end as usize;
                text.replace_range(start..end, &edit.new_text);
            }
            output.insert(module.clone(), text);
        }
        Ok(output)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn qmn(module: &str) -> QualifiedModuleName {
        QualifiedModuleName::new("TestProject", module)
    }

    fn edit(module: &str, start: u64, end: u64, text: &str) -> Edit {
        Edit::new(qmn(module), Span::new(start, end), Selection::home(), text)
    }

    mod span_tests {
        use super::*;

        #[test]
        fn overlap_detection() {
            let a = Span::new(0, 5);
            let b = Span::new(3, 8);
            let c = Span::new(5, 10);
            assert!(a.overlaps(&b));
            assert!(b.overlaps(&a));
            assert!(!a.overlaps(&c), "adjacent spans do not overlap");
        }

        #[test]
        #[should_panic(expected = "must be <=")]
        fn inverted_span_panics() {
            let _ = Span::new(5, 3);
        }
    }

    mod edit_set_tests {
        use super::*;

        #[test]
        fn apply_right_to_left_keeps_offsets_valid() {
            // Renaming both uses of "foo" to "renamed" shifts later offsets;
            // right-to-left application must not care.
            let source = "foo = 1\nbar = foo\n".to_string();
            let mut sources = BTreeMap::new();
            sources.insert(qmn("Module1"), source);

            let mut set = EditSet::new();
            set.push(edit("Module1", 0, 3, "renamed"));
            set.push(edit("Module1", 14, 17, "renamed"));

            let output = set.apply(&sources).unwrap();
            assert_eq!(output[&qmn("Module1")], "renamed = 1\nbar = renamed\n");
        }

        #[test]
        fn apply_is_order_independent_across_modules() {
            let mut sources = BTreeMap::new();
            sources.insert(qmn("A"), "x".to_string());
            sources.insert(qmn("B"), "x".to_string());

            let mut set = EditSet::new();
            set.push(edit("B", 0, 1, "y"));
            set.push(edit("A", 0, 1, "z"));

            let output = set.apply(&sources).unwrap();
            assert_eq!(output[&qmn("A")], "z");
            assert_eq!(output[&qmn("B")], "y");
        }

        #[test]
        fn duplicate_spans_are_dropped() {
            let mut set = EditSet::new();
            set.push(edit("Module1", 0, 3, "x"));
            set.push(edit("Module1", 0, 3, "x"));
            assert_eq!(set.len(), 1);
        }

        #[test]
        fn overlapping_edits_rejected() {
            let mut sources = BTreeMap::new();
            sources.insert(qmn("Module1"), "abcdef".to_string());

            let mut set = EditSet::new();
            set.push(edit("Module1", 0, 4, "x"));
            set.push(edit("Module1", 2, 6, "y"));

            let err = set.apply(&sources).unwrap_err();
            assert!(matches!(err, PatchError::OverlappingEdits { .. }));
        }

        #[test]
        fn out_of_bounds_rejected() {
            let mut sources = BTreeMap::new();
            sources.insert(qmn("Module1"), "ab".to_string());

            let mut set = EditSet::new();
            set.push(edit("Module1", 0, 5, "x"));

            let err = set.apply(&sources).unwrap_err();
            assert!(matches!(err, PatchError::SpanOutOfBounds { .. }));
        }

        #[test]
        fn unknown_module_rejected() {
            let sources = BTreeMap::new();
            let mut set = EditSet::new();
            set.push(edit("Missing", 0, 1, "x"));
            let err = set.apply(&sources).unwrap_err();
            assert!(matches!(err, PatchError::UnknownModule { .. }));
        }

        #[test]
        fn summary_counts_modules_and_edits() {
            let mut set = EditSet::new();
            set.push(edit("A", 0, 1, "x"));
            set.push(edit("A", 2, 3, "x"));
            set.push(edit("B", 0, 1, "x"));
            let summary = set.summary();
            assert_eq!(summary.modules_changed, 2);
            assert_eq!(summary.edit_count, 3);
        }
    }

    mod content_hash_tests {
        use super::*;

        #[test]
        fn identical_content_identical_hash() {
            let a = ContentHash::compute(b"Public Sub Foo()\nEnd Sub\n");
            let b = ContentHash::compute(b"Public Sub Foo()\nEnd Sub\n");
            let c = ContentHash::compute(b"Public Sub Bar()\nEnd Sub\n");
            assert_eq!(a, b);
            assert_ne!(a, c);
        }
    }
}
