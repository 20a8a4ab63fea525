//! Qualified identity types shared across the engine.
//!
//! Everything in the declaration graph is keyed by these types:
//! - [`QualifiedModuleName`]: (project, module) — the partition key for all
//!   per-module state
//! - [`Selection`] / [`QualifiedSelection`]: 1-indexed line/column spans
//! - [`Scope`]: (module, optional member) — structured, never a joined string

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// QualifiedModuleName
// ============================================================================

/// Canonical identity of a module: project name plus module name.
///
/// Unique per loaded module within one engine instance. Ordered so that all
/// per-module iteration is deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QualifiedModuleName {
    /// Name of the owning project.
    pub project: String,
    /// Name of the module within the project.
    pub module: String,
}

impl QualifiedModuleName {
    /// Create a new qualified module name.
    pub fn new(project: impl Into<String>, module: impl Into<String>) -> Self {
        QualifiedModuleName {
            project: project.into(),
            module: module.into(),
        }
    }

    /// Case-folded key for identifier-style comparisons.
    pub fn case_key(&self) -> String {
        format!(
            "{}.{}",
            self.project.to_ascii_lowercase(),
            self.module.to_ascii_lowercase()
        )
    }
}

impl fmt::Display for QualifiedModuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.project, self.module)
    }
}

// ============================================================================
// Selection
// ============================================================================

/// A 1-indexed line/column span in a module's source text.
///
/// The all-zero selection denotes "no selection" and is used for synthetic
/// declarations (projects, host-supplied built-ins).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Selection {
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

impl Selection {
    /// Create a new selection. End must not be strictly before start.
    pub fn new(start_line: u32, start_column: u32, end_line: u32, end_column: u32) -> Self {
        debug_assert!(
            (end_line, end_column) >= (start_line, start_column),
            "selection end before start"
        );
        Selection {
            start_line,
            start_column,
            end_line,
            end_column,
        }
    }

    /// The "no selection" value used for synthetic nodes.
    pub const fn home() -> Self {
        Selection {
            start_line: 0,
            start_column: 0,
            end_line: 0,
            end_column: 0,
        }
    }

    /// Whether this is the synthetic "no selection" value.
    pub fn is_home(&self) -> bool {
        *self == Selection::home()
    }

    /// Smallest selection covering both `self` and `other`.
    pub fn extended_to(&self, other: Selection) -> Selection {
        Selection {
            start_line: self.start_line.min(other.start_line),
            start_column: if self.start_line < other.start_line {
                self.start_column
            } else if other.start_line < self.start_line {
                other.start_column
            } else {
                self.start_column.min(other.start_column)
            },
            end_line: self.end_line.max(other.end_line),
            end_column: if self.end_line > other.end_line {
                self.end_column
            } else if other.end_line > self.end_line {
                other.end_column
            } else {
                self.end_column.max(other.end_column)
            },
        }
    }

    /// Whether the given 1-indexed position falls within this selection.
    pub fn contains(&self, line: u32, column: u32) -> bool {
        if self.is_home() {
            return false;
        }
        let pos = (line, column);
        (self.start_line, self.start_column) <= pos && pos <= (self.end_line, self.end_column)
    }

    /// Whether `other` is entirely contained within this selection.
    pub fn contains_selection(&self, other: &Selection) -> bool {
        self.contains(other.start_line, other.start_column)
            && self.contains(other.end_line, other.end_column)
    }

    /// A rough ordering metric used to pick the smallest enclosing selection.
    pub fn extent_size(&self) -> (u32, u32) {
        let lines = self.end_line.saturating_sub(self.start_line);
        let cols = if lines == 0 {
            self.end_column.saturating_sub(self.start_column)
        } else {
            u32::MAX
        };
        (lines, cols)
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}-{}:{}",
            self.start_line, self.start_column, self.end_line, self.end_column
        )
    }
}

// ============================================================================
// QualifiedSelection
// ============================================================================

/// A concrete source span: a selection within a specific module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QualifiedSelection {
    pub module: QualifiedModuleName,
    pub selection: Selection,
}

impl QualifiedSelection {
    /// Create a new qualified selection.
    pub fn new(module: QualifiedModuleName, selection: Selection) -> Self {
        QualifiedSelection { module, selection }
    }
}

impl fmt::Display for QualifiedSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.module, self.selection)
    }
}

// ============================================================================
// Scope
// ============================================================================

/// Disambiguating path for name resolution: a module plus an optional
/// enclosing member (procedure) name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Scope {
    pub module: QualifiedModuleName,
    pub member: Option<String>,
}

impl Scope {
    /// Module-level scope of the given module.
    pub fn module_scope(module: QualifiedModuleName) -> Self {
        Scope {
            module,
            member: None,
        }
    }

    /// Scope of a member (procedure) within a module.
    pub fn member_scope(module: QualifiedModuleName, member: impl Into<String>) -> Self {
        Scope {
            module,
            member: Some(member.into()),
        }
    }

    /// Whether this is a module-level scope.
    pub fn is_module_scope(&self) -> bool {
        self.member.is_none()
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.member {
            Some(member) => write!(f, "{}.{}", self.module, member),
            None => write!(f, "{}", self.module),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    mod selection_tests {
        use super::*;

        #[test]
        fn home_selection_contains_nothing() {
            let home = Selection::home();
            assert!(home.is_home());
            assert!(!home.contains(0, 0));
            assert!(!home.contains(1, 1));
        }

        #[test]
        fn contains_single_line() {
            let sel = Selection::new(3, 5, 3, 10);
            assert!(sel.contains(3, 5));
            assert!(sel.contains(3, 10));
            assert!(!sel.contains(3, 4));
            assert!(!sel.contains(3, 11));
            assert!(!sel.contains(2, 7));
        }

        #[test]
        fn contains_multi_line() {
            let sel = Selection::new(2, 10, 5, 3);
            assert!(sel.contains(2, 10));
            assert!(sel.contains(3, 1));
            assert!(sel.contains(5, 3));
            assert!(!sel.contains(2, 9));
            assert!(!sel.contains(5, 4));
        }

        #[test]
        fn contains_selection_nested() {
            let outer = Selection::new(1, 1, 10, 1);
            let inner = Selection::new(3, 5, 3, 10);
            assert!(outer.contains_selection(&inner));
            assert!(!inner.contains_selection(&outer));
        }

        #[test]
        fn extended_to_spans_both() {
            let a = Selection::new(2, 5, 2, 10);
            let b = Selection::new(4, 1, 4, 8);
            let joined = a.extended_to(b);
            assert_eq!(joined, Selection::new(2, 5, 4, 8));
        }

        #[test]
        fn ordering_is_positional() {
            let earlier = Selection::new(2, 1, 2, 5);
            let later = Selection::new(3, 1, 3, 5);
            assert!(earlier < later);

            let same_line_earlier = Selection::new(2, 1, 2, 5);
            let same_line_later = Selection::new(2, 8, 2, 12);
            assert!(same_line_earlier < same_line_later);
        }
    }

    mod scope_tests {
        use super::*;

        #[test]
        fn display_includes_member() {
            let qmn = QualifiedModuleName::new("TestProject", "Module1");
            let module_scope = Scope::module_scope(qmn.clone());
            assert_eq!(module_scope.to_string(), "TestProject.Module1");

            let member_scope = Scope::member_scope(qmn, "Foo");
            assert_eq!(member_scope.to_string(), "TestProject.Module1.Foo");
        }

        #[test]
        fn member_scopes_with_distinct_members_differ() {
            let qmn = QualifiedModuleName::new("TestProject", "Module1");
            let a = Scope::member_scope(qmn.clone(), "Foo");
            let b = Scope::member_scope(qmn.clone(), "Bar");
            let c = Scope::module_scope(qmn);
            assert_ne!(a, b);
            assert_ne!(a, c);
        }
    }

    mod qualified_module_name_tests {
        use super::*;

        #[test]
        fn ordering_is_deterministic() {
            let a = QualifiedModuleName::new("A", "M2");
            let b = QualifiedModuleName::new("A", "M1");
            let c = QualifiedModuleName::new("B", "M0");
            let mut names = vec![c.clone(), a.clone(), b.clone()];
            names.sort();
            assert_eq!(names, vec![b, a, c]);
        }

        #[test]
        fn case_key_folds_case() {
            let a = QualifiedModuleName::new("TestProject", "Module1");
            let b = QualifiedModuleName::new("TESTPROJECT", "module1");
            assert_eq!(a.case_key(), b.case_key());
        }
    }
}
