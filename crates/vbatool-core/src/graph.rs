//! Declaration graph: normalized declaration and reference tables.
//!
//! The [`DeclarationStore`] is the single authoritative owner of all
//! [`Declaration`]s and [`Reference`]s for one resolved snapshot:
//! - BTreeMap primary storage for deterministic iteration
//! - Postings lists for efficient queries (declaration → refs, module → decls)
//! - Case-folded name index (host-language identifiers are case-insensitive)
//!
//! Parent and scope links are id lookups into the store's maps, never
//! back-pointers, so the graph is acyclic by construction. A store is built
//! in one resolution pass and replaced wholesale on re-parse.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::patch::Span;
use crate::types::{QualifiedModuleName, QualifiedSelection, Scope, Selection};

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier for a declaration within one snapshot.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct DeclarationId(pub u32);

impl fmt::Display for DeclarationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "decl_{}", self.0)
    }
}

/// Unique identifier for a reference within one snapshot.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ReferenceId(pub u32);

impl fmt::Display for ReferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ref_{}", self.0)
    }
}

// ============================================================================
// Enums
// ============================================================================

/// Kind of module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleKind {
    /// Standard (procedural) module.
    Standard,
    /// Class module.
    Class,
    /// Class module that is the target of at least one `Implements`.
    Interface,
}

/// Kind of procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcedureKind {
    Sub,
    Function,
    PropertyGet,
    PropertyLet,
    PropertySet,
}

impl ProcedureKind {
    /// Whether calls to this procedure produce a value.
    pub fn returns_value(&self) -> bool {
        matches!(self, ProcedureKind::Function | ProcedureKind::PropertyGet)
    }
}

/// Kind of declaration. Closed tagged variant; consumers match exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclarationKind {
    Project,
    Module(ModuleKind),
    Procedure(ProcedureKind),
    Variable,
    Constant,
    Parameter,
    UserDefinedType,
    UserDefinedTypeMember,
    Enumeration,
    EnumerationMember,
}

impl DeclarationKind {
    /// Human-readable noun for descriptions.
    pub fn describe(&self) -> &'static str {
        match self {
            DeclarationKind::Project => "project",
            DeclarationKind::Module(ModuleKind::Standard) => "module",
            DeclarationKind::Module(ModuleKind::Class) => "class module",
            DeclarationKind::Module(ModuleKind::Interface) => "interface module",
            DeclarationKind::Procedure(ProcedureKind::Sub) => "procedure",
            DeclarationKind::Procedure(ProcedureKind::Function) => "function",
            DeclarationKind::Procedure(ProcedureKind::PropertyGet) => "property getter",
            DeclarationKind::Procedure(ProcedureKind::PropertyLet) => "property setter",
            DeclarationKind::Procedure(ProcedureKind::PropertySet) => "property setter",
            DeclarationKind::Variable => "variable",
            DeclarationKind::Constant => "constant",
            DeclarationKind::Parameter => "parameter",
            DeclarationKind::UserDefinedType => "user-defined type",
            DeclarationKind::UserDefinedTypeMember => "user-defined type member",
            DeclarationKind::Enumeration => "enumeration",
            DeclarationKind::EnumerationMember => "enumeration member",
        }
    }

    /// Whether this declaration can appear in a type position (`As T`).
    pub fn is_type(&self) -> bool {
        matches!(
            self,
            DeclarationKind::Module(ModuleKind::Class)
                | DeclarationKind::Module(ModuleKind::Interface)
                | DeclarationKind::UserDefinedType
                | DeclarationKind::Enumeration
        )
    }

    /// Whether this declaration can be the target of a call.
    pub fn is_procedural(&self) -> bool {
        matches!(self, DeclarationKind::Procedure(_))
    }

    /// Whether this declaration holds a value (variable-like).
    pub fn is_value(&self) -> bool {
        matches!(
            self,
            DeclarationKind::Variable
                | DeclarationKind::Constant
                | DeclarationKind::Parameter
                | DeclarationKind::EnumerationMember
        )
    }
}

/// Access control level of a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Accessibility {
    Private,
    Public,
    Friend,
    /// No explicit access keyword in source.
    Implicit,
}

impl Accessibility {
    /// Whether the declaration is visible outside its module.
    ///
    /// Module-level declarations without an access keyword are publicly
    /// visible for procedures and module-visible for variables; the binder
    /// decides which rule applies per kind.
    pub fn is_public(&self) -> bool {
        matches!(self, Accessibility::Public | Accessibility::Friend)
    }
}

/// Kind of reference to a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    /// A value read, a call, or a type-position use.
    Read,
    /// An assignment target.
    Write,
    /// The left side of an object assignment (`Set x = ...`).
    SetTarget,
}

// ============================================================================
// Declaration and Reference
// ============================================================================

/// A named entity introduced by source code (or supplied by the host).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    /// Unique identifier for this declaration.
    pub id: DeclarationId,
    /// Identifier name as declared (original casing preserved).
    pub name: String,
    /// Kind of declaration.
    pub kind: DeclarationKind,
    /// Access control level.
    pub accessibility: Accessibility,
    /// Declared type name (`As T`), if any. `None` means untyped.
    pub type_name: Option<String>,
    /// Module that owns this declaration.
    pub module: QualifiedModuleName,
    /// Selection of the declared identifier. All-zero for synthetic nodes.
    pub selection: Selection,
    /// Byte span of the declared identifier.
    pub span: Span,
    /// Selection of the whole construct (procedure body, enum block).
    /// Equals `selection` for single-token declarations.
    pub extent: Selection,
    /// Enclosing declaration: enum member → enum, parameter → procedure,
    /// module-level entity → module, module → project.
    pub parent: Option<DeclarationId>,
    /// Supplied by the host environment rather than user source.
    pub is_built_in: bool,
}

impl Declaration {
    /// Create a new declaration. Extent defaults to the identifier selection.
    pub fn new(
        id: DeclarationId,
        name: impl Into<String>,
        kind: DeclarationKind,
        accessibility: Accessibility,
        module: QualifiedModuleName,
        selection: Selection,
        span: Span,
    ) -> Self {
        Declaration {
            id,
            name: name.into(),
            kind,
            accessibility,
            type_name: None,
            module,
            selection,
            span,
            extent: selection,
            parent: None,
            is_built_in: false,
        }
    }

    /// Set the declared type name.
    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    /// Set the parent declaration.
    pub fn with_parent(mut self, parent: DeclarationId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Set the extent of the whole construct.
    pub fn with_extent(mut self, extent: Selection) -> Self {
        self.extent = extent;
        self
    }

    /// Mark as host-supplied.
    pub fn built_in(mut self) -> Self {
        self.is_built_in = true;
        self
    }

    /// Case-folded identifier for name comparisons.
    pub fn case_key(&self) -> String {
        self.name.to_ascii_lowercase()
    }

    /// Qualified selection of the declared identifier.
    pub fn qualified_selection(&self) -> QualifiedSelection {
        QualifiedSelection::new(self.module.clone(), self.selection)
    }
}

/// A use-site of a declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    /// Unique identifier for this reference.
    pub id: ReferenceId,
    /// The declaration this use binds to.
    pub declaration: DeclarationId,
    /// Module containing the use.
    pub module: QualifiedModuleName,
    /// Enclosing procedure/module scope of the use.
    pub scope: Scope,
    /// Selection of the referencing identifier.
    pub selection: Selection,
    /// Byte span of the referencing identifier.
    pub span: Span,
    /// How the declaration is used.
    pub kind: ReferenceKind,
}

/// An identifier use that bound to no declaration.
///
/// No synthetic declaration is fabricated for these; they are recorded so
/// inspections can surface them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnboundUse {
    pub module: QualifiedModuleName,
    pub name: String,
    pub selection: Selection,
}

// ============================================================================
// Suppression Annotations
// ============================================================================

/// Suppression directives recorded for one module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleSuppressions {
    /// `'@IgnoreModule` with no rule list: suppresses every rule.
    pub blanket: bool,
    /// Rules named by `'@IgnoreModule Rule1, Rule2`. Case-sensitive.
    pub module_rules: BTreeSet<String>,
    /// Rules named by statement-level `'@Ignore Rule`, keyed by the line of
    /// the annotated statement.
    pub line_rules: BTreeMap<u32, BTreeSet<String>>,
}

impl ModuleSuppressions {
    /// Whether a result for `rule` on the statement starting at `line` is
    /// suppressed.
    pub fn is_suppressed(&self, rule: &str, line: u32) -> bool {
        if self.blanket || self.module_rules.contains(rule) {
            return true;
        }
        self.line_rules
            .get(&line)
            .is_some_and(|rules| rules.contains(rule))
    }
}

// ============================================================================
// DeclarationStore
// ============================================================================

/// In-memory store for all declarations and references of one snapshot.
#[derive(Debug, Clone, Default)]
pub struct DeclarationStore {
    // Primary storage (BTreeMap for deterministic iteration)
    declarations: BTreeMap<DeclarationId, Declaration>,
    references: BTreeMap<ReferenceId, Reference>,

    // Postings lists
    /// declaration → ref ids, in discovery (textual) order.
    refs_by_declaration: HashMap<DeclarationId, Vec<ReferenceId>>,
    /// module → declaration ids, in discovery order.
    decls_by_module: HashMap<QualifiedModuleName, Vec<DeclarationId>>,

    // Secondary indexes
    /// Case-folded name → declaration ids.
    decls_by_name: HashMap<String, Vec<DeclarationId>>,

    // Per-module annotation state
    suppressions: BTreeMap<QualifiedModuleName, ModuleSuppressions>,

    // Uses that bound to nothing
    unbound: Vec<UnboundUse>,

    // Implements edges, case-folded "project.class" → implemented interfaces
    implements: BTreeMap<String, BTreeSet<String>>,

    // ID generators
    next_declaration_id: u32,
    next_reference_id: u32,
}

impl DeclarationStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        DeclarationStore::default()
    }

    // ========================================================================
    // ID Generation
    // ========================================================================

    /// Generate the next DeclarationId.
    pub fn next_declaration_id(&mut self) -> DeclarationId {
        let id = DeclarationId(self.next_declaration_id);
        self.next_declaration_id += 1;
        id
    }

    /// Generate the next ReferenceId.
    pub fn next_reference_id(&mut self) -> ReferenceId {
        let id = ReferenceId(self.next_reference_id);
        self.next_reference_id += 1;
        id
    }

    // ========================================================================
    // Insert Operations
    // ========================================================================

    /// Insert a declaration, maintaining the name and module indexes.
    pub fn insert_declaration(&mut self, declaration: Declaration) {
        self.decls_by_name
            .entry(declaration.case_key())
            .or_default()
            .push(declaration.id);
        self.decls_by_module
            .entry(declaration.module.clone())
            .or_default()
            .push(declaration.id);
        self.declarations.insert(declaration.id, declaration);
    }

    /// Insert a reference, maintaining the per-declaration postings list.
    pub fn insert_reference(&mut self, reference: Reference) {
        self.refs_by_declaration
            .entry(reference.declaration)
            .or_default()
            .push(reference.id);
        self.references.insert(reference.id, reference);
    }

    /// Record suppression directives for a module.
    pub fn set_suppressions(
        &mut self,
        module: QualifiedModuleName,
        suppressions: ModuleSuppressions,
    ) {
        self.suppressions.insert(module, suppressions);
    }

    /// Record an identifier use that bound to no declaration.
    pub fn record_unbound(&mut self, unbound: UnboundUse) {
        self.unbound.push(unbound);
    }

    /// Record that `class` implements `interface` (case-folded
    /// "project.name" keys).
    pub fn add_implements(&mut self, class: String, interface: String) {
        self.implements.entry(class).or_default().insert(interface);
    }

    /// Reclassify a class-module declaration as an interface module.
    pub fn mark_interface(&mut self, id: DeclarationId) {
        if let Some(decl) = self.declarations.get_mut(&id) {
            if decl.kind == DeclarationKind::Module(ModuleKind::Class) {
                decl.kind = DeclarationKind::Module(ModuleKind::Interface);
            }
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Look up a declaration by id.
    pub fn declaration(&self, id: DeclarationId) -> Option<&Declaration> {
        self.declarations.get(&id)
    }

    /// Look up a reference by id.
    pub fn reference(&self, id: ReferenceId) -> Option<&Reference> {
        self.references.get(&id)
    }

    /// All declarations in id (discovery) order.
    pub fn declarations(&self) -> impl Iterator<Item = &Declaration> {
        self.declarations.values()
    }

    /// All references in id (discovery) order.
    pub fn references(&self) -> impl Iterator<Item = &Reference> {
        self.references.values()
    }

    /// References bound to the given declaration, in textual order.
    pub fn refs_of(&self, id: DeclarationId) -> impl Iterator<Item = &Reference> {
        self.refs_by_declaration
            .get(&id)
            .map(|ids| ids.as_slice())
            .unwrap_or(&[])
            .iter()
            .filter_map(|ref_id| self.references.get(ref_id))
    }

    /// Number of references bound to the given declaration.
    pub fn ref_count(&self, id: DeclarationId) -> usize {
        self.refs_by_declaration
            .get(&id)
            .map(|ids| ids.len())
            .unwrap_or(0)
    }

    /// Declarations owned by the given module, in discovery order.
    pub fn declarations_in_module(
        &self,
        module: &QualifiedModuleName,
    ) -> impl Iterator<Item = &Declaration> {
        self.decls_by_module
            .get(module)
            .map(|ids| ids.as_slice())
            .unwrap_or(&[])
            .iter()
            .filter_map(|id| self.declarations.get(id))
    }

    /// Declarations whose identifier matches `name` case-insensitively.
    pub fn declarations_named(&self, name: &str) -> impl Iterator<Item = &Declaration> {
        self.decls_by_name
            .get(&name.to_ascii_lowercase())
            .map(|ids| ids.as_slice())
            .unwrap_or(&[])
            .iter()
            .filter_map(|id| self.declarations.get(id))
    }

    /// Children of a declaration (e.g. a procedure's parameters and locals,
    /// an enum's members), in declaration order.
    pub fn children_of(&self, id: DeclarationId) -> impl Iterator<Item = &Declaration> {
        self.declarations
            .values()
            .filter(move |decl| decl.parent == Some(id))
    }

    /// The module declaration record for a module, if present.
    pub fn module_declaration(&self, module: &QualifiedModuleName) -> Option<&Declaration> {
        self.declarations_in_module(module)
            .find(|decl| matches!(decl.kind, DeclarationKind::Module(_)))
    }

    /// Scope a declaration belongs to, derived from its parent chain.
    pub fn scope_of(&self, declaration: &Declaration) -> Scope {
        match declaration
            .parent
            .and_then(|parent| self.declarations.get(&parent))
        {
            Some(parent) if parent.kind.is_procedural() => {
                Scope::member_scope(declaration.module.clone(), parent.name.clone())
            }
            _ => Scope::module_scope(declaration.module.clone()),
        }
    }

    /// Smallest declaration whose extent encloses the given position.
    pub fn find_declaration_at(&self, at: &QualifiedSelection) -> Option<&Declaration> {
        self.declarations_in_module(&at.module)
            .filter(|decl| decl.extent.contains_selection(&at.selection))
            .min_by_key(|decl| decl.extent.extent_size())
    }

    /// Declaration whose identifier (or one of whose references) covers the
    /// given position. Used to answer "what is under the cursor" for rename.
    pub fn declaration_at_identifier(
        &self,
        module: &QualifiedModuleName,
        line: u32,
        column: u32,
    ) -> Option<&Declaration> {
        if let Some(decl) = self
            .declarations_in_module(module)
            .find(|decl| decl.selection.contains(line, column))
        {
            return Some(decl);
        }
        self.references
            .values()
            .find(|reference| {
                &reference.module == module && reference.selection.contains(line, column)
            })
            .and_then(|reference| self.declarations.get(&reference.declaration))
    }

    /// Suppression directives for a module.
    pub fn suppressions(&self, module: &QualifiedModuleName) -> Option<&ModuleSuppressions> {
        self.suppressions.get(module)
    }

    /// All recorded unbound uses.
    pub fn unbound_uses(&self) -> &[UnboundUse] {
        &self.unbound
    }

    /// Interfaces implemented by the given case-folded class key.
    pub fn implements_of(&self, class: &str) -> Option<&BTreeSet<String>> {
        self.implements.get(class)
    }

    /// Whether two case-folded type keys are related by an Implements edge
    /// in either direction.
    pub fn implements_related(&self, a: &str, b: &str) -> bool {
        self.implements
            .get(a)
            .is_some_and(|interfaces| interfaces.contains(b))
            || self
                .implements
                .get(b)
                .is_some_and(|interfaces| interfaces.contains(a))
    }

    // ========================================================================
    // Counts
    // ========================================================================

    /// Number of declarations.
    pub fn declaration_count(&self) -> usize {
        self.declarations.len()
    }

    /// Number of references.
    pub fn reference_count(&self) -> usize {
        self.references.len()
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

    fn store_with_module() -> (DeclarationStore, DeclarationId) {
        let mut store = DeclarationStore::new();
        let module_id = store.next_declaration_id();
        store.insert_declaration(
            Declaration::new(
                module_id,
                "Module1",
                DeclarationKind::Module(ModuleKind::Standard),
                Accessibility::Implicit,
                qmn("Module1"),
                Selection::home(),
                Span::new(0, 0),
            )
            .with_extent(Selection::new(1, 1, 100, 1)),
        );
        (store, module_id)
    }

    mod store_tests {
        use super::*;

        #[test]
        fn name_lookup_is_case_insensitive() {
            let (mut store, module_id) = store_with_module();
            let id = store.next_declaration_id();
            store.insert_declaration(
                Declaration::new(
                    id,
                    "MyConst",
                    DeclarationKind::Constant,
                    Accessibility::Private,
                    qmn("Module1"),
                    Selection::new(2, 7, 2, 13),
                    Span::new(24, 31),
                )
                .with_parent(module_id),
            );

            let found: Vec<_> = store.declarations_named("myconst").collect();
            assert_eq!(found.len(), 1);
            assert_eq!(found[0].name, "MyConst");
            assert_eq!(store.declarations_named("MYCONST").count(), 1);
            assert_eq!(store.declarations_named("other").count(), 0);
        }

        #[test]
        fn refs_preserve_discovery_order() {
            let (mut store, module_id) = store_with_module();
            let decl_id = store.next_declaration_id();
            store.insert_declaration(
                Declaration::new(
                    decl_id,
                    "x",
                    DeclarationKind::Variable,
                    Accessibility::Private,
                    qmn("Module1"),
                    Selection::new(1, 5, 1, 5),
                    Span::new(4, 5),
                )
                .with_parent(module_id),
            );

            for line in [3, 5, 9] {
                let ref_id = store.next_reference_id();
                store.insert_reference(Reference {
                    id: ref_id,
                    declaration: decl_id,
                    module: qmn("Module1"),
                    scope: Scope::module_scope(qmn("Module1")),
                    selection: Selection::new(line, 1, line, 1),
                    span: Span::new(line as u64 * 10, line as u64 * 10 + 1),
                    kind: ReferenceKind::Read,
                });
            }

            let lines: Vec<u32> = store
                .refs_of(decl_id)
                .map(|reference| reference.selection.start_line)
                .collect();
            assert_eq!(lines, vec![3, 5, 9]);
            assert_eq!(store.ref_count(decl_id), 3);
        }

        #[test]
        fn find_declaration_at_picks_smallest_enclosing() {
            let (mut store, module_id) = store_with_module();
            let proc_id = store.next_declaration_id();
            store.insert_declaration(
                Declaration::new(
                    proc_id,
                    "Foo",
                    DeclarationKind::Procedure(ProcedureKind::Sub),
                    Accessibility::Public,
                    qmn("Module1"),
                    Selection::new(1, 12, 1, 14),
                    Span::new(11, 14),
                )
                .with_parent(module_id)
                .with_extent(Selection::new(1, 1, 3, 7)),
            );

            let at = QualifiedSelection::new(qmn("Module1"), Selection::new(2, 5, 2, 5));
            let found = store.find_declaration_at(&at).unwrap();
            assert_eq!(found.id, proc_id, "procedure is smaller than module");

            let outside = QualifiedSelection::new(qmn("Module1"), Selection::new(50, 1, 50, 1));
            let found = store.find_declaration_at(&outside).unwrap();
            assert_eq!(found.id, module_id, "only the module encloses line 50");
        }

        #[test]
        fn scope_of_uses_parent_procedure() {
            let (mut store, module_id) = store_with_module();
            let proc_id = store.next_declaration_id();
            store.insert_declaration(
                Declaration::new(
                    proc_id,
                    "Foo",
                    DeclarationKind::Procedure(ProcedureKind::Sub),
                    Accessibility::Public,
                    qmn("Module1"),
                    Selection::new(1, 12, 1, 14),
                    Span::new(11, 14),
                )
                .with_parent(module_id),
            );
            let local_id = store.next_declaration_id();
            store.insert_declaration(
                Declaration::new(
                    local_id,
                    "bar",
                    DeclarationKind::Variable,
                    Accessibility::Implicit,
                    qmn("Module1"),
                    Selection::new(2, 9, 2, 11),
                    Span::new(25, 28),
                )
                .with_parent(proc_id),
            );

            let local = store.declaration(local_id).unwrap();
            assert_eq!(
                store.scope_of(local),
                Scope::member_scope(qmn("Module1"), "Foo")
            );

            let procedure = store.declaration(proc_id).unwrap();
            assert_eq!(store.scope_of(procedure), Scope::module_scope(qmn("Module1")));
        }

        #[test]
        fn implements_relation_is_bidirectional() {
            let mut store = DeclarationStore::new();
            store.add_implements(
                "testproject.class1".to_string(),
                "testproject.interface1".to_string(),
            );
            assert!(store.implements_related("testproject.class1", "testproject.interface1"));
            assert!(store.implements_related("testproject.interface1", "testproject.class1"));
            assert!(!store.implements_related("testproject.class1", "otherproject.class1"));
        }
    }

    mod suppression_tests {
        use super::*;

        #[test]
        fn blanket_suppresses_everything() {
            let suppressions = ModuleSuppressions {
                blanket: true,
                ..Default::default()
            };
            assert!(suppressions.is_suppressed("ConstantNotUsed", 3));
            assert!(suppressions.is_suppressed("AnythingElse", 99));
        }

        #[test]
        fn module_rules_match_exactly() {
            let mut suppressions = ModuleSuppressions::default();
            suppressions.module_rules.insert("VariableNotUsed".to_string());
            assert!(suppressions.is_suppressed("VariableNotUsed", 1));
            assert!(!suppressions.is_suppressed("ConstantNotUsed", 1));
            // Rule names are case-sensitive.
            assert!(!suppressions.is_suppressed("variablenotused", 1));
        }

        #[test]
        fn line_rules_only_match_their_line() {
            let mut suppressions = ModuleSuppressions::default();
            suppressions
                .line_rules
                .entry(4)
                .or_default()
                .insert("ConstantNotUsed".to_string());
            assert!(suppressions.is_suppressed("ConstantNotUsed", 4));
            assert!(!suppressions.is_suppressed("ConstantNotUsed", 5));
        }
    }
}
