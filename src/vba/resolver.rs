//! Type resolution over a graph snapshot.
//!
//! Resolution is conservative: `None`/`Unknown` means "could not be
//! resolved" and callers must treat it as "do not flag", never as "no
//! match". Type identity is always (project, type name) — two projects can
//! declare incompatible classes with the same name.

use std::fmt;

use vbatool_core::graph::{Declaration, DeclarationId, DeclarationKind};
use vbatool_core::{QualifiedModuleName, Scope};
use vbatool_cst::{Expression, Literal};

use crate::vba::engine::GraphSnapshot;

// ============================================================================
// Types
// ============================================================================

/// Intrinsic types of the host language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntrinsicType {
    Boolean,
    Byte,
    Currency,
    Date,
    Double,
    Integer,
    Long,
    LongLong,
    Object,
    Single,
    String,
    Variant,
}

impl IntrinsicType {
    /// Parse an intrinsic type name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        let intrinsic = match name.to_ascii_lowercase().as_str() {
            "boolean" => IntrinsicType::Boolean,
            "byte" => IntrinsicType::Byte,
            "currency" => IntrinsicType::Currency,
            "date" => IntrinsicType::Date,
            "double" => IntrinsicType::Double,
            "integer" => IntrinsicType::Integer,
            "long" => IntrinsicType::Long,
            "longlong" => IntrinsicType::LongLong,
            "object" => IntrinsicType::Object,
            "single" => IntrinsicType::Single,
            "string" => IntrinsicType::String,
            "variant" => IntrinsicType::Variant,
            _ => return None,
        };
        Some(intrinsic)
    }

    /// `Variant` and `Object` are universally object-compatible.
    pub fn is_universal(&self) -> bool {
        matches!(self, IntrinsicType::Variant | IntrinsicType::Object)
    }

    /// Canonical name.
    pub fn name(&self) -> &'static str {
        match self {
            IntrinsicType::Boolean => "Boolean",
            IntrinsicType::Byte => "Byte",
            IntrinsicType::Currency => "Currency",
            IntrinsicType::Date => "Date",
            IntrinsicType::Double => "Double",
            IntrinsicType::Integer => "Integer",
            IntrinsicType::Long => "Long",
            IntrinsicType::LongLong => "LongLong",
            IntrinsicType::Object => "Object",
            IntrinsicType::Single => "Single",
            IntrinsicType::String => "String",
            IntrinsicType::Variant => "Variant",
        }
    }
}

impl fmt::Display for IntrinsicType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A type identified by (project, name). Name equality alone is never
/// identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedTypeName {
    pub project: String,
    pub name: String,
}

impl QualifiedTypeName {
    /// Case-folded key for comparisons and Implements lookups.
    pub fn case_key(&self) -> String {
        format!(
            "{}.{}",
            self.project.to_ascii_lowercase(),
            self.name.to_ascii_lowercase()
        )
    }
}

impl fmt::Display for QualifiedTypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.project, self.name)
    }
}

/// A resolved static type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedType {
    Intrinsic(IntrinsicType),
    Entity(QualifiedTypeName),
}

impl fmt::Display for ResolvedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedType::Intrinsic(intrinsic) => write!(f, "{intrinsic}"),
            ResolvedType::Entity(entity) => write!(f, "{entity}"),
        }
    }
}

/// Outcome of object-assignment ("Set") target resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetTypeResolution {
    /// The expression has a concrete object type.
    Object(QualifiedTypeName),
    /// `Nothing`, `Variant`, or `Object`: compatible with every object type.
    Universal,
    /// The expression resolves to a value type; it cannot be a Set source.
    NotAnObject,
    /// Could not be resolved; callers must not flag.
    Unknown,
}

// ============================================================================
// TypeResolver
// ============================================================================

/// Resolves expression types against one immutable snapshot.
pub struct TypeResolver<'a> {
    snapshot: &'a GraphSnapshot,
}

impl<'a> TypeResolver<'a> {
    /// Create a resolver over a snapshot.
    pub fn new(snapshot: &'a GraphSnapshot) -> Self {
        TypeResolver { snapshot }
    }

    /// Static type of an expression evaluated in the given scope, or `None`
    /// when it cannot be determined.
    pub fn resolve_expression_type(
        &self,
        expr: &Expression,
        scope: &Scope,
    ) -> Option<ResolvedType> {
        match expr {
            Expression::Literal { literal, .. } => Some(ResolvedType::Intrinsic(match literal {
                Literal::Integer(_) => IntrinsicType::Integer,
                Literal::Float(_) => IntrinsicType::Double,
                Literal::String(_) => IntrinsicType::String,
                Literal::Bool(_) => IntrinsicType::Boolean,
            })),
            Expression::Nothing { .. } => Some(ResolvedType::Intrinsic(IntrinsicType::Object)),
            Expression::Name(ident) => {
                let decl = self.resolve_value_name(&ident.name, scope)?;
                self.declared_type(decl)
            }
            Expression::Member { base, name } => {
                let decl = self.resolve_member(base, name, scope)?;
                self.declared_type(decl)
            }
            Expression::Call { callee, .. } => {
                // The callee's declared return type; statement-only calls
                // and unresolvable callees stay unresolved.
                let decl = match callee.as_ref() {
                    Expression::Name(ident) => self.resolve_value_name(&ident.name, scope)?,
                    Expression::Member { base, name } => self.resolve_member(base, name, scope)?,
                    _ => return None,
                };
                match decl.kind {
                    DeclarationKind::Procedure(kind) if !kind.returns_value() => None,
                    _ => self.declared_type(decl),
                }
            }
            Expression::New { type_ref, .. } => {
                let qualifier = type_ref.qualifier().map(|q| q.name.as_str());
                let decl =
                    self.resolve_type_name(qualifier, &type_ref.name().name, &scope.module)?;
                Some(ResolvedType::Entity(self.entity_of(decl)))
            }
            Expression::Paren(inner) => self.resolve_expression_type(inner, scope),
            Expression::Unary { expr, .. } => self.resolve_expression_type(expr, scope),
            Expression::Binary { .. } | Expression::Missing { .. } => None,
        }
    }

    /// Specialized path for object-assignment contexts.
    pub fn resolve_set_target_type(&self, expr: &Expression, scope: &Scope) -> SetTypeResolution {
        match expr {
            Expression::Nothing { .. } => SetTypeResolution::Universal,
            Expression::Literal { .. } => SetTypeResolution::NotAnObject,
            _ => match self.resolve_expression_type(expr, scope) {
                Some(ResolvedType::Intrinsic(intrinsic)) if intrinsic.is_universal() => {
                    SetTypeResolution::Universal
                }
                Some(ResolvedType::Intrinsic(_)) => SetTypeResolution::NotAnObject,
                Some(ResolvedType::Entity(entity)) => SetTypeResolution::Object(entity),
                None => SetTypeResolution::Unknown,
            },
        }
    }

    /// Declared (or implied) type of a declaration.
    ///
    /// Untyped declarations are `Variant`. Unresolvable type names return
    /// `None` — conservatively indistinct, never flagged.
    pub fn declared_type(&self, decl: &Declaration) -> Option<ResolvedType> {
        let Some(type_name) = &decl.type_name else {
            return Some(ResolvedType::Intrinsic(IntrinsicType::Variant));
        };
        let mut parts = type_name.rsplitn(2, '.');
        let name = parts.next()?;
        let qualifier = parts.next();
        if qualifier.is_none() {
            if let Some(intrinsic) = IntrinsicType::from_name(name) {
                return Some(ResolvedType::Intrinsic(intrinsic));
            }
        }
        let target = self.resolve_type_name(qualifier, name, &decl.module)?;
        Some(ResolvedType::Entity(self.entity_of(target)))
    }

    /// Whether two object types are compatible: identical (project, name)
    /// or related through an `Implements` edge in either direction.
    pub fn object_types_compatible(&self, a: &QualifiedTypeName, b: &QualifiedTypeName) -> bool {
        let (a_key, b_key) = (a.case_key(), b.case_key());
        a_key == b_key || self.snapshot.store.implements_related(&a_key, &b_key)
    }

    // ========================================================================
    // Name lookup (read-only mirror of the binder's fixed order)
    // ========================================================================

    fn resolve_value_name(&self, name: &str, scope: &Scope) -> Option<&'a Declaration> {
        let store = &self.snapshot.store;

        // Enclosing procedure scope.
        if let Some(member) = &scope.member {
            if let Some(procedure) = store
                .declarations_in_module(&scope.module)
                .find(|decl| decl.kind.is_procedural() && decl.name.eq_ignore_ascii_case(member))
            {
                if procedure.name.eq_ignore_ascii_case(name) {
                    return Some(procedure);
                }
                if let Some(local) = store
                    .children_of(procedure.id)
                    .find(|decl| decl.name.eq_ignore_ascii_case(name))
                {
                    return Some(local);
                }
            }
        }

        // Module scope.
        let module_decl_id = store.module_declaration(&scope.module)?.id;
        if let Some(found) = store
            .declarations_named(name)
            .find(|decl| decl.module == scope.module && self.reachable(decl, module_decl_id))
        {
            return Some(found);
        }

        // Same-project public scope, then referenced projects.
        let mut fallback = None;
        for decl in store.declarations_named(name) {
            if decl.module == scope.module || !self.visible_outside(decl) {
                continue;
            }
            if decl.module.project == scope.module.project {
                return Some(decl);
            }
            if fallback.is_none() {
                fallback = Some(decl);
            }
        }
        fallback
    }

    fn resolve_member(
        &self,
        base: &Expression,
        name: &vbatool_cst::Ident,
        scope: &Scope,
    ) -> Option<&'a Declaration> {
        let Expression::Name(base_ident) = base else {
            return None;
        };
        let store = &self.snapshot.store;

        // Project-qualified.
        if let Some(project_decl) = store
            .declarations_named(&base_ident.name)
            .find(|decl| decl.kind == DeclarationKind::Project)
        {
            let project = project_decl.name.clone();
            return store.declarations_named(&name.name).find(|decl| {
                decl.module.project.eq_ignore_ascii_case(&project) && self.visible_outside(decl)
            });
        }

        // Module-qualified.
        if let Some(module_decl) = store
            .declarations_named(&base_ident.name)
            .find(|decl| matches!(decl.kind, DeclarationKind::Module(_)))
        {
            let module = module_decl.module.clone();
            return store.declarations_named(&name.name).find(|decl| {
                decl.module == module
                    && (module == scope.module || self.visible_outside(decl))
            });
        }

        // Instance-qualified through a typed value.
        let base_decl = self.resolve_value_name(&base_ident.name, scope)?;
        let type_name = base_decl.type_name.as_deref()?;
        let mut parts = type_name.rsplitn(2, '.');
        let leaf = parts.next()?;
        let qualifier = parts.next();
        let class = self.resolve_type_name(qualifier, leaf, &base_decl.module)?;
        let class_module = class.module.clone();
        store
            .declarations_named(&name.name)
            .find(|decl| decl.module == class_module && self.visible_outside(decl))
    }

    /// Resolve a type name to its declaring entity: class module,
    /// user-defined type, or enumeration.
    fn resolve_type_name(
        &self,
        qualifier: Option<&str>,
        name: &str,
        from: &QualifiedModuleName,
    ) -> Option<&'a Declaration> {
        let store = &self.snapshot.store;
        let is_type_entity = |decl: &&Declaration| {
            matches!(
                decl.kind,
                DeclarationKind::Module(vbatool_core::graph::ModuleKind::Class)
                    | DeclarationKind::Module(vbatool_core::graph::ModuleKind::Interface)
                    | DeclarationKind::UserDefinedType
                    | DeclarationKind::Enumeration
            )
        };

        match qualifier {
            Some(project) => store
                .declarations_named(name)
                .filter(is_type_entity)
                .find(|decl| decl.module.project.eq_ignore_ascii_case(project)),
            None => {
                // Same project first, then referenced projects.
                let mut fallback = None;
                for decl in store.declarations_named(name).filter(is_type_entity) {
                    if decl.module.project == from.project {
                        return Some(decl);
                    }
                    if fallback.is_none() {
                        fallback = Some(decl);
                    }
                }
                fallback
            }
        }
    }

    fn entity_of(&self, decl: &Declaration) -> QualifiedTypeName {
        QualifiedTypeName {
            project: decl.module.project.clone(),
            name: decl.name.clone(),
        }
    }

    fn reachable(&self, decl: &Declaration, module_decl_id: DeclarationId) -> bool {
        match decl.parent {
            Some(parent) if parent == module_decl_id => {
                !matches!(decl.kind, DeclarationKind::Module(_))
            }
            Some(parent) => {
                decl.kind == DeclarationKind::EnumerationMember
                    && self
                        .snapshot
                        .store
                        .declaration(parent)
                        .is_some_and(|enum_decl| enum_decl.parent == Some(module_decl_id))
            }
            None => false,
        }
    }

    fn visible_outside(&self, decl: &Declaration) -> bool {
        use vbatool_core::graph::Accessibility;
        match decl.kind {
            DeclarationKind::Procedure(_)
            | DeclarationKind::Enumeration
            | DeclarationKind::EnumerationMember
            | DeclarationKind::UserDefinedType => decl.accessibility != Accessibility::Private,
            DeclarationKind::Variable | DeclarationKind::Constant => {
                decl.accessibility.is_public()
            }
            _ => false,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
