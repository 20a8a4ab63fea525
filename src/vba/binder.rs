//! Declaration-graph construction.
//!
//! Two passes over every parsed module:
//! 1. declare — every declaration-producing construct becomes a
//!    [`Declaration`] with its scope derived from (module, enclosing member);
//! 2. bind — every identifier use resolves to a candidate declaration with a
//!    fixed lookup order: enclosing procedure, declaring module, same-project
//!    public scope, referenced projects. First match wins; unbound uses are
//!    recorded, never fabricated.
//!
//! Identifier comparison is case-insensitive. Call sites against procedure
//! declarations are recorded for the object-type inspection.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use vbatool_core::graph::{
    Accessibility, Declaration, DeclarationId, DeclarationKind, DeclarationStore, ModuleKind,
    ModuleSuppressions, Reference, ReferenceKind, UnboundUse,
};
use vbatool_core::text::LineIndex;
use vbatool_core::{QualifiedModuleName, Scope, Selection, Span};
use vbatool_cst::{
    ConstGroup, Expression, ModuleItem, ModuleTree, Procedure, Statement, TypeRef, VariableGroup,
};

use crate::vba::engine::HostDeclaration;

/// One module ready for graph construction.
#[derive(Debug, Clone)]
pub struct ParsedModule {
    pub name: QualifiedModuleName,
    pub kind: ModuleKind,
    pub tree: std::sync::Arc<ModuleTree>,
    pub index: LineIndex,
    pub line_count: u32,
}

/// A recorded call against a procedure declaration, with its argument
/// expressions kept for inspection-time type resolution.
#[derive(Debug, Clone)]
pub struct CallSite {
    pub module: QualifiedModuleName,
    pub scope: Scope,
    pub callee: DeclarationId,
    pub args: Vec<ArgumentSite>,
}

/// One present argument at a call site.
#[derive(Debug, Clone)]
pub struct ArgumentSite {
    /// Zero-based position in the argument list.
    pub index: usize,
    pub expr: Expression,
    pub selection: Selection,
}

/// Output of graph construction.
#[derive(Debug, Default)]
pub struct BoundGraph {
    pub store: DeclarationStore,
    pub call_sites: Vec<CallSite>,
}

/// How an identifier is being used; drives kind preference during lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UseContext {
    Value,
    Call,
    Type,
    Write,
    SetTarget,
}

impl UseContext {
    fn reference_kind(self) -> ReferenceKind {
        match self {
            UseContext::Value | UseContext::Call | UseContext::Type => ReferenceKind::Read,
            UseContext::Write => ReferenceKind::Write,
            UseContext::SetTarget => ReferenceKind::SetTarget,
        }
    }

    /// Rank of a declaration kind for this context; lower is better, `None`
    /// means not a candidate.
    fn rank(self, kind: DeclarationKind) -> Option<u8> {
        match self {
            UseContext::Call => {
                if kind.is_procedural() {
                    Some(0)
                } else if kind.is_value() {
                    // Array indexing shares call syntax.
                    Some(1)
                } else {
                    None
                }
            }
            UseContext::Type => kind.is_type().then_some(0),
            UseContext::Value | UseContext::Write | UseContext::SetTarget => {
                if kind.is_value() {
                    Some(0)
                } else if kind.is_procedural() {
                    Some(1)
                } else {
                    None
                }
            }
        }
    }
}

/// Build the declaration graph for a set of parsed modules.
pub fn bind(modules: &[ParsedModule], host: &[HostDeclaration], host_project: &str) -> BoundGraph {
    let mut binder = Binder {
        store: DeclarationStore::new(),
        call_sites: Vec::new(),
        module_decls: BTreeMap::new(),
        project_decls: HashMap::new(),
        module_level: HashMap::new(),
        public_by_project: HashMap::new(),
        project_order: Vec::new(),
    };
    binder.declare_host(host, host_project);
    for module in modules {
        binder.declare_module(module);
    }
    binder.build_indexes();
    for module in modules {
        binder.bind_module(module);
    }
    debug!(
        declarations = binder.store.declaration_count(),
        references = binder.store.reference_count(),
        call_sites = binder.call_sites.len(),
        "graph construction complete"
    );
    BoundGraph {
        store: binder.store,
        call_sites: binder.call_sites,
    }
}

struct Binder {
    store: DeclarationStore,
    call_sites: Vec<CallSite>,
    /// module → its module declaration id (ordered for deterministic lookup).
    module_decls: BTreeMap<QualifiedModuleName, DeclarationId>,
    /// case-folded project name → project declaration id.
    project_decls: HashMap<String, DeclarationId>,
    /// module → declarations reachable by bare name at module scope.
    module_level: HashMap<QualifiedModuleName, Vec<DeclarationId>>,
    /// case-folded project name → externally visible declarations.
    public_by_project: HashMap<String, Vec<DeclarationId>>,
    /// case-folded project names in first-seen order.
    project_order: Vec<String>,
}

/// Binding context for one procedure body or module-level position.
struct BindCtx<'a> {
    module: &'a QualifiedModuleName,
    scope: Scope,
    proc: Option<(DeclarationId, String)>,
    locals: Option<&'a HashMap<String, DeclarationId>>,
    index: &'a LineIndex,
}

impl Binder {
    // ========================================================================
    // Pass 1: declare
    // ========================================================================

    fn ensure_project(&mut self, project: &str) -> DeclarationId {
        let key = project.to_ascii_lowercase();
        if let Some(id) = self.project_decls.get(&key) {
            return *id;
        }
        let id = self.store.next_declaration_id();
        self.store.insert_declaration(Declaration::new(
            id,
            project,
            DeclarationKind::Project,
            Accessibility::Public,
            QualifiedModuleName::new(project, project),
            Selection::home(),
            Span::new(0, 0),
        ));
        self.project_decls.insert(key.clone(), id);
        self.project_order.push(key);
        id
    }

    fn declare_host(&mut self, host: &[HostDeclaration], host_project: &str) {
        if host.is_empty() {
            return;
        }
        let project_id = self.ensure_project(host_project);
        let mut host_modules: HashMap<String, DeclarationId> = HashMap::new();
        for decl in host {
            let qmn = QualifiedModuleName::new(host_project, decl.module.clone());
            let module_id = *host_modules.entry(decl.module.clone()).or_insert_with(|| {
                let id = self.store.next_declaration_id();
                self.store.insert_declaration(
                    Declaration::new(
                        id,
                        decl.module.clone(),
                        DeclarationKind::Module(ModuleKind::Standard),
                        Accessibility::Public,
                        qmn.clone(),
                        Selection::home(),
                        Span::new(0, 0),
                    )
                    .with_parent(project_id)
                    .built_in(),
                );
                self.module_decls.insert(qmn.clone(), id);
                id
            });
            let id = self.store.next_declaration_id();
            let mut declaration = Declaration::new(
                id,
                decl.name.clone(),
                decl.kind,
                Accessibility::Public,
                qmn.clone(),
                Selection::home(),
                Span::new(0, 0),
            )
            .with_parent(module_id)
            .built_in();
            if let Some(type_name) = &decl.type_name {
                declaration = declaration.with_type_name(type_name.clone());
            }
            self.store.insert_declaration(declaration);
        }
    }

    fn declare_module(&mut self, module: &ParsedModule) {
        let project_id = self.ensure_project(&module.name.project);
        let module_id = self.store.next_declaration_id();
        self.store.insert_declaration(
            Declaration::new(
                module_id,
                module.name.module.clone(),
                DeclarationKind::Module(module.kind),
                Accessibility::Public,
                module.name.clone(),
                Selection::home(),
                Span::new(0, 0),
            )
            .with_parent(project_id)
            .with_extent(Selection::new(1, 1, module.line_count.max(1), u32::MAX)),
        );
        self.module_decls.insert(module.name.clone(), module_id);

        self.record_suppressions(module);

        for item in &module.tree.items {
            match item {
                ModuleItem::Variables(group) => {
                    self.declare_variables(group, module, module_id, false);
                }
                ModuleItem::Constants(group) => {
                    self.declare_constants(group, module, module_id, false);
                }
                ModuleItem::Procedure(procedure) => {
                    self.declare_procedure(procedure, module, module_id);
                }
                ModuleItem::UserType(udt) => {
                    let access = udt.accessibility.unwrap_or(Accessibility::Implicit);
                    let id = self.store.next_declaration_id();
                    self.store.insert_declaration(
                        Declaration::new(
                            id,
                            udt.name.name.clone(),
                            DeclarationKind::UserDefinedType,
                            access,
                            module.name.clone(),
                            udt.name.selection,
                            udt.name.span,
                        )
                        .with_parent(module_id)
                        .with_extent(udt.extent),
                    );
                    for member in &udt.members {
                        let member_id = self.store.next_declaration_id();
                        let mut declaration = Declaration::new(
                            member_id,
                            member.name.name.clone(),
                            DeclarationKind::UserDefinedTypeMember,
                            access,
                            module.name.clone(),
                            member.name.selection,
                            member.name.span,
                        )
                        .with_parent(id);
                        if let Some(type_ref) = &member.type_name {
                            declaration = declaration.with_type_name(type_ref_name(type_ref));
                        }
                        self.store.insert_declaration(declaration);
                    }
                }
                ModuleItem::Enum(def) => {
                    let access = def.accessibility.unwrap_or(Accessibility::Implicit);
                    let id = self.store.next_declaration_id();
                    self.store.insert_declaration(
                        Declaration::new(
                            id,
                            def.name.name.clone(),
                            DeclarationKind::Enumeration,
                            access,
                            module.name.clone(),
                            def.name.selection,
                            def.name.span,
                        )
                        .with_parent(module_id)
                        .with_extent(def.extent),
                    );
                    for member in &def.members {
                        let member_id = self.store.next_declaration_id();
                        self.store.insert_declaration(
                            Declaration::new(
                                member_id,
                                member.name.name.clone(),
                                DeclarationKind::EnumerationMember,
                                access,
                                module.name.clone(),
                                member.name.selection,
                                member.name.span,
                            )
                            .with_parent(id),
                        );
                    }
                }
            }
        }
    }

    fn declare_variables(
        &mut self,
        group: &VariableGroup,
        module: &ParsedModule,
        parent: DeclarationId,
        local: bool,
    ) {
        let access = if local {
            Accessibility::Implicit
        } else {
            group.accessibility.unwrap_or(Accessibility::Implicit)
        };
        for var in &group.vars {
            let id = self.store.next_declaration_id();
            let mut declaration = Declaration::new(
                id,
                var.name.name.clone(),
                DeclarationKind::Variable,
                access,
                module.name.clone(),
                var.name.selection,
                var.name.span,
            )
            .with_parent(parent);
            if let Some(type_ref) = &var.type_name {
                declaration = declaration.with_type_name(type_ref_name(type_ref));
            }
            self.store.insert_declaration(declaration);
        }
    }

    fn declare_constants(
        &mut self,
        group: &ConstGroup,
        module: &ParsedModule,
        parent: DeclarationId,
        local: bool,
    ) {
        let access = if local {
            Accessibility::Implicit
        } else {
            group.accessibility.unwrap_or(Accessibility::Implicit)
        };
        for constant in &group.consts {
            let id = self.store.next_declaration_id();
            let mut declaration = Declaration::new(
                id,
                constant.name.name.clone(),
                DeclarationKind::Constant,
                access,
                module.name.clone(),
                constant.name.selection,
                constant.name.span,
            )
            .with_parent(parent);
            if let Some(type_ref) = &constant.type_name {
                declaration = declaration.with_type_name(type_ref_name(type_ref));
            }
            self.store.insert_declaration(declaration);
        }
    }

    fn declare_procedure(
        &mut self,
        procedure: &Procedure,
        module: &ParsedModule,
        module_id: DeclarationId,
    ) {
        let id = self.store.next_declaration_id();
        let mut declaration = Declaration::new(
            id,
            procedure.name.name.clone(),
            DeclarationKind::Procedure(procedure.kind),
            procedure.accessibility.unwrap_or(Accessibility::Implicit),
            module.name.clone(),
            procedure.name.selection,
            procedure.name.span,
        )
        .with_parent(module_id)
        .with_extent(procedure.extent);
        if let Some(type_ref) = &procedure.return_type {
            declaration = declaration.with_type_name(type_ref_name(type_ref));
        }
        self.store.insert_declaration(declaration);

        for param in &procedure.params {
            let param_id = self.store.next_declaration_id();
            let mut declaration = Declaration::new(
                param_id,
                param.name.name.clone(),
                DeclarationKind::Parameter,
                Accessibility::Implicit,
                module.name.clone(),
                param.name.selection,
                param.name.span,
            )
            .with_parent(id);
            if let Some(type_ref) = &param.type_name {
                declaration = declaration.with_type_name(type_ref_name(type_ref));
            }
            self.store.insert_declaration(declaration);
        }

        self.declare_locals(&procedure.body, module, id);
    }

    fn declare_locals(
        &mut self,
        statements: &[Statement],
        module: &ParsedModule,
        proc_id: DeclarationId,
    ) {
        for statement in statements {
            match statement {
                Statement::Variables(group) => {
                    self.declare_variables(group, module, proc_id, true);
                }
                Statement::Constants(group) => {
                    self.declare_constants(group, module, proc_id, true);
                }
                Statement::If {
                    then_body,
                    else_ifs,
                    else_body,
                    ..
                } => {
                    self.declare_locals(then_body, module, proc_id);
                    for (_, body) in else_ifs {
                        self.declare_locals(body, module, proc_id);
                    }
                    if let Some(body) = else_body {
                        self.declare_locals(body, module, proc_id);
                    }
                }
                Statement::For { body, .. }
                | Statement::ForEach { body, .. }
                | Statement::DoLoop { body, .. }
                | Statement::While { body, .. } => {
                    self.declare_locals(body, module, proc_id);
                }
                _ => {}
            }
        }
    }

    fn record_suppressions(&mut self, module: &ParsedModule) {
        let mut suppressions = ModuleSuppressions::default();
        for annotation in &module.tree.annotations {
            match annotation.name.as_str() {
                "IgnoreModule" => {
                    if annotation.args.is_empty() {
                        suppressions.blanket = true;
                    } else {
                        suppressions
                            .module_rules
                            .extend(annotation.args.iter().cloned());
                    }
                }
                // A bare statement-level `@Ignore` names no rule and is a
                // recorded no-op.
                "Ignore" if !annotation.args.is_empty() => {
                    if let Some(line) = annotation.target_line {
                        suppressions
                            .line_rules
                            .entry(line)
                            .or_default()
                            .extend(annotation.args.iter().cloned());
                    }
                }
                _ => {}
            }
        }
        self.store.set_suppressions(module.name.clone(), suppressions);
    }

    // ========================================================================
    // Indexes for lookup tiers
    // ========================================================================

    fn build_indexes(&mut self) {
        let mut module_level: HashMap<QualifiedModuleName, Vec<DeclarationId>> = HashMap::new();
        let mut public_by_project: HashMap<String, Vec<DeclarationId>> = HashMap::new();

        for decl in self.store.declarations() {
            if self.is_module_reachable(decl) {
                module_level
                    .entry(decl.module.clone())
                    .or_default()
                    .push(decl.id);
                if self.is_externally_visible(decl) {
                    public_by_project
                        .entry(decl.module.project.to_ascii_lowercase())
                        .or_default()
                        .push(decl.id);
                }
            }
        }

        self.module_level = module_level;
        self.public_by_project = public_by_project;
    }

    /// Whether a declaration is reachable by bare name at module scope.
    fn is_module_reachable(&self, decl: &Declaration) -> bool {
        let Some(parent) = decl.parent else {
            return false;
        };
        if Some(&parent) == self.module_decls.get(&decl.module) {
            return !matches!(decl.kind, DeclarationKind::Module(_));
        }
        // Members of module-level enums are reachable by bare name.
        if decl.kind == DeclarationKind::EnumerationMember {
            if let Some(enum_decl) = self.store.declaration(parent) {
                return enum_decl
                    .parent
                    .is_some_and(|p| Some(&p) == self.module_decls.get(&decl.module));
            }
        }
        false
    }

    /// Whether a declaration is visible outside its module.
    fn is_externally_visible(&self, decl: &Declaration) -> bool {
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

    // ========================================================================
    // Pass 2: bind
    // ========================================================================

    fn bind_module(&mut self, module: &ParsedModule) {
        // Implements edges first: they reclassify interface modules.
        for type_ref in &module.tree.implements {
            let ctx = self.module_ctx(module);
            if let Some(target) = self.bind_type_ref(type_ref, &ctx) {
                let target_decl = self.store.declaration(target).cloned();
                if let Some(target_decl) = target_decl {
                    if matches!(target_decl.kind, DeclarationKind::Module(_)) {
                        self.store
                            .add_implements(module.name.case_key(), target_decl.module.case_key());
                        self.store.mark_interface(target);
                    }
                }
            }
        }

        for item in &module.tree.items {
            match item {
                ModuleItem::Variables(group) => {
                    let ctx = self.module_ctx(module);
                    for var in &group.vars {
                        if let Some(type_ref) = &var.type_name {
                            self.bind_type_ref(type_ref, &ctx);
                        }
                    }
                }
                ModuleItem::Constants(group) => {
                    let ctx = self.module_ctx(module);
                    for constant in &group.consts {
                        if let Some(type_ref) = &constant.type_name {
                            self.bind_type_ref(type_ref, &ctx);
                        }
                        self.bind_expression(&constant.value, &ctx, UseContext::Value);
                    }
                }
                ModuleItem::UserType(udt) => {
                    let ctx = self.module_ctx(module);
                    for member in &udt.members {
                        if let Some(type_ref) = &member.type_name {
                            self.bind_type_ref(type_ref, &ctx);
                        }
                    }
                }
                ModuleItem::Enum(def) => {
                    let ctx = self.module_ctx(module);
                    for member in &def.members {
                        if let Some(value) = &member.value {
                            self.bind_expression(value, &ctx, UseContext::Value);
                        }
                    }
                }
                ModuleItem::Procedure(procedure) => {
                    self.bind_procedure(procedure, module);
                }
            }
        }
    }

    fn module_ctx<'a>(&self, module: &'a ParsedModule) -> BindCtx<'a> {
        BindCtx {
            module: &module.name,
            scope: Scope::module_scope(module.name.clone()),
            proc: None,
            locals: None,
            index: &module.index,
        }
    }

    fn bind_procedure(&mut self, procedure: &Procedure, module: &ParsedModule) {
        let Some(proc_id) = self.find_procedure_id(&module.name, &procedure.name.name) else {
            return;
        };

        // Parameter and return types bind in the enclosing module context.
        {
            let ctx = self.module_ctx(module);
            for param in &procedure.params {
                if let Some(type_ref) = &param.type_name {
                    self.bind_type_ref(type_ref, &ctx);
                }
            }
            if let Some(type_ref) = &procedure.return_type {
                self.bind_type_ref(type_ref, &ctx);
            }
        }

        // Local scope: parameters, locals, and local constants. First
        // declaration wins; duplicates surface through an inspection.
        let mut locals: HashMap<String, DeclarationId> = HashMap::new();
        let children: Vec<(String, DeclarationId)> = self
            .store
            .children_of(proc_id)
            .map(|decl| (decl.case_key(), decl.id))
            .collect();
        for (key, id) in children {
            locals.entry(key).or_insert(id);
        }

        let ctx = BindCtx {
            module: &module.name,
            scope: Scope::member_scope(module.name.clone(), procedure.name.name.clone()),
            proc: Some((proc_id, procedure.name.name.clone())),
            locals: Some(&locals),
            index: &module.index,
        };

        // Default parameter values.
        for param in &procedure.params {
            if let Some(default) = &param.default {
                self.bind_expression(default, &ctx, UseContext::Value);
            }
        }

        self.bind_statements(&procedure.body, &ctx);
    }

    fn bind_statements(&mut self, statements: &[Statement], ctx: &BindCtx<'_>) {
        for statement in statements {
            match statement {
                Statement::Variables(group) => {
                    for var in &group.vars {
                        if let Some(type_ref) = &var.type_name {
                            self.bind_type_ref(type_ref, ctx);
                        }
                    }
                }
                Statement::Constants(group) => {
                    for constant in &group.consts {
                        if let Some(type_ref) = &constant.type_name {
                            self.bind_type_ref(type_ref, ctx);
                        }
                        self.bind_expression(&constant.value, ctx, UseContext::Value);
                    }
                }
                Statement::Assign {
                    target,
                    value,
                    is_set,
                } => {
                    let use_ctx = if *is_set {
                        UseContext::SetTarget
                    } else {
                        UseContext::Write
                    };
                    self.bind_expression(target, ctx, use_ctx);
                    self.bind_expression(value, ctx, UseContext::Value);
                }
                Statement::Call { callee, args } => {
                    self.bind_call(callee, args, ctx);
                }
                Statement::If {
                    condition,
                    then_body,
                    else_ifs,
                    else_body,
                } => {
                    self.bind_expression(condition, ctx, UseContext::Value);
                    self.bind_statements(then_body, ctx);
                    for (elseif_condition, body) in else_ifs {
                        self.bind_expression(elseif_condition, ctx, UseContext::Value);
                        self.bind_statements(body, ctx);
                    }
                    if let Some(body) = else_body {
                        self.bind_statements(body, ctx);
                    }
                }
                Statement::For {
                    counter,
                    from,
                    to,
                    step,
                    body,
                } => {
                    self.bind_expression(counter, ctx, UseContext::Write);
                    self.bind_expression(from, ctx, UseContext::Value);
                    self.bind_expression(to, ctx, UseContext::Value);
                    if let Some(step) = step {
                        self.bind_expression(step, ctx, UseContext::Value);
                    }
                    self.bind_statements(body, ctx);
                }
                Statement::ForEach {
                    element,
                    collection,
                    body,
                } => {
                    self.bind_expression(element, ctx, UseContext::Write);
                    self.bind_expression(collection, ctx, UseContext::Value);
                    self.bind_statements(body, ctx);
                }
                Statement::DoLoop { condition, body } => {
                    if let Some(condition) = condition {
                        self.bind_expression(condition, ctx, UseContext::Value);
                    }
                    self.bind_statements(body, ctx);
                }
                Statement::While { condition, body } => {
                    self.bind_expression(condition, ctx, UseContext::Value);
                    self.bind_statements(body, ctx);
                }
                Statement::Exit => {}
            }
        }
    }

    fn bind_call(&mut self, callee: &Expression, args: &[Expression], ctx: &BindCtx<'_>) {
        let callee_id = self.bind_expression(callee, ctx, UseContext::Call);
        for arg in args {
            if !arg.is_missing() {
                self.bind_expression(arg, ctx, UseContext::Value);
            }
        }
        self.record_call_site(callee_id, args, ctx);
    }

    fn record_call_site(
        &mut self,
        callee: Option<DeclarationId>,
        args: &[Expression],
        ctx: &BindCtx<'_>,
    ) {
        let Some(callee) = callee else {
            return;
        };
        let is_procedure = self
            .store
            .declaration(callee)
            .is_some_and(|decl| decl.kind.is_procedural());
        if !is_procedure {
            return;
        }
        let args: Vec<ArgumentSite> = args
            .iter()
            .enumerate()
            .filter(|(_, arg)| !arg.is_missing())
            .map(|(index, arg)| ArgumentSite {
                index,
                expr: arg.clone(),
                selection: ctx.index.selection(arg.span()),
            })
            .collect();
        self.call_sites.push(CallSite {
            module: ctx.module.clone(),
            scope: ctx.scope.clone(),
            callee,
            args,
        });
    }

    /// Bind one expression; returns the declaration the expression's head
    /// denotes, when it resolves.
    fn bind_expression(
        &mut self,
        expr: &Expression,
        ctx: &BindCtx<'_>,
        use_ctx: UseContext,
    ) -> Option<DeclarationId> {
        match expr {
            Expression::Name(ident) => {
                match self.resolve_name(&ident.name, ctx, use_ctx) {
                    Some(id) => {
                        self.push_reference(id, ident.span, ident.selection, ctx, use_ctx);
                        Some(id)
                    }
                    None => {
                        self.store.record_unbound(UnboundUse {
                            module: ctx.module.clone(),
                            name: ident.name.clone(),
                            selection: ident.selection,
                        });
                        None
                    }
                }
            }
            Expression::Member { base, name } => self.bind_member(base, name, ctx, use_ctx),
            Expression::Call { callee, args, .. } => {
                let callee_id = self.bind_expression(callee, ctx, UseContext::Call);
                for arg in args {
                    if !arg.is_missing() {
                        self.bind_expression(arg, ctx, UseContext::Value);
                    }
                }
                self.record_call_site(callee_id, args, ctx);
                callee_id
            }
            Expression::New { type_ref, .. } => self.bind_type_ref(type_ref, ctx),
            Expression::Binary { lhs, rhs, .. } => {
                self.bind_expression(lhs, ctx, UseContext::Value);
                self.bind_expression(rhs, ctx, UseContext::Value);
                None
            }
            Expression::Unary { expr, .. } => {
                self.bind_expression(expr, ctx, UseContext::Value);
                None
            }
            Expression::Paren(inner) => self.bind_expression(inner, ctx, use_ctx),
            Expression::Literal { .. } | Expression::Nothing { .. } | Expression::Missing { .. } => {
                None
            }
        }
    }

    fn bind_member(
        &mut self,
        base: &Expression,
        name: &vbatool_cst::Ident,
        ctx: &BindCtx<'_>,
        use_ctx: UseContext,
    ) -> Option<DeclarationId> {
        let Expression::Name(base_ident) = base else {
            // Deeper chains: bind what we can of the base, leave the leaf
            // unbound without fabricating anything.
            self.bind_expression(base, ctx, UseContext::Value);
            return None;
        };

        // Project-qualified access: `OtherProject.Class1`.
        let project_key = base_ident.name.to_ascii_lowercase();
        if let Some(project_id) = self.project_decls.get(&project_key).copied() {
            self.push_reference(
                project_id,
                base_ident.span,
                base_ident.selection,
                ctx,
                UseContext::Value,
            );
            let target = self.pick(
                self.public_by_project
                    .get(&project_key)
                    .map(|ids| ids.as_slice())
                    .unwrap_or(&[])
                    .to_vec(),
                &name.name,
                use_ctx,
            );
            // Module declarations are also addressable through the project.
            let target = target.or_else(|| {
                self.module_decls
                    .iter()
                    .find(|(qmn, _)| {
                        qmn.project.eq_ignore_ascii_case(&base_ident.name)
                            && qmn.module.eq_ignore_ascii_case(&name.name)
                    })
                    .map(|(_, id)| *id)
            });
            if let Some(target) = target {
                self.push_reference(target, name.span, name.selection, ctx, use_ctx);
            }
            return target;
        }

        // Module-qualified access: `Module1.Foo`.
        if let Some((base_module, module_id)) =
            self.find_module_decl(&base_ident.name, &ctx.module.project)
        {
            self.push_reference(
                module_id,
                base_ident.span,
                base_ident.selection,
                ctx,
                UseContext::Value,
            );
            let candidates = self
                .module_level
                .get(&base_module)
                .cloned()
                .unwrap_or_default();
            let target = self.pick(candidates, &name.name, use_ctx).filter(|id| {
                self.store.declaration(*id).is_some_and(|decl| {
                    base_module == *ctx.module || self.is_externally_visible(decl)
                })
            });
            if let Some(target) = target {
                self.push_reference(target, name.span, name.selection, ctx, use_ctx);
            }
            return target;
        }

        // Instance-qualified access through a typed value.
        let base_id = self.resolve_name(&base_ident.name, ctx, UseContext::Value)?;
        self.push_reference(
            base_id,
            base_ident.span,
            base_ident.selection,
            ctx,
            UseContext::Value,
        );
        let base_decl = self.store.declaration(base_id)?.clone();
        let target_module = match base_decl.kind {
            DeclarationKind::Enumeration => {
                let member = self
                    .store
                    .children_of(base_decl.id)
                    .find(|child| child.name.eq_ignore_ascii_case(&name.name))
                    .map(|child| child.id);
                if let Some(member) = member {
                    self.push_reference(member, name.span, name.selection, ctx, use_ctx);
                }
                return member;
            }
            DeclarationKind::Variable
            | DeclarationKind::Parameter
            | DeclarationKind::Constant => base_decl
                .type_name
                .as_deref()
                .and_then(|type_name| self.lookup_type_by_name(type_name, ctx.module))
                .and_then(|type_id| self.store.declaration(type_id))
                .map(|type_decl| type_decl.module.clone()),
            _ => None,
        };

        let target_module = target_module?;
        let candidates = self
            .module_level
            .get(&target_module)
            .cloned()
            .unwrap_or_default();
        let target = self.pick(candidates, &name.name, use_ctx).filter(|id| {
            self.store
                .declaration(*id)
                .is_some_and(|decl| {
                    target_module == *ctx.module || self.is_externally_visible(decl)
                })
        });
        if let Some(target) = target {
            self.push_reference(target, name.span, name.selection, ctx, use_ctx);
        }
        target
    }

    fn bind_type_ref(&mut self, type_ref: &TypeRef, ctx: &BindCtx<'_>) -> Option<DeclarationId> {
        let name = type_ref.name();
        let resolved = match type_ref.qualifier() {
            Some(qualifier) => {
                let project_key = qualifier.name.to_ascii_lowercase();
                self.pick(
                    self.public_by_project
                        .get(&project_key)
                        .cloned()
                        .unwrap_or_default(),
                    &name.name,
                    UseContext::Type,
                )
                .or_else(|| {
                    // A qualified type may name a class module directly.
                    self.module_decls
                        .iter()
                        .find(|(qmn, _)| {
                            qmn.project.eq_ignore_ascii_case(&qualifier.name)
                                && qmn.module.eq_ignore_ascii_case(&name.name)
                        })
                        .map(|(_, id)| *id)
                })
            }
            None => self.resolve_name(&name.name, ctx, UseContext::Type),
        };
        if let Some(id) = resolved {
            self.push_reference(id, name.span, name.selection, ctx, UseContext::Type);
        }
        resolved
    }

    /// Resolve a type name string (`Class1` or `Other.Class1`) without
    /// recording a reference. Used for instance-member resolution.
    fn lookup_type_by_name(
        &self,
        type_name: &str,
        from: &QualifiedModuleName,
    ) -> Option<DeclarationId> {
        let mut parts = type_name.rsplitn(2, '.');
        let name = parts.next()?;
        let qualifier = parts.next();
        match qualifier {
            Some(project) => {
                let key = project.to_ascii_lowercase();
                self.module_decls
                    .iter()
                    .find(|(qmn, _)| {
                        qmn.project.to_ascii_lowercase() == key
                            && qmn.module.eq_ignore_ascii_case(name)
                    })
                    .map(|(_, id)| *id)
                    .or_else(|| {
                        self.pick(
                            self.public_by_project.get(&key).cloned().unwrap_or_default(),
                            name,
                            UseContext::Type,
                        )
                    })
            }
            None => self.resolve_name_from_module(name, from, UseContext::Type),
        }
    }

    fn push_reference(
        &mut self,
        declaration: DeclarationId,
        span: Span,
        selection: Selection,
        ctx: &BindCtx<'_>,
        use_ctx: UseContext,
    ) {
        let id = self.store.next_reference_id();
        self.store.insert_reference(Reference {
            id,
            declaration,
            module: ctx.module.clone(),
            scope: ctx.scope.clone(),
            selection,
            span,
            kind: use_ctx.reference_kind(),
        });
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    /// Fixed-order lookup: procedure locals, module scope, same-project
    /// public scope, referenced projects. First match wins.
    fn resolve_name(
        &self,
        name: &str,
        ctx: &BindCtx<'_>,
        use_ctx: UseContext,
    ) -> Option<DeclarationId> {
        let key = name.to_ascii_lowercase();

        // Tier 1: locals and parameters of the enclosing procedure, plus the
        // procedure's own name (function-return assignment).
        if let Some(locals) = ctx.locals {
            if let Some(id) = locals.get(&key) {
                return Some(*id);
            }
        }
        if let Some((proc_id, proc_name)) = &ctx.proc {
            if proc_name.eq_ignore_ascii_case(name) {
                return Some(*proc_id);
            }
        }

        self.resolve_name_from_module(name, ctx.module, use_ctx)
    }

    fn resolve_name_from_module(
        &self,
        name: &str,
        module: &QualifiedModuleName,
        use_ctx: UseContext,
    ) -> Option<DeclarationId> {
        // Tier 2: module scope of the declaring module.
        if let Some(candidates) = self.module_level.get(module) {
            if let Some(id) = self.pick(candidates.clone(), name, use_ctx) {
                return Some(id);
            }
        }

        // Tier 3: public scope of other modules in the same project.
        let project_key = module.project.to_ascii_lowercase();
        if let Some(candidates) = self.public_by_project.get(&project_key) {
            let same_project: Vec<DeclarationId> = candidates
                .iter()
                .filter(|id| {
                    self.store
                        .declaration(**id)
                        .is_some_and(|decl| decl.module != *module)
                })
                .copied()
                .collect();
            if let Some(id) = self.pick(same_project, name, use_ctx) {
                return Some(id);
            }
        }
        // Class modules of the same project are addressable as types.
        if use_ctx == UseContext::Type {
            if let Some(id) = self.find_class_module(&project_key, name) {
                return Some(id);
            }
        }

        // Tier 4: referenced projects' public scope, in first-seen order.
        for other_key in &self.project_order {
            if *other_key == project_key {
                continue;
            }
            if let Some(candidates) = self.public_by_project.get(other_key) {
                if let Some(id) = self.pick(candidates.clone(), name, use_ctx) {
                    return Some(id);
                }
            }
            if use_ctx == UseContext::Type {
                if let Some(id) = self.find_class_module(other_key, name) {
                    return Some(id);
                }
            }
        }

        None
    }

    /// Find a module declaration by bare name, preferring the given project.
    fn find_module_decl(
        &self,
        name: &str,
        prefer_project: &str,
    ) -> Option<(QualifiedModuleName, DeclarationId)> {
        let mut fallback = None;
        for (qmn, id) in &self.module_decls {
            if !qmn.module.eq_ignore_ascii_case(name) {
                continue;
            }
            if qmn.project.eq_ignore_ascii_case(prefer_project) {
                return Some((qmn.clone(), *id));
            }
            if fallback.is_none() {
                fallback = Some((qmn.clone(), *id));
            }
        }
        fallback
    }

    fn find_class_module(&self, project_key: &str, name: &str) -> Option<DeclarationId> {
        self.module_decls
            .iter()
            .filter(|(qmn, _)| qmn.project.to_ascii_lowercase() == *project_key)
            .filter(|(qmn, _)| qmn.module.eq_ignore_ascii_case(name))
            .find_map(|(_, id)| {
                self.store.declaration(*id).and_then(|decl| {
                    matches!(
                        decl.kind,
                        DeclarationKind::Module(ModuleKind::Class)
                            | DeclarationKind::Module(ModuleKind::Interface)
                    )
                    .then_some(*id)
                })
            })
    }

    /// Pick the best candidate by kind rank, preserving declaration order
    /// among equally ranked candidates.
    fn pick(
        &self,
        candidates: Vec<DeclarationId>,
        name: &str,
        use_ctx: UseContext,
    ) -> Option<DeclarationId> {
        let mut best: Option<(u8, DeclarationId)> = None;
        for id in candidates {
            let Some(decl) = self.store.declaration(id) else {
                continue;
            };
            if !decl.name.eq_ignore_ascii_case(name) {
                continue;
            }
            let Some(rank) = use_ctx.rank(decl.kind) else {
                continue;
            };
            match best {
                Some((best_rank, _)) if best_rank <= rank => {}
                _ => best = Some((rank, id)),
            }
            if rank == 0 {
                break;
            }
        }
        best.map(|(_, id)| id)
    }

    fn find_procedure_id(
        &self,
        module: &QualifiedModuleName,
        name: &str,
    ) -> Option<DeclarationId> {
        self.store
            .declarations_in_module(module)
            .find(|decl| decl.kind.is_procedural() && decl.name.eq_ignore_ascii_case(name))
            .map(|decl| decl.id)
    }
}

fn type_ref_name(type_ref: &TypeRef) -> String {
    type_ref
        .segments
        .iter()
        .map(|segment| segment.name.as_str())
        .collect::<Vec<_>>()
        .join(".")
}
