// Stage 2: type elaboration, trait resolution and overload selection.
//
// Expressions are typed bottom-up while an expected type flows top-down:
// the expected type disambiguates multi-impl attribute lookups and decides
// when a return must be wrapped for dynamic dispatch. Call sites record
// the resolved callee, the type substitution and the dispatch mode for the
// emitter. When a generic callee is fully ground at a static call site,
// its body is re-entered once per binding to validate the specialization.

use crate::annotations::{Annotations, CallInfo, ReturnWrap};
use crate::binder::{BindError, TypeBinder};
use crate::scope::{ScopeId, ScopeManager, Symbol, TypeLookup, TypeSymbol};
use crate::trait_impls::TraitImpls;
use crate::types::{
    bind_function_ref, bind_type, resolve_type_binds, type_key, Binds, Definitions, FnId,
    FunctionRef, ResolvedFunction, Type, TypeRef,
};
use fen_ast as ast;
use fen_diagnostics::{suggest, CompileError, ErrorKind};
use std::collections::HashSet;

/// What an expression resolved to: a value, a single callable, or an
/// attribute that matched several impls and awaits disambiguation.
#[derive(Debug, Clone)]
enum Checked {
    Value(Type),
    Func(ResolvedFunction),
    Multi(Vec<ResolvedFunction>, Type),
}

#[derive(Clone)]
struct CallOutcome {
    binds: Binds,
    ret: Type,
    boxed: Vec<bool>,
}

fn err(kind: ErrorKind, message: impl Into<String>, span: ast::Span) -> CompileError {
    CompileError::new(kind, message, span.start..span.end)
}

fn bind_err(e: BindError, span: ast::Span) -> CompileError {
    let kind = match e {
        BindError::Conflict { .. } => ErrorKind::TypeConflict,
        BindError::Constraint { .. } => ErrorKind::ConstraintViolation,
        BindError::Mismatch { .. } => ErrorKind::TypeMismatch,
        BindError::EmptyQuery => ErrorKind::Internal,
    };
    err(kind, e.to_string(), span)
}

pub struct TypeCheckVisitor<'a> {
    scopes: &'a mut ScopeManager,
    trait_impls: &'a TraitImpls,
    defs: &'a Definitions,
    ann: &'a mut Annotations,
    /// expected type of the expression being checked, innermost last
    expect: Vec<Type>,
    /// substitutions accumulated by outer call sites, used while
    /// re-entering a body in specialized mode
    ctx_binds: Binds,
    /// declared return type of the enclosing function
    current_return: Vec<Type>,
    /// non-zero while validating a specialization: compute types, but do
    /// not overwrite the generic-form annotations
    quiet: usize,
    /// specializations already queued or validated, keyed by function and
    /// binding
    specialized: HashSet<(FnId, String)>,
    /// ground specializations discovered at call sites; validated after
    /// the whole program has been checked in generic form, so every body
    /// scope is fully populated before it is re-entered
    pending: Vec<(FnId, FunctionRef, Binds)>,
}

impl<'a> TypeCheckVisitor<'a> {
    pub fn new(
        scopes: &'a mut ScopeManager,
        trait_impls: &'a TraitImpls,
        defs: &'a Definitions,
        ann: &'a mut Annotations,
    ) -> Self {
        Self {
            scopes,
            trait_impls,
            defs,
            ann,
            expect: Vec::new(),
            ctx_binds: Binds::new(),
            current_return: Vec::new(),
            quiet: 0,
            specialized: HashSet::new(),
            pending: Vec::new(),
        }
    }

    pub fn run(&mut self, program: &ast::Program) -> Result<(), CompileError> {
        for decl in &program.decls {
            match decl {
                ast::TopLevel::Item(ast::Item::Struct(def)) => self.check_struct_item(def)?,
                ast::TopLevel::Item(ast::Item::Trait(def)) => self.check_trait_item(def)?,
                ast::TopLevel::Item(ast::Item::TraitImpl(def)) => self.check_impl_item(def)?,
                ast::TopLevel::Item(ast::Item::Function(def)) => self.check_function_item(def)?,
                ast::TopLevel::Stmt(stmt) => {
                    let scope = self.scopes.global();
                    self.check_stmt(stmt, scope)?;
                }
            }
        }
        // a re-entered body may discover further specializations; the
        // queue drains to a fixed point
        while let Some((fn_id, func, binds)) = self.pending.pop() {
            self.respecialize(fn_id, &func, &binds)?;
        }
        Ok(())
    }

    // ---- items -----------------------------------------------------------

    fn check_struct_item(&mut self, def: &ast::StructDef) -> Result<(), CompileError> {
        let inner = self.item_scope(def.id, def.span)?;
        for param in &def.type_params {
            self.validate_bounds(param, inner)?;
        }
        for field in &def.fields {
            self.resolve_ast_type(&field.ty, inner)?;
        }

        // parametric field types must satisfy the constraints of the
        // definition they instantiate
        let Some(TypeLookup::Type(TypeSymbol::Struct { def: sid, .. })) =
            self.scopes.lookup_type(inner, &def.name)
        else {
            return Err(err(ErrorKind::Internal, "struct symbol missing", def.span));
        };
        let data = self.defs.structs[*sid].clone();
        for ((_, field_ty), field_ast) in data.fields.iter().zip(&def.fields) {
            self.validate_instantiation(field_ty, inner, field_ast.span)?;
        }
        Ok(())
    }

    fn validate_instantiation(
        &self,
        ty: &Type,
        scope: ScopeId,
        span: ast::Span,
    ) -> Result<(), CompileError> {
        let Type::Ref(r) = ty else { return Ok(()) };
        if r.parameters.is_empty() {
            return Ok(());
        }
        if let Some(TypeLookup::Type(TypeSymbol::Struct { def: sid, .. })) =
            self.scopes.lookup_type(scope, &r.name)
        {
            let data = &self.defs.structs[*sid];
            for (given, declared) in r.parameters.iter().zip(&data.parameters) {
                for constraint in &declared.constraints {
                    if !self.trait_impls.satisfies(given, constraint) {
                        return Err(err(
                            ErrorKind::ConstraintViolation,
                            format!(
                                "type `{}` does not satisfy constraint `{}` of `{}`",
                                given, constraint, r.name
                            ),
                            span,
                        ));
                    }
                }
            }
        }
        for param in &r.parameters {
            self.validate_instantiation(param, scope, span)?;
        }
        Ok(())
    }

    fn check_trait_item(&mut self, def: &ast::TraitDef) -> Result<(), CompileError> {
        let inner = self.item_scope(def.id, def.span)?;
        for param in &def.type_params {
            self.validate_bounds(param, inner)?;
        }
        for function in &def.functions {
            for param in &function.params {
                self.validate_signature_type(&param.ty, inner)?;
            }
            if let Some(ret) = &function.return_type {
                self.validate_signature_type(ret, inner)?;
            }
        }
        Ok(())
    }

    /// Validate a type as written in a function signature, where the
    /// `impl Trait` sugar is legal.
    fn validate_signature_type(
        &self,
        node: &ast::TypeNode,
        scope: ScopeId,
    ) -> Result<(), CompileError> {
        match node {
            ast::TypeNode::ImplTrait { bounds, .. } => {
                for bound in bounds {
                    self.validate_bound(bound, scope)?;
                }
                Ok(())
            }
            other => self.resolve_ast_type(other, scope).map(|_| ()),
        }
    }

    fn check_function_item(&mut self, def: &ast::FunctionDef) -> Result<(), CompileError> {
        let scope = self.node_scope(def.id, def.span)?;
        let Some(Symbol::Function { func, .. }) = self.scopes.lookup_var(scope, &def.name) else {
            return Err(err(ErrorKind::Internal, "function symbol missing", def.span));
        };
        let func = func.clone();
        let fn_id = func
            .ast
            .ok_or_else(|| err(ErrorKind::Internal, "function body missing", def.span))?;
        self.check_function_body(def, &func, fn_id)
    }

    /// Install argument symbols, validate the signature's annotations, and
    /// check the body against the declared return type.
    fn check_function_body(
        &mut self,
        def: &ast::FunctionDef,
        func: &FunctionRef,
        fn_id: FnId,
    ) -> Result<(), CompileError> {
        let body_scope = self.fn_scope(fn_id, def.span)?;
        for param in &def.type_params {
            self.validate_bounds(param, body_scope)?;
        }
        for param in &def.params {
            self.validate_signature_type(&param.ty, body_scope)?;
        }
        if let Some(ret) = &def.return_type {
            self.validate_signature_type(ret, body_scope)?;
        }

        for (param, ty) in def.params.iter().zip(&func.args) {
            self.scopes
                .add_var(
                    body_scope,
                    Symbol::Var {
                        name: param.name.clone(),
                        ty: ty.clone(),
                    },
                )
                .map_err(|m| err(ErrorKind::DuplicateDefinition, m, param.span))?;
        }

        self.current_return.push(func.return_type.clone());
        let result: Result<(), CompileError> = def
            .body
            .stmts
            .iter()
            .try_for_each(|stmt| self.check_stmt(stmt, body_scope));
        self.current_return.pop();
        result
    }

    fn check_impl_item(&mut self, def: &ast::TraitImplDef) -> Result<(), CompileError> {
        let inner = self.item_scope(def.id, def.span)?;
        let Some(trait_id) = self.scopes.lookup_trait(inner, &def.trait_name) else {
            return Err(err(
                ErrorKind::UndefinedSymbol,
                format!("trait `{}` is not defined", def.trait_name),
                def.span,
            ));
        };
        let trait_def = self.defs.traits[trait_id].clone();
        if trait_def.parameters.len() != def.trait_args.len() {
            return Err(err(
                ErrorKind::ArityMismatch,
                format!(
                    "trait `{}` expects {} type arguments, got {}",
                    def.trait_name,
                    trait_def.parameters.len(),
                    def.trait_args.len()
                ),
                def.span,
            ));
        }
        for arg in &def.trait_args {
            self.resolve_ast_type(arg, inner)?;
        }
        self.resolve_ast_type(&def.target, inner)?;

        let impl_index = *self
            .ann
            .impl_ids
            .get(&def.id)
            .ok_or_else(|| err(ErrorKind::Internal, "impl not registered", def.span))?;
        let impl_def = self.trait_impls.impl_at(impl_index).clone();

        // the trait's variables as this impl instantiates them
        let mut type_binds = Binds::new();
        for (declared, given) in trait_def.parameters.iter().zip(&impl_def.trait_ref.parameters)
        {
            type_binds.insert(declared.clone(), given.clone());
        }
        type_binds.insert(trait_def.self_var.clone(), impl_def.target_type.clone());

        for (method_ast, method) in def.functions.iter().zip(&impl_def.functions) {
            let Some(declared) = trait_def.function(&method.name) else {
                return Err(err(
                    ErrorKind::UndefinedSymbol,
                    format!(
                        "trait `{}` has no method `{}`",
                        def.trait_name, method.name
                    ),
                    method_ast.span,
                ));
            };
            let expected = bind_function_ref(declared, &type_binds);
            if expected.args.len() != method.args.len() {
                return Err(err(
                    ErrorKind::ArityMismatch,
                    format!(
                        "method `{}` expects {} arguments in trait `{}`, got {}",
                        method.name,
                        expected.args.len(),
                        def.trait_name,
                        method.args.len()
                    ),
                    method_ast.span,
                ));
            }
            let signature_matches = method
                .args
                .iter()
                .zip(&expected.args)
                .all(|(a, b)| crate::types::equal_without_constraint(a, b))
                && crate::types::equal_without_constraint(
                    &method.return_type,
                    &expected.return_type,
                );
            if !signature_matches {
                return Err(err(
                    ErrorKind::TypeMismatch,
                    format!(
                        "signature of `{}` does not match its declaration in trait `{}`",
                        method.name, def.trait_name
                    ),
                    method_ast.span,
                ));
            }

            let fn_id = method
                .ast
                .ok_or_else(|| err(ErrorKind::Internal, "method body missing", method_ast.span))?;
            self.check_function_body(method_ast, method, fn_id)?;
        }
        Ok(())
    }

    fn validate_bounds(&self, param: &ast::TypeParam, scope: ScopeId) -> Result<(), CompileError> {
        for bound in &param.bounds {
            self.validate_bound(bound, scope)?;
        }
        Ok(())
    }

    fn validate_bound(&self, bound: &ast::TraitBound, scope: ScopeId) -> Result<(), CompileError> {
        let Some(trait_id) = self.scopes.lookup_trait(scope, &bound.name) else {
            return Err(err(
                ErrorKind::UndefinedSymbol,
                format!("trait `{}` is not defined", bound.name),
                bound.span,
            ));
        };
        let expected = self.defs.traits[trait_id].parameters.len();
        if expected != bound.args.len() {
            return Err(err(
                ErrorKind::ArityMismatch,
                format!(
                    "trait `{}` expects {} type arguments, got {}",
                    bound.name,
                    expected,
                    bound.args.len()
                ),
                bound.span,
            ));
        }
        for arg in &bound.args {
            self.resolve_ast_type(arg, scope)?;
        }
        Ok(())
    }

    // ---- statements ------------------------------------------------------

    fn check_stmt(&mut self, stmt: &ast::Stmt, scope: ScopeId) -> Result<(), CompileError> {
        match stmt {
            ast::Stmt::Let {
                name,
                ty,
                value,
                span,
                id,
            } => {
                let declared = match ty {
                    Some(node) => Some(self.resolve_ast_type(node, scope)?),
                    None => None,
                };
                if let Some(declared) = &declared {
                    self.expect.push(declared.clone());
                }
                let checked = self.check_expr(value, scope);
                if declared.is_some() {
                    self.expect.pop();
                }
                match checked? {
                    Checked::Value(observed) => {
                        if let Some(declared) = &declared {
                            if declared != &observed {
                                return Err(err(
                                    ErrorKind::TypeMismatch,
                                    format!(
                                        "expected type `{}` but got `{}`",
                                        declared, observed
                                    ),
                                    value.span(),
                                ));
                            }
                        }
                        if self.quiet == 0 {
                            self.scopes
                                .add_var(
                                    scope,
                                    Symbol::Var {
                                        name: name.clone(),
                                        ty: observed,
                                    },
                                )
                                .map_err(|m| err(ErrorKind::DuplicateDefinition, m, *span))?;
                        }
                    }
                    Checked::Func(rf) => {
                        if self.quiet == 0 {
                            self.scopes
                                .add_var(
                                    scope,
                                    Symbol::Function {
                                        name: name.clone(),
                                        func: rf.function,
                                    },
                                )
                                .map_err(|m| err(ErrorKind::DuplicateDefinition, m, *span))?;
                            self.ann.fn_aliases.insert(*id);
                        }
                    }
                    Checked::Multi(..) => {
                        return Err(err(
                            ErrorKind::AmbiguousCall,
                            "cannot bind an overloaded method to a variable",
                            value.span(),
                        ));
                    }
                }
                Ok(())
            }
            ast::Stmt::Assign { name, value, span, .. } => {
                let symbol = self.scopes.lookup_var(scope, name).cloned();
                let var_ty = match symbol {
                    Some(Symbol::Var { ty, .. }) => bind_type(&ty, &self.ctx_binds),
                    Some(Symbol::Placeholder { .. }) | None => {
                        return Err(self.undefined_var(name, scope, *span));
                    }
                    Some(Symbol::Function { .. }) => {
                        return Err(err(
                            ErrorKind::TypeMismatch,
                            format!("`{}` is a function and cannot be assigned", name),
                            *span,
                        ));
                    }
                };
                self.expect.push(var_ty.clone());
                let checked = self.check_expr(value, scope);
                self.expect.pop();
                let Checked::Value(observed) = checked? else {
                    return Err(err(
                        ErrorKind::TypeMismatch,
                        "right-hand side of assignment is not a value",
                        value.span(),
                    ));
                };
                if var_ty != observed {
                    return Err(err(
                        ErrorKind::TypeMismatch,
                        format!("expected type `{}` but got `{}`", var_ty, observed),
                        value.span(),
                    ));
                }
                Ok(())
            }
            ast::Stmt::Expr(expr) => {
                self.check_expr(expr, scope)?;
                Ok(())
            }
            ast::Stmt::If {
                branches,
                else_block,
                ..
            } => {
                for (cond, body) in branches {
                    self.check_condition(cond, scope)?;
                    self.check_block(body)?;
                }
                if let Some(body) = else_block {
                    self.check_block(body)?;
                }
                Ok(())
            }
            ast::Stmt::While { cond, body, .. } => {
                self.check_condition(cond, scope)?;
                self.check_block(body)
            }
            ast::Stmt::Return { value, span, id } => self.check_return(value.as_ref(), *span, *id, scope),
            ast::Stmt::Break { .. } | ast::Stmt::Continue { .. } => Ok(()),
        }
    }

    fn check_block(&mut self, block: &ast::Block) -> Result<(), CompileError> {
        let scope = self.node_scope(block.id, block.span)?;
        block
            .stmts
            .iter()
            .try_for_each(|stmt| self.check_stmt(stmt, scope))
    }

    fn check_condition(&mut self, cond: &ast::Expr, scope: ScopeId) -> Result<(), CompileError> {
        self.expect.push(Type::named("Bool"));
        let checked = self.check_expr(cond, scope);
        self.expect.pop();
        let Checked::Value(ty) = checked? else {
            return Err(err(
                ErrorKind::TypeMismatch,
                "condition is not a value",
                cond.span(),
            ));
        };
        if ty != Type::named("Bool") {
            return Err(err(
                ErrorKind::TypeMismatch,
                format!("expected type `Bool` but got `{}`", ty),
                cond.span(),
            ));
        }
        Ok(())
    }

    fn check_return(
        &mut self,
        value: Option<&ast::Expr>,
        span: ast::Span,
        id: ast::NodeId,
        scope: ScopeId,
    ) -> Result<(), CompileError> {
        let declared = self
            .current_return
            .last()
            .cloned()
            .ok_or_else(|| err(ErrorKind::Internal, "return outside any function", span))?;
        let declared_ctx = bind_type(&declared, &self.ctx_binds);

        self.expect.push(declared_ctx.clone());
        let checked = match value {
            Some(expr) => self.check_expr(expr, scope),
            None => Ok(Checked::Value(Type::named("Unit"))),
        };
        self.expect.pop();
        let Checked::Value(observed) = checked? else {
            return Err(err(
                ErrorKind::TypeMismatch,
                "returned expression is not a value",
                span,
            ));
        };

        // an `impl Trait` return with a concrete body type: the value is
        // wrapped and its trait methods go into the method table
        if let Type::Var(var) = &declared {
            if var.opaque && !observed.is_var() {
                if !self.trait_impls.is_type_match(&observed, &declared) {
                    let detail = var
                        .constraints
                        .iter()
                        .map(|c| c.to_string())
                        .collect::<Vec<_>>()
                        .join(" + ");
                    return Err(err(
                        ErrorKind::ConstraintViolation,
                        format!("type `{}` does not implement `{}`", observed, detail),
                        span,
                    ));
                }
                if self.quiet == 0 {
                    self.ann.returns.insert(
                        id,
                        ReturnWrap {
                            constraints: var.constraints.clone(),
                        },
                    );
                }
                return Ok(());
            }
        }

        self.validate_return(&observed, &declared_ctx, span)
    }

    fn validate_return(
        &self,
        observed: &Type,
        declared: &Type,
        span: ast::Span,
    ) -> Result<(), CompileError> {
        let ok = match declared {
            Type::Var(var) if var.opaque => self.trait_impls.is_type_match(observed, declared),
            Type::Var(_) => observed == declared,
            Type::Ref(_) => {
                declared.name().eq_ignore_ascii_case("any")
                    || observed.name().eq_ignore_ascii_case("any")
                    || self.trait_impls.is_type_match(observed, declared)
            }
        };
        if ok {
            Ok(())
        } else {
            Err(err(
                ErrorKind::TypeMismatch,
                format!(
                    "expected return type `{}` but got `{}`",
                    declared, observed
                ),
                span,
            ))
        }
    }

    // ---- expressions -----------------------------------------------------

    fn check_expr(&mut self, expr: &ast::Expr, scope: ScopeId) -> Result<Checked, CompileError> {
        let checked = self.check_expr_inner(expr, scope)?;
        if self.quiet == 0 {
            if let Checked::Value(ty) = &checked {
                self.ann.expr_types.insert(expr.id(), ty.clone());
            }
        }
        Ok(checked)
    }

    fn check_expr_inner(
        &mut self,
        expr: &ast::Expr,
        scope: ScopeId,
    ) -> Result<Checked, CompileError> {
        match expr {
            ast::Expr::Literal { kind, .. } => {
                let name = match kind {
                    ast::LitKind::Int(_) => "Int",
                    ast::LitKind::Float(_) => "Float",
                    ast::LitKind::Str(_) => "String",
                    ast::LitKind::Bool(_) => "Bool",
                };
                Ok(Checked::Value(Type::named(name)))
            }
            ast::Expr::Var { name, span, .. } => match self.scopes.lookup_var(scope, name) {
                Some(Symbol::Var { ty, .. }) => {
                    Ok(Checked::Value(bind_type(&ty.clone(), &self.ctx_binds)))
                }
                Some(Symbol::Function { func, .. }) => Ok(Checked::Func(ResolvedFunction {
                    function: func.clone(),
                    source_type: None,
                    binds: Binds::new(),
                })),
                Some(Symbol::Placeholder { .. }) => Err(err(
                    ErrorKind::UndefinedSymbol,
                    format!("`{}` is used before it is initialized", name),
                    *span,
                )),
                None => Err(self.undefined_var(name, scope, *span)),
            },
            ast::Expr::Attr {
                object,
                name,
                span,
                ..
            } => self.check_attr(object, name, *span, scope),
            ast::Expr::Call {
                source,
                args,
                span,
                id,
            } => self.check_call(source, args, *span, *id, scope),
            ast::Expr::Binary { op, lhs, rhs, span, id } => {
                self.check_binary(*op, lhs, rhs, *span, *id, scope)
            }
            ast::Expr::StructInit {
                name,
                fields,
                span,
                id,
            } => self.check_struct_init(name, fields, *span, *id, scope),
        }
    }

    fn check_binary(
        &mut self,
        op: ast::BinOp,
        lhs: &ast::Expr,
        rhs: &ast::Expr,
        span: ast::Span,
        id: ast::NodeId,
        scope: ScopeId,
    ) -> Result<Checked, CompileError> {
        // every operator is sugar for a call; the rewrite is built once
        // and shared by re-checks and by emission
        if !self.ann.desugars.contains_key(&id) {
            let desugared = match op {
                ast::BinOp::And | ast::BinOp::Or => {
                    let name = if op == ast::BinOp::And {
                        "logic_and"
                    } else {
                        "logic_or"
                    };
                    ast::Expr::Call {
                        source: Box::new(ast::Expr::Var {
                            name: name.to_string(),
                            span,
                            id: ast::NodeId::fresh(),
                        }),
                        args: vec![lhs.clone(), rhs.clone()],
                        span,
                        id: ast::NodeId::fresh(),
                    }
                }
                _ => {
                    let method = match op {
                        ast::BinOp::Add => "add",
                        ast::BinOp::Sub => "sub",
                        ast::BinOp::Mul => "mul",
                        ast::BinOp::Div => "div",
                        ast::BinOp::Lt => "lt",
                        ast::BinOp::Gt => "gt",
                        ast::BinOp::LtEq => "lte",
                        ast::BinOp::GtEq => "gte",
                        ast::BinOp::EqEq => "eq",
                        ast::BinOp::NotEq => "ne",
                        ast::BinOp::And | ast::BinOp::Or => unreachable!(),
                    };
                    ast::Expr::Call {
                        source: Box::new(ast::Expr::Attr {
                            object: Box::new(lhs.clone()),
                            name: method.to_string(),
                            span: lhs.span(),
                            id: ast::NodeId::fresh(),
                        }),
                        args: vec![rhs.clone()],
                        span,
                        id: ast::NodeId::fresh(),
                    }
                }
            };
            self.ann.desugars.insert(id, desugared);
        }
        let desugared = self.ann.desugars[&id].clone();
        self.record_scopes(&desugared, scope);
        self.check_expr(&desugared, scope)
    }

    /// Synthesized nodes live in the scope of the expression they replace.
    fn record_scopes(&mut self, expr: &ast::Expr, scope: ScopeId) {
        self.ann.node_scopes.insert(expr.id(), scope);
        match expr {
            ast::Expr::Literal { .. } | ast::Expr::Var { .. } => {}
            ast::Expr::Binary { lhs, rhs, .. } => {
                self.record_scopes(lhs, scope);
                self.record_scopes(rhs, scope);
            }
            ast::Expr::Attr { object, .. } => self.record_scopes(object, scope),
            ast::Expr::Call { source, args, .. } => {
                self.record_scopes(source, scope);
                for arg in args {
                    self.record_scopes(arg, scope);
                }
            }
            ast::Expr::StructInit { fields, .. } => {
                for (_, value) in fields {
                    self.record_scopes(value, scope);
                }
            }
        }
    }

    fn check_attr(
        &mut self,
        object: &ast::Expr,
        name: &str,
        span: ast::Span,
        scope: ScopeId,
    ) -> Result<Checked, CompileError> {
        let Checked::Value(object_ty) = self.check_expr(object, scope)? else {
            return Err(err(
                ErrorKind::UnresolvedAttribute,
                format!("`{}` accessed on something that is not a value", name),
                span,
            ));
        };
        let object_ty = bind_type(&object_ty, &self.ctx_binds);

        if let Type::Var(var) = &object_ty {
            if var.constraints.is_empty() {
                return Err(err(
                    ErrorKind::UnresolvedAttribute,
                    format!(
                        "`{}` is not available on an unconstrained generic type",
                        name
                    ),
                    span,
                ));
            }
            let mut candidates = Vec::new();
            for constraint in &var.constraints {
                let Some(trait_id) = self.scopes.lookup_trait(scope, &constraint.name) else {
                    return Err(err(
                        ErrorKind::UndefinedSymbol,
                        format!("trait `{}` is not defined", constraint.name),
                        span,
                    ));
                };
                let trait_def = &self.defs.traits[trait_id];
                let mut binds = Binds::new();
                for (declared, given) in trait_def.parameters.iter().zip(&constraint.parameters)
                {
                    binds.insert(declared.clone(), given.clone());
                }
                if let Some(func) = trait_def.function(name) {
                    let mut bound = bind_function_ref(func, &binds);
                    bound.association_trait = Some(constraint.clone());
                    bound.association_type = Some(object_ty.clone());
                    candidates.push(ResolvedFunction {
                        function: bound,
                        source_type: Some(object_ty.clone()),
                        binds,
                    });
                }
            }
            return self.attr_candidates(candidates, object_ty, name, span);
        }

        // concrete receiver: a struct field wins, then impl methods
        let object_ty = self.de_ref(object_ty, scope, span)?;
        if let Type::Ref(r) = &object_ty {
            if let Some(sid) = r.struct_ref {
                let data = &self.defs.structs[sid];
                if let Some(field_ty) = data.field(name) {
                    let mut binds = Binds::new();
                    for (declared, given) in data.parameters.iter().zip(&r.parameters) {
                        binds.insert(declared.clone(), given.clone());
                    }
                    let field_ty = bind_type(field_ty, &binds);
                    let field_ty = self.de_ref(field_ty, scope, span)?;
                    return Ok(Checked::Value(field_ty));
                }
            }
        }

        let mut candidates = Vec::new();
        for impl_def in self.trait_impls.get_impl_by_type(&object_ty) {
            if let Some(func) = impl_def.function(name) {
                candidates.push(ResolvedFunction {
                    function: func.clone(),
                    source_type: Some(object_ty.clone()),
                    binds: impl_def.binds.clone(),
                });
            }
        }
        self.attr_candidates(candidates, object_ty, name, span)
    }

    fn attr_candidates(
        &self,
        candidates: Vec<ResolvedFunction>,
        source_type: Type,
        name: &str,
        span: ast::Span,
    ) -> Result<Checked, CompileError> {
        match candidates.len() {
            0 => Err(err(
                ErrorKind::UnresolvedAttribute,
                format!(
                    "attribute `{}` is not defined for type `{}`",
                    name, source_type
                ),
                span,
            )),
            1 => Ok(Checked::Func(
                candidates.into_iter().next().unwrap_or_else(|| unreachable!()),
            )),
            _ => Ok(Checked::Multi(candidates, source_type)),
        }
    }

    fn check_call(
        &mut self,
        source: &ast::Expr,
        args: &[ast::Expr],
        span: ast::Span,
        id: ast::NodeId,
        scope: ScopeId,
    ) -> Result<Checked, CompileError> {
        match self.check_expr(source, scope)? {
            Checked::Value(ty) => Err(err(
                ErrorKind::TypeMismatch,
                format!("expression of type `{}` is not callable", ty),
                source.span(),
            )),
            Checked::Func(rf) => {
                let outcome = self.resolve_call_args(args, &rf, span, scope)?;
                self.finalize_call(rf, outcome, id, scope)
            }
            Checked::Multi(candidates, source_type) => {
                let total = candidates.len();
                let mut survivors = Vec::new();
                for candidate in candidates {
                    self.quiet += 1;
                    let attempt = self.resolve_call_args(args, &candidate, span, scope);
                    self.quiet -= 1;
                    if let Ok(outcome) = attempt {
                        survivors.push((candidate, outcome));
                    }
                }
                if let Some(expected) = self.expect.last().cloned() {
                    if !expected.is_var() && !expected.name().eq_ignore_ascii_case("any") {
                        let filtered: Vec<_> = survivors
                            .iter()
                            .filter(|(_, outcome)| outcome.ret == expected)
                            .cloned()
                            .collect();
                        if !filtered.is_empty() {
                            survivors = filtered;
                        }
                    }
                }
                let dyn_dispatch = source_type.is_var();
                if survivors.len() > 1 && dyn_dispatch {
                    let first_trait = survivors[0].0.function.association_trait.clone();
                    if survivors
                        .iter()
                        .all(|(c, _)| c.function.association_trait == first_trait)
                    {
                        survivors.truncate(1);
                    }
                }
                match survivors.len() {
                    0 => Err(err(
                        ErrorKind::TypeMismatch,
                        format!("no overload matches this call ({} candidates tried)", total),
                        span,
                    )),
                    1 => {
                        let (candidate, _) = survivors
                            .into_iter()
                            .next()
                            .unwrap_or_else(|| unreachable!());
                        // re-run the winner so argument annotations persist
                        let outcome = self.resolve_call_args(args, &candidate, span, scope)?;
                        self.finalize_call(candidate, outcome, id, scope)
                    }
                    _ => Err(err(
                        ErrorKind::AmbiguousCall,
                        format!(
                            "{} overloads match this call and the expected type does not \
                             disambiguate them",
                            survivors.len()
                        ),
                        span,
                    )),
                }
            }
        }
    }

    fn resolve_call_args(
        &mut self,
        args: &[ast::Expr],
        rf: &ResolvedFunction,
        span: ast::Span,
        scope: ScopeId,
    ) -> Result<CallOutcome, CompileError> {
        if rf.function.args.len() != args.len() {
            return Err(err(
                ErrorKind::ArityMismatch,
                format!(
                    "`{}` expects {} arguments, got {}",
                    rf.function.name,
                    rf.function.args.len(),
                    args.len()
                ),
                span,
            ));
        }
        let mut binder = TypeBinder::new(self.trait_impls);
        let mut boxed = Vec::with_capacity(args.len());
        for (arg, declared) in args.iter().zip(&rf.function.args) {
            let substituted = binder.bind(&bind_type(declared, &self.ctx_binds));
            self.expect.push(substituted);
            let checked = self.check_expr(arg, scope);
            self.expect.pop();
            let Checked::Value(observed) = checked? else {
                return Err(err(
                    ErrorKind::TypeMismatch,
                    "argument is not a value",
                    arg.span(),
                ));
            };
            binder
                .resolve(declared, &observed)
                .map_err(|e| bind_err(e, arg.span()))?;
            boxed.push(declared.is_var() && observed.is_primitive());
        }
        let ret = binder.bind(&rf.function.return_type);
        let ret = self.de_ref(ret, scope, span)?;
        Ok(CallOutcome {
            binds: binder.into_binds(),
            ret,
            boxed,
        })
    }

    fn finalize_call(
        &mut self,
        rf: ResolvedFunction,
        outcome: CallOutcome,
        id: ast::NodeId,
        _scope: ScopeId,
    ) -> Result<Checked, CompileError> {
        let dyn_dispatch = rf
            .source_type
            .as_ref()
            .map_or(false, |t| t.is_var());

        let composed = resolve_type_binds(&outcome.binds, &self.ctx_binds);
        if !rf.function.type_parameters.is_empty() && !dyn_dispatch {
            if let Some(fn_id) = rf.function.ast {
                let ground = composed.values().all(|t| !t.is_var());
                if ground && self.mark_specialized(fn_id, &rf.function, &composed) {
                    self.pending
                        .push((fn_id, rf.function.clone(), composed.clone()));
                }
            }
        }

        if self.quiet == 0 {
            // the candidate's own binding (from its impl) plus this call's
            let mut binds = rf.binds.clone();
            binds.extend(outcome.binds.clone());
            self.ann.calls.insert(
                id,
                CallInfo {
                    callee: bind_function_ref(&rf.function, &outcome.binds),
                    origin: rf.function.clone(),
                    binds,
                    dyn_dispatch,
                    boxed_args: outcome.boxed,
                },
            );
        }
        Ok(Checked::Value(outcome.ret))
    }

    /// Record a (function, binding) pair; true if it was not seen before.
    fn mark_specialized(&mut self, fn_id: FnId, func: &FunctionRef, binds: &Binds) -> bool {
        let mut key = String::new();
        for param in &func.type_parameters {
            let bound = binds
                .get(param)
                .cloned()
                .unwrap_or_else(|| Type::Var(param.clone()));
            key.push_str(&type_key(&bound));
            key.push('/');
        }
        self.specialized.insert((fn_id, key))
    }

    /// Re-enter a generic function's body under a ground binding to
    /// validate the specialization. Runs once per (function, binding) and
    /// never overwrites the generic-form annotations.
    fn respecialize(
        &mut self,
        fn_id: FnId,
        func: &FunctionRef,
        binds: &Binds,
    ) -> Result<(), CompileError> {
        log::debug!(
            "validating specialization of `{}` at {} binding(s)",
            func.name,
            binds.len()
        );

        let def = self.defs.fn_asts[fn_id].clone();
        let body_scope = self
            .ann
            .fn_scopes
            .get(&fn_id)
            .copied()
            .ok_or_else(|| err(ErrorKind::Internal, "missing function scope", def.span))?;

        let mut saved: Vec<(String, Option<Symbol>)> = Vec::new();
        for (param, declared) in def.params.iter().zip(&func.args) {
            let old = self.scopes.replace_var(
                body_scope,
                Symbol::Var {
                    name: param.name.clone(),
                    ty: bind_type(declared, binds),
                },
            );
            saved.push((param.name.clone(), old));
        }

        self.quiet += 1;
        let old_ctx = std::mem::replace(&mut self.ctx_binds, binds.clone());
        self.current_return
            .push(bind_type(&func.return_type, binds));
        let result: Result<(), CompileError> = def
            .body
            .stmts
            .iter()
            .try_for_each(|stmt| self.check_stmt(stmt, body_scope));
        self.current_return.pop();
        self.ctx_binds = old_ctx;
        self.quiet -= 1;

        for (name, old) in saved {
            match old {
                Some(symbol) => {
                    self.scopes.replace_var(body_scope, symbol);
                }
                None => {
                    self.scopes.remove_var(body_scope, &name);
                }
            }
        }
        result
    }

    fn check_struct_init(
        &mut self,
        name: &str,
        fields: &[(String, ast::Expr)],
        span: ast::Span,
        id: ast::NodeId,
        scope: ScopeId,
    ) -> Result<Checked, CompileError> {
        let sid = match self.scopes.lookup_type(scope, name) {
            Some(TypeLookup::Type(TypeSymbol::Struct { def, .. })) => *def,
            Some(_) => {
                return Err(err(
                    ErrorKind::TypeMismatch,
                    format!("type `{}` is not a struct", name),
                    span,
                ));
            }
            None => {
                return Err(err(
                    ErrorKind::UndefinedSymbol,
                    format!("type `{}` is not defined", name),
                    span,
                ));
            }
        };
        let data = self.defs.structs[sid].clone();

        let mut binder = TypeBinder::with_binds(self.trait_impls, self.ctx_binds.clone());
        for (field_name, value) in fields {
            let Some(declared) = data.field(field_name) else {
                return Err(err(
                    ErrorKind::UnresolvedAttribute,
                    format!("field `{}` is not defined in type `{}`", field_name, name),
                    value.span(),
                ));
            };
            let substituted = binder.bind(declared);
            self.expect.push(substituted);
            let checked = self.check_expr(value, scope);
            self.expect.pop();
            let Checked::Value(observed) = checked? else {
                return Err(err(
                    ErrorKind::TypeMismatch,
                    "field initializer is not a value",
                    value.span(),
                ));
            };
            binder
                .resolve(declared, &observed)
                .map_err(|e| bind_err(e, value.span()))?;
        }

        let parameters = data
            .parameters
            .iter()
            .map(|v| Type::Var(v.clone()))
            .collect();
        let result = binder.bind(&Type::Ref(TypeRef::parametric(name, parameters)));
        let result = self.de_ref(result, scope, span)?;
        if self.quiet == 0 {
            self.ann.struct_inits.insert(id, result.clone());
        }
        Ok(Checked::Value(result))
    }

    // ---- shared helpers --------------------------------------------------

    /// Resolve a type as written against a scope: names must exist, arity
    /// must match. Generic parameter names resolve to their variables.
    fn resolve_ast_type(
        &self,
        node: &ast::TypeNode,
        scope: ScopeId,
    ) -> Result<Type, CompileError> {
        match node {
            ast::TypeNode::Named { name, args, span } => {
                match self.scopes.lookup_type(scope, name) {
                    None => Err(err(
                        ErrorKind::UndefinedSymbol,
                        format!("type `{}` is not defined", name),
                        *span,
                    )),
                    Some(TypeLookup::Generic(var)) => {
                        if !args.is_empty() {
                            return Err(err(
                                ErrorKind::ArityMismatch,
                                format!("type parameter `{}` takes no type arguments", name),
                                *span,
                            ));
                        }
                        Ok(Type::Var(var.clone()))
                    }
                    Some(TypeLookup::Type(TypeSymbol::Primitive(_))) => {
                        if !args.is_empty() {
                            return Err(err(
                                ErrorKind::ArityMismatch,
                                format!("type `{}` takes no type arguments", name),
                                *span,
                            ));
                        }
                        Ok(Type::named(name))
                    }
                    Some(TypeLookup::Type(TypeSymbol::Alias { ty, .. })) => {
                        if !args.is_empty() {
                            return Err(err(
                                ErrorKind::ArityMismatch,
                                format!("type `{}` takes no type arguments", name),
                                *span,
                            ));
                        }
                        Ok(ty.clone())
                    }
                    Some(TypeLookup::Type(TypeSymbol::Struct { def, .. })) => {
                        let expected = self.defs.structs[*def].parameters.len();
                        if expected != args.len() {
                            return Err(err(
                                ErrorKind::ArityMismatch,
                                format!(
                                    "type `{}` expects {} type arguments, got {}",
                                    name,
                                    expected,
                                    args.len()
                                ),
                                *span,
                            ));
                        }
                        let mut parameters = Vec::with_capacity(args.len());
                        for arg in args {
                            parameters.push(self.resolve_ast_type(arg, scope)?);
                        }
                        Ok(Type::Ref(TypeRef::parametric(name, parameters)))
                    }
                }
            }
            ast::TypeNode::ImplTrait { span, .. } => Err(err(
                ErrorKind::TypeMismatch,
                "`impl Trait` is only allowed in function signatures",
                *span,
            )),
        }
    }

    /// Attach the struct back-pointer to a concrete reference.
    fn de_ref(&self, ty: Type, scope: ScopeId, span: ast::Span) -> Result<Type, CompileError> {
        let Type::Ref(r) = &ty else { return Ok(ty) };
        if ty.is_primitive() || r.struct_ref.is_some() {
            return Ok(ty);
        }
        match self.scopes.lookup_type(scope, &r.name) {
            Some(TypeLookup::Type(TypeSymbol::Struct { def, .. })) => {
                Ok(Type::Ref(TypeRef {
                    name: r.name.clone(),
                    parameters: r.parameters.clone(),
                    struct_ref: Some(*def),
                }))
            }
            Some(_) => Ok(ty),
            None => Err(err(
                ErrorKind::UndefinedSymbol,
                format!("type `{}` is not defined", r.name),
                span,
            )),
        }
    }

    fn undefined_var(&self, name: &str, scope: ScopeId, span: ast::Span) -> CompileError {
        let names = self.scopes.visible_var_names(scope);
        let mut message = format!("`{}` is not defined", name);
        if let Some(candidate) = suggest(name, names.iter().map(|s| s.as_str())) {
            message.push_str(&format!(" (did you mean `{}`?)", candidate));
        }
        err(ErrorKind::UndefinedSymbol, message, span)
    }

    fn node_scope(&self, id: ast::NodeId, span: ast::Span) -> Result<ScopeId, CompileError> {
        self.ann
            .node_scopes
            .get(&id)
            .copied()
            .ok_or_else(|| err(ErrorKind::Internal, "node has no scope", span))
    }

    fn item_scope(&self, id: ast::NodeId, span: ast::Span) -> Result<ScopeId, CompileError> {
        self.ann
            .item_scopes
            .get(&id)
            .copied()
            .ok_or_else(|| err(ErrorKind::Internal, "item has no inner scope", span))
    }

    fn fn_scope(&self, fn_id: FnId, span: ast::Span) -> Result<ScopeId, CompileError> {
        self.ann
            .fn_scopes
            .get(&fn_id)
            .copied()
            .ok_or_else(|| err(ErrorKind::Internal, "function has no body scope", span))
    }
}

