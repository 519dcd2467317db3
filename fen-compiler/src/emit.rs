// Stage 3: IR emission.
//
// Emission is demand-driven: a function body is compiled the first time a
// call site needs it, under the mangled name of that call's binding. The
// emitted set is memoized by name, so the output is exactly the reachable
// monomorphizations plus the shims populating method tables for dynamic
// receivers.

use crate::annotations::Annotations;
use crate::trait_impls::TraitImpls;
use crate::types::{
    bind_trait_ref, bind_type, resolve_type_binds, specialized_fn_name, trait_fn_name, trait_key,
    type_key, Binds, Definitions, FnId, TraitRef, Type, TypeVar,
};
use fen_ast as ast;
use fen_diagnostics::{CompileError, ErrorKind};
use fen_runtime::{FunctionObject, IrExpr, IrFunction, IrStmt, MetaManager};
use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
struct EmitContext {
    binds: Binds,
    /// Emitting a trait-impl method body: prepend the `self` parameter.
    is_method: bool,
}

fn err(kind: ErrorKind, message: impl Into<String>, span: ast::Span) -> CompileError {
    CompileError::new(kind, message, span.start..span.end)
}

pub struct EmitVisitor<'a> {
    defs: &'a Definitions,
    ann: &'a Annotations,
    trait_impls: &'a TraitImpls,
    metas: &'a mut MetaManager,
    emitted: &'a mut HashSet<String>,
    functions: &'a mut Vec<IrFunction>,
}

impl<'a> EmitVisitor<'a> {
    pub fn new(
        defs: &'a Definitions,
        ann: &'a Annotations,
        trait_impls: &'a TraitImpls,
        metas: &'a mut MetaManager,
        emitted: &'a mut HashSet<String>,
        functions: &'a mut Vec<IrFunction>,
    ) -> Self {
        Self {
            defs,
            ann,
            trait_impls,
            metas,
            emitted,
            functions,
        }
    }

    /// Emit the program body. Declarations emit nothing here: struct metas
    /// are interned at initializer sites and impl methods are compiled
    /// lazily from the call sites that select them.
    pub fn emit_program(&mut self, program: &ast::Program) -> Result<Vec<IrStmt>, CompileError> {
        let ctx = EmitContext::default();
        let mut body = Vec::new();
        for decl in &program.decls {
            if let ast::TopLevel::Stmt(stmt) = decl {
                if let Some(ir) = self.emit_stmt(stmt, &ctx)? {
                    body.push(ir);
                }
            }
        }
        Ok(body)
    }

    fn emit_block(
        &mut self,
        block: &ast::Block,
        ctx: &EmitContext,
    ) -> Result<Vec<IrStmt>, CompileError> {
        let mut out = Vec::new();
        for stmt in &block.stmts {
            if let Some(ir) = self.emit_stmt(stmt, ctx)? {
                out.push(ir);
            }
        }
        Ok(out)
    }

    fn emit_stmt(
        &mut self,
        stmt: &ast::Stmt,
        ctx: &EmitContext,
    ) -> Result<Option<IrStmt>, CompileError> {
        match stmt {
            ast::Stmt::Let { name, value, id, .. } => {
                if self.ann.fn_aliases.contains(id) {
                    // a compile-time alias for a function; nothing to run
                    return Ok(None);
                }
                Ok(Some(IrStmt::Let {
                    name: name.clone(),
                    value: self.emit_expr(value, ctx)?,
                }))
            }
            ast::Stmt::Assign { name, value, .. } => Ok(Some(IrStmt::Assign {
                name: name.clone(),
                value: self.emit_expr(value, ctx)?,
            })),
            ast::Stmt::Expr(expr) => Ok(Some(IrStmt::Expr(self.emit_expr(expr, ctx)?))),
            ast::Stmt::If {
                branches,
                else_block,
                ..
            } => {
                let mut arms = Vec::new();
                for (cond, body) in branches {
                    arms.push((self.emit_expr(cond, ctx)?, self.emit_block(body, ctx)?));
                }
                let else_body = match else_block {
                    Some(body) => Some(self.emit_block(body, ctx)?),
                    None => None,
                };
                Ok(Some(IrStmt::If {
                    branches: arms,
                    else_body,
                }))
            }
            ast::Stmt::While { cond, body, .. } => Ok(Some(IrStmt::While {
                cond: self.emit_expr(cond, ctx)?,
                body: self.emit_block(body, ctx)?,
            })),
            ast::Stmt::Return { value, span, id } => {
                // a dynamic return compiles the concrete type's trait
                // methods so the caller's dispatch will find them
                if let (Some(wrap), Some(value)) = (self.ann.returns.get(id), value.as_ref()) {
                    let observed = self.expr_type(value, ctx, *span)?;
                    let constraints: Vec<TraitRef> = wrap
                        .constraints
                        .iter()
                        .map(|c| bind_trait_ref(c, &ctx.binds))
                        .collect();
                    self.create_dyn_object(&observed, &constraints, &ctx.binds, *span)?;
                }
                let value = match value {
                    Some(expr) => Some(self.emit_expr(expr, ctx)?),
                    None => None,
                };
                Ok(Some(IrStmt::Return(value)))
            }
            ast::Stmt::Break { .. } => Ok(Some(IrStmt::Break)),
            ast::Stmt::Continue { .. } => Ok(Some(IrStmt::Continue)),
        }
    }

    fn emit_expr(&mut self, expr: &ast::Expr, ctx: &EmitContext) -> Result<IrExpr, CompileError> {
        match expr {
            ast::Expr::Literal { kind, .. } => Ok(match kind {
                ast::LitKind::Int(v) => IrExpr::Int(*v),
                ast::LitKind::Float(v) => IrExpr::Float(*v),
                ast::LitKind::Str(v) => IrExpr::Str(v.clone()),
                ast::LitKind::Bool(v) => IrExpr::Bool(*v),
            }),
            ast::Expr::Var { name, .. } => Ok(IrExpr::Var(name.clone())),
            ast::Expr::Binary { id, span, .. } => {
                let desugared = self
                    .ann
                    .desugars
                    .get(id)
                    .cloned()
                    .ok_or_else(|| err(ErrorKind::Internal, "operator not desugared", *span))?;
                self.emit_expr(&desugared, ctx)
            }
            ast::Expr::Attr { object, name, .. } => Ok(IrExpr::Attr {
                object: Box::new(self.emit_expr(object, ctx)?),
                name: name.clone(),
            }),
            ast::Expr::StructInit {
                fields, span, id, ..
            } => {
                let ty = self
                    .ann
                    .struct_inits
                    .get(id)
                    .ok_or_else(|| err(ErrorKind::Internal, "struct init unresolved", *span))?;
                let bound = bind_type(ty, &ctx.binds);
                let key = type_key(&bound);
                self.metas.get_or_create_meta(&key);
                let mut values = Vec::with_capacity(fields.len());
                for (name, value) in fields {
                    values.push((name.clone(), self.emit_expr(value, ctx)?));
                }
                Ok(IrExpr::MakeObject {
                    type_key: key,
                    fields: values,
                })
            }
            ast::Expr::Call {
                source,
                args,
                span,
                id,
            } => self.emit_call(source, args, *span, *id, ctx),
        }
    }

    fn emit_call(
        &mut self,
        source: &ast::Expr,
        args: &[ast::Expr],
        span: ast::Span,
        id: ast::NodeId,
        ctx: &EmitContext,
    ) -> Result<IrExpr, CompileError> {
        let info = self
            .ann
            .calls
            .get(&id)
            .cloned()
            .ok_or_else(|| err(ErrorKind::Internal, "call site unresolved", span))?;
        // the call's bindings translated into this frame: used for the
        // mangled callee name and for the callee body's own context.
        // Arguments and the receiver stay in the caller's frame and are
        // emitted under the caller's bindings.
        let composed = resolve_type_binds(&info.binds, &ctx.binds);

        // a primitive crossing into a constrained-variable position needs
        // its method table populated before the call runs
        for ((arg, declared), boxed) in args
            .iter()
            .zip(&info.origin.args)
            .zip(&info.boxed_args)
        {
            if !*boxed {
                continue;
            }
            if let Type::Var(var) = declared {
                let observed = self.expr_type(arg, ctx, span)?;
                let constraints: Vec<TraitRef> = var
                    .constraints
                    .iter()
                    .map(|c| bind_trait_ref(c, &composed))
                    .collect();
                self.create_dyn_object(&observed, &constraints, &composed, span)?;
            }
        }

        let mut emitted_args = Vec::with_capacity(args.len());
        for arg in args {
            emitted_args.push(self.emit_expr(arg, ctx)?);
        }

        if let (Some(assoc_trait), Some(assoc_type)) = (
            info.callee.association_trait.as_ref(),
            info.callee.association_type.as_ref(),
        ) {
            // the association may reference the impl's own variables
            // (resolved by this call's binding) or the caller's frame
            let bound_trait = bind_trait_ref(&bind_trait_ref(assoc_trait, &composed), &ctx.binds);
            let bound_target = bind_type(&bind_type(assoc_type, &composed), &ctx.binds);
            let method = info.callee.name.clone();
            let compile_name = trait_fn_name(&bound_trait, &bound_target, &method);

            // a statically-known impl method is compiled here and entered
            // into the target's method table; dynamic receivers rely on
            // the tables populated at box/wrap sites
            if !bound_target.is_var() {
                if let Some(fn_id) = info.callee.ast {
                    if !self.emitted.contains(&compile_name) {
                        self.emit_function(
                            compile_name.clone(),
                            fn_id,
                            EmitContext {
                                binds: composed.clone(),
                                is_method: true,
                            },
                        )?;
                    }
                    self.metas.register_method(
                        &type_key(&bound_target),
                        &method,
                        &trait_key(&bound_trait),
                        FunctionObject::Named(compile_name.clone()),
                    );
                }
            }

            let ast::Expr::Attr { object, .. } = source else {
                return Err(err(
                    ErrorKind::Internal,
                    "trait method call without a receiver",
                    span,
                ));
            };
            let receiver = self.emit_expr(object, ctx)?;

            if bound_target.is_primitive() && !info.dyn_dispatch {
                // zero-cost path: primitives skip the method table
                let mut all = Vec::with_capacity(emitted_args.len() + 1);
                all.push(receiver);
                all.extend(emitted_args);
                return Ok(IrExpr::CallGlobal {
                    name: compile_name,
                    args: all,
                });
            }
            return Ok(IrExpr::CallMethod {
                receiver: Box::new(receiver),
                method,
                trait_key: trait_key(&bound_trait),
                args: emitted_args,
            });
        }

        if !info.callee.type_parameters.is_empty() && !info.binds.is_empty() {
            // static call of a generic function: compile the
            // specialization for this binding
            let compile_name =
                specialized_fn_name(&info.callee.name, &info.callee.type_parameters, &composed);
            let fn_id = info.callee.ast.ok_or_else(|| {
                err(ErrorKind::Internal, "generic callee has no body", span)
            })?;
            if !self.emitted.contains(&compile_name) {
                self.emit_function(
                    compile_name.clone(),
                    fn_id,
                    EmitContext {
                        binds: composed,
                        is_method: false,
                    },
                )?;
            }
            return Ok(IrExpr::CallGlobal {
                name: compile_name,
                args: emitted_args,
            });
        }

        // plain call: a user function is compiled on first use, a native
        // is called straight through
        let name = info.callee.name.clone();
        if let Some(fn_id) = info.callee.ast {
            if !self.emitted.contains(&name) {
                self.emit_function(
                    name.clone(),
                    fn_id,
                    EmitContext {
                        binds: composed,
                        is_method: false,
                    },
                )?;
            }
        }
        Ok(IrExpr::CallGlobal {
            name,
            args: emitted_args,
        })
    }

    /// Compile one function body under a name. The name is recorded before
    /// the body is walked so recursion terminates.
    fn emit_function(
        &mut self,
        name: String,
        fn_id: FnId,
        ctx: EmitContext,
    ) -> Result<(), CompileError> {
        self.emitted.insert(name.clone());
        log::debug!("emitting `{}`", name);

        let def = self.defs.fn_asts[fn_id].clone();
        let mut params = Vec::with_capacity(def.params.len() + 1);
        if ctx.is_method {
            params.push("self".to_string());
        }
        params.extend(def.params.iter().map(|p| p.name.clone()));

        let body = self.emit_block(&def.body, &ctx)?;
        self.functions.push(IrFunction { name, params, body });
        Ok(())
    }

    /// Make a concrete type usable behind the given constraint traits:
    /// compile every method of every matching impl and install it in the
    /// type's method table, recursively through the impls' own bindings.
    fn create_dyn_object(
        &mut self,
        target: &Type,
        constraints: &[TraitRef],
        binds: &Binds,
        span: ast::Span,
    ) -> Result<(), CompileError> {
        for constraint in constraints {
            let bound_trait = bind_trait_ref(constraint, binds);
            for impl_def in self.trait_impls.get_impl(target, &bound_trait, true) {
                let mut entries: Vec<(&TypeVar, &Type)> = impl_def.binds.iter().collect();
                entries.sort_by_key(|(var, _)| var.id);
                for (var, bound) in entries {
                    if !var.constraints.is_empty() {
                        self.create_dyn_object(bound, &var.constraints, binds, span)?;
                    }
                }
                for func in &impl_def.functions {
                    let compile_name = trait_fn_name(&bound_trait, target, &func.name);
                    if !self.emitted.contains(&compile_name) {
                        let fn_id = func.ast.ok_or_else(|| {
                            err(ErrorKind::Internal, "impl method has no body", span)
                        })?;
                        let fn_binds = resolve_type_binds(&impl_def.binds, binds);
                        self.emit_function(
                            compile_name.clone(),
                            fn_id,
                            EmitContext {
                                binds: fn_binds,
                                is_method: true,
                            },
                        )?;
                    }
                    self.metas.register_method(
                        &type_key(target),
                        &func.name,
                        &trait_key(&bound_trait),
                        FunctionObject::Named(compile_name),
                    );
                }
            }
        }
        Ok(())
    }

    fn expr_type(
        &self,
        expr: &ast::Expr,
        ctx: &EmitContext,
        span: ast::Span,
    ) -> Result<Type, CompileError> {
        let ty = self
            .ann
            .expr_types
            .get(&expr.id())
            .ok_or_else(|| err(ErrorKind::Internal, "expression has no type", span))?;
        Ok(bind_type(ty, &ctx.binds))
    }
}
