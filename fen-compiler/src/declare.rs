// Stage 1: scope construction and declaration collection.
//
// Walks every top-level declaration, installs type / trait / function
// symbols, registers trait impls, and attaches each AST node to the scope
// it lives in. Runs to completion before any type is validated, so
// mutually recursive types, traits and functions are allowed. Structural
// placement of `return` / `break` / `continue` is checked here as well.

use crate::annotations::Annotations;
use crate::elaborate::{
    elaborate_function, elaborate_type, elaborate_type_params, TypeLookupMap,
};
use crate::scope::{ScopeManager, Symbol, TypeSymbol};
use crate::trait_impls::TraitImpls;
use crate::types::{
    Definitions, FunctionRef, StructDefData, TraitDefData, TraitImplDef, TraitRef, Type, TypeVar,
};
use fen_ast as ast;
use fen_diagnostics::{CompileError, ErrorKind};

pub struct DeclarationVisitor<'a> {
    scopes: &'a mut ScopeManager,
    trait_impls: &'a mut TraitImpls,
    defs: &'a mut Definitions,
    ann: &'a mut Annotations,
    fn_depth: usize,
    loop_depth: usize,
}

fn err(kind: ErrorKind, message: impl Into<String>, span: ast::Span) -> CompileError {
    CompileError::new(kind, message, span.start..span.end)
}

impl<'a> DeclarationVisitor<'a> {
    pub fn new(
        scopes: &'a mut ScopeManager,
        trait_impls: &'a mut TraitImpls,
        defs: &'a mut Definitions,
        ann: &'a mut Annotations,
    ) -> Self {
        Self {
            scopes,
            trait_impls,
            defs,
            ann,
            fn_depth: 0,
            loop_depth: 0,
        }
    }

    pub fn run(&mut self, program: &ast::Program) -> Result<(), CompileError> {
        for decl in &program.decls {
            match decl {
                ast::TopLevel::Item(item) => self.declare_item(item)?,
                ast::TopLevel::Stmt(stmt) => self.scan_stmt(stmt)?,
            }
        }
        Ok(())
    }

    fn declare_item(&mut self, item: &ast::Item) -> Result<(), CompileError> {
        match item {
            ast::Item::Struct(def) => self.declare_struct(def),
            ast::Item::Trait(def) => self.declare_trait(def),
            ast::Item::TraitImpl(def) => self.declare_impl(def),
            ast::Item::Function(def) => self.declare_function(def),
        }
    }

    fn declare_struct(&mut self, def: &ast::StructDef) -> Result<(), CompileError> {
        self.ann.node_scopes.insert(def.id, self.scopes.current());

        let (vars, lookup) = elaborate_type_params(&def.type_params, &TypeLookupMap::new());
        let fields = def
            .fields
            .iter()
            .map(|f| (f.name.clone(), elaborate_type(&f.ty, &lookup)))
            .collect();
        let struct_id = self.defs.add_struct(StructDefData {
            name: def.name.clone(),
            fields,
            parameters: vars.clone(),
        });

        let current = self.scopes.current();
        self.scopes
            .add_type(
                current,
                TypeSymbol::Struct {
                    name: def.name.clone(),
                    def: struct_id,
                },
            )
            .map_err(|m| err(ErrorKind::DuplicateDefinition, m, def.span))?;

        let inner = self.scopes.enter();
        for var in vars {
            self.scopes
                .add_generic(inner, var)
                .map_err(|m| err(ErrorKind::DuplicateDefinition, m, def.span))?;
        }
        self.ann.item_scopes.insert(def.id, inner);
        self.scopes.exit();
        Ok(())
    }

    fn declare_trait(&mut self, def: &ast::TraitDef) -> Result<(), CompileError> {
        self.ann.node_scopes.insert(def.id, self.scopes.current());

        let self_var = TypeVar::fresh("Self", vec![]);
        let (vars, mut lookup) = elaborate_type_params(&def.type_params, &TypeLookupMap::new());
        lookup.insert("Self".to_string(), Type::Var(self_var.clone()));

        let functions = def
            .functions
            .iter()
            .map(|f| crate::elaborate::elaborate_trait_function(f, &lookup))
            .collect();

        let trait_id = self.defs.add_trait(TraitDefData {
            name: def.name.clone(),
            parameters: vars.clone(),
            self_var: self_var.clone(),
            functions,
        });
        self.scopes
            .add_trait(&def.name, trait_id)
            .map_err(|m| err(ErrorKind::DuplicateDefinition, m, def.span))?;

        let inner = self.scopes.enter();
        self.scopes
            .add_generic(inner, self_var)
            .map_err(|m| err(ErrorKind::DuplicateDefinition, m, def.span))?;
        for var in vars {
            self.scopes
                .add_generic(inner, var)
                .map_err(|m| err(ErrorKind::DuplicateDefinition, m, def.span))?;
        }
        self.ann.item_scopes.insert(def.id, inner);
        self.scopes.exit();
        Ok(())
    }

    fn declare_impl(&mut self, def: &ast::TraitImplDef) -> Result<(), CompileError> {
        self.ann.node_scopes.insert(def.id, self.scopes.current());

        let inner = self.scopes.enter();
        let (vars, lookup) = elaborate_type_params(&def.type_params, &TypeLookupMap::new());
        for var in &vars {
            self.scopes
                .add_generic(inner, var.clone())
                .map_err(|m| err(ErrorKind::DuplicateDefinition, m, def.span))?;
        }

        let target = elaborate_type(&def.target, &lookup);
        let trait_ref = TraitRef {
            name: def.trait_name.clone(),
            parameters: def
                .trait_args
                .iter()
                .map(|a| elaborate_type(a, &lookup))
                .collect(),
        };

        // method signatures see `Self` as the target type, and bodies see
        // a `self` value of that type
        let mut method_lookup = lookup.clone();
        method_lookup.insert("Self".to_string(), target.clone());
        self.scopes
            .add_type(
                inner,
                TypeSymbol::Alias {
                    name: "Self".to_string(),
                    ty: target.clone(),
                },
            )
            .map_err(|m| err(ErrorKind::DuplicateDefinition, m, def.span))?;
        self.scopes
            .add_var(
                inner,
                Symbol::Var {
                    name: "self".to_string(),
                    ty: target.clone(),
                },
            )
            .map_err(|m| err(ErrorKind::DuplicateDefinition, m, def.span))?;

        let mut functions: Vec<FunctionRef> = Vec::new();
        for method in &def.functions {
            let fn_id = self.defs.add_fn_ast(method);
            let elab = elaborate_function(method, &method_lookup, Some(fn_id));
            if functions.iter().any(|f| f.name == elab.func.name) {
                return Err(err(
                    ErrorKind::DuplicateDefinition,
                    format!("`{}` already exists", method.name),
                    method.span,
                ));
            }
            self.declare_function_body(method, fn_id, &elab.declared_vars)?;
            functions.push(elab.func);
        }
        self.ann.item_scopes.insert(def.id, inner);
        self.scopes.exit();

        let impl_index = self.trait_impls.len();
        self.trait_impls
            .add_impl(TraitImplDef {
                trait_ref,
                target_type: target,
                type_parameters: vars,
                functions,
                binds: Default::default(),
            })
            .map_err(|m| err(ErrorKind::DuplicateDefinition, m, def.span))?;
        self.ann.impl_ids.insert(def.id, impl_index);
        Ok(())
    }

    fn declare_function(&mut self, def: &ast::FunctionDef) -> Result<(), CompileError> {
        self.ann.node_scopes.insert(def.id, self.scopes.current());

        let fn_id = self.defs.add_fn_ast(def);
        let elab = elaborate_function(def, &TypeLookupMap::new(), Some(fn_id));
        let current = self.scopes.current();
        self.scopes
            .add_var(
                current,
                Symbol::Function {
                    name: def.name.clone(),
                    func: elab.func,
                },
            )
            .map_err(|m| err(ErrorKind::DuplicateDefinition, m, def.span))?;
        self.declare_function_body(def, fn_id, &elab.declared_vars)
    }

    /// Enter the body scope of a function or method, install its generic
    /// parameters, and walk the body structurally. Argument symbols are
    /// installed by stage 2 when the body is type-checked.
    fn declare_function_body(
        &mut self,
        def: &ast::FunctionDef,
        fn_id: usize,
        declared_vars: &[TypeVar],
    ) -> Result<(), CompileError> {
        let body_scope = self.scopes.enter();
        for var in declared_vars {
            self.scopes
                .add_generic(body_scope, var.clone())
                .map_err(|m| err(ErrorKind::DuplicateDefinition, m, def.span))?;
        }
        self.ann.fn_scopes.insert(fn_id, body_scope);
        self.ann.node_scopes.insert(def.body.id, body_scope);

        self.fn_depth += 1;
        let saved_loop = self.loop_depth;
        self.loop_depth = 0;
        let walked: Result<(), CompileError> = def
            .body
            .stmts
            .iter()
            .try_for_each(|stmt| self.scan_stmt(stmt));
        self.loop_depth = saved_loop;
        self.fn_depth -= 1;
        self.scopes.exit();
        walked
    }

    // ---- structural statement / expression walk --------------------------

    fn scan_block(&mut self, block: &ast::Block) -> Result<(), CompileError> {
        let scope = self.scopes.enter();
        self.ann.node_scopes.insert(block.id, scope);
        let walked = block.stmts.iter().try_for_each(|stmt| self.scan_stmt(stmt));
        self.scopes.exit();
        walked
    }

    fn scan_stmt(&mut self, stmt: &ast::Stmt) -> Result<(), CompileError> {
        match stmt {
            ast::Stmt::Let { name, value, id, .. } => {
                self.ann.node_scopes.insert(*id, self.scopes.current());
                self.scan_expr(value);
                // a top-level let is visible to later declarations; the
                // symbol is typed when stage 2 reaches the initializer
                if self.scopes.current() == self.scopes.global() {
                    self.scopes
                        .add_var(
                            self.scopes.global(),
                            Symbol::Placeholder { name: name.clone() },
                        )
                        .map_err(|m| err(ErrorKind::DuplicateDefinition, m, stmt.span()))?;
                }
                Ok(())
            }
            ast::Stmt::Assign { value, id, .. } => {
                self.ann.node_scopes.insert(*id, self.scopes.current());
                self.scan_expr(value);
                Ok(())
            }
            ast::Stmt::Expr(expr) => {
                self.scan_expr(expr);
                Ok(())
            }
            ast::Stmt::If {
                branches,
                else_block,
                id,
                ..
            } => {
                self.ann.node_scopes.insert(*id, self.scopes.current());
                for (cond, body) in branches {
                    self.scan_expr(cond);
                    self.scan_block(body)?;
                }
                if let Some(body) = else_block {
                    self.scan_block(body)?;
                }
                Ok(())
            }
            ast::Stmt::While { cond, body, id, .. } => {
                self.ann.node_scopes.insert(*id, self.scopes.current());
                self.scan_expr(cond);
                self.loop_depth += 1;
                let walked = self.scan_block(body);
                self.loop_depth -= 1;
                walked
            }
            ast::Stmt::Return { value, span, id } => {
                if self.fn_depth == 0 {
                    return Err(err(
                        ErrorKind::ReturnOutsideFunction,
                        "`return` outside a function body",
                        *span,
                    ));
                }
                self.ann.node_scopes.insert(*id, self.scopes.current());
                if let Some(value) = value {
                    self.scan_expr(value);
                }
                Ok(())
            }
            ast::Stmt::Break { span, .. } => {
                if self.loop_depth == 0 {
                    return Err(err(
                        ErrorKind::BreakOutsideLoop,
                        "`break` outside a loop body",
                        *span,
                    ));
                }
                Ok(())
            }
            ast::Stmt::Continue { span, .. } => {
                if self.loop_depth == 0 {
                    return Err(err(
                        ErrorKind::ContinueOutsideLoop,
                        "`continue` outside a loop body",
                        *span,
                    ));
                }
                Ok(())
            }
        }
    }

    fn scan_expr(&mut self, expr: &ast::Expr) {
        self.ann.node_scopes.insert(expr.id(), self.scopes.current());
        match expr {
            ast::Expr::Literal { .. } | ast::Expr::Var { .. } => {}
            ast::Expr::Binary { lhs, rhs, .. } => {
                self.scan_expr(lhs);
                self.scan_expr(rhs);
            }
            ast::Expr::Attr { object, .. } => self.scan_expr(object),
            ast::Expr::Call { source, args, .. } => {
                self.scan_expr(source);
                for arg in args {
                    self.scan_expr(arg);
                }
            }
            ast::Expr::StructInit { fields, .. } => {
                for (_, value) in fields {
                    self.scan_expr(value);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fen_parser::Parser;

    fn declare(source: &str) -> Result<(ScopeManager, TraitImpls, Definitions, Annotations), CompileError> {
        let program = Parser::new(source)
            .expect("lexer failure")
            .parse()
            .expect("parse failure");
        let mut scopes = ScopeManager::new();
        let mut impls = TraitImpls::new();
        let mut defs = Definitions::default();
        let mut ann = Annotations::default();
        DeclarationVisitor::new(&mut scopes, &mut impls, &mut defs, &mut ann).run(&program)?;
        Ok((scopes, impls, defs, ann))
    }

    #[test]
    fn test_forward_references_allowed() {
        // struct field references a later-declared struct
        let (scopes, _, defs, _) =
            declare("struct A { b: B }\nstruct B { n: Int }").expect("declare");
        assert_eq!(defs.structs.len(), 2);
        assert!(scopes.lookup_type(scopes.global(), "A").is_some());
        assert!(scopes.lookup_type(scopes.global(), "B").is_some());
    }

    #[test]
    fn test_impl_registered() {
        let source = "trait Say { def say() -> String; }\n\
                      struct A {}\n\
                      impl Say for A { def say() -> String { return \"hi\"; } }";
        let (_, impls, _, _) = declare(source).expect("declare");
        assert_eq!(impls.get_impl_by_type(&Type::named("A")).len(), 1);
    }

    #[test]
    fn test_duplicate_impl_rejected() {
        let source = "trait Say { def say() -> String; }\n\
                      struct A {}\n\
                      impl Say for A { def say() -> String { return \"hi\"; } }\n\
                      impl Say for A { def say() -> String { return \"yo\"; } }";
        let error = declare(source).expect_err("duplicate impl");
        assert_eq!(error.kind, ErrorKind::DuplicateDefinition);
    }

    #[test]
    fn test_duplicate_function_rejected() {
        let error = declare("def f() -> Int { return 1; }\ndef f() -> Int { return 2; }")
            .expect_err("duplicate function");
        assert_eq!(error.kind, ErrorKind::DuplicateDefinition);
    }

    #[test]
    fn test_return_outside_function() {
        let error = declare("return 1;").expect_err("stray return");
        assert_eq!(error.kind, ErrorKind::ReturnOutsideFunction);
    }

    #[test]
    fn test_break_outside_loop() {
        let error =
            declare("def f() -> Unit { break; }").expect_err("stray break");
        assert_eq!(error.kind, ErrorKind::BreakOutsideLoop);

        let error = declare("continue;").expect_err("stray continue");
        assert_eq!(error.kind, ErrorKind::ContinueOutsideLoop);
    }

    #[test]
    fn test_break_inside_loop_ok() {
        declare("def f() -> Unit { while true { break; continue; } }").expect("valid loop");
    }
}
