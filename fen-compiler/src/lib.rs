// The Fen semantic core: scope construction, bidirectional type checking
// with trait resolution, and IR emission with monomorphization and a
// dynamic-dispatch fallback. `Compiler` ties the stages together and owns
// the state shared between the prelude and user programs.

pub mod annotations;
pub mod binder;
pub mod check;
pub mod declare;
pub mod elaborate;
pub mod emit;
pub mod prelude;
pub mod scope;
pub mod trait_impls;
pub mod types;

use annotations::Annotations;
use check::TypeCheckVisitor;
use declare::DeclarationVisitor;
use emit::EmitVisitor;
use fen_diagnostics::{CompileError, ErrorKind};
use fen_parser::{ParseError, Parser};
use fen_runtime::{
    builtin_natives, Interpreter, IrFunction, IrProgram, IrStmt, MetaManager, Natives,
    RuntimeError,
};
use scope::{ScopeManager, Symbol, TypeSymbol};
use trait_impls::TraitImpls;
use types::{Definitions, PRIMITIVE_TYPES};

pub use fen_diagnostics::render;

#[derive(Debug, thiserror::Error)]
pub enum FenError {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// One compilation session: `initialize()` loads the prelude, then each
/// `run` compiles a program against the session state and executes it.
pub struct Compiler {
    scopes: ScopeManager,
    trait_impls: TraitImpls,
    defs: Definitions,
    ann: Annotations,
    metas: MetaManager,
    natives: Natives,
    emitted: std::collections::HashSet<String>,
    functions: Vec<IrFunction>,
    initialized: bool,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    pub fn new() -> Self {
        Self {
            scopes: ScopeManager::new(),
            trait_impls: TraitImpls::new(),
            defs: Definitions::default(),
            ann: Annotations::default(),
            metas: MetaManager::new(),
            natives: builtin_natives(),
            emitted: std::collections::HashSet::new(),
            functions: Vec::new(),
            initialized: false,
        }
    }

    /// Register the primitive types and the native bridge signatures, then
    /// compile the prelude through the ordinary pipeline.
    pub fn initialize(&mut self) -> Result<(), CompileError> {
        if self.initialized {
            return Ok(());
        }
        let global = self.scopes.global();
        for name in PRIMITIVE_TYPES {
            self.scopes
                .add_type(global, TypeSymbol::Primitive((*name).to_string()))
                .map_err(|m| CompileError::new(ErrorKind::Internal, m, 0..0))?;
            self.metas.get_or_create_meta(name);
        }
        for func in prelude::native_function_refs() {
            self.scopes
                .add_var(
                    global,
                    Symbol::Function {
                        name: func.name.clone(),
                        func,
                    },
                )
                .map_err(|m| CompileError::new(ErrorKind::Internal, m, 0..0))?;
        }

        let body = self.compile(prelude::PRELUDE)?;
        debug_assert!(body.is_empty(), "the prelude has no program body");
        self.initialized = true;
        Ok(())
    }

    /// Run all three stages over a source program and return its body.
    /// Emitted functions accumulate on the session.
    fn compile(&mut self, source: &str) -> Result<Vec<IrStmt>, CompileError> {
        let program = Parser::new(source)
            .and_then(|mut p| p.parse())
            .map_err(parse_error)?;

        DeclarationVisitor::new(
            &mut self.scopes,
            &mut self.trait_impls,
            &mut self.defs,
            &mut self.ann,
        )
        .run(&program)?;

        TypeCheckVisitor::new(
            &mut self.scopes,
            &self.trait_impls,
            &self.defs,
            &mut self.ann,
        )
        .run(&program)?;

        EmitVisitor::new(
            &self.defs,
            &self.ann,
            &self.trait_impls,
            &mut self.metas,
            &mut self.emitted,
            &mut self.functions,
        )
        .emit_program(&program)
    }

    /// Compile without executing.
    pub fn check(&mut self, source: &str) -> Result<(), CompileError> {
        self.compile(source).map(|_| ())
    }

    /// Compile and execute, printing to stdout.
    pub fn run(&mut self, source: &str) -> Result<(), FenError> {
        let mut out = std::io::stdout();
        self.run_with_writer(source, &mut out)
    }

    /// Compile and execute with an explicit output sink.
    pub fn run_with_writer(
        &mut self,
        source: &str,
        out: &mut dyn std::io::Write,
    ) -> Result<(), FenError> {
        let body = self.compile(source)?;
        let program = self.assemble(body);
        Interpreter::new(&program, &mut self.metas, &self.natives, out).run()?;
        Ok(())
    }

    /// The program emitted so far: every compiled function plus a body.
    pub fn assemble(&self, body: Vec<IrStmt>) -> IrProgram {
        let mut program = IrProgram::new();
        for function in &self.functions {
            program.add_function(function.clone());
        }
        program.body = body;
        program
    }

    /// Names of every emitted function, for tests and tooling.
    pub fn emitted_names(&self) -> Vec<String> {
        self.functions.iter().map(|f| f.name.clone()).collect()
    }

    /// Read access to the pipeline's side tables, for tooling and for the
    /// invariant test suite.
    pub fn annotations(&self) -> &Annotations {
        &self.ann
    }
}

fn parse_error(e: ParseError) -> CompileError {
    let span = e.span();
    CompileError::new(ErrorKind::SyntaxError, e.to_string(), span)
}
