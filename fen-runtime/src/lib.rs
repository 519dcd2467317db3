// Fen runtime: the emitted IR, the typed object model with per-type
// method tables, the native bridge functions, and the tree-walking
// interpreter that executes compiled programs.

pub mod data;
pub mod interp;
pub mod ir;
pub mod natives;

pub use data::{Attr, Data, DataMeta, DataObject, FunctionObject, MetaId, MetaManager, Value};
pub use interp::Interpreter;
pub use ir::{IrExpr, IrFunction, IrProgram, IrStmt};
pub use natives::{builtin_natives, format_float, NativeFn, Natives, NATIVE_SIGNATURES};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("undefined function `{0}`")]
    UndefinedFunction(String),
    #[error("undefined variable `{0}`")]
    UndefinedVariable(String),
    #[error("no method `{method}` for trait `{trait_key}` on type `{type_key}`")]
    MissingMethod {
        type_key: String,
        method: String,
        trait_key: String,
    },
    #[error("no attribute `{attr}` on value of type `{type_key}`")]
    MissingAttribute { type_key: String, attr: String },
    #[error("type error: {0}")]
    TypeError(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("call stack exhausted")]
    StackOverflow,
    #[error("panic: {0}")]
    Panic(String),
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("internal runtime fault: {0}")]
    Internal(String),
}
