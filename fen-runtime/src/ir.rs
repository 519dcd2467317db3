// Intermediate representation executed by the interpreter.
//
// The emitter produces one `IrFunction` per reachable monomorphization
// (keyed by mangled name) plus a top-level body. The rendering produced by
// `Display` is the canonical textual form of an emitted program; it is
// stable, so two emissions of the same checked AST render identically.

use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IrProgram {
    pub functions: Vec<IrFunction>,
    pub body: Vec<IrStmt>,
    index: HashMap<String, usize>,
}

impl IrProgram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_function(&mut self, function: IrFunction) {
        self.index.insert(function.name.clone(), self.functions.len());
        self.functions.push(function);
    }

    pub fn function(&self, name: &str) -> Option<&IrFunction> {
        self.index.get(name).map(|&i| &self.functions[i])
    }

    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.functions.iter().map(|f| f.name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IrFunction {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<IrStmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IrStmt {
    Let { name: String, value: IrExpr },
    Assign { name: String, value: IrExpr },
    Expr(IrExpr),
    If {
        branches: Vec<(IrExpr, Vec<IrStmt>)>,
        else_body: Option<Vec<IrStmt>>,
    },
    While { cond: IrExpr, body: Vec<IrStmt> },
    Return(Option<IrExpr>),
    Break,
    Continue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IrExpr {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Unit,
    Var(String),
    /// Field access on a runtime object
    Attr { object: Box<IrExpr>, name: String },
    /// Call of an emitted function or a native external by name
    CallGlobal { name: String, args: Vec<IrExpr> },
    /// Dynamic dispatch: look up `vtable[method][trait_key]` on the
    /// receiver's meta and call it with the receiver prepended
    CallMethod {
        receiver: Box<IrExpr>,
        method: String,
        trait_key: String,
        args: Vec<IrExpr>,
    },
    /// Construct an object of the (mangled) type key
    MakeObject {
        type_key: String,
        fields: Vec<(String, IrExpr)>,
    },
}

// ---------------------------------------------------------------------------
// Textual rendering
// ---------------------------------------------------------------------------

fn write_block(f: &mut fmt::Formatter, stmts: &[IrStmt], depth: usize) -> fmt::Result {
    for stmt in stmts {
        write_stmt(f, stmt, depth)?;
    }
    Ok(())
}

fn write_stmt(f: &mut fmt::Formatter, stmt: &IrStmt, depth: usize) -> fmt::Result {
    let pad = "  ".repeat(depth);
    match stmt {
        IrStmt::Let { name, value } => writeln!(f, "{}let {} = {}", pad, name, value),
        IrStmt::Assign { name, value } => writeln!(f, "{}{} = {}", pad, name, value),
        IrStmt::Expr(e) => writeln!(f, "{}{}", pad, e),
        IrStmt::If { branches, else_body } => {
            for (i, (cond, body)) in branches.iter().enumerate() {
                let kw = if i == 0 { "if" } else { "elif" };
                writeln!(f, "{}{} {} {{", pad, kw, cond)?;
                write_block(f, body, depth + 1)?;
                writeln!(f, "{}}}", pad)?;
            }
            if let Some(body) = else_body {
                writeln!(f, "{}else {{", pad)?;
                write_block(f, body, depth + 1)?;
                writeln!(f, "{}}}", pad)?;
            }
            Ok(())
        }
        IrStmt::While { cond, body } => {
            writeln!(f, "{}while {} {{", pad, cond)?;
            write_block(f, body, depth + 1)?;
            writeln!(f, "{}}}", pad)
        }
        IrStmt::Return(Some(e)) => writeln!(f, "{}return {}", pad, e),
        IrStmt::Return(None) => writeln!(f, "{}return", pad),
        IrStmt::Break => writeln!(f, "{}break", pad),
        IrStmt::Continue => writeln!(f, "{}continue", pad),
    }
}

fn write_args(f: &mut fmt::Formatter, args: &[IrExpr]) -> fmt::Result {
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", arg)?;
    }
    Ok(())
}

impl fmt::Display for IrExpr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            IrExpr::Int(v) => write!(f, "{}", v),
            IrExpr::Float(v) => write!(f, "{}", crate::natives::format_float(*v)),
            IrExpr::Bool(v) => write!(f, "{}", v),
            IrExpr::Str(v) => write!(f, "{:?}", v),
            IrExpr::Unit => write!(f, "unit"),
            IrExpr::Var(name) => write!(f, "{}", name),
            IrExpr::Attr { object, name } => write!(f, "{}.{}", object, name),
            IrExpr::CallGlobal { name, args } => {
                write!(f, "{}(", name)?;
                write_args(f, args)?;
                write!(f, ")")
            }
            IrExpr::CallMethod {
                receiver,
                method,
                trait_key,
                args,
            } => {
                write!(f, "{}.vtable[{}][{}](", receiver, method, trait_key)?;
                write_args(f, args)?;
                write!(f, ")")
            }
            IrExpr::MakeObject { type_key, fields } => {
                write!(f, "make_object({}, {{", type_key)?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, value)?;
                }
                write!(f, "}})")
            }
        }
    }
}

impl fmt::Display for IrFunction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "def {}({}) {{", self.name, self.params.join(", "))?;
        write_block(f, &self.body, 1)?;
        writeln!(f, "}}")
    }
}

impl fmt::Display for IrProgram {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for function in &self.functions {
            writeln!(f, "{}", function)?;
        }
        write_block(f, &self.body, 0)
    }
}
