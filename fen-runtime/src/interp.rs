// Tree-walking interpreter over the emitted IR.
//
// Single-threaded by design: the whole pipeline is sequential and the
// method tables are frozen by the time execution starts.
//
// Bindings live in a stack of frames per function call, with the
// program's top-level bindings in a global map underneath. A block pushes
// a frame, so a `let` inside an `if` or `while` body does not leak;
// assignment updates the frame that owns the name.

use crate::data::{Attr, Data, FunctionObject, MetaManager, Value};
use crate::ir::{IrExpr, IrFunction, IrProgram, IrStmt};
use crate::natives::Natives;
use crate::RuntimeError;
use std::collections::HashMap;
use std::io::Write;

const MAX_CALL_DEPTH: usize = 1024;

/// Result of executing a statement
enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

type Frame = HashMap<String, Value>;

pub struct Interpreter<'a> {
    program: &'a IrProgram,
    metas: &'a mut MetaManager,
    natives: &'a Natives,
    out: &'a mut dyn Write,
    globals: Frame,
    depth: usize,
}

impl<'a> Interpreter<'a> {
    pub fn new(
        program: &'a IrProgram,
        metas: &'a mut MetaManager,
        natives: &'a Natives,
        out: &'a mut dyn Write,
    ) -> Self {
        Self {
            program,
            metas,
            natives,
            out,
            globals: Frame::new(),
            depth: 0,
        }
    }

    /// Execute the top-level program body. Top-level bindings land in the
    /// global frame, where emitted functions can see them.
    pub fn run(&mut self) -> Result<(), RuntimeError> {
        let mut frames = Vec::new();
        for stmt in &self.program.body {
            match self.exec_stmt(stmt, &mut frames)? {
                Flow::Normal => {}
                Flow::Return(_) => break,
                Flow::Break | Flow::Continue => {
                    return Err(RuntimeError::Internal(
                        "loop control escaped the program body".to_string(),
                    ))
                }
            }
        }
        Ok(())
    }

    /// Run a block in a fresh frame.
    fn exec_scoped(
        &mut self,
        stmts: &[IrStmt],
        frames: &mut Vec<Frame>,
    ) -> Result<Flow, RuntimeError> {
        frames.push(Frame::new());
        let flow = self.exec_all(stmts, frames);
        frames.pop();
        flow
    }

    fn exec_all(
        &mut self,
        stmts: &[IrStmt],
        frames: &mut Vec<Frame>,
    ) -> Result<Flow, RuntimeError> {
        for stmt in stmts {
            match self.exec_stmt(stmt, frames)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(
        &mut self,
        stmt: &IrStmt,
        frames: &mut Vec<Frame>,
    ) -> Result<Flow, RuntimeError> {
        match stmt {
            IrStmt::Let { name, value } => {
                let v = self.eval(value, frames)?;
                match frames.last_mut() {
                    Some(frame) => frame.insert(name.clone(), v),
                    None => self.globals.insert(name.clone(), v),
                };
                Ok(Flow::Normal)
            }
            IrStmt::Assign { name, value } => {
                let v = self.eval(value, frames)?;
                for frame in frames.iter_mut().rev() {
                    if let Some(slot) = frame.get_mut(name) {
                        *slot = v;
                        return Ok(Flow::Normal);
                    }
                }
                if let Some(slot) = self.globals.get_mut(name) {
                    *slot = v;
                    return Ok(Flow::Normal);
                }
                Err(RuntimeError::UndefinedVariable(name.clone()))
            }
            IrStmt::Expr(e) => {
                self.eval(e, frames)?;
                Ok(Flow::Normal)
            }
            IrStmt::If { branches, else_body } => {
                for (cond, body) in branches {
                    if self.eval(cond, frames)?.as_bool()? {
                        return self.exec_scoped(body, frames);
                    }
                }
                if let Some(body) = else_body {
                    return self.exec_scoped(body, frames);
                }
                Ok(Flow::Normal)
            }
            IrStmt::While { cond, body } => {
                while self.eval(cond, frames)?.as_bool()? {
                    match self.exec_scoped(body, frames)? {
                        Flow::Normal | Flow::Continue => {}
                        Flow::Break => break,
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
                Ok(Flow::Normal)
            }
            IrStmt::Return(value) => {
                let v = match value {
                    Some(e) => self.eval(e, frames)?,
                    None => self.unit(),
                };
                Ok(Flow::Return(v))
            }
            IrStmt::Break => Ok(Flow::Break),
            IrStmt::Continue => Ok(Flow::Continue),
        }
    }

    fn unit(&mut self) -> Value {
        self.metas.make_object("Unit", Data::Unit)
    }

    fn lookup(&self, name: &str, frames: &[Frame]) -> Option<Value> {
        for frame in frames.iter().rev() {
            if let Some(v) = frame.get(name) {
                return Some(v.clone());
            }
        }
        self.globals.get(name).cloned()
    }

    fn eval(&mut self, expr: &IrExpr, frames: &mut Vec<Frame>) -> Result<Value, RuntimeError> {
        match expr {
            IrExpr::Int(v) => Ok(self.metas.make_object("Int", Data::Int(*v))),
            IrExpr::Float(v) => Ok(self.metas.make_object("Float", Data::Float(*v))),
            IrExpr::Bool(v) => Ok(self.metas.make_object("Bool", Data::Bool(*v))),
            IrExpr::Str(v) => Ok(self.metas.make_object("String", Data::Str(v.clone()))),
            IrExpr::Unit => Ok(self.unit()),
            IrExpr::Var(name) => self
                .lookup(name, frames)
                .ok_or_else(|| RuntimeError::UndefinedVariable(name.clone())),
            IrExpr::Attr { object, name } => {
                let value = self.eval(object, frames)?;
                match self.metas.attr(&value, name) {
                    Some(Attr::Field(v)) => Ok(v),
                    Some(Attr::Methods(_)) => Err(RuntimeError::TypeError(format!(
                        "method `{}` used as a value",
                        name
                    ))),
                    None => Err(RuntimeError::MissingAttribute {
                        type_key: self.metas.meta(value.meta()).name.clone(),
                        attr: name.clone(),
                    }),
                }
            }
            IrExpr::CallGlobal { name, args } => {
                let values = self.eval_args(args, frames)?;
                self.call_global(name, &values)
            }
            IrExpr::CallMethod {
                receiver,
                method,
                trait_key,
                args,
            } => {
                let recv = self.eval(receiver, frames)?;
                let mut values = Vec::with_capacity(args.len() + 1);
                values.push(recv.clone());
                values.extend(self.eval_args(args, frames)?);

                let function = {
                    let meta = self.metas.meta(recv.meta());
                    meta.vtable
                        .get(method)
                        .and_then(|row| row.get(trait_key))
                        .cloned()
                        .ok_or_else(|| RuntimeError::MissingMethod {
                            type_key: meta.name.clone(),
                            method: method.clone(),
                            trait_key: trait_key.clone(),
                        })?
                };
                self.call_object(&function, &values)
            }
            IrExpr::MakeObject { type_key, fields } => {
                let mut record = HashMap::new();
                for (name, value) in fields {
                    let v = self.eval(value, frames)?;
                    record.insert(name.clone(), v);
                }
                Ok(self.metas.make_object(type_key, Data::Record(record)))
            }
        }
    }

    fn eval_args(
        &mut self,
        args: &[IrExpr],
        frames: &mut Vec<Frame>,
    ) -> Result<Vec<Value>, RuntimeError> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg, frames)?);
        }
        Ok(values)
    }

    fn call_object(
        &mut self,
        function: &FunctionObject,
        args: &[Value],
    ) -> Result<Value, RuntimeError> {
        match function {
            FunctionObject::Named(name) => self.call_global(name, args),
            FunctionObject::Native(f) => f(self.metas, self.out, args),
        }
    }

    fn call_global(&mut self, name: &str, args: &[Value]) -> Result<Value, RuntimeError> {
        if let Some(function) = self.program.function(name) {
            return self.call_function(function, args);
        }
        if let Some(native) = self.natives.get(name) {
            return native(self.metas, self.out, args);
        }
        Err(RuntimeError::UndefinedFunction(name.to_string()))
    }

    fn call_function(
        &mut self,
        function: &IrFunction,
        args: &[Value],
    ) -> Result<Value, RuntimeError> {
        if function.params.len() != args.len() {
            return Err(RuntimeError::Internal(format!(
                "function `{}` expects {} arguments, got {}",
                function.name,
                function.params.len(),
                args.len()
            )));
        }
        if self.depth >= MAX_CALL_DEPTH {
            return Err(RuntimeError::StackOverflow);
        }
        self.depth += 1;

        let mut frame = Frame::new();
        for (param, value) in function.params.iter().zip(args) {
            frame.insert(param.clone(), value.clone());
        }
        let mut frames = vec![frame];
        let result = self.exec_all(&function.body, &mut frames);
        self.depth -= 1;

        match result? {
            Flow::Return(v) => Ok(v),
            Flow::Normal => Ok(self.unit()),
            Flow::Break | Flow::Continue => Err(RuntimeError::Internal(
                "loop control escaped a function body".to_string(),
            )),
        }
    }
}
