// Native bridge functions.
//
// These are the externally-provided primitives the prelude builds on. Each
// is registered under its bridge name both here (for execution) and in the
// compiler's global scope (as a typed function symbol).

use crate::data::{Data, MetaManager, Value};
use crate::RuntimeError;
use std::collections::HashMap;
use std::io::Write;

pub type NativeFn =
    fn(&mut MetaManager, &mut dyn Write, &[Value]) -> Result<Value, RuntimeError>;

pub type Natives = HashMap<&'static str, NativeFn>;

/// Typed signatures for every native, used by the compiler to install
/// function symbols in the global scope: (name, argument types, return type).
pub const NATIVE_SIGNATURES: &[(&str, &[&str], &str)] = &[
    ("add_int", &["Int", "Int"], "Int"),
    ("sub_int", &["Int", "Int"], "Int"),
    ("mul_int", &["Int", "Int"], "Int"),
    ("div_int", &["Int", "Int"], "Int"),
    ("le_int", &["Int", "Int"], "Bool"),
    ("gt_int", &["Int", "Int"], "Bool"),
    ("eq_int", &["Int", "Int"], "Bool"),
    ("add_float", &["Float", "Float"], "Float"),
    ("sub_float", &["Float", "Float"], "Float"),
    ("mul_float", &["Float", "Float"], "Float"),
    ("div_float", &["Float", "Float"], "Float"),
    ("le_float", &["Float", "Float"], "Bool"),
    ("gt_float", &["Float", "Float"], "Bool"),
    ("eq_float", &["Float", "Float"], "Bool"),
    ("add_string", &["String", "String"], "String"),
    ("lt_string", &["String", "String"], "Bool"),
    ("gt_string", &["String", "String"], "Bool"),
    ("eq_string", &["String", "String"], "Bool"),
    ("int_to_float", &["Int"], "Float"),
    ("string_to_float", &["String"], "Float"),
    ("int_to_string", &["Int"], "String"),
    ("float_to_string", &["Float"], "String"),
    ("bool_to_string", &["Bool"], "String"),
    ("echo", &["String"], "Unit"),
    ("panic", &["String"], "Unit"),
    ("is_true", &["Bool"], "Bool"),
    ("logic_and", &["Bool", "Bool"], "Bool"),
    ("logic_or", &["Bool", "Bool"], "Bool"),
];

/// Render a float the way the surface language prints it: integral values
/// keep a trailing `.0` (`float_to_string(2.0)` is `"2.0"`, not `"2"`).
pub fn format_float(v: f64) -> String {
    if v.is_finite() && v == v.trunc() {
        format!("{:.1}", v)
    } else {
        format!("{}", v)
    }
}

fn arg(args: &[Value], i: usize) -> Result<&Value, RuntimeError> {
    args.get(i)
        .ok_or_else(|| RuntimeError::Internal(format!("native argument {} missing", i)))
}

fn int(m: &mut MetaManager, v: i64) -> Value {
    m.make_object("Int", Data::Int(v))
}

fn float(m: &mut MetaManager, v: f64) -> Value {
    m.make_object("Float", Data::Float(v))
}

fn boolean(m: &mut MetaManager, v: bool) -> Value {
    m.make_object("Bool", Data::Bool(v))
}

fn string(m: &mut MetaManager, v: String) -> Value {
    m.make_object("String", Data::Str(v))
}

macro_rules! int_binop {
    ($name:ident, $op:expr) => {
        fn $name(
            m: &mut MetaManager,
            _out: &mut dyn Write,
            args: &[Value],
        ) -> Result<Value, RuntimeError> {
            let l = arg(args, 0)?.as_int()?;
            let r = arg(args, 1)?.as_int()?;
            let f: fn(&mut MetaManager, i64, i64) -> Result<Value, RuntimeError> = $op;
            f(m, l, r)
        }
    };
}

int_binop!(add_int, |m, l, r| Ok(int(m, l.wrapping_add(r))));
int_binop!(sub_int, |m, l, r| Ok(int(m, l.wrapping_sub(r))));
int_binop!(mul_int, |m, l, r| Ok(int(m, l.wrapping_mul(r))));
int_binop!(div_int, |m, l, r| {
    if r == 0 {
        Err(RuntimeError::DivisionByZero)
    } else {
        Ok(int(m, l.wrapping_div(r)))
    }
});
int_binop!(le_int, |m, l, r| Ok(boolean(m, l <= r)));
int_binop!(gt_int, |m, l, r| Ok(boolean(m, l > r)));
int_binop!(eq_int, |m, l, r| Ok(boolean(m, l == r)));

macro_rules! float_binop {
    ($name:ident, $op:expr) => {
        fn $name(
            m: &mut MetaManager,
            _out: &mut dyn Write,
            args: &[Value],
        ) -> Result<Value, RuntimeError> {
            let l = arg(args, 0)?.as_float()?;
            let r = arg(args, 1)?.as_float()?;
            let f: fn(&mut MetaManager, f64, f64) -> Result<Value, RuntimeError> = $op;
            f(m, l, r)
        }
    };
}

float_binop!(add_float, |m, l, r| Ok(float(m, l + r)));
float_binop!(sub_float, |m, l, r| Ok(float(m, l - r)));
float_binop!(mul_float, |m, l, r| Ok(float(m, l * r)));
float_binop!(div_float, |m, l, r| {
    if r == 0.0 {
        Err(RuntimeError::DivisionByZero)
    } else {
        Ok(float(m, l / r))
    }
});
float_binop!(le_float, |m, l, r| Ok(boolean(m, l <= r)));
float_binop!(gt_float, |m, l, r| Ok(boolean(m, l > r)));
float_binop!(eq_float, |m, l, r| Ok(boolean(m, l == r)));

macro_rules! string_binop {
    ($name:ident, $op:expr) => {
        fn $name(
            m: &mut MetaManager,
            _out: &mut dyn Write,
            args: &[Value],
        ) -> Result<Value, RuntimeError> {
            let l = arg(args, 0)?.as_str()?.to_string();
            let r = arg(args, 1)?.as_str()?.to_string();
            let f: fn(&mut MetaManager, String, String) -> Result<Value, RuntimeError> = $op;
            f(m, l, r)
        }
    };
}

string_binop!(add_string, |m, l, r| Ok(string(m, format!("{}{}", l, r))));
string_binop!(lt_string, |m, l, r| Ok(boolean(m, l < r)));
string_binop!(gt_string, |m, l, r| Ok(boolean(m, l > r)));
string_binop!(eq_string, |m, l, r| Ok(boolean(m, l == r)));

fn int_to_float(
    m: &mut MetaManager,
    _out: &mut dyn Write,
    args: &[Value],
) -> Result<Value, RuntimeError> {
    let v = arg(args, 0)?.as_int()?;
    Ok(float(m, v as f64))
}

fn string_to_float(
    m: &mut MetaManager,
    _out: &mut dyn Write,
    args: &[Value],
) -> Result<Value, RuntimeError> {
    let s = arg(args, 0)?.as_str()?;
    let v = s
        .trim()
        .parse::<f64>()
        .map_err(|_| RuntimeError::TypeError(format!("cannot parse `{}` as Float", s)))?;
    Ok(float(m, v))
}

fn int_to_string(
    m: &mut MetaManager,
    _out: &mut dyn Write,
    args: &[Value],
) -> Result<Value, RuntimeError> {
    let v = arg(args, 0)?.as_int()?;
    Ok(string(m, v.to_string()))
}

fn float_to_string(
    m: &mut MetaManager,
    _out: &mut dyn Write,
    args: &[Value],
) -> Result<Value, RuntimeError> {
    let v = arg(args, 0)?.as_float()?;
    Ok(string(m, format_float(v)))
}

fn bool_to_string(
    m: &mut MetaManager,
    _out: &mut dyn Write,
    args: &[Value],
) -> Result<Value, RuntimeError> {
    let v = arg(args, 0)?.as_bool()?;
    Ok(string(m, v.to_string()))
}

fn echo(
    m: &mut MetaManager,
    out: &mut dyn Write,
    args: &[Value],
) -> Result<Value, RuntimeError> {
    let s = arg(args, 0)?.as_str()?;
    writeln!(out, "{}", s)?;
    Ok(m.make_object("Unit", Data::Unit))
}

fn panic_fn(
    _m: &mut MetaManager,
    _out: &mut dyn Write,
    args: &[Value],
) -> Result<Value, RuntimeError> {
    let message = arg(args, 0)?.as_str()?.to_string();
    Err(RuntimeError::Panic(message))
}

fn is_true(
    m: &mut MetaManager,
    _out: &mut dyn Write,
    args: &[Value],
) -> Result<Value, RuntimeError> {
    let v = arg(args, 0)?.as_bool()?;
    Ok(boolean(m, v))
}

fn logic_and(
    m: &mut MetaManager,
    _out: &mut dyn Write,
    args: &[Value],
) -> Result<Value, RuntimeError> {
    let l = arg(args, 0)?.as_bool()?;
    let r = arg(args, 1)?.as_bool()?;
    Ok(boolean(m, l && r))
}

fn logic_or(
    m: &mut MetaManager,
    _out: &mut dyn Write,
    args: &[Value],
) -> Result<Value, RuntimeError> {
    let l = arg(args, 0)?.as_bool()?;
    let r = arg(args, 1)?.as_bool()?;
    Ok(boolean(m, l || r))
}

/// The full native registry, keyed by bridge name.
pub fn builtin_natives() -> Natives {
    let mut natives: Natives = HashMap::new();
    natives.insert("add_int", add_int as NativeFn);
    natives.insert("sub_int", sub_int);
    natives.insert("mul_int", mul_int);
    natives.insert("div_int", div_int);
    natives.insert("le_int", le_int);
    natives.insert("gt_int", gt_int);
    natives.insert("eq_int", eq_int);
    natives.insert("add_float", add_float);
    natives.insert("sub_float", sub_float);
    natives.insert("mul_float", mul_float);
    natives.insert("div_float", div_float);
    natives.insert("le_float", le_float);
    natives.insert("gt_float", gt_float);
    natives.insert("eq_float", eq_float);
    natives.insert("add_string", add_string);
    natives.insert("lt_string", lt_string);
    natives.insert("gt_string", gt_string);
    natives.insert("eq_string", eq_string);
    natives.insert("int_to_float", int_to_float);
    natives.insert("string_to_float", string_to_float);
    natives.insert("int_to_string", int_to_string);
    natives.insert("float_to_string", float_to_string);
    natives.insert("bool_to_string", bool_to_string);
    natives.insert("echo", echo);
    natives.insert("panic", panic_fn);
    natives.insert("is_true", is_true);
    natives.insert("logic_and", logic_and);
    natives.insert("logic_or", logic_or);
    natives
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_signature_has_an_implementation() {
        let natives = builtin_natives();
        for (name, _, _) in NATIVE_SIGNATURES {
            assert!(natives.contains_key(name), "missing native `{}`", name);
        }
        assert_eq!(natives.len(), NATIVE_SIGNATURES.len());
    }

    #[test]
    fn test_format_float_keeps_trailing_zero() {
        assert_eq!(format_float(2.0), "2.0");
        assert_eq!(format_float(3.14), "3.14");
        assert_eq!(format_float(-1.0), "-1.0");
    }

    #[test]
    fn test_div_int_truncates() {
        let mut m = MetaManager::new();
        let mut out = Vec::new();
        let args = [
            m.make_object("Int", Data::Int(7)),
            m.make_object("Int", Data::Int(2)),
        ];
        let result = div_int(&mut m, &mut out, &args).expect("division");
        assert_eq!(result.as_int().expect("int"), 3);
    }

    #[test]
    fn test_div_by_zero_is_an_error() {
        let mut m = MetaManager::new();
        let mut out = Vec::new();
        let args = [
            m.make_object("Int", Data::Int(1)),
            m.make_object("Int", Data::Int(0)),
        ];
        assert!(matches!(
            div_int(&mut m, &mut out, &args),
            Err(RuntimeError::DivisionByZero)
        ));
    }

    #[test]
    fn test_echo_writes_line() {
        let mut m = MetaManager::new();
        let mut out = Vec::new();
        let args = [m.make_object("String", Data::Str("hello".to_string()))];
        echo(&mut m, &mut out, &args).expect("echo");
        assert_eq!(String::from_utf8(out).expect("utf8"), "hello\n");
    }
}
