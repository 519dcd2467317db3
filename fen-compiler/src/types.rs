// Type representations for the semantic core.
//
// A `Type` is either a concrete (possibly parametric) reference or a type
// variable with trait constraints. Struct, trait and function definitions
// live in central tables and are addressed by index; a `TypeRef` that has
// been dereferenced carries its `StructId` back-pointer.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};

pub type StructId = usize;
pub type TraitId = usize;
pub type FnId = usize;

pub const PRIMITIVE_TYPES: &[&str] = &["Int", "Float", "Bool", "String", "Unit", "Any"];

static NEXT_VAR_ID: AtomicU32 = AtomicU32::new(0);

/// A generic type variable. Identity is the numeric `id`: two variables
/// with equal names but distinct ids are distinct, and binding maps key on
/// the identity, never the printed name.
#[derive(Debug, Clone, Eq)]
pub struct TypeVar {
    pub name: String,
    pub id: u32,
    pub constraints: Vec<TraitRef>,
    /// True for the existential produced by an `impl Trait` return
    /// position. Drives wrap-on-return, never matched by name.
    pub opaque: bool,
}

impl PartialEq for TypeVar {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.name == other.name
    }
}

impl std::hash::Hash for TypeVar {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.name.hash(state);
    }
}

impl TypeVar {
    pub fn fresh(name: impl Into<String>, constraints: Vec<TraitRef>) -> Self {
        Self {
            name: name.into(),
            id: NEXT_VAR_ID.fetch_add(1, Ordering::Relaxed),
            constraints,
            opaque: false,
        }
    }

    pub fn fresh_opaque(constraints: Vec<TraitRef>) -> Self {
        Self {
            opaque: true,
            ..Self::fresh("_", constraints)
        }
    }
}

/// A named, possibly parametric concrete type. An empty parameter list is a
/// plain nominal reference.
#[derive(Debug, Clone)]
pub struct TypeRef {
    pub name: String,
    pub parameters: Vec<Type>,
    pub struct_ref: Option<StructId>,
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            struct_ref: None,
        }
    }

    pub fn parametric(name: impl Into<String>, parameters: Vec<Type>) -> Self {
        Self {
            name: name.into(),
            parameters,
            struct_ref: None,
        }
    }
}

impl PartialEq for TypeRef {
    fn eq(&self, other: &Self) -> bool {
        // A bare nominal reference matches any instantiation of the same
        // name; instantiated references compare parameters structurally.
        if self.name != other.name {
            return false;
        }
        if self.parameters.is_empty() {
            return true;
        }
        self.parameters == other.parameters
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Ref(TypeRef),
    Var(TypeVar),
}

impl Type {
    pub fn named(name: impl Into<String>) -> Self {
        Type::Ref(TypeRef::named(name))
    }

    pub fn is_var(&self) -> bool {
        matches!(self, Type::Var(_))
    }

    pub fn as_var(&self) -> Option<&TypeVar> {
        match self {
            Type::Var(v) => Some(v),
            Type::Ref(_) => None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Type::Ref(r) => &r.name,
            Type::Var(v) => &v.name,
        }
    }

    pub fn is_primitive(&self) -> bool {
        match self {
            Type::Ref(r) => PRIMITIVE_TYPES.contains(&r.name.as_str()),
            Type::Var(_) => false,
        }
    }
}

/// A trait at a specific instantiation
#[derive(Debug, Clone, PartialEq)]
pub struct TraitRef {
    pub name: String,
    pub parameters: Vec<Type>,
}

impl Eq for TraitRef {}

impl TraitRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
        }
    }
}

/// A function signature. Trait-impl methods carry the impl they belong to
/// through the association back-pointers; callable bodies carry the id of
/// their source AST.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionRef {
    pub name: String,
    pub args: Vec<Type>,
    pub return_type: Type,
    pub type_parameters: Vec<TypeVar>,
    pub association_trait: Option<TraitRef>,
    pub association_type: Option<Type>,
    pub ast: Option<FnId>,
}

/// Definition side of a nominal struct type
#[derive(Debug, Clone)]
pub struct StructDefData {
    pub name: String,
    pub fields: Vec<(String, Type)>,
    pub parameters: Vec<TypeVar>,
}

impl StructDefData {
    pub fn field(&self, name: &str) -> Option<&Type> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }
}

/// Definition side of a trait, with its synthetic `Self` variable
#[derive(Debug, Clone)]
pub struct TraitDefData {
    pub name: String,
    pub parameters: Vec<TypeVar>,
    pub self_var: TypeVar,
    pub functions: Vec<FunctionRef>,
}

impl TraitDefData {
    pub fn function(&self, name: &str) -> Option<&FunctionRef> {
        self.functions.iter().find(|f| f.name == name)
    }
}

/// One trait implementation record. Immutable once registered; lookups
/// produce bound copies, never mutate the registered record.
#[derive(Debug, Clone)]
pub struct TraitImplDef {
    pub trait_ref: TraitRef,
    pub target_type: Type,
    pub type_parameters: Vec<TypeVar>,
    pub functions: Vec<FunctionRef>,
    pub binds: Binds,
}

impl TraitImplDef {
    pub fn function(&self, name: &str) -> Option<&FunctionRef> {
        self.functions.iter().find(|f| f.name == name)
    }
}

/// A call-site resolution of a specific overload
#[derive(Debug, Clone)]
pub struct ResolvedFunction {
    pub function: FunctionRef,
    pub source_type: Option<Type>,
    pub binds: Binds,
}

pub type Binds = HashMap<TypeVar, Type>;

/// Central tables of definitions, addressed by the ids carried in types.
#[derive(Debug, Default)]
pub struct Definitions {
    pub structs: Vec<StructDefData>,
    pub traits: Vec<TraitDefData>,
    pub fn_asts: Vec<Rc<fen_ast::FunctionDef>>,
}

impl Definitions {
    pub fn add_struct(&mut self, def: StructDefData) -> StructId {
        self.structs.push(def);
        self.structs.len() - 1
    }

    pub fn add_trait(&mut self, def: TraitDefData) -> TraitId {
        self.traits.push(def);
        self.traits.len() - 1
    }

    pub fn add_fn_ast(&mut self, def: &fen_ast::FunctionDef) -> FnId {
        self.fn_asts.push(Rc::new(def.clone()));
        self.fn_asts.len() - 1
    }
}

// ---------------------------------------------------------------------------
// Substitution
// ---------------------------------------------------------------------------

/// Substitute a binding map through a type. Rebuilt references lose their
/// struct back-pointer; it is recomputed on the next dereference.
pub fn bind_type(ty: &Type, binds: &Binds) -> Type {
    match ty {
        Type::Var(v) => binds.get(v).cloned().unwrap_or_else(|| ty.clone()),
        Type::Ref(r) => {
            if r.parameters.is_empty() {
                ty.clone()
            } else {
                Type::Ref(TypeRef::parametric(
                    r.name.clone(),
                    r.parameters.iter().map(|p| bind_type(p, binds)).collect(),
                ))
            }
        }
    }
}

pub fn bind_trait_ref(tr: &TraitRef, binds: &Binds) -> TraitRef {
    TraitRef {
        name: tr.name.clone(),
        parameters: tr.parameters.iter().map(|p| bind_type(p, binds)).collect(),
    }
}

pub fn bind_function_ref(f: &FunctionRef, binds: &Binds) -> FunctionRef {
    FunctionRef {
        name: f.name.clone(),
        args: f.args.iter().map(|a| bind_type(a, binds)).collect(),
        return_type: bind_type(&f.return_type, binds),
        type_parameters: f.type_parameters.clone(),
        association_trait: f
            .association_trait
            .as_ref()
            .map(|t| bind_trait_ref(t, binds)),
        association_type: f.association_type.as_ref().map(|t| bind_type(t, binds)),
        ast: f.ast,
    }
}

/// Compose a call site's bindings with the bindings of the enclosing
/// context: a value that is itself a context variable is replaced by what
/// the context resolved it to.
pub fn resolve_type_binds(binds: &Binds, parent: &Binds) -> Binds {
    binds
        .iter()
        .map(|(var, bound)| {
            let resolved = match bound {
                Type::Var(v) => parent.get(v).cloned().unwrap_or_else(|| bound.clone()),
                _ => bound.clone(),
            };
            (var.clone(), resolved)
        })
        .collect()
}

/// Structural equality that treats any two variables as interchangeable;
/// used to compare an impl method signature against its trait declaration.
pub fn equal_without_constraint(a: &Type, b: &Type) -> bool {
    match (a, b) {
        (Type::Var(_), Type::Var(_)) => true,
        (Type::Ref(ra), Type::Ref(rb)) => {
            ra.name == rb.name
                && ra.parameters.len() == rb.parameters.len()
                && ra
                    .parameters
                    .iter()
                    .zip(&rb.parameters)
                    .all(|(pa, pb)| equal_without_constraint(pa, pb))
        }
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Display & mangling
// ---------------------------------------------------------------------------

fn write_params(f: &mut fmt::Formatter, params: &[Type]) -> fmt::Result {
    if params.is_empty() {
        return Ok(());
    }
    write!(f, "<")?;
    for (i, p) in params.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", p)?;
    }
    write!(f, ">")
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Type::Var(v) => write!(f, "{}", v.name),
            Type::Ref(r) => {
                write!(f, "{}", r.name)?;
                write_params(f, &r.parameters)
            }
        }
    }
}

impl fmt::Display for TraitRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)?;
        write_params(f, &self.parameters)
    }
}

/// Sentinel every type variable mangles to, so all dynamic-dispatch paths
/// share one compiled entry.
pub const DYN_SENTINEL: &str = "0DYN0";

fn sanitize(rendered: &str) -> String {
    rendered
        .replace('<', "_p_")
        .replace('>', "_q_")
        .replace(',', "__")
        .replace(' ', "")
}

/// Mangled key of a type, used for method tables and specialized names.
pub fn type_key(ty: &Type) -> String {
    match ty {
        Type::Var(_) => DYN_SENTINEL.to_string(),
        Type::Ref(_) => sanitize(&ty.to_string()),
    }
}

/// Mangled key of a trait instantiation.
pub fn trait_key(tr: &TraitRef) -> String {
    sanitize(&tr.to_string())
}

/// Compiled name of trait `Tr`'s method `m` implemented for type `Ty`.
pub fn trait_fn_name(tr: &TraitRef, target: &Type, method: &str) -> String {
    format!("{}_for_{}___{}", trait_key(tr), type_key(target), method)
}

/// Compiled name of a generic function specialized at a binding, in
/// declared type-parameter order.
pub fn specialized_fn_name(name: &str, type_parameters: &[TypeVar], binds: &Binds) -> String {
    let mut out = name.to_string();
    for param in type_parameters {
        let bound = binds
            .get(param)
            .cloned()
            .unwrap_or_else(|| Type::Var(param.clone()));
        out.push_str("___");
        out.push_str(&type_key(&bound));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int() -> Type {
        Type::named("Int")
    }

    #[test]
    fn test_var_identity_by_id() {
        let a = TypeVar::fresh("T", vec![]);
        let b = TypeVar::fresh("T", vec![]);
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_bare_ref_matches_instantiation() {
        let bare = Type::named("Box");
        let boxed = Type::Ref(TypeRef::parametric("Box", vec![int()]));
        assert_eq!(bare, boxed);
        let other = Type::Ref(TypeRef::parametric("Box", vec![Type::named("String")]));
        assert_ne!(boxed, other);
    }

    #[test]
    fn test_type_key_mangling() {
        let boxed = Type::Ref(TypeRef::parametric("Box", vec![int()]));
        assert_eq!(type_key(&boxed), "Box_p_Int_q_");

        let pair = Type::Ref(TypeRef::parametric(
            "Pair",
            vec![int(), Type::named("String")],
        ));
        assert_eq!(type_key(&pair), "Pair_p_Int__String_q_");
    }

    #[test]
    fn test_every_var_mangles_to_dyn_sentinel() {
        let a = Type::Var(TypeVar::fresh("T", vec![]));
        let b = Type::Var(TypeVar::fresh("U", vec![]));
        assert_eq!(type_key(&a), DYN_SENTINEL);
        assert_eq!(type_key(&a), type_key(&b));
    }

    #[test]
    fn test_trait_fn_name() {
        let tr = TraitRef {
            name: "Into".to_string(),
            parameters: vec![Type::named("String")],
        };
        assert_eq!(
            trait_fn_name(&tr, &int(), "into"),
            "Into_p_String_q__for_Int___into"
        );
    }

    #[test]
    fn test_specialized_fn_name_in_param_order() {
        let t = TypeVar::fresh("T", vec![]);
        let u = TypeVar::fresh("U", vec![]);
        let mut binds = Binds::new();
        binds.insert(t.clone(), int());
        binds.insert(u.clone(), Type::named("String"));
        assert_eq!(
            specialized_fn_name("pair", &[t.clone(), u.clone()], &binds),
            "pair___Int___String"
        );
        // declared order, not map order
        assert_eq!(
            specialized_fn_name("pair", &[u, t], &binds),
            "pair___String___Int"
        );
    }

    #[test]
    fn test_bind_type_through_nested_ref() {
        let t = TypeVar::fresh("T", vec![]);
        let nested = Type::Ref(TypeRef::parametric(
            "A",
            vec![Type::Ref(TypeRef::parametric(
                "B",
                vec![Type::Var(t.clone())],
            ))],
        ));
        let mut binds = Binds::new();
        binds.insert(t, int());
        let bound = bind_type(&nested, &binds);
        assert_eq!(bound.to_string(), "A<B<Int>>");
    }

    #[test]
    fn test_resolve_type_binds_composition() {
        // callee binds Tb -> Tc, context resolved Tc -> Int
        let tb = TypeVar::fresh("Tb", vec![]);
        let tc = TypeVar::fresh("Tc", vec![]);
        let mut binds = Binds::new();
        binds.insert(tb.clone(), Type::Var(tc.clone()));
        let mut parent = Binds::new();
        parent.insert(tc, int());
        let composed = resolve_type_binds(&binds, &parent);
        assert_eq!(composed.get(&tb), Some(&int()));
    }

    #[test]
    fn test_equal_without_constraint() {
        let t = Type::Var(TypeVar::fresh("T", vec![]));
        let u = Type::Var(TypeVar::fresh("U", vec![]));
        assert!(equal_without_constraint(&t, &u));
        assert!(equal_without_constraint(&int(), &int()));
        assert!(!equal_without_constraint(&t, &int()));
    }
}
