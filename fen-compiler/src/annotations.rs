// Side tables keyed by AST node id.
//
// The AST itself stays immutable; everything the pipeline learns about a
// node (its scope, its resolved type, its call resolution, desugarings,
// wrap marks) is recorded here. The tables persist for the whole
// compilation session: prelude annotations are still needed when a user
// program's call site triggers emission of a prelude function.

use crate::scope::ScopeId;
use crate::types::{Binds, FnId, FunctionRef, TraitRef, Type};
use fen_ast::{Expr, NodeId};
use std::collections::{HashMap, HashSet};

/// Everything stage 2 resolved about one call site.
#[derive(Debug, Clone)]
pub struct CallInfo {
    /// The chosen overload with the call's bindings substituted through it
    pub callee: FunctionRef,
    /// The overload as declared, before substitution. Boxing decisions
    /// look at the declared parameter types.
    pub origin: FunctionRef,
    pub binds: Binds,
    /// True iff the receiver's concrete type is erased at this site
    pub dyn_dispatch: bool,
    /// Per argument: declared type is a variable and the observed type is
    /// primitive, so the emitter must populate the primitive's method
    /// table before the value crosses the boundary
    pub boxed_args: Vec<bool>,
}

/// Mark on a `return` whose declared type is an `impl Trait` existential
/// while the observed type is concrete: emission must compile and register
/// the concrete type's methods for each constraint trait.
#[derive(Debug, Clone)]
pub struct ReturnWrap {
    pub constraints: Vec<TraitRef>,
}

#[derive(Debug, Default)]
pub struct Annotations {
    /// The scope each node lives in
    pub node_scopes: HashMap<NodeId, ScopeId>,
    /// Inner scope of an item (struct/trait/impl body, generic params)
    pub item_scopes: HashMap<NodeId, ScopeId>,
    /// Body scope of every function, by function table id
    pub fn_scopes: HashMap<FnId, ScopeId>,
    /// Registry index of the impl built from a trait-impl node
    pub impl_ids: HashMap<NodeId, usize>,
    /// Resolved type of every value expression
    pub expr_types: HashMap<NodeId, Type>,
    /// Call-site resolutions
    pub calls: HashMap<NodeId, CallInfo>,
    /// Resolved (dereferenced) type of every struct initializer
    pub struct_inits: HashMap<NodeId, Type>,
    /// Operator rewrites: the binary node id maps to the call form the
    /// emitter uses instead
    pub desugars: HashMap<NodeId, Expr>,
    /// Dynamic-wrap marks on return statements
    pub returns: HashMap<NodeId, ReturnWrap>,
    /// `let` statements that alias a function value; they emit nothing
    pub fn_aliases: HashSet<NodeId>,
}
