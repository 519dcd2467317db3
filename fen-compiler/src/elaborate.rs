// Syntactic type elaboration for stage 1.
//
// Declarations are collected before any name is validated, so mutually
// recursive structs, traits and impls work: elaboration builds type
// references purely from the source text, resolving only the generic
// parameter names it is handed. Stage 2 validates that every reference
// actually names a definition with the right arity.

use crate::types::{FnId, FunctionRef, TraitRef, Type, TypeRef, TypeVar};
use fen_ast as ast;
use std::collections::HashMap;

pub type TypeLookupMap = HashMap<String, Type>;

/// Elaborate a type as written. Known generic parameter names map to their
/// variables; everything else becomes a nominal reference. An `impl Trait`
/// in argument position becomes a fresh constrained variable.
pub fn elaborate_type(node: &ast::TypeNode, lookup: &TypeLookupMap) -> Type {
    match node {
        ast::TypeNode::Named { name, args, .. } => {
            if args.is_empty() {
                if let Some(known) = lookup.get(name) {
                    return known.clone();
                }
            }
            Type::Ref(TypeRef::parametric(
                name.clone(),
                args.iter().map(|a| elaborate_type(a, lookup)).collect(),
            ))
        }
        ast::TypeNode::ImplTrait { bounds, .. } => Type::Var(TypeVar::fresh(
            "_",
            bounds.iter().map(|b| elaborate_bound(b, lookup)).collect(),
        )),
    }
}

/// Elaborate a return annotation. A missing annotation is `Unit`; an
/// `impl Trait` here is the existential: a fresh opaque variable whose
/// constraints drive dynamic wrapping at return sites.
pub fn elaborate_return_type(node: Option<&ast::TypeNode>, lookup: &TypeLookupMap) -> Type {
    match node {
        None => Type::named("Unit"),
        Some(ast::TypeNode::ImplTrait { bounds, .. }) => Type::Var(TypeVar::fresh_opaque(
            bounds.iter().map(|b| elaborate_bound(b, lookup)).collect(),
        )),
        Some(other) => elaborate_type(other, lookup),
    }
}

pub fn elaborate_bound(bound: &ast::TraitBound, lookup: &TypeLookupMap) -> TraitRef {
    TraitRef {
        name: bound.name.clone(),
        parameters: bound
            .args
            .iter()
            .map(|a| elaborate_type(a, lookup))
            .collect(),
    }
}

/// Turn a generic parameter list into fresh variables and a lookup map.
/// Bounds may reference sibling parameters, so variables are created
/// first and constraints elaborated against the full map.
pub fn elaborate_type_params(
    params: &[ast::TypeParam],
    outer: &TypeLookupMap,
) -> (Vec<TypeVar>, TypeLookupMap) {
    let bare: Vec<TypeVar> = params
        .iter()
        .map(|p| TypeVar::fresh(&p.name, vec![]))
        .collect();

    let mut lookup = outer.clone();
    for var in &bare {
        lookup.insert(var.name.clone(), Type::Var(var.clone()));
    }

    let vars: Vec<TypeVar> = params
        .iter()
        .zip(&bare)
        .map(|(p, v)| TypeVar {
            constraints: p
                .bounds
                .iter()
                .map(|b| elaborate_bound(b, &lookup))
                .collect(),
            ..v.clone()
        })
        .collect();

    let mut lookup = outer.clone();
    for var in &vars {
        lookup.insert(var.name.clone(), Type::Var(var.clone()));
    }
    (vars, lookup)
}

pub struct ElabFunction {
    pub func: FunctionRef,
    /// The function's declared generic variables (excluding the anonymous
    /// ones minted for `impl Trait` arguments)
    pub declared_vars: Vec<TypeVar>,
    /// Lookup map including the function's own parameters
    pub lookup: TypeLookupMap,
}

/// Elaborate a function definition into its signature. Anonymous
/// variables from `impl Trait` arguments are appended to the type
/// parameter list, after the declared ones.
pub fn elaborate_function(
    def: &ast::FunctionDef,
    outer: &TypeLookupMap,
    ast_id: Option<FnId>,
) -> ElabFunction {
    let (declared_vars, lookup) = elaborate_type_params(&def.type_params, outer);
    let mut type_parameters = declared_vars.clone();

    let mut args = Vec::new();
    for param in &def.params {
        let ty = elaborate_type(&param.ty, &lookup);
        if matches!(param.ty, ast::TypeNode::ImplTrait { .. }) {
            if let Type::Var(v) = &ty {
                type_parameters.push(v.clone());
            }
        }
        args.push(ty);
    }

    let return_type = elaborate_return_type(def.return_type.as_ref(), &lookup);

    ElabFunction {
        func: FunctionRef {
            name: def.name.clone(),
            args,
            return_type,
            type_parameters,
            association_trait: None,
            association_type: None,
            ast: ast_id,
        },
        declared_vars,
        lookup,
    }
}

/// Elaborate a trait method signature. Trait methods declare no generics
/// of their own; their variables come from the trait's parameters and
/// `Self`.
pub fn elaborate_trait_function(
    def: &ast::TraitFunction,
    lookup: &TypeLookupMap,
) -> FunctionRef {
    let mut type_parameters = Vec::new();
    let mut args = Vec::new();
    for param in &def.params {
        let ty = elaborate_type(&param.ty, lookup);
        if matches!(param.ty, ast::TypeNode::ImplTrait { .. }) {
            if let Type::Var(v) = &ty {
                type_parameters.push(v.clone());
            }
        }
        args.push(ty);
    }
    FunctionRef {
        name: def.name.clone(),
        args,
        return_type: elaborate_return_type(def.return_type.as_ref(), lookup),
        type_parameters,
        association_trait: None,
        association_type: None,
        ast: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fen_ast::Span;

    fn named(name: &str) -> ast::TypeNode {
        ast::TypeNode::Named {
            name: name.to_string(),
            args: vec![],
            span: Span::new(0, 0),
        }
    }

    #[test]
    fn test_elaboration_is_syntactic() {
        // Unknown names elaborate to nominal references without resolution
        let ty = elaborate_type(&named("NotYetDefined"), &TypeLookupMap::new());
        assert_eq!(ty.name(), "NotYetDefined");
        assert!(!ty.is_var());
    }

    #[test]
    fn test_param_names_map_to_vars() {
        let params = vec![ast::TypeParam {
            name: "T".to_string(),
            bounds: vec![],
            span: Span::new(0, 0),
        }];
        let (vars, lookup) = elaborate_type_params(&params, &TypeLookupMap::new());
        assert_eq!(vars.len(), 1);
        let ty = elaborate_type(&named("T"), &lookup);
        assert_eq!(ty.as_var().map(|v| v.id), Some(vars[0].id));
    }

    #[test]
    fn test_bound_may_reference_sibling_param() {
        let params = vec![
            ast::TypeParam {
                name: "T".to_string(),
                bounds: vec![ast::TraitBound {
                    name: "Into".to_string(),
                    args: vec![named("U")],
                    span: Span::new(0, 0),
                }],
                span: Span::new(0, 0),
            },
            ast::TypeParam {
                name: "U".to_string(),
                bounds: vec![],
                span: Span::new(0, 0),
            },
        ];
        let (vars, _) = elaborate_type_params(&params, &TypeLookupMap::new());
        let constraint = &vars[0].constraints[0];
        assert_eq!(constraint.parameters[0].as_var().map(|v| v.id), Some(vars[1].id));
    }

    #[test]
    fn test_impl_trait_return_is_opaque() {
        let node = ast::TypeNode::ImplTrait {
            bounds: vec![ast::TraitBound {
                name: "Into".to_string(),
                args: vec![named("String")],
                span: Span::new(0, 0),
            }],
            span: Span::new(0, 0),
        };
        let ty = elaborate_return_type(Some(&node), &TypeLookupMap::new());
        let var = ty.as_var().expect("variable");
        assert!(var.opaque);
        assert_eq!(var.constraints.len(), 1);

        // argument position is constrained but not opaque
        let arg = elaborate_type(&node, &TypeLookupMap::new());
        assert!(!arg.as_var().expect("variable").opaque);
    }

    #[test]
    fn test_missing_return_is_unit() {
        assert_eq!(
            elaborate_return_type(None, &TypeLookupMap::new()),
            Type::named("Unit")
        );
    }
}
