// Unification-like binding between declared and observed types.
//
// A binder is a small per-call value: each call site, struct initializer
// and impl lookup builds its own and throws it away. Resolution is
// one-directional: only the declared side may contain this binder's
// variables; observed-side variables from an enclosing context are
// substituted before resolution ever reaches here.

use crate::trait_impls::TraitImpls;
use crate::types::{
    bind_function_ref, bind_trait_ref, bind_type, Binds, FunctionRef, TraitImplDef, TraitRef, Type,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BindError {
    #[error("type `{var}` is already bound to `{existing}` and cannot bind to `{incoming}`")]
    Conflict {
        var: String,
        existing: String,
        incoming: String,
    },
    #[error("cannot bind `{ty}` to `{var}`: constraint `{constraint}` is not met")]
    Constraint {
        var: String,
        ty: String,
        constraint: String,
    },
    #[error("expected type `{expected}` but got `{got}`")]
    Mismatch { expected: String, got: String },
    #[error("both sides of an impl binding are unknown")]
    EmptyQuery,
}

pub struct TypeBinder<'a> {
    trait_impls: &'a TraitImpls,
    binds: Binds,
}

impl<'a> TypeBinder<'a> {
    pub fn new(trait_impls: &'a TraitImpls) -> Self {
        Self {
            trait_impls,
            binds: Binds::new(),
        }
    }

    pub fn with_binds(trait_impls: &'a TraitImpls, binds: Binds) -> Self {
        Self { trait_impls, binds }
    }

    pub fn binds(&self) -> &Binds {
        &self.binds
    }

    pub fn into_binds(self) -> Binds {
        self.binds
    }

    /// Unify a declared type against an observed one, recording bindings
    /// for every declared-side variable. `Any` on either side is a
    /// wildcard. Rebinding a variable to a different type fails; binding a
    /// variable to a type that misses one of its constraints fails.
    pub fn resolve(&mut self, defined: &Type, observed: &Type) -> Result<(), BindError> {
        match defined {
            Type::Var(var) => {
                if let Some(existing) = self.binds.get(var) {
                    if existing == observed {
                        return Ok(());
                    }
                    return Err(BindError::Conflict {
                        var: var.name.clone(),
                        existing: existing.to_string(),
                        incoming: observed.to_string(),
                    });
                }
                for constraint in &var.constraints {
                    if !self.trait_impls.satisfies(observed, constraint) {
                        return Err(BindError::Constraint {
                            var: var.name.clone(),
                            ty: observed.to_string(),
                            constraint: constraint.to_string(),
                        });
                    }
                }
                self.binds.insert(var.clone(), observed.clone());
                Ok(())
            }
            Type::Ref(dref) => {
                if defined.name().eq_ignore_ascii_case("any")
                    || observed.name().eq_ignore_ascii_case("any")
                {
                    return Ok(());
                }
                if defined.name() != observed.name() {
                    return Err(BindError::Mismatch {
                        expected: defined.to_string(),
                        got: observed.to_string(),
                    });
                }
                if let Type::Ref(oref) = observed {
                    for (d, o) in dref.parameters.iter().zip(&oref.parameters) {
                        self.resolve(d, o)?;
                    }
                }
                Ok(())
            }
        }
    }

    /// Unify two trait instantiations parameter-wise.
    pub fn resolve_trait(
        &mut self,
        defined: &TraitRef,
        observed: &TraitRef,
    ) -> Result<(), BindError> {
        if defined.name != observed.name {
            return Err(BindError::Mismatch {
                expected: defined.to_string(),
                got: observed.to_string(),
            });
        }
        for (d, o) in defined.parameters.iter().zip(&observed.parameters) {
            self.resolve(d, o)?;
        }
        Ok(())
    }

    /// Substitute the accumulated bindings through a type.
    pub fn bind(&self, ty: &Type) -> Type {
        bind_type(ty, &self.binds)
    }

    pub fn bind_trait(&self, tr: &TraitRef) -> TraitRef {
        bind_trait_ref(tr, &self.binds)
    }

    pub fn bind_function(&self, f: &FunctionRef) -> FunctionRef {
        bind_function_ref(f, &self.binds)
    }

    /// Produce a copy of an impl with this binder's substitution applied
    /// through the trait, the target, every type parameter and every
    /// function signature. The bound functions point back at the bound
    /// trait/target, and the binding map travels with the result.
    pub fn bind_impl(&self, impl_def: &TraitImplDef) -> TraitImplDef {
        let trait_ref = self.bind_trait(&impl_def.trait_ref);
        let target_type = self.bind(&impl_def.target_type);

        let mut type_parameters = Vec::new();
        for param in &impl_def.type_parameters {
            match self.binds.get(param) {
                Some(Type::Var(v)) => type_parameters.push(v.clone()),
                Some(_) => {} // fully resolved, no longer a parameter
                None => type_parameters.push(param.clone()),
            }
        }

        let functions = impl_def
            .functions
            .iter()
            .map(|f| {
                let mut bound = self.bind_function(f);
                bound.association_trait = Some(trait_ref.clone());
                bound.association_type = Some(target_type.clone());
                bound
            })
            .collect();

        TraitImplDef {
            trait_ref,
            target_type,
            type_parameters,
            functions,
            binds: self.binds.clone(),
        }
    }

    /// Seed the binder from a query (`real_target` and/or `real_trait`)
    /// and return the bound impl.
    pub fn resolve_impl_and_bind(
        mut self,
        impl_def: &TraitImplDef,
        real_trait: Option<&TraitRef>,
        real_target: Option<&Type>,
    ) -> Result<TraitImplDef, BindError> {
        if real_trait.is_none() && real_target.is_none() {
            return Err(BindError::EmptyQuery);
        }
        if let Some(tr) = real_trait {
            self.resolve_trait(&impl_def.trait_ref, tr)?;
        }
        if let Some(target) = real_target {
            self.resolve(&impl_def.target_type, target)?;
        }
        Ok(self.bind_impl(impl_def))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TypeRef, TypeVar};

    fn int() -> Type {
        Type::named("Int")
    }

    #[test]
    fn test_resolve_then_bind_round_trip() {
        // resolve(X, T) followed by bind(X) == T for any concrete T
        let impls = TraitImpls::new();
        let x = TypeVar::fresh("X", vec![]);
        let var = Type::Var(x);
        for concrete in [int(), Type::Ref(TypeRef::parametric("Box", vec![int()]))] {
            let mut binder = TypeBinder::new(&impls);
            binder.resolve(&var, &concrete).expect("resolve");
            assert_eq!(binder.bind(&var), concrete);
        }
    }

    #[test]
    fn test_nested_binding() {
        // A<B<T1, T2>> against A<B<String, Int>> binds T1=String, T2=Int
        let impls = TraitImpls::new();
        let t1 = TypeVar::fresh("T1", vec![]);
        let t2 = TypeVar::fresh("T2", vec![]);
        let defined = Type::Ref(TypeRef::parametric(
            "A",
            vec![Type::Ref(TypeRef::parametric(
                "B",
                vec![Type::Var(t1.clone()), Type::Var(t2.clone())],
            ))],
        ));
        let observed = Type::Ref(TypeRef::parametric(
            "A",
            vec![Type::Ref(TypeRef::parametric(
                "B",
                vec![Type::named("String"), int()],
            ))],
        ));
        let mut binder = TypeBinder::new(&impls);
        binder.resolve(&defined, &observed).expect("resolve");
        assert_eq!(binder.bind(&Type::Var(t1)), Type::named("String"));
        assert_eq!(binder.bind(&Type::Var(t2)), int());
    }

    #[test]
    fn test_conflicting_rebind_fails() {
        // A<B<T, T>> against A<B<String, Int>> cannot bind T both ways
        let impls = TraitImpls::new();
        let t = TypeVar::fresh("T", vec![]);
        let defined = Type::Ref(TypeRef::parametric(
            "B",
            vec![Type::Var(t.clone()), Type::Var(t)],
        ));
        let observed = Type::Ref(TypeRef::parametric(
            "B",
            vec![Type::named("String"), int()],
        ));
        let mut binder = TypeBinder::new(&impls);
        assert!(matches!(
            binder.resolve(&defined, &observed),
            Err(BindError::Conflict { .. })
        ));
    }

    #[test]
    fn test_constraint_violation_on_bind() {
        let impls = TraitImpls::new();
        let t = TypeVar::fresh("T", vec![TraitRef::named("Printable")]);
        let mut binder = TypeBinder::new(&impls);
        assert!(matches!(
            binder.resolve(&Type::Var(t), &int()),
            Err(BindError::Constraint { .. })
        ));
    }

    #[test]
    fn test_any_is_a_wildcard() {
        let impls = TraitImpls::new();
        let mut binder = TypeBinder::new(&impls);
        binder.resolve(&Type::named("Any"), &int()).expect("any");
        binder.resolve(&int(), &Type::named("Any")).expect("any");
    }

    #[test]
    fn test_name_mismatch() {
        let impls = TraitImpls::new();
        let mut binder = TypeBinder::new(&impls);
        assert!(matches!(
            binder.resolve(&int(), &Type::named("String")),
            Err(BindError::Mismatch { .. })
        ));
    }
}
