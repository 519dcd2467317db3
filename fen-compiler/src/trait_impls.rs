// Trait-implementation registry and the structural compatibility predicate
// that drives both impl applicability and argument/parameter matching.

use crate::binder::TypeBinder;
use crate::types::{TraitImplDef, TraitRef, Type, TypeVar};

#[derive(Debug, Default)]
pub struct TraitImpls {
    impls: Vec<TraitImplDef>,
}

impl TraitImpls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.impls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.impls.is_empty()
    }

    pub fn impl_at(&self, index: usize) -> &TraitImplDef {
        &self.impls[index]
    }

    /// Register an impl. Two impls with the same
    /// `(trait name, trait parameters, target type)` triple are rejected.
    pub fn add_impl(&mut self, impl_def: TraitImplDef) -> Result<(), String> {
        for existing in &self.impls {
            if existing.trait_ref == impl_def.trait_ref
                && existing.target_type == impl_def.target_type
            {
                return Err(format!(
                    "duplicate implementation of `{}` for `{}`",
                    impl_def.trait_ref, impl_def.target_type
                ));
            }
        }
        self.impls.push(impl_def);
        Ok(())
    }

    /// Every impl whose `(trait, target)` pattern is type-compatible with
    /// the query. With `need_bind`, each returned impl has its bindings
    /// freshly computed against the query; an impl whose binding fails is
    /// not compatible and is dropped.
    pub fn get_impl(
        &self,
        target: &Type,
        trait_ref: &TraitRef,
        need_bind: bool,
    ) -> Vec<TraitImplDef> {
        let mut hits = Vec::new();
        for impl_def in &self.impls {
            let matches = self.is_type_match(target, &impl_def.target_type)
                && trait_ref.name == impl_def.trait_ref.name
                && trait_ref.parameters.len() == impl_def.trait_ref.parameters.len()
                && impl_def
                    .trait_ref
                    .parameters
                    .iter()
                    .zip(&trait_ref.parameters)
                    .all(|(have, want)| self.is_type_match(have, want));
            if !matches {
                continue;
            }
            if need_bind {
                if let Some(bound) = self.bind_impl(impl_def, Some(trait_ref), Some(target)) {
                    hits.push(bound);
                }
            } else {
                hits.push(impl_def.clone());
            }
        }
        hits
    }

    /// One-sided search by target type, used by attribute lookup when the
    /// trait is unknown.
    pub fn get_impl_by_type(&self, target: &Type) -> Vec<TraitImplDef> {
        self.impls
            .iter()
            .filter(|impl_def| self.is_type_match(target, &impl_def.target_type))
            .filter_map(|impl_def| self.bind_impl(impl_def, None, Some(target)))
            .collect()
    }

    /// One-sided search by trait instantiation.
    pub fn get_impl_by_trait(&self, trait_ref: &TraitRef) -> Vec<TraitImplDef> {
        self.impls
            .iter()
            .filter(|impl_def| {
                trait_ref.name == impl_def.trait_ref.name
                    && trait_ref.parameters.len() == impl_def.trait_ref.parameters.len()
                    && impl_def
                        .trait_ref
                        .parameters
                        .iter()
                        .zip(&trait_ref.parameters)
                        .all(|(have, want)| self.is_type_match(have, want))
            })
            .filter_map(|impl_def| self.bind_impl(impl_def, Some(trait_ref), None))
            .collect()
    }

    fn bind_impl(
        &self,
        impl_def: &TraitImplDef,
        real_trait: Option<&TraitRef>,
        real_target: Option<&Type>,
    ) -> Option<TraitImplDef> {
        TypeBinder::new(self)
            .resolve_impl_and_bind(impl_def, real_trait, real_target)
            .ok()
    }

    /// Does the observed type `r1` satisfy the declared pattern `r2`?
    ///
    /// 1. Both concrete: names equal, parameters match recursively.
    /// 2. `r1` concrete, `r2` a variable: every constraint of `r2` must
    ///    have an impl for `r1` (no constraints accepts anything).
    /// 3. Both variables: `r2`'s constraints must all appear on `r1`.
    /// 4. `r1` a variable, `r2` concrete: never — a variable cannot narrow
    ///    to a concrete type no matter how constrained.
    pub fn is_type_match(&self, r1: &Type, r2: &Type) -> bool {
        match (r1, r2) {
            // case 4
            (Type::Var(_), Type::Ref(_)) => false,
            (_, Type::Var(v2)) => {
                // case 2 / 3
                for constraint in &v2.constraints {
                    match r1 {
                        Type::Var(v1) => {
                            if !v1.constraints.contains(constraint) {
                                return false;
                            }
                        }
                        Type::Ref(_) => {
                            if self.get_impl(r1, constraint, false).is_empty() {
                                return false;
                            }
                        }
                    }
                }
                true
            }
            // case 1
            (Type::Ref(ref1), Type::Ref(ref2)) => {
                if ref1.name != ref2.name {
                    return false;
                }
                if ref1.parameters.is_empty() {
                    return true;
                }
                if ref1.parameters.len() != ref2.parameters.len() {
                    return false;
                }
                ref1.parameters
                    .iter()
                    .zip(&ref2.parameters)
                    .all(|(p1, p2)| self.is_type_match(p1, p2))
            }
        }
    }

    /// Lift a trait reference to an anonymous constrained variable and
    /// match against it: "does `r1` implement `tr`".
    pub fn satisfies(&self, r1: &Type, tr: &TraitRef) -> bool {
        let lifted = Type::Var(TypeVar::fresh("_", vec![tr.clone()]));
        self.is_type_match(r1, &lifted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeRef;

    fn int() -> Type {
        Type::named("Int")
    }

    fn say_trait() -> TraitRef {
        TraitRef::named("Say")
    }

    fn say_for_int() -> TraitImplDef {
        TraitImplDef {
            trait_ref: say_trait(),
            target_type: int(),
            type_parameters: vec![],
            functions: vec![],
            binds: Default::default(),
        }
    }

    #[test]
    fn test_reflexivity() {
        let impls = TraitImpls::new();
        let boxed = Type::Ref(TypeRef::parametric("Box", vec![int()]));
        assert!(impls.is_type_match(&int(), &int()));
        assert!(impls.is_type_match(&boxed, &boxed));
    }

    #[test]
    fn test_unconstrained_var_is_top() {
        let impls = TraitImpls::new();
        let var = Type::Var(TypeVar::fresh("T", vec![]));
        assert!(impls.is_type_match(&int(), &var));
        assert!(impls.is_type_match(&Type::named("String"), &var));
        let other_var = Type::Var(TypeVar::fresh("U", vec![]));
        assert!(impls.is_type_match(&other_var, &var));
    }

    #[test]
    fn test_var_never_narrows_to_concrete() {
        let impls = TraitImpls::new();
        let var = Type::Var(TypeVar::fresh("T", vec![say_trait()]));
        assert!(!impls.is_type_match(&var, &int()));
    }

    #[test]
    fn test_constraint_requires_impl() {
        let mut impls = TraitImpls::new();
        let constrained = Type::Var(TypeVar::fresh("T", vec![say_trait()]));
        assert!(!impls.is_type_match(&int(), &constrained));
        impls.add_impl(say_for_int()).expect("register");
        assert!(impls.is_type_match(&int(), &constrained));
        assert!(!impls.is_type_match(&Type::named("String"), &constrained));
    }

    #[test]
    fn test_var_against_var_is_syntactic() {
        let impls = TraitImpls::new();
        let have = Type::Var(TypeVar::fresh("T", vec![say_trait()]));
        let want = Type::Var(TypeVar::fresh("U", vec![say_trait()]));
        assert!(impls.is_type_match(&have, &want));
        let unconstrained = Type::Var(TypeVar::fresh("V", vec![]));
        assert!(!impls.is_type_match(&unconstrained, &want));
    }

    #[test]
    fn test_duplicate_triple_rejected() {
        let mut impls = TraitImpls::new();
        impls.add_impl(say_for_int()).expect("first");
        assert!(impls.add_impl(say_for_int()).is_err());
    }

    #[test]
    fn test_get_impl_binds_to_query() {
        let mut impls = TraitImpls::new();
        // impl<T> Read<T> for Source<T>
        let t = TypeVar::fresh("T", vec![]);
        impls
            .add_impl(TraitImplDef {
                trait_ref: TraitRef {
                    name: "Read".to_string(),
                    parameters: vec![Type::Var(t.clone())],
                },
                target_type: Type::Ref(TypeRef::parametric(
                    "Source",
                    vec![Type::Var(t.clone())],
                )),
                type_parameters: vec![t],
                functions: vec![],
                binds: Default::default(),
            })
            .expect("register");

        let query_target = Type::Ref(TypeRef::parametric("Source", vec![int()]));
        let query_trait = TraitRef {
            name: "Read".to_string(),
            parameters: vec![int()],
        };
        let hits = impls.get_impl(&query_target, &query_trait, true);
        assert_eq!(hits.len(), 1);
        // after binding, the impl mirrors the query structurally
        assert_eq!(hits[0].target_type, query_target);
        assert_eq!(hits[0].trait_ref, query_trait);
    }

    #[test]
    fn test_one_sided_searches() {
        let mut impls = TraitImpls::new();
        impls.add_impl(say_for_int()).expect("register");
        assert_eq!(impls.get_impl_by_type(&int()).len(), 1);
        assert_eq!(impls.get_impl_by_type(&Type::named("Float")).len(), 0);
        assert_eq!(impls.get_impl_by_trait(&say_trait()).len(), 1);
    }
}
