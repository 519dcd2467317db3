// Symbol and scope management.
//
// Scopes live in an arena and are addressed by index: entering pushes a
// child of the current scope, exiting moves the cursor back up, and the
// scope data persists so later stages can re-enter the scope recorded for
// any AST node. Each scope partitions its names into four independent
// namespaces (variables, types, traits, generic parameters); a struct, a
// trait and a variable may share a name without collision.

use crate::types::{FunctionRef, StructId, TraitId, Type, TypeVar};
use std::collections::HashMap;

pub type ScopeId = usize;

/// Value-namespace symbol
#[derive(Debug, Clone)]
pub enum Symbol {
    Var { name: String, ty: Type },
    Function { name: String, func: FunctionRef },
    /// A top-level `let` registered in stage 1; upgraded to a typed symbol
    /// when stage 2 reaches the initializer.
    Placeholder { name: String },
}

impl Symbol {
    pub fn name(&self) -> &str {
        match self {
            Symbol::Var { name, .. }
            | Symbol::Function { name, .. }
            | Symbol::Placeholder { name } => name,
        }
    }
}

/// Type-namespace symbol
#[derive(Debug, Clone)]
pub enum TypeSymbol {
    Primitive(String),
    Struct { name: String, def: StructId },
    /// `Self` inside an impl body: an alias for the target type
    Alias { name: String, ty: Type },
}

impl TypeSymbol {
    pub fn name(&self) -> &str {
        match self {
            TypeSymbol::Primitive(name) => name,
            TypeSymbol::Struct { name, .. } => name,
            TypeSymbol::Alias { name, .. } => name,
        }
    }
}

/// What a type-position name resolves to
#[derive(Debug, Clone)]
pub enum TypeLookup<'a> {
    Type(&'a TypeSymbol),
    Generic(&'a TypeVar),
}

#[derive(Debug, Default)]
pub struct Scope {
    pub parent: Option<ScopeId>,
    vars: HashMap<String, Symbol>,
    types: HashMap<String, TypeSymbol>,
    traits: HashMap<String, TraitId>,
    generics: HashMap<String, TypeVar>,
}

#[derive(Debug)]
pub struct ScopeManager {
    scopes: Vec<Scope>,
    current: ScopeId,
}

impl Default for ScopeManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeManager {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::default()],
            current: 0,
        }
    }

    pub fn global(&self) -> ScopeId {
        0
    }

    pub fn current(&self) -> ScopeId {
        self.current
    }

    pub fn enter(&mut self) -> ScopeId {
        let id = self.scopes.len();
        self.scopes.push(Scope {
            parent: Some(self.current),
            ..Scope::default()
        });
        self.current = id;
        id
    }

    pub fn exit(&mut self) {
        if let Some(parent) = self.scopes[self.current].parent {
            self.current = parent;
        }
    }

    // ---- insertion -------------------------------------------------------

    /// Add a value symbol; a name may not be declared twice in the same
    /// scope, except that a placeholder is upgraded in place.
    pub fn add_var(&mut self, scope: ScopeId, symbol: Symbol) -> Result<(), String> {
        let vars = &mut self.scopes[scope].vars;
        match vars.get(symbol.name()) {
            Some(Symbol::Placeholder { .. }) | None => {
                vars.insert(symbol.name().to_string(), symbol);
                Ok(())
            }
            Some(_) => Err(format!("`{}` already exists", symbol.name())),
        }
    }

    /// Replace a value symbol regardless of what is already there. Used
    /// when re-entering a function body under a specialization.
    pub fn replace_var(&mut self, scope: ScopeId, symbol: Symbol) -> Option<Symbol> {
        self.scopes[scope]
            .vars
            .insert(symbol.name().to_string(), symbol)
    }

    pub fn remove_var(&mut self, scope: ScopeId, name: &str) -> Option<Symbol> {
        self.scopes[scope].vars.remove(name)
    }

    pub fn add_type(&mut self, scope: ScopeId, symbol: TypeSymbol) -> Result<(), String> {
        let types = &mut self.scopes[scope].types;
        if types.contains_key(symbol.name()) {
            return Err(format!("type `{}` already exists", symbol.name()));
        }
        types.insert(symbol.name().to_string(), symbol);
        Ok(())
    }

    /// Traits always live in the global scope: impls may be declared for a
    /// trait anywhere in the program.
    pub fn add_trait(&mut self, name: &str, id: TraitId) -> Result<(), String> {
        let traits = &mut self.scopes[0].traits;
        if traits.contains_key(name) {
            return Err(format!("trait `{}` already exists", name));
        }
        traits.insert(name.to_string(), id);
        Ok(())
    }

    pub fn add_generic(&mut self, scope: ScopeId, var: TypeVar) -> Result<(), String> {
        let generics = &mut self.scopes[scope].generics;
        if generics.contains_key(&var.name) {
            return Err(format!("type parameter `{}` already exists", var.name));
        }
        generics.insert(var.name.clone(), var);
        Ok(())
    }

    // ---- lookup ----------------------------------------------------------

    pub fn lookup_var(&self, from: ScopeId, name: &str) -> Option<&Symbol> {
        self.walk(from, |scope| scope.vars.get(name))
    }

    /// Generic parameters shadow type names within their scope.
    pub fn lookup_type(&self, from: ScopeId, name: &str) -> Option<TypeLookup> {
        self.walk(from, |scope| {
            scope
                .generics
                .get(name)
                .map(TypeLookup::Generic)
                .or_else(|| scope.types.get(name).map(TypeLookup::Type))
        })
    }

    pub fn lookup_trait(&self, from: ScopeId, name: &str) -> Option<TraitId> {
        self.walk(from, |scope| scope.traits.get(name).copied())
    }

    /// Every visible value name, for "did you mean" suggestions.
    pub fn visible_var_names(&self, from: ScopeId) -> Vec<String> {
        let mut names = Vec::new();
        let mut cursor = Some(from);
        while let Some(id) = cursor {
            names.extend(self.scopes[id].vars.keys().cloned());
            cursor = self.scopes[id].parent;
        }
        names
    }

    fn walk<'a, T>(&'a self, from: ScopeId, f: impl Fn(&'a Scope) -> Option<T>) -> Option<T> {
        let mut cursor = Some(from);
        while let Some(id) = cursor {
            if let Some(hit) = f(&self.scopes[id]) {
                return Some(hit);
            }
            cursor = self.scopes[id].parent;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Type;

    fn var(name: &str) -> Symbol {
        Symbol::Var {
            name: name.to_string(),
            ty: Type::named("Int"),
        }
    }

    #[test]
    fn test_lookup_walks_to_root() {
        let mut scopes = ScopeManager::new();
        scopes.add_var(scopes.global(), var("x")).expect("add");
        let inner = scopes.enter();
        assert!(scopes.lookup_var(inner, "x").is_some());
        scopes.exit();
        assert_eq!(scopes.current(), scopes.global());
    }

    #[test]
    fn test_shadowing_across_scopes() {
        let mut scopes = ScopeManager::new();
        scopes.add_var(scopes.global(), var("x")).expect("add");
        let inner = scopes.enter();
        // same name in a child scope is fine
        scopes.add_var(inner, var("x")).expect("shadow");
    }

    #[test]
    fn test_duplicate_in_same_scope_rejected() {
        let mut scopes = ScopeManager::new();
        let g = scopes.global();
        scopes.add_var(g, var("x")).expect("add");
        assert!(scopes.add_var(g, var("x")).is_err());
    }

    #[test]
    fn test_placeholder_upgrade() {
        let mut scopes = ScopeManager::new();
        let g = scopes.global();
        scopes
            .add_var(
                g,
                Symbol::Placeholder {
                    name: "x".to_string(),
                },
            )
            .expect("placeholder");
        scopes.add_var(g, var("x")).expect("upgrade");
        assert!(matches!(
            scopes.lookup_var(g, "x"),
            Some(Symbol::Var { .. })
        ));
    }

    #[test]
    fn test_namespaces_are_independent() {
        let mut scopes = ScopeManager::new();
        let g = scopes.global();
        scopes.add_var(g, var("Point")).expect("var");
        scopes
            .add_type(
                g,
                TypeSymbol::Struct {
                    name: "Point".to_string(),
                    def: 0,
                },
            )
            .expect("type");
        scopes.add_trait("Point", 0).expect("trait");
        assert!(scopes.lookup_var(g, "Point").is_some());
        assert!(scopes.lookup_type(g, "Point").is_some());
        assert!(scopes.lookup_trait(g, "Point").is_some());
    }

    #[test]
    fn test_generic_shadows_type() {
        let mut scopes = ScopeManager::new();
        let g = scopes.global();
        scopes
            .add_type(g, TypeSymbol::Primitive("T".to_string()))
            .expect("type");
        let inner = scopes.enter();
        scopes
            .add_generic(inner, TypeVar::fresh("T", vec![]))
            .expect("generic");
        assert!(matches!(
            scopes.lookup_type(inner, "T"),
            Some(TypeLookup::Generic(_))
        ));
    }
}
