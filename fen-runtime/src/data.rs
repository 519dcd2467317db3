// Runtime object model.
//
// Every value crossing a trait-polymorphic boundary is a `DataObject`:
// a payload plus a back-pointer to its type's `DataMeta`, which carries the
// two-level method table `method -> trait_key -> function`. Metas live in a
// central store and are addressed by index, never by owned pointer.

use crate::natives::NativeFn;
use crate::RuntimeError;
use std::collections::HashMap;
use std::rc::Rc;

pub type MetaId = usize;

/// A callable installed in a method table: either the mangled name of an
/// emitted function, or a native bridge function.
#[derive(Clone)]
pub enum FunctionObject {
    Named(String),
    Native(NativeFn),
}

impl std::fmt::Debug for FunctionObject {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            FunctionObject::Named(name) => write!(f, "Named({})", name),
            FunctionObject::Native(_) => write!(f, "Native(..)"),
        }
    }
}

/// Per-type runtime metadata: the type key and its method table.
#[derive(Debug, Default)]
pub struct DataMeta {
    pub name: String,
    pub vtable: HashMap<String, HashMap<String, FunctionObject>>,
}

impl DataMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vtable: HashMap::new(),
        }
    }
}

/// Value payload
#[derive(Debug)]
pub enum Data {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Unit,
    Record(HashMap<String, Value>),
}

#[derive(Debug)]
pub struct DataObject {
    pub data: Data,
    pub meta: MetaId,
}

/// Shared handle to a runtime object. Cloning is cheap; the surface
/// language has no mutation of object fields, so sharing is safe.
#[derive(Debug, Clone)]
pub struct Value(pub Rc<DataObject>);

impl Value {
    pub fn new(data: Data, meta: MetaId) -> Self {
        Value(Rc::new(DataObject { data, meta }))
    }

    pub fn meta(&self) -> MetaId {
        self.0.meta
    }

    pub fn as_int(&self) -> Result<i64, RuntimeError> {
        match self.0.data {
            Data::Int(v) => Ok(v),
            _ => Err(RuntimeError::TypeError(format!(
                "expected Int, got {:?}",
                self.0.data
            ))),
        }
    }

    pub fn as_float(&self) -> Result<f64, RuntimeError> {
        match self.0.data {
            Data::Float(v) => Ok(v),
            _ => Err(RuntimeError::TypeError(format!(
                "expected Float, got {:?}",
                self.0.data
            ))),
        }
    }

    pub fn as_bool(&self) -> Result<bool, RuntimeError> {
        match self.0.data {
            Data::Bool(v) => Ok(v),
            _ => Err(RuntimeError::TypeError(format!(
                "expected Bool, got {:?}",
                self.0.data
            ))),
        }
    }

    pub fn as_str(&self) -> Result<&str, RuntimeError> {
        match &self.0.data {
            Data::Str(v) => Ok(v),
            _ => Err(RuntimeError::TypeError(format!(
                "expected String, got {:?}",
                self.0.data
            ))),
        }
    }
}

/// Result of an attribute lookup: a vtable row wins over a data field of
/// the same name.
pub enum Attr<'a> {
    Methods(&'a HashMap<String, FunctionObject>),
    Field(Value),
}

/// Process-wide store of `DataMeta` records, keyed by mangled type key.
/// Interns a meta on first touch so `Box<Int>` and `Box<String>` get
/// distinct method tables.
#[derive(Debug, Default)]
pub struct MetaManager {
    metas: Vec<DataMeta>,
    index: HashMap<String, MetaId>,
}

impl MetaManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create_meta(&mut self, type_key: &str) -> MetaId {
        if let Some(&id) = self.index.get(type_key) {
            return id;
        }
        let id = self.metas.len();
        self.metas.push(DataMeta::new(type_key));
        self.index.insert(type_key.to_string(), id);
        id
    }

    pub fn lookup(&self, type_key: &str) -> Option<MetaId> {
        self.index.get(type_key).copied()
    }

    pub fn meta(&self, id: MetaId) -> &DataMeta {
        &self.metas[id]
    }

    /// Install an entry in `type_key`'s method table.
    pub fn register_method(
        &mut self,
        type_key: &str,
        method: &str,
        trait_key: &str,
        function: FunctionObject,
    ) {
        let id = self.get_or_create_meta(type_key);
        self.metas[id]
            .vtable
            .entry(method.to_string())
            .or_default()
            .insert(trait_key.to_string(), function);
    }

    pub fn has_method(&self, type_key: &str, method: &str, trait_key: &str) -> bool {
        self.lookup(type_key)
            .and_then(|id| self.metas[id].vtable.get(method))
            .map_or(false, |row| row.contains_key(trait_key))
    }

    pub fn make_object(&mut self, type_key: &str, data: Data) -> Value {
        let meta = self.get_or_create_meta(type_key);
        Value::new(data, meta)
    }

    /// Attribute lookup on a value: the method table is consulted before
    /// the data fields, so a method and a field sharing a name both work.
    pub fn attr<'a>(&'a self, value: &Value, name: &str) -> Option<Attr<'a>> {
        let meta = self.meta(value.meta());
        if let Some(row) = meta.vtable.get(name) {
            return Some(Attr::Methods(row));
        }
        match &value.0.data {
            Data::Record(fields) => fields.get(name).cloned().map(Attr::Field),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_interned_by_key() {
        let mut metas = MetaManager::new();
        let a = metas.get_or_create_meta("Box_p_Int_q_");
        let b = metas.get_or_create_meta("Box_p_Int_q_");
        let c = metas.get_or_create_meta("Box_p_String_q_");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_vtable_preferred_over_field() {
        let mut metas = MetaManager::new();
        let mut fields = HashMap::new();
        metas.register_method(
            "A",
            "say",
            "Say",
            FunctionObject::Named("Say_for_A___say".to_string()),
        );
        let id = metas.get_or_create_meta("A");
        fields.insert("say".to_string(), Value::new(Data::Int(1), id));
        let value = metas.make_object("A", Data::Record(fields));

        match metas.attr(&value, "say") {
            Some(Attr::Methods(row)) => {
                assert!(row.contains_key("Say"));
            }
            _ => panic!("expected vtable entry to win"),
        }
    }

    #[test]
    fn test_field_lookup_when_no_method() {
        let mut metas = MetaManager::new();
        let int_meta = metas.get_or_create_meta("Int");
        let mut fields = HashMap::new();
        fields.insert("item".to_string(), Value::new(Data::Int(41), int_meta));
        let value = metas.make_object("Box_p_Int_q_", Data::Record(fields));

        match metas.attr(&value, "item") {
            Some(Attr::Field(v)) => assert_eq!(v.as_int().expect("int"), 41),
            _ => panic!("expected field"),
        }
        assert!(metas.attr(&value, "missing").is_none());
    }
}
