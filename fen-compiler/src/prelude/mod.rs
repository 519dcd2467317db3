/// Embedded prelude source, compiled into the binary.
///
/// The prelude registers the standard `Ops`, `Compare` and `ToString`
/// traits with impls for the primitive types, plus a generic `print`.
/// It goes through the same pipeline as user code; the only things the
/// compiler installs directly are the primitive type symbols and the
/// typed signatures of the native bridge functions.
pub const PRELUDE: &str = include_str!("prelude.fen");

use crate::types::{FunctionRef, Type};
use fen_runtime::NATIVE_SIGNATURES;

/// Typed function symbols for every native bridge function.
pub fn native_function_refs() -> Vec<FunctionRef> {
    NATIVE_SIGNATURES
        .iter()
        .map(|(name, args, ret)| FunctionRef {
            name: (*name).to_string(),
            args: args.iter().map(|a| Type::named(*a)).collect(),
            return_type: Type::named(*ret),
            type_parameters: Vec::new(),
            association_trait: None,
            association_type: None,
            ast: None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prelude_source_not_empty() {
        assert!(!PRELUDE.is_empty());
        assert!(PRELUDE.contains("trait Ops"));
        assert!(PRELUDE.contains("trait Compare"));
        assert!(PRELUDE.contains("trait ToString"));
    }

    #[test]
    fn test_native_refs_cover_bridge_table() {
        let refs = native_function_refs();
        assert_eq!(refs.len(), NATIVE_SIGNATURES.len());
        assert!(refs.iter().any(|f| f.name == "echo"));
        assert!(refs.iter().any(|f| f.name == "int_to_string"));
    }
}
