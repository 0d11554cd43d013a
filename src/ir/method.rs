//! Method identifiers: `pkg/Class.name:(argsig)returnsig`.
//!
//! Grounded on spec.md §3 ("Method Identifier") and §6 (CLI positional
//! argument grammar); the original `method.h` only opaquely wraps a string,
//! so the parsing contract here is new structure filled in from spec.md.

use crate::types::TypeId;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodId {
    pub class_path: String,
    pub method_name: String,
    pub arg_sig: String,
    pub return_sig: String,
    raw: String,
}

impl MethodId {
    /// Parses `pkg/Class.name:(argsig)returnsig`.
    pub fn parse(raw: &str) -> Option<MethodId> {
        let (class_and_name, rest) = raw.split_once(':')?;
        let (class_path, method_name) = class_and_name.rsplit_once('.')?;
        let rest = rest.strip_prefix('(')?;
        let (arg_sig, return_sig) = rest.split_once(')')?;

        Some(MethodId {
            class_path: class_path.to_string(),
            method_name: method_name.to_string(),
            arg_sig: arg_sig.to_string(),
            return_sig: return_sig.to_string(),
            raw: raw.to_string(),
        })
    }

    pub fn arg_types(&self) -> Option<Vec<TypeId>> {
        TypeId::parse_many(&self.arg_sig)
    }

    pub fn return_type(&self) -> Option<TypeId> {
        TypeId::parse_one(&self.return_sig).map(|(ty, _)| ty)
    }

    /// The path to the decompiled JSON file for this method's class,
    /// relative to `jpamb_decompiled_path` (spec.md §6).
    pub fn class_json_path(&self) -> String {
        format!("{}.json", self.class_path)
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl std::fmt::Display for MethodId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}
