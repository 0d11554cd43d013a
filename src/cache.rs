//! Process-wide IR Program Cache (spec.md §4.1).
//!
//! Grounded on spec.md §4.1 and the design notes' "initialized explicitly at
//! startup... no lazy-on-first-use without a documented order": the map
//! itself is a `OnceLock<Mutex<HashMap<...>>>`, the same shape as
//! [`crate::types`]'s interner, but population is an explicit
//! single-critical-section `get_or_build` rather than an implicit
//! lazy-static initializer — a cache miss loads JSON from disk, parses
//! instructions, builds the CFG and computes RPO all while holding the lock,
//! so a racing reader either finds nothing and builds it itself (serialized
//! by the same mutex) or observes a fully-built triple, never a partial one.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use tracing::{debug, instrument};

use crate::cfg::Cfg;
use crate::error::AnalyzerError;
use crate::ir::function::IrFunction;
use crate::ir::method::MethodId;
use crate::ir::parser;

/// The cached triple for one method: its lifted IR, the CFG built over it,
/// and the locals-array size method bodies are expected to need (the
/// argument count; `STORE` grows it further as the VM runs).
pub struct CacheEntry {
    pub ir: Arc<IrFunction>,
    pub cfg: Cfg,
    pub num_locals: usize,
}

type Cache = HashMap<String, Arc<CacheEntry>>;

fn cache() -> &'static Mutex<Cache> {
    static CACHE: OnceLock<Mutex<Cache>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Returns the cached `(IrFunction, Cfg, num_locals)` triple for `method`,
/// building it under a single critical section on first request.
#[instrument(skip(decompiled_path))]
pub fn get_or_build(decompiled_path: &str, method: &MethodId) -> Result<Arc<CacheEntry>, AnalyzerError> {
    let num_locals = method.arg_types().map(|t| t.len()).unwrap_or(0);
    get_or_build_by_name(decompiled_path, &method.class_path, &method.method_name, num_locals)
}

/// Resolves a callee reached via `INVOKE`, which carries a class and method
/// name but no full `argsig)returnsig` signature string — so it is keyed
/// and built the same way, without needing a parsed [`MethodId`].
pub fn get_or_build_by_name(
    decompiled_path: &str,
    class_path: &str,
    method_name: &str,
    num_locals_hint: usize,
) -> Result<Arc<CacheEntry>, AnalyzerError> {
    let key = format!("{class_path}.{method_name}");

    {
        let guard = cache().lock().unwrap();
        if let Some(entry) = guard.get(&key) {
            return Ok(Arc::clone(entry));
        }
    }

    let mut guard = cache().lock().unwrap();
    if let Some(entry) = guard.get(&key) {
        return Ok(Arc::clone(entry));
    }

    debug!(class_path, method_name, "building IR cache entry");
    let path = std::path::Path::new(decompiled_path).join(format!("{class_path}.json"));
    let text = std::fs::read_to_string(&path)?;
    let class = parser::parse_class(&text)?;
    let method_entry =
        parser::find_method(&class, method_name).ok_or_else(|| AnalyzerError::UnknownMethod(key.clone()))?;
    let ir = parser::parse_bytecode(method_entry)?;
    let cfg = Cfg::build(&ir).map_err(AnalyzerError::CfgBuild)?;

    let entry = Arc::new(CacheEntry { ir: Arc::new(ir), cfg, num_locals: num_locals_hint });
    guard.insert(key, Arc::clone(&entry));
    Ok(entry)
}

/// Adapts the cache to [`crate::vm::MethodResolver`] so `INVOKE` can reach
/// it without the VM depending on the filesystem directly.
pub struct CacheResolver {
    pub decompiled_path: String,
}

impl crate::vm::MethodResolver for CacheResolver {
    fn resolve(&self, class_path: &str, method_name: &str) -> Option<Arc<CacheEntry>> {
        get_or_build_by_name(&self.decompiled_path, class_path, method_name, 0).ok()
    }
}

/// Empties the cache. The design notes call for explicit teardown of
/// process-wide singletons rather than relying on process exit.
pub fn teardown() {
    cache().lock().unwrap().clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_method_is_a_fatal_error() {
        let dir = std::env::temp_dir().join(format!("bytecode_analyzer_cache_test_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("pkg/Foo.json"), "{}").ok();
        std::fs::write(dir.join("Foo.json"), r#"{"methods": []}"#).unwrap();

        let method = MethodId::parse("Foo.bar:()I").unwrap();
        let result = get_or_build(dir.to_str().unwrap(), &method);
        assert!(result.is_err());
    }
}
