//! Embedder-facing pipeline configuration (spec §10.3).
//!
//! Mirrors the `CompilerConfig`/`ExternalBuiltin` builder shape this
//! crate's lineage uses elsewhere: a driver binary assembles one of these,
//! then hands it to the pipeline instead of reaching into
//! `registry`/`builtins` directly.

use std::fmt;

use serde::Deserialize;

use crate::registry::{CompileHelper, FunctionSignature, Namespace, OverloadBody, SignatureParam};
use crate::types::TypeId;

/// An extra function signature an embedder wants callable from Ember code
/// without declaring it in source (spec §10.3, grounded on the
/// `ExternalBuiltin` shape this crate's lineage uses elsewhere).
#[derive(Debug, Clone)]
pub struct ExternalFunction {
    /// The name used in Ember source.
    pub name: String,
    pub return_type: TypeId,
    pub params: Vec<(String, TypeId)>,
}

impl ExternalFunction {
    /// Validates `name` the same way `ExternalBuiltin::new` elsewhere in
    /// this lineage validates linker symbols, since this name is interned
    /// directly and must not collide with the synthesised-name delimiter
    /// `@@`.
    fn validate_name(name: &str) -> Result<(), String> {
        if name.is_empty() {
            return Err("external function name cannot be empty".to_string());
        }
        if name.contains("@@") {
            return Err(format!(
                "external function name '{name}' may not contain '@@' (reserved for synthesised names)"
            ));
        }
        Ok(())
    }

    /// # Panics
    /// Panics if `name` is empty or contains the reserved `@@` sequence.
    pub fn new(name: impl Into<String>, return_type: TypeId, params: Vec<(String, TypeId)>) -> Self {
        let name = name.into();
        Self::validate_name(&name).expect("invalid external function name");
        ExternalFunction { name, return_type, params }
    }
}

/// A compile-time evaluation helper (C4) an embedder wants registered
/// against a name, alongside the ordinary declared overloads for that name.
#[derive(Clone, Copy)]
pub struct ExternalCompileHelper {
    pub name: &'static str,
    pub helper: CompileHelper,
}

impl fmt::Debug for ExternalCompileHelper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalCompileHelper").field("name", &self.name).finish()
    }
}

/// Strictness knobs for the pipeline, loadable from TOML for the CLI
/// harness's `--config` flag (spec §10.3, §10.4).
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Strictness {
    /// Treat an ambiguous dispatch (spec §4.7) as a hard failure instead of
    /// a recoverable diagnostic that still allows sibling inference to
    /// continue.
    #[serde(default)]
    pub ambiguous_dispatch_is_fatal: bool,
}

/// Embedder-facing configuration for a semantic analysis run.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub external_functions: Vec<ExternalFunction>,
    pub compile_helpers: Vec<ExternalCompileHelper>,
    pub strictness: Strictness,
}

impl PipelineConfig {
    pub fn new() -> Self {
        PipelineConfig::default()
    }

    pub fn with_external_function(mut self, function: ExternalFunction) -> Self {
        self.external_functions.push(function);
        self
    }

    pub fn with_compile_helper(mut self, name: &'static str, helper: CompileHelper) -> Self {
        self.compile_helpers.push(ExternalCompileHelper { name, helper });
        self
    }

    pub fn with_strictness(mut self, strictness: Strictness) -> Self {
        self.strictness = strictness;
        self
    }

    /// Loads strictness settings from a TOML document; unknown keys are
    /// ignored, matching this lineage's tolerant config-file parsing
    /// elsewhere.
    pub fn load_toml(toml_source: &str) -> Result<Strictness, String> {
        toml::from_str(toml_source).map_err(|e| format!("failed to parse pipeline config: {e}"))
    }

    /// Registers every external function and compile helper into `namespace`.
    /// Called once, before lowering, by the pipeline orchestration in
    /// `lib.rs`.
    pub fn apply(&self, namespace: &mut Namespace) {
        for function in &self.external_functions {
            let name = namespace.intern(&function.name);
            let params = function
                .params
                .iter()
                .map(|(param_name, type_id)| SignatureParam {
                    name: namespace.intern(param_name),
                    type_id: *type_id,
                    is_reference: false,
                    literal_payload: None,
                    nested_signature: None,
                    template_param: None,
                })
                .collect();
            let signature = FunctionSignature { return_type: function.return_type, params };
            namespace.declare_function(name, signature, OverloadBody::Extern);
        }
        for helper in &self.compile_helpers {
            let name = namespace.intern(helper.name);
            namespace.register_compile_helper(name, helper.helper);
        }
    }

    /// Names of all external functions (for input-contract validation, if
    /// an embedder wants to pre-check calls before lowering).
    pub fn external_names(&self) -> Vec<&str> {
        self.external_functions.iter().map(|f| f.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PrimitiveType;

    #[test]
    fn external_function_new_rejects_reserved_delimiter() {
        let result = std::panic::catch_unwind(|| {
            ExternalFunction::new("bad@@name", PrimitiveType::Void.type_id(), vec![])
        });
        assert!(result.is_err());
    }

    #[test]
    fn config_builder_accumulates_external_functions() {
        let config = PipelineConfig::new()
            .with_external_function(ExternalFunction::new(
                "log",
                PrimitiveType::Void.type_id(),
                vec![("message".to_string(), PrimitiveType::StringT.type_id())],
            ))
            .with_strictness(Strictness { ambiguous_dispatch_is_fatal: true });

        assert_eq!(config.external_functions.len(), 1);
        assert!(config.strictness.ambiguous_dispatch_is_fatal);
        assert_eq!(config.external_names(), vec!["log"]);
    }

    #[test]
    fn apply_declares_external_functions_on_the_namespace() {
        let mut ns = Namespace::new("t.ember");
        let config = PipelineConfig::new().with_external_function(ExternalFunction::new(
            "log",
            PrimitiveType::Void.type_id(),
            vec![],
        ));
        config.apply(&mut ns);
        let log = ns.intern("log");
        assert!(ns.has_function(log));
    }

    #[test]
    fn load_toml_parses_strictness_flag() {
        let strictness = PipelineConfig::load_toml("ambiguous_dispatch_is_fatal = true").unwrap();
        assert!(strictness.ambiguous_dispatch_is_fatal);
    }

    #[test]
    fn load_toml_defaults_missing_keys() {
        let strictness = PipelineConfig::load_toml("").unwrap();
        assert!(!strictness.ambiguous_dispatch_is_fatal);
    }
}
