//! Ember Semantic Analysis Core
//!
//! Lowers a parsed Ember program into typed IR, resolving names, overloads,
//! templates, and dispatch, and reports every recoverable failure as a
//! [`diagnostics::Diagnostic`] rather than aborting the run (spec §7).
//!
//! # Example
//!
//! ```rust,ignore
//! use embersem::{PipelineConfig, analyze_program};
//!
//! let config = PipelineConfig::new().with_strictness(Default::default());
//! let outcome = analyze_program("main.ember", source_text, &parse_tree, &config);
//! if outcome.diagnostics().has_errors() {
//!     for diagnostic in outcome.diagnostics().iter() {
//!         eprintln!("{diagnostic}");
//!     }
//! }
//! ```

pub mod ast;
pub mod builtins;
pub mod config;
pub mod diagnostics;
pub mod dispatch;
pub mod evaluator;
pub mod infer;
pub mod instantiate;
pub mod ir;
pub mod lower;
pub mod registry;
pub mod types;
pub mod validate;
pub mod visitor;

pub use config::{ExternalFunction, PipelineConfig, Strictness};
pub use diagnostics::{Diagnostic, DiagnosticBag, DiagnosticKind};
pub use ir::Function;
pub use registry::Namespace;
pub use visitor::SemanticVisitor;

/// The result of running the full pipeline once: the typed IR, ready to
/// hand to a [`visitor::SemanticVisitor`], plus the namespace it is
/// anchored in (needed to resolve `Handle`s and read diagnostics).
pub struct AnalysisOutcome {
    pub namespace: Namespace,
    pub functions: Vec<Function>,
}

impl AnalysisOutcome {
    pub fn diagnostics(&self) -> &DiagnosticBag {
        self.namespace.diagnostics_ref()
    }
}

/// Runs the pipeline (spec §2: lower, then drive type inference to a fixed
/// point, calling into the compile-time evaluator, template instantiator,
/// and dispatcher synthesiser as needed, then validate) over one parsed
/// program.
///
/// `file_name` anchors reported diagnostics; `source` is the original
/// source text lowering uses to translate byte offsets into line/column
/// positions (spec §6).
pub fn analyze_program(
    file_name: impl Into<String>,
    source: &str,
    program: &ast::ParseProgram,
    config: &PipelineConfig,
) -> AnalysisOutcome {
    let mut namespace = Namespace::new(file_name.into());
    builtins::register_builtins(&mut namespace);
    config.apply(&mut namespace);

    let mut functions = {
        let _span = tracing::debug_span!("lower").entered();
        let mut lowerer = lower::Lowerer::new(&mut namespace, source);
        lowerer.lower_program(program)
    };

    {
        let _span = tracing::debug_span!("infer").entered();
        let mut inferer = infer::Inferer::new(&mut namespace);
        inferer.infer_program(&mut functions);
    }

    {
        let _span = tracing::debug_span!("validate").entered();
        validate::validate_program(&mut namespace, &functions);
    }

    if config.strictness.ambiguous_dispatch_is_fatal {
        let has_ambiguous = namespace
            .diagnostics_ref()
            .iter()
            .any(|d| d.kind == DiagnosticKind::AmbiguousDispatch);
        if has_ambiguous {
            tracing::error!("ambiguous dispatch treated as fatal by pipeline configuration");
        }
    }

    AnalysisOutcome { namespace, functions }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_program() -> ast::ParseProgram {
        ast::ParseProgram {
            structures: vec![],
            sum_types: vec![],
            weak_aliases: vec![],
            strong_aliases: vec![],
            functions: vec![],
        }
    }

    #[test]
    fn analyzing_an_empty_program_reports_nothing() {
        let outcome = analyze_program("empty.ember", "", &empty_program(), &PipelineConfig::new());
        assert!(!outcome.diagnostics().has_errors());
        assert!(outcome.functions.is_empty());
    }

    #[test]
    fn unresolved_function_call_is_reported_as_a_diagnostic() {
        let program = ast::ParseProgram {
            functions: vec![ast::ParseFunction {
                name: "main".to_string(),
                params: vec![],
                return_expression: None,
                body: Some(ast::ParseCodeBlock {
                    entries: vec![ast::ParseCodeEntry::Statement(ast::ParseStatement {
                        name: "undeclared-word".to_string(),
                        params: vec![],
                        at: 0,
                    })],
                }),
                tags: vec![],
                template_params: vec![],
                at: 0,
            }],
            ..empty_program()
        };
        let outcome = analyze_program("bad.ember", "", &program, &PipelineConfig::new());
        assert!(outcome.diagnostics().has_errors());
    }
}
