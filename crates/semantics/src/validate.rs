//! C8: the validator (spec §4.8).
//!
//! Runs once inference has reached its fixed point. Every inferable node
//! carries a type that is either concrete, `error`, or (if a bug left it
//! untouched) still `infer`; this pass treats the latter two identically —
//! a node that isn't concrete after inference is reported once, here,
//! rather than at every downstream consumer. Grounded on the scattered
//! `Validate()` walk over already-type-checked AST nodes this crate's
//! lineage uses elsewhere, which likewise re-traverses the whole tree just
//! to confirm it, rather than accumulating validation state during
//! inference itself.

use crate::diagnostics::{Diagnostic, DiagnosticKind, SourceLocation};
use crate::ir::{
    AssignmentRhs, CodeBlock, CodeEntry, Entity, Expression, Function, InferenceState, Statement,
};
use crate::registry::Namespace;
use crate::types::TypeId;

/// Validates every function in a lowered, inferred program. Diagnostics are
/// reported through the namespace's bag; callers should check
/// `namespace.diagnostics_ref().has_errors()` afterward.
pub fn validate_program(namespace: &mut Namespace, functions: &[Function]) {
    for function in functions {
        validate_function(namespace, function);
    }
}

fn report(namespace: &mut Namespace, kind: DiagnosticKind, message: String) {
    let file = namespace.file_name.clone();
    namespace
        .diagnostics()
        .report(Diagnostic::new(kind, message, file, SourceLocation::default()));
}

fn concrete_or_report(namespace: &mut Namespace, type_id: TypeId, context: &str) {
    if type_id.is_error() {
        report(
            namespace,
            DiagnosticKind::TypeMismatch,
            format!("{context} never resolved to a concrete type"),
        );
    } else if type_id.is_infer() {
        report(
            namespace,
            DiagnosticKind::TypeMismatch,
            format!("{context} was never visited by inference"),
        );
    }
}

fn validate_function(namespace: &mut Namespace, function: &Function) {
    let label = namespace.resolve(function.name).to_string();
    if !function.inference_done {
        report(
            namespace,
            DiagnosticKind::TypeMismatch,
            format!("function `{label}` was never type-checked"),
        );
        return;
    }

    for param in &function.params {
        let param_name = namespace.resolve(param.name).to_string();
        concrete_or_report(namespace, param.type_id, &format!("parameter `{param_name}` of `{label}`"));
    }

    if let Some(expr) = &function.return_expression {
        validate_expression(namespace, expr, &format!("the return expression of `{label}`"));
    }

    if let Some(body) = &function.body {
        validate_code_block(namespace, body, &label);
    }
}

fn validate_code_block(namespace: &mut Namespace, block: &CodeBlock, owner: &str) {
    for entry in &block.entries {
        validate_code_entry(namespace, entry, owner);
    }
}

fn validate_code_entry(namespace: &mut Namespace, entry: &CodeEntry, owner: &str) {
    match entry {
        CodeEntry::Statement(s) => validate_statement(namespace, s, owner),
        CodeEntry::Assignment(a) => validate_assignment(namespace, a, owner),
        CodeEntry::PreOp(op) | CodeEntry::PostOp(op) => validate_pre_post_op(namespace, op, owner),
        CodeEntry::Entity(e) => validate_entity(namespace, e, owner),
        CodeEntry::Block(b) => validate_code_block(namespace, b, owner),
    }
}

fn validate_assignment(namespace: &mut Namespace, assignment: &crate::ir::Assignment, owner: &str) {
    concrete_or_report(namespace, assignment.lhs_type, &format!("an assignment target in `{owner}`"));
    match &assignment.rhs {
        AssignmentRhs::Chained(inner) => validate_assignment(namespace, inner, owner),
        AssignmentRhs::Expression(expr) => {
            validate_expression(namespace, expr, &format!("an assignment in `{owner}`"))
        }
    }
}

fn validate_pre_post_op(namespace: &mut Namespace, op: &crate::ir::PrePostOp, owner: &str) {
    match op.state {
        InferenceState::Resolved(t) => concrete_or_report(namespace, t, &format!("an increment/decrement in `{owner}`")),
        InferenceState::Failed => report(
            namespace,
            DiagnosticKind::TypeMismatch,
            format!("an increment/decrement in `{owner}` failed to resolve"),
        ),
        InferenceState::NotStarted | InferenceState::InProgress => report(
            namespace,
            DiagnosticKind::TypeMismatch,
            format!("an increment/decrement in `{owner}` was never visited by inference"),
        ),
    }
}

fn validate_entity(namespace: &mut Namespace, entity: &Entity, owner: &str) {
    let tag = namespace.resolve(entity.tag).to_string();
    for param in &entity.params {
        validate_expression(namespace, param, &format!("a `{tag}` parameter in `{owner}`"));
    }
    validate_code_block(namespace, &entity.body, owner);
    for chained in &entity.chain {
        validate_entity(namespace, chained, owner);
    }
}

fn validate_statement(namespace: &mut Namespace, statement: &Statement, owner: &str) {
    let raw_name = namespace.resolve(statement.original_name).to_string();
    match statement.state {
        InferenceState::Resolved(_) => {}
        InferenceState::Failed => report(
            namespace,
            DiagnosticKind::NoMatchingOverload,
            format!("call to `{raw_name}` in `{owner}` never resolved to an overload"),
        ),
        InferenceState::NotStarted | InferenceState::InProgress => report(
            namespace,
            DiagnosticKind::TypeMismatch,
            format!("call to `{raw_name}` in `{owner}` was never visited by inference"),
        ),
    }
    if !namespace.has_function(statement.name) {
        report(
            namespace,
            DiagnosticKind::UnknownIdentifier,
            format!("`{raw_name}` in `{owner}` does not resolve to a declared function"),
        );
    }
    for param in &statement.params {
        validate_expression(namespace, param, &format!("an argument to `{raw_name}` in `{owner}`"));
    }
}

fn validate_expression(namespace: &mut Namespace, expr: &Expression, context: &str) {
    if !expr.inference_done {
        report(
            namespace,
            DiagnosticKind::TypeMismatch,
            format!("{context} was never visited by inference"),
        );
        return;
    }
    concrete_or_report(namespace, expr.inferred_type, context);
    for atom in &expr.atoms {
        if let crate::ir::Atom::Parenthetical(inner) = atom {
            validate_expression(namespace, inner, context);
        }
        if let crate::ir::Atom::NestedStatement(inner) = atom {
            validate_statement(namespace, inner, context);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Atom, LiteralValue};
    use crate::types::PrimitiveType;

    fn function_with_return(namespace: &mut Namespace, inferred: TypeId, inference_done: bool) -> Function {
        let name = namespace.intern("f");
        let mut expr = Expression::new(vec![Atom::Literal(LiteralValue::Integer32(1))]);
        expr.inferred_type = inferred;
        expr.inference_done = inference_done;
        Function {
            name,
            overload: name,
            params: vec![],
            return_expression: Some(expr),
            body: None,
            tags: vec![],
            template_params: vec![],
            inference_done: true,
            return_type_hint: inferred,
        }
    }

    #[test]
    fn fully_resolved_function_produces_no_diagnostics() {
        let mut ns = Namespace::new("t.ember");
        let function = function_with_return(&mut ns, PrimitiveType::Integer32.type_id(), true);
        validate_program(&mut ns, &[function]);
        assert!(!ns.diagnostics_ref().has_errors());
    }

    #[test]
    fn error_typed_return_expression_is_reported() {
        let mut ns = Namespace::new("t.ember");
        let function = function_with_return(&mut ns, TypeId::ERROR, true);
        validate_program(&mut ns, &[function]);
        assert!(ns.diagnostics_ref().has_errors());
    }

    #[test]
    fn function_that_never_ran_inference_is_reported() {
        let mut ns = Namespace::new("t.ember");
        let mut function = function_with_return(&mut ns, PrimitiveType::Integer32.type_id(), true);
        function.inference_done = false;
        validate_program(&mut ns, &[function]);
        assert!(ns.diagnostics_ref().has_errors());
    }

    #[test]
    fn unresolved_statement_call_is_reported() {
        let mut ns = Namespace::new("t.ember");
        let name = ns.intern("f");
        let missing = ns.intern("mystery");
        let stmt = Statement::new(missing, vec![]);
        let function = Function {
            name,
            overload: name,
            params: vec![],
            return_expression: None,
            body: Some(CodeBlock {
                scope: crate::ir::ScopeOwnership::Owned(ns.scopes.new_root()),
                entries: vec![CodeEntry::Statement(stmt)],
            }),
            tags: vec![],
            template_params: vec![],
            inference_done: true,
            return_type_hint: PrimitiveType::Void.type_id(),
        };
        validate_program(&mut ns, &[function]);
        assert!(ns.diagnostics_ref().has_errors());
    }
}
