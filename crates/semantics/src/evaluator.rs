//! C4: the compile-time evaluator (spec §4.4).
//!
//! Runs interleaved with inference rather than as its own pass: whenever
//! inference resolves a statement's overload, it calls back into
//! [`run_compile_time_steps`] before moving on. Three independent jobs live
//! here, matching the `generate_constructors` idempotent-rewrite idiom this
//! crate's lineage uses elsewhere (each job is cheap to call twice and a
//! no-op the second time):
//!
//! 1. Weak-alias constructor rewriting.
//! 2. Deferred template argument consumption (handing off to C6).
//! 3. Compile-helper invocation, tracked by a per-statement flag so a
//!    helper runs exactly once even if inference revisits the statement.

use crate::instantiate;
use crate::ir::Statement;
use crate::registry::{Namespace, ScopeId};

/// Runs every compile-time step applicable to `statement`. Returns `true`
/// if anything changed (name rewritten, instantiation consumed, helper
/// run) so the caller knows to re-derive the statement's expected type.
pub fn run_compile_time_steps(
    statement: &mut Statement,
    namespace: &mut Namespace,
    scope: ScopeId,
    in_return_expression: bool,
) -> bool {
    let mut changed = false;
    changed |= rewrite_weak_alias_constructor(statement, namespace);
    changed |= consume_deferred_instantiation(statement, namespace);
    changed |= run_compile_helper(statement, namespace, scope, in_return_expression);
    changed
}

/// If `statement.name` names a weak-alias type's constructor, rewrite it to
/// the aliased base type's constructor (spec §4.4: "rewrite the name to the
/// aliased base constructor").
fn rewrite_weak_alias_constructor(statement: &mut Statement, namespace: &mut Namespace) -> bool {
    let raw = namespace.resolve(statement.name).to_string();
    let Some(type_part) = raw.strip_suffix("@@new") else {
        return false;
    };
    let Some(alias_handle) = namespace_handle_for(namespace, type_part) else {
        return false;
    };
    let Some(alias_id) = namespace.lookup_type(alias_handle) else {
        return false;
    };
    // `lookup_type` already resolves weak aliases transparently; if the
    // resolved type's canonical name differs from the raw name, rewrite.
    let Some(canonical) = namespace.name_of_type(alias_id) else {
        return false;
    };
    if canonical == alias_handle {
        return false;
    }
    let canonical_name = namespace.resolve(canonical).to_string();
    let new_ctor = namespace.intern(&format!("{canonical_name}@@new"));
    if new_ctor == statement.name {
        return false;
    }
    statement.name = new_ctor;
    true
}

fn namespace_handle_for(namespace: &mut Namespace, name: &str) -> Option<crate::registry::Handle> {
    Some(namespace.intern(name))
}

/// Consumes `statement.deferred_template_args` via C6 and clears the
/// `needs_instantiation` flag (spec §4.4, §4.6).
fn consume_deferred_instantiation(statement: &mut Statement, namespace: &mut Namespace) -> bool {
    if !statement.needs_instantiation {
        return false;
    }
    let args = std::mem::take(&mut statement.deferred_template_args);
    if let Some(instantiated_name) = instantiate::instantiate_from_args(namespace, statement.name, &args) {
        statement.name = instantiated_name;
    }
    statement.needs_instantiation = false;
    true
}

/// Looks up and runs a registered compile helper exactly once per
/// statement (spec §4.4: "compile helpers are idempotent once run, tracked
/// by a per-statement flag").
fn run_compile_helper(
    statement: &mut Statement,
    namespace: &mut Namespace,
    scope: ScopeId,
    _in_return_expression: bool,
) -> bool {
    if statement.compile_helper_run {
        return false;
    }
    let Some(helper) = namespace.compile_helper_for(statement.name) else {
        return false;
    };
    helper(statement, namespace, scope);
    statement.compile_helper_run = true;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Expression, InferenceState};
    use crate::registry::VariableOrigin;
    use crate::types::PrimitiveType;

    #[test]
    fn weak_alias_constructor_is_rewritten_to_base_constructor() {
        let mut ns = Namespace::new("t.ember");
        let alias_name = ns.intern("MyInt");
        ns.register_weak_alias(
            alias_name,
            PrimitiveType::Integer32.type_id(),
            Default::default(),
        );
        let ctor_name = ns.intern("MyInt@@new");
        let mut stmt = Statement::new(ctor_name, vec![]);
        let scope = ns.scopes.new_root();

        let changed = run_compile_time_steps(&mut stmt, &mut ns, scope, false);
        assert!(changed);
        assert_eq!(ns.resolve(stmt.name), "integer@@new");
    }

    #[test]
    fn compile_helper_runs_exactly_once() {
        fn helper(stmt: &mut Statement, ns: &mut Namespace, scope: ScopeId) {
            let v = ns.intern("created");
            ns.scopes
                .add_variable(scope, v, PrimitiveType::Integer32.type_id(), VariableOrigin::Local);
            stmt.params.push(Expression::new(vec![]));
        }

        let mut ns = Namespace::new("t.ember");
        let name = ns.intern("make");
        ns.register_compile_helper(name, helper);
        let mut stmt = Statement::new(name, vec![]);
        let scope = ns.scopes.new_root();

        assert!(run_compile_time_steps(&mut stmt, &mut ns, scope, false));
        assert_eq!(stmt.params.len(), 1);
        assert!(!run_compile_time_steps(&mut stmt, &mut ns, scope, false));
        assert_eq!(stmt.params.len(), 1, "helper must not run a second time");
    }

    #[test]
    fn statement_without_any_applicable_step_reports_no_change() {
        let mut ns = Namespace::new("t.ember");
        let name = ns.intern("plain");
        let mut stmt = Statement::new(name, vec![]);
        let scope = ns.scopes.new_root();
        assert!(!run_compile_time_steps(&mut stmt, &mut ns, scope, false));
        assert_eq!(stmt.state, InferenceState::NotStarted);
    }
}
