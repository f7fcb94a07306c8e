//! The output contract (spec §6): a visitor interface over a fully typed
//! [`Namespace`] that a downstream code generator drives instead of walking
//! the IR tree directly. Grounded on the `CodeGen` traversal this crate's
//! lineage uses elsewhere, which likewise visits one `Program` node kind at
//! a time in source order; here the walk is extracted into a trait so this
//! crate can ship a typed contract without owning a code generator itself
//! (spec §1 Non-goals).

use crate::dispatch::Dispatcher;
use crate::ir::{
    Assignment, Atom, CodeBlock, CodeEntry, Entity, Expression, Function, LValueSegment, Statement,
};
use crate::registry::{Handle, Namespace, VariableOrigin};
use crate::types::TypeId;

/// One function parameter as presented to a visitor.
#[derive(Debug, Clone, Copy)]
pub struct VisitedParam {
    pub name: Handle,
    pub type_id: TypeId,
    pub is_reference: bool,
}

/// One scope-local variable as presented to a visitor, with its origin.
#[derive(Debug, Clone, Copy)]
pub struct VisitedVariable {
    pub name: Handle,
    pub type_id: TypeId,
    pub origin: VariableOrigin,
}

/// Driven once per fully-inferred [`Function`]. Every method has a no-op
/// default so a consumer only overrides the node kinds it cares about.
pub trait SemanticVisitor {
    fn enter_function(
        &mut self,
        _name: Handle,
        _params: &[VisitedParam],
        _return_type: TypeId,
        _scope_vars: &[VisitedVariable],
    ) {
    }

    fn exit_function(&mut self, _name: Handle) {}

    fn visit_statement(&mut self, _statement: &Statement, _return_type: TypeId) {}

    fn visit_atom(&mut self, _atom: &Atom) {}

    fn visit_assignment(&mut self, _assignment: &Assignment) {}

    fn visit_entity(&mut self, _entity: &Entity) {}

    /// Called once per synthesised dispatcher a consumer asked this crate
    /// to register (spec §6: "ordered list of candidate overloads").
    fn visit_dispatcher(&mut self, _dispatcher: &Dispatcher) {}
}

/// Drives `visitor` over every function in `functions`, reading variable
/// origin/type metadata out of `namespace`'s scope table.
pub fn walk_program<V: SemanticVisitor>(visitor: &mut V, namespace: &Namespace, functions: &[Function]) {
    for function in functions {
        walk_function(visitor, namespace, function);
    }
}

fn walk_function<V: SemanticVisitor>(visitor: &mut V, namespace: &Namespace, function: &Function) {
    let params: Vec<VisitedParam> = function
        .params
        .iter()
        .map(|p| VisitedParam { name: p.name, type_id: p.type_id, is_reference: p.is_reference })
        .collect();

    let scope_vars = function
        .body
        .as_ref()
        .map(|body| scope_id_of(body))
        .map(|scope_id| {
            namespace
                .scopes
                .get(scope_id)
                .variables()
                .iter()
                .map(|v| VisitedVariable { name: v.name, type_id: v.type_id, origin: v.origin })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    visitor.enter_function(function.name, &params, function.return_type_hint, &scope_vars);

    if let Some(return_expr) = &function.return_expression {
        walk_expression(visitor, return_expr);
    }
    if let Some(body) = &function.body {
        walk_code_block(visitor, body);
    }

    visitor.exit_function(function.name);
}

fn scope_id_of(body: &CodeBlock) -> crate::registry::ScopeId {
    match body.scope {
        crate::ir::ScopeOwnership::Owned(id) => id,
        crate::ir::ScopeOwnership::BorrowsGlobal(id) => id,
    }
}

fn walk_code_block<V: SemanticVisitor>(visitor: &mut V, block: &CodeBlock) {
    for entry in &block.entries {
        walk_code_entry(visitor, entry);
    }
}

fn walk_code_entry<V: SemanticVisitor>(visitor: &mut V, entry: &CodeEntry) {
    match entry {
        CodeEntry::Statement(s) => {
            let return_type = s.state.resolved_type().unwrap_or(TypeId::ERROR);
            visitor.visit_statement(s, return_type);
            for param in &s.params {
                walk_expression(visitor, param);
            }
        }
        CodeEntry::Assignment(a) => walk_assignment(visitor, a),
        CodeEntry::PreOp(_) | CodeEntry::PostOp(_) => {}
        CodeEntry::Entity(e) => walk_entity(visitor, e),
        CodeEntry::Block(b) => walk_code_block(visitor, b),
    }
}

fn walk_assignment<V: SemanticVisitor>(visitor: &mut V, assignment: &Assignment) {
    visitor.visit_assignment(assignment);
    match &assignment.rhs {
        crate::ir::AssignmentRhs::Chained(inner) => walk_assignment(visitor, inner),
        crate::ir::AssignmentRhs::Expression(expr) => walk_expression(visitor, expr),
    }
}

fn walk_entity<V: SemanticVisitor>(visitor: &mut V, entity: &Entity) {
    visitor.visit_entity(entity);
    for param in &entity.params {
        walk_expression(visitor, param);
    }
    walk_code_block(visitor, &entity.body);
    for chained in &entity.chain {
        walk_entity(visitor, chained);
    }
}

fn walk_expression<V: SemanticVisitor>(visitor: &mut V, expr: &Expression) {
    for atom in &expr.atoms {
        visitor.visit_atom(atom);
        match atom {
            Atom::Parenthetical(inner) => walk_expression(visitor, inner),
            Atom::NestedStatement(inner) => {
                let return_type = inner.state.resolved_type().unwrap_or(TypeId::ERROR);
                visitor.visit_statement(inner, return_type);
                for param in &inner.params {
                    walk_expression(visitor, param);
                }
            }
            _ => {}
        }
    }
}

/// Also exposes l-value segment names the way a generator needs them, since
/// `LValueSegment::Member` only carries a `Handle` and a generator will
/// usually want the owning structure's type too; a visitor that needs this
/// should resolve it itself via `infer_lvalue`'s approach over the
/// registry, as this trait stays a thin read-only walk.
pub fn lvalue_head(path: &[LValueSegment]) -> Option<Handle> {
    match path.first() {
        Some(LValueSegment::Identifier(name)) => Some(*name),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::LiteralValue;
    use crate::registry::Namespace;
    use crate::types::PrimitiveType;

    #[derive(Default)]
    struct CountingVisitor {
        functions_entered: usize,
        atoms_seen: usize,
    }

    impl SemanticVisitor for CountingVisitor {
        fn enter_function(
            &mut self,
            _name: Handle,
            _params: &[VisitedParam],
            _return_type: TypeId,
            _scope_vars: &[VisitedVariable],
        ) {
            self.functions_entered += 1;
        }

        fn visit_atom(&mut self, _atom: &Atom) {
            self.atoms_seen += 1;
        }
    }

    #[test]
    fn walk_program_visits_every_function_and_its_return_atoms() {
        let mut ns = Namespace::new("t.ember");
        let name = ns.intern("f");
        let function = Function {
            name,
            overload: name,
            params: vec![],
            return_expression: Some(Expression::new(vec![Atom::Literal(LiteralValue::Integer32(1))])),
            body: None,
            tags: vec![],
            template_params: vec![],
            inference_done: true,
            return_type_hint: PrimitiveType::Integer32.type_id(),
        };

        let mut visitor = CountingVisitor::default();
        walk_program(&mut visitor, &ns, &[function]);

        assert_eq!(visitor.functions_entered, 1);
        assert_eq!(visitor.atoms_seen, 1);
    }

    #[test]
    fn lvalue_head_reads_the_leading_identifier() {
        let mut ns = Namespace::new("t.ember");
        let x = ns.intern("x");
        let path = vec![LValueSegment::Identifier(x), LValueSegment::Member(ns.intern("y"))];
        assert_eq!(lvalue_head(&path), Some(x));
    }
}
