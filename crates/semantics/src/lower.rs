//! C3: AST → IR lowering (spec §4.3).
//!
//! A single structural walk of the parse tree. No type decisions happen
//! here — every resolved-type field starts at [`TypeId::INFER`] and is
//! filled in by `infer.rs`. Interning every identifier and registering
//! every declared type/function signature *does* happen here, because the
//! registry must be fully populated before inference can look anything up.
//!
//! Encountering a parse-tree shape lowering does not know how to handle is
//! a parser-contract violation (spec §4.3, §7): it panics rather than
//! returning a diagnostic, because by definition the parser should never
//! have produced it.

use crate::ast::*;
use crate::diagnostics::SourceLocation;
use crate::ir::*;
use crate::ir::ScopeOwnership;
use crate::registry::{
    FunctionSignature, Handle, MemberTypeRef, Namespace, OverloadBody, ScopeId,
    SignatureParam, VariableOrigin,
};
use crate::types::TypeId;

/// Converts a byte offset into a 1-based line/column pair by scanning the
/// original source text (spec §6: "computed from the byte offset... within
/// the original source buffer").
pub fn locate(source: &str, offset: usize) -> SourceLocation {
    let mut line = 1u32;
    let mut col = 1u32;
    for (i, ch) in source.char_indices() {
        if i >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    SourceLocation::new(line, col)
}

pub struct Lowerer<'a> {
    namespace: &'a mut Namespace,
    source: &'a str,
    global_scope: ScopeId,
}

impl<'a> Lowerer<'a> {
    pub fn new(namespace: &'a mut Namespace, source: &'a str) -> Self {
        let global_scope = namespace.scopes.new_root();
        Lowerer {
            namespace,
            source,
            global_scope,
        }
    }

    fn loc(&self, offset: SourceOffset) -> SourceLocation {
        locate(self.source, offset)
    }

    /// Lower a whole program: register every declared type first (so
    /// forward references resolve), then lower function bodies.
    pub fn lower_program(&mut self, program: &ParseProgram) -> Vec<Function> {
        for alias in &program.weak_aliases {
            let name = self.namespace.intern(&alias.name);
            let target = self.resolve_type_name(&alias.target_type, alias.at);
            self.namespace
                .register_weak_alias(name, target, self.loc(alias.at));
        }
        for alias in &program.strong_aliases {
            let name = self.namespace.intern(&alias.name);
            let rep = self.resolve_type_name(&alias.representation_type, alias.at);
            let rep_name = self.namespace.intern(&format!("{}@@rep", alias.name));
            self.namespace
                .register_strong_alias(name, rep, rep_name, self.loc(alias.at));
        }
        for structure in &program.structures {
            self.lower_structure(structure);
        }
        for sum in &program.sum_types {
            self.lower_sum_type(sum);
        }
        // Pass 1: register every function's signature, so overload
        // resolution can see sibling/forward-declared functions (spec §5:
        // "all function signatures first").
        let overloads: Vec<Handle> = program
            .functions
            .iter()
            .map(|f| self.declare_function_signature(f))
            .collect();
        // Pass 2: lower each body.
        program
            .functions
            .iter()
            .zip(overloads)
            .map(|(f, overload)| self.lower_function(f, overload))
            .collect()
    }

    fn resolve_type_name(&mut self, name: &str, at: SourceOffset) -> TypeId {
        let handle = self.namespace.intern(name);
        match self.namespace.lookup_type(handle) {
            Some(id) => id,
            None => {
                use crate::diagnostics::{Diagnostic, DiagnosticKind};
                let file_name = self.namespace.file_name.clone();
                let loc = self.loc(at);
                self.namespace.diagnostics().report(Diagnostic::new(
                    DiagnosticKind::UnknownType,
                    format!("unknown type `{name}`"),
                    file_name,
                    loc,
                ));
                TypeId::ERROR
            }
        }
    }

    fn lower_structure(&mut self, structure: &ParseStructure) {
        let name = self.namespace.intern(&structure.name);
        if structure.template_params.is_empty() {
            let members: Vec<(Handle, TypeId)> = structure
                .members
                .iter()
                .map(|m| {
                    let member_name = self.namespace.intern(&m.name);
                    let member_type = self.resolve_type_name(&m.type_name, m.at);
                    (member_name, member_type)
                })
                .collect();
            self.namespace
                .register_structure(name, members, self.loc(structure.at));
            return;
        }
        let params: Vec<Handle> = structure
            .template_params
            .iter()
            .map(|p| self.namespace.intern(p))
            .collect();
        let members: Vec<(Handle, MemberTypeRef)> = structure
            .members
            .iter()
            .map(|m| {
                let member_name = self.namespace.intern(&m.name);
                let member_type = self.member_type_ref(&m.type_name, &params, m.at);
                (member_name, member_type)
            })
            .collect();
        self.namespace.register_structure_template(name, params, members);
    }

    fn member_type_ref(&mut self, type_name: &str, params: &[Handle], at: SourceOffset) -> MemberTypeRef {
        let handle = self.namespace.intern(type_name);
        if params.contains(&handle) {
            MemberTypeRef::Param(handle)
        } else {
            MemberTypeRef::Concrete(self.resolve_type_name(type_name, at))
        }
    }

    fn lower_sum_type(&mut self, sum: &ParseSumType) {
        let name = self.namespace.intern(&sum.name);
        if sum.template_params.is_empty() {
            if let Some(id) = self.namespace.register_sum(name, self.loc(sum.at)) {
                for base in &sum.base_types {
                    let base_id = self.resolve_type_name(base, sum.at);
                    self.namespace.add_sum_base(id, base_id);
                }
            }
            return;
        }
        let params: Vec<Handle> = sum.template_params.iter().map(|p| self.namespace.intern(p)).collect();
        let bases: Vec<MemberTypeRef> = sum
            .base_types
            .iter()
            .map(|b| self.member_type_ref(b, &params, sum.at))
            .collect();
        self.namespace.register_sum_template(name, params, bases);
    }

    /// `template_params` are the enclosing function template's own
    /// type-parameter handles (empty for a non-template function); a
    /// scalar-typed parameter named after one of them is a template
    /// placeholder, not a real type name, and is left for
    /// `FunctionInstantiator` to resolve (spec §4.6) instead of being
    /// looked up here — mirrors `member_type_ref`'s `params.contains`
    /// check for structure/sum template members.
    fn lower_signature_param(&mut self, param: &ParseFunctionParam, template_params: &[Handle]) -> SignatureParam {
        let name = self.namespace.intern(&param.name);
        let literal_payload = param.literal.as_ref().map(|l| self.lower_literal(l));
        let (type_id, nested_signature, template_param) = if let Some(func_ref) = &param.function_ref {
            let sig_id = self.register_nested_signature(func_ref, template_params);
            (crate::types::PrimitiveType::FunctionRef.type_id(), Some(sig_id), None)
        } else if let Some(type_name) = &param.type_name {
            let handle = self.namespace.intern(type_name);
            if template_params.contains(&handle) {
                (TypeId::INFER, None, Some(handle))
            } else {
                (self.resolve_type_name(type_name, param.at), None, None)
            }
        } else {
            (crate::types::PrimitiveType::Nothing.type_id(), None, None)
        };
        SignatureParam {
            name,
            type_id,
            is_reference: param.is_reference,
            literal_payload,
            nested_signature,
            template_param,
        }
    }

    fn register_nested_signature(&mut self, sig: &ParseFunctionRefSignature, template_params: &[Handle]) -> TypeId {
        let params: Vec<SignatureParam> =
            sig.params.iter().map(|p| self.lower_signature_param(p, template_params)).collect();
        let return_type = sig
            .return_type
            .as_ref()
            .map(|t| self.resolve_type_name(t, 0))
            .unwrap_or_else(|| crate::types::PrimitiveType::Void.type_id());
        let id = self.namespace.alloc_function_signature_id();
        // Nested signatures aren't named; record the structural signature
        // directly against the allocated id for later `matches` comparison.
        let name = self
            .namespace
            .intern(&format!("@@func-sig-{}", id.raw()));
        self.namespace
            .declare_function(name, FunctionSignature { return_type, params }, OverloadBody::Extern);
        id
    }

    fn lower_literal(&mut self, lit: &ParseLiteral) -> LiteralValue {
        match lit {
            ParseLiteral::Integer32(v) => LiteralValue::Integer32(*v),
            ParseLiteral::Integer16(v) => LiteralValue::Integer16(*v),
            ParseLiteral::Real32(v) => LiteralValue::Real32(*v),
            ParseLiteral::Boolean(v) => LiteralValue::Boolean(*v),
            ParseLiteral::StringLit(s) => LiteralValue::StringHandle(self.namespace.intern(s)),
        }
    }

    fn declare_function_signature(&mut self, function: &ParseFunction) -> Handle {
        let name = self.namespace.intern(&function.name);
        let template_params: Vec<Handle> =
            function.template_params.iter().map(|t| self.namespace.intern(t)).collect();
        let params: Vec<SignatureParam> = function
            .params
            .iter()
            .map(|p| self.lower_signature_param(p, &template_params))
            .collect();
        let return_type = crate::types::PrimitiveType::Void.type_id();
        self.namespace.declare_function(
            name,
            FunctionSignature { return_type, params },
            OverloadBody::Ir,
        )
    }

    fn lower_function(&mut self, function: &ParseFunction, overload: Handle) -> Function {
        let name = self.namespace.intern(&function.name);
        let scope = self.namespace.scopes.new_child(self.global_scope);
        let template_params: Vec<Handle> =
            function.template_params.iter().map(|t| self.namespace.intern(t)).collect();

        let params: Vec<Parameter> = function
            .params
            .iter()
            .map(|p| {
                let sig_param = self.lower_signature_param(p, &template_params);
                self.namespace.scopes.add_variable(
                    scope,
                    sig_param.name,
                    sig_param.type_id,
                    VariableOrigin::Parameter,
                );
                Parameter {
                    name: sig_param.name,
                    is_local: false,
                    is_reference: sig_param.is_reference,
                    type_id: sig_param.type_id,
                    nested_signature: sig_param.nested_signature,
                    template_param: sig_param.template_param,
                    payload: sig_param.literal_payload,
                }
            })
            .collect();

        let return_expression = function
            .return_expression
            .as_ref()
            .map(|e| self.lower_expression(e));

        let body = function
            .body
            .as_ref()
            .map(|b| self.lower_code_block(b, scope));

        let tags = function.tags.iter().map(|t| self.namespace.intern(t)).collect();

        Function {
            name,
            overload,
            params,
            return_expression,
            body,
            tags,
            template_params,
            inference_done: false,
            return_type_hint: TypeId::INFER,
        }
    }

    fn lower_code_block(&mut self, block: &ParseCodeBlock, scope: ScopeId) -> CodeBlock {
        let entries = block
            .entries
            .iter()
            .map(|e| self.lower_code_entry(e, scope))
            .collect();
        CodeBlock {
            scope: ScopeOwnership::Owned(scope),
            entries,
        }
    }

    fn lower_code_entry(&mut self, entry: &ParseCodeEntry, scope: ScopeId) -> CodeEntry {
        match entry {
            ParseCodeEntry::Statement(s) => CodeEntry::Statement(self.lower_statement(s)),
            ParseCodeEntry::Assignment(a) => CodeEntry::Assignment(self.lower_assignment(a)),
            ParseCodeEntry::PreOp(op) => CodeEntry::PreOp(self.lower_pre_post_op(op)),
            ParseCodeEntry::PostOp(op) => CodeEntry::PostOp(self.lower_pre_post_op(op)),
            ParseCodeEntry::Entity(e) => CodeEntry::Entity(self.lower_entity(e, scope)),
            ParseCodeEntry::Block(b) => {
                let child = self.namespace.scopes.new_child(scope);
                CodeEntry::Block(self.lower_code_block(b, child))
            }
        }
    }

    fn lower_pre_post_op(&mut self, op: &ParsePrePostOp) -> PrePostOp {
        PrePostOp {
            operator: self.namespace.intern(&op.operator),
            operand: self.namespace.intern(&op.operand),
            state: InferenceState::NotStarted,
        }
    }

    fn lower_statement(&mut self, statement: &ParseStatement) -> Statement {
        let name = self.namespace.intern(&statement.name);
        let params = statement.params.iter().map(|p| self.lower_expression(p)).collect();
        Statement::new(name, params)
    }

    fn lower_assignment(&mut self, assignment: &ParseAssignment) -> Assignment {
        assert!(
            !assignment.lhs_path.is_empty(),
            "parser invariant violated: empty assignment lhs path"
        );
        let mut path = Vec::with_capacity(assignment.lhs_path.len());
        path.push(LValueSegment::Identifier(
            self.namespace.intern(&assignment.lhs_path[0]),
        ));
        for member in &assignment.lhs_path[1..] {
            path.push(LValueSegment::Member(self.namespace.intern(member)));
        }
        let original_lhs = match path[0] {
            LValueSegment::Identifier(h) => h,
            _ => unreachable!(),
        };
        let operator = self.namespace.intern(&assignment.operator);
        let rhs = match assignment.rhs.as_ref() {
            ParseAssignmentRhs::Chained(a) => AssignmentRhs::Chained(Box::new(self.lower_assignment(a))),
            ParseAssignmentRhs::Expression(e) => {
                AssignmentRhs::Expression(Box::new(self.lower_expression(e)))
            }
        };
        Assignment {
            lhs_path: path,
            operator,
            rhs,
            lhs_type: TypeId::INFER,
            original_lhs,
            has_additional_effects: false,
            wants_type_annotation: false,
        }
    }

    fn lower_expression(&mut self, expr: &ParseExpression) -> Expression {
        let atoms = expr.components.iter().map(|c| self.lower_component(c)).collect();
        Expression::new(atoms)
    }

    fn lower_component(&mut self, component: &ParseExpressionComponent) -> Atom {
        match component {
            ParseExpressionComponent::Literal(lit) => Atom::Literal(self.lower_literal(lit)),
            ParseExpressionComponent::Identifier(name) => Atom::Identifier {
                name: self.namespace.intern(name),
                resolved_type: TypeId::INFER,
            },
            ParseExpressionComponent::Operator { name, is_member_access } => Atom::Operator {
                name: self.namespace.intern(name),
                is_member_access: *is_member_access,
            },
            ParseExpressionComponent::Parenthetical(inner) => {
                Atom::Parenthetical(Box::new(self.lower_expression(inner)))
            }
            ParseExpressionComponent::NestedStatement(s) => {
                Atom::NestedStatement(Box::new(self.lower_statement(s)))
            }
        }
    }

    fn lower_entity(&mut self, entity: &ParseEntity, parent_scope: ScopeId) -> Entity {
        let tag = self.namespace.intern(&entity.tag);
        let params = entity.params.iter().map(|p| self.lower_expression(p)).collect();
        let child_scope = self.namespace.scopes.new_child(parent_scope);
        let body = self.lower_code_block(&entity.body, child_scope);
        let chain = entity.chain.iter().map(|c| self.lower_entity(c, parent_scope)).collect();
        let postfix = entity.postfix.as_ref().map(|p| self.namespace.intern(p));
        Entity {
            tag,
            params,
            body,
            chain,
            postfix,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_program() -> ParseProgram {
        ParseProgram {
            structures: vec![],
            sum_types: vec![],
            weak_aliases: vec![],
            strong_aliases: vec![],
            functions: vec![],
        }
    }

    #[test]
    fn lowers_empty_program_to_no_functions() {
        let mut ns = Namespace::new("t.ember");
        let program = empty_program();
        let mut lowerer = Lowerer::new(&mut ns, "");
        let functions = lowerer.lower_program(&program);
        assert!(functions.is_empty());
    }

    #[test]
    fn lowers_zero_arg_function_with_literal_return() {
        let mut ns = Namespace::new("t.ember");
        let mut program = empty_program();
        program.functions.push(ParseFunction {
            name: "answer".into(),
            params: vec![],
            return_expression: Some(ParseExpression {
                components: vec![ParseExpressionComponent::Literal(ParseLiteral::Integer32(42))],
                at: 0,
            }),
            body: None,
            tags: vec![],
            template_params: vec![],
            at: 0,
        });
        let mut lowerer = Lowerer::new(&mut ns, "func answer -> integer = 42");
        let functions = lowerer.lower_program(&program);
        assert_eq!(functions.len(), 1);
        let f = &functions[0];
        assert_eq!(ns.resolve(f.name), "answer");
        assert!(f.return_expression.is_some());
        assert_eq!(f.return_expression.as_ref().unwrap().atoms.len(), 1);
    }

    #[test]
    fn locate_computes_line_and_column() {
        let src = "line one\nline two\nline three";
        let loc = locate(src, 9);
        assert_eq!(loc.line, 2);
        assert_eq!(loc.column, 1);
    }

    #[test]
    #[should_panic(expected = "parser invariant violated")]
    fn empty_assignment_path_is_fatal() {
        let mut ns = Namespace::new("t.ember");
        let mut lowerer = Lowerer::new(&mut ns, "");
        lowerer.lower_assignment(&ParseAssignment {
            lhs_path: vec![],
            operator: "=".into(),
            rhs: Box::new(ParseAssignmentRhs::Expression(ParseExpression {
                components: vec![],
                at: 0,
            })),
            at: 0,
        });
    }
}
