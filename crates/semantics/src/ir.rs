//! The typed intermediate representation (spec §3, C2).
//!
//! Pure data: no logic here beyond trivial construction, deep cloning, and
//! atom appending. All cross-cutting references — scope parents, type IDs,
//! name handles — are plain integer handles rather than borrowed pointers,
//! so the tree can be an ordinary owned tree (`Vec`/`Box`) without creating
//! reference cycles (see DESIGN.md's resolution of the "pointer-heavy IR"
//! design note).

use crate::registry::{Handle, ScopeId};
use crate::types::TypeId;

/// The inference state of one IR node (spec §4.8, resolving the Open
/// Question about conflating "not yet visited" with "previously errored").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InferenceState {
    #[default]
    NotStarted,
    InProgress,
    Resolved(TypeId),
    Failed,
}

impl InferenceState {
    pub fn resolved_type(self) -> Option<TypeId> {
        match self {
            InferenceState::Resolved(t) => Some(t),
            _ => None,
        }
    }

    pub fn is_done(self) -> bool {
        matches!(self, InferenceState::Resolved(_) | InferenceState::Failed)
    }

    /// The type to report for validation/codegen purposes: a resolved type,
    /// or the error sentinel for anything not cleanly resolved.
    pub fn type_or_error(self) -> TypeId {
        match self {
            InferenceState::Resolved(t) => t,
            _ => TypeId::ERROR,
        }
    }
}

/// A literal payload usable as a pattern-matched parameter's comparison
/// value (spec §9: extended beyond integer-only to boolean and string;
/// real literals are deliberately excluded, see DESIGN.md).
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Integer32(i32),
    Integer16(i16),
    Real32(f32),
    Boolean(bool),
    StringHandle(Handle),
}

impl LiteralValue {
    pub fn type_id(&self) -> TypeId {
        use crate::types::PrimitiveType;
        match self {
            LiteralValue::Integer32(_) => PrimitiveType::Integer32.type_id(),
            LiteralValue::Integer16(_) => PrimitiveType::Integer16.type_id(),
            LiteralValue::Real32(_) => PrimitiveType::Real32.type_id(),
            LiteralValue::Boolean(_) => PrimitiveType::Boolean.type_id(),
            LiteralValue::StringHandle(_) => PrimitiveType::StringT.type_id(),
        }
    }

    /// Whether this literal kind is a legal pattern-match payload
    /// (spec §9 resolution: integer, boolean, string; not real).
    pub fn is_valid_pattern_payload(&self) -> bool {
        !matches!(self, LiteralValue::Real32(_))
    }
}

/// One atom of an [`Expression`] (spec §3).
#[derive(Debug, Clone)]
pub enum Atom {
    Literal(LiteralValue),
    /// An identifier reference, not yet resolved. `resolved_type` starts as
    /// `TypeId::INFER` and is written once during C5.
    Identifier {
        name: Handle,
        resolved_type: TypeId,
    },
    /// An operator atom. `name` is rewritten in place to the concrete
    /// overload handle once resolved (spec §4.5 step "rewrite ... to that
    /// overload").
    Operator { name: Handle, is_member_access: bool },
    /// Wraps an inner expression, pre-op, or post-op in parentheses.
    Parenthetical(Box<Expression>),
    NestedStatement(Box<Statement>),
    /// Emitted by member-access coalescing: the terminal member of a chain.
    BindReference { structure_type: TypeId, member: Handle },
    /// An l-value form of an identifier, emitted by coalescing and by
    /// reference-parameter wrapping.
    IdentifierReference(Handle),
    /// Emitted by later passes when a structure member must be copied
    /// rather than referenced.
    CopyFromStructure { structure_type: TypeId, member: Handle },
    TempReferenceFromRegister(TypeId),
    /// Inserted during sum-type widening: carries the concrete runtime tag
    /// a value should be annotated with (spec §4.5 step 8, §4.7).
    TypeAnnotation(TypeId),
}

/// An ordered sequence of atoms plus memoised inference results (spec §3).
#[derive(Debug, Clone, Default)]
pub struct Expression {
    pub atoms: Vec<Atom>,
    pub inferred_type: TypeId,
    pub coalesced: bool,
    pub inference_done: bool,
}

impl Expression {
    pub fn new(atoms: Vec<Atom>) -> Self {
        Expression {
            atoms,
            inferred_type: TypeId::INFER,
            coalesced: false,
            inference_done: false,
        }
    }

    pub fn push(&mut self, atom: Atom) {
        self.atoms.push(atom);
    }

    /// Deep clone resetting cached inference results, per spec §4.2.
    pub fn clone_fresh(&self) -> Self {
        Expression {
            atoms: self.atoms.clone(),
            inferred_type: TypeId::INFER,
            coalesced: false,
            inference_done: false,
        }
    }
}

/// A single deferred template argument, attached to a statement marked
/// `needs-instantiation` until C4 consumes it (spec §4.4).
#[derive(Debug, Clone)]
pub enum TemplateArg {
    Type(TypeId),
    TypeName(Handle),
}

#[derive(Debug, Clone)]
pub struct Statement {
    pub name: Handle,
    pub original_name: Handle,
    pub params: Vec<Expression>,
    pub state: InferenceState,
    pub deferred_template_args: Vec<TemplateArg>,
    pub compile_helper_run: bool,
    pub needs_instantiation: bool,
}

impl Statement {
    pub fn new(name: Handle, params: Vec<Expression>) -> Self {
        Statement {
            name,
            original_name: name,
            params,
            state: InferenceState::NotStarted,
            deferred_template_args: Vec::new(),
            compile_helper_run: false,
            needs_instantiation: false,
        }
    }

    pub fn clone_fresh(&self) -> Self {
        Statement {
            name: self.original_name,
            original_name: self.original_name,
            params: self.params.iter().map(Expression::clone_fresh).collect(),
            state: InferenceState::NotStarted,
            deferred_template_args: self.deferred_template_args.clone(),
            compile_helper_run: false,
            needs_instantiation: self.needs_instantiation,
        }
    }
}

/// One l-value path segment: the leading identifier, or a `.member` step.
#[derive(Debug, Clone)]
pub enum LValueSegment {
    Identifier(Handle),
    Member(Handle),
}

#[derive(Debug, Clone)]
pub enum AssignmentRhs {
    Chained(Box<Assignment>),
    Expression(Box<Expression>),
}

#[derive(Debug, Clone)]
pub struct Assignment {
    pub lhs_path: Vec<LValueSegment>,
    pub operator: Handle,
    pub rhs: AssignmentRhs,
    pub lhs_type: TypeId,
    pub original_lhs: Handle,
    pub has_additional_effects: bool,
    pub wants_type_annotation: bool,
}

impl Assignment {
    pub fn clone_fresh(&self) -> Self {
        Assignment {
            lhs_path: self.lhs_path.clone(),
            operator: self.operator,
            rhs: match &self.rhs {
                AssignmentRhs::Chained(a) => AssignmentRhs::Chained(Box::new(a.clone_fresh())),
                AssignmentRhs::Expression(e) => {
                    AssignmentRhs::Expression(Box::new(e.clone_fresh()))
                }
            },
            lhs_type: TypeId::INFER,
            original_lhs: self.original_lhs,
            has_additional_effects: self.has_additional_effects,
            wants_type_annotation: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PrePostOp {
    pub operator: Handle,
    pub operand: Handle,
    pub state: InferenceState,
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub tag: Handle,
    pub params: Vec<Expression>,
    pub body: CodeBlock,
    pub chain: Vec<Entity>,
    pub postfix: Option<Handle>,
}

#[derive(Debug, Clone)]
pub enum CodeEntry {
    Statement(Statement),
    Assignment(Assignment),
    PreOp(PrePostOp),
    PostOp(PrePostOp),
    Entity(Entity),
    Block(CodeBlock),
}

/// Either an owned scope or a borrowed reference to the global scope
/// (spec §3: "owning or borrowing a lexical scope").
#[derive(Debug, Clone)]
pub enum ScopeOwnership {
    Owned(ScopeId),
    BorrowsGlobal(ScopeId),
}

#[derive(Debug, Clone)]
pub struct CodeBlock {
    pub scope: ScopeOwnership,
    pub entries: Vec<CodeEntry>,
}

/// One formal parameter of a [`Function`] (spec §3).
#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: Handle,
    pub is_local: bool,
    pub is_reference: bool,
    pub type_id: TypeId,
    /// Present when this parameter is itself a function (higher-order
    /// parameter); its signature is looked up in the registry by this
    /// `TypeId`, which lives in the `FunctionSignature` family.
    pub nested_signature: Option<TypeId>,
    /// Present when `type_id` is a placeholder for one of the enclosing
    /// function template's own type parameters, substituted concretely at
    /// instantiation time (spec §4.6).
    pub template_param: Option<Handle>,
    pub payload: Option<LiteralValue>,
}

impl Parameter {
    pub fn is_pattern_matched(&self) -> bool {
        self.payload.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct Function {
    pub name: Handle,
    /// The overload handle `registry::Namespace::declare_function` returned
    /// when this function's signature was registered, distinct from `name`
    /// (the interned identifier). Inference rewrites the registered
    /// signature's return type through this handle once it is known, so
    /// other functions resolving calls against it see the real type.
    pub overload: Handle,
    pub params: Vec<Parameter>,
    pub return_expression: Option<Expression>,
    pub body: Option<CodeBlock>,
    pub tags: Vec<Handle>,
    pub template_params: Vec<Handle>,
    pub inference_done: bool,
    pub return_type_hint: TypeId,
}

impl Function {
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expression_clone_fresh_resets_inference() {
        let mut expr = Expression::new(vec![Atom::Literal(LiteralValue::Integer32(1))]);
        expr.inferred_type = crate::types::PrimitiveType::Integer32.type_id();
        expr.inference_done = true;
        expr.coalesced = true;

        let fresh = expr.clone_fresh();
        assert!(fresh.inferred_type.is_infer());
        assert!(!fresh.inference_done);
        assert!(!fresh.coalesced);
        assert_eq!(fresh.atoms.len(), 1);
    }

    #[test]
    fn statement_clone_fresh_restores_original_name_and_state() {
        let stmt = Statement {
            name: Handle(7),
            original_name: Handle(3),
            params: vec![],
            state: InferenceState::Resolved(crate::types::PrimitiveType::Integer32.type_id()),
            deferred_template_args: vec![],
            compile_helper_run: true,
            needs_instantiation: false,
        };
        let fresh = stmt.clone_fresh();
        assert_eq!(fresh.name, Handle(3));
        assert_eq!(fresh.state, InferenceState::NotStarted);
        assert!(!fresh.compile_helper_run);
    }

    #[test]
    fn inference_state_type_or_error_defaults_safely() {
        assert!(InferenceState::NotStarted.type_or_error().is_error());
        assert!(InferenceState::InProgress.type_or_error().is_error());
        assert!(InferenceState::Failed.type_or_error().is_error());
        let resolved = InferenceState::Resolved(crate::types::PrimitiveType::Boolean.type_id());
        assert_eq!(
            resolved.type_or_error(),
            crate::types::PrimitiveType::Boolean.type_id()
        );
    }

    #[test]
    fn real_literal_is_not_a_valid_pattern_payload() {
        assert!(!LiteralValue::Real32(1.5).is_valid_pattern_payload());
        assert!(LiteralValue::Integer32(1).is_valid_pattern_payload());
        assert!(LiteralValue::Boolean(true).is_valid_pattern_payload());
    }
}
