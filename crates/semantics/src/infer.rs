//! C5: the bidirectional type inference engine (spec §4.5).
//!
//! The largest component. Grounded primarily on the overload-resolution
//! and virtual-evaluation algorithms described for Epoch's
//! `Expression.cpp`/`Statement.cpp`/`Assignment.cpp`; the context-stack
//! shape (`InferenceContext`/expected-type frames) mirrors a driver loop
//! that threads expected-type frames through a recursive descent,
//! generalized from row-polymorphic stack effects to nominal type checking.

use crate::dispatch;
use crate::diagnostics::{Diagnostic, DiagnosticKind, SourceLocation};
use crate::evaluator;
use crate::instantiate::FunctionInstantiator;
use crate::ir::{
    Assignment, AssignmentRhs, Atom, CodeBlock, CodeEntry, Entity, Expression, Function,
    InferenceState, LValueSegment, PrePostOp, ScopeOwnership, Statement,
};
use crate::registry::{FunctionSignature, Handle, Namespace, OverloadBody, ScopeId, VariableOrigin};
use crate::types::TypeId;

/// Which construct is currently being inferred (spec §4.5 "inference
/// context... state").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Global,
    CodeBlock,
    Expression,
    Statement,
    FunctionReturn,
    Function,
}

struct ExpectedFrame {
    expected_types: Vec<TypeId>,
}

pub struct Inferer<'a> {
    namespace: &'a mut Namespace,
    instantiator: FunctionInstantiator,
    frames: Vec<ExpectedFrame>,
}

impl<'a> Inferer<'a> {
    pub fn new(namespace: &'a mut Namespace) -> Self {
        Inferer {
            namespace,
            instantiator: FunctionInstantiator::new(),
            frames: Vec::new(),
        }
    }

    fn push_frame(&mut self, expected_types: Vec<TypeId>) {
        self.frames.push(ExpectedFrame { expected_types });
    }

    fn pop_frame(&mut self) {
        self.frames.pop();
    }

    fn current_expected(&self) -> &[TypeId] {
        self.frames.last().map(|f| f.expected_types.as_slice()).unwrap_or(&[])
    }

    fn report(&mut self, kind: DiagnosticKind, message: impl Into<String>) {
        let file = self.namespace.file_name.clone();
        self.namespace
            .diagnostics()
            .report(Diagnostic::new(kind, message, file, SourceLocation::default()));
    }

    /// Runs inference to a fixed point over every function (spec §4.5
    /// "driver" + ordering guarantee: "all function signatures first... then
    /// each function in declaration order"). Signatures are already
    /// registered by `lower.rs`, so this only walks bodies.
    pub fn infer_program(&mut self, functions: &mut [Function]) {
        for function in functions.iter_mut() {
            self.infer_function(function);
        }
    }

    fn infer_function(&mut self, function: &mut Function) {
        if function.inference_done {
            return;
        }
        let scope = self.function_scope(function);

        if let Some(expr) = &mut function.return_expression {
            let hint = function.return_type_hint;
            let expected = if hint.is_infer() { None } else { Some(hint) };
            self.infer_expression(expr, scope, expected, ContextState::FunctionReturn);
            if function.return_type_hint.is_infer() {
                function.return_type_hint = expr.inferred_type;
            }
        } else if function.return_type_hint.is_infer() {
            function.return_type_hint = crate::types::PrimitiveType::Void.type_id();
        }

        if let Some(body) = &mut function.body {
            self.infer_code_block(body, scope);
        }

        // Other call sites resolved earlier saw this function's signature
        // with whatever return type lowering guessed (commonly `Void`);
        // rewrite it now so later calls see the real one.
        if let Some(mut signature) = self.namespace.signature_of(function.overload).cloned() {
            signature.return_type = function.return_type_hint;
            self.namespace.rewrite_signature(function.overload, signature);
        }

        function.inference_done = true;
    }

    /// Recovers (or re-derives) the scope a function's body was lowered
    /// into. Parameters were already bound into that scope by `lower.rs`;
    /// here we just need its id, which we find by re-walking parameters
    /// against the scope the body carries (or allocate a fresh one for a
    /// bodyless/return-only function).
    fn function_scope(&mut self, function: &Function) -> ScopeId {
        match &function.body {
            Some(CodeBlock { scope: ScopeOwnership::Owned(id), .. }) => *id,
            Some(CodeBlock { scope: ScopeOwnership::BorrowsGlobal(id), .. }) => *id,
            None => {
                let scope = self.namespace.scopes.new_root();
                for param in &function.params {
                    self.namespace
                        .scopes
                        .add_variable(scope, param.name, param.type_id, VariableOrigin::Parameter);
                }
                scope
            }
        }
    }

    fn infer_code_block(&mut self, block: &mut CodeBlock, parent_scope: ScopeId) {
        let scope = match &block.scope {
            ScopeOwnership::Owned(id) => *id,
            ScopeOwnership::BorrowsGlobal(id) => *id,
        };
        let _ = parent_scope;
        for entry in &mut block.entries {
            self.infer_code_entry(entry, scope);
        }
    }

    fn infer_code_entry(&mut self, entry: &mut CodeEntry, scope: ScopeId) {
        match entry {
            CodeEntry::Statement(s) => {
                self.infer_statement(s, scope, ContextState::CodeBlock);
            }
            CodeEntry::Assignment(a) => self.infer_assignment(a, scope),
            CodeEntry::PreOp(op) | CodeEntry::PostOp(op) => self.infer_pre_post_op(op, scope),
            CodeEntry::Entity(e) => self.infer_entity(e, scope),
            CodeEntry::Block(b) => self.infer_code_block(b, scope),
        }
    }

    fn infer_entity(&mut self, entity: &mut Entity, scope: ScopeId) {
        for param in &mut entity.params {
            self.infer_expression(param, scope, None, ContextState::Expression);
        }
        self.infer_code_block(&mut entity.body, scope);
        for chained in &mut entity.chain {
            self.infer_entity(chained, scope);
        }
    }

    fn infer_pre_post_op(&mut self, op: &mut PrePostOp, scope: ScopeId) {
        let var = self.namespace.scopes.find_variable(scope, op.operand);
        op.state = match var {
            Some((owner_scope, _)) => {
                let ty = self
                    .namespace
                    .scopes
                    .get(owner_scope)
                    .variable(op.operand)
                    .map(|v| v.type_id)
                    .unwrap_or(TypeId::ERROR);
                InferenceState::Resolved(ty)
            }
            None => {
                self.report(
                    DiagnosticKind::UnknownIdentifier,
                    format!("unknown identifier `{}`", self.namespace.resolve(op.operand)),
                );
                InferenceState::Failed
            }
        };
    }

    // -- Statements --------------------------------------------------------

    /// Implements the twelve-step statement inference algorithm (spec
    /// §4.5 "Statement inference algorithm").
    fn infer_statement(&mut self, statement: &mut Statement, scope: ScopeId, ctx: ContextState) -> TypeId {
        if let InferenceState::Resolved(t) = statement.state {
            return t;
        }
        statement.state = InferenceState::InProgress;

        if statement.needs_instantiation {
            evaluator::run_compile_time_steps(statement, self.namespace, scope, ctx == ContextState::FunctionReturn);
        }

        // Build the candidate-signature list for this call before
        // inferring any argument (spec §4.5 step 3: push the expected
        // parameter types for the statement's name before recursing into
        // parameters), so a bare function-valued identifier or a nested
        // call passed as an argument can resolve against the position it
        // fills rather than in isolation. Arity-mismatched overloads never
        // apply to this call, so they are filtered out up front; when more
        // than one arity-matching candidate remains, the first is used as
        // the hint, matching how `expected_return` below only ever
        // consults the first frame entry.
        let arity = statement.params.len();
        let candidate_signatures: Vec<FunctionSignature> = self
            .namespace
            .overloads_of(statement.name)
            .to_vec()
            .into_iter()
            .filter_map(|h| self.namespace.signature_of(h).cloned())
            .filter(|sig| sig.arity() == arity)
            .collect();

        for (i, param) in statement.params.iter_mut().enumerate() {
            let expected = candidate_signatures
                .first()
                .map(|sig| sig.params[i].nested_signature.unwrap_or(sig.params[i].type_id));
            self.infer_expression(param, scope, expected, ContextState::Statement);
        }

        let param_types: Vec<TypeId> = statement.params.iter().map(|p| p.inferred_type).collect();
        let expected_return = self.current_expected().first().copied();

        match self.resolve_overload(statement.name, &param_types, expected_return) {
            OverloadResolution::Unique(overload) => {
                statement.name = overload;
                self.apply_matched_overload(statement, overload, &param_types);
                evaluator::run_compile_time_steps(statement, self.namespace, scope, ctx == ContextState::FunctionReturn);
                let ret = self
                    .namespace
                    .signature_of(overload)
                    .map(|s| s.return_type)
                    .unwrap_or(TypeId::ERROR);
                statement.state = InferenceState::Resolved(ret);
                ret
            }
            OverloadResolution::Dispatch(overload) => {
                statement.name = overload;
                self.apply_matched_overload(statement, overload, &param_types);
                let ret = self
                    .namespace
                    .signature_of(overload)
                    .map(|s| s.return_type)
                    .unwrap_or(TypeId::ERROR);
                statement.state = InferenceState::Resolved(ret);
                ret
            }
            OverloadResolution::Parameter(type_id) => {
                statement.state = InferenceState::Resolved(type_id);
                type_id
            }
            OverloadResolution::None => {
                self.report(
                    DiagnosticKind::NoMatchingOverload,
                    format!(
                        "no overload of `{}` matches the given arguments",
                        self.namespace.resolve(statement.original_name)
                    ),
                );
                statement.state = InferenceState::Failed;
                TypeId::ERROR
            }
            OverloadResolution::Ambiguous => {
                self.report(
                    DiagnosticKind::AmbiguousDispatch,
                    format!(
                        "call to `{}` is ambiguous",
                        self.namespace.resolve(statement.original_name)
                    ),
                );
                statement.state = InferenceState::Failed;
                TypeId::ERROR
            }
            OverloadResolution::AmbiguousNarrowing => {
                self.report(
                    DiagnosticKind::AmbiguousNarrowing,
                    format!(
                        "call to `{}` would narrow a sum-typed argument to a concrete parameter; match it explicitly",
                        self.namespace.resolve(statement.original_name)
                    ),
                );
                statement.state = InferenceState::Failed;
                TypeId::ERROR
            }
        }
    }

    /// Steps 6-9 of the statement algorithm: arity-and-type filtering,
    /// pattern-overload preference, and dispatcher synthesis.
    fn resolve_overload(
        &mut self,
        name: Handle,
        arg_types: &[TypeId],
        expected_return: Option<TypeId>,
    ) -> OverloadResolution {
        if !self.namespace.has_function(name) {
            return OverloadResolution::None;
        }
        let candidates = self.namespace.overloads_of(name).to_vec();
        let mut survivors = Vec::new();
        let mut preferred = Vec::new();
        let mut widen_indices: Vec<usize> = Vec::new();
        let mut narrowing_rejected = false;

        for candidate in &candidates {
            let Some(signature) = self.namespace.signature_of(*candidate).cloned() else {
                continue;
            };
            if signature.arity() != arg_types.len() {
                continue;
            }
            if let Some(expected) = expected_return {
                if !signature.return_type.same_underlying(expected) && !expected.is_infer() {
                    continue;
                }
            }

            let mut ok = true;
            let mut is_preferred = false;
            let mut local_widen = Vec::new();
            for (i, (param, actual)) in signature.params.iter().zip(arg_types.iter()).enumerate() {
                if let Some(payload) = &param.literal_payload {
                    if !actual.same_underlying(payload.type_id()) {
                        ok = false;
                        break;
                    }
                    is_preferred = true;
                    continue;
                }
                if param.type_id.same_underlying(*actual) {
                    continue;
                }
                if param.type_id.family() == crate::types::TypeFamily::Sum
                    && self.namespace.is_sum_base(param.type_id, *actual)
                {
                    if actual.family() != crate::types::TypeFamily::Sum {
                        local_widen.push(i);
                    }
                    continue;
                }
                // Symmetric (formal-is-concrete, actual-is-sum) narrowing is
                // never attempted implicitly (spec §9 open question:
                // narrowing requires an explicit match in source).
                if actual.family() == crate::types::TypeFamily::Sum
                    && self.namespace.is_sum_base(*actual, param.type_id)
                {
                    ok = false;
                    narrowing_rejected = true;
                    break;
                }
                if let Some(nested) = param.nested_signature {
                    if actual.family() == crate::types::TypeFamily::FunctionSignature && *actual == nested {
                        continue;
                    }
                }
                ok = false;
                break;
            }

            if !ok {
                continue;
            }
            if is_preferred {
                preferred.push(*candidate);
            } else {
                survivors.push(*candidate);
                if !local_widen.is_empty() {
                    widen_indices = local_widen;
                }
            }
        }

        if !preferred.is_empty() {
            if preferred.len() == 1 {
                return OverloadResolution::Unique(preferred[0]);
            }
            if let Some(d) = self.synthesize_pattern_for(name, &preferred) {
                return OverloadResolution::Dispatch(d);
            }
            return OverloadResolution::Ambiguous;
        }

        if survivors.is_empty() {
            return if narrowing_rejected {
                OverloadResolution::AmbiguousNarrowing
            } else {
                OverloadResolution::None
            };
        }
        if !widen_indices.is_empty() && survivors.len() > 1 {
            if let Some(index) = widen_indices.first().copied() {
                if let Some(d) = dispatch::synthesize_type_dispatcher(self.namespace, name, &survivors, index) {
                    return OverloadResolution::Dispatch(d.overload);
                }
            }
        }
        if survivors.len() == 1 {
            return OverloadResolution::Unique(survivors[0]);
        }
        OverloadResolution::Ambiguous
    }

    /// Steps 8-9 of the statement algorithm (spec §4.5) for the overload a
    /// call was just matched against: widen an argument that fills a
    /// sum-typed formal from a concrete actual by inserting an
    /// `Atom::TypeAnnotation` ahead of its atoms, and wrap an argument
    /// filling a reference-qualified formal in `Atom::IdentifierReference`.
    /// Applies to both a uniquely matched overload and a synthesised
    /// dispatcher, since a dispatcher's registered signature carries the
    /// same reference/widen shape as the candidates it was built from.
    fn apply_matched_overload(&mut self, statement: &mut Statement, overload: Handle, arg_types: &[TypeId]) {
        let Some(signature) = self.namespace.signature_of(overload).cloned() else {
            return;
        };
        for (param, (formal, actual)) in
            statement.params.iter_mut().zip(signature.params.iter().zip(arg_types.iter()))
        {
            if formal.is_reference {
                if let Some(Atom::Identifier { name, .. }) = param.atoms.first() {
                    let name = *name;
                    param.atoms[0] = Atom::IdentifierReference(name);
                }
            }
            if formal.type_id.family() == crate::types::TypeFamily::Sum
                && actual.family() != crate::types::TypeFamily::Sum
                && self.namespace.is_sum_base(formal.type_id, *actual)
            {
                param.atoms.insert(0, Atom::TypeAnnotation(*actual));
            }
        }
    }

    fn synthesize_pattern_for(&mut self, name: Handle, candidates: &[Handle]) -> Option<Handle> {
        let index = self.namespace.signature_of(candidates[0])?.params.iter().position(|p| p.literal_payload.is_some())?;
        dispatch::synthesize_pattern_dispatcher(self.namespace, name, candidates, index).map(|d| d.overload)
    }

    fn resolve_operator_overload(&mut self, name: Handle, arg_types: &[TypeId]) -> Option<(Handle, TypeId)> {
        match self.resolve_overload(name, arg_types, None) {
            OverloadResolution::Unique(h) | OverloadResolution::Dispatch(h) => {
                let ret = self.namespace.signature_of(h)?.return_type;
                Some((h, ret))
            }
            _ => None,
        }
    }

    // -- Expressions ---------------------------------------------------

    fn infer_expression(
        &mut self,
        expr: &mut Expression,
        scope: ScopeId,
        expected: Option<TypeId>,
        _ctx: ContextState,
    ) {
        if expr.inference_done {
            return;
        }
        self.coalesce_member_access(expr, scope);
        self.push_frame(expected.into_iter().collect());
        let ty = self.walk(&mut expr.atoms, 0, scope).0;
        self.pop_frame();
        expr.inferred_type = ty;
        expr.inference_done = true;
        self.reorder_by_precedence(expr);
    }

    /// Repeatedly finds a `.` operator atom, binds it to the structure's
    /// member accessor, and collapses the triple into
    /// `(IdentifierReference, Operator, BindReference)` (spec §4.5
    /// "coalesce member accesses").
    fn coalesce_member_access(&mut self, expr: &mut Expression, scope: ScopeId) {
        if expr.coalesced {
            return;
        }
        let mut i = 0;
        while i < expr.atoms.len() {
            let is_dot = matches!(&expr.atoms[i], Atom::Operator { is_member_access: true, .. });
            if !is_dot || i == 0 || i + 1 >= expr.atoms.len() {
                i += 1;
                continue;
            }
            let predecessor_name = match &expr.atoms[i - 1] {
                Atom::Identifier { name, .. } => Some(*name),
                _ => None,
            };
            let member_name = match &expr.atoms[i + 1] {
                Atom::Identifier { name, .. } => *name,
                _ => {
                    i += 1;
                    continue;
                }
            };
            let Some(pred_name) = predecessor_name else {
                i += 1;
                continue;
            };
            let Some((owner_scope, _)) = self.namespace.scopes.find_variable(scope, pred_name) else {
                i += 1;
                continue;
            };
            let structure_type = self
                .namespace
                .scopes
                .get(owner_scope)
                .variable(pred_name)
                .map(|v| v.type_id)
                .unwrap_or(TypeId::ERROR);

            let op_name = match &expr.atoms[i] {
                Atom::Operator { name, .. } => *name,
                _ => unreachable!(),
            };
            expr.atoms.splice(
                i - 1..=i + 1,
                [
                    Atom::IdentifierReference(pred_name),
                    Atom::Operator { name: op_name, is_member_access: true },
                    Atom::BindReference { structure_type, member: member_name },
                ],
            );
            i += 2;
        }
        expr.coalesced = true;
    }

    fn walk(&mut self, atoms: &mut [Atom], pos: usize, scope: ScopeId) -> (TypeId, usize) {
        if pos >= atoms.len() {
            return (TypeId::ERROR, pos);
        }
        let is_operator = matches!(atoms[pos], Atom::Operator { .. });
        if is_operator {
            let op_name = match &atoms[pos] {
                Atom::Operator { name, .. } => *name,
                _ => unreachable!(),
            };
            let (operand_type, next) = self.walk(atoms, pos + 1, scope);
            match self.resolve_operator_overload(op_name, &[operand_type]) {
                Some((overload, ret)) => {
                    if let Atom::Operator { name, .. } = &mut atoms[pos] {
                        *name = overload;
                    }
                    (ret, next)
                }
                None => (TypeId::ERROR, next),
            }
        } else {
            let lhs_type = self.infer_leaf_atom(&mut atoms[pos], scope);
            self.continue_from_lhs(atoms, pos + 1, lhs_type, scope)
        }
    }

    fn continue_from_lhs(
        &mut self,
        atoms: &mut [Atom],
        next_pos: usize,
        lhs_type: TypeId,
        scope: ScopeId,
    ) -> (TypeId, usize) {
        if next_pos >= atoms.len() {
            return (lhs_type, next_pos);
        }
        let is_member_access = matches!(atoms[next_pos], Atom::Operator { is_member_access: true, .. });
        if is_member_access {
            let op_name = match &atoms[next_pos] {
                Atom::Operator { name, .. } => *name,
                _ => unreachable!(),
            };
            let member = match atoms.get(next_pos + 1) {
                Some(Atom::BindReference { member, .. }) => *member,
                _ => return (lhs_type, next_pos + 1),
            };
            match self.resolve_member_accessor(lhs_type, member) {
                Some((overload, ret)) => {
                    if let Atom::Operator { name, .. } = &mut atoms[next_pos] {
                        *name = overload;
                    }
                    self.continue_from_lhs(atoms, next_pos + 2, ret, scope)
                }
                None => {
                    self.report(DiagnosticKind::UnknownIdentifier, "unknown structure member");
                    (TypeId::ERROR, next_pos + 2)
                }
            }
        } else if matches!(atoms[next_pos], Atom::Operator { .. }) {
            let op_name = match &atoms[next_pos] {
                Atom::Operator { name, .. } => *name,
                _ => unreachable!(),
            };
            let (rhs_type, after) = self.walk(atoms, next_pos + 1, scope);
            match self.resolve_operator_overload(op_name, &[lhs_type, rhs_type]) {
                Some((overload, ret)) => {
                    if let Atom::Operator { name, .. } = &mut atoms[next_pos] {
                        *name = overload;
                    }
                    (ret, after)
                }
                None => {
                    self.report(
                        DiagnosticKind::NoMatchingOverload,
                        format!("no overload of `{}` accepts these operand types", self.namespace.resolve(op_name)),
                    );
                    (TypeId::ERROR, after)
                }
            }
        } else {
            (lhs_type, next_pos)
        }
    }

    fn resolve_member_accessor(&mut self, structure_type: TypeId, member: Handle) -> Option<(Handle, TypeId)> {
        let members = self.namespace.structure_members(structure_type)?;
        let member_type = members.iter().find(|(n, _)| *n == member).map(|(_, t)| *t)?;
        let member_text = self.namespace.resolve(member).to_string();
        let accessor_name = self.namespace.intern(&format!("{member_text}@@get"));
        if !self.namespace.has_function(accessor_name) {
            let param_name = self.namespace.intern("self");
            let signature = FunctionSignature {
                return_type: member_type,
                params: vec![crate::registry::SignatureParam {
                    name: param_name,
                    type_id: structure_type,
                    is_reference: true,
                    literal_payload: None,
                    nested_signature: None,
                    template_param: None,
                }],
            };
            let overload = self.namespace.declare_function(accessor_name, signature, OverloadBody::Extern);
            return Some((overload, member_type));
        }
        let overload = *self.namespace.overloads_of(accessor_name).first()?;
        Some((overload, member_type))
    }

    /// Picks the overload of a function-valued identifier whose signature
    /// structurally `.matches()` an expected nested signature (spec §3,
    /// §4.5 step 6: "match the higher-order signature against the
    /// argument's resolved signature"), returning that nested signature's
    /// own `TypeId` so the identifier atom resolves to the overload it was
    /// matched against rather than the generic function-ref primitive.
    fn resolve_function_value_signature(&mut self, name: Handle, expected: TypeId) -> Option<TypeId> {
        let expected_signature = self.signature_for_nested_type(expected)?;
        self.namespace.overloads_of(name).to_vec().into_iter().find_map(|overload| {
            let signature = self.namespace.signature_of(overload)?;
            signature.matches(&expected_signature).then_some(expected)
        })
    }

    /// Recovers the structural signature a nested-signature `TypeId`
    /// denotes. Nested signatures are registered under a synthetic
    /// `@@func-sig-{id}` name at lowering time (`register_nested_signature`);
    /// this reconstructs that name to look the signature back up.
    fn signature_for_nested_type(&mut self, type_id: TypeId) -> Option<FunctionSignature> {
        let name = self.namespace.intern(&format!("@@func-sig-{}", type_id.raw()));
        let overload = *self.namespace.overloads_of(name).first()?;
        self.namespace.signature_of(overload).cloned()
    }

    fn infer_leaf_atom(&mut self, atom: &mut Atom, scope: ScopeId) -> TypeId {
        match atom {
            Atom::Literal(lit) => lit.type_id(),
            Atom::Identifier { name, resolved_type } => {
                if let Some((owner, _)) = self.namespace.scopes.find_variable(scope, *name) {
                    let ty = self.namespace.scopes.get(owner).variable(*name).map(|v| v.type_id).unwrap();
                    *resolved_type = ty;
                    ty
                } else if self.namespace.has_function(*name) {
                    let expected_nested = self
                        .current_expected()
                        .first()
                        .copied()
                        .filter(|t| t.family() == crate::types::TypeFamily::FunctionSignature);
                    let ty = expected_nested
                        .and_then(|expected| self.resolve_function_value_signature(*name, expected))
                        .unwrap_or_else(|| crate::types::PrimitiveType::FunctionRef.type_id());
                    *resolved_type = ty;
                    ty
                } else {
                    self.report(
                        DiagnosticKind::UnknownIdentifier,
                        format!("unknown identifier `{}`", self.namespace.resolve(*name)),
                    );
                    *resolved_type = TypeId::ERROR;
                    TypeId::ERROR
                }
            }
            Atom::IdentifierReference(name) => {
                self.namespace
                    .scopes
                    .find_variable(scope, *name)
                    .and_then(|(owner, _)| self.namespace.scopes.get(owner).variable(*name))
                    .map(|v| v.type_id)
                    .unwrap_or(TypeId::ERROR)
            }
            Atom::Parenthetical(inner) => {
                self.infer_expression(inner, scope, None, ContextState::Expression);
                inner.inferred_type
            }
            Atom::NestedStatement(stmt) => self.infer_statement(stmt, scope, ContextState::Statement),
            Atom::BindReference { structure_type, .. } => *structure_type,
            Atom::CopyFromStructure { structure_type, .. } => *structure_type,
            Atom::TempReferenceFromRegister(t) => *t,
            Atom::TypeAnnotation(t) => *t,
            Atom::Operator { .. } => TypeId::ERROR,
        }
    }

    fn reorder_by_precedence(&mut self, expr: &mut Expression) {
        use crate::builtins::precedence_of;
        let mut output: Vec<Atom> = Vec::with_capacity(expr.atoms.len());
        let mut op_stack: Vec<Atom> = Vec::new();

        for atom in expr.atoms.drain(..) {
            match &atom {
                Atom::Operator { name, .. } => {
                    let text = self.namespace.resolve(*name).to_string();
                    let prec = precedence_of(&text);
                    let is_unary = text == "-u" || text == "!";
                    while let Some(top) = op_stack.last() {
                        let Atom::Operator { name: top_name, .. } = top else { break };
                        let top_text = self.namespace.resolve(*top_name).to_string();
                        let top_prec = precedence_of(&top_text);
                        let should_pop = if is_unary { top_prec >= prec } else { top_prec > prec };
                        if should_pop {
                            output.push(op_stack.pop().unwrap());
                        } else {
                            break;
                        }
                    }
                    op_stack.push(atom);
                }
                _ => output.push(atom),
            }
        }
        while let Some(op) = op_stack.pop() {
            output.push(op);
        }
        expr.atoms = output;
    }

    // -- Assignments -------------------------------------------------------

    fn infer_assignment(&mut self, assignment: &mut Assignment, scope: ScopeId) {
        let lhs_type = self.infer_lvalue(&assignment.lhs_path, scope);
        assignment.lhs_type = lhs_type;

        let rhs_type = match &mut assignment.rhs {
            AssignmentRhs::Chained(inner) => {
                self.infer_assignment(inner, scope);
                inner.lhs_type
            }
            AssignmentRhs::Expression(expr) => {
                self.infer_expression(expr, scope, Some(lhs_type), ContextState::Expression);
                expr.inferred_type
            }
        };

        let operator_text = self.namespace.resolve(assignment.operator).to_string();
        if operator_text != "=" {
            if let Some((overload, _)) = self.resolve_operator_overload(assignment.operator, &[lhs_type, rhs_type]) {
                assignment.operator = overload;
            }
        }

        let compatible = lhs_type.same_underlying(rhs_type)
            || self
                .namespace
                .strong_representation_of(lhs_type)
                .is_some_and(|rep| rep.same_underlying(rhs_type))
            || {
                let is_sum_base = lhs_type.family() == crate::types::TypeFamily::Sum
                    && self.namespace.is_sum_base(lhs_type, rhs_type);
                if is_sum_base {
                    assignment.wants_type_annotation = true;
                }
                is_sum_base
            };

        if !compatible {
            self.report(
                DiagnosticKind::TypeMismatch,
                format!(
                    "cannot assign a value of type `{rhs_type}` to `{}` of type `{lhs_type}`",
                    self.namespace.resolve(assignment.original_lhs)
                ),
            );
        }
    }

    fn infer_lvalue(&mut self, path: &[LValueSegment], scope: ScopeId) -> TypeId {
        let mut iter = path.iter();
        let Some(LValueSegment::Identifier(first)) = iter.next() else {
            return TypeId::ERROR;
        };
        let Some((owner, _)) = self.namespace.scopes.find_variable(scope, *first) else {
            self.report(
                DiagnosticKind::UnknownIdentifier,
                format!("unknown identifier `{}`", self.namespace.resolve(*first)),
            );
            return TypeId::ERROR;
        };
        let mut current = self.namespace.scopes.get(owner).variable(*first).map(|v| v.type_id).unwrap();
        for segment in iter {
            let LValueSegment::Member(member) = segment else {
                return TypeId::ERROR;
            };
            let Some(members) = self.namespace.structure_members(current) else {
                return TypeId::ERROR;
            };
            match members.iter().find(|(n, _)| n == member).map(|(_, t)| *t) {
                Some(t) => current = t,
                None => {
                    self.report(DiagnosticKind::UnknownIdentifier, "unknown structure member in assignment path");
                    return TypeId::ERROR;
                }
            }
        }
        current
    }
}

enum OverloadResolution {
    Unique(Handle),
    Dispatch(Handle),
    Parameter(TypeId),
    None,
    Ambiguous,
    AmbiguousNarrowing,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::LiteralValue;
    use crate::types::PrimitiveType;

    fn make_function_returning(namespace: &mut Namespace, atoms: Vec<Atom>) -> Function {
        let name = namespace.intern("f");
        Function {
            name,
            overload: name,
            params: vec![],
            return_expression: Some(Expression::new(atoms)),
            body: None,
            tags: vec![],
            template_params: vec![],
            inference_done: false,
            return_type_hint: TypeId::INFER,
        }
    }

    #[test]
    fn literal_return_expression_infers_its_own_type() {
        let mut ns = Namespace::new("t.ember");
        let mut function = make_function_returning(&mut ns, vec![Atom::Literal(LiteralValue::Integer32(7))]);
        let mut inferer = Inferer::new(&mut ns);
        inferer.infer_function(&mut function);
        assert_eq!(
            function.return_expression.unwrap().inferred_type,
            PrimitiveType::Integer32.type_id()
        );
    }

    #[test]
    fn binary_operator_resolves_to_registered_overload() {
        let mut ns = Namespace::new("t.ember");
        crate::builtins::register_builtins(&mut ns);
        let plus = ns.intern("+");
        let atoms = vec![
            Atom::Literal(LiteralValue::Integer32(1)),
            Atom::Operator { name: plus, is_member_access: false },
            Atom::Literal(LiteralValue::Integer32(2)),
        ];
        let mut function = make_function_returning(&mut ns, atoms);
        let mut inferer = Inferer::new(&mut ns);
        inferer.infer_function(&mut function);
        let expr = function.return_expression.unwrap();
        assert_eq!(expr.inferred_type, PrimitiveType::Integer32.type_id());
        match &expr.atoms[1] {
            Atom::Operator { name, .. } => assert_ne!(*name, plus, "operator atom should be rewritten to its overload"),
            other => panic!("expected operator atom, got {other:?}"),
        }
    }

    #[test]
    fn unresolved_identifier_reports_diagnostic_and_errors() {
        let mut ns = Namespace::new("t.ember");
        let missing = ns.intern("missing");
        let atoms = vec![Atom::Identifier { name: missing, resolved_type: TypeId::INFER }];
        let mut function = make_function_returning(&mut ns, atoms);
        let mut inferer = Inferer::new(&mut ns);
        inferer.infer_function(&mut function);
        assert!(function.return_expression.unwrap().inferred_type.is_error());
        assert!(ns.diagnostics_ref().has_errors());
    }

    #[test]
    fn pattern_matched_overloads_synthesize_a_dispatcher() {
        let mut ns = Namespace::new("t.ember");
        let name = ns.intern("on");
        let param_name = ns.intern("code");
        for value in [0, 1] {
            let signature = FunctionSignature {
                return_type: PrimitiveType::Void.type_id(),
                params: vec![crate::registry::SignatureParam {
                    name: param_name,
                    type_id: PrimitiveType::Integer32.type_id(),
                    is_reference: false,
                    literal_payload: Some(LiteralValue::Integer32(value)),
                    nested_signature: None,
                    template_param: None,
                }],
            };
            ns.declare_function(name, signature, OverloadBody::Ir);
        }
        let mut inferer = Inferer::new(&mut ns);
        let resolution = inferer.resolve_overload(name, &[PrimitiveType::Integer32.type_id()], None);
        match resolution {
            OverloadResolution::Ambiguous => panic!("two distinct pattern payloads should dispatch, not be ambiguous"),
            OverloadResolution::None => panic!("expected a dispatcher or unique match"),
            _ => {}
        }
    }
}
