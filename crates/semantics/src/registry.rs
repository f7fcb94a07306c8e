//! C1: the identifier & type registry (spec §4.1).
//!
//! The [`Namespace`] is the single owner of the string pool, the type
//! tables, the function/overload tables, the compile-helper table, and the
//! entity-tag table (spec §3). Every other component holds non-owning
//! [`Handle`]/[`TypeId`] references into it rather than borrowed pointers,
//! which is what lets the IR be an ordinary owned tree without reference
//! cycles (spec §9 "cyclic references... as handles").

use std::collections::HashMap;

use crate::diagnostics::{Diagnostic, DiagnosticBag, DiagnosticKind, SourceLocation};
use crate::types::{PrimitiveType, TypeFamily, TypeId, TypeIdAllocator};

/// An opaque, interned-identifier handle (spec §3). Equality is integer
/// equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(pub u32);

/// A non-owning reference to a lexical scope (spec §3's "scopes reference
/// their parent scope as a non-owning back link").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableOrigin {
    Local,
    Parameter,
    Return,
}

#[derive(Debug, Clone)]
pub struct ScopeVariable {
    pub name: Handle,
    pub type_id: TypeId,
    pub origin: VariableOrigin,
}

/// A lexical scope: an ordered variable list plus a non-owning parent link
/// (spec §3, grounded on Epoch's `ScopeDescription`).
#[derive(Debug, Clone)]
pub struct Scope {
    pub parent: Option<ScopeId>,
    variables: Vec<ScopeVariable>,
}

impl Scope {
    pub fn has_variable(&self, name: Handle) -> bool {
        self.variables.iter().any(|v| v.name == name)
    }

    pub fn variable(&self, name: Handle) -> Option<&ScopeVariable> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub fn variables(&self) -> &[ScopeVariable] {
        &self.variables
    }
}

/// Owns every [`Scope`] in a `Program`, addressed by [`ScopeId`] (spec §9:
/// "represent all non-owning back-edges as handles... never as pointers").
#[derive(Debug, Clone, Default)]
pub struct Scopes {
    scopes: Vec<Scope>,
}

impl Scopes {
    pub fn new_root(&mut self) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            parent: None,
            variables: Vec::new(),
        });
        id
    }

    pub fn new_child(&mut self, parent: ScopeId) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            parent: Some(parent),
            variables: Vec::new(),
        });
        id
    }

    pub fn get(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0 as usize]
    }

    pub fn add_variable(
        &mut self,
        id: ScopeId,
        name: Handle,
        type_id: TypeId,
        origin: VariableOrigin,
    ) {
        self.scopes[id.0 as usize]
            .variables
            .push(ScopeVariable { name, type_id, origin });
    }

    /// Walk the parent chain looking for `name`, returning the defining
    /// scope and how many frames were crossed to find it (spec §6 output
    /// contract reports this origin information to the code generator).
    pub fn find_variable(&self, start: ScopeId, name: Handle) -> Option<(ScopeId, usize)> {
        let mut current = Some(start);
        let mut frames = 0;
        while let Some(id) = current {
            let scope = self.get(id);
            if scope.has_variable(name) {
                return Some((id, frames));
            }
            current = scope.parent;
            frames += 1;
        }
        None
    }
}

/// A structure/sum template member's declared type: either concrete or a
/// reference to one of the template's own parameters, substituted at
/// instantiation time (spec §4.6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberTypeRef {
    Concrete(TypeId),
    Param(Handle),
}

#[derive(Debug, Clone)]
struct StructureTemplate {
    params: Vec<Handle>,
    members: Vec<(Handle, MemberTypeRef)>,
}

#[derive(Debug, Clone)]
struct SumTemplate {
    params: Vec<Handle>,
    bases: Vec<MemberTypeRef>,
}

/// An ordered formal parameter of a registered function signature
/// (spec §3, grounded on Epoch's `FunctionSignature`/`CompileTimeParameter`).
#[derive(Debug, Clone)]
pub struct SignatureParam {
    pub name: Handle,
    pub type_id: TypeId,
    pub is_reference: bool,
    pub literal_payload: Option<crate::ir::LiteralValue>,
    /// Present for higher-order parameters: the nested function signature
    /// the argument must match (spec §3).
    pub nested_signature: Option<TypeId>,
    /// Present when `type_id` is a placeholder standing in for one of the
    /// enclosing function template's own type parameters (mirrors
    /// `MemberTypeRef::Param` for structure/sum template members);
    /// `FunctionInstantiator` resolves it against the concrete argument
    /// supplied for that template parameter (spec §4.6).
    pub template_param: Option<Handle>,
}

#[derive(Debug, Clone)]
pub struct FunctionSignature {
    pub return_type: TypeId,
    pub params: Vec<SignatureParam>,
}

impl FunctionSignature {
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Structural match used for higher-order parameter checking (spec §3,
    /// §4.5: "match the higher-order signature against the argument's
    /// resolved signature").
    pub fn matches(&self, other: &FunctionSignature) -> bool {
        self.return_type == other.return_type
            && self.params.len() == other.params.len()
            && self
                .params
                .iter()
                .zip(other.params.iter())
                .all(|(a, b)| a.type_id.same_underlying(b.type_id))
    }
}

/// Either an IR-backed function body or an extern (declared but not
/// IR-backed) signature (spec §3: "for each overload, either an IR body or
/// an extern signature").
#[derive(Debug, Clone)]
pub enum OverloadBody {
    Ir,
    Extern,
}

#[derive(Debug, Clone)]
pub struct Overload {
    pub handle: Handle,
    pub signature: FunctionSignature,
    pub body: OverloadBody,
}

#[derive(Debug, Clone, Default)]
struct FunctionTable {
    /// Raw name handle -> ordered overload handles (insertion order, spec
    /// §5: "candidate order is by insertion order into the overload set").
    overloads_by_name: HashMap<Handle, Vec<Handle>>,
    signatures: HashMap<Handle, FunctionSignature>,
    bodies: HashMap<Handle, OverloadBody>,
}

pub type CompileHelper = fn(&mut crate::ir::Statement, &mut Namespace, ScopeId);

#[derive(Debug, Clone)]
pub struct EntityTagMeta {
    pub is_entity: bool,
    pub is_chained: bool,
    pub is_postfix: bool,
    pub closer_tag: Option<Handle>,
}

/// The compilation-wide namespace: strings, types, functions, compile
/// helpers, entity tags, scopes, and the diagnostic collector (spec §3,
/// §4.1). This is the sole owner every other component borrows from.
pub struct Namespace {
    strings: Vec<String>,
    string_lookup: HashMap<String, Handle>,

    structure_members: HashMap<TypeId, Vec<(Handle, TypeId)>>,
    sum_bases: HashMap<TypeId, Vec<TypeId>>,
    weak_aliases: HashMap<TypeId, TypeId>,
    strong_aliases: HashMap<TypeId, (TypeId, Handle)>,
    type_names: HashMap<Handle, TypeId>,
    names_by_type: HashMap<TypeId, Handle>,

    structure_ids: TypeIdAllocator,
    template_instance_ids: TypeIdAllocator,
    sum_ids: TypeIdAllocator,
    weak_alias_ids: TypeIdAllocator,
    strong_alias_ids: TypeIdAllocator,
    function_signature_ids: TypeIdAllocator,

    functions: FunctionTable,
    next_overload_handle: u32,

    compile_helpers: HashMap<Handle, CompileHelper>,
    entity_tags: HashMap<Handle, EntityTagMeta>,

    structure_templates: HashMap<Handle, StructureTemplate>,
    sum_templates: HashMap<Handle, SumTemplate>,
    instantiation_cache: HashMap<(Handle, Vec<TypeId>), TypeId>,

    pub scopes: Scopes,
    diagnostics: DiagnosticBag,
    pub file_name: String,
}

impl Namespace {
    pub fn new(file_name: impl Into<String>) -> Self {
        let mut ns = Namespace {
            strings: Vec::new(),
            string_lookup: HashMap::new(),
            structure_members: HashMap::new(),
            sum_bases: HashMap::new(),
            weak_aliases: HashMap::new(),
            strong_aliases: HashMap::new(),
            type_names: HashMap::new(),
            names_by_type: HashMap::new(),
            structure_ids: TypeIdAllocator::structures(),
            template_instance_ids: TypeIdAllocator::template_instances(),
            sum_ids: TypeIdAllocator::sums(),
            weak_alias_ids: TypeIdAllocator::weak_aliases(),
            strong_alias_ids: TypeIdAllocator::strong_aliases(),
            function_signature_ids: TypeIdAllocator::function_signatures(),
            functions: FunctionTable::default(),
            next_overload_handle: 1_000_000,
            compile_helpers: HashMap::new(),
            entity_tags: HashMap::new(),
            structure_templates: HashMap::new(),
            sum_templates: HashMap::new(),
            instantiation_cache: HashMap::new(),
            scopes: Scopes::default(),
            diagnostics: DiagnosticBag::new(),
            file_name: file_name.into(),
        };
        ns.register_primitive_names();
        ns
    }

    fn register_primitive_names(&mut self) {
        for (name, prim) in [
            ("integer", PrimitiveType::Integer32),
            ("short", PrimitiveType::Integer16),
            ("real", PrimitiveType::Real32),
            ("boolean", PrimitiveType::Boolean),
            ("string", PrimitiveType::StringT),
            ("buffer", PrimitiveType::Buffer),
            ("identifier", PrimitiveType::Identifier),
            ("function", PrimitiveType::FunctionRef),
            ("nothing", PrimitiveType::Nothing),
            ("void", PrimitiveType::Void),
        ] {
            let handle = self.intern(name);
            self.type_names.insert(handle, prim.type_id());
            self.names_by_type.insert(prim.type_id(), handle);
        }
    }

    pub fn diagnostics(&mut self) -> &mut DiagnosticBag {
        &mut self.diagnostics
    }

    pub fn diagnostics_ref(&self) -> &DiagnosticBag {
        &self.diagnostics
    }

    // -- Strings ---------------------------------------------------------

    pub fn intern(&mut self, s: &str) -> Handle {
        if let Some(h) = self.string_lookup.get(s) {
            return *h;
        }
        let handle = Handle(self.strings.len() as u32);
        self.strings.push(s.to_string());
        self.string_lookup.insert(s.to_string(), handle);
        handle
    }

    pub fn resolve(&self, handle: Handle) -> &str {
        &self.strings[handle.0 as usize]
    }

    // -- Types -------------------------------------------------------------

    pub fn lookup_type(&self, name: Handle) -> Option<TypeId> {
        let direct = *self.type_names.get(&name)?;
        // Weak aliases resolve transparently (spec §4.1).
        Some(self.weak_aliases.get(&direct).copied().unwrap_or(direct))
    }

    pub fn name_of_type(&self, type_id: TypeId) -> Option<Handle> {
        self.names_by_type.get(&type_id.strip_reference()).copied()
    }

    pub fn family_of(&self, type_id: TypeId) -> TypeFamily {
        type_id.family()
    }

    fn check_duplicate(&mut self, name: Handle, at: SourceLocation) -> bool {
        if self.type_names.contains_key(&name) {
            let text = self.resolve(name).to_string();
            self.diagnostics.report(Diagnostic::new(
                DiagnosticKind::DuplicateDefinition,
                format!("`{text}` is already defined"),
                self.file_name.clone(),
                at,
            ));
            true
        } else {
            false
        }
    }

    pub fn register_structure(
        &mut self,
        name: Handle,
        members: Vec<(Handle, TypeId)>,
        at: SourceLocation,
    ) -> Option<TypeId> {
        if self.check_duplicate(name, at) {
            return None;
        }
        let id = self.structure_ids.alloc();
        self.type_names.insert(name, id);
        self.names_by_type.insert(id, name);
        self.structure_members.insert(id, members);
        Some(id)
    }

    pub fn structure_members(&self, type_id: TypeId) -> Option<&[(Handle, TypeId)]> {
        self.structure_members
            .get(&type_id.strip_reference())
            .map(|v| v.as_slice())
    }

    pub fn register_sum(&mut self, name: Handle, at: SourceLocation) -> Option<TypeId> {
        if self.check_duplicate(name, at) {
            return None;
        }
        let id = self.sum_ids.alloc();
        self.type_names.insert(name, id);
        self.names_by_type.insert(id, name);
        self.sum_bases.insert(id, Vec::new());
        Some(id)
    }

    pub fn add_sum_base(&mut self, sum_id: TypeId, base_id: TypeId) {
        self.sum_bases.entry(sum_id).or_default().push(base_id);
    }

    pub fn sum_bases(&self, sum_id: TypeId) -> &[TypeId] {
        self.sum_bases
            .get(&sum_id.strip_reference())
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_sum_base(&self, sum_id: TypeId, candidate: TypeId) -> bool {
        self.sum_bases(sum_id)
            .iter()
            .any(|b| b.same_underlying(candidate))
    }

    pub fn register_weak_alias(
        &mut self,
        name: Handle,
        rep_type: TypeId,
        at: SourceLocation,
    ) -> Option<TypeId> {
        if self.check_duplicate(name, at) {
            return None;
        }
        let id = self.weak_alias_ids.alloc();
        self.type_names.insert(name, id);
        self.names_by_type.insert(id, name);
        self.weak_aliases.insert(id, rep_type);
        Some(id)
    }

    pub fn register_strong_alias(
        &mut self,
        name: Handle,
        rep_type: TypeId,
        rep_name: Handle,
        at: SourceLocation,
    ) -> Option<TypeId> {
        if self.check_duplicate(name, at) {
            return None;
        }
        let id = self.strong_alias_ids.alloc();
        self.type_names.insert(name, id);
        self.names_by_type.insert(id, name);
        self.strong_aliases.insert(id, (rep_type, rep_name));
        Some(id)
    }

    pub fn strong_representation_of(&self, id: TypeId) -> Option<TypeId> {
        self.strong_aliases.get(&id.strip_reference()).map(|(t, _)| *t)
    }

    pub fn strong_alias_constructor_name(&self, id: TypeId) -> Option<Handle> {
        self.strong_aliases.get(&id.strip_reference()).map(|(_, n)| *n)
    }

    pub fn alloc_template_instance_id(&mut self) -> TypeId {
        self.template_instance_ids.alloc()
    }

    // -- Templates (C6) ---------------------------------------------------

    pub fn register_structure_template(
        &mut self,
        name: Handle,
        params: Vec<Handle>,
        members: Vec<(Handle, MemberTypeRef)>,
    ) {
        self.structure_templates
            .insert(name, StructureTemplate { params, members });
    }

    pub fn register_sum_template(&mut self, name: Handle, params: Vec<Handle>, bases: Vec<MemberTypeRef>) {
        self.sum_templates.insert(name, SumTemplate { params, bases });
    }

    pub fn is_structure_template(&self, name: Handle) -> bool {
        self.structure_templates.contains_key(&name)
    }

    pub fn is_sum_template(&self, name: Handle) -> bool {
        self.sum_templates.contains_key(&name)
    }

    /// Returns the cached instance for `(template, args)` if one already
    /// exists (spec §4.6: "identical argument tuples return the cached
    /// instance").
    pub fn cached_instantiation(&self, template: Handle, args: &[TypeId]) -> Option<TypeId> {
        self.instantiation_cache.get(&(template, args.to_vec())).copied()
    }

    /// Monomorphises a structure template, registering a fresh type unless
    /// an identical instantiation is already cached.
    pub fn instantiate_structure(&mut self, name: Handle, args: Vec<TypeId>, at: SourceLocation) -> Option<TypeId> {
        if let Some(cached) = self.cached_instantiation(name, &args) {
            return Some(cached);
        }
        let template = self.structure_templates.get(&name)?.clone();
        if template.params.len() != args.len() {
            return None;
        }
        let substitution: HashMap<Handle, TypeId> =
            template.params.iter().copied().zip(args.iter().copied()).collect();
        let members: Vec<(Handle, TypeId)> = template
            .members
            .iter()
            .map(|(member_name, member_type)| {
                let resolved = match member_type {
                    MemberTypeRef::Concrete(t) => *t,
                    MemberTypeRef::Param(p) => substitution.get(p).copied().unwrap_or(TypeId::ERROR),
                };
                (*member_name, resolved)
            })
            .collect();

        let id = self.template_instance_ids.alloc();
        let instance_name = self.mangled_instance_name(name, &args);
        self.type_names.insert(instance_name, id);
        self.names_by_type.insert(id, instance_name);
        self.structure_members.insert(id, members);
        self.instantiation_cache.insert((name, args), id);
        let _ = at;
        Some(id)
    }

    pub fn instantiate_sum(&mut self, name: Handle, args: Vec<TypeId>, at: SourceLocation) -> Option<TypeId> {
        if let Some(cached) = self.cached_instantiation(name, &args) {
            return Some(cached);
        }
        let template = self.sum_templates.get(&name)?.clone();
        if template.params.len() != args.len() {
            return None;
        }
        let substitution: HashMap<Handle, TypeId> =
            template.params.iter().copied().zip(args.iter().copied()).collect();
        let bases: Vec<TypeId> = template
            .bases
            .iter()
            .map(|b| match b {
                MemberTypeRef::Concrete(t) => *t,
                MemberTypeRef::Param(p) => substitution.get(p).copied().unwrap_or(TypeId::ERROR),
            })
            .collect();

        let id = self.sum_ids.alloc();
        let instance_name = self.mangled_instance_name(name, &args);
        self.type_names.insert(instance_name, id);
        self.names_by_type.insert(id, instance_name);
        self.sum_bases.insert(id, bases);
        self.instantiation_cache.insert((name, args), id);
        let _ = at;
        Some(id)
    }

    fn mangled_instance_name(&mut self, base: Handle, args: &[TypeId]) -> Handle {
        let base_text = self.resolve(base).to_string();
        let mut mangled = base_text;
        mangled.push('<');
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                mangled.push(',');
            }
            mangled.push_str(&arg.raw().to_string());
        }
        mangled.push('>');
        self.intern(&mangled)
    }

    pub fn alloc_function_signature_id(&mut self) -> TypeId {
        self.function_signature_ids.alloc()
    }

    // -- Functions -----------------------------------------------------

    pub fn declare_function(
        &mut self,
        name: Handle,
        signature: FunctionSignature,
        body: OverloadBody,
    ) -> Handle {
        let overload = Handle(self.next_overload_handle);
        self.next_overload_handle += 1;
        self.functions
            .overloads_by_name
            .entry(name)
            .or_default()
            .push(overload);
        self.functions.signatures.insert(overload, signature);
        self.functions.bodies.insert(overload, body);
        overload
    }

    pub fn has_function(&self, name: Handle) -> bool {
        self.functions
            .overloads_by_name
            .get(&name)
            .is_some_and(|v| !v.is_empty())
    }

    pub fn overloads_of(&self, name: Handle) -> &[Handle] {
        self.functions
            .overloads_by_name
            .get(&name)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn signature_of(&self, overload: Handle) -> Option<&FunctionSignature> {
        self.functions.signatures.get(&overload)
    }

    pub fn body_of(&self, overload: Handle) -> Option<&OverloadBody> {
        self.functions.bodies.get(&overload)
    }

    pub fn rewrite_signature(&mut self, overload: Handle, signature: FunctionSignature) {
        self.functions.signatures.insert(overload, signature);
    }

    // -- Compile helpers & entity tags -----------------------------------

    pub fn register_compile_helper(&mut self, name: Handle, helper: CompileHelper) {
        self.compile_helpers.insert(name, helper);
    }

    pub fn compile_helper_for(&self, name: Handle) -> Option<CompileHelper> {
        self.compile_helpers.get(&name).copied()
    }

    pub fn register_entity_tag(&mut self, name: Handle, meta: EntityTagMeta) {
        self.entity_tags.insert(name, meta);
    }

    pub fn entity_tag(&self, name: Handle) -> Option<&EntityTagMeta> {
        self.entity_tags.get(&name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_idempotent() {
        let mut ns = Namespace::new("t.ember");
        let a = ns.intern("foo");
        let b = ns.intern("foo");
        assert_eq!(a, b);
        assert_eq!(ns.resolve(a), "foo");
    }

    #[test]
    fn primitive_names_resolve_through_lookup_type() {
        let mut ns = Namespace::new("t.ember");
        let handle = ns.intern("integer");
        assert_eq!(ns.lookup_type(handle), Some(PrimitiveType::Integer32.type_id()));
    }

    #[test]
    fn weak_alias_resolves_transparently() {
        let mut ns = Namespace::new("t.ember");
        let name = ns.intern("MyInt");
        let id = ns
            .register_weak_alias(name, PrimitiveType::Integer32.type_id(), SourceLocation::default())
            .unwrap();
        assert_eq!(ns.lookup_type(name), Some(PrimitiveType::Integer32.type_id()));
        assert_ne!(id, PrimitiveType::Integer32.type_id());
    }

    #[test]
    fn strong_alias_is_distinct_but_recoverable() {
        let mut ns = Namespace::new("t.ember");
        let name = ns.intern("Meters");
        let rep_name = ns.intern("Meters@@rep");
        let id = ns
            .register_strong_alias(
                name,
                PrimitiveType::Real32.type_id(),
                rep_name,
                SourceLocation::default(),
            )
            .unwrap();
        // A strong alias is its own nominal type: lookup_type must not
        // collapse it to the representation type the way a weak alias does.
        assert_eq!(ns.lookup_type(name), Some(id));
        assert_eq!(
            ns.strong_representation_of(id),
            Some(PrimitiveType::Real32.type_id())
        );
    }

    #[test]
    fn duplicate_registration_is_reported_and_rejected() {
        let mut ns = Namespace::new("t.ember");
        let name = ns.intern("Dup");
        assert!(ns.register_sum(name, SourceLocation::default()).is_some());
        assert!(ns.register_sum(name, SourceLocation::default()).is_none());
        assert_eq!(ns.diagnostics_ref().len(), 1);
    }

    #[test]
    fn overload_handles_are_distinct_and_ordered() {
        let mut ns = Namespace::new("t.ember");
        let name = ns.intern("f");
        let sig_a = FunctionSignature {
            return_type: PrimitiveType::Integer32.type_id(),
            params: vec![],
        };
        let sig_b = FunctionSignature {
            return_type: PrimitiveType::Integer32.type_id(),
            params: vec![SignatureParam {
                name: ns.intern("a"),
                type_id: PrimitiveType::Integer32.type_id(),
                is_reference: false,
                literal_payload: None,
                nested_signature: None,
                template_param: None,
            }],
        };
        let h1 = ns.declare_function(name, sig_a, OverloadBody::Ir);
        let h2 = ns.declare_function(name, sig_b, OverloadBody::Ir);
        assert_ne!(h1, h2);
        assert_eq!(ns.overloads_of(name), &[h1, h2]);
    }

    #[test]
    fn scope_lookup_walks_parent_chain_and_counts_frames() {
        let mut scopes = Scopes::default();
        let root = scopes.new_root();
        let child = scopes.new_child(root);
        scopes.add_variable(root, Handle(1), PrimitiveType::Integer32.type_id(), VariableOrigin::Local);

        let found = scopes.find_variable(child, Handle(1));
        assert_eq!(found, Some((root, 1)));
        assert!(scopes.find_variable(child, Handle(2)).is_none());
    }
}
