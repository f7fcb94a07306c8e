//! C6: the template instantiator (spec §4.6).
//!
//! Structure and sum templates are monomorphised entirely inside the
//! registry (`Namespace::instantiate_structure`/`instantiate_sum`), since
//! their substitution only touches member-type tables the registry already
//! owns. Function templates are handled here because substitution walks
//! the owned IR tree (`ir::Function`), which the registry never holds —
//! grounded on Epoch's `ScopeDescription::Fixup`, which performs the same
//! clone-and-substitute over a function's parameter/local list.

use std::collections::HashMap;

use crate::ir::{Atom, Expression, Function, Parameter, TemplateArg};
use crate::registry::{FunctionSignature, Handle, Namespace, OverloadBody, SignatureParam};
use crate::types::TypeId;

/// Consumes a statement's deferred template args against a named template
/// (structure, sum, or function), returning the canonical instantiated
/// name to rewrite the statement to. Structure/sum instantiation resolves
/// immediately; function-template instantiation is deferred to
/// [`instantiate_function`], called once the template function's own body
/// has been lowered (the statement is left pointing at the still-generic
/// name, and a subsequent lookup over `instantiate_function`'s cache
/// redirects it — see `infer.rs`'s handling of `needs_instantiation`).
pub fn instantiate_from_args(
    namespace: &mut Namespace,
    name: Handle,
    args: &[TemplateArg],
) -> Option<Handle> {
    let type_args: Vec<TypeId> = args
        .iter()
        .map(|a| match a {
            TemplateArg::Type(t) => *t,
            TemplateArg::TypeName(h) => namespace.lookup_type(*h).unwrap_or(TypeId::ERROR),
        })
        .collect();

    if namespace.is_structure_template(name) {
        let id = namespace.instantiate_structure(name, type_args, Default::default())?;
        return namespace.name_of_type(id);
    }
    if namespace.is_sum_template(name) {
        let id = namespace.instantiate_sum(name, type_args, Default::default())?;
        return namespace.name_of_type(id);
    }
    // Not a type template: leave the name alone for `infer.rs` to treat as
    // a (possibly function-template) call.
    None
}

/// Cache key for function-template instantiation: the template's declared
/// name plus the concrete argument tuple (spec §4.6 invariant).
type FunctionCacheKey = (Handle, Vec<TypeId>);

/// Owns the function-template instantiation cache across a compilation
/// run. Kept separate from [`Namespace`] because it stores cloned
/// [`Function`] IR, which the registry has no reason to hold.
#[derive(Default)]
pub struct FunctionInstantiator {
    cache: HashMap<FunctionCacheKey, Handle>,
}

impl FunctionInstantiator {
    pub fn new() -> Self {
        FunctionInstantiator::default()
    }

    /// Monomorphises `template`, substituting `args` for its template
    /// parameters in every parameter and the return-type hint, and
    /// registering one fresh overload per original overload name (spec
    /// §4.6: "register new overloads (one per original overload name)").
    /// Returns the instantiated function plus its registered overload
    /// handle.
    pub fn instantiate_function(
        &mut self,
        namespace: &mut Namespace,
        template: &Function,
        args: Vec<TypeId>,
    ) -> (Function, Handle) {
        let key = (template.name, args.clone());
        if let Some(&handle) = self.cache.get(&key) {
            let mut cloned = template.clone();
            cloned.name = handle;
            return (cloned, handle);
        }

        let substitution: HashMap<Handle, TypeId> = template
            .template_params
            .iter()
            .copied()
            .zip(args.iter().copied())
            .collect();

        let params: Vec<Parameter> = template
            .params
            .iter()
            .map(|p| substitute_parameter(p, &substitution))
            .collect();

        let base_name = namespace.resolve(template.name).to_string();
        let mangled = mangle(&base_name, &args);
        let instance_name = namespace.intern(&mangled);

        let return_type = substitute_return_type(template, &params);
        let signature = FunctionSignature {
            return_type,
            params: params
                .iter()
                .map(|p| SignatureParam {
                    name: p.name,
                    type_id: p.type_id,
                    is_reference: p.is_reference,
                    literal_payload: p.payload.clone(),
                    nested_signature: p.nested_signature,
                    template_param: None,
                })
                .collect(),
        };
        let overload = namespace.declare_function(instance_name, signature, OverloadBody::Ir);
        self.cache.insert(key, overload);

        let mut instance = template.clone();
        instance.name = instance_name;
        instance.params = params;
        instance.template_params.clear();
        instance.return_type_hint = return_type;
        instance.inference_done = false;
        if let Some(expr) = &mut instance.return_expression {
            expr.inference_done = false;
            expr.inferred_type = TypeId::INFER;
        }
        (instance, overload)
    }
}

/// Replaces a template-placeholder parameter's `type_id` with the concrete
/// type substituted for it (spec §4.6: "substitute in parameter types").
fn substitute_parameter(param: &Parameter, substitution: &HashMap<Handle, TypeId>) -> Parameter {
    let mut out = param.clone();
    if let Some(placeholder) = param.template_param {
        if let Some(&concrete) = substitution.get(&placeholder) {
            out.type_id = concrete;
        }
    }
    out
}

/// Substitutes a template's return type (spec §4.6: "substitute in ...
/// return expression"). `ParseFunction` has no separately declared return
/// type — it is always inferred from `return_expression` — so the only
/// shape that needs substitution here is the common generic-identity case
/// where the body returns one of the template's own parameters verbatim;
/// anything else keeps the template's already-inferred return type.
fn substitute_return_type(template: &Function, params: &[Parameter]) -> TypeId {
    let Some(Expression { atoms, .. }) = &template.return_expression else {
        return template.return_type_hint;
    };
    let [Atom::Identifier { name, .. }] = atoms.as_slice() else {
        return template.return_type_hint;
    };
    template
        .params
        .iter()
        .zip(params.iter())
        .find(|(orig, _)| orig.name == *name)
        .map(|(_, substituted)| substituted.type_id)
        .unwrap_or(template.return_type_hint)
}

fn mangle(base: &str, args: &[TypeId]) -> String {
    let mut s = String::from(base);
    s.push('<');
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            s.push(',');
        }
        s.push_str(&arg.to_string());
    }
    s.push('>');
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Function;
    use crate::types::PrimitiveType;

    fn sample_function(namespace: &mut Namespace) -> Function {
        let name = namespace.intern("identity");
        let t_param = namespace.intern("T");
        let p_name = namespace.intern("x");
        Function {
            name,
            overload: name,
            params: vec![Parameter {
                name: p_name,
                is_local: false,
                is_reference: false,
                type_id: TypeId::INFER,
                nested_signature: None,
                template_param: Some(t_param),
                payload: None,
            }],
            return_expression: Some(Expression::new(vec![Atom::Identifier {
                name: p_name,
                resolved_type: TypeId::INFER,
            }])),
            body: None,
            tags: vec![],
            template_params: vec![t_param],
            inference_done: false,
            return_type_hint: TypeId::INFER,
        }
    }

    #[test]
    fn instantiating_twice_with_same_args_hits_cache() {
        let mut ns = Namespace::new("t.ember");
        let template = sample_function(&mut ns);
        let mut inst = FunctionInstantiator::new();
        let args = vec![PrimitiveType::StringT.type_id()];

        let (_f1, h1) = inst.instantiate_function(&mut ns, &template, args.clone());
        let (_f2, h2) = inst.instantiate_function(&mut ns, &template, args);
        assert_eq!(h1, h2);
    }

    #[test]
    fn template_parameter_and_return_type_are_substituted() {
        let mut ns = Namespace::new("t.ember");
        let template = sample_function(&mut ns);
        let mut inst = FunctionInstantiator::new();

        let (instance, overload) =
            inst.instantiate_function(&mut ns, &template, vec![PrimitiveType::StringT.type_id()]);

        assert_eq!(instance.params[0].type_id, PrimitiveType::StringT.type_id());
        assert_eq!(instance.return_type_hint, PrimitiveType::StringT.type_id());
        let signature = ns.signature_of(overload).unwrap();
        assert_eq!(signature.params[0].type_id, PrimitiveType::StringT.type_id());
        assert_eq!(signature.return_type, PrimitiveType::StringT.type_id());
    }

    #[test]
    fn distinct_args_produce_distinct_overloads() {
        let mut ns = Namespace::new("t.ember");
        let template = sample_function(&mut ns);
        let mut inst = FunctionInstantiator::new();

        let (_f1, h1) =
            inst.instantiate_function(&mut ns, &template, vec![PrimitiveType::StringT.type_id()]);
        let (_f2, h2) =
            inst.instantiate_function(&mut ns, &template, vec![PrimitiveType::Boolean.type_id()]);
        assert_ne!(h1, h2);
    }

    #[test]
    fn structure_template_instantiation_is_cached_by_argument_tuple() {
        let mut ns = Namespace::new("t.ember");
        let name = ns.intern("Box");
        let t = ns.intern("T");
        let field = ns.intern("value");
        ns.register_structure_template(
            name,
            vec![t],
            vec![(field, crate::registry::MemberTypeRef::Param(t))],
        );

        let a = ns
            .instantiate_structure(name, vec![PrimitiveType::Integer32.type_id()], Default::default())
            .unwrap();
        let b = ns
            .instantiate_structure(name, vec![PrimitiveType::Integer32.type_id()], Default::default())
            .unwrap();
        let c = ns
            .instantiate_structure(name, vec![PrimitiveType::Boolean.type_id()], Default::default())
            .unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
