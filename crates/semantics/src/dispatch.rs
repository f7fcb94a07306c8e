//! C7: the dispatcher synthesiser (spec §4.7).
//!
//! Synthesised dispatchers are registered as ordinary overloads (spec:
//! "so that later stages do not special-case them") — grounded on the
//! `Pattern`/`MatchArm`/`Statement::Match` shape this crate's lineage uses
//! elsewhere, which likewise treats a compiled match arm list as just
//! another callable body rather than a distinct IR node kind.

use crate::ir::{Function, LiteralValue};
use crate::registry::{FunctionSignature, Handle, Namespace, OverloadBody};
use crate::types::TypeId;

/// One arm of a synthesised pattern-match dispatcher: a literal to compare
/// the incoming argument against, and the concrete overload to forward to
/// on a match.
#[derive(Debug, Clone)]
pub struct PatternArm {
    pub payload: LiteralValue,
    pub target: Handle,
}

/// One arm of a synthesised type-match dispatcher: a concrete base type
/// the runtime tag may carry, and the overload accepting that base.
#[derive(Debug, Clone)]
pub struct TypeArm {
    pub base_type: TypeId,
    pub target: Handle,
}

#[derive(Debug, Clone)]
pub enum DispatcherKind {
    PatternMatch(Vec<PatternArm>),
    TypeMatch(Vec<TypeArm>),
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    pub name: Handle,
    pub overload: Handle,
    pub kind: DispatcherKind,
}

/// Synthesises a pattern-match dispatcher over `candidates`, all of which
/// must share arity and differ only in their literal-payload parameter
/// (spec §4.7). `argument_index` identifies which parameter position
/// carries the distinguishing literal.
pub fn synthesize_pattern_dispatcher(
    namespace: &mut Namespace,
    base_name: Handle,
    candidates: &[Handle],
    argument_index: usize,
) -> Option<Dispatcher> {
    if candidates.len() < 2 {
        return None;
    }
    let mut arms = Vec::with_capacity(candidates.len());
    let mut common_signature: Option<FunctionSignature> = None;
    for &candidate in candidates {
        let sig = namespace.signature_of(candidate)?.clone();
        let payload = sig.params.get(argument_index)?.literal_payload.clone()?;
        arms.push(PatternArm { payload, target: candidate });
        match &common_signature {
            None => common_signature = Some(sig),
            Some(existing) => {
                if existing.arity() != sig.arity() {
                    return None;
                }
            }
        }
    }
    let signature = common_signature?;
    let dispatcher_name = mangled_dispatcher_name(namespace, base_name, "pattern");
    let overload = namespace.declare_function(dispatcher_name, signature, OverloadBody::Ir);
    Some(Dispatcher {
        name: dispatcher_name,
        overload,
        kind: DispatcherKind::PatternMatch(arms),
    })
}

/// Synthesises a type-match dispatcher over `candidates`, all of which must
/// agree on return type and on reference-ness of each parameter except
/// where one side accepts `nothing` (spec §4.7).
pub fn synthesize_type_dispatcher(
    namespace: &mut Namespace,
    base_name: Handle,
    candidates: &[Handle],
    argument_index: usize,
) -> Option<Dispatcher> {
    if candidates.len() < 2 {
        return None;
    }
    let mut arms = Vec::with_capacity(candidates.len());
    let mut return_type: Option<TypeId> = None;
    let mut reference_flags: Option<Vec<bool>> = None;

    for &candidate in candidates {
        let sig = namespace.signature_of(candidate)?.clone();
        let param = sig.params.get(argument_index)?;
        arms.push(TypeArm { base_type: param.type_id, target: candidate });

        match return_type {
            None => return_type = Some(sig.return_type),
            Some(existing) => {
                if !existing.same_underlying(sig.return_type) {
                    return None;
                }
            }
        }

        let flags: Vec<bool> = sig.params.iter().map(|p| p.is_reference).collect();
        match &reference_flags {
            None => reference_flags = Some(flags),
            Some(existing) => {
                let compatible = existing.iter().zip(flags.iter()).all(|(a, b)| {
                    a == b
                        || sig
                            .params
                            .iter()
                            .any(|p| p.type_id == crate::types::PrimitiveType::Nothing.type_id())
                });
                if !compatible {
                    return None;
                }
            }
        }
    }

    let return_type = return_type?;
    let params = namespace.signature_of(candidates[0])?.params.clone();
    let signature = FunctionSignature { return_type, params };
    let dispatcher_name = mangled_dispatcher_name(namespace, base_name, "typematch");
    let overload = namespace.declare_function(dispatcher_name, signature, OverloadBody::Ir);
    Some(Dispatcher {
        name: dispatcher_name,
        overload,
        kind: DispatcherKind::TypeMatch(arms),
    })
}

fn mangled_dispatcher_name(namespace: &mut Namespace, base_name: Handle, flavor: &str) -> Handle {
    let base = namespace.resolve(base_name).to_string();
    namespace.intern(&format!("{base}@@dispatch@@{flavor}"))
}

/// Emits a dispatcher's body as a synthetic [`Function`] wrapping a chain
/// of pattern/type checks (used by a downstream code generator; this crate
/// only produces the typed IR shape, not machine code — spec §1 "Out of
/// scope: code generation").
pub fn dispatcher_stub_function(dispatcher: &Dispatcher) -> Function {
    Function {
        name: dispatcher.name,
        overload: dispatcher.overload,
        params: vec![],
        return_expression: None,
        body: None,
        tags: vec![],
        template_params: vec![],
        inference_done: true,
        return_type_hint: TypeId::INFER,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SignatureParam;
    use crate::types::PrimitiveType;

    fn declare(namespace: &mut Namespace, name: Handle, payload: Option<LiteralValue>) -> Handle {
        let param_name = namespace.intern("x");
        let signature = FunctionSignature {
            return_type: PrimitiveType::Void.type_id(),
            params: vec![SignatureParam {
                name: param_name,
                type_id: PrimitiveType::Integer32.type_id(),
                is_reference: false,
                literal_payload: payload,
                nested_signature: None,
                template_param: None,
            }],
        };
        namespace.declare_function(name, signature, OverloadBody::Ir)
    }

    #[test]
    fn pattern_dispatcher_requires_at_least_two_candidates() {
        let mut ns = Namespace::new("t.ember");
        let name = ns.intern("f");
        let only = declare(&mut ns, name, Some(LiteralValue::Integer32(1)));
        assert!(synthesize_pattern_dispatcher(&mut ns, name, &[only], 0).is_none());
    }

    #[test]
    fn pattern_dispatcher_collects_one_arm_per_candidate() {
        let mut ns = Namespace::new("t.ember");
        let name = ns.intern("f");
        let a = declare(&mut ns, name, Some(LiteralValue::Integer32(0)));
        let b = declare(&mut ns, name, Some(LiteralValue::Integer32(1)));
        let dispatcher = synthesize_pattern_dispatcher(&mut ns, name, &[a, b], 0).unwrap();
        match dispatcher.kind {
            DispatcherKind::PatternMatch(arms) => assert_eq!(arms.len(), 2),
            _ => panic!("expected pattern dispatcher"),
        }
        assert_ne!(dispatcher.overload, a);
        assert_ne!(dispatcher.overload, b);
    }

    #[test]
    fn type_dispatcher_rejects_divergent_return_types() {
        let mut ns = Namespace::new("t.ember");
        let name = ns.intern("g");
        let a_name = ns.intern("g-a");
        let b_name = ns.intern("g-b");
        let param_a = ns.intern("x");
        let a = ns.declare_function(
            a_name,
            FunctionSignature {
                return_type: PrimitiveType::Integer32.type_id(),
                params: vec![SignatureParam {
                    name: param_a,
                    type_id: PrimitiveType::Integer32.type_id(),
                    is_reference: false,
                    literal_payload: None,
                    nested_signature: None,
                    template_param: None,
                }],
            },
            OverloadBody::Ir,
        );
        let param_b = ns.intern("y");
        let b = ns.declare_function(
            b_name,
            FunctionSignature {
                return_type: PrimitiveType::Boolean.type_id(),
                params: vec![SignatureParam {
                    name: param_b,
                    type_id: PrimitiveType::StringT.type_id(),
                    is_reference: false,
                    literal_payload: None,
                    nested_signature: None,
                    template_param: None,
                }],
            },
            OverloadBody::Ir,
        );
        assert!(synthesize_type_dispatcher(&mut ns, name, &[a, b], 0).is_none());
    }
}
