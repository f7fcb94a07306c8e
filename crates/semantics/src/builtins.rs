//! Reference-implementation built-in operator signatures (spec §6
//! Configuration: "a reference `PipelineConfig` ships a conservative
//! built-in operator set so the CLI harness and fixture tests have
//! something to compile against without an external embedder").
//!
//! Mirrors the lazily-built `HashMap`-of-signatures idiom this crate's
//! lineage uses elsewhere: operators are registered as ordinary overloads
//! in the [`Namespace`], so inference never special-cases them.

use std::collections::HashMap;

use crate::registry::{FunctionSignature, Namespace, OverloadBody, SignatureParam};
use crate::types::PrimitiveType;

/// Integer operator precedence table (spec §4.5 Shunting-Yard pass: "higher
/// binds tighter"). Member access binds tightest; assignment-like compound
/// operators are handled by `infer::infer_assignment` and never appear in
/// an expression's atom list, so they have no entry here.
pub fn precedence_table() -> HashMap<&'static str, u8> {
    let mut table = HashMap::new();
    table.insert(".", 100);
    table.insert("!", 90);
    table.insert("-u", 90); // unary negate, distinguished from binary `-`
    table.insert("*", 70);
    table.insert("/", 70);
    table.insert("+", 60);
    table.insert("-", 60);
    table.insert("<", 50);
    table.insert(">", 50);
    table.insert("<=", 50);
    table.insert(">=", 50);
    table.insert("==", 40);
    table.insert("!=", 40);
    table.insert("&&", 30);
    table.insert("||", 20);
    table
}

pub fn precedence_of(name: &str) -> u8 {
    precedence_table().get(name).copied().unwrap_or(10)
}

/// Registers every operator overload a freshly constructed pipeline ships
/// with by default (spec §6 `PipelineConfig::with_default_builtins`).
pub fn register_builtins(namespace: &mut Namespace) {
    let int = PrimitiveType::Integer32.type_id();
    let real = PrimitiveType::Real32.type_id();
    let boolean = PrimitiveType::Boolean.type_id();
    let string = PrimitiveType::StringT.type_id();

    register_binary(namespace, "+", int, int, int);
    register_binary(namespace, "-", int, int, int);
    register_binary(namespace, "*", int, int, int);
    register_binary(namespace, "/", int, int, int);
    register_binary(namespace, "+", real, real, real);
    register_binary(namespace, "-", real, real, real);
    register_binary(namespace, "*", real, real, real);
    register_binary(namespace, "/", real, real, real);
    register_binary(namespace, "+", string, string, string);

    register_binary(namespace, "<", int, int, boolean);
    register_binary(namespace, ">", int, int, boolean);
    register_binary(namespace, "<=", int, int, boolean);
    register_binary(namespace, ">=", int, int, boolean);
    register_binary(namespace, "==", int, int, boolean);
    register_binary(namespace, "!=", int, int, boolean);
    register_binary(namespace, "==", string, string, boolean);
    register_binary(namespace, "!=", string, string, boolean);

    register_binary(namespace, "&&", boolean, boolean, boolean);
    register_binary(namespace, "||", boolean, boolean, boolean);

    register_unary(namespace, "!", boolean, boolean);
    register_unary(namespace, "-u", int, int);
    register_unary(namespace, "-u", real, real);
}

fn register_binary(
    namespace: &mut Namespace,
    op: &str,
    lhs: crate::types::TypeId,
    rhs: crate::types::TypeId,
    result: crate::types::TypeId,
) {
    let name = namespace.intern(op);
    let lhs_name = namespace.intern("lhs");
    let rhs_name = namespace.intern("rhs");
    let signature = FunctionSignature {
        return_type: result,
        params: vec![
            SignatureParam {
                name: lhs_name,
                type_id: lhs,
                is_reference: false,
                literal_payload: None,
                nested_signature: None,
                template_param: None,
            },
            SignatureParam {
                name: rhs_name,
                type_id: rhs,
                is_reference: false,
                literal_payload: None,
                nested_signature: None,
                template_param: None,
            },
        ],
    };
    namespace.declare_function(name, signature, OverloadBody::Extern);
}

fn register_unary(
    namespace: &mut Namespace,
    op: &str,
    operand: crate::types::TypeId,
    result: crate::types::TypeId,
) {
    let name = namespace.intern(op);
    let operand_name = namespace.intern("operand");
    let signature = FunctionSignature {
        return_type: result,
        params: vec![SignatureParam {
            name: operand_name,
            type_id: operand,
            is_reference: false,
            literal_payload: None,
            nested_signature: None,
            template_param: None,
        }],
    };
    namespace.declare_function(name, signature, OverloadBody::Extern);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_access_binds_tighter_than_arithmetic() {
        assert!(precedence_of(".") > precedence_of("*"));
        assert!(precedence_of("*") > precedence_of("+"));
        assert!(precedence_of("+") > precedence_of("=="));
        assert!(precedence_of("==") > precedence_of("&&"));
    }

    #[test]
    fn unknown_operator_gets_low_default_precedence() {
        assert_eq!(precedence_of("user-defined-op"), 10);
    }

    #[test]
    fn register_builtins_populates_arithmetic_overloads() {
        let mut ns = Namespace::new("t.ember");
        register_builtins(&mut ns);
        let plus = ns.intern("+");
        assert!(ns.has_function(plus));
        assert!(ns.overloads_of(plus).len() >= 4);
    }
}
