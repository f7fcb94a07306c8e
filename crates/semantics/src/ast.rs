//! The input contract: the parse tree handed to this crate by an external
//! lexer/parser (spec §6).
//!
//! Lexing and parsing are out of scope (spec §1); this module only defines
//! the *shape* the lowering pass (`lower.rs`) expects to receive. The tree
//! derives [`serde::Deserialize`] so the `emberc` CLI harness can read it as
//! JSON for fixture-driven smoke tests — production embedders are expected
//! to build this tree directly rather than go through JSON.

use serde::Deserialize;

/// Byte offset into the original source buffer, used to compute line/column
/// for diagnostics (spec §6: "line/column are computed from the byte offset
/// of the anchored parse-tree node").
pub type SourceOffset = usize;

#[derive(Debug, Clone, Deserialize)]
pub struct ParseProgram {
    pub structures: Vec<ParseStructure>,
    pub sum_types: Vec<ParseSumType>,
    pub weak_aliases: Vec<ParseTypeAlias>,
    pub strong_aliases: Vec<ParseStrongAlias>,
    pub functions: Vec<ParseFunction>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParseStructure {
    pub name: String,
    pub members: Vec<ParseMemberVariable>,
    pub member_functions: Vec<ParseFunctionRefSignature>,
    pub template_params: Vec<String>,
    pub at: SourceOffset,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParseMemberVariable {
    pub name: String,
    pub type_name: String,
    pub at: SourceOffset,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParseFunctionRefSignature {
    pub name: String,
    pub params: Vec<ParseFunctionParam>,
    pub return_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParseSumType {
    pub name: String,
    pub base_types: Vec<String>,
    pub template_params: Vec<String>,
    pub at: SourceOffset,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParseTypeAlias {
    pub name: String,
    pub target_type: String,
    pub at: SourceOffset,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParseStrongAlias {
    pub name: String,
    pub representation_type: String,
    pub at: SourceOffset,
}

/// A function parameter as written in source. At most one of `type_name`
/// and `function_ref` is present; neither present means the parameter type
/// is `nothing` (a pattern-matched literal slot, see `literal`).
#[derive(Debug, Clone, Deserialize)]
pub struct ParseFunctionParam {
    pub name: String,
    pub type_name: Option<String>,
    pub function_ref: Option<Box<ParseFunctionRefSignature>>,
    pub is_reference: bool,
    pub literal: Option<ParseLiteral>,
    pub at: SourceOffset,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParseFunction {
    pub name: String,
    pub params: Vec<ParseFunctionParam>,
    pub return_expression: Option<ParseExpression>,
    pub body: Option<ParseCodeBlock>,
    pub tags: Vec<String>,
    pub template_params: Vec<String>,
    pub at: SourceOffset,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParseCodeBlock {
    pub entries: Vec<ParseCodeEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum ParseCodeEntry {
    Statement(ParseStatement),
    Assignment(ParseAssignment),
    PreOp(ParsePrePostOp),
    PostOp(ParsePrePostOp),
    Entity(ParseEntity),
    Block(ParseCodeBlock),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParsePrePostOp {
    pub operator: String,
    pub operand: String,
    pub at: SourceOffset,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParseStatement {
    pub name: String,
    pub params: Vec<ParseExpression>,
    pub at: SourceOffset,
}

/// One l-value member-access path segment: either a bare identifier
/// (chain head) or a `.member` step.
#[derive(Debug, Clone, Deserialize)]
pub struct ParseAssignment {
    pub lhs_path: Vec<String>,
    pub operator: String,
    pub rhs: Box<ParseAssignmentRhs>,
    pub at: SourceOffset,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum ParseAssignmentRhs {
    Chained(ParseAssignment),
    Expression(ParseExpression),
}

/// An ordered sequence of raw expression components, not yet coalesced,
/// inferred, or precedence-reordered. Lowering preserves this order
/// verbatim; all of that work belongs to `infer.rs` (C5).
#[derive(Debug, Clone, Deserialize)]
pub struct ParseExpression {
    pub components: Vec<ParseExpressionComponent>,
    pub at: SourceOffset,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum ParseExpressionComponent {
    Literal(ParseLiteral),
    Identifier(String),
    Operator { name: String, is_member_access: bool },
    Parenthetical(Box<ParseExpression>),
    NestedStatement(ParseStatement),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum ParseLiteral {
    Integer32(i32),
    Integer16(i16),
    Real32(f32),
    Boolean(bool),
    StringLit(String),
}

/// A control-flow construct (`if`/`while`/`for`/…). `chain` holds
/// subsequent chained entities (`else if`, `else`); `postfix` holds a
/// trailing postfix identifier (`do … while`).
#[derive(Debug, Clone, Deserialize)]
pub struct ParseEntity {
    pub tag: String,
    pub params: Vec<ParseExpression>,
    pub body: Box<ParseCodeBlock>,
    pub chain: Vec<ParseEntity>,
    pub postfix: Option<String>,
    pub at: SourceOffset,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_a_minimal_program() {
        let json = r#"{
            "structures": [], "sum_types": [], "weak_aliases": [],
            "strong_aliases": [],
            "functions": [{
                "name": "main",
                "params": [],
                "return_expression": null,
                "body": { "entries": [] },
                "tags": [],
                "template_params": [],
                "at": 0
            }]
        }"#;
        let program: ParseProgram = serde_json::from_str(json).unwrap();
        assert_eq!(program.functions.len(), 1);
        assert_eq!(program.functions[0].name, "main");
    }

    #[test]
    fn deserializes_nested_expression_with_member_access() {
        let json = r#"{
            "components": [
                {"kind": "Identifier", "value": "p"},
                {"kind": "Operator", "value": {"name": ".", "is_member_access": true}},
                {"kind": "Identifier", "value": "x"}
            ],
            "at": 10
        }"#;
        let expr: ParseExpression = serde_json::from_str(json).unwrap();
        assert_eq!(expr.components.len(), 3);
        match &expr.components[1] {
            ParseExpressionComponent::Operator { name, is_member_access } => {
                assert_eq!(name, ".");
                assert!(*is_member_access);
            }
            other => panic!("expected operator component, got {other:?}"),
        }
    }
}
