//! Decodes decompiled-bytecode JSON into [`IrFunction`]s.
//!
//! spec.md §1 calls this an external collaborator ("the JSON decoder for
//! decompiled bytecode ... an opaque parser producing IR nodes") — it is
//! implemented here minimally, not as the crate's hard-engineering core.
//! Grounded on the original `decompiled_parser.c`'s `opr` vocabulary and
//! per-opcode field names (`index`, `type`, `operant`, `condition`,
//! `target`, `words`, `dim`, `from`/`to`), read here as `#[derive(Deserialize)]`
//! structs mirroring that shape, with a fallible `TryFrom<RawInstruction>`
//! into [`Payload`] in place of `cJSON_GetObjectItem` lookups.

use serde::Deserialize;

use super::function::IrFunction;
use super::instruction::{BinaryOp, Condition, Instruction, Payload};
use crate::error::AnalyzerError;
use crate::types::TypeId;
use crate::value::Value;

#[derive(Debug, Deserialize)]
pub struct RawClass {
    pub methods: Vec<RawMethodEntry>,
}

#[derive(Debug, Deserialize)]
pub struct RawMethodEntry {
    pub name: String,
    pub code: RawCode,
}

#[derive(Debug, Deserialize)]
pub struct RawCode {
    pub bytecode: Vec<RawInstruction>,
}

#[derive(Debug, Deserialize)]
struct RawPushValue {
    #[serde(rename = "type")]
    ty: String,
    value: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RawRef {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawMethodRef {
    name: String,
    #[serde(rename = "ref")]
    ref_: Option<RawRef>,
    #[serde(default)]
    args: Vec<String>,
    returns: Option<String>,
}

/// One entry of a decompiled method's `code.bytecode` array. Every field
/// besides `opr` is optional since the shape is a tagged union keyed on
/// `opr`'s value; [`Payload::try_from`] validates the fields each variant
/// actually requires.
#[derive(Debug, Deserialize)]
pub struct RawInstruction {
    opr: String,
    index: Option<i64>,
    #[serde(rename = "type")]
    ty: Option<String>,
    amount: Option<i64>,
    value: Option<RawPushValue>,
    operant: Option<String>,
    condition: Option<String>,
    target: Option<i64>,
    method: Option<RawMethodRef>,
    from: Option<String>,
    to: Option<String>,
    dim: Option<u32>,
}

fn field<T>(opt: Option<T>, opr: &str, name: &str) -> Result<T, AnalyzerError> {
    opt.ok_or_else(|| malformed(&format!("'{opr}' instruction missing field '{name}'")))
}

fn malformed(msg: &str) -> AnalyzerError {
    AnalyzerError::JsonShape(msg.to_string())
}

fn parse_value_type(s: &str) -> Result<TypeId, AnalyzerError> {
    match s {
        "int" | "integer" => Ok(TypeId::INT),
        "boolean" => Ok(TypeId::BOOLEAN),
        "char" => Ok(TypeId::CHAR),
        "ref" | "reference" => Ok(TypeId::REFERENCE),
        "null" => Ok(TypeId::VOID),
        other => Err(malformed(&format!("unknown type '{other}'"))),
    }
}

fn parse_binary_op(s: &str) -> Result<BinaryOp, AnalyzerError> {
    match s {
        "add" => Ok(BinaryOp::Add),
        "sub" => Ok(BinaryOp::Sub),
        "div" => Ok(BinaryOp::Div),
        "mul" => Ok(BinaryOp::Mul),
        "rem" => Ok(BinaryOp::Rem),
        other => Err(malformed(&format!("unknown binary operator '{other}'"))),
    }
}

fn parse_condition(s: &str) -> Result<Condition, AnalyzerError> {
    match s {
        "eq" => Ok(Condition::Eq),
        "ne" => Ok(Condition::Ne),
        "gt" => Ok(Condition::Gt),
        "lt" => Ok(Condition::Lt),
        "ge" => Ok(Condition::Ge),
        "le" => Ok(Condition::Le),
        other => Err(malformed(&format!("unknown condition '{other}'"))),
    }
}

fn parse_push_value(raw: &RawPushValue) -> Result<Value, AnalyzerError> {
    match raw.ty.as_str() {
        "integer" | "int" => Ok(Value::Int(raw.value.as_i64().ok_or_else(|| malformed("push int"))? as i32)),
        "boolean" => Ok(Value::Bool(raw.value.as_bool().ok_or_else(|| malformed("push bool"))?)),
        other => Err(malformed(&format!("unsupported push value type '{other}'"))),
    }
}

impl TryFrom<&RawInstruction> for Payload {
    type Error = AnalyzerError;

    fn try_from(raw: &RawInstruction) -> Result<Payload, AnalyzerError> {
        let opr = raw.opr.as_str();
        Ok(match opr {
            "load" => Payload::Load {
                index: field(raw.index, opr, "index")? as usize,
                ty: parse_value_type(field(raw.ty.as_deref(), opr, "type")?)?,
            },
            "store" => Payload::Store {
                index: field(raw.index, opr, "index")? as usize,
                ty: parse_value_type(field(raw.ty.as_deref(), opr, "type")?)?,
            },
            "incr" => Payload::Incr {
                index: field(raw.index, opr, "index")? as usize,
                amount: field(raw.amount, opr, "amount")? as i32,
            },
            "push" => Payload::Push { value: parse_push_value(field(raw.value.as_ref(), opr, "value")?)? },
            "dup" => Payload::Dup,
            "binary" => Payload::Binary {
                op: parse_binary_op(field(raw.operant.as_deref(), opr, "operant")?)?,
                ty: parse_value_type(field(raw.ty.as_deref(), opr, "type")?)?,
            },
            "negate" => Payload::Negate { ty: parse_value_type(field(raw.ty.as_deref(), opr, "type")?)? },
            "if" => Payload::If {
                cond: parse_condition(field(raw.condition.as_deref(), opr, "condition")?)?,
                target: field(raw.target, opr, "target")? as usize,
            },
            "ifz" => Payload::IfZ {
                cond: parse_condition(field(raw.condition.as_deref(), opr, "condition")?)?,
                target: field(raw.target, opr, "target")? as usize,
            },
            "goto" => Payload::Goto { target: field(raw.target, opr, "target")? as usize },
            "invoke" => {
                let method = field(raw.method.as_ref(), opr, "method")?;
                let method_name = method.name.clone();
                let ref_name = method.ref_.as_ref().and_then(|r| r.name.clone()).unwrap_or_default();
                let args = method.args.iter().filter_map(|s| parse_value_type(s).ok()).collect();
                let return_type =
                    method.returns.as_deref().and_then(|s| parse_value_type(s).ok()).unwrap_or(TypeId::VOID);
                Payload::Invoke { method_name, ref_name, args, return_type }
            }
            "return" => {
                let ty = match raw.ty.as_deref() {
                    None => TypeId::VOID,
                    Some(s) => parse_value_type(s)?,
                };
                Payload::Return { ty }
            }
            "throw" => Payload::Throw,
            "get" => Payload::Get,
            "new" => Payload::New,
            "cast" => {
                field(raw.from.as_deref(), opr, "from")?;
                field(raw.to.as_deref(), opr, "to")?;
                Payload::Cast
            }
            "compare_floating" => Payload::CompareFloating,
            "newarray" => Payload::NewArray {
                elem_type: parse_value_type(field(raw.ty.as_deref(), opr, "type")?)?,
                dim: field(raw.dim, opr, "dim")?,
            },
            "array_load" => Payload::ArrayLoad { ty: parse_value_type(field(raw.ty.as_deref(), opr, "type")?)? },
            "array_store" => Payload::ArrayStore { ty: parse_value_type(field(raw.ty.as_deref(), opr, "type")?)? },
            "arraylength" => Payload::ArrayLength,
            other => return Err(malformed(&format!("unknown opcode '{other}'"))),
        })
    }
}

/// Parses the whole decompiled-class document (spec.md §6's input JSON).
pub fn parse_class(text: &str) -> Result<RawClass, AnalyzerError> {
    Ok(serde_json::from_str(text)?)
}

/// Finds the named method object within a parsed class document.
pub fn find_method<'a>(class: &'a RawClass, method_name: &str) -> Option<&'a RawMethodEntry> {
    class.methods.iter().find(|m| m.name == method_name)
}

/// Converts a method's `code.bytecode` array into an [`IrFunction`].
pub fn parse_bytecode(method: &RawMethodEntry) -> Result<IrFunction, AnalyzerError> {
    let instructions = method
        .code
        .bytecode
        .iter()
        .enumerate()
        .map(|(seq, raw)| Ok(Instruction::new(seq, Payload::try_from(raw)?)))
        .collect::<Result<Vec<_>, AnalyzerError>>()?;

    Ok(IrFunction::new(instructions))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_divide_by_zero_method() {
        let text = r#"{
            "methods": [
                {
                    "name": "divideByZero",
                    "code": {
                        "bytecode": [
                            { "opr": "push", "value": { "type": "integer", "value": 1 } },
                            { "opr": "push", "value": { "type": "integer", "value": 0 } },
                            { "opr": "binary", "operant": "div", "type": "int" },
                            { "opr": "return", "type": "int" }
                        ]
                    }
                }
            ]
        }"#;
        let class = parse_class(text).unwrap();
        let method = find_method(&class, "divideByZero").unwrap();
        let func = parse_bytecode(method).unwrap();
        assert_eq!(func.len(), 4);
        assert!(matches!(func.get(2).unwrap().payload, Payload::Binary { op: BinaryOp::Div, .. }));
    }

    #[test]
    fn parses_ifz_branch() {
        let text = r#"{
            "methods": [{
                "name": "m",
                "code": { "bytecode": [
                    { "opr": "load", "index": 0, "type": "int" },
                    { "opr": "ifz", "condition": "eq", "target": 4 },
                    { "opr": "push", "value": { "type": "integer", "value": 1 } },
                    { "opr": "return", "type": "int" },
                    { "opr": "push", "value": { "type": "integer", "value": 0 } },
                    { "opr": "return", "type": "int" }
                ]}
            }]
        }"#;
        let class = parse_class(text).unwrap();
        let method = find_method(&class, "m").unwrap();
        let func = parse_bytecode(method).unwrap();
        assert_eq!(func.len(), 6);
        assert_eq!(func.get(1).unwrap().branch_targets(), vec![4]);
    }

    #[test]
    fn unknown_opcode_is_malformed() {
        let text = r#"{"methods": [{"name": "m", "code": {"bytecode": [{"opr": "frobnicate"}]}}]}"#;
        let class = parse_class(text).unwrap();
        let method = find_method(&class, "m").unwrap();
        assert!(parse_bytecode(method).is_err());
    }
}
