//! Command-line option parsing and the literal parameter-list grammar for
//! `-i`/`--interpreter` mode (spec.md §6).
//!
//! The option scan (mandatory/optional arg counts, `-i`/`-a` mutual
//! exclusion, the `info` reserved id) is a direct port of the original
//! `cli.c`'s `options_parse_args`. The literal parameter grammar
//! (`(v1, v2, …)` with `true`/`false`/decimal-integer/`[v; v; …]` tokens) has
//! no original counterpart — `cli.c` only ever forwarded the raw parameter
//! string to the concrete interpreter unparsed — so it is new structure
//! built directly from spec.md's description.

use crate::types::{TypeId, TypeShape};

pub const USAGE: &str = "usage: analyzer [-i|--interpreter] [-a|--abstract] <method-id> [<parameters>]";

const MANDATORY_ARGS: usize = 1;
const MAX_OPTIONS: usize = 2;
const INFO_ID: &str = "info";

#[derive(Debug, Default, Clone)]
pub struct Options {
    pub info: bool,
    pub interpreter_only: bool,
    pub abstract_only: bool,
    pub method_id: Option<String>,
    pub parameters: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum OptionsError {
    #[error("not enough arguments")]
    NotEnoughArgs,
    #[error("too many arguments")]
    TooManyArgs,
    #[error("unknown option: {0}")]
    UnknownOption(String),
    #[error("-i/--interpreter and -a/--abstract are mutually exclusive")]
    MutuallyExclusive,
}

fn is_interpreter_flag(opt: &str) -> bool {
    opt == "i" || opt == "interpreter"
}

fn is_abstract_flag(opt: &str) -> bool {
    opt == "a" || opt == "abstract"
}

/// Parses `argv[1..]` (the program name already stripped).
pub fn parse_args(argv: &[String]) -> Result<Options, OptionsError> {
    let args_num = argv.len();
    let mut opts = Options::default();

    if args_num < MANDATORY_ARGS {
        return Err(OptionsError::NotEnoughArgs);
    }
    if args_num > MAX_OPTIONS + MANDATORY_ARGS {
        return Err(OptionsError::TooManyArgs);
    }

    if args_num > MANDATORY_ARGS {
        for arg in &argv[0..args_num - MANDATORY_ARGS] {
            if let Some(opt) = arg.strip_prefix('-') {
                if is_interpreter_flag(opt) {
                    opts.interpreter_only = true;
                } else if is_abstract_flag(opt) {
                    opts.abstract_only = true;
                } else {
                    return Err(OptionsError::UnknownOption(arg.clone()));
                }
            }
        }
    }

    if opts.abstract_only && opts.interpreter_only {
        return Err(OptionsError::MutuallyExclusive);
    }

    let (method_id, parameters) = if opts.interpreter_only {
        (&argv[args_num - 2], Some(argv[args_num - 1].clone()))
    } else {
        (&argv[args_num - 1], None)
    };

    if method_id == INFO_ID {
        opts.info = true;
    } else {
        opts.method_id = Some(method_id.clone());
    }
    opts.parameters = parameters;

    Ok(opts)
}

/// One parsed literal from an `-i` parameter list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamLiteral {
    Bool(bool),
    Int(i32),
    Array(Vec<ParamLiteral>),
}

#[derive(Debug, thiserror::Error)]
pub enum ParamError {
    #[error("malformed parameter list: {0}")]
    Malformed(String),
    #[error("unbalanced brackets in parameter list")]
    Unbalanced,
    #[error("parameter type does not match the method's argument signature")]
    TypeMismatch,
}

/// Parses a literal parameter list of the form `(v1, v2, …)`.
pub fn parse_parameter_list(s: &str) -> Result<Vec<ParamLiteral>, ParamError> {
    let trimmed = s.trim();
    let inner = trimmed
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
        .ok_or_else(|| ParamError::Malformed(s.to_string()))?;
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }
    split_top_level(inner, ',')?.iter().map(|tok| parse_literal(tok.trim())).collect()
}

fn parse_literal(tok: &str) -> Result<ParamLiteral, ParamError> {
    match tok {
        "true" => return Ok(ParamLiteral::Bool(true)),
        "false" => return Ok(ParamLiteral::Bool(false)),
        _ => {}
    }
    if let Some(inner) = tok.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')) {
        if inner.trim().is_empty() {
            return Ok(ParamLiteral::Array(Vec::new()));
        }
        let elements =
            split_top_level(inner, ';')?.iter().map(|tok| parse_literal(tok.trim())).collect::<Result<Vec<_>, _>>()?;
        return Ok(ParamLiteral::Array(elements));
    }
    tok.parse::<i32>().map(ParamLiteral::Int).map_err(|_| ParamError::Malformed(tok.to_string()))
}

/// Splits `s` on top-level occurrences of `sep`, treating `[`/`]` as nesting
/// so an array literal's own separator never leaks into the outer split.
fn split_top_level(s: &str, sep: char) -> Result<Vec<String>, ParamError> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    for ch in s.chars() {
        match ch {
            '[' => {
                depth += 1;
                current.push(ch);
            }
            ']' => {
                depth -= 1;
                if depth < 0 {
                    return Err(ParamError::Unbalanced);
                }
                current.push(ch);
            }
            c if c == sep && depth == 0 => {
                parts.push(std::mem::take(&mut current));
            }
            c => current.push(c),
        }
    }
    if depth != 0 {
        return Err(ParamError::Unbalanced);
    }
    parts.push(current);
    Ok(parts)
}

/// Clamps an integer literal to the signed 8-bit range the byte-sequence
/// parameter encoding reads back (spec.md §4.7 Setup).
fn clamp_to_i8_byte(v: i32) -> u8 {
    v.clamp(i8::MIN as i32, i8::MAX as i32) as i8 as u8
}

fn encode_one(ty: TypeId, lit: &ParamLiteral, out: &mut Vec<u8>) -> Result<(), ParamError> {
    match (ty.shape(), lit) {
        (TypeShape::Int, ParamLiteral::Int(v)) => out.push(clamp_to_i8_byte(*v)),
        (TypeShape::Boolean, ParamLiteral::Bool(b)) => out.push(*b as u8),
        (TypeShape::Char, ParamLiteral::Int(v)) => out.push(*v as u8),
        (TypeShape::Array(elem), ParamLiteral::Array(elements)) => {
            out.push(elements.len() as u8);
            for element in elements {
                encode_one(elem, element, out)?;
            }
        }
        _ => return Err(ParamError::TypeMismatch),
    }
    Ok(())
}

/// Encodes a parsed parameter list into the byte sequence
/// [`crate::vm::decode_locals`] expects, per `arg_types`.
pub fn encode_parameters(arg_types: &[TypeId], params: &[ParamLiteral]) -> Result<Vec<u8>, ParamError> {
    if arg_types.len() != params.len() {
        return Err(ParamError::TypeMismatch);
    }
    let mut out = Vec::new();
    for (ty, lit) in arg_types.iter().zip(params.iter()) {
        encode_one(*ty, lit, &mut out)?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bare_method_id_is_fuzzer_mode() {
        let opts = parse_args(&args(&["jpamb/cases/Simple.foo:()I"])).unwrap();
        assert!(!opts.interpreter_only && !opts.abstract_only);
        assert_eq!(opts.method_id.as_deref(), Some("jpamb/cases/Simple.foo:()I"));
    }

    #[test]
    fn interpreter_flag_requires_parameters() {
        let opts = parse_args(&args(&["-i", "jpamb/cases/Simple.foo:(I)I", "(1)"])).unwrap();
        assert!(opts.interpreter_only);
        assert_eq!(opts.parameters.as_deref(), Some("(1)"));
    }

    #[test]
    fn info_id_is_recognized() {
        let opts = parse_args(&args(&["info"])).unwrap();
        assert!(opts.info);
        assert!(opts.method_id.is_none());
    }

    #[test]
    fn mutually_exclusive_flags_are_rejected() {
        let err = parse_args(&args(&["-i", "-a", "jpamb/cases/Simple.foo:()I"]));
        assert!(matches!(err, Err(OptionsError::MutuallyExclusive)));
    }

    #[test]
    fn too_few_args_is_rejected() {
        assert!(matches!(parse_args(&args(&[])), Err(OptionsError::NotEnoughArgs)));
    }

    #[test]
    fn unknown_option_is_rejected() {
        let err = parse_args(&args(&["-x", "jpamb/cases/Simple.foo:()I"]));
        assert!(matches!(err, Err(OptionsError::UnknownOption(_))));
    }

    #[test]
    fn parses_scalar_literals() {
        let literals = parse_parameter_list("(1, true, -5)").unwrap();
        assert_eq!(literals, vec![ParamLiteral::Int(1), ParamLiteral::Bool(true), ParamLiteral::Int(-5)]);
    }

    #[test]
    fn parses_nested_array_literal() {
        let literals = parse_parameter_list("([1;2;3], false)").unwrap();
        assert_eq!(
            literals,
            vec![
                ParamLiteral::Array(vec![ParamLiteral::Int(1), ParamLiteral::Int(2), ParamLiteral::Int(3)]),
                ParamLiteral::Bool(false),
            ]
        );
    }

    #[test]
    fn encodes_int_and_array_parameters() {
        let arg_types = vec![TypeId::INT, TypeId::INT.array_of()];
        let literals = vec![ParamLiteral::Int(5), ParamLiteral::Array(vec![ParamLiteral::Int(1), ParamLiteral::Int(2)])];
        let bytes = encode_parameters(&arg_types, &literals).unwrap();
        assert_eq!(bytes, vec![5, 2, 1, 2]);
    }
}
