//! Textual operation chains
//!
//! A step is written `name` or `name:<json>`, e.g. `getattr:"bugs"`,
//! `getitem:1` or `call:[1, 2]`. `getattr` also accepts a bare attribute
//! name (`getattr:bugs`). Two-argument operations take a JSON array of both
//! arguments; `call` takes an array of positional arguments, an object of
//! named ones, or both (`call:[1] {"limit": 5}`).

use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use super::{Operation, Proxy, Resolved};
use crate::error::{CassetteError, Result};

/// One operation with its arguments
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub op: Operation,
    pub args: Vec<Value>,
}

impl Step {
    /// Apply this step to `proxy`
    pub fn apply(&self, proxy: &Proxy) -> Result<Resolved> {
        proxy.apply(self.op, self.args.clone())
    }
}

impl FromStr for Step {
    type Err = CassetteError;

    fn from_str(s: &str) -> Result<Self> {
        let (name, raw) = match s.split_once(':') {
            Some((name, raw)) => (name.trim(), Some(raw.trim())),
            None => (s.trim(), None),
        };
        let op: Operation = name.parse().map_err(CassetteError::InvalidArguments)?;

        let args = match (op, raw) {
            (Operation::Call, None) => vec![Value::Array(Vec::new()), Value::Object(Map::new())],
            (Operation::Call, Some(raw)) => match parse_json_values(raw)?.as_slice() {
                [Value::Array(positional)] => {
                    vec![Value::Array(positional.clone()), Value::Object(Map::new())]
                }
                [Value::Object(named)] => {
                    vec![Value::Array(Vec::new()), Value::Object(named.clone())]
                }
                [positional @ Value::Array(_), named @ Value::Object(_)] => {
                    vec![positional.clone(), named.clone()]
                }
                _ => {
                    return Err(CassetteError::InvalidArguments(format!(
                        "`call` takes an array, an object, or an array followed by an object, got `{}`",
                        raw
                    )));
                }
            },
            (Operation::GetAttr, Some(raw)) => {
                let name = serde_json::from_str::<Value>(raw)
                    .ok()
                    .filter(Value::is_string)
                    .unwrap_or_else(|| Value::String(raw.to_string()));
                vec![name]
            }
            (op, None) => {
                if op.arity() != 0 {
                    return Err(CassetteError::InvalidArguments(format!(
                        "`{}` needs an argument",
                        op
                    )));
                }
                Vec::new()
            }
            (op, Some(raw)) => match op.arity() {
                0 => {
                    return Err(CassetteError::InvalidArguments(format!(
                        "`{}` takes no argument",
                        op
                    )));
                }
                1 => vec![parse_json(raw)?],
                _ => match parse_json(raw)? {
                    Value::Array(args) => args,
                    other => {
                        return Err(CassetteError::InvalidArguments(format!(
                            "`{}` takes a JSON array of arguments, got {}",
                            op, other
                        )));
                    }
                },
            },
        };

        op.check_args(&args).map_err(CassetteError::InvalidArguments)?;
        Ok(Step { op, args })
    }
}

fn parse_json(raw: &str) -> Result<Value> {
    serde_json::from_str(raw)
        .map_err(|e| CassetteError::InvalidArguments(format!("bad JSON argument `{}`: {}", raw, e)))
}

/// Parse whitespace-separated JSON values
fn parse_json_values(raw: &str) -> Result<Vec<Value>> {
    serde_json::Deserializer::from_str(raw)
        .into_iter::<Value>()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| CassetteError::InvalidArguments(format!("bad JSON argument `{}`: {}", raw, e)))
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let (Operation::Call, [positional, named]) = (self.op, self.args.as_slice()) {
            let no_named = named.as_object().is_none_or(Map::is_empty);
            let no_positional = positional.as_array().is_none_or(Vec::is_empty);
            return match (no_positional, no_named) {
                (false, false) => write!(f, "call:{} {}", positional, named),
                (true, false) => write!(f, "call:{}", named),
                _ => write!(f, "call:{}", positional),
            };
        }
        match self.args.as_slice() {
            [] => write!(f, "{}", self.op),
            [arg] => write!(f, "{}:{}", self.op, arg),
            args => write!(f, "{}:{}", self.op, Value::Array(args.to_vec())),
        }
    }
}

/// Apply `steps` in order, each to the proxy produced by the previous one
pub fn run_chain(proxy: &Proxy, steps: &[Step]) -> Result<Resolved> {
    let mut current = Resolved::Proxy(proxy.clone());
    for step in steps {
        let target = current.into_proxy()?;
        tracing::trace!(%step, "applying step");
        current = step.apply(&target)?;
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_bare_and_json_steps() {
        let step: Step = "len".parse().unwrap();
        assert_eq!(step.op, Operation::Len);
        assert!(step.args.is_empty());

        let step: Step = "getitem:1".parse().unwrap();
        assert_eq!(step.args, vec![json!(1)]);

        let step: Step = "contains:[1, 2]".parse().unwrap();
        assert_eq!(step.args, vec![json!([1, 2])]);
    }

    #[test]
    fn test_parse_getattr_accepts_bare_names() {
        let quoted: Step = r#"getattr:"bugs""#.parse().unwrap();
        let bare: Step = "getattr:bugs".parse().unwrap();
        assert_eq!(quoted, bare);
        assert_eq!(bare.args, vec![json!("bugs")]);
    }

    #[test]
    fn test_parse_call_forms() {
        let step: Step = "call".parse().unwrap();
        assert_eq!(step.args, vec![json!([]), json!({})]);

        let step: Step = "call:[1, \"x\"]".parse().unwrap();
        assert_eq!(step.args, vec![json!([1, "x"]), json!({})]);

        let step: Step = r#"call:{"limit": 5}"#.parse().unwrap();
        assert_eq!(step.args, vec![json!([]), json!({"limit": 5})]);

        let step: Step = r#"call:[1] {"limit": 5}"#.parse().unwrap();
        assert_eq!(step.args, vec![json!([1]), json!({"limit": 5})]);
    }

    #[test]
    fn test_parse_two_argument_step() {
        let step: Step = r#"setitem:["k", 1]"#.parse().unwrap();
        assert_eq!(step.op, Operation::SetItem);
        assert_eq!(step.args, vec![json!("k"), json!(1)]);
    }

    #[test]
    fn test_parse_errors() {
        assert!("frobnicate".parse::<Step>().is_err());
        assert!("getitem".parse::<Step>().is_err());
        assert!("len:3".parse::<Step>().is_err());
        assert!("getitem:{oops".parse::<Step>().is_err());
        assert!("setitem:[1]".parse::<Step>().is_err());
        assert!("call:7".parse::<Step>().is_err());
    }

    #[test]
    fn test_display_round_trips() {
        for text in [
            "len",
            "getitem:1",
            r#"getattr:"bugs""#,
            "call:[1]",
            r#"call:{"a":1}"#,
            r#"call:[1] {"a":1}"#,
        ] {
            let step: Step = text.parse().unwrap();
            let again: Step = step.to_string().parse().unwrap();
            assert_eq!(step, again, "{}", text);
        }
    }
}
