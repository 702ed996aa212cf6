//! Argument values and the `[key=value, ...]` argument syntax.

use std::collections::BTreeMap;
use std::fmt;

/// Named arguments of a command or annotation.
///
/// Positional arguments are keyed by their index (`"0"`, `"1"`, ...) until
/// [`Arguments::validate`](crate::Arguments::validate) maps them onto names.
pub type Map = BTreeMap<String, Value>;

/// A dynamically typed argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    Array(Vec<Value>),
    Map(Map),
}

impl Value {
    /// Human readable name of the value's type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Whether this is a bool, number or string.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Value::Bool(_) | Value::Int(_) | Value::Double(_) | Value::String(_)
        )
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Double(d) => write!(f, "{d:?}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Map(map) => write_map(f, map),
        }
    }
}

/// Writes `map` as `{key=value, ...}`.
pub(crate) fn write_map(f: &mut fmt::Formatter<'_>, map: &Map) -> fmt::Result {
    write!(f, "{{")?;
    for (i, (key, value)) in map.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{key}={value}")?;
    }
    write!(f, "}}")
}

/// Parse the inside of an argument list, without the surrounding brackets.
///
/// Entries are separated by commas. `key=value` entries are stored under
/// `key`, every other entry under its positional index.
pub fn parse_arguments(input: &str) -> Result<Map, String> {
    let mut map = Map::new();
    let mut position = 0usize;
    for entry in split_top_level(input, b',')? {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        match find_top_level(entry, b'=') {
            Some(eq) => {
                let key = entry[..eq].trim();
                if key.is_empty() {
                    return Err(format!("missing argument name in {entry:?}"));
                }
                let value = parse_value(&entry[eq + 1..])?;
                if map.insert(key.to_string(), value).is_some() {
                    return Err(format!("argument {key:?} given twice"));
                }
            }
            None => {
                map.insert(position.to_string(), parse_value(entry)?);
                position += 1;
            }
        }
    }
    Ok(map)
}

/// Parse a single value.
pub fn parse_value(input: &str) -> Result<Value, String> {
    let input = input.trim();
    match input {
        "null" => return Ok(Value::Null),
        "true" => return Ok(Value::Bool(true)),
        "false" => return Ok(Value::Bool(false)),
        _ => {}
    }
    if let Some(rest) = input.strip_prefix('"') {
        return parse_quoted(rest).map(Value::String);
    }
    if let Some(inner) = input.strip_prefix('[') {
        let Some(inner) = inner.strip_suffix(']') else {
            return Err(format!("unterminated array in {input:?}"));
        };
        let items = split_top_level(inner, b',')?
            .into_iter()
            .filter(|item| !item.trim().is_empty())
            .map(parse_value)
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Value::Array(items));
    }
    if let Ok(i) = input.parse::<i64>() {
        return Ok(Value::Int(i));
    }
    if input.contains(['.', 'e', 'E'])
        && input.starts_with(|c: char| c.is_ascii_digit() || c == '-' || c == '+' || c == '.')
        && let Ok(d) = input.parse::<f64>()
    {
        return Ok(Value::Double(d));
    }
    Ok(Value::String(input.to_string()))
}

/// Decode a quoted string; `rest` starts right after the opening quote.
fn parse_quoted(rest: &str) -> Result<String, String> {
    let mut out = String::new();
    let mut chars = rest.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                let trailing = chars.as_str().trim();
                if !trailing.is_empty() {
                    return Err(format!("unexpected {trailing:?} after string"));
                }
                return Ok(out);
            }
            '\\' => match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('0') => out.push('\0'),
                Some(other) => out.push(other),
                None => break,
            },
            c => out.push(c),
        }
    }
    Err("unterminated string".to_string())
}

/// Split `input` at every `sep` outside of strings and brackets.
fn split_top_level(input: &str, sep: u8) -> Result<Vec<&str>, String> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    let mut last = 0;
    for (i, &c) in input.as_bytes().iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == b'\\' {
                escaped = true;
            } else if c == b'"' {
                in_string = false;
            }
            continue;
        }
        match c {
            b'"' => in_string = true,
            b'[' | b'{' => depth += 1,
            b']' | b'}' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| format!("unbalanced {:?}", c as char))?;
            }
            _ if c == sep && depth == 0 => {
                parts.push(&input[last..i]);
                last = i + 1;
            }
            _ => {}
        }
    }
    if in_string {
        return Err("unterminated string".to_string());
    }
    if depth != 0 {
        return Err("unterminated array".to_string());
    }
    parts.push(&input[last..]);
    Ok(parts)
}

fn find_top_level(input: &str, needle: u8) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    for (i, &c) in input.as_bytes().iter().enumerate() {
        match c {
            b'"' => in_string = !in_string,
            b'[' | b'{' if !in_string => depth += 1,
            b']' | b'}' if !in_string => depth = depth.saturating_sub(1),
            _ if c == needle && depth == 0 && !in_string => return Some(i),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_and_positional() {
        let map = parse_arguments("a=1, b = two, 3.5, \"x, y\"").unwrap();
        assert_eq!(map.get("a"), Some(&Value::Int(1)));
        assert_eq!(map.get("b"), Some(&Value::from("two")));
        assert_eq!(map.get("0"), Some(&Value::Double(3.5)));
        assert_eq!(map.get("1"), Some(&Value::from("x, y")));
        assert_eq!(map.len(), 4);
    }

    #[test]
    fn test_scalars() {
        assert_eq!(parse_value("true"), Ok(Value::Bool(true)));
        assert_eq!(parse_value(" null "), Ok(Value::Null));
        assert_eq!(parse_value("-12"), Ok(Value::Int(-12)));
        assert_eq!(parse_value("1e3"), Ok(Value::Double(1000.0)));
        assert_eq!(parse_value("e3"), Ok(Value::from("e3")));
        assert_eq!(parse_value("  hello world "), Ok(Value::from("hello world")));
    }

    #[test]
    fn test_quoted_escapes() {
        assert_eq!(
            parse_value(r#""a\"b\n\\""#),
            Ok(Value::from("a\"b\n\\"))
        );
        assert!(parse_value(r#""open"#).is_err());
    }

    #[test]
    fn test_nested_arrays() {
        let map = parse_arguments("list=[1, [2, \"]\"], x]").unwrap();
        assert_eq!(
            map.get("list"),
            Some(&Value::Array(vec![
                Value::Int(1),
                Value::Array(vec![Value::Int(2), Value::from("]")]),
                Value::from("x"),
            ]))
        );
    }

    #[test]
    fn test_errors() {
        assert!(parse_arguments("a=1, a=2").is_err());
        assert!(parse_arguments("=1").is_err());
        assert!(parse_arguments("a=[1, 2").is_err());
    }

    #[test]
    fn test_display() {
        let map = parse_arguments("b=\"x\", a=[1, 2.0], c=null").unwrap();
        assert_eq!(Value::Map(map).to_string(), r#"{a=[1, 2.0], b="x", c=null}"#);
    }
}
