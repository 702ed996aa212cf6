//! Typed argument descriptors.

use std::fmt;

use osml_tokenizer::SourceLocation;

use crate::{ErrorKind, Logger, Map, Value};

/// The type an argument must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    Any,
    Bool,
    Int,
    Double,
    String,
    Array,
    Map,
}

impl fmt::Display for ArgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ArgType::Any => "any",
            ArgType::Bool => "bool",
            ArgType::Int => "int",
            ArgType::Double => "double",
            ArgType::String => "string",
            ArgType::Array => "array",
            ArgType::Map => "map",
        })
    }
}

/// One named, typed argument with an optional default.
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub name: String,
    pub ty: ArgType,
    pub default: Option<Value>,
}

impl Argument {
    pub fn new(name: impl Into<String>, ty: ArgType) -> Self {
        Self {
            name: name.into(),
            ty,
            default: None,
        }
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, ArgType::String)
    }

    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, ArgType::Int)
    }

    pub fn bool(name: impl Into<String>) -> Self {
        Self::new(name, ArgType::Bool)
    }

    /// Convert `value` to this argument's type, if possible.
    fn convert(&self, value: Value) -> Result<Value, Value> {
        match (self.ty, value) {
            (ArgType::Any, v) => Ok(v),
            (ArgType::Bool, v @ Value::Bool(_)) => Ok(v),
            (ArgType::Int, v @ Value::Int(_)) => Ok(v),
            (ArgType::Double, Value::Int(i)) => Ok(Value::Double(i as f64)),
            (ArgType::Double, v @ Value::Double(_)) => Ok(v),
            (ArgType::String, Value::String(s)) => Ok(Value::String(s)),
            (ArgType::String, v) if v.is_scalar() => Ok(Value::String(v.to_string())),
            (ArgType::Array, v @ Value::Array(_)) => Ok(v),
            (ArgType::Map, v @ Value::Map(_)) => Ok(v),
            (_, v) => Err(v),
        }
    }
}

/// The argument schema of a state.
///
/// A schema created with [`Arguments::any`] accepts every map unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    args: Option<Vec<Argument>>,
}

impl Arguments {
    pub fn new(args: Vec<Argument>) -> Self {
        Self { args: Some(args) }
    }

    /// Accept anything.
    pub fn any() -> Self {
        Self { args: None }
    }

    pub fn is_any(&self) -> bool {
        self.args.is_none()
    }

    pub fn get(&self) -> &[Argument] {
        self.args.as_deref().unwrap_or_default()
    }

    /// Bring `map` into canonical form and check it against the schema.
    ///
    /// Positional entries (`"0"`, `"1"`, ...) are renamed to the descriptor at
    /// that index, values are converted where a lossless conversion exists and
    /// missing arguments receive their default. Every problem is logged as
    /// [`ErrorKind::ArgumentValidation`]; the return value tells whether the
    /// map is valid afterwards.
    pub fn validate(
        &self,
        map: &mut Map,
        logger: &mut dyn Logger,
        location: SourceLocation,
        allow_additional: bool,
    ) -> bool {
        let Some(args) = &self.args else {
            return true;
        };
        let mut valid = true;
        let mut fail = |logger: &mut dyn Logger, message: String| {
            logger.error(ErrorKind::ArgumentValidation, message, location);
            valid = false;
        };

        for (index, arg) in args.iter().enumerate() {
            let Some(value) = map.remove(&index.to_string()) else {
                continue;
            };
            if map.contains_key(&arg.name) {
                fail(
                    logger,
                    format!("argument \"{}\" given both by name and by position", arg.name),
                );
            } else {
                map.insert(arg.name.clone(), value);
            }
        }

        for arg in args {
            match map.remove(&arg.name) {
                Some(value) => match arg.convert(value) {
                    Ok(value) => {
                        map.insert(arg.name.clone(), value);
                    }
                    Err(value) => {
                        fail(
                            logger,
                            format!(
                                "argument \"{}\" expects {}, got {}",
                                arg.name,
                                arg.ty,
                                value.type_name()
                            ),
                        );
                        map.insert(arg.name.clone(), value);
                    }
                },
                None => match &arg.default {
                    Some(default) => {
                        map.insert(arg.name.clone(), default.clone());
                    }
                    None => fail(logger, format!("missing argument \"{}\"", arg.name)),
                },
            }
        }

        if !allow_additional {
            let extra: Vec<_> = map
                .keys()
                .filter(|key| !args.iter().any(|arg| &arg.name == *key))
                .cloned()
                .collect();
            for key in extra {
                fail(logger, format!("unexpected argument \"{key}\""));
            }
        }
        valid
    }
}
