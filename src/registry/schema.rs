//! Typed parameter schemas and query-string coercion.
//!
//! Query parameters arrive as `name=type:value` (the tag is optional). Each
//! value is checked against the type the action declared before any handler
//! runs, so a handler only ever sees well-typed [`Args`].

use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Declared type of one action parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    Int,
    Float,
    Bool,
    Str,
    Duration,
}

impl ParamType {
    /// Tag used in `type:value` query encoding.
    pub fn tag(self) -> &'static str {
        match self {
            ParamType::Int => "int",
            ParamType::Float => "float",
            ParamType::Bool => "bool",
            ParamType::Str => "str",
            ParamType::Duration => "seconds",
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, ParamType::Int | ParamType::Float)
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamType::Int => "int",
            ParamType::Float => "float",
            ParamType::Bool => "bool",
            ParamType::Str => "str",
            ParamType::Duration => "duration",
        };
        f.write_str(name)
    }
}

/// A coerced parameter value
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Duration(Duration),
}

impl ParamValue {
    pub fn param_type(&self) -> ParamType {
        match self {
            ParamValue::Int(_) => ParamType::Int,
            ParamValue::Float(_) => ParamType::Float,
            ParamValue::Bool(_) => ParamType::Bool,
            ParamValue::Str(_) => ParamType::Str,
            ParamValue::Duration(_) => ParamType::Duration,
        }
    }

    /// Encode as `type:value`, the form [`coerce`] accepts back.
    pub fn to_query_value(&self) -> String {
        match self {
            ParamValue::Int(v) => format!("int:{}", v),
            ParamValue::Float(v) => format!("float:{}", v),
            ParamValue::Bool(v) => format!("bool:{}", v),
            ParamValue::Str(v) => format!("str:{}", v),
            ParamValue::Duration(d) => format!("seconds:{}", d.as_secs_f64()),
        }
    }
}

/// Coercion failures. All of them map to a client error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamError {
    #[error("missing parameter '{0}'")]
    Missing(String),
    #[error("unexpected parameter '{0}'")]
    Unexpected(String),
    #[error("parameter '{0}' given more than once")]
    Duplicate(String),
    #[error("unknown type tag '{tag}' for parameter '{name}'")]
    UnknownTag { name: String, tag: String },
    #[error("parameter '{name}' is declared {expected} but was tagged '{tag}'")]
    TagMismatch { name: String, expected: ParamType, tag: String },
    #[error("cannot parse '{value}' as {expected} for parameter '{name}'")]
    Invalid { name: String, expected: ParamType, value: String },
}

/// One declared parameter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamSpec {
    pub name: String,
    pub ty: ParamType,
}

/// Ordered parameter declarations for one action
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParamSchema {
    params: Vec<ParamSpec>,
}

impl ParamSchema {
    /// Schema for an action that takes no parameters
    pub fn empty() -> Self {
        Self::default()
    }

    /// Append a parameter (builder style)
    pub fn param(mut self, name: impl Into<String>, ty: ParamType) -> Self {
        self.params.push(ParamSpec { name: name.into(), ty });
        self
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub fn get(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Validate raw query pairs against this schema.
    ///
    /// Every declared parameter must appear exactly once and nothing else may
    /// appear. Values are coerced in declaration order.
    pub fn coerce(&self, query: &[(String, String)]) -> Result<Args, ParamError> {
        let mut raw: IndexMap<&str, &str> = IndexMap::new();
        for (name, value) in query {
            if self.get(name).is_none() {
                return Err(ParamError::Unexpected(name.clone()));
            }
            if raw.insert(name.as_str(), value.as_str()).is_some() {
                return Err(ParamError::Duplicate(name.clone()));
            }
        }

        let mut values = IndexMap::with_capacity(self.params.len());
        for spec in &self.params {
            let text = raw
                .get(spec.name.as_str())
                .ok_or_else(|| ParamError::Missing(spec.name.clone()))?;
            values.insert(spec.name.clone(), coerce(&spec.name, spec.ty, text)?);
        }

        Ok(Args { values })
    }
}

/// Coerce a single `type:value` (or bare `value`) to the declared type.
pub fn coerce(name: &str, expected: ParamType, text: &str) -> Result<ParamValue, ParamError> {
    let (tag, value) = match text.split_once(':') {
        Some((tag, value)) if is_tag(tag) => (Some(tag), value),
        Some((tag, _)) if expected != ParamType::Str => {
            return Err(ParamError::UnknownTag { name: name.to_string(), tag: tag.to_string() });
        }
        _ => (None, text),
    };

    let invalid = || ParamError::Invalid {
        name: name.to_string(),
        expected,
        value: value.to_string(),
    };

    if let Some(tag) = tag {
        let agrees = match expected {
            ParamType::Int => tag == "int",
            // Sliders always send int; widening is lossless for their range.
            ParamType::Float => tag == "float" || tag == "int",
            ParamType::Bool => tag == "bool",
            ParamType::Str => tag == "str" || tag == "string",
            ParamType::Duration => duration_unit(tag).is_some(),
        };
        if !agrees {
            return Err(ParamError::TagMismatch {
                name: name.to_string(),
                expected,
                tag: tag.to_string(),
            });
        }
    }

    match expected {
        ParamType::Int => value.trim().parse().map(ParamValue::Int).map_err(|_| invalid()),
        ParamType::Float => {
            let v: f64 = value.trim().parse().map_err(|_| invalid())?;
            if v.is_finite() { Ok(ParamValue::Float(v)) } else { Err(invalid()) }
        }
        ParamType::Bool => match value.trim() {
            "true" | "True" | "1" => Ok(ParamValue::Bool(true)),
            "false" | "False" | "0" => Ok(ParamValue::Bool(false)),
            _ => Err(invalid()),
        },
        ParamType::Str => Ok(ParamValue::Str(value.to_string())),
        ParamType::Duration => {
            let unit = tag.and_then(duration_unit).unwrap_or(1.0);
            let amount: f64 = value.trim().parse().map_err(|_| invalid())?;
            Duration::try_from_secs_f64(amount * unit)
                .map(ParamValue::Duration)
                .map_err(|_| invalid())
        }
    }
}

fn is_tag(tag: &str) -> bool {
    matches!(tag, "int" | "float" | "bool" | "str" | "string") || duration_unit(tag).is_some()
}

/// Seconds per unit for duration tags
fn duration_unit(tag: &str) -> Option<f64> {
    match tag {
        "days" => Some(86_400.0),
        "hours" => Some(3_600.0),
        "minutes" => Some(60.0),
        "seconds" => Some(1.0),
        "milliseconds" => Some(0.001),
        _ => None,
    }
}

/// Coerced arguments handed to an action handler
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    values: IndexMap<String, ParamValue>,
}

impl Args {
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    pub fn int(&self, name: &str) -> anyhow::Result<i64> {
        match self.get(name) {
            Some(ParamValue::Int(v)) => Ok(*v),
            other => anyhow::bail!("expected int argument '{}', got {:?}", name, other),
        }
    }

    /// Float argument; int values are widened.
    pub fn float(&self, name: &str) -> anyhow::Result<f64> {
        match self.get(name) {
            Some(ParamValue::Float(v)) => Ok(*v),
            Some(ParamValue::Int(v)) => Ok(*v as f64),
            other => anyhow::bail!("expected float argument '{}', got {:?}", name, other),
        }
    }

    pub fn bool(&self, name: &str) -> anyhow::Result<bool> {
        match self.get(name) {
            Some(ParamValue::Bool(v)) => Ok(*v),
            other => anyhow::bail!("expected bool argument '{}', got {:?}", name, other),
        }
    }

    pub fn str(&self, name: &str) -> anyhow::Result<&str> {
        match self.get(name) {
            Some(ParamValue::Str(v)) => Ok(v),
            other => anyhow::bail!("expected str argument '{}', got {:?}", name, other),
        }
    }

    pub fn duration(&self, name: &str) -> anyhow::Result<Duration> {
        match self.get(name) {
            Some(ParamValue::Duration(v)) => Ok(*v),
            other => anyhow::bail!("expected duration argument '{}', got {:?}", name, other),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
