//! Engine configuration
//!
//! Hosts describe an engine (and its ports) with a [`ParameterMap`], a
//! string-keyed map of typed values. The engine validates the handful of
//! keys it understands into an [`EngineConfig`]; everything else is passed
//! through untouched for the host policy to interpret (port names, initial
//! connections, and similar domain keys).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default capacity of each command ring
pub const DEFAULT_FIFO_SIZE: usize = 1024;

/// Default total thread count (main thread only, no workers)
pub const DEFAULT_THREADS: usize = 1;

/// A typed parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

impl Value {
    /// Read as integer, coercing from a numeric string.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Read as float, coercing from int or a numeric string.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            Value::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Read as bool, coercing from "true"/"false" strings and 0/1.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            Value::Int(v) => Some(*v != 0),
            Value::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Read as string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

/// String → typed-value map describing an engine or a single port
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParameterMap {
    map: HashMap<String, Value>,
}

impl ParameterMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a parameter.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.map.insert(key.into(), value.into());
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.map.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// Integer value of `key`, or `default` if absent.
    pub fn int_or(&self, key: &str, default: i64) -> i64 {
        self.map.get(key).and_then(Value::as_int).unwrap_or(default)
    }

    /// Bool value of `key`, or `default` if absent.
    pub fn bool_or(&self, key: &str, default: bool) -> bool {
        self.map
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(default)
    }

    /// String value of `key`, or `default` if absent.
    pub fn str_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.map.get(key).and_then(Value::as_str).unwrap_or(default)
    }
}

/// Validated engine configuration, extracted from a [`ParameterMap`]
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Samples per cycle; constant over a session
    pub block_size: usize,
    /// Samples per second; informational to the core
    pub sample_rate: u32,
    /// Total thread count including the audio thread (≥ 1)
    pub threads: usize,
    /// Capacity of each command ring
    pub fifo_size: usize,
    /// Pre-sizing hint, passed through from the host
    pub in_channels: Option<usize>,
    /// Pre-sizing hint, passed through from the host
    pub out_channels: Option<usize>,
    /// Elevate worker threads to a real-time scheduling class
    pub realtime_workers: bool,
}

impl EngineConfig {
    /// Validate the recognized keys of `params`.
    pub fn from_params(params: &ParameterMap) -> Result<Self, ConfigError> {
        let block_size = require_positive(params, "block_size")?;
        let sample_rate = require_positive(params, "sample_rate")?;

        let threads = params.int_or("threads", DEFAULT_THREADS as i64);
        if threads < 1 {
            return Err(ConfigError::Invalid {
                key: "threads",
                reason: format!("must be >= 1, got {threads}"),
            });
        }

        let fifo_size = params.int_or("fifo_size", DEFAULT_FIFO_SIZE as i64);
        if fifo_size < 1 {
            return Err(ConfigError::Invalid {
                key: "fifo_size",
                reason: format!("must be >= 1, got {fifo_size}"),
            });
        }

        let hint = |key| {
            params
                .get(key)
                .and_then(Value::as_int)
                .filter(|v| *v > 0)
                .map(|v| v as usize)
        };

        Ok(Self {
            block_size,
            sample_rate: sample_rate as u32,
            threads: threads as usize,
            fifo_size: fifo_size as usize,
            in_channels: hint("in_channels"),
            out_channels: hint("out_channels"),
            realtime_workers: params.bool_or("realtime_workers", false),
        })
    }
}

fn require_positive(params: &ParameterMap, key: &'static str) -> Result<usize, ConfigError> {
    let value = params
        .get(key)
        .ok_or(ConfigError::Missing(key))?
        .as_int()
        .ok_or_else(|| ConfigError::Invalid {
            key,
            reason: "expected an integer".to_string(),
        })?;
    if value < 1 {
        return Err(ConfigError::Invalid {
            key,
            reason: format!("must be >= 1, got {value}"),
        });
    }
    Ok(value as usize)
}
