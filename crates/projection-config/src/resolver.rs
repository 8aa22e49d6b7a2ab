//! Environment variable resolver
//!
//! Handles `${VAR}` and `${VAR:-default}` references in manifest port
//! entries and settings values.

use crate::{ConfigError, Result};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

static ENV_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("env reference pattern is valid"));

/// Variables available for substitution
#[derive(Debug, Clone, Default)]
pub struct EnvContext {
    vars: HashMap<String, String>,
}

impl EnvContext {
    /// Snapshot the current process environment
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    /// Add or update a variable
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }
}

/// Resolve every environment reference in `input`.
///
/// All unresolvable names are reported together.
pub fn resolve_env_vars(input: &str, context: &EnvContext) -> Result<String> {
    if !input.contains("${") {
        return Ok(input.to_string());
    }

    let mut result = String::with_capacity(input.len());
    let mut missing = Vec::new();
    let mut last = 0;

    for cap in ENV_REF.captures_iter(input) {
        let Some(full_match) = cap.get(0) else {
            continue;
        };
        let var_expr = &cap[1];

        let (var_name, default_value) = match var_expr.split_once(":-") {
            Some((name, default)) => (name, Some(default)),
            None => (var_expr, None),
        };

        result.push_str(&input[last..full_match.start()]);
        match context.get(var_name).or(default_value) {
            Some(value) => result.push_str(value),
            None => missing.push(var_name.to_string()),
        }
        last = full_match.end();
    }
    result.push_str(&input[last..]);

    if !missing.is_empty() {
        return Err(ConfigError::EnvVarNotFound(missing.join(", ")));
    }

    Ok(result)
}
