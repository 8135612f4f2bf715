//! Named functions callable from form rules.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use smol_str::SmolStr;

use crate::helpers;

/// Errors raised while invoking a registered function.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FunctionError {
    #[error("unknown function: {0}")]
    Unknown(SmolStr),

    #[error("{function}: argument {index} must be {expected}")]
    Argument {
        function: SmolStr,
        index: usize,
        expected: &'static str,
    },
}

/// A function exposed to the rule engine, taking JSON arguments.
pub type CustomFunction = Arc<dyn Fn(&[Value]) -> Result<Value, FunctionError> + Send + Sync>;

/// Set of functions a form's rules may call.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<SmolStr, CustomFunction>,
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.names().collect();
        names.sort();
        f.debug_struct("FunctionRegistry")
            .field("functions", &names)
            .finish()
    }
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the stock helpers.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("getFullName", |args| {
            let first = string_arg("getFullName", args, 0)?;
            let last = string_arg("getFullName", args, 1)?;
            Ok(Value::String(helpers::full_name(&first, &last)))
        });
        registry.register("days", |args| {
            let end = string_arg("days", args, 0)?;
            let start = string_arg("days", args, 1)?;
            Ok(Value::from(helpers::days_between(&end, &start)))
        });
        registry.register("maskMobileNumber", |args| {
            let number = string_arg("maskMobileNumber", args, 0)?;
            Ok(Value::String(helpers::mask_mobile_number(&number)))
        });
        registry
    }

    /// Register `function` under `name`, replacing any previous entry.
    pub fn register<F>(&mut self, name: impl Into<SmolStr>, function: F)
    where
        F: Fn(&[Value]) -> Result<Value, FunctionError> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.functions.insert(name.clone(), Arc::new(function)).is_some() {
            tracing::debug!(%name, "replaced custom function");
        }
    }

    /// Merge another registry into this one; entries in `other` win.
    pub fn extend(&mut self, other: FunctionRegistry) {
        self.functions.extend(other.functions);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(SmolStr::as_str)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, FunctionError> {
        let function = self
            .functions
            .get(name)
            .ok_or_else(|| FunctionError::Unknown(name.into()))?;
        function(args)
    }
}

/// Coerce an argument to a string the way rule scripts do: missing and null
/// become empty, scalars use their display form.
fn string_arg(function: &str, args: &[Value], index: usize) -> Result<String, FunctionError> {
    match args.get(index) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        Some(_) => Err(FunctionError::Argument {
            function: function.into(),
            index,
            expected: "a string",
        }),
    }
}
