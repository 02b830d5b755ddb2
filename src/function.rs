//! Function tables exposed to templates.
//!
//! A [`FuncMap`] maps names to [`Function`]s. Tables are plain values: build
//! them with constructors such as [`crate::time_functions`], combine them with
//! [`join`] and hand the result to the assembler.

use serde_json::Value;
use std::collections::btree_map::{self, BTreeMap};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by a helper function while a template executes.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FunctionError {
    /// Wrong number of arguments
    #[error("expected {expected} argument(s), got {found}")]
    Arity { expected: String, found: usize },

    /// An argument had the wrong JSON type
    #[error("argument {index} must be {expected}, got {found}")]
    ArgumentType {
        index: usize,
        expected: &'static str,
        found: String,
    },

    /// A date string could not be parsed
    #[error("invalid date '{input}': {reason}")]
    InvalidDate { input: String, reason: String },

    /// A strftime format string contained an unknown specifier
    #[error("invalid date format '{format}'")]
    InvalidFormat { format: String },
}

type Callable = dyn Fn(&[Value]) -> Result<Value, FunctionError> + Send + Sync;

/// A named helper callable from a template.
///
/// Cloning is cheap; clones share the same closure.
#[derive(Clone)]
pub struct Function {
    inner: Arc<Callable>,
}

impl Function {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, FunctionError> + Send + Sync + 'static,
    {
        Self { inner: Arc::new(f) }
    }

    /// Invoke the function with already evaluated arguments.
    pub fn call(&self, args: &[Value]) -> Result<Value, FunctionError> {
        (self.inner)(args)
    }

    /// Whether both handles share the same closure.
    pub fn ptr_eq(&self, other: &Function) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Function")
    }
}

/// A registry of template functions keyed by name.
#[derive(Debug, Clone, Default)]
pub struct FuncMap {
    entries: BTreeMap<String, Function>,
}

impl FuncMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, FunctionError> + Send + Sync + 'static,
    {
        self.insert(name, Function::new(f));
        self
    }

    /// Insert a function, returning the one it replaced.
    pub fn insert(&mut self, name: impl Into<String>, function: Function) -> Option<Function> {
        self.entries.insert(name.into(), function)
    }

    pub fn get(&self, name: &str) -> Option<&Function> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Function names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Function> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a FuncMap {
    type Item = (&'a String, &'a Function);
    type IntoIter = btree_map::Iter<'a, String, Function>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Merge function tables left to right.
///
/// Later tables win when a name appears more than once. Joining nothing
/// yields an empty table.
pub fn join<'a, I>(tables: I) -> FuncMap
where
    I: IntoIterator<Item = &'a FuncMap>,
{
    let mut merged = FuncMap::new();
    for table in tables {
        for (name, function) in table {
            if merged.insert(name.clone(), function.clone()).is_some() {
                log::debug!("Function '{}' overridden by a later table", name);
            }
        }
    }
    merged
}

/// Argument accessors shared by the built-in helpers.
pub(crate) mod args {
    use super::FunctionError;
    use serde_json::Value;

    pub fn expect_len(args: &[Value], min: usize, max: usize) -> Result<(), FunctionError> {
        if args.len() < min || args.len() > max {
            let expected = if min == max {
                min.to_string()
            } else {
                format!("{}-{}", min, max)
            };
            return Err(FunctionError::Arity {
                expected,
                found: args.len(),
            });
        }
        Ok(())
    }

    pub fn string(args: &[Value], index: usize) -> Result<&str, FunctionError> {
        match args.get(index) {
            Some(Value::String(s)) => Ok(s.as_str()),
            other => Err(type_error(index, "a string", other)),
        }
    }

    pub fn int(args: &[Value], index: usize) -> Result<i64, FunctionError> {
        match args.get(index).and_then(Value::as_i64) {
            Some(n) => Ok(n),
            None => Err(type_error(index, "an integer", args.get(index))),
        }
    }

    /// Integer argument clamped at zero.
    pub fn count(args: &[Value], index: usize) -> Result<usize, FunctionError> {
        Ok(usize::try_from(int(args, index)?.max(0)).unwrap_or(usize::MAX))
    }

    pub fn type_error(index: usize, expected: &'static str, found: Option<&Value>) -> FunctionError {
        let found = match found {
            None => "nothing".to_string(),
            Some(Value::Null) => "null".to_string(),
            Some(Value::Bool(_)) => "a boolean".to_string(),
            Some(Value::Number(n)) => format!("the number {}", n),
            Some(Value::String(_)) => "a string".to_string(),
            Some(Value::Array(_)) => "an array".to_string(),
            Some(Value::Object(_)) => "an object".to_string(),
        };
        FunctionError::ArgumentType {
            index,
            expected,
            found,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn constant(value: &'static str) -> Function {
        Function::new(move |_| Ok(json!(value)))
    }

    #[test]
    fn test_join_later_table_wins() {
        let f1 = constant("f1");
        let f2 = constant("f2");

        let mut a = FuncMap::new();
        a.insert("x", f1);
        let mut b = FuncMap::new();
        b.insert("x", f2.clone());
        b.insert("y", f2.clone());

        let merged = join([&a, &b]);
        assert_eq!(merged.len(), 2);
        assert!(merged.get("x").unwrap().ptr_eq(&f2));
        assert!(merged.get("y").unwrap().ptr_eq(&f2));
        assert_eq!(merged.get("x").unwrap().call(&[]).unwrap(), json!("f2"));
    }

    #[test]
    fn test_join_order_matters() {
        let a = FuncMap::new().with("x", |_| Ok(json!(1)));
        let b = FuncMap::new().with("x", |_| Ok(json!(2)));

        assert_eq!(join([&a, &b]).get("x").unwrap().call(&[]).unwrap(), json!(2));
        assert_eq!(join([&b, &a]).get("x").unwrap().call(&[]).unwrap(), json!(1));
    }

    #[test]
    fn test_join_nothing_is_empty() {
        let merged = join(std::iter::empty::<&FuncMap>());
        assert!(merged.is_empty());
    }

    #[test]
    fn test_join_leaves_inputs_untouched() {
        let a = FuncMap::new().with("x", |_| Ok(Value::Null));
        let b = FuncMap::new().with("y", |_| Ok(Value::Null));
        let merged = join([&a, &b]);

        assert_eq!(merged.names().collect::<Vec<_>>(), vec!["x", "y"]);
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
    }

    #[test]
    fn test_argument_helpers() {
        let values = [json!("s"), json!(-3), json!(2.5)];
        assert_eq!(args::string(&values, 0).unwrap(), "s");
        assert_eq!(args::int(&values, 1).unwrap(), -3);
        assert_eq!(args::count(&values, 1).unwrap(), 0);
        assert!(matches!(
            args::int(&values, 2),
            Err(FunctionError::ArgumentType { index: 2, .. })
        ));
        assert!(matches!(
            args::string(&values, 5),
            Err(FunctionError::ArgumentType { index: 5, .. })
        ));
        assert!(args::expect_len(&values, 1, 3).is_ok());
        assert_eq!(
            args::expect_len(&values, 4, 4).unwrap_err().to_string(),
            "expected 4 argument(s), got 3"
        );
    }
}
