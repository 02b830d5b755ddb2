//! Template assembly and execution.
//!
//! Templates use a small Go-template-like action syntax:
//!
//! ```text
//! {{codeblock .data 0 0 "shell"}}
//! {{ .published | datefmt "%B %-d, %Y" }}
//! {{- /* trim markers and comments */ -}}
//! ```
//!
//! Function names are resolved against a [`FuncMap`] when the template is
//! assembled, so an unknown name is a [`ParseError`] rather than a failure
//! halfway through rendering.

mod error;
mod parser;

pub use error::{ExecError, ParseError};

use crate::function::{FuncMap, Function};
use anyhow::{Context, Result};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// An assembled template, ready to execute against JSON data.
///
/// Holds its own copies of the functions it calls; changing the table it
/// was assembled from has no effect on it.
#[derive(Debug, Clone)]
pub struct Template {
    nodes: Vec<Node>,
}

#[derive(Debug, Clone)]
pub(crate) enum Node {
    Text(String),
    Action { pipeline: Pipeline },
}

/// Commands joined by `|`; each result is appended to the next call's arguments.
#[derive(Debug, Clone)]
pub(crate) struct Pipeline {
    pub(crate) commands: Vec<Command>,
}

#[derive(Debug, Clone)]
pub(crate) enum Command {
    Call(Call),
    Value(Arg),
}

#[derive(Debug, Clone)]
pub(crate) struct Call {
    pub(crate) name: String,
    pub(crate) function: Function,
    pub(crate) args: Vec<Arg>,
    pub(crate) line: usize,
}

#[derive(Debug, Clone)]
pub(crate) enum Arg {
    Dot,
    Field(Vec<String>),
    Literal(Value),
    Pipeline(Box<Pipeline>),
    Call(Call),
}

/// Parse `text` into a template whose function calls resolve against `functions`.
pub fn assemble_string(functions: &FuncMap, text: &str) -> Result<Template, ParseError> {
    let nodes = parser::parse(text, functions)?;

    log::debug!(
        "Assembled template: {} node(s), {} action(s)",
        nodes.len(),
        nodes
            .iter()
            .filter(|node| matches!(node, Node::Action { .. }))
            .count()
    );

    Ok(Template { nodes })
}

/// Read template files in order, concatenate them and assemble the result.
pub fn assemble<P: AsRef<Path>>(functions: &FuncMap, paths: &[P]) -> Result<Template> {
    let mut source = String::new();
    for path in paths {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read template {}", path.display()))?;
        source.push_str(&content);
    }

    let names = paths
        .iter()
        .map(|p| p.as_ref().display().to_string())
        .collect::<Vec<_>>()
        .join(", ");

    assemble_string(functions, &source)
        .with_context(|| format!("Failed to assemble template from {}", names))
}

impl Template {
    /// Render the template against `data`.
    ///
    /// Field paths that do not exist render as empty text. A failing
    /// function aborts the render.
    pub fn execute(&self, data: &Value) -> Result<String, ExecError> {
        let mut out = String::new();
        for node in &self.nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Action { pipeline, .. } => {
                    write_value(&mut out, &eval_pipeline(pipeline, data)?);
                }
            }
        }
        Ok(out)
    }
}

fn eval_pipeline(pipeline: &Pipeline, data: &Value) -> Result<Value, ExecError> {
    let mut piped: Option<Value> = None;
    for command in &pipeline.commands {
        let value = match command {
            Command::Value(arg) => eval_arg(arg, data)?,
            Command::Call(call) => invoke(call, data, piped.take())?,
        };
        piped = Some(value);
    }
    Ok(piped.unwrap_or(Value::Null))
}

fn eval_arg(arg: &Arg, data: &Value) -> Result<Value, ExecError> {
    match arg {
        Arg::Dot => Ok(data.clone()),
        Arg::Field(path) => Ok(lookup(data, path).cloned().unwrap_or(Value::Null)),
        Arg::Literal(value) => Ok(value.clone()),
        Arg::Pipeline(pipeline) => eval_pipeline(pipeline, data),
        Arg::Call(call) => invoke(call, data, None),
    }
}

fn invoke(call: &Call, data: &Value, piped: Option<Value>) -> Result<Value, ExecError> {
    let mut args = call
        .args
        .iter()
        .map(|arg| eval_arg(arg, data))
        .collect::<Result<Vec<_>, _>>()?;
    args.extend(piped);

    log::trace!("Calling {} with {} argument(s)", call.name, args.len());

    call.function
        .call(&args)
        .map_err(|source| ExecError::Function {
            name: call.name.clone(),
            line: call.line,
            source,
        })
}

fn lookup<'v>(data: &'v Value, path: &[String]) -> Option<&'v Value> {
    path.iter()
        .try_fold(data, |value, key| value.as_object()?.get(key))
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => {}
        Value::String(s) => out.push_str(s),
        other => out.push_str(&other.to_string()),
    }
}
