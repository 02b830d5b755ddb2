//! tmplfn library
//!
//! Helper functions for text templates that produce Markdown: date formatting,
//! page-range arithmetic and fenced code blocks, plus the function-table and
//! template-assembly glue to use them.
//!
//! ## Public API
//!
//! - [`FuncMap`] and [`join`] - function tables and left-to-right merging
//! - [`time_functions`] / [`page_functions`] - the built-in helper tables
//! - [`CodeBlockFormatter`] - fenced, re-indented code blocks
//! - [`assemble_string`] / [`assemble`] - parse templates against a table
//! - [`Config`] - TOML configuration for the formatter defaults
//!
//! ## Example
//!
//! ```
//! use serde_json::json;
//! use tmplfn::{assemble_string, default_functions, Config};
//!
//! let functions = default_functions(&Config::default());
//! let template = assemble_string(&functions, "{{codeblock .data 0 0 \"shell\"}}").unwrap();
//! let out = template.execute(&json!({"data": "echo hi"})).unwrap();
//! assert_eq!(out, "```shell\n    echo hi\n```\n");
//! ```

mod codeblock;
mod config;
mod function;
mod page;
mod template;
mod time;

pub use codeblock::{format_code_block, CodeBlockFormatter, FENCE};
pub use config::{CodeBlockConfig, Config};
pub use function::{join, FuncMap, Function, FunctionError};
pub use page::page_functions;
pub use template::{assemble, assemble_string, ExecError, ParseError, Template};
pub use time::time_functions;

/// The date helpers joined with the page helpers configured by `config`.
pub fn default_functions(config: &Config) -> FuncMap {
    join([&time_functions(), &page_functions(&config.codeblock)])
}
