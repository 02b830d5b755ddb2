//! Page helpers: paging arithmetic over item offsets plus the text helpers
//! used when laying out a page (`nl2p`, `codeblock`).
//!
//! Offsets and counts below zero are read as zero and a page size below one
//! as one, so none of the paging helpers can fail on integer input.

use crate::codeblock::CodeBlockFormatter;
use crate::config::CodeBlockConfig;
use crate::function::{args, FuncMap, FunctionError};
use serde_json::Value;

/// Builds the table of page helpers. `codeblock` falls back to `config`
/// when called with a zero indent or tab width.
pub fn page_functions(config: &CodeBlockConfig) -> FuncMap {
    let formatter = CodeBlockFormatter::new(*config);

    FuncMap::new()
        .with("prevPage", |args| {
            let (from, size, _) = paging(args)?;
            Ok(Value::from(prev_page(from, size)))
        })
        .with("nextPage", |args| {
            let (from, size, max) = paging(args)?;
            Ok(Value::from(next_page(from, size, max)))
        })
        .with("pageNumber", |args| {
            args::expect_len(args, 2, 2)?;
            let from = args::count(args, 0)?;
            let size = args::count(args, 1)?.max(1);
            Ok(Value::from(from / size + 1))
        })
        .with("pageCount", |args| {
            args::expect_len(args, 2, 2)?;
            let size = args::count(args, 0)?.max(1);
            let max = args::count(args, 1)?;
            Ok(Value::from(max.div_ceil(size)))
        })
        .with("pageRange", |args| {
            let (from, size, max) = paging(args)?;
            Ok(Value::String(page_range(from, size, max)))
        })
        .with("nl2p", |args| {
            args::expect_len(args, 1, 1)?;
            Ok(Value::String(nl2p(text_arg(args, 0)?)))
        })
        .with("codeblock", move |args| {
            args::expect_len(args, 4, 4)?;
            let text = text_arg(args, 0)?;
            let indent = args::count(args, 1)?;
            let tab_width = args::count(args, 2)?;
            let language = args::string(args, 3)?;
            Ok(Value::String(
                formatter.format(text, indent, tab_width, language),
            ))
        })
}

/// `from size max` with the size clamped to at least one.
fn paging(args: &[Value]) -> Result<(usize, usize, usize), FunctionError> {
    args::expect_len(args, 3, 3)?;
    Ok((
        args::count(args, 0)?,
        args::count(args, 1)?.max(1),
        args::count(args, 2)?,
    ))
}

/// Text argument; a missing field (null) reads as empty text.
fn text_arg(args: &[Value], index: usize) -> Result<&str, FunctionError> {
    match args.get(index) {
        Some(Value::Null) => Ok(""),
        _ => args::string(args, index),
    }
}

pub fn prev_page(from: usize, size: usize) -> usize {
    from.saturating_sub(size)
}

/// Offset of the following page, or of the last page once `from + size`
/// runs past `max`.
pub fn next_page(from: usize, size: usize, max: usize) -> usize {
    let next = from.saturating_add(size);
    if next < max {
        next
    } else if max == 0 {
        0
    } else {
        (max - 1) / size * size
    }
}

/// Human readable position such as `11-20 of 95`.
pub fn page_range(from: usize, size: usize, max: usize) -> String {
    if from >= max {
        return format!("0 of {}", max);
    }
    let last = from.saturating_add(size).min(max);
    format!("{}-{} of {}", from + 1, last, max)
}

/// Wrap blank-line separated paragraphs in `<p>` elements.
pub fn nl2p(text: &str) -> String {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(format!("<p>{}</p>", current.join("\n")));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(format!("<p>{}</p>", current.join("\n")));
    }

    paragraphs.join("\n")
}
