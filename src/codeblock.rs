use crate::config::{CodeBlockConfig, MAX_WIDTH};
use std::borrow::Cow;

/// Marker opening and closing a fenced code block.
pub const FENCE: &str = "```";

/// Wraps raw text in a fenced, indented Markdown code block.
///
/// ````text
/// ```shell
///     echo "Hello World!"
/// ```
/// ````
///
/// # Line handling
///
/// A single leading line break is dropped, since block literals usually start
/// on their own line. The remaining text is split on `\n` / `\r\n`; a final
/// terminator does not add an empty line.
///
/// Each line has its tabs expanded to the next multiple of the tab width and
/// is then prefixed with the indentation. Blank lines (empty or whitespace
/// only) come out empty. Trailing whitespace on other lines is kept.
///
/// # Defaults
///
/// An `indent` or `tab_width` argument of `0` selects the value from
/// [`CodeBlockConfig`]. A configured tab width of `0` keeps literal tabs.
/// Both are capped at 32 columns.
#[derive(Debug, Clone, Copy, Default)]
pub struct CodeBlockFormatter {
    config: CodeBlockConfig,
}

impl CodeBlockFormatter {
    pub fn new(config: CodeBlockConfig) -> Self {
        Self { config }
    }

    /// Returns the defaults this formatter falls back to.
    pub fn config(&self) -> &CodeBlockConfig {
        &self.config
    }

    /// Formats `text` as a fenced block tagged with `language`.
    ///
    /// The result starts with the opening fence line, ends with the closing
    /// fence line, and every line (fences included) is newline terminated.
    /// The language tag is copied verbatim.
    pub fn format(&self, text: &str, indent: usize, tab_width: usize, language: &str) -> String {
        let indent = if indent == 0 {
            self.config.indent
        } else {
            indent
        }
        .min(MAX_WIDTH);
        let tab_width = if tab_width == 0 {
            self.config.tab_width
        } else {
            tab_width
        }
        .min(MAX_WIDTH);
        let padding = " ".repeat(indent);

        let mut out = String::with_capacity(text.len() + 2 * FENCE.len() + language.len() + 8);
        out.push_str(FENCE);
        out.push_str(language);
        out.push('\n');

        for line in split_lines(text) {
            if line.trim().is_empty() {
                out.push('\n');
                continue;
            }
            out.push_str(&padding);
            out.push_str(&expand_tabs(line, tab_width));
            out.push('\n');
        }

        out.push_str(FENCE);
        out.push('\n');
        out
    }
}

/// Formats a code block with the default [`CodeBlockConfig`].
pub fn format_code_block(text: &str, indent: usize, tab_width: usize, language: &str) -> String {
    CodeBlockFormatter::default().format(text, indent, tab_width, language)
}

fn split_lines(text: &str) -> std::str::Lines<'_> {
    let text = text
        .strip_prefix("\r\n")
        .or_else(|| text.strip_prefix('\n'))
        .unwrap_or(text);
    text.lines()
}

/// Expand tab characters to tab stops every `width` columns.
/// A width of 0 leaves the line untouched.
fn expand_tabs(line: &str, width: usize) -> Cow<'_, str> {
    if width == 0 || !line.contains('\t') {
        return Cow::Borrowed(line);
    }

    let mut expanded = String::with_capacity(line.len() + width);
    let mut column = 0;
    for ch in line.chars() {
        if ch == '\t' {
            let spaces = width - column % width;
            expanded.extend(std::iter::repeat(' ').take(spaces));
            column += spaces;
        } else {
            expanded.push(ch);
            column += 1;
        }
    }
    Cow::Owned(expanded)
}
