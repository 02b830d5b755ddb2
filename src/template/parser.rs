use super::error::ParseError;
use super::{Arg, Call, Command, Node, Pipeline};
use crate::function::FuncMap;
use serde_json::{Number, Value};

/// Control actions of the full template language that this subset rejects.
const KEYWORDS: &[&str] = &[
    "if", "else", "range", "with", "end", "define", "template", "block", "break", "continue",
];

/// Deepest allowed nesting of parenthesized pipelines.
const MAX_DEPTH: usize = 100;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Dot,
    Field(Vec<String>),
    Ident(String),
    Literal(Value),
    Pipe,
    LeftParen,
    RightParen,
    Close { trim: bool },
}

/// How a pipeline ended.
enum End {
    Close { trim: bool },
    Paren { line: usize },
}

/// A command operand before function names are resolved.
enum Operand {
    Ident { name: String, line: usize },
    Arg(Arg),
}

/// Parse `source` into template nodes, resolving every function name
/// against `functions`.
pub(crate) fn parse(source: &str, functions: &FuncMap) -> Result<Vec<Node>, ParseError> {
    Parser {
        src: source,
        pos: 0,
        line: 1,
        functions,
        peeked: None,
        depth: 0,
    }
    .parse_template()
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
    functions: &'a FuncMap,
    peeked: Option<(Token, usize)>,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn parse_template(mut self) -> Result<Vec<Node>, ParseError> {
        let mut nodes = Vec::new();
        let mut trim_next = false;

        while self.pos < self.src.len() {
            let rest = self.rest();
            let open = rest.find("{{");
            let text = &rest[..open.unwrap_or(rest.len())];

            let trim_left = open.is_some_and(|i| starts_with_trim_marker(&rest[i + 2..]));
            let mut emitted = text;
            if trim_next {
                emitted = emitted.trim_start();
            }
            if trim_left {
                emitted = emitted.trim_end();
            }
            push_text(&mut nodes, emitted);
            self.advance(text.len());

            if open.is_none() {
                break;
            }

            let action_line = self.line;
            self.advance(if trim_left { 3 } else { 2 });
            let (node, trim) = self.parse_action(action_line)?;
            if let Some(node) = node {
                nodes.push(node);
            }
            trim_next = trim;
        }

        Ok(nodes)
    }

    fn parse_action(&mut self, action_line: usize) -> Result<(Option<Node>, bool), ParseError> {
        self.skip_whitespace();

        if self.rest().starts_with("/*") {
            let end = self.rest().find("*/").ok_or(ParseError::Syntax {
                message: "unclosed comment".to_string(),
                line: action_line,
            })?;
            self.advance(end + 2);
            return match self.next_token(action_line)? {
                (Token::Close { trim }, _) => Ok((None, trim)),
                (_, line) => Err(syntax("comment ends before closing delimiter", line)),
            };
        }

        match self.parse_pipeline(action_line)? {
            (pipeline, End::Close { trim }) => Ok((
                Some(Node::Action { pipeline }),
                trim,
            )),
            (_, End::Paren { line }) => Err(syntax("unexpected right paren", line)),
        }
    }

    fn parse_pipeline(&mut self, action_line: usize) -> Result<(Pipeline, End), ParseError> {
        let mut commands = Vec::new();
        loop {
            let command = self.parse_command(action_line, !commands.is_empty())?;
            commands.push(command);

            match self.next_token(action_line)? {
                (Token::Pipe, _) => continue,
                (Token::Close { trim }, _) => return Ok((Pipeline { commands }, End::Close { trim })),
                (Token::RightParen, line) => {
                    return Ok((Pipeline { commands }, End::Paren { line }))
                }
                (_, line) => return Err(syntax("unexpected token in pipeline", line)),
            }
        }
    }

    /// A single command: a function call with arguments, or one operand.
    /// `piped` is set for every stage after the first.
    fn parse_command(&mut self, action_line: usize, piped: bool) -> Result<Command, ParseError> {
        let mut operands = Vec::new();
        loop {
            let (token, _) = self.peek_token(action_line)?;
            if matches!(
                token,
                Token::Pipe | Token::Close { .. } | Token::RightParen
            ) {
                break;
            }
            let (token, line) = self.next_token(action_line)?;
            operands.push(self.parse_operand(token, line, action_line)?);
        }

        let mut operands = operands.into_iter();
        match operands.next() {
            None => Err(syntax("missing value for command", self.line)),
            Some(Operand::Ident { name, line }) => {
                let args = operands
                    .map(|operand| self.operand_to_arg(operand))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Command::Call(self.resolve(name, line, args)?))
            }
            Some(Operand::Arg(arg)) => {
                if piped {
                    return Err(syntax("non-function in pipeline stage", self.line));
                }
                if operands.next().is_some() {
                    return Err(syntax("can't give argument to non-function", self.line));
                }
                Ok(Command::Value(arg))
            }
        }
    }

    fn parse_operand(
        &mut self,
        token: Token,
        line: usize,
        action_line: usize,
    ) -> Result<Operand, ParseError> {
        let arg = match token {
            Token::Dot => Arg::Dot,
            Token::Field(path) => Arg::Field(path),
            Token::Literal(value) => Arg::Literal(value),
            Token::Ident(name) => {
                if KEYWORDS.contains(&name.as_str()) {
                    return Err(ParseError::Unsupported {
                        keyword: name,
                        line,
                    });
                }
                return Ok(Operand::Ident { name, line });
            }
            Token::LeftParen => {
                if self.depth >= MAX_DEPTH {
                    return Err(syntax("pipeline nested too deeply", line));
                }
                self.depth += 1;
                let inner = self.parse_pipeline(action_line)?;
                self.depth -= 1;
                match inner {
                    (pipeline, End::Paren { .. }) => Arg::Pipeline(Box::new(pipeline)),
                    (_, End::Close { .. }) => return Err(syntax("unclosed left paren", line)),
                }
            }
            _ => return Err(syntax("unexpected token in operand", line)),
        };
        Ok(Operand::Arg(arg))
    }

    /// A bare name in argument position calls the function without arguments.
    fn operand_to_arg(&self, operand: Operand) -> Result<Arg, ParseError> {
        match operand {
            Operand::Ident { name, line } => Ok(Arg::Call(self.resolve(name, line, Vec::new())?)),
            Operand::Arg(arg) => Ok(arg),
        }
    }

    fn resolve(&self, name: String, line: usize, args: Vec<Arg>) -> Result<Call, ParseError> {
        match self.functions.get(&name) {
            Some(function) => Ok(Call {
                function: function.clone(),
                name,
                args,
                line,
            }),
            None => Err(ParseError::UnknownFunction { name, line }),
        }
    }

    fn peek_token(&mut self, action_line: usize) -> Result<(Token, usize), ParseError> {
        if let Some(peeked) = &self.peeked {
            return Ok(peeked.clone());
        }
        let token = self.lex(action_line)?;
        self.peeked = Some(token.clone());
        Ok(token)
    }

    fn next_token(&mut self, action_line: usize) -> Result<(Token, usize), ParseError> {
        match self.peeked.take() {
            Some(token) => Ok(token),
            None => self.lex(action_line),
        }
    }

    fn lex(&mut self, action_line: usize) -> Result<(Token, usize), ParseError> {
        self.skip_whitespace();
        let line = self.line;
        let rest = self.rest();

        if rest.starts_with("}}") {
            self.advance(2);
            return Ok((Token::Close { trim: false }, line));
        }
        if rest.starts_with("-}}") {
            self.advance(3);
            return Ok((Token::Close { trim: true }, line));
        }

        let mut chars = rest.chars();
        let first = chars
            .next()
            .ok_or(ParseError::UnclosedAction { line: action_line })?;
        let second = chars.next();

        let token = match first {
            '|' => {
                self.advance(1);
                Token::Pipe
            }
            '(' => {
                self.advance(1);
                Token::LeftParen
            }
            ')' => {
                self.advance(1);
                Token::RightParen
            }
            '.' => self.lex_field(line)?,
            '"' => self.lex_quoted(line)?,
            '`' => {
                let end = rest[1..]
                    .find('`')
                    .ok_or_else(|| syntax("unterminated raw quoted string", line))?;
                let value = rest[1..1 + end].to_string();
                self.advance(end + 2);
                Token::Literal(Value::String(value))
            }
            c if c.is_ascii_digit()
                || ((c == '-' || c == '+') && second.is_some_and(|d| d.is_ascii_digit())) =>
            {
                self.lex_number(line)?
            }
            c if c.is_alphabetic() || c == '_' => {
                let len = ident_len(rest);
                let word = &rest[..len];
                let token = match word {
                    "true" => Token::Literal(Value::Bool(true)),
                    "false" => Token::Literal(Value::Bool(false)),
                    "nil" => Token::Literal(Value::Null),
                    _ => Token::Ident(word.to_string()),
                };
                self.advance(len);
                token
            }
            other => return Err(syntax(&format!("unexpected {:?} in action", other), line)),
        };

        Ok((token, line))
    }

    /// `.` alone or a path such as `.a.b`
    fn lex_field(&mut self, line: usize) -> Result<Token, ParseError> {
        let rest = self.rest();
        let mut segments = Vec::new();
        let mut i = 0;

        while rest[i..].starts_with('.') {
            let len = ident_len(&rest[i + 1..]);
            if len == 0 {
                if segments.is_empty() {
                    self.advance(1);
                    return Ok(Token::Dot);
                }
                return Err(syntax("bad field path", line));
            }
            segments.push(rest[i + 1..i + 1 + len].to_string());
            i += 1 + len;
        }

        self.advance(i);
        Ok(Token::Field(segments))
    }

    fn lex_quoted(&mut self, line: usize) -> Result<Token, ParseError> {
        let rest = self.rest();
        let mut value = String::new();
        let mut chars = rest.char_indices().skip(1);

        loop {
            match chars.next() {
                None | Some((_, '\n')) => return Err(syntax("unterminated quoted string", line)),
                Some((i, '"')) => {
                    self.advance(i + 1);
                    return Ok(Token::Literal(Value::String(value)));
                }
                Some((_, '\\')) => match chars.next() {
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, 't')) => value.push('\t'),
                    Some((_, 'r')) => value.push('\r'),
                    Some((_, '"')) => value.push('"'),
                    Some((_, '\\')) => value.push('\\'),
                    Some((_, other)) => {
                        return Err(syntax(&format!("invalid escape \\{}", other), line))
                    }
                    None => return Err(syntax("unterminated quoted string", line)),
                },
                Some((_, c)) => value.push(c),
            }
        }
    }

    fn lex_number(&mut self, line: usize) -> Result<Token, ParseError> {
        let rest = self.rest();
        let mut len = 0;
        let mut prev = None;
        for (i, c) in rest.char_indices() {
            let sign_ok = i == 0 || matches!(prev, Some('e') | Some('E'));
            if c.is_ascii_digit() || c == '.' || c == 'e' || c == 'E' || ((c == '+' || c == '-') && sign_ok) {
                len = i + c.len_utf8();
                prev = Some(c);
            } else {
                break;
            }
        }

        let literal = &rest[..len];
        if rest[len..].starts_with(|c: char| c.is_alphanumeric() || c == '_') {
            return Err(syntax(&format!("bad number syntax: {}", literal), line));
        }

        let value = if let Ok(n) = literal.parse::<i64>() {
            Value::from(n)
        } else {
            literal
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| syntax(&format!("bad number syntax: {}", literal), line))?
        };

        self.advance(len);
        Ok(Token::Literal(value))
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        self.advance(rest.len() - rest.trim_start().len());
    }

    /// Move forward `n` bytes, keeping the line count current.
    fn advance(&mut self, n: usize) {
        self.line += self.src[self.pos..self.pos + n].matches('\n').count();
        self.pos += n;
    }
}

fn syntax(message: &str, line: usize) -> ParseError {
    ParseError::Syntax {
        message: message.to_string(),
        line,
    }
}

/// `{{- ` trims preceding text; `{{-3}}` is a number.
fn starts_with_trim_marker(s: &str) -> bool {
    s.strip_prefix('-')
        .is_some_and(|after| after.starts_with(|c: char| c.is_whitespace()))
}

fn ident_len(s: &str) -> usize {
    s.find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(s.len())
}

fn push_text(nodes: &mut Vec<Node>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Node::Text(previous)) = nodes.last_mut() {
        previous.push_str(text);
    } else {
        nodes.push(Node::Text(text.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn functions() -> FuncMap {
        FuncMap::new()
            .with("upper", |_| Ok(Value::Null))
            .with("now", |_| Ok(Value::Null))
    }

    fn parse_ok(src: &str) -> Vec<Node> {
        parse(src, &functions()).unwrap()
    }

    fn only_command(nodes: &[Node]) -> &Command {
        match nodes {
            [Node::Action { pipeline, .. }] => &pipeline.commands[0],
            other => panic!("expected one action, got {:?}", other),
        }
    }

    #[test]
    fn test_text_only() {
        let nodes = parse_ok("plain {text}\n");
        assert!(matches!(&nodes[..], [Node::Text(t)] if t == "plain {text}\n"));
    }

    #[test]
    fn test_literals() {
        let cases = [
            ("{{ 42 }}", json!(42)),
            ("{{-7}}", json!(-7)),
            ("{{ 1.5 }}", json!(1.5)),
            ("{{ \"a\\\"b\\n\" }}", json!("a\"b\n")),
            ("{{ `raw\\n` }}", json!("raw\\n")),
            ("{{ true }}", json!(true)),
            ("{{ nil }}", Value::Null),
        ];
        for (src, expected) in cases {
            let nodes = parse_ok(src);
            match only_command(&nodes) {
                Command::Value(Arg::Literal(value)) => assert_eq!(value, &expected, "{}", src),
                other => panic!("{}: unexpected {:?}", src, other),
            }
        }
    }

    #[test]
    fn test_fields_and_dot() {
        let nodes = parse_ok("{{ .a.b_c }}");
        assert!(matches!(
            only_command(&nodes),
            Command::Value(Arg::Field(path)) if path == &["a", "b_c"]
        ));

        let nodes = parse_ok("{{ . }}");
        assert!(matches!(only_command(&nodes), Command::Value(Arg::Dot)));
    }

    #[test]
    fn test_call_with_nested_arguments() {
        let nodes = parse_ok("{{ upper .name (upper 1) now }}");
        match only_command(&nodes) {
            Command::Call(call) => {
                assert_eq!(call.name, "upper");
                assert_eq!(call.args.len(), 3);
                assert!(matches!(call.args[1], Arg::Pipeline(_)));
                assert!(matches!(&call.args[2], Arg::Call(c) if c.name == "now"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_pipeline_stages() {
        let nodes = parse_ok("{{ .name | upper | upper }}");
        match &nodes[..] {
            [Node::Action { pipeline, .. }] => assert_eq!(pipeline.commands.len(), 3),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_trim_markers() {
        let nodes = parse_ok("a  \n {{- 1 -}} \n b");
        assert!(matches!(&nodes[0], Node::Text(t) if t == "a"));
        assert!(matches!(&nodes[2], Node::Text(t) if t == "b"));
    }

    #[test]
    fn test_comments_vanish() {
        let nodes = parse_ok("a{{/* note\nspanning */}}b");
        assert!(matches!(&nodes[..], [Node::Text(t)] if t == "ab"));
    }

    #[test]
    fn test_closing_braces_inside_strings() {
        let nodes = parse_ok("{{ upper \"}}\" }}");
        match only_command(&nodes) {
            Command::Call(call) => {
                assert!(matches!(&call.args[0], Arg::Literal(v) if v == "}}"))
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unknown_function_reports_line() {
        let err = parse("one\ntwo {{ missing .x }}", &functions()).unwrap_err();
        assert_eq!(
            err,
            ParseError::UnknownFunction {
                name: "missing".to_string(),
                line: 2
            }
        );

        let err = parse("{{ upper nope }}", &functions()).unwrap_err();
        assert!(matches!(err, ParseError::UnknownFunction { name, .. } if name == "nope"));
    }

    #[test]
    fn test_syntax_errors() {
        let f = functions();
        assert_eq!(
            parse("\n{{ upper .x", &f).unwrap_err(),
            ParseError::UnclosedAction { line: 2 }
        );
        assert!(matches!(parse("{{ }}", &f), Err(ParseError::Syntax { .. })));
        assert!(matches!(parse("{{ 1 2 }}", &f), Err(ParseError::Syntax { .. })));
        assert!(matches!(parse("{{ upper | 1 }}", &f), Err(ParseError::Syntax { .. })));
        assert!(matches!(parse("{{ (upper }}", &f), Err(ParseError::Syntax { .. })));
        assert!(matches!(parse("{{ upper ) }}", &f), Err(ParseError::Syntax { .. })));
        assert!(matches!(parse("{{ \"open }}", &f), Err(ParseError::Syntax { .. })));
        assert!(matches!(parse("{{ 12ab }}", &f), Err(ParseError::Syntax { .. })));
        assert!(matches!(parse("{{ .a. }}", &f), Err(ParseError::Syntax { .. })));
        assert!(matches!(parse("{{ # }}", &f), Err(ParseError::Syntax { .. })));
        assert!(matches!(parse("{{/* open }}", &f), Err(ParseError::Syntax { .. })));
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let f = functions();
        let source = format!("{{{{ {} }}}}", "(".repeat(200_000));
        match parse(&source, &f).unwrap_err() {
            ParseError::Syntax { message, line } => {
                assert_eq!(message, "pipeline nested too deeply");
                assert_eq!(line, 1);
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let nested = format!("{{{{ {}upper .x{} }}}}", "(".repeat(50), ")".repeat(50));
        assert!(parse(&nested, &f).is_ok());
    }

    #[test]
    fn test_control_keywords_rejected() {
        let err = parse("{{ if .x }}y{{ end }}", &functions()).unwrap_err();
        assert!(matches!(err, ParseError::Unsupported { keyword, line: 1 } if keyword == "if"));
    }
}
