//! Restricted grammar for code-shaped proposals.
//!
//! A proposal's code block is never executed. It is tokenized and parsed as a single call to one
//! of a fixed set of functions with keyword-only literal arguments. Anything else fails closed.

use crate::dom::PageModel;
use crate::error::{AffordanceKind, ProposalError};
use crate::protocol::action::{Action, ScrollDirection};
use indexmap::IndexMap;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static CODE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:python)?\n(.*?)\n```").expect("code block pattern is valid"));

/// Body of the last fenced code block in `text`
pub fn extract_code_block(text: &str) -> Option<&str> {
    CODE_BLOCK
        .captures_iter(text)
        .last()
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// The functions a proposal may call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    GoBack,
    ScrollUp,
    ScrollDown,
    Click,
    Type,
    SetObjectiveComplete,
}

impl Function {
    pub const ALL: [Function; 6] = [
        Function::GoBack,
        Function::ScrollUp,
        Function::ScrollDown,
        Function::Click,
        Function::Type,
        Function::SetObjectiveComplete,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Function::GoBack => "go_back",
            Function::ScrollUp => "scroll_up",
            Function::ScrollDown => "scroll_down",
            Function::Click => "click",
            Function::Type => "type",
            Function::SetObjectiveComplete => "set_objective_complete",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|function| function.name() == name)
    }

    /// Typed signature shown to the proposer
    pub fn signature(self) -> &'static str {
        match self {
            Function::GoBack => "go_back()",
            Function::ScrollUp => "scroll_up()",
            Function::ScrollDown => "scroll_down()",
            Function::Click => "click(id: int)",
            Function::Type => "type(id: int, text: str, submit: bool)",
            Function::SetObjectiveComplete => "set_objective_complete()",
        }
    }

    /// Example call used in the output format section of the prompt
    pub fn example(self) -> &'static str {
        match self {
            Function::Click => "click(id=...)",
            Function::Type => "type(id=..., text=..., submit=...)",
            other => other.signature(),
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A literal argument value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Str(String),
    Bool(bool),
    None,
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Str(_) => "str",
            Value::Bool(_) => "bool",
            Value::None => "None",
        }
    }
}

/// A parsed, not yet validated, function call
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub function: Function,
    pub args: IndexMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Int(String),
    Str(String),
    LParen,
    RParen,
    Comma,
    Equals,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(name) => write!(f, "'{}'", name),
            Token::Int(digits) => write!(f, "'{}'", digits),
            Token::Str(value) => write!(f, "{:?}", value),
            Token::LParen => write!(f, "'('"),
            Token::RParen => write!(f, "')'"),
            Token::Comma => write!(f, "','"),
            Token::Equals => write!(f, "'='"),
        }
    }
}

struct Spanned {
    token: Token,
    line: usize,
    column: usize,
}

fn tokenize(code: &str) -> Result<Vec<Spanned>, ProposalError> {
    let mut tokens = Vec::new();

    for (line_index, line) in code.lines().enumerate() {
        let line_no = line_index + 1;
        let mut chars = line.char_indices().peekable();

        while let Some(&(offset, c)) = chars.peek() {
            let column = offset + 1;
            let token = match c {
                c if c.is_whitespace() => {
                    chars.next();
                    continue;
                }
                '#' => break,
                '(' | ')' | ',' | '=' => {
                    chars.next();
                    match c {
                        '(' => Token::LParen,
                        ')' => Token::RParen,
                        ',' => Token::Comma,
                        _ => Token::Equals,
                    }
                }
                '"' | '\'' => {
                    chars.next();
                    Token::Str(read_string(&mut chars, c).ok_or_else(|| {
                        ProposalError::NoActionParsed(format!(
                            "unterminated string literal at line {}, column {}",
                            line_no, column
                        ))
                    })?)
                }
                c if c == '-' || c.is_ascii_digit() => {
                    let mut digits = String::new();
                    digits.push(c);
                    chars.next();
                    while let Some(&(_, d)) = chars.peek() {
                        if !d.is_ascii_digit() {
                            break;
                        }
                        digits.push(d);
                        chars.next();
                    }
                    if digits == "-" {
                        return Err(unexpected_char('-', line_no, column));
                    }
                    Token::Int(digits)
                }
                c if c.is_alphabetic() || c == '_' => {
                    let mut name = String::new();
                    while let Some(&(_, d)) = chars.peek() {
                        if !(d.is_alphanumeric() || d == '_') {
                            break;
                        }
                        name.push(d);
                        chars.next();
                    }
                    Token::Ident(name)
                }
                other => return Err(unexpected_char(other, line_no, column)),
            };
            tokens.push(Spanned {
                token,
                line: line_no,
                column,
            });
        }
    }

    Ok(tokens)
}

fn unexpected_char(c: char, line: usize, column: usize) -> ProposalError {
    ProposalError::NoActionParsed(format!(
        "invalid syntax: unexpected character {:?} at line {}, column {}",
        c, line, column
    ))
}

fn read_string(chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>, quote: char) -> Option<String> {
    let mut value = String::new();
    while let Some((_, c)) = chars.next() {
        match c {
            '\\' => {
                let (_, escaped) = chars.next()?;
                match escaped {
                    'n' => value.push('\n'),
                    't' => value.push('\t'),
                    'r' => value.push('\r'),
                    '\\' | '\'' | '"' => value.push(escaped),
                    other => {
                        value.push('\\');
                        value.push(other);
                    }
                }
            }
            c if c == quote => return Some(value),
            c => value.push(c),
        }
    }
    None
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&Spanned> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), ProposalError> {
        match self.next() {
            Some(spanned) if spanned.token == expected => Ok(()),
            Some(spanned) => Err(ProposalError::NoActionParsed(format!(
                "invalid syntax: expected {} but found {} at line {}, column {}",
                expected, spanned.token, spanned.line, spanned.column
            ))),
            None => Err(ProposalError::NoActionParsed(format!(
                "invalid syntax: expected {} but the code ended",
                expected
            ))),
        }
    }

    fn call(&mut self) -> Result<Call, ProposalError> {
        let function = match self.next() {
            Some(Spanned {
                token: Token::Ident(name),
                ..
            }) => Function::from_name(name)
                .ok_or_else(|| ProposalError::NoActionParsed(format!("name '{}' is not defined", name)))?,
            Some(spanned) => {
                return Err(ProposalError::NoActionParsed(format!(
                    "invalid syntax: expected a function name but found {} at line {}, column {}",
                    spanned.token, spanned.line, spanned.column
                )));
            }
            None => return Err(ProposalError::NoActionParsed("no function was called".to_string())),
        };

        self.expect(Token::LParen)?;
        let mut args = IndexMap::new();

        loop {
            if matches!(self.peek(), Some(Spanned { token: Token::RParen, .. })) {
                self.pos += 1;
                break;
            }

            let (name, value) = self.argument(function)?;
            if args.contains_key(&name) {
                return Err(ProposalError::MalformedArguments(format!(
                    "keyword argument repeated: {}",
                    name
                )));
            }
            args.insert(name, value);

            match self.next() {
                Some(Spanned { token: Token::Comma, .. }) => continue,
                Some(Spanned { token: Token::RParen, .. }) => break,
                Some(spanned) => {
                    return Err(ProposalError::NoActionParsed(format!(
                        "invalid syntax: expected ',' or ')' but found {} at line {}, column {}",
                        spanned.token, spanned.line, spanned.column
                    )));
                }
                None => {
                    return Err(ProposalError::NoActionParsed(
                        "invalid syntax: '(' was never closed".to_string(),
                    ));
                }
            }
        }

        if let Some(spanned) = self.peek() {
            return Err(ProposalError::NoActionParsed(format!(
                "invalid syntax: unexpected {} after the call at line {}, column {}",
                spanned.token, spanned.line, spanned.column
            )));
        }

        Ok(Call { function, args })
    }

    fn argument(&mut self, function: Function) -> Result<(String, Value), ProposalError> {
        let name = match self.next() {
            Some(Spanned {
                token: Token::Ident(name),
                ..
            }) if !is_literal_name(name) => name.clone(),
            Some(Spanned { token, .. }) if !matches!(token, Token::RParen | Token::Comma | Token::Equals) => {
                return Err(ProposalError::MalformedArguments(format!(
                    "{}() takes keyword arguments only, got positional {}",
                    function, token
                )));
            }
            Some(spanned) => {
                return Err(ProposalError::NoActionParsed(format!(
                    "invalid syntax: unexpected {} at line {}, column {}",
                    spanned.token, spanned.line, spanned.column
                )));
            }
            None => {
                return Err(ProposalError::NoActionParsed(
                    "invalid syntax: '(' was never closed".to_string(),
                ));
            }
        };

        match self.next() {
            Some(Spanned { token: Token::Equals, .. }) => {}
            Some(Spanned {
                token: Token::Comma | Token::RParen,
                ..
            }) => {
                return Err(ProposalError::MalformedArguments(format!(
                    "{}() takes keyword arguments only, got positional '{}'",
                    function, name
                )));
            }
            Some(spanned) => {
                return Err(ProposalError::NoActionParsed(format!(
                    "invalid syntax: expected '=' but found {} at line {}, column {}",
                    spanned.token, spanned.line, spanned.column
                )));
            }
            None => {
                return Err(ProposalError::NoActionParsed(
                    "invalid syntax: '(' was never closed".to_string(),
                ));
            }
        }

        let value = self.literal()?;
        Ok((name, value))
    }

    fn literal(&mut self) -> Result<Value, ProposalError> {
        match self.next() {
            Some(Spanned {
                token: Token::Int(digits),
                ..
            }) => digits
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| ProposalError::MalformedArguments(format!("integer literal out of range: {}", digits))),
            Some(Spanned {
                token: Token::Str(value),
                ..
            }) => Ok(Value::Str(value.clone())),
            Some(Spanned {
                token: Token::Ident(name),
                ..
            }) => match name.as_str() {
                "True" | "true" => Ok(Value::Bool(true)),
                "False" | "false" => Ok(Value::Bool(false)),
                "None" => Ok(Value::None),
                other => Err(ProposalError::NoActionParsed(format!("name '{}' is not defined", other))),
            },
            Some(spanned) => Err(ProposalError::NoActionParsed(format!(
                "invalid syntax: expected a literal but found {} at line {}, column {}",
                spanned.token, spanned.line, spanned.column
            ))),
            None => Err(ProposalError::NoActionParsed(
                "invalid syntax: expected a literal but the code ended".to_string(),
            )),
        }
    }
}

fn is_literal_name(name: &str) -> bool {
    matches!(name, "True" | "true" | "False" | "false" | "None")
}

/// Parse the body of a code block.
///
/// Returns `Ok(None)` when the block holds no code at all (blank lines and comments only).
pub fn parse_call(code: &str) -> Result<Option<Call>, ProposalError> {
    let tokens = tokenize(code)?;
    if tokens.is_empty() {
        return Ok(None);
    }

    let mut parser = Parser { tokens, pos: 0 };
    parser.call().map(Some)
}

/// Check a parsed call against the page model it was proposed for
pub fn validate(call: Option<Call>, model: &PageModel) -> Result<Action, ProposalError> {
    let Some(mut call) = call else {
        return Err(ProposalError::NoActionParsed("no function was called".to_string()));
    };

    let action = match call.function {
        Function::GoBack => Action::GoBack,
        Function::ScrollUp => Action::Scroll {
            direction: ScrollDirection::Up,
        },
        Function::ScrollDown => Action::Scroll {
            direction: ScrollDirection::Down,
        },
        Function::SetObjectiveComplete => Action::Complete,
        Function::Click => {
            let id = affordance_id(&mut call, AffordanceKind::Clickable, model)?;
            Action::Click { id }
        }
        Function::Type => {
            let id = affordance_id(&mut call, AffordanceKind::Inputable, model)?;
            let text = match call.args.shift_remove("text") {
                Some(Value::Str(text)) => text,
                Some(other) => return Err(wrong_type(call.function, "text", "str", &other)),
                None => return Err(missing_argument(call.function, "text")),
            };
            let submit = match call.args.shift_remove("submit") {
                Some(Value::Bool(submit)) => submit,
                Some(other) => return Err(wrong_type(call.function, "submit", "bool", &other)),
                None => return Err(missing_argument(call.function, "submit")),
            };
            Action::Type { id, text, submit }
        }
    };

    if let Some(extra) = call.args.keys().next() {
        return Err(ProposalError::MalformedArguments(format!(
            "{}() got an unexpected keyword argument '{}'",
            call.function, extra
        )));
    }

    Ok(action)
}

fn affordance_id(call: &mut Call, kind: AffordanceKind, model: &PageModel) -> Result<usize, ProposalError> {
    let id = match call.args.shift_remove("id") {
        None | Some(Value::None) => return Err(ProposalError::MissingId(kind.function())),
        Some(Value::Int(id)) => id,
        Some(other) => return Err(wrong_type(call.function, "id", "int", &other)),
    };

    let map = match kind {
        AffordanceKind::Clickable => model.clickable(),
        AffordanceKind::Inputable => model.inputable(),
    };
    usize::try_from(id)
        .ok()
        .filter(|id| map.contains(*id))
        .ok_or(ProposalError::UnknownOrWrongKindId { id, kind })
}

fn wrong_type(function: Function, name: &str, expected: &str, got: &Value) -> ProposalError {
    ProposalError::MalformedArguments(format!(
        "{}() argument '{}' must be {}, not {}",
        function,
        name,
        expected,
        got.type_name()
    ))
}

fn missing_argument(function: Function, name: &str) -> ProposalError {
    ProposalError::MalformedArguments(format!("{}() missing required argument: '{}'", function, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{AffordanceMap, DomTree, Node, NodeId};

    fn model() -> PageModel {
        let mut button = Node::new(NodeId(1), "button");
        button.parent = Some(NodeId(0));
        let mut input = Node::new(NodeId(2), "input");
        input.parent = Some(NodeId(0));
        let tree = DomTree::from_nodes(vec![Node::new(NodeId(0), "body"), button, input]).unwrap();

        let mut clickable = AffordanceMap::new();
        clickable.insert(0, NodeId(1));
        let mut inputable = AffordanceMap::new();
        inputable.insert(1, NodeId(2));
        PageModel::new(tree, clickable, inputable)
    }

    fn run(code: &str) -> Result<Action, ProposalError> {
        validate(parse_call(code)?, &model())
    }

    #[test]
    fn test_extract_last_block() {
        let text = "## Plan\n```python\nscroll_down()\n```\nOr rather\n```python\nclick(id=0)\n```\n";
        assert_eq!(extract_code_block(text), Some("click(id=0)"));
    }

    #[test]
    fn test_extract_without_language_tag() {
        assert_eq!(extract_code_block("```\ngo_back()\n```"), Some("go_back()"));
    }

    #[test]
    fn test_extract_none() {
        assert_eq!(extract_code_block("I would click the button"), None);
        assert_eq!(extract_code_block("```python\nclick(id=0)"), None);
    }

    #[test]
    fn test_zero_argument_functions() {
        assert_eq!(run("go_back()").unwrap(), Action::GoBack);
        assert_eq!(
            run("scroll_up()").unwrap(),
            Action::Scroll {
                direction: ScrollDirection::Up
            }
        );
        assert_eq!(
            run("scroll_down()").unwrap(),
            Action::Scroll {
                direction: ScrollDirection::Down
            }
        );
        assert_eq!(run("set_objective_complete()").unwrap(), Action::Complete);
    }

    #[test]
    fn test_click() {
        assert_eq!(run("click(id=0)").unwrap(), Action::Click { id: 0 });
        assert_eq!(run("  # the login button\n  click( id = 0 )\n").unwrap(), Action::Click { id: 0 });
    }

    #[test]
    fn test_type() {
        let action = run("type(id=1, text=\"rust \\\"async\\\"\", submit=True)").unwrap();
        assert_eq!(
            action,
            Action::Type {
                id: 1,
                text: "rust \"async\"".to_string(),
                submit: true
            }
        );

        let action = run("type(submit=false, text='hello', id=1)").unwrap();
        assert_eq!(
            action,
            Action::Type {
                id: 1,
                text: "hello".to_string(),
                submit: false
            }
        );
    }

    #[test]
    fn test_empty_block_is_no_action() {
        assert!(matches!(run(""), Err(ProposalError::NoActionParsed(_))));
        assert!(matches!(run("# nothing to do\n"), Err(ProposalError::NoActionParsed(_))));
    }

    #[test]
    fn test_unknown_names_fail_closed() {
        assert_eq!(
            run("print(1)"),
            Err(ProposalError::NoActionParsed("name 'print' is not defined".to_string()))
        );
        assert!(matches!(run("click(id=os)"), Err(ProposalError::NoActionParsed(_))));
        assert!(matches!(run("__import__('os')"), Err(ProposalError::NoActionParsed(_))));
    }

    #[test]
    fn test_statements_and_trailing_input_fail_closed() {
        assert!(matches!(run("x = 1"), Err(ProposalError::NoActionParsed(_))));
        assert!(matches!(run("go_back()\nscroll_down()"), Err(ProposalError::NoActionParsed(_))));
        assert!(matches!(run("go_back(); scroll_down()"), Err(ProposalError::NoActionParsed(_))));
        assert!(matches!(run("click(id=0"), Err(ProposalError::NoActionParsed(_))));
        assert!(matches!(run("type(id=1, text='open"), Err(ProposalError::NoActionParsed(_))));
    }

    #[test]
    fn test_missing_id() {
        assert_eq!(run("click()"), Err(ProposalError::MissingId("click")));
        assert_eq!(run("type(text='a', submit=False)"), Err(ProposalError::MissingId("type")));
        assert_eq!(run("click(id=None)"), Err(ProposalError::MissingId("click")));
    }

    #[test]
    fn test_wrong_kind_id() {
        assert_eq!(
            run("click(id=1)"),
            Err(ProposalError::UnknownOrWrongKindId {
                id: 1,
                kind: AffordanceKind::Clickable
            })
        );
        assert_eq!(
            run("type(id=0, text='a', submit=True)"),
            Err(ProposalError::UnknownOrWrongKindId {
                id: 0,
                kind: AffordanceKind::Inputable
            })
        );
        assert_eq!(
            run("click(id=-3)"),
            Err(ProposalError::UnknownOrWrongKindId {
                id: -3,
                kind: AffordanceKind::Clickable
            })
        );
    }

    #[test]
    fn test_id_checked_before_other_arguments() {
        assert!(matches!(
            run("type(id=9, submit=True)"),
            Err(ProposalError::UnknownOrWrongKindId { id: 9, .. })
        ));
    }

    #[test]
    fn test_malformed_arguments() {
        assert!(matches!(run("type(id=1, text='a')"), Err(ProposalError::MalformedArguments(_))));
        assert!(matches!(run("type(id=1, submit=True)"), Err(ProposalError::MalformedArguments(_))));
        assert!(matches!(
            run("type(id=1, text='a', submit=True, delay=3)"),
            Err(ProposalError::MalformedArguments(_))
        ));
        assert!(matches!(run("type(id=1, text=3, submit=True)"), Err(ProposalError::MalformedArguments(_))));
        assert!(matches!(run("type(id=1, text='a', submit='yes')"), Err(ProposalError::MalformedArguments(_))));
        assert!(matches!(run("click(id='0')"), Err(ProposalError::MalformedArguments(_))));
        assert!(matches!(run("click(id=0, force=True)"), Err(ProposalError::MalformedArguments(_))));
        assert!(matches!(run("go_back(steps=2)"), Err(ProposalError::MalformedArguments(_))));
        assert!(matches!(run("click(0)"), Err(ProposalError::MalformedArguments(_))));
        assert!(matches!(run("click(id=0, id=0)"), Err(ProposalError::MalformedArguments(_))));
        assert!(matches!(
            run("click(id=99999999999999999999)"),
            Err(ProposalError::MalformedArguments(_))
        ));
    }

    #[test]
    fn test_function_table() {
        for function in Function::ALL {
            assert_eq!(Function::from_name(function.name()), Some(function));
        }
        assert_eq!(Function::Type.signature(), "type(id: int, text: str, submit: bool)");
        assert_eq!(Function::Click.example(), "click(id=...)");
        assert_eq!(Function::GoBack.example(), "go_back()");
    }
}
