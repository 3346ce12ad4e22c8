// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Source text to [`Script`].
//!
//! The grammar is expression based. Every construct, including `if` and the
//! loops, produces a value:
//!
//! ```text
//! a := 1; b := a + 2          # sequencing and assignment
//! if x > 1 then "big" else "small"
//! for each c in set.cards do c.name + ", "
//! for i from 1 to 3 do i      # loop bodies are summed with `+`
//! "Hello {name}!"             # smart strings
//! to_upper(name) & "!"        # calls; unnamed arguments bind `input`
//! join@(separator: "/")       # closures bind default arguments
//! card.power or else 0        # `or else` catches delayed errors
//! [1, 2, 3].1                 # lists, keyed lists [a: 1], members
//! ```

use std::mem;
use std::rc::Rc;

use crate::error::ParseError;
use crate::function::Function;
use crate::script::{BinaryOp, Instruction, Script, ScriptBuilder, TernaryOp, UnaryOp};
use crate::value::ScriptValue;

/// Parses scripts.
///
/// ```
/// use cardscript::{Context, Parser};
///
/// let script = Parser::new("1 + 2 * 3").parse().unwrap();
/// let mut ctx = Context::new();
/// assert_eq!(ctx.eval(&script, true).unwrap().to_int().unwrap(), 7);
///
/// // In string mode the whole source is a string with `{}` escapes.
/// let template = Parser::new("total: {1 + 2}").string_mode(true).parse().unwrap();
/// assert_eq!(ctx.eval(&template, true).unwrap().to_string_value().unwrap(), "total: 3");
/// ```
#[derive(Clone, Debug)]
pub struct Parser<'a> {
    source: &'a str,
    string_mode: bool,
    filename: Option<String>,
}

impl<'a> Parser<'a> {
    /// Creates a parser for `source`.
    #[must_use]
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            string_mode: false,
            filename: None,
        }
    }

    /// Treats the whole source as the inside of a string literal.
    #[must_use]
    pub fn string_mode(mut self, string_mode: bool) -> Self {
        self.string_mode = string_mode;
        self
    }

    /// Names the source in error messages.
    #[must_use]
    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Parses the source.
    pub fn parse(&self) -> Result<Rc<Script>, ParseError> {
        let result = tokenize(self.source, self.string_mode).and_then(|tokens| {
            let mut compiler = Compiler {
                source: self.source,
                tokens,
                at: 0,
                code: ScriptBuilder::new(),
            };
            compiler.parse_oper(Prec::All)?;
            compiler.skip_newlines();
            if !matches!(compiler.peek(), Tok::Eof) {
                return Err(compiler.error(format!(
                    "expected end of input but found {}",
                    compiler.peek().describe()
                )));
            }
            Ok(Rc::new(compiler.code.finish()))
        });
        result.map_err(|e| ParseError {
            filename: self.filename.clone(),
            ..e
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Bracket {
    Paren,
    Square,
    Curly,
    /// `{` inside a string literal, or the `}` that resumes the string.
    Smart,
}

#[derive(Clone, Debug, PartialEq)]
enum Tok {
    Name(String),
    Int(i64),
    Double(f64),
    Str(String),
    Oper(&'static str),
    Open(Bracket),
    Close(Bracket),
    Newline,
    Eof,
}

impl Tok {
    fn describe(&self) -> String {
        match self {
            Self::Name(n) => format!("'{n}'"),
            Self::Int(i) => format!("'{i}'"),
            Self::Double(d) => format!("'{d}'"),
            Self::Str(_) => "a string".into(),
            Self::Oper(o) => format!("'{o}'"),
            Self::Open(Bracket::Paren) => "'('".into(),
            Self::Open(Bracket::Square) => "'['".into(),
            Self::Open(Bracket::Curly) | Self::Open(Bracket::Smart) => "'{'".into(),
            Self::Close(Bracket::Paren) => "')'".into(),
            Self::Close(Bracket::Square) => "']'".into(),
            Self::Close(Bracket::Curly) | Self::Close(Bracket::Smart) => "'}'".into(),
            Self::Newline => "newline".into(),
            Self::Eof => "end of input".into(),
        }
    }

    fn is_name(&self, name: &str) -> bool {
        matches!(self, Self::Name(n) if n == name)
    }

    fn is_oper(&self, oper: &str) -> bool {
        matches!(self, Self::Oper(o) if *o == oper)
    }
}

#[derive(Clone, Debug)]
struct Token {
    tok: Tok,
    pos: usize,
}

const OPERATORS: [&str; 19] = [
    ":=", "==", "!=", "<=", ">=", "+", "-", "*", "/", "!", ".", ":", "=", "<", ">", ";", ",", "&",
    "@",
];

/// Words that continue an expression, so a line starting with one does not
/// start a new statement.
const CONTINUATIONS: [&str; 9] = ["and", "or", "then", "else", "do", "in", "from", "to", "mod"];

#[derive(Copy, Clone, Debug)]
enum Brace {
    Plain,
    Smart { eof_terminated: bool },
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    braces: Vec<Brace>,
    out: Vec<Token>,
}

fn tokenize(src: &str, string_mode: bool) -> Result<Vec<Token>, ParseError> {
    let mut lexer = Lexer {
        src,
        pos: 0,
        braces: Vec::new(),
        out: Vec::new(),
    };
    if string_mode {
        lexer.string(true)?;
    }
    while lexer.next_token()? {}
    Ok(lexer.out)
}

impl Lexer<'_> {
    fn peek_char(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn push(&mut self, tok: Tok, pos: usize) {
        self.out.push(Token { tok, pos });
    }

    fn error(&self, pos: usize, message: impl Into<String>) -> ParseError {
        ParseError::at(self.src, pos, message)
    }

    /// Lexes one token. Returns `false` once the end has been emitted.
    fn next_token(&mut self) -> Result<bool, ParseError> {
        let start = self.pos;
        let Some(c) = self.bump() else {
            self.push(Tok::Eof, start);
            return Ok(false);
        };
        match c {
            '\n' => self.push(Tok::Newline, start),
            c if c.is_whitespace() => {}
            '#' => {
                while self.peek_char().is_some_and(|c| c != '\n') {
                    self.bump();
                }
            }
            c if c.is_alphabetic() || c == '_' => {
                while self
                    .peek_char()
                    .is_some_and(|c| c.is_alphanumeric() || c == '_')
                {
                    self.bump();
                }
                let name = self.src[start..self.pos].to_owned();
                self.push(Tok::Name(name), start);
            }
            c if c.is_ascii_digit() => {
                while self
                    .peek_char()
                    .is_some_and(|c| c.is_ascii_digit() || c == '.')
                {
                    self.bump();
                }
                let text = &self.src[start..self.pos];
                let tok = if text.contains('.') {
                    text.parse().map(Tok::Double).ok()
                } else {
                    text.parse().map(Tok::Int).ok()
                };
                let tok = tok.ok_or_else(|| self.error(start, format!("invalid number '{text}'")))?;
                self.push(tok, start);
            }
            '"' => self.string(false)?,
            '}' if matches!(self.braces.last(), Some(Brace::Smart { .. })) => {
                let eof_terminated = matches!(
                    self.braces.pop(),
                    Some(Brace::Smart {
                        eof_terminated: true
                    })
                );
                self.push(Tok::Close(Bracket::Smart), start);
                self.string(eof_terminated)?;
            }
            '(' | '[' | '{' => {
                self.braces.push(Brace::Plain);
                let bracket = match c {
                    '(' => Bracket::Paren,
                    '[' => Bracket::Square,
                    _ => Bracket::Curly,
                };
                self.push(Tok::Open(bracket), start);
            }
            ')' | ']' | '}' => {
                self.braces.pop();
                let bracket = match c {
                    ')' => Bracket::Paren,
                    ']' => Bracket::Square,
                    _ => Bracket::Curly,
                };
                self.push(Tok::Close(bracket), start);
            }
            _ => {
                let rest = &self.src[start..];
                let Some(op) = OPERATORS.iter().find(|op| rest.starts_with(**op)) else {
                    return Err(self.error(start, format!("unknown character in script: '{c}'")));
                };
                self.pos = start + op.len();
                self.push(Tok::Oper(*op), start);
            }
        }
        Ok(true)
    }

    /// Lexes the body of a string literal after its opening quote, or after
    /// the `}` closing an interpolation.
    fn string(&mut self, eof_terminated: bool) -> Result<(), ParseError> {
        let start = self.pos;
        let mut text = String::new();
        loop {
            let at = self.pos;
            let Some(c) = self.bump() else {
                if eof_terminated {
                    self.push(Tok::Str(text), start);
                    return Ok(());
                }
                return Err(self.error(at, "unexpected end of input in string constant"));
            };
            match c {
                '"' if !eof_terminated => {
                    self.push(Tok::Str(text), start);
                    return Ok(());
                }
                '\\' => {
                    let escaped = self.bump().ok_or_else(|| {
                        self.error(at, "unexpected end of input in string constant")
                    })?;
                    text.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        other => other,
                    });
                }
                '{' => {
                    self.push(Tok::Str(text), start);
                    self.push(Tok::Open(Bracket::Smart), at);
                    self.braces.push(Brace::Smart { eof_terminated });
                    return Ok(());
                }
                c => text.push(c),
            }
        }
    }
}

/// Binding strength, weakest first.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Prec {
    All,
    Newline,
    Seq,
    Set,
    OrElse,
    And,
    Cmp,
    Add,
    Mul,
    Unary,
    Fun,
    Str,
    None,
}

struct Compiler<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    at: usize,
    code: ScriptBuilder,
}

type PResult<T = ()> = Result<T, ParseError>;

impl Compiler<'_> {
    fn peek(&self) -> &Tok {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &Tok {
        self.tokens
            .get(self.at + offset)
            .map_or(&Tok::Eof, |t| &t.tok)
    }

    fn advance(&mut self) -> Tok {
        let tok = self.peek().clone();
        if self.at < self.tokens.len() {
            self.at += 1;
        }
        tok
    }

    fn skip_newlines(&mut self) {
        while matches!(self.peek(), Tok::Newline) {
            self.at += 1;
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        let pos = self
            .tokens
            .get(self.at)
            .or(self.tokens.last())
            .map_or(self.source.len(), |t| t.pos);
        ParseError::at(self.source, pos, message)
    }

    fn expect(&mut self, what: &str, matches: impl Fn(&Tok) -> bool) -> PResult {
        self.skip_newlines();
        if matches(self.peek()) {
            self.at += 1;
            Ok(())
        } else {
            Err(self.error(format!("expected {what} but found {}", self.peek().describe())))
        }
    }

    fn expect_name(&mut self, name: &str) -> PResult {
        self.expect(&format!("'{name}'"), |t| t.is_name(name))
    }

    fn expect_close(&mut self, bracket: Bracket, what: &str) -> PResult {
        self.expect(what, |t| *t == Tok::Close(bracket))
    }

    fn starts_statement(&self) -> bool {
        match self.peek() {
            Tok::Name(n) => !CONTINUATIONS.contains(&n.as_str()),
            Tok::Open(b) => *b != Bracket::Smart,
            _ => false,
        }
    }

    /// Parses an operand followed by every operator binding at least as
    /// strongly as `min`. Leaves one value on the stack.
    fn parse_oper(&mut self, min: Prec) -> PResult {
        self.parse_expr(min)?;
        loop {
            let resume = self.at;
            if matches!(self.peek(), Tok::Newline) {
                self.skip_newlines();
                if min <= Prec::Newline && self.starts_statement() {
                    self.code.emit(Instruction::Pop);
                    self.parse_oper(Prec::Set)?;
                    continue;
                }
            }
            if !self.parse_operator(min)? {
                self.at = resume;
                return Ok(());
            }
        }
    }

    /// Handles one operator after an operand. Returns `false` if the next
    /// token is not an operator applicable at `min`.
    fn parse_operator(&mut self, min: Prec) -> PResult<bool> {
        let tok = self.peek().clone();
        if let Some((prec, rhs, op, width)) = self.binary_operator(&tok) {
            if min > prec {
                return Ok(false);
            }
            self.at += width;
            self.parse_oper(rhs)?;
            self.code.emit(Instruction::Binary(op));
            return Ok(true);
        }
        match tok {
            Tok::Oper(";") if min <= Prec::Seq => {
                self.at += 1;
                self.skip_newlines();
                if matches!(self.peek(), Tok::Close(_) | Tok::Eof) {
                    return Ok(true);
                }
                self.code.emit(Instruction::Pop);
                self.parse_oper(Prec::Set)?;
            }
            Tok::Oper(":=") if min <= Prec::Set => {
                let Some(var) = self.code.take_last_get_var() else {
                    return Err(self.error("can only assign to variables"));
                };
                self.at += 1;
                self.parse_oper(Prec::Set)?;
                self.code.emit(Instruction::SetVar(var));
            }
            Tok::Oper(".") if min <= Prec::Fun => {
                self.at += 1;
                let name = match self.advance() {
                    Tok::Name(n) | Tok::Str(n) => n,
                    Tok::Int(i) => i.to_string(),
                    Tok::Double(d) => d.to_string(),
                    other => {
                        self.at -= 1;
                        return Err(self.error(format!(
                            "expected a member name but found {}",
                            other.describe()
                        )));
                    }
                };
                self.code.member_const(&name);
            }
            Tok::Open(Bracket::Paren) if min <= Prec::Fun => {
                self.at += 1;
                let names = self.parse_arguments()?;
                let list = self.code.arg_list(names.iter().map(String::as_str));
                self.code.emit(Instruction::Call(list));
            }
            Tok::Oper("@") if min <= Prec::Fun => {
                self.at += 1;
                self.expect("'(' after '@'", |t| *t == Tok::Open(Bracket::Paren))?;
                let names = self.parse_arguments()?;
                let list = self.code.arg_list(names.iter().map(String::as_str));
                self.code.emit(Instruction::Closure(list));
            }
            Tok::Open(Bracket::Square) if min <= Prec::Fun => {
                self.at += 1;
                self.parse_oper(Prec::All)?;
                self.expect_close(Bracket::Square, "']'")?;
                self.code.emit(Instruction::Binary(BinaryOp::Member));
            }
            Tok::Open(Bracket::Smart) if min <= Prec::Str => {
                self.at += 1;
                self.parse_oper(Prec::All)?;
                self.code.emit(Instruction::Binary(BinaryOp::Concat));
                self.expect_close(Bracket::Smart, "'}' closing the string escape")?;
                self.parse_oper(Prec::None)?;
                self.code.emit(Instruction::Binary(BinaryOp::Concat));
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// `(precedence, operand precedence, op, tokens consumed)`.
    fn binary_operator(&self, tok: &Tok) -> Option<(Prec, Prec, BinaryOp, usize)> {
        let entry = match tok {
            Tok::Name(n) => match n.as_str() {
                "or" if self.peek_at(1).is_name("else") => (Prec::OrElse, Prec::And, BinaryOp::OrElse, 2),
                "and" => (Prec::And, Prec::Cmp, BinaryOp::And, 1),
                "or" => (Prec::And, Prec::Cmp, BinaryOp::Or, 1),
                "mod" => (Prec::Mul, Prec::Unary, BinaryOp::Mod, 1),
                _ => return None,
            },
            Tok::Oper(o) => match *o {
                "=" | "==" => (Prec::Cmp, Prec::Add, BinaryOp::Eq, 1),
                "!=" => (Prec::Cmp, Prec::Add, BinaryOp::Neq, 1),
                "<" => (Prec::Cmp, Prec::Add, BinaryOp::Lt, 1),
                ">" => (Prec::Cmp, Prec::Add, BinaryOp::Gt, 1),
                "<=" => (Prec::Cmp, Prec::Add, BinaryOp::Le, 1),
                ">=" => (Prec::Cmp, Prec::Add, BinaryOp::Ge, 1),
                "+" => (Prec::Add, Prec::Mul, BinaryOp::Add, 1),
                "-" => (Prec::Add, Prec::Mul, BinaryOp::Sub, 1),
                "&" => (Prec::Add, Prec::Mul, BinaryOp::Concat, 1),
                "*" => (Prec::Mul, Prec::Unary, BinaryOp::Mul, 1),
                "/" => (Prec::Mul, Prec::Unary, BinaryOp::Div, 1),
                _ => return None,
            },
            _ => return None,
        };
        Some(entry)
    }

    /// Parses `a, name: b, ...)` after an opening parenthesis, emitting the
    /// argument values. Unnamed arguments bind `input`.
    fn parse_arguments(&mut self) -> PResult<Vec<String>> {
        let mut names = Vec::new();
        loop {
            self.skip_newlines();
            if matches!(self.peek(), Tok::Close(Bracket::Paren)) {
                self.at += 1;
                return Ok(names);
            }
            match (self.peek().clone(), self.peek_at(1).is_oper(":")) {
                (Tok::Name(name), true) => {
                    self.at += 2;
                    names.push(name);
                }
                _ => names.push("input".into()),
            }
            self.parse_oper(Prec::Seq)?;
            self.skip_newlines();
            if self.peek().is_oper(",") {
                self.at += 1;
            } else if !matches!(self.peek(), Tok::Close(Bracket::Paren)) {
                return Err(self.error(format!(
                    "expected ',' or ')' but found {}",
                    self.peek().describe()
                )));
            }
        }
    }

    /// Parses one operand.
    fn parse_expr(&mut self, min: Prec) -> PResult {
        self.skip_newlines();
        let tok = self.advance();
        match tok {
            Tok::Open(Bracket::Paren) => {
                self.parse_oper(Prec::All)?;
                self.expect_close(Bracket::Paren, "')'")?;
            }
            Tok::Open(Bracket::Curly) => {
                let outer = mem::replace(&mut self.code, ScriptBuilder::new());
                let body = self.parse_oper(Prec::All);
                let inner = mem::replace(&mut self.code, outer);
                body?;
                self.expect_close(Bracket::Curly, "'}'")?;
                let function = Function::Script(Rc::new(inner.finish()));
                self.code.push_const(function.into());
            }
            Tok::Open(Bracket::Square) => self.parse_list()?,
            Tok::Oper("-") if min <= Prec::Unary => {
                self.parse_oper(Prec::Unary)?;
                self.code.emit(Instruction::Unary(UnaryOp::Negate));
            }
            Tok::Name(name) => self.parse_name(&name, min)?,
            Tok::Int(i) => self.code.push_const(ScriptValue::Int(i)),
            Tok::Double(d) => self.code.push_const(ScriptValue::Double(d)),
            Tok::Str(s) => self.code.push_const(ScriptValue::from(s)),
            other => {
                self.at -= 1;
                return Err(self.error(format!("unexpected {}", other.describe())));
            }
        }
        Ok(())
    }

    fn parse_name(&mut self, name: &str, min: Prec) -> PResult {
        match name {
            "not" if min <= Prec::Unary => {
                self.parse_oper(Prec::Unary)?;
                self.code.emit(Instruction::Unary(UnaryOp::Not));
            }
            "true" => self.code.push_const(ScriptValue::Bool(true)),
            "false" => self.code.push_const(ScriptValue::Bool(false)),
            "nil" => self.code.push_const(ScriptValue::Nil),
            "if" => self.parse_if()?,
            "for" => self.parse_for()?,
            "rgb" if matches!(self.peek(), Tok::Open(Bracket::Paren)) => {
                self.at += 1;
                self.parse_oper(Prec::All)?;
                self.expect("','", |t| t.is_oper(","))?;
                self.parse_oper(Prec::All)?;
                self.expect("','", |t| t.is_oper(","))?;
                self.parse_oper(Prec::All)?;
                self.expect_close(Bracket::Paren, "')'")?;
                self.code.emit(Instruction::Ternary(TernaryOp::Rgb));
            }
            _ => {
                let var = self.code.name(name);
                self.code.emit(Instruction::GetVar(var));
            }
        }
        Ok(())
    }

    // if c then a else b:
    //     c; jnot else; a; jump end; else: b (or nil); end:
    fn parse_if(&mut self) -> PResult {
        self.parse_oper(Prec::Set)?;
        let jump_else = self.code.emit(Instruction::JumpIfNot(0));
        self.expect_name("then")?;
        self.parse_oper(Prec::Set)?;
        let jump_end = self.code.emit(Instruction::Jump(0));
        self.code.patch_here(jump_else);
        let resume = self.at;
        self.skip_newlines();
        if self.peek().is_name("else") {
            self.at += 1;
            self.parse_oper(Prec::Set)?;
        } else {
            self.at = resume;
            self.code.push_const(ScriptValue::Nil);
        }
        self.code.patch_here(jump_end);
        Ok(())
    }

    // for each x in c do body:
    //     c; iterator; push nil; start: loop end; set x; pop; body; add; jump start; end:
    // for x from a to b do body:
    //     a; b; range; push nil; start: ...
    fn parse_for(&mut self) -> PResult {
        let each = self.peek().is_name("each");
        if each {
            self.at += 1;
        }
        let Tok::Name(var) = self.advance() else {
            self.at -= 1;
            return Err(self.error("expected a loop variable name"));
        };
        if each {
            self.expect_name("in")?;
            self.parse_oper(Prec::Set)?;
            self.code.emit(Instruction::Unary(UnaryOp::MakeIterator));
        } else {
            self.expect_name("from")?;
            self.parse_oper(Prec::Set)?;
            self.expect_name("to")?;
            self.parse_oper(Prec::Set)?;
            self.code.emit(Instruction::Binary(BinaryOp::RangeIterator));
        }
        self.code.push_const(ScriptValue::Nil);
        let start = self.code.emit(Instruction::Loop(0));
        self.expect_name("do")?;
        let var = self.code.name(&var);
        self.code.emit(Instruction::SetVar(var));
        self.code.emit(Instruction::Pop);
        self.parse_oper(Prec::Set)?;
        self.code.emit(Instruction::Binary(BinaryOp::Add));
        self.code.emit(Instruction::Jump(start));
        self.code.patch_here(start);
        Ok(())
    }

    // [a, b] or [k: a, l: b]
    fn parse_list(&mut self) -> PResult {
        let mut keys = Vec::new();
        let mut count = 0_u32;
        loop {
            self.skip_newlines();
            if matches!(self.peek(), Tok::Close(Bracket::Square)) {
                self.at += 1;
                break;
            }
            let key = match (self.peek().clone(), self.peek_at(1).is_oper(":")) {
                (Tok::Name(k) | Tok::Str(k), true) => {
                    self.at += 2;
                    Some(k)
                }
                (Tok::Int(i), true) => {
                    self.at += 2;
                    Some(i.to_string())
                }
                _ => None,
            };
            if count > 0 && key.is_some() != !keys.is_empty() {
                return Err(self.error("cannot mix keyed and unkeyed items in a list"));
            }
            keys.extend(key);
            count += 1;
            self.parse_oper(Prec::Seq)?;
            self.skip_newlines();
            if self.peek().is_oper(",") {
                self.at += 1;
            } else if !matches!(self.peek(), Tok::Close(Bracket::Square)) {
                return Err(self.error(format!(
                    "expected ',' or ']' but found {}",
                    self.peek().describe()
                )));
            }
        }
        if keys.is_empty() {
            self.code.emit(Instruction::MakeList(count));
        } else {
            let list = self.code.arg_list(keys.iter().map(String::as_str));
            self.code.emit(Instruction::MakeMap(list));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::error::ScriptError;

    fn run(src: &str) -> ScriptValue {
        let script = Parser::new(src).parse().unwrap();
        Context::new().eval(&script, true).unwrap()
    }

    fn text(src: &str) -> String {
        run(src).to_string_value().unwrap()
    }

    #[test]
    fn precedence() {
        assert_eq!(run("1 + 2 * 3").to_int().unwrap(), 7);
        assert_eq!(run("(1 + 2) * 3").to_int().unwrap(), 9);
        assert_eq!(run("-2 * 3").to_int().unwrap(), -6);
        assert_eq!(run("10 - 2 - 3").to_int().unwrap(), 5);
        assert!(matches!(run("1 < 2 and not 3 < 2"), ScriptValue::Bool(true)));
        assert_eq!(run("7 mod 3").to_int().unwrap(), 1);
    }

    #[test]
    fn sequencing_and_assignment() {
        assert_eq!(run("a := 2; b := a * 5; a + b").to_int().unwrap(), 12);
        assert_eq!(run("a := 2\nb := 3\na + b").to_int().unwrap(), 5);
        assert_eq!(run("x := 1;").to_int().unwrap(), 1);
    }

    #[test]
    fn expressions_continue_across_lines() {
        assert_eq!(run("1 +\n2").to_int().unwrap(), 3);
        assert!(matches!(run("true\nand false"), ScriptValue::Bool(false)));
    }

    #[test]
    fn conditionals() {
        assert_eq!(text("if 1 > 2 then \"a\" else \"b\""), "b");
        assert_eq!(text("if 2 > 1 then \"a\" else \"b\""), "a");
        assert!(run("if false then 1").is_nil());
        assert_eq!(text("x := 5\nif x > 3 then\n  \"big\"\nelse\n  \"small\""), "big");
    }

    #[test]
    fn loops_sum_their_bodies() {
        assert_eq!(run("for i from 1 to 4 do i").to_int().unwrap(), 10);
        assert_eq!(text("for each x in [\"a\", \"b\"] do x & \"-\""), "a-b-");
        assert!(run("for each x in [] do x").is_nil());
    }

    #[test]
    fn smart_strings() {
        assert_eq!(text("n := 3; \"{n} cards, {n * 2} sides\""), "3 cards, 6 sides");
        assert_eq!(text("\"nested {\"in{1}ner\"} ok\""), "nested in1ner ok");
        assert_eq!(text("\"escaped \\{ brace\""), "escaped { brace");
    }

    #[test]
    fn string_mode() {
        let script = Parser::new("a \"quoted\" {1 + 1}").string_mode(true).parse().unwrap();
        let v = Context::new().eval(&script, true).unwrap();
        assert_eq!(v.to_string_value().unwrap(), "a \"quoted\" 2");
    }

    #[test]
    fn functions_and_calls() {
        assert_eq!(run("f := { input * 2 }; f(21)").to_int().unwrap(), 42);
        assert_eq!(run("f := { a - b }; f(a: 5, b: 3)").to_int().unwrap(), 2);
        assert_eq!(run("f := { a - b }; g := f@(b: 1); g(a: 5)").to_int().unwrap(), 4);
        assert_eq!(
            run("f := { a - b }; g := f@(b: 1); g(a: 5, b: 2)").to_int().unwrap(),
            3
        );
        assert_eq!(run("f := { input + 1 }; g := { input * 10 }; (f + g)(1)").to_int().unwrap(), 20);
    }

    #[test]
    fn lists_and_members() {
        assert_eq!(run("[10, 20, 30].1").to_int().unwrap(), 20);
        assert_eq!(run("[10, 20, 30][2]").to_int().unwrap(), 30);
        assert_eq!(run("[a: 1, b: 2].b").to_int().unwrap(), 2);
        assert_eq!(text("\"abc\".2"), "c");
        assert_eq!(text("rgb(255, 0, 0)"), "rgb(255,0,0)");
    }

    #[test]
    fn or_else_catches_missing_members() {
        assert_eq!(run("[1].5 or else 7").to_int().unwrap(), 7);
        assert_eq!(run("[1].0 or else 7").to_int().unwrap(), 1);
    }

    #[test]
    fn comments_are_ignored() {
        assert_eq!(run("1 # one\n+ 2 # two").to_int().unwrap(), 3);
    }

    #[test]
    fn undefined_variables_fail_at_run_time() {
        let script = Parser::new("nope + 1").parse().unwrap();
        assert_eq!(
            Context::new().eval(&script, true).unwrap_err(),
            ScriptError::UndefinedVariable("nope".into())
        );
    }

    #[test]
    fn syntax_errors_report_position() {
        let e = Parser::new("a := (1 +\n 2").filename("test").parse().unwrap_err();
        assert_eq!(e.line, 2);
        assert_eq!(e.filename.as_deref(), Some("test"));
        assert!(e.message.contains("')'"), "{}", e.message);

        assert!(Parser::new("1 := 2").parse().is_err());
        assert!(Parser::new("\"open").parse().is_err());
        assert!(Parser::new("1 $ 2").parse().is_err());
        assert!(Parser::new("if x then").parse().is_err());
        assert!(Parser::new("[a: 1, 2]").parse().is_err());
    }
}
