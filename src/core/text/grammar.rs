//! Purpose: The extended-JSON token grammar of the text format: tree, writer, and parser.
//! Exports: `Node`, `NonFinite`, `parse`, `write_node`, `to_json`.
//! Role: Replaces a generic JSON parser at the text boundary; number lexemes are kept verbatim
//!       so integer and float columns parse them with their own exact width.
//! Invariants: Output is standard JSON except the bare markers `NaN`, `Infinity`, `-Infinity`.
//! Invariants: String escaping and unescaping go through serde_json, never hand-rolled.
//! Invariants: Nesting is bounded; every parse error carries its byte offset.
use std::io::Write;

use crate::core::error::{Error, ErrorKind};
use crate::core::format::MAX_NESTING_DEPTH;

/// Schema fragments nest up to three JSON levels per type level.
const MAX_DOCUMENT_DEPTH: usize = 4 * MAX_NESTING_DEPTH;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum NonFinite {
    NaN,
    Infinity,
    NegInfinity,
}

impl NonFinite {
    fn marker(self) -> &'static str {
        match self {
            NonFinite::NaN => "NaN",
            NonFinite::Infinity => "Infinity",
            NonFinite::NegInfinity => "-Infinity",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Node {
    Null,
    Bool(bool),
    /// A JSON number, exactly as written.
    Number(String),
    NonFinite(NonFinite),
    Str(String),
    List(Vec<Node>),
    /// Members in document order; duplicate keys are rejected by the parser.
    Object(Vec<(String, Node)>),
}

impl Node {
    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            Node::Null => "null",
            Node::Bool(_) => "boolean",
            Node::Number(_) => "number",
            Node::NonFinite(_) => "float marker",
            Node::Str(_) => "string",
            Node::List(_) => "list",
            Node::Object(_) => "object",
        }
    }
}

pub(crate) fn write_node(out: &mut Vec<u8>, node: &Node) -> Result<(), Error> {
    match node {
        Node::Null => out.extend_from_slice(b"null"),
        Node::Bool(true) => out.extend_from_slice(b"true"),
        Node::Bool(false) => out.extend_from_slice(b"false"),
        Node::Number(lexeme) => out.extend_from_slice(lexeme.as_bytes()),
        Node::NonFinite(marker) => out.extend_from_slice(marker.marker().as_bytes()),
        Node::Str(text) => write_str(out, text)?,
        Node::List(items) => {
            out.push(b'[');
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    out.push(b',');
                }
                write_node(out, item)?;
            }
            out.push(b']');
        }
        Node::Object(members) => {
            out.push(b'{');
            for (idx, (key, value)) in members.iter().enumerate() {
                if idx > 0 {
                    out.push(b',');
                }
                write_str(out, key)?;
                out.push(b':');
                write_node(out, value)?;
            }
            out.push(b'}');
        }
    }
    Ok(())
}

pub(crate) fn write_str(out: &mut Vec<u8>, text: &str) -> Result<(), Error> {
    serde_json::to_writer(&mut *out, text).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("string escaping failed")
            .with_source(err)
    })
}

pub(crate) fn write_raw(out: &mut Vec<u8>, text: &str) -> Result<(), Error> {
    out.write_all(text.as_bytes()).map_err(Error::from)
}

/// Converts a parsed subtree into standard JSON for serde-driven decoding.
pub(crate) fn to_json(node: &Node) -> Result<serde_json::Value, Error> {
    Ok(match node {
        Node::Null => serde_json::Value::Null,
        Node::Bool(value) => serde_json::Value::Bool(*value),
        Node::Number(lexeme) => serde_json::Value::Number(
            lexeme
                .parse::<serde_json::Number>()
                .map_err(|err| Error::malformed(format!("invalid number {lexeme}")).with_source(err))?,
        ),
        Node::NonFinite(marker) => {
            return Err(Error::malformed(format!(
                "float marker {} is not allowed here",
                marker.marker()
            )));
        }
        Node::Str(text) => serde_json::Value::String(text.clone()),
        Node::List(items) => serde_json::Value::Array(
            items.iter().map(to_json).collect::<Result<Vec<_>, _>>()?,
        ),
        Node::Object(members) => {
            let mut map = serde_json::Map::with_capacity(members.len());
            for (key, value) in members {
                map.insert(key.clone(), to_json(value)?);
            }
            serde_json::Value::Object(map)
        }
    })
}

/// Parses one complete document; anything but whitespace after it is an error.
pub(crate) fn parse(input: &[u8]) -> Result<Node, Error> {
    let mut parser = Parser { input, pos: 0 };
    let node = parser.value(0)?;
    parser.skip_ws();
    if parser.pos != input.len() {
        return Err(parser.error("unexpected content after document"));
    }
    Ok(node)
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl Parser<'_> {
    fn error(&self, message: impl Into<String>) -> Error {
        Error::malformed(message).with_offset(self.pos as u64)
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.pos += 1;
        }
    }

    fn keyword(&mut self, word: &str) -> Result<(), Error> {
        if self.input[self.pos..].starts_with(word.as_bytes()) {
            self.pos += word.len();
            Ok(())
        } else {
            Err(self.error("invalid literal"))
        }
    }

    fn value(&mut self, depth: usize) -> Result<Node, Error> {
        if depth > MAX_DOCUMENT_DEPTH {
            return Err(self.error(format!("nesting exceeds {MAX_DOCUMENT_DEPTH} levels")));
        }
        self.skip_ws();
        match self.peek() {
            None => Err(self.error("unexpected end of input")),
            Some(b'n') => self.keyword("null").map(|()| Node::Null),
            Some(b't') => self.keyword("true").map(|()| Node::Bool(true)),
            Some(b'f') => self.keyword("false").map(|()| Node::Bool(false)),
            Some(b'N') => self.keyword("NaN").map(|()| Node::NonFinite(NonFinite::NaN)),
            Some(b'I') => self
                .keyword("Infinity")
                .map(|()| Node::NonFinite(NonFinite::Infinity)),
            Some(b'-') if self.input.get(self.pos + 1) == Some(&b'I') => self
                .keyword("-Infinity")
                .map(|()| Node::NonFinite(NonFinite::NegInfinity)),
            Some(b'-' | b'0'..=b'9') => self.number(),
            Some(b'"') => self.string().map(Node::Str),
            Some(b'[') => self.list(depth),
            Some(b'{') => self.object(depth),
            Some(other) => Err(self.error(format!(
                "unexpected character {:?}",
                char::from(other)
            ))),
        }
    }

    fn digits(&mut self) -> usize {
        let start = self.pos;
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        self.pos - start
    }

    fn number(&mut self) -> Result<Node, Error> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        match self.peek() {
            Some(b'0') => self.pos += 1,
            Some(b'1'..=b'9') => {
                self.digits();
            }
            _ => return Err(self.error("invalid number")),
        }
        if self.peek() == Some(b'.') {
            self.pos += 1;
            if self.digits() == 0 {
                return Err(self.error("invalid number: missing fraction digits"));
            }
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            self.pos += 1;
            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.pos += 1;
            }
            if self.digits() == 0 {
                return Err(self.error("invalid number: missing exponent digits"));
            }
        }
        let lexeme = std::str::from_utf8(&self.input[start..self.pos])
            .map_err(|err| self.error("invalid number").with_source(err))?;
        Ok(Node::Number(lexeme.to_string()))
    }

    fn string(&mut self) -> Result<String, Error> {
        let start = self.pos;
        self.pos += 1;
        loop {
            match self.peek() {
                None => {
                    return Err(Error::malformed("unterminated string").with_offset(start as u64));
                }
                Some(b'\\') => self.pos += 2,
                Some(b'"') => {
                    self.pos += 1;
                    break;
                }
                Some(_) => self.pos += 1,
            }
        }
        let raw = self
            .input
            .get(start..self.pos)
            .ok_or_else(|| Error::malformed("unterminated string").with_offset(start as u64))?;
        serde_json::from_slice::<String>(raw).map_err(|err| {
            Error::malformed("invalid string literal")
                .with_offset(start as u64)
                .with_source(err)
        })
    }

    fn list(&mut self, depth: usize) -> Result<Node, Error> {
        self.pos += 1;
        let mut items = Vec::new();
        self.skip_ws();
        if self.peek() == Some(b']') {
            self.pos += 1;
            return Ok(Node::List(items));
        }
        loop {
            items.push(self.value(depth + 1)?);
            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b']') => {
                    self.pos += 1;
                    return Ok(Node::List(items));
                }
                _ => return Err(self.error("expected ',' or ']'")),
            }
        }
    }

    fn object(&mut self, depth: usize) -> Result<Node, Error> {
        self.pos += 1;
        let mut members: Vec<(String, Node)> = Vec::new();
        self.skip_ws();
        if self.peek() == Some(b'}') {
            self.pos += 1;
            return Ok(Node::Object(members));
        }
        loop {
            self.skip_ws();
            if self.peek() != Some(b'"') {
                return Err(self.error("expected object key"));
            }
            let key_at = self.pos;
            let key = self.string()?;
            if members.iter().any(|(existing, _)| *existing == key) {
                return Err(Error::malformed(format!("duplicate key {key:?}"))
                    .with_offset(key_at as u64));
            }
            self.skip_ws();
            if self.peek() != Some(b':') {
                return Err(self.error("expected ':'"));
            }
            self.pos += 1;
            let value = self.value(depth + 1)?;
            members.push((key, value));
            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'}') => {
                    self.pos += 1;
                    return Ok(Node::Object(members));
                }
                _ => return Err(self.error("expected ',' or '}'")),
            }
        }
    }
}
