//! Recursive-descent parser for the drovefile grammar.
//!
//! The parser owns the scanner and keeps exactly one token of
//! look-behind. Block bodies that hold free text (`Body`, `Script`,
//! `PreScript`) bypass the token layer and read characters directly;
//! ending such a body sometimes requires pushing back a token *and* a
//! character, which is why the scanner exposes `unread`.

use crate::content::Content;
use crate::error::{ParseError, ParseErrorKind};
use crate::file::{Action, Drovefile, Phase};
use crate::request::{Entries, Request};
use crate::scanner::{ReaderPos, Scanner, Token};
use crate::value::Value;

pub struct Parser {
    s: Scanner,
    prev_pos: ReaderPos,
    buf: Option<Token>,
}

impl Parser {
    pub fn new(src: &str) -> Self {
        let normalized;
        let src = if src.contains("\r\n") {
            normalized = src.replace("\r\n", "\n");
            &normalized
        } else {
            src
        };
        Self {
            s: Scanner::new(src),
            prev_pos: ReaderPos { line: 1, line_pos: 0 },
            buf: None,
        }
    }

    pub fn parse(mut self) -> Result<Drovefile, ParseError> {
        self.parse_file().map_err(|kind| ParseError {
            kind,
            line: self.prev_pos.line,
            column: self.prev_pos.line_pos + 1,
        })
    }

    fn scan(&mut self) -> Token {
        if let Some(tok) = self.buf.take() {
            return tok;
        }
        self.prev_pos = self.s.pos();
        match self.s.scan() {
            Token::Comment => Token::Lf,
            tok => tok,
        }
    }

    fn unscan(&mut self, tok: Token) {
        self.buf = Some(tok);
    }

    fn scan_skip_ws(&mut self) -> Token {
        match self.scan() {
            Token::Ws => self.scan(),
            tok => tok,
        }
    }

    fn parse_file(&mut self) -> Result<Drovefile, ParseErrorKind> {
        let mut file = Drovefile::default();
        let mut current = Phase::Tests;

        loop {
            let tok = self.scan();
            match tok {
                Token::Ws | Token::Lf => continue,

                Token::Ident(_) | Token::Str(_) => {
                    self.unscan(tok);
                    let req = self.parse_request()?;
                    file.phase_mut(current).push(Action::Request(req));
                }

                Token::Use => self.parse_use(&mut file)?,

                Token::Section(hashes) => {
                    let name = self.s.read_to_lf();
                    match Phase::from_name(&name.to_ascii_lowercase()) {
                        Some(phase) => current = phase,
                        None if hashes >= 5 => {
                            file.phase_mut(current).push(Action::LogSection(name));
                        }
                        None => return Err(ParseErrorKind::InvalidSection),
                    }
                }

                Token::BlockStart => self.parse_defaults(&mut file)?,

                Token::Eof => return Ok(file),

                _ => return Err(ParseErrorKind::IllegalCharacter),
            }
        }
    }

    fn parse_use(&mut self, file: &mut Drovefile) -> Result<(), ParseErrorKind> {
        match self.scan() {
            Token::Ws => {}
            _ => return Err(ParseErrorKind::InvalidStringLiteral),
        }

        match self.s.scan_string() {
            Token::Str(path) if path.is_empty() => Err(ParseErrorKind::EmptyUsePath),
            Token::Str(path) => {
                file.imports.push(path);
                Ok(())
            }
            _ => Err(ParseErrorKind::InvalidStringLiteral),
        }
    }

    fn parse_request(&mut self) -> Result<Request, ParseErrorKind> {
        let mut req = Request::default();

        let method = match self.scan() {
            Token::Ident(s) | Token::Str(s) if !s.is_empty() => s,
            _ => return Err(ParseErrorKind::InvalidRequestMethod),
        };
        req.pos_line = self.prev_pos.line;
        req.method = method;

        match self.scan() {
            Token::Ws | Token::Lf => {}
            _ => return Err(ParseErrorKind::NoRequestURI),
        }

        match self.s.scan_string() {
            Token::Str(uri) if !uri.is_empty() => req.uri = uri,
            _ => return Err(ParseErrorKind::NoRequestURI),
        }

        let mut seen: Vec<&'static str> = Vec::new();

        loop {
            let tok = self.scan();
            match tok {
                Token::BlockStart => self.parse_block(&mut req, &mut seen)?,
                Token::Ws | Token::Lf => continue,
                Token::Eof | Token::Section(_) => {
                    self.unscan(tok);
                    break;
                }
                Token::Delimiter => break,
                _ => return Err(ParseErrorKind::InvalidToken("request")),
            }
        }

        Ok(req)
    }

    /// Parses a top-level `[Defaults]` block: a synthetic request body
    /// whose blocks populate the file-level defaults. Any other block
    /// header outside of a request is an error.
    fn parse_defaults(&mut self, file: &mut Drovefile) -> Result<(), ParseErrorKind> {
        let name = match self.scan_skip_ws() {
            Token::Ident(s) => s,
            _ => return Err(ParseErrorKind::BlockOutOfRequest),
        };
        if !name.eq_ignore_ascii_case("defaults") {
            return Err(ParseErrorKind::BlockOutOfRequest);
        }

        match self.scan() {
            Token::BlockEnd => {}
            _ => return Err(ParseErrorKind::InvalidBlockHeader(name)),
        }
        match self.scan_skip_ws() {
            Token::Lf => {}
            _ => return Err(ParseErrorKind::InvalidToken("block")),
        }

        let mut seen: Vec<&'static str> = Vec::new();

        loop {
            let tok = self.scan();
            match tok {
                Token::Ws | Token::Lf => continue,
                Token::BlockStart => self.parse_block(&mut file.defaults, &mut seen)?,
                Token::Delimiter => break,
                _ => {
                    self.unscan(tok);
                    break;
                }
            }
        }

        Ok(())
    }

    fn parse_block(
        &mut self,
        req: &mut Request,
        seen: &mut Vec<&'static str>,
    ) -> Result<(), ParseErrorKind> {
        let name = match self.scan_skip_ws() {
            Token::Ident(s) if !s.is_empty() => s,
            _ => return Err(ParseErrorKind::InvalidBlockHeader(String::new())),
        };

        match self.scan() {
            Token::BlockEnd => {}
            _ => return Err(ParseErrorKind::InvalidBlockHeader(name)),
        }
        match self.scan_skip_ws() {
            Token::Lf => {}
            _ => return Err(ParseErrorKind::InvalidToken("block")),
        }

        let kind = match name.to_ascii_lowercase().as_str() {
            "queryparams" => "queryparams",
            "header" | "headers" => "header",
            "body" => "body",
            "script" => "script",
            "prescript" => "prescript",
            "options" => "options",
            "auth" => "auth",
            _ => return Err(ParseErrorKind::InvalidBlockHeader(name)),
        };
        if seen.contains(&kind) {
            return Err(ParseErrorKind::SectionDefinedMultiple(name));
        }
        seen.push(kind);

        match kind {
            "queryparams" => req.query_params = self.parse_block_entries()?,
            "header" => self.parse_headers(req)?,
            "body" => req.body = Content::from_raw(self.parse_raw()?),
            "script" => req.script = Content::from_raw(self.parse_raw()?),
            "prescript" => req.pre_script = Content::from_raw(self.parse_raw()?),
            "options" => req.options = self.parse_block_entries()?,
            "auth" => req.auth = self.parse_block_entries()?,
            _ => unreachable!(),
        }

        Ok(())
    }

    fn parse_block_entries(&mut self) -> Result<Entries, ParseErrorKind> {
        let mut entries = Entries::new();

        loop {
            let tok = self.scan_skip_ws();
            match tok {
                Token::Lf => continue,
                Token::Delimiter | Token::Eof | Token::BlockStart | Token::Section(_) => {
                    self.unscan(tok);
                    break;
                }
                Token::Ident(key) => {
                    match self.scan_skip_ws() {
                        Token::Assign => {}
                        _ => return Err(ParseErrorKind::InvalidBlockEntryAssignment),
                    }
                    let value = self.parse_value()?;
                    entries.insert(key, value);
                }
                _ => return Err(ParseErrorKind::InvalidBlockEntryAssignment),
            }
        }

        Ok(entries)
    }

    fn parse_headers(&mut self, req: &mut Request) -> Result<(), ParseErrorKind> {
        loop {
            let tok = self.scan_skip_ws();
            match tok {
                Token::Lf => continue,
                Token::Delimiter | Token::Eof | Token::BlockStart | Token::Section(_) => {
                    self.unscan(tok);
                    break;
                }
                Token::Ident(key) => {
                    match self.scan_skip_ws() {
                        Token::Colon => {}
                        _ => return Err(ParseErrorKind::InvalidHeaderSeparator),
                    }
                    let value = self.s.scan_until_lf().trim().to_string();
                    if value.is_empty() {
                        return Err(ParseErrorKind::NoHeaderValue);
                    }
                    req.add_header(&key, value);
                }
                _ => return Err(ParseErrorKind::InvalidHeaderKey),
            }
        }

        Ok(())
    }

    fn parse_value(&mut self) -> Result<Value, ParseErrorKind> {
        match self.scan_skip_ws() {
            Token::Integer(lit) => lit
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| ParseErrorKind::InvalidLiteral("integer")),
            Token::Float(lit) => lit
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| ParseErrorKind::InvalidLiteral("float")),
            Token::Str(s) => Ok(Value::String(s)),
            Token::Ident(s) => match s.as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(ParseErrorKind::InvalidLiteral("boolean expression expected")),
            },
            Token::BlockStart => self.parse_array(),
            Token::Parameter(text) => Ok(Value::Parameter(text)),
            _ => Err(ParseErrorKind::InvalidToken("value")),
        }
    }

    fn parse_array(&mut self) -> Result<Value, ParseErrorKind> {
        let mut items = Vec::new();

        loop {
            let tok = self.scan_skip_ws();
            match tok {
                Token::BlockEnd => break,
                Token::Comma | Token::Lf => continue,
                Token::Eof => return Err(ParseErrorKind::InvalidToken("array")),
                other => {
                    self.unscan(other);
                    items.push(self.parse_value()?);
                }
            }
        }

        Ok(Value::Array(items))
    }

    /// Reads a free-text block body character by character.
    ///
    /// Three line-initial sequences terminate the body: `---`
    /// (delimiter), `[` (next block) and `###` (section marker). Each
    /// pushes the corresponding token back for the caller; the `[`
    /// case additionally pushes back the character read past it. A
    /// line of three backticks toggles an escape span inside of which
    /// terminators do not apply; `escaped_end` marks how far captured
    /// escape content reaches so a span ending in `---` cannot
    /// retroactively terminate the block.
    fn parse_raw(&mut self) -> Result<String, ParseErrorKind> {
        let mut out = String::new();
        let mut in_escape = false;
        let mut escaped_end = 0usize;

        loop {
            let r = self.s.read();

            if !in_escape {
                if out.len() > 3 && out.len() - 4 >= escaped_end && out.ends_with("\n---") {
                    self.unscan(Token::Delimiter);
                    out.truncate(out.len() - 4);
                    // Swallow the rest of the delimiter's dashes.
                    let mut r = r;
                    while r == Some('-') {
                        r = self.s.read();
                    }
                    if r.is_some() {
                        self.s.unread();
                    }
                    break;
                }
                if out.len() > 1 && out.len() - 2 >= escaped_end && out.ends_with("\n[") {
                    self.unscan(Token::BlockStart);
                    if r.is_some() {
                        self.s.unread();
                    }
                    out.truncate(out.len() - 2);
                    break;
                }
                if out.len() > 3 && out.len() - 4 >= escaped_end && out.ends_with("\n###") {
                    let mut hashes = 3;
                    let mut r = r;
                    while r == Some('#') {
                        hashes += 1;
                        r = self.s.read();
                    }
                    if r.is_some() {
                        self.s.unread();
                    }
                    self.unscan(Token::Section(hashes));
                    out.truncate(out.len() - 4);
                    break;
                }
            }

            let r = match r {
                None => {
                    if in_escape {
                        return Err(ParseErrorKind::OpenEscapeBlock);
                    }
                    break;
                }
                Some(r) => r,
            };

            out.push(r);

            if (out.len() == 4 && out == "```\n")
                || (out.len() > 3 && out.ends_with("\n```"))
            {
                in_escape = !in_escape;
                out.truncate(out.len() - 4);
                if !in_escape {
                    escaped_end = out.len();
                }
            }
        }

        Ok(out)
    }
}
