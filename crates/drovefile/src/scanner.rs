//! Character-level scanner for the drovefile grammar.
//!
//! A single-pass lexer with one-rune push-back. The parser drives it
//! token by token and occasionally drops down to the raw character
//! interface (`read`/`unread`, `read_to_lf`, `scan_until_lf`) for
//! free-text block bodies.

/// A lexical token. Literal-carrying variants own their text so the
/// parser never has to re-read source.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Illegal,
    Eof,
    Ws,
    Lf,

    Ident(String),
    Parameter(String),

    Comment,
    /// Section marker; carries the number of `#` glyphs.
    Section(usize),
    Delimiter,
    BlockStart,
    BlockEnd,
    Colon,
    Comma,
    Assign,

    Str(String),
    /// Integer literal text, sign retained and `_` separators stripped.
    Integer(String),
    Float(String),

    Use,
}

/// Position of the scanner within its input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ReaderPos {
    /// 1-based line of the next character.
    pub line: usize,
    /// Column within the line, counted in characters read.
    pub line_pos: usize,
}

pub(crate) struct Scanner {
    chars: Vec<char>,
    idx: usize,
    line: usize,
    line_pos: usize,
    last_line_pos: usize,
}

impl Scanner {
    pub fn new(src: &str) -> Self {
        Self {
            chars: src.chars().collect(),
            idx: 0,
            line: 1,
            line_pos: 0,
            last_line_pos: 0,
        }
    }

    pub fn pos(&self) -> ReaderPos {
        ReaderPos {
            line: self.line,
            line_pos: self.line_pos,
        }
    }

    pub fn read(&mut self) -> Option<char> {
        let r = self.chars.get(self.idx).copied()?;
        self.idx += 1;
        self.line_pos += 1;
        if r == '\n' {
            self.line += 1;
            self.last_line_pos = self.line_pos - 1;
            self.line_pos = 0;
        }
        Some(r)
    }

    /// Push the last read character back. Only a single level is
    /// tracked for line arithmetic, which is all the parser needs.
    pub fn unread(&mut self) {
        if self.idx == 0 {
            return;
        }
        self.idx -= 1;
        if self.chars[self.idx] == '\n' {
            self.line -= 1;
            self.line_pos = self.last_line_pos;
        } else {
            self.line_pos -= 1;
        }
    }

    pub fn scan(&mut self) -> Token {
        let r = match self.read() {
            None => return Token::Eof,
            Some(r) => r,
        };

        if is_whitespace(r) {
            self.unread();
            return self.scan_whitespace();
        }
        if r.is_ascii_alphabetic() {
            self.unread();
            return self.scan_ident();
        }
        if r.is_ascii_digit() {
            self.unread();
            return self.scan_number(false);
        }

        match r {
            '/' => self.scan_comment(),
            '"' | '\'' => {
                self.unread();
                self.scan_string()
            }
            '-' => self.scan_dash(),
            '#' => self.scan_section(),
            '{' => self.scan_curly_brace(),

            '[' => Token::BlockStart,
            ']' => Token::BlockEnd,
            ':' => Token::Colon,
            ',' => Token::Comma,
            '=' => Token::Assign,
            '\n' => Token::Lf,
            _ => Token::Illegal,
        }
    }

    /// Reads the remainder of the current line and returns it trimmed.
    /// The terminating newline is consumed.
    pub fn read_to_lf(&mut self) -> String {
        let mut buf = String::new();
        while let Some(r) = self.read() {
            if r == '\n' {
                break;
            }
            buf.push(r);
        }
        buf.trim().to_string()
    }

    /// Reads the remainder of the current line untrimmed. The
    /// terminating newline is consumed.
    pub fn scan_until_lf(&mut self) -> String {
        let mut buf = String::new();
        while let Some(r) = self.read() {
            if r == '\n' {
                break;
            }
            buf.push(r);
        }
        buf
    }

    fn skip_to_lf(&mut self) {
        while let Some(r) = self.read() {
            if r == '\n' {
                break;
            }
        }
    }

    fn scan_whitespace(&mut self) -> Token {
        while let Some(r) = self.read() {
            if !is_whitespace(r) {
                self.unread();
                break;
            }
        }
        Token::Ws
    }

    fn scan_comment(&mut self) -> Token {
        match self.read() {
            Some('/') => {
                self.skip_to_lf();
                Token::Comment
            }
            Some(_) => {
                self.unread();
                Token::Illegal
            }
            None => Token::Illegal,
        }
    }

    /// A dash either starts a negative number or a request delimiter.
    fn scan_dash(&mut self) -> Token {
        match self.read() {
            Some(r) if r.is_ascii_digit() => {
                self.unread();
                self.scan_number(true)
            }
            Some('-') => match self.read() {
                Some('-') => {
                    // Extra dashes on the delimiter line carry no meaning.
                    loop {
                        match self.read() {
                            Some('-') => continue,
                            Some(_) => {
                                self.unread();
                                break;
                            }
                            None => break,
                        }
                    }
                    Token::Delimiter
                }
                Some(_) => {
                    self.unread();
                    Token::Illegal
                }
                None => Token::Illegal,
            },
            Some(_) => {
                self.unread();
                Token::Illegal
            }
            None => Token::Illegal,
        }
    }

    fn scan_section(&mut self) -> Token {
        for _ in 0..2 {
            match self.read() {
                Some('#') => {}
                Some(_) => {
                    self.unread();
                    return Token::Illegal;
                }
                None => return Token::Illegal,
            }
        }

        let mut count = 3;
        loop {
            match self.read() {
                Some('#') => count += 1,
                Some(_) => {
                    self.unread();
                    break;
                }
                None => break,
            }
        }

        Token::Section(count)
    }

    fn scan_ident(&mut self) -> Token {
        let mut buf = String::new();
        while let Some(r) = self.read() {
            if r.is_ascii_alphanumeric() || r == '_' || r == '-' {
                buf.push(r);
            } else {
                self.unread();
                break;
            }
        }

        if buf.eq_ignore_ascii_case("use") {
            Token::Use
        } else {
            Token::Ident(buf)
        }
    }

    fn scan_curly_brace(&mut self) -> Token {
        match self.read() {
            Some('{') => self.scan_parameter(),
            Some(_) => {
                self.unread();
                Token::Illegal
            }
            None => Token::Illegal,
        }
    }

    /// Scans the body of a `{{ … }}` parameter. Nested brace pairs
    /// raise the level; `"…"` and backtick strings suppress counting.
    fn scan_parameter(&mut self) -> Token {
        let mut buf = String::new();
        let mut in_str = false;
        let mut str_delim = '\0';
        let mut level = 0usize;

        loop {
            let r = match self.read() {
                None => return Token::Illegal,
                Some(r) => r,
            };

            if !in_str && r == '{' {
                if let Some(next) = self.read() {
                    if next == '{' {
                        level += 1;
                    }
                    self.unread();
                }
            }

            if !in_str && r == '}' {
                match self.read() {
                    Some('}') => {
                        if level == 0 {
                            break;
                        }
                        level -= 1;
                        self.unread();
                    }
                    Some(_) => self.unread(),
                    None => {}
                }
            }

            if r == '"' || r == '`' {
                if in_str {
                    if r == str_delim {
                        in_str = false;
                    }
                } else {
                    in_str = true;
                    str_delim = r;
                }
            }

            buf.push(r);
        }

        Token::Parameter(buf)
    }

    /// Scans a string literal. A leading `"` or `'` wraps the value
    /// until the matching wrapper; a bare string runs until whitespace
    /// or end of line. Unterminated wrapped strings are illegal.
    pub fn scan_string(&mut self) -> Token {
        let mut buf = String::new();
        let mut wrapper: Option<char> = None;
        let mut in_string = false;

        loop {
            let r = match self.read() {
                None => {
                    if in_string && wrapper.is_some() {
                        return Token::Illegal;
                    }
                    break;
                }
                Some(r) => r,
            };

            if r == '\n' {
                if in_string && wrapper.is_some() {
                    return Token::Illegal;
                }
                break;
            }

            if in_string {
                if wrapper.is_none() && is_whitespace(r) {
                    break;
                }
                if Some(r) == wrapper {
                    break;
                }
                buf.push(r);
            } else {
                if is_whitespace(r) {
                    continue;
                }
                if r == '"' || r == '\'' {
                    wrapper = Some(r);
                } else {
                    buf.push(r);
                }
                in_string = true;
            }
        }

        Token::Str(buf)
    }

    fn scan_number(&mut self, negative: bool) -> Token {
        let mut buf = String::new();
        let mut float = false;

        while let Some(r) = self.read() {
            if r == '.' {
                float = true;
                buf.push(r);
            } else if r == '_' {
                continue;
            } else if r.is_ascii_digit() {
                buf.push(r);
            } else {
                self.unread();
                break;
            }
        }

        if buf.is_empty() {
            return Token::Illegal;
        }
        if negative {
            buf.insert(0, '-');
        }

        if float {
            Token::Float(buf)
        } else {
            Token::Integer(buf)
        }
    }
}

fn is_whitespace(r: char) -> bool {
    r == ' ' || r == '\t'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_all(src: &str) -> Vec<Token> {
        let mut s = Scanner::new(src);
        let mut out = Vec::new();
        loop {
            let tok = s.scan();
            let eof = tok == Token::Eof;
            out.push(tok);
            if eof {
                return out;
            }
        }
    }

    #[test]
    fn request_line() {
        let toks = scan_all("GET https://example.com\n");
        assert_eq!(
            toks,
            vec![
                Token::Ident("GET".into()),
                Token::Ws,
                Token::Str("https://example.com".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn numbers() {
        assert_eq!(scan_all("1_000")[0], Token::Integer("1000".into()));
        assert_eq!(scan_all("-12.34")[0], Token::Float("-12.34".into()));
        assert_eq!(scan_all("42")[0], Token::Integer("42".into()));
        assert_eq!(scan_all("-7")[0], Token::Integer("-7".into()));
    }

    #[test]
    fn lone_dash_is_illegal() {
        assert_eq!(scan_all("- ")[0], Token::Illegal);
        assert_eq!(scan_all("--x")[0], Token::Illegal);
    }

    #[test]
    fn delimiter_consumes_extra_dashes() {
        let toks = scan_all("--------\nGET");
        assert_eq!(
            toks,
            vec![
                Token::Delimiter,
                Token::Lf,
                Token::Ident("GET".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn strings() {
        assert_eq!(
            scan_all("\"hello world\"")[0],
            Token::Str("hello world".into())
        );
        assert_eq!(scan_all("'a b'")[0], Token::Str("a b".into()));
        // Unterminated wrapped string.
        assert_eq!(scan_all("\"open\n")[0], Token::Illegal);
    }

    #[test]
    fn comment_runs_to_line_end() {
        let toks = scan_all("// a comment\nGET");
        assert_eq!(
            toks,
            vec![Token::Comment, Token::Ident("GET".into()), Token::Eof]
        );
    }

    #[test]
    fn section_counts_hashes() {
        assert_eq!(scan_all("### tests")[0], Token::Section(3));
        assert_eq!(scan_all("##### banner")[0], Token::Section(5));
        assert_eq!(scan_all("##")[0], Token::Illegal);
    }

    #[test]
    fn use_keyword_is_case_insensitive() {
        assert_eq!(scan_all("use")[0], Token::Use);
        assert_eq!(scan_all("USE")[0], Token::Use);
        assert_eq!(scan_all("user")[0], Token::Ident("user".into()));
    }

    #[test]
    fn ident_allows_dash_and_underscore() {
        assert_eq!(scan_all("multiple-1")[0], Token::Ident("multiple-1".into()));
        assert_eq!(scan_all("a_b")[0], Token::Ident("a_b".into()));
    }

    #[test]
    fn parameter_balances_braces() {
        assert_eq!(
            scan_all("{{ .name }}")[0],
            Token::Parameter(" .name ".into())
        );
        assert_eq!(
            scan_all("{{ a {{ b }} c }}")[0],
            Token::Parameter(" a {{ b }} c ".into())
        );
    }

    #[test]
    fn parameter_ignores_braces_in_strings() {
        assert_eq!(
            scan_all("{{ \"}}\" }}")[0],
            Token::Parameter(" \"}}\" ".into())
        );
        assert_eq!(scan_all("{{ `}}` }}")[0], Token::Parameter(" `}}` ".into()));
    }

    #[test]
    fn unterminated_parameter_is_illegal() {
        assert_eq!(scan_all("{{ .open")[0], Token::Illegal);
    }

    #[test]
    fn position_tracking() {
        let mut s = Scanner::new("ab\ncd");
        assert_eq!(s.pos().line, 1);
        s.read();
        s.read();
        s.read(); // newline
        assert_eq!(s.pos().line, 2);
        assert_eq!(s.pos().line_pos, 0);
        s.unread();
        assert_eq!(s.pos().line, 1);
    }
}
