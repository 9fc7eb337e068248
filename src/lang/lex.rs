use super::token::{Op, Token, Word};

/// On-demand tokenizer over a source buffer.
///
/// No token array is materialized: the evaluator pulls one token at a
/// time and re-scans regions (loop bodies, callback sources) by saving
/// and restoring the whole lexer, which is `Copy` for that reason.
#[derive(Debug, Clone, Copy)]
pub struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    line: u32,
    tok: Token,
    prev: Token,
    tok_start: usize,
    tok_end: usize,
    tok_text: &'a str,
    tok_num: f32,
}

impl<'a> Lexer<'a> {
    /// The current token is `Unknown` until the first `advance`.
    pub fn new(src: &'a str) -> Lexer<'a> {
        Lexer {
            src,
            pos: 0,
            line: 1,
            tok: Token::Unknown,
            prev: Token::Unknown,
            tok_start: 0,
            tok_end: 0,
            tok_text: "",
            tok_num: 0.0,
        }
    }

    pub fn tok(&self) -> Token {
        self.tok
    }

    /// The token before the current one. Prefix increment and decrement
    /// detection needs it when the identifier is already being parsed.
    pub fn prev(&self) -> Token {
        self.prev
    }

    /// Source text of the current token. For string literals this is the
    /// span between the quotes, escapes still raw.
    pub fn text(&self) -> &'a str {
        self.tok_text
    }

    pub fn num(&self) -> f32 {
        self.tok_num
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    /// Byte offset of the current token's first character.
    pub fn tok_start(&self) -> usize {
        self.tok_start
    }

    /// Byte offset just past the current token.
    pub fn tok_end(&self) -> usize {
        self.tok_end
    }

    /// The whole source buffer. Function values are stored as source
    /// spans, sliced out of this.
    pub fn src(&self) -> &'a str {
        self.src
    }

    /// Advance to the next token and return it.
    pub fn advance(&mut self) -> Token {
        self.skip_spaces_and_comments();
        self.prev = self.tok;
        self.tok_start = self.pos;
        self.tok_num = 0.0;
        let tok = self.scan();
        self.tok = tok;
        self.tok_end = self.pos;
        match tok {
            // the string scanner strips the quotes itself
            Token::StrLit => {}
            _ => self.tok_text = &self.src[self.tok_start..self.tok_end],
        }
        tok
    }

    fn skip_spaces_and_comments(&mut self) {
        let b = self.src.as_bytes();
        loop {
            while self.pos < b.len() && b[self.pos].is_ascii_whitespace() {
                if b[self.pos] == b'\n' {
                    self.line += 1;
                }
                self.pos += 1;
            }
            if self.pos + 1 < b.len() && b[self.pos] == b'/' && b[self.pos + 1] == b'/' {
                while self.pos < b.len() && b[self.pos] != b'\n' {
                    self.pos += 1;
                }
                continue;
            }
            if self.pos + 1 < b.len() && b[self.pos] == b'/' && b[self.pos + 1] == b'*' {
                self.pos += 2;
                while self.pos < b.len() {
                    if b[self.pos] == b'\n' {
                        self.line += 1;
                    }
                    if self.pos + 1 < b.len() && b[self.pos] == b'*' && b[self.pos + 1] == b'/' {
                        self.pos += 2;
                        break;
                    }
                    self.pos += 1;
                }
                continue;
            }
            break;
        }
    }

    fn scan(&mut self) -> Token {
        let b = self.src.as_bytes();
        if self.pos >= b.len() {
            return Token::Eof;
        }
        let c = b[self.pos];
        if c.is_ascii_digit() {
            return self.scan_num();
        }
        if c == b'\'' || c == b'"' {
            return self.scan_str(c);
        }
        if c == b'_' || c.is_ascii_alphabetic() {
            return self.scan_ident();
        }
        match c {
            b'(' => self.one(Token::LParen),
            b')' => self.one(Token::RParen),
            b'{' => self.one(Token::LBrace),
            b'}' => self.one(Token::RBrace),
            b'[' => self.one(Token::LBracket),
            b']' => self.one(Token::RBracket),
            b',' => self.one(Token::Comma),
            b'.' => self.one(Token::Dot),
            b':' => self.one(Token::Colon),
            b';' => self.one(Token::Semicolon),
            b'?' => self.one(Token::Question),
            _ => self.scan_op(),
        }
    }

    fn one(&mut self, tok: Token) -> Token {
        self.pos += 1;
        tok
    }

    fn scan_num(&mut self) -> Token {
        let b = self.src.as_bytes();
        let start = self.pos;
        if b[self.pos] == b'0'
            && self.pos + 2 < b.len()
            && (b[self.pos + 1] == b'x' || b[self.pos + 1] == b'X')
            && b[self.pos + 2].is_ascii_hexdigit()
        {
            self.pos += 2;
            while self.pos < b.len() && b[self.pos].is_ascii_hexdigit() {
                self.pos += 1;
            }
            let digits = &self.src[start + 2..self.pos];
            self.tok_num = u64::from_str_radix(digits, 16).unwrap_or(u64::MAX) as f32;
            return Token::Num;
        }
        while self.pos < b.len() && b[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        if self.pos + 1 < b.len() && b[self.pos] == b'.' && b[self.pos + 1].is_ascii_digit() {
            self.pos += 1;
            while self.pos < b.len() && b[self.pos].is_ascii_digit() {
                self.pos += 1;
            }
        }
        if self.pos < b.len() && (b[self.pos] == b'e' || b[self.pos] == b'E') {
            let mut exp = self.pos + 1;
            if exp < b.len() && (b[exp] == b'+' || b[exp] == b'-') {
                exp += 1;
            }
            if exp < b.len() && b[exp].is_ascii_digit() {
                self.pos = exp;
                while self.pos < b.len() && b[self.pos].is_ascii_digit() {
                    self.pos += 1;
                }
            }
        }
        match self.src[start..self.pos].parse::<f32>() {
            Ok(n) => {
                self.tok_num = n;
                Token::Num
            }
            Err(_) => Token::Unknown,
        }
    }

    fn scan_str(&mut self, quote: u8) -> Token {
        let b = self.src.as_bytes();
        self.pos += 1;
        let start = self.pos;
        while self.pos < b.len() && b[self.pos] != quote {
            if b[self.pos] == b'\\' && self.pos + 1 < b.len() {
                let e = b[self.pos + 1];
                if e == quote || matches!(e, b'b' | b'f' | b'n' | b'r' | b't' | b'v' | b'\\') {
                    self.pos += 1;
                }
            }
            self.pos += 1;
        }
        if self.pos >= b.len() {
            self.tok_text = &self.src[start - 1..self.pos];
            return Token::Unknown;
        }
        self.tok_text = &self.src[start..self.pos];
        self.pos += 1;
        Token::StrLit
    }

    fn scan_ident(&mut self) -> Token {
        let b = self.src.as_bytes();
        let start = self.pos;
        while self.pos < b.len() && (b[self.pos] == b'_' || b[self.pos].is_ascii_alphanumeric()) {
            self.pos += 1;
        }
        let text = &self.src[start..self.pos];
        self.tok_text = text;
        match Word::from_str(text) {
            Some(w) => Token::Word(w),
            None => Token::Ident,
        }
    }

    /// Longest match first: `>>>=` before `>>>` before `>>=` before `>>`
    /// before `>=` before `>`.
    fn scan_op(&mut self) -> Token {
        let b = self.src.as_bytes();
        let rest = &b[self.pos..];
        let (op, len) = match rest[0] {
            b'>' => {
                if rest.starts_with(b">>>=") {
                    (Op::UshrAssign, 4)
                } else if rest.starts_with(b">>>") {
                    (Op::Ushr, 3)
                } else if rest.starts_with(b">>=") {
                    (Op::ShrAssign, 3)
                } else if rest.starts_with(b">>") {
                    (Op::Shr, 2)
                } else if rest.starts_with(b">=") {
                    (Op::Ge, 2)
                } else {
                    (Op::Gt, 1)
                }
            }
            b'<' => {
                if rest.starts_with(b"<<=") {
                    (Op::ShlAssign, 3)
                } else if rest.starts_with(b"<<") {
                    (Op::Shl, 2)
                } else if rest.starts_with(b"<=") {
                    (Op::Le, 2)
                } else {
                    (Op::Lt, 1)
                }
            }
            b'=' => {
                if rest.starts_with(b"===") {
                    (Op::StrictEq, 3)
                } else if rest.starts_with(b"==") {
                    (Op::Eq, 2)
                } else {
                    (Op::Assign, 1)
                }
            }
            b'!' => {
                if rest.starts_with(b"!==") {
                    (Op::StrictNe, 3)
                } else if rest.starts_with(b"!=") {
                    (Op::Ne, 2)
                } else {
                    (Op::Not, 1)
                }
            }
            b'&' => match rest.get(1) {
                Some(b'&') => (Op::LogAnd, 2),
                Some(b'=') => (Op::AndAssign, 2),
                _ => (Op::And, 1),
            },
            b'|' => match rest.get(1) {
                Some(b'|') => (Op::LogOr, 2),
                Some(b'=') => (Op::OrAssign, 2),
                _ => (Op::Or, 1),
            },
            b'+' => match rest.get(1) {
                Some(b'+') => (Op::Inc, 2),
                Some(b'=') => (Op::AddAssign, 2),
                _ => (Op::Add, 1),
            },
            b'-' => match rest.get(1) {
                Some(b'-') => (Op::Dec, 2),
                Some(b'=') => (Op::SubAssign, 2),
                _ => (Op::Sub, 1),
            },
            b'*' => match rest.get(1) {
                Some(b'=') => (Op::MulAssign, 2),
                _ => (Op::Mul, 1),
            },
            b'/' => match rest.get(1) {
                Some(b'=') => (Op::DivAssign, 2),
                _ => (Op::Div, 1),
            },
            b'%' => match rest.get(1) {
                Some(b'=') => (Op::RemAssign, 2),
                _ => (Op::Rem, 1),
            },
            b'^' => match rest.get(1) {
                Some(b'=') => (Op::XorAssign, 2),
                _ => (Op::Xor, 1),
            },
            b'~' => (Op::BitNot, 1),
            _ => {
                let ch = match self.src[self.pos..].chars().next() {
                    Some(c) => c,
                    None => return Token::Eof,
                };
                self.pos += ch.len_utf8();
                return Token::Unknown;
            }
        };
        self.pos += len;
        Token::Op(op)
    }
}

/// Decode the fixed escape set into `out`. The tokenizer leaves string
/// spans raw so the lexer state stays a plain slice; decoding happens
/// when the literal is materialized.
pub fn unescape(raw: &str, out: &mut Vec<u8>) {
    let b = raw.as_bytes();
    let mut i = 0;
    while i < b.len() {
        if b[i] == b'\\' && i + 1 < b.len() {
            let decoded = match b[i + 1] {
                b'b' => Some(0x08),
                b'f' => Some(0x0c),
                b'n' => Some(b'\n'),
                b'r' => Some(b'\r'),
                b't' => Some(b'\t'),
                b'v' => Some(0x0b),
                b'\\' => Some(b'\\'),
                b'\'' => Some(b'\''),
                b'"' => Some(b'"'),
                _ => None,
            };
            if let Some(d) = decoded {
                out.push(d);
                i += 2;
                continue;
            }
        }
        out.push(b[i]);
        i += 1;
    }
}
