// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! A token-level JavaScript scanner.
//!
//! This is not a parser. It produces enough structure to find `require`
//! calls, export assignments and free identifiers without being fooled by
//! strings, comments, templates or regular expression literals.

use std::fmt;

/// Token categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Identifier or keyword
    Ident,
    /// `'...'` or `"..."`
    String,
    /// Template without substitutions
    Template,
    /// `` `...${ ``
    TemplateHead,
    /// `}...${`
    TemplateMiddle,
    /// `` }...` ``
    TemplateTail,
    /// Numeric literal
    Number,
    /// Regular expression literal
    Regex,
    /// `#name`
    PrivateName,
    /// Operator or bracket
    Punct,
}

/// A token with its source text and byte span
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    /// Category
    pub kind: TokenKind,
    /// Source text
    pub text: &'a str,
    /// Start byte offset
    pub start: usize,
    /// End byte offset (exclusive)
    pub end: usize,
}

impl<'a> Token<'a> {
    /// Whether this is the punctuator `p`
    pub fn is_punct(&self, p: &str) -> bool {
        self.kind == TokenKind::Punct && self.text == p
    }

    /// Whether this is the identifier `name`
    pub fn is_ident(&self, name: &str) -> bool {
        self.kind == TokenKind::Ident && self.text == name
    }

    /// Decoded value of a string or no-substitution template literal
    pub fn string_value(&self) -> Option<String> {
        match self.kind {
            TokenKind::String | TokenKind::Template => {
                Some(unescape(&self.text[1..self.text.len() - 1]))
            }
            _ => None,
        }
    }
}

/// A scanning failure at a byte offset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    /// Byte offset of the offending construct
    pub offset: usize,
    /// Description
    pub message: String,
}

impl LexError {
    fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at offset {}", self.message, self.offset)
    }
}

/// Keywords after which a `/` starts a regular expression
const REGEX_PREFIX_KEYWORDS: &[&str] = &[
    "return", "typeof", "instanceof", "in", "of", "new", "delete", "void", "throw", "case", "do",
    "else", "yield", "await",
];

/// Keywords whose parenthesized head is followed by a statement
const STATEMENT_HEAD_KEYWORDS: &[&str] = &["if", "while", "for", "with"];

/// Keywords followed by a block
const BLOCK_KEYWORDS: &[&str] = &["else", "do", "try", "finally"];

/// Multi-character punctuators, longest first
const PUNCTUATORS: &[&str] = &[
    ">>>=", "...", "===", "!==", "**=", "<<=", ">>=", ">>>", "&&=", "||=", "??=", "=>", "==", "!=",
    "<=", ">=", "&&", "||", "??", "?.", "++", "--", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=",
    "**", "<<", ">>",
];

/// Scanner over JavaScript source text
pub struct Scanner<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    current_pos: usize,
    brace_depth: usize,
    /// Brace depth at each open `${`
    template_stack: Vec<usize>,
    /// Whether each open `(` is an `if`/`while`/`for`/`with` head
    paren_heads: Vec<bool>,
    /// Whether each open `{` is a block rather than an object literal
    brace_blocks: Vec<bool>,
    prev: Option<Token<'a>>,
    regex_allowed: bool,
}

impl<'a> Scanner<'a> {
    /// Create a scanner, skipping a leading hashbang line
    pub fn new(source: &'a str) -> Self {
        let mut scanner = Self {
            source,
            chars: source.char_indices().peekable(),
            current_pos: 0,
            brace_depth: 0,
            template_stack: Vec::new(),
            paren_heads: Vec::new(),
            brace_blocks: Vec::new(),
            prev: None,
            regex_allowed: true,
        };
        let skip = hashbang_len(source);
        while scanner.current_pos < skip {
            if scanner.advance().is_none() {
                break;
            }
        }
        scanner
    }

    /// Next token, or `None` at end of input
    pub fn next_token(&mut self) -> Result<Option<Token<'a>>, LexError> {
        self.skip_whitespace_and_comments()?;

        let start = self.current_pos;
        let Some((_, ch)) = self.advance() else {
            return Ok(None);
        };

        let kind = match ch {
            '"' | '\'' => self.scan_string(ch, start)?,
            '`' => self.scan_template(start)?,
            '}' if self.template_stack.last() == Some(&self.brace_depth) => {
                self.template_stack.pop();
                self.scan_template_continuation(start)?
            }
            '0'..='9' => self.scan_number(),
            '.' if self.peek().is_some_and(|c| c.is_ascii_digit()) => self.scan_number(),
            '/' if self.regex_allowed => self.scan_regex(start)?,
            '#' if self.peek().is_some_and(is_id_start) => {
                self.scan_identifier_rest();
                TokenKind::PrivateName
            }
            _ if is_id_start(ch) || ch == '\\' => {
                self.scan_identifier_rest();
                TokenKind::Ident
            }
            _ => self.scan_punctuator(ch, start),
        };

        let token = Token {
            kind,
            text: &self.source[start..self.current_pos],
            start,
            end: self.current_pos,
        };
        self.regex_allowed = self.regex_may_follow(&token);
        self.prev = Some(token);
        Ok(Some(token))
    }

    fn advance(&mut self) -> Option<(usize, char)> {
        let result = self.chars.next();
        if let Some((pos, ch)) = result {
            self.current_pos = pos + ch.len_utf8();
        }
        result
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, ch)| *ch)
    }

    fn peek_next(&self) -> Option<char> {
        let mut iter = self.chars.clone();
        iter.next();
        iter.next().map(|(_, ch)| ch)
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<(), LexError> {
        loop {
            match self.peek() {
                Some(ch) if ch.is_whitespace() || ch == '\u{feff}' => {
                    self.advance();
                }
                Some('/') => match self.peek_next() {
                    Some('/') => {
                        while let Some(ch) = self.peek() {
                            if ch == '\n' || ch == '\r' {
                                break;
                            }
                            self.advance();
                        }
                    }
                    Some('*') => {
                        let start = self.current_pos;
                        self.advance();
                        self.advance();
                        let mut prev = ' ';
                        loop {
                            let Some((_, ch)) = self.advance() else {
                                return Err(LexError::new(start, "Unterminated comment"));
                            };
                            if prev == '*' && ch == '/' {
                                break;
                            }
                            prev = ch;
                        }
                    }
                    _ => return Ok(()),
                },
                _ => return Ok(()),
            }
        }
    }

    fn scan_string(&mut self, quote: char, start: usize) -> Result<TokenKind, LexError> {
        loop {
            match self.advance() {
                Some((_, '\\')) => {
                    self.advance();
                }
                Some((_, ch)) if ch == quote => return Ok(TokenKind::String),
                Some((_, '\n')) | None => {
                    return Err(LexError::new(start, "Unterminated string constant"));
                }
                Some(_) => {}
            }
        }
    }

    /// Scan template characters up to the closing backtick or a `${`
    fn scan_template_chars(&mut self, start: usize) -> Result<bool, LexError> {
        loop {
            match self.advance() {
                Some((_, '\\')) => {
                    self.advance();
                }
                Some((_, '`')) => return Ok(false),
                Some((_, '$')) if self.peek() == Some('{') => {
                    self.advance();
                    self.template_stack.push(self.brace_depth);
                    return Ok(true);
                }
                Some(_) => {}
                None => return Err(LexError::new(start, "Unterminated template")),
            }
        }
    }

    fn scan_template(&mut self, start: usize) -> Result<TokenKind, LexError> {
        if self.scan_template_chars(start)? {
            Ok(TokenKind::TemplateHead)
        } else {
            Ok(TokenKind::Template)
        }
    }

    fn scan_template_continuation(&mut self, start: usize) -> Result<TokenKind, LexError> {
        if self.scan_template_chars(start)? {
            Ok(TokenKind::TemplateMiddle)
        } else {
            Ok(TokenKind::TemplateTail)
        }
    }

    fn scan_number(&mut self) -> TokenKind {
        let mut prev = ' ';
        while let Some(ch) = self.peek() {
            let exponent_sign = (ch == '+' || ch == '-') && (prev == 'e' || prev == 'E');
            if ch.is_ascii_alphanumeric() || ch == '_' || ch == '.' || exponent_sign {
                prev = ch;
                self.advance();
            } else {
                break;
            }
        }
        TokenKind::Number
    }

    fn scan_regex(&mut self, start: usize) -> Result<TokenKind, LexError> {
        let mut in_class = false;
        loop {
            match self.advance() {
                Some((_, '\\')) => {
                    self.advance();
                }
                Some((_, '[')) => in_class = true,
                Some((_, ']')) => in_class = false,
                Some((_, '/')) if !in_class => break,
                Some((_, '\n')) | None => {
                    return Err(LexError::new(start, "Unterminated regular expression"));
                }
                Some(_) => {}
            }
        }
        self.scan_identifier_rest();
        Ok(TokenKind::Regex)
    }

    fn scan_identifier_rest(&mut self) {
        while let Some(ch) = self.peek() {
            if is_id_continue(ch) || ch == '\\' {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn scan_punctuator(&mut self, ch: char, start: usize) -> TokenKind {
        let rest = &self.source[start..];
        if let Some(p) = PUNCTUATORS.iter().find(|p| rest.starts_with(**p)) {
            // First character is already consumed
            for _ in 1..p.len() {
                self.advance();
            }
            return TokenKind::Punct;
        }
        match ch {
            '{' => self.brace_depth += 1,
            '}' => self.brace_depth = self.brace_depth.saturating_sub(1),
            _ => {}
        }
        TokenKind::Punct
    }

    /// Whether a `/` after `token` starts a regular expression
    ///
    /// A `)` allows one only when it closes a statement head, and a `}` only
    /// when it closes a block.
    fn regex_may_follow(&mut self, token: &Token<'a>) -> bool {
        match token.kind {
            TokenKind::Ident => REGEX_PREFIX_KEYWORDS.contains(&token.text),
            TokenKind::Punct => match token.text {
                "(" => {
                    let head = self
                        .prev
                        .is_some_and(|prev| STATEMENT_HEAD_KEYWORDS.iter().any(|k| prev.is_ident(k)));
                    self.paren_heads.push(head);
                    true
                }
                ")" => self.paren_heads.pop().unwrap_or(false),
                "{" => {
                    let block = self.brace_starts_block();
                    self.brace_blocks.push(block);
                    true
                }
                "}" => self.brace_blocks.pop().unwrap_or(true),
                "]" | "++" | "--" => false,
                _ => true,
            },
            TokenKind::TemplateHead | TokenKind::TemplateMiddle => true,
            _ => false,
        }
    }

    fn brace_starts_block(&self) -> bool {
        let Some(prev) = self.prev else {
            return true;
        };
        match prev.kind {
            TokenKind::Punct => match prev.text {
                ";" | "{" | "}" | ")" | "=>" => true,
                // `case x: {` in a block, `a: {` in an object literal
                ":" => self.brace_blocks.last().copied().unwrap_or(true),
                _ => false,
            },
            TokenKind::Ident => {
                BLOCK_KEYWORDS.contains(&prev.text) || !REGEX_PREFIX_KEYWORDS.contains(&prev.text)
            }
            _ => false,
        }
    }
}

/// Checks if a character can start an identifier.
fn is_id_start(ch: char) -> bool {
    ch == '_' || ch == '$' || unicode_xid::UnicodeXID::is_xid_start(ch)
}

/// Checks if a character can continue an identifier.
fn is_id_continue(ch: char) -> bool {
    ch == '_'
        || ch == '$'
        || ch == '\u{200c}'
        || ch == '\u{200d}'
        || unicode_xid::UnicodeXID::is_xid_continue(ch)
}

/// Whether `name` has identifier syntax
pub fn is_identifier_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(is_id_start) && chars.all(is_id_continue)
}

/// Length in bytes of a leading `#!` line, excluding the line break
pub fn hashbang_len(source: &str) -> usize {
    if !source.starts_with("#!") {
        return 0;
    }
    source.find(['\n', '\r']).unwrap_or(source.len())
}

/// Tokenize a whole source
pub fn tokenize(source: &str) -> Result<Vec<Token<'_>>, LexError> {
    let mut scanner = Scanner::new(source);
    let mut tokens = Vec::new();
    while let Some(token) = scanner.next_token()? {
        tokens.push(token);
    }
    Ok(tokens)
}

/// Verify that brackets are balanced
pub fn check_balance(tokens: &[Token<'_>]) -> Result<(), LexError> {
    let mut stack: Vec<&Token<'_>> = Vec::new();
    for token in tokens {
        match token.kind {
            TokenKind::TemplateHead => stack.push(token),
            TokenKind::TemplateMiddle => match stack.last() {
                Some(open) if open.kind == TokenKind::TemplateHead => {}
                _ => return Err(LexError::new(token.start, "Unexpected token")),
            },
            TokenKind::TemplateTail => match stack.pop() {
                Some(open) if open.kind == TokenKind::TemplateHead => {}
                _ => return Err(LexError::new(token.start, "Unexpected token")),
            },
            TokenKind::Punct => match token.text {
                "(" | "[" | "{" => stack.push(token),
                ")" | "]" | "}" => {
                    let expected = match token.text {
                        ")" => "(",
                        "]" => "[",
                        _ => "{",
                    };
                    match stack.pop() {
                        Some(open) if open.is_punct(expected) => {}
                        _ => return Err(LexError::new(token.start, "Unexpected token")),
                    }
                }
                _ => {}
            },
            _ => {}
        }
    }
    match stack.pop() {
        Some(open) => Err(LexError::new(open.start, "Unexpected token, unclosed bracket")),
        None => Ok(()),
    }
}

/// Source with comments (and a hashbang) blanked out, byte offsets preserved
pub fn strip_comments(source: &str, tokens: &[Token<'_>]) -> String {
    let mut out = String::with_capacity(source.len());
    let mut pos = 0;
    for token in tokens {
        blank(&source[pos..token.start], &mut out);
        out.push_str(token.text);
        pos = token.end;
    }
    blank(&source[pos..], &mut out);
    out
}

fn blank(gap: &str, out: &mut String) {
    for ch in gap.chars() {
        if ch == '\n' || ch == '\r' {
            out.push(ch);
        } else {
            out.extend(std::iter::repeat_n(' ', ch.len_utf8()));
        }
    }
}

/// Decode JavaScript string escapes
pub fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('v') => out.push('\u{b}'),
            Some('0') => out.push('\0'),
            Some('x') => {
                let hex: String = chars.by_ref().take(2).collect();
                if let Some(c) = u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    out.push(c);
                }
            }
            Some('u') => {
                let hex: String = if chars.peek() == Some(&'{') {
                    chars.next();
                    chars.by_ref().take_while(|c| *c != '}').collect()
                } else {
                    chars.by_ref().take(4).collect()
                };
                if let Some(c) = u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    out.push(c);
                }
            }
            Some('\r') => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
            }
            Some('\n') => {}
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<(TokenKind, &str)> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| (t.kind, t.text))
            .collect()
    }

    #[test]
    fn test_regex_vs_division() {
        let tokens = kinds("a = b / c; d = /x\\/y[/]/g.test(e)");
        assert!(tokens.contains(&(TokenKind::Punct, "/")));
        assert!(tokens.contains(&(TokenKind::Regex, "/x\\/y[/]/g")));
    }

    #[test]
    fn test_regex_after_statement_head() {
        let tokens = kinds("var s = \"it's\";\nif (s) /'/.test(s);\nexports.ok = 1;");
        assert!(tokens.contains(&(TokenKind::Regex, "/'/")));

        let tokens = kinds("while (i--) /x/g.exec(s);");
        assert!(tokens.contains(&(TokenKind::Regex, "/x/g")));

        let tokens = kinds("n = (a + b) / 2 / c;");
        assert!(!tokens.iter().any(|(kind, _)| *kind == TokenKind::Regex));
    }

    #[test]
    fn test_regex_after_block() {
        let tokens = kinds("function f () {}\n/'/.test(s);");
        assert!(tokens.contains(&(TokenKind::Regex, "/'/")));

        let tokens = kinds("if (a) { b(); } else {}\n/x/.test(s);");
        assert!(tokens.contains(&(TokenKind::Regex, "/x/")));

        let tokens = kinds("n = { a: { b: 1 } }.a / 2;\nm = ({}) / 2;");
        assert!(!tokens.iter().any(|(kind, _)| *kind == TokenKind::Regex));
    }

    #[test]
    fn test_template_nesting() {
        let tokens = kinds("`a${ {b: `c${d}`}.b }e` + require('x')");
        assert_eq!(tokens[0], (TokenKind::TemplateHead, "`a${"));
        assert!(tokens.contains(&(TokenKind::TemplateTail, "}e`")));
        assert!(tokens.contains(&(TokenKind::String, "'x'")));
    }

    #[test]
    fn test_comments_hide_requires() {
        let source = "// require('a')\n/* require('b') */ require('c')";
        let tokens = tokenize(source).unwrap();
        let strings: Vec<_> = tokens.iter().filter_map(|t| t.string_value()).collect();
        assert_eq!(strings, vec!["c"]);

        let stripped = strip_comments(source, &tokens);
        assert_eq!(stripped.len(), source.len());
        assert!(!stripped.contains("require('a')"));
        assert!(stripped.ends_with("require('c')"));
    }

    #[test]
    fn test_hashbang_is_skipped() {
        let tokens = kinds("#!/usr/bin/env node\nmodule.exports = 1;");
        assert_eq!(tokens[0], (TokenKind::Ident, "module"));
        assert_eq!(hashbang_len("#!/usr/bin/env node\nx"), 19);
    }

    #[test]
    fn test_unterminated_constructs() {
        assert_eq!(tokenize("'abc").unwrap_err().offset, 0);
        assert!(tokenize("x = `abc").is_err());
        assert!(tokenize("/* open").is_err());
    }

    #[test]
    fn test_check_balance() {
        assert!(check_balance(&tokenize("f({ a: [1, 2] })").unwrap()).is_ok());
        let err = check_balance(&tokenize("f({ a: [1, 2 })").unwrap()).unwrap_err();
        assert_eq!(err.offset, 13);
        assert!(check_balance(&tokenize("if (a) {").unwrap()).is_err());
    }

    #[test]
    fn test_string_value_unescapes() {
        let tokens = tokenize(r#""a\nbA\x42""#).unwrap();
        assert_eq!(tokens[0].string_value().unwrap(), "a\nbAB");
    }

    #[test]
    fn test_identifier_names() {
        assert!(is_identifier_name("foo"));
        assert!(is_identifier_name("$_x1"));
        assert!(!is_identifier_name("1x"));
        assert!(!is_identifier_name("a-b"));
        assert!(!is_identifier_name(""));
    }
}
