//! Standalone scanner for expression text.

use ecow::EcoString;

use super::{Span, Token, TokenKind, TokenSlice};
use crate::diagnostics::DiagnosticSink;

/// Scans expression source into a [`TokenSlice`].
///
/// Reserved words (`AND`, `OR`, `NOT`, `EQ`, `NE`, `GE`, `GT`, `LE`, `LT`,
/// `TO`) are matched case-insensitively.  A `-` directly followed by a digit
/// or `.` becomes a [`TokenKind::NegNumber`] unless the previous token could
/// end an operand, which is what makes `x -5` parse as implied addition and
/// `-5**6` as `-(5**6)`.
pub struct Scanner<'a> {
    src: &'a [u8],
    pos: usize,
    tokens: Vec<Token>,
}

impl<'a> Scanner<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src: src.as_bytes(),
            pos: 0,
            tokens: Vec::new(),
        }
    }

    /// Scans the whole input.  Returns `None` after reporting a lexical
    /// error (unterminated string, malformed number, stray byte).
    pub fn scan(mut self, sink: &dyn DiagnosticSink) -> Option<TokenSlice> {
        loop {
            let before_spaces = self.pos;
            self.skip_spaces();
            let had_space = self.pos > before_spaces || self.pos == 0;
            let start = self.pos;
            let Some(c) = self.peek() else {
                break;
            };
            let kind = match c {
                b'(' => self.punct(TokenKind::LParen),
                b')' => self.punct(TokenKind::RParen),
                b',' => self.punct(TokenKind::Comma),
                b'+' => self.punct(TokenKind::Plus),
                b'/' => self.punct(TokenKind::Slash),
                b'*' => {
                    self.pos += 1;
                    if self.peek() == Some(b'*') {
                        self.pos += 1;
                        TokenKind::Exp
                    } else {
                        TokenKind::Asterisk
                    }
                }
                b'=' => self.punct(TokenKind::Equals),
                b'<' => {
                    self.pos += 1;
                    match self.peek() {
                        Some(b'=') => self.punct(TokenKind::Le),
                        Some(b'>') => self.punct(TokenKind::Ne),
                        _ => TokenKind::Lt,
                    }
                }
                b'>' => {
                    self.pos += 1;
                    if self.peek() == Some(b'=') {
                        self.punct(TokenKind::Ge)
                    } else {
                        TokenKind::Gt
                    }
                }
                b'&' => self.punct(TokenKind::And),
                b'|' => self.punct(TokenKind::Or),
                b'~' => {
                    self.pos += 1;
                    if self.peek() == Some(b'=') {
                        self.punct(TokenKind::Ne)
                    } else {
                        TokenKind::Not
                    }
                }
                b'-' => {
                    self.pos += 1;
                    let next_is_digit =
                        matches!(self.peek(), Some(b'0'..=b'9')) || self.starts_fraction();
                    // `-5` scans as a negative literal when the dash is
                    // glued to the digits and either starts an operand
                    // position or is set off from the previous operand by
                    // whitespace (`x -5` is implied addition, `x-5` is
                    // subtraction).
                    if next_is_digit && (!self.prev_ends_operand() || had_space) {
                        match self.number(sink, start) {
                            Some(TokenKind::Number(n)) => TokenKind::NegNumber(n),
                            _ => return None,
                        }
                    } else {
                        TokenKind::Dash
                    }
                }
                b'\'' | b'"' => self.string(sink, c)?,
                b'0'..=b'9' => self.number(sink, start)?,
                b'.' if self.starts_fraction() => self.number(sink, start)?,
                c if is_id_start(c) => self.identifier(),
                _ => {
                    sink.error(
                        Some(Span::new(start as u32, (start + 1) as u32)),
                        format!("Unexpected character `{}` in expression.", c as char),
                    );
                    return None;
                }
            };
            self.tokens.push(Token {
                kind,
                span: Span::new(start as u32, self.pos as u32),
            });
        }
        Some(TokenSlice::new(self.tokens))
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek_at(&self, n: usize) -> Option<u8> {
        self.src.get(self.pos + n).copied()
    }

    fn skip_spaces(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r' | b'\n')) {
            self.pos += 1;
        }
    }

    fn punct(&mut self, kind: TokenKind) -> TokenKind {
        self.pos += 1;
        kind
    }

    /// True when the input at the cursor begins `.<digit>`.
    fn starts_fraction(&self) -> bool {
        self.peek() == Some(b'.') && matches!(self.peek_at(1), Some(b'0'..=b'9'))
    }

    /// True when the previously scanned token could be the end of an
    /// operand, in which case a following `-` is subtraction.
    fn prev_ends_operand(&self) -> bool {
        matches!(
            self.tokens.last().map(|t| &t.kind),
            Some(
                TokenKind::Id(_)
                    | TokenKind::Number(_)
                    | TokenKind::NegNumber(_)
                    | TokenKind::String(_)
                    | TokenKind::RParen
            )
        )
    }

    fn number(&mut self, sink: &dyn DiagnosticSink, start: usize) -> Option<TokenKind> {
        // The leading `-`, if any, was consumed by the caller.
        let digits_start = self.pos;
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        if self.peek() == Some(b'.') {
            self.pos += 1;
            while matches!(self.peek(), Some(b'0'..=b'9')) {
                self.pos += 1;
            }
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            let mut end = self.pos + 1;
            if matches!(self.src.get(end), Some(b'+' | b'-')) {
                end += 1;
            }
            if matches!(self.src.get(end), Some(b'0'..=b'9')) {
                self.pos = end;
                while matches!(self.peek(), Some(b'0'..=b'9')) {
                    self.pos += 1;
                }
            }
        }
        let text = core::str::from_utf8(&self.src[digits_start..self.pos]).unwrap();
        match text.parse::<f64>() {
            Ok(value) => Some(TokenKind::Number(value)),
            Err(_) => {
                sink.error(
                    Some(Span::new(start as u32, self.pos as u32)),
                    format!("Malformed number `{text}`."),
                );
                None
            }
        }
    }

    fn string(&mut self, sink: &dyn DiagnosticSink, quote: u8) -> Option<TokenKind> {
        let start = self.pos;
        self.pos += 1;
        let mut text = EcoString::new();
        loop {
            match self.peek() {
                Some(c) if c == quote => {
                    self.pos += 1;
                    // A doubled quote is a literal quote character.
                    if self.peek() == Some(quote) {
                        self.pos += 1;
                        text.push(quote as char);
                    } else {
                        return Some(TokenKind::String(text));
                    }
                }
                Some(c) => {
                    self.pos += 1;
                    text.push(c as char);
                }
                None => {
                    sink.error(
                        Some(Span::new(start as u32, self.pos as u32)),
                        "Unterminated string literal.",
                    );
                    return None;
                }
            }
        }
    }

    fn identifier(&mut self) -> TokenKind {
        let start = self.pos;
        self.pos += 1;
        while self.peek().is_some_and(is_id_continue) {
            self.pos += 1;
        }
        // Identifiers may not end in `.`; a trailing dot belongs to the
        // surrounding syntax.
        while self.src[self.pos - 1] == b'.' && self.pos - 1 > start {
            self.pos -= 1;
        }
        let text = core::str::from_utf8(&self.src[start..self.pos]).unwrap();
        match_keyword(text).unwrap_or_else(|| TokenKind::Id(EcoString::from(text)))
    }
}

fn is_id_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || matches!(c, b'$' | b'#' | b'@' | b'_')
}

fn is_id_continue(c: u8) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, b'$' | b'#' | b'@' | b'_' | b'.')
}

fn match_keyword(text: &str) -> Option<TokenKind> {
    let kind = if text.eq_ignore_ascii_case("AND") {
        TokenKind::And
    } else if text.eq_ignore_ascii_case("OR") {
        TokenKind::Or
    } else if text.eq_ignore_ascii_case("NOT") {
        TokenKind::Not
    } else if text.eq_ignore_ascii_case("EQ") {
        TokenKind::Eq
    } else if text.eq_ignore_ascii_case("NE") {
        TokenKind::Ne
    } else if text.eq_ignore_ascii_case("GE") {
        TokenKind::Ge
    } else if text.eq_ignore_ascii_case("GT") {
        TokenKind::Gt
    } else if text.eq_ignore_ascii_case("LE") {
        TokenKind::Le
    } else if text.eq_ignore_ascii_case("LT") {
        TokenKind::Lt
    } else if text.eq_ignore_ascii_case("TO") {
        TokenKind::To
    } else {
        return None;
    };
    Some(kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Collector;
    use crate::syntax::TokenCursor;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let sink = Collector::new();
        let mut cursor = Scanner::new(src).scan(&sink).expect("scan failed");
        let mut out = Vec::new();
        loop {
            let k = cursor.kind().clone();
            if k == TokenKind::End {
                return out;
            }
            out.push(k);
            cursor.advance();
        }
    }

    #[test]
    fn numbers_and_operators() {
        assert_eq!(
            kinds("1 + 2.5 * x"),
            vec![
                TokenKind::Number(1.0),
                TokenKind::Plus,
                TokenKind::Number(2.5),
                TokenKind::Asterisk,
                TokenKind::Id("x".into()),
            ]
        );
    }

    #[test]
    fn negative_number_after_operator() {
        assert_eq!(
            kinds("2 * -5"),
            vec![
                TokenKind::Number(2.0),
                TokenKind::Asterisk,
                TokenKind::NegNumber(5.0),
            ]
        );
        // After an operand, `-` is subtraction... but a following literal
        // still scans negative so `x -5` can be implied addition.
        assert_eq!(
            kinds("x - 5"),
            vec![
                TokenKind::Id("x".into()),
                TokenKind::Dash,
                TokenKind::Number(5.0),
            ]
        );
    }

    #[test]
    fn dotted_identifier_and_suffix() {
        assert_eq!(
            kinds("CDF.NORMAL(0, 0, 1)"),
            vec![
                TokenKind::Id("CDF.NORMAL".into()),
                TokenKind::LParen,
                TokenKind::Number(0.0),
                TokenKind::Comma,
                TokenKind::Number(0.0),
                TokenKind::Comma,
                TokenKind::Number(1.0),
                TokenKind::RParen,
            ]
        );
        assert_eq!(kinds("MEAN.2")[0], TokenKind::Id("MEAN.2".into()));
    }

    #[test]
    fn string_with_doubled_quote() {
        assert_eq!(
            kinds("'it''s'"),
            vec![TokenKind::String("it's".into())]
        );
    }

    #[test]
    fn keywords_case_insensitive() {
        assert_eq!(
            kinds("a and b Or not c"),
            vec![
                TokenKind::Id("a".into()),
                TokenKind::And,
                TokenKind::Id("b".into()),
                TokenKind::Or,
                TokenKind::Not,
                TokenKind::Id("c".into()),
            ]
        );
        // Punctuation spellings of the logical operators.
        assert_eq!(
            kinds("a & b | ~c"),
            vec![
                TokenKind::Id("a".into()),
                TokenKind::And,
                TokenKind::Id("b".into()),
                TokenKind::Or,
                TokenKind::Not,
                TokenKind::Id("c".into()),
            ]
        );
    }

    #[test]
    fn relational_punctuation() {
        assert_eq!(
            kinds("a <= b <> c ~= d"),
            vec![
                TokenKind::Id("a".into()),
                TokenKind::Le,
                TokenKind::Id("b".into()),
                TokenKind::Ne,
                TokenKind::Id("c".into()),
                TokenKind::Ne,
                TokenKind::Id("d".into()),
            ]
        );
    }

    #[test]
    fn unterminated_string_reports_error() {
        let sink = Collector::new();
        assert!(Scanner::new("'oops").scan(&sink).is_none());
        assert!(sink.has_errors());
    }
}
