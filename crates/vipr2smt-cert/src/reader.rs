//! Forward-only token stream over a VIPR certificate file.
//!
//! Tokens are whitespace-separated runs of bytes in the current line
//! buffer; the buffer is reused across lines so tokenization never
//! allocates. A returned token is only valid until the next reader call;
//! callers that keep a token intern it into the [`crate::StringArena`].

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::errors::ParseError;

pub struct TokenReader<R> {
    input: R,
    line_buf: String,
    cursor: usize,
    line_number: u64,
}

impl TokenReader<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self, ParseError> {
        let file = File::open(path)?;
        Ok(TokenReader::new(BufReader::new(file)))
    }
}

impl<R: BufRead> TokenReader<R> {
    pub fn new(input: R) -> Self {
        TokenReader {
            input,
            line_buf: String::new(),
            cursor: 0,
            line_number: 0,
        }
    }

    /// 1-based number of the line the cursor is currently on.
    pub fn line_number(&self) -> u64 {
        self.line_number
    }

    /// Advance to the next physical line, discarding whatever is left of
    /// the current one. Returns `false` at end of input.
    pub fn next_line(&mut self) -> Result<bool, ParseError> {
        self.line_buf.clear();
        self.cursor = 0;
        let bytes = self.input.read_line(&mut self.line_buf)?;
        if bytes == 0 {
            return Ok(false);
        }
        self.line_number += 1;
        Ok(true)
    }

    /// Next whitespace-separated token, crossing line boundaries as
    /// needed. `None` at end of input.
    pub fn next_token(&mut self) -> Result<Option<&str>, ParseError> {
        loop {
            if self.skip_whitespace() {
                break;
            }
            if !self.next_line()? {
                return Ok(None);
            }
        }

        let start = self.cursor;
        let bytes = self.line_buf.as_bytes();
        let mut end = start;
        while end < bytes.len() && !bytes[end].is_ascii_whitespace() {
            end += 1;
        }
        self.cursor = end;
        Ok(Some(&self.line_buf[start..end]))
    }

    /// Move the cursor past leading whitespace; true when a token starts
    /// at the cursor afterwards.
    fn skip_whitespace(&mut self) -> bool {
        let bytes = self.line_buf.as_bytes();
        while self.cursor < bytes.len() && bytes[self.cursor].is_ascii_whitespace() {
            self.cursor += 1;
        }
        self.cursor < bytes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn reader(text: &str) -> TokenReader<Cursor<&str>> {
        TokenReader::new(Cursor::new(text))
    }

    fn collect_tokens(text: &str) -> Vec<String> {
        let mut r = reader(text);
        let mut out = Vec::new();
        while let Some(tok) = r.next_token().unwrap() {
            out.push(tok.to_string());
        }
        out
    }

    #[test]
    fn tokens_split_on_spaces_tabs_and_newlines() {
        assert_eq!(
            collect_tokens("VAR 2\n  x\ty\n"),
            vec!["VAR", "2", "x", "y"]
        );
    }

    #[test]
    fn empty_input_has_no_tokens() {
        assert_eq!(collect_tokens(""), Vec::<String>::new());
        assert_eq!(collect_tokens("   \n\n \t \n"), Vec::<String>::new());
    }

    #[test]
    fn last_line_without_newline_still_tokenizes() {
        assert_eq!(collect_tokens("a b"), vec!["a", "b"]);
    }

    #[test]
    fn line_numbers_are_one_based_and_track_refills() {
        let mut r = reader("one\n\n three\n");
        assert_eq!(r.line_number(), 0);
        assert_eq!(r.next_token().unwrap(), Some("one"));
        assert_eq!(r.line_number(), 1);
        // Crossing the blank line to reach the next token.
        assert_eq!(r.next_token().unwrap(), Some("three"));
        assert_eq!(r.line_number(), 3);
    }

    #[test]
    fn next_line_discards_the_rest_of_the_current_line() {
        let mut r = reader("keep discard discard\nnext\n");
        assert_eq!(r.next_token().unwrap(), Some("keep"));
        assert!(r.next_line().unwrap());
        assert_eq!(r.next_token().unwrap(), Some("next"));
        assert_eq!(r.next_token().unwrap(), None);
    }

    #[test]
    fn carriage_returns_are_separators() {
        assert_eq!(collect_tokens("a\r\nb\r\n"), vec!["a", "b"]);
    }
}
