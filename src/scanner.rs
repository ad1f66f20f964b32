use std::collections::VecDeque;

use crate::chars::{ends_anchor, is_alpha, is_blank, is_blankz, is_bom, is_break, is_breakz};
use crate::reader::Reader;
use crate::token::{Token, TokenData};
use crate::{Encoding, Mark, ScalarStyle, ScannerError};

/// The longest distance, in code points, a simple key candidate may span.
const MAX_SIMPLE_KEY_LENGTH: u64 = 1024;

/// A potential simple key, one per flow level.
#[derive(Copy, Clone, Default)]
struct SimpleKey {
    /// Is a simple key possible?
    possible: bool,
    /// Is a simple key required?
    required: bool,
    /// The number of the token the key would become.
    token_number: usize,
    /// The code point index where the candidate starts.
    index: u64,
    /// The position mark.
    mark: Mark,
}

/// The scanner turns the reader's code points into a token queue, tracking
/// indentation, flow nesting and pending simple keys.
pub struct Scanner<'r> {
    reader: Reader<'r>,
    /// The queue of produced tokens.
    pub(crate) tokens: VecDeque<Token>,
    /// The number of tokens already handed to the parser; keeps the numbering
    /// of pending simple keys stable.
    pub(crate) tokens_taken: usize,
    pub(crate) token_available: bool,
    pub(crate) stream_start_produced: bool,
    pub(crate) stream_end_produced: bool,
    /// The current indentation column in block context, -1 at stream start.
    indent: i32,
    /// Previous indentation levels, popped to emit BLOCK-END.
    indents: Vec<i32>,
    /// Nesting depth inside `[...]`/`{...}`; zero means block context.
    flow_level: usize,
    simple_key_allowed: bool,
    /// One pending candidate per flow level.
    simple_keys: Vec<SimpleKey>,
}

impl<'r> Default for Scanner<'r> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'r> Scanner<'r> {
    pub fn new() -> Scanner<'r> {
        Scanner {
            reader: Reader::new(),
            tokens: VecDeque::with_capacity(16),
            tokens_taken: 0,
            token_available: false,
            stream_start_produced: false,
            stream_end_produced: false,
            indent: 0,
            indents: Vec::with_capacity(16),
            flow_level: 0,
            simple_key_allowed: false,
            simple_keys: Vec::with_capacity(16),
        }
    }

    /// Set a generic input handler.
    pub fn set_input(&mut self, input: &'r mut dyn std::io::BufRead) {
        self.reader.set_input(input);
    }

    /// Set the source encoding, bypassing BOM detection.
    pub fn set_encoding(&mut self, encoding: Encoding) {
        self.reader.set_encoding(encoding);
    }

    pub(crate) fn mark(&self) -> Mark {
        self.reader.mark
    }

    /// Scan the input stream and produce the next token.
    ///
    /// The initial token is STREAM-START, the final one STREAM-END; after
    /// that the scanner keeps returning STREAM-END tokens.
    pub fn scan(&mut self) -> Result<Token, ScannerError> {
        if self.stream_end_produced {
            return Ok(Token {
                data: TokenData::StreamEnd,
                start_mark: self.reader.mark,
                end_mark: self.reader.mark,
            });
        }
        if !self.token_available {
            self.fetch_more_tokens()?;
        }
        let Some(token) = self.tokens.pop_front() else {
            unreachable!("no more tokens, but stream-end was not produced");
        };
        self.token_available = false;
        self.tokens_taken += 1;
        if let TokenData::StreamEnd = &token.data {
            self.stream_end_produced = true;
        }
        Ok(token)
    }

    fn error<T>(
        &self,
        context: &'static str,
        context_mark: Mark,
        problem: &'static str,
    ) -> Result<T, ScannerError> {
        Err(ScannerError::Problem {
            context,
            context_mark,
            problem,
            problem_mark: self.reader.mark,
        })
    }

    pub(crate) fn fetch_more_tokens(&mut self) -> Result<(), ScannerError> {
        loop {
            let mut need_more_tokens = self.tokens.is_empty();
            if !need_more_tokens {
                self.stale_simple_keys()?;
                for simple_key in &self.simple_keys {
                    if simple_key.possible && simple_key.token_number == self.tokens_taken {
                        need_more_tokens = true;
                        break;
                    }
                }
            }
            if !need_more_tokens {
                break;
            }
            self.fetch_next_token()?;
        }
        self.token_available = true;
        Ok(())
    }

    fn fetch_next_token(&mut self) -> Result<(), ScannerError> {
        self.reader.cache(1)?;
        if !self.stream_start_produced {
            self.fetch_stream_start();
            return Ok(());
        }
        self.scan_to_next_token()?;
        self.stale_simple_keys()?;
        self.unroll_indent(i64::from(self.reader.mark.column));
        self.reader.cache(4)?;

        if self.reader.is_eof() {
            return self.fetch_stream_end();
        }

        let column = self.reader.mark.column;
        if column == 0 && self.reader.check(0, '%') {
            return self.fetch_directive();
        }
        if column == 0 && self.check_document_indicator('-') {
            return self.fetch_document_indicator(TokenData::DocumentStart);
        }
        if column == 0 && self.check_document_indicator('.') {
            return self.fetch_document_indicator(TokenData::DocumentEnd);
        }

        let Some(ch) = self.reader.peek(0) else {
            return self.fetch_stream_end();
        };
        match ch {
            '[' => return self.fetch_flow_collection_start(TokenData::FlowSequenceStart),
            '{' => return self.fetch_flow_collection_start(TokenData::FlowMappingStart),
            ']' => return self.fetch_flow_collection_end(TokenData::FlowSequenceEnd),
            '}' => return self.fetch_flow_collection_end(TokenData::FlowMappingEnd),
            ',' => return self.fetch_flow_entry(),
            '-' if is_blankz(self.reader.peek(1)) => return self.fetch_block_entry(),
            '?' if self.flow_level > 0 || is_blankz(self.reader.peek(1)) => {
                return self.fetch_key()
            }
            ':' if self.flow_level > 0 || is_blankz(self.reader.peek(1)) => {
                return self.fetch_value()
            }
            '*' => return self.fetch_anchor(true),
            '&' => return self.fetch_anchor(false),
            '!' => return self.fetch_tag(),
            '|' if self.flow_level == 0 => return self.fetch_block_scalar(true),
            '>' if self.flow_level == 0 => return self.fetch_block_scalar(false),
            '\'' => return self.fetch_flow_scalar(true),
            '"' => return self.fetch_flow_scalar(false),
            _ => (),
        }

        let starts_plain = !matches!(
            ch,
            '-' | '?'
                | ':'
                | ','
                | '['
                | ']'
                | '{'
                | '}'
                | '#'
                | '&'
                | '*'
                | '!'
                | '|'
                | '>'
                | '\''
                | '"'
                | '%'
                | '@'
                | '`'
        ) && !is_blankz(ch)
            || ch == '-' && !is_blank(self.reader.peek(1))
            || self.flow_level == 0
                && matches!(ch, '?' | ':')
                && !is_blankz(self.reader.peek(1));
        if starts_plain {
            return self.fetch_plain_scalar();
        }
        self.error(
            "while scanning for the next token",
            self.reader.mark,
            "found character that cannot start any token",
        )
    }

    fn check_document_indicator(&self, ch: char) -> bool {
        self.reader.check(0, ch)
            && self.reader.check(1, ch)
            && self.reader.check(2, ch)
            && is_blankz(self.reader.peek(3))
    }

    fn stale_simple_keys(&mut self) -> Result<(), ScannerError> {
        let mark = self.reader.mark;
        let index = self.reader.index();
        for simple_key in &mut self.simple_keys {
            if simple_key.possible
                && (simple_key.mark.line < mark.line
                    || simple_key.index + MAX_SIMPLE_KEY_LENGTH < index)
            {
                if simple_key.required {
                    let key_mark = simple_key.mark;
                    return Err(ScannerError::Problem {
                        context: "while scanning a simple key",
                        context_mark: key_mark,
                        problem: "could not find expected ':'",
                        problem_mark: mark,
                    });
                }
                simple_key.possible = false;
            }
        }
        Ok(())
    }

    fn save_simple_key(&mut self) -> Result<(), ScannerError> {
        let required =
            self.flow_level == 0 && i64::from(self.indent) == i64::from(self.reader.mark.column);
        if self.simple_key_allowed {
            let simple_key = SimpleKey {
                possible: true,
                required,
                token_number: self.tokens_taken + self.tokens.len(),
                index: self.reader.index(),
                mark: self.reader.mark,
            };
            self.remove_simple_key()?;
            *self.simple_keys.last_mut().unwrap() = simple_key;
        }
        Ok(())
    }

    fn remove_simple_key(&mut self) -> Result<(), ScannerError> {
        let simple_key = self.simple_keys.last_mut().unwrap();
        if simple_key.possible && simple_key.required {
            let mark = simple_key.mark;
            return Err(ScannerError::Problem {
                context: "while scanning a simple key",
                context_mark: mark,
                problem: "could not find expected ':'",
                problem_mark: self.reader.mark,
            });
        }
        simple_key.possible = false;
        Ok(())
    }

    fn increase_flow_level(&mut self) {
        self.simple_keys.push(SimpleKey::default());
        self.flow_level = self
            .flow_level
            .checked_add(1)
            .expect("flow level overflow");
    }

    fn decrease_flow_level(&mut self) {
        if self.flow_level > 0 {
            self.flow_level -= 1;
            let _ = self.simple_keys.pop();
        }
    }

    /// Push a new indentation level and emit the matching collection start.
    /// With `number`, the token is back-inserted at that position in the
    /// queue (the simple-key reconciliation); the insertion index is always
    /// small.
    fn roll_indent(&mut self, column: i64, number: Option<usize>, data: TokenData, mark: Mark) {
        if self.flow_level > 0 {
            return;
        }
        if i64::from(self.indent) < column {
            self.indents.push(self.indent);
            self.indent = column as i32;
            let token = Token {
                data,
                start_mark: mark,
                end_mark: mark,
            };
            if let Some(number) = number {
                self.tokens.insert(number - self.tokens_taken, token);
            } else {
                self.tokens.push_back(token);
            }
        }
    }

    /// Pop indentation levels above `column`, emitting one BLOCK-END each.
    fn unroll_indent(&mut self, column: i64) {
        if self.flow_level > 0 {
            return;
        }
        while i64::from(self.indent) > column {
            let mark = self.reader.mark;
            self.tokens.push_back(Token {
                data: TokenData::BlockEnd,
                start_mark: mark,
                end_mark: mark,
            });
            self.indent = self.indents.pop().unwrap();
        }
    }

    fn fetch_stream_start(&mut self) {
        self.indent = -1;
        self.simple_keys.push(SimpleKey::default());
        self.simple_key_allowed = true;
        self.stream_start_produced = true;
        let mark = self.reader.mark;
        self.tokens.push_back(Token {
            data: TokenData::StreamStart {
                encoding: self.reader.encoding,
            },
            start_mark: mark,
            end_mark: mark,
        });
    }

    fn fetch_stream_end(&mut self) -> Result<(), ScannerError> {
        if self.reader.mark.column != 0 {
            self.reader.mark.next_line();
        }
        self.unroll_indent(-1);
        self.remove_simple_key()?;
        self.simple_key_allowed = false;
        let mark = self.reader.mark;
        self.tokens.push_back(Token {
            data: TokenData::StreamEnd,
            start_mark: mark,
            end_mark: mark,
        });
        Ok(())
    }

    fn fetch_directive(&mut self) -> Result<(), ScannerError> {
        self.unroll_indent(-1);
        self.remove_simple_key()?;
        self.simple_key_allowed = false;
        if let Some(token) = self.scan_directive()? {
            self.tokens.push_back(token);
        }
        Ok(())
    }

    fn fetch_document_indicator(&mut self, data: TokenData) -> Result<(), ScannerError> {
        self.unroll_indent(-1);
        self.remove_simple_key()?;
        self.simple_key_allowed = false;
        let start_mark = self.reader.mark;
        self.reader.skip();
        self.reader.skip();
        self.reader.skip();
        let end_mark = self.reader.mark;
        self.tokens.push_back(Token {
            data,
            start_mark,
            end_mark,
        });
        Ok(())
    }

    fn fetch_flow_collection_start(&mut self, data: TokenData) -> Result<(), ScannerError> {
        self.save_simple_key()?;
        self.increase_flow_level();
        self.simple_key_allowed = true;
        let start_mark = self.reader.mark;
        self.reader.skip();
        let end_mark = self.reader.mark;
        self.tokens.push_back(Token {
            data,
            start_mark,
            end_mark,
        });
        Ok(())
    }

    fn fetch_flow_collection_end(&mut self, data: TokenData) -> Result<(), ScannerError> {
        self.remove_simple_key()?;
        self.decrease_flow_level();
        self.simple_key_allowed = false;
        let start_mark = self.reader.mark;
        self.reader.skip();
        let end_mark = self.reader.mark;
        self.tokens.push_back(Token {
            data,
            start_mark,
            end_mark,
        });
        Ok(())
    }

    fn fetch_flow_entry(&mut self) -> Result<(), ScannerError> {
        self.remove_simple_key()?;
        self.simple_key_allowed = true;
        let start_mark = self.reader.mark;
        self.reader.skip();
        let end_mark = self.reader.mark;
        self.tokens.push_back(Token {
            data: TokenData::FlowEntry,
            start_mark,
            end_mark,
        });
        Ok(())
    }

    fn fetch_block_entry(&mut self) -> Result<(), ScannerError> {
        if self.flow_level == 0 {
            if !self.simple_key_allowed {
                return self.error(
                    "",
                    self.reader.mark,
                    "block sequence entries are not allowed in this context",
                );
            }
            self.roll_indent(
                i64::from(self.reader.mark.column),
                None,
                TokenData::BlockSequenceStart,
                self.reader.mark,
            );
        }
        self.remove_simple_key()?;
        self.simple_key_allowed = true;
        let start_mark = self.reader.mark;
        self.reader.skip();
        let end_mark = self.reader.mark;
        self.tokens.push_back(Token {
            data: TokenData::BlockEntry,
            start_mark,
            end_mark,
        });
        Ok(())
    }

    fn fetch_key(&mut self) -> Result<(), ScannerError> {
        if self.flow_level == 0 {
            if !self.simple_key_allowed {
                return self.error(
                    "",
                    self.reader.mark,
                    "mapping keys are not allowed in this context",
                );
            }
            self.roll_indent(
                i64::from(self.reader.mark.column),
                None,
                TokenData::BlockMappingStart,
                self.reader.mark,
            );
        }
        self.remove_simple_key()?;
        self.simple_key_allowed = self.flow_level == 0;
        let start_mark = self.reader.mark;
        self.reader.skip();
        let end_mark = self.reader.mark;
        self.tokens.push_back(Token {
            data: TokenData::Key,
            start_mark,
            end_mark,
        });
        Ok(())
    }

    fn fetch_value(&mut self) -> Result<(), ScannerError> {
        let simple_key = self.simple_keys.last_mut().unwrap();
        if simple_key.possible {
            // Reconcile: the scalar scanned earlier was a key after all.
            let token = Token {
                data: TokenData::Key,
                start_mark: simple_key.mark,
                end_mark: simple_key.mark,
            };
            let token_number = simple_key.token_number;
            let mark = simple_key.mark;
            simple_key.possible = false;
            self.tokens.insert(token_number - self.tokens_taken, token);
            self.roll_indent(
                i64::from(mark.column),
                Some(token_number),
                TokenData::BlockMappingStart,
                mark,
            );
            self.simple_key_allowed = false;
        } else {
            if self.flow_level == 0 {
                if !self.simple_key_allowed {
                    return self.error(
                        "",
                        self.reader.mark,
                        "mapping values are not allowed in this context",
                    );
                }
                self.roll_indent(
                    i64::from(self.reader.mark.column),
                    None,
                    TokenData::BlockMappingStart,
                    self.reader.mark,
                );
            }
            self.simple_key_allowed = self.flow_level == 0;
        }
        let start_mark = self.reader.mark;
        self.reader.skip();
        let end_mark = self.reader.mark;
        self.tokens.push_back(Token {
            data: TokenData::Value,
            start_mark,
            end_mark,
        });
        Ok(())
    }

    fn fetch_anchor(&mut self, alias: bool) -> Result<(), ScannerError> {
        self.save_simple_key()?;
        self.simple_key_allowed = false;
        let token = self.scan_anchor(alias)?;
        self.tokens.push_back(token);
        Ok(())
    }

    fn fetch_tag(&mut self) -> Result<(), ScannerError> {
        self.save_simple_key()?;
        self.simple_key_allowed = false;
        let token = self.scan_tag()?;
        self.tokens.push_back(token);
        Ok(())
    }

    fn fetch_block_scalar(&mut self, literal: bool) -> Result<(), ScannerError> {
        self.remove_simple_key()?;
        self.simple_key_allowed = true;
        let token = self.scan_block_scalar(literal)?;
        self.tokens.push_back(token);
        Ok(())
    }

    fn fetch_flow_scalar(&mut self, single: bool) -> Result<(), ScannerError> {
        self.save_simple_key()?;
        self.simple_key_allowed = false;
        let token = self.scan_flow_scalar(single)?;
        self.tokens.push_back(token);
        Ok(())
    }

    fn fetch_plain_scalar(&mut self) -> Result<(), ScannerError> {
        self.save_simple_key()?;
        self.simple_key_allowed = false;
        let token = self.scan_plain_scalar()?;
        self.tokens.push_back(token);
        Ok(())
    }

    /// Eat whitespace, comments and line breaks up to the next token.
    fn scan_to_next_token(&mut self) -> Result<(), ScannerError> {
        loop {
            self.reader.cache(1)?;
            if self.reader.mark.column == 0 && self.reader.peek(0).is_some_and(is_bom) {
                self.reader.skip();
            }
            self.reader.cache(1)?;
            while self.reader.check(0, ' ')
                || (self.flow_level > 0 || !self.simple_key_allowed) && self.reader.check(0, '\t')
            {
                self.reader.skip();
                self.reader.cache(1)?;
            }
            if self.reader.check(0, '#') {
                while !is_breakz(self.reader.peek(0)) {
                    self.reader.skip();
                    self.reader.cache(1)?;
                }
            }
            if !is_break(self.reader.peek(0)) {
                break;
            }
            self.reader.cache(2)?;
            self.reader.skip_line();
            if self.flow_level == 0 {
                self.simple_key_allowed = true;
            }
        }
        Ok(())
    }

    /// Scan a `%...` directive line. Returns `None` for reserved directives,
    /// which are skipped.
    fn scan_directive(&mut self) -> Result<Option<Token>, ScannerError> {
        let start_mark = self.reader.mark;
        self.reader.skip();
        let name = self.scan_directive_name(start_mark)?;
        let token = if name == "YAML" {
            let (major, minor) = self.scan_version_directive_value(start_mark)?;
            Some(Token {
                data: TokenData::VersionDirective { major, minor },
                start_mark,
                end_mark: self.reader.mark,
            })
        } else if name == "TAG" {
            let (handle, prefix) = self.scan_tag_directive_value(start_mark)?;
            Some(Token {
                data: TokenData::TagDirective { handle, prefix },
                start_mark,
                end_mark: self.reader.mark,
            })
        } else {
            log::warn!("skipping reserved directive %{name} at {start_mark}");
            self.reader.cache(1)?;
            while !is_breakz(self.reader.peek(0)) {
                self.reader.skip();
                self.reader.cache(1)?;
            }
            None
        };
        self.reader.cache(1)?;
        while is_blank(self.reader.peek(0)) {
            self.reader.skip();
            self.reader.cache(1)?;
        }
        if self.reader.check(0, '#') {
            while !is_breakz(self.reader.peek(0)) {
                self.reader.skip();
                self.reader.cache(1)?;
            }
        }
        if !is_breakz(self.reader.peek(0)) {
            return self.error(
                "while scanning a directive",
                start_mark,
                "did not find expected comment or line break",
            );
        }
        if is_break(self.reader.peek(0)) {
            self.reader.cache(2)?;
            self.reader.skip_line();
        }
        Ok(token)
    }

    fn scan_directive_name(&mut self, start_mark: Mark) -> Result<String, ScannerError> {
        let mut string = String::new();
        self.reader.cache(1)?;
        while is_alpha(self.reader.peek(0)) {
            self.reader.read_char_into(&mut string);
            self.reader.cache(1)?;
        }
        if string.is_empty() {
            self.error(
                "while scanning a directive",
                start_mark,
                "could not find expected directive name",
            )
        } else if !is_blankz(self.reader.peek(0)) {
            self.error(
                "while scanning a directive",
                start_mark,
                "found unexpected non-alphabetical character",
            )
        } else {
            Ok(string)
        }
    }

    fn scan_version_directive_value(
        &mut self,
        start_mark: Mark,
    ) -> Result<(i32, i32), ScannerError> {
        self.reader.cache(1)?;
        while is_blank(self.reader.peek(0)) {
            self.reader.skip();
            self.reader.cache(1)?;
        }
        let major = self.scan_version_directive_number(start_mark)?;
        if !self.reader.check(0, '.') {
            return self.error(
                "while scanning a %YAML directive",
                start_mark,
                "did not find expected digit or '.' character",
            );
        }
        self.reader.skip();
        let minor = self.scan_version_directive_number(start_mark)?;
        Ok((major, minor))
    }

    fn scan_version_directive_number(&mut self, start_mark: Mark) -> Result<i32, ScannerError> {
        const MAX_NUMBER_LENGTH: usize = 9;
        let mut value: i32 = 0;
        let mut length = 0;
        self.reader.cache(1)?;
        while let Some(digit) = self.reader.peek(0).and_then(|ch| ch.to_digit(10)) {
            length += 1;
            if length > MAX_NUMBER_LENGTH {
                return self.error(
                    "while scanning a %YAML directive",
                    start_mark,
                    "found extremely long version number",
                );
            }
            value = value * 10 + digit as i32;
            self.reader.skip();
            self.reader.cache(1)?;
        }
        if length == 0 {
            return self.error(
                "while scanning a %YAML directive",
                start_mark,
                "did not find expected version number",
            );
        }
        Ok(value)
    }

    fn scan_tag_directive_value(
        &mut self,
        start_mark: Mark,
    ) -> Result<(String, String), ScannerError> {
        self.reader.cache(1)?;
        while is_blank(self.reader.peek(0)) {
            self.reader.skip();
            self.reader.cache(1)?;
        }
        let handle = self.scan_tag_handle(true, start_mark)?;
        self.reader.cache(1)?;
        if !is_blank(self.reader.peek(0)) {
            return self.error(
                "while scanning a %TAG directive",
                start_mark,
                "did not find expected whitespace",
            );
        }
        while is_blank(self.reader.peek(0)) {
            self.reader.skip();
            self.reader.cache(1)?;
        }
        let prefix = self.scan_tag_uri(true, true, None, start_mark)?;
        self.reader.cache(1)?;
        if !is_blankz(self.reader.peek(0)) {
            return self.error(
                "while scanning a %TAG directive",
                start_mark,
                "did not find expected whitespace or line break",
            );
        }
        Ok((handle, prefix))
    }

    fn scan_anchor(&mut self, alias: bool) -> Result<Token, ScannerError> {
        let mut string = String::new();
        let start_mark = self.reader.mark;
        self.reader.skip();
        self.reader.cache(1)?;
        while is_alpha(self.reader.peek(0)) {
            self.reader.read_char_into(&mut string);
            self.reader.cache(1)?;
        }
        let end_mark = self.reader.mark;
        if string.is_empty() || !ends_anchor(self.reader.peek(0)) {
            return self.error(
                if alias {
                    "while scanning an alias"
                } else {
                    "while scanning an anchor"
                },
                start_mark,
                "did not find expected alphabetic or numeric character",
            );
        }
        Ok(Token {
            data: if alias {
                TokenData::Alias { value: string }
            } else {
                TokenData::Anchor { value: string }
            },
            start_mark,
            end_mark,
        })
    }

    fn scan_tag(&mut self) -> Result<Token, ScannerError> {
        let start_mark = self.reader.mark;
        self.reader.cache(2)?;

        let (mut handle, mut suffix);
        if self.reader.check(1, '<') {
            // Verbatim tag: !<URI>
            handle = String::new();
            self.reader.skip();
            self.reader.skip();
            suffix = self.scan_tag_uri(true, false, None, start_mark)?;
            if !self.reader.check(0, '>') {
                return self.error(
                    "while scanning a tag",
                    start_mark,
                    "did not find the expected '>'",
                );
            }
            self.reader.skip();
        } else {
            handle = self.scan_tag_handle(false, start_mark)?;
            if handle.starts_with('!') && handle.len() > 1 && handle.ends_with('!') {
                suffix = self.scan_tag_uri(false, false, None, start_mark)?;
            } else {
                suffix = self.scan_tag_uri(false, false, Some(&handle), start_mark)?;
                handle = String::from("!");
                if suffix.is_empty() {
                    core::mem::swap(&mut handle, &mut suffix);
                }
            }
        }

        self.reader.cache(1)?;
        if !is_blankz(self.reader.peek(0))
            && !(self.flow_level > 0 && self.reader.check(0, ','))
        {
            return self.error(
                "while scanning a tag",
                start_mark,
                "did not find expected whitespace or line break",
            );
        }
        Ok(Token {
            data: TokenData::Tag { handle, suffix },
            start_mark,
            end_mark: self.reader.mark,
        })
    }

    fn scan_tag_handle(
        &mut self,
        directive: bool,
        start_mark: Mark,
    ) -> Result<String, ScannerError> {
        let mut string = String::new();
        self.reader.cache(1)?;
        if !self.reader.check(0, '!') {
            return self.error(
                if directive {
                    "while scanning a tag directive"
                } else {
                    "while scanning a tag"
                },
                start_mark,
                "did not find expected '!'",
            );
        }
        self.reader.read_char_into(&mut string);
        self.reader.cache(1)?;
        while is_alpha(self.reader.peek(0)) {
            self.reader.read_char_into(&mut string);
            self.reader.cache(1)?;
        }
        if self.reader.check(0, '!') {
            self.reader.read_char_into(&mut string);
        } else if directive && string != "!" {
            return self.error(
                "while scanning a tag directive",
                start_mark,
                "did not find expected '!'",
            );
        }
        Ok(string)
    }

    fn scan_tag_uri(
        &mut self,
        uri_char: bool,
        directive: bool,
        head: Option<&str>,
        start_mark: Mark,
    ) -> Result<String, ScannerError> {
        let head = head.unwrap_or("");
        let mut length = head.len();
        // The head, if present, was scanned as a handle; drop its leading '!'.
        let mut string = if length > 1 {
            String::from(&head[1..])
        } else {
            String::new()
        };
        self.reader.cache(1)?;

        loop {
            let Some(ch) = self.reader.peek(0) else {
                break;
            };
            let uri_only = matches!(ch, ',' | '[' | ']');
            let allowed = is_alpha(ch)
                || matches!(
                    ch,
                    ';' | '/'
                        | '?'
                        | ':'
                        | '@'
                        | '&'
                        | '='
                        | '+'
                        | '$'
                        | '.'
                        | '%'
                        | '!'
                        | '~'
                        | '*'
                        | '\''
                        | '('
                        | ')'
                )
                || uri_char && uri_only;
            if !allowed {
                break;
            }
            if ch == '%' {
                self.scan_uri_escapes(directive, start_mark, &mut string)?;
            } else {
                self.reader.read_char_into(&mut string);
            }
            length += 1;
            self.reader.cache(1)?;
        }
        if length == 0 {
            return self.error(
                if directive {
                    "while parsing a %TAG directive"
                } else {
                    "while parsing a tag"
                },
                start_mark,
                "did not find expected tag URI",
            );
        }
        Ok(string)
    }

    /// Decode one `%HH`-escaped UTF-8 sequence into `string`.
    fn scan_uri_escapes(
        &mut self,
        directive: bool,
        start_mark: Mark,
        string: &mut String,
    ) -> Result<(), ScannerError> {
        let context = if directive {
            "while parsing a %TAG directive"
        } else {
            "while parsing a tag"
        };
        let mut bytes = Vec::with_capacity(4);
        let mut width = 0usize;
        loop {
            self.reader.cache(3)?;
            if !(self.reader.check(0, '%')
                && self.reader.peek(1).is_some_and(|ch| ch.is_ascii_hexdigit())
                && self.reader.peek(2).is_some_and(|ch| ch.is_ascii_hexdigit()))
            {
                return self.error(context, start_mark, "did not find URI escaped octet");
            }
            let hi = self.reader.peek(1).unwrap().to_digit(16).unwrap();
            let lo = self.reader.peek(2).unwrap().to_digit(16).unwrap();
            let octet = (hi << 4 | lo) as u8;
            if bytes.is_empty() {
                width = utf8_escape_width(octet);
                if width == 0 {
                    return self.error(
                        context,
                        start_mark,
                        "found an incorrect leading UTF-8 octet",
                    );
                }
            } else if octet & 0xC0 != 0x80 {
                return self.error(
                    context,
                    start_mark,
                    "found an incorrect trailing UTF-8 octet",
                );
            }
            bytes.push(octet);
            self.reader.skip();
            self.reader.skip();
            self.reader.skip();
            if bytes.len() == width {
                break;
            }
        }
        match std::str::from_utf8(&bytes) {
            Ok(decoded) => {
                string.push_str(decoded);
                Ok(())
            }
            Err(_) => self.error(context, start_mark, "found invalid UTF-8 in URI escape"),
        }
    }

    fn scan_block_scalar(&mut self, literal: bool) -> Result<Token, ScannerError> {
        let mut string = String::new();
        let mut leading_break = String::new();
        let mut trailing_breaks = String::new();
        // Chomping: -1 strip, 0 clip, 1 keep.
        let mut chomping = 0i32;
        let mut increment = 0i32;
        let mut indent = 0i32;
        let mut leading_blank = false;

        let start_mark = self.reader.mark;
        self.reader.skip();
        self.reader.cache(1)?;

        if self.reader.check(0, '+') || self.reader.check(0, '-') {
            chomping = if self.reader.check(0, '+') { 1 } else { -1 };
            self.reader.skip();
            self.reader.cache(1)?;
            if let Some(digit) = self.reader.peek(0).and_then(|ch| ch.to_digit(10)) {
                if digit == 0 {
                    return self.error(
                        "while scanning a block scalar",
                        start_mark,
                        "found an indentation indicator equal to 0",
                    );
                }
                increment = digit as i32;
                self.reader.skip();
            }
        } else if let Some(digit) = self.reader.peek(0).and_then(|ch| ch.to_digit(10)) {
            if digit == 0 {
                return self.error(
                    "while scanning a block scalar",
                    start_mark,
                    "found an indentation indicator equal to 0",
                );
            }
            increment = digit as i32;
            self.reader.skip();
            self.reader.cache(1)?;
            if self.reader.check(0, '+') || self.reader.check(0, '-') {
                chomping = if self.reader.check(0, '+') { 1 } else { -1 };
                self.reader.skip();
            }
        }

        self.reader.cache(1)?;
        while is_blank(self.reader.peek(0)) {
            self.reader.skip();
            self.reader.cache(1)?;
        }
        if self.reader.check(0, '#') {
            while !is_breakz(self.reader.peek(0)) {
                self.reader.skip();
                self.reader.cache(1)?;
            }
        }
        if !is_breakz(self.reader.peek(0)) {
            return self.error(
                "while scanning a block scalar",
                start_mark,
                "did not find expected comment or line break",
            );
        }
        if is_break(self.reader.peek(0)) {
            self.reader.cache(2)?;
            self.reader.skip_line();
        }

        let mut end_mark = self.reader.mark;
        if increment != 0 {
            indent = if self.indent >= 0 {
                self.indent + increment
            } else {
                increment
            };
        }
        self.scan_block_scalar_breaks(&mut indent, &mut trailing_breaks, start_mark, &mut end_mark)?;

        self.reader.cache(1)?;
        while i32::from(self.reader.mark.column) == indent && !self.reader.is_eof() {
            // A line of content at the scalar's indentation level.
            let trailing_blank = is_blank(self.reader.peek(0));
            if !literal && leading_break.starts_with('\n') && !leading_blank && !trailing_blank {
                if trailing_breaks.is_empty() {
                    string.push(' ');
                }
                leading_break.clear();
            } else {
                string.push_str(&leading_break);
                leading_break.clear();
            }
            string.push_str(&trailing_breaks);
            trailing_breaks.clear();
            leading_blank = is_blank(self.reader.peek(0));
            while !is_breakz(self.reader.peek(0)) {
                self.reader.read_char_into(&mut string);
                self.reader.cache(1)?;
            }
            self.reader.cache(2)?;
            if !self.reader.is_eof() {
                self.reader.read_line_into(&mut leading_break);
            }
            self.scan_block_scalar_breaks(
                &mut indent,
                &mut trailing_breaks,
                start_mark,
                &mut end_mark,
            )?;
            self.reader.cache(1)?;
        }

        // Chomping decides which of the speculatively collected breaks land
        // in the value: clip keeps the final break, keep keeps them all.
        if chomping != -1 {
            string.push_str(&leading_break);
        }
        if chomping == 1 {
            string.push_str(&trailing_breaks);
        }

        Ok(Token {
            data: TokenData::Scalar {
                value: string,
                style: if literal {
                    ScalarStyle::Literal
                } else {
                    ScalarStyle::Folded
                },
            },
            start_mark,
            end_mark,
        })
    }

    fn scan_block_scalar_breaks(
        &mut self,
        indent: &mut i32,
        breaks: &mut String,
        start_mark: Mark,
        end_mark: &mut Mark,
    ) -> Result<(), ScannerError> {
        let mut max_indent = 0i32;
        *end_mark = self.reader.mark;
        loop {
            self.reader.cache(1)?;
            while (*indent == 0 || i32::from(self.reader.mark.column) < *indent)
                && self.reader.check(0, ' ')
            {
                self.reader.skip();
                self.reader.cache(1)?;
            }
            if i32::from(self.reader.mark.column) > max_indent {
                max_indent = i32::from(self.reader.mark.column);
            }
            if (*indent == 0 || i32::from(self.reader.mark.column) < *indent)
                && self.reader.check(0, '\t')
            {
                return self.error(
                    "while scanning a block scalar",
                    start_mark,
                    "found a tab character where an indentation space is expected",
                );
            }
            if !is_break(self.reader.peek(0)) {
                break;
            }
            self.reader.cache(2)?;
            self.reader.read_line_into(breaks);
            *end_mark = self.reader.mark;
        }
        if *indent == 0 {
            *indent = max_indent.max(self.indent + 1).max(1);
        }
        Ok(())
    }

    fn scan_flow_scalar(&mut self, single: bool) -> Result<Token, ScannerError> {
        let mut string = String::new();
        let mut leading_break = String::new();
        let mut trailing_breaks = String::new();
        let mut whitespaces = String::new();
        let mut leading_blanks;

        let start_mark = self.reader.mark;
        self.reader.skip();
        loop {
            self.reader.cache(4)?;
            if self.reader.mark.column == 0
                && (self.check_document_indicator('-') || self.check_document_indicator('.'))
            {
                return self.error(
                    "while scanning a quoted scalar",
                    start_mark,
                    "found unexpected document indicator",
                );
            }
            if self.reader.is_eof() {
                return self.error(
                    "while scanning a quoted scalar",
                    start_mark,
                    "found unexpected end of stream",
                );
            }
            self.reader.cache(2)?;
            leading_blanks = false;
            while !is_blankz(self.reader.peek(0)) {
                if single && self.reader.check(0, '\'') && self.reader.check(1, '\'') {
                    // An escaped single quote.
                    string.push('\'');
                    self.reader.skip();
                    self.reader.skip();
                } else {
                    if self.reader.check(0, if single { '\'' } else { '"' }) {
                        break;
                    }
                    if !single
                        && self.reader.check(0, '\\')
                        && is_break(self.reader.peek(1))
                    {
                        // An escaped line break folds into nothing.
                        self.reader.cache(3)?;
                        self.reader.skip();
                        self.reader.skip_line();
                        leading_blanks = true;
                        break;
                    } else if !single && self.reader.check(0, '\\') {
                        self.scan_flow_scalar_escape(start_mark, &mut string)?;
                    } else {
                        self.reader.read_char_into(&mut string);
                    }
                }
                self.reader.cache(2)?;
            }
            self.reader.cache(1)?;
            if self.reader.check(0, if single { '\'' } else { '"' }) {
                break;
            }
            self.reader.cache(1)?;
            while is_blank(self.reader.peek(0)) || is_break(self.reader.peek(0)) {
                if is_blank(self.reader.peek(0)) {
                    if leading_blanks {
                        self.reader.skip();
                    } else {
                        self.reader.read_char_into(&mut whitespaces);
                    }
                } else {
                    self.reader.cache(2)?;
                    if leading_blanks {
                        self.reader.read_line_into(&mut trailing_breaks);
                    } else {
                        whitespaces.clear();
                        self.reader.read_line_into(&mut leading_break);
                        leading_blanks = true;
                    }
                }
                self.reader.cache(1)?;
            }
            if leading_blanks {
                fold_breaks(&mut string, &mut leading_break, &mut trailing_breaks);
            } else {
                string.push_str(&whitespaces);
                whitespaces.clear();
            }
        }

        self.reader.skip();
        Ok(Token {
            data: TokenData::Scalar {
                value: string,
                style: if single {
                    ScalarStyle::SingleQuoted
                } else {
                    ScalarStyle::DoubleQuoted
                },
            },
            start_mark,
            end_mark: self.reader.mark,
        })
    }

    fn scan_flow_scalar_escape(
        &mut self,
        start_mark: Mark,
        string: &mut String,
    ) -> Result<(), ScannerError> {
        let mut code_length = 0usize;
        match self.reader.peek(1) {
            Some('0') => string.push('\0'),
            Some('a') => string.push('\x07'),
            Some('b') => string.push('\x08'),
            Some('t' | '\t') => string.push('\t'),
            Some('n') => string.push('\n'),
            Some('v') => string.push('\x0B'),
            Some('f') => string.push('\x0C'),
            Some('r') => string.push('\r'),
            Some('e') => string.push('\x1B'),
            Some(' ') => string.push(' '),
            Some('"') => string.push('"'),
            Some('/') => string.push('/'),
            Some('\\') => string.push('\\'),
            // NEL (#x85)
            Some('N') => string.push('\u{0085}'),
            // #xA0
            Some('_') => string.push('\u{00a0}'),
            // LS (#x2028)
            Some('L') => string.push('\u{2028}'),
            // PS (#x2029)
            Some('P') => string.push('\u{2029}'),
            Some('x') => code_length = 2,
            Some('u') => code_length = 4,
            Some('U') => code_length = 8,
            _ => {
                return self.error(
                    "while parsing a quoted scalar",
                    start_mark,
                    "found unknown escape character",
                )
            }
        }
        self.reader.skip();
        self.reader.skip();
        if code_length != 0 {
            self.reader.cache(code_length)?;
            let mut value: u32 = 0;
            for k in 0..code_length {
                let Some(digit) = self.reader.peek(k).and_then(|ch| ch.to_digit(16)) else {
                    return self.error(
                        "while parsing a quoted scalar",
                        start_mark,
                        "did not find expected hexadecimal number",
                    );
                };
                value = (value << 4) + digit;
            }
            let Some(ch) = char::from_u32(value) else {
                return self.error(
                    "while parsing a quoted scalar",
                    start_mark,
                    "found invalid Unicode character escape code",
                );
            };
            string.push(ch);
            for _ in 0..code_length {
                self.reader.skip();
            }
        }
        Ok(())
    }

    fn scan_plain_scalar(&mut self) -> Result<Token, ScannerError> {
        let mut string = String::new();
        let mut leading_break = String::new();
        let mut trailing_breaks = String::new();
        let mut whitespaces = String::new();
        let mut leading_blanks = false;
        let indent = self.indent + 1;
        let start_mark = self.reader.mark;
        let mut end_mark = start_mark;

        loop {
            self.reader.cache(4)?;
            if self.reader.mark.column == 0
                && (self.check_document_indicator('-') || self.check_document_indicator('.'))
            {
                break;
            }
            if self.reader.check(0, '#') {
                break;
            }
            while !is_blankz(self.reader.peek(0)) {
                if self.flow_level > 0
                    && self.reader.check(0, ':')
                    && matches!(
                        self.reader.peek(1),
                        Some(',' | '?' | '[' | ']' | '{' | '}')
                    )
                {
                    return self.error(
                        "while scanning a plain scalar",
                        start_mark,
                        "found unexpected ':'",
                    );
                }
                if self.reader.check(0, ':') && is_blankz(self.reader.peek(1))
                    || self.flow_level > 0
                        && matches!(self.reader.peek(0), Some(',' | '[' | ']' | '{' | '}'))
                {
                    break;
                }
                if leading_blanks || !whitespaces.is_empty() {
                    if leading_blanks {
                        fold_breaks(&mut string, &mut leading_break, &mut trailing_breaks);
                        leading_blanks = false;
                    } else {
                        string.push_str(&whitespaces);
                        whitespaces.clear();
                    }
                }
                self.reader.read_char_into(&mut string);
                end_mark = self.reader.mark;
                self.reader.cache(2)?;
            }
            if !(is_blank(self.reader.peek(0)) || is_break(self.reader.peek(0))) {
                break;
            }
            self.reader.cache(1)?;
            while is_blank(self.reader.peek(0)) || is_break(self.reader.peek(0)) {
                if is_blank(self.reader.peek(0)) {
                    if leading_blanks
                        && i32::from(self.reader.mark.column) < indent
                        && self.reader.check(0, '\t')
                    {
                        return self.error(
                            "while scanning a plain scalar",
                            start_mark,
                            "found a tab character that violates indentation",
                        );
                    }
                    if leading_blanks {
                        self.reader.skip();
                    } else {
                        self.reader.read_char_into(&mut whitespaces);
                    }
                } else {
                    self.reader.cache(2)?;
                    if leading_blanks {
                        self.reader.read_line_into(&mut trailing_breaks);
                    } else {
                        whitespaces.clear();
                        self.reader.read_line_into(&mut leading_break);
                        leading_blanks = true;
                    }
                }
                self.reader.cache(1)?;
            }
            if self.flow_level == 0 && i32::from(self.reader.mark.column) < indent {
                break;
            }
        }

        if leading_blanks {
            self.simple_key_allowed = true;
        }
        Ok(Token {
            data: TokenData::Scalar {
                value: string,
                style: ScalarStyle::Plain,
            },
            start_mark,
            end_mark,
        })
    }
}

/// YAML line folding: a single break becomes a space, further breaks are
/// kept.
fn fold_breaks(string: &mut String, leading_break: &mut String, trailing_breaks: &mut String) {
    if leading_break.starts_with('\n') {
        if trailing_breaks.is_empty() {
            string.push(' ');
        } else {
            string.push_str(trailing_breaks);
            trailing_breaks.clear();
        }
        leading_break.clear();
    } else {
        string.push_str(leading_break);
        string.push_str(trailing_breaks);
        leading_break.clear();
        trailing_breaks.clear();
    }
}

fn utf8_escape_width(octet: u8) -> usize {
    if octet & 0x80 == 0 {
        1
    } else if octet & 0xE0 == 0xC0 {
        2
    } else if octet & 0xF0 == 0xE0 {
        3
    } else if octet & 0xF8 == 0xF0 {
        4
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_all(input: &'static str) -> Vec<TokenData> {
        let mut scanner = Scanner::new();
        let mut bytes = input.as_bytes();
        scanner.set_input(&mut bytes);
        let mut kinds = Vec::new();
        loop {
            let token = scanner.scan().unwrap();
            let is_end = matches!(token.data, TokenData::StreamEnd);
            kinds.push(token.data);
            if is_end {
                return kinds;
            }
        }
    }

    #[test]
    fn simple_key_reconciliation_inserts_key_and_mapping_start() {
        let tokens = scan_all("alpha: 1\n");
        assert!(matches!(tokens[0], TokenData::StreamStart { .. }));
        assert!(matches!(tokens[1], TokenData::BlockMappingStart));
        assert!(matches!(tokens[2], TokenData::Key));
        assert!(matches!(tokens[3], TokenData::Scalar { ref value, .. } if value == "alpha"));
        assert!(matches!(tokens[4], TokenData::Value));
        assert!(matches!(tokens[5], TokenData::Scalar { ref value, .. } if value == "1"));
        assert!(matches!(tokens[6], TokenData::BlockEnd));
        assert!(matches!(tokens[7], TokenData::StreamEnd));
    }

    #[test]
    fn block_sequence_indentation() {
        let tokens = scan_all("- a\n- b\n");
        assert!(matches!(tokens[1], TokenData::BlockSequenceStart));
        assert!(matches!(tokens[2], TokenData::BlockEntry));
        assert!(matches!(tokens[4], TokenData::BlockEntry));
        assert!(matches!(tokens[6], TokenData::BlockEnd));
    }

    #[test]
    fn indent_stack_unwinds_at_stream_end() {
        let tokens = scan_all("a:\n  b:\n    c: 1\n");
        let block_ends = tokens
            .iter()
            .filter(|data| matches!(data, TokenData::BlockEnd))
            .count();
        assert_eq!(block_ends, 3);
    }

    #[test]
    fn folded_scalar_strip_chomping() {
        let tokens = scan_all("--- >-\n  line one\n  line two\n");
        let scalar = tokens
            .iter()
            .find_map(|data| match data {
                TokenData::Scalar { value, style } => Some((value.clone(), *style)),
                _ => None,
            })
            .unwrap();
        assert_eq!(scalar.0, "line one line two");
        assert_eq!(scalar.1, ScalarStyle::Folded);
    }

    #[test]
    fn literal_scalar_clip_keeps_final_break() {
        let tokens = scan_all("--- |\n  a\n  b\n\n");
        let scalar = tokens
            .iter()
            .find_map(|data| match data {
                TokenData::Scalar { value, .. } => Some(value.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(scalar, "a\nb\n");
    }

    #[test]
    fn double_quoted_escapes() {
        let tokens = scan_all("\"a\\tb\\u0041\\N\"\n");
        let scalar = tokens
            .iter()
            .find_map(|data| match data {
                TokenData::Scalar { value, .. } => Some(value.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(scalar, "a\tbA\u{0085}");
    }

    #[test]
    fn overlong_simple_key_is_an_error() {
        let mut input = String::new();
        for _ in 0..1100 {
            input.push('x');
        }
        input.push_str(": 1\n");
        let mut scanner = Scanner::new();
        let mut bytes = input.as_bytes();
        scanner.set_input(&mut bytes);
        let mut result = Ok(());
        loop {
            match scanner.scan() {
                Ok(token) => {
                    if matches!(token.data, TokenData::StreamEnd) {
                        break;
                    }
                }
                Err(err) => {
                    result = Err(err);
                    break;
                }
            }
        }
        assert!(result.is_err());
    }

    #[test]
    fn reserved_directive_is_skipped() {
        let tokens = scan_all("%FOO bar\n--- x\n");
        assert!(!tokens
            .iter()
            .any(|data| matches!(data, TokenData::TagDirective { .. })));
        assert!(tokens
            .iter()
            .any(|data| matches!(data, TokenData::DocumentStart)));
    }
}
