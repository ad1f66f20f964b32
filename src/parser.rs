use crate::scanner::Scanner;
use crate::token::{Token, TokenData};
use crate::{
    CollectionStyle, Encoding, Event, EventData, Mark, ParserError, ScalarStyle, TagDirective,
    VersionDirective,
};

/// The parser turns the scanner's tokens into a stream of events, driven by
/// a stack of grammar states.
pub struct Parser<'r> {
    pub(crate) scanner: Scanner<'r>,
    /// The parser states stack.
    states: Vec<ParserState>,
    /// The current parser state.
    state: ParserState,
    /// The stack of marks of open constructs, for error context.
    marks: Vec<Mark>,
    /// The list of TAG directives in effect.
    tag_directives: Vec<TagDirective>,
}

impl<'r> Default for Parser<'r> {
    fn default() -> Self {
        Self::new()
    }
}

/// The states of the parser grammar.
#[derive(Copy, Clone, Default, PartialEq, Eq, Debug)]
enum ParserState {
    /// Expect STREAM-START.
    #[default]
    StreamStart,
    /// Expect the beginning of an implicit document.
    ImplicitDocumentStart,
    /// Expect DOCUMENT-START.
    DocumentStart,
    /// Expect the content of a document.
    DocumentContent,
    /// Expect DOCUMENT-END.
    DocumentEnd,
    /// Expect a block node.
    BlockNode,
    /// Expect a block node or indentless sequence.
    BlockNodeOrIndentlessSequence,
    /// Expect a flow node.
    FlowNode,
    /// Expect the first entry of a block sequence.
    BlockSequenceFirstEntry,
    /// Expect an entry of a block sequence.
    BlockSequenceEntry,
    /// Expect an entry of an indentless sequence.
    IndentlessSequenceEntry,
    /// Expect the first key of a block mapping.
    BlockMappingFirstKey,
    /// Expect a block mapping key.
    BlockMappingKey,
    /// Expect a block mapping value.
    BlockMappingValue,
    /// Expect the first entry of a flow sequence.
    FlowSequenceFirstEntry,
    /// Expect an entry of a flow sequence.
    FlowSequenceEntry,
    /// Expect a key of an ordered mapping.
    FlowSequenceEntryMappingKey,
    /// Expect a value of an ordered mapping.
    FlowSequenceEntryMappingValue,
    /// Expect the end of an ordered mapping entry.
    FlowSequenceEntryMappingEnd,
    /// Expect the first key of a flow mapping.
    FlowMappingFirstKey,
    /// Expect a key of a flow mapping.
    FlowMappingKey,
    /// Expect a value of a flow mapping.
    FlowMappingValue,
    /// Expect an empty value of a flow mapping.
    FlowMappingEmptyValue,
    /// Expect nothing.
    End,
}

impl<'r> Parser<'r> {
    /// Create a parser.
    pub fn new() -> Parser<'r> {
        Parser {
            scanner: Scanner::new(),
            states: Vec::with_capacity(16),
            state: ParserState::default(),
            marks: Vec::with_capacity(16),
            tag_directives: Vec::with_capacity(16),
        }
    }

    /// Set a generic input handler.
    pub fn set_input(&mut self, input: &'r mut dyn std::io::BufRead) {
        self.scanner.set_input(input);
    }

    /// Set the source encoding, bypassing BOM detection.
    pub fn set_encoding(&mut self, encoding: Encoding) {
        self.scanner.set_encoding(encoding);
    }

    pub(crate) fn stream_start_produced(&self) -> bool {
        self.scanner.stream_start_produced
    }

    pub(crate) fn stream_end_produced(&self) -> bool {
        self.scanner.stream_end_produced
    }

    /// Parse the input stream and produce the next event.
    ///
    /// The initial event is STREAM-START, the final one STREAM-END; after
    /// that the parser keeps returning STREAM-END events.
    pub fn parse(&mut self) -> Result<Event, ParserError> {
        if self.scanner.stream_end_produced || self.state == ParserState::End {
            return Ok(Event {
                data: EventData::StreamEnd,
                start_mark: self.scanner.mark(),
                end_mark: self.scanner.mark(),
            });
        }
        self.state_machine()
    }

    fn peek_token(&mut self) -> Result<&Token, ParserError> {
        if !self.scanner.token_available {
            self.scanner.fetch_more_tokens()?;
            if !self.scanner.token_available {
                return Err(ParserError::UnexpectedEof);
            }
        }
        Ok(self
            .scanner
            .tokens
            .front()
            .expect("token_available is true, but token queue is empty"))
    }

    fn peek_token_mut(&mut self) -> Result<&mut Token, ParserError> {
        if !self.scanner.token_available {
            self.scanner.fetch_more_tokens()?;
            if !self.scanner.token_available {
                return Err(ParserError::UnexpectedEof);
            }
        }
        Ok(self
            .scanner
            .tokens
            .front_mut()
            .expect("token_available is true, but token queue is empty"))
    }

    fn skip_token(&mut self) {
        self.scanner.token_available = false;
        self.scanner.tokens_taken += 1;
        let skipped = self
            .scanner
            .tokens
            .pop_front()
            .expect("skipped token past the end of the stream");
        self.scanner.stream_end_produced = matches!(skipped.data, TokenData::StreamEnd);
    }

    fn error<T>(problem: &'static str, mark: Mark) -> Result<T, ParserError> {
        Err(ParserError::Problem { problem, mark })
    }

    fn error_context<T>(
        context: &'static str,
        context_mark: Mark,
        problem: &'static str,
        mark: Mark,
    ) -> Result<T, ParserError> {
        Err(ParserError::ProblemWithContext {
            context,
            context_mark,
            problem,
            mark,
        })
    }

    fn state_machine(&mut self) -> Result<Event, ParserError> {
        match self.state {
            ParserState::StreamStart => self.parse_stream_start(),
            ParserState::ImplicitDocumentStart => self.parse_document_start(true),
            ParserState::DocumentStart => self.parse_document_start(false),
            ParserState::DocumentContent => self.parse_document_content(),
            ParserState::DocumentEnd => self.parse_document_end(),
            ParserState::BlockNode => self.parse_node(true, false),
            ParserState::BlockNodeOrIndentlessSequence => self.parse_node(true, true),
            ParserState::FlowNode => self.parse_node(false, false),
            ParserState::BlockSequenceFirstEntry => self.parse_block_sequence_entry(true),
            ParserState::BlockSequenceEntry => self.parse_block_sequence_entry(false),
            ParserState::IndentlessSequenceEntry => self.parse_indentless_sequence_entry(),
            ParserState::BlockMappingFirstKey => self.parse_block_mapping_key(true),
            ParserState::BlockMappingKey => self.parse_block_mapping_key(false),
            ParserState::BlockMappingValue => self.parse_block_mapping_value(),
            ParserState::FlowSequenceFirstEntry => self.parse_flow_sequence_entry(true),
            ParserState::FlowSequenceEntry => self.parse_flow_sequence_entry(false),
            ParserState::FlowSequenceEntryMappingKey => {
                self.parse_flow_sequence_entry_mapping_key()
            }
            ParserState::FlowSequenceEntryMappingValue => {
                self.parse_flow_sequence_entry_mapping_value()
            }
            ParserState::FlowSequenceEntryMappingEnd => {
                self.parse_flow_sequence_entry_mapping_end()
            }
            ParserState::FlowMappingFirstKey => self.parse_flow_mapping_key(true),
            ParserState::FlowMappingKey => self.parse_flow_mapping_key(false),
            ParserState::FlowMappingValue => self.parse_flow_mapping_value(false),
            ParserState::FlowMappingEmptyValue => self.parse_flow_mapping_value(true),
            ParserState::End => panic!("parser end state reached unexpectedly"),
        }
    }

    fn parse_stream_start(&mut self) -> Result<Event, ParserError> {
        let token = self.peek_token()?;
        if let TokenData::StreamStart { encoding } = &token.data {
            let event = Event {
                data: EventData::StreamStart {
                    encoding: *encoding,
                },
                start_mark: token.start_mark,
                end_mark: token.end_mark,
            };
            self.state = ParserState::ImplicitDocumentStart;
            self.skip_token();
            Ok(event)
        } else {
            let mark = token.start_mark;
            Self::error("did not find expected <stream-start>", mark)
        }
    }

    fn parse_document_start(&mut self, implicit: bool) -> Result<Event, ParserError> {
        let mut token = self.peek_token()?;
        if !implicit {
            while let TokenData::DocumentEnd = &token.data {
                self.skip_token();
                token = self.peek_token()?;
            }
        }
        if implicit
            && !matches!(
                token.data,
                TokenData::VersionDirective { .. }
                    | TokenData::TagDirective { .. }
                    | TokenData::DocumentStart
                    | TokenData::StreamEnd
            )
        {
            let event = Event {
                data: EventData::DocumentStart {
                    explicit: false,
                    version_directive: None,
                    tag_directives: vec![],
                },
                start_mark: token.start_mark,
                end_mark: token.end_mark,
            };
            self.process_directives()?;
            self.states.push(ParserState::DocumentEnd);
            self.state = ParserState::BlockNode;
            Ok(event)
        } else if !matches!(token.data, TokenData::StreamEnd) {
            let start_mark = token.start_mark;
            let (version_directive, tag_directives) = self.process_directives()?;
            let token = self.peek_token()?;
            if let TokenData::DocumentStart = token.data {
                let end_mark = token.end_mark;
                let event = Event {
                    data: EventData::DocumentStart {
                        explicit: true,
                        version_directive,
                        tag_directives,
                    },
                    start_mark,
                    end_mark,
                };
                self.states.push(ParserState::DocumentEnd);
                self.state = ParserState::DocumentContent;
                self.skip_token();
                Ok(event)
            } else {
                Self::error("did not find expected <document start>", token.start_mark)
            }
        } else {
            let event = Event {
                data: EventData::StreamEnd,
                start_mark: token.start_mark,
                end_mark: token.end_mark,
            };
            self.state = ParserState::End;
            self.skip_token();
            Ok(event)
        }
    }

    fn parse_document_content(&mut self) -> Result<Event, ParserError> {
        let token = self.peek_token()?;
        if let TokenData::VersionDirective { .. }
        | TokenData::TagDirective { .. }
        | TokenData::DocumentStart
        | TokenData::DocumentEnd
        | TokenData::StreamEnd = &token.data
        {
            let mark = token.start_mark;
            self.state = self.states.pop().unwrap();
            Ok(Self::empty_scalar(mark))
        } else {
            self.parse_node(true, false)
        }
    }

    fn parse_document_end(&mut self) -> Result<Event, ParserError> {
        let token = self.peek_token()?;
        let start_mark = token.start_mark;
        let mut end_mark = start_mark;
        let mut explicit = false;
        if let TokenData::DocumentEnd = &token.data {
            end_mark = token.end_mark;
            self.skip_token();
            explicit = true;
        }
        self.tag_directives.clear();
        self.state = ParserState::DocumentStart;
        Ok(Event {
            data: EventData::DocumentEnd { explicit },
            start_mark,
            end_mark,
        })
    }

    fn parse_node(&mut self, block: bool, indentless_sequence: bool) -> Result<Event, ParserError> {
        let mut anchor: Option<String> = None;
        let mut tag_handle: Option<String> = None;
        let mut tag_suffix: Option<String> = None;
        let mut tag: Option<String> = None;
        let mut tag_mark = Mark::default();

        let mut token = self.peek_token_mut()?;

        if let TokenData::Alias { value } = &mut token.data {
            let event = Event {
                data: EventData::Alias {
                    anchor: core::mem::take(value),
                },
                start_mark: token.start_mark,
                end_mark: token.end_mark,
            };
            self.state = self.states.pop().unwrap();
            self.skip_token();
            return Ok(event);
        }

        let mut start_mark = token.start_mark;
        let mut end_mark = token.start_mark;
        if let TokenData::Anchor { value } = &mut token.data {
            anchor = Some(core::mem::take(value));
            start_mark = token.start_mark;
            end_mark = token.end_mark;
            self.skip_token();
            token = self.peek_token_mut()?;
            if let TokenData::Tag { handle, suffix } = &mut token.data {
                tag_handle = Some(core::mem::take(handle));
                tag_suffix = Some(core::mem::take(suffix));
                tag_mark = token.start_mark;
                end_mark = token.end_mark;
                self.skip_token();
            }
        } else if let TokenData::Tag { handle, suffix } = &mut token.data {
            tag_handle = Some(core::mem::take(handle));
            tag_suffix = Some(core::mem::take(suffix));
            tag_mark = token.start_mark;
            start_mark = tag_mark;
            end_mark = token.end_mark;
            self.skip_token();
            token = self.peek_token_mut()?;
            if let TokenData::Anchor { value } = &mut token.data {
                anchor = Some(core::mem::take(value));
                end_mark = token.end_mark;
                self.skip_token();
            }
        }

        if let Some(handle) = &tag_handle {
            if handle.is_empty() {
                tag = tag_suffix;
            } else {
                for tag_directive in &self.tag_directives {
                    if tag_directive.handle == *handle {
                        let suffix = tag_suffix.as_deref().unwrap_or("");
                        tag = Some(format!("{}{}", tag_directive.prefix, suffix));
                        break;
                    }
                }
                if tag.is_none() {
                    return Self::error_context(
                        "while parsing a node",
                        start_mark,
                        "found undefined tag handle",
                        tag_mark,
                    );
                }
            }
        }

        // True iff no explicit tag token was present (the non-specific "!"
        // counts as absent).
        let implicit = match tag.as_deref() {
            None | Some("" | "!") => true,
            Some(_) => false,
        };

        let token = self.peek_token_mut()?;

        if indentless_sequence && matches!(token.data, TokenData::BlockEntry) {
            end_mark = token.end_mark;
            self.state = ParserState::IndentlessSequenceEntry;
            Ok(Event {
                data: EventData::SequenceStart {
                    anchor,
                    tag,
                    implicit,
                    style: CollectionStyle::Block,
                },
                start_mark,
                end_mark,
            })
        } else if let TokenData::Scalar { value, style } = &mut token.data {
            end_mark = token.end_mark;
            let event = Event {
                data: EventData::Scalar {
                    anchor,
                    tag,
                    value: core::mem::take(value),
                    implicit,
                    style: *style,
                },
                start_mark,
                end_mark,
            };
            self.state = self.states.pop().unwrap();
            self.skip_token();
            Ok(event)
        } else if let TokenData::FlowSequenceStart = &token.data {
            end_mark = token.end_mark;
            self.state = ParserState::FlowSequenceFirstEntry;
            Ok(Event {
                data: EventData::SequenceStart {
                    anchor,
                    tag,
                    implicit,
                    style: CollectionStyle::Flow,
                },
                start_mark,
                end_mark,
            })
        } else if let TokenData::FlowMappingStart = &token.data {
            end_mark = token.end_mark;
            self.state = ParserState::FlowMappingFirstKey;
            Ok(Event {
                data: EventData::MappingStart {
                    anchor,
                    tag,
                    implicit,
                    style: CollectionStyle::Flow,
                },
                start_mark,
                end_mark,
            })
        } else if block && matches!(token.data, TokenData::BlockSequenceStart) {
            end_mark = token.end_mark;
            self.state = ParserState::BlockSequenceFirstEntry;
            Ok(Event {
                data: EventData::SequenceStart {
                    anchor,
                    tag,
                    implicit,
                    style: CollectionStyle::Block,
                },
                start_mark,
                end_mark,
            })
        } else if block && matches!(token.data, TokenData::BlockMappingStart) {
            end_mark = token.end_mark;
            self.state = ParserState::BlockMappingFirstKey;
            Ok(Event {
                data: EventData::MappingStart {
                    anchor,
                    tag,
                    implicit,
                    style: CollectionStyle::Block,
                },
                start_mark,
                end_mark,
            })
        } else if anchor.is_some() || tag.is_some() {
            // An anchor or tag with no node after it stands for an empty
            // scalar.
            self.state = self.states.pop().unwrap();
            Ok(Event {
                data: EventData::Scalar {
                    anchor,
                    tag,
                    value: String::new(),
                    implicit,
                    style: ScalarStyle::Plain,
                },
                start_mark,
                end_mark,
            })
        } else {
            Self::error_context(
                if block {
                    "while parsing a block node"
                } else {
                    "while parsing a flow node"
                },
                start_mark,
                "did not find expected node content",
                token.start_mark,
            )
        }
    }

    fn parse_block_sequence_entry(&mut self, first: bool) -> Result<Event, ParserError> {
        if first {
            let token = self.peek_token()?;
            let mark = token.start_mark;
            self.marks.push(mark);
            self.skip_token();
        }

        let token = self.peek_token()?;
        if let TokenData::BlockEntry = &token.data {
            let mark = token.end_mark;
            self.skip_token();
            let token = self.peek_token()?;
            if matches!(token.data, TokenData::BlockEntry | TokenData::BlockEnd) {
                self.state = ParserState::BlockSequenceEntry;
                Ok(Self::empty_scalar(mark))
            } else {
                self.states.push(ParserState::BlockSequenceEntry);
                self.parse_node(true, false)
            }
        } else if let TokenData::BlockEnd = token.data {
            let event = Event {
                data: EventData::SequenceEnd,
                start_mark: token.start_mark,
                end_mark: token.end_mark,
            };
            self.state = self.states.pop().unwrap();
            let _ = self.marks.pop();
            self.skip_token();
            Ok(event)
        } else {
            let token_mark = token.start_mark;
            let mark = self.marks.pop().unwrap();
            Self::error_context(
                "while parsing a block collection",
                mark,
                "did not find expected '-' indicator",
                token_mark,
            )
        }
    }

    fn parse_indentless_sequence_entry(&mut self) -> Result<Event, ParserError> {
        let token = self.peek_token()?;
        if let TokenData::BlockEntry = token.data {
            let mark = token.end_mark;
            self.skip_token();
            let token = self.peek_token()?;
            if matches!(
                token.data,
                TokenData::BlockEntry | TokenData::Key | TokenData::Value | TokenData::BlockEnd
            ) {
                self.state = ParserState::IndentlessSequenceEntry;
                Ok(Self::empty_scalar(mark))
            } else {
                self.states.push(ParserState::IndentlessSequenceEntry);
                self.parse_node(true, false)
            }
        } else {
            let event = Event {
                data: EventData::SequenceEnd,
                start_mark: token.start_mark,
                end_mark: token.end_mark,
            };
            self.state = self.states.pop().unwrap();
            Ok(event)
        }
    }

    fn parse_block_mapping_key(&mut self, first: bool) -> Result<Event, ParserError> {
        if first {
            let token = self.peek_token()?;
            let mark = token.start_mark;
            self.marks.push(mark);
            self.skip_token();
        }

        let token = self.peek_token()?;
        if let TokenData::Key = token.data {
            let mark = token.end_mark;
            self.skip_token();
            let token = self.peek_token()?;
            if matches!(
                token.data,
                TokenData::Key | TokenData::Value | TokenData::BlockEnd
            ) {
                self.state = ParserState::BlockMappingValue;
                Ok(Self::empty_scalar(mark))
            } else {
                self.states.push(ParserState::BlockMappingValue);
                self.parse_node(true, true)
            }
        } else if let TokenData::BlockEnd = token.data {
            let event = Event {
                data: EventData::MappingEnd,
                start_mark: token.start_mark,
                end_mark: token.end_mark,
            };
            self.state = self.states.pop().unwrap();
            let _ = self.marks.pop();
            self.skip_token();
            Ok(event)
        } else {
            let token_mark = token.start_mark;
            let mark = self.marks.pop().unwrap();
            Self::error_context(
                "while parsing a block mapping",
                mark,
                "did not find expected key",
                token_mark,
            )
        }
    }

    fn parse_block_mapping_value(&mut self) -> Result<Event, ParserError> {
        let token = self.peek_token()?;
        if let TokenData::Value = token.data {
            let mark = token.end_mark;
            self.skip_token();
            let token = self.peek_token()?;
            if matches!(
                token.data,
                TokenData::Key | TokenData::Value | TokenData::BlockEnd
            ) {
                self.state = ParserState::BlockMappingKey;
                Ok(Self::empty_scalar(mark))
            } else {
                self.states.push(ParserState::BlockMappingKey);
                self.parse_node(true, true)
            }
        } else {
            let mark = token.start_mark;
            self.state = ParserState::BlockMappingKey;
            Ok(Self::empty_scalar(mark))
        }
    }

    fn parse_flow_sequence_entry(&mut self, first: bool) -> Result<Event, ParserError> {
        if first {
            let token = self.peek_token()?;
            let mark = token.start_mark;
            self.marks.push(mark);
            self.skip_token();
        }

        let mut token = self.peek_token()?;
        if !matches!(token.data, TokenData::FlowSequenceEnd) {
            if !first {
                if let TokenData::FlowEntry = token.data {
                    self.skip_token();
                    token = self.peek_token()?;
                } else {
                    let token_mark = token.start_mark;
                    let mark = self.marks.pop().unwrap();
                    return Self::error_context(
                        "while parsing a flow sequence",
                        mark,
                        "did not find expected ',' or ']'",
                        token_mark,
                    );
                }
            }
            if let TokenData::Key = token.data {
                let event = Event {
                    data: EventData::MappingStart {
                        anchor: None,
                        tag: None,
                        implicit: true,
                        style: CollectionStyle::Flow,
                    },
                    start_mark: token.start_mark,
                    end_mark: token.end_mark,
                };
                self.state = ParserState::FlowSequenceEntryMappingKey;
                self.skip_token();
                return Ok(event);
            } else if !matches!(token.data, TokenData::FlowSequenceEnd) {
                self.states.push(ParserState::FlowSequenceEntry);
                return self.parse_node(false, false);
            }
        }
        let event = Event {
            data: EventData::SequenceEnd,
            start_mark: token.start_mark,
            end_mark: token.end_mark,
        };
        self.state = self.states.pop().unwrap();
        let _ = self.marks.pop();
        self.skip_token();
        Ok(event)
    }

    fn parse_flow_sequence_entry_mapping_key(&mut self) -> Result<Event, ParserError> {
        let token = self.peek_token()?;
        if matches!(
            token.data,
            TokenData::Value | TokenData::FlowEntry | TokenData::FlowSequenceEnd
        ) {
            let mark = token.end_mark;
            self.skip_token();
            self.state = ParserState::FlowSequenceEntryMappingValue;
            Ok(Self::empty_scalar(mark))
        } else {
            self.states.push(ParserState::FlowSequenceEntryMappingValue);
            self.parse_node(false, false)
        }
    }

    fn parse_flow_sequence_entry_mapping_value(&mut self) -> Result<Event, ParserError> {
        let token = self.peek_token()?;
        if let TokenData::Value = token.data {
            self.skip_token();
            let token = self.peek_token()?;
            if !matches!(
                token.data,
                TokenData::FlowEntry | TokenData::FlowSequenceEnd
            ) {
                self.states.push(ParserState::FlowSequenceEntryMappingEnd);
                return self.parse_node(false, false);
            }
            let mark = token.start_mark;
            self.state = ParserState::FlowSequenceEntryMappingEnd;
            Ok(Self::empty_scalar(mark))
        } else {
            let mark = token.start_mark;
            self.state = ParserState::FlowSequenceEntryMappingEnd;
            Ok(Self::empty_scalar(mark))
        }
    }

    fn parse_flow_sequence_entry_mapping_end(&mut self) -> Result<Event, ParserError> {
        let token = self.peek_token()?;
        let start_mark = token.start_mark;
        let end_mark = token.end_mark;
        self.state = ParserState::FlowSequenceEntry;
        Ok(Event {
            data: EventData::MappingEnd,
            start_mark,
            end_mark,
        })
    }

    fn parse_flow_mapping_key(&mut self, first: bool) -> Result<Event, ParserError> {
        if first {
            let token = self.peek_token()?;
            let mark = token.start_mark;
            self.marks.push(mark);
            self.skip_token();
        }

        let mut token = self.peek_token()?;
        if !matches!(token.data, TokenData::FlowMappingEnd) {
            if !first {
                if let TokenData::FlowEntry = token.data {
                    self.skip_token();
                    token = self.peek_token()?;
                } else {
                    let token_mark = token.start_mark;
                    let mark = self.marks.pop().unwrap();
                    return Self::error_context(
                        "while parsing a flow mapping",
                        mark,
                        "did not find expected ',' or '}'",
                        token_mark,
                    );
                }
            }
            if let TokenData::Key = token.data {
                self.skip_token();
                let token = self.peek_token()?;
                if !matches!(
                    token.data,
                    TokenData::Value | TokenData::FlowEntry | TokenData::FlowMappingEnd
                ) {
                    self.states.push(ParserState::FlowMappingValue);
                    return self.parse_node(false, false);
                }
                let mark = token.start_mark;
                self.state = ParserState::FlowMappingValue;
                return Ok(Self::empty_scalar(mark));
            } else if !matches!(token.data, TokenData::FlowMappingEnd) {
                self.states.push(ParserState::FlowMappingEmptyValue);
                return self.parse_node(false, false);
            }
        }
        let event = Event {
            data: EventData::MappingEnd,
            start_mark: token.start_mark,
            end_mark: token.end_mark,
        };
        self.state = self.states.pop().unwrap();
        let _ = self.marks.pop();
        self.skip_token();
        Ok(event)
    }

    fn parse_flow_mapping_value(&mut self, empty: bool) -> Result<Event, ParserError> {
        let token = self.peek_token()?;
        if empty {
            let mark = token.start_mark;
            self.state = ParserState::FlowMappingKey;
            return Ok(Self::empty_scalar(mark));
        }
        if let TokenData::Value = token.data {
            self.skip_token();
            let token = self.peek_token()?;
            if !matches!(token.data, TokenData::FlowEntry | TokenData::FlowMappingEnd) {
                self.states.push(ParserState::FlowMappingKey);
                return self.parse_node(false, false);
            }
            let mark = token.start_mark;
            self.state = ParserState::FlowMappingKey;
            Ok(Self::empty_scalar(mark))
        } else {
            let mark = token.start_mark;
            self.state = ParserState::FlowMappingKey;
            Ok(Self::empty_scalar(mark))
        }
    }

    /// The grammar requires a node here, but none is present in the input.
    fn empty_scalar(mark: Mark) -> Event {
        Event {
            data: EventData::Scalar {
                anchor: None,
                tag: None,
                value: String::new(),
                implicit: true,
                style: ScalarStyle::Plain,
            },
            start_mark: mark,
            end_mark: mark,
        }
    }

    /// Eat the directive tokens at a document start, extending the tag
    /// directive table. Returns what the DOCUMENT-START event should carry.
    fn process_directives(
        &mut self,
    ) -> Result<(Option<VersionDirective>, Vec<TagDirective>), ParserError> {
        let mut version_directive: Option<VersionDirective> = None;
        let mut tag_directives = Vec::new();

        let mut token = self.peek_token_mut()?;
        loop {
            match &mut token.data {
                TokenData::VersionDirective { major, minor } => {
                    let mark = token.start_mark;
                    if version_directive.is_some() {
                        return Self::error("found duplicate %YAML directive", mark);
                    }
                    if *major != 1 || *minor != 1 && *minor != 2 {
                        return Self::error("found incompatible YAML document", mark);
                    }
                    if *minor == 2 {
                        log::warn!("{mark}: %YAML 1.2 document processed in 1.1 mode");
                    }
                    version_directive = Some(VersionDirective {
                        major: *major,
                        minor: *minor,
                    });
                }
                TokenData::TagDirective { handle, prefix } => {
                    let value = TagDirective {
                        handle: core::mem::take(handle),
                        prefix: core::mem::take(prefix),
                    };
                    let mark = token.start_mark;
                    self.append_tag_directive(value.clone(), false, mark)?;
                    tag_directives.push(value);
                }
                _ => break,
            }
            self.skip_token();
            token = self.peek_token_mut()?;
        }

        let start_mark = token.start_mark;
        for default in TagDirective::defaults() {
            self.append_tag_directive(default, true, start_mark)?;
        }
        Ok((version_directive, tag_directives))
    }

    fn append_tag_directive(
        &mut self,
        value: TagDirective,
        allow_duplicates: bool,
        mark: Mark,
    ) -> Result<(), ParserError> {
        for tag_directive in &self.tag_directives {
            if value.handle == tag_directive.handle {
                if allow_duplicates {
                    return Ok(());
                }
                return Self::error("found duplicate %TAG directive", mark);
            }
        }
        self.tag_directives.push(value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_all(input: &'static str) -> Result<Vec<EventData>, ParserError> {
        let mut parser = Parser::new();
        let mut bytes = input.as_bytes();
        parser.set_input(&mut bytes);
        let mut events = Vec::new();
        loop {
            let event = parser.parse()?;
            let is_end = matches!(event.data, EventData::StreamEnd);
            events.push(event.data);
            if is_end {
                return Ok(events);
            }
        }
    }

    #[test]
    fn implicit_document() {
        let events = parse_all("hello\n").unwrap();
        assert!(matches!(events[0], EventData::StreamStart { .. }));
        assert!(matches!(
            events[1],
            EventData::DocumentStart { explicit: false, .. }
        ));
        assert!(
            matches!(&events[2], EventData::Scalar { value, implicit: true, .. } if value == "hello")
        );
        assert!(matches!(events[3], EventData::DocumentEnd { .. }));
    }

    #[test]
    fn tag_shorthand_expansion() {
        let events = parse_all("%TAG !e! tag:example.com,2000:app/\n--- !e!thing x\n").unwrap();
        assert!(events.iter().any(|data| matches!(
            data,
            EventData::Scalar { tag: Some(tag), implicit: false, .. }
                if tag == "tag:example.com,2000:app/thing"
        )));
    }

    #[test]
    fn secondary_handle_expands_to_yaml_org() {
        let events = parse_all("!!str 5\n").unwrap();
        assert!(events.iter().any(|data| matches!(
            data,
            EventData::Scalar { tag: Some(tag), .. } if tag == "tag:yaml.org,2002:str"
        )));
    }

    #[test]
    fn duplicate_tag_directive_is_fatal() {
        let err = parse_all("%TAG !e! tag:a\n%TAG !e! tag:b\n--- x\n").unwrap_err();
        assert!(matches!(err, ParserError::Problem { .. }));
    }

    #[test]
    fn unsupported_version_is_fatal() {
        assert!(parse_all("%YAML 2.0\n--- x\n").is_err());
        assert!(parse_all("%YAML 1.0\n--- x\n").is_err());
        assert!(parse_all("%YAML 1.1\n--- x\n").is_ok());
    }

    #[test]
    fn flow_sequence_of_pairs() {
        let events = parse_all("[a: b]\n").unwrap();
        // A `key: value` inside a flow sequence becomes a one-pair mapping.
        assert!(events
            .iter()
            .any(|data| matches!(data, EventData::MappingStart { .. })));
    }
}
