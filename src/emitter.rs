use std::collections::VecDeque;

use crate::chars::{is_alpha, is_ascii, is_blank, is_blankz, is_bom, is_break, is_breakz, is_printable, is_space};
use crate::{
    Break, CollectionStyle, EmitterError, Encoding, Event, EventData, ScalarStyle, TagDirective,
    VersionDirective, WriterError, OUTPUT_BUFFER_SIZE,
};

/// The states of the emitter, mirroring the parser's grammar.
#[derive(Copy, Clone, Default, PartialEq, Eq, Debug)]
pub(crate) enum EmitterState {
    /// Expect STREAM-START.
    #[default]
    StreamStart,
    /// Expect the first DOCUMENT-START or STREAM-END.
    FirstDocumentStart,
    /// Expect DOCUMENT-START or STREAM-END.
    DocumentStart,
    /// Expect the content of a document.
    DocumentContent,
    /// Expect DOCUMENT-END.
    DocumentEnd,
    /// Expect the first item of a flow sequence.
    FlowSequenceFirstItem,
    /// Expect an item of a flow sequence.
    FlowSequenceItem,
    /// Expect the first key of a flow mapping.
    FlowMappingFirstKey,
    /// Expect a key of a flow mapping.
    FlowMappingKey,
    /// Expect a value for a simple key of a flow mapping.
    FlowMappingSimpleValue,
    /// Expect a value of a flow mapping.
    FlowMappingValue,
    /// Expect the first item of a block sequence.
    BlockSequenceFirstItem,
    /// Expect an item of a block sequence.
    BlockSequenceItem,
    /// Expect the first key of a block mapping.
    BlockMappingFirstKey,
    /// Expect the key of a block mapping.
    BlockMappingKey,
    /// Expect a value for a simple key of a block mapping.
    BlockMappingSimpleValue,
    /// Expect a value of a block mapping.
    BlockMappingValue,
    /// Expect nothing.
    End,
}

#[derive(Default)]
struct Analysis<'a> {
    anchor: Option<AnchorAnalysis<'a>>,
    tag: Option<TagAnalysis<'a>>,
    scalar: Option<ScalarAnalysis<'a>>,
}

struct AnchorAnalysis<'a> {
    anchor: &'a str,
    alias: bool,
}

struct TagAnalysis<'a> {
    handle: &'a str,
    suffix: &'a str,
}

struct ScalarAnalysis<'a> {
    /// The scalar value.
    value: &'a str,
    /// Does the scalar contain line breaks?
    multiline: bool,
    /// Can the scalar be expressed in the flow plain style?
    flow_plain_allowed: bool,
    /// Can the scalar be expressed in the block plain style?
    block_plain_allowed: bool,
    /// Can the scalar be expressed in the single quoted style?
    single_quoted_allowed: bool,
    /// Can the scalar be expressed in the literal or folded styles?
    block_allowed: bool,
    /// The output style.
    style: ScalarStyle,
}

/// The emitter consumes events and writes correctly indented YAML to its
/// output sink, choosing styles as it goes.
pub struct Emitter<'w> {
    pub(crate) write_handler: Option<&'w mut dyn std::io::Write>,
    /// The accumulated characters, flushed to the sink in `encoding`.
    pub(crate) buffer: String,
    pub(crate) raw_buffer: Vec<u8>,
    pub(crate) encoding: Encoding,
    canonical: bool,
    best_indent: i32,
    best_width: i32,
    unicode: bool,
    line_break: Break,
    states: Vec<EmitterState>,
    state: EmitterState,
    events: VecDeque<Event>,
    indents: Vec<i32>,
    tag_directives: Vec<TagDirective>,
    indent: i32,
    flow_level: i32,
    mapping_context: bool,
    simple_key_context: bool,
    column: i32,
    whitespace: bool,
    indention: bool,
    open_ended: i32,
}

impl<'w> Default for Emitter<'w> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'w> Emitter<'w> {
    pub fn new() -> Emitter<'w> {
        Emitter {
            write_handler: None,
            buffer: String::with_capacity(OUTPUT_BUFFER_SIZE),
            raw_buffer: Vec::with_capacity(OUTPUT_BUFFER_SIZE),
            encoding: Encoding::Any,
            canonical: false,
            best_indent: 0,
            best_width: 0,
            unicode: false,
            line_break: Break::default(),
            states: Vec::with_capacity(16),
            state: EmitterState::default(),
            events: VecDeque::with_capacity(16),
            indents: Vec::with_capacity(16),
            tag_directives: Vec::with_capacity(16),
            indent: 0,
            flow_level: 0,
            mapping_context: false,
            simple_key_context: false,
            column: 0,
            whitespace: false,
            indention: false,
            open_ended: 0,
        }
    }

    /// Set a generic output handler.
    pub fn set_output(&mut self, output: &'w mut dyn std::io::Write) {
        assert!(self.write_handler.is_none(), "output already set");
        self.write_handler = Some(output);
    }

    /// Set the output encoding.
    pub fn set_encoding(&mut self, encoding: Encoding) {
        assert_eq!(self.encoding, Encoding::Any, "encoding already set");
        self.encoding = encoding;
    }

    /// Set if the output should be in the canonical format.
    pub fn set_canonical(&mut self, canonical: bool) {
        self.canonical = canonical;
    }

    /// Set the block indentation increment, 1 to 9.
    pub fn set_indent(&mut self, indent: i32) {
        self.best_indent = if 1 <= indent && indent <= 9 { indent } else { 2 };
    }

    /// Set the preferred line width; -1 means unlimited.
    pub fn set_width(&mut self, width: i32) {
        self.best_width = if width >= 0 { width } else { -1 };
    }

    /// Set if unescaped non-ASCII characters are allowed.
    pub fn set_unicode(&mut self, unicode: bool) {
        self.unicode = unicode;
    }

    /// Set the preferred line break.
    pub fn set_break(&mut self, line_break: Break) {
        self.line_break = line_break;
    }

    fn error<T>(problem: &'static str) -> Result<T, EmitterError> {
        Err(EmitterError::Problem(problem))
    }

    /// Emit an event. Events are accumulated until enough lookahead exists
    /// to decide the formatting of the current one.
    pub fn emit(&mut self, event: Event) -> Result<(), EmitterError> {
        self.events.push_back(event);
        while let Some(event) = self.needs_more_events() {
            let tag_directives = core::mem::take(&mut self.tag_directives);
            let mut analysis = self.analyze_event(&event, &tag_directives)?;
            self.state_machine(&event, &mut analysis)?;
            // The DOCUMENT-START event populates the tag directives, and this
            // happens only once, so don't swap out the tags in that case.
            if self.tag_directives.is_empty() {
                self.tag_directives = tag_directives;
            }
        }
        Ok(())
    }

    /// Pop the next event to process, or `None` while more lookahead is
    /// needed to know whether the upcoming collection is empty.
    fn needs_more_events(&mut self) -> Option<Event> {
        let first = self.events.front()?;
        let accumulate = match &first.data {
            EventData::DocumentStart { .. } => 1,
            EventData::SequenceStart { .. } => 2,
            EventData::MappingStart { .. } => 3,
            _ => return self.events.pop_front(),
        };
        if self.events.len() > accumulate {
            return self.events.pop_front();
        }
        let mut level = 0;
        for event in &self.events {
            match event.data {
                EventData::StreamStart { .. }
                | EventData::DocumentStart { .. }
                | EventData::SequenceStart { .. }
                | EventData::MappingStart { .. } => level += 1,
                EventData::StreamEnd
                | EventData::DocumentEnd { .. }
                | EventData::SequenceEnd
                | EventData::MappingEnd => level -= 1,
                _ => {}
            }
            if level == 0 {
                return self.events.pop_front();
            }
        }
        None
    }

    fn append_tag_directive(
        &mut self,
        value: TagDirective,
        allow_duplicates: bool,
    ) -> Result<(), EmitterError> {
        for tag_directive in &self.tag_directives {
            if value.handle == tag_directive.handle {
                if allow_duplicates {
                    return Ok(());
                }
                return Self::error("duplicate %TAG directive");
            }
        }
        self.tag_directives.push(value);
        Ok(())
    }

    fn increase_indent(&mut self, flow: bool, indentless: bool) {
        self.indents.push(self.indent);
        if self.indent < 0 {
            self.indent = if flow { self.best_indent } else { 0 };
        } else if !indentless {
            self.indent += self.best_indent;
        }
    }

    fn state_machine<'a>(
        &mut self,
        event: &'a Event,
        analysis: &mut Analysis<'a>,
    ) -> Result<(), EmitterError> {
        match self.state {
            EmitterState::StreamStart => self.emit_stream_start(event),
            EmitterState::FirstDocumentStart => self.emit_document_start(event, true),
            EmitterState::DocumentStart => self.emit_document_start(event, false),
            EmitterState::DocumentContent => self.emit_document_content(event, analysis),
            EmitterState::DocumentEnd => self.emit_document_end(event),
            EmitterState::FlowSequenceFirstItem => {
                self.emit_flow_sequence_item(event, true, analysis)
            }
            EmitterState::FlowSequenceItem => self.emit_flow_sequence_item(event, false, analysis),
            EmitterState::FlowMappingFirstKey => self.emit_flow_mapping_key(event, true, analysis),
            EmitterState::FlowMappingKey => self.emit_flow_mapping_key(event, false, analysis),
            EmitterState::FlowMappingSimpleValue => {
                self.emit_flow_mapping_value(event, true, analysis)
            }
            EmitterState::FlowMappingValue => self.emit_flow_mapping_value(event, false, analysis),
            EmitterState::BlockSequenceFirstItem => {
                self.emit_block_sequence_item(event, true, analysis)
            }
            EmitterState::BlockSequenceItem => {
                self.emit_block_sequence_item(event, false, analysis)
            }
            EmitterState::BlockMappingFirstKey => {
                self.emit_block_mapping_key(event, true, analysis)
            }
            EmitterState::BlockMappingKey => self.emit_block_mapping_key(event, false, analysis),
            EmitterState::BlockMappingSimpleValue => {
                self.emit_block_mapping_value(event, true, analysis)
            }
            EmitterState::BlockMappingValue => self.emit_block_mapping_value(event, false, analysis),
            EmitterState::End => Self::error("expected nothing after STREAM-END"),
        }
    }

    fn emit_stream_start(&mut self, event: &Event) -> Result<(), EmitterError> {
        self.open_ended = 0;
        let EventData::StreamStart { encoding } = &event.data else {
            return Self::error("expected STREAM-START");
        };
        if self.encoding == Encoding::Any {
            self.encoding = *encoding;
        }
        if self.encoding == Encoding::Any {
            self.encoding = Encoding::Utf8;
        }
        if self.best_indent < 1 || self.best_indent > 9 {
            self.best_indent = 2;
        }
        if self.best_width >= 0 && self.best_width <= self.best_indent * 2 {
            self.best_width = 80;
        }
        if self.best_width < 0 {
            self.best_width = i32::MAX;
        }
        if self.line_break == Break::Any {
            self.line_break = Break::Ln;
        }
        self.indent = -1;
        self.column = 0;
        self.whitespace = true;
        self.indention = true;
        if self.encoding != Encoding::Utf8 {
            self.write_bom()?;
        }
        self.state = EmitterState::FirstDocumentStart;
        Ok(())
    }

    fn emit_document_start(&mut self, event: &Event, first: bool) -> Result<(), EmitterError> {
        if let EventData::DocumentStart {
            explicit,
            version_directive,
            tag_directives,
        } = &event.data
        {
            let mut implicit = !*explicit;
            if let Some(version_directive) = version_directive {
                Self::analyze_version_directive(*version_directive)?;
            }
            for tag_directive in tag_directives {
                Self::analyze_tag_directive(tag_directive)?;
                self.append_tag_directive(tag_directive.clone(), false)?;
            }
            for tag_directive in TagDirective::defaults() {
                self.append_tag_directive(tag_directive, true)?;
            }
            if !first || self.canonical {
                implicit = false;
            }
            if (version_directive.is_some() || !tag_directives.is_empty()) && self.open_ended != 0
            {
                self.write_indicator("...", true, false, false)?;
                self.write_indent()?;
            }
            self.open_ended = 0;
            if let Some(version_directive) = version_directive {
                implicit = false;
                self.write_indicator("%YAML", true, false, false)?;
                if version_directive.minor == 1 {
                    self.write_indicator("1.1", true, false, false)?;
                } else {
                    self.write_indicator("1.2", true, false, false)?;
                }
                self.write_indent()?;
            }
            if !tag_directives.is_empty() {
                implicit = false;
                for tag_directive in tag_directives {
                    self.write_indicator("%TAG", true, false, false)?;
                    self.write_tag_handle(&tag_directive.handle)?;
                    self.write_tag_content(&tag_directive.prefix, true)?;
                    self.write_indent()?;
                }
            }
            if !implicit {
                self.write_indent()?;
                self.write_indicator("---", true, false, false)?;
                if self.canonical {
                    self.write_indent()?;
                }
            }
            self.state = EmitterState::DocumentContent;
            self.open_ended = 0;
            return Ok(());
        } else if let EventData::StreamEnd = &event.data {
            if self.open_ended == 2 {
                self.write_indicator("...", true, false, false)?;
                self.open_ended = 0;
                self.write_indent()?;
            }
            self.flush()?;
            self.state = EmitterState::End;
            return Ok(());
        }
        Self::error("expected DOCUMENT-START or STREAM-END")
    }

    fn emit_document_content<'a>(
        &mut self,
        event: &'a Event,
        analysis: &mut Analysis<'a>,
    ) -> Result<(), EmitterError> {
        self.states.push(EmitterState::DocumentEnd);
        self.emit_node(event, true, false, false, false, analysis)
    }

    fn emit_document_end(&mut self, event: &Event) -> Result<(), EmitterError> {
        let EventData::DocumentEnd { explicit } = &event.data else {
            return Self::error("expected DOCUMENT-END");
        };
        self.write_indent()?;
        if *explicit {
            self.write_indicator("...", true, false, false)?;
            self.open_ended = 0;
            self.write_indent()?;
        } else if self.open_ended == 0 {
            self.open_ended = 1;
        }
        self.flush()?;
        self.state = EmitterState::DocumentStart;
        self.tag_directives.clear();
        Ok(())
    }

    fn emit_flow_sequence_item<'a>(
        &mut self,
        event: &'a Event,
        first: bool,
        analysis: &mut Analysis<'a>,
    ) -> Result<(), EmitterError> {
        if first {
            self.write_indicator("[", true, true, false)?;
            self.increase_indent(true, false);
            self.flow_level += 1;
        }
        if let EventData::SequenceEnd = &event.data {
            self.flow_level -= 1;
            self.indent = self.indents.pop().unwrap();
            if self.canonical && !first {
                self.write_indicator(",", false, false, false)?;
                self.write_indent()?;
            }
            self.write_indicator("]", false, false, false)?;
            self.state = self.states.pop().unwrap();
            return Ok(());
        }
        if !first {
            self.write_indicator(",", false, false, false)?;
        }
        if self.canonical || self.column > self.best_width {
            self.write_indent()?;
        }
        self.states.push(EmitterState::FlowSequenceItem);
        self.emit_node(event, false, true, false, false, analysis)
    }

    fn emit_flow_mapping_key<'a>(
        &mut self,
        event: &'a Event,
        first: bool,
        analysis: &mut Analysis<'a>,
    ) -> Result<(), EmitterError> {
        if first {
            self.write_indicator("{", true, true, false)?;
            self.increase_indent(true, false);
            self.flow_level += 1;
        }
        if let EventData::MappingEnd = &event.data {
            assert!(!self.indents.is_empty(), "emitter indents should not be empty");
            self.flow_level -= 1;
            self.indent = self.indents.pop().unwrap();
            if self.canonical && !first {
                self.write_indicator(",", false, false, false)?;
                self.write_indent()?;
            }
            self.write_indicator("}", false, false, false)?;
            self.state = self.states.pop().unwrap();
            return Ok(());
        }
        if !first {
            self.write_indicator(",", false, false, false)?;
        }
        if self.canonical || self.column > self.best_width {
            self.write_indent()?;
        }
        if !self.canonical && self.check_simple_key(event, analysis) {
            self.states.push(EmitterState::FlowMappingSimpleValue);
            self.emit_node(event, false, false, true, true, analysis)
        } else {
            self.write_indicator("?", true, false, false)?;
            self.states.push(EmitterState::FlowMappingValue);
            self.emit_node(event, false, false, true, false, analysis)
        }
    }

    fn emit_flow_mapping_value<'a>(
        &mut self,
        event: &'a Event,
        simple: bool,
        analysis: &mut Analysis<'a>,
    ) -> Result<(), EmitterError> {
        if simple {
            self.write_indicator(":", false, false, false)?;
        } else {
            if self.canonical || self.column > self.best_width {
                self.write_indent()?;
            }
            self.write_indicator(":", true, false, false)?;
        }
        self.states.push(EmitterState::FlowMappingKey);
        self.emit_node(event, false, false, true, false, analysis)
    }

    fn emit_block_sequence_item<'a>(
        &mut self,
        event: &'a Event,
        first: bool,
        analysis: &mut Analysis<'a>,
    ) -> Result<(), EmitterError> {
        if first {
            self.increase_indent(false, self.mapping_context && !self.indention);
        }
        if let EventData::SequenceEnd = &event.data {
            self.indent = self.indents.pop().unwrap();
            self.state = self.states.pop().unwrap();
            return Ok(());
        }
        self.write_indent()?;
        self.write_indicator("-", true, false, true)?;
        self.states.push(EmitterState::BlockSequenceItem);
        self.emit_node(event, false, true, false, false, analysis)
    }

    fn emit_block_mapping_key<'a>(
        &mut self,
        event: &'a Event,
        first: bool,
        analysis: &mut Analysis<'a>,
    ) -> Result<(), EmitterError> {
        if first {
            self.increase_indent(false, false);
        }
        if let EventData::MappingEnd = &event.data {
            self.indent = self.indents.pop().unwrap();
            self.state = self.states.pop().unwrap();
            return Ok(());
        }
        self.write_indent()?;
        if self.check_simple_key(event, analysis) {
            self.states.push(EmitterState::BlockMappingSimpleValue);
            self.emit_node(event, false, false, true, true, analysis)
        } else {
            self.write_indicator("?", true, false, true)?;
            self.states.push(EmitterState::BlockMappingValue);
            self.emit_node(event, false, false, true, false, analysis)
        }
    }

    fn emit_block_mapping_value<'a>(
        &mut self,
        event: &'a Event,
        simple: bool,
        analysis: &mut Analysis<'a>,
    ) -> Result<(), EmitterError> {
        if simple {
            self.write_indicator(":", false, false, false)?;
        } else {
            self.write_indent()?;
            self.write_indicator(":", true, false, true)?;
        }
        self.states.push(EmitterState::BlockMappingKey);
        self.emit_node(event, false, false, true, false, analysis)
    }

    fn emit_node<'a>(
        &mut self,
        event: &'a Event,
        _root: bool,
        _sequence: bool,
        mapping: bool,
        simple_key: bool,
        analysis: &mut Analysis<'a>,
    ) -> Result<(), EmitterError> {
        self.mapping_context = mapping;
        self.simple_key_context = simple_key;

        match event.data {
            EventData::Alias { .. } => self.emit_alias(&analysis.anchor),
            EventData::Scalar { .. } => self.emit_scalar(event, analysis),
            EventData::SequenceStart { .. } => self.emit_sequence_start(event, analysis),
            EventData::MappingStart { .. } => self.emit_mapping_start(event, analysis),
            _ => Self::error("expected SCALAR, SEQUENCE-START, MAPPING-START, or ALIAS"),
        }
    }

    fn emit_alias(&mut self, analysis: &Option<AnchorAnalysis>) -> Result<(), EmitterError> {
        self.process_anchor(analysis)?;
        if self.simple_key_context {
            self.put(' ')?;
        }
        self.state = self.states.pop().unwrap();
        Ok(())
    }

    fn emit_scalar<'a>(
        &mut self,
        event: &'a Event,
        analysis: &mut Analysis<'a>,
    ) -> Result<(), EmitterError> {
        let Analysis {
            anchor,
            tag,
            scalar: Some(scalar),
        } = analysis
        else {
            unreachable!("no scalar analysis");
        };
        self.select_scalar_style(event, scalar, tag)?;
        let anchor = anchor.take();
        self.process_anchor(&anchor)?;
        let tag = tag.take();
        self.process_tag(&tag)?;
        self.increase_indent(true, false);
        self.process_scalar(scalar)?;
        self.indent = self.indents.pop().unwrap();
        self.state = self.states.pop().unwrap();
        Ok(())
    }

    fn emit_sequence_start(
        &mut self,
        event: &Event,
        analysis: &Analysis,
    ) -> Result<(), EmitterError> {
        self.process_anchor(&analysis.anchor)?;
        self.process_tag(&analysis.tag)?;
        let EventData::SequenceStart { style, .. } = &event.data else {
            unreachable!()
        };
        if self.flow_level != 0
            || self.canonical
            || *style == CollectionStyle::Flow
            || self.check_empty_sequence(event)
        {
            self.state = EmitterState::FlowSequenceFirstItem;
        } else {
            self.state = EmitterState::BlockSequenceFirstItem;
        }
        Ok(())
    }

    fn emit_mapping_start(
        &mut self,
        event: &Event,
        analysis: &Analysis,
    ) -> Result<(), EmitterError> {
        self.process_anchor(&analysis.anchor)?;
        self.process_tag(&analysis.tag)?;
        let EventData::MappingStart { style, .. } = &event.data else {
            unreachable!()
        };
        if self.flow_level != 0
            || self.canonical
            || *style == CollectionStyle::Flow
            || self.check_empty_mapping(event)
        {
            self.state = EmitterState::FlowMappingFirstKey;
        } else {
            self.state = EmitterState::BlockMappingFirstKey;
        }
        Ok(())
    }

    fn check_empty_sequence(&self, event: &Event) -> bool {
        if self.events.is_empty() {
            return false;
        }
        matches!(event.data, EventData::SequenceStart { .. })
            && matches!(self.events[0].data, EventData::SequenceEnd)
    }

    fn check_empty_mapping(&self, event: &Event) -> bool {
        if self.events.is_empty() {
            return false;
        }
        matches!(event.data, EventData::MappingStart { .. })
            && matches!(self.events[0].data, EventData::MappingEnd)
    }

    fn check_simple_key(&self, event: &Event, analysis: &Analysis) -> bool {
        let Analysis {
            tag,
            anchor,
            scalar,
        } = analysis;
        let mut length = anchor.as_ref().map_or(0, |a| a.anchor.len())
            + tag.as_ref().map_or(0, |t| t.handle.len() + t.suffix.len());
        match event.data {
            EventData::Alias { .. } => {
                length = anchor.as_ref().map_or(0, |a| a.anchor.len());
            }
            EventData::Scalar { .. } => {
                let Some(scalar) = scalar else {
                    panic!("no analysis for scalar");
                };
                if scalar.multiline {
                    return false;
                }
                length += scalar.value.len();
            }
            EventData::SequenceStart { .. } => {
                if !self.check_empty_sequence(event) {
                    return false;
                }
            }
            EventData::MappingStart { .. } => {
                if !self.check_empty_mapping(event) {
                    return false;
                }
            }
            _ => return false,
        }
        length <= 128
    }

    fn select_scalar_style<'a>(
        &mut self,
        event: &'a Event,
        scalar_analysis: &mut ScalarAnalysis,
        tag_analysis: &mut Option<TagAnalysis<'a>>,
    ) -> Result<(), EmitterError> {
        let EventData::Scalar {
            implicit, style, ..
        } = &event.data
        else {
            unreachable!()
        };
        let mut style = *style;
        let implicit = *implicit;
        let no_tag = tag_analysis.is_none();
        if no_tag && !implicit {
            return Self::error("neither tag nor implicit flag is specified");
        }
        if style == ScalarStyle::Any {
            style = ScalarStyle::Plain;
        }
        if self.canonical {
            style = ScalarStyle::DoubleQuoted;
        }
        if self.simple_key_context && scalar_analysis.multiline {
            style = ScalarStyle::DoubleQuoted;
        }
        if style == ScalarStyle::Plain {
            if self.flow_level != 0 && !scalar_analysis.flow_plain_allowed
                || self.flow_level == 0 && !scalar_analysis.block_plain_allowed
            {
                style = ScalarStyle::SingleQuoted;
            }
            if scalar_analysis.value.is_empty()
                && (self.flow_level != 0 || self.simple_key_context)
            {
                style = ScalarStyle::SingleQuoted;
            }
        }
        if style == ScalarStyle::SingleQuoted && !scalar_analysis.single_quoted_allowed {
            style = ScalarStyle::DoubleQuoted;
        }
        if (style == ScalarStyle::Literal || style == ScalarStyle::Folded)
            && (!scalar_analysis.block_allowed
                || self.flow_level != 0
                || self.simple_key_context)
        {
            style = ScalarStyle::DoubleQuoted;
        }
        scalar_analysis.style = style;
        Ok(())
    }

    fn process_anchor(&mut self, analysis: &Option<AnchorAnalysis>) -> Result<(), EmitterError> {
        let Some(analysis) = analysis.as_ref() else {
            return Ok(());
        };
        self.write_indicator(if analysis.alias { "*" } else { "&" }, true, false, false)?;
        self.write_anchor(analysis.anchor)
    }

    fn process_tag(&mut self, analysis: &Option<TagAnalysis>) -> Result<(), EmitterError> {
        let Some(analysis) = analysis.as_ref() else {
            return Ok(());
        };
        if analysis.handle.is_empty() && analysis.suffix.is_empty() {
            return Ok(());
        }
        if analysis.handle.is_empty() {
            self.write_indicator("!<", true, false, false)?;
            self.write_tag_content(analysis.suffix, false)?;
            self.write_indicator(">", false, false, false)?;
        } else {
            self.write_tag_handle(analysis.handle)?;
            if !analysis.suffix.is_empty() {
                self.write_tag_content(analysis.suffix, false)?;
            }
        }
        Ok(())
    }

    fn process_scalar(&mut self, analysis: &ScalarAnalysis) -> Result<(), EmitterError> {
        match analysis.style {
            ScalarStyle::Plain => {
                self.write_plain_scalar(analysis.value, !self.simple_key_context)
            }
            ScalarStyle::SingleQuoted => {
                self.write_single_quoted_scalar(analysis.value, !self.simple_key_context)
            }
            ScalarStyle::DoubleQuoted => {
                self.write_double_quoted_scalar(analysis.value, !self.simple_key_context)
            }
            ScalarStyle::Literal => self.write_literal_scalar(analysis.value),
            ScalarStyle::Folded => self.write_folded_scalar(analysis.value),
            ScalarStyle::Any => unreachable!("no scalar style chosen"),
        }
    }

    fn analyze_version_directive(version_directive: VersionDirective) -> Result<(), EmitterError> {
        if version_directive.major != 1
            || version_directive.minor != 1 && version_directive.minor != 2
        {
            return Self::error("incompatible %YAML directive");
        }
        Ok(())
    }

    fn analyze_tag_directive(tag_directive: &TagDirective) -> Result<(), EmitterError> {
        if tag_directive.handle.is_empty() {
            return Self::error("tag handle must not be empty");
        }
        if !tag_directive.handle.starts_with('!') {
            return Self::error("tag handle must start with '!'");
        }
        if !tag_directive.handle.ends_with('!') {
            return Self::error("tag handle must end with '!'");
        }
        if tag_directive.handle.len() > 2 {
            let content = &tag_directive.handle[1..tag_directive.handle.len() - 1];
            for ch in content.chars() {
                if !is_alpha(ch) {
                    return Self::error("tag handle must contain alphanumerical characters only");
                }
            }
        }
        if tag_directive.prefix.is_empty() {
            return Self::error("tag prefix must not be empty");
        }
        Ok(())
    }

    fn analyze_anchor<'a>(
        anchor: &'a str,
        alias: bool,
    ) -> Result<AnchorAnalysis<'a>, EmitterError> {
        if anchor.is_empty() {
            return Self::error(if alias {
                "alias value must not be empty"
            } else {
                "anchor value must not be empty"
            });
        }
        for ch in anchor.chars() {
            if !is_alpha(ch) {
                return Self::error(if alias {
                    "alias value must contain alphanumerical characters only"
                } else {
                    "anchor value must contain alphanumerical characters only"
                });
            }
        }
        Ok(AnchorAnalysis { anchor, alias })
    }

    /// Shorten a full tag through the longest matching `%TAG` prefix.
    fn analyze_tag<'a>(
        tag: &'a str,
        tag_directives: &'a [TagDirective],
    ) -> Result<TagAnalysis<'a>, EmitterError> {
        if tag.is_empty() {
            return Self::error("tag value must not be empty");
        }
        let mut handle = "";
        let mut suffix = tag;
        let mut matched_prefix = 0;
        for tag_directive in tag_directives {
            let prefix_len = tag_directive.prefix.len();
            if prefix_len < tag.len()
                && prefix_len > matched_prefix
                && tag.starts_with(&tag_directive.prefix)
            {
                handle = &tag_directive.handle;
                suffix = &tag[prefix_len..];
                matched_prefix = prefix_len;
            }
        }
        Ok(TagAnalysis { handle, suffix })
    }

    fn analyze_scalar<'a>(&self, value: &'a str) -> ScalarAnalysis<'a> {
        let mut block_indicators = false;
        let mut flow_indicators = false;
        let mut line_breaks = false;
        let mut special_characters = false;
        let mut leading_space = false;
        let mut leading_break = false;
        let mut trailing_space = false;
        let mut trailing_break = false;
        let mut break_space = false;
        let mut space_break = false;
        let mut preceded_by_whitespace;
        let mut previous_space = false;
        let mut previous_break = false;

        if value.is_empty() {
            return ScalarAnalysis {
                value: "",
                multiline: false,
                flow_plain_allowed: false,
                block_plain_allowed: true,
                single_quoted_allowed: true,
                block_allowed: false,
                style: ScalarStyle::Any,
            };
        }

        if value.starts_with("---") || value.starts_with("...") {
            block_indicators = true;
            flow_indicators = true;
        }
        preceded_by_whitespace = true;

        let mut chars = value.chars();
        let mut first = true;
        while let Some(ch) = chars.next() {
            let next = chars.clone().next();
            let followed_by_whitespace = is_blankz(next);
            if first {
                match ch {
                    '#' | ',' | '[' | ']' | '{' | '}' | '&' | '*' | '!' | '|' | '>' | '\''
                    | '"' | '%' | '@' | '`' => {
                        flow_indicators = true;
                        block_indicators = true;
                    }
                    '?' | ':' => {
                        flow_indicators = true;
                        if followed_by_whitespace {
                            block_indicators = true;
                        }
                    }
                    '-' if followed_by_whitespace => {
                        flow_indicators = true;
                        block_indicators = true;
                    }
                    _ => {}
                }
            } else {
                match ch {
                    ',' | '?' | '[' | ']' | '{' | '}' => flow_indicators = true,
                    ':' => {
                        flow_indicators = true;
                        if followed_by_whitespace {
                            block_indicators = true;
                        }
                    }
                    '#' if preceded_by_whitespace => {
                        flow_indicators = true;
                        block_indicators = true;
                    }
                    _ => {}
                }
            }

            if !is_printable(ch) || !is_ascii(ch) && !self.unicode {
                special_characters = true;
            }
            if is_break(ch) {
                line_breaks = true;
            }

            if is_space(ch) {
                if first {
                    leading_space = true;
                }
                if next.is_none() {
                    trailing_space = true;
                }
                if previous_break {
                    break_space = true;
                }
                previous_space = true;
                previous_break = false;
            } else if is_break(ch) {
                if first {
                    leading_break = true;
                }
                if next.is_none() {
                    trailing_break = true;
                }
                if previous_space {
                    space_break = true;
                }
                previous_space = false;
                previous_break = true;
            } else {
                previous_space = false;
                previous_break = false;
            }

            preceded_by_whitespace = is_blankz(ch);
            first = false;
        }

        let mut analysis = ScalarAnalysis {
            value,
            multiline: line_breaks,
            flow_plain_allowed: true,
            block_plain_allowed: true,
            single_quoted_allowed: true,
            block_allowed: true,
            style: ScalarStyle::Any,
        };
        if leading_space || leading_break || trailing_space || trailing_break {
            analysis.flow_plain_allowed = false;
            analysis.block_plain_allowed = false;
        }
        if trailing_space {
            analysis.block_allowed = false;
        }
        if break_space {
            analysis.flow_plain_allowed = false;
            analysis.block_plain_allowed = false;
            analysis.single_quoted_allowed = false;
        }
        if space_break || special_characters {
            analysis.flow_plain_allowed = false;
            analysis.block_plain_allowed = false;
            analysis.single_quoted_allowed = false;
            analysis.block_allowed = false;
        }
        if line_breaks {
            analysis.flow_plain_allowed = false;
            analysis.block_plain_allowed = false;
        }
        if flow_indicators {
            analysis.flow_plain_allowed = false;
        }
        if block_indicators {
            analysis.block_plain_allowed = false;
        }
        analysis
    }

    fn analyze_event<'a>(
        &mut self,
        event: &'a Event,
        tag_directives: &'a [TagDirective],
    ) -> Result<Analysis<'a>, EmitterError> {
        let mut analysis = Analysis::default();
        match &event.data {
            EventData::Alias { anchor } => {
                analysis.anchor = Some(Self::analyze_anchor(anchor, true)?);
            }
            EventData::Scalar {
                anchor,
                tag,
                value,
                implicit,
                ..
            } => {
                if let Some(anchor) = anchor {
                    analysis.anchor = Some(Self::analyze_anchor(anchor, false)?);
                }
                if let Some(tag) = tag {
                    if self.canonical || !*implicit {
                        analysis.tag = Some(Self::analyze_tag(tag, tag_directives)?);
                    }
                }
                analysis.scalar = Some(self.analyze_scalar(value));
            }
            EventData::SequenceStart {
                anchor,
                tag,
                implicit,
                ..
            }
            | EventData::MappingStart {
                anchor,
                tag,
                implicit,
                ..
            } => {
                if let Some(anchor) = anchor {
                    analysis.anchor = Some(Self::analyze_anchor(anchor, false)?);
                }
                if let Some(tag) = tag {
                    if self.canonical || !*implicit {
                        analysis.tag = Some(Self::analyze_tag(tag, tag_directives)?);
                    }
                }
            }
            _ => {}
        }
        Ok(analysis)
    }

    // Low-level character output.

    fn flush_if_needed(&mut self) -> Result<(), WriterError> {
        if self.buffer.len() < OUTPUT_BUFFER_SIZE - 5 {
            Ok(())
        } else {
            self.flush()
        }
    }

    fn put(&mut self, ch: char) -> Result<(), WriterError> {
        self.flush_if_needed()?;
        self.buffer.push(ch);
        self.column += 1;
        Ok(())
    }

    fn put_break(&mut self) -> Result<(), WriterError> {
        self.flush_if_needed()?;
        match self.line_break {
            Break::Cr => self.buffer.push('\r'),
            Break::Any | Break::Ln => self.buffer.push('\n'),
            Break::CrLn => self.buffer.push_str("\r\n"),
        }
        self.column = 0;
        Ok(())
    }

    fn write_string(&mut self, string: &str) -> Result<(), WriterError> {
        for ch in string.chars() {
            self.put(ch)?;
        }
        Ok(())
    }

    /// Write a line break from the scalar content, honoring the configured
    /// break for `\n` and keeping Unicode breaks verbatim.
    fn write_break_char(&mut self, ch: char) -> Result<(), WriterError> {
        if ch == '\n' {
            self.put_break()?;
        } else {
            self.put(ch)?;
            self.column = 0;
        }
        Ok(())
    }

    fn write_bom(&mut self) -> Result<(), WriterError> {
        self.flush_if_needed()?;
        self.buffer.push('\u{feff}');
        Ok(())
    }

    fn write_indent(&mut self) -> Result<(), WriterError> {
        let indent = self.indent.max(0);
        if !self.indention || self.column > indent || self.column == indent && !self.whitespace {
            self.put_break()?;
        }
        while self.column < indent {
            self.put(' ')?;
        }
        self.whitespace = true;
        self.indention = true;
        Ok(())
    }

    fn write_indicator(
        &mut self,
        indicator: &str,
        need_whitespace: bool,
        is_whitespace: bool,
        is_indention: bool,
    ) -> Result<(), WriterError> {
        if need_whitespace && !self.whitespace {
            self.put(' ')?;
        }
        self.write_string(indicator)?;
        self.whitespace = is_whitespace;
        self.indention = self.indention && is_indention;
        Ok(())
    }

    fn write_anchor(&mut self, value: &str) -> Result<(), EmitterError> {
        self.write_string(value)?;
        self.whitespace = false;
        self.indention = false;
        Ok(())
    }

    fn write_tag_handle(&mut self, value: &str) -> Result<(), EmitterError> {
        if !self.whitespace {
            self.put(' ')?;
        }
        self.write_string(value)?;
        self.whitespace = false;
        self.indention = false;
        Ok(())
    }

    fn write_tag_content(
        &mut self,
        value: &str,
        need_whitespace: bool,
    ) -> Result<(), EmitterError> {
        if need_whitespace && !self.whitespace {
            self.put(' ')?;
        }
        for ch in value.chars() {
            if is_alpha(ch)
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
                        | ','
                        | '_'
                        | '.'
                        | '~'
                        | '*'
                        | '\''
                        | '('
                        | ')'
                        | '['
                        | ']'
                )
            {
                self.put(ch)?;
                continue;
            }
            // URI-escape everything else.
            let mut encode_buffer = [0u8; 4];
            for byte in ch.encode_utf8(&mut encode_buffer).bytes() {
                let upper = char::from_digit(u32::from(byte >> 4), 16)
                    .unwrap()
                    .to_ascii_uppercase();
                let lower = char::from_digit(u32::from(byte & 0x0F), 16)
                    .unwrap()
                    .to_ascii_uppercase();
                self.put('%')?;
                self.put(upper)?;
                self.put(lower)?;
            }
        }
        self.whitespace = false;
        self.indention = false;
        Ok(())
    }

    fn write_plain_scalar(&mut self, value: &str, allow_breaks: bool) -> Result<(), EmitterError> {
        let mut spaces = false;
        let mut breaks = false;
        if !self.whitespace && (!value.is_empty() || self.flow_level != 0) {
            self.put(' ')?;
        }
        let mut chars = value.chars();
        while let Some(ch) = chars.next() {
            let next = chars.clone().next();
            if is_space(ch) {
                if allow_breaks && !spaces && self.column > self.best_width && !is_space(next) {
                    self.write_indent()?;
                } else {
                    self.put(ch)?;
                }
                spaces = true;
            } else if is_break(ch) {
                if !breaks && ch == '\n' {
                    self.put_break()?;
                }
                self.write_break_char(ch)?;
                self.indention = true;
                breaks = true;
            } else {
                if breaks {
                    self.write_indent()?;
                }
                self.put(ch)?;
                self.indention = false;
                spaces = false;
                breaks = false;
            }
        }
        self.whitespace = false;
        self.indention = false;
        Ok(())
    }

    fn write_single_quoted_scalar(
        &mut self,
        value: &str,
        allow_breaks: bool,
    ) -> Result<(), EmitterError> {
        let mut spaces = false;
        let mut breaks = false;
        self.write_indicator("'", true, false, false)?;
        let mut chars = value.chars();
        let mut is_first = true;
        while let Some(ch) = chars.next() {
            let next = chars.clone().next();
            let is_last = next.is_none();
            if is_space(ch) {
                if allow_breaks
                    && !spaces
                    && self.column > self.best_width
                    && !is_first
                    && !is_last
                    && !is_space(next)
                {
                    self.write_indent()?;
                } else {
                    self.put(ch)?;
                }
                spaces = true;
            } else if is_break(ch) {
                if !breaks && ch == '\n' {
                    self.put_break()?;
                }
                self.write_break_char(ch)?;
                self.indention = true;
                breaks = true;
            } else {
                if breaks {
                    self.write_indent()?;
                }
                if ch == '\'' {
                    self.put('\'')?;
                }
                self.put(ch)?;
                self.indention = false;
                spaces = false;
                breaks = false;
            }
            is_first = false;
        }
        if breaks {
            self.write_indent()?;
        }
        self.write_indicator("'", false, false, false)?;
        self.whitespace = false;
        self.indention = false;
        Ok(())
    }

    fn write_double_quoted_scalar(
        &mut self,
        value: &str,
        allow_breaks: bool,
    ) -> Result<(), EmitterError> {
        let mut spaces = false;
        self.write_indicator("\"", true, false, false)?;
        let mut chars = value.chars();
        let mut first = true;
        while let Some(ch) = chars.next() {
            if !is_printable(ch)
                || !self.unicode && !is_ascii(ch)
                || is_bom(ch)
                || is_break(ch)
                || ch == '"'
                || ch == '\\'
            {
                self.put('\\')?;
                match ch {
                    '\0' => self.put('0')?,
                    '\x07' => self.put('a')?,
                    '\x08' => self.put('b')?,
                    '\x09' => self.put('t')?,
                    '\x0A' => self.put('n')?,
                    '\x0B' => self.put('v')?,
                    '\x0C' => self.put('f')?,
                    '\x0D' => self.put('r')?,
                    '\x1B' => self.put('e')?,
                    '\x22' => self.put('"')?,
                    '\x5C' => self.put('\\')?,
                    '\u{0085}' => self.put('N')?,
                    '\u{00A0}' => self.put('_')?,
                    '\u{2028}' => self.put('L')?,
                    '\u{2029}' => self.put('P')?,
                    _ => {
                        let (prefix, width) = if ch <= '\u{00ff}' {
                            ('x', 2)
                        } else if ch <= '\u{ffff}' {
                            ('u', 4)
                        } else {
                            ('U', 8)
                        };
                        self.put(prefix)?;
                        let value = ch as u32;
                        let mut k = (width - 1) * 4;
                        loop {
                            let digit = (value >> k) & 0x0F;
                            let digit_char = char::from_digit(digit, 16)
                                .expect("digit out of range")
                                .to_ascii_uppercase();
                            self.put(digit_char)?;
                            if k == 0 {
                                break;
                            }
                            k -= 4;
                        }
                    }
                }
                spaces = false;
            } else if is_space(ch) {
                if allow_breaks
                    && !spaces
                    && self.column > self.best_width
                    && !first
                    && chars.clone().next().is_some()
                {
                    self.write_indent()?;
                    if is_space(chars.clone().next()) {
                        self.put('\\')?;
                    }
                } else {
                    self.put(ch)?;
                }
                spaces = true;
            } else {
                self.put(ch)?;
                spaces = false;
            }
            first = false;
        }
        self.write_indicator("\"", false, false, false)?;
        self.whitespace = false;
        self.indention = false;
        Ok(())
    }

    fn write_block_scalar_hints(&mut self, string: &str) -> Result<(), EmitterError> {
        let mut chomp_hint: Option<&str> = None;
        let first = string.chars().next();
        if is_space(first) || is_break(first) {
            let indent_hint =
                char::from_digit(self.best_indent as u32, 10).expect("indent out of range");
            let mut buffer = [0u8; 1];
            let indent_hint = indent_hint.encode_utf8(&mut buffer);
            self.write_indicator(indent_hint, false, false, false)?;
        }
        self.open_ended = 0;
        if string.is_empty() {
            chomp_hint = Some("-");
        } else {
            let mut chars_rev = string.chars().rev();
            let last = chars_rev.next();
            let before_last = chars_rev.next();
            if !is_break(last) {
                chomp_hint = Some("-");
            } else if is_breakz(before_last) {
                chomp_hint = Some("+");
                self.open_ended = 2;
            }
        }
        if let Some(chomp_hint) = chomp_hint {
            self.write_indicator(chomp_hint, false, false, false)?;
        }
        Ok(())
    }

    fn write_literal_scalar(&mut self, value: &str) -> Result<(), EmitterError> {
        let mut breaks = true;
        self.write_indicator("|", true, false, false)?;
        self.write_block_scalar_hints(value)?;
        self.put_break()?;
        self.indention = true;
        self.whitespace = true;
        for ch in value.chars() {
            if is_break(ch) {
                self.write_break_char(ch)?;
                self.indention = true;
                breaks = true;
            } else {
                if breaks {
                    self.write_indent()?;
                }
                self.put(ch)?;
                self.indention = false;
                breaks = false;
            }
        }
        Ok(())
    }

    fn write_folded_scalar(&mut self, value: &str) -> Result<(), EmitterError> {
        let mut breaks = true;
        let mut leading_spaces = true;
        self.write_indicator(">", true, false, false)?;
        self.write_block_scalar_hints(value)?;
        self.put_break()?;
        self.indention = true;
        self.whitespace = true;
        let mut chars = value.chars();
        while let Some(ch) = chars.next() {
            if is_break(ch) {
                if !breaks && !leading_spaces && ch == '\n' {
                    let mut skip_breaks = chars.clone();
                    while is_break(skip_breaks.next()) {}
                    if !is_blankz(skip_breaks.next()) {
                        self.put_break()?;
                    }
                }
                self.write_break_char(ch)?;
                self.indention = true;
                breaks = true;
            } else {
                if breaks {
                    self.write_indent()?;
                    leading_spaces = is_blank(ch);
                }
                if !breaks
                    && is_space(ch)
                    && !is_space(chars.clone().next())
                    && self.column > self.best_width
                {
                    self.write_indent()?;
                } else {
                    self.put(ch)?;
                }
                self.indention = false;
                breaks = false;
            }
        }
        Ok(())
    }
}
