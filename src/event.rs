use crate::{CollectionStyle, Encoding, Mark, ScalarStyle, TagDirective, VersionDirective};

/// The event structure.
#[derive(Debug, PartialEq)]
pub struct Event {
    /// The event data.
    pub data: EventData,
    /// The beginning of the event.
    pub start_mark: Mark,
    /// The end of the event.
    pub end_mark: Mark,
}

#[derive(Debug, PartialEq)]
pub enum EventData {
    /// The stream parameters.
    StreamStart {
        /// The document encoding.
        encoding: Encoding,
    },
    StreamEnd,
    /// The document parameters.
    DocumentStart {
        /// Was the document started by an explicit `---` indicator (or should
        /// it be emitted with one)?
        explicit: bool,
        /// The version directive.
        version_directive: Option<VersionDirective>,
        /// The tag directives list.
        tag_directives: Vec<TagDirective>,
    },
    /// The document end parameters.
    DocumentEnd {
        /// Was the document ended by an explicit `...` indicator?
        explicit: bool,
    },
    /// The alias parameters.
    Alias {
        /// The anchor.
        anchor: String,
    },
    /// The scalar parameters.
    Scalar {
        /// The anchor.
        anchor: Option<String>,
        /// The tag, in full form.
        tag: Option<String>,
        /// The scalar value.
        value: String,
        /// May the tag be omitted and left to the resolver?
        implicit: bool,
        /// The scalar style.
        style: ScalarStyle,
    },
    /// The sequence parameters.
    SequenceStart {
        /// The anchor.
        anchor: Option<String>,
        /// The tag, in full form.
        tag: Option<String>,
        /// May the tag be omitted?
        implicit: bool,
        /// The sequence style.
        style: CollectionStyle,
    },
    SequenceEnd,
    /// The mapping parameters.
    MappingStart {
        /// The anchor.
        anchor: Option<String>,
        /// The tag, in full form.
        tag: Option<String>,
        /// May the tag be omitted?
        implicit: bool,
        /// The mapping style.
        style: CollectionStyle,
    },
    MappingEnd,
}

impl Event {
    /// Make an event from its data, setting both marks to zero.
    pub(crate) fn new(data: EventData) -> Self {
        Self {
            data,
            start_mark: Mark::default(),
            end_mark: Mark::default(),
        }
    }

    /// Create the STREAM-START event.
    pub fn stream_start(encoding: Encoding) -> Self {
        Self::new(EventData::StreamStart { encoding })
    }

    /// Create the STREAM-END event.
    pub fn stream_end() -> Self {
        Self::new(EventData::StreamEnd)
    }

    /// Create the DOCUMENT-START event.
    ///
    /// The `explicit` argument is a stylistic parameter and may be overridden
    /// by the emitter.
    pub fn document_start(
        explicit: bool,
        version_directive: Option<VersionDirective>,
        tag_directives: &[TagDirective],
    ) -> Self {
        Self::new(EventData::DocumentStart {
            explicit,
            version_directive,
            tag_directives: tag_directives.to_vec(),
        })
    }

    /// Create the DOCUMENT-END event.
    pub fn document_end(explicit: bool) -> Self {
        Self::new(EventData::DocumentEnd { explicit })
    }

    /// Create an ALIAS event.
    pub fn alias(anchor: &str) -> Self {
        Self::new(EventData::Alias {
            anchor: String::from(anchor),
        })
    }

    /// Create a SCALAR event.
    ///
    /// Either `tag` must be present or `implicit` must be set, otherwise the
    /// emitter rejects the event.
    pub fn scalar(
        anchor: Option<&str>,
        tag: Option<&str>,
        value: &str,
        implicit: bool,
        style: ScalarStyle,
    ) -> Self {
        Self::new(EventData::Scalar {
            anchor: anchor.map(String::from),
            tag: tag.map(String::from),
            value: String::from(value),
            implicit,
            style,
        })
    }

    /// Create a SEQUENCE-START event.
    pub fn sequence_start(
        anchor: Option<&str>,
        tag: Option<&str>,
        implicit: bool,
        style: CollectionStyle,
    ) -> Self {
        Self::new(EventData::SequenceStart {
            anchor: anchor.map(String::from),
            tag: tag.map(String::from),
            implicit,
            style,
        })
    }

    /// Create a SEQUENCE-END event.
    pub fn sequence_end() -> Self {
        Self::new(EventData::SequenceEnd)
    }

    /// Create a MAPPING-START event.
    pub fn mapping_start(
        anchor: Option<&str>,
        tag: Option<&str>,
        implicit: bool,
        style: CollectionStyle,
    ) -> Self {
        Self::new(EventData::MappingStart {
            anchor: anchor.map(String::from),
            tag: tag.map(String::from),
            implicit,
            style,
        })
    }

    /// Create a MAPPING-END event.
    pub fn mapping_end() -> Self {
        Self::new(EventData::MappingEnd)
    }
}
