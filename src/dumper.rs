use crate::node::Node;
use crate::representer::Representer;
use crate::serializer::Serializer;
use crate::{
    Break, CollectionStyle, Emitter, Event, ScalarStyle, TagDirective, VersionDirective,
    YamlError,
};

/// Writes node trees out as YAML, with the configuration knobs of the
/// emitter plus document framing.
pub struct Dumper {
    indent: i32,
    text_width: i32,
    line_break: Break,
    canonical: bool,
    unicode: bool,
    explicit_start: bool,
    explicit_end: bool,
    version_directive: Option<VersionDirective>,
    tag_directives: Vec<TagDirective>,
    default_scalar_style: ScalarStyle,
    default_collection_style: CollectionStyle,
}

impl Default for Dumper {
    fn default() -> Self {
        Self::new()
    }
}

impl Dumper {
    pub fn new() -> Dumper {
        Dumper {
            indent: 2,
            text_width: 80,
            line_break: Break::Ln,
            canonical: false,
            unicode: true,
            explicit_start: false,
            explicit_end: false,
            version_directive: None,
            tag_directives: Vec::new(),
            default_scalar_style: ScalarStyle::Any,
            default_collection_style: CollectionStyle::Any,
        }
    }

    /// Block indentation width, 1 to 9.
    pub fn set_indent(&mut self, indent: i32) {
        self.indent = indent;
    }

    /// Soft line wrap column.
    pub fn set_text_width(&mut self, width: i32) {
        self.text_width = width;
    }

    pub fn set_line_break(&mut self, line_break: Break) {
        self.line_break = line_break;
    }

    /// Force tags and flow style.
    pub fn set_canonical(&mut self, canonical: bool) {
        self.canonical = canonical;
    }

    /// Allow unescaped non-ASCII characters.
    pub fn set_unicode(&mut self, unicode: bool) {
        self.unicode = unicode;
    }

    /// Emit `---` before every document.
    pub fn set_explicit_start(&mut self, explicit: bool) {
        self.explicit_start = explicit;
    }

    /// Emit `...` after every document.
    pub fn set_explicit_end(&mut self, explicit: bool) {
        self.explicit_end = explicit;
    }

    /// Emit a `%YAML` directive with this version; implies an explicit
    /// document start.
    pub fn set_yaml_version(&mut self, major: i32, minor: i32) {
        self.version_directive = Some(VersionDirective { major, minor });
    }

    /// Emit a `%TAG` directive and use it to shorten matching tags.
    pub fn add_tag_directive(&mut self, handle: &str, prefix: &str) {
        self.tag_directives.push(TagDirective {
            handle: String::from(handle),
            prefix: String::from(prefix),
        });
    }

    /// The scalar style used where a node does not pick one.
    pub fn set_default_scalar_style(&mut self, style: ScalarStyle) {
        self.default_scalar_style = style;
    }

    /// The collection style used where a node does not pick one.
    pub fn set_default_collection_style(&mut self, style: CollectionStyle) {
        self.default_collection_style = style;
    }

    /// Dump every node as its own document.
    pub fn dump(
        &self,
        output: &mut dyn std::io::Write,
        nodes: &[Node],
    ) -> Result<(), YamlError> {
        let mut emitter = Emitter::new();
        emitter.set_output(output);
        emitter.set_indent(self.indent);
        emitter.set_width(self.text_width);
        emitter.set_break(self.line_break);
        emitter.set_canonical(self.canonical);
        emitter.set_unicode(self.unicode);

        let mut representer = Representer::new();
        representer.set_default_styles(self.default_scalar_style, self.default_collection_style);
        let mut serializer = Serializer::new();

        emitter
            .emit(Event::stream_start(crate::Encoding::Utf8))
            .map_err(YamlError::from)?;
        for node in nodes {
            let represented = representer.represent(node)?;
            let explicit = self.explicit_start || self.version_directive.is_some();
            emitter
                .emit(Event::document_start(
                    explicit,
                    self.version_directive,
                    &self.tag_directives,
                ))
                .map_err(YamlError::from)?;
            serializer
                .serialize(&mut emitter, &represented)
                .map_err(YamlError::from)?;
            emitter
                .emit(Event::document_end(self.explicit_end))
                .map_err(YamlError::from)?;
        }
        emitter.emit(Event::stream_end()).map_err(YamlError::from)?;
        Ok(())
    }

    /// Dump a single node and return the bytes.
    pub fn dump_to_vec(&self, node: &Node) -> Result<Vec<u8>, YamlError> {
        let mut output = Vec::new();
        self.dump(&mut output, std::slice::from_ref(node))?;
        Ok(output)
    }
}

/// Dump one node as one document with the default configuration.
pub fn dump(output: &mut dyn std::io::Write, node: &Node) -> Result<(), YamlError> {
    Dumper::new().dump(output, std::slice::from_ref(node))
}

/// Dump several nodes as a multi-document stream with the default
/// configuration.
pub fn dump_all(output: &mut dyn std::io::Write, nodes: &[Node]) -> Result<(), YamlError> {
    Dumper::new().dump(output, nodes)
}
