#![doc = include_str!("../README.md")]
#![doc(html_root_url = "https://docs.rs/yaml11/0.1.0")]
#![warn(clippy::pedantic)]
#![allow(
    clippy::cast_lossless,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::manual_range_contains,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::struct_excessive_bools,
    clippy::too_many_lines,
    clippy::unnecessary_wraps
)]
#![deny(unsafe_code)]

mod chars;
mod composer;
mod constructor;
mod dumper;
mod emitter;
mod error;
mod event;
mod loader;
mod node;
mod parser;
mod reader;
mod representer;
mod resolver;
mod scanner;
mod serializer;
mod token;
mod writer;

pub use crate::composer::Composer;
pub use crate::constructor::Constructor;
pub use crate::dumper::{dump, dump_all, Dumper};
pub use crate::emitter::Emitter;
pub use crate::error::{
    ComposerError, ConstructorError, EmitterError, Mark, ParserError, ReaderError,
    RepresenterError, ScannerError, WriterError, YamlError,
};
pub use crate::event::{Event, EventData};
pub use crate::loader::{load, load_all, Loader};
pub use crate::node::{Node, NodeValue};
pub use crate::parser::Parser;
pub use crate::representer::Representer;
pub use crate::resolver::{NodeKind, Resolver};
pub use crate::scanner::Scanner;
pub use crate::serializer::Serializer;
pub use crate::token::{Token, TokenData};

pub(crate) const INPUT_RAW_BUFFER_SIZE: usize = 16384;
pub(crate) const OUTPUT_BUFFER_SIZE: usize = 16384;

/// The tag `!!null` with the only possible value: `null`.
pub const NULL_TAG: &str = "tag:yaml.org,2002:null";
/// The tag `!!bool` with the values: `true` and `false`.
pub const BOOL_TAG: &str = "tag:yaml.org,2002:bool";
/// The tag `!!str` for string values.
pub const STR_TAG: &str = "tag:yaml.org,2002:str";
/// The tag `!!int` for integer values.
pub const INT_TAG: &str = "tag:yaml.org,2002:int";
/// The tag `!!float` for float values.
pub const FLOAT_TAG: &str = "tag:yaml.org,2002:float";
/// The tag `!!binary` for base64-encoded byte strings.
pub const BINARY_TAG: &str = "tag:yaml.org,2002:binary";
/// The tag `!!timestamp` for date and time values.
pub const TIMESTAMP_TAG: &str = "tag:yaml.org,2002:timestamp";
/// The tag `!!merge` for the `<<` merge key.
pub const MERGE_TAG: &str = "tag:yaml.org,2002:merge";
/// The tag `!!value` for the `=` default key.
pub const VALUE_TAG: &str = "tag:yaml.org,2002:value";

/// The tag `!!seq` is used to denote sequences.
pub const SEQ_TAG: &str = "tag:yaml.org,2002:seq";
/// The tag `!!map` is used to denote mappings.
pub const MAP_TAG: &str = "tag:yaml.org,2002:map";
/// The tag `!!omap` for ordered mappings.
pub const OMAP_TAG: &str = "tag:yaml.org,2002:omap";
/// The tag `!!pairs` for ordered mappings with duplicate keys.
pub const PAIRS_TAG: &str = "tag:yaml.org,2002:pairs";
/// The tag `!!set` for unordered sets.
pub const SET_TAG: &str = "tag:yaml.org,2002:set";

/// The default scalar tag is `!!str`.
pub const DEFAULT_SCALAR_TAG: &str = STR_TAG;
/// The default sequence tag is `!!seq`.
pub const DEFAULT_SEQUENCE_TAG: &str = SEQ_TAG;
/// The default mapping tag is `!!map`.
pub const DEFAULT_MAPPING_TAG: &str = MAP_TAG;

/// The version directive data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VersionDirective {
    /// The major version number.
    pub major: i32,
    /// The minor version number.
    pub minor: i32,
}

/// The tag directive data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagDirective {
    /// The tag handle.
    pub handle: String,
    /// The tag prefix.
    pub prefix: String,
}

impl TagDirective {
    /// The two handles every document starts with: `!` and `!!`.
    pub(crate) fn defaults() -> [TagDirective; 2] {
        [
            TagDirective {
                handle: String::from("!"),
                prefix: String::from("!"),
            },
            TagDirective {
                handle: String::from("!!"),
                prefix: String::from("tag:yaml.org,2002:"),
            },
        ]
    }
}

/// The stream encoding.
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Encoding {
    /// Let the reader detect the encoding from the byte order mark.
    #[default]
    Any,
    /// The default UTF-8 encoding.
    Utf8,
    /// The UTF-16-LE encoding with BOM.
    Utf16Le,
    /// The UTF-16-BE encoding with BOM.
    Utf16Be,
    /// The UTF-32-LE encoding with BOM.
    Utf32Le,
    /// The UTF-32-BE encoding with BOM.
    Utf32Be,
}

/// Line break type.
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Break {
    /// Let the emitter choose the break type.
    #[default]
    Any,
    /// Use CR for line breaks (Mac style).
    Cr,
    /// Use LN for line breaks (Unix style).
    Ln,
    /// Use CR LN for line breaks (DOS style).
    CrLn,
}

/// Scalar styles.
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum ScalarStyle {
    /// Let the emitter choose the style.
    #[default]
    Any,
    /// The plain scalar style.
    Plain,
    /// The single-quoted scalar style.
    SingleQuoted,
    /// The double-quoted scalar style.
    DoubleQuoted,
    /// The literal scalar style.
    Literal,
    /// The folded scalar style.
    Folded,
}

/// Collection styles, for sequences and mappings alike.
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum CollectionStyle {
    /// Let the emitter choose the style.
    #[default]
    Any,
    /// The block (indentation-based) style.
    Block,
    /// The flow (bracketed) style.
    Flow,
}
