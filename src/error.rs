/// A position in the input or output stream.
///
/// Line and column are zero-based and saturate at the 16-bit range; display
/// is one-based.
#[derive(Copy, Clone, Default, PartialEq, Eq, Debug)]
pub struct Mark {
    /// The position line.
    pub line: u16,
    /// The position column.
    pub column: u16,
}

impl Mark {
    pub(crate) fn next_line(&mut self) {
        self.line = self.line.saturating_add(1);
        self.column = 0;
    }

    pub(crate) fn next_column(&mut self) {
        self.column = self.column.saturating_add(1);
    }
}

impl std::fmt::Display for Mark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "line {} column {}",
            u32::from(self.line) + 1,
            u32::from(self.column) + 1
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
    #[error("control characters are not allowed (#{value:x})")]
    ControlCharacter { offset: usize, value: u32 },
    #[error("invalid byte order marker")]
    InvalidBom,
    #[error("invalid UTF-8 octet at offset {offset}")]
    InvalidUtf8 { offset: usize },
    #[error("invalid UTF-16 surrogate at offset {offset}: {value:x}")]
    InvalidUtf16 { offset: usize, value: u16 },
    #[error("invalid UTF-32 unit at offset {offset}: {value:x}")]
    InvalidUtf32 { offset: usize, value: u32 },
    #[error("incomplete code unit sequence at offset {offset}")]
    Incomplete { offset: usize },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ScannerError {
    #[error("{problem_mark}: {problem} {context} ({context_mark})")]
    Problem {
        context: &'static str,
        context_mark: Mark,
        problem: &'static str,
        problem_mark: Mark,
    },
    #[error(transparent)]
    Reader(#[from] ReaderError),
}

#[derive(Debug, thiserror::Error)]
pub enum ParserError {
    #[error("no more tokens")]
    UnexpectedEof,
    #[error("{mark}: {problem}")]
    Problem { problem: &'static str, mark: Mark },
    #[error("{mark}: {problem} {context} ({context_mark})")]
    ProblemWithContext {
        context: &'static str,
        context_mark: Mark,
        problem: &'static str,
        mark: Mark,
    },
    #[error(transparent)]
    Scanner(#[from] ScannerError),
}

#[derive(Debug, thiserror::Error)]
pub enum ConstructorError {
    #[error("{mark}: {problem}: {value}")]
    Problem {
        problem: &'static str,
        value: String,
        mark: Mark,
    },
    #[error("{mark}: expected {expected} for tag {tag}")]
    ShapeMismatch {
        expected: &'static str,
        tag: String,
        mark: Mark,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ComposerError {
    #[error("{mark}: {problem}")]
    Problem { problem: &'static str, mark: Mark },
    #[error("{mark}: {problem} {context} ({context_mark})")]
    ProblemWithContext {
        context: &'static str,
        context_mark: Mark,
        problem: &'static str,
        mark: Mark,
    },
    #[error(transparent)]
    Parser(#[from] ParserError),
    #[error(transparent)]
    Constructor(#[from] ConstructorError),
}

#[derive(Debug, thiserror::Error)]
pub enum RepresenterError {
    #[error("{mark}: {problem}")]
    Problem { problem: &'static str, mark: Mark },
}

#[derive(Debug, thiserror::Error)]
pub enum WriterError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum EmitterError {
    #[error("{0}")]
    Problem(&'static str),
    #[error(transparent)]
    Writer(#[from] WriterError),
}

/// Any error the loader/dumper façade can surface, tagged by the subsystem
/// that produced it.
#[derive(Debug, thiserror::Error)]
pub enum YamlError {
    #[error("reader error{}: {source}", fmt_name(.name))]
    Reader {
        source: ReaderError,
        name: Option<String>,
    },
    #[error("scanner error{}: {source}", fmt_name(.name))]
    Scanner {
        source: ScannerError,
        name: Option<String>,
    },
    #[error("parser error{}: {source}", fmt_name(.name))]
    Parser {
        source: ParserError,
        name: Option<String>,
    },
    #[error("composer error{}: {source}", fmt_name(.name))]
    Composer {
        source: ComposerError,
        name: Option<String>,
    },
    #[error("constructor error{}: {source}", fmt_name(.name))]
    Constructor {
        source: ConstructorError,
        name: Option<String>,
    },
    #[error("representer error: {source}")]
    Representer { source: RepresenterError },
    #[error("emitter error: {source}")]
    Emitter { source: EmitterError },
}

fn fmt_name(name: &Option<String>) -> String {
    match name {
        Some(name) => format!(" in {name}"),
        None => String::new(),
    }
}

impl YamlError {
    /// Wrap a composer-side error, attaching the input name used for
    /// diagnostics. Errors from the stages below the composer keep their own
    /// kind.
    pub(crate) fn from_composer(err: ComposerError, name: Option<&str>) -> Self {
        let name = name.map(String::from);
        match err {
            ComposerError::Parser(ParserError::Scanner(ScannerError::Reader(source))) => {
                YamlError::Reader { source, name }
            }
            ComposerError::Parser(ParserError::Scanner(source)) => {
                YamlError::Scanner { source, name }
            }
            ComposerError::Parser(source) => YamlError::Parser { source, name },
            ComposerError::Constructor(source) => YamlError::Constructor { source, name },
            source => YamlError::Composer { source, name },
        }
    }
}

impl From<RepresenterError> for YamlError {
    fn from(source: RepresenterError) -> Self {
        YamlError::Representer { source }
    }
}

impl From<EmitterError> for YamlError {
    fn from(source: EmitterError) -> Self {
        YamlError::Emitter { source }
    }
}
