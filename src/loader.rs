use crate::composer::Composer;
use crate::node::Node;
use crate::resolver::Resolver;
use crate::{ComposerError, Encoding, Mark, YamlError};

/// Loads documents from a byte source and hands out their root nodes.
///
/// The loader is an iterator over `Result<Node, YamlError>`; iteration stops
/// after the first error.
pub struct Loader<'r> {
    composer: Composer<'r>,
    name: Option<String>,
    failed: bool,
}

impl<'r> Loader<'r> {
    /// Load from a blocking byte source.
    pub fn from_reader(input: &'r mut dyn std::io::BufRead) -> Loader<'r> {
        let mut composer = Composer::new();
        composer.set_input(input);
        Loader {
            composer,
            name: None,
            failed: false,
        }
    }

    /// Attach an input name used in diagnostics.
    #[must_use]
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(String::from(name));
        self
    }

    /// Set the source encoding, bypassing BOM detection.
    #[must_use]
    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.composer.set_encoding(encoding);
        self
    }

    /// The resolver used for implicit tags, for registering custom patterns.
    pub fn resolver_mut(&mut self) -> &mut Resolver {
        self.composer.resolver_mut()
    }

    fn wrap(&self, err: ComposerError) -> YamlError {
        YamlError::from_composer(err, self.name.as_deref())
    }

    /// The next document's root node, or `None` at the end of the stream.
    pub fn next_document(&mut self) -> Result<Option<Node>, YamlError> {
        match self.composer.has_next() {
            Ok(false) => Ok(None),
            Ok(true) => match self.composer.next_document() {
                Ok(node) => {
                    log::debug!("composed document with root at {}", node.start_mark);
                    Ok(Some(node))
                }
                Err(err) => Err(self.wrap(err)),
            },
            Err(err) => Err(self.wrap(err)),
        }
    }

    /// Load a single-document input. Zero documents or more than one are
    /// errors.
    pub fn load(mut self) -> Result<Node, YamlError> {
        let Some(root) = self.next_document()? else {
            return Err(self.wrap(ComposerError::Problem {
                problem: "expected a document, but found none",
                mark: Mark::default(),
            }));
        };
        if self.next_document()?.is_some() {
            return Err(self.wrap(ComposerError::Problem {
                problem: "expected a single document in the stream",
                mark: Mark::default(),
            }));
        }
        Ok(root)
    }
}

impl Iterator for Loader<'_> {
    type Item = Result<Node, YamlError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_document() {
            Ok(Some(node)) => Some(Ok(node)),
            Ok(None) => None,
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

/// Load a single document from a byte buffer.
pub fn load(input: &[u8]) -> Result<Node, YamlError> {
    let mut input = input;
    Loader::from_reader(&mut input).load()
}

/// Load every document from a byte buffer.
pub fn load_all(input: &[u8]) -> Result<Vec<Node>, YamlError> {
    let mut input = input;
    Loader::from_reader(&mut input).collect()
}
