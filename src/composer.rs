use std::collections::HashMap;

use crate::constructor::Constructor;
use crate::node::{find_duplicate_key, Node, NodeValue};
use crate::resolver::{NodeKind, Resolver};
use crate::{
    CollectionStyle, ComposerError, Encoding, Event, EventData, Mark, Parser, ScalarStyle,
};

/// Depth-indexed stacks of reusable buffers; each nesting level of the
/// composer fills the buffer at its depth and drains it on the way out, so
/// the usual sequence/mapping traversal does not reallocate per level.
#[derive(Default)]
struct Scratch {
    nodes: Vec<Vec<Node>>,
    pairs: Vec<Vec<(Node, Node)>>,
}

impl Scratch {
    fn take_nodes(&mut self, depth: usize) -> Vec<Node> {
        if depth >= self.nodes.len() {
            self.nodes.resize_with(depth + 1, Vec::new);
        }
        core::mem::take(&mut self.nodes[depth])
    }

    fn put_nodes(&mut self, depth: usize, buffer: Vec<Node>) {
        self.nodes[depth] = buffer;
    }

    fn take_pairs(&mut self, depth: usize) -> Vec<(Node, Node)> {
        if depth >= self.pairs.len() {
            self.pairs.resize_with(depth + 1, Vec::new);
        }
        core::mem::take(&mut self.pairs[depth])
    }

    fn put_pairs(&mut self, depth: usize, buffer: Vec<(Node, Node)>) {
        self.pairs[depth] = buffer;
    }
}

/// Builds typed root nodes from the parser's events, one document at a time,
/// resolving anchors, aliases and merge keys along the way.
pub struct Composer<'r> {
    parser: Parser<'r>,
    resolver: Resolver,
    constructor: Constructor,
    /// Anchor name to a copy of the finished node; a node with the invalid
    /// sentinel value marks an anchor whose node is still being composed.
    anchors: HashMap<String, Node>,
    peeked: Option<Event>,
    stream_started: bool,
    scratch: Scratch,
}

impl<'r> Default for Composer<'r> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'r> Composer<'r> {
    pub fn new() -> Composer<'r> {
        Composer {
            parser: Parser::new(),
            resolver: Resolver::new(),
            constructor: Constructor::new(),
            anchors: HashMap::new(),
            peeked: None,
            stream_started: false,
            scratch: Scratch::default(),
        }
    }

    /// Set a generic input handler.
    pub fn set_input(&mut self, input: &'r mut dyn std::io::BufRead) {
        self.parser.set_input(input);
    }

    /// Set the source encoding, bypassing BOM detection.
    pub fn set_encoding(&mut self, encoding: Encoding) {
        self.parser.set_encoding(encoding);
    }

    /// The resolver used for implicit tags, for registering custom patterns.
    pub fn resolver_mut(&mut self) -> &mut Resolver {
        &mut self.resolver
    }

    fn next_event(&mut self) -> Result<Event, ComposerError> {
        match self.peeked.take() {
            Some(event) => Ok(event),
            None => Ok(self.parser.parse()?),
        }
    }

    fn peek_event(&mut self) -> Result<&Event, ComposerError> {
        if self.peeked.is_none() {
            self.peeked = Some(self.parser.parse()?);
        }
        Ok(self.peeked.as_ref().unwrap())
    }

    /// Consume the stream start lazily and report whether another document
    /// follows.
    pub fn has_next(&mut self) -> Result<bool, ComposerError> {
        if !self.stream_started {
            let event = self.next_event()?;
            assert!(
                matches!(event.data, EventData::StreamStart { .. }),
                "expected stream start"
            );
            self.stream_started = true;
        }
        if self.parser.stream_end_produced() && self.peeked.is_none() {
            return Ok(false);
        }
        let event = self.peek_event()?;
        Ok(!matches!(event.data, EventData::StreamEnd))
    }

    /// Compose the next document and return its root node. The anchor table
    /// is cleared at the document boundary, also on failure.
    pub fn next_document(&mut self) -> Result<Node, ComposerError> {
        if !self.has_next()? {
            return Err(ComposerError::Problem {
                problem: "no more documents in the stream",
                mark: Mark::default(),
            });
        }
        let result = self.compose_document();
        self.anchors.clear();
        result
    }

    fn compose_document(&mut self) -> Result<Node, ComposerError> {
        let event = self.next_event()?;
        assert!(
            matches!(event.data, EventData::DocumentStart { .. }),
            "expected document start"
        );
        let event = self.next_event()?;
        let root = self.compose_node(event, 0)?;
        let event = self.next_event()?;
        assert!(
            matches!(event.data, EventData::DocumentEnd { .. }),
            "expected document end"
        );
        Ok(root)
    }

    fn compose_node(&mut self, event: Event, depth: usize) -> Result<Node, ComposerError> {
        match event.data {
            EventData::Alias { .. } => self.compose_alias(event),
            EventData::Scalar { .. } => self.compose_scalar(event),
            EventData::SequenceStart { .. } => self.compose_sequence(event, depth),
            EventData::MappingStart { .. } => self.compose_mapping(event, depth),
            _ => unreachable!("unexpected event inside a document"),
        }
    }

    fn compose_alias(&mut self, event: Event) -> Result<Node, ComposerError> {
        let EventData::Alias { anchor } = &event.data else {
            unreachable!()
        };
        match self.anchors.get(anchor) {
            Some(node) if node.is_invalid() => Err(ComposerError::ProblemWithContext {
                context: "while composing an anchored node; anchor",
                context_mark: node.start_mark,
                problem: "found recursive alias",
                mark: event.start_mark,
            }),
            Some(node) => Ok(node.clone()),
            None => Err(ComposerError::Problem {
                problem: "found undefined alias",
                mark: event.start_mark,
            }),
        }
    }

    /// Put the uninitialized sentinel in the anchor table before composing
    /// the anchored node, so aliases can tell "still being built" from "not
    /// present".
    fn register_sentinel(
        &mut self,
        anchor: Option<&String>,
        mark: Mark,
    ) -> Result<(), ComposerError> {
        let Some(anchor) = anchor else {
            return Ok(());
        };
        if let Some(previous) = self.anchors.get(anchor) {
            return Err(ComposerError::ProblemWithContext {
                context: "found duplicate anchor; first occurrence",
                context_mark: previous.start_mark,
                problem: "second occurrence",
                mark,
            });
        }
        self.anchors.insert(
            anchor.clone(),
            Node {
                start_mark: mark,
                ..Default::default()
            },
        );
        Ok(())
    }

    fn register_node(&mut self, anchor: Option<String>, node: &Node) {
        if let Some(anchor) = anchor {
            self.anchors.insert(anchor, node.clone());
        }
    }

    fn compose_scalar(&mut self, event: Event) -> Result<Node, ComposerError> {
        let EventData::Scalar {
            anchor,
            tag,
            value,
            implicit,
            style,
        } = event.data
        else {
            unreachable!()
        };
        self.register_sentinel(anchor.as_ref(), event.start_mark)?;
        // Only a plain scalar without an explicit tag runs the pattern table.
        let resolvable = implicit && style == ScalarStyle::Plain;
        let tag = self
            .resolver
            .resolve(NodeKind::Scalar, tag.as_deref(), &value, resolvable);
        let value = self
            .constructor
            .construct_scalar(event.start_mark, &tag, value)?;
        let node = Node {
            value,
            tag,
            scalar_style: style,
            collection_style: CollectionStyle::Any,
            start_mark: event.start_mark,
        };
        self.register_node(anchor, &node);
        Ok(node)
    }

    fn compose_sequence(&mut self, event: Event, depth: usize) -> Result<Node, ComposerError> {
        let EventData::SequenceStart {
            anchor,
            tag,
            implicit,
            style,
        } = event.data
        else {
            unreachable!()
        };
        self.register_sentinel(anchor.as_ref(), event.start_mark)?;
        let tag = self
            .resolver
            .resolve(NodeKind::Sequence, tag.as_deref(), "", implicit);

        let mut items = self.scratch.take_nodes(depth);
        loop {
            let event = self.next_event()?;
            if matches!(event.data, EventData::SequenceEnd) {
                break;
            }
            items.push(self.compose_node(event, depth + 1)?);
        }
        let collected: Vec<Node> = items.drain(..).collect();
        self.scratch.put_nodes(depth, items);

        let value = self
            .constructor
            .construct_sequence(event.start_mark, &tag, collected)?;
        let node = Node {
            value,
            tag,
            scalar_style: ScalarStyle::Any,
            collection_style: style,
            start_mark: event.start_mark,
        };
        self.register_node(anchor, &node);
        Ok(node)
    }

    fn compose_mapping(&mut self, event: Event, depth: usize) -> Result<Node, ComposerError> {
        let EventData::MappingStart {
            anchor,
            tag,
            implicit,
            style,
        } = event.data
        else {
            unreachable!()
        };
        self.register_sentinel(anchor.as_ref(), event.start_mark)?;
        let tag = self
            .resolver
            .resolve(NodeKind::Mapping, tag.as_deref(), "", implicit);

        let mut pairs = self.scratch.take_pairs(depth);
        let mut merges: Vec<Node> = Vec::new();
        loop {
            let key_event = self.next_event()?;
            if matches!(key_event.data, EventData::MappingEnd) {
                break;
            }
            let key = self.compose_node(key_event, depth + 1)?;
            let value_event = self.next_event()?;
            let value = self.compose_node(value_event, depth + 1)?;
            if key.is_merge() {
                merges.push(value);
            } else {
                pairs.push((key, value));
            }
        }
        let mut collected: Vec<(Node, Node)> = pairs.drain(..).collect();
        self.scratch.put_pairs(depth, pairs);

        if !merges.is_empty() {
            collected = Self::apply_merges(collected, merges)?;
        }
        if let Some(key) = find_duplicate_key(&collected) {
            return Err(ComposerError::ProblemWithContext {
                context: "while composing a mapping",
                context_mark: event.start_mark,
                problem: "found duplicate key",
                mark: key.start_mark,
            });
        }

        let value = self
            .constructor
            .construct_mapping(event.start_mark, &tag, collected)?;
        let node = Node {
            value,
            tag,
            scalar_style: ScalarStyle::Any,
            collection_style: style,
            start_mark: event.start_mark,
        };
        self.register_node(anchor, &node);
        Ok(node)
    }

    /// Flatten every merge value in order and combine them with the explicit
    /// pairs. Explicit pairs shadow merged ones; among merged values the
    /// earliest occurrence of a key wins. Merged pairs come first, matching
    /// the order the merged-in mappings were written in.
    fn apply_merges(
        explicit: Vec<(Node, Node)>,
        merges: Vec<Node>,
    ) -> Result<Vec<(Node, Node)>, ComposerError> {
        let mut merged: Vec<(Node, Node)> = Vec::new();
        for value in merges {
            let flattened = Self::flatten(value)?;
            Self::merge(&mut merged, flattened);
        }
        merged.retain(|(key, _)| !explicit.iter().any(|(explicit_key, _)| explicit_key == key));
        merged.extend(explicit);
        Ok(merged)
    }

    /// The pair list a node contributes when merged: a mapping gives its own
    /// pairs (nested merges flattened), a sequence must hold mappings and
    /// contributes them in order.
    fn flatten(node: Node) -> Result<Vec<(Node, Node)>, ComposerError> {
        match node.value {
            NodeValue::Mapping(pairs) => {
                let mut result = Vec::with_capacity(pairs.len());
                for (key, value) in pairs {
                    if key.is_merge() {
                        Self::merge(&mut result, Self::flatten(value)?);
                    } else {
                        result.push((key, value));
                    }
                }
                Ok(result)
            }
            NodeValue::Sequence(items) => {
                let mut result = Vec::new();
                for item in items {
                    let mark = item.start_mark;
                    if !matches!(item.value, NodeValue::Mapping(_)) {
                        return Err(ComposerError::Problem {
                            problem: "expected a mapping for merging",
                            mark,
                        });
                    }
                    Self::merge(&mut result, Self::flatten(item)?);
                }
                Ok(result)
            }
            _ => Err(ComposerError::Problem {
                problem: "merge key value must be a mapping or a sequence of mappings",
                mark: node.start_mark,
            }),
        }
    }

    /// Append pairs from `incoming` whose keys are not already present.
    fn merge(existing: &mut Vec<(Node, Node)>, incoming: Vec<(Node, Node)>) {
        for (key, value) in incoming {
            if !existing.iter().any(|(existing_key, _)| *existing_key == key) {
                existing.push((key, value));
            }
        }
    }
}
