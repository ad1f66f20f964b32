use crate::node::{Node, NodeValue};
use crate::resolver::Resolver;
use crate::{Emitter, EmitterError, Event, ScalarStyle, MAP_TAG, SEQ_TAG, STR_TAG};

struct AnchorEntry {
    node: Node,
    count: usize,
    name: Option<String>,
    emitted: bool,
}

/// Walks a represented node tree and feeds the emitter the matching event
/// stream, assigning anchors to collection subtrees that occur more than
/// once.
///
/// The input must come from [`Representer::represent`]
/// (crate::Representer::represent): all scalars carry their string form.
pub struct Serializer {
    resolver: Resolver,
    anchored: Vec<AnchorEntry>,
    last_anchor_id: usize,
}

impl Default for Serializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Serializer {
    pub fn new() -> Serializer {
        Serializer {
            resolver: Resolver::new(),
            anchored: Vec::new(),
            last_anchor_id: 0,
        }
    }

    /// Serialize one document root into events. Document and stream
    /// delimiters are the caller's business.
    pub fn serialize(&mut self, emitter: &mut Emitter, node: &Node) -> Result<(), EmitterError> {
        self.anchored.clear();
        self.last_anchor_id = 0;
        self.count_references(node);
        for entry in &mut self.anchored {
            if entry.count > 1 {
                self.last_anchor_id += 1;
                entry.name = Some(format!("id{:03}", self.last_anchor_id));
            }
        }
        self.serialize_node(emitter, node)
    }

    /// Count structurally repeated collection subtrees; only they can become
    /// anchors, scalars are cheap enough to repeat inline.
    fn count_references(&mut self, node: &Node) {
        if !matches!(node.value, NodeValue::Sequence(_) | NodeValue::Mapping(_)) {
            return;
        }
        if let Some(index) = self.find_entry(node) {
            self.anchored[index].count += 1;
            return;
        }
        self.anchored.push(AnchorEntry {
            node: node.clone(),
            count: 1,
            name: None,
            emitted: false,
        });
        match &node.value {
            NodeValue::Sequence(items) => {
                for item in items {
                    self.count_references(item);
                }
            }
            NodeValue::Mapping(pairs) => {
                for (key, value) in pairs {
                    self.count_references(key);
                    self.count_references(value);
                }
            }
            _ => unreachable!("checked above"),
        }
    }

    fn find_entry(&self, node: &Node) -> Option<usize> {
        self.anchored.iter().position(|entry| entry.node == *node)
    }

    fn serialize_node(&mut self, emitter: &mut Emitter, node: &Node) -> Result<(), EmitterError> {
        let mut anchor: Option<String> = None;
        if let Some(index) = self.find_entry(node) {
            if let Some(name) = self.anchored[index].name.clone() {
                if self.anchored[index].emitted {
                    return emitter.emit(Event::alias(&name));
                }
                self.anchored[index].emitted = true;
                anchor = Some(name);
            }
        }

        match &node.value {
            NodeValue::String(value) => {
                self.serialize_scalar(emitter, node, value, anchor.as_deref())
            }
            NodeValue::Sequence(items) => {
                let implicit = node.tag.is_empty() || node.tag == SEQ_TAG;
                emitter.emit(Event::sequence_start(
                    anchor.as_deref(),
                    tag_ref(node),
                    implicit,
                    node.collection_style,
                ))?;
                for item in items {
                    self.serialize_node(emitter, item)?;
                }
                emitter.emit(Event::sequence_end())
            }
            NodeValue::Mapping(pairs) => {
                let implicit = node.tag.is_empty() || node.tag == MAP_TAG;
                emitter.emit(Event::mapping_start(
                    anchor.as_deref(),
                    tag_ref(node),
                    implicit,
                    node.collection_style,
                ))?;
                for (key, value) in pairs {
                    self.serialize_node(emitter, key)?;
                    self.serialize_node(emitter, value)?;
                }
                emitter.emit(Event::mapping_end())
            }
            _ => Err(EmitterError::Problem(
                "serializer expects a represented node tree",
            )),
        }
    }

    /// Decide the implicit flag and final style for a scalar: the tag may be
    /// left implicit when the resolver would infer it back from the emitted
    /// form. A string that would re-resolve as something else gets quoted
    /// instead of tagged.
    fn serialize_scalar(
        &mut self,
        emitter: &mut Emitter,
        node: &Node,
        value: &str,
        anchor: Option<&str>,
    ) -> Result<(), EmitterError> {
        let mut style = node.scalar_style;
        let implicit;
        if node.tag.is_empty() {
            implicit = true;
        } else if matches!(style, ScalarStyle::Any | ScalarStyle::Plain) {
            let resolved = self.resolver.resolve_implicit(value);
            if node.tag == resolved {
                implicit = true;
            } else if node.tag == STR_TAG {
                implicit = true;
                style = ScalarStyle::SingleQuoted;
            } else {
                implicit = false;
            }
        } else {
            implicit = node.tag == STR_TAG;
        }
        emitter.emit(Event::scalar(anchor, tag_ref(node), value, implicit, style))
    }
}

fn tag_ref(node: &Node) -> Option<&str> {
    if node.tag.is_empty() {
        None
    } else {
        Some(&node.tag)
    }
}
