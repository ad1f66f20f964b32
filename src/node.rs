use std::cmp::Ordering;

use chrono::{DateTime, FixedOffset};

use crate::{
    CollectionStyle, Mark, ScalarStyle, BINARY_TAG, BOOL_TAG, FLOAT_TAG, INT_TAG, MAP_TAG,
    NULL_TAG, SEQ_TAG, STR_TAG, TIMESTAMP_TAG,
};

/// A typed YAML document node.
///
/// Equality and ordering are structural over the tag and value; styles and
/// marks do not participate. NaN floats compare equal to NaN so mapping-key
/// lookup stays deterministic.
#[derive(Clone, Debug)]
pub struct Node {
    /// The typed value.
    pub value: NodeValue,
    /// The resolved tag in full form; empty means no override.
    pub tag: String,
    /// The scalar style the node was read with, or should be written with.
    pub scalar_style: ScalarStyle,
    /// The collection style the node was read with, or should be written
    /// with.
    pub collection_style: CollectionStyle,
    /// The position the node started at.
    pub start_mark: Mark,
}

/// The value variants of a [`Node`].
#[derive(Clone, Debug, Default)]
pub enum NodeValue {
    Null,
    /// The `<<` merge pseudo-value; consumed by the composer and never
    /// present in emitted documents.
    Merge,
    Bool(bool),
    Int(i64),
    Float(f64),
    Binary(Vec<u8>),
    Timestamp(DateTime<FixedOffset>),
    String(String),
    Sequence(Vec<Node>),
    Mapping(Vec<(Node, Node)>),
    /// The uninitialized sentinel; only ever stored in the composer's anchor
    /// table while the anchored node is still being built.
    #[default]
    Invalid,
}

impl NodeValue {
    /// The rank used by the total order, tag comparison aside.
    fn rank(&self) -> u8 {
        match self {
            NodeValue::Null => 0,
            NodeValue::Merge => 1,
            NodeValue::Bool(_) => 2,
            NodeValue::Int(_) => 3,
            NodeValue::Float(_) => 4,
            NodeValue::Binary(_) => 5,
            NodeValue::Timestamp(_) => 6,
            NodeValue::String(_) => 7,
            NodeValue::Sequence(_) => 8,
            NodeValue::Mapping(_) => 9,
            NodeValue::Invalid => 10,
        }
    }
}

impl Default for Node {
    fn default() -> Self {
        Node {
            value: NodeValue::Invalid,
            tag: String::new(),
            scalar_style: ScalarStyle::Any,
            collection_style: CollectionStyle::Any,
            start_mark: Mark::default(),
        }
    }
}

impl Node {
    /// Create a node from a value and a full-form tag.
    pub fn new(value: NodeValue, tag: &str) -> Node {
        Node {
            value,
            tag: String::from(tag),
            ..Default::default()
        }
    }

    pub fn null() -> Node {
        Node::new(NodeValue::Null, NULL_TAG)
    }

    pub fn bool(value: bool) -> Node {
        Node::new(NodeValue::Bool(value), BOOL_TAG)
    }

    pub fn int(value: i64) -> Node {
        Node::new(NodeValue::Int(value), INT_TAG)
    }

    pub fn float(value: f64) -> Node {
        Node::new(NodeValue::Float(value), FLOAT_TAG)
    }

    pub fn string(value: impl Into<String>) -> Node {
        Node::new(NodeValue::String(value.into()), STR_TAG)
    }

    pub fn binary(value: impl Into<Vec<u8>>) -> Node {
        Node::new(NodeValue::Binary(value.into()), BINARY_TAG)
    }

    pub fn timestamp(value: DateTime<FixedOffset>) -> Node {
        Node::new(NodeValue::Timestamp(value), TIMESTAMP_TAG)
    }

    pub fn sequence(items: impl Into<Vec<Node>>) -> Node {
        Node::new(NodeValue::Sequence(items.into()), SEQ_TAG)
    }

    pub fn mapping(pairs: impl Into<Vec<(Node, Node)>>) -> Node {
        Node::new(NodeValue::Mapping(pairs.into()), MAP_TAG)
    }

    pub fn is_null(&self) -> bool {
        matches!(self.value, NodeValue::Null)
    }

    pub(crate) fn is_invalid(&self) -> bool {
        matches!(self.value, NodeValue::Invalid)
    }

    pub(crate) fn is_merge(&self) -> bool {
        matches!(self.value, NodeValue::Merge)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.value {
            NodeValue::Bool(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self.value {
            NodeValue::Int(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self.value {
            NodeValue::Float(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            NodeValue::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Node]> {
        match &self.value {
            NodeValue::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&[(Node, Node)]> {
        match &self.value {
            NodeValue::Mapping(pairs) => Some(pairs),
            _ => None,
        }
    }

    /// Look up a value by string key in a mapping node.
    pub fn get(&self, key: &str) -> Option<&Node> {
        let pairs = self.as_mapping()?;
        pairs
            .iter()
            .find(|(k, _)| k.as_str() == Some(key))
            .map(|(_, v)| v)
    }

    /// The total order over nodes: tag first (empty before non-empty, then
    /// lexical), then value rank, then value.
    pub fn total_cmp(&self, other: &Node) -> Ordering {
        let tag_order = match (self.tag.is_empty(), other.tag.is_empty()) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => self.tag.cmp(&other.tag),
        };
        if tag_order != Ordering::Equal {
            return tag_order;
        }
        let rank_order = self.value.rank().cmp(&other.value.rank());
        if rank_order != Ordering::Equal {
            return rank_order;
        }
        match (&self.value, &other.value) {
            (NodeValue::Null, NodeValue::Null)
            | (NodeValue::Merge, NodeValue::Merge)
            | (NodeValue::Invalid, NodeValue::Invalid) => Ordering::Equal,
            (NodeValue::Bool(a), NodeValue::Bool(b)) => a.cmp(b),
            (NodeValue::Int(a), NodeValue::Int(b)) => a.cmp(b),
            (NodeValue::Float(a), NodeValue::Float(b)) => float_total_cmp(*a, *b),
            (NodeValue::Binary(a), NodeValue::Binary(b)) => a.cmp(b),
            (NodeValue::Timestamp(a), NodeValue::Timestamp(b)) => a.cmp(b),
            (NodeValue::String(a), NodeValue::String(b)) => a.cmp(b),
            (NodeValue::Sequence(a), NodeValue::Sequence(b)) => {
                let length = a.len().cmp(&b.len());
                if length != Ordering::Equal {
                    return length;
                }
                for (left, right) in a.iter().zip(b) {
                    let order = left.total_cmp(right);
                    if order != Ordering::Equal {
                        return order;
                    }
                }
                Ordering::Equal
            }
            (NodeValue::Mapping(a), NodeValue::Mapping(b)) => {
                let length = a.len().cmp(&b.len());
                if length != Ordering::Equal {
                    return length;
                }
                for ((left_key, left_value), (right_key, right_value)) in a.iter().zip(b) {
                    let order = left_key.total_cmp(right_key);
                    if order != Ordering::Equal {
                        return order;
                    }
                    let order = left_value.total_cmp(right_value);
                    if order != Ordering::Equal {
                        return order;
                    }
                }
                Ordering::Equal
            }
            _ => unreachable!("ranks were equal"),
        }
    }
}

/// Find a duplicated key in a pair list, using the total node order so the
/// check is a sort plus one adjacent-equality pass.
pub(crate) fn find_duplicate_key<'a>(pairs: &'a [(Node, Node)]) -> Option<&'a Node> {
    if pairs.len() < 2 {
        return None;
    }
    let mut keys: Vec<&Node> = pairs.iter().map(|(key, _)| key).collect();
    keys.sort_by(|a, b| a.total_cmp(b));
    keys.windows(2)
        .find(|pair| pair[0] == pair[1])
        .map(|pair| pair[1])
}

/// NaN compares equal to NaN and sorts after every other float.
fn float_total_cmp(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).expect("both floats are non-NaN"),
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.total_cmp(other) == Ordering::Equal
    }
}

impl Eq for Node {}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.total_cmp(other))
    }
}

impl Ord for Node {
    fn cmp(&self, other: &Self) -> Ordering {
        self.total_cmp(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nan_equals_nan() {
        assert_eq!(Node::float(f64::NAN), Node::float(f64::NAN));
        assert_ne!(Node::float(f64::NAN), Node::float(1.0));
    }

    #[test]
    fn empty_tag_sorts_before_non_empty() {
        let mut untagged = Node::int(1);
        untagged.tag.clear();
        assert_eq!(untagged.total_cmp(&Node::int(1)), Ordering::Less);
    }

    #[test]
    fn collections_compare_lengthwise_then_elementwise() {
        let short = Node::sequence(vec![Node::int(9)]);
        let long = Node::sequence(vec![Node::int(0), Node::int(0)]);
        assert_eq!(short.total_cmp(&long), Ordering::Less);

        let a = Node::sequence(vec![Node::int(1), Node::int(2)]);
        let b = Node::sequence(vec![Node::int(1), Node::int(3)]);
        assert_eq!(a.total_cmp(&b), Ordering::Less);
    }

    #[test]
    fn styles_do_not_affect_equality() {
        let mut quoted = Node::string("x");
        quoted.scalar_style = ScalarStyle::DoubleQuoted;
        assert_eq!(quoted, Node::string("x"));
    }
}
