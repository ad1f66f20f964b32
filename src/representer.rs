use base64::Engine as _;
use chrono::{DateTime, FixedOffset, Timelike as _};

use crate::node::{find_duplicate_key, Node, NodeValue};
use crate::{CollectionStyle, RepresenterError, ScalarStyle, MAP_TAG, OMAP_TAG, PAIRS_TAG};

/// The inverse of the constructor: encodes typed node values back into
/// scalar strings and applies the default style heuristics. The output tree
/// contains only string scalars, sequences and mappings, ready for the
/// serializer.
#[derive(Default)]
pub struct Representer {
    default_scalar_style: ScalarStyle,
    default_collection_style: CollectionStyle,
}

impl Representer {
    pub fn new() -> Representer {
        Representer::default()
    }

    /// The styles used where a node does not pick one. With `Any`, scalars
    /// are left for the emitter's analysis and collections follow the
    /// nesting heuristic.
    pub fn set_default_styles(&mut self, scalar: ScalarStyle, collection: CollectionStyle) {
        self.default_scalar_style = scalar;
        self.default_collection_style = collection;
    }

    pub fn represent(&self, node: &Node) -> Result<Node, RepresenterError> {
        let value = match &node.value {
            NodeValue::Null => NodeValue::String(String::from("null")),
            NodeValue::Bool(value) => {
                NodeValue::String(String::from(if *value { "true" } else { "false" }))
            }
            NodeValue::Int(value) => {
                let mut buffer = itoa::Buffer::new();
                NodeValue::String(String::from(buffer.format(*value)))
            }
            NodeValue::Float(value) => NodeValue::String(format_float(*value)),
            NodeValue::Binary(bytes) => NodeValue::String(
                base64::engine::general_purpose::STANDARD.encode(bytes),
            ),
            NodeValue::Timestamp(datetime) => NodeValue::String(format_timestamp(datetime)),
            NodeValue::String(value) => NodeValue::String(value.clone()),
            NodeValue::Sequence(items) => {
                let mut represented = Vec::with_capacity(items.len());
                for item in items {
                    represented.push(self.represent(item)?);
                }
                NodeValue::Sequence(represented)
            }
            NodeValue::Mapping(pairs) => {
                if node.tag == OMAP_TAG || node.tag == PAIRS_TAG {
                    return self.represent_pair_sequence(node, pairs);
                }
                if node.tag == MAP_TAG {
                    if let Some(key) = find_duplicate_key(pairs) {
                        return Err(RepresenterError::Problem {
                            problem: "duplicate key in mapping",
                            mark: key.start_mark,
                        });
                    }
                }
                let mut represented = Vec::with_capacity(pairs.len());
                for (key, value) in pairs {
                    // A merge pseudo-value produces no output.
                    if key.is_merge() {
                        continue;
                    }
                    represented.push((self.represent(key)?, self.represent(value)?));
                }
                NodeValue::Mapping(represented)
            }
            NodeValue::Merge | NodeValue::Invalid => {
                return Err(RepresenterError::Problem {
                    problem: "node cannot be represented",
                    mark: node.start_mark,
                })
            }
        };

        let scalar_style = match (&node.value, node.scalar_style) {
            // Binary always renders as a literal block.
            (NodeValue::Binary(_), _) => ScalarStyle::Literal,
            (_, ScalarStyle::Any) => self.default_scalar_style,
            (_, style) => style,
        };
        let collection_style = match (&value, node.collection_style) {
            (NodeValue::Sequence(_) | NodeValue::Mapping(_), CollectionStyle::Any) => {
                if self.default_collection_style == CollectionStyle::Any {
                    default_collection_style(&value)
                } else {
                    self.default_collection_style
                }
            }
            (_, style) => style,
        };

        Ok(Node {
            value,
            tag: node.tag.clone(),
            scalar_style,
            collection_style,
            start_mark: node.start_mark,
        })
    }

    /// `omap` and `pairs` render as a sequence of single-pair mappings.
    fn represent_pair_sequence(
        &self,
        node: &Node,
        pairs: &[(Node, Node)],
    ) -> Result<Node, RepresenterError> {
        if node.tag == OMAP_TAG {
            if let Some(key) = find_duplicate_key(pairs) {
                return Err(RepresenterError::Problem {
                    problem: "duplicate key in ordered mapping",
                    mark: key.start_mark,
                });
            }
        }
        let mut items = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let pair = vec![(self.represent(key)?, self.represent(value)?)];
            let mut entry = Node::mapping(pair);
            entry.collection_style = CollectionStyle::Flow;
            items.push(entry);
        }
        Ok(Node {
            value: NodeValue::Sequence(items),
            tag: node.tag.clone(),
            scalar_style: ScalarStyle::Any,
            collection_style: if node.collection_style == CollectionStyle::Any {
                CollectionStyle::Block
            } else {
                node.collection_style
            },
            start_mark: node.start_mark,
        })
    }
}

/// Block style iff any element is itself a collection or a non-plain scalar.
fn default_collection_style(value: &NodeValue) -> CollectionStyle {
    let needs_block = |node: &Node| {
        matches!(node.value, NodeValue::Sequence(_) | NodeValue::Mapping(_))
            || !matches!(node.scalar_style, ScalarStyle::Any | ScalarStyle::Plain)
    };
    let block = match value {
        NodeValue::Sequence(items) => items.iter().any(needs_block),
        NodeValue::Mapping(pairs) => pairs
            .iter()
            .any(|(key, value)| needs_block(key) || needs_block(value)),
        _ => false,
    };
    if block {
        CollectionStyle::Block
    } else {
        CollectionStyle::Flow
    }
}

/// Format a float so it re-resolves as a float: always a decimal point in
/// the mantissa, `.inf`/`-.inf`/`.nan` for the specials.
fn format_float(value: f64) -> String {
    if value.is_nan() {
        return String::from(".nan");
    }
    if value.is_infinite() {
        return String::from(if value < 0.0 { "-.inf" } else { ".inf" });
    }
    let mut buffer = ryu::Buffer::new();
    let formatted = buffer.format(value);
    match formatted.find(['e', 'E']) {
        Some(position) if !formatted[..position].contains('.') => {
            format!("{}.0{}", &formatted[..position], &formatted[position..])
        }
        _ => String::from(formatted),
    }
}

/// ISO-8601 with the fraction trimmed and `Z` for UTC.
fn format_timestamp(datetime: &DateTime<FixedOffset>) -> String {
    let mut formatted = datetime.format("%Y-%m-%dT%H:%M:%S").to_string();
    let nanos = datetime.time().nanosecond();
    if nanos > 0 {
        let digits = format!("{nanos:09}");
        formatted.push('.');
        formatted.push_str(digits.trim_end_matches('0'));
    }
    if datetime.offset().local_minus_utc() == 0 {
        formatted.push('Z');
    } else {
        formatted.push_str(&datetime.format("%:z").to_string());
    }
    formatted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BINARY_TAG, SET_TAG};

    fn scalar_repr(node: Node) -> String {
        let represented = Representer::new().represent(&node).unwrap();
        match represented.value {
            NodeValue::String(value) => value,
            other => panic!("expected a string scalar, got {other:?}"),
        }
    }

    #[test]
    fn scalar_representations() {
        assert_eq!(scalar_repr(Node::null()), "null");
        assert_eq!(scalar_repr(Node::bool(true)), "true");
        assert_eq!(scalar_repr(Node::int(-685230)), "-685230");
        assert_eq!(scalar_repr(Node::float(685230.15)), "685230.15");
        assert_eq!(scalar_repr(Node::float(f64::NEG_INFINITY)), "-.inf");
        assert_eq!(scalar_repr(Node::float(f64::NAN)), ".nan");
        assert_eq!(scalar_repr(Node::binary(b"hello".to_vec())), "aGVsbG8=");
    }

    #[test]
    fn exponent_floats_keep_a_decimal_point() {
        let formatted = scalar_repr(Node::float(1e300));
        assert!(formatted.contains('.'), "{formatted}");
    }

    #[test]
    fn binary_defaults_to_literal_style() {
        let represented = Representer::new()
            .represent(&Node::binary(b"x".to_vec()))
            .unwrap();
        assert_eq!(represented.scalar_style, ScalarStyle::Literal);
        assert_eq!(represented.tag, BINARY_TAG);
    }

    #[test]
    fn flat_collections_default_to_flow_nested_to_block() {
        let representer = Representer::new();
        let flat = representer
            .represent(&Node::sequence(vec![Node::int(1), Node::int(2)]))
            .unwrap();
        assert_eq!(flat.collection_style, CollectionStyle::Flow);

        let nested = representer
            .represent(&Node::sequence(vec![Node::sequence(vec![Node::int(1)])]))
            .unwrap();
        assert_eq!(nested.collection_style, CollectionStyle::Block);
    }

    #[test]
    fn omap_renders_as_single_pair_mappings() {
        let mut omap = Node::mapping(vec![
            (Node::string("k1"), Node::string("v1")),
            (Node::string("k2"), Node::string("v2")),
        ]);
        omap.tag = String::from(OMAP_TAG);
        let represented = Representer::new().represent(&omap).unwrap();
        assert_eq!(represented.tag, OMAP_TAG);
        let NodeValue::Sequence(items) = &represented.value else {
            panic!("expected a sequence");
        };
        assert_eq!(items.len(), 2);
        assert!(items
            .iter()
            .all(|item| matches!(&item.value, NodeValue::Mapping(pairs) if pairs.len() == 1)));
    }

    #[test]
    fn duplicate_mapping_keys_are_rejected() {
        let broken = Node::mapping(vec![
            (Node::string("a"), Node::int(1)),
            (Node::string("a"), Node::int(2)),
        ]);
        assert!(Representer::new().represent(&broken).is_err());
    }

    #[test]
    fn set_keeps_mapping_shape() {
        let mut set = Node::mapping(vec![
            (Node::string("a"), Node::null()),
            (Node::string("b"), Node::null()),
        ]);
        set.tag = String::from(SET_TAG);
        let represented = Representer::new().represent(&set).unwrap();
        assert_eq!(represented.tag, SET_TAG);
        assert!(matches!(represented.value, NodeValue::Mapping(_)));
    }
}
