use regex::Regex;

use crate::{
    BOOL_TAG, DEFAULT_MAPPING_TAG, DEFAULT_SCALAR_TAG, DEFAULT_SEQUENCE_TAG, FLOAT_TAG, INT_TAG,
    MERGE_TAG, NULL_TAG, TIMESTAMP_TAG, VALUE_TAG,
};

/// The kind of node a tag is being resolved for.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum NodeKind {
    Scalar,
    Sequence,
    Mapping,
}

struct ImplicitResolver {
    tag: &'static str,
    pattern: Regex,
    /// The characters a matching value can start with; prunes the scan.
    first: &'static str,
}

/// Maps node kind, explicit tag and scalar content to a full tag string.
pub struct Resolver {
    implicits: Vec<ImplicitResolver>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver {
    /// Create a resolver with the YAML 1.1 implicit tag table.
    pub fn new() -> Resolver {
        let mut resolver = Resolver {
            implicits: Vec::new(),
        };
        resolver.add_implicit_resolver(
            BOOL_TAG,
            r"^(?:y|Y|yes|Yes|YES|n|N|no|No|NO|true|True|TRUE|false|False|FALSE|on|On|ON|off|Off|OFF)$",
            "yYnNtTfFoO",
        );
        resolver.add_implicit_resolver(
            INT_TAG,
            r"^(?:[-+]?0b[0-1_]+|[-+]?0x[0-9a-fA-F_]+|[-+]?0[0-7_]+|[-+]?(?:0|[1-9][0-9_]*)|[-+]?[1-9][0-9_]*(?::[0-5]?[0-9])+)$",
            "-+0123456789",
        );
        resolver.add_implicit_resolver(
            FLOAT_TAG,
            r"^(?:[-+]?(?:[0-9][0-9_]*)\.[0-9_]*(?:[eE][-+]?[0-9]+)?|\.[0-9_]+(?:[eE][-+]?[0-9]+)?|[-+]?[0-9][0-9_]*(?::[0-5]?[0-9])+\.[0-9_]*|[-+]?\.(?:inf|Inf|INF)|\.(?:nan|NaN|NAN))$",
            "-+0123456789.",
        );
        resolver.add_implicit_resolver(NULL_TAG, r"^(?:~|null|Null|NULL|)$", "~nN");
        resolver.add_implicit_resolver(MERGE_TAG, r"^(?:<<)$", "<");
        resolver.add_implicit_resolver(
            TIMESTAMP_TAG,
            r"^(?:[0-9][0-9][0-9][0-9]-[0-9][0-9]-[0-9][0-9]|[0-9][0-9][0-9][0-9]-[0-9][0-9]?-[0-9][0-9]?(?:[Tt]|[ \t]+)[0-9][0-9]?:[0-9][0-9]:[0-9][0-9](?:\.[0-9]*)?(?:[ \t]*(?:Z|[-+][0-9][0-9]?(?::[0-9][0-9])?))?)$",
            "0123456789",
        );
        resolver.add_implicit_resolver(VALUE_TAG, r"^(?:=)$", "=");
        resolver
    }

    /// Register an additional implicit resolver triple. Later registrations
    /// lose to earlier ones; first match wins.
    ///
    /// # Panics
    ///
    /// Panics if `pattern` is not a valid regular expression.
    pub fn add_implicit_resolver(
        &mut self,
        tag: &'static str,
        pattern: &str,
        first: &'static str,
    ) {
        let pattern = Regex::new(pattern).expect("invalid implicit resolver pattern");
        self.implicits.push(ImplicitResolver {
            tag,
            pattern,
            first,
        });
    }

    /// Resolve the full tag for a node.
    ///
    /// An explicit non-empty tag wins (the non-specific `!` resolves to the
    /// kind default). Implicit scalars run the pattern table; everything else
    /// falls back to the kind default.
    pub fn resolve(&self, kind: NodeKind, tag: Option<&str>, value: &str, implicit: bool) -> String {
        if let Some(tag) = tag {
            if tag == "!" {
                // The non-specific tag pins the node to its kind default.
                return String::from(match kind {
                    NodeKind::Scalar => DEFAULT_SCALAR_TAG,
                    NodeKind::Sequence => DEFAULT_SEQUENCE_TAG,
                    NodeKind::Mapping => DEFAULT_MAPPING_TAG,
                });
            }
            if !tag.is_empty() {
                return String::from(tag);
            }
        }
        if kind == NodeKind::Scalar && implicit {
            return String::from(self.resolve_implicit(value));
        }
        String::from(match kind {
            NodeKind::Scalar => DEFAULT_SCALAR_TAG,
            NodeKind::Sequence => DEFAULT_SEQUENCE_TAG,
            NodeKind::Mapping => DEFAULT_MAPPING_TAG,
        })
    }

    /// The tag a plain scalar with this content resolves to.
    pub(crate) fn resolve_implicit(&self, value: &str) -> &'static str {
        let first = value.chars().next();
        for resolver in &self.implicits {
            let hinted = match first {
                // Only the null pattern matches the empty string.
                None => resolver.tag == NULL_TAG,
                Some(ch) => resolver.first.contains(ch),
            };
            if hinted && resolver.pattern.is_match(value) {
                return resolver.tag;
            }
        }
        DEFAULT_SCALAR_TAG
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn implicit(value: &str) -> &'static str {
        Resolver::new().resolve_implicit(value)
    }

    #[test]
    fn integer_formats() {
        for value in ["685230", "+685_230", "02472256", "0x_0A_74_AE", "0b1010_0111_0100_1010_1110", "190:20:30"] {
            assert_eq!(implicit(value), INT_TAG, "{value}");
        }
    }

    #[test]
    fn float_formats() {
        for value in ["6.8523015e+5", "685.230_15e+03", "685_230.15", "190:20:30.15", "-.inf", ".NaN"] {
            assert_eq!(implicit(value), FLOAT_TAG, "{value}");
        }
    }

    #[test]
    fn booleans_and_nulls() {
        for value in ["y", "yes", "NO", "True", "off", "ON"] {
            assert_eq!(implicit(value), BOOL_TAG, "{value}");
        }
        for value in ["", "~", "null", "NULL"] {
            assert_eq!(implicit(value), NULL_TAG, "{value:?}");
        }
    }

    #[test]
    fn timestamps_and_merge() {
        assert_eq!(implicit("2001-12-14"), TIMESTAMP_TAG);
        assert_eq!(implicit("2001-12-14t21:59:43.10-05:00"), TIMESTAMP_TAG);
        assert_eq!(implicit("2001-12-14 21:59:43.10 -5"), TIMESTAMP_TAG);
        assert_eq!(implicit("<<"), MERGE_TAG);
        assert_eq!(implicit("="), VALUE_TAG);
    }

    #[test]
    fn everything_else_is_a_string() {
        assert_eq!(implicit("hello"), DEFAULT_SCALAR_TAG);
        assert_eq!(implicit("12 monkeys"), DEFAULT_SCALAR_TAG);
        assert_eq!(implicit("0x"), DEFAULT_SCALAR_TAG);
    }

    #[test]
    fn explicit_tag_wins() {
        let resolver = Resolver::new();
        assert_eq!(
            resolver.resolve(NodeKind::Scalar, Some("tag:yaml.org,2002:str"), "123", true),
            "tag:yaml.org,2002:str"
        );
        assert_eq!(
            resolver.resolve(NodeKind::Scalar, Some("!"), "123", true),
            DEFAULT_SCALAR_TAG
        );
    }

    #[test]
    fn user_resolvers_extend_the_table() {
        let mut resolver = Resolver::new();
        resolver.add_implicit_resolver("tag:example.com,2000:hex", r"^#[0-9a-f]{6}$", "#");
        assert_eq!(
            resolver.resolve_implicit("#a0b1c2"),
            "tag:example.com,2000:hex"
        );
    }
}
