use base64::Engine as _;
use chrono::offset::LocalResult;
use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone as _};
use regex::Regex;

use crate::node::{find_duplicate_key, Node, NodeValue};
use crate::{
    ConstructorError, Mark, BINARY_TAG, BOOL_TAG, FLOAT_TAG, INT_TAG, MAP_TAG, MERGE_TAG,
    NULL_TAG, OMAP_TAG, PAIRS_TAG, SEQ_TAG, SET_TAG, STR_TAG, TIMESTAMP_TAG, VALUE_TAG,
};

/// Decodes raw scalar strings and collection shapes from the composer into
/// typed node values, according to the resolved tag.
pub struct Constructor {
    timestamp: Regex,
}

impl Default for Constructor {
    fn default() -> Self {
        Self::new()
    }
}

impl Constructor {
    pub fn new() -> Constructor {
        Constructor {
            timestamp: Regex::new(
                r"^([0-9]{4})-([0-9]{1,2})-([0-9]{1,2})(?:(?:[Tt]|[ \t]+)([0-9]{1,2}):([0-9]{2}):([0-9]{2})(?:\.([0-9]*))?(?:[ \t]*(?:(Z)|([-+][0-9]{1,2})(?::([0-9]{2}))?))?)?$",
            )
            .expect("invalid timestamp pattern"),
        }
    }

    fn err<T>(problem: &'static str, value: &str, mark: Mark) -> Result<T, ConstructorError> {
        Err(ConstructorError::Problem {
            problem,
            value: String::from(value),
            mark,
        })
    }

    fn shape<T>(expected: &'static str, tag: &str, mark: Mark) -> Result<T, ConstructorError> {
        Err(ConstructorError::ShapeMismatch {
            expected,
            tag: String::from(tag),
            mark,
        })
    }

    /// Decode a scalar according to its resolved tag. Unrecognized tags keep
    /// the raw string so documents with application tags still load.
    pub fn construct_scalar(
        &self,
        mark: Mark,
        tag: &str,
        value: String,
    ) -> Result<NodeValue, ConstructorError> {
        match tag {
            NULL_TAG => Ok(NodeValue::Null),
            MERGE_TAG => Ok(NodeValue::Merge),
            BOOL_TAG => Ok(NodeValue::Bool(parse_bool(&value).ok_or_else(|| {
                ConstructorError::Problem {
                    problem: "invalid boolean",
                    value: value.clone(),
                    mark,
                }
            })?)),
            INT_TAG => match parse_int(&value) {
                Some(parsed) => Ok(NodeValue::Int(parsed)),
                None => Self::err("invalid integer", &value, mark),
            },
            FLOAT_TAG => match parse_float(&value) {
                Some(parsed) => Ok(NodeValue::Float(parsed)),
                None => Self::err("invalid float", &value, mark),
            },
            BINARY_TAG => {
                let compact: String = value.chars().filter(|ch| !ch.is_whitespace()).collect();
                match base64::engine::general_purpose::STANDARD.decode(compact) {
                    Ok(bytes) => Ok(NodeValue::Binary(bytes)),
                    Err(_) => Self::err("invalid base64", &value, mark),
                }
            }
            TIMESTAMP_TAG => match self.parse_timestamp(&value) {
                Some(parsed) => Ok(NodeValue::Timestamp(parsed)),
                None => Self::err("invalid timestamp", &value, mark),
            },
            SEQ_TAG | OMAP_TAG | PAIRS_TAG => Self::shape("sequence content", tag, mark),
            MAP_TAG | SET_TAG => Self::shape("mapping content", tag, mark),
            // STR_TAG, VALUE_TAG and application tags all pass through.
            _ => Ok(NodeValue::String(value)),
        }
    }

    /// Decode a composed sequence. `omap` and `pairs` restructure their
    /// single-pair mappings into one mapping value carrying the tag.
    pub fn construct_sequence(
        &self,
        mark: Mark,
        tag: &str,
        items: Vec<Node>,
    ) -> Result<NodeValue, ConstructorError> {
        match tag {
            OMAP_TAG | PAIRS_TAG => {
                let mut pairs = Vec::with_capacity(items.len());
                for item in items {
                    let item_mark = item.start_mark;
                    let NodeValue::Mapping(mut inner) = item.value else {
                        return Self::shape("a sequence of single-pair mappings", tag, item_mark);
                    };
                    if inner.len() != 1 {
                        return Self::shape("a sequence of single-pair mappings", tag, item_mark);
                    }
                    pairs.push(inner.pop().unwrap());
                }
                if tag == OMAP_TAG {
                    if let Some(key) = find_duplicate_key(&pairs) {
                        return Err(ConstructorError::Problem {
                            problem: "duplicate key in ordered mapping",
                            value: String::new(),
                            mark: key.start_mark,
                        });
                    }
                }
                Ok(NodeValue::Mapping(pairs))
            }
            NULL_TAG | BOOL_TAG | INT_TAG | FLOAT_TAG | BINARY_TAG | TIMESTAMP_TAG | STR_TAG
            | VALUE_TAG | MERGE_TAG => Self::shape("scalar content", tag, mark),
            MAP_TAG | SET_TAG => Self::shape("mapping content", tag, mark),
            _ => Ok(NodeValue::Sequence(items)),
        }
    }

    /// Decode a composed mapping. Duplicate keys were already rejected by the
    /// composer; `set` additionally requires null values.
    pub fn construct_mapping(
        &self,
        mark: Mark,
        tag: &str,
        pairs: Vec<(Node, Node)>,
    ) -> Result<NodeValue, ConstructorError> {
        match tag {
            SET_TAG => {
                for (_, value) in &pairs {
                    if !value.is_null() {
                        return Self::shape("null values", tag, value.start_mark);
                    }
                }
                Ok(NodeValue::Mapping(pairs))
            }
            NULL_TAG | BOOL_TAG | INT_TAG | FLOAT_TAG | BINARY_TAG | TIMESTAMP_TAG | STR_TAG
            | VALUE_TAG | MERGE_TAG => Self::shape("scalar content", tag, mark),
            SEQ_TAG | OMAP_TAG | PAIRS_TAG => Self::shape("sequence content", tag, mark),
            _ => Ok(NodeValue::Mapping(pairs)),
        }
    }

    fn parse_timestamp(&self, value: &str) -> Option<DateTime<FixedOffset>> {
        let captures = self.timestamp.captures(value)?;
        let year: i32 = captures.get(1)?.as_str().parse().ok()?;
        let month: u32 = captures.get(2)?.as_str().parse().ok()?;
        let day: u32 = captures.get(3)?.as_str().parse().ok()?;
        let date = NaiveDate::from_ymd_opt(year, month, day)?;

        let (hour, minute, second) = match captures.get(4) {
            Some(hour) => (
                hour.as_str().parse().ok()?,
                captures.get(5)?.as_str().parse().ok()?,
                captures.get(6)?.as_str().parse().ok()?,
            ),
            None => (0, 0, 0),
        };
        // Fractional seconds keep at most nanosecond precision.
        let nanos = match captures.get(7) {
            Some(fraction) => {
                let digits: String = fraction
                    .as_str()
                    .chars()
                    .chain(std::iter::repeat('0'))
                    .take(9)
                    .collect();
                digits.parse::<u32>().ok()?
            }
            None => 0,
        };
        let time = date.and_hms_nano_opt(hour, minute, second, nanos)?;

        let offset_seconds = if captures.get(8).is_some() {
            0
        } else if let Some(hours) = captures.get(9) {
            let hours: i32 = hours.as_str().parse().ok()?;
            let minutes: i32 = captures
                .get(10)
                .map_or(Ok(0), |m| m.as_str().parse())
                .ok()?;
            hours * 3600 + hours.signum() * minutes * 60
        } else {
            0
        };
        let offset = FixedOffset::east_opt(offset_seconds)?;
        match offset.from_local_datetime(&time) {
            LocalResult::Single(datetime) => Some(datetime),
            _ => None,
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "y" | "yes" | "on" | "true" => Some(true),
        "n" | "no" | "off" | "false" => Some(false),
        _ => None,
    }
}

/// Parse a YAML 1.1 integer: decimal, `0x`, `0b`, leading-zero octal, or
/// base-60 sexagesimal, with `_` separators.
pub(crate) fn parse_int(value: &str) -> Option<i64> {
    let stripped: String = value.chars().filter(|&ch| ch != '_').collect();
    let (negative, rest) = match stripped.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, stripped.strip_prefix('+').unwrap_or(&stripped)),
    };
    if rest.is_empty() {
        return None;
    }
    let magnitude = if let Some(hex) = rest.strip_prefix("0x") {
        u64::from_str_radix(hex, 16).ok()?
    } else if let Some(binary) = rest.strip_prefix("0b") {
        u64::from_str_radix(binary, 2).ok()?
    } else if rest.contains(':') {
        let mut magnitude: u64 = 0;
        for part in rest.split(':') {
            let digit: u64 = part.parse().ok()?;
            if digit >= 60 && magnitude != 0 {
                return None;
            }
            magnitude = magnitude.checked_mul(60)?.checked_add(digit)?;
        }
        magnitude
    } else if rest.len() > 1 && rest.starts_with('0') {
        u64::from_str_radix(&rest[1..], 8).ok()?
    } else {
        rest.parse().ok()?
    };
    if negative {
        let signed = -i128::from(magnitude);
        if signed < i128::from(i64::MIN) {
            None
        } else {
            Some(signed as i64)
        }
    } else {
        i64::try_from(magnitude).ok()
    }
}

/// Parse a YAML 1.1 float, including `.inf`, `.nan` and sexagesimal forms.
pub(crate) fn parse_float(value: &str) -> Option<f64> {
    let stripped: String = value.chars().filter(|&ch| ch != '_').collect();
    match stripped.to_ascii_lowercase().as_str() {
        ".inf" | "+.inf" => return Some(f64::INFINITY),
        "-.inf" => return Some(f64::NEG_INFINITY),
        ".nan" => return Some(f64::NAN),
        _ => (),
    }
    if stripped.contains(':') {
        let (negative, rest) = match stripped.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, stripped.strip_prefix('+').unwrap_or(&stripped)),
        };
        let mut magnitude = 0.0f64;
        for part in rest.split(':') {
            let digit: f64 = part.parse().ok()?;
            magnitude = magnitude * 60.0 + digit;
        }
        return Some(if negative { -magnitude } else { magnitude });
    }
    stripped.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike as _;

    #[test]
    fn integer_formats_agree() {
        for value in [
            "685230",
            "685_230",
            "+685_230",
            "02472256",
            "0x_0A_74_AE",
            "0b1010_0111_0100_1010_1110",
            "190:20:30",
        ] {
            assert_eq!(parse_int(value), Some(685230), "{value}");
        }
        assert_eq!(parse_int("-0x10"), Some(-16));
        assert_eq!(parse_int("-9223372036854775808"), Some(i64::MIN));
        assert_eq!(parse_int("9223372036854775808"), None);
        assert_eq!(parse_int("12:00:03"), Some(43203));
        assert_eq!(parse_int(""), None);
        assert_eq!(parse_int("0x"), None);
    }

    #[test]
    fn float_formats_agree() {
        assert!((parse_float("685.230_15e+03").unwrap() - 685230.15).abs() < 1e-6);
        assert!((parse_float("190:20:30.15").unwrap() - 685230.15).abs() < 1e-6);
        assert_eq!(parse_float("-.inf"), Some(f64::NEG_INFINITY));
        assert!(parse_float(".NaN").unwrap().is_nan());
    }

    #[test]
    fn booleans() {
        assert_eq!(parse_bool("YES"), Some(true));
        assert_eq!(parse_bool("Off"), Some(false));
        assert_eq!(parse_bool("y"), Some(true));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn timestamp_with_timezone() {
        let constructor = Constructor::new();
        let parsed = constructor
            .parse_timestamp("2001-12-14t21:59:43.10-05:00")
            .unwrap();
        assert_eq!(parsed.offset().local_minus_utc(), -5 * 3600);
        assert_eq!(parsed.time().hour(), 21);
        assert_eq!(parsed.time().nanosecond(), 100_000_000);

        let canonical = constructor.parse_timestamp("2001-12-15T02:59:43.1Z").unwrap();
        assert_eq!(parsed, canonical);
    }

    #[test]
    fn date_only_timestamp_is_midnight_utc() {
        let constructor = Constructor::new();
        let parsed = constructor.parse_timestamp("2002-12-14").unwrap();
        assert_eq!(parsed.offset().local_minus_utc(), 0);
        assert_eq!(parsed.time().hour(), 0);
    }

    #[test]
    fn binary_decoding() {
        let constructor = Constructor::new();
        let decoded = constructor
            .construct_scalar(Mark::default(), BINARY_TAG, String::from("aGVs\n bG8="))
            .unwrap();
        assert!(matches!(decoded, NodeValue::Binary(bytes) if bytes == b"hello"));
        assert!(constructor
            .construct_scalar(Mark::default(), BINARY_TAG, String::from("???"))
            .is_err());
    }

    #[test]
    fn shape_mismatches_are_rejected() {
        let constructor = Constructor::new();
        assert!(constructor
            .construct_scalar(Mark::default(), SEQ_TAG, String::from("x"))
            .is_err());
        assert!(constructor
            .construct_sequence(Mark::default(), INT_TAG, vec![Node::int(1)])
            .is_err());
        assert!(constructor
            .construct_mapping(Mark::default(), OMAP_TAG, vec![])
            .is_err());
    }

    #[test]
    fn omap_rejects_duplicates_and_pairs_allows_them() {
        let constructor = Constructor::new();
        let entry = |key: &str, value: i64| {
            Node::mapping(vec![(Node::string(key), Node::int(value))])
        };
        let duplicated = vec![entry("a", 1), entry("a", 2)];
        assert!(constructor
            .construct_sequence(Mark::default(), OMAP_TAG, duplicated.clone())
            .is_err());
        let decoded = constructor
            .construct_sequence(Mark::default(), PAIRS_TAG, duplicated)
            .unwrap();
        assert!(matches!(decoded, NodeValue::Mapping(pairs) if pairs.len() == 2));
    }
}
