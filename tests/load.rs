use pretty_assertions::assert_eq;

use yaml11::{load, load_all, Loader, Node, NodeValue, YamlError};

#[test]
fn integer_formats_all_resolve_to_the_same_value() {
    let node = load(
        b"canonical: 685230\n\
          decimal: +685_230\n\
          octal: 02472256\n\
          hexadecimal: 0x_0A_74_AE\n\
          binary: 0b1010_0111_0100_1010_1110\n\
          sexagesimal: 190:20:30\n",
    )
    .unwrap();
    for key in [
        "canonical",
        "decimal",
        "octal",
        "hexadecimal",
        "binary",
        "sexagesimal",
    ] {
        assert_eq!(node.get(key).and_then(Node::as_int), Some(685230), "{key}");
    }
}

#[test]
fn floats_and_specials() {
    let node = load(
        b"exp: 6.8523015e+5\n\
          fixed: 685_230.15\n\
          sexagesimal: 190:20:30.15\n\
          negative infinity: -.inf\n\
          not a number: .NaN\n",
    )
    .unwrap();
    let float = |key: &str| node.get(key).and_then(Node::as_float).unwrap();
    assert!((float("exp") - 685230.15).abs() < 1e-6);
    assert!((float("fixed") - 685230.15).abs() < 1e-6);
    assert!((float("sexagesimal") - 685230.15).abs() < 1e-6);
    assert_eq!(float("negative infinity"), f64::NEG_INFINITY);
    assert!(float("not a number").is_nan());
}

#[test]
fn booleans_nulls_and_strings() {
    let node = load(
        b"truthy: yes\n\
          falsy: Off\n\
          nothing: ~\n\
          empty:\n\
          tagged: !!str 685230\n\
          words: 12 monkeys\n",
    )
    .unwrap();
    assert_eq!(node.get("truthy").and_then(Node::as_bool), Some(true));
    assert_eq!(node.get("falsy").and_then(Node::as_bool), Some(false));
    assert!(node.get("nothing").unwrap().is_null());
    assert!(node.get("empty").unwrap().is_null());
    assert_eq!(node.get("tagged").and_then(Node::as_str), Some("685230"));
    assert_eq!(node.get("words").and_then(Node::as_str), Some("12 monkeys"));
}

#[test]
fn timestamp_with_timezone() {
    let node = load(b"moment: 2001-12-14t21:59:43.10-05:00\n").unwrap();
    let NodeValue::Timestamp(moment) = &node.get("moment").unwrap().value else {
        panic!("expected a timestamp");
    };
    assert_eq!(moment.offset().local_minus_utc(), -5 * 3600);
    use chrono::Timelike as _;
    assert_eq!(moment.hour(), 21);
    assert_eq!(moment.minute(), 59);
    assert_eq!(moment.second(), 43);
    assert_eq!(moment.nanosecond(), 100_000_000);
}

#[test]
fn merge_key_lets_explicit_pairs_shadow() {
    let node = load(b"defaults: &d { x: 1, y: 2 }\nitem: { <<: *d, y: 99 }\n").unwrap();
    let expected = Node::mapping(vec![
        (Node::string("x"), Node::int(1)),
        (Node::string("y"), Node::int(99)),
    ]);
    assert_eq!(node.get("item"), Some(&expected));
}

#[test]
fn merge_value_shapes() {
    // A mapping and a sequence of mappings both merge.
    let merged = load(b"a: &one { p: 1 }\nb: &two { q: 2 }\nitem: { <<: [*one, *two] }\n").unwrap();
    let item = merged.get("item").unwrap();
    assert_eq!(item.get("p").and_then(Node::as_int), Some(1));
    assert_eq!(item.get("q").and_then(Node::as_int), Some(2));

    // A sequence containing a non-mapping does not.
    assert!(load(b"bad: &b [1, 2]\nitem: { <<: *b }\n").is_err());
    // Neither does a bare scalar.
    assert!(load(b"item: { <<: 5 }\n").is_err());
}

#[test]
fn set_loads_as_mapping_with_null_values() {
    let node = load(b"!!set { a, b, c }\n").unwrap();
    assert_eq!(node.tag, "tag:yaml.org,2002:set");
    let pairs = node.as_mapping().unwrap();
    assert_eq!(pairs.len(), 3);
    assert!(pairs.iter().all(|(_, value)| value.is_null()));
}

#[test]
fn omap_preserves_order_and_rejects_duplicates() {
    let node = load(b"!!omap [{k1: v1}, {k2: v2}]\n").unwrap();
    assert_eq!(node.tag, "tag:yaml.org,2002:omap");
    let pairs = node.as_mapping().unwrap();
    assert_eq!(pairs[0].0.as_str(), Some("k1"));
    assert_eq!(pairs[1].0.as_str(), Some("k2"));

    assert!(load(b"!!omap [{k: 1}, {k: 2}]\n").is_err());
    assert!(load(b"!!pairs [{k: 1}, {k: 2}]\n").is_ok());
}

#[test]
fn folded_scalar_with_strip_chomping() {
    let node = load(b"text: >-\n  line one\n  line two\n").unwrap();
    assert_eq!(node.get("text").and_then(Node::as_str), Some("line one line two"));
}

#[test]
fn literal_scalar_keeps_breaks() {
    let node = load(b"text: |\n  line one\n  line two\n").unwrap();
    assert_eq!(
        node.get("text").and_then(Node::as_str),
        Some("line one\nline two\n")
    );
}

#[test]
fn double_quoted_escapes() {
    let node = load(
        b"unicode: \"Sosa did fine.\\u263A\"\n\
          control: \"\\b1998\\t1999\\t2000\\n\"\n\
          hex esc: \"\\x0d\\x0a is \\r\\n\"\n",
    )
    .unwrap();
    assert_eq!(
        node.get("unicode").and_then(Node::as_str),
        Some("Sosa did fine.\u{263A}")
    );
    assert_eq!(
        node.get("control").and_then(Node::as_str),
        Some("\u{8}1998\t1999\t2000\n")
    );
    assert_eq!(
        node.get("hex esc").and_then(Node::as_str),
        Some("\r\n is \r\n")
    );
}

#[test]
fn anchors_and_aliases_copy_nodes() {
    let node = load(b"a: &shared [1, 2]\nb: *shared\n").unwrap();
    assert_eq!(node.get("a"), node.get("b"));
}

#[test]
fn alias_errors() {
    assert!(load(b"a: *nope\n").is_err());
    assert!(load(b"a: &x 1\nb: &x 2\n").is_err());
    // A node must not alias itself while still being composed.
    assert!(load(b"&a [*a]\n").is_err());
}

#[test]
fn duplicate_mapping_keys_are_rejected() {
    assert!(load(b"a: 1\na: 2\n").is_err());
    assert!(load(b"a: 1\nb: 2\n").is_ok());
}

#[test]
fn binary_scalar_decodes_base64() {
    let node = load(b"data: !!binary \"aGVsbG8=\"\n").unwrap();
    let NodeValue::Binary(bytes) = &node.get("data").unwrap().value else {
        panic!("expected binary");
    };
    assert_eq!(bytes, b"hello");
}

#[test]
fn tag_directives_expand_shorthands() {
    let node = load(b"%TAG !e! tag:example.com,2000:app/\n--- !e!thing scalar\n").unwrap();
    assert_eq!(node.tag, "tag:example.com,2000:app/thing");
    assert_eq!(node.as_str(), Some("scalar"));
}

#[test]
fn duplicate_tag_directive_is_fatal() {
    let result = load(b"%TAG !e! tag:a\n%TAG !e! tag:b\n--- x\n");
    assert!(matches!(result, Err(YamlError::Parser { .. })));
}

#[test]
fn multi_document_streams() {
    let documents = load_all(b"---\nfirst\n---\nsecond\n...\n").unwrap();
    assert_eq!(documents.len(), 2);
    assert_eq!(documents[0].as_str(), Some("first"));
    assert_eq!(documents[1].as_str(), Some("second"));

    // load() insists on a single document.
    assert!(load(b"---\nfirst\n---\nsecond\n").is_err());
    assert!(load(b"").is_err());
}

#[test]
fn loader_iterates_documents() {
    let mut input: &[u8] = b"- 1\n---\n- 2\n";
    let loader = Loader::from_reader(&mut input).with_name("stream.yaml");
    let documents: Result<Vec<_>, _> = loader.collect();
    assert_eq!(documents.unwrap().len(), 2);
}

#[test]
fn input_name_appears_in_errors() {
    let mut input: &[u8] = b"a: *undefined\n";
    let err = Loader::from_reader(&mut input)
        .with_name("config.yaml")
        .load()
        .unwrap_err();
    assert!(err.to_string().contains("config.yaml"), "{err}");
}

#[test]
fn utf16_input_with_bom() {
    let mut bytes = vec![0xFF, 0xFE];
    for unit in "a: 1\n".encode_utf16() {
        bytes.extend(unit.to_le_bytes());
    }
    let node = load(&bytes).unwrap();
    assert_eq!(node.get("a").and_then(Node::as_int), Some(1));
}

#[test]
fn deeply_nested_flow_sequences() {
    let mut input = String::new();
    for _ in 0..1000 {
        input.push('[');
    }
    for _ in 0..1000 {
        input.push(']');
    }
    input.push('\n');
    let mut node = load(input.as_bytes()).unwrap();
    let mut depth = 0;
    loop {
        let items = node.as_sequence().unwrap();
        depth += 1;
        if items.is_empty() {
            break;
        }
        node = items[0].clone();
    }
    assert_eq!(depth, 1000);
}

#[test]
fn flow_sequence_of_single_pair_mappings() {
    let node = load(b"[one: two]\n").unwrap();
    let items = node.as_sequence().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].get("one").and_then(Node::as_str), Some("two"));
}

#[test]
fn reader_rejects_control_characters() {
    let result = load(b"a: \x01\n");
    assert!(matches!(result, Err(YamlError::Reader { .. })));
}

#[test]
fn custom_implicit_resolvers() {
    let mut input: &[u8] = b"color: abcdef\n";
    let mut loader = Loader::from_reader(&mut input);
    loader.resolver_mut().add_implicit_resolver(
        "tag:example.com,2000:hex",
        r"^[0-9a-f]{6}$",
        "0123456789abcdef",
    );
    let node = loader.load().unwrap();
    assert_eq!(node.get("color").unwrap().tag, "tag:example.com,2000:hex");
}
