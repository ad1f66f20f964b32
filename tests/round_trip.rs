use pretty_assertions::assert_eq;

use yaml11::{dump, dump_all, load, load_all, Node};

fn reload(node: &Node) -> Node {
    let mut output = Vec::new();
    dump(&mut output, node).unwrap();
    load(&output).unwrap_or_else(|err| {
        panic!(
            "reload failed: {err}\n--- emitted ---\n{}",
            String::from_utf8_lossy(&output)
        )
    })
}

/// `load(dump(load(D)))` equals `load(D)`; styles may normalize, values and
/// structure may not.
#[test]
fn documents_survive_a_round_trip() {
    let documents: &[&[u8]] = &[
        b"hello\n",
        b"a: 1\nb: two\nc: [3, 4]\n",
        b"- 1\n- two\n- null\n- yes\n",
        b"nested:\n  further:\n    deep: [a, {b: c}]\n",
        b"quoted: 'single'\ndouble: \"two\\nlines\"\n",
        b"literal: |\n  first\n  second\n",
        b"folded: >\n  first second\n",
        b"anchors: &a [1, 2]\nreuse: *a\n",
        b"defaults: &d { x: 1, y: 2 }\nitem: { <<: *d, y: 99 }\n",
        b"moment: 2001-12-14t21:59:43.10-05:00\nday: 2002-12-14\n",
        b"data: !!binary \"aGVsbG8gd29ybGQ=\"\n",
        b"!!set { a, b, c }\n",
        b"!!omap [{k1: v1}, {k2: v2}]\n",
        b"floats: [.inf, -.inf, 0.25, 6.8523015e+5]\n",
        b"ints: [0, -42, 0x10, 0b101, 190:20:30]\n",
        b"empty value:\nempty flow: {}\nempty seq: []\n",
        b"? [complex, key]\n: value\n",
    ];
    for document in documents {
        let first = load(document).unwrap_or_else(|err| {
            panic!(
                "load failed: {err}\n--- input ---\n{}",
                String::from_utf8_lossy(document)
            )
        });
        let second = reload(&first);
        assert_eq!(
            first,
            second,
            "round trip changed {}",
            String::from_utf8_lossy(document)
        );
    }
}

/// `load(dump(N))` equals `N` for programmatically built trees of every
/// supported scalar type.
#[test]
fn built_trees_survive_a_round_trip() {
    let timestamp = chrono::FixedOffset::west_opt(5 * 3600)
        .unwrap()
        .with_ymd_and_hms(2001, 12, 14, 21, 59, 43)
        .unwrap();
    use chrono::TimeZone as _;

    let nodes = vec![
        Node::null(),
        Node::bool(false),
        Node::int(0),
        Node::int(i64::MIN),
        Node::int(i64::MAX),
        Node::float(0.25),
        Node::float(-1.5e300),
        Node::float(f64::INFINITY),
        Node::string("plain words"),
        Node::string("123"),
        Node::string("yes"),
        Node::string(""),
        Node::string("line one\nline two\n"),
        Node::binary(b"\x00\x01\xFFbinary".to_vec()),
        Node::timestamp(timestamp),
        Node::sequence(vec![Node::int(1), Node::string("two"), Node::null()]),
        Node::mapping(vec![
            (Node::string("key"), Node::sequence(vec![Node::bool(true)])),
            (Node::int(42), Node::string("int key")),
        ]),
    ];
    for node in nodes {
        assert_eq!(reload(&node), node);
    }
}

#[test]
fn nan_round_trips_to_nan() {
    let reloaded = reload(&Node::float(f64::NAN));
    assert!(reloaded.as_float().unwrap().is_nan());
}

#[test]
fn multi_document_round_trip() {
    let nodes = vec![
        Node::string("first"),
        Node::sequence(vec![Node::int(1)]),
        Node::mapping(vec![(Node::string("k"), Node::null())]),
    ];
    let mut output = Vec::new();
    dump_all(&mut output, &nodes).unwrap();
    let reloaded = load_all(&output).unwrap();
    assert_eq!(reloaded, nodes);
}

#[test]
fn shared_subtrees_round_trip_through_anchors() {
    let shared = Node::mapping(vec![(Node::string("deep"), Node::sequence(vec![Node::int(1)]))]);
    let tree = Node::sequence(vec![shared.clone(), shared.clone(), shared]);
    let reloaded = reload(&tree);
    assert_eq!(reloaded, tree);

    let mut output = Vec::new();
    dump(&mut output, &tree).unwrap();
    let text = String::from_utf8(output).unwrap();
    // Exactly one definition precedes the aliases.
    assert_eq!(text.matches("&id001").count(), 1, "{text}");
    assert_eq!(text.matches("*id001").count(), 2, "{text}");
}

#[test]
fn omap_round_trips_with_order_and_tag() {
    let first = load(b"!!omap [{k1: v1}, {k2: v2}, {k3: v3}]\n").unwrap();
    let mut output = Vec::new();
    dump(&mut output, &first).unwrap();
    let text = String::from_utf8(output.clone()).unwrap();
    assert!(text.contains("!!omap"), "{text}");
    assert!(text.find("k1").unwrap() < text.find("k2").unwrap(), "{text}");

    let second = load(&output).unwrap();
    assert_eq!(first, second);
}

#[test]
fn set_round_trips_with_tag() {
    let first = load(b"!!set { a, b, c }\n").unwrap();
    let mut output = Vec::new();
    dump(&mut output, &first).unwrap();
    let text = String::from_utf8(output.clone()).unwrap();
    assert!(text.contains("!!set"), "{text}");

    let second = load(&output).unwrap();
    assert_eq!(first, second);
}
