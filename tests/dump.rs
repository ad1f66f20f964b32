use pretty_assertions::assert_eq;

use yaml11::{dump, dump_all, load, Break, CollectionStyle, Dumper, Node, ScalarStyle};

fn dump_to_string(node: &Node) -> String {
    let mut output = Vec::new();
    dump(&mut output, node).unwrap();
    String::from_utf8(output).unwrap()
}

#[test]
fn plain_scalars() {
    assert_eq!(dump_to_string(&Node::string("hello")), "hello\n");
    assert_eq!(dump_to_string(&Node::int(685230)), "685230\n");
    assert_eq!(dump_to_string(&Node::float(0.25)), "0.25\n");
    assert_eq!(dump_to_string(&Node::bool(true)), "true\n");
    assert_eq!(dump_to_string(&Node::null()), "null\n");
}

#[test]
fn strings_that_look_like_other_types_get_quoted() {
    assert_eq!(dump_to_string(&Node::string("685230")), "'685230'\n");
    assert_eq!(dump_to_string(&Node::string("yes")), "'yes'\n");
    assert_eq!(dump_to_string(&Node::string("")), "''\n");
}

#[test]
fn flat_collections_dump_in_flow_style() {
    let sequence = Node::sequence(vec![Node::int(1), Node::int(2), Node::int(3)]);
    assert_eq!(dump_to_string(&sequence), "[1, 2, 3]\n");

    let mapping = Node::mapping(vec![
        (Node::string("a"), Node::int(1)),
        (Node::string("b"), Node::int(2)),
    ]);
    assert_eq!(dump_to_string(&mapping), "{a: 1, b: 2}\n");
}

#[test]
fn nested_collections_dump_in_block_style() {
    let node = Node::mapping(vec![(
        Node::string("outer"),
        Node::mapping(vec![(Node::string("inner"), Node::int(1))]),
    )]);
    assert_eq!(dump_to_string(&node), "outer: {inner: 1}\n");

    let loaded = load(b"a: 1\nb: 2\n").unwrap();
    assert_eq!(dump_to_string(&loaded), "a: 1\nb: 2\n");

    let loaded = load(b"a:\n  b: 1\n").unwrap();
    assert_eq!(dump_to_string(&loaded), "a:\n  b: 1\n");

    let loaded = load(b"a:\n- 1\n- 2\n").unwrap();
    assert_eq!(dump_to_string(&loaded), "a:\n- 1\n- 2\n");
}

#[test]
fn explicit_document_markers() {
    let mut dumper = Dumper::new();
    dumper.set_explicit_start(true);
    let output = dumper.dump_to_vec(&Node::string("hello")).unwrap();
    assert_eq!(String::from_utf8(output).unwrap(), "--- hello\n");

    let mut dumper = Dumper::new();
    dumper.set_explicit_end(true);
    let output = dumper.dump_to_vec(&Node::string("hello")).unwrap();
    assert_eq!(String::from_utf8(output).unwrap(), "hello\n...\n");
}

#[test]
fn yaml_version_directive() {
    let mut dumper = Dumper::new();
    dumper.set_yaml_version(1, 1);
    let output = dumper.dump_to_vec(&Node::string("hello")).unwrap();
    assert_eq!(String::from_utf8(output).unwrap(), "%YAML 1.1\n--- hello\n");
}

#[test]
fn canonical_mode_forces_tags_and_quoting() {
    let mut dumper = Dumper::new();
    dumper.set_canonical(true);
    let output = dumper.dump_to_vec(&Node::int(5)).unwrap();
    assert_eq!(String::from_utf8(output).unwrap(), "---\n!!int \"5\"\n");
}

#[test]
fn windows_line_breaks() {
    let mut dumper = Dumper::new();
    dumper.set_line_break(Break::CrLn);
    let output = dumper.dump_to_vec(&Node::string("hello")).unwrap();
    assert_eq!(String::from_utf8(output).unwrap(), "hello\r\n");
}

#[test]
fn indent_width_is_configurable() {
    let mut dumper = Dumper::new();
    dumper.set_indent(4);
    let loaded = load(b"a:\n  b: 1\n").unwrap();
    let output = dumper.dump_to_vec(&loaded).unwrap();
    assert_eq!(String::from_utf8(output).unwrap(), "a:\n    b: 1\n");
}

#[test]
fn repeated_subtrees_get_anchors() {
    let shared = Node::mapping(vec![(Node::string("x"), Node::int(1))]);
    let node = Node::sequence(vec![shared.clone(), shared]);
    let output = dump_to_string(&node);
    assert_eq!(output, "- &id001 {x: 1}\n- *id001\n");

    let reloaded = load(output.as_bytes()).unwrap();
    let items = reloaded.as_sequence().unwrap();
    assert_eq!(items[0], items[1]);
}

#[test]
fn binary_dumps_as_literal_block() {
    let output = dump_to_string(&Node::binary(b"hello".to_vec()));
    assert_eq!(output, "!!binary |-\n  aGVsbG8=\n");
}

#[test]
fn tag_directives_shorten_tags() {
    let mut dumper = Dumper::new();
    dumper.add_tag_directive("!e!", "tag:example.com,2000:app/");
    let mut node = Node::string("scalar");
    node.tag = String::from("tag:example.com,2000:app/thing");
    let output = String::from_utf8(dumper.dump_to_vec(&node).unwrap()).unwrap();
    assert!(output.contains("%TAG !e! tag:example.com,2000:app/"), "{output}");
    assert!(output.contains("!e!thing scalar"), "{output}");
}

#[test]
fn default_styles_apply_where_nodes_do_not_choose() {
    let mut dumper = Dumper::new();
    dumper.set_default_collection_style(CollectionStyle::Block);
    // Override the representer's flow default via the dumper option.
    let mut sequence = Node::sequence(vec![Node::int(1), Node::int(2)]);
    sequence.collection_style = CollectionStyle::Any;
    let mut output = Vec::new();
    dumper.dump(&mut output, &[sequence]).unwrap();
    assert_eq!(String::from_utf8(output).unwrap(), "- 1\n- 2\n");

    let mut dumper = Dumper::new();
    dumper.set_default_scalar_style(ScalarStyle::SingleQuoted);
    let output = dumper.dump_to_vec(&Node::string("hello")).unwrap();
    assert_eq!(String::from_utf8(output).unwrap(), "'hello'\n");
}

#[test]
fn multi_document_dump() {
    let mut output = Vec::new();
    dump_all(&mut output, &[Node::string("first"), Node::string("second")]).unwrap();
    let text = String::from_utf8(output).unwrap();
    assert_eq!(text, "first\n--- second\n");

    let reloaded = yaml11::load_all(text.as_bytes()).unwrap();
    assert_eq!(reloaded.len(), 2);
}

#[test]
fn multiline_strings_use_escapes_or_blocks() {
    let loaded = load(b"text: |\n  a\n  b\n").unwrap();
    let output = dump_to_string(&loaded);
    assert_eq!(output, "text: |\n  a\n  b\n");

    let folded = load(b"text: >-\n  one two\n").unwrap();
    let output = dump_to_string(&folded);
    assert_eq!(output, "text: >-\n  one two\n");
}

#[test]
fn colon_is_always_followed_by_space_outside_flow() {
    let loaded = load(b"a: 1\nlong key: [1, 2]\nnested:\n  x: y\n").unwrap();
    let output = dump_to_string(&loaded);
    for (position, _) in output.match_indices(':') {
        let next = output.as_bytes().get(position + 1).copied();
        assert!(
            next == Some(b' ') || next == Some(b'\n'),
            "':' not followed by space or break in {output:?}"
        );
    }
}
