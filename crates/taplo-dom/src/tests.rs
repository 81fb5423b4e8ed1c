use super::*;
use facet_testhelpers::test;
use taplo_cst::{TextRange, TextSize};

fn dom(source: &str) -> Dom {
    let (parse, dom) = parse(source);
    assert!(parse.is_ok(), "unexpected syntax errors: {:?}", parse.errors());
    dom
}

fn get<'a>(dom: &'a Dom, keys: &[&str]) -> &'a Scalar {
    let id = dom.lookup_keys(keys).unwrap_or_else(|| panic!("missing {keys:?}"));
    dom.scalar(id).unwrap_or_else(|| panic!("{keys:?} is not a scalar"))
}

fn range(start: u32, end: u32) -> TextRange {
    TextRange::new(TextSize::from(start), TextSize::from(end))
}

#[test]
fn test_headers_and_dotted_keys() {
    let dom = dom("title = \"x\"\n[server]\nhost.name = \"local\"\nport = 80\n");
    assert!(dom.is_valid());
    assert_eq!(get(&dom, &["title"]), &Scalar::String("x".into()));
    assert_eq!(get(&dom, &["server", "host", "name"]), &Scalar::String("local".into()));
    assert_eq!(get(&dom, &["server", "port"]), &Scalar::Integer(80));

    let server = dom.lookup_keys(&["server"]).unwrap();
    assert_eq!(dom.table(server).unwrap().kind, TableKind::Header);
    let host = dom.lookup_keys(&["server", "host"]).unwrap();
    assert_eq!(dom.table(host).unwrap().kind, TableKind::Dotted);
}

#[test]
fn test_entries_keep_source_order() {
    let dom = dom("b = 1\na = 2\nc = 3\n");
    let keys: Vec<_> = dom.table(dom.root()).unwrap().entries.keys().cloned().collect();
    assert_eq!(keys, vec!["b", "a", "c"]);
}

#[test]
fn test_duplicate_key_keeps_first() {
    let dom = dom("a = 1\na = 2\n");
    assert_eq!(dom.errors().len(), 1);
    let SemanticError::DuplicateKey { key, first, range: second } = &dom.errors()[0] else {
        panic!("expected duplicate key, got {:?}", dom.errors());
    };
    assert_eq!(key, "a");
    assert_eq!(*first, Some(range(0, 1)));
    assert_eq!(*second, range(6, 7));
    assert_eq!(get(&dom, &["a"]), &Scalar::Integer(1));
}

#[test]
fn test_implicit_table_can_be_defined_once() {
    let dom = dom("[a.b]\nx = 1\n[a]\ny = 2\n");
    assert!(dom.is_valid(), "{:?}", dom.errors());
    assert_eq!(get(&dom, &["a", "y"]), &Scalar::Integer(2));
    assert_eq!(get(&dom, &["a", "b", "x"]), &Scalar::Integer(1));

    let dom = dom_with_errors("[a]\n[a]\n");
    assert!(matches!(dom.errors()[0], SemanticError::ConflictingTable { .. }));
}

fn dom_with_errors(source: &str) -> Dom {
    let dom = dom(source);
    assert!(!dom.is_valid(), "expected semantic errors in {source:?}");
    dom
}

#[test]
fn test_array_of_tables() {
    let dom = dom("[[bin]]\nname = \"a\"\n[[bin]]\nname = \"b\"\n[bin.extra]\nx = true\n");
    assert!(dom.is_valid(), "{:?}", dom.errors());
    let bin = dom.lookup_keys(&["bin"]).unwrap();
    let array = dom.array(bin).unwrap();
    assert_eq!(array.kind, ArrayKind::Tables);
    assert_eq!(array.items.len(), 2);

    let second = dom
        .lookup(&[PathSegment::Key("bin".into()), PathSegment::Index(1)])
        .unwrap();
    assert_eq!(dom.table(second).unwrap().kind, TableKind::ArrayItem);
    let extra = dom.lookup(&[
        PathSegment::Key("bin".into()),
        PathSegment::Index(1),
        PathSegment::Key("extra".into()),
        PathSegment::Key("x".into()),
    ]);
    assert_eq!(extra.and_then(|id| dom.scalar(id)), Some(&Scalar::Bool(true)));
}

#[test]
fn test_static_array_cannot_be_extended() {
    let dom = dom_with_errors("a = [1]\n[[a]]\n");
    assert!(matches!(dom.errors()[0], SemanticError::ConflictingTable { .. }));
}

#[test]
fn test_inline_table_is_closed() {
    let dom = dom_with_errors("a = { b = 1 }\n[a.c]\n");
    assert!(matches!(dom.errors()[0], SemanticError::ConflictingTable { .. }));

    let dom = dom_with_errors("a = { b = 1 }\na.c = 2\n");
    assert!(matches!(dom.errors()[0], SemanticError::ConflictingTable { .. }));
}

#[test]
fn test_dotted_key_through_scalar() {
    let dom = dom_with_errors("a = 1\na.b = 2\n");
    let SemanticError::ExpectedTable { key, found, .. } = &dom.errors()[0] else {
        panic!("expected ExpectedTable, got {:?}", dom.errors());
    };
    assert_eq!(key, "a");
    assert_eq!(*found, "integer");
}

#[test]
fn test_header_cannot_redefine_dotted_table() {
    let dom = dom_with_errors("[fruit]\napple.color = \"red\"\n[fruit.apple]\n");
    assert!(matches!(dom.errors()[0], SemanticError::ConflictingTable { .. }));

    // Sub-tables of a dotted table are fine.
    let dom = self::dom("[fruit]\napple.color = \"red\"\n[fruit.apple.texture]\nsmooth = true\n");
    assert!(dom.is_valid(), "{:?}", dom.errors());
}

#[test]
fn test_entries_of_rejected_header_are_checked_but_detached() {
    let dom = dom_with_errors("[a]\nx = 1\n[a]\ny = 2\ny = 3\n");
    assert_eq!(dom.errors().len(), 2);
    assert!(matches!(dom.errors()[1], SemanticError::DuplicateKey { .. }));
    assert!(dom.lookup_keys(&["a", "y"]).is_none());
}

#[test]
fn test_invalid_values_are_reported_and_skipped() {
    let dom = dom_with_errors("a = 9223372036854775808\nb = \"\\q\"\nc = 1979-02-30\nd = 1\n");
    assert_eq!(dom.errors().len(), 3);
    assert_eq!(dom.errors()[1].range(), range(29, 31));
    assert!(dom.lookup_keys(&["a"]).is_none());
    assert_eq!(get(&dom, &["d"]), &Scalar::Integer(1));
}

#[test]
fn test_nested_values() {
    let dom = dom("a = [1, [2.5], { b = \"c\" }]\n");
    let a = dom.lookup_keys(&["a"]).unwrap();
    let items = &dom.array(a).unwrap().items;
    assert_eq!(items.len(), 3);
    assert_eq!(dom.scalar(items[0]), Some(&Scalar::Integer(1)));
    assert_eq!(dom.array(items[1]).unwrap().kind, ArrayKind::Inline);
    let table = dom.table(items[2]).unwrap();
    assert_eq!(table.kind, TableKind::Inline);
    assert_eq!(dom.scalar(table.get("b").unwrap()), Some(&Scalar::String("c".into())));
}

#[test]
fn test_path_of_and_node_at_offset() {
    let source = "[[x]]\n[[x]]\ny = [1, 2]\n";
    let dom = dom(source);
    let offset = source.find('2').unwrap() as u32;
    let id = dom.node_at_offset(TextSize::from(offset)).unwrap();
    assert_eq!(dom.scalar(id), Some(&Scalar::Integer(2)));
    assert_eq!(
        dom.path_of(id),
        vec![
            PathSegment::Key("x".into()),
            PathSegment::Index(1),
            PathSegment::Key("y".into()),
            PathSegment::Index(1),
        ]
    );
}

#[test]
fn test_quoted_and_numeric_keys() {
    let dom = dom("\"a.b\" = 1\n3.14 = 2\n");
    assert_eq!(get(&dom, &["a.b"]), &Scalar::Integer(1));
    assert_eq!(get(&dom, &["3", "14"]), &Scalar::Integer(2));
}

#[test]
fn test_dom_builder() {
    let mut builder = DomBuilder::new();
    let root = builder.root();
    let table = builder.insert(root, "t", NodeKind::table(TableKind::Header)).unwrap();
    builder.insert(table, "k", NodeKind::Scalar(Scalar::Bool(false)));
    let array = builder.insert(root, "arr", NodeKind::array(ArrayKind::Inline)).unwrap();
    builder.push(array, NodeKind::Scalar(Scalar::Integer(1)));
    assert!(builder.push(table, NodeKind::Scalar(Scalar::Integer(1))).is_none());

    let dom = builder.finish();
    assert_eq!(get(&dom, &["t", "k"]), &Scalar::Bool(false));
    assert_eq!(dom.array(array).unwrap().items.len(), 1);
}

#[test]
fn test_render_duplicate_key() {
    let source = "a = 1\na = 2\n";
    let dom = dom(source);
    let rendered = dom.errors()[0].render("test.toml", source);
    let plain = String::from_utf8(strip_ansi_escapes::strip(rendered.as_bytes())).unwrap();
    assert!(plain.contains("duplicate key `a`"));
    assert!(plain.contains("first defined here"));
    assert!(plain.contains("test.toml"));
}

#[test]
fn test_render_parse_error() {
    let source = "a = \n";
    let (parse, _) = parse(source);
    let rendered = render_parse_error(&parse.errors()[0], "bad.toml", source);
    let plain = String::from_utf8(strip_ansi_escapes::strip(rendered.as_bytes())).unwrap();
    assert!(plain.contains("expected a value"));
}
