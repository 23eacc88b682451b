use miniray::options::MinifyOptions;

#[test]
fn source_map_names_renamed_identifier_but_not_entry_point() {
    let source = "const longName = 42; @compute @workgroup_size(1) fn main() { let x = longName; }";
    let mut options = MinifyOptions::default();
    options.source_map = true;
    let result = miniray::minify(source, &options);

    assert!(result.errors.is_empty(), "{:?}", result.errors);
    let map = result.source_map.expect("source map requested");
    assert!(map.names.contains(&"longName".to_string()), "names: {:?}", map.names);
    assert!(!map.names.contains(&"main".to_string()), "entry point is never renamed, so it gets no name entry: {:?}", map.names);

    let mut prev_line = 0i64;
    for (line_idx, line) in map.mappings.split(';').enumerate() {
        if line.is_empty() {
            continue;
        }
        assert!(i64::try_from(line_idx).unwrap() >= prev_line);
        prev_line = i64::try_from(line_idx).unwrap();
    }
}
