use miniray::options::MinifyOptions;

#[test]
fn whitespace_identifiers_and_syntax_are_minified() {
    let source = "const x : f32 = 1.0;\nfn foo() -> f32 { return x + 2.0; }";
    let result = miniray::minify(source, &MinifyOptions::default());

    assert!(result.errors.is_empty(), "{:?}", result.errors);
    assert!(result.minified_size < result.original_size);
    assert!(!result.code.contains("  "), "no run of discretionary whitespace: {}", result.code);
    assert!(!result.code.contains("foo"), "non-entry function should be renamed: {}", result.code);
    assert!(!result.code.contains(">="), "template close must not fuse into >=");
    assert!(!result.code.contains("<="), "template open must not fuse into <=");
}
