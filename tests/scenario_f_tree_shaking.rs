use miniray::options::MinifyOptions;

const SOURCE: &str = "const unused_const = 1.0;\nfn unused_fn() -> f32 { return unused_const; }\n@compute @workgroup_size(1) fn main() {}";

#[test]
fn tree_shaking_on_drops_unreachable_decls() {
    let mut options = MinifyOptions::default();
    options.minify_identifiers = false;
    let result = miniray::minify(SOURCE, &options);
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    assert!(!result.code.contains("unused_const"));
    assert!(!result.code.contains("unused_fn"));
    assert!(result.code.contains("fn main("));
}

#[test]
fn tree_shaking_off_keeps_everything() {
    let mut options = MinifyOptions::default();
    options.minify_identifiers = false;
    options.tree_shaking = false;
    let result = miniray::minify(SOURCE, &options);
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    assert!(result.code.contains("unused_const"));
    assert!(result.code.contains("unused_fn"));
}
