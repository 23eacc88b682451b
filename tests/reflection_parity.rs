use miniray::options::MinifyOptions;

/// Property 8: reflecting the minifier's own output reproduces the same
/// bindings, entry-point stages, and struct sizes the minifier reported for
/// the original source.
#[test]
fn reflecting_minified_output_matches_original_reflection() {
    let source = "struct P { pos: vec3f, vel: f32 }\n@group(0) @binding(0) var<storage, read_write> data: array<P, 10000>;\n@compute @workgroup_size(64) fn main() {}";
    let result = miniray::minify_and_reflect(source, &MinifyOptions::default());
    assert!(result.errors.is_empty(), "{:?}", result.errors);

    let reparsed = miniray::reflect(&result.code);

    let original_pairs: Vec<(u32, u32)> = result.reflect.bindings.iter().map(|b| (b.group, b.binding)).collect();
    let reparsed_pairs: Vec<(u32, u32)> = reparsed.bindings.iter().map(|b| (b.group, b.binding)).collect();
    assert_eq!(original_pairs, reparsed_pairs);

    let original_stages: Vec<&str> = result.reflect.entry_points.iter().map(|e| e.stage).collect();
    let reparsed_stages: Vec<&str> = reparsed.entry_points.iter().map(|e| e.stage).collect();
    assert_eq!(original_stages, reparsed_stages);

    for (before, after) in result.reflect.structs.values().zip(reparsed.structs.values()) {
        assert_eq!(before.size, after.size);
        assert_eq!(before.alignment, after.alignment);
    }
}

#[test]
fn minified_output_never_exceeds_original_size() {
    let sources = [
        "const x : f32 = 1.0;\nfn foo() -> f32 { return x + 2.0; }",
        "struct U { t: f32 }\n@group(0) @binding(0) var<uniform> uniforms: U;\n@fragment fn main() -> @location(0) vec4f { return vec4f(uniforms.t); }",
        "@compute @workgroup_size(8, 8) fn main() {}",
    ];
    for source in sources {
        let result = miniray::minify(source, &MinifyOptions::default());
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        assert!(result.minified_size <= result.original_size, "source: {source}");
    }
}
