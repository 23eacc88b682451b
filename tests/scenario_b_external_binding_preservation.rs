use miniray::options::MinifyOptions;

const SOURCE: &str = "struct U { t: f32 }\n@group(0) @binding(0) var<uniform> uniforms: U;\n@fragment fn main() -> @location(0) vec4f { return vec4f(uniforms.t); }";

#[test]
fn uniform_declaration_and_entry_point_keep_their_names() {
    let result = miniray::minify(SOURCE, &MinifyOptions::default());
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    assert!(result.code.contains("uniforms"), "declaration-site name must be preserved: {}", result.code);
    assert!(result.code.contains("fn main("), "entry point must keep its name: {}", result.code);
    assert!(!result.code.contains("struct U"), "struct U should be renamed by default: {}", result.code);
}

#[test]
fn reflection_reports_group_binding_and_struct_layout() {
    let reflected = miniray::reflect(SOURCE);
    assert_eq!(reflected.bindings.len(), 1);
    let binding = &reflected.bindings[0];
    assert_eq!(binding.group, 0);
    assert_eq!(binding.binding, 0);
    assert_eq!(binding.original_name, "uniforms");
    assert_eq!(binding.address_space, "uniform");
    assert_eq!(binding.original_type, "U");
    let layout = binding.struct_layout.as_ref().expect("uniform binding has a struct layout");
    assert_eq!(layout.size, 4);
    assert_eq!(layout.alignment, 4);
    assert_eq!(layout.fields[0].name, "t");
    assert_eq!(layout.fields[0].offset, 0);
    assert_eq!(layout.fields[0].size, 4);
}

#[test]
fn preserve_uniform_struct_types_pins_the_struct_name() {
    let mut options = MinifyOptions::default();
    options.preserve_uniform_struct_types = true;
    let result = miniray::minify(SOURCE, &options);
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    assert!(result.code.contains("struct U"), "pinned struct type should keep its name: {}", result.code);
}
