use pretty_assertions::assert_eq;

const SOURCE: &str = "struct P { pos: vec3f, vel: f32 }\n@group(0) @binding(0) var<storage, read_write> data: array<P, 10000>;\n@compute @workgroup_size(64) fn main() {}";

#[test]
fn storage_array_binding_reports_depth_stride_and_element_layout() {
    let reflected = miniray::reflect(SOURCE);
    assert_eq!(reflected.bindings.len(), 1);
    let array = reflected.bindings[0].array.as_ref().expect("storage array binding has an array descriptor");

    assert_eq!(array.depth, 1);
    assert_eq!(array.element_count, Some(10_000));
    assert_eq!(array.element_stride, 16);
    assert_eq!(array.total_size, Some(160_000));
    assert_eq!(array.element_type_original, "P");

    let layout = array.element_layout.as_ref().expect("element is a struct");
    assert_eq!(layout.size, 16);
    assert_eq!(layout.alignment, 16);
    assert_eq!(layout.fields[0].name, "pos");
    assert_eq!(layout.fields[0].offset, 0);
    assert_eq!(layout.fields[0].size, 12);
    assert_eq!(layout.fields[1].name, "vel");
    assert_eq!(layout.fields[1].offset, 12);
    assert_eq!(layout.fields[1].size, 4);
}
