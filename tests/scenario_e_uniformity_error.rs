use miniray::error::{DiagnosticRule, Severity};
use miniray::options::ValidateOptions;

#[test]
fn derivative_in_non_uniform_branch_is_reported() {
    let source = "@fragment fn main(@builtin(position) p: vec4f) -> @location(0) vec4f {\n  if (p.x > 0.0) { let d = dpdx(1.0); return vec4f(d); }\n  return vec4f(0.0);\n}";
    let result = miniray::validate(source, &ValidateOptions::default());

    assert!(!result.valid);
    let diagnostic = result
        .diagnostics
        .iter()
        .find(|d| d.rule == Some(DiagnosticRule::DerivativeUniformity))
        .unwrap_or_else(|| panic!("expected a derivative_uniformity diagnostic among {:?}", result.diagnostics));
    assert_eq!(diagnostic.severity, Severity::Error);
    assert!(diagnostic.message.contains("dpdx"), "message: {}", diagnostic.message);
    assert!(diagnostic.message.contains("position"), "message should name the non-uniform source: {}", diagnostic.message);
}
