//! Read-only catalog of WGSL built-in functions and built-in stage-IO
//! variables.
//!
//! Scoped down from a full overload-matching dispatch engine (out of scope)
//! to exactly what the validator and printer need: whether a call is pure,
//! whether it requires uniform control flow, and which stage-IO builtins
//! are themselves non-uniform sources. Grounded on the teacher's
//! `builtins/mod.rs` catalog-of-builtins shape, generalized from "Python
//! builtin functions" to "WGSL builtin functions"; the teacher's per-function
//! submodules collapse here into one static table since there is no call
//! dispatch to implement, only metadata to look up.

use ahash::AHashMap;
use std::sync::LazyLock;

/// Why a builtin call requires its surrounding control flow to be uniform
/// (spec §4.5). `None` for ordinary pure/impure builtins with no such
/// requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformityRequirement {
    Derivative,
    Barrier,
    Subgroup,
    TextureImplicitLod,
}

/// One entry in the builtin function catalog.
#[derive(Debug, Clone, Copy)]
pub struct BuiltinFunction {
    pub name: &'static str,
    pub is_pure: bool,
    pub uniformity: Option<UniformityRequirement>,
    /// `true` for `frexp`/`modf`: WGSL defines these as returning a
    /// struct, which this minifier's struct-return call handling does not
    /// support (spec Non-goal carried over from the distillation; flagged
    /// rather than silently mis-minified).
    pub struct_return_unsupported: bool,
}

const fn pure_fn(name: &'static str) -> BuiltinFunction {
    BuiltinFunction { name, is_pure: true, uniformity: None, struct_return_unsupported: false }
}

const fn impure_fn(name: &'static str) -> BuiltinFunction {
    BuiltinFunction { name, is_pure: false, uniformity: None, struct_return_unsupported: false }
}

const fn uniform_fn(name: &'static str, req: UniformityRequirement, is_pure: bool) -> BuiltinFunction {
    BuiltinFunction { name, is_pure, uniformity: Some(req), struct_return_unsupported: false }
}

/// Pure math/logic builtins with no uniformity requirement.
const PURE_BUILTINS: &[&str] = &[
    "abs", "acos", "acosh", "asin", "asinh", "atan", "atan2", "atanh", "ceil", "clamp", "cos", "cosh", "countLeadingZeros",
    "countOneBits", "countTrailingZeros", "cross", "degrees", "determinant", "distance", "dot", "dot4U8Packed",
    "dot4I8Packed", "exp", "exp2", "extractBits", "faceForward", "firstLeadingBit", "firstTrailingBit", "floor", "fma",
    "fract", "insertBits", "inverseSqrt", "ldexp", "length", "log", "log2", "max", "min", "mix", "normalize", "pack2x16float",
    "pack2x16snorm", "pack2x16unorm", "pack4x8snorm", "pack4x8unorm", "pack4xI8", "pack4xU8", "pack4xI8Clamp",
    "pack4xU8Clamp", "pow", "quantizeToF16", "radians", "reflect", "refract", "reverseBits", "round", "saturate", "select",
    "sign", "sin", "sinh", "smoothstep", "sqrt", "step", "tan", "tanh", "transpose", "trunc", "unpack2x16float",
    "unpack2x16snorm", "unpack2x16unorm", "unpack4x8snorm", "unpack4x8unorm", "unpack4xI8", "unpack4xU8", "all", "any",
    "arrayLength", "textureDimensions", "textureNumLayers", "textureNumLevels", "textureNumSamples",
];

/// Builtins with observable side effects or memory-dependent results, so a
/// call to them is never dropped even when its value is unused and never
/// folded even when its arguments are constant.
const IMPURE_BUILTINS: &[&str] = &[
    "atomicLoad", "atomicStore", "atomicAdd", "atomicSub", "atomicMax", "atomicMin", "atomicAnd", "atomicOr", "atomicXor",
    "atomicExchange", "atomicCompareExchangeWeak", "textureLoad", "textureStore", "textureGather", "textureGatherCompare",
    "textureSampleLevel", "textureSampleGrad", "textureSampleBaseClampToEdge",
];

const DERIVATIVE_BUILTINS: &[&str] = &["dpdx", "dpdxCoarse", "dpdxFine", "dpdy", "dpdyCoarse", "dpdyFine", "fwidth", "fwidthCoarse", "fwidthFine"];

const BARRIER_BUILTINS: &[&str] = &["workgroupBarrier", "storageBarrier", "textureBarrier"];

const SUBGROUP_BUILTINS: &[&str] = &[
    "subgroupAdd", "subgroupExclusiveAdd", "subgroupInclusiveAdd", "subgroupAll", "subgroupAnd", "subgroupAny",
    "subgroupBallot", "subgroupBroadcast", "subgroupBroadcastFirst", "subgroupElect", "subgroupMax", "subgroupMin",
    "subgroupMul", "subgroupExclusiveMul", "subgroupInclusiveMul", "subgroupOr", "subgroupShuffle", "subgroupShuffleDown",
    "subgroupShuffleUp", "subgroupShuffleXor", "subgroupXor",
];

const TEXTURE_IMPLICIT_LOD_BUILTINS: &[&str] = &["textureSample", "textureSampleBias", "textureSampleCompare"];

const STRUCT_RETURNING_UNSUPPORTED: &[&str] = &["frexp", "modf"];

fn build_catalog() -> AHashMap<&'static str, BuiltinFunction> {
    let mut map = AHashMap::new();
    for &name in PURE_BUILTINS {
        map.insert(name, pure_fn(name));
    }
    for &name in IMPURE_BUILTINS {
        map.insert(name, impure_fn(name));
    }
    for &name in DERIVATIVE_BUILTINS {
        map.insert(name, uniform_fn(name, UniformityRequirement::Derivative, true));
    }
    for &name in BARRIER_BUILTINS {
        map.insert(name, uniform_fn(name, UniformityRequirement::Barrier, false));
    }
    for &name in SUBGROUP_BUILTINS {
        map.insert(name, uniform_fn(name, UniformityRequirement::Subgroup, true));
    }
    for &name in TEXTURE_IMPLICIT_LOD_BUILTINS {
        map.insert(name, uniform_fn(name, UniformityRequirement::TextureImplicitLod, true));
    }
    for &name in STRUCT_RETURNING_UNSUPPORTED {
        map.entry(name).or_insert(BuiltinFunction {
            name,
            is_pure: true,
            uniformity: None,
            struct_return_unsupported: true,
        });
    }
    map
}

static CATALOG: LazyLock<AHashMap<&'static str, BuiltinFunction>> = LazyLock::new(build_catalog);

/// Looks up a builtin function by name. Returns `None` for ordinary
/// user-defined functions.
#[must_use]
pub fn lookup(name: &str) -> Option<&'static BuiltinFunction> {
    CATALOG.get(name)
}

#[must_use]
pub fn is_builtin_function(name: &str) -> bool {
    CATALOG.contains_key(name)
}

/// Whether a `@builtin(name)` stage-IO value is itself a source of
/// non-uniformity for the function that reads it (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoUniformity {
    Uniform,
    NonUniform,
}

const NON_UNIFORM_IO: &[&str] = &[
    "vertex_index",
    "instance_index",
    "global_invocation_id",
    "local_invocation_id",
    "local_invocation_index",
    "sample_index",
    "sample_mask",
    "front_facing",
    "position",
    "primitive_id",
];

const UNIFORM_IO: &[&str] = &["workgroup_id", "num_workgroups"];

#[must_use]
pub fn builtin_io_uniformity(name: &str) -> Option<IoUniformity> {
    if NON_UNIFORM_IO.contains(&name) {
        Some(IoUniformity::NonUniform)
    } else if UNIFORM_IO.contains(&name) {
        Some(IoUniformity::Uniform)
    } else {
        None
    }
}

/// Names reserved by every type constructor that introduces a template
/// argument list (`vec3<f32>`, `array<T, N>`, `ptr<storage, T>`, …), used
/// by the parser to disambiguate `<` from the relational operator (spec
/// §4.4).
pub const TEMPLATED_TYPE_NAMES: &[&str] = &[
    "vec2", "vec3", "vec4", "mat2x2", "mat2x3", "mat2x4", "mat3x2", "mat3x3", "mat3x4", "mat4x2", "mat4x3", "mat4x4",
    "array", "ptr", "atomic", "texture_1d", "texture_2d", "texture_2d_array", "texture_3d", "texture_cube",
    "texture_cube_array", "texture_multisampled_2d", "texture_storage_1d", "texture_storage_2d",
    "texture_storage_2d_array", "texture_storage_3d", "texture_depth_multisampled_2d",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivative_builtins_require_uniform_control_flow() {
        let f = lookup("dpdx").unwrap();
        assert_eq!(f.uniformity, Some(UniformityRequirement::Derivative));
    }

    #[test]
    fn workgroup_barrier_is_impure_and_unconditional_category() {
        let f = lookup("workgroupBarrier").unwrap();
        assert!(!f.is_pure);
        assert_eq!(f.uniformity, Some(UniformityRequirement::Barrier));
    }

    #[test]
    fn texture_sample_level_has_no_uniformity_requirement() {
        assert!(lookup("textureSampleLevel").unwrap().uniformity.is_none());
        assert_eq!(lookup("textureSample").unwrap().uniformity, Some(UniformityRequirement::TextureImplicitLod));
    }

    #[test]
    fn frexp_is_flagged_struct_returning_unsupported() {
        assert!(lookup("frexp").unwrap().struct_return_unsupported);
    }

    #[test]
    fn vertex_index_is_non_uniform_workgroup_id_is_uniform() {
        assert_eq!(builtin_io_uniformity("vertex_index"), Some(IoUniformity::NonUniform));
        assert_eq!(builtin_io_uniformity("workgroup_id"), Some(IoUniformity::Uniform));
        assert_eq!(builtin_io_uniformity("not_a_builtin"), None);
    }
}
