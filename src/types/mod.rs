//! Closed algebra of WGSL types: equality, implicit conversion, and the
//! size/alignment rules structs and arrays are laid out with.
//!
//! Every type answers `is_concrete`/`is_constructible`/`is_storable`/
//! `is_host_shareable`/`size`/`alignment`/string-form (spec §4.3). Struct
//! sizes depend on the [`StructRegistry`] the validator builds once all
//! struct declarations are known, so every size/alignment query threads a
//! registry reference through rather than each `Type` owning a `Rc`.

mod layout;

pub use layout::{StructField, StructId, StructLayout, StructRegistry};

use smallvec::SmallVec;
use std::fmt;

/// Address space a `var` declaration lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressSpace {
    Function,
    Private,
    Workgroup,
    Uniform,
    Storage,
    Handle,
}

impl AddressSpace {
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "function" => Some(Self::Function),
            "private" => Some(Self::Private),
            "workgroup" => Some(Self::Workgroup),
            "uniform" => Some(Self::Uniform),
            "storage" => Some(Self::Storage),
            "handle" => Some(Self::Handle),
            _ => None,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Private => "private",
            Self::Workgroup => "workgroup",
            Self::Uniform => "uniform",
            Self::Storage => "storage",
            Self::Handle => "handle",
        }
    }

    #[must_use]
    pub fn is_external_binding(self) -> bool {
        matches!(self, Self::Uniform | Self::Storage)
    }
}

/// Access mode on a pointer, storage var, or storage texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMode {
    Read,
    Write,
    ReadWrite,
}

impl AccessMode {
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "read" => Some(Self::Read),
            "write" => Some(Self::Write),
            "read_write" => Some(Self::ReadWrite),
            _ => None,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::ReadWrite => "read_write",
        }
    }
}

/// Scalar element kind for vectors/matrices, independent of abstract-ness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scalar {
    Bool,
    AbstractInt,
    AbstractFloat,
    I32,
    U32,
    F32,
    F16,
}

impl Scalar {
    #[must_use]
    pub fn is_abstract(self) -> bool {
        matches!(self, Self::AbstractInt | Self::AbstractFloat)
    }

    #[must_use]
    pub fn size(self) -> u32 {
        match self {
            Self::Bool => 4, // bool is not host-shareable but still occupies a 32-bit slot in registers
            Self::AbstractInt | Self::AbstractFloat => 8,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::F16 => 2,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::AbstractInt => "{AbstractInt}",
            Self::AbstractFloat => "{AbstractFloat}",
            Self::I32 => "i32",
            Self::U32 => "u32",
            Self::F32 => "f32",
            Self::F16 => "f16",
        }
    }

    /// Recognizes a written scalar type keyword (`bool`, `i32`, `u32`,
    /// `f32`, `f16`). Abstract scalars have no surface syntax — they only
    /// ever arise from literal inference, never from a written type name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "bool" => Some(Self::Bool),
            "i32" => Some(Self::I32),
            "u32" => Some(Self::U32),
            "f32" => Some(Self::F32),
            "f16" => Some(Self::F16),
            _ => None,
        }
    }

    /// Implicit conversion targets, in preference order (spec §4.3).
    #[must_use]
    pub fn conversion_targets(self) -> &'static [Scalar] {
        match self {
            Self::AbstractInt => &[Self::I32, Self::U32, Self::F32, Self::F16, Self::AbstractFloat],
            Self::AbstractFloat => &[Self::F32, Self::F16],
            _ => &[],
        }
    }

    #[must_use]
    pub fn converts_to(self, other: Scalar) -> bool {
        self == other || self.conversion_targets().contains(&other)
    }
}

/// Texture dimensionality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureDim {
    D1,
    D2,
    D2Array,
    D3,
    Cube,
    CubeArray,
}

/// Broad category of texture type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    Sampled,
    Multisampled,
    Storage,
    Depth,
    External,
}

/// Texel format for storage textures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TexelFormat {
    Rgba8Unorm,
    Rgba8Snorm,
    Rgba8Uint,
    Rgba8Sint,
    Rgba16Uint,
    Rgba16Sint,
    Rgba16Float,
    R32Uint,
    R32Sint,
    R32Float,
    Rg32Uint,
    Rg32Sint,
    Rg32Float,
    Rgba32Uint,
    Rgba32Sint,
    Rgba32Float,
    Bgra8Unorm,
}

impl TexelFormat {
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "rgba8unorm" => Self::Rgba8Unorm,
            "rgba8snorm" => Self::Rgba8Snorm,
            "rgba8uint" => Self::Rgba8Uint,
            "rgba8sint" => Self::Rgba8Sint,
            "rgba16uint" => Self::Rgba16Uint,
            "rgba16sint" => Self::Rgba16Sint,
            "rgba16float" => Self::Rgba16Float,
            "r32uint" => Self::R32Uint,
            "r32sint" => Self::R32Sint,
            "r32float" => Self::R32Float,
            "rg32uint" => Self::Rg32Uint,
            "rg32sint" => Self::Rg32Sint,
            "rg32float" => Self::Rg32Float,
            "rgba32uint" => Self::Rgba32Uint,
            "rgba32sint" => Self::Rgba32Sint,
            "rgba32float" => Self::Rgba32Float,
            "bgra8unorm" => Self::Bgra8Unorm,
            _ => return None,
        })
    }
}

/// A fully resolved WGSL type.
///
/// Struct types are opaque ids into a [`StructRegistry`] rather than an
/// inline field list, so cloning a `Type` never deep-copies a struct's
/// layout and there is no cycle between a struct's own fields and `Type`.
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Scalar(Scalar),
    Vector { size: u8, elem: Scalar },
    Matrix { cols: u8, rows: u8, elem: Scalar },
    Array { elem: Box<Type>, count: Option<u64> },
    Pointer { space: AddressSpace, elem: Box<Type>, access: AccessMode },
    Atomic(Box<Type>),
    Texture { kind: TextureKind, dim: TextureDim, sampled: Option<Box<Type>>, format: Option<TexelFormat>, access: AccessMode },
    Sampler { comparison: bool },
    Struct(layout::StructId),
    /// The empty tuple type used for functions without a return value.
    Void,
    /// Placeholder used after a type error so downstream checks don't cascade.
    Unknown,
}

impl Type {
    #[must_use]
    pub fn vec(size: u8, elem: Scalar) -> Self {
        Self::Vector { size, elem }
    }

    #[must_use]
    pub fn is_concrete(&self) -> bool {
        match self {
            Self::Scalar(s) => !s.is_abstract(),
            Self::Vector { elem, .. } | Self::Matrix { elem, .. } => !elem.is_abstract(),
            Self::Array { elem, .. } | Self::Atomic(elem) | Self::Pointer { elem, .. } => elem.is_concrete(),
            Self::Texture { .. } | Self::Sampler { .. } | Self::Struct(_) | Self::Void => true,
            Self::Unknown => false,
        }
    }

    #[must_use]
    pub fn is_constructible(&self) -> bool {
        match self {
            Self::Scalar(_) | Self::Vector { .. } | Self::Matrix { .. } => true,
            Self::Array { elem, count } => count.is_some() && elem.is_constructible(),
            Self::Struct(_) => true,
            _ => false,
        }
    }

    #[must_use]
    pub fn is_storable(&self, structs: &StructRegistry) -> bool {
        match self {
            Self::Scalar(_) | Self::Vector { .. } | Self::Matrix { .. } | Self::Atomic(_) | Self::Pointer { .. } => true,
            Self::Array { elem, .. } => elem.is_storable(structs),
            Self::Struct(id) => structs.get(*id).fields.iter().all(|f| f.ty.is_storable(structs)),
            _ => false,
        }
    }

    /// Host-shareable types can cross the CPU/GPU boundary. `bool` and
    /// pointers are the notable exclusions (spec §4.3, glossary).
    #[must_use]
    pub fn is_host_shareable(&self, structs: &StructRegistry) -> bool {
        match self {
            Self::Scalar(Scalar::Bool) | Self::Pointer { .. } => false,
            Self::Scalar(_) => true,
            Self::Vector { elem, .. } | Self::Matrix { elem, .. } => *elem != Scalar::Bool,
            Self::Array { elem, .. } | Self::Atomic(elem) => elem.is_host_shareable(structs),
            Self::Struct(id) => structs.get(*id).fields.iter().all(|f| f.ty.is_host_shareable(structs)),
            _ => false,
        }
    }

    /// Byte size, or `None` for a runtime-sized array (spec: "runtime-sized
    /// arrays have size 0" — represented here as `None` rather than `Some(0)`
    /// so callers can't accidentally sum it into a struct's total size).
    #[must_use]
    pub fn size(&self, structs: &StructRegistry) -> Option<u32> {
        match self {
            Self::Scalar(s) => Some(s.size()),
            Self::Vector { size, elem } => Some(u32::from(*size) * elem.size()),
            Self::Matrix { cols, rows, elem } => Some(u32::from(*cols) * matrix_column_alignment(*rows, *elem)),
            Self::Array { elem, count } => {
                let count = (*count)?;
                let stride = array_stride(elem, structs)?;
                Some(stride * u32::try_from(count).unwrap_or(u32::MAX))
            }
            Self::Atomic(elem) => elem.size(structs),
            Self::Struct(id) => Some(structs.get(*id).size),
            Self::Pointer { .. } | Self::Texture { .. } | Self::Sampler { .. } | Self::Void | Self::Unknown => None,
        }
    }

    #[must_use]
    pub fn alignment(&self, structs: &StructRegistry) -> u32 {
        match self {
            Self::Scalar(s) => s.size(),
            Self::Vector { size, elem } => vector_alignment(*size, *elem),
            Self::Matrix { rows, elem, .. } => matrix_column_alignment(*rows, *elem),
            Self::Array { elem, .. } => elem.alignment(structs),
            Self::Atomic(elem) => elem.alignment(structs),
            Self::Struct(id) => structs.get(*id).alignment,
            _ => 1,
        }
    }

    /// `true` for `array<T>` (no element count) — only valid as the final
    /// field of a storage-address-space struct.
    #[must_use]
    pub fn has_runtime_array(&self) -> bool {
        match self {
            Self::Array { count: None, .. } => true,
            Self::Array { elem, .. } => elem.has_runtime_array(),
            _ => false,
        }
    }

    #[must_use]
    pub fn converts_to(&self, other: &Type) -> bool {
        match (self, other) {
            (Self::Scalar(a), Self::Scalar(b)) => a.converts_to(*b),
            (Self::Vector { size: sa, elem: ea }, Self::Vector { size: sb, elem: eb }) => sa == sb && ea.converts_to(*eb),
            (Self::Matrix { cols: ca, rows: ra, elem: ea }, Self::Matrix { cols: cb, rows: rb, elem: eb }) => {
                ca == cb && ra == rb && ea.converts_to(*eb)
            }
            _ => self == other,
        }
    }

    /// The common type two operand types convert to, if any (spec §4.3,
    /// `CommonType`). Abstract-int combined with abstract-float yields
    /// abstract-float specifically (not "pick either"), matching WGSL's
    /// literal-promotion rule.
    #[must_use]
    pub fn common_type(a: &Type, b: &Type) -> Option<Type> {
        if a == b {
            return Some(a.clone());
        }
        if let (Self::Scalar(sa), Self::Scalar(sb)) = (a, b) {
            if *sa == Scalar::AbstractInt && *sb == Scalar::AbstractFloat {
                return Some(Self::Scalar(Scalar::AbstractFloat));
            }
            if *sb == Scalar::AbstractInt && *sa == Scalar::AbstractFloat {
                return Some(Self::Scalar(Scalar::AbstractFloat));
            }
        }
        if a.converts_to(b) {
            return Some(b.clone());
        }
        if b.converts_to(a) {
            return Some(a.clone());
        }
        None
    }

    /// Result type of `a + b` / `a - b`: elementwise, same-shape only.
    #[must_use]
    pub fn add_sub_result_type(a: &Type, b: &Type) -> Option<Type> {
        Self::common_type(a, b)
    }

    /// Result type of `a * b`, including the matrix/vector/scalar
    /// combinations spec §4.3 calls out explicitly.
    #[must_use]
    pub fn multiply_result_type(a: &Type, b: &Type) -> Option<Type> {
        match (a, b) {
            (Self::Matrix { cols, rows, elem: ea }, Self::Vector { size, elem: eb }) => {
                (*cols == *size && (ea.converts_to(*eb) || eb.converts_to(*ea)))
                    .then(|| Self::vec(*rows, if eb.is_abstract() { *ea } else { *eb }))
            }
            (Self::Vector { size, elem: ea }, Self::Matrix { cols, rows, elem: eb }) => {
                (*size == *rows).then(|| Self::vec(*cols, if ea.is_abstract() { *eb } else { *ea }))
            }
            (Self::Matrix { cols: ca, rows: ra, elem: ea }, Self::Matrix { cols: cb, rows: rb, elem: eb }) => {
                (*ca == *rb && ea == eb).then(|| Self::Matrix { cols: *cb, rows: *ra, elem: *ea })
            }
            (Self::Scalar(_), Self::Vector { .. } | Self::Matrix { .. }) => Self::scalar_times_shape(a, b),
            (Self::Vector { .. } | Self::Matrix { .. }, Self::Scalar(_)) => Self::scalar_times_shape(b, a),
            _ => Self::common_type(a, b),
        }
    }

    fn scalar_times_shape(scalar: &Type, shape: &Type) -> Option<Type> {
        let Self::Scalar(s) = scalar else { return None };
        match shape {
            Self::Vector { size, elem } if s.converts_to(*elem) || elem.converts_to(*s) => {
                Some(Self::vec(*size, if s.is_abstract() { *elem } else { *s }))
            }
            Self::Matrix { cols, rows, elem } if s.converts_to(*elem) || elem.converts_to(*s) => {
                Some(Self::Matrix { cols: *cols, rows: *rows, elem: if s.is_abstract() { *elem } else { *s } })
            }
            _ => None,
        }
    }

    #[must_use]
    pub fn div_result_type(a: &Type, b: &Type) -> Option<Type> {
        Self::common_type(a, b)
    }
}

fn vector_alignment(size: u8, elem: Scalar) -> u32 {
    match size {
        2 => 2 * elem.size(),
        _ => 4 * elem.size(),
    }
}

fn matrix_column_alignment(rows: u8, elem: Scalar) -> u32 {
    vector_alignment(rows, elem)
}

fn array_stride(elem: &Type, structs: &StructRegistry) -> Option<u32> {
    let size = elem.size(structs)?;
    let align = elem.alignment(structs);
    Some(round_up(size, align))
}

/// Rounds `value` up to the next multiple of `align` (`align` must be nonzero).
#[must_use]
pub fn round_up(value: u32, align: u32) -> u32 {
    if align == 0 {
        return value;
    }
    value.div_ceil(align) * align
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(s) => write!(f, "{}", s.name()),
            Self::Vector { size, elem } => write!(f, "vec{size}<{}>", elem.name()),
            Self::Matrix { cols, rows, elem } => write!(f, "mat{cols}x{rows}<{}>", elem.name()),
            Self::Array { elem, count: Some(n) } => write!(f, "array<{elem}, {n}>"),
            Self::Array { elem, count: None } => write!(f, "array<{elem}>"),
            Self::Pointer { space, elem, access } => write!(f, "ptr<{}, {elem}, {}>", space.name(), access.name()),
            Self::Atomic(elem) => write!(f, "atomic<{elem}>"),
            Self::Sampler { comparison: false } => write!(f, "sampler"),
            Self::Sampler { comparison: true } => write!(f, "sampler_comparison"),
            Self::Texture { .. } => write!(f, "texture"),
            Self::Struct(id) => write!(f, "struct#{}", id.index()),
            Self::Void => write!(f, "void"),
            Self::Unknown => write!(f, "<unknown>"),
        }
    }
}

/// Small inline storage for the element types of a vecN/matCxR.
pub type TypeArgs = SmallVec<[Type; 2]>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec3_is_size_12_align_16() {
        let registry = StructRegistry::new();
        let ty = Type::vec(3, Scalar::F32);
        assert_eq!(ty.size(&registry), Some(12));
        assert_eq!(ty.alignment(&registry), 16);
    }

    #[test]
    fn abstract_int_converts_to_f32() {
        assert!(Scalar::AbstractInt.converts_to(Scalar::F32));
        assert!(!Scalar::F32.converts_to(Scalar::AbstractInt));
    }

    #[test]
    fn common_type_of_abstract_int_and_float_is_abstract_float() {
        let a = Type::Scalar(Scalar::AbstractInt);
        let b = Type::Scalar(Scalar::AbstractFloat);
        assert_eq!(Type::common_type(&a, &b), Some(Type::Scalar(Scalar::AbstractFloat)));
    }

    #[test]
    fn mat_times_vec_requires_matching_width() {
        let mat = Type::Matrix { cols: 4, rows: 3, elem: Scalar::F32 };
        let vec4 = Type::vec(4, Scalar::F32);
        let vec3 = Type::vec(3, Scalar::F32);
        assert_eq!(Type::multiply_result_type(&mat, &vec4), Some(Type::vec(3, Scalar::F32)));
        assert_eq!(Type::multiply_result_type(&mat, &vec3), None);
    }

    #[test]
    fn atomics_storable_and_host_shareable_bool_is_not() {
        let registry = StructRegistry::new();
        let atomic = Type::Atomic(Box::new(Type::Scalar(Scalar::U32)));
        assert!(atomic.is_storable(&registry));
        assert!(atomic.is_host_shareable(&registry));
        assert!(!Type::Scalar(Scalar::Bool).is_host_shareable(&registry));
        assert!(!atomic.is_constructible());
    }

    #[test]
    fn runtime_array_has_no_size() {
        let registry = StructRegistry::new();
        let ty = Type::Array { elem: Box::new(Type::Scalar(Scalar::F32)), count: None };
        assert_eq!(ty.size(&registry), None);
        assert!(ty.has_runtime_array());
    }
}
