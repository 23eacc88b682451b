//! Struct layout registry.
//!
//! Struct sizes and field offsets depend on every field's own size and
//! alignment, which can itself depend on another struct — so layouts are
//! resolved once, bottom-up, by the validator (`validator::resolve_struct_layouts`)
//! and stored here by [`StructId`] rather than recomputed on every query.

use crate::intern::StringId;

use super::{round_up, Type};

/// Index into a [`StructRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StructId(u32);

impl StructId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A single resolved field: its declared type, byte offset within the
/// struct, and name (kept for reflection and for the renamer's
/// `mangle_props` option).
#[derive(Debug, Clone)]
pub struct StructField {
    pub name: StringId,
    pub ty: Type,
    pub offset: u32,
}

/// Resolved size/alignment/offsets for one struct declaration.
#[derive(Debug, Clone)]
pub struct StructLayout {
    pub name: StringId,
    pub fields: Vec<StructField>,
    pub size: u32,
    pub alignment: u32,
}

impl StructLayout {
    /// Computes offsets, alignment, and total (rounded-up) size from an
    /// ordered list of (name, type) pairs. Fields are only followed by a
    /// later `@align`/`@size` attribute override; the caller is
    /// responsible for folding those into `field_types` before calling
    /// this (spec §4.3 struct layout rules).
    #[must_use]
    pub fn compute(name: StringId, field_types: Vec<(StringId, Type)>, registry: &StructRegistry) -> Self {
        let mut fields = Vec::with_capacity(field_types.len());
        let mut offset = 0u32;
        let mut max_align = 1u32;
        for (field_name, ty) in field_types {
            let align = ty.alignment(registry);
            max_align = max_align.max(align);
            offset = round_up(offset, align);
            fields.push(StructField { name: field_name, ty: ty.clone(), offset });
            offset += ty.size(registry).unwrap_or(0);
        }
        let size = round_up(offset, max_align);
        Self { name, fields, size, alignment: max_align }
    }
}

/// Owns every struct layout resolved so far, indexed by [`StructId`].
///
/// Populated incrementally in dependency order: a struct containing
/// another struct is only laid out after its member struct has a slot.
#[derive(Debug, Default)]
pub struct StructRegistry {
    layouts: Vec<StructLayout>,
}

impl StructRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, layout: StructLayout) -> StructId {
        let id = StructId(u32::try_from(self.layouts.len()).expect("fewer than u32::MAX struct declarations"));
        self.layouts.push(layout);
        id
    }

    #[must_use]
    pub fn get(&self, id: StructId) -> &StructLayout {
        &self.layouts[id.index()]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Scalar;

    #[test]
    fn vec3_field_pads_struct_to_16_byte_alignment() {
        let registry = StructRegistry::new();
        let layout = StructLayout::compute(
            StringId::default(),
            vec![
                (StringId::default(), Type::Scalar(Scalar::F32)),
                (StringId::default(), Type::vec(3, Scalar::F32)),
            ],
            &registry,
        );
        assert_eq!(layout.fields[1].offset, 16);
        assert_eq!(layout.size, 32);
        assert_eq!(layout.alignment, 16);
    }
}
