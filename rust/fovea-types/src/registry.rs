//! Process-wide catalog of value types.
//!
//! The registry maps canonical type names to descriptors. Atomic
//! primitives are pre-registered; the composite value types of this crate
//! seed themselves when the global registry is first built. User
//! extensions register through [`register_type`] before the first lookup;
//! the registry freezes on first use and rejects registration afterwards.

use std::sync::{
    OnceLock, RwLock,
    atomic::{AtomicBool, Ordering},
};

use ahash::AHashMap;
use fovea_common::{Result, error::Error, name::canonical_name};

/// The atomic primitives every dataset can use for item attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AtomicType {
    Integer,
    Floating,
    Complex,
    String,
    Boolean,
    Bytes,
    Buffer,
}

impl AtomicType {
    pub const ALL: [AtomicType; 7] = [
        AtomicType::Integer,
        AtomicType::Floating,
        AtomicType::Complex,
        AtomicType::String,
        AtomicType::Boolean,
        AtomicType::Bytes,
        AtomicType::Buffer,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AtomicType::Integer => "integer",
            AtomicType::Floating => "floating",
            AtomicType::Complex => "complex",
            AtomicType::String => "string",
            AtomicType::Boolean => "boolean",
            AtomicType::Bytes => "bytes",
            AtomicType::Buffer => "buffer",
        }
    }
}

/// Backend-agnostic storage layout of a value.
///
/// The storage adapter maps layouts to its native columnar types: binary
/// blobs for opaque payloads, fixed-size lists for coordinate vectors,
/// structs for nested value types.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueLayout {
    Bool,
    Int64,
    Float32,
    Float64,
    Utf8,
    Binary,
    FixedSizeFloat(usize),
    FixedSizeInt(usize),
    FloatList,
    IntList,
    StringList,
    BoolList,
    Struct(Vec<(String, ValueLayout)>),
}

impl ValueLayout {
    /// Convenience constructor for struct layouts.
    pub fn structure(members: &[(&str, ValueLayout)]) -> ValueLayout {
        ValueLayout::Struct(
            members
                .iter()
                .map(|(name, layout)| (name.to_string(), layout.clone()))
                .collect(),
        )
    }
}

/// A composite value type: a canonical name plus its storage layout.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeType {
    pub name: String,
    pub layout: ValueLayout,
}

/// Descriptor held by the registry for each canonical name.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDescriptor {
    Atomic(AtomicType),
    Composite(CompositeType),
}

impl TypeDescriptor {
    pub fn name(&self) -> &str {
        match self {
            TypeDescriptor::Atomic(atomic) => atomic.name(),
            TypeDescriptor::Composite(composite) => &composite.name,
        }
    }
}

pub struct TypeRegistry {
    entries: RwLock<AHashMap<String, TypeDescriptor>>,
    frozen: AtomicBool,
}

impl TypeRegistry {
    fn with_builtins() -> TypeRegistry {
        let mut entries = AHashMap::new();
        for atomic in AtomicType::ALL {
            entries.insert(atomic.name().to_string(), TypeDescriptor::Atomic(atomic));
        }
        for composite in builtin_composites() {
            entries.insert(
                composite.name.clone(),
                TypeDescriptor::Composite(composite),
            );
        }
        TypeRegistry {
            entries: RwLock::new(entries),
            frozen: AtomicBool::new(false),
        }
    }

    /// Registers a composite type under its canonical name.
    ///
    /// Fails with `RegistryFrozen` after the first lookup and with
    /// `DuplicateSchema` when the canonical name is taken.
    pub fn register(&self, composite: CompositeType) -> Result<()> {
        let key = canonical_name(&composite.name);
        if self.frozen.load(Ordering::Acquire) {
            return Err(Error::registry_frozen("types", key));
        }
        let mut entries = self
            .entries
            .write()
            .map_err(|_| Error::invalid_arg("types", "registry lock poisoned"))?;
        if entries.contains_key(&key) {
            return Err(Error::duplicate_schema(key));
        }
        entries.insert(
            key.clone(),
            TypeDescriptor::Composite(CompositeType {
                name: key,
                layout: composite.layout,
            }),
        );
        Ok(())
    }

    /// Resolves a canonical name to its descriptor. The first lookup
    /// freezes the registry.
    pub fn resolve(&self, name: &str) -> Option<TypeDescriptor> {
        self.frozen.store(true, Ordering::Release);
        self.entries
            .read()
            .ok()?
            .get(&canonical_name(name))
            .cloned()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }
}

static TYPES: OnceLock<TypeRegistry> = OnceLock::new();

/// The process-wide type registry, built with the atomic primitives and
/// the composite value types of this crate on first access.
pub fn global() -> &'static TypeRegistry {
    TYPES.get_or_init(TypeRegistry::with_builtins)
}

/// Registers a user composite type into the global registry.
pub fn register_type(name: &str, layout: ValueLayout) -> Result<()> {
    global().register(CompositeType {
        name: name.to_string(),
        layout,
    })
}

fn builtin_composites() -> Vec<CompositeType> {
    vec![
        CompositeType {
            name: "bbox".to_string(),
            layout: crate::bbox::BBox::layout(),
        },
        CompositeType {
            name: "compressed_rle".to_string(),
            layout: crate::mask::CompressedRle::layout(),
        },
        CompositeType {
            name: "keypoints".to_string(),
            layout: crate::keypoints::KeyPoints::layout(),
        },
        CompositeType {
            name: "keypoints3d".to_string(),
            layout: crate::keypoints::KeyPoints3D::layout(),
        },
        CompositeType {
            name: "bbox3d".to_string(),
            layout: crate::bbox3d::BBox3D::layout(),
        },
        CompositeType {
            name: "ndarray".to_string(),
            layout: crate::ndarray::NdArrayFloat::layout(),
        },
        CompositeType {
            name: "cam_calibration".to_string(),
            layout: crate::calibration::CamCalibration::layout(),
        },
        CompositeType {
            name: "depth_image".to_string(),
            layout: crate::depth::DepthImage::layout(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use fovea_common::error::ErrorKind;

    #[test]
    fn builtin_types_resolve() {
        let registry = TypeRegistry::with_builtins();
        assert!(registry.resolve("integer").is_some());
        assert!(registry.resolve("BBox").is_some());
        // lookups canonicalize
        assert!(registry.resolve("Compressed RLE").is_some());
        assert!(registry.resolve("no_such_type").is_none());
    }

    #[test]
    fn register_after_lookup_is_rejected() {
        let registry = TypeRegistry::with_builtins();
        let _ = registry.resolve("integer");
        let err = registry
            .register(CompositeType {
                name: "late".to_string(),
                layout: ValueLayout::Binary,
            })
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::RegistryFrozen { .. }));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let registry = TypeRegistry::with_builtins();
        let err = registry
            .register(CompositeType {
                name: "BBox".to_string(),
                layout: ValueLayout::Binary,
            })
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::DuplicateSchema { .. }));
    }

    #[test]
    fn custom_type_registers_before_freeze() {
        let registry = TypeRegistry::with_builtins();
        registry
            .register(CompositeType {
                name: "My Vector".to_string(),
                layout: ValueLayout::FloatList,
            })
            .unwrap();
        assert!(registry.resolve("my_vector").is_some());
    }
}
