//! Tags identifying the decoded payload type of a resource.
//!
//! Tags are handed out by an explicit `DataTypeRegistry`, populated by the application
//! at startup, so their values only depend on the order of `register` calls.

use std::any::{self, Any, TypeId};
use std::collections::HashMap;
use std::fmt;

/// A process-assigned integer identifying a decoded payload type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DataType(u32);

impl DataType {
    #[inline]
    pub fn from_id(id: u32) -> Self {
        DataType(id)
    }

    #[inline]
    pub fn id(self) -> u32 {
        self.0
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "DataType({})", self.0)
    }
}

#[derive(Debug, Default)]
pub struct DataTypeRegistry {
    types: HashMap<TypeId, DataType>,
    names: Vec<&'static str>,
}

impl DataTypeRegistry {
    /// Creates a new and empty `DataTypeRegistry`.
    pub fn new() -> Self {
        DataTypeRegistry {
            types: HashMap::new(),
            names: Vec::new(),
        }
    }

    /// Assigns the next tag to `T`. Registering the same type twice returns the tag
    /// assigned first.
    pub fn register<T: Any>(&mut self) -> DataType {
        let id = TypeId::of::<T>();
        if let Some(&tag) = self.types.get(&id) {
            return tag;
        }

        let tag = DataType(self.names.len() as u32);
        self.types.insert(id, tag);
        self.names.push(any::type_name::<T>());
        tag
    }

    #[inline]
    pub fn get<T: Any>(&self) -> Option<DataType> {
        self.types.get(&TypeId::of::<T>()).cloned()
    }

    /// Name of the type behind `tag`.
    #[inline]
    pub fn name(&self, tag: DataType) -> Option<&'static str> {
        self.names.get(tag.0 as usize).cloned()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    struct Texture;
    struct Mesh;

    #[test]
    fn registration_order() {
        let mut registry = DataTypeRegistry::new();
        assert_eq!(registry.get::<Texture>(), None);

        let texture = registry.register::<Texture>();
        let mesh = registry.register::<Mesh>();
        assert_eq!(texture.id(), 0);
        assert_eq!(mesh.id(), 1);
        assert_eq!(registry.register::<Texture>(), texture);
        assert_eq!(registry.get::<Mesh>(), Some(mesh));
        assert_eq!(registry.len(), 2);
        assert!(registry.name(mesh).unwrap().ends_with("Mesh"));
        assert_eq!(registry.name(DataType::from_id(9)), None);
    }
}
