//! Type-metadata cache
//!
//! Resolved type descriptors and field locations are looked up on every
//! step of every walk, so they are memoized here. Each `Inspector` owns its
//! own cache; there is no process-wide one. It is dropped as a whole by
//! `Inspector::reload_layout` and by `Inspector::refresh` whenever the
//! target's set of loaded objects changes.

use crate::layout::TypeDescriptor;
use crate::oracle::FieldLocation;

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

#[derive(Default)]
pub struct TypeCache {
    types: RwLock<HashMap<String, Arc<TypeDescriptor>>>,
    fields: RwLock<HashMap<(String, String), FieldLocation>>,
    generation: AtomicU64,
}

impl TypeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_type(&self, name: &str) -> Option<Arc<TypeDescriptor>> {
        self.types.read().get(name).cloned()
    }

    pub fn insert_type(&self, descriptor: Arc<TypeDescriptor>) {
        self.types
            .write()
            .insert(descriptor.name.clone(), descriptor);
    }

    pub fn get_field(&self, type_name: &str, path: &str) -> Option<FieldLocation> {
        self.fields
            .read()
            .get(&(type_name.to_string(), path.to_string()))
            .cloned()
    }

    pub fn insert_field(&self, type_name: &str, path: &str, location: FieldLocation) {
        self.fields
            .write()
            .insert((type_name.to_string(), path.to_string()), location);
    }

    /// Drop every cached entry
    pub fn invalidate(&self) {
        let types = {
            let mut types = self.types.write();
            let n = types.len();
            types.clear();
            n
        };
        let fields = {
            let mut fields = self.fields.write();
            let n = fields.len();
            fields.clear();
            n
        };
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(types, fields, generation, "type cache invalidated");
    }

    /// Bumped by every `invalidate`
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.types.read().len() + self.fields.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::FieldType;

    #[test]
    fn test_cache_insert_and_invalidate() {
        let cache = TypeCache::new();
        assert!(cache.is_empty());

        cache.insert_type(Arc::new(TypeDescriptor {
            name: "struct hmap".to_string(),
            size: 32,
            fields: Default::default(),
        }));
        cache.insert_field(
            "struct hmap",
            "n",
            FieldLocation {
                offset: 24,
                ty: FieldType::Int { size: 8, signed: true },
                size: 8,
            },
        );

        assert_eq!(cache.get_type("struct hmap").unwrap().size, 32);
        assert_eq!(cache.get_field("struct hmap", "n").unwrap().offset, 24);
        assert!(cache.get_field("struct hmap", "mask").is_none());
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.generation(), 0);

        cache.invalidate();
        assert!(cache.is_empty());
        assert!(cache.get_type("struct hmap").is_none());
        assert_eq!(cache.generation(), 1);
    }
}
