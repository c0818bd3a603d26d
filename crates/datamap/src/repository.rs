//! Process-wide cache of entity maps and converters.

use crate::convert::{Converter, ConverterRegistry};
use crate::error::{MapError, MapResult};
use crate::mapping::{Entity, EntityMap, RelationshipInfo};
use crate::value::{ColumnValue, TypeKey};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

type AnyMap = Arc<dyn Any + Send + Sync>;
type BuildSlot = Arc<OnceLock<Result<AnyMap, String>>>;

/// Populate-on-first-access store of [`EntityMap`]s and [`Converter`]s.
///
/// Each entity type is built at most once: concurrent first accesses block on the same
/// build and observe its result. A failed build is cached too, and reported again on every
/// later access until [`clear`](Self::clear).
#[derive(Default)]
pub struct MappingRepository {
    maps: RwLock<HashMap<TypeId, BuildSlot>>,
    converters: ConverterRegistry,
}

impl MappingRepository {
    /// Create an independent, empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide repository.
    pub fn global() -> &'static MappingRepository {
        static GLOBAL: OnceLock<MappingRepository> = OnceLock::new();
        GLOBAL.get_or_init(MappingRepository::new)
    }

    /// Resolve (building on first access) the map for `E`.
    pub fn column_map<E: Entity>(&self) -> MapResult<Arc<EntityMap<E>>> {
        let slot = self.slot(TypeId::of::<E>());
        let built = slot.get_or_init(|| build::<E>());
        match built {
            Ok(any) => Arc::clone(any).downcast::<EntityMap<E>>().map_err(|_| {
                MapError::configuration(format!(
                    "cached map for {} has an unexpected type",
                    std::any::type_name::<E>()
                ))
            }),
            Err(message) => Err(MapError::MappingConfiguration(message.clone())),
        }
    }

    /// Relationship descriptors of `E`, in declaration order.
    pub fn relationships<E: Entity>(&self) -> MapResult<Vec<RelationshipInfo>> {
        let map = self.column_map::<E>()?;
        Ok(map.relationships().iter().map(|r| r.info()).collect())
    }

    /// Converter registered for a value type, if any.
    pub fn converter(&self, value_type: TypeKey) -> Option<Arc<dyn Converter>> {
        self.converters.get(value_type)
    }

    /// Register the converter for fields of type `T` (and `Option<T>`).
    pub fn register_converter<T: ColumnValue>(&self, converter: impl Converter + 'static) {
        self.converters
            .register(T::value_type(), Arc::new(converter));
    }

    pub fn converters(&self) -> &ConverterRegistry {
        &self.converters
    }

    /// Whether `E` has been resolved (successfully or not).
    pub fn is_cached<E: Entity>(&self) -> bool {
        self.maps
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&TypeId::of::<E>())
            .is_some_and(|slot| slot.get().is_some())
    }

    /// Drop every cached map and converter.
    pub fn clear(&self) {
        self.maps
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.converters.clear();
    }

    /// Drop every registered converter, keeping cached maps.
    pub fn clear_converters(&self) {
        self.converters.clear();
    }

    fn slot(&self, id: TypeId) -> BuildSlot {
        if let Some(slot) = self
            .maps
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
        {
            return Arc::clone(slot);
        }
        let mut maps = self.maps.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(maps.entry(id).or_default())
    }
}

impl fmt::Debug for MappingRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cached = self
            .maps
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        f.debug_struct("MappingRepository")
            .field("cached_maps", &cached)
            .field("converters", &self.converters)
            .finish()
    }
}

fn build<E: Entity>() -> Result<AnyMap, String> {
    let type_name = std::any::type_name::<E>();
    match E::mapping().build() {
        Ok(map) => {
            tracing::debug!(
                target: "datamap.mapping",
                entity = type_name,
                table = map.table_name(),
                columns = map.columns().len(),
                relationships = map.relationships().len(),
                "built entity map"
            );
            Ok(Arc::new(map))
        }
        Err(err) => {
            tracing::warn!(
                target: "datamap.mapping",
                entity = type_name,
                error = %err,
                "entity map build failed"
            );
            Err(match err {
                MapError::MappingConfiguration(message) => message,
                other => other.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::BoolIntConverter;
    use crate::mapping::EntityMapping;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static BUILDS: AtomicUsize = AtomicUsize::new(0);

    #[derive(Default)]
    struct Counted {
        id: i64,
    }

    impl Entity for Counted {
        fn mapping() -> EntityMapping<Self> {
            BUILDS.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(5));
            EntityMapping::new()
                .field("ID", |c: &Counted| &c.id, |c: &mut Counted| &mut c.id)
                .primary_key("ID")
        }
    }

    #[derive(Default)]
    struct Broken {
        id: i64,
    }

    impl Entity for Broken {
        fn mapping() -> EntityMapping<Self> {
            EntityMapping::new()
                .field("ID", |b: &Broken| &b.id, |b: &mut Broken| &mut b.id)
                .primary_key("Missing")
        }
    }

    #[test]
    fn concurrent_first_access_builds_once() {
        let repo = Arc::new(MappingRepository::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let repo = Arc::clone(&repo);
                std::thread::spawn(move || repo.column_map::<Counted>().map(|m| Arc::as_ptr(&m) as usize))
            })
            .collect();
        let ptrs: Vec<usize> = handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect();
        assert_eq!(BUILDS.load(Ordering::SeqCst), 1);
        assert!(ptrs.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn build_failures_are_cached() {
        let repo = MappingRepository::new();
        let first = repo.column_map::<Broken>().unwrap_err();
        assert!(first.is_mapping_configuration());
        assert!(repo.is_cached::<Broken>());
        let second = repo.column_map::<Broken>().unwrap_err();
        assert_eq!(first.to_string(), second.to_string());

        repo.clear();
        assert!(!repo.is_cached::<Broken>());
    }

    #[test]
    fn converters_register_under_inner_type() {
        let repo = MappingRepository::new();
        repo.register_converter::<Option<bool>>(BoolIntConverter);
        assert!(repo.converter(TypeKey::of::<bool>()).is_some());
        repo.clear_converters();
        assert!(repo.converter(TypeKey::of::<bool>()).is_none());
    }
}
