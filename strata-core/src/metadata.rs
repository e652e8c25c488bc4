use crate::{ColumnDef, Entity, Error, Query, Result};
use std::{
    any::TypeId,
    collections::{HashMap, HashSet},
    sync::{Arc, OnceLock, PoisonError, RwLock},
};

/// Raw description produced by [`Entity::describe`], validated by the [`Registry`].
#[derive(Debug, Clone, Default)]
pub struct EntityDescriptor {
    /// Rust type name, used in error messages.
    pub name: &'static str,
    pub table: &'static str,
    pub columns: Vec<ColumnDef>,
    pub associations: Vec<AssociationDef>,
}

/// One-to-many association declared by an `Association<T>` field.
#[derive(Debug, Clone)]
pub struct AssociationDef {
    /// Field name, also the name passed to `preload`.
    pub name: &'static str,
    /// Column of the child table holding the parent key.
    pub foreign_key: &'static str,
    pub child_type: TypeId,
    pub child: fn() -> EntityDescriptor,
}

/// Validated metadata of an entity type. Immutable once derived.
#[derive(Debug)]
pub struct EntityMetadata {
    pub name: &'static str,
    pub table: &'static str,
    pub columns: Vec<ColumnDef>,
    pub associations: Vec<AssociationDef>,
    primary_key: usize,
}

impl EntityMetadata {
    pub fn primary_key(&self) -> &ColumnDef {
        &self.columns[self.primary_key]
    }
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }
    pub fn column_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|c| c.name)
    }
    pub fn association(&self, name: &str) -> Option<&AssociationDef> {
        self.associations.iter().find(|a| a.name == name)
    }
}

impl TryFrom<EntityDescriptor> for EntityMetadata {
    type Error = String;

    fn try_from(descriptor: EntityDescriptor) -> std::result::Result<Self, String> {
        let EntityDescriptor {
            name,
            table,
            columns,
            associations,
        } = descriptor;
        if table.is_empty() {
            return Err(format!("Entity `{name}` has an empty table name"));
        }
        if columns.is_empty() {
            return Err(format!("Entity `{name}` has no columns"));
        }
        let mut seen = HashSet::new();
        if let Some(column) = columns.iter().find(|c| !seen.insert(c.name)) {
            return Err(format!(
                "Entity `{name}` declares column `{}` more than once",
                column.name
            ));
        }
        let keys = columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.primary_key)
            .map(|(i, _)| i)
            .collect::<Vec<_>>();
        let primary_key = match keys.as_slice() {
            [key] => *key,
            [] => return Err(format!("Entity `{name}` has no primary key")),
            _ => {
                return Err(format!(
                    "Entity `{name}` has a composite primary key ({}), only single column keys are supported",
                    keys.iter()
                        .map(|i| columns[*i].name)
                        .collect::<Vec<_>>()
                        .join(", ")
                ));
            }
        };
        let mut seen = HashSet::new();
        for association in &associations {
            if !seen.insert(association.name) {
                return Err(format!(
                    "Entity `{name}` declares association `{}` more than once",
                    association.name
                ));
            }
            let child = (association.child)();
            if !child
                .columns
                .iter()
                .any(|c| c.name == association.foreign_key)
            {
                return Err(format!(
                    "Association `{name}.{}` refers to foreign key `{}` which is not a column of `{}`",
                    association.name, association.foreign_key, child.name
                ));
            }
        }
        Ok(Self {
            name,
            table,
            columns,
            associations,
            primary_key,
        })
    }
}

type Cell = Arc<OnceLock<std::result::Result<Arc<EntityMetadata>, String>>>;

/// Owned, process wide cache of entity metadata.
///
/// Create one at startup and pass it by reference. Each entity type is derived at most
/// once, even when several threads resolve it for the first time concurrently.
#[derive(Default)]
pub struct Registry {
    entries: RwLock<HashMap<TypeId, Cell>>,
}

impl Registry {
    pub fn new() -> Self {
        Default::default()
    }

    /// Metadata of `E`, derived on first use.
    pub fn resolve<E: Entity>(&self) -> Result<Arc<EntityMetadata>> {
        self.resolve_with(TypeId::of::<E>(), E::describe)
    }

    /// Metadata of the type identified by `id`, described by `describe` on first use.
    pub fn resolve_with(
        &self,
        id: TypeId,
        describe: fn() -> EntityDescriptor,
    ) -> Result<Arc<EntityMetadata>> {
        let cell = self.cell(id);
        cell.get_or_init(|| {
            let descriptor = describe();
            log::debug!("Deriving metadata of `{}`", descriptor.name);
            EntityMetadata::try_from(descriptor).map(Arc::new)
        })
        .clone()
        .map_err(Error::schema)
    }

    /// Starts a query over `E`.
    pub fn query<E: Entity>(&self) -> Result<Query<'_, E>> {
        Ok(Query::new(self, self.resolve::<E>()?))
    }

    /// Every successfully derived metadata so far.
    pub fn resolved(&self) -> Vec<Arc<EntityMetadata>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter_map(|cell| cell.get().and_then(|v| v.as_ref().ok()).cloned())
            .collect()
    }

    fn cell(&self, id: TypeId) -> Cell {
        if let Some(cell) = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
        {
            return cell.clone();
        }
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(id)
            .or_default()
            .clone()
    }
}
