//! Entity graph materialization from flat, joined result sets.
//!
//! A joined query repeats the parent's columns on every row that carries one of its
//! children. [`map_graph`] folds such a result set into root entities that own their
//! child collections, in a single forward pass:
//!
//! - a row whose root key equals the previous row's key extends the current root;
//! - a row with a new key starts a new root;
//! - a row whose key belongs to an earlier, already-closed root is an ordering violation
//!   and fails with [`MapError::DataMapping`].
//!
//! The caller must therefore sort the result set so that all rows of one parent are
//! contiguous (for example `ORDER BY o.id`). Collection children that carry key columns
//! are grouped the same way beneath their parent. Only key tuples are remembered between
//! rows; entities are never looked up by key.

use crate::convert::ConverterRegistry;
use crate::cursor::ResultCursor;
use crate::error::{MapError, MapResult};
use crate::mapping::{Entity, EntityMap};
use crate::repository::MappingRepository;
use crate::value::DbValue;
use std::any::TypeId;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Materialize every row of `cursor` into a graph of `E` roots.
///
/// Roots are returned in order of first appearance, children in row order.
pub fn map_graph<E: Entity, C: ResultCursor>(
    repository: &MappingRepository,
    mut cursor: C,
) -> MapResult<Vec<E>> {
    if !cursor.advance()? {
        repository.column_map::<E>()?;
        return Ok(Vec::new());
    }

    let columns: Vec<String> = (0..cursor.field_count())
        .map(|i| cursor.field_name(i).to_string())
        .collect();
    let mut graph = EntityGraph::<E>::new(repository, &columns)?;

    let mut row = Vec::with_capacity(columns.len());
    loop {
        row.clear();
        for ordinal in 0..columns.len() {
            row.push(cursor.value(ordinal)?);
        }
        graph.push_row(&row)?;
        if !cursor.advance()? {
            break;
        }
    }

    Ok(graph.finish())
}

/// Incremental graph builder for one result set shape.
///
/// Feed rows (values in cursor column order) with [`push_row`](Self::push_row) and take
/// the roots with [`finish`](Self::finish).
pub struct EntityGraph<'r, E> {
    converters: &'r ConverterRegistry,
    root: GraphNode<E>,
    grouping: Grouping,
    roots: Vec<E>,
    rows: usize,
}

impl<'r, E: Entity> EntityGraph<'r, E> {
    /// Resolve the loader tree of `E` against the given result set columns.
    pub fn new<S: AsRef<str>>(repository: &'r MappingRepository, columns: &[S]) -> MapResult<Self> {
        let columns: Vec<&str> = columns.iter().map(AsRef::as_ref).collect();
        let mut ctx = BuildContext {
            repository,
            columns: &columns,
            path: Vec::new(),
        };
        let root = GraphNode::<E>::build(&mut ctx)?;

        let type_name = root.map.type_name();
        if root.keys.is_empty() {
            return Err(MapError::configuration(format!(
                "{type_name} has no primary key columns and cannot be a graph root"
            )));
        }
        if let Some(missing) = root.missing_key_column() {
            return Err(MapError::data_mapping(format!(
                "key column '{missing}' of {type_name} is not in the result set"
            )));
        }

        Ok(Self {
            converters: repository.converters(),
            root,
            grouping: Grouping::default(),
            roots: Vec::new(),
            rows: 0,
        })
    }

    /// Fold one row into the graph.
    pub fn push_row(&mut self, values: &[DbValue]) -> MapResult<()> {
        self.rows += 1;
        let row = GraphRow {
            values,
            number: self.rows,
        };
        let key = self.root.key(row);
        if self.grouping.observe(key, self.root.map.type_name(), row.number)? {
            self.root.reset_children();
            let entity = self.root.materialize(row, self.converters)?;
            self.roots.push(entity);
        }
        // The first row always opens a group.
        let Some(current) = self.roots.last_mut() else {
            return Ok(());
        };
        self.root.load_children(current, row, self.converters)
    }

    /// Number of roots produced so far.
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn finish(self) -> Vec<E> {
        tracing::debug!(
            target: "datamap.graph",
            entity = self.root.map.type_name(),
            rows = self.rows,
            roots = self.roots.len(),
            "materialized entity graph"
        );
        self.roots
    }
}

/// One result row, in cursor column order, with its 1-based position.
#[derive(Clone, Copy)]
pub(crate) struct GraphRow<'a> {
    values: &'a [DbValue],
    number: usize,
}

impl<'a> GraphRow<'a> {
    fn get(&self, ordinal: usize) -> Option<&'a DbValue> {
        self.values.get(ordinal)
    }
}

/// Borrowed state while resolving a loader tree.
pub(crate) struct BuildContext<'a> {
    repository: &'a MappingRepository,
    columns: &'a [&'a str],
    path: Vec<TypeId>,
}

impl BuildContext<'_> {
    fn ordinal(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|column| column.eq_ignore_ascii_case(name))
    }

    fn on_path<C: 'static>(&self) -> bool {
        self.path.contains(&TypeId::of::<C>())
    }
}

/// Resolved ordinals and child loaders of one entity type at one position in the tree.
struct GraphNode<E> {
    map: Arc<EntityMap<E>>,
    ordinals: Vec<Option<usize>>,
    keys: Vec<Option<usize>>,
    present: Vec<usize>,
    children: Vec<Box<dyn ChildLoader<E>>>,
}

impl<E: Entity> GraphNode<E> {
    fn build(ctx: &mut BuildContext<'_>) -> MapResult<Self> {
        let map = ctx.repository.column_map::<E>()?;
        let ordinals: Vec<Option<usize>> = map
            .columns()
            .iter()
            .map(|column| {
                column
                    .alt_name()
                    .and_then(|alt| ctx.ordinal(alt))
                    .or_else(|| ctx.ordinal(column.name()))
            })
            .collect();
        let keys = map
            .columns()
            .iter()
            .zip(&ordinals)
            .filter(|(column, _)| column.is_primary_key())
            .map(|(_, ordinal)| *ordinal)
            .collect();
        let present = ordinals.iter().flatten().copied().collect();

        ctx.path.push(TypeId::of::<E>());
        let mut children = Vec::new();
        for relationship in map.relationships() {
            if let Some(loader) = relationship.access().loader(ctx)? {
                children.push(loader);
            }
        }
        ctx.path.pop();

        Ok(Self {
            map,
            ordinals,
            keys,
            present,
            children,
        })
    }

    fn is_keyed(&self) -> bool {
        !self.keys.is_empty() && self.keys.iter().all(Option::is_some)
    }

    fn missing_key_column(&self) -> Option<&str> {
        self.map
            .columns()
            .primary_keys()
            .zip(&self.keys)
            .find(|(_, ordinal)| ordinal.is_none())
            .map(|(column, _)| column.name())
    }

    fn key(&self, row: GraphRow<'_>) -> GroupKey {
        GroupKey(
            self.keys
                .iter()
                .flatten()
                .map(|&ordinal| row.get(ordinal).cloned().unwrap_or_default())
                .collect(),
        )
    }

    /// Every mapped column of this type present in the row is null (left join miss).
    fn is_absent(&self, row: GraphRow<'_>) -> bool {
        self.present
            .iter()
            .all(|&ordinal| row.get(ordinal).is_none_or(DbValue::is_null))
    }

    fn materialize(&self, row: GraphRow<'_>, converters: &ConverterRegistry) -> MapResult<E> {
        let mut entity = E::default();
        for (column, ordinal) in self.map.columns().iter().zip(&self.ordinals) {
            if let Some(raw) = ordinal.and_then(|o| row.get(o)) {
                column.assign_from_db(&mut entity, raw.clone(), converters)?;
            }
        }
        Ok(entity)
    }

    fn load_children(
        &mut self,
        parent: &mut E,
        row: GraphRow<'_>,
        converters: &ConverterRegistry,
    ) -> MapResult<()> {
        for child in &mut self.children {
            child.load(parent, row, converters)?;
        }
        Ok(())
    }

    fn reset_children(&mut self) {
        for child in &mut self.children {
            child.reset();
        }
    }
}

/// Loads one relationship of a parent of type `P` from each row.
pub(crate) trait ChildLoader<P> {
    fn load(
        &mut self,
        parent: &mut P,
        row: GraphRow<'_>,
        converters: &ConverterRegistry,
    ) -> MapResult<()>;

    /// Forget grouping state; called whenever the parent changes.
    fn reset(&mut self);
}

struct ManyLoader<P, C> {
    items: fn(&mut P) -> &mut Vec<C>,
    node: GraphNode<C>,
    grouping: Option<Grouping>,
}

impl<P: Entity, C: Entity> ChildLoader<P> for ManyLoader<P, C> {
    fn load(
        &mut self,
        parent: &mut P,
        row: GraphRow<'_>,
        converters: &ConverterRegistry,
    ) -> MapResult<()> {
        if self.node.is_absent(row) {
            return Ok(());
        }

        let is_new = match &mut self.grouping {
            Some(grouping) => {
                let key = self.node.key(row);
                grouping.observe(key, self.node.map.type_name(), row.number)?
            }
            None => true,
        };

        let items = (self.items)(parent);
        if is_new {
            self.node.reset_children();
            items.push(self.node.materialize(row, converters)?);
        }
        match items.last_mut() {
            Some(child) => self.node.load_children(child, row, converters),
            None => Ok(()),
        }
    }

    fn reset(&mut self) {
        if let Some(grouping) = &mut self.grouping {
            grouping.reset();
        }
        self.node.reset_children();
    }
}

struct OneLoader<P, C> {
    slot: fn(&mut P) -> &mut Option<C>,
    node: GraphNode<C>,
}

impl<P: Entity, C: Entity> ChildLoader<P> for OneLoader<P, C> {
    fn load(
        &mut self,
        parent: &mut P,
        row: GraphRow<'_>,
        converters: &ConverterRegistry,
    ) -> MapResult<()> {
        if self.node.is_absent(row) {
            return Ok(());
        }
        let slot = (self.slot)(parent);
        if slot.is_none() {
            self.node.reset_children();
            *slot = Some(self.node.materialize(row, converters)?);
        }
        match slot.as_mut() {
            Some(child) => self.node.load_children(child, row, converters),
            None => Ok(()),
        }
    }

    fn reset(&mut self) {
        self.node.reset_children();
    }
}

pub(crate) fn loader_for_many<P: Entity, C: Entity>(
    ctx: &mut BuildContext<'_>,
    items: fn(&mut P) -> &mut Vec<C>,
) -> MapResult<Option<Box<dyn ChildLoader<P>>>> {
    let Some(node) = child_node::<C>(ctx)? else {
        return Ok(None);
    };
    let grouping = node.is_keyed().then(Grouping::default);
    Ok(Some(Box::new(ManyLoader {
        items,
        node,
        grouping,
    })))
}

pub(crate) fn loader_for_one<P: Entity, C: Entity>(
    ctx: &mut BuildContext<'_>,
    slot: fn(&mut P) -> &mut Option<C>,
) -> MapResult<Option<Box<dyn ChildLoader<P>>>> {
    let Some(node) = child_node::<C>(ctx)? else {
        return Ok(None);
    };
    Ok(Some(Box::new(OneLoader { slot, node })))
}

fn child_node<C: Entity>(ctx: &mut BuildContext<'_>) -> MapResult<Option<GraphNode<C>>> {
    if ctx.on_path::<C>() {
        tracing::trace!(
            target: "datamap.graph",
            entity = std::any::type_name::<C>(),
            "type already on the loading path, not descending"
        );
        return Ok(None);
    }
    let node = GraphNode::<C>::build(ctx)?;
    if node.present.is_empty() {
        tracing::trace!(
            target: "datamap.graph",
            entity = std::any::type_name::<C>(),
            "no columns in the result set, relationship skipped"
        );
        return Ok(None);
    }
    Ok(Some(node))
}

/// Tracks the current group and every key already closed within the same scope.
#[derive(Debug, Default)]
struct Grouping {
    current: Option<GroupKey>,
    seen: HashSet<GroupKey>,
}

impl Grouping {
    /// Returns `true` when `key` opens a new group.
    fn observe(&mut self, key: GroupKey, entity: &str, row: usize) -> MapResult<bool> {
        if self.current.as_ref() == Some(&key) {
            return Ok(false);
        }
        if self.seen.contains(&key) {
            tracing::warn!(
                target: "datamap.graph",
                entity,
                key = ?key.0,
                row,
                "result set is not sorted by key"
            );
            return Err(MapError::data_mapping(format!(
                "{entity} with key {:?} reappeared at row {row} after other rows; \
                 sort the result set so rows of the same entity are contiguous",
                key.0
            )));
        }
        self.seen.insert(key.clone());
        self.current = Some(key);
        Ok(true)
    }

    fn reset(&mut self) {
        self.current = None;
        self.seen.clear();
    }
}

/// Key tuple with total equality (floats by bit pattern, JSON by text).
#[derive(Debug, Clone)]
struct GroupKey(Vec<DbValue>);

impl PartialEq for GroupKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len() && self.0.iter().zip(&other.0).all(|(a, b)| key_eq(a, b))
    }
}

impl Eq for GroupKey {}

impl Hash for GroupKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.len().hash(state);
        for value in &self.0 {
            hash_value(value, state);
        }
    }
}

fn key_eq(a: &DbValue, b: &DbValue) -> bool {
    match (a, b) {
        (DbValue::F32(x), DbValue::F32(y)) => x.to_bits() == y.to_bits(),
        (DbValue::F64(x), DbValue::F64(y)) => x.to_bits() == y.to_bits(),
        (DbValue::Json(x), DbValue::Json(y)) => x.to_string() == y.to_string(),
        _ => a == b,
    }
}

fn hash_value<H: Hasher>(value: &DbValue, state: &mut H) {
    std::mem::discriminant(value).hash(state);
    match value {
        DbValue::Null => {}
        DbValue::Bool(v) => v.hash(state),
        DbValue::I16(v) => v.hash(state),
        DbValue::I32(v) => v.hash(state),
        DbValue::I64(v) => v.hash(state),
        DbValue::F32(v) => v.to_bits().hash(state),
        DbValue::F64(v) => v.to_bits().hash(state),
        DbValue::Decimal(v) => v.hash(state),
        DbValue::Text(v) => v.hash(state),
        DbValue::Bytes(v) => v.hash(state),
        DbValue::Date(v) => v.hash(state),
        DbValue::Time(v) => v.hash(state),
        DbValue::Timestamp(v) => v.hash(state),
        DbValue::TimestampTz(v) => v.hash(state),
        DbValue::Uuid(v) => v.hash(state),
        DbValue::Json(v) => v.to_string().hash(state),
    }
}
