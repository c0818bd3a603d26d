//! Flat result materialization: one row, one entity.

use crate::convert::ConverterRegistry;
use crate::cursor::ResultCursor;
use crate::error::MapResult;
use crate::mapping::{Entity, EntityMap};
use crate::repository::MappingRepository;

/// Materializes entities of type `E` from the current row of a cursor.
///
/// Column ordinals are resolved against the cursor's shape on first use (alternate name
/// first, then column name, case-insensitive) and reused while the shape stays the same.
/// Mapped columns absent from the cursor leave the field at its default.
pub struct RowMapper<'a, E> {
    map: &'a EntityMap<E>,
    converters: &'a ConverterRegistry,
    ordinals: Vec<Option<usize>>,
    shape: Option<Vec<String>>,
}

impl<'a, E: Entity> RowMapper<'a, E> {
    pub fn new(map: &'a EntityMap<E>, converters: &'a ConverterRegistry) -> Self {
        Self {
            map,
            converters,
            ordinals: Vec::new(),
            shape: None,
        }
    }

    /// Materialize a new entity from the current row.
    pub fn map_row<C: ResultCursor + ?Sized>(&mut self, cursor: &C) -> MapResult<E> {
        let mut entity = E::default();
        self.load_into(cursor, &mut entity)?;
        Ok(entity)
    }

    /// Assign the current row's mapped columns onto an existing entity.
    pub fn load_into<C: ResultCursor + ?Sized>(&mut self, cursor: &C, entity: &mut E) -> MapResult<()> {
        self.resolve(cursor);
        for (column, ordinal) in self.map.columns().iter().zip(&self.ordinals) {
            if let Some(ordinal) = *ordinal {
                let raw = cursor.value(ordinal)?;
                column.assign_from_db(entity, raw, self.converters)?;
            }
        }
        Ok(())
    }

    fn resolve<C: ResultCursor + ?Sized>(&mut self, cursor: &C) {
        let unchanged = self.shape.as_ref().is_some_and(|shape| {
            shape.len() == cursor.field_count()
                && shape
                    .iter()
                    .enumerate()
                    .all(|(i, name)| name == cursor.field_name(i))
        });
        if unchanged {
            return;
        }
        self.ordinals = resolve_ordinals(self.map, cursor);
        self.shape = Some(
            (0..cursor.field_count())
                .map(|i| cursor.field_name(i).to_string())
                .collect(),
        );
    }
}

/// Cursor ordinal of every mapped column of `map`, in map order.
pub fn resolve_ordinals<E, C: ResultCursor + ?Sized>(
    map: &EntityMap<E>,
    cursor: &C,
) -> Vec<Option<usize>> {
    map.columns()
        .iter()
        .map(|column| {
            column
                .alt_name()
                .and_then(|alt| cursor.ordinal(alt))
                .or_else(|| cursor.ordinal(column.name()))
        })
        .collect()
}

/// Materialize the first row of `cursor`, or `None` when it is empty.
pub fn find<E: Entity, C: ResultCursor>(
    repository: &MappingRepository,
    mut cursor: C,
) -> MapResult<Option<E>> {
    if !cursor.advance()? {
        return Ok(None);
    }
    let map = repository.column_map::<E>()?;
    let mut mapper = RowMapper::new(&map, repository.converters());
    mapper.map_row(&cursor).map(Some)
}

/// Assign the first row of `cursor` onto `entity`.
///
/// Returns `false`, leaving `entity` untouched, when the cursor is empty.
pub fn find_into<E: Entity, C: ResultCursor>(
    repository: &MappingRepository,
    mut cursor: C,
    entity: &mut E,
) -> MapResult<bool> {
    if !cursor.advance()? {
        return Ok(false);
    }
    let map = repository.column_map::<E>()?;
    let mut mapper = RowMapper::new(&map, repository.converters());
    mapper.load_into(&cursor, entity)?;
    Ok(true)
}

/// Materialize every row of `cursor`, in order.
pub fn query<E: Entity, C: ResultCursor>(
    repository: &MappingRepository,
    mut cursor: C,
) -> MapResult<Vec<E>> {
    let map = repository.column_map::<E>()?;
    let mut mapper = RowMapper::new(&map, repository.converters());
    let mut out = Vec::new();
    while cursor.advance()? {
        out.push(mapper.map_row(&cursor)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::MemoryCursor;
    use crate::mapping::{ColumnMap, EntityMapping};
    use crate::row;
    use crate::value::DbValue;

    #[derive(Debug, Default, PartialEq)]
    struct Line {
        id: i32,
        name: String,
        note: Option<String>,
    }

    impl Entity for Line {
        fn mapping() -> EntityMapping<Self> {
            EntityMapping::new()
                .column(
                    ColumnMap::new("id", |l: &Line| &l.id, |l: &mut Line| &mut l.id)
                        .column("ID")
                        .with_alt_name("LineID")
                        .primary_key(),
                )
                .field("Name", |l: &Line| &l.name, |l: &mut Line| &mut l.name)
                .field("Note", |l: &Line| &l.note, |l: &mut Line| &mut l.note)
        }
    }

    #[test]
    fn alt_name_wins_over_column_name() {
        let repo = MappingRepository::new();
        let cursor = MemoryCursor::new(["ID", "LineID", "name"]).row(row![1, 7, "x"]);
        let line: Line = find(&repo, cursor).unwrap().unwrap();
        assert_eq!(line.id, 7);
        assert_eq!(line.name, "x");
        assert_eq!(line.note, None);
    }

    #[test]
    fn reshaped_cursor_is_re_resolved() {
        let repo = MappingRepository::new();
        let map = repo.column_map::<Line>().unwrap();
        let mut mapper = RowMapper::new(&map, repo.converters());

        let mut first = MemoryCursor::new(["ID", "Name"]).row(row![1, "a"]);
        first.advance().unwrap();
        assert_eq!(mapper.map_row(&first).unwrap().name, "a");

        let mut second = MemoryCursor::new(["Note", "ID"]).row(row!["n", 2]);
        second.advance().unwrap();
        let line = mapper.map_row(&second).unwrap();
        assert_eq!(line, Line { id: 2, name: String::new(), note: Some("n".into()) });
    }

    #[test]
    fn query_maps_every_row() {
        let repo = MappingRepository::new();
        let cursor = MemoryCursor::new(["ID", "Note"])
            .row(row![1, DbValue::Null])
            .row(row![2, "b"]);
        let lines: Vec<Line> = query(&repo, cursor).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].note.as_deref(), Some("b"));
    }
}
