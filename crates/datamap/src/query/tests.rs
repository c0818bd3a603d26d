use super::{InsertQuery, UpdateQuery};
use crate::command::{Binder, Command};
use crate::dialect::{DefaultDialect, Dialect, PostgresDialect, SqlServerDialect};
use crate::mapping::{ColumnMap, Entity, EntityMapping};
use crate::repository::MappingRepository;
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Unquoted names with `@name` parameters and a SQL Server style identity query.
struct PlainIdentityDialect;

impl Dialect for PlainIdentityDialect {
    fn name(&self) -> &str {
        "plain"
    }

    fn create_token(&self, name: &str) -> String {
        name.to_string()
    }

    fn parameter_placeholder(&self, name: &str, _position: usize) -> String {
        format!("@{name}")
    }

    fn identity_clause(&self, _return_columns: &[&str]) -> Option<String> {
        Some(";SELECT SCOPE_IDENTITY();".to_string())
    }
}

#[derive(Debug, Default)]
struct Row5 {
    id: i32,
    a: String,
    b: i32,
    c: Decimal,
    d: NaiveDate,
}

impl Entity for Row5 {
    fn mapping() -> EntityMapping<Self> {
        EntityMapping::new()
            .table("Table")
            .column(
                ColumnMap::new("id", |r: &Row5| &r.id, |r: &mut Row5| &mut r.id)
                    .column("ID")
                    .primary_key()
                    .auto_increment()
                    .return_value(),
            )
            .field("ColA", |r: &Row5| &r.a, |r: &mut Row5| &mut r.a)
            .field("ColB", |r: &Row5| &r.b, |r: &mut Row5| &mut r.b)
            .field("ColC", |r: &Row5| &r.c, |r: &mut Row5| &mut r.c)
            .field("ColD", |r: &Row5| &r.d, |r: &mut Row5| &mut r.d)
    }
}

#[derive(Debug, Default)]
struct NoKey {
    a: String,
}

impl Entity for NoKey {
    fn mapping() -> EntityMapping<Self> {
        EntityMapping::new().field("A", |n: &NoKey| &n.a, |n: &mut NoKey| &mut n.a)
    }
}

#[derive(Debug, Default)]
struct OnlyGenerated {
    id: i64,
}

impl Entity for OnlyGenerated {
    fn mapping() -> EntityMapping<Self> {
        EntityMapping::new().column(
            ColumnMap::new("id", |o: &OnlyGenerated| &o.id, |o: &mut OnlyGenerated| &mut o.id)
                .primary_key()
                .auto_increment(),
        )
    }
}

fn bound_insert(repo: &MappingRepository, row: &Row5) -> Command {
    let map = repo.column_map::<Row5>().unwrap();
    let mut command = Command::new("");
    Binder::new(repo.converters())
        .bind_insert(&mut command, &map, row)
        .unwrap();
    command
}

#[test]
fn test_insert_skips_auto_increment_and_appends_identity() {
    let repo = MappingRepository::new();
    let map = repo.column_map::<Row5>().unwrap();
    let command = bound_insert(&repo, &Row5::default());

    let sql = InsertQuery::new(&PlainIdentityDialect, map.columns(), &command, "Table")
        .generate()
        .unwrap();
    assert_eq!(
        sql,
        "INSERT INTO Table (ColA,ColB,ColC,ColD) VALUES (@ColA,@ColB,@ColC,@ColD);SELECT SCOPE_IDENTITY();"
    );
}

#[test]
fn test_insert_without_identity_clause() {
    let repo = MappingRepository::new();
    let map = repo.column_map::<Row5>().unwrap();
    let command = bound_insert(&repo, &Row5::default());

    let sql = InsertQuery::new(&DefaultDialect, map.columns(), &command, "Table")
        .generate()
        .unwrap();
    assert_eq!(
        sql,
        "INSERT INTO Table (ColA,ColB,ColC,ColD) VALUES (@ColA,@ColB,@ColC,@ColD)"
    );
}

/// Auto-increment key that is not read back after insert.
#[derive(Debug, Default)]
struct Tagged {
    id: i32,
    label: String,
}

impl Entity for Tagged {
    fn mapping() -> EntityMapping<Self> {
        EntityMapping::new()
            .table("Tags")
            .column(
                ColumnMap::new("id", |t: &Tagged| &t.id, |t: &mut Tagged| &mut t.id)
                    .column("ID")
                    .primary_key()
                    .auto_increment(),
            )
            .field("Label", |t: &Tagged| &t.label, |t: &mut Tagged| &mut t.label)
    }
}

#[test]
fn test_insert_without_return_value_column_omits_identity() {
    let repo = MappingRepository::new();
    let map = repo.column_map::<Tagged>().unwrap();
    let mut command = Command::new("");
    Binder::new(repo.converters())
        .bind_insert(&mut command, &map, &Tagged::default())
        .unwrap();

    for dialect in [&SqlServerDialect as &dyn Dialect, &PlainIdentityDialect] {
        assert!(dialect.identity_clause(&["ID"]).is_some());
        let sql = InsertQuery::new(dialect, map.columns(), &command, map.table_name())
            .generate()
            .unwrap();
        assert!(!sql.contains("SCOPE_IDENTITY"), "{sql}");
    }
    let sql = InsertQuery::new(&SqlServerDialect, map.columns(), &command, map.table_name())
        .generate()
        .unwrap();
    assert_eq!(sql, "INSERT INTO [Tags] ([Label]) VALUES (@Label)");
}

#[test]
fn test_insert_ignores_bound_auto_increment_parameter() {
    let repo = MappingRepository::new();
    let map = repo.column_map::<Row5>().unwrap();
    let binder = Binder::new(repo.converters());
    let mut command = Command::new("");
    binder.bind(&mut command, "ID", 9).unwrap().add();
    binder.bind(&mut command, "ColA", "x".to_string()).unwrap().add();

    let sql = InsertQuery::new(&DefaultDialect, map.columns(), &command, "Table")
        .generate()
        .unwrap();
    assert_eq!(sql, "INSERT INTO Table (ColA) VALUES (@ColA)");
}

#[test]
fn test_insert_stops_at_first_unmapped_parameter() {
    let repo = MappingRepository::new();
    let map = repo.column_map::<Row5>().unwrap();
    let binder = Binder::new(repo.converters());
    let mut command = Command::new("");
    binder.bind(&mut command, "ColA", "x".to_string()).unwrap().add();
    binder.bind(&mut command, "ReturnCode", 0).unwrap().output().add();
    binder.bind(&mut command, "ColB", 1).unwrap().add();

    let sql = InsertQuery::new(&DefaultDialect, map.columns(), &command, "Table")
        .generate()
        .unwrap();
    assert_eq!(sql, "INSERT INTO Table (ColA) VALUES (@ColA)");
}

#[test]
fn test_insert_postgres_placeholders_and_returning() {
    let repo = MappingRepository::new();
    let map = repo.column_map::<Row5>().unwrap();
    let command = bound_insert(&repo, &Row5::default());

    let sql = InsertQuery::new(&PostgresDialect, map.columns(), &command, "public.rows")
        .generate()
        .unwrap();
    assert_eq!(
        sql,
        "INSERT INTO \"public\".\"rows\" (\"ColA\",\"ColB\",\"ColC\",\"ColD\") VALUES ($1,$2,$3,$4) RETURNING \"ID\""
    );
}

#[test]
fn test_insert_requires_insertable_columns() {
    let repo = MappingRepository::new();
    let map = repo.column_map::<OnlyGenerated>().unwrap();
    let command = Command::new("");
    let err = InsertQuery::new(&DefaultDialect, map.columns(), &command, "t")
        .generate()
        .unwrap_err();
    assert!(err.is_query_generation());

    let map = repo.column_map::<Row5>().unwrap();
    let err = InsertQuery::new(&DefaultDialect, map.columns(), &command, "t")
        .generate()
        .unwrap_err();
    assert!(err.is_query_generation());
}

#[test]
fn test_update_basic() {
    let repo = MappingRepository::new();
    let map = repo.column_map::<Row5>().unwrap();
    let mut command = Command::new("");
    Binder::new(repo.converters())
        .bind_update(&mut command, &map, &Row5::default())
        .unwrap();
    assert_eq!(command.len(), 5);

    let sql = UpdateQuery::new(&DefaultDialect, map.columns(), &command, "Table")
        .generate()
        .unwrap();
    assert_eq!(
        sql,
        "UPDATE Table SET ColA=@ColA,ColB=@ColB,ColC=@ColC,ColD=@ColD WHERE ID=@ID"
    );
}

#[test]
fn test_update_sqlserver_tokens() {
    let repo = MappingRepository::new();
    let map = repo.column_map::<Row5>().unwrap();
    let mut command = Command::new("");
    Binder::new(repo.converters())
        .bind_update(&mut command, &map, &Row5::default())
        .unwrap();

    let sql = UpdateQuery::new(&SqlServerDialect, map.columns(), &command, "dbo.Table")
        .generate()
        .unwrap();
    assert_eq!(
        sql,
        "UPDATE [dbo].[Table] SET [ColA]=@ColA,[ColB]=@ColB,[ColC]=@ColC,[ColD]=@ColD WHERE [ID]=@ID"
    );
}

#[test]
fn test_update_requires_key_columns() {
    let repo = MappingRepository::new();
    let map = repo.column_map::<NoKey>().unwrap();
    let mut command = Command::new("");
    Binder::new(repo.converters())
        .bind_update(&mut command, &map, &NoKey::default())
        .unwrap();
    let err = UpdateQuery::new(&DefaultDialect, map.columns(), &command, "t")
        .generate()
        .unwrap_err();
    assert!(err.is_query_generation());
}

#[test]
fn test_update_requires_bound_key() {
    let repo = MappingRepository::new();
    let map = repo.column_map::<Row5>().unwrap();
    let mut command = Command::new("");
    Binder::new(repo.converters())
        .bind(&mut command, "ColA", "x".to_string())
        .unwrap()
        .add();
    let err = UpdateQuery::new(&DefaultDialect, map.columns(), &command, "Table")
        .generate()
        .unwrap_err();
    assert!(err.is_query_generation());
}
