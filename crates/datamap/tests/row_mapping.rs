//! Flat row materialization and converter behavior.

use chrono::NaiveDate;
use datamap::{
    BoolCharConverter, BoolIntConverter, DbValue, Entity, MappingRepository, MemoryCursor,
    RowMapper, find, find_into, row,
};
use rust_decimal::Decimal;

#[derive(Debug, Default, Clone, PartialEq, Entity)]
#[orm(table = "People", rename_all = "PascalCase")]
struct Person {
    #[orm(id, auto_increment, return_value, column = "ID")]
    id: i32,
    name: String,
    age: i32,
    #[orm(converter = "datamap::BoolIntConverter")]
    is_happy: bool,
    salary: Decimal,
    birth_date: NaiveDate,
    #[orm(skip)]
    visits: u32,
}

fn person_cursor() -> MemoryCursor {
    MemoryCursor::new(["ID", "Name", "Age", "IsHappy", "Salary", "BirthDate"])
}

#[test]
fn single_row_coerces_every_column() {
    let repo = MappingRepository::new();
    let cursor = person_cursor().row(row![
        DbValue::I64(1),
        "Jordan",
        "27",
        1,
        45250.75,
        "1998-04-12",
    ]);

    let person: Person = find(&repo, cursor).unwrap().unwrap();

    assert_eq!(person.id, 1);
    assert_eq!(person.name, "Jordan");
    assert_eq!(person.age, 27);
    assert!(person.is_happy);
    assert_eq!(person.salary, Decimal::new(4525075, 2));
    assert_eq!(person.birth_date, NaiveDate::from_ymd_opt(1998, 4, 12).unwrap());
    assert_eq!(person.visits, 0);
}

#[test]
fn find_on_empty_result_is_none() {
    let repo = MappingRepository::new();
    let person: Option<Person> = find(&repo, person_cursor()).unwrap();
    assert!(person.is_none());
}

#[test]
fn find_into_without_rows_leaves_instance_unchanged() {
    let repo = MappingRepository::new();
    let mut person = Person {
        id: 5,
        name: "Kept".into(),
        ..Default::default()
    };
    let before = person.clone();

    let loaded = find_into(&repo, person_cursor(), &mut person).unwrap();

    assert!(!loaded);
    assert_eq!(person, before);
}

#[test]
fn find_into_only_touches_columns_in_the_result() {
    let repo = MappingRepository::new();
    let mut person = Person {
        id: 5,
        age: 40,
        ..Default::default()
    };
    let cursor = MemoryCursor::new(["name"]).row(row!["Renamed"]);

    assert!(find_into(&repo, cursor, &mut person).unwrap());
    assert_eq!(person.name, "Renamed");
    assert_eq!(person.id, 5);
    assert_eq!(person.age, 40);
}

#[test]
fn unconvertible_value_names_the_column() {
    let repo = MappingRepository::new();
    let cursor = person_cursor().row(row![1, "Jordan", "not a number"]);
    let err = find::<Person, _>(&repo, cursor).unwrap_err();
    assert!(err.is_conversion());
    assert!(err.to_string().contains("Age"), "{err}");
}

#[derive(Debug, Default, Entity)]
struct Flag {
    #[orm(id, column = "ID")]
    id: i32,
    #[orm(column = "Active", alt_name = "IsActive")]
    active: bool,
}

#[test]
fn registry_converter_applies_to_every_column_of_its_type() {
    let repo = MappingRepository::new();
    repo.register_converter::<bool>(BoolCharConverter::default());
    let cursor = MemoryCursor::new(["ID", "Active"])
        .row(row![1, "Y"])
        .row(row![2, "N"]);

    let flags: Vec<Flag> = datamap::row::query(&repo, cursor).unwrap();
    assert!(flags[0].active);
    assert!(!flags[1].active);
}

#[test]
fn alternate_name_wins_over_column_name() {
    let repo = MappingRepository::new();
    let cursor = MemoryCursor::new(["ID", "Active", "IsActive"]).row(row![1, false, true]);
    let flag: Flag = find(&repo, cursor).unwrap().unwrap();
    assert!(flag.active);
}

#[test]
fn row_mapper_is_reusable_across_rows() {
    let repo = MappingRepository::new();
    repo.register_converter::<bool>(BoolIntConverter);
    let map = repo.column_map::<Flag>().unwrap();
    let mut mapper = RowMapper::new(&map, repo.converters());

    let mut cursor = MemoryCursor::new(["ID", "Active"])
        .row(row![1, 1])
        .row(row![2, 0]);
    let mut flags = Vec::new();
    while datamap::ResultCursor::advance(&mut cursor).unwrap() {
        flags.push(mapper.map_row(&cursor).unwrap());
    }

    assert_eq!(flags.len(), 2);
    assert_eq!(flags[1].id, 2);
    assert!(flags[0].active && !flags[1].active);
}
