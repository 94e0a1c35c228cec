mod fixtures;

use std::sync::Arc;

use fixtures::*;
use proptest::prelude::*;
use sqlrecord::prelude::*;

fn snapshotted_robot(f: &Fixture, name: &str, year: i32) -> Record {
    let row = data(&[
        ("id", Value::Int(1)),
        ("type", Value::from("mechanical")),
        ("name", Value::from(name)),
        ("year", Value::Int(year)),
    ]);
    Record::hydrate(
        robots_model(),
        Arc::clone(&f.di),
        row,
        DirtyState::Persistent,
        true,
    )
    .unwrap()
}

proptest! {
    #[test]
    fn unchanged_record_with_dynamic_update_writes_nothing(
        name in "[A-Za-z ]{1,20}",
        year in 1900i32..2100,
    ) {
        let f = Fixture::new();
        let mut robot = snapshotted_robot(&f, &name, year);
        robot.use_dynamic_update(true);

        prop_assert!(robot.save().unwrap().is_success());
        prop_assert!(robot.update().unwrap().is_success());
        prop_assert!(f.connection.calls().is_empty());
    }
}

#[test]
fn dynamic_update_writes_only_changed_columns() {
    let f = Fixture::new();
    let mut robot = snapshotted_robot(&f, "Astro Boy", 1952);
    robot.use_dynamic_update(true);
    robot.write_attribute("name", "Astro Boy II");
    robot.write_attribute("year", Value::BigInt(1952));

    assert!(robot.save().unwrap().is_success());

    let updates = f.connection.updates();
    assert_eq!(updates.len(), 1);
    let Call::Update { fields, values, .. } = &updates[0] else {
        unreachable!()
    };
    assert_eq!(fields, &["name"]);
    assert_eq!(values, &[Value::from("Astro Boy II")]);
}

#[test]
fn without_dynamic_update_every_column_is_written() {
    let f = Fixture::new();
    let mut robot = snapshotted_robot(&f, "Astro Boy", 1952);

    assert!(robot.save().unwrap().is_success());

    let Call::Update { fields, .. } = &f.connection.updates()[0] else {
        unreachable!()
    };
    assert_eq!(fields, &["type", "name", "year"]);
}

#[test]
fn change_detection_compares_loosely() {
    let f = Fixture::new();
    let mut robot = snapshotted_robot(&f, "Astro Boy", 1952);
    robot.write_attribute("year", "1952");
    robot.write_attribute("name", "Astro Girl");

    assert!(robot.has_changed(None).unwrap());
    assert!(robot.has_changed(Some("name")).unwrap());
    assert!(!robot.has_changed(Some("year")).unwrap());
    assert_eq!(robot.changed_fields().unwrap(), ["name"]);
}

#[test]
fn saving_refreshes_a_kept_snapshot() {
    let f = Fixture::new();
    let mut robot = snapshotted_robot(&f, "Astro Boy", 1952);
    robot.keep_snapshots(true);
    robot.write_attribute("name", "Astro Boy II");
    assert!(robot.has_changed(None).unwrap());

    assert!(robot.save().unwrap().is_success());

    assert!(!robot.has_changed(None).unwrap());
    assert_eq!(
        robot.snapshot_data().unwrap().get("name"),
        Some(&Value::from("Astro Boy II"))
    );
}

#[test]
fn change_checks_need_a_persisted_snapshot() {
    let f = Fixture::new();
    let robot = f.stored_robot(1);
    let err = robot.has_changed(None).unwrap_err();
    assert_eq!(err.to_string(), "the record doesn't have a valid data snapshot");

    let mut robot = snapshotted_robot(&f, "Astro Boy", 1952);
    robot.set_dirty_state(DirtyState::Transient);
    assert_eq!(robot.changed_fields().unwrap_err().kind(), ErrorKind::State);
}

#[test]
fn unknown_and_missing_fields_are_invalid_arguments() {
    let f = Fixture::new();
    let mut robot = f.stored_robot(1);
    robot
        .set_snapshot_data(
            &data(&[("id", Value::Int(1)), ("name", Value::from("Astro Boy"))]),
            None,
        )
        .unwrap();

    let err = robot.has_changed(Some("colour")).unwrap_err();
    assert!(
        matches!(err, Error::InvalidArgument(ref m) if m.contains("is not part of the model"))
    );

    let err = robot.has_changed(Some("year")).unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidArgument(ref m) if m.contains("was not found in the snapshot")
    ));

    robot.unset_attribute("name");
    let err = robot.has_changed(Some("name")).unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidArgument(ref m) if m.contains("is not defined on the record")
    ));

    // The full scan treats a side missing as a change instead.
    assert_eq!(robot.changed_fields().unwrap(), ["type", "name", "year"]);
}

#[test]
fn snapshot_keys_go_through_the_column_map() {
    let f = Fixture::new();
    let mut robot = f.stored_robot(1);
    let map: ColumnMap = [("robot_name", "name"), ("id", "id")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    robot
        .set_snapshot_data(&data(&[("robot_name", Value::from("Astro Boy"))]), Some(&map))
        .unwrap();
    assert_eq!(
        robot.snapshot_data().unwrap().get("name"),
        Some(&Value::from("Astro Boy"))
    );

    let err = robot
        .set_snapshot_data(&data(&[("year", Value::Int(1952))]), Some(&map))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidColumnMap { ref column, .. } if column == "year"));
}
