mod fixtures;

use std::sync::Arc;

use fixtures::*;
use sqlrecord::prelude::*;

fn shout(record: &mut Record, value: Value) {
    let text = value.as_str().unwrap_or_default().to_uppercase();
    record.write_attribute("name", text);
}

#[test]
fn create_inserts_identity_last_and_reads_back_generated_id() {
    let f = Fixture::new();
    let mut robot = f.robot("mechanical", "Astro Boy", 1952);

    assert_eq!(robot.create().unwrap(), Status::Success);

    let calls = f.connection.calls();
    assert_eq!(calls.len(), 2, "no existence query for a blank key: {calls:?}");
    let Call::Insert {
        table,
        fields,
        values,
        types,
    } = &calls[0]
    else {
        panic!("expected an insert, got {:?}", calls[0]);
    };
    assert_eq!(table, "robots");
    assert_eq!(fields, &["type", "name", "year", "id"]);
    assert_eq!(values[3], Value::Null);
    assert_eq!(types[3], BindType::Skip);
    assert_eq!(calls[1], Call::LastInsertId(None));

    assert_eq!(robot.read_attribute("id"), Some(&Value::BigInt(1)));
    assert_eq!(robot.operation_made(), Operation::Create);
    assert_eq!(robot.operation_made().code(), 1);
    assert_eq!(robot.dirty_state(), DirtyState::Persistent);
    assert!(robot.messages().is_empty());
}

#[test]
fn explicit_identity_is_inserted_without_reading_it_back() {
    let f = Fixture::new();
    let mut robot = f.robot("droid", "R2-D2", 1977);
    robot.write_attribute("id", 42);

    assert!(robot.save().unwrap().is_success());

    let inserts = f.connection.inserts();
    let Call::Insert { values, types, .. } = &inserts[0] else {
        unreachable!()
    };
    assert_eq!(values[3], Value::Int(42));
    assert_eq!(types[3], BindType::Int);
    assert_eq!(
        f.connection
            .count_calls(|c| matches!(c, Call::LastInsertId(_))),
        0
    );
    assert_eq!(f.connection.queries().len(), 1);
}

#[test]
fn zero_identity_is_left_to_the_backend() {
    for zero in [Value::Int(0), Value::from("0")] {
        let f = Fixture::new();
        let mut robot = f.robot("droid", "R2-D2", 1977);
        robot.write_attribute("id", zero);

        assert!(robot.create().unwrap().is_success());

        let calls = f.connection.calls();
        assert_eq!(calls.len(), 2, "no existence query for an empty key: {calls:?}");
        let Call::Insert { values, types, .. } = &calls[0] else {
            panic!("expected an insert, got {:?}", calls[0]);
        };
        assert_eq!(values[3], Value::Null);
        assert_eq!(types[3], BindType::Skip);
        assert_eq!(calls[1], Call::LastInsertId(None));
        assert_eq!(robot.read_attribute("id"), Some(&Value::BigInt(1)));
    }
}

#[test]
fn zero_is_missing_for_a_required_text_column() {
    let f = Fixture::new();
    let mut robot = f.robot("droid", "0", 0);

    assert!(robot.save().unwrap().is_failed());

    let texts: Vec<&str> = robot.messages().iter().map(Message::text).collect();
    assert_eq!(texts, ["name is required"]);
    assert!(f.connection.inserts().is_empty());
}

#[test]
fn create_on_existing_record_fails_with_message() {
    let f = Fixture::new();
    let mut robot = f.stored_robot(5);

    assert_eq!(robot.create().unwrap(), Status::Failed);

    let messages = robot.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].message_kind(), &MessageKind::InvalidCreateAttempt);
    assert_eq!(
        messages[0].text(),
        "Record cannot be created because it already exists"
    );
    assert!(f.connection.calls().is_empty());
}

#[test]
fn update_on_missing_record_fails_with_message() {
    let f = Fixture::new();
    let mut robot = f.robot("mechanical", "Astro Boy", 1952);
    robot.write_attribute("id", 10);

    assert!(robot.update().unwrap().is_failed());

    assert_eq!(
        robot.messages()[0].message_kind(),
        &MessageKind::InvalidUpdateAttempt
    );
    assert_eq!(
        f.connection.calls(),
        vec![Call::Fetch {
            sql: "SELECT COUNT(*) AS rowcount FROM \"robots\" WHERE \"id\" = ?".to_string(),
            params: vec![Value::Int(10)],
            types: vec![BindType::Int],
        }]
    );
    assert!(f.connection.inserts().is_empty());
}

#[test]
fn update_writes_non_key_columns_through_the_identity_condition() {
    let f = Fixture::new();
    f.connection.set_count("\"robots\"", 1);
    let mut robot = f.robot("mechanical", "Astro Boy", 1952);
    robot.write_attribute("id", 10);

    assert!(robot.update().unwrap().is_success());

    assert_eq!(robot.operation_made(), Operation::Update);
    assert_eq!(robot.dirty_state(), DirtyState::Persistent);
    let updates = f.connection.updates();
    assert_eq!(updates.len(), 1);
    let Call::Update {
        fields, conditions, ..
    } = &updates[0]
    else {
        unreachable!()
    };
    assert_eq!(fields, &["type", "name", "year"]);
    assert_eq!(conditions.sql, "\"id\" = ?");
    assert_eq!(conditions.params, vec![Value::Int(10)]);
    // One COUNT from update(); save() trusts the persistent state.
    assert_eq!(f.connection.queries().len(), 1);
}

#[test]
fn missing_required_attribute_fails_before_writing() {
    let f = Fixture::new();
    let events = f.record_events();
    let mut robot = f.record(robots_model());
    robot.write_attribute("type", "mechanical");
    robot.write_attribute("year", 1952);

    assert!(robot.save().unwrap().is_failed());

    let messages = robot.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].text(), "name is required");
    assert_eq!(messages[0].first_field(), Some("name"));
    assert_eq!(messages[0].message_kind(), &MessageKind::PresenceOf);
    assert!(f.connection.inserts().is_empty());
    assert_eq!(
        *events.lock().unwrap(),
        vec![
            ModelEvent::BeforeValidation,
            ModelEvent::BeforeValidationOnCreate,
            ModelEvent::OnValidationFails,
            ModelEvent::NotSaved,
        ]
    );
}

#[test]
fn non_numeric_value_in_numeric_column_counts_as_missing() {
    let f = Fixture::new();
    let mut robot = f.robot("mechanical", "Astro Boy", 1952);
    robot.write_attribute("year", "unknown");

    assert!(robot.save().unwrap().is_failed());
    assert_eq!(robot.messages()[0].text(), "year is required");
}

#[test]
fn identity_is_only_exempt_from_not_null_while_creating() {
    let f = Fixture::new();
    let mut robot = f.stored_robot(5);
    assert!(robot.exists().unwrap());

    robot.write_attribute("id", Value::Null);
    assert!(robot.save().unwrap().is_failed());

    assert_eq!(robot.operation_made(), Operation::Update);
    let messages = robot.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].text(), "id is required");
    assert_eq!(messages[0].message_kind(), &MessageKind::PresenceOf);
    assert!(f.connection.updates().is_empty());
}

#[test]
fn disabled_not_null_validation_lets_blank_columns_through() {
    let f = Fixture::with_config(OrmConfig::default().not_null_validations(false));
    let mut robot = f.record(robots_model());
    robot.write_attribute("type", "virtual");

    assert!(robot.save().unwrap().is_success());

    let Call::Insert { values, types, .. } = &f.connection.inserts()[0] else {
        unreachable!()
    };
    assert_eq!(values[1], Value::Null);
    assert_eq!(types[1], BindType::Skip);
}

#[test]
fn save_with_honours_whitelist_and_setters() {
    let f = Fixture::new();
    let model = TestModel::new("Robots").setter("name", shout).shared();
    let mut robot = f.record(model);
    robot.write_attribute("type", "droid");

    let input = data(&[
        ("type", Value::from("virtual")),
        ("name", Value::from("r2-d2")),
        ("year", Value::Int(1977)),
        ("owner", Value::from("Luke")),
    ]);
    assert!(robot.save_with(&input, Some(&["name", "year"])).unwrap().is_success());

    assert_eq!(robot.read_attribute("type"), Some(&Value::from("droid")));
    assert_eq!(robot.read_attribute("name"), Some(&Value::from("R2-D2")));
    assert_eq!(robot.read_attribute("year"), Some(&Value::Int(1977)));
    assert!(robot.read_attribute("owner").is_none());
}

#[test]
fn sequence_backends_read_the_identity_from_the_model_sequence() {
    let f = Fixture::build(OrmConfig::default(), MockConnection::with_sequences());
    let mut robot = f.robot("mechanical", "Astro Boy", 1952);
    assert!(robot.save().unwrap().is_success());
    assert_eq!(
        f.connection.calls().last(),
        Some(&Call::LastInsertId(Some("robots_id_seq".to_string())))
    );
}

#[test]
fn custom_sequence_name_wins() {
    let f = Fixture::build(OrmConfig::default(), MockConnection::with_sequences());
    let mut robot = f.record(TestModel::new("Robots").sequence("robot_ids").shared());
    robot.write_attribute("type", "droid");
    robot.write_attribute("name", "C-3PO");
    robot.write_attribute("year", 1977);
    assert!(robot.save().unwrap().is_success());
    assert_eq!(
        f.connection.calls().last(),
        Some(&Call::LastInsertId(Some("robot_ids".to_string())))
    );
}

#[test]
fn failed_insert_reports_not_saved() {
    let f = Fixture::new();
    f.connection.fail_inserts_into("robots");
    let events = f.record_events();
    let mut robot = f.robot("mechanical", "Astro Boy", 1952);

    assert!(robot.save().unwrap().is_failed());

    assert_eq!(robot.dirty_state(), DirtyState::Transient);
    assert!(robot.read_attribute("id").is_none());
    let events = events.lock().unwrap();
    assert_eq!(
        events[events.len() - 2..],
        [ModelEvent::NotSave, ModelEvent::NotSaved]
    );
}

#[test]
fn skipped_attributes_stay_out_of_inserts() {
    let f = Fixture::new();
    let robot = f.record(robots_model());
    robot.skip_attributes_on_create(&["year"]).unwrap();

    let mut robot = f.robot("mechanical", "Astro Boy", 1952);
    assert!(robot.save().unwrap().is_success());

    let Call::Insert { fields, .. } = &f.connection.inserts()[0] else {
        unreachable!()
    };
    assert_eq!(fields, &["type", "name", "id"]);
}

#[test]
fn unregistered_connection_service_is_fatal() {
    let f = Fixture::new();
    let mut robot = f.robot("mechanical", "Astro Boy", 1952);
    robot.set_read_connection_service("replica");

    let err = robot.save().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(f.connection.calls().is_empty());
}

#[test]
fn attached_transaction_receives_every_write() {
    let f = Fixture::new();
    let attached = Arc::new(MockConnection::new());
    let mut robot = f.robot("mechanical", "Astro Boy", 1952);
    robot.set_transaction(Arc::clone(&attached) as Arc<dyn Connection>);

    assert!(robot.save().unwrap().is_success());
    assert_eq!(attached.inserts().len(), 1);
    assert_eq!(attached.count_calls(|c| matches!(c, Call::LastInsertId(_))), 1);

    robot.write_attribute("year", 1953);
    assert!(robot.save().unwrap().is_success());
    assert_eq!(attached.updates().len(), 1);

    assert!(robot.delete().unwrap().is_success());
    assert_eq!(attached.deletes().len(), 1);

    assert!(f.connection.inserts().is_empty());
    assert!(f.connection.updates().is_empty());
    assert!(f.connection.deletes().is_empty());
}

#[test]
fn cleared_transaction_falls_back_to_the_write_service() {
    let f = Fixture::new();
    let attached = Arc::new(MockConnection::new());
    let mut robot = f.robot("mechanical", "Astro Boy", 1952);
    robot.set_transaction(attached);
    assert!(robot.transaction().is_some());

    assert!(robot.clear_transaction().is_some());
    assert!(robot.save().unwrap().is_success());

    assert_eq!(f.connection.inserts().len(), 1);
}

#[test]
fn schema_and_source_qualify_the_table() {
    let f = Fixture::new();
    let mut robot = f.robot("mechanical", "Astro Boy", 1952);
    robot.set_source("le_robots");
    robot.set_schema("store");
    robot.write_attribute("id", 3);

    assert!(robot.exists().is_ok());
    assert_eq!(
        f.connection.queries(),
        ["SELECT COUNT(*) AS rowcount FROM \"store\".\"le_robots\" WHERE \"id\" = ?"]
    );
}
