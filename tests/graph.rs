mod support;

use jsonapi_store::{server_response, server_response_all, FindOptions, JsonapiOptions};
use serde_json::{json, Value};
use support::{todo_store, MockTransport};

#[test]
fn collections_sync_their_inverse_links() {
    let store = todo_store();
    let todo = store.add("todos", json!({"title": "Plan"})).unwrap();
    let first = store.add("notes", json!({"body": "alpha"})).unwrap();
    let second = store.add("notes", json!({"body": "beta"})).unwrap();

    let notes = todo.to_many("notes").unwrap();
    notes.add(&first).unwrap();
    notes.add(&second).unwrap();
    assert_eq!(notes.len().unwrap(), 2);
    assert_eq!(first.to_one("todo").unwrap().unwrap(), todo);
    assert_eq!(second.to_one("todo").unwrap().unwrap(), todo);

    notes.remove(&first).unwrap();
    assert_eq!(notes.len().unwrap(), 1);
    assert!(first.to_one("todo").unwrap().is_none());
    assert_eq!(second.to_one("todo").unwrap().unwrap(), todo);
}

#[test]
fn reassigning_a_to_one_moves_the_membership() {
    let store = todo_store();
    let todo_a = store.add("todos", json!({"title": "A"})).unwrap();
    let todo_b = store.add("todos", json!({"title": "B"})).unwrap();
    let note = store.add("notes", json!({"body": "moving"})).unwrap();

    note.set_to_one("todo", Some(&todo_a)).unwrap();
    assert!(todo_a.to_many("notes").unwrap().contains(&note).unwrap());

    note.set_to_one("todo", Some(&todo_b)).unwrap();
    assert!(!todo_a.to_many("notes").unwrap().contains(&note).unwrap());
    assert!(todo_b.to_many("notes").unwrap().contains(&note).unwrap());

    note.set_to_one("todo", None).unwrap();
    assert!(!todo_b.to_many("notes").unwrap().contains(&note).unwrap());
}

#[test]
fn encoding_a_cycle_emits_each_resource_once() {
    let store = todo_store();
    let todo = store
        .create_records_from_data(&[
            json!({"type": "todos", "id": "1", "attributes": {"title": "Cycle"}}),
        ])
        .unwrap()
        .remove(0);
    let note = store
        .create_records_from_data(&[
            json!({"type": "notes", "id": "9", "attributes": {"body": "loop"}}),
        ])
        .unwrap()
        .remove(0);
    todo.to_many("notes").unwrap().add(&note).unwrap();

    let payload = server_response(&todo).unwrap();
    let document: Value = serde_json::from_str(&payload).unwrap();
    assert_eq!(document["data"]["id"], json!("1"));
    assert_eq!(
        document["data"]["relationships"]["notes"]["data"][0]["id"],
        json!("9")
    );
    let included = document["included"].as_array().unwrap();
    assert_eq!(included.len(), 1);
    assert_eq!(included[0]["id"], json!("9"));
    // the note's back-reference is present but not re-included
    assert_eq!(
        included[0]["relationships"]["todo"]["data"]["id"],
        json!("1")
    );
}

#[test]
fn sibling_primaries_never_duplicate_into_included() {
    let store = todo_store();
    let records = store
        .create_records_from_data(&[
            json!({"type": "todos", "id": "1", "attributes": {"title": "One"}}),
            json!({"type": "todos", "id": "2", "attributes": {"title": "Two"}}),
        ])
        .unwrap();

    let payload = server_response_all(&records).unwrap();
    let document: Value = serde_json::from_str(&payload).unwrap();
    assert_eq!(document["data"].as_array().unwrap().len(), 2);
    assert!(document["included"].as_array().unwrap().is_empty());

    let empty = server_response_all(&[]).unwrap();
    assert_eq!(empty, r#"{"data":[]}"#);
}

#[test]
fn encoding_then_decoding_round_trips_attributes() {
    let store = todo_store();
    let todo = store
        .create_records_from_data(&[json!({
            "type": "todos",
            "id": "5",
            "attributes": {"title": "Water plants", "created_at": "2024-01-01T10:00:00Z"}
        })])
        .unwrap()
        .remove(0);

    let document = todo.jsonapi(&JsonapiOptions::default()).unwrap();

    let twin_store = todo_store();
    let twin = twin_store
        .create_records_from_data(&[document["data"].clone()])
        .unwrap()
        .remove(0);

    assert_eq!(twin.id().unwrap(), "5");
    assert_eq!(twin.attributes().unwrap(), todo.attributes().unwrap());
}

#[cfg(feature = "emitter")]
#[test]
fn listeners_observe_the_lifecycle() {
    use jsonapi_store::ChangeKind;
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    let store = todo_store();
    let heard = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&heard);
    store
        .on_change(move |event| sink.lock().unwrap().push(event))
        .unwrap();

    let todo = store.add("todos", json!({"title": "Watch me"})).unwrap();
    todo.set_attribute("title", json!("Watched")).unwrap();
    let note = store.add("notes", json!({})).unwrap();
    todo.to_many("notes").unwrap().add(&note).unwrap();

    // listener callbacks run on a separate thread, give them time
    thread::sleep(Duration::from_millis(50));
    let events = heard.lock().unwrap();
    assert!(events
        .iter()
        .any(|e| e.kind == ChangeKind::Record && e.type_name == "todos"));
    assert!(events
        .iter()
        .any(|e| e.kind == ChangeKind::Attribute && e.property.as_deref() == Some("title")));
    assert!(events
        .iter()
        .any(|e| e.kind == ChangeKind::Relationship && e.property.as_deref() == Some("notes")));
    // the inverse write on the note is reported as well
    assert!(events
        .iter()
        .any(|e| e.kind == ChangeKind::Relationship && e.property.as_deref() == Some("todo")));
}

#[tokio::test]
async fn unknown_resource_types_in_payloads_are_skipped() {
    let transport = MockTransport::new();
    let store = todo_store().with_transport(transport.clone());

    transport.push_response(
        200,
        Some(json!({
            "data": {"type": "todos", "id": "1", "attributes": {"title": "Known"}},
            "included": [
                {"type": "watchers", "id": "3", "attributes": {"name": "cat"}},
                {"type": "notes", "id": "9", "attributes": {"body": "kept"}}
            ]
        })),
    );
    let todo = store
        .find_one("todos", "1", FindOptions::default())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(todo.attribute("title").unwrap(), Some(json!("Known")));
    assert!(store.get_one("notes", "9").unwrap().is_some());
    assert!(store.get_one("watchers", "3").unwrap().is_none());
    assert_eq!(transport.calls().len(), 1);
}

#[test]
fn rollback_restores_attributes_and_membership() {
    let store = todo_store();
    let todo = store
        .create_records_from_data(&[json!({
            "type": "todos",
            "id": "1",
            "attributes": {"title": "Stable"},
            "relationships": {"notes": {"data": [{"type": "notes", "id": "9"}]}}
        })])
        .unwrap()
        .remove(0);
    store
        .create_records_from_data(&[
            json!({"type": "notes", "id": "9", "attributes": {"body": "anchor"}}),
        ])
        .unwrap();
    assert!(!todo.is_dirty().unwrap());

    todo.set_attribute("title", json!("Edited")).unwrap();
    let note = store.get_one("notes", "9").unwrap().unwrap();
    todo.to_many("notes").unwrap().remove(&note).unwrap();
    assert!(todo.is_dirty().unwrap());
    assert!(todo.to_many("notes").unwrap().is_empty().unwrap());

    todo.rollback().unwrap();
    assert!(!todo.is_dirty().unwrap());
    assert_eq!(todo.attribute("title").unwrap(), Some(json!("Stable")));
    assert_eq!(todo.to_many("notes").unwrap().len().unwrap(), 1);
}

#[test]
fn meta_only_relationship_entries_leave_state_alone() {
    let store = todo_store();
    store
        .create_records_from_data(&[json!({
            "type": "todos",
            "id": "1",
            "attributes": {"title": "Meta"},
            "relationships": {"notes": {"data": [{"type": "notes", "id": "9"}]}}
        })])
        .unwrap();

    // a later payload carrying only meta on the relationship keeps the linkage
    store
        .create_records_from_data(&[json!({
            "type": "todos",
            "id": "1",
            "relationships": {"notes": {"meta": {"count": 1}}}
        })])
        .unwrap();

    let todo = store.get_one("todos", "1").unwrap().unwrap();
    let identifiers = todo.to_many("notes").unwrap().identifiers().unwrap();
    assert_eq!(identifiers.len(), 1);
    assert_eq!(identifiers[0].id, "9");
}

#[test]
fn explicit_null_clears_a_to_one() {
    let store = todo_store();
    store
        .create_records_from_data(&[json!({
            "type": "notes",
            "id": "9",
            "attributes": {"body": "attached"},
            "relationships": {"todo": {"data": {"type": "todos", "id": "1"}}}
        })])
        .unwrap();
    let note = store.get_one("notes", "9").unwrap().unwrap();
    assert!(note.to_one_identifier("todo").unwrap().is_some());

    store
        .create_records_from_data(&[json!({
            "type": "notes",
            "id": "9",
            "relationships": {"todo": {"data": null}}
        })])
        .unwrap();
    assert!(note.to_one_identifier("todo").unwrap().is_none());
}
