use super::*;
use crate::proxy::{CacheMode, Operation};
use crate::stub::{StubEntry, StubSubject};
use serde_json::json;

fn recording() -> Engine {
    let engine = Engine::new();
    engine.set_cache_mode(CacheMode::RecordOnly);
    engine
}

fn replaying() -> Engine {
    let engine = Engine::new();
    engine.set_cache_mode(CacheMode::ReplayOnly);
    engine
}

fn tracker() -> StubSubject {
    let bug = StubSubject::new("bug")
        .with_attr("title", StubEntry::data("crash on start"))
        .with_attr("tags", StubEntry::data(json!(["ui", "p1"])));
    let bugs = StubSubject::new("bugs")
        .with_item(1, StubEntry::object(bug))
        .with_item(2, StubEntry::data("closed"));
    StubSubject::new("lp")
        .with_attr("bugs", StubEntry::object(bugs))
        .with_method("me", vec![StubEntry::data("alice")])
}

#[test]
fn test_round_trip_replays_recorded_tree() {
    let engine = recording();
    let proxy = engine.proxy(tracker());
    let bugs = proxy.get_attr("bugs").unwrap().into_proxy().unwrap();
    let bug = bugs.get_item(1).unwrap().into_proxy().unwrap();
    bug.get_attr("title").unwrap();
    bug.get_attr("tags").unwrap();
    proxy.call_method("me", vec![]).unwrap();

    let document = to_document(&proxy, false).unwrap();
    let ghost = from_document(&replaying(), &document).unwrap();
    assert!(ghost.is_ghost());

    let bugs = ghost.get_attr("bugs").unwrap().into_proxy().unwrap();
    let bug = bugs.get_item(1).unwrap().into_proxy().unwrap();
    assert_eq!(bug.get_attr("title").unwrap().as_str(), Some("crash on start"));
    assert_eq!(
        bug.get_attr("tags").unwrap(),
        Resolved::Data(json!(["ui", "p1"]))
    );
    assert_eq!(ghost.call_method("me", vec![]).unwrap().as_str(), Some("alice"));

    assert!(bugs.get_item(2).unwrap_err().is_not_cached());
}

#[test]
fn test_document_shape() {
    let engine = recording();
    let proxy = engine.proxy(StubSubject::new("lp").with_item(1, StubEntry::data("bug")));
    proxy.get_item(1).unwrap();

    let value: Value = serde_json::from_str(&to_document(&proxy, false).unwrap()).unwrap();
    assert_eq!(
        value,
        json!({"proxy": true, "keys": [["getitem", 1]], "values": ["bug"]})
    );
}

#[test]
fn test_pretty_document_is_equivalent() {
    let engine = recording();
    let proxy = engine.proxy(StubSubject::new("lp").with_item(1, StubEntry::data("bug")));
    proxy.get_item(1).unwrap();

    let compact = to_document(&proxy, false).unwrap();
    let pretty = to_document(&proxy, true).unwrap();
    assert!(pretty.contains('\n'));
    assert_eq!(
        serde_json::from_str::<Value>(&compact).unwrap(),
        serde_json::from_str::<Value>(&pretty).unwrap()
    );
}

#[test]
fn test_failures_survive_round_trip() {
    let engine = recording();
    let proxy = engine.proxy(StubSubject::new("lp"));
    let recorded = proxy.get_item(404).unwrap_err().captured().unwrap().clone();
    recorded.proxy.get_attr("key").unwrap();

    let document = engine.serialize(&proxy).unwrap();
    let ghost = replaying().deserialize(&document).unwrap();

    let replayed = ghost.get_item(404).unwrap_err();
    let replayed = replayed.captured().unwrap();
    assert!(replayed.same_shape(&recorded));
    assert!(replayed.proxy.is_ghost());
    assert_eq!(replayed.proxy.get_attr("key").unwrap().as_i64(), Some(404));
}

#[test]
fn test_iteration_lists_round_trip() {
    let engine = recording();
    let source = StubSubject::new("bugs")
        .with_item(0, StubEntry::object(StubSubject::new("a").with_attr("id", StubEntry::data(7))))
        .with_item(1, StubEntry::data("plain"));
    let proxy = engine.proxy(source);
    let items = proxy.iter().unwrap().into_items().unwrap();
    items[0].as_proxy().unwrap().get_attr("id").unwrap();

    let ghost = replaying().deserialize(&engine.serialize(&proxy).unwrap()).unwrap();
    let items = ghost.iter().unwrap().into_items().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_proxy().unwrap().get_attr("id").unwrap().as_i64(), Some(7));
    assert_eq!(items[1].as_str(), Some("plain"));
}

#[test]
fn test_array_arguments_still_match_after_round_trip() {
    let engine = recording();
    let proxy = engine.proxy(StubSubject::new("set").with_item(json!([1, 2]), StubEntry::data(0)));
    proxy.contains(json!([1, 2])).unwrap();

    let ghost = replaying().deserialize(&engine.serialize(&proxy).unwrap()).unwrap();
    assert_eq!(ghost.contains(json!([1, 2])).unwrap().as_bool(), Some(true));
    assert!(ghost.contains(json!([2, 1])).unwrap_err().is_not_cached());
}

#[test]
fn test_data_with_false_marker_stays_data() {
    let document = json!({
        "proxy": true,
        "keys": [["getattr", "meta"]],
        "values": [{"proxy": false, "keys": "not a snapshot"}]
    })
    .to_string();

    let ghost = from_document(&replaying(), &document).unwrap();
    assert_eq!(
        ghost.get_attr("meta").unwrap(),
        Resolved::Data(json!({"proxy": false, "keys": "not a snapshot"}))
    );
}

#[test]
fn test_empty_proxy_round_trips() {
    let engine = recording();
    let proxy = engine.proxy(StubSubject::new("idle"));
    let ghost = replaying().deserialize(&engine.serialize(&proxy).unwrap()).unwrap();
    assert_eq!(ghost.entry_count(), 0);
}

#[test]
fn test_malformed_documents() {
    let engine = replaying();
    let cases = [
        "[]",
        r#"{"keys": [], "values": []}"#,
        r#"{"proxy": "yes", "keys": [], "values": []}"#,
        r#"{"proxy": true, "values": []}"#,
        r#"{"proxy": true, "keys": {}, "values": []}"#,
        r#"{"proxy": true, "keys": [["len"]], "values": []}"#,
        r#"{"proxy": true, "keys": ["len"], "values": [1]}"#,
        r#"{"proxy": true, "keys": [["frobnicate"]], "values": [1]}"#,
        r#"{"proxy": true, "keys": [["len"]], "values": [{"failure": true, "kind": "E"}]}"#,
    ];
    for case in cases {
        let err = from_document(&engine, case).unwrap_err();
        assert!(matches!(err, CassetteError::Malformed(_)), "{}: {}", case, err);
    }

    let err = from_document(&engine, "{not json").unwrap_err();
    assert!(matches!(err, CassetteError::Serialization(_)));
}

#[test]
fn test_outline_lists_every_entry() {
    let engine = recording();
    let proxy = engine.proxy(tracker());
    let bugs = proxy.get_attr("bugs").unwrap().into_proxy().unwrap();
    bugs.get_item(2).unwrap();
    proxy.get_item(99).unwrap_err();

    let ghost = replaying().deserialize(&engine.serialize(&proxy).unwrap()).unwrap();
    let text = outline(&ghost);

    assert!(text.starts_with("proxy over <ghost> (2 entries)"));
    assert!(text.contains(r#"["getattr","bugs"] => proxy (1 entries)"#));
    assert!(text.contains(r#"["getitem",2] => "closed""#));
    assert!(text.contains(r#"["getitem",99] => raises KeyError: 99"#));
}

#[test]
fn test_is_snapshot_requires_true_marker() {
    assert!(is_snapshot(&json!({"proxy": true})));
    assert!(!is_snapshot(&json!({"proxy": 1})));
    assert!(!is_snapshot(&json!([true])));
    assert_eq!(
        OperationKey::from_value(&json!(["len"])).unwrap().op,
        Operation::Len
    );
}

#[test]
fn test_floats_survive_round_trip_exactly() {
    let tiny = 1.1362275116276523e-8;
    let tinier = 2.2201838057111728e-13;
    let engine = recording();
    let source = StubSubject::new("gauge").with_attr("reading", StubEntry::data(tinier));
    let proxy = engine.proxy(source);
    proxy.contains(tiny).unwrap();
    proxy.get_attr("reading").unwrap();

    let ghost = replaying().deserialize(&engine.serialize(&proxy).unwrap()).unwrap();
    assert_eq!(ghost.contains(tiny).unwrap().as_bool(), Some(false));
    assert_eq!(
        ghost.get_attr("reading").unwrap(),
        Resolved::Data(json!(tinier))
    );
}

#[test]
fn test_marker_shaped_data_round_trips() {
    let lookalikes = [
        json!({"proxy": true, "owner": "x"}),
        json!({"failure": true, "kind": "E"}),
        json!({"data": 1}),
        json!({"data": {"proxy": true}}),
    ];
    let engine = recording();
    let source = lookalikes
        .iter()
        .enumerate()
        .fold(StubSubject::new("meta"), |stub, (index, value)| {
            stub.with_attr(format!("attr{}", index), StubEntry::data(value.clone()))
        })
        .with_attr("rows", StubEntry::data(json!([{"proxy": true}, 2])))
        .with_item(0, StubEntry::object(StubSubject::new("row")))
        .with_item(1, StubEntry::data(json!({"failure": true})));
    let proxy = engine.proxy(source);
    for index in 0..lookalikes.len() {
        proxy.get_attr(&format!("attr{}", index)).unwrap();
    }
    proxy.get_attr("rows").unwrap();
    proxy.iter().unwrap();

    let document = engine.serialize(&proxy).unwrap();
    let value: Value = serde_json::from_str(&document).unwrap();
    assert_eq!(
        value["values"][0],
        json!({"data": {"proxy": true, "owner": "x"}})
    );

    let ghost = replaying().deserialize(&document).unwrap();
    for (index, expected) in lookalikes.iter().enumerate() {
        assert_eq!(
            ghost.get_attr(&format!("attr{}", index)).unwrap(),
            Resolved::Data(expected.clone())
        );
    }
    assert_eq!(
        ghost.get_attr("rows").unwrap(),
        Resolved::Data(json!([{"proxy": true}, 2]))
    );
    let items = ghost.iter().unwrap().into_items().unwrap();
    assert!(items[0].as_proxy().is_some());
    assert_eq!(items[1], Resolved::Data(json!({"failure": true})));
}
