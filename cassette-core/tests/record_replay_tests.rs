//! End-to-end record/replay tests

use cassette_core::prelude::*;
use cassette_core::snapshot;
use cassette_core::stub::{StubEntry, StubSubject};
use serde_json::json;
use tempfile::TempDir;

fn tracker_document() -> serde_json::Value {
    json!({
        "name": "launchpad",
        "bugs": [
            {"id": 1, "title": "crash on start", "tags": ["ui"]},
            {"id": 2, "title": "slow search", "tags": []}
        ]
    })
}

#[test]
fn test_record_to_file_and_replay_offline() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("tracker.json");

    let recorder = Engine::new();
    recorder.set_cache_mode(CacheMode::RecordOnly);
    let live = recorder.proxy(JsonSubject::new(tracker_document()));

    let bugs = live.get_attr("bugs").unwrap().into_proxy().unwrap();
    let titles: Vec<String> = bugs
        .iter()
        .unwrap()
        .into_items()
        .unwrap()
        .into_iter()
        .map(|bug| {
            let bug = bug.into_proxy().unwrap();
            bug.get_attr("title").unwrap().as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(titles, vec!["crash on start", "slow search"]);
    assert_eq!(bugs.len().unwrap().as_i64(), Some(2));

    std::fs::write(&path, recorder.serialize(&live).unwrap()).unwrap();

    let replayer = Engine::new();
    replayer.set_cache_mode(CacheMode::ReplayOnly);
    let document = std::fs::read_to_string(&path).unwrap();
    let ghost = replayer.deserialize(&document).unwrap();

    let bugs = ghost.get_attr("bugs").unwrap().into_proxy().unwrap();
    assert_eq!(bugs.len().unwrap().as_i64(), Some(2));
    let items = bugs.iter().unwrap().into_items().unwrap();
    let second = items[1].as_proxy().unwrap();
    assert_eq!(second.get_attr("title").unwrap().as_str(), Some("slow search"));

    let err = second.get_attr("id").unwrap_err();
    assert!(err.is_not_cached());
    assert!(ghost.get_attr("name").unwrap_err().is_not_cached());
}

#[test]
fn test_record_and_reuse_shields_from_subject_changes() {
    let engine = Engine::new();
    engine.set_cache_mode(CacheMode::RecordAndReuse);
    let subject = JsonSubject::new(json!({"count": 1}));
    let proxy = engine.proxy(subject.clone());

    assert_eq!(proxy.get_item("count").unwrap().as_i64(), Some(1));
    proxy.set_item("count", 2).unwrap();
    assert_eq!(proxy.get_item("count").unwrap().as_i64(), Some(1));
    assert_eq!(subject.value(), Some(json!({"count": 2})));

    engine.set_cache_mode(CacheMode::RecordOnly);
    assert_eq!(proxy.get_item("count").unwrap().as_i64(), Some(2));
    engine.set_cache_mode(CacheMode::ReplayOnly);
    assert_eq!(proxy.get_item("count").unwrap().as_i64(), Some(2));
}

#[test]
fn test_record_and_reuse_first_read_after_write_sees_the_write() {
    let engine = Engine::new();
    engine.set_cache_mode(CacheMode::RecordAndReuse);
    let subject = JsonSubject::new(json!({"count": 1}));
    let proxy = engine.proxy(subject.clone());

    proxy.set_item("fresh", 5).unwrap();
    assert_eq!(proxy.get_item("fresh").unwrap().as_i64(), Some(5));

    proxy.set_item("count", 3).unwrap();
    assert_eq!(proxy.get_item("count").unwrap().as_i64(), Some(3));
    assert_eq!(subject.value(), Some(json!({"count": 3, "fresh": 5})));
}

#[test]
fn test_failures_replay_after_reload() {
    let recorder = Engine::new();
    recorder.set_cache_mode(CacheMode::RecordAndReuse);
    let live = recorder.proxy(JsonSubject::new(tracker_document()));

    let err = live.get_attr("owner").unwrap_err();
    let recorded = err.captured().unwrap();
    assert_eq!(recorded.kind, "AttributeError");
    assert_eq!(recorded.proxy.get_attr("name").unwrap().as_str(), Some("owner"));

    let replayer = Engine::new();
    replayer.set_cache_mode(CacheMode::ReplayOnly);
    let ghost = replayer.deserialize(&recorder.serialize(&live).unwrap()).unwrap();

    let err = ghost.get_attr("owner").unwrap_err();
    let failure = err.captured().unwrap();
    assert_eq!(failure.kind, "AttributeError");
    assert_eq!(failure.proxy.get_attr("name").unwrap().as_str(), Some("owner"));
    assert!(failure.proxy.get_attr("message").unwrap_err().is_not_cached());
}

#[test]
fn test_chains_record_the_path_they_walk() {
    let engine = Engine::new();
    engine.set_cache_mode(CacheMode::RecordOnly);
    let proxy = engine.proxy(JsonSubject::new(tracker_document()));

    let steps: Vec<Step> = ["getattr:bugs", "getitem:0", "getattr:tags", "len"]
        .into_iter()
        .map(|step| step.parse().unwrap())
        .collect();
    assert_eq!(run_chain(&proxy, &steps).unwrap().as_i64(), Some(1));

    let ghost = {
        let replay = Engine::new();
        replay.set_cache_mode(CacheMode::ReplayOnly);
        replay.deserialize(&engine.serialize(&proxy).unwrap()).unwrap()
    };
    assert_eq!(run_chain(&ghost, &steps).unwrap().as_i64(), Some(1));

    let text = snapshot::outline(&ghost);
    assert!(text.contains(r#"["getattr","tags"]"#));
    assert!(text.contains(r#"["len"] => 1"#));
}

#[test]
fn test_engine_from_config_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("cassette.toml");
    std::fs::write(
        &path,
        "[cache]\nmode = \"use\"\n\n[document]\npretty = true\n",
    )
    .unwrap();

    let config = CassetteConfig::from_file(&path).unwrap();
    let engine = Engine::from_config(&config);
    assert_eq!(engine.cache_mode(), CacheMode::RecordAndReuse);

    let source = StubSubject::new("api").with_attr("version", StubEntry::data("1.2"));
    let proxy = engine.proxy(source.clone());
    proxy.get_attr("version").unwrap();
    proxy.get_attr("version").unwrap();
    assert_eq!(source.invocations("getattr"), 1);

    let document = engine.serialize(&proxy).unwrap();
    assert!(document.contains('\n'));
}

#[test]
fn test_separate_engines_do_not_interfere() {
    let recording = Engine::new();
    recording.set_cache_mode(CacheMode::RecordOnly);
    let replaying = Engine::new();
    replaying.set_cache_mode(CacheMode::ReplayOnly);

    let source = StubSubject::new("api").with_attr("version", StubEntry::data("1.2"));
    let recorded = recording.proxy(source.clone());
    let strict = replaying.proxy(source.clone());

    assert_eq!(recorded.get_attr("version").unwrap().as_str(), Some("1.2"));
    assert!(strict.get_attr("version").unwrap_err().is_not_cached());
    assert_eq!(source.invocations("getattr"), 1);
}
