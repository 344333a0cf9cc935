mod helpers;

use helpers::{ctx, test_db, test_embedding};
use hearth::memory::{search::sanitize_fts_query, Category, FactStore, NewFact};

#[test]
fn fact_round_trip() {
    let store = FactStore::new(test_db());
    store
        .set(
            &ctx(),
            &NewFact::new(Category::Preference, "time_format", "24-hour").source("user"),
        )
        .unwrap();

    let fact = store.get(&ctx(), Category::Preference, "time_format").unwrap();
    assert_eq!(fact.value, "24-hour");
    assert_eq!(fact.source, "user");
    assert_eq!(fact.confidence, 1.0);
    assert!(fact.subjects.is_empty());
    assert!(fact.reference.is_none());
    assert!(fact.updated_at >= fact.created_at);
    assert!(fact.accessed_at >= fact.created_at);
    assert!(fact.deleted_at.is_none());
}

#[test]
fn get_touches_accessed_at() {
    let store = FactStore::new(test_db());
    let created = store
        .set(&ctx(), &NewFact::new(Category::Home, "roof", "slate"))
        .unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));

    let first = store.get(&ctx(), Category::Home, "roof").unwrap();
    assert!(first.accessed_at > created.accessed_at);
    assert_eq!(first.updated_at, created.updated_at);
}

#[test]
fn subject_fan_out_newest_first() {
    let store = FactStore::new(test_db());
    let older = store
        .set(
            &ctx(),
            &NewFact::new(Category::Device, "kitchen_light", "Hue bulb")
                .subjects(["entity:light.kitchen"]),
        )
        .unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));
    let newer = store
        .set(
            &ctx(),
            &NewFact::new(Category::Routine, "kitchen_evening", "Lights dim at 21:00")
                .subjects(["zone:kitchen", "entity:light.kitchen"]),
        )
        .unwrap();
    store
        .set(
            &ctx(),
            &NewFact::new(Category::Device, "garage_light", "LED strip")
                .subjects(["entity:light.garage"]),
        )
        .unwrap();

    let hits = store
        .get_by_subjects(&ctx(), &["entity:light.kitchen".to_string()])
        .unwrap();
    let ids: Vec<&str> = hits.iter().map(|f| f.id.as_str()).collect();
    assert_eq!(ids, vec![newer.id.as_str(), older.id.as_str()]);

    // A fact matching several requested subjects appears once.
    let both = store
        .get_by_subjects(
            &ctx(),
            &["zone:kitchen".to_string(), "entity:light.kitchen".to_string()],
        )
        .unwrap();
    assert_eq!(both.len(), 2);
}

#[test]
fn delete_then_set_resurrects() {
    let store = FactStore::new(test_db());
    let original = store
        .set(&ctx(), &NewFact::new(Category::Device, "garage_sensor", "zigbee"))
        .unwrap();

    store.delete(&ctx(), Category::Device, "garage_sensor").unwrap();
    let err = store
        .get(&ctx(), Category::Device, "garage_sensor")
        .unwrap_err();
    assert_eq!(err.to_string(), "fact not found: device/garage_sensor");

    let revived = store
        .set(&ctx(), &NewFact::new(Category::Device, "garage_sensor", "z-wave"))
        .unwrap();
    assert_eq!(revived.id, original.id);
    assert!(revived.deleted_at.is_none());
    assert_eq!(
        store.get(&ctx(), Category::Device, "garage_sensor").unwrap().value,
        "z-wave"
    );
}

#[test]
fn search_boundaries() {
    let store = FactStore::new(test_db());
    store
        .set(&ctx(), &NewFact::new(Category::Home, "greeting", "say hello at the door"))
        .unwrap();

    assert!(store.search(&ctx(), "").unwrap().is_empty());
    assert!(store.search(&ctx(), "   ").unwrap().is_empty());

    assert_eq!(
        sanitize_fts_query("say \"hello\"").as_deref(),
        Some(r#""say" OR """hello""""#)
    );
    let hits = store.search(&ctx(), "say \"hello\"").unwrap();
    assert_eq!(hits.len(), 1);
}

#[test]
fn search_ranks_by_bm25() {
    let store = FactStore::new(test_db());
    store
        .set(&ctx(), &NewFact::new(Category::Home, "porch", "porch porch porch light"))
        .unwrap();
    store
        .set(&ctx(), &NewFact::new(Category::Home, "hall", "hall light, next to the porch door and a long description of the hallway"))
        .unwrap();

    let hits = store.search(&ctx(), "porch").unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].key, "porch");
}

#[test]
fn semantic_search_limits_and_order() {
    let store = FactStore::new(test_db());
    for (i, key) in ["a", "b", "c"].into_iter().enumerate() {
        let fact = store
            .set(&ctx(), &NewFact::new(Category::Home, key, "v"))
            .unwrap();
        let mut v = test_embedding(0);
        v[i + 1] = i as f32;
        store.set_embedding(&ctx(), &fact.id, &v).unwrap();
    }

    let query = test_embedding(0);
    assert!(store.semantic_search(&ctx(), &query, 0).unwrap().is_empty());

    let all = store.semantic_search(&ctx(), &query, 50).unwrap();
    let keys: Vec<&str> = all.iter().map(|s| s.fact.key.as_str()).collect();
    assert_eq!(keys, vec!["a", "b", "c"]);
    assert!((all[0].score - 1.0).abs() < 1e-6);
}

#[test]
fn reingest_by_source_leaves_no_duplicates() {
    let store = FactStore::new(test_db());
    let doc = [("wifi_ssid", "hearth-mesh"), ("router", "attic")];

    for _ in 0..3 {
        store.delete_by_source(&ctx(), "kb:network.md").unwrap();
        for (key, value) in doc {
            store
                .set(&ctx(), &NewFact::new(Category::Home, key, value).source("kb:network.md"))
                .unwrap();
        }
    }

    let stats = store.stats(&ctx()).unwrap();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.by_category["home"], 2);
}
