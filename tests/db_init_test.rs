mod helpers;

use hearth::db::{Database, OpenOptions};
use hearth::memory::{Category, FactStore, NewFact};
use hearth::{Error, RequestContext};
use tempfile::TempDir;

#[test]
fn open_creates_new_db_at_nonexistent_path() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("subdir").join("new.db");
    assert!(!db_path.exists());

    let db = Database::open(&db_path).unwrap();
    assert!(db_path.exists());
    assert_eq!(db.path(), Some(db_path.as_path()));

    let stats = FactStore::new(db).stats(&RequestContext::new()).unwrap();
    assert_eq!(stats.total, 0);
}

#[test]
fn data_survives_reopen() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("hearth.db");

    {
        let store = FactStore::new(Database::open(&db_path).unwrap());
        store
            .set(&RequestContext::new(), &NewFact::new(Category::User, "name", "Dan"))
            .unwrap();
    }

    let store = FactStore::new(Database::open(&db_path).unwrap());
    let fact = store.get(&RequestContext::new(), Category::User, "name").unwrap();
    assert_eq!(fact.value, "Dan");
}

#[test]
fn like_fallback_when_fts_disabled() {
    let db = Database::open_in_memory_with(OpenOptions { enable_fts: false }).unwrap();
    let store = FactStore::new(db);
    let ctx = RequestContext::new();
    store
        .set(&ctx, &NewFact::new(Category::Home, "Garage_Door", "Blue roll-up door"))
        .unwrap();

    assert!(!store.fts_enabled());
    assert_eq!(store.search(&ctx, "garage").unwrap().len(), 1);
    assert_eq!(store.search(&ctx, "ROLL-UP").unwrap().len(), 1);
    assert!(store.search(&ctx, "attic").unwrap().is_empty());
}

#[test]
fn cancelled_context_fails_every_store_call() {
    let store = FactStore::new(helpers::test_db());
    let ctx = RequestContext::new();
    ctx.cancel();

    assert!(matches!(
        store.set(&ctx, &NewFact::new(Category::Home, "k", "v")),
        Err(Error::Cancelled)
    ));
    assert!(matches!(store.get_all(&ctx), Err(Error::Cancelled)));
    assert!(matches!(store.search(&ctx, "k"), Err(Error::Cancelled)));
    assert!(matches!(store.stats(&ctx), Err(Error::Cancelled)));

    // A sibling context is unaffected.
    assert!(store.get_all(&RequestContext::new()).unwrap().is_empty());
}

#[test]
fn child_context_follows_parent_cancellation() {
    let parent = RequestContext::new();
    let child = parent.child().with_subjects(["zone:yard"]);
    parent.cancel();
    assert!(child.is_cancelled());
    assert_eq!(child.subjects(), Some(&["zone:yard".to_string()][..]));
}
