//! Resolution pipeline integration tests
//!
//! Covers negative caching against backing-store call counts, group
//! precedence and the content index fast path, stale-index self-healing,
//! single-flight fetch deduplication, and write policy.

mod common;

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use common::{MemoryBacking, MemoryFactory};
use depot::data::{MemoryStoreDataManager, StoreDataManager};
use depot::model::{ArtifactStore, StoreKey, StoreType};
use depot::resolve::{ContentIndex, ContentResolver, IndexKey, NotFoundCache};
use depot::types::DepotError;

fn key(ty: StoreType, name: &str) -> StoreKey {
    StoreKey::new("maven", ty, name)
}

struct Rig {
    stores: Arc<MemoryStoreDataManager>,
    factory: Arc<MemoryFactory>,
    nfc: Arc<NotFoundCache>,
    index: Arc<ContentIndex>,
    resolver: ContentResolver,
}

fn rig(definitions: Vec<ArtifactStore>) -> Rig {
    let stores = Arc::new(MemoryStoreDataManager::with_stores(definitions).unwrap());
    let factory = Arc::new(MemoryFactory::new());
    let nfc = Arc::new(NotFoundCache::new(Duration::from_secs(60)));
    let index = Arc::new(ContentIndex::new());
    let resolver = ContentResolver::new(
        Arc::clone(&stores) as Arc<dyn StoreDataManager>,
        Arc::clone(&nfc),
        Arc::clone(&index),
        Arc::clone(&factory) as Arc<dyn depot::storage::StorageFactory>,
    );
    Rig {
        stores,
        factory,
        nfc,
        index,
        resolver,
    }
}

#[tokio::test]
async fn test_nfc_prevents_repeat_fetch_within_ttl() {
    let rig = rig(vec![ArtifactStore::hosted("maven", "releases")]);
    let releases = key(StoreType::Hosted, "releases");
    let backing = rig.factory.backing(&releases);

    assert!(rig.resolver.get(&releases, "org/acme/a.jar").await.unwrap().is_none());
    assert_eq!(backing.fetch_calls(), 1);

    // Second miss within the TTL must not touch the backing store
    assert!(rig.resolver.get(&releases, "org/acme/a.jar").await.unwrap().is_none());
    assert_eq!(backing.fetch_calls(), 1);
}

#[tokio::test]
async fn test_origin_failure_collapses_to_miss_and_caches() {
    let rig = rig(vec![ArtifactStore::remote("maven", "central", "https://c.example.org/repo")]);
    let central = key(StoreType::Remote, "central");
    let backing = rig.factory.backing(&central);
    backing.seed("org/acme/a.jar", b"bytes");
    backing.fail_fetches_of("org/acme/a.jar");

    // An unreachable origin looks like absence to callers
    assert!(rig.resolver.get(&central, "org/acme/a.jar").await.unwrap().is_none());
    assert_eq!(backing.fetch_calls(), 1);
    assert!(rig.nfc.is_missing(&central, "org/acme/a.jar"));

    // And the NFC gates the retry
    assert!(rig.resolver.get(&central, "org/acme/a.jar").await.unwrap().is_none());
    assert_eq!(backing.fetch_calls(), 1);
}

#[tokio::test]
async fn test_group_precedence_and_index_hit() {
    let rig = rig(vec![
        ArtifactStore::hosted("maven", "a"),
        ArtifactStore::hosted("maven", "b"),
        ArtifactStore::group(
            "maven",
            "public",
            vec![key(StoreType::Hosted, "a"), key(StoreType::Hosted, "b")],
        ),
    ]);
    let a = key(StoreType::Hosted, "a");
    let b = key(StoreType::Hosted, "b");
    let public = key(StoreType::Group, "public");

    rig.factory.backing(&a).seed("org/acme/p.jar", b"from-a");
    rig.factory.backing(&b).seed("org/acme/p.jar", b"from-b");

    let content = rig.resolver.get(&public, "org/acme/p.jar").await.unwrap().unwrap();
    assert_eq!(&content.bytes[..], b"from-a");
    assert_eq!(content.meta.serving_store, a);
    assert_eq!(
        rig.index.lookup_hit(&IndexKey::new(&public, "org/acme/p.jar")),
        Some(a.clone())
    );

    // Repeat hit takes the fast path: no scan over member b
    let b_backing = rig.factory.backing(&b);
    let b_calls_before = b_backing.fetch_calls();
    let again = rig.resolver.get(&public, "org/acme/p.jar").await.unwrap().unwrap();
    assert_eq!(&again.bytes[..], b"from-a");
    assert_eq!(b_backing.fetch_calls(), b_calls_before);
}

#[tokio::test]
async fn test_stale_index_entry_self_heals() {
    let rig = rig(vec![
        ArtifactStore::hosted("maven", "a"),
        ArtifactStore::hosted("maven", "b"),
        ArtifactStore::group(
            "maven",
            "public",
            vec![key(StoreType::Hosted, "a"), key(StoreType::Hosted, "b")],
        ),
    ]);
    let a = key(StoreType::Hosted, "a");
    let b = key(StoreType::Hosted, "b");
    let public = key(StoreType::Group, "public");

    rig.factory.backing(&a).seed("p.jar", b"real");
    // Point the index at a store that no longer has the content
    rig.index
        .record_hit(IndexKey::new(&public, "p.jar"), b.clone());

    let content = rig.resolver.get(&public, "p.jar").await.unwrap().unwrap();
    assert_eq!(&content.bytes[..], b"real");
    assert_eq!(content.meta.serving_store, a);
    // The stale entry was replaced by the real serving store
    assert_eq!(
        rig.index.lookup_hit(&IndexKey::new(&public, "p.jar")),
        Some(a)
    );
}

#[tokio::test]
async fn test_concurrent_cold_gets_share_one_fetch() {
    let rig = rig(vec![ArtifactStore::hosted("maven", "releases")]);
    let releases = key(StoreType::Hosted, "releases");

    let backing = Arc::new(MemoryBacking::with_fetch_delay(Duration::from_millis(50)));
    backing.seed("org/acme/a.jar", b"bytes");
    rig.factory.install(&releases, Arc::clone(&backing));

    let (first, second) = tokio::join!(
        rig.resolver.get(&releases, "org/acme/a.jar"),
        rig.resolver.get(&releases, "org/acme/a.jar"),
    );
    assert_eq!(&first.unwrap().unwrap().bytes[..], b"bytes");
    assert_eq!(&second.unwrap().unwrap().bytes[..], b"bytes");
    assert_eq!(backing.fetch_calls(), 1);
}

#[tokio::test]
async fn test_group_miss_not_negatively_cached() {
    let rig = rig(vec![
        ArtifactStore::hosted("maven", "a"),
        ArtifactStore::group("maven", "public", vec![key(StoreType::Hosted, "a")]),
    ]);
    let public = key(StoreType::Group, "public");

    assert!(rig.resolver.get(&public, "late.jar").await.unwrap().is_none());

    // A newly added constituent must become visible on the next request
    let c = ArtifactStore::hosted("maven", "c");
    let c_key = c.key.clone();
    rig.factory.backing(&c_key).seed("late.jar", b"finally");
    rig.stores.put_store(c).unwrap();
    let group = ArtifactStore::group(
        "maven",
        "public",
        vec![key(StoreType::Hosted, "a"), c_key.clone()],
    );
    rig.stores.put_store(group).unwrap();

    let content = rig.resolver.get(&public, "late.jar").await.unwrap().unwrap();
    assert_eq!(content.meta.serving_store, c_key);
}

#[tokio::test]
async fn test_disabled_member_never_serves() {
    let mut hidden = ArtifactStore::hosted("maven", "hidden");
    hidden.disabled = true;
    let rig = rig(vec![
        hidden,
        ArtifactStore::group("maven", "public", vec![key(StoreType::Hosted, "hidden")]),
    ]);
    let hidden_key = key(StoreType::Hosted, "hidden");
    let public = key(StoreType::Group, "public");

    rig.factory.backing(&hidden_key).seed("p.jar", b"secret");

    assert!(rig.resolver.get(&public, "p.jar").await.unwrap().is_none());
    assert!(rig.resolver.get(&hidden_key, "p.jar").await.unwrap().is_none());
}

#[tokio::test]
async fn test_cycle_surfaces_as_error() {
    let a = ArtifactStore::group("maven", "a", vec![key(StoreType::Group, "b")]);
    let b = ArtifactStore::group("maven", "b", vec![key(StoreType::Group, "a")]);
    let rig = rig(vec![a, b]);

    let err = rig
        .resolver
        .get(&key(StoreType::Group, "a"), "p.jar")
        .await
        .unwrap_err();
    assert!(matches!(err, DepotError::Cycle(_)));
}

#[tokio::test]
async fn test_unknown_store_is_a_caller_error() {
    let rig = rig(vec![]);
    let err = rig
        .resolver
        .get(&key(StoreType::Hosted, "ghost"), "p.jar")
        .await
        .unwrap_err();
    assert!(matches!(err, DepotError::StoreNotFound(_)));
}

#[tokio::test]
async fn test_put_writes_hosted_only() {
    let rig = rig(vec![
        ArtifactStore::hosted("maven", "releases"),
        ArtifactStore::remote("maven", "central", "https://c.example.org/repo"),
        ArtifactStore::group("maven", "public", vec![key(StoreType::Hosted, "releases")]),
    ]);
    let releases = key(StoreType::Hosted, "releases");

    let resolved = rig
        .resolver
        .put(&releases, "org/acme/a.jar", Bytes::from_static(b"deployed"))
        .await
        .unwrap();
    assert_eq!(resolved.serving_store, releases);
    let content = rig.resolver.get(&releases, "org/acme/a.jar").await.unwrap().unwrap();
    assert_eq!(&content.bytes[..], b"deployed");

    for target in [key(StoreType::Remote, "central"), key(StoreType::Group, "public")] {
        let err = rig
            .resolver
            .put(&target, "org/acme/a.jar", Bytes::from_static(b"nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, DepotError::Unsupported(_)));
    }
}

#[tokio::test]
async fn test_put_clears_stale_negative_entry() {
    let rig = rig(vec![ArtifactStore::hosted("maven", "releases")]);
    let releases = key(StoreType::Hosted, "releases");

    // Cold miss poisons the NFC
    assert!(rig.resolver.get(&releases, "a.jar").await.unwrap().is_none());
    assert!(rig.nfc.is_missing(&releases, "a.jar"));

    // A write makes the path immediately resolvable again
    rig.resolver
        .put(&releases, "a.jar", Bytes::from_static(b"now"))
        .await
        .unwrap();
    let content = rig.resolver.get(&releases, "a.jar").await.unwrap().unwrap();
    assert_eq!(&content.bytes[..], b"now");
}

#[tokio::test]
async fn test_put_enforces_snapshot_policy() {
    let mut releases = ArtifactStore::hosted("maven", "releases");
    releases.allow_snapshots = false;
    let rig = rig(vec![releases]);
    let releases = key(StoreType::Hosted, "releases");

    let err = rig
        .resolver
        .put(
            &releases,
            "org/acme/app/1.0-SNAPSHOT/app-1.0-SNAPSHOT.jar",
            Bytes::from_static(b"s"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DepotError::Unsupported(_)));

    rig.resolver
        .put(&releases, "org/acme/app/1.0/app-1.0.jar", Bytes::from_static(b"r"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_group_listing_merges_in_precedence_order() {
    let rig = rig(vec![
        ArtifactStore::hosted("maven", "a"),
        ArtifactStore::hosted("maven", "b"),
        ArtifactStore::group(
            "maven",
            "public",
            vec![key(StoreType::Hosted, "a"), key(StoreType::Hosted, "b")],
        ),
    ]);
    let a = key(StoreType::Hosted, "a");
    let b = key(StoreType::Hosted, "b");

    rig.factory.backing(&a).seed("org/acme/one.jar", b"1");
    rig.factory.backing(&b).seed("org/acme/two.jar", b"2");
    rig.factory.backing(&b).seed("org/acme/one.jar", b"shadowed");

    let listing = rig
        .resolver
        .list(&key(StoreType::Group, "public"), "org/acme")
        .await
        .unwrap();
    assert_eq!(listing, vec!["one.jar".to_string(), "two.jar".to_string()]);
}

#[tokio::test]
async fn test_exists_uses_and_updates_nfc() {
    let rig = rig(vec![ArtifactStore::hosted("maven", "releases")]);
    let releases = key(StoreType::Hosted, "releases");
    let backing = rig.factory.backing(&releases);

    assert!(!rig.resolver.exists(&releases, "a.jar").await.unwrap());
    assert!(rig.nfc.is_missing(&releases, "a.jar"));

    backing.seed("a.jar", b"x");
    // Still gated by the NFC until it clears or content is written
    assert!(!rig.resolver.exists(&releases, "a.jar").await.unwrap());
    rig.nfc.clear_path(&releases, "a.jar");
    assert!(rig.resolver.exists(&releases, "a.jar").await.unwrap());
}
