//! Port-contract tests against the in-memory driver

use zfs::{DatasetPath, VersionType, ZfsError, ZfsMem, ZfsPort};

const FS: &str = "tank/foo bar";

#[tokio::test]
async fn test_idempotent_bookmark() {
    let pool = ZfsMem::new();
    pool.create_filesystem(FS).unwrap();
    let a_snap = pool.snapshot(FS, "a snap").unwrap();
    let another_snap = pool.snapshot(FS, "another snap").unwrap();

    pool.bookmark(FS, &a_snap, "a bookmark").await.unwrap();

    // do it again, should be idempotent
    pool.bookmark(FS, &a_snap, "a bookmark").await.unwrap();

    // should fail for another snapshot
    let err = pool
        .bookmark(FS, &another_snap, "a bookmark")
        .await
        .unwrap_err();
    assert!(matches!(err, ZfsError::BookmarkExists { .. }), "{err}");

    // destroy the snapshot, then repeat: the source is gone
    pool.destroy(&a_snap.full_path(FS)).await.unwrap();
    let err = pool.bookmark(FS, &a_snap, "a bookmark").await.unwrap_err();
    assert!(err.is_does_not_exist(), "{err}");

    // the bookmark itself survived the snapshot
    let bm = pool.version(FS, "#a bookmark").unwrap();
    assert_eq!(bm.guid, a_snap.guid());
}

#[tokio::test]
async fn test_bookmark_cloning_unsupported() {
    let pool = ZfsMem::new();
    pool.create_filesystem(FS).unwrap();
    let snap = pool.snapshot(FS, "snap").unwrap();
    pool.bookmark(FS, &snap, "bm").await.unwrap();
    let bm = pool.version_ref(FS, "#bm").unwrap();

    // cloning a bookmark works while the pool feature is on
    pool.bookmark(FS, &bm, "bm2").await.unwrap();

    pool.set_bookmark_cloning_supported(false);
    let err = pool.bookmark(FS, &bm, "bm3").await.unwrap_err();
    assert!(matches!(err, ZfsError::BookmarkCloningNotSupported), "{err}");
}

#[tokio::test]
async fn test_destroy_held_snapshot_is_refused() {
    let pool = ZfsMem::new();
    pool.create_filesystem(FS).unwrap();
    let snap = pool.snapshot(FS, "snap").unwrap();
    pool.hold(FS, &snap, "keep").await.unwrap();

    let err = pool.destroy(&snap.full_path(FS)).await.unwrap_err();
    assert!(matches!(err, ZfsError::Transport(_)), "{err}");

    pool.release("keep", &snap.full_path(FS)).await.unwrap();
    pool.destroy(&snap.full_path(FS)).await.unwrap();

    // destroy of the now-missing snapshot is only ok via the idempotent form
    let err = pool.destroy(&snap.full_path(FS)).await.unwrap_err();
    assert!(err.is_does_not_exist(), "{err}");
    pool.destroy_idempotent(&snap.full_path(FS)).await.unwrap();
}

/// Sets up the batch-release fixture: snapshots `@1..@6`, a foreign-suffix
/// tag on `@2`, and the tag under test on `@1`, `@3`, `@5`, `@6`.
async fn rollup_fixture(pool: &ZfsMem) -> u64 {
    pool.create_filesystem(FS).unwrap();
    let mut guid5 = 0;
    for i in 1..=6u32 {
        let snap = pool.snapshot(FS, &i.to_string()).unwrap();
        if i == 5 {
            guid5 = snap.guid();
        }
        match i {
            2 => pool.hold(FS, &snap, "zrepl_platformtest_2").await.unwrap(),
            1 | 3 | 5 | 6 => pool.hold(FS, &snap, "zrepl_platformtest").await.unwrap(),
            _ => {}
        }
    }
    guid5
}

async fn holds_of(pool: &ZfsMem, snap: &str) -> Vec<String> {
    pool.list_holds(FS, snap).await.unwrap()
}

#[tokio::test]
async fn test_release_all_older_and_including_guid() {
    let pool = ZfsMem::new();
    let guid5 = rollup_fixture(&pool).await;

    pool.release_all_older_and_including_guid(FS, guid5, "zrepl_platformtest")
        .await
        .unwrap();

    assert!(holds_of(&pool, "1").await.is_empty());
    assert_eq!(holds_of(&pool, "2").await, vec!["zrepl_platformtest_2"]);
    assert!(holds_of(&pool, "3").await.is_empty());
    assert!(holds_of(&pool, "4").await.is_empty());
    assert!(holds_of(&pool, "5").await.is_empty());
    assert_eq!(holds_of(&pool, "6").await, vec!["zrepl_platformtest"]);
}

#[tokio::test]
async fn test_release_all_older_than_guid() {
    let pool = ZfsMem::new();
    let guid5 = rollup_fixture(&pool).await;

    pool.release_all_older_than_guid(FS, guid5, "zrepl_platformtest")
        .await
        .unwrap();

    assert!(holds_of(&pool, "1").await.is_empty());
    assert_eq!(holds_of(&pool, "2").await, vec!["zrepl_platformtest_2"]);
    assert!(holds_of(&pool, "3").await.is_empty());
    assert!(holds_of(&pool, "4").await.is_empty());
    assert_eq!(holds_of(&pool, "5").await, vec!["zrepl_platformtest"]);
    assert_eq!(holds_of(&pool, "6").await, vec!["zrepl_platformtest"]);
}

#[tokio::test]
async fn test_release_all_unknown_guid_is_validation_error() {
    let pool = ZfsMem::new();
    rollup_fixture(&pool).await;

    let err = pool
        .release_all_older_than_guid(FS, 42, "zrepl_platformtest")
        .await
        .unwrap_err();
    assert!(matches!(err, ZfsError::Validation(_)), "{err}");
}

#[tokio::test]
async fn test_list_versions_sorted_and_filtered() {
    let pool = ZfsMem::new();
    let ds = pool.create_filesystem(FS).unwrap();
    let s1 = pool.snapshot(FS, "s1").unwrap();
    let _s2 = pool.snapshot(FS, "s2").unwrap();
    // bookmark of s1 sorts by its source's create_txg, before s2
    pool.bookmark(FS, &s1, "b1").await.unwrap();

    let all = pool.list_versions(&ds, None).await.unwrap();
    let names: Vec<_> = all.iter().map(|v| v.rel_name()).collect();
    assert_eq!(names, vec!["@s1", "#b1", "@s2"]);
    assert!(all.windows(2).all(|w| w[0].create_txg <= w[1].create_txg));

    let filter = |kind: VersionType, _name: &str| kind == VersionType::Bookmark;
    let bookmarks = pool.list_versions(&ds, Some(&filter)).await.unwrap();
    assert_eq!(bookmarks.len(), 1);
    assert_eq!(bookmarks[0].name, "b1");
    assert_eq!(bookmarks[0].guid, s1.guid());

    // a filesystem that does not exist lists as empty
    let missing = DatasetPath::new("tank/missing").unwrap();
    assert!(pool.list_versions(&missing, None).await.unwrap().is_empty());
}
