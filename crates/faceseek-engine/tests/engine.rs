//! End-to-end scenarios against the engine facade.

use faceseek_core::{EngineConfig, Error};
use faceseek_engine::{
    BoundingBox, FaceMetadata, FaceSearchEngine, NewFace, SearchOptions,
};
use tempfile::tempdir;

fn bbox() -> BoundingBox {
    BoundingBox::new(4, 4, 48, 48)
}

fn unit(dim: usize, axis: usize) -> Vec<f32> {
    let mut v = vec![0.0; dim];
    v[axis] = 1.0;
    v
}

#[tokio::test]
async fn exact_query_returns_single_photo_group() {
    // Three faces for p1.jpg, two for p2.jpg, all distinct directions.
    // A query identical to one of p1's faces at threshold 0.99 must yield
    // exactly one group, for p1.jpg, with max similarity ~1.0.
    let engine = FaceSearchEngine::open(EngineConfig::for_testing(4)).unwrap();

    let mut diagonal = vec![0.7, 0.7, 0.0, 0.0];
    faceseek_core::normalize(&mut diagonal);

    let faces = vec![
        NewFace::new(unit(4, 0), "p1.jpg", bbox(), 0.97),
        NewFace::new(unit(4, 1), "p1.jpg", bbox(), 0.93),
        NewFace::new(unit(4, 2), "p1.jpg", bbox(), 0.91),
        NewFace::new(unit(4, 3), "p2.jpg", bbox(), 0.95),
        NewFace::new(diagonal, "p2.jpg", bbox(), 0.92),
    ];
    engine.insert_batch(faces).await.unwrap();

    let groups = engine
        .search(
            &unit(4, 0),
            SearchOptions::default().with_k(10).with_threshold(0.99),
        )
        .await
        .unwrap();

    assert_eq!(groups.len(), 1);
    let group = &groups[0];
    assert_eq!(group.photo, "p1.jpg");
    assert_eq!(group.face_count, 1);
    assert!((group.max_similarity - 1.0).abs() < 1e-4);
    assert!(!group.expanded);
}

#[tokio::test]
async fn migration_to_approximate_preserves_active_set() {
    // Grow past the exact limit across several batches; the rebuild must
    // index the full corpus, not the newest batch.
    let config = EngineConfig::for_testing(8); // exact limit 8
    let engine = FaceSearchEngine::open(config).unwrap();

    let mut inserted: Vec<(String, Vec<f32>)> = Vec::new();
    for batch in 0..4 {
        let faces: Vec<NewFace> = (0..6)
            .map(|i| {
                let n = batch * 6 + i;
                let mut v = vec![0.05; 8];
                v[n % 8] = 1.0;
                v[(n / 8) % 8] += 0.3 + n as f32 * 0.02;
                faceseek_core::normalize(&mut v);
                let photo = format!("photo-{n:02}.jpg");
                inserted.push((photo.clone(), v.clone()));
                NewFace::new(v, photo, bbox(), 0.9)
            })
            .collect();
        engine.insert_batch(faces).await.unwrap();
    }

    let stats = engine.stats().await;
    assert_eq!(stats.total_active, 24);
    assert!(stats.index_kind.contains("approximate"));

    // Every face inserted before the migration is still retrievable by its
    // own embedding — the rebuild did not discard earlier batches.
    for (photo, vector) in &inserted {
        let groups = engine
            .search(
                vector,
                SearchOptions::default().with_k(100).with_threshold(0.99),
            )
            .await
            .unwrap();
        assert!(
            groups.iter().any(|g| g.photo == *photo),
            "missing {photo}"
        );
    }
}

#[tokio::test]
async fn deleted_photo_never_resurfaces() {
    let engine = FaceSearchEngine::open(EngineConfig::for_testing(4)).unwrap();
    engine
        .insert(unit(4, 0), "keep.jpg", bbox(), 0.9, FaceMetadata::default())
        .await
        .unwrap();
    engine
        .insert(unit(4, 0), "drop.jpg", bbox(), 0.9, FaceMetadata::default())
        .await
        .unwrap();

    assert_eq!(engine.delete_by_photo("drop.jpg").await.unwrap(), 1);

    let groups = engine
        .search(
            &unit(4, 0),
            SearchOptions::default().with_k(10).with_threshold(0.0),
        )
        .await
        .unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].photo, "keep.jpg");
}

#[tokio::test]
async fn fallback_hits_are_flagged_expanded() {
    let engine = FaceSearchEngine::open(EngineConfig::for_testing(4)).unwrap();
    // Similarity to the query axis is ~0.45: below the 0.55 primary
    // threshold, above the 0.30 fallback threshold.
    let mut weak = vec![0.45, (1.0f32 - 0.45 * 0.45).sqrt(), 0.0, 0.0];
    faceseek_core::normalize(&mut weak);
    engine
        .insert(weak, "weak.jpg", bbox(), 0.9, FaceMetadata::default())
        .await
        .unwrap();

    let groups = engine
        .search(&unit(4, 0), SearchOptions::default())
        .await
        .unwrap();
    assert_eq!(groups.len(), 1);
    assert!(groups[0].expanded);
}

#[tokio::test]
async fn session_flow_with_reference_embedding() {
    let engine = FaceSearchEngine::open(EngineConfig::for_testing(4)).unwrap();
    engine
        .insert(unit(4, 0), "p1.jpg", bbox(), 0.9, FaceMetadata::default())
        .await
        .unwrap();

    // A validated reference face opens a session; follow-up queries reuse
    // its embedding without re-upload.
    let session_id = engine.sessions().create(unit(4, 0)).await;
    let session = engine.sessions().get(&session_id).await.unwrap();

    let groups = engine
        .search(
            &session.reference_embedding,
            SearchOptions::default().with_threshold(0.9),
        )
        .await
        .unwrap();
    assert_eq!(groups.len(), 1);

    engine
        .sessions()
        .append_query(&session_id, "photos of me", "1 photo")
        .await;
    let session = engine.sessions().get(&session_id).await.unwrap();
    assert_eq!(session.query_log.len(), 1);
}

#[tokio::test]
async fn reopen_after_crash_mid_state() {
    // A stale index snapshot (fewer vectors than the store) is detected on
    // open and rebuilt from the store.
    let dir = tempdir().unwrap();
    let config = EngineConfig {
        data_dir: Some(dir.path().to_path_buf()),
        ..EngineConfig::for_testing(4)
    };

    let index_snapshot;
    {
        let engine = FaceSearchEngine::open(config.clone()).unwrap();
        engine
            .insert(unit(4, 0), "p1.jpg", bbox(), 0.9, FaceMetadata::default())
            .await
            .unwrap();
        index_snapshot =
            std::fs::read(dir.path().join("index.json")).unwrap();
        engine
            .insert(unit(4, 1), "p2.jpg", bbox(), 0.9, FaceMetadata::default())
            .await
            .unwrap();
    }

    // Roll the index file back while the store keeps both records
    std::fs::write(dir.path().join("index.json"), index_snapshot).unwrap();

    let engine = FaceSearchEngine::open(config).unwrap();
    let groups = engine
        .search(
            &unit(4, 1),
            SearchOptions::default().with_k(10).with_threshold(0.9),
        )
        .await
        .unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].photo, "p2.jpg");
}

#[tokio::test]
async fn wrong_dimension_query_is_rejected() {
    let engine = FaceSearchEngine::open(EngineConfig::for_testing(4)).unwrap();
    engine
        .insert(unit(4, 0), "p1.jpg", bbox(), 0.9, FaceMetadata::default())
        .await
        .unwrap();

    let err = engine
        .search(&[1.0, 0.0], SearchOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { .. }));
}
