//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 缓存写入器集成测试

use oxwrite::backend::store::StoreBackend;
use oxwrite::cache::writer::CacheWriter;
use oxwrite::config::WriterConfig;
use oxwrite::{CacheError, CacheKey};
use serial_test::serial;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;

#[path = "../redis_test_utils.rs"]
mod redis_test_utils;

use redis_test_utils::{create_store_backend, is_redis_available, unique_key};

const REGION: &str = "test_region";

async fn setup() -> Option<Arc<StoreBackend>> {
    oxwrite::telemetry::init_tracing("oxwrite=info");
    if !is_redis_available().await {
        println!("Skipping test: Redis not available");
        return None;
    }
    let backend = create_store_backend()
        .await
        .expect("Failed to create store backend");
    Some(Arc::new(backend))
}

fn locking_writer(backend: Arc<StoreBackend>) -> CacheWriter {
    CacheWriter::locking(
        backend,
        Duration::from_millis(100),
        Duration::from_secs(5),
    )
    .expect("Failed to create locking writer")
}

#[tokio::test]
async fn test_from_config_selects_mode() {
    let Some(backend) = setup().await else { return };

    let config = WriterConfig::default();
    let writer = CacheWriter::from_config(backend.clone(), &config)
        .expect("non-locking writer should build");
    assert!(!writer.is_locking());

    let config = WriterConfig {
        locking: true,
        lock_ttl_ms: None,
        ..Default::default()
    };
    assert!(CacheWriter::from_config(backend.clone(), &config).is_err());

    let config = WriterConfig {
        locking: true,
        lock_ttl_ms: Some(5000),
        ..Default::default()
    };
    let writer =
        CacheWriter::from_config(backend, &config).expect("locking writer should build");
    assert!(writer.is_locking());
}

#[tokio::test]
async fn test_put_get_roundtrip() {
    let Some(backend) = setup().await else { return };
    let writer = CacheWriter::non_locking(backend);
    let key = CacheKey::builder(unique_key("roundtrip")).build();

    writer
        .put(REGION, &key, b"value-1", None)
        .await
        .expect("put failed");
    let value = writer.get(REGION, &key).await.expect("get failed");
    assert_eq!(value.as_deref(), Some(b"value-1".as_slice()));

    // 无TTL的值在观察窗口内不过期
    sleep(Duration::from_millis(1500)).await;
    let value = writer.get(REGION, &key).await.expect("get failed");
    assert_eq!(value.as_deref(), Some(b"value-1".as_slice()));

    writer.remove(REGION, &key).await.expect("remove failed");
}

#[tokio::test]
async fn test_put_overwrites_existing_value() {
    let Some(backend) = setup().await else { return };
    let writer = CacheWriter::non_locking(backend);
    let key = CacheKey::builder(unique_key("overwrite")).build();

    writer
        .put(REGION, &key, b"old", None)
        .await
        .expect("put failed");
    writer
        .put(REGION, &key, b"new", None)
        .await
        .expect("put failed");

    let value = writer.get(REGION, &key).await.expect("get failed");
    assert_eq!(value.as_deref(), Some(b"new".as_slice()));

    writer.remove(REGION, &key).await.expect("remove failed");
}

#[tokio::test]
async fn test_put_with_ttl_expires() {
    let Some(backend) = setup().await else { return };
    let writer = CacheWriter::non_locking(backend);
    let key = CacheKey::builder(unique_key("ttl")).build();

    writer
        .put(REGION, &key, b"ephemeral", Some(Duration::from_millis(800)))
        .await
        .expect("put failed");
    let value = writer.get(REGION, &key).await.expect("get failed");
    assert_eq!(value.as_deref(), Some(b"ephemeral".as_slice()));

    sleep(Duration::from_millis(1300)).await;
    let value = writer.get(REGION, &key).await.expect("get failed");
    assert_eq!(value, None);
}

#[tokio::test]
async fn test_get_missing_key_returns_none() {
    let Some(backend) = setup().await else { return };
    let writer = CacheWriter::non_locking(backend);
    let key = CacheKey::builder(unique_key("missing")).build();

    let value = writer.get(REGION, &key).await.expect("get failed");
    assert_eq!(value, None);
}

#[tokio::test]
async fn test_put_if_absent_first_writer_wins() {
    let Some(backend) = setup().await else { return };
    let writer = CacheWriter::non_locking(backend);
    let key = CacheKey::builder(unique_key("pia")).build();

    let previous = writer
        .put_if_absent(REGION, &key, b"first", None)
        .await
        .expect("put_if_absent failed");
    assert_eq!(previous, None);

    let previous = writer
        .put_if_absent(REGION, &key, b"second", None)
        .await
        .expect("put_if_absent failed");
    assert_eq!(previous.as_deref(), Some(b"first".as_slice()));

    // 键保持第一个写入者的值
    let value = writer.get(REGION, &key).await.expect("get failed");
    assert_eq!(value.as_deref(), Some(b"first".as_slice()));

    writer.remove(REGION, &key).await.expect("remove failed");
}

#[tokio::test]
async fn test_put_if_absent_applies_ttl() {
    let Some(backend) = setup().await else { return };
    let writer = CacheWriter::non_locking(backend);
    let key = CacheKey::builder(unique_key("pia_ttl")).build();

    let previous = writer
        .put_if_absent(REGION, &key, b"v", Some(Duration::from_millis(800)))
        .await
        .expect("put_if_absent failed");
    assert_eq!(previous, None);

    sleep(Duration::from_millis(1300)).await;
    let value = writer.get(REGION, &key).await.expect("get failed");
    assert_eq!(value, None);
}

#[tokio::test]
async fn test_put_if_absent_single_winner_under_contention() {
    let Some(backend) = setup().await else { return };
    let writer = Arc::new(CacheWriter::non_locking(backend));
    let key_name = unique_key("pia_race");

    let mut handles = Vec::new();
    for i in 0..8 {
        let writer = writer.clone();
        let key_name = key_name.clone();
        handles.push(tokio::spawn(async move {
            let key = CacheKey::builder(key_name).build();
            let value = format!("value-{}", i);
            writer
                .put_if_absent(REGION, &key, value.as_bytes(), None)
                .await
                .expect("put_if_absent failed")
                .is_none()
        }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.expect("task panicked") {
            winners += 1;
        }
    }
    assert_eq!(winners, 1, "exactly one racer should observe absent");

    let key = CacheKey::builder(key_name).build();
    writer.remove(REGION, &key).await.expect("remove failed");
}

#[tokio::test]
async fn test_put_if_absent_locking_mode() {
    let Some(backend) = setup().await else { return };
    let writer = locking_writer(backend);
    let key = CacheKey::builder(unique_key("pia_locking")).build();

    let previous = writer
        .put_if_absent(REGION, &key, b"first", None)
        .await
        .expect("put_if_absent failed");
    assert_eq!(previous, None);

    let previous = writer
        .put_if_absent(REGION, &key, b"second", None)
        .await
        .expect("put_if_absent failed");
    assert_eq!(previous.as_deref(), Some(b"first".as_slice()));

    writer.remove(REGION, &key).await.expect("remove failed");
}

#[tokio::test]
async fn test_remove_missing_key_is_ok() {
    let Some(backend) = setup().await else { return };
    let writer = CacheWriter::non_locking(backend);
    let key = CacheKey::builder(unique_key("remove_missing")).build();

    writer.remove(REGION, &key).await.expect("remove failed");
}

#[tokio::test]
async fn test_preconditions_fail_before_store_access() {
    let Some(backend) = setup().await else { return };
    let writer = CacheWriter::non_locking(backend);
    let key = CacheKey::builder(unique_key("precondition")).build();
    let empty_key = CacheKey::builder("").build();

    let err = writer.put("", &key, b"v", None).await.unwrap_err();
    assert!(matches!(err, CacheError::InvalidArgument(_)));

    let err = writer.get(REGION, &empty_key).await.unwrap_err();
    assert!(matches!(err, CacheError::InvalidArgument(_)));

    let err = writer.clean(REGION, b"").await.unwrap_err();
    assert!(matches!(err, CacheError::InvalidArgument(_)));
}

#[tokio::test]
#[serial]
async fn test_clean_non_locking() {
    let Some(backend) = setup().await else { return };
    let writer = CacheWriter::non_locking(backend);
    let prefix = unique_key("clean_nl");

    for i in 0..3 {
        let key = CacheKey::builder(format!("{}:{}", prefix, i)).build();
        writer
            .put(REGION, &key, b"v", None)
            .await
            .expect("put failed");
    }
    let other = CacheKey::builder(format!("{}-other", prefix)).build();
    writer
        .put(REGION, &other, b"keep", None)
        .await
        .expect("put failed");

    writer
        .clean(REGION, format!("{}:*", prefix).as_bytes())
        .await
        .expect("clean failed");

    for i in 0..3 {
        let key = CacheKey::builder(format!("{}:{}", prefix, i)).build();
        let value = writer.get(REGION, &key).await.expect("get failed");
        assert_eq!(value, None);
    }
    // 不匹配模式的键不受影响
    let value = writer.get(REGION, &other).await.expect("get failed");
    assert_eq!(value.as_deref(), Some(b"keep".as_slice()));

    writer.remove(REGION, &other).await.expect("remove failed");
}

#[tokio::test]
#[serial]
async fn test_clean_locking() {
    let Some(backend) = setup().await else { return };
    let writer = locking_writer(backend);
    let prefix = unique_key("clean_lock");

    for i in 0..3 {
        let key = CacheKey::builder(format!("{}:{}", prefix, i)).build();
        writer
            .put(REGION, &key, b"v", None)
            .await
            .expect("put failed");
    }

    writer
        .clean(REGION, format!("{}:*", prefix).as_bytes())
        .await
        .expect("clean failed");

    for i in 0..3 {
        let key = CacheKey::builder(format!("{}:{}", prefix, i)).build();
        let value = writer.get(REGION, &key).await.expect("get failed");
        assert_eq!(value, None);
    }
}

#[tokio::test]
#[serial]
async fn test_locking_clean_waits_for_lock_release() {
    let Some(backend) = setup().await else { return };
    let writer = locking_writer(backend.clone());
    let prefix = unique_key("clean_wait");

    let key = CacheKey::builder(format!("{}:{}", prefix, 0)).build();
    writer
        .put(REGION, &key, b"v", None)
        .await
        .expect("put failed");

    // 外部持有区域锁，800毫秒后过期
    backend
        .set_px(format!("{}~lock", REGION).as_bytes(), b"external-holder", 800)
        .await
        .expect("failed to seed lock key");

    let start = Instant::now();
    writer
        .clean(REGION, format!("{}:*", prefix).as_bytes())
        .await
        .expect("clean failed");
    assert!(
        start.elapsed() >= Duration::from_millis(600),
        "clean should wait until the external lock clears"
    );

    let value = writer.get(REGION, &key).await.expect("get failed");
    assert_eq!(value, None);
}

#[tokio::test]
async fn test_prefixed_keys_share_region_pattern() {
    let Some(backend) = setup().await else { return };
    let writer = CacheWriter::non_locking(backend);
    let prefix = unique_key("prefixed");

    let key = CacheKey::builder("user:1")
        .use_prefix(format!("{}:", prefix))
        .build();
    assert!(key.has_prefix());

    writer
        .put(REGION, &key, b"v", None)
        .await
        .expect("put failed");
    writer
        .clean(REGION, format!("{}:*", prefix).as_bytes())
        .await
        .expect("clean failed");

    let value = writer.get(REGION, &key).await.expect("get failed");
    assert_eq!(value, None);
}
