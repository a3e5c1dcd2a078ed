//! Hackathon Hub Test Utilities
//!
//! Shared test infrastructure for the hub workspace:
//! - Gateway doubles that count, fail or stall calls
//! - Proptest generators for hub types
//! - Token signing for gated achievements
//! - Tracing bootstrap for test output

pub use hackhub_storage::InMemoryGateway;

pub use hackhub_core::{
    AchievementId, HubError, HubResult, StorageError, StorageResult, Ttl, UserId,
};

use std::sync::Once;
use tracing_subscriber::EnvFilter;

// ============================================================================
// TRACING
// ============================================================================

static TRACING: Once = Once::new();

/// Install a fmt subscriber writing through the test harness.
///
/// Honours `RUST_LOG`, defaulting to `warn`. Safe to call from every test.
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

// ============================================================================
// GATEWAY DOUBLES
// ============================================================================

pub mod gateways {
    //! [`PersistenceGateway`] wrappers for observing and disturbing calls.

    use async_trait::async_trait;
    use hackhub_core::{RowId, StorageError, StorageResult};
    use hackhub_storage::{Document, PersistenceGateway, Record, RecordKey};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    /// Per-operation call counts.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct CallCounts {
        pub read_one: usize,
        pub read_all: usize,
        pub insert: usize,
        pub update: usize,
    }

    impl CallCounts {
        pub fn reads(&self) -> usize {
            self.read_one + self.read_all
        }

        pub fn writes(&self) -> usize {
            self.insert + self.update
        }
    }

    /// Counts every call before delegating.
    #[derive(Debug, Default)]
    pub struct CountingGateway<G> {
        inner: G,
        read_one: AtomicUsize,
        read_all: AtomicUsize,
        insert: AtomicUsize,
        update: AtomicUsize,
    }

    impl<G> CountingGateway<G> {
        pub fn new(inner: G) -> Self {
            Self {
                inner,
                read_one: AtomicUsize::new(0),
                read_all: AtomicUsize::new(0),
                insert: AtomicUsize::new(0),
                update: AtomicUsize::new(0),
            }
        }

        pub fn inner(&self) -> &G {
            &self.inner
        }

        pub fn counts(&self) -> CallCounts {
            CallCounts {
                read_one: self.read_one.load(Ordering::SeqCst),
                read_all: self.read_all.load(Ordering::SeqCst),
                insert: self.insert.load(Ordering::SeqCst),
                update: self.update.load(Ordering::SeqCst),
            }
        }
    }

    #[async_trait]
    impl<G: PersistenceGateway> PersistenceGateway for CountingGateway<G> {
        async fn read_one(&self, key: &RecordKey) -> StorageResult<Option<Record>> {
            self.read_one.fetch_add(1, Ordering::SeqCst);
            self.inner.read_one(key).await
        }

        async fn read_all(&self, collection: &str) -> StorageResult<Vec<Record>> {
            self.read_all.fetch_add(1, Ordering::SeqCst);
            self.inner.read_all(collection).await
        }

        async fn insert(&self, record: Record) -> StorageResult<RowId> {
            self.insert.fetch_add(1, Ordering::SeqCst);
            self.inner.insert(record).await
        }

        async fn update(&self, key: &RecordKey, fields: Document) -> StorageResult<()> {
            self.update.fetch_add(1, Ordering::SeqCst);
            self.inner.update(key, fields).await
        }
    }

    /// Fails calls on demand with [`StorageError::Unavailable`].
    #[derive(Debug, Default)]
    pub struct FlakyGateway<G> {
        inner: G,
        failing: AtomicBool,
        fail_next: AtomicUsize,
    }

    impl<G> FlakyGateway<G> {
        pub fn new(inner: G) -> Self {
            Self {
                inner,
                failing: AtomicBool::new(false),
                fail_next: AtomicUsize::new(0),
            }
        }

        pub fn inner(&self) -> &G {
            &self.inner
        }

        /// Fail every call until switched back.
        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        /// Fail only the next `calls` calls.
        pub fn fail_next(&self, calls: usize) {
            self.fail_next.store(calls, Ordering::SeqCst);
        }

        fn check(&self, operation: &str) -> StorageResult<()> {
            let one_off = self
                .fail_next
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if one_off || self.failing.load(Ordering::SeqCst) {
                return Err(StorageError::Unavailable {
                    reason: format!("injected {} failure", operation),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl<G: PersistenceGateway> PersistenceGateway for FlakyGateway<G> {
        async fn read_one(&self, key: &RecordKey) -> StorageResult<Option<Record>> {
            self.check("read_one")?;
            self.inner.read_one(key).await
        }

        async fn read_all(&self, collection: &str) -> StorageResult<Vec<Record>> {
            self.check("read_all")?;
            self.inner.read_all(collection).await
        }

        async fn insert(&self, record: Record) -> StorageResult<RowId> {
            self.check("insert")?;
            self.inner.insert(record).await
        }

        async fn update(&self, key: &RecordKey, fields: Document) -> StorageResult<()> {
            self.check("update")?;
            self.inner.update(key, fields).await
        }
    }

    /// Delays every call by a fixed amount before delegating.
    #[derive(Debug)]
    pub struct SlowGateway<G> {
        inner: G,
        delay: Duration,
    }

    impl<G> SlowGateway<G> {
        pub fn new(inner: G, delay: Duration) -> Self {
            Self { inner, delay }
        }

        pub fn inner(&self) -> &G {
            &self.inner
        }
    }

    #[async_trait]
    impl<G: PersistenceGateway> PersistenceGateway for SlowGateway<G> {
        async fn read_one(&self, key: &RecordKey) -> StorageResult<Option<Record>> {
            tokio::time::sleep(self.delay).await;
            self.inner.read_one(key).await
        }

        async fn read_all(&self, collection: &str) -> StorageResult<Vec<Record>> {
            tokio::time::sleep(self.delay).await;
            self.inner.read_all(collection).await
        }

        async fn insert(&self, record: Record) -> StorageResult<RowId> {
            tokio::time::sleep(self.delay).await;
            self.inner.insert(record).await
        }

        async fn update(&self, key: &RecordKey, fields: Document) -> StorageResult<()> {
            tokio::time::sleep(self.delay).await;
            self.inner.update(key, fields).await
        }
    }

    /// Reads answer from a snapshot taken before `read_lag`; writes land
    /// only after `write_lag`. Models a store whose replies are in flight
    /// while other callers keep writing.
    #[derive(Debug)]
    pub struct LaggingGateway<G> {
        inner: G,
        read_lag: Duration,
        write_lag: Duration,
    }

    impl<G> LaggingGateway<G> {
        pub fn new(inner: G, read_lag: Duration, write_lag: Duration) -> Self {
            Self {
                inner,
                read_lag,
                write_lag,
            }
        }

        pub fn inner(&self) -> &G {
            &self.inner
        }
    }

    #[async_trait]
    impl<G: PersistenceGateway> PersistenceGateway for LaggingGateway<G> {
        async fn read_one(&self, key: &RecordKey) -> StorageResult<Option<Record>> {
            let snapshot = self.inner.read_one(key).await;
            tokio::time::sleep(self.read_lag).await;
            snapshot
        }

        async fn read_all(&self, collection: &str) -> StorageResult<Vec<Record>> {
            let snapshot = self.inner.read_all(collection).await;
            tokio::time::sleep(self.read_lag).await;
            snapshot
        }

        async fn insert(&self, record: Record) -> StorageResult<RowId> {
            tokio::time::sleep(self.write_lag).await;
            self.inner.insert(record).await
        }

        async fn update(&self, key: &RecordKey, fields: Document) -> StorageResult<()> {
            tokio::time::sleep(self.write_lag).await;
            self.inner.update(key, fields).await
        }
    }
}

pub use gateways::{CallCounts, CountingGateway, FlakyGateway, LaggingGateway, SlowGateway};

// ============================================================================
// TOKENS
// ============================================================================

pub mod tokens {
    //! Token minting for gated achievements in tests.

    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    type HmacSha256 = Hmac<Sha256>;

    /// Sign `step` of `achievement` the way a `signed_step` policy verifies it.
    pub fn sign_step_token(secret: &str, achievement: &str, step: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(format!("{}:{}", achievement, step).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

pub use tokens::sign_step_token;

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for hub types.

    use super::*;
    use proptest::prelude::*;
    use uuid::Uuid;

    /// Generate a random UserId.
    pub fn arb_user_id() -> impl Strategy<Value = UserId> {
        any::<[u8; 16]>().prop_map(|bytes| UserId::new(Uuid::from_bytes(bytes)))
    }

    /// Generate an explicit, slug-shaped AchievementId.
    pub fn arb_achievement_id() -> impl Strategy<Value = AchievementId> {
        "[a-z][a-z0-9-]{0,15}".prop_map(AchievementId::new)
    }

    /// Generate a Ttl, occasionally `Never`.
    pub fn arb_ttl() -> impl Strategy<Value = Ttl> {
        prop_oneof![
            1 => Just(Ttl::Never),
            4 => (0i64..3_600_000).prop_map(Ttl::from_millis),
        ]
    }

    /// Generate a plausible achievement maximum.
    pub fn arb_max_progress() -> impl Strategy<Value = u32> {
        1u32..12
    }
}
