//! Key-rotated rate limiter.
//!
//! Explorer APIs rate-limit per API key. Rotating round-robin over a pool of
//! N keys, each spaced at least `min_spacing` from its own previous use,
//! yields N times the throughput of a single key no matter which address is
//! asking.
//!
//! A slot is reserved inside one short critical section (cursor advance and
//! last-used update). The wait for the slot happens outside the lock.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::{Instant, sleep_until};

use burstwatch_common::error::AppError;

/// An API key handed out by [`KeyRotator::acquire`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    index: usize,
    key: String,
}

impl Credential {
    /// Position of the key in the pool.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

#[derive(Debug)]
struct RotationCursor {
    next: usize,
    /// Reserved use time per key; may lie in the future for a pending caller.
    last_used: Vec<Option<Instant>>,
}

/// Round-robin pool of API keys with per-key minimum spacing.
#[derive(Debug)]
pub struct KeyRotator {
    keys: Vec<String>,
    min_spacing: Duration,
    cursor: Mutex<RotationCursor>,
}

impl KeyRotator {
    pub fn new(keys: Vec<String>, min_spacing: Duration) -> Result<Self, AppError> {
        if keys.is_empty() {
            return Err(AppError::Config(
                "Key rotator needs at least one API key".to_string(),
            ));
        }

        let last_used = vec![None; keys.len()];
        Ok(Self {
            keys,
            min_spacing,
            cursor: Mutex::new(RotationCursor { next: 0, last_used }),
        })
    }

    /// Acquire the next key, waiting until its spacing constraint is satisfied.
    ///
    /// Never fails; only delays.
    pub async fn acquire(&self) -> Credential {
        let (index, ready_at) = {
            let mut cursor = self.cursor.lock();
            let index = cursor.next;
            cursor.next = (index + 1) % self.keys.len();

            let now = Instant::now();
            let ready_at = match cursor.last_used[index] {
                Some(last) => (last + self.min_spacing).max(now),
                None => now,
            };
            cursor.last_used[index] = Some(ready_at);
            (index, ready_at)
        };

        if ready_at > Instant::now() {
            tracing::trace!(
                key_index = index,
                wait_ms = (ready_at - Instant::now()).as_millis() as u64,
                "Waiting for API key spacing"
            );
            sleep_until(ready_at).await;
        }

        Credential {
            index,
            key: self.keys[index].clone(),
        }
    }

    /// Number of keys in rotation.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn min_spacing(&self) -> Duration {
        self.min_spacing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn keys(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("KEY{i}")).collect()
    }

    #[test]
    fn test_empty_pool_is_config_error() {
        let err = KeyRotator::new(Vec::new(), Duration::from_millis(200)).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_round_robin_order() {
        let rotator = KeyRotator::new(keys(3), Duration::from_millis(200)).unwrap();
        let mut order = Vec::new();
        for _ in 0..6 {
            order.push(rotator.acquire().await.key().to_string());
        }
        assert_eq!(order, vec!["KEY0", "KEY1", "KEY2", "KEY0", "KEY1", "KEY2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pool_allows_one_acquisition_per_key_per_window() {
        let rotator = KeyRotator::new(keys(5), Duration::from_millis(200)).unwrap();
        let start = Instant::now();

        for _ in 0..5 {
            rotator.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(200));

        // Sixth call reuses KEY0 and must wait out its spacing
        let credential = rotator.acquire().await;
        assert_eq!(credential.index(), 0);
        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_key_never_reused_within_spacing_under_concurrency() {
        let spacing = Duration::from_millis(200);
        let rotator = Arc::new(KeyRotator::new(keys(5), spacing).unwrap());

        let tasks: Vec<_> = (0..40)
            .map(|_| {
                let rotator = rotator.clone();
                tokio::spawn(async move {
                    let credential = rotator.acquire().await;
                    (credential.index(), Instant::now())
                })
            })
            .collect();

        let mut uses: HashMap<usize, Vec<Instant>> = HashMap::new();
        for task in tasks {
            let (index, at) = task.await.unwrap();
            uses.entry(index).or_default().push(at);
        }

        assert_eq!(uses.len(), 5);
        for times in uses.values_mut() {
            assert_eq!(times.len(), 8);
            times.sort();
            for pair in times.windows(2) {
                assert!(pair[1] - pair[0] >= spacing);
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_key_is_not_delayed() {
        let rotator = KeyRotator::new(keys(1), Duration::from_millis(200)).unwrap();
        rotator.acquire().await;
        tokio::time::sleep(Duration::from_millis(500)).await;

        let start = Instant::now();
        rotator.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
