//! Read/write concurrency limiter.
//!
//! Two independent buckets gate the transport: GET/HEAD requests draw from
//! the read bucket, everything else from the write bucket. A permit is held
//! for the whole request-plus-response and released on every exit path by
//! the guard's Drop.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::error::{Error, Result};

/// Direction of a request, deciding which bucket it draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

struct Bucket {
    semaphore: Arc<Semaphore>,
    in_flight: Arc<AtomicUsize>,
    capacity: usize,
}

impl Bucket {
    fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            capacity,
        }
    }

    async fn acquire(&self) -> Result<BucketGuard> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| Error::operational("request limiter was closed"))?;
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        Ok(BucketGuard {
            _permit: permit,
            in_flight: self.in_flight.clone(),
        })
    }
}

/// The client's two token buckets.
pub struct ReadWriteLimiter {
    read: Bucket,
    write: Bucket,
}

impl ReadWriteLimiter {
    /// Create a limiter with the given bucket sizes.
    #[must_use]
    pub fn new(read_concurrency: usize, write_concurrency: usize) -> Self {
        Self {
            read: Bucket::new(read_concurrency),
            write: Bucket::new(write_concurrency),
        }
    }

    /// Acquire a permit, suspending while the bucket is saturated.
    pub async fn acquire(&self, direction: Direction) -> Result<BucketGuard> {
        match direction {
            Direction::Read => self.read.acquire().await,
            Direction::Write => self.write.acquire().await,
        }
    }

    /// Live in-flight counts `(read, write)` for observability.
    #[must_use]
    pub fn in_flight(&self) -> (usize, usize) {
        (
            self.read.in_flight.load(Ordering::SeqCst),
            self.write.in_flight.load(Ordering::SeqCst),
        )
    }

    /// Configured bucket sizes `(read, write)`.
    #[must_use]
    pub fn capacity(&self) -> (usize, usize) {
        (self.read.capacity, self.write.capacity)
    }
}

/// Held for the duration of one request; releases the permit on drop.
pub struct BucketGuard {
    _permit: tokio::sync::OwnedSemaphorePermit,
    in_flight: Arc<AtomicUsize>,
}

impl Drop for BucketGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn buckets_are_independent() {
        let limiter = ReadWriteLimiter::new(1, 1);

        let _read = limiter.acquire(Direction::Read).await.unwrap();
        // the write bucket is untouched
        let _write = limiter.acquire(Direction::Write).await.unwrap();

        assert_eq!(limiter.in_flight(), (1, 1));
    }

    #[tokio::test]
    async fn guard_releases_on_drop() {
        let limiter = ReadWriteLimiter::new(2, 2);

        let guard = limiter.acquire(Direction::Read).await.unwrap();
        assert_eq!(limiter.in_flight().0, 1);
        drop(guard);
        assert_eq!(limiter.in_flight().0, 0);
    }

    #[tokio::test]
    async fn saturated_bucket_suspends() {
        let limiter = Arc::new(ReadWriteLimiter::new(1, 1));

        let held = limiter.acquire(Direction::Read).await.unwrap();

        let contender = {
            let limiter = limiter.clone();
            tokio::spawn(async move {
                let _guard = limiter.acquire(Direction::Read).await.unwrap();
            })
        };

        // the contender cannot finish while the permit is held
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(held);
        contender.await.unwrap();
        assert_eq!(limiter.in_flight().0, 0);
    }

    #[test]
    fn capacity_reports_configuration() {
        let limiter = ReadWriteLimiter::new(40, 80);
        assert_eq!(limiter.capacity(), (40, 80));
    }
}
