//! Time-to-live cache for readings that are polled in tight loops.

use std::time::{Duration, Instant};

/// A cached reading with a fixed time-to-live.
///
/// A reading is fresh if it was taken no longer than `interval` ago. Stale or absent readings
/// are refreshed synchronously by [`CachedReading::get_or_refresh`]. If the refresh fails, the
/// reading is invalidated, such that a stale value is never handed out silently.
#[derive(Clone, Debug)]
pub struct CachedReading<T> {
    value: Option<T>,
    timestamp: Option<Instant>,
    interval: Duration,
}

impl<T: Clone> CachedReading<T> {
    /// Create an empty cache with the given time-to-live.
    pub fn new(interval: Duration) -> Self {
        Self {
            value: None,
            timestamp: None,
            interval,
        }
    }

    /// Get the time-to-live of the cache.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Set a new time-to-live. Cached values are kept.
    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    /// Check if a value is cached that is no older than the interval.
    pub fn is_fresh(&self) -> bool {
        match (&self.value, self.timestamp) {
            (Some(_), Some(timestamp)) => timestamp.elapsed() <= self.interval,
            _ => false,
        }
    }

    /// The cached value, regardless of its age.
    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Store a new value, timestamped now.
    pub fn set(&mut self, value: T) {
        self.value = Some(value);
        self.timestamp = Some(Instant::now());
    }

    /// Drop the cached value.
    pub fn invalidate(&mut self) {
        self.value = None;
        self.timestamp = None;
    }

    /// Return the cached value if it is fresh, otherwise call `refresh` and cache its result.
    ///
    /// If `refresh` fails, the cache is invalidated and the error is returned.
    pub fn get_or_refresh<E, F>(&mut self, refresh: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        if self.is_fresh() {
            if let Some(value) = &self.value {
                return Ok(value.clone());
            }
        }
        match refresh() {
            Ok(value) => {
                self.set(value.clone());
                Ok(value)
            }
            Err(err) => {
                self.invalidate();
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn test_empty_cache_is_not_fresh() {
        let cache: CachedReading<f64> = CachedReading::new(Duration::from_secs(10));
        assert!(!cache.is_fresh());
        assert!(cache.value().is_none());
    }

    #[test]
    fn test_fresh_value_is_returned_without_refresh() {
        let mut cache = CachedReading::new(Duration::from_secs(10));
        let mut calls = 0;
        for _ in 0..3 {
            let val: Result<f64, ()> = cache.get_or_refresh(|| {
                calls += 1;
                Ok(calls as f64)
            });
            assert_eq!(val, Ok(1.0));
        }
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_stale_value_is_refreshed() {
        let mut cache = CachedReading::new(Duration::from_millis(20));
        let first: Result<u32, ()> = cache.get_or_refresh(|| Ok(1));
        thread::sleep(Duration::from_millis(40));
        let second: Result<u32, ()> = cache.get_or_refresh(|| Ok(2));
        assert_eq!(first, Ok(1));
        assert_eq!(second, Ok(2));
    }

    #[test]
    fn test_failed_refresh_invalidates() {
        let mut cache = CachedReading::new(Duration::ZERO);
        cache.set(1.0);
        thread::sleep(Duration::from_millis(1));
        let res: Result<f64, &str> = cache.get_or_refresh(|| Err("unreachable"));
        assert_eq!(res, Err("unreachable"));
        assert!(cache.value().is_none());
    }
}
