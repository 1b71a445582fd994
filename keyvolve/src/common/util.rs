use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{SystemTime, SystemTimeError, UNIX_EPOCH};

/// Shared mutable cell used wherever interior mutability crosses a clone
/// boundary (e.g. the backtrace held inside a cloneable error).
pub type Atomic<T> = Arc<RwLock<T>>;

pub fn atomic<T>(t: T) -> Atomic<T> {
    Arc::new(RwLock::new(t))
}

#[inline]
pub fn epoch_millis() -> Result<i64, SystemTimeError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
}

// Fast path: returns 0 on any error instead of double error handling
#[inline]
pub fn epoch_millis_or_zero() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_millis() {
        let now = epoch_millis_or_zero();
        // Check if the current time is a positive number
        assert!(now > 0);
    }

    #[test]
    fn test_epoch_millis_result_ok() {
        let result = epoch_millis();
        assert!(result.is_ok());
        assert!(result.unwrap() > 0);
    }

    #[test]
    fn test_atomic_read_write() {
        let cell = atomic(1u32);
        {
            *cell.write() = 7;
        }
        assert_eq!(*cell.read(), 7);
    }
}
