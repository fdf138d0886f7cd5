//! Shared utility helpers.

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hasher};
use std::time::{SystemTime, UNIX_EPOCH};

/// A fresh pseudo-random `u64`, seeded from `RandomState` and the clock.
///
/// Not suitable for anything security related.
fn random_u64() -> u64 {
    let s = RandomState::new();
    let mut h = s.build_hasher();
    h.write_u64(
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64,
    );
    h.finish()
}

/// Pick one element at random, or `None` for an empty slice.
pub fn pick_random<T>(items: &[T]) -> Option<&T> {
    if items.is_empty() {
        return None;
    }
    let idx = (random_u64() % items.len() as u64) as usize;
    items.get(idx)
}

/// Truncate a string to `max` bytes, appending `…` if trimmed.
pub fn truncate_str(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) && end > 0 {
            end -= 1;
        }
        format!("{}…", &s[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pick_random_empty() {
        let empty: [u8; 0] = [];
        assert!(pick_random(&empty).is_none());
    }

    #[test]
    fn pick_random_stays_in_bounds() {
        let items = [1, 2, 3];
        for _ in 0..50 {
            assert!(items.contains(pick_random(&items).unwrap()));
        }
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_str("short", 10), "short");
        assert_eq!(truncate_str("héllo", 2), "h…");
    }
}
