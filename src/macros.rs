//! Stats macros (spec's ambient observability surface, §9): every call
//! site pays nothing when the `stats` feature is off — the counter
//! update is compiled out entirely rather than compiled to a no-op
//! store, since these sit on hot paths like `malloc` and every
//! collective round.

/// Increment a [`crate::stats::Stats`] counter by 1, e.g.
/// `stat_inc!(collective_calls)` at the top of a `CollectiveOps` method.
///
/// Compiles to nothing when the `stats` feature is disabled.
#[macro_export]
macro_rules! stat_inc {
    ($counter:ident) => {
        #[cfg(feature = "stats")]
        {
            $crate::stats::STATS
                .$counter
                .fetch_add(1, ::core::sync::atomic::Ordering::Relaxed);
        }
    };
}

/// Add `$val` to a [`crate::stats::Stats`] counter, e.g.
/// `stat_add!(alloc_bytes, size)` from the allocator's `malloc` path.
///
/// Compiles to nothing (including the value expression) when the `stats`
/// feature is disabled, so `$val` may be an expression only cheap to
/// evaluate under `stats`.
#[macro_export]
macro_rules! stat_add {
    ($counter:ident, $val:expr) => {
        #[cfg(feature = "stats")]
        {
            $crate::stats::STATS
                .$counter
                .fetch_add($val as u64, ::core::sync::atomic::Ordering::Relaxed);
        }
    };
}

#[cfg(all(test, feature = "stats"))]
mod tests {
    #[test]
    fn stat_inc_and_stat_add_update_the_named_counter() {
        // Other tests in this binary touch the same global counters
        // concurrently, so only assert this call's own contribution
        // landed, not an exact before/after delta.
        let before = crate::stats::snapshot();
        crate::stat_inc!(collective_calls);
        crate::stat_add!(collective_rounds, 3u64);
        let after = crate::stats::snapshot();
        assert!(after.collective_calls >= before.collective_calls + 1);
        assert!(after.collective_rounds >= before.collective_rounds + 3);
    }
}
