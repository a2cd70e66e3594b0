mod model;
mod property_cache;

/// Iterations per property: small under miri and `test-fast`, larger on CI.
pub(crate) fn iterations() -> u64 {
    if cfg!(any(miri, feature = "test-fast")) {
        10
    } else if is_ci::cached() {
        5_000
    } else {
        500
    }
}
