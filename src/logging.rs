//! Dev-only logging setup for this crate's own tests and benchmarks.
//!
//! The crate itself never installs a `log` subscriber — see the crate-level
//! docs and `SPEC_FULL.md` §1 — but its test harness needs one to see
//! `trace!`/`debug!` output, the same way the embedding application would
//! wire one up in production.

use std::sync::Once;

static INIT: Once = Once::new();

/// Installs an [`env_logger`] subscriber once per test process. Safe to call
/// from every test; subsequent calls are no-ops.
#[cfg(test)]
pub fn init_test_logger() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}
