//! Test-only logging setup.
//!
//! The core never installs a global [`tracing`] subscriber itself —
//! that's a CLI/daemon concern, out of scope per §1 — but its scan and
//! transition spans (§7 "Logging") are otherwise invisible in test
//! output without one. [`init_for_tests`] wires a minimal `fmt`
//! subscriber, once per process, for that purpose only.

use std::sync::Once;

static INIT: Once = Once::new();

/// Installs a `tracing-subscriber` `fmt` layer for the current process,
/// if one hasn't been installed yet. Safe to call from every test that
/// wants to see `debug!`/`trace!` output; repeated calls are no-ops.
#[cfg(test)]
pub fn init_for_tests() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init()
            .ok();
    });
}
