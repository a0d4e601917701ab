//! Opt-in logger initialization, matching the teacher crate's own
//! `simple_logger::init()` call in `main.rs`. Library code never calls this
//! implicitly; embedders and tests call it once if they want collector
//! trace output on stderr.

/// Initializes the global `log` backend. Safe to call more than once; only
/// the first call installs the logger.
pub fn init() {
    let _ = simple_logger::init();
}
