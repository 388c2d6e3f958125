//! Black-box integration tests for the sentinel agent. No public API of its
//! own; see `tests/` for the actual test binaries.
