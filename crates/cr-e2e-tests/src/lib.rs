//! Test-only crate. The suites live in `tests/`.
