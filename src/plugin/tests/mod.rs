//! Plugin System Tests
//!
//! Registry, lifecycle and managed collector tests using mock drivers.
