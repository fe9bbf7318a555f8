//! # Testing
//!
//! Shared fixtures for exercising the offline transaction and sync core
//! without every crate's test module re-deriving the same boilerplate
//! (a migrated store, a deterministic device key, sample cache rows).
//!
//! Ground: the reference workspace's `testing::fixtures` module — a
//! flat set of functions building shared test infrastructure (there, a
//! `testcontainers` Postgres/Redis pair behind a `OnceCell`; here, a
//! tempfile-backed SQLite store, since the offline core's only storage
//! substrate is on-device SQLite and there is no container to start).

pub mod fixtures;
