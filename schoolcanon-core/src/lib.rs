// schoolcanon-core/src/lib.rs

// 1. Documentation
#![allow(missing_docs)]
// 2. Memory safety
#![deny(unsafe_code)]
// 3. Robustness
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
// 4. Performance
#![warn(clippy::perf)]

// --- HEXAGONAL MODULES ---

// 1. Ports (Interfaces / Traits)
// Ingestion collaborator, dataset sink and template engine contracts.
pub mod ports;

// 2. Domain (Core)
// Canonical schema, normalizer, harmonizer, vintage registry, adapters,
// merger, synthesizer. Depends on nothing else in the crate.
pub mod domain;

// 3. Infrastructure (Adapters)
// Config files, raw file readers (CSV through DuckDB, XLSX through calamine),
// DuckDB sink, catalog templating.
pub mod infrastructure;

// 4. Application (Use Cases)
// Pipeline orchestration, clean, catalog.
pub mod application;

// --- GLOBAL ERROR HANDLING ---
pub mod error;

// --- RE-EXPORTS (FACADE) ---
pub use error::CanonError;
