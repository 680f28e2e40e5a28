//! # PeerCloud Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/          # Topology and merge-engine benchmarks
//! └── src/integration/  # Membership + locality flows across crates
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p pc-tests
//! cargo bench -p pc-tests
//! ```

pub mod integration;
