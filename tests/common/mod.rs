//! Common test infrastructure for pagesnap integration tests.
//!
//! Each test file compiles its own copy of this module, so items may appear
//! unused from the perspective of a single test file even though they're
//! used elsewhere.

#![allow(dead_code)]
#![allow(unused_imports)]

pub mod app;
pub mod assertions;
pub mod fake_engine;
pub mod mock_server;

pub use app::{TestApp, TestDirs};
pub use assertions::*;
pub use fake_engine::{png_dimensions, white_png, EngineStats, FakeBehavior, FakeEngine};
pub use mock_server::MockHttpServer;
