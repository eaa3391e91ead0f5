//! Pagesnap - on-demand PNG rendering of positioned text and image layouts
//!
//! Requests are composed into HTML, loaded into a shared headless browser and
//! captured. This library exposes modules for integration testing.

pub mod api;
pub mod error;
pub mod models;
pub mod rendering;
pub mod server;
pub mod services;
