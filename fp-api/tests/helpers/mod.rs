//! Test helper utilities
//!
//! Shared utilities for testing fp-api

#![allow(dead_code)]

pub mod fake_urban_api;
pub mod log_capture;
pub mod stubs;

pub use fake_urban_api::{
    building_feature, feature_collection, living_type_list, refused_url, truncated_body_server, FakeUrbanApi,
    LIVING_TYPE_ID,
};
pub use log_capture::{capture_logs, LogCapture};
pub use stubs::{raw_collection, service_with, FixedModel, PanickingParser, StubUrbanApi};
