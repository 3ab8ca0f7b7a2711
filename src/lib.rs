//! fleet-tracker - live fleet tracking core for the dealer portal
//!
//! Aggregates truck positions and order tracking from a REST snapshot plus a
//! realtime channel, reconciles road routes through a bounded cache and
//! assembles map scenes and workflow status views.

pub mod api;
pub mod config;
pub mod interfaces;
pub mod map;
pub mod model;
pub mod realtime;
pub mod routing;
pub mod tracking;
pub mod utils;
pub mod workflow;
