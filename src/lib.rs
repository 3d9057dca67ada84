//! Portal Core - realtime connection hub and shutdown event bus
//!
//! This crate fans broadcast messages out to many concurrently connected
//! WebSocket clients, and coordinates orderly process shutdown through
//! prefix-addressed cleanup callbacks.

pub mod adapters;
pub mod bootstrap;
pub mod config;
pub mod domain;
pub mod ports;
pub mod telemetry;
