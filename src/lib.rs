//! Yamaha Bridge
//!
//! Finds Yamaha network receivers on the local network and exposes each one
//! as a device with observable properties and invocable actions.
//!
//! This library provides:
//! - SSDP discovery filtered to receivers that speak Yamaha Extended Control
//! - A per-receiver session that polls state and reports only real changes
//! - Power, volume, input and playback control
//! - An HTTP API with Server-Sent Events for real-time updates

pub mod adapters;
pub mod api;
pub mod bus;
pub mod config;
