//! Mock servers for adapter integration testing
//!
//! These mock servers simulate Yamaha receivers, allowing full integration
//! testing without real hardware.

#![allow(dead_code)]

pub mod yamaha;

pub use yamaha::MockYamahaReceiver;
