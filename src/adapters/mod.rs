//! Device adapters
//!
//! Only the Yamaha Extended Control adapter exists today; the lifecycle and
//! host traits are kept separate so the API layer does not depend on it.

mod traits;
pub mod yamaha;

pub use traits::{DeviceHost, Startable};
