//! DevTools-protocol engine adapter: browser launch, wire connection, and
//! the [`CdpDriver`](crate::engine::CdpDriver) implementation of the
//! [`Driver`](crate::driver::Driver) contract.

mod cdp;
mod connection;
mod launcher;

pub use cdp::CdpDriver;
pub use launcher::EngineConfig;
