pub mod connection;
pub mod dashboard_registry;
pub mod device_registry;

pub use connection::*;
pub use dashboard_registry::*;
pub use device_registry::*;
