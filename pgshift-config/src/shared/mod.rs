mod base;
mod connection;
mod log;
mod shift;
mod store;

pub use base::*;
pub use connection::*;
pub use log::*;
pub use shift::*;
pub use store::*;
