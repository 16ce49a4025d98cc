pub mod config;
pub mod paths;
pub mod socket;
pub mod storage;

mod error;
mod store;
mod utils;

#[cfg(test)]
mod tests;

pub use config::{ConfigState, FileConfigLoad, InstancesInit, camera_url};
pub use error::{Error, Result};
pub use paths::{Paths, default_socket_path};
pub use socket::SocketState;
pub use storage::{FileStorage, MemoryStorage, Storage};
pub use store::{State, Store};
pub use utils::{capitalize, format_counter_time, start_case};

pub use lunadeck_types::*;
