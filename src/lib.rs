pub mod client;
pub mod endpoint;
pub mod stats;
pub mod wire;

pub use anyhow::{anyhow as err, bail, Error, Result};

pub use crate::client::MapClient;
pub use crate::endpoint::ServiceEndpoint;
pub use crate::stats::Latency;
pub use crate::wire::{Discipline, Op};
