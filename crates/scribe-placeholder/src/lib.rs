mod config;
mod plugin;

pub use crate::config::*;
pub use crate::plugin::*;
