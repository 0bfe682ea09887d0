mod core;
mod data;
mod ops;
mod plugin;
mod toolbar;
mod view;

pub use crate::core::*;
pub use crate::data::*;
pub use crate::ops::*;
pub use crate::plugin::*;
pub use crate::toolbar::*;
pub use crate::view::*;
