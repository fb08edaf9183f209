#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod allocator;
mod config;
mod error;
mod loader;
mod mutex;
mod segment;
mod sleep;
mod store;

pub use crate::allocator::*;
pub use crate::config::*;
pub use crate::error::*;
pub use crate::loader::*;
pub use crate::segment::*;
pub use crate::sleep::*;
pub use crate::store::*;
