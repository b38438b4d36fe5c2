#![cfg_attr(not(feature = "std"), no_std)]
#![doc = include_str!("../README.md")]
#![warn(missing_docs, missing_debug_implementations)]
mod backend;
mod free_list;
mod pool;
mod pooled;
mod spin_lock;
mod state;
mod tracing;

#[cfg(feature = "std")]
#[doc(hidden)]
pub mod singleton;

pub use backend::*;
pub use free_list::*;
pub use pool::*;
pub use pooled::{PoolLinks, Pooled};
pub use spin_lock::*;
pub use state::*;

#[cfg(feature = "std")]
#[doc(hidden)]
pub mod __private {
    pub use std::{cell::Cell, thread_local};
}
