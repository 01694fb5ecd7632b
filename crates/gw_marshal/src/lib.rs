#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

// -----------------------------------------------------------------------------
// Compilation config

/// Returns `true` when class stack tracking is compiled in.
pub(crate) const fn debug_enabled() -> bool {
    cfg!(all(debug_assertions, feature = "debug"))
}

// -----------------------------------------------------------------------------
// Allocation

extern crate alloc;

// -----------------------------------------------------------------------------
// Modules

mod class_stack;
mod config;
mod error;
mod factory;
mod session;
mod tracker;

pub mod class;
pub mod descriptor;
pub mod io;
pub mod marshal;
pub mod model;
pub mod protocol;
pub mod strategy;
pub mod unmarshal;

// -----------------------------------------------------------------------------
// Top-Level exports

pub use config::{DescriptorCachePolicy, MarshallingConfiguration, MarshallingOptions};
pub use error::{Corruption, ErrorCategory, MarshalError, Result};
pub use factory::MarshallerFactory;
pub use marshal::{Marshaller, ObjectWriteContext};
pub use unmarshal::{ObjectReadContext, Unmarshaller};
