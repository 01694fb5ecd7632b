#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub use gw_marshal as marshal;
pub use gw_utils as utils;

pub use gw_marshal::{Marshaller, MarshallerFactory, Unmarshaller};
pub use gw_marshal::{MarshalError, MarshallingConfiguration, MarshallingOptions};
