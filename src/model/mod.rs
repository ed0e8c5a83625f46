pub mod common;
pub mod group;
pub mod request;

pub use common::*;
pub use group::*;
pub use request::*;
