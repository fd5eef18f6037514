//! Controller variants
//!
//! Each variant owns its typed register device and the module configuration,
//! and implements [`BootOps`](crate::BootOps) with its own register tables.

pub mod bm24218;
pub mod dw9781c;

pub use bm24218::Bm24218;
pub use dw9781c::Dw9781c;
