pub mod buffer;
pub mod memory;
pub mod registry;
