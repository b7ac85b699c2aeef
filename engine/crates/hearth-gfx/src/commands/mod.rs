pub mod command;
pub mod frame_sync;
