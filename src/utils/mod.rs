mod frame_buf;

pub use frame_buf::*;
