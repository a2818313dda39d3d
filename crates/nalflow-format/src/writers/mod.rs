//! 输出端实现.

pub mod rawvideo;

pub use rawvideo::RawVideoWriter;
