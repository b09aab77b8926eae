pub mod constants;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod job_thread;
pub mod nv21;
pub mod raw_frame;
pub mod resolution;
pub mod settings;
pub mod sync;
