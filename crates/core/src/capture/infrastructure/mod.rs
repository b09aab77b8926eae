pub mod image_file_capture_source;
pub mod synthetic_capture_source;
pub mod synthetic_scene;
