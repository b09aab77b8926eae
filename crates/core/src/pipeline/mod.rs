pub mod cycle_guard;
pub mod detection_listener;
pub mod display_dispatcher;
pub mod frame_detection_pipeline;
pub mod periodic_scheduler;
pub mod pipeline_logger;
