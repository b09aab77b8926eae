pub mod backend_factory;
pub mod eye_pair_detector;
pub mod model_resolver;
pub mod onnx_blazeface_backend;
pub mod unsupported_backend;
