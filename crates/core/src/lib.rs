//! Camera preview sizing and a timer-driven face detection pipeline.
//!
//! The crate is organised by concern, each split into a `domain` layer
//! (types and ports) and an `infrastructure` layer (concrete adapters):
//!
//! - [`preview`]: picks the capture resolution that best fits a viewport.
//! - [`capture`]: the camera port plus software and still-image cameras.
//! - [`imaging`]: converts camera-native frames into detector surfaces.
//! - [`detection`]: the face detector port and its BlazeFace backend.
//! - [`pipeline`]: the request → capture → transcode → detect → deliver cycle.
//! - [`overlay`]: eye marker geometry for redrawing on new results.

pub mod capture;
pub mod detection;
pub mod imaging;
pub mod overlay;
pub mod pipeline;
pub mod preview;
pub mod shared;
