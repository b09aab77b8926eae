pub mod eye_overlay;
