pub mod size_selector;
