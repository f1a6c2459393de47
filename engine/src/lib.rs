pub mod batch;
pub mod config;
pub mod image_model;
