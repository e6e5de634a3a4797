// Imagemark Watermark Command Core Library

pub mod blend;
pub mod color;
pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod logging;
pub mod params;
pub mod processor;
