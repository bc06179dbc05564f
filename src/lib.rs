pub mod accumulation;
pub mod application;
pub mod backend;
pub mod camera;
pub mod config;
pub mod error;
pub mod gpu;
pub mod renderer;
pub mod scene;
pub mod tiles;
pub mod uniforms;
pub mod util;
