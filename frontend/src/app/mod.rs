pub mod assembler;
pub mod compositor;
pub mod config;
pub mod export;
pub mod loader;
pub mod playback;
pub mod radar;
pub mod timestamps;
pub mod utils;
