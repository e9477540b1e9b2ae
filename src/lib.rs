#[cfg(feature = "gl")]
use gfx_backend_gl as back;

pub mod app;
pub mod config;
pub mod frame;
pub mod ledger;
pub mod renderer;
pub mod scene;

pub use app::run;
pub use config::WindowConfig;
pub use scene::Variant;
