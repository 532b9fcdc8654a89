pub mod binding;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod debug;
pub mod error;
pub mod geometry;
pub mod heading;
pub mod route;
pub mod scene;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{RoutingConfig, load_config};
pub use route::{ElbowArrowUpdates, RouteOptions, update_elbow_arrow_points};
pub use scene::Scene;
