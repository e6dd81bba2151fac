pub mod traits;
pub mod bounds;
pub mod run;
pub mod manager;

pub use manager::{ConfigManager, AppConfig};
pub use bounds::BoundsConfig;
pub use run::RunConfig;
