pub mod codec;
pub mod store;

pub use codec::{load, save, SCHEMA_VERSION};
pub use store::{load_from_file, save_to_file};
