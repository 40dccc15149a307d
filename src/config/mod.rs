pub mod settings;

pub use settings::StorageConfig;
