pub mod settings;

pub use settings::{FileSettingsStore, MemorySettingsStore, SettingsStore};
