// Configuration management module
// TOML settings stored in the data directory, plus interactive setup

pub mod interactive;
pub mod settings;


pub use interactive::{run_interactive_config, show_config};
pub use settings::{Config, ConfigError, DATA_DIR_ENV, LlmConfig, OllamaConfig};

/// Get the default data directory path
#[inline]
pub fn get_data_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::default_dir()
}
