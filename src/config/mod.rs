/*!
 * Instantiation Config
 * Serde config, fluent builder, and validated instance settings
 */

mod builder;
mod instance;
mod types;

pub use builder::HostConfigBuilder;
pub use instance::InstanceConfig;
pub use types::{ConfigError, HostConfig, HostLimits, PreopenConfig, CONFIG_ENV_VAR};
