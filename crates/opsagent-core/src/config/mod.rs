//! Configuration layer: declared env keys, `.env` support, domain structs.

pub mod env_keys;
pub mod loader;
pub mod schema;

pub use loader::{load_dotenv, EnvKey};
pub use schema::{LlmConfig, ObservabilityConfig};
