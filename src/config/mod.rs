mod server;

pub use server::{ServerConfig, WebhookConfig};
