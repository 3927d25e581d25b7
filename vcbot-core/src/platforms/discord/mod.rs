pub mod chat;
pub mod runtime;
pub mod songbird;

pub use runtime::DiscordPlatform;
