pub mod audio_sink;
pub mod command_dispatcher;
pub mod voice_observer;
pub mod event_service;

pub use event_service::VoiceEventService;
