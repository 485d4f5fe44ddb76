// Managers Module
//
// - BroadcastChannelManager: Tokio broadcast channels behind the async sample streams

pub mod broadcast_manager;

pub use broadcast_manager::BroadcastChannelManager;
