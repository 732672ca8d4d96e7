//! Shared building blocks for the GitHub-to-Slack notifier.
//! This crate provides the metadata codec, image extraction, message composition,
//! event classification, and the transport traits consumed by the runtime crate.

pub mod compose;
pub mod event;
pub mod image_extract;
pub mod markdown;
pub mod mentions;
pub mod metadata;
pub mod transport;
pub mod transport_helpers;
