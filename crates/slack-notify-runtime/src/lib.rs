//! Notification lifecycle runtime: state persistence, image uploads and event dispatch.

pub mod dispatcher;
pub mod image_uploader;
pub mod state_store;

pub use dispatcher::{
    DispatchAction, DispatchReport, DispatcherConfig, NotificationDispatcher, NotificationState,
};
pub use image_uploader::{fetch_images, upload_filename, upload_images, FetchedImage};
pub use state_store::{LoadedState, NotificationStateStore};

#[cfg(test)]
mod fakes;
