//! Provisions a container group for every configuration file written
//! to a file share, as reported by the share's change notifications.

pub mod app;
pub mod client;
pub mod conf;
pub mod credential;
pub mod error;
pub mod event;
pub mod host;
pub mod request;
