//! Request handlers.

pub mod engagement;
pub mod health;
pub mod highlights;
pub mod jobs;
pub mod stream;
pub mod unsubscribe;
pub mod upload;
