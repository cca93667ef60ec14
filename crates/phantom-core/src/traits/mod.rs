//! Core traits for backend behavior.

mod backend;

pub use backend::AuthBackend;
