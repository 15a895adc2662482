pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod service;
pub mod state;

pub use error::{AppError, Result};
