pub mod handler;
pub mod service;
