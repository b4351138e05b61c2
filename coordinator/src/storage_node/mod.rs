pub mod handler;
pub mod selection_policy;
pub mod service;
