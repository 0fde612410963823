pub mod config;
pub mod health;
pub mod rag;
pub mod sessions;
pub mod widget;
