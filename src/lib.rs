pub mod config;
pub mod db;
pub mod dbmanager;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod service;
pub mod upload;

pub use error::PanelError;
