//! REST API handlers

pub mod accounts;
pub mod admin;
pub mod health;
pub mod shared;
pub mod subscription;
pub mod webhook;

pub use accounts::*;
pub use admin::*;
pub use health::*;
pub use subscription::*;
pub use webhook::*;
