//! External service integrations.

pub mod auth_client {
    pub use crate::auth_client::*;
}
