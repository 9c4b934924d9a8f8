//! External service integrations.

pub mod twilio {
    pub use crate::gateway_client::*;
}
