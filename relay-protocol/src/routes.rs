//! Route paths exposed by the relay services.
//!
//! Both services and their clients build URLs from these constants so a
//! renamed endpoint cannot drift between caller and callee.

pub const HEALTH: &str = "/health";
pub const INDEX: &str = "/";

/// Submission service: accepts a new message from a submitter.
pub const SEND_MESSAGE: &str = "/send_message";
/// Submission service: terminal callback fired by moderation.
pub const MESSAGE_APPROVED: &str = "/message_approved";
pub const LIKE_PRODUCT: &str = "/like_product";

/// Moderation service: approves a forwarded message.
pub const APPROVE_MESSAGE: &str = "/approve_message";
pub const ADD_PRODUCT: &str = "/add_product";
pub const UPDATE_PRODUCT: &str = "/update_product";
pub const DELETE_PRODUCT: &str = "/delete_product";
