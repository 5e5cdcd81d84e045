pub mod catalog;
pub mod message;
pub mod routes;

pub mod prelude {
    pub use crate::catalog::{LikeProductForm, Product, ProductForm, ProductIdForm};
    pub use crate::message::{
        approve, ApproveMessageForm, MessageApprovedForm, PendingMessages, QueueName,
        SendMessageForm, APPROVAL_MARKER,
    };
}
