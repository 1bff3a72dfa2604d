//! UI components for the Lumen shell

pub mod notification;

pub use notification::{render_notification, NotificationAction, NotificationModel};
