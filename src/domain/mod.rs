//! Core domain types shared across the service.

pub mod notification;
pub mod ticket;

pub use notification::{
    Channel, DeliveryRecord, Notification, NotificationJob, NotificationStatus, Priority,
};
pub use ticket::{SupportTicket, TicketMessage, TicketPriority, TicketStatus};
