//! Notification dispatch: the queue consumer and the scheduled-job sweep.

mod scheduled;
mod worker;

use thiserror::Error;

use crate::crypto::CryptoError;
use crate::queue::QueueBackendError;
use crate::store::StoreError;
use crate::template::TemplateError;

pub use scheduled::ScheduledDispatchTask;
pub use worker::{JobOutcome, NotificationWorker};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Queue(#[from] QueueBackendError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Template(#[from] TemplateError),
}
