//! Support ticket routing.
//!
//! A static team registry is built from configuration once at startup; the
//! router recomputes team load from the ticket store before every decision so
//! no cached counter can go stale across decisions.

mod engine;
mod sweep;
mod teams;

use thiserror::Error;
use uuid::Uuid;

use crate::store::StoreError;

pub use engine::TicketRouter;
pub use sweep::TicketSweepTask;
pub use teams::{default_teams, TeamConfig, TeamRegistry, TeamStatistics};

#[derive(Debug, Error)]
pub enum RoutingError {
    /// Startup misconfiguration; the only fatal routing error.
    #[error("No general fallback team registered")]
    MissingGeneralTeam,

    #[error("Ticket not found: {0}")]
    UnknownTicket(Uuid),

    #[error("Unknown team: {0}")]
    UnknownTeam(String),

    #[error("Team {0} is not accepting tickets")]
    TeamUnavailable(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type RoutingResult<T> = Result<T, RoutingError>;
