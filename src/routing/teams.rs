//! Team registry.

use serde::{Deserialize, Serialize};

use crate::domain::TicketPriority;

use super::{RoutingError, RoutingResult};

/// Id of the urgent-ticket escalation team
pub const ESCALATION_TEAM_ID: &str = "escalation";
/// Id of the unconditional fallback team
pub const GENERAL_TEAM_ID: &str = "general";

/// One support team as configured.
///
/// An empty `categories` list means the team accepts any category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub categories: Vec<String>,
    pub priorities: Vec<TicketPriority>,
    pub max_concurrent_tickets: usize,
    #[serde(default = "default_available")]
    pub available: bool,
}

fn default_available() -> bool {
    true
}

impl TeamConfig {
    pub fn accepts_category(&self, category: &str) -> bool {
        self.categories.is_empty() || self.categories.iter().any(|c| c == category)
    }

    pub fn accepts_priority(&self, priority: TicketPriority) -> bool {
        self.priorities.contains(&priority)
    }
}

/// Load and availability snapshot for one team.
#[derive(Debug, Clone, Serialize)]
pub struct TeamStatistics {
    pub id: String,
    pub name: String,
    pub current_tickets: usize,
    pub max_tickets: usize,
    /// Percentage of capacity in use
    pub utilization: f64,
    pub available: bool,
}

/// Teams in registration order. Registration order is the routing scan order,
/// which keeps first-match decisions deterministic and auditable.
pub struct TeamRegistry {
    teams: Vec<TeamConfig>,
}

impl TeamRegistry {
    /// Build the registry, validating that the general fallback exists.
    pub fn new(teams: Vec<TeamConfig>) -> RoutingResult<Self> {
        if !teams.iter().any(|t| t.id == GENERAL_TEAM_ID) {
            return Err(RoutingError::MissingGeneralTeam);
        }
        Ok(Self { teams })
    }

    pub fn get(&self, id: &str) -> Option<&TeamConfig> {
        self.teams.iter().find(|t| t.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TeamConfig> {
        self.teams.iter()
    }

    pub fn general(&self) -> &TeamConfig {
        // Validated at construction
        self.get(GENERAL_TEAM_ID).expect("general team registered")
    }

    pub fn escalation(&self) -> Option<&TeamConfig> {
        self.get(ESCALATION_TEAM_ID)
    }
}

/// The default team set used when configuration supplies none.
pub fn default_teams() -> Vec<TeamConfig> {
    use TicketPriority::{High, Low, Medium, Urgent};

    let standard = vec![Low, Medium, High];
    vec![
        TeamConfig {
            id: "payments".to_string(),
            name: "Payments Support".to_string(),
            categories: vec!["payment".to_string(), "billing".to_string()],
            priorities: standard.clone(),
            max_concurrent_tickets: 10,
            available: true,
        },
        TeamConfig {
            id: "vehicle".to_string(),
            name: "Vehicle Support".to_string(),
            categories: vec![
                "vehicle".to_string(),
                "maintenance".to_string(),
                "telematics".to_string(),
            ],
            priorities: standard.clone(),
            max_concurrent_tickets: 8,
            available: true,
        },
        TeamConfig {
            id: "accounts".to_string(),
            name: "Account Support".to_string(),
            categories: vec!["account".to_string(), "onboarding".to_string()],
            priorities: standard,
            max_concurrent_tickets: 8,
            available: true,
        },
        TeamConfig {
            id: ESCALATION_TEAM_ID.to_string(),
            name: "Escalation Team".to_string(),
            categories: vec![],
            priorities: vec![Urgent],
            max_concurrent_tickets: 5,
            available: true,
        },
        TeamConfig {
            id: GENERAL_TEAM_ID.to_string(),
            name: "General Support".to_string(),
            categories: vec![],
            priorities: vec![Low, Medium, High, Urgent],
            max_concurrent_tickets: 20,
            available: true,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_is_valid() {
        let registry = TeamRegistry::new(default_teams()).unwrap();
        assert!(registry.escalation().is_some());
        assert_eq!(registry.general().id, GENERAL_TEAM_ID);
    }

    #[test]
    fn test_missing_general_is_fatal() {
        let teams: Vec<TeamConfig> = default_teams()
            .into_iter()
            .filter(|t| t.id != GENERAL_TEAM_ID)
            .collect();
        assert!(matches!(
            TeamRegistry::new(teams),
            Err(RoutingError::MissingGeneralTeam)
        ));
    }

    #[test]
    fn test_empty_categories_accept_anything() {
        let registry = TeamRegistry::new(default_teams()).unwrap();
        let escalation = registry.escalation().unwrap();
        assert!(escalation.accepts_category("payment"));
        assert!(escalation.accepts_category("anything-else"));
        assert!(!escalation.accepts_priority(TicketPriority::High));

        let payments = registry.get("payments").unwrap();
        assert!(payments.accepts_category("billing"));
        assert!(!payments.accepts_category("vehicle"));
    }
}
