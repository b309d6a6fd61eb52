//! Priority-ordered list of upstream endpoints.

use std::collections::HashSet;

use fleet_core::UpstreamConfig;
use fleet_state::UpstreamEndpoint;

use crate::error::{FailoverError, FailoverResult};

/// Immutable, non-empty list of upstreams sorted by priority.
///
/// Endpoints with equal priority keep their configured order.
#[derive(Debug, Clone)]
pub struct UpstreamRegistry {
    endpoints: Vec<UpstreamEndpoint>,
}

impl UpstreamRegistry {
    pub fn new(mut endpoints: Vec<UpstreamEndpoint>) -> FailoverResult<Self> {
        if endpoints.is_empty() {
            return Err(FailoverError::NoUpstreams);
        }
        let mut seen = HashSet::new();
        for endpoint in &endpoints {
            if endpoint.id.trim().is_empty() {
                return Err(FailoverError::InvalidConfig("upstream with empty id".into()));
            }
            if endpoint.address.trim().is_empty() {
                return Err(FailoverError::InvalidConfig(format!(
                    "upstream {} has an empty address",
                    endpoint.id
                )));
            }
            if !seen.insert(endpoint.id.as_str()) {
                return Err(FailoverError::InvalidConfig(format!(
                    "duplicate upstream id {}",
                    endpoint.id
                )));
            }
        }
        endpoints.sort_by_key(|e| e.priority);
        Ok(Self { endpoints })
    }

    /// Build from `[[failover.upstreams]]` entries.
    pub fn from_config(upstreams: &[UpstreamConfig]) -> FailoverResult<Self> {
        Self::new(
            upstreams
                .iter()
                .map(|u| UpstreamEndpoint {
                    id: u.id.clone(),
                    address: u.address.clone(),
                    priority: u.priority,
                    credential_ref: u.credential_ref.clone(),
                })
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Endpoint at `index`, wrapping around.
    pub fn get(&self, index: usize) -> &UpstreamEndpoint {
        &self.endpoints[index % self.endpoints.len()]
    }

    pub fn next_index(&self, index: usize) -> usize {
        (index + 1) % self.endpoints.len()
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.endpoints.iter().position(|e| e.id == id)
    }

    pub fn endpoints(&self) -> &[UpstreamEndpoint] {
        &self.endpoints
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(id: &str, priority: u32) -> UpstreamEndpoint {
        UpstreamEndpoint {
            id: id.to_string(),
            address: format!("{id}.example.net:3333"),
            priority,
            credential_ref: None,
        }
    }

    #[test]
    fn sorted_by_priority_stably() {
        let reg = UpstreamRegistry::new(vec![
            endpoint("backup", 10),
            endpoint("primary", 0),
            endpoint("secondary-a", 5),
            endpoint("secondary-b", 5),
        ])
        .unwrap();

        let ids: Vec<_> = reg.endpoints().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["primary", "secondary-a", "secondary-b", "backup"]);
        assert_eq!(reg.position("backup"), Some(3));
    }

    #[test]
    fn rejects_empty_and_duplicates() {
        assert_eq!(UpstreamRegistry::new(vec![]).unwrap_err(), FailoverError::NoUpstreams);

        let err = UpstreamRegistry::new(vec![endpoint("a", 0), endpoint("a", 1)]).unwrap_err();
        assert!(matches!(err, FailoverError::InvalidConfig(msg) if msg.contains("duplicate")));

        let mut blank = endpoint("b", 0);
        blank.address = " ".into();
        assert!(matches!(
            UpstreamRegistry::new(vec![blank]),
            Err(FailoverError::InvalidConfig(_))
        ));
    }

    #[test]
    fn indices_wrap() {
        let reg = UpstreamRegistry::new(vec![endpoint("a", 0), endpoint("b", 1)]).unwrap();
        assert_eq!(reg.next_index(0), 1);
        assert_eq!(reg.next_index(1), 0);
        assert_eq!(reg.get(2).id, "a");
    }

    #[test]
    fn from_config_copies_fields() {
        let reg = UpstreamRegistry::from_config(&[UpstreamConfig {
            id: "p".into(),
            address: "pool:1".into(),
            priority: 3,
            credential_ref: Some("vault:p".into()),
        }])
        .unwrap();
        assert_eq!(reg.get(0).credential_ref.as_deref(), Some("vault:p"));
        assert_eq!(reg.get(0).priority, 3);
    }
}
