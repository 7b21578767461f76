//! Suite-label resolution into canonical service names and test categories.

use crate::config::{ResolverConfig, ServiceKeyword};
use crate::core::Category;

/// Service name used when no keyword matches.
pub const UNKNOWN_SERVICE: &str = "Unknown Service";

/// Category keywords, checked in order.
const CATEGORY_KEYWORDS: &[(Category, &[&str])] = &[
    (Category::Unit, &["unit", "component"]),
    (Category::Api, &["api", "rest", "endpoint"]),
    (Category::Integration, &["integration", "contract"]),
    (Category::Ui, &["ui", "e2e", "end-to-end"]),
    (Category::System, &["system", "smoke", "regression"]),
];

/// Maps suite labels to services and categories. Total and deterministic.
#[derive(Debug, Clone)]
pub struct Resolver {
    services: Vec<ServiceKeyword>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new(&ResolverConfig::default())
    }
}

impl Resolver {
    pub fn new(config: &ResolverConfig) -> Self {
        let services = config
            .services
            .iter()
            .map(|k| ServiceKeyword {
                keyword: k.keyword.to_lowercase(),
                service: k.service.clone(),
            })
            .filter(|k| !k.keyword.is_empty())
            .collect();
        Self { services }
    }

    /// Canonical service for a suite label; the first keyword contained in the
    /// label wins.
    pub fn resolve_service(&self, label: Option<&str>) -> &str {
        let Some(label) = label else {
            return UNKNOWN_SERVICE;
        };
        let label = label.to_lowercase();
        self.services
            .iter()
            .find(|k| label.contains(&k.keyword))
            .map(|k| k.service.as_str())
            .unwrap_or(UNKNOWN_SERVICE)
    }

    /// Test category for a suite label, `unit` when nothing matches.
    pub fn resolve_category(&self, label: Option<&str>) -> Category {
        resolve_category(label)
    }
}

/// Test category for a suite label, `unit` when nothing matches.
pub fn resolve_category(label: Option<&str>) -> Category {
    let Some(label) = label else {
        return Category::Unit;
    };
    let label = label.to_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| label.contains(k)))
        .map(|(category, _)| *category)
        .unwrap_or(Category::Unit)
}
