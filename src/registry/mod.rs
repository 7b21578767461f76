//! Static service metadata: dependency graph, test coverage and failure history.
//!
//! The registry is loaded from a TOML or JSON artifact so the graph can evolve
//! without a rebuild:
//!
//! ```toml
//! [services.order-service]
//! criticality = "HIGH"
//! dependencies = ["user-service", "product-service"]
//! dependents = ["notification-service"]
//! api_endpoints = ["/api/orders"]
//! failure_rate = 0.12
//!
//! [services.order-service.coverage.unit]
//! coverage = 91.0
//! tests = 180
//! avg_duration_ms = 90.0
//! ```

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;
use std::path::Path;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};

/// How important a service is to the whole system.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Criticality {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl fmt::Display for Criticality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Criticality::Low => "LOW",
            Criticality::Medium => "MEDIUM",
            Criticality::High => "HIGH",
            Criticality::Critical => "CRITICAL",
        })
    }
}

/// Coverage of one test category of a service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageEntry {
    /// Line coverage percentage (0-100).
    pub coverage: f64,
    #[serde(default)]
    pub tests: u32,
    #[serde(default)]
    pub avg_duration_ms: f64,
}

/// One service as declared in the registry file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSpec {
    pub dependencies: Vec<String>,
    pub dependents: Vec<String>,
    pub criticality: Criticality,
    pub api_endpoints: Vec<String>,
    /// Category label (unit, api, contract, ...) to coverage.
    pub coverage: BTreeMap<String, CoverageEntry>,
    /// Historical failure rate in 0-1, if incident data exists.
    pub failure_rate: Option<f64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct RegistryFile {
    services: BTreeMap<String, ServiceSpec>,
}

/// Service registry with a dependents graph (edge `a -> b` means `b` depends on `a`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "RegistryFile", into = "RegistryFile")]
pub struct Registry {
    services: BTreeMap<String, ServiceSpec>,
    graph: DiGraph<String, ()>,
    index: HashMap<String, NodeIndex>,
}

impl TryFrom<RegistryFile> for Registry {
    type Error = String;

    fn try_from(file: RegistryFile) -> std::result::Result<Self, Self::Error> {
        Registry::from_services(file.services).map_err(|e| e.to_string())
    }
}

impl From<Registry> for RegistryFile {
    fn from(registry: Registry) -> Self {
        RegistryFile {
            services: registry.services,
        }
    }
}

impl Registry {
    /// Build the registry and its dependents graph.
    ///
    /// A service `s` gains dependent `d` when `s` lists `d` under `dependents`
    /// or when `d` lists `s` under `dependencies`.
    pub fn from_services(services: BTreeMap<String, ServiceSpec>) -> Result<Self> {
        for (name, spec) in &services {
            if let Some(rate) = spec.failure_rate {
                if !(0.0..=1.0).contains(&rate) {
                    return Err(Error::registry(format!(
                        "{name}: failure_rate {rate} outside 0-1"
                    )));
                }
            }
            if let Some((category, entry)) = spec
                .coverage
                .iter()
                .find(|(_, e)| !e.coverage.is_finite() || e.coverage < 0.0)
            {
                return Err(Error::registry(format!(
                    "{name}: coverage for {category} is invalid ({})",
                    entry.coverage
                )));
            }
        }

        let mut graph = DiGraph::new();
        let mut index = HashMap::new();
        let mut node = |graph: &mut DiGraph<String, ()>, name: &str| -> NodeIndex {
            *index
                .entry(name.to_string())
                .or_insert_with(|| graph.add_node(name.to_string()))
        };

        for name in services.keys() {
            node(&mut graph, name);
        }
        for (name, spec) in &services {
            let from = node(&mut graph, name);
            for dependent in &spec.dependents {
                let to = node(&mut graph, dependent);
                graph.update_edge(from, to, ());
            }
        }
        for (name, spec) in &services {
            let to = node(&mut graph, name);
            for dependency in &spec.dependencies {
                let from = node(&mut graph, dependency);
                graph.update_edge(from, to, ());
            }
        }

        Ok(Self {
            services,
            graph,
            index,
        })
    }

    /// Load a registry from a `.toml` or `.json` file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        let file: RegistryFile = if is_json {
            serde_json::from_str(&content)?
        } else {
            toml::from_str(&content)?
        };
        tracing::info!(
            "Loaded {} services from registry {}",
            file.services.len(),
            path.display()
        );
        Self::from_services(file.services)
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn get(&self, name: &str) -> Option<&ServiceSpec> {
        self.services.get(name)
    }

    pub fn service_names(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }

    /// Declared criticality; services missing from the registry are MEDIUM.
    pub fn criticality(&self, name: &str) -> Criticality {
        self.get(name).map(|s| s.criticality).unwrap_or_default()
    }

    /// Direct dependents in declaration order.
    pub fn dependents(&self, name: &str) -> Vec<&str> {
        let Some(&idx) = self.index.get(name) else {
            return Vec::new();
        };
        // petgraph yields the most recently added edge first.
        let mut out: Vec<&str> = self
            .graph
            .neighbors_directed(idx, Direction::Outgoing)
            .map(|n| self.graph[n].as_str())
            .collect();
        out.reverse();
        out
    }

    /// Mean coverage across the service's categories, if any are known.
    pub fn average_coverage(&self, name: &str) -> Option<f64> {
        let spec = self.get(name)?;
        if spec.coverage.is_empty() {
            return None;
        }
        let total: f64 = spec.coverage.values().map(|e| e.coverage).sum();
        Some(total / spec.coverage.len() as f64)
    }

    pub fn failure_rate(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(|s| s.failure_rate)
    }

    /// Longest shortest-path distance along dependents edges. Terminates on cycles.
    pub fn dependency_depth(&self, name: &str) -> usize {
        let Some(&start) = self.index.get(name) else {
            return 0;
        };
        let mut visited = HashSet::from([start]);
        let mut queue = VecDeque::from([(start, 0usize)]);
        let mut depth = 0;
        while let Some((node, d)) = queue.pop_front() {
            depth = depth.max(d);
            for next in self.graph.neighbors_directed(node, Direction::Outgoing) {
                if visited.insert(next) {
                    queue.push_back((next, d + 1));
                }
            }
        }
        depth
    }

    /// One row per declared service.
    pub fn overview(&self) -> Overview {
        let services = self
            .services
            .iter()
            .map(|(name, spec)| ServiceOverview {
                service: name.clone(),
                criticality: spec.criticality,
                dependents: self
                    .dependents(name)
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
                dependency_depth: self.dependency_depth(name),
                average_coverage: self.average_coverage(name),
                failure_rate: spec.failure_rate,
                api_endpoints: spec.api_endpoints.len(),
            })
            .collect::<Vec<_>>();
        Overview {
            total_services: services.len(),
            total_edges: self.graph.edge_count(),
            services,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Overview {
    pub total_services: usize,
    pub total_edges: usize,
    pub services: Vec<ServiceOverview>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceOverview {
    pub service: String,
    pub criticality: Criticality,
    pub dependents: Vec<String>,
    pub dependency_depth: usize,
    pub average_coverage: Option<f64>,
    pub failure_rate: Option<f64>,
    pub api_endpoints: usize,
}
