use crate::error::ControllerError;
use std::collections::{HashMap, HashSet};

/// One entry in the service registry: a name, its dependencies (must start
/// before it), a group tag (used only for reporting), and an optional
/// liveness probe URL (spec §4.K).
#[derive(Debug, Clone)]
pub struct ServiceSpec {
    pub name: String,
    pub dependencies: Vec<String>,
    pub group: String,
    pub health_url: Option<String>,
}

impl ServiceSpec {
    pub fn new(name: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dependencies: Vec::new(),
            group: group.into(),
            health_url: None,
        }
    }

    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.dependencies.push(name.into());
        self
    }

    pub fn with_health_url(mut self, url: impl Into<String>) -> Self {
        self.health_url = Some(url.into());
        self
    }
}

/// Discovers services and orders their startup topologically (spec §4.K).
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    services: HashMap<String, ServiceSpec>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, spec: ServiceSpec) {
        self.services.insert(spec.name.clone(), spec);
    }

    pub fn get(&self, name: &str) -> Option<&ServiceSpec> {
        self.services.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ServiceSpec> {
        self.services.values()
    }

    /// Kahn's algorithm over the dependency graph. Ties are broken by name
    /// for deterministic startup order across runs. Errors on a missing
    /// dependency or a cycle.
    pub fn topological_order(&self) -> Result<Vec<String>, ControllerError> {
        let mut indegree: HashMap<&str, usize> = self.services.keys().map(|n| (n.as_str(), 0)).collect();
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

        for spec in self.services.values() {
            for dep in &spec.dependencies {
                if !self.services.contains_key(dep) {
                    return Err(ControllerError::Registry(format!(
                        "service {} depends on unregistered service {}",
                        spec.name, dep
                    )));
                }
                *indegree.get_mut(spec.name.as_str()).unwrap() += 1;
                dependents.entry(dep.as_str()).or_default().push(spec.name.as_str());
            }
        }

        let mut ready: Vec<&str> = indegree
            .iter()
            .filter(|(_, deg)| **deg == 0)
            .map(|(name, _)| *name)
            .collect();
        ready.sort();

        let mut order = Vec::with_capacity(self.services.len());
        let mut visited: HashSet<&str> = HashSet::new();

        while let Some(name) = ready.pop() {
            if !visited.insert(name) {
                continue;
            }
            order.push(name.to_string());
            let mut newly_ready = Vec::new();
            if let Some(deps) = dependents.get(name) {
                for dependent in deps {
                    let deg = indegree.get_mut(dependent).unwrap();
                    *deg -= 1;
                    if *deg == 0 {
                        newly_ready.push(*dependent);
                    }
                }
            }
            newly_ready.sort();
            ready.extend(newly_ready);
            ready.sort();
        }

        if order.len() != self.services.len() {
            return Err(ControllerError::Registry("dependency cycle detected".to_string()));
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn independent_services_order_by_name() {
        let mut reg = ServiceRegistry::new();
        reg.register(ServiceSpec::new("risk", "core"));
        reg.register(ServiceSpec::new("bus", "core"));
        let order = reg.topological_order().unwrap();
        assert_eq!(order, vec!["bus".to_string(), "risk".to_string()]);
    }

    #[test]
    fn dependency_starts_before_dependent() {
        let mut reg = ServiceRegistry::new();
        reg.register(ServiceSpec::new("bus", "core"));
        reg.register(ServiceSpec::new("risk", "core").depends_on("bus"));
        reg.register(ServiceSpec::new("strategy", "core").depends_on("risk").depends_on("bus"));
        let order = reg.topological_order().unwrap();
        assert_eq!(order, vec!["bus".to_string(), "risk".to_string(), "strategy".to_string()]);
    }

    #[test]
    fn missing_dependency_is_an_error() {
        let mut reg = ServiceRegistry::new();
        reg.register(ServiceSpec::new("risk", "core").depends_on("bus"));
        assert!(matches!(reg.topological_order(), Err(ControllerError::Registry(_))));
    }

    #[test]
    fn cycle_is_an_error() {
        let mut reg = ServiceRegistry::new();
        reg.register(ServiceSpec::new("a", "core").depends_on("b"));
        reg.register(ServiceSpec::new("b", "core").depends_on("a"));
        assert!(matches!(reg.topological_order(), Err(ControllerError::Registry(_))));
    }
}
