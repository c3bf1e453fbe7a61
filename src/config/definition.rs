// Environment declarations, inheritance and the merge into a Container
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use super::binding::{Binding, Bindings};
use super::cache::CacheProvider;
use super::container::Container;
use super::error::{ConfigError, ConfigResult};

static NEXT_DEFINITION_ID: AtomicU64 = AtomicU64::new(1);

/// Source label for bindings imported from the process environment
pub const OS_SOURCE: &str = "os";

/// Opaque reference to an environment declared in a [`Definition`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnvironmentHandle {
    definition: u64,
    index: usize,
}

struct Environment {
    name: String,
    parents: Vec<usize>,
    cache: Option<Arc<dyn CacheProvider>>,
    layer: HashMap<String, Binding>,
}

/// Ordered set of environments plus process-environment imports.
///
/// Resolution order for an environment is the environment itself, then its
/// parents depth-first in the order they were declared, each environment
/// visited once. The first layer that binds a key wins.
pub struct Definition {
    id: u64,
    environments: Vec<Environment>,
    os_keys: Vec<String>,
}

impl Default for Definition {
    fn default() -> Self {
        Self::new()
    }
}

impl Definition {
    pub fn new() -> Self {
        Self {
            id: NEXT_DEFINITION_ID.fetch_add(1, Ordering::Relaxed),
            environments: Vec::new(),
            os_keys: Vec::new(),
        }
    }

    pub fn declare(&mut self, name: impl Into<String>) -> ConfigResult<EnvironmentHandle> {
        let name = name.into();
        if self.environments.iter().any(|env| env.name == name) {
            return Err(ConfigError::DuplicateEnvironment(name));
        }

        debug!(environment = name.as_str(), "Declared environment");
        self.environments.push(Environment {
            name,
            parents: Vec::new(),
            cache: None,
            layer: HashMap::new(),
        });
        Ok(EnvironmentHandle {
            definition: self.id,
            index: self.environments.len() - 1,
        })
    }

    /// Append `parents` to the resolution chain of `handle`, in order.
    pub fn inherit_from(
        &mut self,
        handle: EnvironmentHandle,
        parents: &[EnvironmentHandle],
    ) -> ConfigResult<()> {
        let child = self.index_of(handle)?;

        // Validate every parent before touching the graph
        let mut accepted = Vec::with_capacity(parents.len());
        for parent in parents {
            let parent = self.index_of(*parent)?;
            if parent == child || self.ancestors(parent).contains(&child) {
                return Err(ConfigError::CyclicInheritance {
                    child: self.environments[child].name.clone(),
                    parent: self.environments[parent].name.clone(),
                });
            }
            if !accepted.contains(&parent) && !self.environments[child].parents.contains(&parent) {
                accepted.push(parent);
            }
        }

        self.environments[child].parents.extend(accepted);
        Ok(())
    }

    pub fn with_cache(
        &mut self,
        handle: EnvironmentHandle,
        cache: Arc<dyn CacheProvider>,
    ) -> ConfigResult<()> {
        let index = self.index_of(handle)?;
        self.environments[index].cache = Some(cache);
        Ok(())
    }

    pub fn bind(
        &mut self,
        handle: EnvironmentHandle,
        key: impl Into<String>,
        binding: impl Into<Binding>,
    ) -> ConfigResult<()> {
        let index = self.index_of(handle)?;
        let key = key.into();
        let env = &mut self.environments[index];
        if env.layer.contains_key(&key) {
            return Err(ConfigError::DuplicateBinding {
                environment: env.name.clone(),
                key,
            });
        }
        env.layer.insert(key, binding.into());
        Ok(())
    }

    /// Merge a layer of bindings into the environment behind `handle`.
    pub fn add_environment(
        &mut self,
        handle: EnvironmentHandle,
        bindings: Bindings,
    ) -> ConfigResult<()> {
        for (key, binding) in bindings {
            self.bind(handle, key, binding)?;
        }
        Ok(())
    }

    /// Bind every top-level entry of a YAML mapping as a scalar.
    ///
    /// Returns the number of keys loaded.
    pub fn load_yaml(&mut self, handle: EnvironmentHandle, path: impl AsRef<Path>) -> ConfigResult<usize> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let entries: HashMap<String, Value> =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
                path: path.display().to_string(),
                source,
            })?;

        let count = entries.len();
        let mut entries: Vec<_> = entries.into_iter().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        for (key, value) in entries {
            self.bind(handle, key, Binding::from(value))?;
        }
        debug!(path = %path.display(), count, "Loaded YAML configuration layer");
        Ok(count)
    }

    /// Import process environment variables as string bindings.
    ///
    /// A variable that is set overrides every environment layer. An unset
    /// variable binds to the empty string only when no layer binds the key.
    pub fn with_os_environment<I, S>(&mut self, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for key in keys {
            let key = key.into();
            if !self.os_keys.contains(&key) {
                self.os_keys.push(key);
            }
        }
    }

    pub fn handle(&self, name: &str) -> Option<EnvironmentHandle> {
        self.environments
            .iter()
            .position(|env| env.name == name)
            .map(|index| EnvironmentHandle {
                definition: self.id,
                index,
            })
    }

    pub fn environment_names(&self) -> Vec<&str> {
        self.environments.iter().map(|env| env.name.as_str()).collect()
    }

    /// Environment names in the order their layers are consulted.
    pub fn resolution_order(&self, name: &str) -> ConfigResult<Vec<&str>> {
        let index = self
            .environments
            .iter()
            .position(|env| env.name == name)
            .ok_or_else(|| ConfigError::EnvironmentNotFound(name.to_string()))?;
        Ok(self
            .chain(index)
            .into_iter()
            .map(|i| self.environments[i].name.as_str())
            .collect())
    }

    /// Build a container for `active`, reading imports from the process environment.
    pub fn build(&self, active: &str) -> ConfigResult<Container> {
        self.build_with_env(active, |key| std::env::var(key).ok())
    }

    /// Build a container for `active`, reading imports through `lookup`.
    pub fn build_with_env<F>(&self, active: &str, lookup: F) -> ConfigResult<Container>
    where
        F: Fn(&str) -> Option<String>,
    {
        let index = self
            .environments
            .iter()
            .position(|env| env.name == active)
            .ok_or_else(|| ConfigError::EnvironmentNotFound(active.to_string()))?;

        let chain = self.chain(index);
        let mut merged: HashMap<String, (Binding, String)> = HashMap::new();
        for &i in &chain {
            let env = &self.environments[i];
            for (key, binding) in &env.layer {
                merged
                    .entry(key.clone())
                    .or_insert_with(|| (binding.clone(), env.name.clone()));
            }
        }

        for key in &self.os_keys {
            match lookup(key) {
                Some(value) => {
                    merged.insert(key.clone(), (Binding::scalar(value), OS_SOURCE.to_string()));
                }
                None => {
                    merged
                        .entry(key.clone())
                        .or_insert_with(|| (Binding::scalar(""), OS_SOURCE.to_string()));
                }
            }
        }

        let cache = chain
            .iter()
            .find_map(|&i| self.environments[i].cache.clone());

        info!(
            environment = active,
            chain = ?chain.iter().map(|&i| self.environments[i].name.as_str()).collect::<Vec<_>>(),
            bindings = merged.len(),
            "Built configuration container"
        );

        let table = merged
            .into_iter()
            .map(|(key, (binding, source))| (key, binding, source))
            .collect();
        Ok(Container::new(active.to_string(), table, cache))
    }

    fn index_of(&self, handle: EnvironmentHandle) -> ConfigResult<usize> {
        if handle.definition != self.id || handle.index >= self.environments.len() {
            return Err(ConfigError::UnknownEnvironment(format!(
                "handle #{} of definition #{}",
                handle.index, handle.definition
            )));
        }
        Ok(handle.index)
    }

    /// Self first, then parents depth-first in declared order, no repeats.
    fn chain(&self, start: usize) -> Vec<usize> {
        fn visit(envs: &[Environment], index: usize, seen: &mut HashSet<usize>, out: &mut Vec<usize>) {
            if !seen.insert(index) {
                return;
            }
            out.push(index);
            for &parent in &envs[index].parents {
                visit(envs, parent, seen, out);
            }
        }

        let mut out = Vec::new();
        visit(&self.environments, start, &mut HashSet::new(), &mut out);
        out
    }

    fn ancestors(&self, index: usize) -> Vec<usize> {
        let mut chain = self.chain(index);
        chain.remove(0);
        chain
    }
}
