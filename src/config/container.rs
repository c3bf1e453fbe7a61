// Realized binding table for one active environment
use once_cell::sync::OnceCell;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};
use tracing::{debug, trace, warn};

use super::binding::{scalar_to_string, Args, Binding, Instance, Param};
use super::cache::CacheProvider;
use super::error::{ConfigError, ConfigResult};

struct Slot {
    binding: Binding,
    source: String,
    memo: OnceCell<Instance>,
}

/// Memoized keys currently under construction, shared by every thread
#[derive(Default)]
struct BuildTable {
    owners: HashMap<String, ThreadId>,
    /// Key each blocked thread is waiting on
    waiting: HashMap<ThreadId, String>,
}

impl BuildTable {
    /// Follow owner -> awaited key -> owner from `key`; `Some` when it leads back to `me`
    fn wait_chain(&self, key: &str, me: ThreadId) -> Option<Vec<String>> {
        let mut chain = vec![key.to_string()];
        let mut owner = *self.owners.get(key)?;
        while owner != me {
            if chain.len() > self.waiting.len() {
                return None;
            }
            let next = self.waiting.get(&owner)?;
            chain.push(next.clone());
            owner = *self.owners.get(next)?;
        }
        Some(chain)
    }
}

/// Releases a build claim even when the factory panics
struct BuildClaim<'c> {
    container: &'c Container,
    key: &'c str,
}

impl Drop for BuildClaim<'_> {
    fn drop(&mut self) {
        self.container.builds().owners.remove(self.key);
        self.container.built.notify_all();
    }
}

/// Queryable result of building a [`Definition`](super::Definition).
///
/// Singleton bindings are constructed lazily, at most once, and shared by
/// every caller. The container is `Send + Sync`; wrap it in an `Arc` and pass
/// it to whatever needs resolution.
///
/// A thread asking for a singleton that another thread is building waits for
/// it, unless that thread is itself waiting on this one. That is a cycle and
/// comes back as [`ConfigError::CircularDependency`].
pub struct Container {
    environment: String,
    slots: HashMap<String, Slot>,
    cache: Option<Arc<dyn CacheProvider>>,
    builds: Mutex<BuildTable>,
    built: Condvar,
}

impl Container {
    pub(crate) fn new(
        environment: String,
        table: Vec<(String, Binding, String)>,
        cache: Option<Arc<dyn CacheProvider>>,
    ) -> Self {
        let slots = table
            .into_iter()
            .map(|(key, binding, source)| {
                (
                    key,
                    Slot {
                        binding,
                        source,
                        memo: OnceCell::new(),
                    },
                )
            })
            .collect();

        Self {
            environment,
            slots,
            cache,
            builds: Mutex::new(BuildTable::default()),
            built: Condvar::new(),
        }
    }

    fn builds(&self) -> MutexGuard<'_, BuildTable> {
        self.builds.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Name of the environment this container was built for
    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn has(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    /// All bound keys, sorted
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.slots.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// Environment whose layer supplied `key`, or `os` for process imports
    pub fn source_of(&self, key: &str) -> Option<&str> {
        self.slots.get(key).map(|slot| slot.source.as_str())
    }

    pub fn binding(&self, key: &str) -> Option<&Binding> {
        self.slots.get(key).map(|slot| &slot.binding)
    }

    pub fn get(&self, key: &str) -> ConfigResult<Instance> {
        Resolver::new(self).resolve(key)
    }

    pub fn get_as<T: Send + Sync + 'static>(&self, key: &str) -> ConfigResult<Arc<T>> {
        Resolver::new(self).get(key)
    }

    pub fn get_value(&self, key: &str) -> ConfigResult<Value> {
        Resolver::new(self).get_value(key)
    }

    pub fn get_str(&self, key: &str) -> ConfigResult<String> {
        Resolver::new(self).get_str(key)
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("environment", &self.environment)
            .field("keys", &self.keys())
            .field("cached", &self.cache.is_some())
            .finish()
    }
}

/// One resolution pass over a [`Container`].
///
/// Factories and recipes receive the resolver so they can pull their own
/// dependencies; the resolver tracks which keys are mid-construction to
/// report cycles instead of recursing forever.
pub struct Resolver<'c> {
    container: &'c Container,
    in_progress: RefCell<Vec<String>>,
}

impl<'c> Resolver<'c> {
    fn new(container: &'c Container) -> Self {
        Self {
            container,
            in_progress: RefCell::new(Vec::new()),
        }
    }

    pub fn environment(&self) -> &str {
        self.container.environment()
    }

    pub fn get<T: Send + Sync + 'static>(&self, key: &str) -> ConfigResult<Arc<T>> {
        self.resolve(key)?
            .downcast::<T>()
            .map_err(|_| ConfigError::TypeMismatch {
                key: key.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }

    pub fn get_value(&self, key: &str) -> ConfigResult<Value> {
        self.get::<Value>(key).map(|v| (*v).clone())
    }

    pub fn get_str(&self, key: &str) -> ConfigResult<String> {
        self.get::<Value>(key).map(|v| scalar_to_string(&v))
    }

    pub fn resolve(&self, key: &str) -> ConfigResult<Instance> {
        let slot = self
            .container
            .slots
            .get(key)
            .ok_or_else(|| ConfigError::KeyNotFound(key.to_string()))?;

        match &slot.binding {
            Binding::Scalar(value) => return Ok(value.clone() as Instance),
            Binding::Instance(instance) => return Ok(instance.clone()),
            _ => {}
        }

        if let Some(instance) = slot.memo.get() {
            trace!(key, "Resolved memoized binding");
            return Ok(instance.clone());
        }

        self.enter(key)?;
        let result = if slot.binding.is_memoized() {
            self.build_once(key, slot)
        } else {
            self.construct(key, &slot.binding)
        };
        self.leave();

        if let Err(e) = &result {
            warn!(key, environment = self.environment(), "Binding resolution failed: {}", e);
        }
        result
    }

    fn enter(&self, key: &str) -> ConfigResult<()> {
        let mut stack = self.in_progress.borrow_mut();
        if stack.iter().any(|k| k == key) {
            let mut chain = stack.clone();
            chain.push(key.to_string());
            return Err(ConfigError::CircularDependency { chain });
        }
        stack.push(key.to_string());
        Ok(())
    }

    fn leave(&self) {
        self.in_progress.borrow_mut().pop();
    }

    /// Construct a memoized binding, or wait for the thread already building it.
    ///
    /// A failed construction leaves the memo empty so a later get retries.
    fn build_once(&self, key: &str, slot: &Slot) -> ConfigResult<Instance> {
        let me = thread::current().id();
        let mut table = self.container.builds();
        loop {
            if let Some(instance) = slot.memo.get() {
                return Ok(instance.clone());
            }
            if !table.owners.contains_key(key) {
                break;
            }
            if let Some(waits) = table.wait_chain(key, me) {
                let mut chain = self.in_progress.borrow().clone();
                chain.pop();
                chain.extend(waits);
                return Err(ConfigError::CircularDependency { chain });
            }

            trace!(key, "Waiting for binding under construction on another thread");
            table.waiting.insert(me, key.to_string());
            table = self
                .container
                .built
                .wait(table)
                .unwrap_or_else(PoisonError::into_inner);
            table.waiting.remove(&me);
        }
        table.owners.insert(key.to_string(), me);
        drop(table);

        let _claim = BuildClaim {
            container: self.container,
            key,
        };
        let instance = self.construct(key, &slot.binding)?;
        Ok(slot.memo.get_or_init(|| instance).clone())
    }

    fn construct(&self, key: &str, binding: &Binding) -> ConfigResult<Instance> {
        match binding {
            Binding::Scalar(value) => Ok(value.clone() as Instance),
            Binding::Instance(instance) => Ok(instance.clone()),
            Binding::Factory { lifecycle, build } => {
                debug!(key, ?lifecycle, "Constructing factory binding");
                build(self)
            }
            Binding::Recipe(recipe) => {
                debug!(key, target = recipe.target(), lifecycle = ?recipe.lifecycle, "Constructing recipe binding");
                let mut values = Vec::with_capacity(recipe.params().len());
                for param in recipe.params() {
                    let value = match param {
                        Param::Key(dependency) => self.resolve(dependency)?,
                        Param::Literal(literal) => Arc::new(literal.clone()) as Instance,
                    };
                    values.push(value);
                }
                (recipe.construct)(&Args::new(key, values), self)
            }
            Binding::CachedScalar(compute) => self.cached_scalar(key, compute.as_ref()),
        }
    }

    fn cached_scalar(
        &self,
        key: &str,
        compute: &(dyn Fn() -> ConfigResult<Value> + Send + Sync),
    ) -> ConfigResult<Instance> {
        let Some(cache) = self.container.cache.as_ref() else {
            return compute().map(|v| Arc::new(v) as Instance);
        };

        let cache_key = cache_key(self.environment(), key);
        if let Some(value) = cache.get(&cache_key)? {
            debug!(key = cache_key.as_str(), "Scalar served from config cache");
            return Ok(Arc::new(value) as Instance);
        }

        let value = compute()?;
        cache.set(&cache_key, &value)?;
        Ok(Arc::new(value) as Instance)
    }
}

/// Config cache entry for `key`; versioned so a redeploy never serves a previous build's value
pub fn cache_key(environment: &str, key: &str) -> String {
    format!("{}:{}@{}", environment, key, env!("CARGO_PKG_VERSION"))
}
