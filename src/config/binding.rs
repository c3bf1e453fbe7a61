// Binding definitions: what a key resolves to and how often it is built
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

use super::container::Resolver;
use super::error::{ConfigError, ConfigResult};

/// A resolved value as stored in the container.
pub type Instance = Arc<dyn Any + Send + Sync>;

type FactoryFn = Arc<dyn Fn(&Resolver<'_>) -> ConfigResult<Instance> + Send + Sync>;
type ScalarFn = Arc<dyn Fn() -> ConfigResult<Value> + Send + Sync>;
type ConstructFn = Arc<dyn Fn(&Args, &Resolver<'_>) -> ConfigResult<Instance> + Send + Sync>;

/// How often a deferred binding is constructed within one container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Built on first access, then shared for the container's lifetime
    Singleton,
    /// Built again on every access
    Transient,
}

/// What a key is bound to inside an environment layer.
#[derive(Clone)]
pub enum Binding {
    /// Literal configuration value
    Scalar(Arc<Value>),
    /// Pre-built shared value
    Instance(Instance),
    /// Deferred construction with access to the other bindings
    Factory { lifecycle: Lifecycle, build: FactoryFn },
    /// Structured dependency-injection recipe
    Recipe(Recipe),
    /// Deferred scalar whose result is memoized in the environment cache
    CachedScalar(ScalarFn),
}

impl Binding {
    pub fn scalar(value: impl Into<Value>) -> Self {
        Binding::Scalar(Arc::new(value.into()))
    }

    pub fn instance<T: Send + Sync + 'static>(value: T) -> Self {
        Binding::Instance(Arc::new(value))
    }

    pub fn factory<T, F>(lifecycle: Lifecycle, build: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Resolver<'_>) -> ConfigResult<T> + Send + Sync + 'static,
    {
        Binding::Factory {
            lifecycle,
            build: Arc::new(move |resolver| build(resolver).map(|v| Arc::new(v) as Instance)),
        }
    }

    pub fn singleton<T, F>(build: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Resolver<'_>) -> ConfigResult<T> + Send + Sync + 'static,
    {
        Self::factory(Lifecycle::Singleton, build)
    }

    pub fn transient<T, F>(build: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Resolver<'_>) -> ConfigResult<T> + Send + Sync + 'static,
    {
        Self::factory(Lifecycle::Transient, build)
    }

    pub fn cached_scalar<F>(compute: F) -> Self
    where
        F: Fn() -> ConfigResult<Value> + Send + Sync + 'static,
    {
        Binding::CachedScalar(Arc::new(compute))
    }

    /// Whether the resolved value is kept in the container's memo slot.
    pub fn is_memoized(&self) -> bool {
        match self {
            Binding::Scalar(_) | Binding::Instance(_) => false,
            Binding::Factory { lifecycle, .. } => *lifecycle == Lifecycle::Singleton,
            Binding::Recipe(recipe) => recipe.lifecycle == Lifecycle::Singleton,
            Binding::CachedScalar(_) => true,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Binding::Scalar(_) => "scalar",
            Binding::Instance(_) => "instance",
            Binding::Factory { .. } => "factory",
            Binding::Recipe(_) => "recipe",
            Binding::CachedScalar(_) => "cached-scalar",
        }
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Scalar(value) => write!(f, "Scalar({})", value),
            Binding::Recipe(recipe) => write!(f, "Recipe({}, {:?})", recipe.target, recipe.lifecycle),
            Binding::Factory { lifecycle, .. } => write!(f, "Factory({:?})", lifecycle),
            other => f.write_str(other.kind()),
        }
    }
}

impl From<&str> for Binding {
    fn from(value: &str) -> Self {
        Binding::scalar(value)
    }
}

impl From<String> for Binding {
    fn from(value: String) -> Self {
        Binding::scalar(value)
    }
}

impl From<Value> for Binding {
    fn from(value: Value) -> Self {
        Binding::Scalar(Arc::new(value))
    }
}

/// A recipe constructor parameter.
#[derive(Debug, Clone)]
pub enum Param {
    /// Resolve another binding by key
    Key(String),
    /// Pass a literal value
    Literal(Value),
}

impl Param {
    pub fn key(key: impl Into<String>) -> Self {
        Param::Key(key.into())
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Param::Literal(value.into())
    }
}

/// Constructor arguments, resolved in declaration order.
pub struct Args {
    key: String,
    values: Vec<Instance>,
}

impl Args {
    pub(crate) fn new(key: impl Into<String>, values: Vec<Instance>) -> Self {
        Self {
            key: key.into(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get<T: Send + Sync + 'static>(&self, index: usize) -> ConfigResult<Arc<T>> {
        let value = self.values.get(index).cloned().ok_or_else(|| {
            ConfigError::construction(&self.key, format!("missing constructor argument #{}", index))
        })?;
        value.downcast::<T>().map_err(|_| ConfigError::TypeMismatch {
            key: format!("{}#{}", self.key, index),
            expected: std::any::type_name::<T>(),
        })
    }

    /// Argument as a JSON value; the argument must be a scalar.
    pub fn value(&self, index: usize) -> ConfigResult<Value> {
        self.get::<Value>(index).map(|v| (*v).clone())
    }

    /// Argument rendered as a string. Numbers and booleans are stringified.
    pub fn string(&self, index: usize) -> ConfigResult<String> {
        let value = self.get::<Value>(index)?;
        Ok(scalar_to_string(&value))
    }
}

pub(crate) fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Type-erased recipe stored in a binding.
#[derive(Clone)]
pub struct Recipe {
    pub(crate) target: &'static str,
    pub(crate) params: Vec<Param>,
    pub(crate) lifecycle: Lifecycle,
    pub(crate) construct: ConstructFn,
}

impl Recipe {
    pub fn target(&self) -> &'static str {
        self.target
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }
}

type MethodCall<T> = Arc<dyn Fn(&mut T, &Resolver<'_>) -> ConfigResult<()> + Send + Sync>;

/// Typed builder for a [`Recipe`].
///
/// ```ignore
/// DiBind::with_constructor(|args| PgPoolFactory::connect(&args.string(0)?))
///     .with_params([Param::key("DBDRIVER_CONNECTION")])
///     .to_singleton()
/// ```
pub struct DiBind<T> {
    params: Vec<Param>,
    constructor: Arc<dyn Fn(&Args) -> ConfigResult<T> + Send + Sync>,
    calls: Vec<MethodCall<T>>,
}

impl<T: Send + Sync + 'static> DiBind<T> {
    pub fn with_constructor<F>(constructor: F) -> Self
    where
        F: Fn(&Args) -> ConfigResult<T> + Send + Sync + 'static,
    {
        Self {
            params: Vec::new(),
            constructor: Arc::new(constructor),
            calls: Vec::new(),
        }
    }

    pub fn with_params(mut self, params: impl IntoIterator<Item = Param>) -> Self {
        self.params.extend(params);
        self
    }

    /// Run after construction, before the value is shared.
    pub fn with_method_call<F>(mut self, call: F) -> Self
    where
        F: Fn(&mut T, &Resolver<'_>) -> ConfigResult<()> + Send + Sync + 'static,
    {
        self.calls.push(Arc::new(call));
        self
    }

    pub fn to_singleton(self) -> Binding {
        self.into_binding(Lifecycle::Singleton)
    }

    pub fn to_instance(self) -> Binding {
        self.into_binding(Lifecycle::Transient)
    }

    fn into_binding(self, lifecycle: Lifecycle) -> Binding {
        let constructor = self.constructor;
        let calls = self.calls;
        Binding::Recipe(Recipe {
            target: std::any::type_name::<T>(),
            params: self.params,
            lifecycle,
            construct: Arc::new(move |args, resolver| {
                let mut value = constructor(args)?;
                for call in &calls {
                    call(&mut value, resolver)?;
                }
                Ok(Arc::new(value) as Instance)
            }),
        })
    }
}

/// An ordered layer of bindings to merge into one environment.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    entries: Vec<(String, Binding)>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(mut self, key: impl Into<String>, binding: impl Into<Binding>) -> Self {
        self.entries.push((key.into(), binding.into()));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for Bindings {
    type Item = (String, Binding);
    type IntoIter = std::vec::IntoIter<(String, Binding)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
