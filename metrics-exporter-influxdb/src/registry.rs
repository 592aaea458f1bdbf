use std::collections::BTreeMap;

use crate::{
    builder::{BuildError, InfluxDbBuilder},
    handler::{Handler, INFLUXDB_HANDLER_NAME},
    options::HandlerOptions,
};

/// A factory that creates a handler from common handler options.
pub type HandlerFactory = Box<dyn Fn(&HandlerOptions) -> Box<dyn Handler> + Send + Sync>;

/// Maps handler type identifiers to the factories that create them.
///
/// The registry is an ordinary value: build it once at startup, register any additional handler types, and pass it to
/// whatever assembles the active set of handlers.
///
/// ```
/// # use metrics_exporter_influxdb::{Handler, HandlerOptions, HandlerRegistry};
/// let registry = HandlerRegistry::with_builtin_handlers();
///
/// let options = HandlerOptions::default()
///     .with_param("server", "127.0.0.1")
///     .with_param("port", "8089");
/// let handler = registry.create("InfluxDB", &options).expect("handler should be registered");
/// assert_eq!(handler.name(), "InfluxDB");
/// ```
#[derive(Default)]
pub struct HandlerRegistry {
    factories: BTreeMap<String, HandlerFactory>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with every handler type provided by this crate.
    pub fn with_builtin_handlers() -> Self {
        let mut registry = Self::new();
        registry.register(INFLUXDB_HANDLER_NAME, |options| {
            Box::new(InfluxDbBuilder::from_options(options).build())
        });
        registry
    }

    /// Registers a factory under `name`, replacing any factory previously registered under the same name.
    pub fn register<N, F>(&mut self, name: N, factory: F) -> &mut Self
    where
        N: Into<String>,
        F: Fn(&HandlerOptions) -> Box<dyn Handler> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
        self
    }

    /// Returns `true` if a factory is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Returns the names of all registered handler types, in ascending order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Creates a handler of the type registered under `name`.
    ///
    /// # Errors
    ///
    /// If no factory is registered under `name`, an error is returned.
    pub fn create(&self, name: &str, options: &HandlerOptions) -> Result<Box<dyn Handler>, BuildError> {
        let factory =
            self.factories.get(name).ok_or_else(|| BuildError::UnknownHandler { name: name.to_string() })?;
        Ok(factory(options))
    }
}
