//! Per-build context passed to every plugin hook and task action
use crate::events::{EventSink, NullSink};
use crate::fingerprint::{NeverUpToDate, UpToDateCheck};
use anvil_package::ArtifactLocator;
use std::any::Any;
use std::collections::HashMap;
use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

/// Configuration a plugin stores per project
///
/// `KIND` namespaces the value so two plugins never read each other's settings.
pub trait PluginConfig: Any + Debug + Send + Sync {
    const KIND: &'static str;
}

/// State shared by one build
///
/// Mutable only during the configuration phase; tasks see it through `&`.
pub struct BuildContext {
    locator: ArtifactLocator,
    configs: HashMap<(String, &'static str), Box<dyn Any + Send + Sync>>,
    up_to_date: Arc<dyn UpToDateCheck>,
    events: Arc<dyn EventSink>,
}

impl BuildContext {
    /// Create a context over the artifact cache at `cache_root`
    pub fn new(cache_root: impl Into<std::path::PathBuf>) -> Self {
        Self {
            locator: ArtifactLocator::new(cache_root),
            configs: HashMap::new(),
            up_to_date: Arc::new(NeverUpToDate),
            events: Arc::new(NullSink),
        }
    }

    pub fn with_up_to_date(mut self, check: Arc<dyn UpToDateCheck>) -> Self {
        self.up_to_date = check;
        self
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = sink;
        self
    }

    /// Store `config` for `project`
    ///
    /// A second value of the same kind replaces the first and is reported as
    /// a configuration conflict.
    pub fn set_config<C: PluginConfig>(&mut self, project: &str, config: C) {
        let key = (project.to_string(), C::KIND);
        if let Some(previous) = self.configs.insert(key, Box::new(config)) {
            warn!(
                project,
                kind = C::KIND,
                previous = ?previous.downcast_ref::<C>(),
                "configuration conflict: {} configured more than once, keeping the last value",
                C::KIND
            );
        }
    }

    /// Configuration of kind `C` for `project`, if any
    pub fn config<C: PluginConfig>(&self, project: &str) -> Option<&C> {
        self.configs
            .get(&(project.to_string(), C::KIND))
            .and_then(|value| value.downcast_ref::<C>())
    }

    pub fn has_config<C: PluginConfig>(&self, project: &str) -> bool {
        self.config::<C>(project).is_some()
    }

    pub fn locator(&self) -> &ArtifactLocator {
        &self.locator
    }

    pub fn cache_root(&self) -> &Path {
        self.locator.cache_root()
    }

    pub fn up_to_date(&self) -> &dyn UpToDateCheck {
        self.up_to_date.as_ref()
    }

    pub fn events(&self) -> &dyn EventSink {
        self.events.as_ref()
    }
}

impl Debug for BuildContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildContext")
            .field("cache_root", &self.cache_root())
            .field("configs", &self.configs.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Greeting(&'static str);

    impl PluginConfig for Greeting {
        const KIND: &'static str = "greeting";
    }

    #[derive(Debug, PartialEq)]
    struct Other(u32);

    impl PluginConfig for Other {
        const KIND: &'static str = "other";
    }

    #[test]
    fn test_config_is_per_project_and_kind() {
        let mut ctx = BuildContext::new("/cache");
        ctx.set_config("app", Greeting("hello"));
        ctx.set_config("lib", Other(3));

        assert_eq!(ctx.config::<Greeting>("app"), Some(&Greeting("hello")));
        assert_eq!(ctx.config::<Greeting>("lib"), None);
        assert_eq!(ctx.config::<Other>("lib"), Some(&Other(3)));
        assert!(!ctx.has_config::<Other>("app"));
    }

    #[test]
    fn test_conflicting_config_keeps_last_value() {
        let mut ctx = BuildContext::new("/cache");
        ctx.set_config("app", Greeting("first"));
        ctx.set_config("app", Greeting("second"));

        assert_eq!(ctx.config::<Greeting>("app"), Some(&Greeting("second")));
    }
}
