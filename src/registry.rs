//! Explicit plugin registry.
//!
//! The host decides which plugins exist. Nothing registers itself: callers
//! either start from [`Registry::new`] and add plugins one by one, or take the
//! built-in set from [`Registry::with_builtin_plugins`].

use crate::extractor::{
    axum::AxumPlugin, drf::DrfPlugin, drogon::DrogonPlugin, express::ExpressPlugin,
    fastendpoints::FastEndpointsPlugin, hono::HonoPlugin, micronaut::MicronautPlugin, oatpp::OatppPlugin,
    phoenix::PhoenixPlugin, rocket::RocketPlugin, Framework, FrameworkPlugin,
};
use log::debug;

/// Ordered set of framework plugins.
///
/// Order matters: the analyzer runs plugins, and reports their output, in
/// registration order.
#[derive(Default)]
pub struct Registry {
    plugins: Vec<Box<dyn FrameworkPlugin>>,
}

impl Registry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in plugin, in a fixed order
    pub fn with_builtin_plugins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(AxumPlugin));
        registry.register(Box::new(RocketPlugin));
        registry.register(Box::new(DrogonPlugin));
        registry.register(Box::new(OatppPlugin));
        registry.register(Box::new(FastEndpointsPlugin));
        registry.register(Box::new(MicronautPlugin));
        registry.register(Box::new(PhoenixPlugin));
        registry.register(Box::new(HonoPlugin));
        registry.register(Box::new(ExpressPlugin));
        registry.register(Box::new(DrfPlugin));
        registry
    }

    /// Add a plugin. A plugin for an already registered framework replaces it in place.
    pub fn register(&mut self, plugin: Box<dyn FrameworkPlugin>) {
        let framework = plugin.framework();
        match self.plugins.iter_mut().find(|p| p.framework() == framework) {
            Some(existing) => {
                debug!("Replacing plugin for {}", framework);
                *existing = plugin;
            }
            None => self.plugins.push(plugin),
        }
    }

    pub fn get(&self, framework: Framework) -> Option<&dyn FrameworkPlugin> {
        self.plugins
            .iter()
            .find(|p| p.framework() == framework)
            .map(|p| p.as_ref())
    }

    pub fn plugins(&self) -> &[Box<dyn FrameworkPlugin>] {
        &self.plugins
    }

    /// Registered frameworks in registration order
    pub fn frameworks(&self) -> Vec<Framework> {
        self.plugins.iter().map(|p| p.framework()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_order() {
        let registry = Registry::with_builtin_plugins();
        assert_eq!(
            registry.frameworks(),
            vec![
                Framework::Axum,
                Framework::Rocket,
                Framework::Drogon,
                Framework::Oatpp,
                Framework::FastEndpoints,
                Framework::Micronaut,
                Framework::Phoenix,
                Framework::Hono,
                Framework::Express,
                Framework::Drf,
            ]
        );
        assert_eq!(registry.get(Framework::Drf).map(|p| p.framework()), Some(Framework::Drf));
    }

    #[test]
    fn test_register_and_replace() {
        let mut registry = Registry::new();
        assert!(registry.is_empty());
        assert!(registry.get(Framework::Hono).is_none());

        registry.register(Box::new(HonoPlugin));
        registry.register(Box::new(AxumPlugin));
        registry.register(Box::new(HonoPlugin));
        assert_eq!(registry.frameworks(), vec![Framework::Hono, Framework::Axum]);
    }
}
