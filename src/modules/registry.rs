use crate::errors::{Result, SurfError};
use crate::modules::{AuthModule, BaiduModule, DaxuesoutijiangModule};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry for login modules, filled at startup and read-only afterwards
pub struct ModuleRegistry {
    modules: HashMap<String, Arc<dyn AuthModule>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self {
            modules: HashMap::new(),
        }
    }

    /// Registry with every built-in site module.
    pub fn with_default_modules() -> Self {
        let mut registry = Self::new();
        registry.register(BaiduModule::new());
        registry.register(DaxuesoutijiangModule::new());
        registry
    }

    /// Register a module under its name, replacing any previous one
    pub fn register<M: AuthModule + 'static>(&mut self, module: M) {
        self.register_arc(Arc::new(module));
    }

    pub fn register_arc(&mut self, module: Arc<dyn AuthModule>) {
        let name = module.name().to_string();
        self.modules.insert(name, module);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn AuthModule>> {
        self.modules
            .get(name)
            .cloned()
            .ok_or_else(|| SurfError::ModuleNotFound(name.to_string()))
    }

    /// Registered module names, sorted
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.modules.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::SettleDelays;

    #[test]
    fn test_default_modules() {
        let registry = ModuleRegistry::with_default_modules();
        assert_eq!(registry.list(), vec!["baidu", "daxuesoutijiang"]);
        assert_eq!(registry.get("baidu").unwrap().name(), "baidu");
    }

    #[test]
    fn test_unknown_module_is_not_found() {
        let registry = ModuleRegistry::with_default_modules();
        let err = registry.get("weibo").err().unwrap();
        assert!(matches!(err, SurfError::ModuleNotFound(ref name) if name == "weibo"));
    }

    #[test]
    fn test_register_same_name_replaces() {
        let mut registry = ModuleRegistry::new();
        let first: Arc<dyn AuthModule> = Arc::new(BaiduModule::new());
        let second: Arc<dyn AuthModule> =
            Arc::new(BaiduModule::with_delays(SettleDelays::none()));
        registry.register_arc(first);
        registry.register_arc(second.clone());

        assert_eq!(registry.len(), 1);
        assert!(Arc::ptr_eq(&registry.get("baidu").unwrap(), &second));
    }
}
