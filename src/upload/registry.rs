use crate::upload::client::UploadClient;
use crate::upload::clients::{MultipartClient, RawClient};
use std::collections::HashMap;
use std::sync::Arc;

pub type ClientFactory = Arc<dyn Fn() -> Box<dyn UploadClient> + Send + Sync>;

/// Wrap a client constructor as a registry factory.
pub fn factory<C: UploadClient + 'static>(make: fn() -> C) -> ClientFactory {
    Arc::new(move || -> Box<dyn UploadClient> { Box::new(make()) })
}

/// Upload clients by name. Unknown names resolve to the default client.
#[derive(Clone)]
pub struct ClientRegistry {
    factories: HashMap<String, ClientFactory>,
    default: ClientFactory,
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ClientRegistry {
    pub fn new(default: ClientFactory) -> Self {
        Self {
            factories: HashMap::new(),
            default,
        }
    }

    /// `standard` (also the fallback), `editormd` and `raw`.
    pub fn builtin() -> Self {
        let standard = factory(MultipartClient::standard);
        let mut registry = Self::new(standard.clone());
        registry.register("standard", standard);
        registry.register("editormd", factory(MultipartClient::editormd));
        registry.register("raw", factory(RawClient::new));
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, factory: ClientFactory) {
        self.factories.insert(name.into(), factory);
    }

    /// A fresh client for `name`, or the default client when unregistered.
    pub fn get(&self, name: &str) -> Box<dyn UploadClient> {
        let factory = self.factories.get(name).unwrap_or(&self.default);
        factory()
    }

    pub fn has(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn delete(&mut self, name: &str) -> bool {
        self.factories.remove(name).is_some()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
