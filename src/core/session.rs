use crate::core::registry::{Registry, ServerConfig};

/// Which registry entry chat turns are forwarded to.
///
/// Only the id is held; the entry itself is looked up on every use, so an id
/// whose entry was deleted simply resolves to nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    active: Option<String>,
}

impl SessionState {
    pub fn new(active: Option<String>) -> Self {
        Self { active }
    }

    pub fn set_active(&mut self, id: impl Into<String>) {
        self.active = Some(id.into());
    }

    pub fn get_active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn clear_active(&mut self) {
        self.active = None;
    }

    pub fn resolve<'a>(&self, registry: &'a Registry) -> Option<&'a ServerConfig> {
        self.active.as_deref().and_then(|id| registry.get(id))
    }
}
