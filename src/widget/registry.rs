use std::collections::HashMap;

use crate::page::NodeHandle;

/// A live container/frame pair, torn down as a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetInstance {
    pub target_id: String,
    pub container: NodeHandle,
    pub frame: NodeHandle,
}

/// Instances that finished their load race and have not been destroyed, by target id.
#[derive(Debug, Default)]
pub struct InstanceRegistry {
    instances: HashMap<String, WidgetInstance>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `instance`, returning whatever it displaced. The displaced
    /// instance is not torn down here.
    pub fn register(&mut self, instance: WidgetInstance) -> Option<WidgetInstance> {
        self.instances.insert(instance.target_id.clone(), instance)
    }

    pub fn get(&self, target_id: &str) -> Option<&WidgetInstance> {
        self.instances.get(target_id)
    }

    pub fn find_by_frame(&self, frame: NodeHandle) -> Option<&WidgetInstance> {
        self.instances.values().find(|instance| instance.frame == frame)
    }

    pub fn remove(&mut self, target_id: &str) -> Option<WidgetInstance> {
        self.instances.remove(target_id)
    }

    pub fn contains(&self, target_id: &str) -> bool {
        self.instances.contains_key(target_id)
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.instances.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}
