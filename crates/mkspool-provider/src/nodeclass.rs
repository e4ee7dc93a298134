//! Node class lookup.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{info, warn};

use mkspool_core::{ConditionStatus, NodeClass};

/// Resolves the node class a claim refers to.
#[async_trait]
pub trait NodeClassResolver: Send + Sync {
    /// `None` when no class with that name exists.
    async fn resolve(&self, name: &str) -> Option<NodeClass>;
}

/// In-memory node classes, validated on every upsert.
#[derive(Default)]
pub struct StaticNodeClasses {
    classes: RwLock<BTreeMap<String, NodeClass>>,
}

impl StaticNodeClasses {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn from_classes(classes: impl IntoIterator<Item = NodeClass>) -> Self {
        let store = Self::new();
        for class in classes {
            store.upsert(class).await;
        }
        store
    }

    /// Insert or replace a class after recomputing its Ready condition.
    /// Returns whether the stored status changed.
    pub async fn upsert(&self, mut class: NodeClass) -> bool {
        let mut classes = self.classes.write().await;
        if let Some(existing) = classes.get(&class.name) {
            class.status.conditions = existing.status.conditions.clone();
        }
        let changed = class.reconcile_status();

        if changed {
            match class.ready_condition() {
                Some(c) if c.status == ConditionStatus::False => {
                    warn!(nodeclass = %class.name, reason = %c.reason, message = %c.message, "node class not ready");
                }
                _ => info!(nodeclass = %class.name, "node class ready"),
            }
        }

        classes.insert(class.name.clone(), class);
        changed
    }

    pub async fn remove(&self, name: &str) -> Option<NodeClass> {
        self.classes.write().await.remove(name)
    }

    pub async fn list(&self) -> Vec<NodeClass> {
        self.classes.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl NodeClassResolver for StaticNodeClasses {
    async fn resolve(&self, name: &str) -> Option<NodeClass> {
        self.classes.read().await.get(name).cloned()
    }
}
