// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::{Arc, Weak};

use tracing::debug;

use crate::compile::CompileError;
use crate::model::ModelRef;
use crate::registry::Registry;

/// Something holding a compiled validator that can be rebuilt on demand.
pub trait Rebuild: Send + Sync {
    /// Name used in diagnostics.
    fn rebuild_target(&self) -> String;

    fn force_rebuild(&self) -> Result<(), CompileError>;
}

/// A registration subscriber, notified in subscription order.
#[derive(Clone)]
pub(crate) enum Subscription {
    Listener(Arc<dyn Fn(&ModelRef) + Send + Sync>),
    Rebuild(Weak<dyn Rebuild>),
}

impl Subscription {
    /// Rebuild subscriptions die with their dependent.
    fn is_live(&self) -> bool {
        match self {
            Subscription::Listener(_) => true,
            Subscription::Rebuild(dependent) => dependent.strong_count() > 0,
        }
    }
}

impl Registry {
    /// Calls `callback` with every model registered from now on.
    pub fn on_register(&self, callback: impl Fn(&ModelRef) + Send + Sync + 'static) {
        self.subscribe(Subscription::Listener(Arc::new(callback)));
    }

    fn subscribe(&self, subscription: Subscription) {
        let mut subscriptions = self.subscriptions.write();
        subscriptions.retain(Subscription::is_live);
        subscriptions.push(subscription);
    }

    /// Notifies every live subscriber of `model`, pruning dropped dependents first.
    ///
    /// Subscribers run on a snapshot with no registry lock held.
    pub(crate) fn notify_registered(&self, model: &ModelRef) {
        let subscriptions = {
            let mut subscriptions = self.subscriptions.write();
            subscriptions.retain(Subscription::is_live);
            subscriptions.clone()
        };

        let registry = self.to_string();
        for subscription in subscriptions.iter() {
            match subscription {
                Subscription::Listener(callback) => callback(model),
                Subscription::Rebuild(dependent) => {
                    if let Some(dependent) = dependent.upgrade() {
                        rebuild_quietly(dependent.as_ref(), &registry);
                    }
                }
            }
        }
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscriptions
            .read()
            .iter()
            .filter(|s| s.is_live())
            .count()
    }

    /// Subscribes `dependent` to rebuild after every registration, and rebuilds it once now.
    ///
    /// Rebuild failures are logged and dropped. The subscription holds `dependent` weakly
    /// and is discarded once it is gone.
    pub fn rebuild_on_registers<D: Rebuild + 'static>(&self, dependent: Arc<D>) -> Arc<D> {
        let weak: Weak<D> = Arc::downgrade(&dependent);
        let weak: Weak<dyn Rebuild> = weak;
        let registry = self.to_string();
        debug!(
            registry = %registry,
            dependent = %dependent.rebuild_target(),
            "subscribed to registrations"
        );

        self.subscribe(Subscription::Rebuild(weak));
        rebuild_quietly(dependent.as_ref(), &registry);
        dependent
    }

    /// Construction hook counterpart of [`rebuild_on_registers`](Self::rebuild_on_registers).
    pub(crate) fn rebuild_on_registers_if_auto_rebuild(&self, model: &ModelRef) {
        if self.config.auto_rebuild {
            self.rebuild_on_registers(model.clone());
        } else {
            debug!(
                registry = %self,
                model = %model.name(),
                "auto rebuild disabled; model not subscribed"
            );
        }
    }
}

fn rebuild_quietly(dependent: &dyn Rebuild, registry: &str) {
    if let Err(e) = dependent.force_rebuild() {
        debug!(
            registry,
            dependent = %dependent.rebuild_target(),
            error = %e,
            "rebuild failed"
        );
    }
}
