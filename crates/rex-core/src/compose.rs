//! Startup composition of the routing table.
//!
//! [`InstancePlan`] validates the configured schedulers and cache-only instances before
//! anything is dialed; [`InstancePlan::connect`] then turns the plan into the serving
//! [`DemultiplexingBuildQueue`] plus the action cache write permissions derived from it.
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use rex_model::{InstanceName, SchedulerEntry};
use tracing::{debug, info};

use crate::{
    error::ComposeError,
    metrics::MetricsHandle,
    queue::{
        BuildQueueRef, DemultiplexingBuildQueue, ForwardingBuildQueue, InstanceTable,
        NonExecutableBuildQueue,
    },
};

/// Validated set of instances the frontend will serve.
#[derive(Debug, Clone, Default)]
pub struct InstancePlan {
    schedulers: Vec<SchedulerEntry>,
    cache_only: Vec<InstanceName>,
}

impl InstancePlan {
    /// Validate the configuration.
    ///
    /// Fails when an instance has two schedulers, is listed twice as cache-only, or is
    /// both executable and cache-only.
    pub fn new(
        schedulers: Vec<SchedulerEntry>,
        cache_only: Vec<InstanceName>,
    ) -> Result<Self, ComposeError> {
        let mut executable = HashSet::with_capacity(schedulers.len());
        for entry in &schedulers {
            if !executable.insert(entry.instance.as_str()) {
                return Err(ComposeError::DuplicateScheduler(entry.instance.clone()));
            }
        }

        let mut seen = HashSet::with_capacity(cache_only.len());
        for instance in &cache_only {
            if executable.contains(instance.as_str()) {
                return Err(ComposeError::ConflictingInstance(instance.clone()));
            }
            if !seen.insert(instance.as_str()) {
                return Err(ComposeError::DuplicateCacheOnly(instance.clone()));
            }
        }

        Ok(Self {
            schedulers,
            cache_only,
        })
    }

    pub fn schedulers(&self) -> &[SchedulerEntry] {
        &self.schedulers
    }

    pub fn cache_only(&self) -> &[InstanceName] {
        &self.cache_only
    }

    /// Action cache write permission per served instance.
    ///
    /// Cache-only instances always allow writes; executable instances only when their
    /// scheduler entry opts in.
    pub fn action_cache_permissions(&self) -> ActionCachePermissions {
        let scheduled = self
            .schedulers
            .iter()
            .map(|e| (e.instance.clone(), e.allow_action_cache_updates));
        let cache_only = self.cache_only.iter().map(|i| (i.clone(), true));

        ActionCachePermissions(Arc::new(scheduled.chain(cache_only).collect()))
    }

    /// Dial every scheduler and assemble the routing queue.
    ///
    /// Schedulers are connected one after another; the first failure aborts startup.
    /// Cache-only instances share one [`NonExecutableBuildQueue`].
    pub async fn connect(self, metrics: MetricsHandle) -> Result<Composition, ComposeError> {
        let action_cache_permissions = self.action_cache_permissions();
        let mut queues: HashMap<String, BuildQueueRef> =
            HashMap::with_capacity(self.schedulers.len() + self.cache_only.len());

        for entry in &self.schedulers {
            debug!(instance = %entry.instance, address = %entry.address, "connecting to scheduler");
            let queue = ForwardingBuildQueue::connect(entry, metrics.clone()).await?;
            queues.insert(entry.instance.clone(), Arc::new(queue));
        }

        if !self.cache_only.is_empty() {
            let shared: BuildQueueRef = Arc::new(NonExecutableBuildQueue::new(metrics.clone()));
            for instance in self.cache_only {
                queues.insert(instance, shared.clone());
            }
        }

        info!(
            schedulers = self.schedulers.len(),
            instances = queues.len(),
            "build queue routing table ready"
        );

        Ok(Composition {
            build_queue: DemultiplexingBuildQueue::new(InstanceTable::from(queues))
                .with_metrics(metrics),
            action_cache_permissions,
        })
    }
}

/// Output of [`InstancePlan::connect`].
pub struct Composition {
    /// Queue serving every configured instance.
    pub build_queue: DemultiplexingBuildQueue,
    /// Instances whose action cache may be written by clients.
    pub action_cache_permissions: ActionCachePermissions,
}

/// Read-only map of instance name to "clients may update the action cache".
///
/// Consumed by the storage side of the frontend, which is served elsewhere.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionCachePermissions(Arc<HashMap<InstanceName, bool>>);

impl ActionCachePermissions {
    /// Whether clients may write action results for `instance`.
    ///
    /// Unknown instances never allow writes.
    #[inline]
    pub fn allows_updates(&self, instance: &str) -> bool {
        self.0.get(instance).copied().unwrap_or(false)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
