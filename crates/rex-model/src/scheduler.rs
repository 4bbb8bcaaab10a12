use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    InstanceName,
    error::{ModelError, ModelResult},
};

/// Backend scheduler that executes build actions for one instance.
///
/// In configuration files an entry is either the compact `instance|address` form
/// or an object:
///
/// ```json
/// { "instance": "debian8", "address": "sched:8981", "allowActionCacheUpdates": true }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "SchedulerEntryRepr")]
pub struct SchedulerEntry {
    /// Instance routed to this scheduler.
    pub instance: InstanceName,
    /// gRPC address of the scheduler. A bare `host:port` is dialed over plaintext HTTP/2.
    pub address: String,
    /// Whether clients may also write into the action cache for this instance.
    #[serde(default)]
    pub allow_action_cache_updates: bool,
}

impl SchedulerEntry {
    /// Create an entry that does not grant action cache writes.
    pub fn new(instance: impl Into<InstanceName>, address: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
            address: address.into(),
            allow_action_cache_updates: false,
        }
    }

    /// Builder-style toggle for [`SchedulerEntry::allow_action_cache_updates`].
    pub fn with_action_cache_updates(mut self, allow: bool) -> Self {
        self.allow_action_cache_updates = allow;
        self
    }

    /// URI handed to the gRPC transport.
    ///
    /// ```
    /// use rex_model::SchedulerEntry;
    ///
    /// let e = SchedulerEntry::new("debian8", "sched:8981");
    /// assert_eq!(e.endpoint_uri(), "http://sched:8981");
    /// ```
    pub fn endpoint_uri(&self) -> String {
        if self.address.contains("://") {
            self.address.clone()
        } else {
            format!("http://{}", self.address)
        }
    }
}

impl FromStr for SchedulerEntry {
    type Err = ModelError;

    fn from_str(s: &str) -> ModelResult<Self> {
        let (instance, address) = s
            .split_once('|')
            .ok_or_else(|| ModelError::InvalidSchedulerEntry(s.to_string()))?;
        if address.trim().is_empty() {
            return Err(ModelError::EmptySchedulerAddress(instance.to_string()));
        }
        Ok(Self::new(instance, address.trim()))
    }
}

impl fmt::Display for SchedulerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.instance, self.address)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SchedulerEntryRepr {
    Compact(String),
    #[serde(rename_all = "camelCase")]
    Full {
        instance: InstanceName,
        address: String,
        #[serde(default)]
        allow_action_cache_updates: bool,
    },
}

impl TryFrom<SchedulerEntryRepr> for SchedulerEntry {
    type Error = ModelError;

    fn try_from(repr: SchedulerEntryRepr) -> ModelResult<Self> {
        match repr {
            SchedulerEntryRepr::Compact(s) => s.parse(),
            SchedulerEntryRepr::Full {
                instance,
                address,
                allow_action_cache_updates,
            } => {
                if address.trim().is_empty() {
                    return Err(ModelError::EmptySchedulerAddress(instance));
                }
                Ok(Self {
                    instance,
                    address,
                    allow_action_cache_updates,
                })
            }
        }
    }
}
