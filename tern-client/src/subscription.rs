use std::collections::BTreeMap;

use tern_core::{qos::QoS, topic};

/// An active subscription with the QoS the broker granted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub topic_filter: String,
    pub qos: QoS,
}

/// Subscriptions acknowledged by the broker, keyed by topic filter.
#[derive(Debug, Default)]
pub(crate) struct SubscriptionSet {
    filters: BTreeMap<String, QoS>,
}

impl SubscriptionSet {
    /// Subscribing again to a filter replaces its QoS.
    pub(crate) fn insert(&mut self, topic_filter: String, qos: QoS) {
        self.filters.insert(topic_filter, qos);
    }

    pub(crate) fn remove(&mut self, topic_filter: &str) -> bool {
        self.filters.remove(topic_filter).is_some()
    }

    pub(crate) fn clear(&mut self) {
        self.filters.clear();
    }

    pub(crate) fn matches(&self, topic_name: &str) -> bool {
        self.filters
            .keys()
            .any(|filter| topic::matches(filter, topic_name))
    }

    pub(crate) fn to_vec(&self) -> Vec<Subscription> {
        self.filters
            .iter()
            .map(|(topic_filter, qos)| Subscription {
                topic_filter: topic_filter.clone(),
                qos: *qos,
            })
            .collect()
    }
}
