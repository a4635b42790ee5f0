use serde::Serialize;

use crate::buckets::AggregationSnapshot;

/// The name viewers know the snapshot event by.
pub const UPDATE_DONATIONS_EVENT: &str = "updateDonations";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DonationsUpdated(pub AggregationSnapshot);

impl DonationsUpdated {
    pub fn new(snapshot: AggregationSnapshot) -> Self {
        Self(snapshot)
    }

    pub fn event_name(&self) -> &'static str {
        UPDATE_DONATIONS_EVENT
    }

    pub fn snapshot(&self) -> &AggregationSnapshot {
        &self.0
    }
}
