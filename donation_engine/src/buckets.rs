//! Donation buckets and the counts that are tracked for them.
//!
//! The set of buckets is fixed at compile time. Bucket [`DonationBucket::Total`] is a running total that is
//! incremented alongside every other bucket. It is never recomputed by summation.
use std::fmt::Display;

use serde::{ser::SerializeMap, Serialize, Serializer};
use thiserror::Error;

/// Number of buckets tracked by the counter.
pub const BUCKET_COUNT: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DonationBucket {
    Total,
    Pizza,
    Cola,
    Burger,
}

impl DonationBucket {
    pub const ALL: [DonationBucket; BUCKET_COUNT] =
        [DonationBucket::Total, DonationBucket::Pizza, DonationBucket::Cola, DonationBucket::Burger];

    /// The identifier used for this bucket in storage and on the wire.
    pub fn id(&self) -> i64 {
        match self {
            Self::Total => 1,
            Self::Pizza => 2,
            Self::Cola => 3,
            Self::Burger => 4,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Total => "total",
            Self::Pizza => "pizza",
            Self::Cola => "cola",
            Self::Burger => "burger",
        }
    }

    /// The count a bucket starts with when the store is seeded for the first time.
    pub fn seed_count(&self) -> i64 {
        match self {
            Self::Total => 20,
            Self::Pizza => 7,
            Self::Cola => 10,
            Self::Burger => 3,
        }
    }

    pub fn is_total(&self) -> bool {
        matches!(self, Self::Total)
    }

    fn index(&self) -> usize {
        match self {
            Self::Total => 0,
            Self::Pizza => 1,
            Self::Cola => 2,
            Self::Burger => 3,
        }
    }
}

impl Display for DonationBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{} ({})", self.id(), self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BucketError {
    #[error("Unknown donation bucket id: {0}")]
    UnknownBucket(i64),
    #[error("Donation bucket {0} is missing from the counter set")]
    MissingBucket(DonationBucket),
    #[error("Donation bucket {0} appears more than once in the counter set")]
    DuplicateBucket(DonationBucket),
    #[error("Donation bucket {0} has a negative count ({1})")]
    NegativeCount(DonationBucket, i64),
}

impl TryFrom<i64> for DonationBucket {
    type Error = BucketError;

    fn try_from(id: i64) -> Result<Self, Self::Error> {
        DonationBucket::ALL.into_iter().find(|b| b.id() == id).ok_or(BucketError::UnknownBucket(id))
    }
}

fn checked_add(mut values: [i64; BUCKET_COUNT], bucket: DonationBucket, delta: i64) -> Option<[i64; BUCKET_COUNT]> {
    let slot = &mut values[bucket.index()];
    *slot = slot.checked_add(delta)?;
    if !bucket.is_total() {
        let total = &mut values[DonationBucket::Total.index()];
        *total = total.checked_add(delta)?;
    }
    Some(values)
}

//-------------------------------------------------  BucketCounts  -----------------------------------------------------
/// A complete set of counts, one for every [`DonationBucket`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketCounts {
    counts: [i64; BUCKET_COUNT],
}

impl BucketCounts {
    /// The counts the store is seeded with.
    pub fn seeded() -> Self {
        let mut counts = [0; BUCKET_COUNT];
        for bucket in DonationBucket::ALL {
            counts[bucket.index()] = bucket.seed_count();
        }
        Self { counts }
    }

    /// Builds a full counter set from `(bucket id, count)` rows. Every bucket must appear exactly once, and unknown
    /// ids are rejected.
    pub fn try_from_rows<I>(rows: I) -> Result<Self, BucketError>
    where I: IntoIterator<Item = (i64, i64)> {
        let mut counts: [Option<i64>; BUCKET_COUNT] = [None; BUCKET_COUNT];
        for (id, count) in rows {
            let bucket = DonationBucket::try_from(id)?;
            if count < 0 {
                return Err(BucketError::NegativeCount(bucket, count));
            }
            let slot = &mut counts[bucket.index()];
            if slot.is_some() {
                return Err(BucketError::DuplicateBucket(bucket));
            }
            *slot = Some(count);
        }
        let mut result = [0; BUCKET_COUNT];
        for bucket in DonationBucket::ALL {
            result[bucket.index()] = counts[bucket.index()].ok_or(BucketError::MissingBucket(bucket))?;
        }
        Ok(Self { counts: result })
    }

    pub fn get(&self, bucket: DonationBucket) -> i64 {
        self.counts[bucket.index()]
    }

    /// Adds `delta` to `bucket` and to the total bucket. Returns `None`, leaving the counts untouched, if either count
    /// would overflow.
    pub(crate) fn try_add(&mut self, bucket: DonationBucket, delta: i64) -> Option<()> {
        self.counts = checked_add(self.counts, bucket, delta)?;
        Some(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (DonationBucket, i64)> + '_ {
        DonationBucket::ALL.into_iter().map(|b| (b, self.get(b)))
    }
}

impl Default for BucketCounts {
    fn default() -> Self {
        Self::seeded()
    }
}

//-------------------------------------------------  BucketDeltas  -----------------------------------------------------
/// The increments applied to each bucket during a single batch. The total bucket is accumulated alongside every
/// matched bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BucketDeltas {
    deltas: [i64; BUCKET_COUNT],
}

impl BucketDeltas {
    /// Records `delta` against `bucket` and the total bucket. Returns `None`, leaving the deltas untouched, if either
    /// would overflow.
    pub(crate) fn try_record(&mut self, bucket: DonationBucket, delta: i64) -> Option<()> {
        self.deltas = checked_add(self.deltas, bucket, delta)?;
        Some(())
    }

    pub fn get(&self, bucket: DonationBucket) -> i64 {
        self.deltas[bucket.index()]
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.iter().all(|d| *d == 0)
    }

    /// The buckets that changed, with the amount they changed by, in bucket id order.
    pub fn changed(&self) -> impl Iterator<Item = (DonationBucket, i64)> + '_ {
        DonationBucket::ALL.into_iter().map(|b| (b, self.get(b))).filter(|(_, d)| *d != 0)
    }
}

//----------------------------------------------  AggregationSnapshot  -------------------------------------------------
/// A point-in-time, immutable view of every bucket count.
///
/// Serializes as a JSON object keyed by bucket id, e.g. `{"1":20,"2":7,"3":10,"4":3}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregationSnapshot {
    counts: BucketCounts,
}

impl AggregationSnapshot {
    pub fn new(counts: BucketCounts) -> Self {
        Self { counts }
    }

    pub fn get(&self, bucket: DonationBucket) -> i64 {
        self.counts.get(bucket)
    }

    pub fn counts(&self) -> BucketCounts {
        self.counts
    }

    pub fn iter(&self) -> impl Iterator<Item = (DonationBucket, i64)> + '_ {
        self.counts.iter()
    }
}

impl From<BucketCounts> for AggregationSnapshot {
    fn from(counts: BucketCounts) -> Self {
        Self::new(counts)
    }
}

impl Serialize for AggregationSnapshot {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where S: Serializer {
        let mut map = serializer.serialize_map(Some(BUCKET_COUNT))?;
        for (bucket, count) in self.iter() {
            map.serialize_entry(&bucket.id().to_string(), &count)?;
        }
        map.end()
    }
}

impl Display for AggregationSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts = self.iter().map(|(b, c)| format!("{}={c}", b.label())).collect::<Vec<_>>();
        write!(f, "{{{}}}", parts.join(", "))
    }
}
