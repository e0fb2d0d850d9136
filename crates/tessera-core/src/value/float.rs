use derive_more::Display;
use serde::{Deserialize, Deserializer, Serialize, de};
use std::{
    cmp::Ordering,
    hash::{Hash, Hasher},
};

///
/// Float64
///
/// A finite `f64`. Zero has a single representation so that equality,
/// hashing and ordering all agree.
///

#[derive(Clone, Copy, Debug, Default, Display, Serialize)]
#[repr(transparent)]
pub struct Float64(f64);

impl Float64 {
    /// `None` for NaN and the infinities.
    #[must_use]
    pub fn try_new(v: f64) -> Option<Self> {
        v.is_finite().then(|| Self(if v == 0.0 { 0.0 } else { v }))
    }

    #[must_use]
    pub const fn get(self) -> f64 {
        self.0
    }
}

impl PartialEq for Float64 {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other).is_eq()
    }
}

impl Eq for Float64 {}

impl PartialOrd for Float64 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Float64 {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Hash for Float64 {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.0.to_bits());
    }
}

impl From<Float64> for f64 {
    fn from(v: Float64) -> Self {
        v.0
    }
}

impl<'de> Deserialize<'de> for Float64 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v = f64::deserialize(deserializer)?;

        Self::try_new(v).ok_or_else(|| de::Error::custom("non-finite float"))
    }
}
