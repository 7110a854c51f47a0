//! SensorId - radar name carried by every track the radar produces
//!
//! Backed by `Arc<str>`: each WorldTrack, TrackKey and FusedTrack holds one,
//! so clones are a refcount bump. Hash, Eq and Ord follow the plain string,
//! which keeps `HashMap<SensorId, _>` queryable by `&str`.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Radar identifier, the `name` of its `[[radars]]` entry.
///
/// # Examples
/// ```
/// use contracts::SensorId;
///
/// let left: SensorId = "radar_left".into();
/// assert_eq!(left, "radar_left");
/// assert!(left < SensorId::from("radar_right"));
/// ```
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct SensorId(Arc<str>);

impl SensorId {
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for SensorId {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for SensorId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for SensorId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SensorId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for SensorId {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

impl From<SensorId> for String {
    fn from(id: SensorId) -> Self {
        id.0.to_string()
    }
}

impl PartialEq<str> for SensorId {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for SensorId {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SensorId({:?})", &*self.0)
    }
}
