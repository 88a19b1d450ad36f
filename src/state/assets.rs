//! Visual attachment collaborator
//!
//! Rendering lives outside this crate. Managers only ask for a handle when an
//! object is created and hand it back exactly once when it is destroyed.

use std::collections::{HashMap, HashSet};
use std::fmt;

use tracing::trace;

/// Opaque handle to an attached 3D model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModelHandle(u64);

impl fmt::Display for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "model#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AssetError {
    #[error("unknown asset: {0}")]
    UnknownAsset(String),

    #[error("{0} is not attached")]
    NotAttached(ModelHandle),
}

pub trait AssetManager: Send {
    /// Attach a model for `key` and return its handle
    fn get_3d_asset(&mut self, key: &str) -> Result<ModelHandle, AssetError>;

    /// Detach a model; releasing a handle twice is an error
    fn release(&mut self, handle: ModelHandle) -> Result<(), AssetError>;
}

/// Headless asset manager that only tracks live attachments
#[derive(Debug, Default)]
pub struct AttachmentTracker {
    next_handle: u64,
    known_keys: Option<HashSet<String>>,
    live: HashMap<ModelHandle, String>,
    attached_total: u64,
    released_total: u64,
}

impl AttachmentTracker {
    /// Tracker accepting any asset key
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracker that rejects keys outside `keys`
    pub fn with_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            known_keys: Some(keys.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    pub fn live(&self) -> usize {
        self.live.len()
    }

    pub fn is_live(&self, handle: ModelHandle) -> bool {
        self.live.contains_key(&handle)
    }

    pub fn attached_total(&self) -> u64 {
        self.attached_total
    }

    pub fn released_total(&self) -> u64 {
        self.released_total
    }
}

impl AssetManager for AttachmentTracker {
    fn get_3d_asset(&mut self, key: &str) -> Result<ModelHandle, AssetError> {
        if let Some(known) = &self.known_keys {
            if !known.contains(key) {
                return Err(AssetError::UnknownAsset(key.to_string()));
            }
        }
        self.next_handle += 1;
        let handle = ModelHandle(self.next_handle);
        self.live.insert(handle, key.to_string());
        self.attached_total += 1;
        trace!(%handle, key, "Attached model");
        Ok(handle)
    }

    fn release(&mut self, handle: ModelHandle) -> Result<(), AssetError> {
        match self.live.remove(&handle) {
            Some(key) => {
                self.released_total += 1;
                trace!(%handle, key, "Released model");
                Ok(())
            }
            None => Err(AssetError::NotAttached(handle)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_release_is_rejected() {
        let mut tracker = AttachmentTracker::new();
        let handle = tracker.get_3d_asset("space_fighter").expect("attach");
        assert_eq!(tracker.live(), 1);

        assert_eq!(tracker.release(handle), Ok(()));
        assert_eq!(tracker.release(handle), Err(AssetError::NotAttached(handle)));
        assert_eq!(tracker.live(), 0);
        assert_eq!(tracker.released_total(), 1);
    }

    #[test]
    fn restricted_tracker_rejects_unknown_keys() {
        let mut tracker = AttachmentTracker::with_keys(["space_fighter"]);
        assert!(tracker.get_3d_asset("space_fighter").is_ok());
        assert_eq!(
            tracker.get_3d_asset("mothership"),
            Err(AssetError::UnknownAsset("mothership".into()))
        );
        assert_eq!(tracker.attached_total(), 1);
    }
}
