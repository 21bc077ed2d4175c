// Observer slots for link notifications
//
// Each slot holds at most one subscriber. Callbacks run on the link's event
// loop, synchronously with the event that caused them. The slot lock is
// released before a callback runs, so a callback may replace any slot,
// including its own.

use crate::link::types::{DeviceStatus, Lead};
use parking_lot::RwLock;
use std::sync::Arc;

type ConnectionCallback = Arc<dyn Fn(bool) + Send + Sync>;
type ErrorCallback = Arc<dyn Fn(&str) + Send + Sync>;
type SampleCallback = Arc<dyn Fn(Lead) + Send + Sync>;
type StatusCallback = Arc<dyn Fn(&DeviceStatus) + Send + Sync>;

#[derive(Default)]
pub struct LinkCallbacks {
    connection_changed: RwLock<Option<ConnectionCallback>>,
    error: RwLock<Option<ErrorCallback>>,
    sample_update: RwLock<Option<SampleCallback>>,
    status: RwLock<Option<StatusCallback>>,
}

impl LinkCallbacks {
    pub fn set_connection_changed(&self, callback: Option<ConnectionCallback>) {
        *self.connection_changed.write() = callback;
    }

    pub fn set_error(&self, callback: Option<ErrorCallback>) {
        *self.error.write() = callback;
    }

    pub fn set_sample_update(&self, callback: Option<SampleCallback>) {
        *self.sample_update.write() = callback;
    }

    pub fn set_status(&self, callback: Option<StatusCallback>) {
        *self.status.write() = callback;
    }

    pub fn clear(&self) {
        self.set_connection_changed(None);
        self.set_error(None);
        self.set_sample_update(None);
        self.set_status(None);
    }

    pub(crate) fn connection_changed(&self, connected: bool) {
        let callback = self.connection_changed.read().clone();
        if let Some(callback) = callback {
            callback(connected);
        }
    }

    pub(crate) fn error(&self, message: &str) {
        log::error!("{}", message);
        let callback = self.error.read().clone();
        if let Some(callback) = callback {
            callback(message);
        }
    }

    pub(crate) fn sample_update(&self, lead: Lead) {
        let callback = self.sample_update.read().clone();
        if let Some(callback) = callback {
            callback(lead);
        }
    }

    pub(crate) fn status(&self, status: &DeviceStatus) {
        let callback = self.status.read().clone();
        if let Some(callback) = callback {
            callback(status);
        }
    }
}
