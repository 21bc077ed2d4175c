// Per-lead sample buffering
//
// Every lead owns a committed capture and a bounded live window for preview.
// Incoming batches accumulate in a single in-flight buffer that belongs to
// the active lead; BUFFER:FULL and DATA:END commit it, DATA:START discards it.

use crate::link::protocol::ProtocolEvent;
use crate::link::types::{DeviceStatus, Lead};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default number of samples retained for preview per lead
pub const LIVE_WINDOW_CAPACITY: usize = 500;

/// Samples held for one lead
#[derive(Debug, Clone, Default)]
pub struct ChannelBuffer {
    captured: Vec<i32>,
    live_window: VecDeque<i32>,
}

impl ChannelBuffer {
    pub fn captured(&self) -> &[i32] {
        &self.captured
    }

    pub fn live_window(&self) -> Vec<i32> {
        self.live_window.iter().copied().collect()
    }

    fn push_live(&mut self, values: &[i32], capacity: usize) {
        self.live_window.extend(values.iter().copied());
        let excess = self.live_window.len().saturating_sub(capacity);
        if excess > 0 {
            self.live_window.drain(..excess);
        }
    }

    fn commit(&mut self, samples: Vec<i32>) {
        self.captured = samples;
    }
}

/// What a protocol event changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferUpdate {
    /// Nothing was mutated
    Unchanged,
    /// Samples were appended for the lead
    Samples { lead: Lead, count: usize },
    /// The in-flight buffer was committed as the lead's capture
    Committed { lead: Lead, len: usize },
    /// The in-flight buffer was discarded
    Discarded { len: usize },
    /// The device reported a status line
    Status(DeviceStatus),
}

/// Aggregates decoded events into the three lead buffers
#[derive(Debug, Clone)]
pub struct LeadBuffers {
    active: Lead,
    in_flight: Vec<i32>,
    channels: [ChannelBuffer; 3],
    live_capacity: usize,
    status: DeviceStatus,
}

impl Default for LeadBuffers {
    fn default() -> Self {
        Self::new(LIVE_WINDOW_CAPACITY)
    }
}

impl LeadBuffers {
    pub fn new(live_capacity: usize) -> Self {
        Self {
            active: Lead::I,
            in_flight: Vec::new(),
            channels: Default::default(),
            live_capacity: live_capacity.max(1),
            status: DeviceStatus::Unknown,
        }
    }

    /// Apply one decoded event
    pub fn apply(&mut self, event: &ProtocolEvent) -> BufferUpdate {
        match event {
            ProtocolEvent::SampleBatch(values) => {
                let lead = self.active;
                self.in_flight.extend_from_slice(values);
                self.channels[lead.index()].push_live(values, self.live_capacity);
                BufferUpdate::Samples {
                    lead,
                    count: values.len(),
                }
            }
            ProtocolEvent::BufferFull | ProtocolEvent::DataEnd => match self.flush() {
                Some((lead, len)) => BufferUpdate::Committed { lead, len },
                None => BufferUpdate::Unchanged,
            },
            ProtocolEvent::DataStart => {
                let len = self.in_flight.len();
                self.in_flight.clear();
                BufferUpdate::Discarded { len }
            }
            ProtocolEvent::StatusUpdate(text) => {
                self.status = DeviceStatus::from_status_text(text);
                BufferUpdate::Status(self.status.clone())
            }
            ProtocolEvent::Unrecognized(_) => BufferUpdate::Unchanged,
        }
    }

    /// Commit the in-flight buffer to the active lead
    ///
    /// An empty in-flight buffer never overwrites an existing capture.
    pub fn flush(&mut self) -> Option<(Lead, usize)> {
        if self.in_flight.is_empty() {
            return None;
        }
        let lead = self.active;
        let samples = std::mem::take(&mut self.in_flight);
        let len = samples.len();
        self.channels[lead.index()].commit(samples);
        Some((lead, len))
    }

    /// Make `lead` the target of incoming batches
    ///
    /// Changing the lead drops any uncommitted samples of the previous one.
    /// Returns true if the active lead changed.
    pub fn set_active(&mut self, lead: Lead) -> bool {
        if lead == self.active {
            return false;
        }
        self.active = lead;
        self.in_flight.clear();
        true
    }

    pub fn active(&self) -> Lead {
        self.active
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn status(&self) -> &DeviceStatus {
        &self.status
    }

    pub fn channel(&self, lead: Lead) -> &ChannelBuffer {
        &self.channels[lead.index()]
    }

    pub fn captured(&self, lead: Lead) -> Vec<i32> {
        self.channel(lead).captured().to_vec()
    }

    pub fn live_window(&self, lead: Lead) -> Vec<i32> {
        self.channel(lead).live_window()
    }

    pub fn clear_live_window(&mut self, lead: Lead) {
        self.channels[lead.index()].live_window.clear();
    }

    /// Drop every capture and live window
    pub fn reset(&mut self) {
        self.in_flight.clear();
        self.channels = Default::default();
        self.status = DeviceStatus::Unknown;
    }

    pub fn snapshot(&self) -> LeadSnapshot {
        LeadSnapshot {
            lead1: self.captured(Lead::I),
            lead2: self.captured(Lead::II),
            lead3: self.captured(Lead::III),
        }
    }
}

/// Immutable copy of the three committed captures
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadSnapshot {
    pub lead1: Vec<i32>,
    pub lead2: Vec<i32>,
    pub lead3: Vec<i32>,
}

impl LeadSnapshot {
    pub fn get(&self, lead: Lead) -> &[i32] {
        match lead {
            Lead::I => &self.lead1,
            Lead::II => &self.lead2,
            Lead::III => &self.lead3,
        }
    }

    /// True once every lead holds a capture
    pub fn is_complete(&self) -> bool {
        Lead::ALL.iter().all(|&lead| !self.get(lead).is_empty())
    }
}
