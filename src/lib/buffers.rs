// SPDX-License-Identifier: Apache-2.0

use crate::GlobalNetworkInfo;

/// Two desired state slots: the parse target ("current") and the snapshot
/// most recently driven into the system ("applied").
///
/// The two designations never refer to the same slot.
#[derive(Debug, Clone, Default)]
pub struct GniBuffers {
    slots: [GlobalNetworkInfo; 2],
    current: usize,
    applied: Option<usize>,
}

impl GniBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> &GlobalNetworkInfo {
        &self.slots[self.current]
    }

    /// Replace the current slot with a freshly parsed document
    pub fn set_current(&mut self, gni: GlobalNetworkInfo) {
        self.slots[self.current] = gni;
    }

    pub fn applied(&self) -> Option<&GlobalNetworkInfo> {
        self.applied.map(|i| &self.slots[i])
    }

    /// Both designations at once for scrub
    pub fn current_and_applied(
        &self,
    ) -> (&GlobalNetworkInfo, Option<&GlobalNetworkInfo>) {
        (self.current(), self.applied())
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn applied_index(&self) -> Option<usize> {
        self.applied
    }

    /// Publish the current slot as applied and make the other slot the
    /// next parse target. The new target starts as a copy of what was just
    /// applied so it stays meaningful when the next cycle does not parse.
    pub fn publish_applied(&mut self) {
        let applied = self.current;
        self.current = 1 - applied;
        self.applied = Some(applied);
        let (left, right) = self.slots.split_at_mut(1);
        if applied == 0 {
            right[0].clone_from(&left[0]);
        } else {
            left[0].clone_from(&right[0]);
        }
    }

    /// Forget the applied snapshot, forcing a full scrub next time
    pub fn invalidate_applied(&mut self) {
        self.applied = None;
    }
}
