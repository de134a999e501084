//! Admission filter for incoming frames
//!
//! The table holds [`MAX_FILTERS`] slots which are overwritten one at a time by update messages
//! on the service channel. Slots are evaluated in ascending order and the first matching entry
//! decides.
//!
//! - A `Pass` entry admits exactly its address.
//! - A `Block` entry denies exactly its address.
//! - A `RangeStart` entry pairs with the nearest `RangeEnd` at a higher slot and admits every
//!   address between the two bounds, inclusive. An inverted range admits nothing.
//!
//! A slot holding `Pass` with address 0 is empty. When no slot holds an admitting entry the
//! filter is open and every unmatched address is admitted; as soon as one `Pass` or
//! `RangeStart` entry exists, unmatched addresses are denied.
use qif_common::{
    constants::MAX_FILTERS,
    messages::{FilterType, FilterUpdate},
};
use snafu::Snafu;

/// One slot of the filter table
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterEntry {
    /// Address matched by this entry
    pub filter_address: u16,
    /// How the entry is interpreted
    pub filter_type: FilterType,
    /// Function address reported when this entry admits a frame
    pub function_address: u8,
}

impl FilterEntry {
    /// The cleared entry
    pub const EMPTY: FilterEntry = FilterEntry {
        filter_address: 0,
        filter_type: FilterType::Pass,
        function_address: 0,
    };

    /// Returns true for a cleared slot
    ///
    /// `Pass` with address 0 can therefore never admit 0x000; a `RangeStart`/`RangeEnd` pair
    /// over 0x000 does.
    pub fn is_empty(&self) -> bool {
        self.filter_type == FilterType::Pass && self.filter_address == 0
    }

    fn is_admitting(&self) -> bool {
        !self.is_empty() && matches!(self.filter_type, FilterType::Pass | FilterType::RangeStart)
    }
}

/// Result of evaluating an address against the table
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    /// Process the frame, with the function address of the matching entry
    Admit(u8),
    /// Drop the frame
    Deny,
}

/// Error returned by [`FilterTable::update`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Snafu)]
pub enum FilterError {
    /// The slot index is beyond the end of the table
    #[snafu(display("Filter slot {slot} is out of range"))]
    SlotOutOfRange {
        /// Requested slot
        slot: usize,
    },
}

/// The filter table
#[derive(Clone, Debug)]
pub struct FilterTable {
    entries: [FilterEntry; MAX_FILTERS],
}

impl Default for FilterTable {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterTable {
    /// Create a table with every slot cleared
    pub const fn new() -> Self {
        Self {
            entries: [FilterEntry::EMPTY; MAX_FILTERS],
        }
    }

    /// Overwrite one slot
    ///
    /// The table is left untouched when `slot` is out of range.
    pub fn update(
        &mut self,
        slot: usize,
        filter_address: u16,
        filter_type: FilterType,
        function_address: u8,
    ) -> Result<(), FilterError> {
        let entry = self
            .entries
            .get_mut(slot)
            .ok_or(FilterError::SlotOutOfRange { slot })?;
        *entry = FilterEntry {
            filter_address,
            filter_type,
            function_address,
        };
        Ok(())
    }

    /// Apply an update received on the service channel
    pub fn apply(&mut self, update: &FilterUpdate) -> Result<(), FilterError> {
        self.update(
            update.slot as usize,
            update.address,
            update.filter_type,
            update.function_address,
        )
    }

    /// Clear one slot
    pub fn clear(&mut self, slot: usize) -> Result<(), FilterError> {
        self.update(slot, 0, FilterType::Pass, 0)
    }

    /// Decide whether a frame addressed to `address` is processed
    pub fn decide(&self, address: u16) -> Decision {
        for (slot, entry) in self.entries.iter().enumerate() {
            if entry.is_empty() {
                continue;
            }
            match entry.filter_type {
                FilterType::Pass if entry.filter_address == address => {
                    return Decision::Admit(entry.function_address);
                }
                FilterType::Block if entry.filter_address == address => {
                    return Decision::Deny;
                }
                FilterType::RangeStart => {
                    if let Some(end) = self.range_end_after(slot) {
                        if (entry.filter_address..=end).contains(&address) {
                            return Decision::Admit(entry.function_address);
                        }
                    }
                }
                _ => (),
            }
        }
        if self.entries.iter().any(|e| e.is_admitting()) {
            Decision::Deny
        } else {
            Decision::Admit(0)
        }
    }

    fn range_end_after(&self, slot: usize) -> Option<u16> {
        self.entries[slot + 1..]
            .iter()
            .find(|e| e.filter_type == FilterType::RangeEnd)
            .map(|e| e.filter_address)
    }

    /// Get the entry in a slot
    pub fn entry(&self, slot: usize) -> Option<&FilterEntry> {
        self.entries.get(slot)
    }

    /// Iterate over the occupied slots, with their index
    pub fn active(&self) -> impl Iterator<Item = (usize, &FilterEntry)> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| !e.is_empty())
    }
}
