//! The board registry
//!
//! The registry is built once at start-up, either from a baked table with [`RegistryBuilder`] or
//! from a [`BoardConfig`](qif_common::board_config::BoardConfig) file, and is only read after
//! that.
use qif_common::{
    board::{BoardRecord, BoardType, BusAddress, HandlerId, Uid},
    constants::{BOARD_COUNT, MAX_BUS_ADDRESS, OFFSET_MASK, SLOTS_PER_BOARD},
};
use snafu::Snafu;

/// Errors raised by registry construction and lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Snafu)]
pub enum RegistryError {
    /// An offset outside the 16 slots of a board was requested
    #[snafu(display("Offset {offset} is not a valid slot"))]
    InvalidAddress {
        /// The offending offset
        offset: u8,
    },
    /// No record covers the address
    #[snafu(display("No board owns address {address:#x}"))]
    NotFound {
        /// The address looked up
        address: u16,
    },
    /// A record is stored at a position different from its label
    #[snafu(display("Record at position {position} has label {label}"))]
    LabelMismatch {
        /// Array position
        position: u8,
        /// Label found in the record
        label: u8,
    },
    /// A record's base address is not `label * 16`
    #[snafu(display("Board {label} has base address {address:#x}"))]
    AddressMismatch {
        /// The board label
        label: u8,
        /// The base address found in the record
        address: u16,
    },
    /// An undefined record carries a UID, a handler or a link
    #[snafu(display("Undefined board {label} is not inert"))]
    UndefinedNotInert {
        /// The board label
        label: u8,
    },
    /// Two assigned records share a UID
    #[snafu(display("UID {uid:#x} is shared by boards {first} and {second}"))]
    DuplicateUid {
        /// The shared UID
        uid: u64,
        /// First label
        first: u8,
        /// Second label
        second: u8,
    },
}

/// Immutable table of every board on the bus, indexed by label
#[derive(Debug, Clone)]
pub struct Registry {
    records: [BoardRecord; BOARD_COUNT],
}

impl Default for Registry {
    fn default() -> Self {
        Self::empty()
    }
}

impl Registry {
    /// A registry in which every label is undefined
    pub fn empty() -> Self {
        Self {
            records: core::array::from_fn(|i| BoardRecord::undefined(i as u8)),
        }
    }

    /// Start building a registry from individual records
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder {
            registry: Self::empty(),
        }
    }

    /// Create a registry, checking the table invariants
    ///
    /// - every record sits at the position given by its label
    /// - every base address is `label * 16`, which makes them unique and ordered
    /// - undefined records have no UID, only no-op handlers and no links
    /// - assigned UIDs are unique
    pub fn new(records: [BoardRecord; BOARD_COUNT]) -> Result<Self, RegistryError> {
        for (position, record) in records.iter().enumerate() {
            let position = position as u8;
            if record.label != position {
                return LabelMismatchSnafu {
                    position,
                    label: record.label,
                }
                .fail();
            }
            if record.bus_address != BusAddress::for_label(position) {
                return AddressMismatchSnafu {
                    label: position,
                    address: record.bus_address.raw(),
                }
                .fail();
            }
            if record.board_type == BoardType::Undefined && !record.is_inert() {
                return UndefinedNotInertSnafu { label: position }.fail();
            }
            if record.uid.is_assigned() {
                if let Some(first) = records[..position as usize]
                    .iter()
                    .find(|other| other.uid == record.uid)
                {
                    return DuplicateUidSnafu {
                        uid: record.uid.raw(),
                        first: first.label,
                        second: position,
                    }
                    .fail();
                }
            }
        }
        Ok(Self { records })
    }

    /// Find the board owning `address`
    pub fn lookup(&self, address: u16) -> Result<&BoardRecord, RegistryError> {
        if address > MAX_BUS_ADDRESS {
            return NotFoundSnafu { address }.fail();
        }
        let index = ((address & !OFFSET_MASK) >> 4) as usize;
        self.records
            .get(index)
            .ok_or(RegistryError::NotFound { address })
    }

    /// Get the handler for one slot of the board owning `address`
    pub fn resolve_handler(&self, address: u16, offset: u8) -> Result<HandlerId, RegistryError> {
        let slot = Self::check_offset(offset)?;
        Ok(self.lookup(address)?.handlers[slot])
    }

    /// Get the link target for one slot of the board owning `address`
    pub fn resolve_link(
        &self,
        address: u16,
        offset: u8,
    ) -> Result<Option<BusAddress>, RegistryError> {
        let slot = Self::check_offset(offset)?;
        Ok(self.lookup(address)?.links[slot])
    }

    fn check_offset(offset: u8) -> Result<usize, RegistryError> {
        if offset as usize >= SLOTS_PER_BOARD {
            InvalidAddressSnafu { offset }.fail()
        } else {
            Ok(offset as usize)
        }
    }

    /// Get a record by label
    pub fn record(&self, label: u8) -> Option<&BoardRecord> {
        self.records.get(label as usize)
    }

    /// Find the installed board with the given UID
    pub fn find_by_uid(&self, uid: Uid) -> Option<&BoardRecord> {
        if !uid.is_assigned() {
            return None;
        }
        self.records.iter().find(|r| r.uid == uid)
    }

    /// The type of the board with the given UID; unknown UIDs are undefined
    pub fn board_type_of(&self, uid: Uid) -> BoardType {
        self.find_by_uid(uid)
            .map(|r| r.board_type)
            .unwrap_or(BoardType::Undefined)
    }

    /// Iterate over all records in label order
    pub fn iter(&self) -> impl Iterator<Item = &BoardRecord> {
        self.records.iter()
    }

    /// Iterate over installed boards only
    pub fn installed(&self) -> impl Iterator<Item = &BoardRecord> {
        self.records
            .iter()
            .filter(|r| r.board_type != BoardType::Undefined)
    }
}

/// Incrementally builds a [`Registry`]
#[derive(Debug, Clone)]
pub struct RegistryBuilder {
    registry: Registry,
}

impl RegistryBuilder {
    /// Place a record at its label, replacing the undefined placeholder
    pub fn board(mut self, record: BoardRecord) -> Self {
        let index = record.label as usize;
        if let Some(slot) = self.registry.records.get_mut(index) {
            *slot = record;
        }
        self
    }

    /// Validate and finish the registry
    pub fn build(self) -> Result<Registry, RegistryError> {
        Registry::new(self.registry.records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qif_common::board::HandlerId;

    fn board004_led(offset: u8) -> BusAddress {
        BusAddress::for_label(4).with_offset(offset).unwrap()
    }

    fn test_registry() -> Registry {
        Registry::builder()
            .board(BoardRecord::new(
                1,
                Uid::new(0x4fc844355348),
                BoardType::LowPower,
            ))
            .board(
                BoardRecord::new(2, Uid::new(0xc7e869175348), BoardType::Switch)
                    .with_links(&[board004_led(0), board004_led(1)]),
            )
            .board(BoardRecord::new(
                4,
                Uid::new(0xd3ff7d36534c),
                BoardType::Switch,
            ))
            .build()
            .unwrap()
    }

    #[test]
    fn test_lookup_returns_owning_board() {
        let registry = test_registry();
        for address in 0..=MAX_BUS_ADDRESS {
            let record = registry.lookup(address).unwrap();
            assert_eq!(address & !0xF, record.bus_address.raw());
        }
        assert_eq!(
            Err(RegistryError::NotFound { address: 0x800 }),
            registry.lookup(0x800)
        );
    }

    #[test]
    fn test_base_addresses_are_unique() {
        let registry = test_registry();
        let mut bases: Vec<u16> = registry.iter().map(|r| r.bus_address.raw()).collect();
        let total = bases.len();
        bases.dedup();
        assert_eq!(total, bases.len());
        assert_eq!(BOARD_COUNT, total);
        assert!(bases.windows(2).all(|w| w[1] == w[0] + 16));
    }

    #[test]
    fn test_undefined_boards_are_inert() {
        let registry = test_registry();
        for record in registry.iter() {
            if record.board_type == BoardType::Undefined {
                assert!(record.handlers.iter().all(|h| *h == HandlerId::Noop));
                assert!(record.links.iter().all(|l| l.is_none()));
                assert!(!record.uid.is_assigned());
            }
        }
    }

    #[test]
    fn test_resolve_handler_and_link() {
        let registry = test_registry();
        assert_eq!(
            Ok(HandlerId::Function(1)),
            registry.resolve_handler(0x021, 1)
        );
        assert_eq!(Ok(Some(board004_led(1))), registry.resolve_link(0x020, 1));
        assert_eq!(Ok(None), registry.resolve_link(0x020, 2));
        assert_eq!(Ok(HandlerId::Noop), registry.resolve_handler(0x030, 0));
        assert_eq!(
            Err(RegistryError::InvalidAddress { offset: 16 }),
            registry.resolve_handler(0x020, 16)
        );
    }

    #[test]
    fn test_unknown_uid_is_undefined() {
        let registry = test_registry();
        assert_eq!(
            BoardType::Switch,
            registry.board_type_of(Uid::new(0xc7e869175348))
        );
        assert_eq!(BoardType::Undefined, registry.board_type_of(Uid::new(0x1234)));
        assert_eq!(None, registry.find_by_uid(Uid::UNASSIGNED));
        assert_eq!(3, registry.installed().count());
    }

    #[test]
    fn test_invariants_are_enforced() {
        let mut records: [BoardRecord; BOARD_COUNT] =
            core::array::from_fn(|i| BoardRecord::undefined(i as u8));
        records[5].links[0] = Some(BusAddress::for_label(6));
        assert_eq!(
            Err(RegistryError::UndefinedNotInert { label: 5 }),
            Registry::new(records).map(|_| ())
        );

        let mut records: [BoardRecord; BOARD_COUNT] =
            core::array::from_fn(|i| BoardRecord::undefined(i as u8));
        records[31].bus_address = BusAddress::for_label(29);
        assert_eq!(
            Err(RegistryError::AddressMismatch {
                label: 31,
                address: 0x1d0
            }),
            Registry::new(records).map(|_| ())
        );

        let result = Registry::builder()
            .board(BoardRecord::new(1, Uid::new(7), BoardType::LowPower))
            .board(BoardRecord::new(51, Uid::new(7), BoardType::LowPower))
            .build();
        assert_eq!(
            Err(RegistryError::DuplicateUid {
                uid: 7,
                first: 1,
                second: 51
            }),
            result.map(|_| ())
        );
    }
}
