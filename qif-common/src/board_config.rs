//! Board database file
//!
//! The board database is loaded once at start-up from a TOML file and never changes afterwards.
//! Only installed boards need to be listed; every other label becomes an undefined record.
//!
//! # An example TOML file
//!
//! ```toml
//! # A low power board whose last slot reports to board 2
//! [[boards]]
//! label = 1
//! uid = 0x4fc844355348
//! board_type = "lowpower"
//! links = [-1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, 0x02F]
//!
//! # A switch board: each button lights an LED on board 4
//! [[boards]]
//! label = 2
//! uid = 0xc7e869175348
//! board_type = "switch"
//! links = [0x040, 0x041, 0x042, 0x043, 0x046, 0x045, 0x046, 0x047]
//!
//! # A virtual switch board: no hardware, its addresses are only forwarded
//! [[boards]]
//! label = 100
//! board_type = "switch"
//! handlers = "noop"
//! links = [0x660, 0x661, 0x662, 0x663, 0x666, 0x665, 0x666, 0x667]
//! ```
//!
//! # Fields
//!
//! - `label`: 0 to 127, the base address is `label * 16`.
//! - `uid`: the 48-bit truncated hardware UID. Boards without one never match a heartbeat.
//! - `board_type`: one of `undefined`, `switch`, `lowpower`, `mediumpower`, `highpower`.
//! - `handlers`: `"functions"` (the default, FCT00 to FCT15 in slot order), `"noop"`, or a list of
//!   up to 16 entries which are either a function code 0 to 15 or `"noop"`.
//! - `links`: up to 16 signed addresses, `-1` leaves a slot unlinked. Missing trailing entries are
//!   unlinked.
use std::collections::HashMap;

use serde::{de::Error, Deserialize};
use snafu::ResultExt as _;
use snafu::Snafu;

use crate::board::{BoardRecord, BoardType, BusAddress, HandlerId, Uid};
use crate::constants::{BOARD_COUNT, LINK_NONE, SLOTS_PER_BOARD};

/// Error returned when loading a board config fails
#[derive(Debug, Snafu)]
pub enum LoadError {
    /// An IO error occured while reading the file
    #[snafu(display("IO error: {source}"))]
    Io {
        /// The underlying IO error
        source: std::io::Error,
    },
    /// An error occured in the TOML parser
    #[snafu(display("Toml parse error: {source}"))]
    TomlParsing {
        /// The toml error which led to this error
        source: toml::de::Error,
    },
    /// Label does not fit in the registry
    #[snafu(display("Label {label} is out of range (0..{})", BOARD_COUNT))]
    LabelOutOfRange {
        /// The label
        label: u16,
    },
    /// Multiple boards defined with the same label
    #[snafu(display("Multiple definitions for board with label {label}"))]
    DuplicateLabel {
        /// The duplicated label
        label: u8,
    },
    /// Two installed boards share a UID
    #[snafu(display("UID {uid:#014x} is used by boards {first} and {second}"))]
    DuplicateUid {
        /// The shared UID
        uid: u64,
        /// Label of the first board
        first: u8,
        /// Label of the second board
        second: u8,
    },
    /// An undefined board carries a UID, handlers or links
    #[snafu(display("Undefined board {label} must not carry a UID, handlers or links"))]
    UndefinedConfigured {
        /// The board label
        label: u8,
    },
    /// More than 16 handlers or links
    #[snafu(display("Board {label} lists more than 16 {field}"))]
    TooManySlots {
        /// The board label
        label: u8,
        /// Either "handlers" or "links"
        field: &'static str,
    },
    /// A handler code is not in 0..16
    #[snafu(display("Board {label} uses unknown function code {code}"))]
    InvalidHandler {
        /// The board label
        label: u8,
        /// The offending code
        code: u8,
    },
    /// A link target is not an 11-bit address
    #[snafu(display("Board {label} slot {offset} links to invalid address {value}"))]
    InvalidLink {
        /// The board label
        label: u8,
        /// Slot of the link
        offset: usize,
        /// The offending value
        value: i32,
    },
}

/// One handler slot in the config file
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum HandlerEntry {
    /// A function code, 0 to 15
    Code(u8),
    /// A named handler, only `"noop"` is recognised
    Named(NamedHandler),
}

/// Handlers which can be named in the config file
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NamedHandler {
    /// No-op handler
    #[serde(alias = "dummy")]
    Noop,
}

/// The handler table of a board in the config file
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum HandlerList {
    /// A preset for all 16 slots
    Preset(HandlerPreset),
    /// An explicit list, missing trailing slots are no-op
    List(Vec<HandlerEntry>),
}

/// Handler presets
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HandlerPreset {
    /// FCT00 to FCT15 in slot order
    Functions,
    /// No-op on every slot
    #[serde(alias = "dummy")]
    Noop,
}

/// One board definition
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct BoardDefinition {
    /// Board label, 0 to 127
    pub label: u16,
    /// Truncated hardware UID
    #[serde(default, deserialize_with = "deserialize_uid")]
    pub uid: Option<Uid>,
    /// Kind of board
    pub board_type: BoardType,
    /// Handler table
    #[serde(default)]
    pub handlers: Option<HandlerList>,
    /// Link table
    #[serde(default)]
    pub links: Vec<i32>,
}

fn deserialize_uid<'de, D>(deserializer: D) -> Result<Option<Uid>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = i64::deserialize(deserializer)?;
    if !(0..=0xFFFF_FFFF_FFFF).contains(&value) {
        return Err(D::Error::custom(format!(
            "UID {value:#x} does not fit in 48 bits"
        )));
    }
    Ok(Some(Uid::new(value as u64)))
}

/// The installation's board database
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct BoardConfig {
    /// Installed boards
    #[serde(default)]
    pub boards: Vec<BoardDefinition>,
}

impl BoardConfig {
    /// Try to read a board config from a file
    pub fn load(config_path: impl AsRef<std::path::Path>) -> Result<Self, LoadError> {
        let config_str = std::fs::read_to_string(&config_path).context(IoSnafu)?;
        Self::load_from_str(&config_str)
    }

    /// Try to read a config from a &str
    pub fn load_from_str(config_str: &str) -> Result<Self, LoadError> {
        let config: BoardConfig = toml::from_str(config_str).context(TomlParsingSnafu)?;
        config.records()?;
        Ok(config)
    }

    /// Build the full table of board records, one per label
    pub fn records(&self) -> Result<[BoardRecord; BOARD_COUNT], LoadError> {
        let mut records: [BoardRecord; BOARD_COUNT] =
            core::array::from_fn(|i| BoardRecord::undefined(i as u8));
        let mut seen_labels = [false; BOARD_COUNT];
        let mut uids: HashMap<u64, u8> = HashMap::new();

        for def in &self.boards {
            let record = def.to_record()?;
            let label = record.label;
            if seen_labels[label as usize] {
                return DuplicateLabelSnafu { label }.fail();
            }
            seen_labels[label as usize] = true;

            if record.uid.is_assigned() {
                if let Some(first) = uids.insert(record.uid.raw(), label) {
                    return DuplicateUidSnafu {
                        uid: record.uid.raw(),
                        first,
                        second: label,
                    }
                    .fail();
                }
            }
            records[label as usize] = record;
        }
        Ok(records)
    }
}

impl BoardDefinition {
    fn to_record(&self) -> Result<BoardRecord, LoadError> {
        if self.label as usize >= BOARD_COUNT {
            return LabelOutOfRangeSnafu { label: self.label }.fail();
        }
        let label = self.label as u8;

        if self.board_type == BoardType::Undefined {
            if self.uid.is_some() || self.handlers.is_some() || !self.links.is_empty() {
                return UndefinedConfiguredSnafu { label }.fail();
            }
            return Ok(BoardRecord::undefined(label));
        }

        // Boards without a UID are virtual: they route, but never send heartbeats
        let uid = self.uid.unwrap_or(Uid::UNASSIGNED);

        let handlers = match &self.handlers {
            None | Some(HandlerList::Preset(HandlerPreset::Functions)) => {
                HandlerId::all_functions()
            }
            Some(HandlerList::Preset(HandlerPreset::Noop)) => [HandlerId::Noop; SLOTS_PER_BOARD],
            Some(HandlerList::List(list)) => {
                if list.len() > SLOTS_PER_BOARD {
                    return TooManySlotsSnafu {
                        label,
                        field: "handlers",
                    }
                    .fail();
                }
                let mut handlers = [HandlerId::Noop; SLOTS_PER_BOARD];
                for (slot, entry) in handlers.iter_mut().zip(list) {
                    *slot = match entry {
                        HandlerEntry::Code(code) => HandlerId::function(*code)
                            .ok_or(LoadError::InvalidHandler { label, code: *code })?,
                        HandlerEntry::Named(NamedHandler::Noop) => HandlerId::Noop,
                    };
                }
                handlers
            }
        };

        if self.links.len() > SLOTS_PER_BOARD {
            return TooManySlotsSnafu {
                label,
                field: "links",
            }
            .fail();
        }
        let mut record = BoardRecord::new(label, uid, self.board_type).with_handlers(handlers);
        for (offset, &value) in self.links.iter().enumerate() {
            if value == LINK_NONE as i32 {
                continue;
            }
            let target = u16::try_from(value)
                .ok()
                .and_then(|v| BusAddress::new(v).ok())
                .ok_or(LoadError::InvalidLink {
                    label,
                    offset,
                    value,
                })?;
            record.links[offset] = Some(target);
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assertables::assert_contains;

    const TOML: &str = r#"
        [[boards]]
        label = 2
        uid = 0xc7e869175348
        board_type = "switch"
        links = [0x040, 0x041, 0x042, 0x043, 0x046, 0x045, 0x046, 0x047]

        [[boards]]
        label = 4
        uid = 0xd3ff7d36534c
        board_type = "switch"
        handlers = [0, 1, "noop", 3]

        [[boards]]
        label = 101
        uid = 0x88F918495348
        board_type = "mpower"
        handlers = "noop"
    "#;

    #[test]
    fn test_load_records() {
        let config = BoardConfig::load_from_str(TOML).unwrap();
        let records = config.records().unwrap();

        let sw = &records[2];
        assert_eq!(BoardType::Switch, sw.board_type);
        assert_eq!(0x020, sw.bus_address.raw());
        assert_eq!(Some(BusAddress::new(0x040).unwrap()), sw.links[0]);
        assert_eq!(Some(BusAddress::new(0x046).unwrap()), sw.links[4]);
        assert_eq!(None, sw.links[8]);
        assert_eq!(HandlerId::all_functions(), sw.handlers);

        let handlers = records[4].handlers;
        assert_eq!(HandlerId::Function(1), handlers[1]);
        assert_eq!(HandlerId::Noop, handlers[2]);
        assert_eq!(HandlerId::Noop, handlers[4]);

        assert_eq!(BoardType::MediumPower, records[101].board_type);
        assert!(records[101].handlers.iter().all(|h| *h == HandlerId::Noop));

        for (i, rec) in records.iter().enumerate() {
            assert_eq!(i as u8, rec.label);
            if rec.board_type == BoardType::Undefined {
                assert!(rec.is_inert());
            }
        }
    }

    #[test]
    fn test_duplicate_label_errors() {
        const TOML: &str = r#"
            [[boards]]
            label = 7
            uid = 1
            board_type = "switch"

            [[boards]]
            label = 7
            uid = 2
            board_type = "lowpower"
        "#;
        let err = BoardConfig::load_from_str(TOML).unwrap_err();
        assert!(matches!(err, LoadError::DuplicateLabel { label: 7 }));
        assert_contains!(
            err.to_string().as_str(),
            "Multiple definitions for board with label 7"
        );
    }

    #[test]
    fn test_duplicate_uid_errors() {
        const TOML: &str = r#"
            [[boards]]
            label = 1
            uid = 0x4fc844355348
            board_type = "lowpower"

            [[boards]]
            label = 51
            uid = 0x4fc844355348
            board_type = "lowpower"
        "#;
        let err = BoardConfig::load_from_str(TOML).unwrap_err();
        assert!(matches!(
            err,
            LoadError::DuplicateUid {
                first: 1,
                second: 51,
                ..
            }
        ));
    }

    #[test]
    fn test_undefined_board_must_be_empty() {
        const TOML: &str = r#"
            [[boards]]
            label = 3
            uid = 0x648c8ce65348
            board_type = "undefined"
        "#;
        let err = BoardConfig::load_from_str(TOML).unwrap_err();
        assert!(matches!(err, LoadError::UndefinedConfigured { label: 3 }));
    }

    #[test]
    fn test_invalid_link_and_handler_errors() {
        const LINK: &str = r#"
            [[boards]]
            label = 5
            uid = 9
            board_type = "switch"
            links = [-1, 0x800]
        "#;
        let err = BoardConfig::load_from_str(LINK).unwrap_err();
        assert!(matches!(
            err,
            LoadError::InvalidLink {
                label: 5,
                offset: 1,
                value: 0x800
            }
        ));

        const HANDLER: &str = r#"
            [[boards]]
            label = 5
            uid = 9
            board_type = "switch"
            handlers = [16]
        "#;
        let err = BoardConfig::load_from_str(HANDLER).unwrap_err();
        assert!(matches!(
            err,
            LoadError::InvalidHandler { label: 5, code: 16 }
        ));
    }

    #[test]
    fn test_label_and_uid_bounds() {
        const LABEL: &str = r#"
            [[boards]]
            label = 128
            uid = 9
            board_type = "switch"
        "#;
        assert!(matches!(
            BoardConfig::load_from_str(LABEL),
            Err(LoadError::LabelOutOfRange { label: 128 })
        ));

        const NO_UID: &str = r#"
            [[boards]]
            label = 6
            board_type = "switch"
        "#;
        let config = BoardConfig::load_from_str(NO_UID).unwrap();
        let records = config.records().unwrap();
        assert_eq!(BoardType::Switch, records[6].board_type);
        assert!(!records[6].uid.is_assigned());

        const WIDE_UID: &str = r#"
            [[boards]]
            label = 6
            uid = 0x1000000000000
            board_type = "switch"
        "#;
        assert!(matches!(
            BoardConfig::load_from_str(WIDE_UID),
            Err(LoadError::TomlParsing { .. })
        ));
    }
}
