//! Text form of CAN frames, compatible with `candump -L` and `cansend`
use qif_common::messages::{CanId, CanMessage, MAX_DATA_LENGTH};

/// Parse a frame written as `ID#DATA` or `ID##FLAGSDATA`
///
/// A leading `(timestamp) interface` as written by `candump -L` is skipped. Identifiers of three
/// hex digits or fewer are standard, longer ones are extended.
pub fn parse_frame(line: &str) -> Result<CanMessage, &'static str> {
    let frame = line
        .split_whitespace()
        .last()
        .ok_or("Empty line")?;
    let (id, data) = frame.split_once('#').ok_or("Expected ID#DATA")?;

    let raw = u32::from_str_radix(id, 16).map_err(|_| "Invalid identifier")?;
    let id = if id.len() <= 3 {
        CanId::std(raw as u16)
    } else {
        CanId::extended(raw)
    };

    // CAN-FD frames carry a flags nibble after a second '#'
    let data = match data.strip_prefix('#') {
        Some(fd) => fd.get(1..).ok_or("Missing CAN-FD flags")?,
        None => data,
    };
    let data: String = data.chars().filter(|c| *c != '.').collect();
    if !data.is_ascii() {
        return Err("Invalid data byte");
    }
    if data.len() % 2 != 0 {
        return Err("Data must have an even number of hex digits");
    }
    if data.len() / 2 > MAX_DATA_LENGTH {
        return Err("Data does not fit in a CAN-FD frame");
    }
    let bytes = (0..data.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&data[i..i + 2], 16))
        .collect::<Result<Vec<u8>, _>>()
        .map_err(|_| "Invalid data byte")?;
    CanMessage::try_new(id, &bytes).map_err(|_| "Data does not fit in a CAN-FD frame")
}

/// Format a frame the way [`parse_frame`] reads it
pub fn format_frame(msg: &CanMessage) -> String {
    let id = match msg.id() {
        CanId::Std(id) => format!("{id:03X}"),
        CanId::Extended(id) => format!("{id:08X}"),
    };
    let data: String = msg.data().iter().map(|b| format!("{b:02X}")).collect();
    if msg.data().len() > 8 {
        format!("{id}##0{data}")
    } else {
        format!("{id}#{data}")
    }
}
