//! CAN-FD frames and the service channel messages carried on them
use snafu::Snafu;

use crate::board::Uid;
use crate::constants::{MAX_BUS_ADDRESS, SVR};

/// A CAN identifier
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CanId {
    /// A 29-bit extended identifier
    Extended(u32),
    /// An 11-bit standard identifier
    Std(u16),
}

impl CanId {
    /// Create an extended ID
    pub const fn extended(id: u32) -> CanId {
        CanId::Extended(id)
    }

    /// Create a standard ID
    pub const fn std(id: u16) -> CanId {
        CanId::Std(id)
    }

    /// Get the raw identifier value
    pub fn raw(&self) -> u32 {
        match self {
            CanId::Extended(id) => *id,
            CanId::Std(id) => *id as u32,
        }
    }

    /// Returns true for extended IDs
    pub fn is_extended(&self) -> bool {
        matches!(self, CanId::Extended(_))
    }

    /// The bus address carried by this ID, if it is a standard ID within the 11-bit range
    pub fn bus_address(&self) -> Option<u16> {
        match self {
            CanId::Std(id) if *id <= MAX_BUS_ADDRESS => Some(*id),
            _ => None,
        }
    }
}

/// Largest CAN-FD payload
pub const MAX_DATA_LENGTH: usize = 64;

/// A bounded frame payload, as produced by frame handlers
pub type Payload = heapless::Vec<u8, MAX_DATA_LENGTH>;

/// A CAN-FD frame
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CanMessage {
    /// Payload buffer, only the first `dlc` bytes are valid
    pub data: [u8; MAX_DATA_LENGTH],
    /// Payload length in bytes
    pub dlc: u8,
    /// Frame identifier
    pub id: CanId,
}

impl Default for CanMessage {
    fn default() -> Self {
        Self {
            data: [0; MAX_DATA_LENGTH],
            dlc: 0,
            id: CanId::Std(0),
        }
    }
}

impl CanMessage {
    /// Create a new message
    ///
    /// # Panics
    ///
    /// Panics if `data` is longer than [`MAX_DATA_LENGTH`]. Use [`CanMessage::try_new`] for
    /// untrusted lengths.
    pub fn new(id: CanId, data: &[u8]) -> Self {
        match Self::try_new(id, data) {
            Ok(msg) => msg,
            Err(_) => panic!(
                "Data length exceeds maximum size of {} bytes",
                MAX_DATA_LENGTH
            ),
        }
    }

    /// Create a new message, failing if `data` does not fit in a CAN-FD frame
    pub fn try_new(id: CanId, data: &[u8]) -> Result<Self, MessageError> {
        if data.len() > MAX_DATA_LENGTH {
            return DataTooLongSnafu { len: data.len() }.fail();
        }
        let mut buf = [0u8; MAX_DATA_LENGTH];
        buf[..data.len()].copy_from_slice(data);
        Ok(Self {
            id,
            dlc: data.len() as u8,
            data: buf,
        })
    }

    /// Get the message ID
    pub fn id(&self) -> CanId {
        self.id
    }

    /// Get the valid part of the payload
    pub fn data(&self) -> &[u8] {
        &self.data[..self.dlc as usize]
    }
}

/// Meaning of each offset on the service channel
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Service {
    /// Time broadcast
    Time = 0x0,
    /// Reboot request
    Reset = 0x1,
    /// Filter table update
    Update = 0x2,
    /// BME sensor alarm
    AlarmBme = 0x3,
    /// Board heartbeat
    Heartbeat = 0x4,
    /// Acknowledge
    Ack = 0x5,
    /// Negative acknowledge
    Nack = 0x6,
    /// GPS module
    Gps = 0x7,
    /// Gyroscope module
    Gyro = 0x8,
    /// Analog return channel
    Analog = 0x9,
    /// Liquid level detector
    Level = 0xA,
    /// PIR detector
    Pir = 0xB,
    /// Ladar detector
    Ladar = 0xC,
    /// Optical encoder
    Coder = 0xD,
    /// Wind speed module
    Wind = 0xE,
    /// BME sensor broadcast
    Bme = 0xF,
}

impl TryFrom<u8> for Service {
    type Error = MessageError;

    /// Get the service addressed by an offset on the service channel
    fn try_from(offset: u8) -> Result<Self, Self::Error> {
        use Service::*;
        Ok(match offset {
            0x0 => Time,
            0x1 => Reset,
            0x2 => Update,
            0x3 => AlarmBme,
            0x4 => Heartbeat,
            0x5 => Ack,
            0x6 => Nack,
            0x7 => Gps,
            0x8 => Gyro,
            0x9 => Analog,
            0xA => Level,
            0xB => Pir,
            0xC => Ladar,
            0xD => Coder,
            0xE => Wind,
            0xF => Bme,
            _ => return InvalidFieldSnafu.fail(),
        })
    }
}

impl Service {
    /// The bus address of this service
    pub const fn address(self) -> u16 {
        SVR + self as u16
    }

    /// The CAN ID of this service
    pub const fn can_id(self) -> CanId {
        CanId::Std(self.address())
    }
}

/// How a filter entry is interpreted
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum FilterType {
    /// Admit frames addressed exactly to the entry address
    #[default]
    Pass = 0,
    /// Deny frames addressed exactly to the entry address
    Block = 1,
    /// Lower bound of an admitted range
    RangeStart = 3,
    /// Upper bound of an admitted range
    RangeEnd = 4,
}

impl TryFrom<u8> for FilterType {
    type Error = MessageError;

    fn try_from(b: u8) -> Result<Self, Self::Error> {
        match b {
            0 => Ok(Self::Pass),
            1 => Ok(Self::Block),
            3 => Ok(Self::RangeStart),
            4 => Ok(Self::RangeEnd),
            _ => Err(MessageError::InvalidFilterType { value: b }),
        }
    }
}

/// Request to overwrite one slot of the filter table
///
/// Wire layout: `[slot, address_lo, address_hi, filter_type, function_address]`
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FilterUpdate {
    /// Slot index in the filter table
    pub slot: u8,
    /// Address matched by the entry
    pub address: u16,
    /// How the entry is interpreted
    pub filter_type: FilterType,
    /// Function address reported on admission
    pub function_address: u8,
}

impl FilterUpdate {
    /// Encoded size
    pub const LENGTH: usize = 5;
}

impl TryFrom<&[u8]> for FilterUpdate {
    type Error = MessageError;

    fn try_from(payload: &[u8]) -> Result<Self, Self::Error> {
        if payload.len() < Self::LENGTH {
            return MessageTooShortSnafu.fail();
        }
        Ok(FilterUpdate {
            slot: payload[0],
            address: u16::from_le_bytes([payload[1], payload[2]]),
            filter_type: FilterType::try_from(payload[3])?,
            function_address: payload[4],
        })
    }
}

impl From<FilterUpdate> for CanMessage {
    fn from(update: FilterUpdate) -> Self {
        let address = update.address.to_le_bytes();
        CanMessage::new(
            Service::Update.can_id(),
            &[
                update.slot,
                address[0],
                address[1],
                update.filter_type as u8,
                update.function_address,
            ],
        )
    }
}

/// Periodic liveness message, carrying the sender's truncated UID
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Heartbeat {
    /// UID of the sending board
    pub uid: Uid,
}

impl TryFrom<CanMessage> for Heartbeat {
    type Error = MessageError;

    fn try_from(msg: CanMessage) -> Result<Self, Self::Error> {
        if msg.id() != Service::Heartbeat.can_id() {
            return UnexpectedIdSnafu {
                id: msg.id(),
                expected: Service::Heartbeat.can_id(),
            }
            .fail();
        }
        let payload = msg.data();
        if payload.len() < Uid::LENGTH {
            return MessageTooShortSnafu.fail();
        }
        let mut bytes = [0u8; 8];
        bytes[..Uid::LENGTH].copy_from_slice(&payload[..Uid::LENGTH]);
        Ok(Heartbeat {
            uid: Uid::new(u64::from_le_bytes(bytes)),
        })
    }
}

impl From<Heartbeat> for CanMessage {
    fn from(value: Heartbeat) -> Self {
        let bytes = value.uid.raw().to_le_bytes();
        CanMessage::new(Service::Heartbeat.can_id(), &bytes[..Uid::LENGTH])
    }
}

/// Quantity carried by a sensor broadcast, stored in the first payload byte
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum SensorKind {
    Temperature = 30,
    Pressure = 31,
    Humidity = 32,
    Gas = 33,
    Iaq = 34,
    Voc = 35,
    Co2 = 36,
}

impl TryFrom<u8> for SensorKind {
    type Error = MessageError;

    /// Parse the info byte
    fn try_from(b: u8) -> Result<Self, Self::Error> {
        use SensorKind::*;
        match b {
            30 => Ok(Temperature),
            31 => Ok(Pressure),
            32 => Ok(Humidity),
            33 => Ok(Gas),
            34 => Ok(Iaq),
            35 => Ok(Voc),
            36 => Ok(Co2),
            _ => Err(MessageError::InvalidSensorInfo { value: b }),
        }
    }
}

/// One environmental reading broadcast on the `Bme` or `AlarmBme` service
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SensorReport {
    /// Which quantity was measured
    pub kind: SensorKind,
    /// The measured value
    pub value: f32,
}

impl TryFrom<&[u8]> for SensorReport {
    type Error = MessageError;

    fn try_from(payload: &[u8]) -> Result<Self, Self::Error> {
        if payload.len() < 5 {
            return MessageTooShortSnafu.fail();
        }
        let kind = SensorKind::try_from(payload[0])?;
        let value = f32::from_le_bytes([payload[1], payload[2], payload[3], payload[4]]);
        Ok(SensorReport { kind, value })
    }
}

impl SensorReport {
    /// Encode as a frame on the given service
    pub fn to_can_message(&self, service: Service) -> CanMessage {
        let v = self.value.to_le_bytes();
        CanMessage::new(
            service.can_id(),
            &[self.kind as u8, v[0], v[1], v[2], v[3]],
        )
    }
}

/// Gesture recognized on a switch input, sent as the first payload byte of a switch frame
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum ClickValue {
    /// No gesture
    #[default]
    None = 0,
    /// One short click
    Short = 1,
    /// Two short clicks
    DoubleShort = 2,
    /// One long press
    Long = 3,
    /// A short click followed by a long press
    ShortLong = 4,
    /// A very long hold
    VeryLong = 5,
}

impl TryFrom<u8> for ClickValue {
    type Error = MessageError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Short),
            2 => Ok(Self::DoubleShort),
            3 => Ok(Self::Long),
            4 => Ok(Self::ShortLong),
            5 => Ok(Self::VeryLong),
            _ => InvalidFieldSnafu.fail(),
        }
    }
}

/// Errors raised while decoding messages
#[derive(Debug, Clone, Copy, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum MessageError {
    /// The payload is shorter than the message requires
    MessageTooShort,
    /// The payload does not fit in a CAN-FD frame
    #[snafu(display("Payload of {len} bytes exceeds CAN-FD frame size"))]
    DataTooLong {
        /// Offending length
        len: usize,
    },
    /// The message ID was not the expected value
    #[snafu(display("Unexpected message ID found: {id:?}, expected: {expected:?}"))]
    UnexpectedId {
        /// Received ID
        id: CanId,
        /// Expected ID
        expected: CanId,
    },
    /// A field held a value outside its domain
    InvalidField,
    /// Filter type byte is not one of 0, 1, 3 or 4
    #[snafu(display("Invalid filter type: {value}"))]
    InvalidFilterType {
        /// Received byte
        value: u8,
    },
    /// Sensor info byte is not a known quantity
    #[snafu(display("Invalid sensor info byte: {value}"))]
    InvalidSensorInfo {
        /// Received byte
        value: u8,
    },
}
