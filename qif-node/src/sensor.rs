//! Environmental sensor broadcasts
//!
//! A board fitted with a BME688 publishes each BSEC reading as one frame per quantity on the
//! `Bme` service address.
use qif_common::{
    messages::{CanMessage, SensorKind, SensorReport, Service},
    traits::BsecReading,
};

/// Number of frames produced for one reading
pub const REPORTS_PER_READING: usize = 7;

/// Split a reading into one report per quantity, in info byte order
pub fn sensor_reports(reading: &BsecReading) -> [SensorReport; REPORTS_PER_READING] {
    [
        (SensorKind::Temperature, reading.temperature),
        (SensorKind::Pressure, reading.pressure),
        (SensorKind::Humidity, reading.humidity),
        (SensorKind::Gas, reading.gas),
        (SensorKind::Iaq, reading.iaq),
        (SensorKind::Voc, reading.voc),
        (SensorKind::Co2, reading.co2),
    ]
    .map(|(kind, value)| SensorReport { kind, value })
}

/// Encode a reading as frames on the given service
pub fn sensor_frames(
    reading: &BsecReading,
    service: Service,
) -> [CanMessage; REPORTS_PER_READING] {
    sensor_reports(reading).map(|r| r.to_can_message(service))
}

#[cfg(test)]
mod tests {
    use super::*;
    use qif_common::messages::CanId;

    #[test]
    fn test_reading_becomes_seven_frames() {
        let reading = BsecReading {
            iaq: 50.0,
            co2: 600.0,
            voc: 0.5,
            pressure: 96_000.0,
            temperature: 22.5,
            humidity: 40.0,
            gas: 120_000.0,
        };
        let frames = sensor_frames(&reading, Service::Bme);
        let infos: Vec<u8> = frames.iter().map(|f| f.data()[0]).collect();
        assert_eq!(vec![30, 31, 32, 33, 34, 35, 36], infos);
        assert!(frames.iter().all(|f| f.id() == CanId::Std(0x00F)));

        let temperature = SensorReport::try_from(frames[0].data()).unwrap();
        assert_eq!(22.5, temperature.value);
        let co2 = SensorReport::try_from(frames[6].data()).unwrap();
        assert_eq!(600.0, co2.value);
    }
}
