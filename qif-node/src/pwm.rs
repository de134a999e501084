//! Software PWM for the eight output channels
//!
//! The duty cycle of each channel is written by the main loop into a [`PwmDuty`] and read by the
//! timer interrupt, which calls [`PwmScheduler::tick`] once every
//! [`TIMER_INTERVAL_US`](qif_common::constants::TIMER_INTERVAL_US). A period is
//! [`PWM_PERIOD_TICKS`] ticks long. New duty values are only picked up at the start of a period,
//! so a change never produces a partial cycle.
use defmt_or_log::debug;
use qif_common::{
    constants::{PWM_CHANNELS, PWM_PERIOD_TICKS, PWM_RESOLUTION},
    pins::PinProfile,
    traits::PinDriver,
    AtomicCell,
};
use snafu::Snafu;

/// Errors raised when configuring PWM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Snafu)]
pub enum PwmError {
    /// Channel index is not below [`PWM_CHANNELS`]
    #[snafu(display("PWM channel {channel} does not exist"))]
    InvalidChannel {
        /// Requested channel
        channel: usize,
    },
    /// The pin profile does not have enough outputs for every channel
    #[snafu(display("Profile has {available} output pins, {PWM_CHANNELS} are needed"))]
    NotEnoughPins {
        /// Number of output pins in the profile
        available: usize,
    },
}

/// Requested duty cycles, shared between the main loop and the timer interrupt
#[derive(Debug)]
pub struct PwmDuty {
    requested: AtomicCell<[u8; PWM_CHANNELS]>,
}

impl Default for PwmDuty {
    fn default() -> Self {
        Self::new()
    }
}

impl PwmDuty {
    /// Create with every channel off
    pub const fn new() -> Self {
        Self {
            requested: AtomicCell::new([0; PWM_CHANNELS]),
        }
    }

    /// Request a duty cycle for one channel
    ///
    /// Values above [`PWM_RESOLUTION`] are clamped. Returns the value actually stored.
    pub fn set_duty(&self, channel: usize, value: u8) -> Result<u8, PwmError> {
        if channel >= PWM_CHANNELS {
            return InvalidChannelSnafu { channel }.fail();
        }
        let value = value.min(PWM_RESOLUTION);
        // Only fails if the closure returns None
        let _ = self.requested.fetch_update(|mut duties| {
            duties[channel] = value;
            Some(duties)
        });
        Ok(value)
    }

    /// The requested duty cycle of one channel
    pub fn duty(&self, channel: usize) -> Option<u8> {
        self.requested.load().get(channel).copied()
    }

    /// All requested duty cycles
    pub fn snapshot(&self) -> [u8; PWM_CHANNELS] {
        self.requested.load()
    }
}

/// State of one channel inside the scheduler
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PwmChannelState {
    /// Output pin driven by this channel
    pub pin: u8,
    /// Duty cycle latched at the start of the current period
    pub duty: u8,
    /// Level driven on the last tick
    pub high: bool,
}

/// The interrupt side of the PWM engine
#[derive(Debug, Clone)]
pub struct PwmScheduler {
    phase: u8,
    channels: [PwmChannelState; PWM_CHANNELS],
}

impl PwmScheduler {
    /// Create a scheduler driving the given pins
    pub const fn new(pins: [u8; PWM_CHANNELS]) -> Self {
        let mut channels = [PwmChannelState {
            pin: 0,
            duty: 0,
            high: false,
        }; PWM_CHANNELS];
        let mut i = 0;
        while i < PWM_CHANNELS {
            channels[i].pin = pins[i];
            i += 1;
        }
        Self { phase: 0, channels }
    }

    /// Create a scheduler driving the first eight outputs of a pin profile
    pub fn for_profile(profile: &PinProfile) -> Result<Self, PwmError> {
        let mut pins = [0u8; PWM_CHANNELS];
        let mut available = 0;
        for (slot, pin) in pins.iter_mut().zip(profile.output_pins()) {
            *slot = pin;
            available += 1;
        }
        if available < PWM_CHANNELS {
            return NotEnoughPinsSnafu { available }.fail();
        }
        Ok(Self::new(pins))
    }

    /// Advance by one tick
    ///
    /// Latches the requested duty cycles when a period starts, then drives every channel high
    /// while the phase is below its duty cycle.
    pub fn tick(&mut self, duty: &PwmDuty, driver: &mut impl PinDriver) {
        if self.phase == 0 {
            let requested = duty.snapshot();
            for (channel, value) in self.channels.iter_mut().zip(requested) {
                channel.duty = value;
            }
        }
        for channel in self.channels.iter_mut() {
            channel.high = self.phase < channel.duty;
            driver.set_pin(channel.pin, channel.high);
        }
        self.phase = (self.phase + 1) % PWM_PERIOD_TICKS;
    }

    /// Drive every channel low and restart the period
    pub fn reset(&mut self, driver: &mut impl PinDriver) {
        debug!("PWM reset");
        self.phase = 0;
        for channel in self.channels.iter_mut() {
            channel.duty = 0;
            channel.high = false;
            driver.set_pin(channel.pin, false);
        }
    }

    /// Position within the current period
    pub fn phase(&self) -> u8 {
        self.phase
    }

    /// Get the state of one channel
    pub fn channel(&self, channel: usize) -> Option<&PwmChannelState> {
        self.channels.get(channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qif_common::{board::BoardType, pins::PinProfile};

    #[derive(Default)]
    struct RecordingPins {
        levels: [bool; 32],
        writes: usize,
    }

    impl PinDriver for RecordingPins {
        fn set_pin(&mut self, pin: u8, high: bool) {
            self.levels[pin as usize] = high;
            self.writes += 1;
        }
    }

    fn high_ticks(
        scheduler: &mut PwmScheduler,
        duty: &PwmDuty,
        pins: &mut RecordingPins,
        pin: u8,
        ticks: usize,
    ) -> usize {
        (0..ticks)
            .filter(|_| {
                scheduler.tick(duty, pins);
                pins.levels[pin as usize]
            })
            .count()
    }

    #[test]
    fn test_duty_sets_high_ticks_per_period() {
        let duty = PwmDuty::new();
        let mut scheduler = PwmScheduler::new([0, 1, 2, 3, 4, 5, 6, 7]);
        let mut pins = RecordingPins::default();
        duty.set_duty(2, 20).unwrap();
        duty.set_duty(3, 63).unwrap();

        for _period in 0..3 {
            let mut counts = [0usize; PWM_CHANNELS];
            for _ in 0..PWM_PERIOD_TICKS {
                scheduler.tick(&duty, &mut pins);
                for (ch, count) in counts.iter_mut().enumerate() {
                    if pins.levels[ch] {
                        *count += 1;
                    }
                }
            }
            assert_eq!([0, 0, 20, 63, 0, 0, 0, 0], counts);
        }
        assert_eq!(0, scheduler.phase());
    }

    #[test]
    fn test_duty_is_clamped() {
        let duty = PwmDuty::new();
        assert_eq!(Ok(63), duty.set_duty(0, 200));
        assert_eq!(Some(63), duty.duty(0));
        assert_eq!(
            Err(PwmError::InvalidChannel { channel: 8 }),
            duty.set_duty(8, 1)
        );
    }

    #[test]
    fn test_duty_latched_at_period_start() {
        let duty = PwmDuty::new();
        let mut scheduler = PwmScheduler::new([0, 1, 2, 3, 4, 5, 6, 7]);
        let mut pins = RecordingPins::default();
        duty.set_duty(0, 10).unwrap();

        // Change the request in the middle of a period
        let first = high_ticks(&mut scheduler, &duty, &mut pins, 0, 5);
        duty.set_duty(0, 40).unwrap();
        let rest = high_ticks(&mut scheduler, &duty, &mut pins, 0, 59);
        assert_eq!(10, first + rest);
        assert_eq!(10, scheduler.channel(0).unwrap().duty);

        let next = high_ticks(&mut scheduler, &duty, &mut pins, 0, 64);
        assert_eq!(40, next);
    }

    #[test]
    fn test_duty_is_left_aligned() {
        let duty = PwmDuty::new();
        let mut scheduler = PwmScheduler::new([0, 1, 2, 3, 4, 5, 6, 7]);
        let mut pins = RecordingPins::default();
        duty.set_duty(6, 40).unwrap();

        for _period in 0..2 {
            let levels: Vec<bool> = (0..PWM_PERIOD_TICKS)
                .map(|_| {
                    scheduler.tick(&duty, &mut pins);
                    pins.levels[6]
                })
                .collect();
            assert!(levels[..40].iter().all(|high| *high));
            assert!(levels[40..].iter().all(|high| !*high));
        }
    }

    #[test]
    fn test_zero_duty_stays_low() {
        let duty = PwmDuty::new();
        let mut scheduler = PwmScheduler::new([0, 1, 2, 3, 4, 5, 6, 7]);
        let mut pins = RecordingPins::default();
        assert_eq!(0, high_ticks(&mut scheduler, &duty, &mut pins, 5, 128));
        assert_eq!(128 * PWM_CHANNELS, pins.writes);
    }

    #[test]
    fn test_profile_pins() {
        let scheduler =
            PwmScheduler::for_profile(PinProfile::for_board(BoardType::LowPower)).unwrap();
        let pins: Vec<u8> = (0..PWM_CHANNELS)
            .map(|ch| scheduler.channel(ch).unwrap().pin)
            .collect();
        assert_eq!(vec![0, 1, 5, 6, 9, 10, 11, 12], pins);

        assert_eq!(
            Err(PwmError::NotEnoughPins { available: 0 }),
            PwmScheduler::for_profile(PinProfile::for_board(BoardType::HighPower)).map(|_| ())
        );
    }
}
