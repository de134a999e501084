//! Switch gesture recognition
//!
//! A switch board scans its eight push buttons every [`CLICK_TICK_MS`]. Each button runs a small
//! state machine which turns the sequence of pressed/released levels into a [`ClickValue`]:
//!
//! * a press shorter than [`SHORT_TICKS`] is a short click, reported once no second press has
//!   started within [`SHORT_DELAY_LIMIT`] ticks of the release
//! * two short clicks in a row are a double click
//! * a press of [`SHORT_TICKS`] or more, released before [`VERY_LONG_TICKS`], is a long press,
//!   or a short-long if it followed a short click
//! * a press held for [`VERY_LONG_TICKS`] is reported immediately, and its release is ignored
//!
//! The value is sent as the first payload byte of a frame on the switch's own address, and from
//! there relayed to the linked outputs by the router.
//!
//! [`CLICK_TICK_MS`]: qif_common::constants::CLICK_TICK_MS
use defmt_or_log::debug;
use qif_common::{
    board::BusAddress,
    constants::{
        offsets, SHORT_DELAY_LIMIT, SHORT_TICKS, SWITCH_COUNT, VERY_LONG_TICKS, WAIT_RESET_TICKS,
    },
    messages::{CanId, CanMessage, ClickValue},
};

/// Gesture state of one push button
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SwitchState {
    pressed: bool,
    held_ticks: u8,
    idle_ticks: u8,
    clicks: u8,
    very_long_reported: bool,
    short_pending: bool,
    short_delay: u8,
}

impl SwitchState {
    /// A released switch with no gesture in progress
    pub const fn new() -> Self {
        Self {
            pressed: false,
            held_ticks: 0,
            idle_ticks: 0,
            clicks: 0,
            very_long_reported: false,
            short_pending: false,
            short_delay: 0,
        }
    }

    /// Feed the level read on one scan, returning a gesture if one just completed
    pub fn scan(&mut self, pressed: bool) -> Option<ClickValue> {
        let click = match (self.pressed, pressed) {
            (_, true) => self.held(),
            (true, false) => self.released(),
            (false, false) => self.idle(),
        };
        self.pressed = pressed;
        if click.is_some() {
            self.clicks = self.clicks.saturating_add(1);
        }
        click
    }

    fn held(&mut self) -> Option<ClickValue> {
        self.idle_ticks = 0;
        self.held_ticks = self.held_ticks.saturating_add(1);
        if self.held_ticks == VERY_LONG_TICKS && !self.very_long_reported {
            self.very_long_reported = true;
            self.short_pending = false;
            return Some(ClickValue::VeryLong);
        }
        None
    }

    fn released(&mut self) -> Option<ClickValue> {
        let held = self.held_ticks;
        self.held_ticks = 0;
        if self.very_long_reported {
            self.very_long_reported = false;
            return None;
        }
        if held < SHORT_TICKS {
            if self.short_pending {
                self.short_pending = false;
                return Some(ClickValue::DoubleShort);
            }
            self.short_pending = true;
            self.short_delay = 0;
            return None;
        }
        if self.short_pending {
            self.short_pending = false;
            Some(ClickValue::ShortLong)
        } else {
            Some(ClickValue::Long)
        }
    }

    fn idle(&mut self) -> Option<ClickValue> {
        self.idle_ticks = self.idle_ticks.saturating_add(1);
        if self.idle_ticks >= WAIT_RESET_TICKS {
            self.clicks = 0;
        }
        if !self.short_pending {
            return None;
        }
        self.short_delay = self.short_delay.saturating_add(1);
        if self.short_delay >= SHORT_DELAY_LIMIT {
            self.short_pending = false;
            return Some(ClickValue::Short);
        }
        None
    }

    /// Number of gestures since the switch last stayed idle for [`WAIT_RESET_TICKS`]
    pub fn click_count(&self) -> u8 {
        self.clicks
    }

    /// True while the button is held
    pub fn is_pressed(&self) -> bool {
        self.pressed
    }
}

/// Gesture recognition for all the buttons of a switch board
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ClickDetector {
    switches: [SwitchState; SWITCH_COUNT],
}

impl ClickDetector {
    /// Create a detector with every button released
    pub const fn new() -> Self {
        Self {
            switches: [SwitchState::new(); SWITCH_COUNT],
        }
    }

    /// Feed one scan of the buttons, bit `n` of `levels` being button `n`
    ///
    /// `on_click` is called with the button index for every completed gesture.
    pub fn scan(&mut self, levels: u8, mut on_click: impl FnMut(usize, ClickValue)) {
        for (i, switch) in self.switches.iter_mut().enumerate() {
            if let Some(click) = switch.scan(levels & (1 << i) != 0) {
                debug!("Switch {} click {}", i, click as u8);
                on_click(i, click);
            }
        }
    }

    /// Feed one scan and send every completed gesture on the switch's address of board `base`
    pub fn scan_to_bus(
        &mut self,
        levels: u8,
        base: BusAddress,
        send_cb: &mut dyn FnMut(CanMessage),
    ) {
        self.scan(levels, |i, click| {
            let id = base.base().raw() + offsets::SW[i];
            send_cb(CanMessage::new(CanId::Std(id), &[click as u8]));
        });
    }

    /// Get the state of one button
    pub fn switch(&self, index: usize) -> Option<&SwitchState> {
        self.switches.get(index)
    }
}
