use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_num::maybe_hex;
use std::{path::PathBuf, str::FromStr};

use qif_common::messages::FilterType;

#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Cli {
    /// Path to the board database TOML file
    #[arg(short, long, default_value = "config/boards.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Check the board database and list the installed boards
    Boards,
    /// Route frames through the controller and print what happens to each of them
    Route(RouteArgs),
    /// Show one PWM period for a set of duty cycles
    Pwm(PwmArgs),
    /// Encode a filter update frame
    Filter {
        /// Entry as `slot,address,type,function`
        entry: FilterArg,
    },
}

/// What the function handlers do with the frames they are given
#[derive(Clone, Copy, Debug, Default, PartialEq, ValueEnum)]
pub enum HandlerMode {
    /// Forward every payload to the slot's link
    #[default]
    Relay,
    /// Run no handler at all
    None,
}

#[derive(Debug, Args)]
pub struct RouteArgs {
    /// Filter entries to install before routing, as `slot,address,type,function`
    #[arg(short, long = "filter")]
    pub filters: Vec<FilterArg>,
    /// Handler run for every function code
    #[arg(long, value_enum, default_value_t)]
    pub handlers: HandlerMode,
    /// Print the active filter entries after routing
    #[arg(long)]
    pub show_filters: bool,
    /// Frames in candump format, e.g. `020#01`. Read from stdin if none are given.
    pub frames: Vec<String>,
}

#[derive(Debug, Args)]
pub struct PwmArgs {
    /// Duty cycles as `channel=value`, values are clamped to 63
    #[arg(required = true)]
    pub duties: Vec<DutyArg>,
}

/// A filter entry given on the command line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterArg {
    pub slot: usize,
    pub address: u16,
    pub filter_type: FilterType,
    pub function_address: u8,
}

fn parse_filter_type(s: &str) -> Result<FilterType, &'static str> {
    match s.to_ascii_lowercase().as_str() {
        "pass" | "0" => Ok(FilterType::Pass),
        "block" | "1" => Ok(FilterType::Block),
        "start" | "range-start" | "3" => Ok(FilterType::RangeStart),
        "end" | "range-end" | "4" => Ok(FilterType::RangeEnd),
        _ => Err("Filter type must be one of pass, block, start, end"),
    }
}

impl FromStr for FilterArg {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        let [slot, address, filter_type, function_address] = parts.as_slice() else {
            return Err("Expected slot,address,type,function");
        };
        Ok(FilterArg {
            slot: maybe_hex::<usize>(slot).map_err(|_| "Invalid slot")?,
            address: maybe_hex::<u16>(address).map_err(|_| "Invalid address")?,
            filter_type: parse_filter_type(filter_type)?,
            function_address: maybe_hex::<u8>(function_address)
                .map_err(|_| "Invalid function address")?,
        })
    }
}

/// A duty cycle for one PWM channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DutyArg {
    pub channel: usize,
    pub value: u8,
}

impl FromStr for DutyArg {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (channel, value) = s.split_once('=').ok_or("Expected channel=value")?;
        Ok(DutyArg {
            channel: channel.trim().parse().map_err(|_| "Invalid channel")?,
            value: maybe_hex::<u8>(value.trim()).map_err(|_| "Invalid duty value")?,
        })
    }
}
