use std::io::BufRead;
use std::process::ExitCode;

use clap::Parser;
use qif_cli::command::{Cli, Commands, FilterArg, HandlerMode, PwmArgs, RouteArgs};
use qif_cli::frame::{format_frame, parse_frame};
use qif_common::{
    board::BoardType,
    board_config::BoardConfig,
    constants::{PWM_CHANNELS, PWM_PERIOD_TICKS, SLOTS_PER_BOARD},
    messages::{CanMessage, FilterUpdate, SensorReport, Service},
    pins::PinProfile,
    traits::PinDriver,
};
use qif_node::{
    HandlerTable, PwmDuty, PwmScheduler, Registry, RelayHandler, Router, RoutingOutcome,
    ServiceHandler,
};

fn timestamp() -> String {
    chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, false)
}

/// Prints everything arriving on the service channel
struct ServicePrinter;

impl ServiceHandler for ServicePrinter {
    fn handle_service(&mut self, service: Service, frame: &CanMessage) {
        log::debug!("Service {service:?}: {:02X?}", frame.data());
    }

    fn handle_sensor(&mut self, service: Service, report: SensorReport) {
        println!("    {service:?} {:?} = {}", report.kind, report.value);
    }
}

fn load_registry(cli: &Cli) -> Result<Registry, String> {
    let config = BoardConfig::load(&cli.config)
        .map_err(|e| format!("Failed to load {}: {e}", cli.config.display()))?;
    let records = config.records().map_err(|e| e.to_string())?;
    Registry::new(records).map_err(|e| format!("Invalid board database: {e}"))
}

fn list_boards(registry: &Registry) {
    for record in registry.installed() {
        let uid = if record.uid.is_assigned() {
            format!("{:012x}", record.uid.raw())
        } else {
            "-".to_string()
        };
        let links: Vec<String> = record
            .links
            .iter()
            .map(|l| match l {
                Some(addr) => format!("{:03X}", addr.raw()),
                None => "---".to_string(),
            })
            .collect();
        println!(
            "{:3} {:03X} {:6} {:>12}  {}",
            record.label,
            record.bus_address.raw(),
            record.board_type.name(),
            uid,
            links.join(" ")
        );
    }
}

fn print_filters(router: &Router) {
    let mut any = false;
    for (slot, entry) in router.filters().active() {
        any = true;
        println!(
            "    slot {slot:3}: {:03X} {:?} fct 0x{:02x}",
            entry.filter_address, entry.filter_type, entry.function_address
        );
    }
    if !any {
        println!("    filter table is empty, all addresses admitted");
    }
}

fn install_filter(router: &mut Router, arg: &FilterArg) -> Result<(), String> {
    router
        .update_filter(
            arg.slot,
            arg.address,
            arg.filter_type,
            arg.function_address,
        )
        .map_err(|e| e.to_string())
}

fn route_line(router: &mut Router, line: &str) {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return;
    }
    if line == "flt" {
        print_filters(router);
        return;
    }
    if let Some(entry) = line.strip_prefix("upd ") {
        match entry.parse::<FilterArg>().map_err(str::to_string) {
            Ok(arg) => match install_filter(router, &arg) {
                Ok(()) => println!("    slot {} updated", arg.slot),
                Err(e) => println!("    {e}"),
            },
            Err(e) => println!("    {e}"),
        }
        return;
    }

    let frame = match parse_frame(line) {
        Ok(frame) => frame,
        Err(e) => {
            eprintln!("Skipping '{line}': {e}");
            return;
        }
    };
    let mut forwarded = Vec::new();
    let outcome = router.route(&frame, &mut |msg| forwarded.push(msg));
    println!("{}: {} -> {}", timestamp(), format_frame(&frame), describe(&outcome));
    for msg in forwarded {
        println!("    sent {}", format_frame(&msg));
    }
}

fn describe(outcome: &RoutingOutcome) -> String {
    match outcome {
        RoutingOutcome::Delivered {
            handler,
            forwarded_to: Some(target),
        } => format!("{handler:?}, forwarded to {:03X}", target.raw()),
        RoutingOutcome::Delivered {
            handler,
            forwarded_to: None,
        } => format!("{handler:?}"),
        RoutingOutcome::Service(service) => format!("service {service:?}"),
        RoutingOutcome::Dropped(reason) => format!("dropped ({reason:?})"),
    }
}

fn route(registry: &Registry, args: &RouteArgs) -> Result<(), String> {
    let mut relays = [RelayHandler; SLOTS_PER_BOARD];
    let mut handlers = HandlerTable::new();
    if args.handlers == HandlerMode::Relay {
        for (code, relay) in relays.iter_mut().enumerate() {
            handlers = handlers.with(code as u8, relay);
        }
    }
    let mut services = ServicePrinter;
    let mut router = Router::new(registry, handlers).with_service_handler(&mut services);

    for filter in &args.filters {
        install_filter(&mut router, filter)?;
    }

    if args.frames.is_empty() {
        for line in std::io::stdin().lock().lines() {
            let line = line.map_err(|e| format!("Failed reading stdin: {e}"))?;
            route_line(&mut router, &line);
        }
    } else {
        for line in &args.frames {
            route_line(&mut router, line);
        }
    }

    if args.show_filters {
        print_filters(&router);
    }
    Ok(())
}

/// Records the waveform of every pin over one period
struct Waveform {
    levels: Vec<[bool; 32]>,
    current: [bool; 32],
}

impl PinDriver for Waveform {
    fn set_pin(&mut self, pin: u8, high: bool) {
        if let Some(level) = self.current.get_mut(pin as usize) {
            *level = high;
        }
    }
}

fn pwm(args: &PwmArgs) -> Result<(), String> {
    let duty = PwmDuty::new();
    for arg in &args.duties {
        let applied = duty
            .set_duty(arg.channel, arg.value)
            .map_err(|e| e.to_string())?;
        if applied != arg.value {
            println!("Channel {} clamped to {applied}", arg.channel);
        }
    }

    let profile = PinProfile::for_board(BoardType::LowPower);
    let mut scheduler = PwmScheduler::for_profile(profile).map_err(|e| e.to_string())?;
    let mut waveform = Waveform {
        levels: Vec::new(),
        current: [false; 32],
    };
    for _ in 0..PWM_PERIOD_TICKS {
        scheduler.tick(&duty, &mut waveform);
        waveform.levels.push(waveform.current);
    }

    for channel in 0..PWM_CHANNELS {
        let Some(state) = scheduler.channel(channel) else {
            continue;
        };
        let trace: String = waveform
            .levels
            .iter()
            .map(|l| if l[state.pin as usize] { '#' } else { '_' })
            .collect();
        println!("ch{channel} pin{:2} {:2} {trace}", state.pin, state.duty);
    }
    Ok(())
}

fn run(cli: &Cli) -> Result<(), String> {
    match &cli.command {
        Commands::Boards => {
            let registry = load_registry(cli)?;
            list_boards(&registry);
            Ok(())
        }
        Commands::Route(args) => {
            let registry = load_registry(cli)?;
            route(&registry, args)
        }
        Commands::Pwm(args) => pwm(args),
        Commands::Filter { entry } => {
            let slot = u8::try_from(entry.slot).map_err(|_| "Slot does not fit in a frame")?;
            let msg: CanMessage = FilterUpdate {
                slot,
                address: entry.address,
                filter_type: entry.filter_type,
                function_address: entry.function_address,
            }
            .into();
            println!("{}", format_frame(&msg));
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
