use clap::{App, Arg};
use colored::*;
use dbwbus::codec::{
    MQB_GRA_ID, MQB_HCA_ID, PEDAL_GAS_ID, PQ_AWV_ID, PQ_GRA_ID, PQ_HCA_ID, PQ_MOB_ID, RADAR_VIN_ID,
};
use dbwbus::{
    Actuators, ButtonKind, CommandSequencer, ControlWarnings, Frame, SequencerConfig, VehicleState,
    VehicleStateSink, VehicleStateSource, VehicleVariant,
};
use serde::Serialize;
use std::time::Duration;
use tokio::time;
use tracing::{info, warn, Level};

const DEFAULT_TICKS: &str = "1000";
// The car sends its cruise switch message at ~33 Hz
const BUTTON_COUNTER_TICKS: u64 = 3;
const CRUISE_SPEED_MPS: f32 = 22.0;

/// Simulated vehicle: constant speed until the standstill tick, stock
/// cruise engaged, cruise switch counter advancing at the native rate.
struct SimVehicle {
    tick: u64,
    standstill_at: Option<u64>,
    cruise_enabled: bool,
    counter: u8,
}

impl SimVehicle {
    fn new(standstill_at: Option<u64>) -> Self {
        Self {
            tick: 0,
            standstill_at,
            cruise_enabled: true,
            counter: 0,
        }
    }

    fn standstill(&self) -> bool {
        self.standstill_at.is_some_and(|at| self.tick >= at)
    }
}

impl VehicleStateSource for SimVehicle {
    fn vehicle_state(&mut self) -> VehicleState {
        if self.tick % BUTTON_COUNTER_TICKS == 0 {
            self.counter = (self.counter + 1) % 16;
        }
        let standstill = self.standstill();
        let state = VehicleState {
            speed_mps: if standstill { 0.0 } else { CRUISE_SPEED_MPS },
            standstill,
            steering_fault: false,
            driver_torque: 0,
            abs_active: false,
            cruise_enabled: self.cruise_enabled,
            cruise_main_switch: true,
            button_bus_counter: self.counter,
        };
        self.tick += 1;
        state
    }
}

#[derive(Default)]
struct WarningLog {
    last: ControlWarnings,
    steer_rate_limited_ticks: u64,
    brake_saturated_ticks: u64,
}

impl VehicleStateSink for WarningLog {
    fn publish_warnings(&mut self, warnings: &ControlWarnings) {
        if warnings.brake_saturated && !self.last.brake_saturated {
            warn!("brake request saturated");
        }
        if warnings.steer_rate_limited {
            self.steer_rate_limited_ticks += 1;
        }
        if warnings.brake_saturated {
            self.brake_saturated_ticks += 1;
        }
        self.last = *warnings;
    }
}

#[derive(Serialize)]
struct FrameRecord<'a> {
    tick: u64,
    #[serde(flatten)]
    frame: &'a Frame,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = App::new("dbwbus-sim")
        .version("0.1.0")
        .author("Vehicle Controls Team")
        .about("Drive-by-wire command bus simulator - runs the sequencer against a simulated vehicle")
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("FILE")
                .help("JSON sequencer configuration")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("variant")
                .long("variant")
                .value_name("VARIANT")
                .help("Vehicle platform (overrides the configuration file)")
                .takes_value(true)
                .possible_values(&["pq", "mqb"]),
        )
        .arg(
            Arg::with_name("interceptor")
                .long("interceptor")
                .help("Enable the pedal interceptor brake and gas channels"),
        )
        .arg(
            Arg::with_name("ticks")
                .short("n")
                .long("ticks")
                .value_name("N")
                .help("Number of ticks to run")
                .takes_value(true)
                .default_value(DEFAULT_TICKS)
                .validator(|v| match v.parse::<u64>() {
                    Ok(_) => Ok(()),
                    Err(_) => Err("Tick count must be a valid number".into()),
                }),
        )
        .arg(fraction_arg("steer", "Planner steering request, -1.0..1.0"))
        .arg(fraction_arg("brake", "Planner brake request, 0.0..1.0"))
        .arg(fraction_arg("gas", "Planner gas request, 0.0..1.0"))
        .arg(tick_arg("disable-at", "Disengage the system at this tick"))
        .arg(tick_arg("standstill-at", "Bring the vehicle to a stop at this tick"))
        .arg(
            Arg::with_name("format")
                .short("f")
                .long("format")
                .value_name("FORMAT")
                .help("Output format")
                .takes_value(true)
                .possible_values(&["candump", "json"])
                .default_value("candump"),
        )
        .arg(
            Arg::with_name("realtime")
                .short("r")
                .long("realtime")
                .help("Pace ticks at the configured tick period"),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .help("Enable verbose output"),
        )
        .get_matches();

    let level = if matches.is_present("verbose") { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).init();

    let mut config = match matches.value_of("config") {
        Some(path) => SequencerConfig::from_json_str(&std::fs::read_to_string(path)?)?,
        None => SequencerConfig::default(),
    };
    match matches.value_of("variant") {
        Some("pq") => config.variant = VehicleVariant::Pq,
        Some("mqb") => config.variant = VehicleVariant::Mqb,
        _ => {}
    }
    if matches.is_present("interceptor") {
        config.enable_gas_interceptor = true;
    }

    let ticks: u64 = matches.value_of("ticks").unwrap_or(DEFAULT_TICKS).parse()?;
    let actuators = Actuators {
        steer: parse_or(&matches, "steer", 0.0)?,
        brake: parse_or(&matches, "brake", 0.0)?,
        gas: parse_or(&matches, "gas", 0.0)?,
    };
    let disable_at: Option<u64> = matches.value_of("disable-at").map(str::parse).transpose()?;
    let standstill_at: Option<u64> = matches.value_of("standstill-at").map(str::parse).transpose()?;
    let json = matches.value_of("format") == Some("json");
    let realtime = matches.is_present("realtime");

    let tick_period = Duration::from_millis(u64::from(config.tick_period_ms));
    let mut sequencer = CommandSequencer::new(config)?;
    let mut vehicle = SimVehicle::new(standstill_at);
    let mut warnings = WarningLog::default();

    info!(ticks, ?actuators, "starting simulation");

    let mut interval = time::interval(tick_period);
    let mut pending: Option<ButtonKind> = None;
    for _ in 0..ticks {
        if realtime {
            interval.tick().await;
        }

        let tick = sequencer.tick();
        let enabled = disable_at.map_or(true, |at| tick < at);
        let completed_before = sequencer.get_stats().button_sessions_completed;

        let output = sequencer.update_from(&mut vehicle, &mut warnings, enabled, &actuators)?;
        for frame in &output.frames {
            if json {
                println!("{}", serde_json::to_string(&FrameRecord { tick: output.tick, frame })?);
            } else {
                println!("{:>8}  {}", output.tick, colorize(frame));
            }
        }

        // Stock cruise follows the virtual presses that reached it
        if sequencer.get_stats().button_sessions_completed > completed_before {
            match pending {
                Some(ButtonKind::Cancel) => vehicle.cruise_enabled = false,
                Some(ButtonKind::Resume) => vehicle.cruise_enabled = true,
                _ => {}
            }
        }
        pending = sequencer.get_injector_state().session.map(|session| session.request.kind);
    }

    print_summary(&sequencer, &warnings);
    Ok(())
}

fn fraction_arg<'a, 'b>(name: &'a str, help: &'b str) -> Arg<'a, 'b> {
    Arg::with_name(name)
        .long(name)
        .value_name("FRACTION")
        .help(help)
        .takes_value(true)
        .allow_hyphen_values(true)
        .validator(|v| match v.parse::<f32>() {
            Ok(_) => Ok(()),
            Err(_) => Err("Request must be a number".into()),
        })
}

fn tick_arg<'a, 'b>(name: &'a str, help: &'b str) -> Arg<'a, 'b> {
    Arg::with_name(name)
        .long(name)
        .value_name("TICK")
        .help(help)
        .takes_value(true)
        .validator(|v| match v.parse::<u64>() {
            Ok(_) => Ok(()),
            Err(_) => Err("Tick must be a valid number".into()),
        })
}

fn parse_or(matches: &clap::ArgMatches, name: &str, default: f32) -> Result<f32, std::num::ParseFloatError> {
    matches.value_of(name).map_or(Ok(default), str::parse)
}

fn colorize(frame: &Frame) -> ColoredString {
    let line = frame.to_candump();
    match frame.id {
        PQ_HCA_ID | MQB_HCA_ID => line.green(),
        PQ_GRA_ID | MQB_GRA_ID => line.yellow().bold(),
        PQ_MOB_ID => line.red(),
        PQ_AWV_ID => line.magenta(),
        PEDAL_GAS_ID => line.cyan(),
        RADAR_VIN_ID => line.blue(),
        _ => line.normal(),
    }
}

fn print_summary(sequencer: &CommandSequencer, warnings: &WarningLog) {
    let stats = sequencer.get_stats();
    println!();
    println!("{}", "Simulation summary".bold());
    println!("  {:<28} {}", "ticks", stats.ticks);
    println!("  {:<28} {}", "frames emitted", stats.frames_emitted);
    println!("  {:<28} {}", "HCA forced disables", stats.hca_forced_disables);
    println!("  {:<28} {}", "HCA torque nudges", stats.hca_torque_nudges);
    println!("  {:<28} {}", "button requests accepted", stats.button_requests_accepted);
    println!("  {:<28} {}", "button requests dropped", stats.button_requests_dropped);
    println!("  {:<28} {}", "button sessions completed", stats.button_sessions_completed);
    println!("  {:<28} {}", "button sessions expired", stats.button_sessions_expired);
    println!("  {:<28} {}", "button frames sent", stats.button_frames_sent);
    println!("  {:<28} {}", "brake saturations", stats.brake_saturations);
    println!("  {:<28} {}", "steer rate limited ticks", warnings.steer_rate_limited_ticks);
    println!("  {:<28} {}", "brake saturated ticks", warnings.brake_saturated_ticks);
}
