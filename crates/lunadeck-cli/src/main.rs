//! Lunadeck CLI
//!
//! Talks to Moonraker over its unix socket and prints the same projections a
//! dashboard would show: klippy and printer state, heaters, fans, sensors,
//! time estimates, files and console output.

mod session;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use clap::{Parser, Subcommand};
use lunadeck_core::{
    EstimateKind, FileConfigLoad, InstanceName, InstancesInit, LocalConfig, Paths, State,
    TimeEstimates, default_socket_path,
};
use lunadeck_rpc::WaitRegistry;
use serde_json::{Value, json};
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use session::{Session, open_store};

/// Wait token for scripts sent with `lunadeck gcode`.
const GCODE_WAIT: &str = "onCliGcodeScript";

/// How long to keep listening for console output after a script returns.
const CONSOLE_LINGER: Duration = Duration::from_millis(250);

/// Lunadeck - Klipper dashboard for the terminal
#[derive(Parser)]
#[command(name = "lunadeck")]
#[command(about = "Lunadeck - Klipper dashboard over Moonraker's unix socket")]
#[command(version)]
#[command(after_help = "\
Examples:
  lunadeck status                   Klippy, printer and temperature overview
  lunadeck status --json            Same, as JSON
  lunadeck estimate --kind slicer   Print time estimates from slicer metadata
  lunadeck gcode G28                Run a gcode script and show its output
  lunadeck print pause              Pause the current print
  lunadeck files gcodes/calibration List a directory
  lunadeck instances list           Printers this machine has connected to
")]
struct Cli {
    /// Moonraker unix socket (defaults to ~/printer_data/comms/moonraker.sock)
    #[arg(long, global = true, value_name = "PATH")]
    socket: Option<PathBuf>,

    /// HTTP address of the same Moonraker, used to name this instance
    #[arg(
        long,
        global = true,
        value_name = "URL",
        default_value = "http://localhost:7125"
    )]
    api_url: String,

    /// Directory for local config and the instance list
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Seconds to wait for each reply
    #[arg(long, global = true, value_name = "SECS", default_value_t = 5)]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show klippy state, printer state, heaters, fans and sensors
    Status {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Show print progress and time estimates
    Estimate {
        /// slicer, file, filament or totals
        #[arg(long, default_value = "file")]
        kind: EstimateKind,
    },

    /// Run a gcode script
    Gcode {
        /// Script to run, e.g. "G28 X Y"
        script: String,
    },

    /// Show recent console output
    Console {
        /// Number of lines to show
        #[arg(long, default_value_t = 20)]
        lines: usize,
    },

    /// Query endstop states
    Endstops,

    /// Restart Klipper, its MCU firmware, or a system service
    Restart {
        /// FIRMWARE_RESTART instead of RESTART
        #[arg(long, conflicts_with = "service")]
        firmware: bool,

        /// Restart a service through Moonraker (klipper, moonraker, crowsnest, ...)
        #[arg(long, value_name = "NAME")]
        service: Option<String>,
    },

    /// Emergency stop
    Estop,

    /// Print job control
    Print {
        #[command(subcommand)]
        command: PrintCommand,
    },

    /// List a directory on the printer
    Files {
        /// Path relative to the root, e.g. "calibration"
        #[arg(default_value = "")]
        path: String,

        /// Moonraker file root
        #[arg(long, default_value = "gcodes")]
        root: String,
    },

    /// Power devices configured in Moonraker
    Power {
        #[command(subcommand)]
        command: PowerCommand,
    },

    /// Remembered printers
    Instances {
        #[command(subcommand)]
        command: InstancesCommand,
    },

    /// Local settings kept on this machine
    Local {
        #[command(subcommand)]
        command: LocalCommand,
    },
}

#[derive(Subcommand)]
enum PrintCommand {
    /// Start printing a file from the gcodes root
    Start { file: String },
    Cancel,
    Pause,
    Resume,
}

#[derive(Subcommand)]
enum PowerCommand {
    /// List devices and their state
    List,
    On { device: String },
    Off { device: String },
}

#[derive(Subcommand)]
enum InstancesCommand {
    List,
    Rename { api_url: String, name: String },
    Remove { api_url: String },
}

#[derive(Subcommand)]
enum LocalCommand {
    Show,
    /// Set a top-level key; the value is parsed as JSON when it can be
    Set { key: String, value: String },
}

/// Set up logging to stderr, or to `log_file` when given.
/// Defaults to `lunadeck=debug` in debug builds and `lunadeck=info` otherwise.
fn setup_logging(log_file: Option<&Path>) -> Option<WorkerGuard> {
    let default_level = if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("lunadeck={default_level}")));

    match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .map_or_else(|| "lunadeck.log".into(), |n| n.to_string_lossy());
            let file_appender = tracing_appender::rolling::never(dir, name.as_ref());
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_target(true)
                        .with_line_number(true),
                )
                .with(filter)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(std::io::stderr))
                .with(filter)
                .init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = setup_logging(cli.log_file.as_deref());

    let paths = match &cli.data_dir {
        Some(dir) => Paths::with_base(dir),
        None => Paths::new()?,
    };
    debug!("Data directory: {}", paths.data.display());

    // These only touch local storage
    let command = match cli.command {
        Commands::Instances { command } => return run_instances(&paths, command),
        Commands::Local { command } => return run_local(&paths, command),
        command => command,
    };

    let socket = cli.socket.unwrap_or_else(default_socket_path);
    let timeout = Duration::from_secs(cli.timeout);
    let mut session = Session::connect(&socket, &cli.api_url, &paths, timeout).await?;

    match command {
        Commands::Status { json } => run_status(&mut session, json).await,
        Commands::Estimate { kind } => run_estimate(&mut session, kind).await,
        Commands::Gcode { script } => run_gcode(&mut session, &script).await,
        Commands::Console { lines } => run_console(&mut session, lines).await,
        Commands::Endstops => run_endstops(&mut session).await,
        Commands::Restart { firmware, service } => {
            run_restart(&mut session, firmware, service.as_deref()).await
        }
        Commands::Estop => run_estop(&mut session).await,
        Commands::Print { command } => run_print(&mut session, command).await,
        Commands::Files { path, root } => run_files(&mut session, &root, &path).await,
        Commands::Power { command } => run_power(&mut session, command).await,
        Commands::Instances { .. } | Commands::Local { .. } => Ok(()),
    }
}

async fn run_status(session: &mut Session, as_json: bool) -> Result<()> {
    session.load_printer().await?;
    let state = session.state();

    if as_json {
        println!("{}", serde_json::to_string_pretty(&status_json(&state))?);
        return Ok(());
    }

    let socket = &state.socket;
    let message = socket.klippy_state_message();
    if message.is_empty() {
        println!("Klippy:  {}", socket.klippy_state());
    } else {
        println!("Klippy:  {} ({message})", socket.klippy_state());
    }
    println!("Printer: {}", socket.printer_state());
    println!(
        "Homed:   {}",
        ["x", "y", "z"]
            .iter()
            .map(|axis| if socket.homed_axes(axis) {
                axis.to_uppercase()
            } else {
                "-".to_string()
            })
            .collect::<String>()
    );

    let heaters = socket.heaters();
    if !heaters.is_empty() {
        println!("\nHeaters:");
        for heater in heaters {
            println!(
                "  {:<20} {:>7} / {:<7} {:>4}",
                heater.name,
                format_temp(heater.temperature),
                format_temp(heater.target),
                percent(heater.power)
            );
        }
    }

    let fans = socket.fans(&[]);
    if !fans.is_empty() {
        println!("\nFans:");
        for fan in fans {
            let rpm = fan.rpm.map(|rpm| format!(" {rpm:.0} rpm")).unwrap_or_default();
            println!("  {:<20} {:>4}{rpm}", fan.pretty_name, percent(fan.speed));
        }
    }

    let sensors = socket.sensors();
    if !sensors.is_empty() {
        println!("\nSensors:");
        for sensor in sensors {
            println!("  {:<20} {:>7}", sensor.name, format_temp(sensor.temperature));
        }
    }

    let runout = socket.runout_sensors();
    if !runout.is_empty() {
        println!("\nFilament:");
        for sensor in runout {
            let status = match (sensor.enabled, sensor.filament_detected) {
                (false, _) => "disabled",
                (true, true) => "detected",
                (true, false) => "empty",
            };
            println!("  {:<20} {status}", sensor.name);
        }
    }

    if socket.supports_bed_mesh() {
        let meshes: Vec<String> = socket
            .bed_meshes()
            .into_iter()
            .map(|mesh| {
                if mesh.active {
                    format!("{} (active)", mesh.profile_name)
                } else {
                    mesh.profile_name
                }
            })
            .collect();
        println!("\nBed meshes: {}", meshes.join(", "));
    }

    let macros = state.visible_macros();
    if !macros.is_empty() {
        println!("\nMacros: {}", macros.join(" "));
    }
    Ok(())
}

fn status_json(state: &State) -> Value {
    let socket = &state.socket;
    json!({
        "klippy": {
            "connected": socket.klippy_connected(),
            "state": socket.klippy_state(),
            "message": socket.klippy_state_message(),
        },
        "printer": socket.printer_state(),
        "heaters": socket.heaters(),
        "fans": socket.fans(&[]),
        "sensors": socket.sensors(),
        "runoutSensors": socket.runout_sensors(),
        "bedMeshes": socket.bed_meshes(),
        "macros": state.visible_macros(),
    })
}

async fn run_estimate(session: &mut Session, kind: EstimateKind) -> Result<()> {
    session
        .request(|actions| {
            actions.printer_objects_subscribe(["print_stats", "display_status", "virtual_sdcard"]);
        })
        .await
        .context("printer.objects.subscribe failed")?;

    let filename = session
        .state()
        .socket
        .printer
        .get("print_stats")
        .and_then(|stats| stats.get("filename"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    if filename.is_empty() {
        println!("Not printing");
        return Ok(());
    }

    session
        .request(|actions| actions.server_files_metadata(&filename))
        .await
        .with_context(|| format!("No metadata for {filename}"))?;

    let estimates = session.state().socket.time_estimates(kind);
    println!("File:     {filename}");
    print_estimates(&estimates);
    Ok(())
}

fn print_estimates(estimates: &TimeEstimates) {
    println!("Progress: {}%", estimates.progress);
    println!("Elapsed:  {}", estimates.duration);
    if estimates.kind != EstimateKind::Totals {
        println!("Left:     {} ({})", estimates.time_left, estimates.kind);
        println!("Total:    {}", estimates.total_duration);
    }
}

async fn run_gcode(session: &mut Session, script: &str) -> Result<()> {
    let before = session.state().socket.console.len();

    session
        .request(|actions| actions.printer_gcode_script(script, Some(GCODE_WAIT)))
        .await
        .with_context(|| format!("'{script}' failed"))?;
    session.drain(CONSOLE_LINGER).await?;

    let state = session.state();
    for line in state.socket.console.iter().skip(before) {
        println!("{line}");
    }
    Ok(())
}

async fn run_console(session: &mut Session, lines: usize) -> Result<()> {
    let result = session
        .request(|actions| actions.server_gcode_store())
        .await
        .context("server.gcode_store failed")?;

    let entries = result
        .get("gcode_store")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    for entry in entries.iter().skip(entries.len().saturating_sub(lines)) {
        let time = entry.get("time").and_then(Value::as_f64).unwrap_or(0.0);
        let message = entry.get("message").and_then(Value::as_str).unwrap_or("");
        let prefix = if entry.get("type").and_then(Value::as_str) == Some("command") {
            "> "
        } else {
            ""
        };
        println!("[{}] {prefix}{message}", format_timestamp(time));
    }
    Ok(())
}

async fn run_endstops(session: &mut Session) -> Result<()> {
    session
        .request(|actions| actions.printer_query_endstops())
        .await
        .context("printer.query_endstops.status failed")?;

    for (name, state) in session.state().socket.endstops() {
        println!("{name:<12} {state}");
    }
    Ok(())
}

async fn run_restart(session: &mut Session, firmware: bool, service: Option<&str>) -> Result<()> {
    match service {
        Some(service) => {
            session
                .request(|actions| actions.machine_services_restart(service))
                .await
                .with_context(|| format!("Failed to restart {service}"))?;
            println!("Restarting {service}");
        }
        None if firmware => {
            session
                .request(|actions| actions.printer_firmware_restart())
                .await
                .context("FIRMWARE_RESTART failed")?;
            println!("Firmware restart requested");
        }
        None => {
            session
                .request(|actions| actions.printer_restart())
                .await
                .context("RESTART failed")?;
            println!("Klipper restart requested");
        }
    }
    Ok(())
}

async fn run_estop(session: &mut Session) -> Result<()> {
    session
        .request(|actions| actions.printer_emergency_stop())
        .await
        .context("Emergency stop failed")?;
    println!("Emergency stop sent");
    Ok(())
}

async fn run_print(session: &mut Session, command: PrintCommand) -> Result<()> {
    let verb = match &command {
        PrintCommand::Start { file } => {
            session
                .request(|actions| actions.printer_print_start(file))
                .await
                .with_context(|| format!("Failed to start {file}"))?;
            "Started"
        }
        PrintCommand::Cancel => {
            session
                .request(|actions| actions.printer_print_cancel())
                .await
                .context("Cancel failed")?;
            "Cancelled"
        }
        PrintCommand::Pause => {
            session
                .request(|actions| actions.printer_print_pause())
                .await
                .context("Pause failed")?;
            "Paused"
        }
        PrintCommand::Resume => {
            session
                .request(|actions| actions.printer_print_resume())
                .await
                .context("Resume failed")?;
            "Resumed"
        }
    };
    info!("{verb} print");
    println!("{verb}");
    Ok(())
}

async fn run_files(session: &mut Session, root: &str, path: &str) -> Result<()> {
    let result = session
        .request(|actions| actions.server_files_get_directory(root, path))
        .await
        .with_context(|| format!("Failed to list {root}/{path}"))?;

    for line in directory_lines(&result) {
        println!("{line}");
    }
    Ok(())
}

/// Directories first with a trailing slash, then files with their size.
fn directory_lines(listing: &Value) -> Vec<String> {
    let names = |key: &str, field: &str| -> Vec<(String, Option<u64>)> {
        listing
            .get(key)
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| {
                        let name = entry.get(field)?.as_str()?.to_string();
                        Some((name, entry.get("size").and_then(Value::as_u64)))
                    })
                    .collect()
            })
            .unwrap_or_default()
    };

    let mut lines: Vec<String> = names("dirs", "dirname")
        .into_iter()
        .map(|(name, _)| format!("{name}/"))
        .collect();
    lines.extend(
        names("files", "filename")
            .into_iter()
            .map(|(name, size)| match size {
                Some(size) => format!("{name:<40} {}", format_size(size)),
                None => name,
            }),
    );
    lines
}

async fn run_power(session: &mut Session, command: PowerCommand) -> Result<()> {
    match command {
        PowerCommand::List => {
            let result = session
                .request(|actions| actions.machine_device_power_devices())
                .await
                .context("machine.device_power.devices failed")?;
            let devices = result
                .get("devices")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            for device in devices {
                let name = device.get("device").and_then(Value::as_str).unwrap_or("?");
                let status = device.get("status").and_then(Value::as_str).unwrap_or("?");
                println!("{name:<20} {status}");
            }
        }
        PowerCommand::On { device } | PowerCommand::Off { device } if device.is_empty() => {
            anyhow::bail!("Device name is empty");
        }
        PowerCommand::On { device } => toggle_power(session, &device, "on").await?,
        PowerCommand::Off { device } => toggle_power(session, &device, "off").await?,
    }
    Ok(())
}

async fn toggle_power(session: &mut Session, device: &str, state: &str) -> Result<()> {
    let wait = format!("power-{device}");
    let result = session
        .request(|actions| actions.machine_device_power_toggle(device, state, Some(wait.as_str())))
        .await
        .with_context(|| format!("Failed to switch {device} {state}"))?;
    let now = result.get(device).and_then(Value::as_str).unwrap_or(state);
    println!("{device}: {now}");
    Ok(())
}

fn run_instances(paths: &Paths, command: InstancesCommand) -> Result<()> {
    let store = open_store(paths, WaitRegistry::new())?;
    store
        .init_instances(&InstancesInit {
            api_config: None,
            file_config: FileConfigLoad::Unavailable,
        })
        .context("Failed to load instance list")?;

    match command {
        InstancesCommand::List => {
            let state = store.snapshot();
            if state.config.instances.is_empty() {
                println!("No instances yet. Connect once with `lunadeck status`.");
            }
            for instance in &state.config.instances {
                let marker = if instance.active { "*" } else { " " };
                println!(
                    "{marker} {:<20} {:<30} {}",
                    instance.name, instance.api_url, instance.socket_url
                );
            }
        }
        InstancesCommand::Rename { api_url, name } => {
            store.update_instance_name(&InstanceName { api_url, name })?;
        }
        InstancesCommand::Remove { api_url } => {
            store.remove_instance(&api_url)?;
        }
    }
    Ok(())
}

fn run_local(paths: &Paths, command: LocalCommand) -> Result<()> {
    let store = open_store(paths, WaitRegistry::new())?;

    match command {
        LocalCommand::Show => {
            let state = store.snapshot();
            println!("{}", serde_json::to_string_pretty(&state.config.local_config)?);
        }
        LocalCommand::Set { key, value } => {
            let mut payload = LocalConfig::new();
            payload.insert(key, parse_value(&value));
            store.save_local(&payload).context("Failed to save local config")?;
        }
    }
    Ok(())
}

/// JSON when `raw` parses as JSON, otherwise the raw string.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn format_temp(celsius: f64) -> String {
    format!("{celsius:.1}°C")
}

// Fractions in 0..=1 round to at most three digits
#[allow(clippy::cast_possible_truncation)]
fn percent(fraction: f64) -> String {
    format!("{}%", (fraction * 100.0).round() as i64)
}

// File sizes stay well inside f64's exact integer range
#[allow(clippy::cast_precision_loss)]
fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}

/// Local wall-clock time of a unix timestamp in seconds.
// Sub-second precision is dropped on purpose
#[allow(clippy::cast_possible_truncation)]
fn format_timestamp(seconds: f64) -> String {
    DateTime::from_timestamp(seconds.trunc() as i64, 0).map_or_else(
        || "--:--:--".to_string(),
        |time| time.with_timezone(&Local).format("%H:%M:%S").to_string(),
    )
}
