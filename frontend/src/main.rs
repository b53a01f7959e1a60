use std::path::PathBuf;
use std::process::ExitCode;
use std::result::Result;

use clap::{Parser, Subcommand};
use log::info;
use omniframe_core::error::BootError;
use omniframe_core::prelude::*;
use omniframe_machines::registry::{self, MachineEntry};
use thiserror::Error;

mod config;
mod image_path;
mod input;
mod runner;
mod screenshot;

use config::{ConfigError, FrontendConfig};
use image_path::BootSource;
use input::WatchTarget;

#[derive(Parser, Debug)]
#[command(name = "omniframe", version, about = "Headless frame-stepping emulator front end")]
struct Cli {
    /// Configuration file (default: <config dir>/omniframe/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter, e.g. "debug" or "omniframe_core=trace"
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List available machines
    Machines,

    /// Print the output buffer layout of a machine
    Layout {
        #[arg(long)]
        machine: Option<String>,
    },

    /// Boot an image and run frames
    Run(RunArgs),
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    #[arg(long)]
    machine: Option<String>,

    /// Binary-load image, or a .zip holding one
    #[arg(long, conflicts_with = "raw")]
    boot: Option<PathBuf>,

    /// Raw bytes loaded at --origin
    #[arg(long, requires = "origin")]
    raw: Option<PathBuf>,

    #[arg(long, value_parser = input::parse_address)]
    origin: Option<u16>,

    /// Machine argument KEY=VALUE (repeatable)
    #[arg(long = "arg", value_parser = input::parse_machine_arg)]
    machine_args: Vec<String>,

    #[arg(long, default_value_t = 60)]
    frames: u64,

    /// Execute this many instructions instead of whole frames
    #[arg(long)]
    step: Option<u32>,

    /// Breakpoint address (repeatable)
    #[arg(long = "break", value_parser = input::parse_address)]
    breakpoints: Vec<u16>,

    /// Watchpoint ADDR or ADDR:rwx (repeatable)
    #[arg(long = "watch", value_parser = input::parse_watch)]
    watchpoints: Vec<WatchTarget>,

    /// Text typed one character per frame
    #[arg(long = "type")]
    text: Option<String>,

    /// Joystick 0 direction, e.g. "up+left"
    #[arg(long, value_parser = input::joystick_direction)]
    joystick: Option<u8>,

    #[arg(long)]
    fire: bool,

    /// Step back this many save points after running
    #[arg(long)]
    rewind: Option<u32>,

    #[arg(long)]
    load_state: Option<PathBuf>,

    #[arg(long)]
    save_state: Option<PathBuf>,

    #[arg(long)]
    screenshot: Option<PathBuf>,

    /// Print CPU registers when done
    #[arg(long)]
    dump_cpu: bool,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Emulator(#[from] EmulatorError),

    #[error(transparent)]
    Boot(#[from] BootError),

    #[error("{0}")]
    Usage(String),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("omniframe: {e}");
            return ExitCode::FAILURE;
        }
    };

    let level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match dispatch(cli.command, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("omniframe: {e}");
            ExitCode::FAILURE
        }
    }
}

fn dispatch(command: Command, config: FrontendConfig) -> Result<(), CliError> {
    match command {
        Command::Machines => {
            for entry in registry::all() {
                println!("{:<16} {}", entry.name, entry.description);
            }
            Ok(())
        }
        Command::Layout { machine } => {
            let entry = find_machine(machine.as_deref().unwrap_or(&config.machine))?;
            let session = EmulatorSession::new((entry.create)(), config.session)?;
            print_layout(session.layout());
            Ok(())
        }
        Command::Run(args) => run(args, config),
    }
}

fn find_machine(name: &str) -> Result<&'static MachineEntry, CliError> {
    registry::find(name).ok_or_else(|| {
        let names: Vec<_> = registry::all().iter().map(|e| e.name).collect();
        CliError::Usage(format!(
            "unknown machine {name:?} (available: {})",
            names.join(", ")
        ))
    })
}

fn print_layout(layout: &LayoutTable) {
    println!(
        "{} layout v{}, {} bytes",
        layout.profile.name, layout.version, layout.total_len
    );
    for (name, region) in layout.regions() {
        println!("  {name:<14} {:>8} +{}", region.offset, region.len);
    }
    for block in layout.memory_blocks() {
        println!("  [{}] {:>8} +{}", block.name, block.region.offset, block.region.len);
    }
}

fn run(args: RunArgs, config: FrontendConfig) -> Result<(), CliError> {
    let entry = find_machine(args.machine.as_deref().unwrap_or(&config.machine))?;
    let mut session_config = config.session;
    session_config.emulator_args.extend(args.machine_args);
    let mut session = EmulatorSession::new((entry.create)(), session_config)?;
    info!("started {}", session.machine_name());

    if let Some(path) = &args.load_state {
        session.load_state(path)?;
    } else if let Some(path) = &args.boot {
        match image_path::resolve(path)? {
            BootSource::File(file) => session.boot_from_file(&file)?,
            BootSource::Extracted { name, data } => {
                info!("booting {name} from {}", path.display());
                session.boot_from_raw(&data)?;
            }
        }
    } else if let (Some(path), Some(origin)) = (&args.raw, args.origin) {
        let data = std::fs::read(path).map_err(BootError::Io)?;
        session.boot_from_segment(Some(&BootSegment::new(origin, data)))?;
    }

    runner::apply_debug_targets(&mut session, &args.breakpoints, &args.watchpoints);
    if let Some(text) = &args.text {
        session.type_text(text);
    }
    if let Some(direction) = args.joystick {
        session.joystick(0, direction, args.fire);
    }

    match args.step {
        Some(count) => match session.step_instructions(count)? {
            Some(condition) => println!("{condition}"),
            None => println!("stepped {count} instructions"),
        },
        None => println!("{}", runner::run_frames(&mut session, args.frames)?),
    }

    if let Some(save_points) = args.rewind {
        match runner::rewind(&mut session, save_points)? {
            Some(frame) => println!("rewound to frame {frame}"),
            None => println!("no earlier save point"),
        }
    }

    if let Some(path) = &args.save_state {
        session.save_state(path)?;
        info!("saved state to {}", path.display());
    }
    if let Some(path) = &args.screenshot {
        screenshot::write_png(path, session.layout(), session.video()).map_err(CliError::Usage)?;
        info!("wrote screenshot {}", path.display());
    }
    if args.dump_cpu {
        println!(
            "frame {} cycle {}: {}",
            session.current_frame_number(),
            session.view().current_cycle_in_frame(),
            session.current_cpu_status()
        );
    }
    Ok(())
}
