//! robosim - run a robot control program in a headless simulator
//!
//! Prints each line the program pauses on, the run outcome and the final
//! pose. With `--draw` the final scene is rendered as text.

use std::env;
use std::fs;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use anyhow::{bail, Context};
use tokio::task::LocalSet;
use tracing::{debug, error, info};

use robosim::annotator::StepAnnotator;
use robosim::program::Compiler;
use robosim::{
    handle_startup_error, AsciiSurface, LuaCompiler, RunOutcome, SimConfig, SimEvent,
    SimEventKind, Simulator,
};

/// Columns and rows of the `--draw` output
const DRAW_GRID: (usize, usize) = (60, 30);

/// Command line options
#[derive(Debug, Default)]
struct AppArgs {
    /// Configuration file path
    config_path: Option<PathBuf>,
    /// Program to run
    program: Option<PathBuf>,
    /// Frame rate override
    rate: Option<u32>,
    /// Stop the run after this long
    time_limit: Option<Duration>,
    /// Render the final scene
    draw: bool,
    /// Print the rewritten program and exit
    annotate_only: bool,
    /// Enable debug mode
    debug: bool,
}

impl AppArgs {
    /// Parse command line arguments
    fn parse() -> anyhow::Result<Self> {
        Self::parse_from(env::args().skip(1).collect())
    }

    fn parse_from(args: Vec<String>) -> anyhow::Result<Self> {
        let mut app_args = AppArgs::default();

        let mut i = 0;
        while i < args.len() {
            match args[i].as_str() {
                "--config" | "-c" => {
                    let Some(path) = args.get(i + 1) else {
                        bail!("Missing config file path");
                    };
                    app_args.config_path = Some(PathBuf::from(path));
                    i += 1;
                }
                "--rate" | "-r" => {
                    let Some(rate) = args.get(i + 1) else {
                        bail!("Missing frame rate");
                    };
                    app_args.rate = Some(
                        rate.parse()
                            .with_context(|| format!("Invalid frame rate: {}", rate))?,
                    );
                    i += 1;
                }
                "--time" | "-t" => {
                    let Some(secs) = args.get(i + 1) else {
                        bail!("Missing time limit");
                    };
                    let secs: f64 = secs
                        .parse()
                        .with_context(|| format!("Invalid time limit: {}", secs))?;
                    if !(secs.is_finite() && secs > 0.0) {
                        bail!("Time limit must be a positive number of seconds");
                    }
                    // too large for a Duration means no limit in practice
                    app_args.time_limit =
                        Some(Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX));
                    i += 1;
                }
                "--draw" => {
                    app_args.draw = true;
                }
                "--annotate" => {
                    app_args.annotate_only = true;
                }
                "--debug" | "-d" => {
                    app_args.debug = true;
                }
                "--help" | "-?" => {
                    print_help();
                    process::exit(0);
                }
                "--version" | "-v" => {
                    println!("{} v{}", robosim::NAME, robosim::VERSION);
                    process::exit(0);
                }
                arg if arg.starts_with('-') => {
                    bail!("Unknown option: {}", arg);
                }
                arg => {
                    if app_args.program.is_some() {
                        bail!("Unexpected argument: {}", arg);
                    }
                    app_args.program = Some(PathBuf::from(arg));
                }
            }
            i += 1;
        }

        Ok(app_args)
    }
}

/// Print help information
fn print_help() {
    println!("robosim - {}", robosim::DESCRIPTION);
    println!();
    println!("USAGE:");
    println!("    robosim [OPTIONS] <PROGRAM>");
    println!();
    println!("OPTIONS:");
    println!("    -c, --config <PATH>    Path to configuration file");
    println!("    -r, --rate <HZ>        Frame rate in frames per second");
    println!("    -t, --time <SECONDS>   Stop the run after this much time");
    println!("        --draw             Draw the final scene as text");
    println!("        --annotate         Print the rewritten program and exit");
    println!("    -d, --debug            Enable debug mode");
    println!("    -?, --help             Print this help message");
    println!("    -v, --version          Print version information");
    println!();
    println!("PROGRAMS:");
    println!("    Programs are Lua. Define main(), call setspeed(left, right) to");
    println!("    drive and write `yield <seconds>` on its own line to pause.");
    println!();
    println!("CONFIGURATION:");
    println!("    robosim looks for configuration files in the following order:");
    println!("    1. Path specified with --config");
    println!("    2. $ROBOSIM_CONFIG");
    println!("    3. $XDG_CONFIG_HOME/robosim/config.toml");
    println!("    4. ~/.robosim.toml");
    println!("    5. ./.robosim.toml");
    println!("    6. Built-in defaults");
    println!();
    println!("ENVIRONMENT:");
    println!("    ROBOSIM_CONFIG         Path to configuration file");
    println!("    ROBOSIM_DEBUG          Enable debug mode (1 or true)");
    println!("    RUST_LOG               Set logging level (error, warn, info, debug, trace)");
}

fn init_logging(debug: bool) {
    let debug_env = env::var("ROBOSIM_DEBUG").is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));
    let log_level = if debug || debug_env { "debug" } else { "info" };

    let env_filter = env::var("RUST_LOG").unwrap_or_else(|_| log_level.to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from(env_filter))
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}

fn report(event: &SimEvent) {
    match &event.kind {
        SimEventKind::LineReached {
            line,
            pause_seconds,
        } => println!("line {:>4}  pause {}s", line, pause_seconds),
        SimEventKind::RateChanged { rate_hz } => println!("rate {} Hz", rate_hz),
        SimEventKind::RunFailed { message } => eprintln!("{}", message),
        other => debug!("Session {}: {:?}", event.session, other),
    }
}

async fn run_program(config: SimConfig, source: &str, args: &AppArgs) -> anyhow::Result<bool> {
    let (columns, rows) = DRAW_GRID;
    let surface = AsciiSurface::new(config.display.width, config.display.height, columns, rows);
    let mut sim = Simulator::with_lua(config, Box::new(surface.clone()))?;
    let mut events = sim.subscribe();

    let run = match sim.load_and_run(source) {
        Ok(Some(run)) => run,
        Ok(None) => {
            println!("Nothing to run");
            return Ok(true);
        }
        Err(e) => {
            eprintln!("{}", handle_startup_error(&e));
            return Ok(false);
        }
    };

    let finished = run.outcome();
    tokio::pin!(finished);
    let deadline = async {
        match args.time_limit {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);
    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(interrupted);

    let outcome = loop {
        tokio::select! {
            outcome = &mut finished => break outcome,
            Some(event) = events.recv() => report(&event),
            _ = &mut deadline => {
                info!("Time limit reached, stopping");
                sim.stop();
                break RunOutcome::Cancelled;
            }
            _ = &mut interrupted => {
                info!("Interrupted, stopping");
                sim.stop();
                break RunOutcome::Cancelled;
            }
        }
    };
    for event in events.drain() {
        report(&event);
    }

    let pose = sim.pose();
    println!("outcome: {}", outcome);
    println!(
        "pose: x={:.3} y={:.3} heading={:.4}",
        pose.x, pose.y, pose.heading
    );
    if args.draw {
        println!("{}", surface.render());
    }

    Ok(!matches!(outcome, RunOutcome::Failed(_)))
}

fn main() -> anyhow::Result<()> {
    let args = AppArgs::parse().unwrap_or_else(|e| {
        eprintln!("Error: {:#}", e);
        print_help();
        process::exit(1);
    });

    init_logging(args.debug);
    debug!("Arguments: {:?}", args);

    let Some(program) = args.program.as_ref() else {
        print_help();
        process::exit(1);
    };
    let source = fs::read_to_string(program)
        .with_context(|| format!("Failed to read program {}", program.display()))?;

    let mut config = robosim::load_config(args.config_path.as_deref()).inspect_err(|e| {
        eprintln!("{}", handle_startup_error(e));
    })?;
    if let Some(rate) = args.rate {
        config.simulation.frame_rate_hz = config.check_rate(rate)?;
    }

    if args.annotate_only {
        let compiler = LuaCompiler::from_config(&config.program);
        let annotation = StepAnnotator::new(compiler.suspend_syntax())?.annotate(&source);
        print!("{}", annotation.source);
        return Ok(());
    }

    info!("Starting {} v{}", robosim::NAME, robosim::VERSION);
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build runtime")?;
    let local = LocalSet::new();
    let succeeded = local.block_on(&runtime, run_program(config, &source, &args))?;

    if !succeeded {
        error!("Program did not complete");
        process::exit(1);
    }
    Ok(())
}
