//! `mimic-cli` – drives two arm servos from a live pose stream.
//!
//! The binary:
//!
//! 1. Loads `~/.mimic/config.toml` (defaults when absent) plus `MIMIC_*`
//!    overrides.
//! 2. Opens the serial link to the servo controller and waits for it to
//!    settle.
//! 3. Reads JSON-lines landmark frames from stdin or a recorded file.
//! 4. Runs the control loop until **Ctrl-C**, end of input, or the first
//!    failure, showing the last command sent on a status line.
//!
//! `mimic init` writes a default config file and exits.
//!
//! Exit status is 0 after a clean stop and 1 after any failure.

mod config;
mod feedback;

use colored::Colorize;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

use mimic_control::control_loop::{ControlLoop, StopReason};
use mimic_control::telemetry::init_tracing;
use mimic_hal::{FrameSource, JsonLinesSource, SerialTransport};
use mimic_types::{MimicError, Stage};

use crate::config::Config;
use crate::feedback::ConsoleFeedback;

fn main() -> ExitCode {
    // Logs go to stderr; stdout carries the banner and the command overlay.
    let _telemetry = init_tracing("mimic");

    if std::env::args().nth(1).as_deref() == Some("init") {
        return write_default_config();
    }

    print_banner();

    let cfg = match config::load() {
        Ok(cfg) => cfg,
        Err(e) => return report_failure(&MimicError::Config(e)),
    };
    info!(?cfg, "configuration loaded");

    // ── Shared stop flag ──────────────────────────────────────────────────
    let stop = Arc::new(AtomicBool::new(false));
    let stop_on_signal = Arc::clone(&stop);
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – stopping once the current frame wait ends …".yellow().bold());
        stop_on_signal.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; the loop will only stop at end of input");
    }

    match run(&cfg, &stop) {
        Ok(reason) => {
            println!();
            let why = match reason {
                StopReason::Stopped => "stopped by operator",
                StopReason::EndOfStream => "landmark stream ended",
            };
            println!("  {} Servo link closed ({}).", "✓".green().bold(), why);
            ExitCode::SUCCESS
        }
        Err(e) => report_failure(&e),
    }
}

/// Open the link and the landmark source, then hand both to the loop.
fn run(cfg: &Config, stop: &AtomicBool) -> Result<StopReason, MimicError> {
    let loop_config = cfg.loop_config()?;

    println!(
        "  Opening servo link on {} @ {} baud …",
        cfg.serial_port.bold(),
        cfg.baud_rate
    );
    let transport = SerialTransport::open(&cfg.serial_settings())?;

    let source: Box<dyn FrameSource> = if cfg.reads_stdin() {
        println!("  Reading landmarks from {}", "stdin".bold());
        Box::new(JsonLinesSource::from_stdin()?)
    } else {
        println!("  Reading landmarks from {}", cfg.landmark_input.bold());
        Box::new(JsonLinesSource::open(&cfg.landmark_input)?)
    };
    println!("  Press {} to stop.\n", "Ctrl-C".bold().cyan());

    let mut control = ControlLoop::new(source, Box::new(transport), loop_config)?
        .with_feedback(Box::new(ConsoleFeedback::stdout()));
    control.run(stop)
}

fn report_failure(err: &MimicError) -> ExitCode {
    let stage = err.stage();
    eprintln!();
    eprintln!("{} {}", format!("[{stage}]").red().bold(), err);
    if stage == Stage::Transport {
        eprintln!(
            "  {}",
            "Check the cable and that no other program holds the serial port.".dimmed()
        );
    }
    ExitCode::FAILURE
}

fn write_default_config() -> ExitCode {
    let path = config::config_path();
    if path.exists() {
        println!("  Config already present at {}", path.display().to_string().bold());
        return ExitCode::SUCCESS;
    }
    match config::save(&Config::default()) {
        Ok(()) => {
            println!(
                "  {} Config saved to {}",
                "✓".green().bold(),
                path.display().to_string().bold()
            );
            ExitCode::SUCCESS
        }
        Err(e) => report_failure(&MimicError::Config(e)),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   ____ ___  (_)___ ___  (_)____"#.bold().cyan());
    println!("{}", r#"  / __ `__ \/ / __ `__ \/ / ___/"#.bold().cyan());
    println!("{}", r#" / / / / / / / / / / / / / /__  "#.bold().cyan());
    println!("{}", r#"/_/ /_/ /_/_/_/ /_/ /_/_/\___/  "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "mimic".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Arm pose to servo mirror");
    println!();
}
