use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};

use spicli::benchmark;
use spicli::config::{self, Config, MismatchPolicy};
use spicli::crc::CrcEngine;
use spicli::frame;
use spicli::gpio::{Direction, GpioBackend, NoopGpio, RppalGpio};
use spicli::spi::{HardwareBus, SpiBus, SpiController, StubBus};

/// CLI for Raspberry Pi SPI/GPIO communication.
#[derive(Parser)]
#[command(name = "spicli", version, about)]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use the stand-in hardware backends (no bus or GPIO access).
    #[arg(long, global = true)]
    stub: bool,

    /// Echo byte-level diagnostics.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// SPI command group.
    #[command(subcommand)]
    Spi(SpiCommand),
    /// GPIO command group.
    #[command(subcommand)]
    Gpio(GpioCommand),
    /// Benchmarking commands.
    #[command(subcommand)]
    Benchmark(BenchmarkCommand),
}

#[derive(Subcommand)]
enum SpiCommand {
    /// Write WORD over SPI. WORD can be an integer or hex string.
    Write {
        word: String,
        /// Append a CRC to the transmitted word.
        #[arg(long)]
        crc: bool,
    },
    /// Send an SPI read with WORD as data and print the reassembled word.
    Read {
        word: String,
        /// Expect and check a trailing CRC on the received word.
        #[arg(long)]
        crc: bool,
    },
    /// Generate a CRC word from a data word.
    GenCrc { word: String },
}

#[derive(Subcommand)]
enum GpioCommand {
    /// Initialize the GPIO interface.
    Init,
    /// Reset the listed BCM channels to inputs.
    Cleanup { channels: Vec<u8> },
    /// Set a GPIO channel direction. CHANNEL is the BCM GPIO channel.
    SetDir {
        channel: u8,
        /// GPIO as input.
        #[arg(short, long)]
        input: bool,
        /// GPIO as output.
        #[arg(short, long)]
        output: bool,
    },
    /// Read a GPIO state. CHANNEL is the BCM GPIO channel.
    Read { channel: u8 },
    /// Set a GPIO state to 0.
    DriveLo { channel: u8 },
    /// Set a GPIO state to 1.
    DriveHi { channel: u8 },
    /// Output PWM on a GPIO until Ctrl+C. FREQUENCY is in Hz.
    SetPwm {
        channel: u8,
        frequency: f64,
        /// Desired duty cycle in percent.
        #[arg(short, long, default_value_t = 50.0)]
        duty_cycle: f64,
    },
    /// Toggle a GPIO with a fixed period until Ctrl+C. PERIOD_MS is in ms.
    Toggle {
        channel: u8,
        period_ms: f64,
        /// Only toggle once.
        #[arg(long)]
        once: bool,
    },
}

#[derive(Subcommand)]
enum BenchmarkCommand {
    /// Run multiple SPI writes and reads to benchmark durations.
    SpiRdWr {
        /// Number of operations per direction.
        #[arg(long, default_value_t = 2000)]
        ops: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    let config_path = cli.config.clone().unwrap_or_else(config::default_path);
    let config = Config::load_or_create(&config_path)?;
    config.validate()?;

    match cli.command {
        Command::Spi(command) => run_spi(command, &config, cli.stub),
        Command::Gpio(command) => run_gpio(command, cli.stub),
        Command::Benchmark(command) => run_benchmark(command, &config, cli.stub),
    }
}

fn init_logger(verbose: bool) {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", if verbose { "debug" } else { "info" });
    }
    env_logger::init();
}

/// Open the SPI backend. The stand-in is either requested explicitly or used
/// as a loudly-reported fallback so the tool stays usable off-device.
fn open_bus(config: &Config, stub: bool) -> Box<dyn SpiBus> {
    if stub {
        info!("Using stand-in SPI backend");
        return Box::new(StubBus::new());
    }
    match HardwareBus::open(&config.spi) {
        Ok(bus) => Box::new(bus),
        Err(e) => {
            warn!(
                "SPI hardware unavailable ({}), falling back to stand-in backend",
                e
            );
            Box::new(StubBus::new())
        }
    }
}

fn open_gpio(stub: bool) -> Box<dyn GpioBackend> {
    if stub {
        info!("Using stand-in GPIO backend");
        return Box::new(NoopGpio);
    }
    match RppalGpio::open() {
        Ok(gpio) => Box::new(gpio),
        Err(e) => {
            warn!(
                "GPIO hardware unavailable ({}), falling back to stand-in backend",
                e
            );
            Box::new(NoopGpio)
        }
    }
}

fn make_controller(config: &Config, stub: bool) -> Result<SpiController> {
    let engine = CrcEngine::from_config(&config.crc)?;
    let controller = SpiController::new(open_bus(config, stub), config.spi.byte_count(), engine)?;
    Ok(controller)
}

fn run_spi(command: SpiCommand, config: &Config, stub: bool) -> Result<()> {
    match command {
        SpiCommand::Write { word, crc } => {
            let word = frame::parse_word(&word)?;
            let mut controller = make_controller(config, stub)?;
            controller.write(word, crc)?;
            Ok(())
        }
        SpiCommand::Read { word, crc } => {
            let word = frame::parse_word(&word)?;
            let mut controller = make_controller(config, stub)?;
            let outcome = controller.read(word, crc)?;
            println!("{:#x}", outcome.value);
            if let Some(check) = outcome.crc {
                if !check.matches() && config.crc.mismatch == MismatchPolicy::Error {
                    bail!(
                        "CRC mismatch: expected {:#x}, received {:#x}",
                        check.expected,
                        check.received
                    );
                }
            }
            Ok(())
        }
        SpiCommand::GenCrc { word } => {
            let word = frame::parse_word(&word)?;
            let engine = CrcEngine::from_config(&config.crc)?;
            let payload = frame::encode(word, config.spi.byte_count(), None)?;
            println!("{:#x}", engine.checksum(&payload));
            Ok(())
        }
    }
}

fn run_gpio(command: GpioCommand, stub: bool) -> Result<()> {
    let mut gpio = open_gpio(stub);
    match command {
        GpioCommand::Init => {
            // Opening the backend is the initialization on this platform.
            println!("Done.");
            Ok(())
        }
        GpioCommand::Cleanup { channels } => {
            gpio.cleanup(&channels)?;
            println!("Done.");
            Ok(())
        }
        GpioCommand::SetDir {
            channel,
            input,
            output,
        } => {
            let direction = match (input, output) {
                (true, false) => Direction::Input,
                (false, true) => Direction::Output,
                (true, true) => bail!("Can only be either input or output, not both."),
                (false, false) => bail!("No direction provided (must be either input or output)."),
            };
            gpio.set_direction(channel, direction)?;
            Ok(())
        }
        GpioCommand::Read { channel } => {
            println!("{}", gpio.read(channel)?);
            Ok(())
        }
        GpioCommand::DriveLo { channel } => {
            gpio.write(channel, false)?;
            Ok(())
        }
        GpioCommand::DriveHi { channel } => {
            gpio.write(channel, true)?;
            Ok(())
        }
        GpioCommand::SetPwm {
            channel,
            frequency,
            duty_cycle,
        } => {
            if !(0.0..=100.0).contains(&duty_cycle) {
                bail!("duty cycle must be between 0 and 100 percent");
            }
            if frequency <= 0.0 {
                bail!("frequency must be positive");
            }
            gpio.start_pwm(channel, frequency, duty_cycle / 100.0)?;
            println!("HIT CTRL+C TO EXIT PWM MODE.");
            let running = interrupt_flag()?;
            while running.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(50));
            }
            gpio.stop_pwm(channel)?;
            Ok(())
        }
        GpioCommand::Toggle {
            channel,
            period_ms,
            once,
        } => {
            if period_ms <= 0.0 {
                bail!("period must be positive");
            }
            if period_ms < 0.6 {
                warn!("Inconsistent frequencies with periods under 0.6 ms");
            }
            let pulse = Duration::from_secs_f64(period_ms / 2.0 / 1000.0);
            if once {
                gpio.toggle(channel)?;
                thread::sleep(pulse);
                gpio.toggle(channel)?;
                return Ok(());
            }
            gpio.write(channel, false)?;
            println!("HIT CTRL+C TO EXIT CLOCK MODE.");
            let running = interrupt_flag()?;
            while running.load(Ordering::SeqCst) {
                gpio.toggle(channel)?;
                thread::sleep(pulse);
            }
            gpio.write(channel, false)?;
            Ok(())
        }
    }
}

fn run_benchmark(command: BenchmarkCommand, config: &Config, stub: bool) -> Result<()> {
    match command {
        BenchmarkCommand::SpiRdWr { ops } => {
            let mut controller = make_controller(config, stub)?;
            benchmark::spi_rd_wr(&mut controller, ops, Duration::from_millis(10))
        }
    }
}

fn interrupt_flag() -> Result<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let handle = running.clone();
    ctrlc::set_handler(move || handle.store(false, Ordering::SeqCst))
        .context("Failed to set Ctrl+C handler")?;
    Ok(running)
}
