/*
handmouse - control del ratón con gestos de mano

Lee por stdin los landmarks del detector (una línea JSON por frame) y los
convierte en movimiento de cursor, clicks, scroll, drag y trazos de dibujo.

    detector | ./target/release/handmouse --config handmouse.toml

Formato de entrada, una línea por frame:
    {"timestamp": 12.345, "hands": [{"landmarks": [{"x":..,"y":..,"z":..} x21],
      "handedness": "right", "confidence": 0.93, "timestamp": 12.345}]}
Órdenes de control por la misma vía:
    {"command": "mode", "mode": "draw"}
    {"command": "clear_canvas"}

Para mover el puntero de verdad compilar con `--features uinput` y ejecutar
con acceso a /dev/uinput:
    sg input -c './target/release/handmouse'
*/

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{ensure, Context, Result};
use clap::Parser;
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::Deserialize;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use handmouse::csv_loader::save_frames_to_csv;
use handmouse::hid::{ActionIntent, Actuator, LogActuator, LogCanvas};
use handmouse::mailbox::{mailbox, Poll, Publisher};
use handmouse::types::{DetectorFrame, Handedness, Seconds};
use handmouse::{Config, FrameReport, Mode, Pipeline};

/// Gestos de mano → ratón
#[derive(Parser, Debug)]
#[command(name = "handmouse")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Archivo de configuración TOML
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log a nivel debug
    #[arg(short, long)]
    verbose: bool,

    /// Cadencia del consumidor en Hz
    #[arg(long, default_value = "60")]
    poll_hz: f64,

    /// Mano preferida cuando hay varias (left/right)
    #[arg(long, value_parser = parse_hand)]
    hand: Option<Handedness>,

    /// Modo inicial (mouse/draw)
    #[arg(long, value_parser = parse_mode)]
    mode: Option<Mode>,

    /// Graba los frames recibidos en un CSV reproducible con replay_csv
    #[arg(long)]
    record: Option<PathBuf>,

    /// No abrir /dev/uinput: solo registrar las acciones
    #[arg(long)]
    dry_run: bool,

    /// Imprime la configuración efectiva en TOML y sale
    #[arg(long)]
    print_config: bool,
}

fn parse_hand(s: &str) -> Result<Handedness, String> {
    Handedness::parse(s).ok_or_else(|| format!("mano desconocida: {s} (left/right)"))
}

fn parse_mode(s: &str) -> Result<Mode, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "mouse" => Ok(Mode::Mouse),
        "draw" => Ok(Mode::Draw),
        _ => Err(format!("modo desconocido: {s} (mouse/draw)")),
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
enum ControlCommand {
    Mode { mode: Mode },
    ClearCanvas,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InputLine {
    Frame(DetectorFrame),
    Command(ControlCommand),
}

/// Productor: stdin → buzón (frames) y canal (órdenes)
fn spawn_reader(
    mut publisher: Publisher<DetectorFrame>,
    commands: Sender<ControlCommand>,
) -> JoinHandle<Result<()>> {
    thread::spawn(move || {
        let stdin = io::stdin();
        for (line_idx, line) in stdin.lock().lines().enumerate() {
            let line = line.context("Error leyendo stdin")?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<InputLine>(&line) {
                Ok(InputLine::Frame(frame)) => {
                    publisher.publish(frame);
                }
                Ok(InputLine::Command(command)) => {
                    if commands.send(command).is_err() {
                        break;
                    }
                }
                Err(e) => warn!("⚠️  Línea {} ignorada: {}", line_idx + 1, e),
            }
        }
        info!(
            "📭 Fin de la entrada ({} frames descartados por llegar tarde)",
            publisher.overwritten()
        );
        Ok(())
    })
}

#[cfg(feature = "uinput")]
fn open_actuator(dry_run: bool) -> Box<dyn Actuator> {
    if !dry_run {
        match handmouse::hid::HidOutput::new() {
            Ok(hid) => {
                info!("✅ HID inicializado (/dev/uinput)");
                return Box::new(hid);
            }
            Err(e) => warn!("❌ No se pudo inicializar HID: {}. Solo log.", e),
        }
    }
    Box::new(LogActuator::new())
}

#[cfg(not(feature = "uinput"))]
fn open_actuator(dry_run: bool) -> Box<dyn Actuator> {
    if !dry_run {
        info!("ℹ️  Compilado sin la feature uinput: las acciones solo se registran");
    }
    Box::new(LogActuator::new())
}

fn log_report(report: &FrameReport) {
    for intent in &report.intents {
        if !matches!(intent, ActionIntent::MoveCursor { .. } | ActionIntent::Stroke { .. }) {
            info!("🎯 {:.3}s {:?}", report.timestamp, intent);
        }
    }
    debug!(
        t = report.timestamp,
        state = report.state,
        stable = report.stable.as_ref().map(|g| g.as_str()),
        cursor = ?report.cursor,
        "frame"
    );
}

fn run(cli: Cli, config: Config) -> Result<()> {
    ensure!(
        cli.poll_hz.is_finite() && cli.poll_hz > 0.0,
        "--poll-hz debe ser positivo (recibido {})",
        cli.poll_hz
    );
    let period = Duration::from_secs_f64(1.0 / cli.poll_hz);

    let mut pipeline = Pipeline::new(&config)?;
    let mut actuator = open_actuator(cli.dry_run);
    let mut canvas = LogCanvas::default();

    let (publisher, subscriber) = mailbox();
    let (tx_commands, rx_commands): (Sender<ControlCommand>, Receiver<ControlCommand>) =
        unbounded();
    let reader = spawn_reader(publisher, tx_commands);

    info!("🎬 Esperando frames en stdin ({} Hz)...", cli.poll_hz);

    let mut recorded: Vec<DetectorFrame> = Vec::new();
    // reloj del detector: último timestamp visto y cuándo llegó
    // los sondeos vacíos solo deciden la gracia de mano perdida; no adelantan este reloj
    let mut last_frame: Option<(Seconds, Instant)> = None;

    loop {
        while let Ok(command) = rx_commands.try_recv() {
            let intents = match command {
                ControlCommand::Mode { mode } => pipeline.set_mode(mode),
                ControlCommand::ClearCanvas => pipeline.clear_canvas(),
            };
            pipeline.deliver(&intents, actuator.as_mut(), &mut canvas);
        }

        let report = match subscriber.poll_timeout(period) {
            Poll::Fresh(frame) => {
                if let Some((ts, _)) = last_frame {
                    if frame.timestamp <= ts {
                        debug!("Frame fuera de orden ({:.3}s), descartado", frame.timestamp);
                        continue;
                    }
                }
                last_frame = Some((frame.timestamp, Instant::now()));
                if cli.record.is_some() {
                    recorded.push(frame.clone());
                }
                pipeline.process(&frame, actuator.as_mut(), &mut canvas)
            }
            Poll::Stale => {
                let Some((ts, received)) = last_frame else {
                    continue;
                };
                let now = ts + received.elapsed().as_secs_f64();
                pipeline.process(&DetectorFrame::empty(now), actuator.as_mut(), &mut canvas)
            }
            Poll::Closed => break,
        };
        log_report(&report);
    }

    let intents = pipeline.release_all();
    pipeline.deliver(&intents, actuator.as_mut(), &mut canvas);

    match reader.join() {
        Ok(result) => result?,
        Err(_) => warn!("❌ El hilo lector terminó con pánico"),
    }

    if let Some(path) = &cli.record {
        save_frames_to_csv(path, &recorded)?;
        info!("💾 {} frames grabados en {:?}", recorded.len(), path);
    }
    if pipeline.failures() > 0 {
        warn!("⚠️  {} fallos del actuador durante la sesión", pipeline.failures());
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("No se pudo cargar la configuración {:?}", path))?,
        None => Config::default(),
    };
    if let Some(hand) = cli.hand {
        config.pipeline.preferred_hand = Some(hand);
    }
    if let Some(mode) = cli.mode {
        config.pipeline.mode = mode;
    }

    if cli.print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    run(cli, config)
}
