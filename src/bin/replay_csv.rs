use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use handmouse::csv_loader::load_frames_from_csv;
use handmouse::hid::{ActionIntent, LogActuator, LogCanvas};
use handmouse::types::Handedness;
use handmouse::{Config, Mode, Pipeline};

/// Reproduce una sesión grabada y escribe las acciones como líneas JSON
#[derive(Parser, Debug)]
#[command(name = "replay_csv")]
struct Args {
    /// Sesión grabada (handmouse --record)
    csv: PathBuf,

    /// Archivo de configuración TOML
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,

    /// Modo (mouse/draw)
    #[arg(long)]
    mode: Option<String>,

    /// Mano preferida (left/right)
    #[arg(long)]
    hand: Option<String>,

    /// Incluir también MoveCursor y Stroke en la salida
    #[arg(long)]
    cursor: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let mut config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("No se pudo cargar la configuración {:?}", path))?,
        None => Config::default(),
    };
    if let Some(hand) = &args.hand {
        config.pipeline.preferred_hand =
            Some(Handedness::parse(hand).with_context(|| format!("mano desconocida: {hand}"))?);
    }
    if let Some(mode) = &args.mode {
        config.pipeline.mode = match mode.to_ascii_lowercase().as_str() {
            "mouse" => Mode::Mouse,
            "draw" => Mode::Draw,
            other => anyhow::bail!("modo desconocido: {other} (mouse/draw)"),
        };
    }

    let frames = load_frames_from_csv(&args.csv)?;
    info!("🎞️  Reproduciendo {} frames desde {:?}", frames.len(), args.csv);

    let mut pipeline = Pipeline::new(&config)?;
    let mut actuator = LogActuator::new();
    let mut canvas = LogCanvas::default();

    let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
    let mut skipped = 0usize;

    for frame in &frames {
        let report = pipeline.process(frame, &mut actuator, &mut canvas);
        if report.skipped.is_some() {
            skipped += 1;
        }
        for intent in &report.intents {
            let continuous = matches!(
                intent,
                ActionIntent::MoveCursor { .. } | ActionIntent::Stroke { .. }
            );
            if continuous && !args.cursor {
                continue;
            }
            *counts.entry(intent_name(intent)).or_default() += 1;
            let line = json!({
                "t": report.timestamp,
                "gesture": report.stable.as_ref().map(|g| g.as_str()),
                "intent": intent,
            });
            println!("{line}");
        }
    }

    let intents = pipeline.release_all();
    pipeline.deliver(&intents, &mut actuator, &mut canvas);

    eprintln!("\n📊 {} frames ({} sin mano utilizable)", frames.len(), skipped);
    for (name, count) in &counts {
        eprintln!("  {:<14} {:>5}", name, count);
    }
    if pipeline.failures() > 0 {
        eprintln!("⚠️  {} fallos del actuador", pipeline.failures());
    }
    Ok(())
}

fn intent_name(intent: &ActionIntent) -> &'static str {
    match intent {
        ActionIntent::MoveCursor { .. } => "move_cursor",
        ActionIntent::LeftClick => "left_click",
        ActionIntent::RightClick => "right_click",
        ActionIntent::DoubleClick => "double_click",
        ActionIntent::Scroll { .. } => "scroll",
        ActionIntent::DragStart => "drag_start",
        ActionIntent::DragEnd => "drag_end",
        ActionIntent::Stop => "stop",
        ActionIntent::Stroke { .. } => "stroke",
        ActionIntent::EndStroke => "end_stroke",
        ActionIntent::ClearCanvas => "clear_canvas",
    }
}
