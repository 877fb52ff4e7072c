use handmouse::csv_loader::{load_frames_from_csv, save_frames_to_csv};
use handmouse::hid::{ActionIntent, LogActuator, LogCanvas};
use handmouse::synthetic::{HandBuilder, ThumbPose};
use handmouse::types::{DetectorFrame, Handedness, INDEX_TIP, NUM_LANDMARKS};
use handmouse::{Config, Pipeline};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::NamedTempFile;

const DT: f64 = 1.0 / 30.0;

/// Sesión corta: apuntar moviendo la mano, pinza, mano fuera, pistola
fn session() -> Vec<DetectorFrame> {
    let mut rng = StdRng::seed_from_u64(7);
    let mut frames = Vec::new();
    let mut t = 0.0;
    let push = |frames: &mut Vec<DetectorFrame>, hand: Option<HandBuilder>, t: &mut f64| {
        frames.push(DetectorFrame {
            timestamp: *t,
            hands: hand.map(|h| vec![h.build(*t)]).unwrap_or_default(),
        });
        *t += DT;
    };

    for k in 0..30 {
        let jitter: f32 = rng.gen_range(-0.003..0.003);
        let hand = HandBuilder::new()
            .pattern("FTFFF")
            .index_tip_at(0.3 + 0.01 * k as f32 + jitter, 0.5 + jitter);
        push(&mut frames, Some(hand), &mut t);
    }
    // el detector reporta confianza por landmark; la mitad de los frames
    // traen la punta del índice casi ocluida
    for frame in frames.iter_mut() {
        let low = rng.gen_bool(0.5);
        for hand in frame.hands.iter_mut() {
            hand.landmark_confidence = (0..NUM_LANDMARKS)
                .map(|i| if low && i == INDEX_TIP { 0.2 } else { 0.9 })
                .collect();
        }
    }
    for _ in 0..15 {
        let hand = HandBuilder::new().pattern("TTFFF").thumb(ThumbPose::Pinch);
        push(&mut frames, Some(hand), &mut t);
    }
    for _ in 0..10 {
        push(&mut frames, None, &mut t);
    }
    for _ in 0..15 {
        let hand = HandBuilder::new()
            .pattern("TTFFF")
            .thumb(ThumbPose::Gun)
            .handedness(Handedness::Left);
        push(&mut frames, Some(hand), &mut t);
    }
    frames
}

fn replay(frames: &[DetectorFrame], config: &Config) -> Vec<ActionIntent> {
    let mut p = Pipeline::new(config).unwrap();
    let mut actuator = LogActuator::new();
    let mut canvas = LogCanvas::default();
    frames
        .iter()
        .flat_map(|f| p.process(f, &mut actuator, &mut canvas).intents)
        .collect()
}

#[test]
fn recorded_session_replays_identically() {
    let frames = session();
    let file = NamedTempFile::new().unwrap();
    save_frames_to_csv(file.path(), &frames).unwrap();
    let loaded = load_frames_from_csv(file.path()).unwrap();

    assert_eq!(loaded, frames);

    let mut strict = Config::default();
    strict.extractor.min_landmark_confidence = 0.5;
    assert_eq!(replay(&loaded, &strict), replay(&frames, &strict));
    assert_ne!(replay(&frames, &strict), replay(&frames, &Config::default()));
}

#[test]
fn session_produces_expected_actions() {
    let intents = replay(&session(), &Config::default());
    let clicks = intents
        .iter()
        .filter(|i| **i == ActionIntent::LeftClick)
        .count();
    let doubles = intents
        .iter()
        .filter(|i| **i == ActionIntent::DoubleClick)
        .count();
    let moves = intents
        .iter()
        .filter(|i| matches!(i, ActionIntent::MoveCursor { .. }))
        .count();

    assert_eq!(clicks, 1);
    assert_eq!(doubles, 1);
    assert!(moves >= 25, "moves = {moves}");
}
