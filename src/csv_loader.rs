use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, ensure, Context, Result};
use csv::{ReaderBuilder, StringRecord, Writer};

use crate::types::{DetectorFrame, HandFrame, Handedness, Landmark, Seconds, NUM_LANDMARKS};

/// Cabecera de las sesiones grabadas
pub const CSV_HEADER: [&str; 10] = [
    "frame",
    "timestamp",
    "hand",
    "handedness",
    "confidence",
    "landmark",
    "x",
    "y",
    "z",
    "landmark_confidence",
];

struct PendingHand {
    handedness: Handedness,
    confidence: f32,
    landmarks: [Option<Landmark>; NUM_LANDMARKS],
    /// None = celda vacía (el detector no la reportó)
    landmark_confidence: [Option<f32>; NUM_LANDMARKS],
}

#[derive(Default)]
struct PendingFrame {
    timestamp: Seconds,
    /// Por índice de mano dentro del frame: dos manos pueden compartir lateralidad
    hands: BTreeMap<usize, PendingHand>,
}

fn field<T: std::str::FromStr>(record: &StringRecord, col: usize, row: usize) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    record[col].parse().with_context(|| {
        format!(
            "{} inválido en fila {}: {:?}",
            CSV_HEADER[col],
            row,
            &record[col]
        )
    })
}

/// Carga una sesión de landmarks desde un CSV con el formato de `CSV_HEADER`
/// (una fila por landmark). Un frame sin mano se graba como una fila con
/// handedness "none".
pub fn load_frames_from_csv(path: impl AsRef<Path>) -> Result<Vec<DetectorFrame>> {
    let path = path.as_ref();
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("No se pudo abrir el CSV {:?}", path))?;

    let mut frames: BTreeMap<usize, PendingFrame> = BTreeMap::new();

    for (row_idx, result) in reader.records().enumerate() {
        let row = row_idx + 2; // cabecera = fila 1
        let record = result.with_context(|| format!("Fila {} inválida en {:?}", row, path))?;
        if record.len() < 4 {
            bail!(
                "La fila {} tiene {} columnas, se esperaban {}",
                row,
                record.len(),
                CSV_HEADER.len()
            );
        }

        let frame_idx: usize = field(&record, 0, row)?;
        let timestamp: Seconds = field(&record, 1, row)?;

        let frame = frames.entry(frame_idx).or_insert_with(|| PendingFrame {
            timestamp,
            ..Default::default()
        });
        ensure!(
            frame.timestamp == timestamp,
            "Frame {} con timestamps distintos ({} y {}) en fila {}",
            frame_idx,
            frame.timestamp,
            timestamp,
            row
        );

        let label = record[3].to_ascii_lowercase();
        if label == "none" || label.is_empty() {
            continue;
        }
        let handedness = Handedness::parse(&label)
            .with_context(|| format!("handedness {:?} desconocido en fila {}", &record[3], row))?;
        if record.len() < CSV_HEADER.len() {
            bail!(
                "La fila {} tiene {} columnas, se esperaban {}",
                row,
                record.len(),
                CSV_HEADER.len()
            );
        }

        let hand_idx: usize = field(&record, 2, row)?;
        let confidence: f32 = field(&record, 4, row)?;
        let landmark: usize = field(&record, 5, row)?;
        ensure!(
            landmark < NUM_LANDMARKS,
            "Landmark {} fuera de rango (fila {})",
            landmark,
            row
        );
        let x: f32 = field(&record, 6, row)?;
        let y: f32 = field(&record, 7, row)?;
        let z: f32 = field(&record, 8, row)?;
        let landmark_confidence: Option<f32> = if record[9].is_empty() {
            None
        } else {
            Some(field(&record, 9, row)?)
        };

        let hand = frame.hands.entry(hand_idx).or_insert_with(|| PendingHand {
            handedness,
            confidence,
            landmarks: [None; NUM_LANDMARKS],
            landmark_confidence: [None; NUM_LANDMARKS],
        });
        ensure!(
            hand.handedness == handedness,
            "La mano {} del frame {} cambia de lateralidad en fila {}",
            hand_idx,
            frame_idx,
            row
        );
        if hand.landmarks[landmark].replace(Landmark::new(x, y, z)).is_some() {
            bail!(
                "Landmark {} repetido para la mano {} del frame {} (fila {})",
                landmark,
                hand_idx,
                frame_idx,
                row
            );
        }
        hand.landmark_confidence[landmark] = landmark_confidence;
    }

    ensure!(!frames.is_empty(), "El CSV {:?} no contiene datos", path);

    let mut out = Vec::with_capacity(frames.len());
    let mut last_timestamp = Seconds::NEG_INFINITY;
    for (frame_idx, pending) in frames {
        ensure!(
            pending.timestamp > last_timestamp,
            "Timestamps no crecientes en el frame {}",
            frame_idx
        );
        last_timestamp = pending.timestamp;

        let mut hands = Vec::with_capacity(pending.hands.len());
        for (hand_idx, hand) in pending.hands {
            let mut landmarks = [Landmark::default(); NUM_LANDMARKS];
            for (idx, slot) in hand.landmarks.into_iter().enumerate() {
                landmarks[idx] = slot.with_context(|| {
                    format!(
                        "Falta el landmark {} de la mano {} en el frame {}",
                        idx, hand_idx, frame_idx
                    )
                })?;
            }

            // todas o ninguna: una confianza parcial no tiene lectura posible
            let reported = hand.landmark_confidence.iter().filter(|c| c.is_some()).count();
            let landmark_confidence: Vec<f32> = match reported {
                0 => Vec::new(),
                NUM_LANDMARKS => hand.landmark_confidence.iter().flatten().copied().collect(),
                n => bail!(
                    "La mano {} del frame {} trae confianza en {} de {} landmarks",
                    hand_idx,
                    frame_idx,
                    n,
                    NUM_LANDMARKS
                ),
            };

            let mut frame =
                HandFrame::new(landmarks, hand.handedness, hand.confidence, pending.timestamp);
            frame.landmark_confidence = landmark_confidence;
            hands.push(frame);
        }
        out.push(DetectorFrame {
            timestamp: pending.timestamp,
            hands,
        });
    }

    Ok(out)
}

/// Graba frames en el mismo formato que lee `load_frames_from_csv`
pub fn save_frames_to_csv(path: impl AsRef<Path>, frames: &[DetectorFrame]) -> Result<()> {
    let path = path.as_ref();
    let mut writer =
        Writer::from_path(path).with_context(|| format!("No se pudo crear el CSV {:?}", path))?;
    writer.write_record(CSV_HEADER)?;

    for (frame_idx, frame) in frames.iter().enumerate() {
        let idx = frame_idx.to_string();
        let ts = frame.timestamp.to_string();
        if frame.hands.is_empty() {
            writer.write_record([idx.as_str(), ts.as_str(), "", "none", "", "", "", "", "", ""])?;
            continue;
        }
        for (hand_idx, hand) in frame.hands.iter().enumerate() {
            let hand_idx = hand_idx.to_string();
            let confidence = hand.confidence.to_string();
            for (lm_idx, lm) in hand.landmarks.iter().enumerate() {
                let lm_confidence = hand
                    .landmark_confidence
                    .get(lm_idx)
                    .map(|c| c.to_string())
                    .unwrap_or_default();
                writer.write_record([
                    idx.clone(),
                    ts.clone(),
                    hand_idx.clone(),
                    hand.handedness.as_str().to_string(),
                    confidence.clone(),
                    lm_idx.to_string(),
                    lm.x.to_string(),
                    lm.y.to_string(),
                    lm.z.to_string(),
                    lm_confidence,
                ])?;
            }
        }
    }
    writer
        .flush()
        .with_context(|| format!("No se pudo escribir {:?}", path))?;
    Ok(())
}
