use std::{path::PathBuf, thread};

use anyhow::{Context, Result, anyhow};
use crossbeam_channel::{Receiver, Sender};
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;

use super::{
    PoseEngine,
    common::{self, PoseDetection},
    run_worker_loop,
};
use crate::{
    model_download::ensure_pose_landmarker_model_ready,
    types::{Frame, Landmark, MoodUpdate},
};

// Below this the landmarker is guessing; treat the frame as empty.
const MIN_POSE_SCORE: f32 = 0.5;

pub fn start_worker(
    model_path: PathBuf,
    frame_rx: Receiver<Frame>,
    update_tx: Sender<MoodUpdate>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        if let Err(err) = ensure_pose_landmarker_model_ready(&model_path, |_evt| {}) {
            log::error!(
                "failed to prepare pose landmarker model at {}: {err:?}",
                model_path.display()
            );
            return;
        }

        let engine = match OrtEngine::new(&model_path) {
            Ok(engine) => {
                log::info!("pose ORT backend ready using {}", model_path.display());
                engine
            }
            Err(err) => {
                log::error!("failed to load ORT pose landmarker model: {err:?}");
                return;
            }
        };

        run_worker_loop(engine, frame_rx, update_tx);
    })
}

struct OrtEngine {
    session: Session,
}

impl OrtEngine {
    fn new(model_path: &PathBuf) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(2)?
            .commit_from_file(model_path)
            .with_context(|| format!("failed to load ORT session from {}", model_path.display()))?;

        Ok(Self { session })
    }
}

impl PoseEngine for OrtEngine {
    fn detect(&mut self, frame: &Frame) -> Result<Option<PoseDetection>> {
        let (input, letterbox) = common::prepare_frame(frame)?;
        let tensor = Tensor::from_array(input)?;
        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .context("failed to run ORT session")?;

        if outputs.len() < 1 {
            return Err(anyhow!("model returned no outputs"));
        }

        let coords = outputs[0].try_extract_array::<f32>()?;
        let flattened: Vec<f32> = coords.iter().copied().collect();
        let raw = common::decode_raw_landmarks(&flattened)?;

        let score = if outputs.len() > 1 {
            outputs[1]
                .try_extract_array::<f32>()
                .ok()
                .and_then(|arr| arr.iter().next().copied())
                .unwrap_or(0.0)
                .clamp(0.0, 1.0)
        } else {
            0.0
        };

        if score < MIN_POSE_SCORE {
            return Ok(None);
        }

        let mut landmarks = Vec::with_capacity(raw.len());
        let mut projected = Vec::with_capacity(raw.len());
        for [x, y, z, visibility, _presence] in raw {
            let (px, py) = letterbox.to_frame_px(x, y);
            projected.push((px, py));
            landmarks.push(Landmark::new(
                px / letterbox.orig_w.max(1) as f32,
                py / letterbox.orig_h.max(1) as f32,
                z / common::INPUT_SIZE as f32,
                common::sigmoid(visibility),
            ));
        }

        Ok(Some(PoseDetection {
            landmarks,
            projected,
            score,
        }))
    }
}
