mod common;
mod ort;

use std::{path::PathBuf, thread};

use crossbeam_channel::{Receiver, Sender};

use crate::{
    model_download::default_pose_landmarker_model_path,
    mood::MoodClassifier,
    types::{Frame, MoodUpdate},
};

use self::common::PoseDetection;

pub(crate) trait PoseEngine: Send + 'static {
    fn detect(&mut self, frame: &Frame) -> anyhow::Result<Option<PoseDetection>>;
}

fn run_worker_loop<E: PoseEngine>(
    mut engine: E,
    frame_rx: Receiver<Frame>,
    update_tx: Sender<MoodUpdate>,
) {
    let mut classifier = MoodClassifier::new();

    while let Some(frame) = recv_latest_frame(&frame_rx) {
        match engine.detect(&frame) {
            Ok(Some(detection)) => {
                let scores = classifier.observe(&detection.landmarks);
                let update = MoodUpdate {
                    landmarks: Some(detection.projected),
                    confidence: detection.score,
                    scores,
                    timestamp: frame.timestamp,
                };
                let _ = update_tx.try_send(update);
            }
            Ok(None) => {
                // No pose in this frame: the window and the last displayed
                // distribution stay untouched, only the overlay clears.
                let _ = update_tx.try_send(MoodUpdate::no_pose(frame.timestamp));
            }
            Err(err) => {
                log::warn!("pose detection failed: {err:?}");
            }
        }
    }
}

fn recv_latest_frame(frame_rx: &Receiver<Frame>) -> Option<Frame> {
    let mut frame = frame_rx.recv().ok()?;
    while let Ok(newer) = frame_rx.try_recv() {
        frame = newer;
    }
    Some(frame)
}

#[derive(Clone, Debug)]
pub struct DetectorBackend {
    model_path: PathBuf,
}

impl DetectorBackend {
    pub fn model_path(&self) -> PathBuf {
        self.model_path.clone()
    }

    pub fn label(&self) -> &'static str {
        "ort"
    }
}

impl Default for DetectorBackend {
    fn default() -> Self {
        DetectorBackend {
            model_path: default_pose_landmarker_model_path(),
        }
    }
}

pub fn start_detector(
    backend: DetectorBackend,
    frame_rx: Receiver<Frame>,
    update_tx: Sender<MoodUpdate>,
) -> thread::JoinHandle<()> {
    log::info!("starting pose backend: {}", backend.label());

    ort::start_worker(backend.model_path(), frame_rx, update_tx)
}
