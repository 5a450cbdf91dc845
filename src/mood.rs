use std::collections::VecDeque;

use ndarray::Array3;
use ort::session::Session;
use thiserror::Error;

use crate::{
    model_download::{
        default_movement_classifier_model_path, ensure_movement_classifier_model_ready,
    },
    types::{LEFT_HIP, Landmark, MoodScores, POSE_LANDMARK_COUNT, STATE_COUNT},
};

pub const WINDOW_LEN: usize = 64;
pub const FEATURE_COUNT: usize = POSE_LANDMARK_COUNT * 2;

/// Flatten one landmark set into hip-relative (x, y) offsets in fixed
/// landmark order. Always yields exactly `FEATURE_COUNT` values; a missing or
/// non-finite coordinate counts as 0 before subtraction. The classifier was
/// trained on exactly this encoding, including the zero fallback.
pub fn hip_relative_features(landmarks: &[Landmark]) -> Vec<f32> {
    let hip = landmarks.get(LEFT_HIP).copied().unwrap_or_default();
    let hip_x = finite_or_zero(hip.x);
    let hip_y = finite_or_zero(hip.y);

    let mut features = Vec::with_capacity(FEATURE_COUNT);
    for idx in 0..POSE_LANDMARK_COUNT {
        let lm = landmarks.get(idx).copied().unwrap_or_default();
        features.push(finite_or_zero(lm.x) - hip_x);
        features.push(finite_or_zero(lm.y) - hip_y);
    }
    features
}

fn finite_or_zero(value: f32) -> f32 {
    if value.is_finite() { value } else { 0.0 }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("feature row has length {got}, expected {expected}")]
pub struct InvalidFeatureLength {
    pub expected: usize,
    pub got: usize,
}

/// Bounded FIFO of the most recent feature rows, oldest first. Only the
/// detector worker touches it.
pub struct SlidingWindow {
    rows: VecDeque<Vec<f32>>,
    capacity: usize,
    width: usize,
}

impl SlidingWindow {
    pub fn new(capacity: usize, width: usize) -> Self {
        Self {
            rows: VecDeque::with_capacity(capacity + 1),
            capacity,
            width,
        }
    }

    pub fn push(&mut self, row: Vec<f32>) -> Result<(), InvalidFeatureLength> {
        if row.len() != self.width {
            return Err(InvalidFeatureLength {
                expected: self.width,
                got: row.len(),
            });
        }

        self.rows.push_back(row);
        while self.rows.len() > self.capacity {
            self.rows.pop_front();
        }
        Ok(())
    }

    pub fn is_full(&self) -> bool {
        self.rows.len() == self.capacity
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &[f32]> {
        self.rows.iter().map(|row| row.as_slice())
    }

    /// Shape `[1, len, width]` in temporal order, ready for the classifier.
    fn to_input(&self) -> Array3<f32> {
        let mut input = Array3::<f32>::zeros((1, self.rows.len(), self.width));
        for (i, row) in self.rows.iter().enumerate() {
            for (j, value) in row.iter().enumerate() {
                input[[0, i, j]] = *value;
            }
        }
        input
    }
}

/// Stable softmax: shift by the maximum before exponentiating.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max_logit = logits.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
    let exps: Vec<f32> = logits.iter().map(|&x| (x - max_logit).exp()).collect();
    let sum_exps: f32 = exps.iter().sum();
    exps.iter().map(|&x| x / sum_exps).collect()
}

fn scores_from_logits(logits: &[f32]) -> MoodScores {
    let probs = softmax(logits);
    let mut values = [0.0f32; STATE_COUNT];
    for (slot, prob) in values.iter_mut().zip(probs.iter()) {
        *slot = *prob;
    }
    MoodScores::new(values)
}

/// Sequence classifier over a sliding window of pose features.
///
/// Owns the only mutable pipeline state: the window and the ONNX session.
/// When the model cannot be loaded the classifier stays inert and `observe`
/// never yields scores; the rest of the app keeps running.
pub struct MoodClassifier {
    window: SlidingWindow,
    session: Option<Session>,
}

impl MoodClassifier {
    pub fn new() -> Self {
        let session = Self::load_model();
        if session.is_none() {
            log::warn!("movement classifier unavailable, mood scores stay empty");
        }

        Self {
            window: SlidingWindow::new(WINDOW_LEN, FEATURE_COUNT),
            session,
        }
    }

    fn load_model() -> Option<Session> {
        let model_path = default_movement_classifier_model_path();

        if let Err(err) = ensure_movement_classifier_model_ready(&model_path, |_evt| {}) {
            log::error!("failed to prepare movement classifier model: {err:#}");
            return None;
        }

        match Session::builder() {
            Ok(builder) => match builder.commit_from_file(&model_path) {
                Ok(session) => {
                    log::info!(
                        "loaded movement classifier from {}",
                        model_path.display()
                    );
                    Some(session)
                }
                Err(err) => {
                    log::error!(
                        "failed to load movement classifier from {}: {err}",
                        model_path.display()
                    );
                    None
                }
            },
            Err(err) => {
                log::error!("failed to create ONNX session builder: {err}");
                None
            }
        }
    }

    /// Feed one frame's landmarks. Returns fresh scores only when the window
    /// is full and inference succeeded; a failed run is logged and skipped so
    /// the previously displayed distribution stays put.
    pub fn observe(&mut self, landmarks: &[Landmark]) -> Option<MoodScores> {
        let features = hip_relative_features(landmarks);
        if let Err(err) = self.window.push(features) {
            log::error!("dropping frame: {err}");
            return None;
        }

        if !self.window.is_full() {
            return None;
        }

        let session = self.session.as_mut()?;
        match run_window_inference(session, &self.window) {
            Ok(logits) => Some(scores_from_logits(&logits)),
            Err(err) => {
                log::warn!("movement inference failed: {err:?}");
                None
            }
        }
    }
}

fn run_window_inference(session: &mut Session, window: &SlidingWindow) -> anyhow::Result<Vec<f32>> {
    use anyhow::{Context, anyhow};
    use ort::value::Tensor;

    let tensor = Tensor::from_array(window.to_input())?;
    let outputs = session
        .run(ort::inputs![tensor])
        .context("failed to run movement classifier session")?;

    if outputs.len() < 1 {
        return Err(anyhow!("movement classifier returned no outputs"));
    }

    let logits = outputs[0].try_extract_array::<f32>()?;
    let flattened: Vec<f32> = logits.iter().copied().collect();
    if flattened.is_empty() {
        return Err(anyhow!("movement classifier returned an empty score vector"));
    }

    Ok(flattened)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MoodState;

    fn landmark_grid(offset: f32) -> Vec<Landmark> {
        (0..POSE_LANDMARK_COUNT)
            .map(|i| {
                Landmark::new(
                    offset + i as f32 * 0.01,
                    offset + i as f32 * 0.02,
                    0.0,
                    1.0,
                )
            })
            .collect()
    }

    fn assert_close(a: f32, b: f32, tol: f32) {
        assert!((a - b).abs() < tol, "{a} vs {b}");
    }

    #[test]
    fn feature_length_is_fixed() {
        let features = hip_relative_features(&landmark_grid(0.2));
        assert_eq!(features.len(), FEATURE_COUNT);
    }

    #[test]
    fn features_ignore_uniform_translation() {
        let base = hip_relative_features(&landmark_grid(0.1));
        let shifted = hip_relative_features(&landmark_grid(0.47));
        for (a, b) in base.iter().zip(shifted.iter()) {
            assert_close(*a, *b, 1e-5);
        }
    }

    #[test]
    fn missing_coordinates_become_zero() {
        let mut landmarks = landmark_grid(0.3);
        landmarks[5].x = f32::NAN;
        let features = hip_relative_features(&landmarks);

        let hip_x = landmarks[LEFT_HIP].x;
        assert_close(features[10], -hip_x, 1e-6);
        assert!(features.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn short_landmark_sets_pad_with_zeros() {
        let landmarks: Vec<Landmark> = landmark_grid(0.2).into_iter().take(10).collect();
        let features = hip_relative_features(&landmarks);

        // No hip in a 10-landmark set, so the reference degrades to the
        // origin and absent landmarks contribute plain zeros.
        assert_eq!(features.len(), FEATURE_COUNT);
        assert_close(features[0], landmarks[0].x, 1e-6);
        assert!(features[20..].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn window_rejects_wrong_width() {
        let mut window = SlidingWindow::new(WINDOW_LEN, FEATURE_COUNT);
        let err = window.push(vec![0.0; FEATURE_COUNT - 1]).unwrap_err();
        assert_eq!(
            err,
            InvalidFeatureLength {
                expected: FEATURE_COUNT,
                got: FEATURE_COUNT - 1,
            }
        );
        assert_eq!(window.len(), 0);
    }

    #[test]
    fn window_fills_then_evicts_oldest_first() {
        let mut window = SlidingWindow::new(WINDOW_LEN, FEATURE_COUNT);

        for i in 0..WINDOW_LEN {
            assert!(!window.is_full());
            window.push(vec![i as f32; FEATURE_COUNT]).unwrap();
        }
        assert!(window.is_full());
        assert_eq!(window.len(), WINDOW_LEN);

        // The 65th push evicts the very first row and keeps pushes 2..=65 in
        // order.
        window.push(vec![WINDOW_LEN as f32; FEATURE_COUNT]).unwrap();
        assert_eq!(window.len(), WINDOW_LEN);

        let first_values: Vec<f32> = window.iter().map(|row| row[0]).collect();
        assert_eq!(first_values[0], 1.0);
        assert_eq!(first_values[WINDOW_LEN - 1], WINDOW_LEN as f32);
        for pair in first_values.windows(2) {
            assert_eq!(pair[1] - pair[0], 1.0);
        }
    }

    #[test]
    fn window_input_keeps_temporal_order() {
        let mut window = SlidingWindow::new(4, 3);
        for i in 0..5 {
            window.push(vec![i as f32, 0.0, 0.0]).unwrap();
        }

        let input = window.to_input();
        assert_eq!(input.shape(), &[1, 4, 3]);
        assert_eq!(input[[0, 0, 0]], 1.0);
        assert_eq!(input[[0, 3, 0]], 4.0);
    }

    #[test]
    fn softmax_sums_to_one() {
        for logits in [
            vec![1.0, 2.0, 3.0, 4.0, 5.0],
            vec![-7.5, 0.0, 3.25, -1.0, 12.0],
            vec![1000.0, 1000.5, 999.0],
        ] {
            let probs = softmax(&logits);
            let sum: f32 = probs.iter().sum();
            assert_close(sum, 1.0, 1e-6);
            assert!(probs.iter().all(|p| (0.0..=1.0).contains(p)));
        }
    }

    #[test]
    fn softmax_is_shift_invariant() {
        let logits = vec![0.3, -2.0, 5.5, 1.1, -0.4];
        let shifted: Vec<f32> = logits.iter().map(|x| x + 37.0).collect();

        let a = softmax(&logits);
        let b = softmax(&shifted);
        for (x, y) in a.iter().zip(b.iter()) {
            assert_close(*x, *y, 1e-6);
        }
    }

    #[test]
    fn softmax_single_element_is_certain() {
        assert_eq!(softmax(&[42.0]), vec![1.0]);
    }

    #[test]
    fn softmax_equal_inputs_are_uniform() {
        let probs = softmax(&[3.3; 5]);
        for p in probs {
            assert_close(p, 0.2, 1e-6);
        }
    }

    #[test]
    fn softmax_matches_reference_distribution() {
        let probs = softmax(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let expected = [0.0117, 0.0317, 0.0861, 0.2341, 0.6364];
        for (p, e) in probs.iter().zip(expected.iter()) {
            assert_close(*p, *e, 1e-3);
        }
        for pair in probs.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn scores_pick_dominant_state_in_label_order() {
        let scores = scores_from_logits(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let (state, value) = scores.dominant();
        assert_eq!(state, MoodState::Ecstasy);
        assert!(value > 0.6);
        assert_close(scores.value(MoodState::Calm), 0.0117, 1e-3);
    }
}
