use std::time::Instant;

pub const POSE_LANDMARK_COUNT: usize = 33;

// MediaPipe pose topology: landmark 23 is the left hip, the reference point
// for movement features.
pub const LEFT_HIP: usize = 23;

#[derive(Clone, Debug)]
pub struct Frame {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: Instant,
}

/// One detected body keypoint in frame-normalized coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub visibility: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32, visibility: f32) -> Self {
        Self {
            x,
            y,
            z,
            visibility,
        }
    }

    #[allow(dead_code)]
    pub fn is_visible(&self, threshold: f32) -> bool {
        self.visibility >= threshold
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoodState {
    Calm,
    Joy,
    Happiness,
    Euphoria,
    Ecstasy,
}

impl MoodState {
    pub const ALL: [MoodState; 5] = [
        MoodState::Calm,
        MoodState::Joy,
        MoodState::Happiness,
        MoodState::Euphoria,
        MoodState::Ecstasy,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            MoodState::Calm => "Ruhe",
            MoodState::Joy => "Freude",
            MoodState::Happiness => "Glück",
            MoodState::Euphoria => "Euphorie",
            MoodState::Ecstasy => "Ekstase",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            MoodState::Calm => "😌 ",
            MoodState::Joy => "🙂 ",
            MoodState::Happiness => "😄 ",
            MoodState::Euphoria => "🤩 ",
            MoodState::Ecstasy => "🤯 ",
        }
    }
}

pub const STATE_COUNT: usize = MoodState::ALL.len();

/// Probability per state in fixed label order, recomputed from scratch on
/// every classifier run.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MoodScores {
    values: [f32; STATE_COUNT],
}

impl MoodScores {
    pub fn new(values: [f32; STATE_COUNT]) -> Self {
        Self { values }
    }

    /// Every returned value lies in [0, 1]; the display side maps it to a
    /// color intensity directly.
    pub fn value(&self, state: MoodState) -> f32 {
        let idx = MoodState::ALL
            .iter()
            .position(|s| s == &state)
            .unwrap_or(0);
        self.values[idx].clamp(0.0, 1.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (MoodState, f32)> + '_ {
        MoodState::ALL
            .iter()
            .zip(self.values.iter())
            .map(|(state, value)| (*state, value.clamp(0.0, 1.0)))
    }

    pub fn dominant(&self) -> (MoodState, f32) {
        self.iter()
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            .unwrap_or((MoodState::Calm, 0.0))
    }

    pub fn display_text(&self) -> String {
        let (state, value) = self.dominant();
        format!(
            "{}{} ({:.0}%)",
            state.emoji(),
            state.display_name(),
            value * 100.0
        )
    }
}

/// One detector-worker result handed to the presentation layer.
#[derive(Clone, Debug)]
pub struct MoodUpdate {
    pub landmarks: Option<Vec<(f32, f32)>>,
    pub confidence: f32,
    pub scores: Option<MoodScores>,
    #[allow(dead_code)]
    pub timestamp: Instant,
}

impl MoodUpdate {
    pub fn no_pose(timestamp: Instant) -> Self {
        Self {
            landmarks: None,
            confidence: 0.0,
            scores: None,
            timestamp,
        }
    }
}
