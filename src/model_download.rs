use std::{
    fs,
    io::{Read, Write},
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::Client;

const POSE_LANDMARKER_MODEL_FILENAME: &str = "pose_landmarker_full.onnx";
const MOVEMENT_CLASSIFIER_MODEL_FILENAME: &str = "movement_classifier.onnx";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelKind {
    PoseLandmarker,
    MovementClassifier,
}

impl ModelKind {
    fn label(self) -> &'static str {
        match self {
            ModelKind::PoseLandmarker => "pose landmarker",
            ModelKind::MovementClassifier => "movement classifier",
        }
    }

    fn url(self) -> &'static str {
        match self {
            ModelKind::PoseLandmarker => {
                "https://raw.githubusercontent.com/mood-mirror/mood-mirror/refs/heads/main/models/pose_landmarker_full.onnx"
            }
            ModelKind::MovementClassifier => {
                "https://raw.githubusercontent.com/mood-mirror/mood-mirror/refs/heads/main/models/movement_classifier.onnx"
            }
        }
    }

    // The classifier used to ship next to the demo page; honor a local copy
    // before going to the network.
    fn bundled_path(self) -> Option<PathBuf> {
        match self {
            ModelKind::PoseLandmarker => None,
            ModelKind::MovementClassifier => {
                Some(Path::new("movement_classifier").join(MOVEMENT_CLASSIFIER_MODEL_FILENAME))
            }
        }
    }
}

pub fn default_pose_landmarker_model_path() -> PathBuf {
    PathBuf::from("models").join(POSE_LANDMARKER_MODEL_FILENAME)
}

pub fn default_movement_classifier_model_path() -> PathBuf {
    PathBuf::from("models").join(MOVEMENT_CLASSIFIER_MODEL_FILENAME)
}

#[derive(Clone, Debug)]
pub enum ModelDownloadEvent {
    AlreadyPresent {
        model: ModelKind,
    },
    Started {
        model: ModelKind,
        total: Option<u64>,
    },
    Progress {
        model: ModelKind,
        downloaded: u64,
        total: Option<u64>,
    },
    Finished {
        model: ModelKind,
    },
}

pub fn ensure_pose_landmarker_model_ready<F>(model_path: &Path, on_event: F) -> anyhow::Result<()>
where
    F: FnMut(ModelDownloadEvent),
{
    ensure_model_ready(ModelKind::PoseLandmarker, model_path, on_event)
}

pub fn ensure_movement_classifier_model_ready<F>(
    model_path: &Path,
    on_event: F,
) -> anyhow::Result<()>
where
    F: FnMut(ModelDownloadEvent),
{
    ensure_model_ready(ModelKind::MovementClassifier, model_path, on_event)
}

fn ensure_model_ready<F>(model: ModelKind, model_path: &Path, mut on_event: F) -> anyhow::Result<()>
where
    F: FnMut(ModelDownloadEvent),
{
    if model_path.exists() {
        on_event(ModelDownloadEvent::AlreadyPresent { model });
        on_event(ModelDownloadEvent::Finished { model });
        return Ok(());
    }

    if let Some(parent) = model_path.parent() {
        fs::create_dir_all(parent).with_context(|| {
            format!(
                "failed to create {} model directory {}",
                model.label(),
                parent.display()
            )
        })?;
    }

    if let Some(bundled) = model.bundled_path() {
        if bundled.exists() {
            on_event(ModelDownloadEvent::Started { model, total: None });
            fs::copy(&bundled, model_path).with_context(|| {
                format!(
                    "failed to copy bundled {} model from {} to {}",
                    model.label(),
                    bundled.display(),
                    model_path.display()
                )
            })?;
            on_event(ModelDownloadEvent::Finished { model });
            return Ok(());
        }
    }

    let mut progress: Option<ProgressBar> = None;
    fetch_to_path(model, model_path, &mut |event| {
        match &event {
            ModelDownloadEvent::Started { total, .. } => {
                progress = Some(create_progress_bar(*total));
            }
            ModelDownloadEvent::Progress { downloaded, .. } => {
                if let Some(pb) = progress.as_ref() {
                    pb.set_position(*downloaded);
                }
            }
            ModelDownloadEvent::Finished { .. } => {
                if let Some(pb) = progress.take() {
                    pb.finish_with_message(format!("{} model ready", model.label()));
                }
            }
            ModelDownloadEvent::AlreadyPresent { .. } => {}
        }
        on_event(event);
    })
    .with_context(|| {
        format!(
            "failed to download {} model to {}",
            model.label(),
            model_path.display()
        )
    })
}

fn fetch_to_path<F>(model: ModelKind, dest: &Path, on_event: &mut F) -> anyhow::Result<()>
where
    F: FnMut(ModelDownloadEvent),
{
    let url = model.url();
    log::info!(
        "downloading {} model from {url} to {}",
        model.label(),
        dest.display()
    );

    let client = Client::new();
    let mut response = client
        .get(url)
        .send()
        .context("failed to start model download")?
        .error_for_status()
        .context("model download returned error status")?;

    let total = response.content_length();
    on_event(ModelDownloadEvent::Started { model, total });

    let tmp_path = dest.with_extension("download");
    let mut file = fs::File::create(&tmp_path)
        .with_context(|| format!("failed to create {}", tmp_path.display()))?;

    let mut downloaded: u64 = 0;
    let mut chunk = [0u8; 32 * 1024];
    loop {
        let bytes_read = response
            .read(&mut chunk)
            .context("failed while reading model bytes")?;
        if bytes_read == 0 {
            break;
        }

        file.write_all(&chunk[..bytes_read])
            .context("failed while writing model to disk")?;
        downloaded += bytes_read as u64;
        on_event(ModelDownloadEvent::Progress {
            model,
            downloaded,
            total,
        });
    }

    file.sync_all()
        .context("failed to flush downloaded model to disk")?;

    // Only a complete download may land at the final path.
    fs::rename(&tmp_path, dest).with_context(|| {
        format!(
            "failed to move temp model {} into place at {}",
            tmp_path.display(),
            dest.display()
        )
    })?;

    on_event(ModelDownloadEvent::Finished { model });
    Ok(())
}

fn create_progress_bar(total_size: Option<u64>) -> ProgressBar {
    match total_size {
        Some(total) if total > 0 => {
            let pb = ProgressBar::new(total);
            let style = ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({eta})",
            )
            .unwrap()
            .progress_chars("=>-");
            pb.set_style(style);
            pb
        }
        _ => {
            let pb = ProgressBar::new_spinner();
            let style = ProgressStyle::with_template("{spinner:.green} downloading model").unwrap();
            pb.set_style(style);
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        }
    }
}
