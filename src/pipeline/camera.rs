use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use anyhow::{Result, anyhow};
use crossbeam_channel::Sender;
use nokhwa::{
    Camera,
    pixel_format::RgbFormat,
    query,
    utils::{ApiBackend, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType},
};

use super::rgba_converter;
use crate::types::Frame;

// Cap what the detector worker sees; inference latency throttles the
// effective rate further because busy frames are dropped, never queued.
const DETECTOR_TARGET_FPS: u64 = 10;
const DETECTOR_FRAME_INTERVAL: Duration = Duration::from_millis(1_000 / DETECTOR_TARGET_FPS);

// Prefer pixel formats that are widely supported on macOS (the built-in
// cameras often reject YUYV even though Nokhwa reports it).
const PREFERRED_PIXEL_FORMATS: &[FrameFormat] = &[
    FrameFormat::RAWRGB,
    FrameFormat::RAWBGR,
    FrameFormat::GRAY,
    FrameFormat::YUYV,
    FrameFormat::NV12,
    FrameFormat::MJPEG,
];

fn requested_formats() -> [RequestedFormat<'static>; 4] {
    [
        RequestedFormat::with_formats(
            RequestedFormatType::AbsoluteHighestFrameRate,
            PREFERRED_PIXEL_FORMATS,
        ),
        RequestedFormat::with_formats(
            RequestedFormatType::AbsoluteHighestResolution,
            PREFERRED_PIXEL_FORMATS,
        ),
        // Last resort: anything Nokhwa can decode, fastest first, since some
        // drivers reject the very low default rates.
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::None),
    ]
}

#[derive(Clone, Debug)]
pub struct CameraDevice {
    pub index: CameraIndex,
    pub label: String,
}

/// Handle to a running capture thread. The stop flag is the pipeline's
/// cancellation token: once set, no further frames are scheduled.
#[derive(Debug)]
pub struct CameraStream {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl CameraStream {
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for CameraStream {
    fn drop(&mut self) {
        self.shutdown();
    }
}

pub fn available_cameras() -> Result<Vec<CameraDevice>> {
    let devices = query(ApiBackend::Auto)?
        .into_iter()
        .map(|info| CameraDevice {
            label: info.human_name(),
            index: info.index().clone(),
        })
        .collect();
    Ok(devices)
}

fn build_camera(index: CameraIndex) -> Result<Camera> {
    let mut last_err = None;

    for requested in requested_formats() {
        let attempt = Camera::new(index.clone(), requested)
            .and_then(|mut camera| camera.open_stream().map(|()| camera));
        match attempt {
            Ok(camera) => return Ok(camera),
            Err(err) => last_err = Some(err),
        }
    }

    Err(last_err
        .map(Into::into)
        .unwrap_or_else(|| anyhow!("failed to open camera with any supported format")))
}

pub fn start_camera_stream(
    index: CameraIndex,
    ui_tx: Sender<Frame>,
    detector_tx: Sender<Frame>,
) -> Result<CameraStream> {
    // Fail fast before spawning the capture thread.
    build_camera(index.clone())?;

    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = stop.clone();

    let handle = thread::spawn(move || match build_camera(index) {
        Ok(camera) => capture_loop(camera, &stop_flag, ui_tx, detector_tx),
        Err(err) => log::error!("failed to open camera: {err:?}"),
    });

    Ok(CameraStream {
        stop,
        handle: Some(handle),
    })
}

fn capture_loop(
    mut camera: Camera,
    stop: &AtomicBool,
    ui_tx: Sender<Frame>,
    detector_tx: Sender<Frame>,
) {
    let mut next_detector_frame = Instant::now();

    while !stop.load(Ordering::Relaxed) {
        let frame = match grab_rgba_frame(&mut camera) {
            Ok(frame) => frame,
            Err(err) => {
                log::warn!("camera frame unusable: {err:?}");
                continue;
            }
        };

        if frame.timestamp >= next_detector_frame {
            next_detector_frame = frame.timestamp + DETECTOR_FRAME_INTERVAL;
            let _ = detector_tx.try_send(frame.clone());
        }

        // Bounded queue: a busy UI simply misses this frame.
        let _ = ui_tx.try_send(frame);
    }
}

fn grab_rgba_frame(camera: &mut Camera) -> Result<Frame> {
    let raw = camera.frame()?;
    let converted = rgba_converter::convert_camera_frame(&raw)?;

    Ok(Frame {
        rgba: converted.rgba,
        width: converted.width,
        height: converted.height,
        timestamp: Instant::now(),
    })
}
