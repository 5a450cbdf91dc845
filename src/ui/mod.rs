use std::{mem, sync::Arc, thread};

use crossbeam_channel::{Receiver, Sender, unbounded};
use gpui::{
    App, AppContext, Context, Render, RenderImage, TitlebarOptions, Window, WindowOptions,
};
use gpui_component::Root;

use crate::{
    pipeline::{CameraDevice, CameraStream, DetectorBackend, start_detector},
    types::{Frame, MoodScores, MoodUpdate},
};

mod camera_view;
mod download;
mod main_view;
mod render_util;

const CAMERA_CARD_WIDTH: f32 = 720.0;
const CAMERA_MIN_HEIGHT: f32 = 240.0;
const CAMERA_MAX_HEIGHT: f32 = 540.0;
const DEFAULT_CAMERA_RATIO: f32 = 16.0 / 9.0;

pub fn launch_ui(
    app: &mut App,
    frame_rx: Receiver<Frame>,
    update_rx: Receiver<MoodUpdate>,
    det_frame_rx: Receiver<Frame>,
    frame_tx: Sender<Frame>,
    det_frame_tx: Sender<Frame>,
    update_tx: Sender<MoodUpdate>,
    detector_backend: DetectorBackend,
) -> gpui::Result<()> {
    let window_options = WindowOptions {
        titlebar: Some(TitlebarOptions {
            title: Some("Mood Mirror".into()),
            appears_transparent: false,
            traffic_light_position: None,
        }),
        ..Default::default()
    };

    app.open_window(window_options, move |window, app| {
        let view = app.new(|_| {
            AppView::new(
                frame_rx,
                update_rx,
                det_frame_rx,
                frame_tx,
                det_frame_tx,
                update_tx,
                detector_backend,
            )
        });
        app.new(|cx| Root::new(view, window, cx))
    })?;

    Ok(())
}

struct AppView {
    screen: Screen,
    frame_rx: Option<Receiver<Frame>>,
    update_rx: Option<Receiver<MoodUpdate>>,
    det_frame_rx: Option<Receiver<Frame>>,
    frame_tx: Sender<Frame>,
    det_frame_tx: Sender<Frame>,
    update_tx: Option<Sender<MoodUpdate>>,
    detector_backend: DetectorBackend,
    detector_handle: Option<thread::JoinHandle<()>>,
    camera_stream: Option<CameraStream>,
    available_cameras: Vec<CameraDevice>,
    selected_camera_idx: Option<usize>,
    camera_error: Option<String>,
    latest_frame: Option<Frame>,
    latest_update: Option<MoodUpdate>,
    latest_scores: Option<MoodScores>,
    latest_image: Option<Arc<RenderImage>>,
    download_rx: Receiver<DownloadMessage>,
    _download_handle: thread::JoinHandle<()>,
    camera_picker_open: bool,
}

enum Screen {
    Camera(CameraState),
    Download(DownloadState),
    Main,
}

enum CameraState {
    Unavailable {
        message: String,
    },
    Selection {
        options: Vec<CameraDevice>,
        selected: usize,
        start_error: Option<String>,
    },
    Ready,
}

struct DownloadState {
    downloaded: u64,
    total: Option<u64>,
    message: String,
    error: Option<String>,
    finished_models: usize,
}

impl DownloadState {
    fn new() -> Self {
        Self {
            downloaded: 0,
            total: None,
            message: "Modelle werden vorbereitet...".to_string(),
            error: None,
            finished_models: 0,
        }
    }

    fn finished(&self) -> bool {
        self.finished_models >= download::MODELS_TO_PREPARE
    }
}

enum DownloadMessage {
    Event(crate::model_download::ModelDownloadEvent),
    Error(String),
}

impl AppView {
    fn new(
        frame_rx: Receiver<Frame>,
        update_rx: Receiver<MoodUpdate>,
        det_frame_rx: Receiver<Frame>,
        frame_tx: Sender<Frame>,
        det_frame_tx: Sender<Frame>,
        update_tx: Sender<MoodUpdate>,
        detector_backend: DetectorBackend,
    ) -> Self {
        let (download_tx, download_rx) = unbounded();
        let download_handle =
            download::spawn_model_downloads(detector_backend.clone(), download_tx);
        let (initial_camera_state, available_cameras) = Self::initial_camera_state();
        let selected_camera_idx = if available_cameras.is_empty() {
            None
        } else {
            Some(0)
        };

        Self {
            screen: Screen::Camera(initial_camera_state),
            frame_rx: Some(frame_rx),
            update_rx: Some(update_rx),
            det_frame_rx: Some(det_frame_rx),
            frame_tx,
            det_frame_tx,
            update_tx: Some(update_tx),
            detector_backend,
            detector_handle: None,
            camera_stream: None,
            available_cameras,
            selected_camera_idx,
            camera_error: None,
            latest_frame: None,
            latest_update: None,
            latest_scores: None,
            latest_image: None,
            download_rx,
            _download_handle: download_handle,
            camera_picker_open: false,
        }
    }

    fn start_detector_if_needed(&mut self) {
        if self.detector_handle.is_some() {
            return;
        }

        let Some(frame_rx) = self.det_frame_rx.take() else {
            log::warn!("missing frame receiver for detector");
            return;
        };
        let Some(update_tx) = self.update_tx.take() else {
            log::warn!("missing update sender for detector");
            return;
        };

        let backend = self.detector_backend.clone();
        let handle = start_detector(backend, frame_rx, update_tx);
        self.detector_handle = Some(handle);
    }
}

impl Render for AppView {
    fn render(
        &mut self,
        window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) -> impl gpui::IntoElement {
        cx.defer_in(window, |_, _, cx| {
            cx.notify();
        });

        let mut screen = mem::replace(&mut self.screen, Screen::Main);
        let view = match screen {
            Screen::Camera(mut state) => {
                let view = self.render_camera_view(&mut state, cx);
                match state {
                    CameraState::Ready => {
                        screen = Screen::Download(DownloadState::new());
                    }
                    _ => {
                        screen = Screen::Camera(state);
                    }
                }
                view
            }
            Screen::Download(mut state) => {
                self.poll_download_events(&mut state);
                let should_switch = state.finished() && state.error.is_none();
                let view = self.render_download_view(&state, cx);
                if should_switch {
                    self.start_detector_if_needed();
                    screen = Screen::Main;
                } else {
                    screen = Screen::Download(state);
                }
                view
            }
            Screen::Main => {
                screen = Screen::Main;
                self.render_main(window, cx)
            }
        };
        self.screen = screen;
        view
    }
}
