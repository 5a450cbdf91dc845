#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod model_download;
mod mood;
mod pipeline;
mod types;
mod ui;

use anyhow::Result;
use crossbeam_channel::bounded;
use gpui::Application;
use gpui_component;
use pipeline::DetectorBackend;

fn main() -> Result<()> {
    env_logger::init();

    // One slot per edge: a full queue means the consumer is busy and the
    // frame is dropped, never backlogged.
    let (ui_frame_tx, ui_frame_rx) = bounded(1);
    let (det_frame_tx, det_frame_rx) = bounded(1);
    let (update_tx, update_rx) = bounded(1);

    let detector_backend = DetectorBackend::default();

    Application::new()
        .with_assets(gpui_component_assets::Assets)
        .run(move |app| {
            gpui_component::init(app);

            if let Err(err) = ui::launch_ui(
                app,
                ui_frame_rx,
                update_rx,
                det_frame_rx,
                ui_frame_tx,
                det_frame_tx,
                update_tx,
                detector_backend,
            ) {
                eprintln!("failed to launch ui: {err:?}");
            }
        });

    Ok(())
}
