use std::thread;

use crossbeam_channel::Sender;
use gpui::{AnyElement, Context, IntoElement, ParentElement, Styled, div};
use gpui_component::{ActiveTheme, h_flex, tag::Tag, v_flex};

use super::{AppView, DownloadMessage, DownloadState};
use crate::{
    model_download::{
        ModelDownloadEvent, ModelKind, default_movement_classifier_model_path,
        ensure_movement_classifier_model_ready, ensure_pose_landmarker_model_ready,
    },
    pipeline::DetectorBackend,
};

pub(super) const MODELS_TO_PREPARE: usize = 2;

fn model_label(model: ModelKind) -> &'static str {
    match model {
        ModelKind::PoseLandmarker => "Pose-Modell",
        ModelKind::MovementClassifier => "Bewegungsklassifikator",
    }
}

impl AppView {
    pub(super) fn poll_download_events(&mut self, state: &mut DownloadState) {
        while let Ok(msg) = self.download_rx.try_recv() {
            match msg {
                DownloadMessage::Event(ModelDownloadEvent::AlreadyPresent { model }) => {
                    state.message = format!("{} bereits vorhanden", model_label(model));
                }
                DownloadMessage::Event(ModelDownloadEvent::Started { model, total }) => {
                    state.downloaded = 0;
                    state.total = total;
                    state.message = format!("Lade {}...", model_label(model));
                }
                DownloadMessage::Event(ModelDownloadEvent::Progress {
                    model,
                    downloaded,
                    total,
                }) => {
                    state.downloaded = downloaded;
                    state.total = total;
                    state.message = format!("Lade {}...", model_label(model));
                }
                DownloadMessage::Event(ModelDownloadEvent::Finished { model }) => {
                    state.finished_models += 1;
                    state.message = format!("{} bereit", model_label(model));
                }
                DownloadMessage::Error(err) => {
                    state.error = Some(err);
                    state.message = "Modell-Download fehlgeschlagen".to_string();
                }
            }
        }
    }

    pub(super) fn render_download_view(
        &self,
        state: &DownloadState,
        cx: &mut Context<'_, Self>,
    ) -> AnyElement {
        let theme = cx.theme();
        let bar = progress_bar_string(state.downloaded, state.total);
        let detail = match (state.total, state.finished()) {
            (_, true) => "Fertig".to_string(),
            (Some(total), false) if total > 0 => {
                let percent = (state.downloaded as f64 / total as f64 * 100.0).clamp(0.0, 100.0);
                format!("{percent:.1}%")
            }
            _ => format!("{} KB geladen", state.downloaded / 1024),
        };

        let (status_icon, status_text, status_color) = if state.finished() && state.error.is_none()
        {
            ("✓", "Modelle bereit", theme.success)
        } else if state.error.is_some() {
            ("✗", "Download fehlgeschlagen", theme.accent)
        } else {
            ("⟳", "Modelle werden geladen", theme.foreground)
        };

        let mut container = v_flex()
            .gap_3()
            .p_6()
            .rounded_lg()
            .border_1()
            .border_color(theme.border)
            .bg(theme.group_box)
            .child(
                h_flex()
                    .gap_2()
                    .items_center()
                    .child(
                        div()
                            .text_color(status_color)
                            .font_semibold()
                            .child(format!("{} {}", status_icon, status_text)),
                    )
                    .child(
                        div()
                            .text_sm()
                            .text_color(theme.muted_foreground)
                            .child("Pose-Erkennung und Bewegungsklassifikator"),
                    ),
            )
            .child(
                div()
                    .px_3()
                    .py_2()
                    .rounded_md()
                    .border_1()
                    .border_color(theme.border)
                    .bg(theme.muted)
                    .font_family(theme.mono_font_family.clone())
                    .text_color(theme.foreground)
                    .child(bar),
            )
            .child(
                div()
                    .text_sm()
                    .text_color(theme.muted_foreground)
                    .child(detail),
            )
            .child(
                div()
                    .text_color(theme.foreground)
                    .child(state.message.clone()),
            );

        if let Some(err) = &state.error {
            container = container.child(Tag::danger().rounded_full().child(format!("Fehler: {err}")));
        }

        v_flex()
            .size_full()
            .items_center()
            .justify_center()
            .bg(theme.background)
            .child(container)
            .into_any_element()
    }
}

pub(super) fn spawn_model_downloads(
    backend: DetectorBackend,
    tx: Sender<DownloadMessage>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let forward = |tx: &Sender<DownloadMessage>, event: ModelDownloadEvent| {
            let _ = tx.send(DownloadMessage::Event(event));
        };

        if let Err(err) = ensure_pose_landmarker_model_ready(&backend.model_path(), |event| {
            forward(&tx, event);
        }) {
            log::error!("failed to prepare pose landmarker model: {err:?}");
            let _ = tx.send(DownloadMessage::Error(format!("{err:#}")));
            return;
        }

        let classifier_path = default_movement_classifier_model_path();
        if let Err(err) = ensure_movement_classifier_model_ready(&classifier_path, |event| {
            forward(&tx, event);
        }) {
            log::error!("failed to prepare movement classifier model: {err:?}");
            let _ = tx.send(DownloadMessage::Error(format!("{err:#}")));
        }
    })
}

fn progress_bar_string(downloaded: u64, total: Option<u64>) -> String {
    const BAR_LEN: usize = 30;
    match total {
        Some(total) if total > 0 => {
            let pct = (downloaded as f64 / total as f64).clamp(0.0, 1.0);
            let filled = ((pct * BAR_LEN as f64).round() as usize).min(BAR_LEN);
            let empty = BAR_LEN.saturating_sub(filled);
            format!(
                "[{}{}] {:>5.1}%",
                "=".repeat(filled),
                " ".repeat(empty),
                pct * 100.0
            )
        }
        _ => {
            let spinner_width = ((downloaded / 64) as usize % (BAR_LEN.max(1))) + 1;
            format!(
                "[{:-<width$}] unbekannte Größe",
                ">",
                width = spinner_width.min(BAR_LEN)
            )
        }
    }
}
