use gpui::{
    AnyElement, Context, InteractiveElement, IntoElement, ParentElement, SharedString, Styled, div,
    px,
};
use gpui::prelude::FluentBuilder;
use gpui_component::{
    ActiveTheme, h_flex,
    button::{Button, ButtonVariants},
    v_flex,
};

use super::{AppView, CameraState, DownloadState, Screen};
use crate::pipeline::{self, CameraDevice};

impl AppView {
    /// One picker for both entry points: the startup selection screen and the
    /// in-session switch panel. They differ only in chrome and in what a
    /// click does.
    fn render_camera_picker(
        &mut self,
        cameras: Vec<CameraDevice>,
        selected: Option<usize>,
        error_msg: Option<String>,
        in_session: bool,
        cx: &mut Context<'_, Self>,
    ) -> AnyElement {
        let mut title_row = h_flex().justify_between().items_center().w_full().mb_2().child(
            h_flex()
                .gap_2()
                .items_center()
                .child(div().text_base().text_color(gpui::rgb(0xa5b4fc)).child("◉"))
                .child(
                    div()
                        .text_sm()
                        .font_semibold()
                        .text_color(gpui::rgb(0xe2e8f0))
                        .child("Kamera auswählen"),
                ),
        );

        if in_session {
            title_row = title_row.child(
                Button::new(SharedString::from("camera-picker-close"))
                    .label("×")
                    .ghost()
                    .on_click(cx.listener(|this, _, _, cx| {
                        this.camera_picker_open = false;
                        cx.notify();
                    })),
            );
        }

        let mut picker = v_flex()
            .gap_2()
            .p_4()
            .rounded_xl()
            .bg(gpui::rgba(0x0f1419f5))
            .border_1()
            .border_color(gpui::rgba(0x2d3748ff))
            .shadow_lg()
            .child(title_row);

        for (idx, device) in cameras.into_iter().enumerate() {
            picker = picker.child(camera_option_row(
                device.label,
                selected == Some(idx),
                idx,
                in_session,
                cx,
            ));
        }

        if let Some(err) = error_msg {
            picker = picker.child(error_banner(err));
        }

        if !in_session {
            picker = picker.child(
                Button::new(SharedString::from("camera-confirm"))
                    .primary()
                    .label("✓ Kamera verwenden")
                    .w_full()
                    .mt_2()
                    .on_click(cx.listener(|this, _, _, cx| {
                        this.start_selected_camera();
                        cx.notify();
                    })),
            );
        }

        picker.into_any_element()
    }

    pub(super) fn render_camera_picker_main(&mut self, cx: &mut Context<'_, Self>) -> AnyElement {
        let cameras = self.available_cameras.clone();
        let selected = self.selected_camera_idx;
        let error = self.camera_error.clone();
        self.render_camera_picker(cameras, selected, error, true, cx)
    }

    pub(super) fn initial_camera_state() -> (CameraState, Vec<CameraDevice>) {
        match pipeline::available_cameras() {
            Ok(cameras) if cameras.is_empty() => (
                CameraState::Unavailable {
                    message: "Keine Kamera verfügbar".to_string(),
                },
                Vec::new(),
            ),
            Ok(cameras) => (
                CameraState::Selection {
                    options: cameras.clone(),
                    selected: 0,
                    start_error: None,
                },
                cameras,
            ),
            Err(err) => {
                log::error!("failed to enumerate cameras: {err:?}");
                (
                    CameraState::Unavailable {
                        message: format!("Keine Kamera verfügbar: {err:#}"),
                    },
                    Vec::new(),
                )
            }
        }
    }

    pub(super) fn render_camera_view(
        &mut self,
        state: &mut CameraState,
        cx: &mut Context<'_, Self>,
    ) -> AnyElement {
        match state {
            CameraState::Unavailable { message } => {
                let theme = cx.theme();
                v_flex()
                    .gap_2()
                    .p_4()
                    .rounded_lg()
                    .border_1()
                    .border_color(theme.border)
                    .bg(theme.group_box)
                    .child(
                        div()
                            .text_sm()
                            .text_color(theme.accent)
                            .font_semibold()
                            .child("⚠ Keine Kamera verfügbar"),
                    )
                    .child(
                        div()
                            .text_xs()
                            .text_color(theme.muted_foreground)
                            .child("Bitte Kameraverbindung und Berechtigungen prüfen"),
                    )
                    .child(div().text_color(theme.foreground).child(message.clone()))
                    .into_any_element()
            }
            CameraState::Selection {
                options,
                selected,
                start_error,
            } => {
                // A single camera needs no dialog; start it right away.
                if options.len() == 1 && self.camera_stream.is_none() && start_error.is_none() {
                    match self.start_camera_for_device(&options[0]) {
                        Ok(()) => {
                            *state = CameraState::Ready;
                            return div()
                                .child(div().child("Kamera wird gestartet..."))
                                .into_any_element();
                        }
                        Err(err) => {
                            *start_error = Some(format!("Kamerastart fehlgeschlagen: {err}"));
                        }
                    }
                }

                let options = options.clone();
                let selected = Some(*selected);
                let error_msg = start_error.clone();
                let picker = self.render_camera_picker(options, selected, error_msg, false, cx);

                div()
                    .size_full()
                    .flex()
                    .items_center()
                    .justify_center()
                    .bg(gpui::rgba(0x1a233288))
                    .child(div().w(px(450.0)).child(picker))
                    .into_any_element()
            }
            CameraState::Ready => {
                let theme = cx.theme();
                v_flex()
                    .gap_2()
                    .p_4()
                    .rounded_lg()
                    .border_1()
                    .border_color(theme.border)
                    .bg(theme.group_box)
                    .child(
                        div()
                            .text_sm()
                            .text_color(theme.foreground)
                            .child("⟳ Kamera wird gestartet..."),
                    )
                    .into_any_element()
            }
        }
    }

    pub(super) fn switch_camera(&mut self, idx: usize) {
        let Some(device) = self.available_cameras.get(idx).cloned() else {
            self.camera_error = Some("Gewählte Kamera nicht gefunden".to_string());
            return;
        };

        match self.start_camera_for_device(&device) {
            Ok(()) => {
                self.selected_camera_idx = Some(idx);
                self.camera_error = None;
            }
            Err(err) => {
                self.camera_error = Some(format!("Kamerastart fehlgeschlagen: {err}"));
            }
        }
    }

    fn select_camera(&mut self, selected: usize) {
        if let Screen::Camera(CameraState::Selection {
            options,
            selected: current,
            start_error,
        }) = &mut self.screen
        {
            if selected < options.len() {
                *current = selected;
                *start_error = None;
                self.selected_camera_idx = Some(selected);
                self.available_cameras = options.clone();
            }
        }
    }

    fn start_camera_for_device(&mut self, device: &CameraDevice) -> Result<(), String> {
        if let Some(stream) = self.camera_stream.take() {
            stream.stop();
        }

        pipeline::start_camera_stream(
            device.index.clone(),
            self.frame_tx.clone(),
            self.det_frame_tx.clone(),
        )
        .map(|stream| {
            self.camera_stream = Some(stream);
            self.latest_frame = None;
            self.latest_update = None;
            self.latest_scores = None;
            self.latest_image = None;
            self.camera_error = None;
        })
        .map_err(|err| format!("{err:#}"))
    }

    fn start_selected_camera(&mut self) {
        let selected_device = match &self.screen {
            Screen::Camera(CameraState::Selection {
                options, selected, ..
            }) => {
                self.available_cameras = options.clone();
                options
                    .get(*selected)
                    .cloned()
                    .map(|device| (*selected, device))
            }
            _ => None,
        };

        let Some((selected_idx, device)) = selected_device else {
            if let Screen::Camera(CameraState::Selection { start_error, .. }) = &mut self.screen {
                *start_error = Some("Gewählte Kamera nicht gefunden".to_string());
            }
            return;
        };

        match self.start_camera_for_device(&device) {
            Ok(()) => {
                self.selected_camera_idx = Some(selected_idx);
                self.camera_error = None;
                self.camera_picker_open = false;
                self.screen = Screen::Download(DownloadState::new());
            }
            Err(err) => {
                if let Screen::Camera(CameraState::Selection { start_error, .. }) = &mut self.screen
                {
                    *start_error = Some(format!("Kamerastart fehlgeschlagen: {err}"));
                }
            }
        }
    }
}

fn camera_option_row(
    label: String,
    is_selected: bool,
    idx: usize,
    in_session: bool,
    cx: &mut Context<'_, AppView>,
) -> AnyElement {
    let (dot_color, label_color) = if is_selected {
        (gpui::rgb(0xa5b4fc), gpui::rgb(0xe2e8f0))
    } else {
        (gpui::rgb(0x94a3b8), gpui::rgb(0xcbd5e1))
    };

    h_flex()
        .w_full()
        .gap_3()
        .items_center()
        .p_3()
        .rounded_lg()
        .cursor_pointer()
        .bg(if is_selected {
            gpui::rgba(0x2d374855)
        } else {
            gpui::rgba(0x1e293b00)
        })
        .border_1()
        .border_color(if is_selected {
            gpui::rgba(0x64748bff)
        } else {
            gpui::rgba(0x33415500)
        })
        .hover(|this| {
            this.bg(gpui::rgba(0x2d374844))
                .border_color(gpui::rgba(0x475569ff))
        })
        .on_mouse_down(
            gpui::MouseButton::Left,
            cx.listener(move |this, _, _, cx| {
                if in_session {
                    this.switch_camera(idx);
                } else {
                    this.select_camera(idx);
                }
                cx.notify();
            }),
        )
        .child(
            div()
                .text_lg()
                .flex_shrink_0()
                .text_color(dot_color)
                .child("●"),
        )
        .child(
            div()
                .flex_1()
                .text_sm()
                .text_color(label_color)
                .overflow_hidden()
                .text_ellipsis()
                .whitespace_nowrap()
                .child(label),
        )
        .when(is_selected, |this| {
            this.child(
                div()
                    .text_sm()
                    .flex_shrink_0()
                    .text_color(gpui::rgb(0xa5b4fc))
                    .child("✓"),
            )
        })
        .into_any_element()
}

fn error_banner(message: String) -> AnyElement {
    h_flex()
        .gap_2()
        .items_start()
        .mt_2()
        .p_3()
        .rounded_lg()
        .bg(gpui::rgba(0x7f1d1d33))
        .border_1()
        .border_color(gpui::rgba(0xef4444aa))
        .child(
            div()
                .text_sm()
                .flex_shrink_0()
                .text_color(gpui::rgb(0xfca5a5))
                .child("!"),
        )
        .child(
            div()
                .flex_1()
                .text_xs()
                .text_color(gpui::rgb(0xfca5a5))
                .overflow_hidden()
                .child(message),
        )
        .into_any_element()
}
