use std::sync::Arc;

use gpui::{
    AnyElement, Context, Hsla, IntoElement, ObjectFit, ParentElement, RenderImage, SharedString,
    Styled, StyledImage, Window, div, img, px,
};
use gpui::prelude::FluentBuilder;
use gpui_component::{
    ActiveTheme, h_flex,
    button::{Button, ButtonVariants},
    v_flex,
};

use super::render_util::frame_to_image;
use super::{
    AppView, CAMERA_CARD_WIDTH, CAMERA_MAX_HEIGHT, CAMERA_MIN_HEIGHT, DEFAULT_CAMERA_RATIO,
};
use crate::types::MoodState;

impl AppView {
    pub(super) fn render_main(
        &mut self,
        window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) -> AnyElement {
        // Results that arrive after the camera stopped belong to a cancelled
        // pipeline run; dropping them here is the discard, not an error.
        let update_rx = self.update_rx.take();
        if let Some(rx) = update_rx.as_ref() {
            while let Ok(update) = rx.try_recv() {
                if self.camera_stream.is_none() {
                    continue;
                }
                if let Some(scores) = update.scores {
                    self.latest_scores = Some(scores);
                }
                self.latest_update = Some(update);
            }
        }
        self.update_rx = update_rx;

        let frame_rx = self.frame_rx.take();
        if let Some(rx) = frame_rx.as_ref() {
            let mut frames = Vec::new();
            while let Ok(frame) = rx.try_recv() {
                frames.push(frame);
            }

            for frame in frames {
                let overlay = self
                    .latest_update
                    .as_ref()
                    .and_then(|u| u.landmarks.as_deref());

                if let Some(image) = frame_to_image(&frame, overlay) {
                    self.replace_latest_image(image, window, cx);
                }
                self.latest_frame = Some(frame);
            }
        }
        self.frame_rx = frame_rx;

        let camera_label = self
            .selected_camera_idx
            .and_then(|idx| self.available_cameras.get(idx))
            .map(|c| c.label.clone())
            .unwrap_or_else(|| {
                if self.available_cameras.is_empty() {
                    "Keine Kamera erkannt".to_string()
                } else {
                    "Keine Kamera gewählt".to_string()
                }
            });

        let frame_status = self
            .latest_frame
            .as_ref()
            .map(|f| format!("Kamera: {camera_label} {}x{}", f.width, f.height))
            .unwrap_or_else(|| format!("Kamera: {camera_label}, warte auf Bild..."));

        let pose_text = self
            .latest_update
            .as_ref()
            .filter(|u| u.landmarks.is_some())
            .map(|u| format!("Pose: {:.0}%", u.confidence * 100.0))
            .unwrap_or_else(|| "Pose: --".to_string());

        let mood_text = self
            .latest_scores
            .map(|scores| scores.display_text())
            .unwrap_or_else(|| "Noch keine Einschätzung".to_string());

        let theme = cx.theme();
        let background = theme.background;
        let card_bg = theme.group_box;
        let border_color = theme.border;
        let muted_foreground = theme.muted_foreground;
        let foreground = theme.foreground;
        let success = theme.success;
        let dark = theme.mode.is_dark();

        let (camera_icon, camera_text, camera_color) = if self.latest_frame.is_some() {
            ("●", "Kamera bereit", success)
        } else {
            ("○", "Warte auf Kamera", muted_foreground)
        };

        let (detector_icon, detector_text, detector_color) = if self.detector_handle.is_some() {
            ("●", "Erkennung läuft", success)
        } else {
            ("○", "Initialisierung", muted_foreground)
        };

        let ratio = self.camera_aspect_ratio();
        let camera_height =
            (CAMERA_CARD_WIDTH / ratio).clamp(CAMERA_MIN_HEIGHT, CAMERA_MAX_HEIGHT);

        let frame_view: AnyElement = if let Some(image) = &self.latest_image {
            img(image.clone())
                .size_full()
                .object_fit(ObjectFit::Contain)
                .rounded_t_lg()
                .into_any_element()
        } else {
            div()
                .size_full()
                .flex()
                .items_center()
                .justify_center()
                .text_sm()
                .text_color(gpui::rgb(0x8b95a5))
                .rounded_t_lg()
                .child("Warte auf Kamera...")
                .into_any_element()
        };

        let camera_shell = div()
            .relative()
            .w(px(CAMERA_CARD_WIDTH))
            .h(px(camera_height))
            .overflow_hidden()
            .rounded_t_lg()
            .bg(gpui::rgb(0x000000))
            .child(frame_view);

        let mut info_row = h_flex().justify_between().items_center().gap_2().child(
            div()
                .text_xs()
                .text_color(muted_foreground)
                .child(pose_text),
        );

        if self.available_cameras.len() > 1 {
            let picker_label = if self.camera_picker_open {
                "◉ Schließen"
            } else {
                "◉ Wechseln"
            };
            info_row = info_row.child(
                Button::new(SharedString::from("camera-picker-toggle"))
                    .outline()
                    .label(picker_label)
                    .on_click(cx.listener(|this, _, _, cx| {
                        this.camera_picker_open = !this.camera_picker_open;
                        cx.notify();
                    })),
            );
        }

        let camera_card = v_flex()
            .w(px(CAMERA_CARD_WIDTH))
            .rounded_lg()
            .overflow_hidden()
            .border_1()
            .border_color(border_color)
            .bg(card_bg)
            .child(camera_shell)
            .child(
                v_flex().gap_2().p_3().child(info_row).child(
                    div()
                        .text_xs()
                        .text_color(muted_foreground)
                        .overflow_hidden()
                        .text_ellipsis()
                        .whitespace_nowrap()
                        .child(frame_status),
                ),
            );

        let mut picker_panel: Option<AnyElement> = None;
        if self.camera_picker_open && !self.available_cameras.is_empty() {
            picker_panel = Some(
                div()
                    .w(px(CAMERA_CARD_WIDTH * 0.7))
                    .child(self.render_camera_picker_main(cx))
                    .into_any_element(),
            );
        } else if let Some(err) = &self.camera_error {
            picker_panel = Some(
                h_flex()
                    .gap_2()
                    .items_center()
                    .p_3()
                    .rounded_lg()
                    .bg(gpui::rgba(0xef444433))
                    .border_1()
                    .border_color(gpui::rgba(0xef4444ff))
                    .child(div().text_base().child("⚠️"))
                    .child(
                        div()
                            .text_xs()
                            .text_color(gpui::rgb(0xfca5a5))
                            .child(err.clone()),
                    )
                    .into_any_element(),
            );
        }

        // The state row is the heart of the demo: one indicator per label,
        // tinted by its probability.
        let mut mood_row = h_flex().w(px(CAMERA_CARD_WIDTH)).gap_2();
        for state in MoodState::ALL {
            let value = self
                .latest_scores
                .map(|scores| scores.value(state))
                .unwrap_or(0.0);
            mood_row = mood_row.child(mood_indicator(state, value, dark));
        }

        let header = h_flex()
            .w_full()
            .justify_between()
            .items_center()
            .px_4()
            .py_2()
            .child(
                div()
                    .text_sm()
                    .font_semibold()
                    .text_color(foreground)
                    .child("Mood Mirror"),
            )
            .child(
                h_flex()
                    .gap_3()
                    .items_center()
                    .child(status_badge(detector_color, detector_icon, detector_text))
                    .child(status_badge(camera_color, camera_icon, camera_text)),
            );

        v_flex()
            .size_full()
            .bg(background)
            .child(header)
            .child(
                v_flex()
                    .flex_1()
                    .items_center()
                    .gap_3()
                    .p_4()
                    .child(camera_card)
                    .when_some(picker_panel, |this, panel| this.child(panel))
                    .child(mood_row)
                    .child(
                        h_flex()
                            .w(px(CAMERA_CARD_WIDTH))
                            .justify_between()
                            .items_center()
                            .child(
                                div()
                                    .text_sm()
                                    .text_color(foreground)
                                    .child(mood_text),
                            ),
                    ),
            )
            .into_any_element()
    }

    fn camera_aspect_ratio(&self) -> f32 {
        if let Some(frame) = &self.latest_frame {
            if frame.height > 0 {
                return frame.width as f32 / frame.height as f32;
            }
        }
        DEFAULT_CAMERA_RATIO
    }

    fn replace_latest_image(
        &mut self,
        new_image: Arc<RenderImage>,
        window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) {
        if let Some(old_image) = self.latest_image.replace(new_image) {
            // Explicitly drop the previous GPU texture; otherwise the sprite atlas keeps
            // every frame and memory will climb rapidly while the camera is running.
            cx.drop_image(old_image, Some(window));
        }
    }
}

fn status_badge(color: Hsla, icon: &str, text: &str) -> AnyElement {
    div()
        .px_2()
        .py_0p5()
        .rounded_md()
        .bg(gpui::rgba(0x00000022))
        .text_xs()
        .text_color(color)
        .child(format!("{} {}", icon, text))
        .into_any_element()
}

/// One state indicator, tinted by probability exactly like the original demo:
/// light theme fades white→red, dark theme fades black→red.
fn mood_indicator(state: MoodState, value: f32, dark: bool) -> AnyElement {
    let v = value.clamp(0.0, 1.0);
    let bg = if dark {
        gpui::Rgba {
            r: v,
            g: 0.0,
            b: 0.0,
            a: 1.0,
        }
    } else {
        gpui::Rgba {
            r: 1.0,
            g: 1.0 - v,
            b: 1.0 - v,
            a: 1.0,
        }
    };
    let text_color = if dark {
        gpui::rgb(0xf8fafc)
    } else {
        gpui::rgb(0x0f172a)
    };

    div()
        .flex_1()
        .px_3()
        .py_2()
        .rounded_lg()
        .border_1()
        .border_color(gpui::rgba(0x64748b66))
        .bg(bg)
        .flex()
        .items_center()
        .justify_center()
        .text_sm()
        .text_color(text_color)
        .child(format!("{}{}", state.emoji(), state.display_name()))
        .into_any_element()
}
