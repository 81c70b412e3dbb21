use winit::{
    event::{MouseScrollDelta, WindowEvent},
    event_loop::ActiveEventLoop,
    keyboard::{KeyCode, PhysicalKey},
};

use crate::camera::CameraDirection;

/// Input gathered between frames. Owned by the app, drained by the camera
/// and the particle emitter once per frame.
#[derive(Debug, Default, Clone)]
pub struct InputState {
    forward: bool,
    backward: bool,
    left: bool,
    right: bool,
    last_cursor: Option<(f64, f64)>,
    look_delta: (f32, f32),
    scroll: f32,
    burst_requested: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Quit,
    Handled,
    Ignored,
}

impl InputState {
    pub fn key(&mut self, code: KeyCode, pressed: bool) -> KeyAction {
        match code {
            KeyCode::Escape | KeyCode::KeyQ if pressed => KeyAction::Quit,
            KeyCode::KeyW => {
                self.forward = pressed;
                KeyAction::Handled
            }
            KeyCode::KeyS => {
                self.backward = pressed;
                KeyAction::Handled
            }
            KeyCode::KeyA => {
                self.left = pressed;
                KeyAction::Handled
            }
            KeyCode::KeyD => {
                self.right = pressed;
                KeyAction::Handled
            }
            KeyCode::Space => {
                if pressed {
                    self.burst_requested = true;
                }
                KeyAction::Handled
            }
            _ => KeyAction::Ignored,
        }
    }

    /// The first position only seeds the tracker so the view does not jump.
    pub fn cursor_moved(&mut self, x: f64, y: f64) {
        if let Some((last_x, last_y)) = self.last_cursor {
            self.look_delta.0 += (x - last_x) as f32;
            // Screen y grows downward
            self.look_delta.1 += (last_y - y) as f32;
        }
        self.last_cursor = Some((x, y));
    }

    pub fn scrolled(&mut self, lines: f32) {
        self.scroll += lines;
    }

    pub fn held_directions(&self) -> impl Iterator<Item = CameraDirection> + '_ {
        [
            (self.forward, CameraDirection::Forward),
            (self.backward, CameraDirection::Backward),
            (self.left, CameraDirection::Left),
            (self.right, CameraDirection::Right),
        ]
        .into_iter()
        .filter_map(|(held, direction)| held.then_some(direction))
    }

    pub fn take_look_delta(&mut self) -> (f32, f32) {
        std::mem::take(&mut self.look_delta)
    }

    pub fn take_scroll(&mut self) -> f32 {
        std::mem::take(&mut self.scroll)
    }

    pub fn take_burst(&mut self) -> bool {
        std::mem::take(&mut self.burst_requested)
    }
}

pub struct InputHandler;

impl InputHandler {
    /// Feeds a window event into `input`. Returns true when the event was consumed.
    pub fn handle_window_event(
        event: &WindowEvent,
        input: &mut InputState,
        event_loop: &ActiveEventLoop,
    ) -> bool {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("The close button was pressed, stopping");
                event_loop.exit();
                true
            }
            WindowEvent::KeyboardInput { event, .. } => {
                let PhysicalKey::Code(code) = event.physical_key else {
                    return false;
                };
                match input.key(code, event.state.is_pressed()) {
                    KeyAction::Quit => {
                        log::info!("Quit key pressed, stopping");
                        event_loop.exit();
                        true
                    }
                    KeyAction::Handled => true,
                    KeyAction::Ignored => false,
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                input.cursor_moved(position.x, position.y);
                true
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 100.0,
                };
                input.scrolled(lines);
                true
            }
            _ => false,
        }
    }
}
