use std::collections::HashSet;

use glam::Vec3;
use log::info;
use winit::event::{
  ElementState, Event, MouseButton, MouseScrollDelta, VirtualKeyCode, WindowEvent,
};

/// Scroll wheel zoom, as if dragged with right mouse button by this many pixels
const PIXELS_PER_SCROLL_LINE: f32 = 20.0;

/// Other implementations:
/// * https://github.com/rukai/winit_input_helper/blob/main/src/current_input.rs
pub struct AppInput {
  pub close_requested: bool,
  pub key_held: HashSet<VirtualKeyCode>,
  pub mouse_buttons_held: HashSet<MouseButton>,
  pub scroll_delta_y: f32,
  /// Last known cursor position in window pixels
  cursor_position: Option<(f32, f32)>,
  /// Accumulated since last `reset_transient_state`, `(previous - current)`
  cursor_delta: (f32, f32),
  /// handle losing focus, cursor moving out of window etc.
  pub can_intercept_mouse_events: bool,
}

/// Mouse input translated to `OrbitCamera::update_orbit` arguments
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct OrbitDelta {
  pub rotate_x: f32,
  pub rotate_y: f32,
  pub zoom: f32,
}

impl OrbitDelta {
  pub fn is_zero(&self) -> bool {
    self.rotate_x == 0.0 && self.rotate_y == 0.0 && self.zoom == 0.0
  }
}

impl AppInput {
  pub fn new() -> Self {
    Self {
      close_requested: false,
      key_held: HashSet::new(),
      mouse_buttons_held: HashSet::new(),
      scroll_delta_y: 0.0,
      cursor_position: None,
      cursor_delta: (0.0, 0.0),
      can_intercept_mouse_events: false, // wait to make sure we REALLY have mouse focus
    }
  }

  pub fn reset_transient_state(&mut self) {
    self.scroll_delta_y = 0.0;
    self.cursor_delta = (0.0, 0.0);
  }

  pub fn handle_event<T>(&mut self, event: &Event<T>) {
    if let Event::WindowEvent { event, .. } = &event {
      self.handle_window_event(event);
    }
  }

  fn handle_window_event(&mut self, event: &WindowEvent) {
    match event {
      // on clicked 'x'
      WindowEvent::CloseRequested => {
        self.close_requested = true;
      }
      // keyboard
      WindowEvent::KeyboardInput { input, .. } => match (input.state, input.virtual_keycode) {
        (_, Some(VirtualKeyCode::Escape)) => {
          self.close_requested = true;
        }
        (ElementState::Pressed, Some(key)) => {
          self.key_held.insert(key);
        }
        (ElementState::Released, Some(key)) => {
          self.key_held.remove(&key);
        }
        _ => {}
      },
      // mouse wheel
      WindowEvent::MouseWheel { delta, .. } => {
        if let MouseScrollDelta::LineDelta(_, delta_y) = delta {
          self.scroll_delta_y += *delta_y;
        }
      }
      // mouse buttons
      WindowEvent::MouseInput { button, state, .. } => {
        self.can_intercept_mouse_events = true;
        match *state {
          ElementState::Pressed => {
            self.mouse_buttons_held.insert(*button);
          }
          ElementState::Released => {
            self.mouse_buttons_held.remove(button);
          }
        }
      }
      WindowEvent::CursorMoved { position, .. } => {
        let current = (position.x as f32, position.y as f32);
        if let Some(previous) = self.cursor_position {
          self.cursor_delta.0 += previous.0 - current.0;
          self.cursor_delta.1 += previous.1 - current.1;
        }
        self.cursor_position = Some(current);
      }
      // window focus
      WindowEvent::Focused(is_focused) => {
        info!("Window focus change. Are we in focus: {:?}", is_focused);
        self.can_intercept_mouse_events = false;
        self.mouse_buttons_held.clear();
      }
      // cursor left
      WindowEvent::CursorLeft { .. } => {
        info!("Cursor left the window");
        self.can_intercept_mouse_events = false;
        self.cursor_position = None;
      }
      _ => {}
    }
  }

  fn is_pressed(&self, key: VirtualKeyCode) -> bool {
    self.key_held.contains(&key)
  }

  pub fn is_mouse_button_pressed(&self, btn: MouseButton) -> bool {
    self.can_intercept_mouse_events && self.mouse_buttons_held.contains(&btn)
  }

  /// Left drag rotates, right drag and scroll zoom
  pub fn orbit_delta(&self) -> OrbitDelta {
    let (dx, dy) = self.cursor_delta;
    let mut delta = OrbitDelta {
      zoom: self.scroll_delta_y * PIXELS_PER_SCROLL_LINE,
      ..Default::default()
    };
    if self.is_mouse_button_pressed(MouseButton::Left) {
      delta.rotate_x = dx;
      delta.rotate_y = dy;
    }
    if self.is_mouse_button_pressed(MouseButton::Right) {
      delta.zoom += dy;
    }
    delta
  }

  /// Rust's `Winit` has problem with keyboard keys:
  /// "When user holds the key, winit emits `KEY_PRESS`, waits 0.5s and then
  /// starts emitting subsequent `KEY_PRESS` events".
  /// Query per-frame with local set of pressed keys instead.
  ///
  /// WS - up/down, AD - left/right, QE - back/forward. Not normalized.
  pub fn collider_move_direction(&self) -> Vec3 {
    let mut move_vector = Vec3::ZERO;
    let axis = |key_neg: VirtualKeyCode, key_pos: VirtualKeyCode| -> f32 {
      let mut v = 0.0;
      if self.is_pressed(key_neg) {
        v -= 1.0;
      }
      if self.is_pressed(key_pos) {
        v += 1.0;
      }
      v
    };
    move_vector.x = axis(VirtualKeyCode::A, VirtualKeyCode::D);
    move_vector.y = axis(VirtualKeyCode::S, VirtualKeyCode::W);
    move_vector.z = axis(VirtualKeyCode::Q, VirtualKeyCode::E);
    move_vector
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn wasdqe_maps_to_axes() {
    let mut input = AppInput::new();
    input.key_held.insert(VirtualKeyCode::W);
    input.key_held.insert(VirtualKeyCode::A);
    input.key_held.insert(VirtualKeyCode::E);
    assert_eq!(input.collider_move_direction(), Vec3::new(-1.0, 1.0, 1.0));
  }

  #[test]
  fn opposite_keys_cancel_out() {
    let mut input = AppInput::new();
    input.key_held.insert(VirtualKeyCode::Q);
    input.key_held.insert(VirtualKeyCode::E);
    input.key_held.insert(VirtualKeyCode::S);
    assert_eq!(input.collider_move_direction(), Vec3::new(0.0, -1.0, 0.0));
  }

  #[test]
  fn drag_without_focus_does_not_rotate() {
    let mut input = AppInput::new();
    input.mouse_buttons_held.insert(MouseButton::Left);
    input.cursor_delta = (5.0, -3.0);
    assert!(input.orbit_delta().is_zero());

    input.can_intercept_mouse_events = true;
    let delta = input.orbit_delta();
    assert_eq!(delta.rotate_x, 5.0);
    assert_eq!(delta.rotate_y, -3.0);
    assert_eq!(delta.zoom, 0.0);
  }

  #[test]
  fn right_drag_and_scroll_zoom() {
    let mut input = AppInput::new();
    input.can_intercept_mouse_events = true;
    input.mouse_buttons_held.insert(MouseButton::Right);
    input.cursor_delta = (7.0, 2.0);
    input.scroll_delta_y = 1.0;
    let delta = input.orbit_delta();
    assert_eq!(delta.rotate_x, 0.0);
    assert_eq!(delta.zoom, PIXELS_PER_SCROLL_LINE + 2.0);

    input.reset_transient_state();
    assert!(input.orbit_delta().is_zero());
  }
}
