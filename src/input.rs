//! Keyboard and mouse input, decoupled from winit's event types.

use std::collections::HashMap;

use winit::{
    event::{ElementState, KeyEvent, MouseButton, WindowEvent},
    keyboard::{KeyCode, PhysicalKey},
};

use crate::data_structures::render_state::{Channel, RenderState};

/// Step applied to one color channel per key press.
pub const COLOR_STEP: f32 = 0.1;
pub const POWER_STEP: f32 = 10.0;
pub const LIGHT_Z_STEP: f32 = 1.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InputEvent {
    KeyReleased(KeyCode),
    CursorMoved { x: f64, y: f64 },
    MouseButton { button: MouseButton, pressed: bool },
    CloseRequested,
}

impl InputEvent {
    /// The viewer-relevant part of a window event, if any.
    pub fn from_window_event(event: &WindowEvent) -> Option<Self> {
        match event {
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state: ElementState::Released,
                        ..
                    },
                ..
            } => Some(InputEvent::KeyReleased(*code)),
            WindowEvent::CursorMoved { position, .. } => Some(InputEvent::CursorMoved {
                x: position.x,
                y: position.y,
            }),
            WindowEvent::MouseInput { state, button, .. } => Some(InputEvent::MouseButton {
                button: *button,
                pressed: state.is_pressed(),
            }),
            WindowEvent::CloseRequested => Some(InputEvent::CloseRequested),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Action {
    Quit,
    AdjustAmbient(Channel, f32),
    AdjustLightColor(Channel, f32),
    AdjustLightPower(f32),
    MoveLightZ(f32),
}

impl Action {
    /// Apply the action to `state`. `Quit` leaves it untouched.
    pub fn apply(&self, state: &mut RenderState) {
        match *self {
            Action::Quit => {}
            Action::AdjustAmbient(channel, delta) => state.adjust_ambient(channel, delta),
            Action::AdjustLightColor(channel, delta) => state.adjust_light_color(channel, delta),
            Action::AdjustLightPower(delta) => state.adjust_light_power(delta),
            Action::MoveLightZ(delta) => state.move_light_z(delta),
        }
    }
}

/// When cursor movement drags the light around.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LightDrag {
    #[default]
    Off,
    Always,
    /// Only while the left mouse button is held.
    LeftButton,
}

impl LightDrag {
    pub fn follows_cursor(&self, left_button_down: bool) -> bool {
        match self {
            LightDrag::Off => false,
            LightDrag::Always => true,
            LightDrag::LeftButton => left_button_down,
        }
    }
}

/// Maps released keys to actions.
#[derive(Clone, Debug, PartialEq)]
pub struct KeyBindings {
    bindings: HashMap<KeyCode, Action>,
}

impl KeyBindings {
    pub fn empty() -> Self {
        Self {
            bindings: HashMap::new(),
        }
    }

    pub fn bind(&mut self, key: KeyCode, action: Action) -> Option<Action> {
        self.bindings.insert(key, action)
    }

    pub fn action(&self, key: KeyCode) -> Option<Action> {
        self.bindings.get(&key).copied()
    }
}

impl Default for KeyBindings {
    fn default() -> Self {
        use Channel::{Blue, Green, Red};

        let mut bindings = Self::empty();
        bindings.bind(KeyCode::Escape, Action::Quit);
        for (up, down, channel) in [
            (KeyCode::KeyQ, KeyCode::KeyA, Red),
            (KeyCode::KeyW, KeyCode::KeyS, Green),
            (KeyCode::KeyE, KeyCode::KeyD, Blue),
        ] {
            bindings.bind(up, Action::AdjustAmbient(channel, COLOR_STEP));
            bindings.bind(down, Action::AdjustAmbient(channel, -COLOR_STEP));
        }
        for (up, down, channel) in [
            (KeyCode::KeyR, KeyCode::KeyF, Red),
            (KeyCode::KeyT, KeyCode::KeyG, Green),
            (KeyCode::KeyY, KeyCode::KeyH, Blue),
        ] {
            bindings.bind(up, Action::AdjustLightColor(channel, COLOR_STEP));
            bindings.bind(down, Action::AdjustLightColor(channel, -COLOR_STEP));
        }
        bindings.bind(KeyCode::KeyU, Action::AdjustLightPower(POWER_STEP));
        bindings.bind(KeyCode::KeyJ, Action::AdjustLightPower(-POWER_STEP));
        bindings.bind(KeyCode::Equal, Action::MoveLightZ(LIGHT_Z_STEP));
        bindings.bind(KeyCode::Minus, Action::MoveLightZ(-LIGHT_Z_STEP));
        bindings
    }
}
