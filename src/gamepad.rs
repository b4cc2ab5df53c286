//! Physical pads through gilrs, read once per frame in the standard layout.

use aether_shell::core::input::{GamepadSource, GamepadState};
use gilrs::ff::{BaseEffect, BaseEffectType, Effect, EffectBuilder, Replay, Ticks};
use gilrs::{Axis, Button, EventType, GamepadId, Gilrs};
use tracing::{debug, info, warn};

const BUTTON_COUNT: usize = 17;
const RUMBLE_MS: u32 = 60;
const RUMBLE_STRENGTH: u16 = 24_000;

const BUTTONS: [Button; BUTTON_COUNT] = [
    Button::South,
    Button::East,
    Button::West,
    Button::North,
    Button::LeftTrigger,
    Button::RightTrigger,
    Button::LeftTrigger2,
    Button::RightTrigger2,
    Button::Select,
    Button::Start,
    Button::LeftThumb,
    Button::RightThumb,
    Button::DPadUp,
    Button::DPadDown,
    Button::DPadLeft,
    Button::DPadRight,
    Button::Mode,
];

/// Index of a gilrs button in the standard layout.
pub fn standard_index(button: Button) -> Option<usize> {
    BUTTONS.iter().position(|b| *b == button)
}

/// Builds a snapshot from pressed buttons and the left stick. gilrs reports
/// stick y positive up; the standard layout has it positive down.
pub fn snapshot(pressed: impl Fn(Button) -> bool, stick_x: f32, stick_y: f32) -> GamepadState {
    GamepadState {
        buttons: BUTTONS.iter().map(|b| pressed(*b)).collect(),
        axes: vec![stick_x, -stick_y],
    }
}

pub struct GilrsPad {
    gilrs: Gilrs,
    active: Option<GamepadId>,
    // Dropping an effect stops it.
    rumble: Option<Effect>,
}

impl GilrsPad {
    /// `None` when the platform has no gamepad support.
    pub fn new() -> Option<Self> {
        match Gilrs::new() {
            Ok(gilrs) => {
                for (id, pad) in gilrs.gamepads() {
                    info!(%id, name = pad.name(), "gamepad connected");
                }
                Some(Self {
                    gilrs,
                    active: None,
                    rumble: None,
                })
            }
            Err(e) => {
                warn!(error = %e, "gamepad support unavailable");
                None
            }
        }
    }

    /// Short rumble on the pad that produced the last input.
    pub fn rumble(&mut self) {
        let Some(id) = self.active else {
            return;
        };
        if !self.gilrs.connected_gamepad(id).is_some_and(|p| p.is_ff_supported()) {
            return;
        }
        let effect = EffectBuilder::new()
            .add_effect(BaseEffect {
                kind: BaseEffectType::Strong {
                    magnitude: RUMBLE_STRENGTH,
                },
                scheduling: Replay {
                    play_for: Ticks::from_ms(RUMBLE_MS),
                    ..Default::default()
                },
                ..Default::default()
            })
            .gamepads(&[id])
            .finish(&mut self.gilrs);
        match effect {
            Ok(effect) => {
                if let Err(e) = effect.play() {
                    debug!(error = %e, "rumble failed");
                }
                self.rumble = Some(effect);
            }
            Err(e) => debug!(error = %e, "rumble unavailable"),
        }
    }
}

impl GamepadSource for GilrsPad {
    fn poll(&mut self) -> Option<GamepadState> {
        while let Some(event) = self.gilrs.next_event() {
            match event.event {
                EventType::Connected => info!(id = %event.id, "gamepad connected"),
                EventType::Disconnected => {
                    info!(id = %event.id, "gamepad disconnected");
                    if self.active == Some(event.id) {
                        self.active = None;
                    }
                    continue;
                }
                _ => {}
            }
            self.active = Some(event.id);
        }
        let id = match self.active {
            Some(id) => id,
            None => self.gilrs.gamepads().next().map(|(id, _)| id)?,
        };
        let pad = self.gilrs.connected_gamepad(id)?;
        Some(snapshot(
            |b| pad.is_pressed(b),
            pad.value(Axis::LeftStickX),
            pad.value(Axis::LeftStickY),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aether_shell::core::input::{BUTTON_BACK, BUTTON_DOWN, BUTTON_ENTER, BUTTON_LEFT, BUTTON_RIGHT, BUTTON_UP};

    #[test]
    fn buttons_follow_the_standard_layout() {
        assert_eq!(standard_index(Button::South), Some(BUTTON_ENTER));
        assert_eq!(standard_index(Button::East), Some(BUTTON_BACK));
        assert_eq!(standard_index(Button::DPadUp), Some(BUTTON_UP));
        assert_eq!(standard_index(Button::DPadDown), Some(BUTTON_DOWN));
        assert_eq!(standard_index(Button::DPadLeft), Some(BUTTON_LEFT));
        assert_eq!(standard_index(Button::DPadRight), Some(BUTTON_RIGHT));
        assert_eq!(standard_index(Button::Select), Some(8));
        assert_eq!(standard_index(Button::Mode), Some(16));
        assert_eq!(standard_index(Button::C), None);
    }

    #[test]
    fn snapshot_marks_pressed_buttons() {
        let state = snapshot(|b| b == Button::DPadLeft || b == Button::South, 0.0, 0.0);
        assert_eq!(state.buttons.len(), BUTTON_COUNT);
        assert!(state.pressed(BUTTON_LEFT));
        assert!(state.pressed(BUTTON_ENTER));
        assert!(!state.pressed(BUTTON_BACK));
    }

    #[test]
    fn stick_up_becomes_negative_y() {
        let state = snapshot(|_| false, 0.25, 0.9);
        assert_eq!(state.axes, vec![0.25, -0.9]);
    }
}
