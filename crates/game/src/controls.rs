use flyby_input::{InputSnapshot, Key, Modifiers};
use flyby_render::FreeCamera;
use flyby_scene::Model;

/// Velocity gained per second while boosting or braking.
pub const SHIP_ACCELERATION: f32 = 10.0;
/// Velocity lost per second when coasting.
pub const SHIP_DRAG: f32 = 2.0;
pub const SHIP_MAX_VELOCITY: f32 = 100.0;
pub const CAMERA_SPEED: f32 = 10.0;
pub const MOUSE_SENSITIVITY: f32 = 10.0;

/// Keyboard flight model for the ship.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ShipControl {
    pub velocity: f32,
}

impl ShipControl {
    /// Degrees turned this frame; faster ships turn faster.
    pub fn turn_rate(&self, dt: f32) -> f32 {
        (dt * self.velocity.abs() * 10.0).clamp(1.0, 15.0)
    }

    /// Left shift boosts, left ctrl brakes, A/D yaw, W/S pitch. The ship then
    /// moves along the forward vector of its last orientation update, drag
    /// pulls the velocity toward zero and the speed is capped at
    /// [`SHIP_MAX_VELOCITY`] in either direction.
    pub fn apply(&mut self, ship: &mut Model, input: &InputSnapshot, dt: f32) {
        let rate = self.turn_rate(dt);

        if input.is_mod_down(Modifiers::LSHIFT) {
            self.velocity += dt * SHIP_ACCELERATION;
        } else if input.is_mod_down(Modifiers::LCTRL) {
            self.velocity -= dt * SHIP_ACCELERATION;
        }

        if input.is_key_down(Key::A) {
            ship.rotation.angle_y -= rate;
        } else if input.is_key_down(Key::D) {
            ship.rotation.angle_y += rate;
        }

        if input.is_key_down(Key::W) {
            ship.rotation.angle_x += rate;
        } else if input.is_key_down(Key::S) {
            ship.rotation.angle_x -= rate;
        }

        ship.position += ship.forward() * dt * self.velocity;

        if self.velocity > 0.0 {
            self.velocity -= dt * SHIP_DRAG;
        } else if self.velocity < 0.0 {
            self.velocity += dt * SHIP_DRAG;
        }
        self.velocity = self.velocity.clamp(-SHIP_MAX_VELOCITY, SHIP_MAX_VELOCITY);
    }
}

/// I/K move along the camera's forward vector, J/L strafe. With the mouse
/// captured, vertical motion pitches and horizontal motion yaws; motion on a
/// single axis is ignored.
pub fn control_camera(camera: &mut FreeCamera, input: &InputSnapshot, dt: f32, mouse_captured: bool) {
    let step = dt * CAMERA_SPEED;
    if input.is_key_down(Key::I) {
        camera.move_forward(step);
    } else if input.is_key_down(Key::K) {
        camera.move_forward(-step);
    }

    if input.is_key_down(Key::J) {
        camera.move_right(-step);
    } else if input.is_key_down(Key::L) {
        camera.move_right(step);
    }

    let delta = input.mouse_delta;
    if mouse_captured && delta.x != 0.0 && delta.y != 0.0 {
        camera.rotation.angle_x += dt * delta.y * MOUSE_SENSITIVITY;
        camera.rotation.angle_y -= dt * delta.x * MOUSE_SENSITIVITY;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flyby_input::InputState;
    use flyby_scene::primitives;
    use glam::Vec3;

    fn frame(setup: impl FnOnce(&mut InputState)) -> InputSnapshot {
        let mut input = InputState::new();
        setup(&mut input);
        input.end_frame()
    }

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn turn_rate_is_clamped() {
        let slow = ShipControl { velocity: 0.0 };
        let fast = ShipControl { velocity: 500.0 };
        let medium = ShipControl { velocity: 50.0 };
        assert_eq!(slow.turn_rate(0.016), 1.0);
        assert_eq!(fast.turn_rate(1.0), 15.0);
        assert!(close(medium.turn_rate(0.02), 10.0));
    }

    #[test]
    fn boost_moves_along_forward_then_drags() {
        let mut ship = Model::new(vec![primitives::cube(1.0)]);
        let mut control = ShipControl::default();
        let input = frame(|i| i.set_modifier(Modifiers::LSHIFT, true));

        control.apply(&mut ship, &input, 0.1);

        assert!(ship.position.abs_diff_eq(Vec3::new(0.0, 0.0, 0.1), 1e-6));
        assert!(close(control.velocity, 0.8));
    }

    #[test]
    fn brake_drives_velocity_negative() {
        let mut ship = Model::new(Vec::new());
        let mut control = ShipControl::default();
        let input = frame(|i| i.set_modifier(Modifiers::LCTRL, true));
        control.apply(&mut ship, &input, 0.5);
        assert!(close(control.velocity, -4.0));
    }

    #[test]
    fn shift_wins_over_ctrl() {
        let mut ship = Model::new(Vec::new());
        let mut control = ShipControl::default();
        let input = frame(|i| {
            i.set_modifier(Modifiers::LSHIFT, true);
            i.set_modifier(Modifiers::LCTRL, true);
        });
        control.apply(&mut ship, &input, 1.0);
        assert!(close(control.velocity, 8.0));
    }

    #[test]
    fn steering_changes_rotation_not_orientation() {
        let mut ship = Model::new(Vec::new());
        let mut control = ShipControl::default();
        let input = frame(|i| {
            i.press(Key::A);
            i.press(Key::D);
            i.press(Key::W);
        });
        control.apply(&mut ship, &input, 0.016);

        assert_eq!(ship.rotation.angle_y, -1.0);
        assert_eq!(ship.rotation.angle_x, 1.0);
        assert_eq!(ship.forward(), Vec3::Z);
        ship.update_orientation();
        assert_ne!(ship.forward(), Vec3::Z);
    }

    #[test]
    fn coasting_ship_keeps_zero_velocity() {
        let mut ship = Model::new(Vec::new());
        let mut control = ShipControl::default();
        control.apply(&mut ship, &InputSnapshot::default(), 0.1);
        assert_eq!(control.velocity, 0.0);
        assert_eq!(ship.position, Vec3::ZERO);
    }

    #[test]
    fn speed_is_capped_after_drag() {
        let mut ship = Model::new(Vec::new());
        let boost = frame(|i| i.set_modifier(Modifiers::LSHIFT, true));

        let mut forward = ShipControl { velocity: 99.9 };
        forward.apply(&mut ship, &boost, 1.0);
        assert_eq!(forward.velocity, SHIP_MAX_VELOCITY);

        let mut reverse = ShipControl { velocity: -150.0 };
        reverse.apply(&mut ship, &InputSnapshot::default(), 0.1);
        assert_eq!(reverse.velocity, -SHIP_MAX_VELOCITY);
    }

    #[test]
    fn camera_keys_move_along_cached_axes() {
        let mut camera = FreeCamera::new();
        camera.view();
        let input = frame(|i| {
            i.press(Key::I);
            i.press(Key::L);
        });
        control_camera(&mut camera, &input, 0.1, true);
        assert!(camera.position.abs_diff_eq(Vec3::new(1.0, 0.0, -1.0), 1e-5));
    }

    #[test]
    fn mouse_look_needs_capture_and_both_axes() {
        let mut camera = FreeCamera::new();
        let diagonal = frame(|i| i.mouse_motion(2.0, 3.0));
        let horizontal = frame(|i| i.mouse_motion(2.0, 0.0));

        control_camera(&mut camera, &horizontal, 0.1, true);
        control_camera(&mut camera, &diagonal, 0.1, false);
        assert_eq!(camera.rotation.angle_x, 0.0);
        assert_eq!(camera.rotation.angle_y, -90.0);

        control_camera(&mut camera, &diagonal, 0.1, true);
        assert!(close(camera.rotation.angle_x, 3.0));
        assert!(close(camera.rotation.angle_y, -92.0));
    }
}
