//! Per-frame uniform state of the scene.

use std::f32::consts::TAU;

use cgmath::{Matrix4, Rad, SquareMatrix, Vector3, Zero};

pub const DEFAULT_AMBIENT: [f32; 4] = [0.2, 0.2, 0.2, 1.0];
pub const DEFAULT_LIGHT_POSITION: [f32; 3] = [0.0, 0.0, 10.0];
pub const DEFAULT_LIGHT_COLOR: [f32; 4] = [0.7, 0.7, 0.7, 1.0];
pub const DEFAULT_LIGHT_POWER: f32 = 500.0;

/// How the model turns over time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Rotation {
    /// Around the Y axis only.
    Spin,
    /// Around all three axes at different rates.
    #[default]
    Tumble,
    None,
}

impl Rotation {
    /// Angular velocity per axis, in radians per second.
    pub fn rates(&self) -> Vector3<f32> {
        match self {
            Rotation::Spin => Vector3::new(0.0, 1.0, 0.0),
            Rotation::Tumble => Vector3::new(0.3, 1.0, 0.7),
            Rotation::None => Vector3::zero(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Channel {
    Red,
    Green,
    Blue,
}

impl Channel {
    fn index(self) -> usize {
        match self {
            Channel::Red => 0,
            Channel::Green => 1,
            Channel::Blue => 2,
        }
    }
}

/// Colors stay within `[0, 1]`; the light power is unbounded.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderState {
    pub model_matrix: Matrix4<f32>,
    pub angles: Vector3<f32>,
    pub ambient_color: [f32; 4],
    pub light_position: Vector3<f32>,
    pub light_color: [f32; 4],
    pub light_power: f32,
    pub viewport: (u32, u32),
    pub left_button_down: bool,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            model_matrix: Matrix4::identity(),
            angles: Vector3::zero(),
            ambient_color: DEFAULT_AMBIENT,
            light_position: DEFAULT_LIGHT_POSITION.into(),
            light_color: DEFAULT_LIGHT_COLOR,
            light_power: DEFAULT_LIGHT_POWER,
            viewport: (1, 1),
            left_button_down: false,
        }
    }
}

impl RenderState {
    /// Turn the model by `rates * dt` and recompute the model matrix.
    pub fn advance(&mut self, dt: f32, rates: Vector3<f32>) {
        let angles = self.angles + rates * dt;
        self.angles = Vector3::new(
            angles.x.rem_euclid(TAU),
            angles.y.rem_euclid(TAU),
            angles.z.rem_euclid(TAU),
        );
        self.model_matrix = rotation_matrix(self.angles);
    }

    pub fn adjust_ambient(&mut self, channel: Channel, delta: f32) {
        adjust(&mut self.ambient_color, channel, delta);
    }

    pub fn adjust_light_color(&mut self, channel: Channel, delta: f32) {
        adjust(&mut self.light_color, channel, delta);
    }

    pub fn adjust_light_power(&mut self, delta: f32) {
        self.light_power += delta;
    }

    pub fn move_light_z(&mut self, delta: f32) {
        self.light_position.z += delta;
    }

    /// Put the light under the cursor. Window Y grows downwards, light Y upwards.
    pub fn place_light(&mut self, x: f64, y: f64) {
        self.light_position.x = x as f32;
        self.light_position.y = self.viewport.1 as f32 - y as f32;
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.viewport.0 as f32 / self.viewport.1.max(1) as f32
    }
}

/// `Rx * Ry * Rz`
pub fn rotation_matrix(angles: Vector3<f32>) -> Matrix4<f32> {
    Matrix4::from_angle_x(Rad(angles.x))
        * Matrix4::from_angle_y(Rad(angles.y))
        * Matrix4::from_angle_z(Rad(angles.z))
}

fn adjust(color: &mut [f32; 4], channel: Channel, delta: f32) {
    let value = &mut color[channel.index()];
    *value = (*value + delta).clamp(0.0, 1.0);
}
