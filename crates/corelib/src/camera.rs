use crate::{Mat4, Vec3};

/// Movement directions understood by [`FlyCamera::process_keyboard`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CameraMovement {
    Forward,
    Backward,
    Left,
    Right,
}

/// Starting state and tuning for a [`FlyCamera`]. Angles are in degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraConfig {
    pub position: Vec3,
    pub world_up: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    /// World units per second.
    pub speed: f32,
    /// Degrees per pixel of mouse movement.
    pub sensitivity: f32,
    /// Vertical field of view.
    pub zoom: f32,
    pub z_near: f32,
    pub z_far: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 3.0),
            world_up: Vec3::Y,
            yaw: -90.0,
            pitch: 0.0,
            speed: 2.5,
            sensitivity: 0.1,
            zoom: 45.0,
            z_near: 0.1,
            z_far: 100.0,
        }
    }
}

pub const MIN_ZOOM: f32 = 1.0;
pub const MAX_ZOOM: f32 = 45.0;
const PITCH_LIMIT: f32 = 89.0;

/// Euler-angle camera: yaw/pitch drive the front vector.
#[derive(Clone, Copy, Debug)]
pub struct FlyCamera {
    pub position: Vec3,
    front: Vec3,
    up: Vec3,
    right: Vec3,
    world_up: Vec3,
    yaw: f32,
    pitch: f32,
    pub speed: f32,
    pub sensitivity: f32,
    zoom: f32,
    pub z_near: f32,
    pub z_far: f32,
}

impl FlyCamera {
    pub fn new(config: CameraConfig) -> Self {
        let mut cam = Self {
            position: config.position,
            front: Vec3::NEG_Z,
            up: config.world_up,
            right: Vec3::X,
            world_up: config.world_up,
            yaw: config.yaw,
            pitch: config.pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT),
            speed: config.speed,
            sensitivity: config.sensitivity,
            zoom: config.zoom.clamp(MIN_ZOOM, MAX_ZOOM),
            z_near: config.z_near,
            z_far: config.z_far,
        };
        cam.update_vectors();
        cam
    }

    #[inline]
    pub fn front(&self) -> Vec3 {
        self.front
    }

    #[inline]
    pub fn up(&self) -> Vec3 {
        self.up
    }

    #[inline]
    pub fn right(&self) -> Vec3 {
        self.right
    }

    #[inline]
    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    #[inline]
    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    #[inline]
    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    #[inline]
    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.front, self.up)
    }

    /// Depth maps to [0,1] as wgpu expects.
    #[inline]
    pub fn proj(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(
            self.zoom.to_radians(),
            aspect.max(1e-6),
            self.z_near,
            self.z_far,
        )
    }

    /// Point the camera at `target` from its current position.
    pub fn look_at(&mut self, target: Vec3) {
        let dir = target - self.position;
        if dir.length_squared() <= f32::EPSILON {
            return;
        }
        let dir = dir.normalize();
        self.pitch = dir.y.asin().to_degrees().clamp(-PITCH_LIMIT, PITCH_LIMIT);
        self.yaw = dir.z.atan2(dir.x).to_degrees();
        self.update_vectors();
    }

    pub fn process_keyboard(&mut self, direction: CameraMovement, dt: f32) {
        let velocity = self.speed * dt;
        match direction {
            CameraMovement::Forward => self.position += self.front * velocity,
            CameraMovement::Backward => self.position -= self.front * velocity,
            CameraMovement::Left => self.position -= self.right * velocity,
            CameraMovement::Right => self.position += self.right * velocity,
        }
    }

    pub fn process_mouse_movement(&mut self, dx: f32, dy: f32, constrain_pitch: bool) {
        self.yaw += dx * self.sensitivity;
        self.pitch += dy * self.sensitivity;
        if constrain_pitch {
            self.pitch = self.pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT);
        }
        self.update_vectors();
    }

    pub fn process_mouse_scroll(&mut self, dy: f32) {
        self.zoom = (self.zoom - dy).clamp(MIN_ZOOM, MAX_ZOOM);
    }

    fn update_vectors(&mut self) {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        self.front = Vec3::new(yaw.cos() * pitch.cos(), pitch.sin(), yaw.sin() * pitch.cos())
            .normalize();
        self.right = self.front.cross(self.world_up).normalize();
        self.up = self.right.cross(self.front).normalize();
    }
}

impl Default for FlyCamera {
    fn default() -> Self {
        Self::new(CameraConfig::default())
    }
}
