//! Core types: math re-exports, Transform, FlyCamera.

pub use glam::{EulerRot, Mat4, Quat, Vec2, Vec3, vec3};

pub mod camera;
pub mod transform;

#[cfg(test)]
mod tests {
    use super::*;
    use camera::{CameraConfig, CameraMovement, FlyCamera};

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-5
    }

    #[test]
    fn identity_transform_is_identity_matrix() {
        let t = transform::Transform::identity();
        assert_eq!(t.matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn translate_then_scale_matrix() {
        let t = transform::Transform::identity()
            .with_translation(vec3(1.0, 2.0, 3.0))
            .with_scale(vec3(2.0, 2.0, 2.0));
        // Last column holds translation, diagonal holds scale (no rotation).
        let m = t.matrix().to_cols_array();
        assert!((m[12] - 1.0).abs() < 1e-6);
        assert!((m[13] - 2.0).abs() < 1e-6);
        assert!((m[14] - 3.0).abs() < 1e-6);
        assert!((m[0] - 2.0).abs() < 1e-6);
        assert!((m[5] - 2.0).abs() < 1e-6);
        assert!((m[10] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn rotation_keeps_pivot_fixed() {
        let pivot = vec3(2.0, 0.0, 1.0);
        let t = transform::Transform::rotation_about(pivot, vec3(0.0, 1.3, 0.0));
        let m = t.matrix();
        assert!(approx(m.transform_point3(pivot), pivot));
        // A point one unit above the pivot stays above it.
        let above = pivot + Vec3::Y;
        assert!(approx(m.transform_point3(above), above));
    }

    #[test]
    fn fly_camera_pv_is_finite() {
        let cam = FlyCamera::new(CameraConfig {
            position: vec3(0.0, 0.0, 4.0),
            ..CameraConfig::default()
        });
        let pv = cam.proj(16.0 / 9.0) * cam.view();
        let a = pv.to_cols_array();
        assert!(a.iter().all(|f| f.is_finite()));
    }

    #[test]
    fn default_fly_camera_looks_down_negative_z() {
        let cam = FlyCamera::default();
        assert!(approx(cam.front(), Vec3::NEG_Z));
        assert!(approx(cam.right(), Vec3::X));
        assert!(approx(cam.up(), Vec3::Y));
        assert_eq!(cam.zoom(), 45.0);
    }

    #[test]
    fn keyboard_moves_along_front_and_right() {
        let mut cam = FlyCamera::new(CameraConfig {
            position: Vec3::ZERO,
            speed: 2.0,
            ..CameraConfig::default()
        });
        cam.process_keyboard(CameraMovement::Forward, 0.5);
        assert!(approx(cam.position, vec3(0.0, 0.0, -1.0)));
        cam.process_keyboard(CameraMovement::Right, 1.0);
        assert!(approx(cam.position, vec3(2.0, 0.0, -1.0)));
        cam.process_keyboard(CameraMovement::Backward, 0.5);
        cam.process_keyboard(CameraMovement::Left, 1.0);
        assert!(approx(cam.position, Vec3::ZERO));
    }

    #[test]
    fn mouse_pitch_is_constrained() {
        let mut cam = FlyCamera::default();
        cam.process_mouse_movement(0.0, 10_000.0, true);
        assert_eq!(cam.pitch(), 89.0);
        assert!(cam.front().y > 0.99);

        let mut free = FlyCamera::default();
        free.process_mouse_movement(0.0, 1000.0, false);
        assert_eq!(free.pitch(), 100.0);
    }

    #[test]
    fn scroll_zoom_is_clamped() {
        let mut cam = FlyCamera::default();
        cam.process_mouse_scroll(100.0);
        assert_eq!(cam.zoom(), camera::MIN_ZOOM);
        cam.process_mouse_scroll(-100.0);
        assert_eq!(cam.zoom(), camera::MAX_ZOOM);
    }

    #[test]
    fn look_at_points_front_at_target() {
        let mut cam = FlyCamera::new(CameraConfig {
            position: vec3(5.0, 0.0, 0.0),
            ..CameraConfig::default()
        });
        cam.look_at(Vec3::ZERO);
        assert!(approx(cam.front(), Vec3::NEG_X));
        let view = cam.view();
        let origin_in_view = view.transform_point3(Vec3::ZERO);
        assert!((origin_in_view.z + 5.0).abs() < 1e-4);
    }
}
