use flyby_common::{ModelId, Rotation};
use flyby_scene::{Model, Scene};
use glam::{Mat4, Vec3};

/// Inputs of the projection matrix as last seen.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct ProjectionKey {
    fov: f32,
    near: f32,
    far: f32,
    aspect: f32,
}

/// Inputs of the view matrix as last seen.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct ViewKey {
    position: Vec3,
    rotation: Rotation,
}

/// Lazily recomputed projection and view matrices.
///
/// Keys are compared with exact float equality, so any change, however
/// small, triggers a recompute. Until the first recompute both matrices are
/// identity and every key field is zero.
#[derive(Debug, Clone, Copy)]
struct MatrixCache {
    projection_key: ProjectionKey,
    view_key: ViewKey,
    projection: Mat4,
    view: Mat4,
    projection_updates: u64,
    view_updates: u64,
}

impl Default for MatrixCache {
    fn default() -> Self {
        Self {
            projection_key: ProjectionKey::default(),
            view_key: ViewKey::default(),
            projection: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            projection_updates: 0,
            view_updates: 0,
        }
    }
}

impl MatrixCache {
    fn projection(&mut self, key: ProjectionKey) -> Mat4 {
        if key != self.projection_key {
            self.projection =
                Mat4::perspective_rh(key.fov.to_radians(), key.aspect, key.near, key.far);
            self.projection_key = key;
            self.projection_updates += 1;
        }
        self.projection
    }

    /// Returns true when `key` differs from the cached one; the caller then
    /// stores a new matrix with [`MatrixCache::store_view`].
    fn view_stale(&self, key: ViewKey) -> bool {
        key != self.view_key
    }

    fn store_view(&mut self, key: ViewKey, view: Mat4) {
        self.view = view;
        self.view_key = key;
        self.view_updates += 1;
    }
}

/// Free-flying camera steered by pitch (`angle_x`) and yaw (`angle_y`).
/// Roll is ignored.
#[derive(Debug, Clone)]
pub struct FreeCamera {
    pub position: Vec3,
    pub rotation: Rotation,
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    forward: Vec3,
    right: Vec3,
    cache: MatrixCache,
}

impl Default for FreeCamera {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Rotation::new(0.0, -90.0, 0.0),
            fov: 90.0,
            near: 0.1,
            far: 1000.0,
            forward: Vec3::NEG_Z,
            right: Vec3::NEG_X,
            cache: MatrixCache::default(),
        }
    }
}

impl FreeCamera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// Forward vector as of the last view recompute.
    pub fn forward(&self) -> Vec3 {
        self.forward
    }

    /// Right vector as of the last view recompute.
    pub fn right(&self) -> Vec3 {
        self.right
    }

    pub fn projection(&mut self, aspect: f32) -> Mat4 {
        self.cache.projection(ProjectionKey {
            fov: self.fov,
            near: self.near,
            far: self.far,
            aspect,
        })
    }

    pub fn view(&mut self) -> Mat4 {
        let key = ViewKey {
            position: self.position,
            rotation: self.rotation,
        };
        if self.cache.view_stale(key) {
            let radians = self.rotation.to_radians();
            let (pitch, yaw) = (radians.x, radians.y);
            self.forward = Vec3::new(
                yaw.cos() * pitch.cos(),
                pitch.sin(),
                yaw.sin() * pitch.cos(),
            )
            .normalize();
            self.right = self.forward.cross(Vec3::Y).normalize();
            let view = Mat4::look_at_rh(self.position, self.position + self.forward, Vec3::Y);
            self.cache.store_view(key, view);
        }
        self.cache.view
    }

    pub fn move_forward(&mut self, distance: f32) {
        self.position += self.forward * distance;
    }

    pub fn move_right(&mut self, distance: f32) {
        self.position += self.right * distance;
    }
}

/// Camera trailing a model at a fixed distance behind it.
#[derive(Debug, Clone)]
pub struct FollowCamera {
    pub target: Option<ModelId>,
    /// Distance behind the target along its forward axis.
    pub distance: f32,
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    cache: MatrixCache,
}

impl FollowCamera {
    pub const DEFAULT_DISTANCE: f32 = 10.0;

    pub fn new(target: ModelId) -> Self {
        Self {
            target: Some(target),
            ..Self::default()
        }
    }

    pub fn projection(&mut self, aspect: f32) -> Mat4 {
        self.cache.projection(ProjectionKey {
            fov: self.fov,
            near: self.near,
            far: self.far,
            aspect,
        })
    }

    /// View from behind the target, looking at it with the target's up axis.
    ///
    /// Without a resolvable target the cached view is returned as is.
    pub fn view(&mut self, scene: &Scene) -> Mat4 {
        let Some(target) = self.target.and_then(|id| scene.get(id)) else {
            return self.cache.view;
        };
        let key = ViewKey {
            position: target.position,
            rotation: target.rotation,
        };
        if self.cache.view_stale(key) {
            let view = self.look_at(target);
            self.cache.store_view(key, view);
        }
        self.cache.view
    }

    fn look_at(&self, target: &Model) -> Mat4 {
        let eye = target.position - target.forward() * self.distance;
        Mat4::look_at_rh(eye, target.position, target.up())
    }
}

impl Default for FollowCamera {
    fn default() -> Self {
        Self {
            target: None,
            distance: Self::DEFAULT_DISTANCE,
            fov: 90.0,
            near: 0.1,
            far: 1000.0,
            cache: MatrixCache::default(),
        }
    }
}

/// The camera variants the renderer understands.
#[derive(Debug, Clone)]
pub enum Camera {
    Free(FreeCamera),
    Follow(FollowCamera),
}

impl Camera {
    pub fn projection(&mut self, aspect: f32) -> Mat4 {
        match self {
            Self::Free(camera) => camera.projection(aspect),
            Self::Follow(camera) => camera.projection(aspect),
        }
    }

    /// The free variant ignores `scene`.
    pub fn view(&mut self, scene: &Scene) -> Mat4 {
        match self {
            Self::Free(camera) => camera.view(),
            Self::Follow(camera) => camera.view(scene),
        }
    }

    /// Number of projection recomputes so far.
    pub fn projection_updates(&self) -> u64 {
        self.cache().projection_updates
    }

    /// Number of view recomputes so far.
    pub fn view_updates(&self) -> u64 {
        self.cache().view_updates
    }

    pub fn as_free_mut(&mut self) -> Option<&mut FreeCamera> {
        match self {
            Self::Free(camera) => Some(camera),
            Self::Follow(_) => None,
        }
    }

    pub fn is_follow(&self) -> bool {
        matches!(self, Self::Follow(_))
    }

    fn cache(&self) -> &MatrixCache {
        match self {
            Self::Free(camera) => &camera.cache,
            Self::Follow(camera) => &camera.cache,
        }
    }
}

impl From<FreeCamera> for Camera {
    fn from(camera: FreeCamera) -> Self {
        Self::Free(camera)
    }
}

impl From<FollowCamera> for Camera {
    fn from(camera: FollowCamera) -> Self {
        Self::Follow(camera)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-5
    }

    #[test]
    fn fresh_camera_vectors() {
        let cam = FreeCamera::new();
        assert_eq!(cam.forward(), Vec3::new(0.0, 0.0, -1.0));
        assert_eq!(cam.right(), Vec3::new(-1.0, 0.0, 0.0));
    }

    #[test]
    fn default_yaw_looks_down_negative_z() {
        let mut cam = FreeCamera::new();
        cam.view();
        assert!(approx(cam.forward(), Vec3::NEG_Z));
        assert!(approx(cam.right(), Vec3::X));
    }

    #[test]
    fn projection_recomputes_only_on_change() {
        let mut cam = Camera::Free(FreeCamera::new());
        let first = cam.projection(1.5);
        assert_eq!(cam.projection_updates(), 1);

        let second = cam.projection(1.5);
        assert_eq!(cam.projection_updates(), 1);
        assert_eq!(first.to_cols_array(), second.to_cols_array());

        cam.projection(1.5 + f32::EPSILON);
        assert_eq!(cam.projection_updates(), 2);

        if let Some(free) = cam.as_free_mut() {
            free.fov = 60.0;
        }
        cam.projection(1.5 + f32::EPSILON);
        assert_eq!(cam.projection_updates(), 3);
    }

    #[test]
    fn near_and_far_each_trigger_one_recompute() {
        let mut free = FreeCamera::new();
        free.projection(1.0);
        assert_eq!(free.cache.projection_updates, 1);
        free.near = 0.5;
        free.projection(1.0);
        assert_eq!(free.cache.projection_updates, 2);
        free.far = 500.0;
        free.projection(1.0);
        assert_eq!(free.cache.projection_updates, 3);
        free.projection(1.0);
        assert_eq!(free.cache.projection_updates, 3);

        let mut follow = FollowCamera::new(ModelId(0));
        follow.projection(1.0);
        assert_eq!(follow.cache.projection_updates, 1);
        follow.near = 0.5;
        follow.projection(1.0);
        assert_eq!(follow.cache.projection_updates, 2);
        follow.far = 500.0;
        follow.projection(1.0);
        assert_eq!(follow.cache.projection_updates, 3);
        follow.fov = 45.0;
        follow.projection(1.0);
        assert_eq!(follow.cache.projection_updates, 4);
        follow.projection(2.0);
        assert_eq!(follow.cache.projection_updates, 5);
        follow.projection(2.0);
        assert_eq!(follow.cache.projection_updates, 5);
    }

    #[test]
    fn view_recomputes_only_on_change() {
        let scene = Scene::new();
        let mut cam = Camera::Free(FreeCamera::new());
        let first = cam.view(&scene);
        let second = cam.view(&scene);
        assert_eq!(cam.view_updates(), 1);
        assert_eq!(first.to_cols_array(), second.to_cols_array());

        if let Some(free) = cam.as_free_mut() {
            free.position.x += 0.5;
        }
        cam.view(&scene);
        assert_eq!(cam.view_updates(), 2);

        if let Some(free) = cam.as_free_mut() {
            free.rotation.angle_x = 10.0;
        }
        cam.view(&scene);
        assert_eq!(cam.view_updates(), 3);
    }

    #[test]
    fn zeroed_camera_starts_with_identity_view() {
        let mut cam = FreeCamera::new();
        cam.rotation = Rotation::ZERO;
        assert_eq!(cam.view(), Mat4::IDENTITY);
        assert_eq!(cam.cache.view_updates, 0);
    }

    #[test]
    fn projection_uses_degrees() {
        let mut cam = FreeCamera::new();
        let proj = cam.projection(1.0);
        let expected = Mat4::perspective_rh(90f32.to_radians(), 1.0, 0.1, 1000.0);
        assert_eq!(proj, expected);
    }

    #[test]
    fn follow_camera_sits_behind_target() {
        let mut scene = Scene::new();
        let id = scene.create_model(Vec::new());
        let mut cam = FollowCamera::new(id);

        // A target at the origin with zero rotation matches the zeroed key.
        assert_eq!(cam.view(&scene), Mat4::IDENTITY);
        assert_eq!(cam.cache.view_updates, 0);

        if let Some(model) = scene.get_mut(id) {
            model.position = Vec3::new(0.0, 0.0, 5.0);
        }
        let view = cam.view(&scene);
        let eye = view.inverse().transform_point3(Vec3::ZERO);
        assert!(approx(eye, Vec3::new(0.0, 0.0, -5.0)));
        assert_eq!(cam.cache.view_updates, 1);

        cam.view(&scene);
        assert_eq!(cam.cache.view_updates, 1);
    }

    #[test]
    fn follow_camera_tracks_rotation() {
        let mut scene = Scene::new();
        let id = scene.create_model(Vec::new());
        let mut cam = Camera::Follow(FollowCamera::new(id));
        if let Some(model) = scene.get_mut(id) {
            model.position = Vec3::X;
            model.rotation = Rotation::new(0.0, 90.0, 0.0);
            model.update_orientation();
        }
        let view = cam.view(&scene);
        let eye = view.inverse().transform_point3(Vec3::ZERO);
        // Forward is +X after the yaw, so the eye trails along -X.
        assert!(approx(eye, Vec3::new(-9.0, 0.0, 0.0)));
        assert_eq!(cam.view_updates(), 1);
    }

    #[test]
    fn follow_without_target_keeps_cached_view() {
        let scene = Scene::new();
        let mut cam = FollowCamera::default();
        assert_eq!(cam.view(&scene), Mat4::IDENTITY);

        cam.target = Some(ModelId(42));
        assert_eq!(cam.view(&scene), Mat4::IDENTITY);
        assert_eq!(cam.cache.view_updates, 0);
    }
}
