//! The flyby sandbox: a ship flying through an instanced field of rocks.
//!
//! [`Game`] owns the scene, the camera and the controls. A host (the desktop
//! app or the headless CLI) feeds it one [`InputSnapshot`] per frame, applies
//! the [`Action`]s it returns and lends it a [`GraphicsApi`] to draw with.
//!
//! # Invariants
//! - The ship's orientation is refreshed exactly once per update, before the
//!   controls read it.
//! - Instances are uploaded once at startup; draws only rebind the buffer.

pub mod config;
pub mod controls;
pub mod instances;

pub use config::{CameraMode, ConfigError, GameConfig, PrimitiveTopology};
pub use controls::{ShipControl, control_camera};
pub use instances::{Bounds, BoundsError, create_instance_locations};

use flyby_assets::{AssetError, ModelLoader};
use flyby_common::{ModelId, ProgramId, Random};
use flyby_input::{Action, InputSnapshot, Key};
use flyby_render::shaders::{self, INSTANCE_BINDING};
use flyby_render::{
    Camera, FollowCamera, FreeCamera, GraphicsApi, InstanceBuffer, RenderError, RenderSettings,
    Renderer, TextureRegistry, UniformValue, setup_model, uniforms::set_uniform,
};
use flyby_scene::{Scene, primitives};
use std::path::Path;
use tracing::{info, warn};

/// Errors that stop the game from starting.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("render error: {0}")]
    Render(#[from] RenderError),
    #[error("asset error: {0}")]
    Asset(#[from] AssetError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("invalid instance bounds: {0}")]
    Bounds(#[from] BoundsError),
}

/// Programs created at startup.
#[derive(Debug, Clone, Copy)]
struct Programs {
    basic: ProgramId,
    instanced: ProgramId,
}

/// Game state between frames.
pub struct Game {
    config: GameConfig,
    scene: Scene,
    textures: TextureRegistry,
    renderer: Renderer,
    camera: Camera,
    ship: ModelId,
    cubes: ModelId,
    instances: InstanceBuffer,
    ship_control: ShipControl,
    fullscreen: bool,
    mouse_captured: bool,
    frames: u64,
}

impl Game {
    /// Load shaders and models, scatter the instances and upload everything.
    ///
    /// Models that fail to load become unit cubes when
    /// [`GameConfig::fallback_to_primitives`] is set; otherwise the error is
    /// returned.
    pub fn init(config: GameConfig, api: &mut dyn GraphicsApi) -> Result<Self, GameError> {
        config.validate()?;
        let programs = Programs {
            basic: shaders::load_shader(api, &shaders::basic())?,
            instanced: shaders::load_shader(api, &shaders::basic_instanced())?,
        };

        let loader = ModelLoader::new();
        let mut scene = Scene::new();
        let mut textures = TextureRegistry::new();
        let flags = config.import_flags();

        let (ship, ship_fallback) = load_or_fallback(
            &loader,
            &config,
            &mut scene,
            &mut textures,
            api,
            &config.ship_model,
        )?;

        let mut rng = match config.seed {
            Some(seed) => Random::with_seed(seed),
            None => Random::from_entropy(),
        };
        let locations = create_instance_locations(
            config.instance_count,
            &config.instance_bounds,
            &mut rng,
            config.randomize_rotation,
        )?;
        let instances = InstanceBuffer::upload(api, &locations, INSTANCE_BINDING);

        let (cubes, _) = load_or_fallback(
            &loader,
            &config,
            &mut scene,
            &mut textures,
            api,
            &config.cube_model,
        )?;
        scene.set_shader(cubes, programs.instanced);

        let ship_program = if ship_fallback {
            let unlit = shaders::load_shader(api, &shaders::unlit())?;
            set_uniform(api, unlit, "tint", UniformValue::Vec4(config.fallback_tint));
            unlit
        } else if scene
            .get(ship)
            .is_some_and(|model| model.meshes().iter().any(|mesh| mesh.has_textures()))
        {
            shaders::load_shader(api, &shaders::textured())?
        } else {
            programs.basic
        };
        scene.set_shader(ship, ship_program);

        if let Some(model) = scene.get_mut(ship) {
            model.position += config.ship_offset;
        }
        for id in [ship, cubes] {
            if let Some(model) = scene.get_mut(id) {
                setup_model(api, model);
            }
        }

        let camera = match config.camera {
            CameraMode::Follow => Camera::Follow({
                let mut follow = FollowCamera::new(ship);
                follow.distance = config.follow_distance;
                follow
            }),
            CameraMode::Free => Camera::Free(FreeCamera::new()),
        };
        let renderer = Renderer::new(RenderSettings {
            topology: config.topology.into(),
        });

        info!(
            models = scene.len(),
            instances = instances.len(),
            textures = textures.len(),
            ?flags,
            "game initialized"
        );
        Ok(Self {
            config,
            scene,
            textures,
            renderer,
            camera,
            ship,
            cubes,
            instances,
            ship_control: ShipControl::default(),
            fullscreen: false,
            mouse_captured: true,
            frames: 0,
        })
    }

    /// Handle window requests and run the controls for this frame.
    pub fn on_update(&mut self, input: &InputSnapshot, dt: f32) -> Vec<Action> {
        let mut actions = Vec::new();
        if input.is_key_down(Key::Escape) {
            actions.push(Action::Quit);
        }
        if input.is_key_up(Key::F) {
            self.fullscreen = !self.fullscreen;
            actions.push(Action::SetFullscreen(self.fullscreen));
        }
        if input.is_key_up(Key::M) {
            self.mouse_captured = !self.mouse_captured;
            actions.push(Action::SetMouseCapture(self.mouse_captured));
        }
        self.renderer.set_aspect(input.aspect);

        let Some(ship) = self.scene.get_mut(self.ship) else {
            warn!(model = self.ship.0, "ship model missing");
            return actions;
        };
        ship.update_orientation();

        match &mut self.camera {
            Camera::Follow(_) => self.ship_control.apply(ship, input, dt),
            Camera::Free(camera) => control_camera(camera, input, dt, self.mouse_captured),
        }
        actions
    }

    /// Draw the instanced field, then the ship.
    pub fn on_draw(&mut self, api: &mut dyn GraphicsApi) {
        if let Some(cubes) = self.scene.get(self.cubes) {
            self.renderer.draw_instanced(
                api,
                &mut self.camera,
                &self.scene,
                cubes,
                &self.instances,
                self.instances.len() as u32,
            );
        }
        if let Some(ship) = self.scene.get(self.ship) {
            self.renderer
                .draw(api, &mut self.camera, &self.scene, ship);
        }
        self.frames += 1;
    }

    /// One full frame: update, then draw.
    pub fn frame(
        &mut self,
        api: &mut dyn GraphicsApi,
        input: &InputSnapshot,
        dt: f32,
    ) -> Vec<Action> {
        let actions = self.on_update(input, dt);
        self.on_draw(api);
        actions
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// For the inspector's position and rotation editors.
    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn textures(&self) -> &TextureRegistry {
        &self.textures
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn ship(&self) -> ModelId {
        self.ship
    }

    pub fn cubes(&self) -> ModelId {
        self.cubes
    }

    pub fn instances(&self) -> &InstanceBuffer {
        &self.instances
    }

    pub fn ship_velocity(&self) -> f32 {
        self.ship_control.velocity
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    /// Sync with a window that was created fullscreen, so the next F toggles
    /// back to windowed.
    pub fn set_fullscreen(&mut self, fullscreen: bool) {
        self.fullscreen = fullscreen;
    }

    pub fn is_mouse_captured(&self) -> bool {
        self.mouse_captured
    }

    /// Frames drawn so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn clear_color(&self) -> [f64; 4] {
        self.config.clear_color
    }
}

/// Load `path`, or stand in a unit cube when the config allows it. The flag
/// is true for the stand-in.
fn load_or_fallback(
    loader: &ModelLoader,
    config: &GameConfig,
    scene: &mut Scene,
    textures: &mut TextureRegistry,
    api: &mut dyn GraphicsApi,
    path: &Path,
) -> Result<(ModelId, bool), GameError> {
    match loader.load_model(scene, textures, api, path, config.import_flags()) {
        Ok(id) => Ok((id, false)),
        Err(err) if config.fallback_to_primitives => {
            warn!(path = %path.display(), error = %err, "using a unit cube instead");
            Ok((scene.create_model(vec![primitives::cube(1.0)]), true))
        }
        Err(err) => Err(err.into()),
    }
}
