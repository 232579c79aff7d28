mod keymap;
mod ui;

use anyhow::{Context as _, Result};
use clap::Parser;
use egui::Context as EguiContext;
use flyby_common::FrameTimer;
use flyby_game::{CameraMode, Game, GameConfig};
use flyby_input::{Action, InputState};
use flyby_render_wgpu::WgpuApi;
use flyby_tools::{FpsCounter, InspectorState, LogBuffer};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{DeviceEvent, ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::PhysicalKey;
use winit::window::{CursorGrabMode, Fullscreen, Window, WindowId};

#[derive(Parser)]
#[command(name = "flyby-desktop", about = "Fly a ship through an instanced field")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// YAML game configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "1920")]
    width: u32,

    #[arg(long, default_value = "1080")]
    height: u32,

    /// Start in borderless fullscreen
    #[arg(long)]
    fullscreen: bool,

    /// Override the number of instanced models
    #[arg(long)]
    instances: Option<usize>,

    /// Seed for the instance field
    #[arg(long)]
    seed: Option<u64>,

    /// Fly the camera instead of the ship
    #[arg(long)]
    free_camera: bool,
}

impl Cli {
    fn game_config(&self) -> Result<GameConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let mut config = GameConfig::load(path)
                    .with_context(|| format!("loading {}", path.display()))?;
                if let Some(dir) = path.parent() {
                    config.rebase(dir);
                }
                config
            }
            None => GameConfig::default(),
        };
        if let Some(instances) = self.instances {
            config.instance_count = instances;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if self.free_camera {
            config.camera = CameraMode::Free;
        }
        Ok(config)
    }
}

/// Window and GPU objects, created on the first `resumed`.
struct Gpu {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    api: WgpuApi,
    egui_winit: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
}

struct App {
    cli: Cli,
    config: GameConfig,
    logs: LogBuffer,
    input: InputState,
    timer: FrameTimer,
    fps: FpsCounter,
    inspector: InspectorState,
    egui_ctx: EguiContext,
    gpu: Option<Gpu>,
    game: Option<Game>,
}

impl App {
    fn new(cli: Cli, config: GameConfig, logs: LogBuffer) -> Self {
        Self {
            cli,
            config,
            logs,
            input: InputState::new(),
            timer: FrameTimer::new(),
            fps: FpsCounter::default(),
            inspector: InspectorState::new(),
            egui_ctx: EguiContext::default(),
            gpu: None,
            game: None,
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let mut attrs = Window::default_attributes()
            .with_title("flyby")
            .with_inner_size(PhysicalSize::new(self.cli.width, self.cli.height))
            .with_resizable(true);
        if self.cli.fullscreen {
            attrs = attrs.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }
        let window = Arc::new(event_loop.create_window(attrs)?);

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance.create_surface(window.clone())?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("no suitable GPU adapter")?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("flyby_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        ))?;

        let size = window.inner_size();
        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first())
            .copied()
            .context("surface reports no formats")?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);
        self.input.set_viewport(size.width, size.height);

        let mut api = WgpuApi::new(device, queue, format, surface_config.width, surface_config.height);
        let mut game = Game::init(self.config.clone(), &mut api)?;
        game.set_fullscreen(self.cli.fullscreen);

        let egui_winit = egui_winit::State::new(
            self.egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );
        let egui_renderer = egui_wgpu::Renderer::new(api.device(), format, None, 1, false);

        set_mouse_capture(&window, game.is_mouse_captured());

        tracing::info!(
            backend = adapter.get_info().backend.to_str(),
            width = surface_config.width,
            height = surface_config.height,
            "GPU initialized"
        );

        self.gpu = Some(Gpu {
            window,
            surface,
            surface_config,
            api,
            egui_winit,
            egui_renderer,
        });
        self.game = Some(game);
        // The first frame should not include setup time.
        self.timer.update();
        Ok(())
    }

    fn handle_key(&mut self, code: winit::keyboard::KeyCode, pressed: bool) {
        if let Some(modifier) = keymap::modifier(code) {
            self.input.set_modifier(modifier, pressed);
        } else if let Some(key) = keymap::key(code) {
            if pressed {
                self.input.press(key);
            } else {
                self.input.release(key);
            }
        }
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        let Some(gpu) = &mut self.gpu else {
            return;
        };
        gpu.surface_config.width = size.width.max(1);
        gpu.surface_config.height = size.height.max(1);
        gpu.surface.configure(gpu.api.device(), &gpu.surface_config);
        gpu.api
            .resize(gpu.surface_config.width, gpu.surface_config.height);
        self.input.set_viewport(size.width, size.height);
    }

    /// One frame: update and draw the game, then the debug UI. Returns false
    /// when the game asked to quit.
    fn redraw(&mut self) -> bool {
        let (Some(gpu), Some(game)) = (&mut self.gpu, &mut self.game) else {
            return true;
        };

        let output = match gpu.surface.get_current_texture() {
            Ok(t) => t,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                gpu.surface.configure(gpu.api.device(), &gpu.surface_config);
                return true;
            }
            Err(e) => {
                tracing::error!("surface error: {e}");
                return true;
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.timer.update();
        self.fps.sample(&self.timer);
        let snapshot = self.input.end_frame();
        let actions = game.frame(&mut gpu.api, &snapshot, self.timer.elapsed_time());
        gpu.api.submit(&view, game.clear_color());

        let raw_input = gpu.egui_winit.take_egui_input(&gpu.window);
        let stats = self.fps.stats();
        let full_output = self.egui_ctx.run(raw_input, |ctx| {
            ui::draw(ctx, game, &mut self.inspector, &self.logs, stats);
        });
        gpu.egui_winit
            .handle_platform_output(&gpu.window, full_output.platform_output);
        let paint_jobs = self
            .egui_ctx
            .tessellate(full_output.shapes, full_output.pixels_per_point);
        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [gpu.surface_config.width, gpu.surface_config.height],
            pixels_per_point: full_output.pixels_per_point,
        };

        {
            let device = gpu.api.device();
            let queue = gpu.api.queue();
            for (id, image_delta) in &full_output.textures_delta.set {
                gpu.egui_renderer
                    .update_texture(device, queue, *id, image_delta);
            }
            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("egui_encoder"),
            });
            gpu.egui_renderer.update_buffers(
                device,
                queue,
                &mut encoder,
                &paint_jobs,
                &screen_descriptor,
            );
            {
                let mut pass = encoder
                    .begin_render_pass(&wgpu::RenderPassDescriptor {
                        label: Some("egui_pass"),
                        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                            view: &view,
                            resolve_target: None,
                            ops: wgpu::Operations {
                                load: wgpu::LoadOp::Load,
                                store: wgpu::StoreOp::Store,
                            },
                        })],
                        depth_stencil_attachment: None,
                        ..Default::default()
                    })
                    .forget_lifetime();
                gpu.egui_renderer
                    .render(&mut pass, &paint_jobs, &screen_descriptor);
            }
            queue.submit(std::iter::once(encoder.finish()));
            for id in &full_output.textures_delta.free {
                gpu.egui_renderer.free_texture(id);
            }
        }

        output.present();

        let mut keep_running = true;
        for action in actions {
            apply_action(&gpu.window, action);
            keep_running &= !action.ends_loop();
        }
        keep_running
    }
}

fn apply_action(window: &Window, action: Action) {
    match action {
        Action::Quit => tracing::info!("quit requested"),
        Action::SetFullscreen(on) => {
            window.set_fullscreen(on.then_some(Fullscreen::Borderless(None)));
            tracing::info!(fullscreen = on, "window mode changed");
        }
        Action::SetMouseCapture(on) => set_mouse_capture(window, on),
    }
}

/// Lock (or at least confine) and hide the cursor, or release it.
fn set_mouse_capture(window: &Window, captured: bool) {
    let grab = if captured {
        window
            .set_cursor_grab(CursorGrabMode::Locked)
            .or_else(|_| window.set_cursor_grab(CursorGrabMode::Confined))
    } else {
        window.set_cursor_grab(CursorGrabMode::None)
    };
    if let Err(e) = grab {
        tracing::warn!("cursor grab failed: {e}");
    }
    window.set_cursor_visible(!captured);
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.gpu.is_some() {
            return;
        }
        if let Err(e) = self.init(event_loop) {
            tracing::error!("failed to start: {e:#}");
            event_loop.exit();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        if let Some(gpu) = &mut self.gpu {
            let response = gpu.egui_winit.on_window_event(&gpu.window, &event);
            if response.consumed {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => self.resize(size),
            WindowEvent::Focused(false) => self.input.clear_keys(),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state,
                        repeat: false,
                        ..
                    },
                ..
            } => {
                self.handle_key(code, state == ElementState::Pressed);
            }
            WindowEvent::RedrawRequested => {
                if !self.redraw() {
                    event_loop.exit();
                    return;
                }
                if let Some(gpu) = &self.gpu {
                    gpu.window.request_redraw();
                }
            }
            _ => {}
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: winit::event::DeviceId,
        event: DeviceEvent,
    ) {
        if let DeviceEvent::MouseMotion { delta } = event {
            self.input.mouse_motion(delta.0 as f32, delta.1 as f32);
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(gpu) = &self.gpu {
            gpu.window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(game) = &self.game {
            tracing::info!(frames = game.frames(), "flyby-desktop exiting");
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let logs = LogBuffer::default();
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer())
        .with(logs.layer())
        .init();

    tracing::info!("flyby-desktop starting");
    let config = cli.game_config()?;

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(cli, config, logs);
    event_loop.run_app(&mut app)?;

    Ok(())
}
