use anyhow::Context as _;
use clap::{Parser, Subcommand};
use flyby_assets::{ImportFlags, ModelLoader};
use flyby_game::{CameraMode, Game, GameConfig};
use flyby_input::{InputState, Key, Modifiers};
use flyby_render::{RecordingApi, TextureRegistry, setup_model, shaders};
use flyby_scene::Scene;
use flyby_tools::{FpsCounter, ModelInspector};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flyby-cli", about = "Headless tools for the flyby sandbox")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version, built-in shaders and the default configuration
    Info,
    /// Import a model and print its mesh table
    Inspect {
        model: PathBuf,
        /// Generate smooth instead of per-face normals
        #[arg(long)]
        smooth: bool,
    },
    /// Run the game loop without a window and report what was drawn
    DryRun {
        #[arg(short, long, default_value = "60")]
        frames: u32,
        /// Number of instanced models
        #[arg(short, long, default_value = "1000")]
        instances: usize,
        /// YAML game configuration
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long, default_value = "42")]
        seed: u64,
        /// Fly the camera instead of the ship
        #[arg(long)]
        free_camera: bool,
    },
}

/// Draw statistics from a headless run.
#[derive(Debug, Clone, PartialEq)]
struct DryRunReport {
    frames: u64,
    draw_calls: usize,
    instanced_draws: Vec<(u32, u32)>,
    ship_position: [f32; 3],
    ship_velocity: f32,
}

/// Run `frames` frames at a fixed 60 Hz step. The ship boosts and pitches up
/// for the first half and coasts for the rest.
fn dry_run(config: GameConfig, frames: u32) -> anyhow::Result<DryRunReport> {
    let mut api = RecordingApi::new();
    let mut game = Game::init(config, &mut api)?;
    api.take_commands();

    let dt = 1.0 / 60.0;
    let mut input = InputState::new();
    input.set_viewport(1920, 1080);
    for frame in 0..frames {
        let boosting = frame < frames / 2;
        input.set_modifier(Modifiers::LSHIFT, boosting);
        if boosting {
            input.press(Key::W);
        } else {
            input.release(Key::W);
        }
        let snapshot = input.end_frame();
        for action in game.frame(&mut api, &snapshot, dt) {
            tracing::debug!(?action, frame, "action ignored in dry run");
        }
    }

    let ship = game
        .scene()
        .get(game.ship())
        .map(|model| model.position.to_array())
        .unwrap_or_default();
    Ok(DryRunReport {
        frames: game.frames(),
        draw_calls: api.draw_calls(),
        instanced_draws: api.instanced_draws(),
        ship_position: ship,
        ship_velocity: game.ship_velocity(),
    })
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("flyby-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("import presets: default={:?}", ImportFlags::DEFAULT);
            println!("                smooth={:?}", ImportFlags::SMOOTH);
            println!("shaders:");
            for name in ["basic", "basic_instanced", "textured", "unlit"] {
                if let Some(source) = shaders::by_name(name) {
                    println!(
                        "  {:<16} uniforms={} samplers={}",
                        source.label,
                        source.uniforms.len(),
                        source.samplers.len()
                    );
                }
            }
            println!("default config:");
            print!("{}", GameConfig::default().to_yaml()?);
        }
        Commands::Inspect { model, smooth } => {
            let flags = if smooth {
                ImportFlags::SMOOTH
            } else {
                ImportFlags::DEFAULT
            };
            let mut api = RecordingApi::new();
            let mut scene = Scene::new();
            let mut textures = TextureRegistry::new();
            let id = ModelLoader::new()
                .load_model(&mut scene, &mut textures, &mut api, &model, flags)
                .with_context(|| format!("loading {}", model.display()))?;
            if let Some(loaded) = scene.get_mut(id) {
                setup_model(&mut api, loaded);
            }

            println!("{}", ModelInspector::summary(&scene));
            if let Some(info) = ModelInspector::inspect_id(&scene, id) {
                print!("{info}");
            }
            for texture in textures.iter() {
                println!(
                    "  texture {:<24} {}x{}",
                    texture.name, texture.width, texture.height
                );
            }
        }
        Commands::DryRun {
            frames,
            instances,
            config,
            seed,
            free_camera,
        } => {
            let mut game_config = match &config {
                Some(path) => {
                    let mut loaded = GameConfig::load(path)
                        .with_context(|| format!("loading {}", path.display()))?;
                    if let Some(dir) = path.parent() {
                        loaded.rebase(dir);
                    }
                    loaded
                }
                None => GameConfig::default(),
            };
            game_config.instance_count = instances;
            game_config.seed = Some(seed);
            if free_camera {
                game_config.camera = CameraMode::Free;
            }

            let started = std::time::Instant::now();
            let report = dry_run(game_config, frames)?;
            let mut fps = FpsCounter::default();
            if report.frames > 0 {
                fps.push(started.elapsed().as_secs_f32() / report.frames as f32);
            }

            println!("Dry run: frames={} instances={instances}", report.frames);
            println!("Draw calls: {}", report.draw_calls);
            println!("Instanced draws: {}", report.instanced_draws.len());
            if let Some((indices, count)) = report.instanced_draws.first() {
                println!("  per frame: {indices} indices x {count} instances");
            }
            println!(
                "Ship: position=({:.2}, {:.2}, {:.2}) velocity={:.2}",
                report.ship_position[0],
                report.ship_position[1],
                report.ship_position[2],
                report.ship_velocity
            );
            println!("Headless {}", fps.stats());
        }
    }

    Ok(())
}
