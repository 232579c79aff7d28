use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::Command;

#[derive(Parser)]
#[command(name = "xtask", about = "Workspace automation for flyby")]
struct Cli {
    #[command(subcommand)]
    command: Task,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
enum Task {
    /// Format check, clippy, tests and a headless smoke run
    Check,
    /// cargo fmt --check over the workspace
    Fmt,
    /// clippy with warnings denied, all targets
    Clippy,
    /// Run the tests of one crate, or of the whole workspace
    Test {
        /// Crate name, e.g. flyby-render
        #[arg(short, long)]
        package: Option<String>,
    },
    /// Run the game loop headless through flyby-cli
    Smoke {
        #[arg(long, default_value = "120")]
        frames: u32,
        #[arg(long, default_value = "5000")]
        instances: usize,
    },
    /// Print the mesh table of a model through flyby-cli
    Inspect {
        model: PathBuf,
        #[arg(long)]
        smooth: bool,
    },
    /// Launch the desktop sandbox in release mode
    Fly {
        /// YAML game configuration
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

impl Task {
    /// Arguments handed to `cargo` for this task. `Check` expands into
    /// several tasks and has none of its own.
    fn cargo_args(&self) -> Vec<String> {
        match self {
            Task::Check => Vec::new(),
            Task::Fmt => ["fmt", "--all", "--", "--check"].map(String::from).to_vec(),
            Task::Clippy => ["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"]
                .map(String::from)
                .to_vec(),
            Task::Test { package } => match package {
                Some(name) => vec!["test".into(), "-p".into(), name.clone()],
                None => vec!["test".into(), "--workspace".into()],
            },
            Task::Smoke { frames, instances } => {
                let mut args = cli_args("dry-run");
                args.extend([
                    "--frames".into(),
                    frames.to_string(),
                    "--instances".into(),
                    instances.to_string(),
                ]);
                args
            }
            Task::Inspect { model, smooth } => {
                let mut args = cli_args("inspect");
                args.push(model.display().to_string());
                if *smooth {
                    args.push("--smooth".into());
                }
                args
            }
            Task::Fly { config } => {
                let mut args: Vec<String> = ["run", "--release", "-p", "flyby-desktop", "--"]
                    .map(String::from)
                    .to_vec();
                if let Some(path) = config {
                    args.extend(["--config".into(), path.display().to_string()]);
                }
                args
            }
        }
    }
}

fn cli_args(subcommand: &str) -> Vec<String> {
    ["run", "--quiet", "-p", "flyby-cli", "--", subcommand]
        .map(String::from)
        .to_vec()
}

fn run(task: &Task) -> Result<()> {
    if *task == Task::Check {
        for step in [
            Task::Fmt,
            Task::Clippy,
            Task::Test { package: None },
            Task::Smoke {
                frames: 30,
                instances: 1000,
            },
        ] {
            run(&step)?;
        }
        return Ok(());
    }

    let args = task.cargo_args();
    println!("==> cargo {}", args.join(" "));
    let status = Command::new("cargo").args(&args).status()?;
    if !status.success() {
        anyhow::bail!("{task:?} failed");
    }
    Ok(())
}

fn main() -> Result<()> {
    run(&Cli::parse().command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smoke_runs_the_cli_dry_run() {
        let args = Task::Smoke {
            frames: 10,
            instances: 50,
        }
        .cargo_args();
        assert_eq!(
            args,
            [
                "run", "--quiet", "-p", "flyby-cli", "--", "dry-run", "--frames", "10",
                "--instances", "50"
            ]
        );
    }

    #[test]
    fn test_can_target_one_crate() {
        let one = Task::Test {
            package: Some("flyby-game".into()),
        };
        assert_eq!(one.cargo_args(), ["test", "-p", "flyby-game"]);
        assert_eq!(
            Task::Test { package: None }.cargo_args(),
            ["test", "--workspace"]
        );
    }

    #[test]
    fn inspect_and_fly_forward_their_options() {
        let inspect = Task::Inspect {
            model: PathBuf::from("assets/models/ico_low.obj"),
            smooth: true,
        };
        assert_eq!(
            inspect.cargo_args()[5..],
            ["inspect", "assets/models/ico_low.obj", "--smooth"]
        );

        let fly = Task::Fly {
            config: Some(PathBuf::from("flyby.yaml")),
        };
        assert_eq!(
            fly.cargo_args(),
            ["run", "--release", "-p", "flyby-desktop", "--", "--config", "flyby.yaml"]
        );
        assert!(Task::Check.cargo_args().is_empty());
    }
}
