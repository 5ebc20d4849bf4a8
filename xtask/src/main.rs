use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process::{Command, Stdio};

#[derive(Parser)]
#[command(name = "xtask", about = "Workspace automation for multiworld")]
struct Cli {
    #[command(subcommand)]
    command: Task,
}

#[derive(Subcommand)]
enum Task {
    /// fmt, clippy, tests and docs in sequence
    Check,
    /// cargo fmt --check
    Fmt,
    /// clippy with warnings denied
    Clippy,
    /// Run all tests
    Test,
    /// Build rustdoc for the workspace
    Doc,
    /// Build the entire workspace
    Build,
    /// Run the demo scenes for a bounded number of iterations
    Demo {
        /// Engines to run every scene with
        #[arg(short, long, num_args = 1.., default_values = ["ode", "bullet", "dart"])]
        engines: Vec<String>,
        #[arg(short, long, default_value = "500")]
        iterations: u64,
    },
}

fn main() -> Result<()> {
    match Cli::parse().command {
        Task::Check => {
            fmt()?;
            clippy()?;
            test()?;
            doc()?;
        }
        Task::Fmt => fmt()?,
        Task::Clippy => clippy()?,
        Task::Test => test()?,
        Task::Doc => doc()?,
        Task::Build => cargo(&["build", "--workspace"])?,
        Task::Demo {
            engines,
            iterations,
        } => demo(&engines, iterations)?,
    }
    Ok(())
}

/// Run cargo with `args`, failing on a non-zero exit.
fn cargo(args: &[&str]) -> Result<()> {
    println!("==> cargo {}", args.join(" "));
    let status = Command::new("cargo").args(args).status()?;
    if !status.success() {
        anyhow::bail!("cargo {} failed", args[0]);
    }
    Ok(())
}

fn fmt() -> Result<()> {
    cargo(&["fmt", "--all", "--", "--check"])
}

fn clippy() -> Result<()> {
    cargo(&["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"])
}

fn test() -> Result<()> {
    cargo(&["test", "--workspace"])
}

fn doc() -> Result<()> {
    cargo(&["doc", "--workspace", "--no-deps"])
}

/// The server unpauses on end of input, so a closed stdin starts the run
/// right away.
fn demo(engines: &[String], iterations: u64) -> Result<()> {
    let iterations = iterations.to_string();
    let mut args = vec![
        "run",
        "-p",
        "multiworld-server",
        "--",
        "demos/scenes/falling_boxes.yaml",
        "demos/scenes/pendulum_links.yaml",
        "--iterations",
        iterations.as_str(),
        "--engines",
    ];
    args.extend(engines.iter().map(String::as_str));
    println!("==> cargo {}", args.join(" "));
    let status = Command::new("cargo")
        .args(&args)
        .env("MULTIWORLD_RESOURCE_PATH", "demos/scenes")
        .stdin(Stdio::null())
        .status()?;
    if !status.success() {
        anyhow::bail!("demo run failed");
    }
    Ok(())
}
