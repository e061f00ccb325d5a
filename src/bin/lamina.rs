use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

use lamina::{
    editor::DEFAULT_CANVAS_SIZE, ComputedCache, EditorSession, FontCatalog, LayerStack, Surface,
};

#[derive(Parser, Debug)]
#[command(name = "lamina", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Composite a saved layer list to a PNG.
    Render(RenderArgs),
    /// Render the built-in starter composition to a PNG.
    Demo(DemoArgs),
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Input layer-list JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Output width in pixels.
    #[arg(long, default_value_t = DEFAULT_CANVAS_SIZE)]
    width: u32,

    /// Output height in pixels.
    #[arg(long, default_value_t = DEFAULT_CANVAS_SIZE)]
    height: u32,
}

#[derive(Parser, Debug)]
struct DemoArgs {
    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Output width in pixels.
    #[arg(long, default_value_t = DEFAULT_CANVAS_SIZE)]
    width: u32,

    /// Output height in pixels.
    #[arg(long, default_value_t = DEFAULT_CANVAS_SIZE)]
    height: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Render(args) => {
            let layers = EditorSession::load_state_from(&args.in_path)
                .with_context(|| format!("load layers '{}'", args.in_path.display()))?;
            render_layers(&layers, args.width, args.height, &args.out).await
        }
        Command::Demo(args) => {
            let layers = EditorSession::demo_composition();
            render_layers(&layers, args.width, args.height, &args.out).await
        }
    }
}

async fn render_layers(
    layers: &LayerStack,
    width: u32,
    height: u32,
    out: &Path,
) -> anyhow::Result<()> {
    let mut cache = ComputedCache::new();
    cache.compute_outdated(layers).await;

    let mut surface = Surface::new(width, height);
    let fonts = FontCatalog::system();
    lamina::compositor::render(&mut surface, layers, &cache, &fonts);

    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    surface.write_png(out)?;
    cache.clear();

    eprintln!("wrote {}", out.display());
    Ok(())
}
