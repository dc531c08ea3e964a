use clap::{Parser, Subcommand};
use rfbake::rules::{AuditWriter, NodeTree};
use rfbake::{BakeConfig, RuleEngine};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "rfbake", version, about = "Bake rendered DOM nodes into raster assets")]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the bake rules over an analyzed tree and write the audit files
    Plan {
        #[arg(long)]
        tree: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Plan, then capture every node of the document
    Bake {
        #[arg(long)]
        document: PathBuf,
        #[arg(long)]
        tree: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
        /// Isolate and measure without writing images
        #[arg(long)]
        dry_run: bool,
    },
}

fn load_config(path: Option<&Path>, out: Option<PathBuf>) -> anyhow::Result<BakeConfig> {
    let mut config = match path {
        Some(p) => BakeConfig::load(p)?,
        None => BakeConfig::default(),
    };
    config.apply_env()?;
    if let Some(out) = out {
        config.output_dir = out;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Plan { tree, out } => {
            let config = load_config(cli.config.as_deref(), out)?;
            let tree = NodeTree::load(&tree)?;
            let plan = RuleEngine::new(config.rules).plan(&tree);
            let files = AuditWriter::new(&config.output_dir).write(&plan)?;
            println!(
                "{} entries, {} rule firings -> {}",
                plan.entries.len(),
                plan.traces.len(),
                files.plan.display()
            );
        }
        Command::Bake { document, tree, out, dry_run } => {
            let config = load_config(cli.config.as_deref(), out)?;
            let tree = NodeTree::load(&tree)?;
            bake(config, &document, &tree, dry_run).await?;
        }
    }
    Ok(())
}

#[cfg(feature = "cdp")]
async fn bake(config: BakeConfig, document: &Path, tree: &NodeTree, dry_run: bool) -> anyhow::Result<()> {
    use rfbake::{Baker, DirectoryAllocator, RenderSession};

    let session = RenderSession::chrome(config.session.clone());
    let allocator = DirectoryAllocator::new(&config.output_dir);
    let baker = Baker::new(&session, &allocator, RuleEngine::new(config.rules), &config.output_dir).dry_run(dry_run);
    let outcome = baker.bake(document, tree).await;
    session.close().await?;
    let report = outcome?;
    println!(
        "{} variants for {} nodes, {} failures -> {}",
        report.variant_count(),
        report.nodes.len(),
        report.failures.len(),
        config.output_dir.display()
    );
    Ok(())
}

#[cfg(not(feature = "cdp"))]
async fn bake(_config: BakeConfig, _document: &Path, _tree: &NodeTree, _dry_run: bool) -> anyhow::Result<()> {
    anyhow::bail!("rfbake was built without a rendering backend; rebuild with `--features cdp`")
}
