use clap::{Parser, Subcommand};
use pagetree::{Project, config, output};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(name = "pagetree")]
#[command(about = "Static site generator built on a pluggable content tree")]
#[command(long_about = "\
Static site generator built on a pluggable content tree

Your filesystem is the data source. Directories become branches, files become
pages, and file names carry their kind: kind[.extra...].slug.ext.

Project structure:

  my-site/
  ├── project.yml                       # Project config (or .json / .yaml / .toml)
  ├── site/                             # Content
  │   ├── index.md                      # → _build/index.html
  │   ├── docs/
  │   │   └── page.setup.md             # → _build/docs/setup.html
  │   └── blog/                         # With `uses: [{extension: blog}]`
  │       └── post.1700000000000.hi.md  # → _build/blog/2023/11/14/hi.html
  ├── theme/
  │   └── base.html                     # Selected with `template: base.html`
  └── _build/                           # Output, replaced on every build

Pages are rendered as: front matter → Tera template → Markdown → theme chain.

Run 'pagetree init' to print a documented project.yml.")]
#[command(version)]
struct Cli {
    /// Project directory (holds the project file)
    #[arg(long, default_value = ".", global = true)]
    project: PathBuf,

    /// Log per-node progress (same as RUST_LOG=pagetree=debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse and render the site into the build directory
    Build,
    /// Parse the site and print the content tree without building
    Check,
    /// Print a stock project.yml with all options documented
    Init,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "pagetree=debug" } else { "pagetree=info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Build => {
            let project = Project::load(&cli.project)?;
            println!("==> Building {}", project.roots().site.display());
            let report = project.generate()?;
            output::print_build_output(&report);
        }
        Command::Check => {
            let project = Project::load(&cli.project)?;
            println!("==> Checking {}", project.roots().site.display());
            let tree = project.check()?;
            output::print_tree(&tree);
            println!("==> Content is valid");
        }
        Command::Init => {
            print!("{}", config::stock_config_yaml());
        }
    }

    Ok(())
}
