use clap::{Parser, Subcommand};
use pixbox::request::Resource;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pixbox")]
#[command(about = "Load images through a chain of image managers", long_about = None)]
pub struct Cli {
    /// Configuration file (overrides PIXBOX_CONFIG)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load each resource and print the outcome as JSON
    Load(LoadArgs),
    /// Show which manager would handle each resource
    Route(RouteArgs),
}

#[derive(clap::Args, Debug)]
pub struct LoadArgs {
    /// URLs, file paths, `asset:<id>` or `<kind>:<id>`
    #[arg(required = true)]
    pub resources: Vec<Resource>,

    /// Target width in pixels; requires --height
    #[arg(long, requires = "height")]
    pub width: Option<u32>,

    /// Target height in pixels; requires --width
    #[arg(long, requires = "width")]
    pub height: Option<u32>,
}

#[derive(clap::Args, Debug)]
pub struct RouteArgs {
    #[arg(required = true)]
    pub resources: Vec<Resource>,
}
