//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Bengal static site generator CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run one full build
    #[command(visible_alias = "b")]
    Build {
        #[command(flatten)]
        build_args: BuildArgs,
    },

    /// Build, then start the dev server with watch and live reload
    #[command(visible_alias = "s")]
    Serve {
        #[command(flatten)]
        build_args: BuildArgs,

        /// Network interface to bind (e.g. 127.0.0.1, 0.0.0.0)
        #[arg(long)]
        host: Option<String>,

        /// Port number to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Open a browser after the first successful build
        #[arg(long)]
        open: bool,

        /// Enable file watching for auto-rebuild
        #[arg(long, overrides_with = "no_watch")]
        watch: bool,

        /// Disable file watching
        #[arg(long)]
        no_watch: bool,
    },

    /// Scaffold a new site or page
    New {
        #[command(subcommand)]
        target: NewTarget,
    },

    /// Delete the output directory
    Clean {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Theme template customization
    Theme {
        #[command(subcommand)]
        action: ThemeAction,
    },

    /// Run documentation extractors
    Autodoc {
        /// Extractor to run (python, api, cli); all configured when omitted
        kind: Option<String>,
    },

    /// Print a knowledge-graph summary of the site
    Graph {
        /// Per-page dependency tree
        #[arg(long)]
        tree: bool,

        /// Aggregate dependency statistics
        #[arg(long)]
        stats: bool,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum NewTarget {
    /// Scaffold a new site directory
    Site {
        /// Site directory name
        name: PathBuf,
    },
    /// Scaffold a new Markdown page with frontmatter
    Page {
        /// Content-relative path, e.g. docs/getting-started.md
        path: PathBuf,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ThemeAction {
    /// Copy a theme template into the project for customization
    Swizzle {
        /// Template name, e.g. page.html or partials/nav.html
        template: String,
    },
    /// List swizzled templates and their update state
    SwizzleList,
    /// Re-copy swizzled templates whose upstream changed and whose local
    /// copy is pristine
    SwizzleUpdate,
}

/// Build flag presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Profile {
    /// Fast iteration on content: incremental, quiet
    Writer,
    /// Template work: incremental with explain output
    ThemeDev,
    /// Everything visible: drafts included, verbose
    Dev,
}

/// Shared build arguments for Build and Serve commands
#[derive(clap::Args, Debug, Clone)]
pub struct BuildArgs {
    /// Use the incremental cache (--incremental=false forces full builds)
    #[arg(long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
    pub incremental: Option<bool>,

    /// Render with the parallel worker pool
    #[arg(long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false, overrides_with = "sequential")]
    pub parallel: Option<bool>,

    /// Render pages one at a time
    #[arg(long)]
    pub sequential: bool,

    /// Non-zero exit when any page fails
    #[arg(long)]
    pub strict: bool,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Enable verbose output for debugging
    #[arg(short = 'V', long)]
    pub verbose: bool,

    /// Print the rebuild plan as a table
    #[arg(long)]
    pub explain: bool,

    /// Print the rebuild plan as JSON
    #[arg(long)]
    pub explain_json: bool,

    /// Classify and plan only; skip rendering, assets and postprocess
    #[arg(long)]
    pub dry_run: bool,

    /// Flag preset
    #[arg(long, value_enum)]
    pub profile: Option<Profile>,

    /// Rebuild everything regardless of the cache
    #[arg(short, long)]
    pub force: bool,

    /// Output directory override
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub output: Option<PathBuf>,

    /// Include draft pages
    #[arg(short = 'D', long)]
    pub drafts: bool,

    /// Serialized BuildInput for out-of-process builds (internal)
    #[arg(long, hide = true)]
    pub input_json: Option<PathBuf>,

    /// Write machine-readable stats on exit (internal)
    #[arg(long, hide = true)]
    pub emit_stats: Option<PathBuf>,
}

impl BuildArgs {
    /// Apply the selected profile's presets; explicit flags win.
    pub fn apply_profile(&mut self) {
        match self.profile {
            Some(Profile::Writer) => {
                self.incremental.get_or_insert(true);
                self.quiet = true;
            }
            Some(Profile::ThemeDev) => {
                self.incremental.get_or_insert(true);
                if !self.explain_json {
                    self.explain = true;
                }
            }
            Some(Profile::Dev) => {
                self.incremental.get_or_insert(true);
                self.drafts = true;
                self.verbose = true;
            }
            None => {}
        }
    }
}
