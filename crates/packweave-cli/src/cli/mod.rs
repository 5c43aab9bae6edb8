//! CLI argument definitions using the clap derive API.
//!
//! This module is the *only* place that knows about argument names, aliases,
//! help text, and value enums.  No business logic lives here.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

pub mod global;
pub use global::{GlobalArgs, OutputFormat};

// ── Top-level CLI ─────────────────────────────────────────────────────────────

/// Main CLI entry-point.
#[derive(Debug, Parser)]
#[command(
    name    = "packweave",
    bin_name = "packweave",
    version  = env!("CARGO_PKG_VERSION"),
    author   = env!("CARGO_PKG_AUTHORS"),
    about    = "Compose project scaffolds from reusable packs",
    long_about = "packweave resolves a set of versioned packs, merges their modules \
                  and dependencies, renders their templates and writes the result \
                  as a new project.",
    after_help = "EXAMPLES:\n\
        \x20 packweave new my-app --group com.example --pack org.packweave:kotlin-jvm\n\
        \x20 packweave new my-api -g com.example -p org.packweave:ktor -D port=9000\n\
        \x20 packweave list --format json\n\
        \x20 packweave archive packs.json --packs-dir ./packs",
    arg_required_else_help = true,
    subcommand_required    = true,
)]
pub struct Cli {
    /// Flags available on every subcommand.
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

// ── Subcommands ───────────────────────────────────────────────────────────────

/// All available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Generate a new project from packs.
    #[command(
        visible_alias = "n",
        about = "Create a new project",
        after_help = "EXAMPLES:\n\
            \x20 packweave new my-app -g com.example -p org.packweave:kotlin-jvm\n\
            \x20 packweave new my-app -g com.example -p org.packweave:ktor -D port=9000 --yes\n\
            \x20 packweave new my-app -g com.example -p org.packweave:ktor --dry-run"
    )]
    New(NewArgs),

    /// List available packs.
    #[command(
        visible_alias = "ls",
        about = "List available packs",
        after_help = "EXAMPLES:\n\
            \x20 packweave list\n\
            \x20 packweave list --tag kotlin\n\
            \x20 packweave list --format csv"
    )]
    List(ListArgs),

    /// Write the active repository to a single archive file.
    #[command(
        about = "Snapshot packs into an archive",
        after_help = "EXAMPLES:\n\
            \x20 packweave archive packs.json --packs-dir ./packs\n\
            \x20 packweave archive packs.pwv --format framed"
    )]
    Archive(ArchiveArgs),

    /// Initialise a packweave configuration file.
    #[command(
        about = "Initialise configuration",
        after_help = "EXAMPLES:\n\
            \x20 packweave init           # default location\n\
            \x20 packweave init --local   # ./.packweave.toml"
    )]
    Init(InitArgs),

    /// Generate shell completion scripts.
    #[command(
        about = "Generate shell completions",
        after_help = "EXAMPLES:\n\
            \x20 packweave completions bash > ~/.local/share/bash-completion/completions/packweave\n\
            \x20 packweave completions zsh  > ~/.zfunc/_packweave\n\
            \x20 packweave completions fish > ~/.config/fish/completions/packweave.fish"
    )]
    Completions(CompletionsArgs),

    /// Inspect the packweave configuration.
    #[command(
        about = "Configuration management",
        subcommand,
        after_help = "EXAMPLES:\n\
            \x20 packweave config get defaults.group\n\
            \x20 packweave config list\n\
            \x20 packweave config path"
    )]
    Config(ConfigCommands),
}

// ── new ───────────────────────────────────────────────────────────────────────

/// Arguments for `packweave new`.
#[derive(Debug, Args)]
pub struct NewArgs {
    /// Project name. Also the name of the created directory.
    #[arg(value_name = "NAME", help = "Project name")]
    pub name: String,

    /// Project group, e.g. `com.example`.
    #[arg(
        short = 'g',
        long = "group",
        value_name = "GROUP",
        help = "Project group (default: defaults.group from config)"
    )]
    pub group: Option<String>,

    /// Packs to compose, in selection order.
    #[arg(
        short = 'p',
        long = "pack",
        value_name = "GROUP:NAME",
        help = "Pack to include (repeatable)"
    )]
    pub packs: Vec<String>,

    /// Property overrides.
    #[arg(
        short = 'D',
        long = "define",
        value_name = "KEY=VALUE",
        value_parser = parse_define,
        help = "Set a property (repeatable)"
    )]
    pub defines: Vec<(String, String)>,

    /// Directory the project directory is created in.
    #[arg(
        short = 'o',
        long = "output",
        value_name = "DIR",
        help = "Parent directory (default: current directory)"
    )]
    pub output: Option<PathBuf>,

    /// Skip the confirmation prompt.
    #[arg(
        short = 'y',
        long = "yes",
        help = "Skip confirmation and create immediately"
    )]
    pub yes: bool,

    /// Write into an existing directory (destructive).
    #[arg(long = "force", help = "Overwrite existing directory")]
    pub force: bool,

    /// Render everything but write nothing.
    #[arg(long = "dry-run", help = "Show what would be created without creating")]
    pub dry_run: bool,
}

/// `key=value` → `(key, value)`.  The value may itself contain `=`.
fn parse_define(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

// ── list ──────────────────────────────────────────────────────────────────────

/// Arguments for `packweave list`.
#[derive(Debug, Args)]
pub struct ListArgs {
    /// Only packs carrying this tag.
    #[arg(short = 't', long = "tag", value_name = "TAG", help = "Filter by tag")]
    pub tag: Option<String>,

    /// Output format.
    #[arg(
        long = "format",
        value_enum,
        default_value = "table",
        help = "Output format"
    )]
    pub format: ListFormat,
}

/// Output format for the `list` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ListFormat {
    /// Human-readable table.
    Table,
    /// One id per line.
    List,
    /// JSON array.
    Json,
    /// CSV rows.
    Csv,
}

// ── archive ───────────────────────────────────────────────────────────────────

/// Arguments for `packweave archive`.
#[derive(Debug, Args)]
pub struct ArchiveArgs {
    /// File to write.
    #[arg(value_name = "OUT", help = "Archive file to write")]
    pub output: PathBuf,

    /// Archive encoding.
    #[arg(
        long = "format",
        value_enum,
        default_value = "json",
        help = "Archive format"
    )]
    pub format: ArchiveKind,

    /// Overwrite an existing file.
    #[arg(short = 'f', long = "force", help = "Overwrite an existing archive")]
    pub force: bool,
}

/// Encodings accepted by `packweave archive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ArchiveKind {
    /// Single JSON document.
    Json,
    /// `PWV1` magic followed by length-prefixed records.
    Framed,
}

// ── init ──────────────────────────────────────────────────────────────────────

/// Arguments for `packweave init`.
#[derive(Debug, Args)]
pub struct InitArgs {
    /// Write to `.packweave.toml` in the current directory.
    #[arg(
        long = "local",
        help = "Create local configuration in current directory"
    )]
    pub local: bool,

    /// Overwrite an existing config file.
    #[arg(short = 'f', long = "force", help = "Overwrite existing configuration")]
    pub force: bool,
}

// ── completions ───────────────────────────────────────────────────────────────

/// Arguments for `packweave completions`.
#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell.
    #[arg(value_enum, help = "Shell to generate completions for")]
    pub shell: Shell,
}

/// Supported shells for completion generation.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

// ── config subcommands ────────────────────────────────────────────────────────

/// Subcommands for `packweave config`.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print the value of a configuration key.
    Get {
        /// Dotted key path, e.g. `defaults.group`.
        key: String,
    },
    /// Print all configuration values.
    List,
    /// Print the path to the default configuration file.
    Path,
}

// ── tests ─────────────────────────────────────────────────────────────────────
