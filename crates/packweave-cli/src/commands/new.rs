//! Implementation of the `packweave new` command.
//!
//! Responsibility: translate CLI arguments into a `ProjectDescriptor`, call
//! the core generate service, and display results. No business logic lives
//! here.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, instrument};

use packweave_adapters::LocalFilesystem;
use packweave_core::{
    application::{ApplicationError, GenerateService, PackInfo},
    domain::{GeneratedProject, PackId, ProjectDescriptor, SourcePathTransform},
    error::WeaveError,
};

use crate::{
    cli::{NewArgs, OutputFormat, global::GlobalArgs},
    commands::open_repository,
    config::AppConfig,
    error::{CliError, CliResult, IntoCli},
    output::OutputManager,
};

/// Execute the `packweave new` command.
///
/// Dispatch sequence:
/// 1. Validate the project name and resolve the output directory
/// 2. Collect packs (flags, then config, then an interactive picker)
/// 3. Confirm with user unless `--yes`, `--quiet` or `--dry-run`
/// 4. Generate the project in memory
/// 5. Print the file list if `--dry-run`, otherwise export
/// 6. Print next-steps guidance
#[instrument(skip_all, fields(project = %args.name))]
pub fn execute(
    args: NewArgs,
    global: GlobalArgs,
    config: AppConfig,
    output: OutputManager,
) -> CliResult<()> {
    validate_project_name(&args.name)?;
    let project_path = project_path(args.output.as_deref(), &args.name);
    let group = args
        .group
        .clone()
        .unwrap_or_else(|| config.defaults.group.clone());

    let (multiplatform, jvm) = config
        .transform
        .markers()
        .with_cli_context(|| "invalid [transform] settings")?;
    let repository = open_repository(&global, &config)?;
    let service = GenerateService::new(repository, Box::new(LocalFilesystem::new()))
        .with_transform(SourcePathTransform::with_markers(multiplatform, jvm));

    let interactive = !args.yes && !global.quiet && output.format() == OutputFormat::Human;
    let packs = select_packs(&args, &config, &service, interactive)?;
    let descriptor = build_descriptor(&args.name, &group, packs, &args.defines);

    debug!(
        group = %descriptor.group,
        packs = descriptor.packs.len(),
        properties = descriptor.properties.len(),
        "Descriptor built"
    );

    if !global.quiet && !args.yes && !args.dry_run {
        show_configuration(&descriptor, &project_path, &output)?;
        if !confirm()? {
            return Err(CliError::Cancelled);
        }
    }

    if project_path.exists() && !args.force && !args.dry_run {
        return Err(WeaveError::from(ApplicationError::ProjectExists { path: project_path }).into());
    }

    let spinner = output.spinner(&format!("Generating '{}'...", descriptor.name));
    let generated = service.generate(&descriptor);
    spinner.finish_and_clear();
    let generated = generated?;

    if args.dry_run {
        return print_plan(&generated, &project_path, &output);
    }

    output.header(&format!("Creating '{}'...", descriptor.name))?;
    info!(project = %descriptor.name, path = %project_path.display(), "Export started");
    service.export(&generated, &project_path, args.force)?;
    info!(project = %descriptor.name, files = generated.file_count(), "Export completed");

    if output.format() == OutputFormat::Json {
        return output.json(&Plan::new(&generated, &project_path)).map_err(Into::into);
    }

    output.success(&format!(
        "Project '{}' created with {} files",
        descriptor.name,
        generated.file_count()
    ))?;
    output.print("")?;
    output.print("Next steps:")?;
    output.print(&format!("  cd {}", project_path.display()))?;

    Ok(())
}

// ── Descriptor construction ───────────────────────────────────────────────────

/// `<output or .>/<name>`.
pub fn project_path(output: Option<&Path>, name: &str) -> PathBuf {
    output.unwrap_or_else(|| Path::new(".")).join(name)
}

fn validate_project_name(name: &str) -> CliResult<()> {
    let invalid = |reason: &str| {
        Err(CliError::InvalidProjectName {
            name: name.into(),
            reason: reason.into(),
        })
    };
    if name.trim().is_empty() {
        return invalid("name cannot be empty");
    }
    if name.starts_with('.') {
        return invalid("name cannot start with '.'");
    }
    if name.contains(['/', '\\']) {
        return invalid("name cannot contain path separators; use --output for the location");
    }
    Ok(())
}

fn parse_pack_ids(raw: &[String]) -> CliResult<Vec<PackId>> {
    raw.iter()
        .map(|id| PackId::parse(id).map_err(|e| CliError::Core(e.into())))
        .collect()
}

/// Packs from `--pack`, else `defaults.packs`, else the interactive picker.
fn select_packs(
    args: &NewArgs,
    config: &AppConfig,
    service: &GenerateService,
    interactive: bool,
) -> CliResult<Vec<PackId>> {
    if !args.packs.is_empty() {
        return parse_pack_ids(&args.packs);
    }
    if !config.defaults.packs.is_empty() {
        debug!(packs = ?config.defaults.packs, "using packs from config");
        return parse_pack_ids(&config.defaults.packs);
    }
    if interactive {
        let available = service.list_packs()?;
        let chosen = pick_packs(&available)?;
        if !chosen.is_empty() {
            return parse_pack_ids(&chosen);
        }
    }
    Err(CliError::NoPacksSelected)
}

fn build_descriptor(
    name: &str,
    group: &str,
    packs: Vec<PackId>,
    defines: &[(String, String)],
) -> ProjectDescriptor {
    defines.iter().fold(
        ProjectDescriptor::new(name, group).with_packs(packs),
        |descriptor, (key, value)| descriptor.with_property(key, value),
    )
}

// ── Dry run ───────────────────────────────────────────────────────────────────

/// What an export writes, for `--dry-run` and JSON output.
#[derive(Debug, Serialize)]
struct Plan {
    root: String,
    files: Vec<PlannedFile>,
}

#[derive(Debug, Serialize)]
struct PlannedFile {
    path: String,
    owner: String,
    bytes: usize,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    executable: bool,
}

impl Plan {
    fn new(generated: &GeneratedProject, root: &Path) -> Self {
        Self {
            root: root.display().to_string(),
            files: generated
                .files
                .iter()
                .map(|file| PlannedFile {
                    path: file.path.to_string(),
                    owner: file.owner.to_string(),
                    bytes: file.size(),
                    executable: file.executable,
                })
                .collect(),
        }
    }
}

fn print_plan(generated: &GeneratedProject, root: &Path, output: &OutputManager) -> CliResult<()> {
    let plan = Plan::new(generated, root);
    if output.format() == OutputFormat::Json {
        return output.json(&plan).map_err(Into::into);
    }

    output.info(&format!(
        "Dry run: would create {} files at {}",
        plan.files.len(),
        plan.root
    ))?;
    for file in &plan.files {
        let mode = if file.executable { " (executable)" } else { "" };
        output.data(&format!(
            "  {}  [{} bytes, {}]{mode}",
            file.path, file.bytes, file.owner
        ))?;
    }
    Ok(())
}

// ── UI helpers ────────────────────────────────────────────────────────────────

fn show_configuration(
    descriptor: &ProjectDescriptor,
    root: &Path,
    out: &OutputManager,
) -> CliResult<()> {
    out.header("Configuration")?;
    out.print(&format!("  Project:   {}", descriptor.name))?;
    out.print(&format!("  Group:     {}", descriptor.group))?;
    for (i, pack) in descriptor.packs.iter().enumerate() {
        let label = if i == 0 { "Packs:" } else { "" };
        out.print(&format!("  {label:<10} {pack}"))?;
    }
    for (key, value) in &descriptor.properties {
        out.print(&format!("  -D {key}={value}"))?;
    }
    out.print(&format!("  Location:  {}", root.display()))?;
    out.print("")?;
    Ok(())
}

#[cfg(feature = "interactive")]
fn confirm() -> CliResult<bool> {
    dialoguer::Confirm::new()
        .with_prompt("Continue?")
        .default(true)
        .interact()
        .map_err(|e| CliError::InvalidInput {
            message: "failed to read confirmation".into(),
            source: Some(Box::new(e)),
        })
}

#[cfg(not(feature = "interactive"))]
fn confirm() -> CliResult<bool> {
    use std::io::{self, Write};

    print!("Continue? [Y/n] ");
    io::stdout()
        .flush()
        .with_cli_context(|| "failed to flush stdout")?;

    let mut input = String::new();
    io::stdin()
        .read_line(&mut input)
        .with_cli_context(|| "failed to read confirmation input")?;

    let input = input.trim().to_ascii_lowercase();
    Ok(input.is_empty() || input == "y" || input == "yes")
}

#[cfg(feature = "interactive")]
fn pick_packs(available: &[PackInfo]) -> CliResult<Vec<String>> {
    if available.is_empty() {
        return Ok(Vec::new());
    }
    let items: Vec<String> = available
        .iter()
        .map(|p| format!("{} {} - {}", p.id, p.version, p.name))
        .collect();
    let chosen = dialoguer::MultiSelect::new()
        .with_prompt("Select packs (space to toggle, enter to confirm)")
        .items(&items)
        .interact()
        .map_err(|e| CliError::InvalidInput {
            message: "failed to read pack selection".into(),
            source: Some(Box::new(e)),
        })?;
    Ok(chosen.into_iter().map(|i| available[i].id.clone()).collect())
}

#[cfg(not(feature = "interactive"))]
fn pick_packs(_available: &[PackInfo]) -> CliResult<Vec<String>> {
    Ok(Vec::new())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
