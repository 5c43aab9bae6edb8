//! Implementation of the `packweave list` command.

use packweave_adapters::MemoryFilesystem;
use packweave_core::application::{GenerateService, PackInfo};

use crate::{
    cli::{ListArgs, ListFormat, OutputFormat, global::GlobalArgs},
    commands::open_repository,
    config::AppConfig,
    error::CliResult,
    output::OutputManager,
};

pub fn execute(
    args: ListArgs,
    global: GlobalArgs,
    config: AppConfig,
    output: OutputManager,
) -> CliResult<()> {
    let repository = open_repository(&global, &config)?;
    // Listing never writes, so the filesystem port gets a throwaway.
    let service = GenerateService::new(repository, Box::new(MemoryFilesystem::new()));
    let packs = filter_by_tag(service.list_packs()?, args.tag.as_deref());

    // `--output-format json` implies JSON regardless of `--format`.
    let format = if output.format() == OutputFormat::Json {
        ListFormat::Json
    } else {
        args.format
    };

    match format {
        ListFormat::Table => {
            if packs.is_empty() {
                output.warning("No packs found")?;
                return Ok(());
            }
            output.header("Available Packs:")?;
            let width = packs.iter().map(|p| p.id.len()).max().unwrap_or(0);
            for pack in &packs {
                output.data(&format!(
                    "  {:<width$}  {:<10} {}",
                    pack.id, pack.version, pack.name
                ))?;
                if !pack.description.is_empty() {
                    output.print(&format!("  {:<width$}  {}", "", pack.description))?;
                }
            }
        }
        ListFormat::Json => output.json(&packs)?,
        ListFormat::List => {
            for pack in &packs {
                output.data(&pack.id)?;
            }
        }
        ListFormat::Csv => {
            output.data("id,version,name,requires,tags")?;
            for pack in &packs {
                output.data(&csv_row(pack))?;
            }
        }
    }

    Ok(())
}

fn filter_by_tag(packs: Vec<PackInfo>, tag: Option<&str>) -> Vec<PackInfo> {
    match tag {
        Some(tag) => packs
            .into_iter()
            .filter(|p| p.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)))
            .collect(),
        None => packs,
    }
}

fn csv_row(pack: &PackInfo) -> String {
    let requires = pack.requires.join(";");
    let tags = pack.tags.join(";");
    let fields: [&str; 5] = [&pack.id, &pack.version, &pack.name, &requires, &tags];
    fields.map(csv_field).join(",")
}

/// Quote a field when it contains a separator, quote or newline.
fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
