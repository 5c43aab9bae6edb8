//! `packweave archive` snapshots the active repository into one file.

use tracing::instrument;

use packweave_adapters::{ArchiveFormat, repository::write_archive};
use packweave_core::application::PackService;

use crate::{
    cli::{ArchiveArgs, ArchiveKind, GlobalArgs},
    commands::open_repository,
    config::AppConfig,
    error::{CliError, CliResult},
    output::OutputManager,
};

#[instrument(skip_all, fields(output = %args.output.display()))]
pub fn execute(
    args: ArchiveArgs,
    global: GlobalArgs,
    config: AppConfig,
    output: OutputManager,
) -> CliResult<()> {
    if args.output.exists() && !args.force {
        return Err(CliError::FileExists { path: args.output });
    }

    let repository = open_repository(&global, &config)?;
    let snapshot = PackService::new(repository).snapshot()?;
    let written = write_archive(&snapshot, &args.output, archive_format(args.format))?;

    output.success(&format!(
        "Archived {written} packs to {}",
        args.output.display()
    ))?;
    Ok(())
}

fn archive_format(kind: ArchiveKind) -> ArchiveFormat {
    match kind {
        ArchiveKind::Json => ArchiveFormat::Json,
        ArchiveKind::Framed => ArchiveFormat::Framed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_formats() {
        assert_eq!(archive_format(ArchiveKind::Json), ArchiveFormat::Json);
        assert_eq!(archive_format(ArchiveKind::Framed), ArchiveFormat::Framed);
    }
}
