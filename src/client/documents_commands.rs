use clap::Args;
use clap::Subcommand;
use docstore_models::Document;
use tracing::info;
use tracing::warn;

#[derive(Subcommand, Debug)]
pub enum DocumentsCommands {
    #[command(about, long_about = "Prints the listing of the documents as JSON")]
    List,
    PruneOrphans(PruneOrphansArgs),
}

#[derive(Args, Debug)]
#[command(
    about,
    long_about = "Deletes the attached files whose document no longer exists"
)]
pub struct PruneOrphansArgs {
    /// Only print the orphaned files, without deleting them
    #[arg(long)]
    dry_run: bool,
}

pub async fn documents_commands(
    command: DocumentsCommands,
    storage_config: storage::Config,
) -> anyhow::Result<()> {
    let storage = storage::Client::try_initialize(storage_config).await?;
    match command {
        DocumentsCommands::List => {
            let documents = Document::list(&storage).await?;
            println!("{}", serde_json::to_string_pretty(&documents)?);
        }
        DocumentsCommands::PruneOrphans(args) => {
            for key in prune_orphans(args, &storage).await? {
                println!("{key}");
            }
        }
    }
    Ok(())
}

/// Returns the keys of the orphaned attachments found
async fn prune_orphans(
    PruneOrphansArgs { dry_run }: PruneOrphansArgs,
    storage: &storage::Client,
) -> anyhow::Result<Vec<String>> {
    let orphans = Document::orphaned_attachments(storage).await?;
    info!(count = orphans.len(), dry_run, "found orphaned attachments");
    if dry_run {
        return Ok(orphans.into_iter().map(|orphan| orphan.key).collect());
    }

    let mut pruned = Vec::with_capacity(orphans.len());
    for orphan in orphans {
        match storage.delete(&orphan.key).await {
            Ok(()) => pruned.push(orphan.key),
            Err(storage::Error::NotFound { .. }) => {
                warn!(key = %orphan.key, "orphaned attachment already deleted")
            }
            Err(error) => return Err(error.into()),
        }
    }
    info!(count = pruned.len(), "pruned orphaned attachments");
    Ok(pruned)
}
