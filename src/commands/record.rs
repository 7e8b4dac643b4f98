use clap::{Args, Subcommand};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use tourney::config::Config;
use tourney_core::{Collection, Record, RecordChange};

use super::{connect, print_outcome};

/// Write or delete records of any collection
#[derive(Args)]
pub struct RecordCommand {
    #[command(subcommand)]
    command: RecordSubcommand,
}

#[derive(Subcommand)]
enum RecordSubcommand {
    /// Create or replace a record from a JSON file
    ///
    /// The file holds {"collection": "<name>", "record": {...}}.
    Put {
        /// Record JSON file
        file: PathBuf,
    },
    /// Delete a record
    Delete {
        /// Collection name (tournaments, registeredTeams, sponsors, announcements, results)
        #[arg(value_parser = parse_collection)]
        collection: Collection,
        /// Record ID
        id: Uuid,
    },
}

impl RecordCommand {
    pub async fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let change = match &self.command {
            RecordSubcommand::Put { file } => RecordChange::Upsert(load_record(file)?),
            RecordSubcommand::Delete { collection, id } => RecordChange::Delete {
                collection: *collection,
                id: *id,
            },
        };

        let session = connect(config).await?;
        let outcome = session.ctx.writer().write_change(change.clone()).await?;

        let verb = match change {
            RecordChange::Upsert(_) => "Saved",
            RecordChange::Delete { .. } => "Deleted",
        };
        print_outcome(
            &format!("{} {} {}", verb, change.collection(), change.id()),
            &outcome,
        );
        Ok(())
    }
}

fn parse_collection(s: &str) -> Result<Collection, String> {
    Collection::parse(s).ok_or_else(|| {
        let names: Vec<_> = Collection::ALL.iter().map(|c| c.name()).collect();
        format!("Unknown collection '{}'. Valid values: {}", s, names.join(", "))
    })
}

fn load_record(path: &Path) -> Result<Record, Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    let record: Record = serde_json::from_str(&contents)
        .map_err(|e| format!("Invalid record file {}: {}", path.display(), e))?;
    Ok(record)
}
