use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Folio: collect, tag, categorize and version HTML documents.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding the local cache.
    #[arg(long, global = true, env = "FOLIO_DATA_DIR", default_value = ".folio")]
    pub data_dir: PathBuf,

    /// Base URL of the backend. Without it Folio works from the local cache only.
    #[arg(long, global = true, env = "FOLIO_REMOTE_URL")]
    pub remote: Option<String>,

    /// Bearer token for the backend.
    #[arg(long, global = true, env = "FOLIO_REMOTE_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Timeout of each backend request, in seconds.
    #[arg(long, global = true, env = "FOLIO_REMOTE_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,

    /// Increase verbosity (use multiple times for more).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List documents, optionally filtered.
    List(ListArgs),
    /// Show the details of one document.
    Show(ShowArgs),
    /// Register a document.
    Add(AddArgs),
    /// Change the metadata of a document.
    Edit(EditArgs),
    /// Delete a document and its version history.
    Delete(DeleteArgs),
    /// Show the most used tags.
    Tags(TagsArgs),
    /// Summarize the library and check the backend.
    Status,
    /// Manage categories.
    Category(CategoryArgs),
    /// Manage the saved versions of a document.
    Version(VersionArgs),
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only documents in this category ("all" for every category).
    #[arg(long, short)]
    pub category: Option<String>,

    /// Only documents carrying any of these tags.
    #[arg(long = "tag", short)]
    pub tags: Vec<String>,

    /// Case-insensitive text searched in filename, title, description and tags.
    #[arg(long)]
    pub query: Option<String>,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    pub filename: String,
}

#[derive(Args, Debug)]
pub struct AddArgs {
    pub filename: String,

    /// Path the file was stored under. Defaults to /uploads/<filename>.
    #[arg(long)]
    pub path: Option<String>,

    #[arg(long)]
    pub title: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long, short)]
    pub category: Option<String>,

    #[arg(long = "tag", short)]
    pub tags: Vec<String>,
}

#[derive(Args, Debug)]
pub struct EditArgs {
    pub filename: String,

    /// New title. An empty value clears it.
    #[arg(long)]
    pub title: Option<String>,

    /// New description. An empty value clears it.
    #[arg(long)]
    pub description: Option<String>,

    /// New author. An empty value clears it.
    #[arg(long)]
    pub author: Option<String>,

    #[arg(long, short)]
    pub category: Option<String>,

    /// Replacement tag list, comma separated.
    #[arg(long, value_delimiter = ',')]
    pub tags: Option<Vec<String>>,
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    pub filename: String,

    /// Skip confirmation.
    #[arg(long, short)]
    pub yes: bool,
}

#[derive(Args, Debug)]
pub struct TagsArgs {
    /// Number of tags to show.
    #[arg(long, short, default_value = "15")]
    pub limit: usize,
}

#[derive(Args, Debug)]
pub struct CategoryArgs {
    #[command(subcommand)]
    pub command: CategoryCommands,
}

#[derive(Subcommand, Debug)]
pub enum CategoryCommands {
    /// List categories with their document counts.
    List,
    /// Add a category, or update the one with the same id.
    Add {
        id: String,
        name: String,
        #[arg(long)]
        icon: Option<String>,
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Remove a category. Its documents move to "other".
    Remove { id: String },
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    #[command(subcommand)]
    pub command: VersionCommands,
}

#[derive(Subcommand, Debug)]
pub enum VersionCommands {
    /// List the saved versions of a document, newest first.
    List { filename: String },
    /// Save the content of a local file as a new version.
    Save {
        filename: String,
        /// File holding the content to snapshot.
        #[arg(long)]
        from: PathBuf,
        /// Description of the version.
        #[arg(long, short)]
        label: String,
        /// Version number, e.g. 1.1.
        #[arg(long, short)]
        number: String,
    },
    /// Print the content of one version.
    Show { filename: String, id: String },
    /// Delete one version.
    Delete { filename: String, id: String },
}


#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn edit_splits_comma_separated_tags() {
        let cli = Cli::try_parse_from(["folio", "edit", "a.html", "--tags", "red,blue"]).unwrap();
        match cli.command {
            Commands::Edit(args) => {
                assert_eq!(args.tags, Some(vec!["red".to_string(), "blue".to_string()]));
                assert_eq!(args.title, None);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let cli = Cli::try_parse_from([
            "folio", "list", "--tag", "x", "-vv", "--data-dir", "/tmp/lib",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.data_dir, PathBuf::from("/tmp/lib"));
    }
}
