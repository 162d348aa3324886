use anyhow::{bail, Context, Result};
use console::style;
use dialoguer::Confirm;
use folio_core::search::SearchQuery;
use folio_core::storage::{Category, Document, DocumentPatch, Tags, UploadReceipt};
use tracing::info;

use crate::cli::{
    AddArgs, CategoryArgs, CategoryCommands, DeleteArgs, EditArgs, ListArgs, ShowArgs, TagsArgs,
    VersionArgs, VersionCommands,
};
use crate::AppContext;

const WRAP_WIDTH: usize = 76;
const TOP_CATEGORY_LIMIT: usize = 15;

// --- Handler Functions ---

pub fn handle_list(args: ListArgs, cx: &AppContext) -> Result<()> {
    let mut query = SearchQuery::new();
    if let Some(category) = args.category.as_deref() {
        query = query.category(category);
    }
    for tag in args.tags {
        query = query.tag(tag);
    }
    if let Some(text) = args.query {
        query = query.text(text);
    }

    let view = cx.library.search(&query);
    if view.is_empty() {
        println!("No documents found.");
        return Ok(());
    }
    for doc in view {
        print_summary(doc);
    }
    Ok(())
}

pub fn handle_show(args: ShowArgs, cx: &AppContext) -> Result<()> {
    let Some(doc) = cx.library.documents().get(&args.filename) else {
        bail!("No document named '{}'", args.filename);
    };

    println!("{}", style(doc.display_name()).bold());
    println!("  Filename:    {}", doc.filename);
    if let Some(path) = &doc.path {
        println!("  Path:        {}", path);
    }
    let category = cx
        .library
        .categories()
        .get(&doc.category)
        .map(|c| c.name.as_str())
        .unwrap_or(doc.category.as_str());
    println!("  Category:    {}", category);
    if !doc.tags.is_empty() {
        println!("  Tags:        {}", doc.tags.iter().collect::<Vec<_>>().join(", "));
    }
    if let Some(author) = &doc.author {
        println!("  Author:      {}", author);
    }
    println!("  Uploaded:    {}", doc.upload_date.format("%Y-%m-%d %H:%M"));
    if let Some(modified) = doc.last_modified {
        println!("  Modified:    {}", modified.format("%Y-%m-%d %H:%M"));
    }
    if let Some(size) = doc.file_size {
        println!("  Size:        {} bytes", size);
    }
    if let Some(version) = &doc.version {
        println!("  Version:     {}", version);
    }
    if let Some(description) = &doc.description {
        println!();
        println!("{}", textwrap::indent(&textwrap::fill(description, WRAP_WIDTH), "  "));
    }
    Ok(())
}

pub async fn handle_add(args: AddArgs, cx: &mut AppContext) -> Result<()> {
    let path = args.path.unwrap_or_else(|| format!("/uploads/{}", args.filename));
    let receipt = UploadReceipt {
        filename: args.filename,
        path,
        title: args.title,
        category: args.category,
        tags: args.tags,
        description: args.description,
        file_size: None,
    };
    let doc = cx.library.import_upload(receipt).await?;
    info!(filename = %doc.filename, "Document added");
    println!("Added {}", style(&doc.filename).green());
    Ok(())
}

pub async fn handle_edit(args: EditArgs, cx: &mut AppContext) -> Result<()> {
    let mut patches = Vec::new();
    if let Some(title) = args.title {
        patches.push(DocumentPatch::Title(non_empty(title)));
    }
    if let Some(description) = args.description {
        patches.push(DocumentPatch::Description(non_empty(description)));
    }
    if let Some(author) = args.author {
        patches.push(DocumentPatch::Author(non_empty(author)));
    }
    if let Some(category) = args.category {
        patches.push(DocumentPatch::Category(category));
    }
    if let Some(tags) = args.tags {
        patches.push(DocumentPatch::Tags(tags.into_iter().collect::<Tags>()));
    }
    if patches.is_empty() {
        bail!("Nothing to change; pass at least one field to edit");
    }

    let doc = cx.library.update_document(&args.filename, patches).await?;
    println!("Updated {}", style(&doc.filename).green());
    Ok(())
}

pub async fn handle_delete(args: DeleteArgs, cx: &mut AppContext) -> Result<()> {
    if cx.library.documents().get(&args.filename).is_none() {
        bail!("No document named '{}'", args.filename);
    }
    if !args.yes {
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete '{}' and its version history?", args.filename))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("Aborted.");
            return Ok(());
        }
    }
    cx.library.delete_document(&args.filename).await?;
    println!("Deleted {}", style(&args.filename).red());
    Ok(())
}

pub fn handle_tags(args: TagsArgs, cx: &AppContext) -> Result<()> {
    let popular = cx.library.documents().tag_index().popular(args.limit);
    if popular.is_empty() {
        println!("No tags yet.");
    }
    for entry in popular {
        println!("  {:>4}  {}", entry.count, entry.tag);
    }
    Ok(())
}

pub async fn handle_status(cx: &AppContext) -> Result<()> {
    let documents = cx.library.documents().list();
    println!("{}", style("Library").bold());
    println!("  Documents:   {}", documents.len());
    println!("  With history: {}", documents.iter().filter(|d| d.has_history).count());
    println!("  Tags:        {}", cx.library.documents().tag_index().len());

    let top = cx.library.top_categories(TOP_CATEGORY_LIMIT);
    if !top.is_empty() {
        println!();
        println!("{}", style("Top categories").bold());
        for (category, count) in top {
            println!("  {:>4}  {}", count, category.name);
        }
    }

    println!();
    match &cx.remote {
        None => println!("Backend: {}", style("not configured").dim()),
        Some(remote) => match remote.health().await {
            Ok(health) if health.is_ok() => println!(
                "Backend: {} ({}{})",
                style("ok").green(),
                remote.config().base_url(),
                health.version.map(|v| format!(", version {}", v)).unwrap_or_default()
            ),
            Ok(health) => println!(
                "Backend: {} ({})",
                style(health.status).yellow(),
                remote.config().base_url()
            ),
            Err(e) => println!("Backend: {} ({})", style("unreachable").red(), e),
        },
    }
    Ok(())
}

pub async fn handle_category(args: CategoryArgs, cx: &mut AppContext) -> Result<()> {
    match args.command {
        CategoryCommands::List => {
            let counts = cx.library.top_categories(usize::MAX);
            for category in cx.library.categories().list() {
                let count = counts
                    .iter()
                    .find(|(c, _)| c.id == category.id)
                    .map(|(_, n)| *n)
                    .unwrap_or(0);
                println!(
                    "  {:<16} {:<20} {:>4}  {}",
                    category.id,
                    category.name,
                    count,
                    style(&category.color).dim()
                );
            }
        }
        CategoryCommands::Add { id, name, icon, color, description } => {
            let mut category = cx
                .library
                .categories()
                .get(&id)
                .cloned()
                .unwrap_or_else(|| Category::new(id.clone(), name.clone()));
            category.name = name;
            if let Some(icon) = icon {
                category.icon = icon;
            }
            if let Some(color) = color {
                category.color = color;
            }
            if let Some(description) = description {
                category.description = non_empty(description);
            }
            cx.library.upsert_category(category).await?;
            println!("Saved category {}", style(&id).green());
        }
        CategoryCommands::Remove { id } => {
            let moved = cx.library.remove_category(&id).await?;
            println!(
                "Removed category {} ({} document(s) moved to 'other')",
                style(&id).red(),
                moved
            );
        }
    }
    Ok(())
}

pub async fn handle_version(args: VersionArgs, cx: &mut AppContext) -> Result<()> {
    match args.command {
        VersionCommands::List { filename } => {
            let history = cx.library.open_history(&filename, "").await?;
            if history.list_versions().is_empty() {
                println!("No versions saved for {}.", filename);
            }
            for version in history.list_versions() {
                println!(
                    "  {}  v{:<8} {}  {}",
                    style(&version.id).dim(),
                    version.version_number,
                    version.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    version.label
                );
            }
        }
        VersionCommands::Save { filename, from, label, number } => {
            let content = tokio::fs::read_to_string(&from)
                .await
                .with_context(|| format!("Failed to read {}", from.display()))?;
            let mut history = cx.library.open_history(&filename, content).await?;
            let version = history
                .create_version(&label, &number, cx.library.documents_mut())
                .await?;
            println!(
                "Saved version {} of {} ({})",
                style(&version.version_number).green(),
                filename,
                version.id
            );
        }
        VersionCommands::Show { filename, id } => {
            let history = cx.library.open_history(&filename, "").await?;
            let Some(version) = history.get(&id) else {
                bail!("No version '{}' for {}", id, filename);
            };
            println!("{}", version.content);
        }
        VersionCommands::Delete { filename, id } => {
            let mut history = cx.library.open_history(&filename, "").await?;
            history.delete_version(&id).await?;
            println!("Deleted version {}", style(&id).red());
        }
    }
    Ok(())
}

fn print_summary(doc: &Document) {
    let tags = if doc.tags.is_empty() {
        String::new()
    } else {
        format!("  [{}]", doc.tags.iter().collect::<Vec<_>>().join(", "))
    };
    println!(
        "{}  {}  {}{}",
        style(&doc.filename).bold(),
        style(&doc.category).cyan(),
        doc.title.as_deref().unwrap_or(""),
        style(tags).dim()
    );
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() { None } else { Some(value) }
}
