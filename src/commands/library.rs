//! Library commands: papers, stats, search, paper

use crate::error::Result;
use crate::library::{paper_folder, paper_tags, Library, LibraryStats, Paper, SearchHit};
use crate::store::{Metadata, MetadataFilter};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

/// Filters for `papers`; all given filters must match
#[derive(Debug, Clone, Default)]
pub struct PaperFilter {
    pub tag: Option<String>,
    pub category: Option<String>,
    pub folder: Option<String>,
}

/// Paper as listed on the console
#[derive(Debug, Clone, Serialize)]
pub struct PaperSummary {
    pub filename: String,
    pub title: Option<String>,
    pub year: Option<String>,
    pub category: Option<String>,
    pub folder_id: String,
    pub tags: Vec<String>,
    pub chunks: usize,
}

fn text_field(metadata: &Metadata, key: &str) -> Option<String> {
    match metadata.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl From<&Paper> for PaperSummary {
    fn from(paper: &Paper) -> Self {
        Self {
            filename: paper.filename.clone(),
            title: text_field(&paper.metadata, "title"),
            year: text_field(&paper.metadata, "year"),
            category: text_field(&paper.metadata, "category"),
            folder_id: paper_folder(&paper.metadata),
            tags: paper_tags(&paper.metadata),
            chunks: paper.chunk_ids.len(),
        }
    }
}

/// List papers matching `filter`
pub async fn cmd_papers(library: &Library, filter: &PaperFilter) -> Result<Vec<PaperSummary>> {
    let papers = match (&filter.tag, &filter.category, &filter.folder) {
        (Some(tag), _, _) => library.papers_by_tag(tag).await?,
        (None, Some(category), _) => library.papers_by_category(category).await?,
        (None, None, Some(folder)) => library.papers_by_folder(folder).await?,
        (None, None, None) => library.list_papers().await?,
    };

    let summaries: Vec<PaperSummary> = papers
        .iter()
        .map(PaperSummary::from)
        .filter(|p| {
            filter
                .category
                .as_ref()
                .map_or(true, |c| p.category.as_ref() == Some(c))
        })
        .filter(|p| filter.folder.as_ref().map_or(true, |f| &p.folder_id == f))
        .collect();

    info!(papers = summaries.len(), "Listed papers");
    Ok(summaries)
}

pub fn print_papers(papers: &[PaperSummary]) {
    println!("\n📚 Papers\n");

    if papers.is_empty() {
        println!("No papers found.");
        return;
    }

    for paper in papers {
        match &paper.title {
            Some(title) => println!("• {} ({})", title, paper.filename),
            None => println!("• {}", paper.filename),
        }
        let mut details = vec![format!("Folder: {}", paper.folder_id)];
        if let Some(category) = &paper.category {
            details.push(format!("Category: {}", category));
        }
        if let Some(year) = &paper.year {
            details.push(format!("Year: {}", year));
        }
        details.push(format!("Chunks: {}", paper.chunks));
        println!("  {}", details.join(", "));
        if !paper.tags.is_empty() {
            println!("  Tags: {}", paper.tags.join(", "));
        }
    }
    println!("\n{} paper(s)", papers.len());
}

pub async fn cmd_stats(library: &Library) -> Result<LibraryStats> {
    library.stats().await
}

pub fn print_stats(stats: &LibraryStats) {
    println!("\n📈 Library Stats\n");
    println!("Papers: {}", stats.total_papers);

    if !stats.categories.is_empty() {
        println!("\nCategories:");
        for (category, count) in &stats.categories {
            println!("  {}: {}", category, count);
        }
    }

    if !stats.years.is_empty() {
        println!("\nYears:");
        for (year, count) in &stats.years {
            println!("  {}: {}", year, count);
        }
    }

    if !stats.tags.is_empty() {
        let tags: Vec<&str> = stats.tags.iter().map(String::as_str).collect();
        println!("\nTags: {}", tags.join(", "));
    }
}

/// Search options
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub limit: usize,
    pub category: Option<String>,
    pub folder: Option<String>,
}

/// Search results with the query they answer
#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub query: String,
    pub hits: Vec<SearchHit>,
}

pub async fn cmd_search(
    library: &Library,
    query: &str,
    options: &SearchOptions,
) -> Result<SearchResults> {
    let mut filter = MetadataFilter::new();
    if let Some(category) = &options.category {
        filter = filter.equals("category", category.clone());
    }
    if let Some(folder) = &options.folder {
        filter = filter.equals("folder_id", folder.clone());
    }
    let filter = (!filter.is_empty()).then_some(filter);

    let hits = library.search(query, options.limit, filter).await?;
    Ok(SearchResults {
        query: query.to_string(),
        hits,
    })
}

pub fn print_search_results(results: &SearchResults) {
    println!("\n🔍 Query: {}\n", results.query);

    if results.hits.is_empty() {
        println!("No results found.");
        return;
    }

    for (i, hit) in results.hits.iter().enumerate() {
        let title = text_field(&hit.metadata, "title").unwrap_or_else(|| hit.filename.clone());
        println!("{}. [score: {:.3}] {}", i + 1, hit.score, title);
        println!("   Chunk: {}", hit.id);
        let preview = hit.content.replace('\n', " ");
        println!("   {}", preview.trim());
        println!();
    }
}

/// Paper edit actions
#[derive(Debug, Clone)]
pub enum PaperAction {
    Show,
    Update { patch: Metadata },
    Move { folder_id: String },
    /// Locate the PDF the paper was ingested from
    File,
    Delete { remove_file: bool },
}

/// Result of a paper action
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum PaperOutcome {
    Show { filename: String, metadata: Metadata },
    Updated { paper: Paper },
    File { filename: String, path: String },
    Deleted {
        filename: String,
        chunks: usize,
        removed_file: Option<String>,
    },
}

pub async fn cmd_paper(library: &Library, filename: &str, action: PaperAction) -> Result<PaperOutcome> {
    match action {
        PaperAction::Show => Ok(PaperOutcome::Show {
            filename: filename.to_string(),
            metadata: library.paper_metadata(filename).await?,
        }),
        PaperAction::Update { patch } => Ok(PaperOutcome::Updated {
            paper: library.update_metadata(filename, patch).await?,
        }),
        PaperAction::Move { folder_id } => Ok(PaperOutcome::Updated {
            paper: library.move_paper(filename, &folder_id).await?,
        }),
        PaperAction::File => Ok(PaperOutcome::File {
            filename: filename.to_string(),
            path: library.paper_file(filename).await?.display().to_string(),
        }),
        PaperAction::Delete { remove_file } => {
            let deleted = library.delete_paper(filename, remove_file).await?;
            Ok(PaperOutcome::Deleted {
                filename: deleted.filename,
                chunks: deleted.chunks,
                removed_file: deleted.removed_file,
            })
        }
    }
}

fn print_metadata(metadata: &Metadata) {
    for (key, value) in metadata {
        match value {
            Value::String(s) => println!("  {}: {}", key, s),
            other => println!("  {}: {}", key, other),
        }
    }
}

pub fn print_paper_outcome(outcome: &PaperOutcome) {
    match outcome {
        PaperOutcome::Show { filename, metadata } => {
            println!("\n📄 {}\n", filename);
            print_metadata(metadata);
        }
        PaperOutcome::Updated { paper } => {
            println!(
                "✓ Updated {} ({} chunk(s))",
                paper.filename,
                paper.chunk_ids.len()
            );
            print_metadata(&paper.metadata);
        }
        PaperOutcome::File { path, .. } => println!("{}", path),
        PaperOutcome::Deleted {
            filename,
            chunks,
            removed_file,
        } => {
            println!("✓ Deleted {} ({} chunk(s))", filename, chunks);
            if let Some(path) = removed_file {
                println!("  Removed {}", path);
            }
        }
    }
}
