//! quire - EPUB inspector and normalizer

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quire::processor::HtmlNormalization;
use quire::{Book, EpubConfig, EpubReader, EpubWriter, Pipeline, Version};

#[derive(Parser)]
#[command(name = "quire")]
#[command(version, about = "EPUB inspector and normalizer", long_about = None)]
#[command(after_help = "EXAMPLES:
    quire info book.epub                Show book metadata
    quire info --json book.epub         Same, as JSON
    quire normalize in.epub out.epub    Read and rewrite with regenerated navigation
    quire normalize --epub3 in.epub out.epub")]
struct Cli {
    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show book metadata and structure
    Info {
        #[arg(value_name = "INPUT")]
        input: String,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Read a book and write it back out
    Normalize {
        #[arg(value_name = "INPUT")]
        input: String,

        #[arg(value_name = "OUTPUT")]
        output: String,

        /// Write EPUB 3
        #[arg(long, conflicts_with = "epub2")]
        epub3: bool,

        /// Write EPUB 2
        #[arg(long)]
        epub2: bool,

        /// Also rewrite HTML content as well-formed XHTML
        #[arg(long)]
        html: bool,
    },
}

#[derive(Serialize)]
struct BookInfo {
    file: String,
    version: String,
    title: String,
    authors: Vec<String>,
    languages: Vec<String>,
    identifiers: Vec<String>,
    publisher: Option<String>,
    spine_items: usize,
    toc_entries: usize,
    toc_depth: usize,
    resources: usize,
    cover_image: Option<String>,
    cover_page: Option<String>,
    landmarks: Vec<String>,
}

impl BookInfo {
    fn new(file: &str, book: &Book) -> Self {
        let meta = &book.metadata;
        Self {
            file: file.to_string(),
            version: book.version.to_string(),
            title: meta.title().to_string(),
            authors: meta.creators.iter().map(|a| a.name.clone()).collect(),
            languages: meta.languages.clone(),
            identifiers: meta.identifiers.iter().map(|i| i.value.clone()).collect(),
            publisher: meta.publishers.first().map(|p| p.value.clone()),
            spine_items: book.spine.len(),
            toc_entries: book.toc.total_size(),
            toc_depth: book.toc.depth(),
            resources: book.resources.len(),
            cover_image: book.cover_image_href().map(str::to_string),
            cover_page: book.cover_page_href().map(str::to_string),
            landmarks: book
                .guide
                .references()
                .iter()
                .map(|r| format!("{} -> {}", r.semantic.epub3_name(), r.complete_href()))
                .collect(),
        }
    }

    fn print(&self) {
        println!("File: {}", self.file);
        println!("EPUB version: {}", self.version);
        println!("Title: {}", self.title);
        if !self.authors.is_empty() {
            println!("Authors: {}", self.authors.join(", "));
        }
        if !self.languages.is_empty() {
            println!("Language: {}", self.languages.join(", "));
        }
        for identifier in &self.identifiers {
            println!("Identifier: {identifier}");
        }
        if let Some(publisher) = &self.publisher {
            println!("Publisher: {publisher}");
        }
        println!("Spine items: {}", self.spine_items);
        println!("TOC entries: {} (depth {})", self.toc_entries, self.toc_depth);
        println!("Resources: {}", self.resources);
        if let Some(cover) = &self.cover_image {
            println!("Cover image: {cover}");
        }
        for landmark in &self.landmarks {
            println!("Landmark: {landmark}");
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(if cli.verbose { "quire=debug" } else { "quire=warn" })
    });
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let result = match cli.command {
        Command::Info { input, json } => show_info(&input, json),
        Command::Normalize {
            input,
            output,
            epub3,
            epub2,
            html,
        } => {
            let target = match (epub3, epub2) {
                (true, _) => Some(Version::Epub3),
                (_, true) => Some(Version::Epub2),
                _ => None,
            };
            normalize(&input, &output, target, html)
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn show_info(path: &str, json: bool) -> Result<(), String> {
    let book = EpubReader::new().open(path).map_err(|e| e.to_string())?;
    let info = BookInfo::new(path, &book);
    if json {
        let out = serde_json::to_string_pretty(&info).map_err(|e| e.to_string())?;
        println!("{out}");
    } else {
        info.print();
    }
    Ok(())
}

fn normalize(input: &str, output: &str, target: Option<Version>, html: bool) -> Result<(), String> {
    let mut pipeline = Pipeline::post_load();
    if html {
        pipeline.push(HtmlNormalization::new());
    }
    let mut book = EpubReader::new()
        .with_pipeline(pipeline)
        .open(input)
        .map_err(|e| e.to_string())?;

    let config = EpubConfig {
        target_version: target,
        ..Default::default()
    };
    EpubWriter::new()
        .with_config(config)
        .save(&mut book, output)
        .map_err(|e| e.to_string())?;
    eprintln!("Wrote {output} (EPUB {})", book.version);
    Ok(())
}
