use std::env;
use std::path::PathBuf;

use chrono::{TimeZone, Utc};

use searchbridge_core::config::{Config, SearchOptions};
use searchbridge_core::document::{DocumentField, FieldValue, IndexDocument};
use searchbridge_core::filter::Filter;
use searchbridge_core::request::SearchRequest;
use searchbridge_core::traits::SearchProvider;
use searchbridge_tantivy::TantivySearchProvider;

// Index a few products and run a keyword search plus a filtered search.
// Usage:
//   cargo run -p searchbridge-tantivy --example quickstart -- [--root ./dev_data/indexes]

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let mut root: Option<PathBuf> = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--root" => {
                if i + 1 >= args.len() {
                    eprintln!("--root requires a path");
                    std::process::exit(2);
                }
                root = Some(PathBuf::from(&args[i + 1]));
                i += 2;
            }
            s => {
                eprintln!("Unknown flag: {s}");
                std::process::exit(2);
            }
        }
    }
    // --root wins; otherwise the [search] section of config.toml, then a
    // default under ./dev_data.
    let options = match root {
        Some(root) => SearchOptions::new("demo", root),
        None => Config::load()?.search_options().unwrap_or_else(|_| {
            SearchOptions::new("demo", PathBuf::from("./dev_data/indexes"))
        }),
    };

    let provider = TantivySearchProvider::new(options);

    let documents = vec![
        product("Item-1", "Red Shirt", "Red", 4, "A bright red shirt"),
        product("Item-2", "Black Sox", "Black", 10, "Plain black sox"),
        product("Item-3", "Blue Shirt", "Blue", 10, "A blue shirt with buttons"),
    ];
    let result = provider.index("product", &documents)?;
    for item in &result.items {
        println!("indexed {}: {}", item.id, if item.succeeded { "ok" } else { "failed" });
    }

    let keyword = SearchRequest {
        keywords: Some("shirt".to_string()),
        take: 10,
        ..SearchRequest::default()
    };
    let response = provider.search("product", &keyword)?;
    println!("keyword 'shirt': {} matches", response.total_count);
    for doc in &response.documents {
        println!("  {} {:?}", doc.id, doc.field("name"));
    }

    let filtered = SearchRequest {
        filter: Some(Filter::term("Color", &["Red", "Blue"])),
        take: 10,
        ..SearchRequest::default()
    };
    let response = provider.search("product", &filtered)?;
    println!("Color in [Red, Blue]: {} matches", response.total_count);

    Ok(())
}

fn product(id: &str, name: &str, color: &str, size: i32, content: &str) -> IndexDocument {
    IndexDocument::new(id)
        .with_field(DocumentField::new("Name", FieldValue::String(name.to_string())).searchable())
        .with_field(DocumentField::new("Color", FieldValue::String(color.to_string())))
        .with_field(DocumentField::new("Size", FieldValue::Integer(size)))
        .with_field(
            DocumentField::new("Content", FieldValue::String(content.to_string())).searchable(),
        )
        .with_field(DocumentField::new(
            "Date",
            FieldValue::DateTime(
                Utc.with_ymd_and_hms(2017, 4, 28, 15, 24, 31)
                    .single()
                    .expect("valid timestamp"),
            ),
        ))
}
