use segindex::{Entry, Index, Query, SegmentConfig};
use tempfile::TempDir;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let dir = TempDir::new()?;
    let base = dir.path().join("demo_").to_string_lossy().into_owned();

    let config = SegmentConfig {
        capacity_bytes: 1024,
    };
    let mut index = Index::create(&base, config)?;

    let docs = [
        vec!["rust", "mmap", "segments"],
        vec!["rust", "tracing"],
        vec!["bincode", "serde"],
    ];

    let mut ids = Vec::new();
    for terms in docs {
        let id = index.add_entry(&Entry::from_terms(terms))?;
        ids.push(id);
        println!("ingested doc {id}");
    }

    index.add_label("starred", ids[0])?;

    let mut query = Query::new("rust");
    let results = index.run_query(&mut query, 10)?;
    println!("query 'rust' matched, newest first: {results:?}");

    println!("total docs: {}", index.num_docs());
    index.dumpinfo(&mut std::io::stdout())?;

    Ok(())
}
