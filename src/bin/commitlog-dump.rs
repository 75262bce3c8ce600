/// commitlog-dump: read-only inspector for store and index files
///
/// Commands:
/// - store <path>
/// - index <path>
///
/// Files are decoded directly and never opened through `Store`/`Index`,
/// since opening an index extends it on disk. Output is one JSON object per
/// line.

use commitlog::storage::scan;
use commitlog::storage::store::LEN_WIDTH;
use serde_json::json;

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 3 {
        print_usage();
        return Ok(());
    }

    let path = &args[2];

    match args[1].as_str() {
        "store" => dump_store(path)?,
        "index" => dump_index(path)?,
        _ => print_usage(),
    }

    Ok(())
}

fn print_usage() {
    println!("commitlog-dump: inspect commitlog storage files");
    println!();
    println!("Usage:");
    println!("  commitlog-dump store <path>");
    println!("  commitlog-dump index <path>");
}

fn dump_store(path: &str) -> anyhow::Result<()> {
    let frames = scan::read_frames(path)?;

    let mut size = 0u64;
    for (record, frame) in frames.iter().enumerate() {
        let output = json!({
            "record": record,
            "position": frame.position,
            "length": frame.payload.len(),
            "payload": String::from_utf8_lossy(&frame.payload),
        });
        println!("{}", serde_json::to_string(&output)?);
        size = frame.position + LEN_WIDTH + frame.payload.len() as u64;
    }

    let summary = json!({ "records": frames.len(), "size": size });
    println!("{}", serde_json::to_string(&summary)?);

    Ok(())
}

fn dump_index(path: &str) -> anyhow::Result<()> {
    let entries = scan::read_entries(path)?;

    for (entry, (offset, position)) in entries.iter().enumerate() {
        let output = json!({
            "entry": entry,
            "offset": offset,
            "position": position,
        });
        println!("{}", serde_json::to_string(&output)?);
    }

    let summary = json!({ "entries": entries.len() });
    println!("{}", serde_json::to_string(&summary)?);

    Ok(())
}
