//! porter-ctl — command-line interface for the porter importer.
//!
//! Every subcommand that talks to a repository spawns its own helper
//! process, negotiates startup, runs, and tears the helper down on exit.
//! `import` fans several revisions out across parallel lanes; each lane is
//! one importer with its own helper, all writing into the shared store.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use porter_core::config::{HelperConfig, PorterConfig};
use porter_core::ObjectId;
use porter_import::RepoImporter;
use porter_store::{Family, SqliteStore, Tree};

// ── Options ──────────────────────────────────────────────────────────────────

struct Options {
    repo: Option<PathBuf>,
    store: Option<PathBuf>,
    helper: Option<PathBuf>,
    lanes: Option<u32>,
    json: bool,
}

// ── Setup helpers ────────────────────────────────────────────────────────────

fn open_store(config: &PorterConfig) -> Result<Arc<SqliteStore>> {
    let store = SqliteStore::open(&config.store.path)
        .with_context(|| format!("failed to open store at {}", config.store.path.display()))?;
    Ok(Arc::new(store))
}

fn spawn_importer(
    opts: &Options,
    config: &PorterConfig,
    store: Arc<SqliteStore>,
) -> Result<RepoImporter<SqliteStore>> {
    let repo = opts.repo.as_deref().context("--repo is required for this command")?;
    RepoImporter::spawn(repo, store, &config.helper)
        .with_context(|| format!("failed to start helper for {}", repo.display()))
}

fn parse_object_id(s: &str) -> Result<ObjectId> {
    ObjectId::from_hex(s).with_context(|| format!("not a valid object id: {s:?}"))
}

// ── Subcommand handlers ──────────────────────────────────────────────────────

fn cmd_import(opts: &Options, config: &PorterConfig, revs: &[&str]) -> Result<()> {
    let store = open_store(config)?;
    let repo = opts.repo.as_deref().context("--repo is required for this command")?;
    let lanes = (config.import.lanes.max(1) as usize).min(revs.len());
    let per_lane = revs.len().div_ceil(lanes);

    tracing::info!(revs = revs.len(), lanes, "starting import");

    // One importer (and one helper process) per lane; the store is the only
    // shared state, and its records are content-addressed.
    let results: Vec<(String, Result<ObjectId, String>)> = std::thread::scope(|scope| {
        let mut handles = Vec::new();
        for chunk in revs.chunks(per_lane) {
            let store = Arc::clone(&store);
            let helper = &config.helper;
            handles.push(scope.spawn(move || {
                let mut out = Vec::new();
                let mut importer = match RepoImporter::spawn(repo, store, helper) {
                    Ok(importer) => importer,
                    Err(e) => {
                        for rev in chunk {
                            out.push((rev.to_string(), Err(format!("helper startup failed: {e}"))));
                        }
                        return out;
                    }
                };
                for rev in chunk {
                    let result =
                        importer.import_manifest(rev).map_err(|e| e.to_string());
                    out.push((rev.to_string(), result));
                }
                out
            }));
        }
        handles.into_iter().flat_map(|h| h.join().expect("lane panicked")).collect()
    });

    let mut failures = 0;
    for (rev, result) in &results {
        match result {
            Ok(root) if opts.json => {
                println!("{}", serde_json::json!({ "rev": rev, "root": root.to_hex() }));
            }
            Ok(root) => println!("  {rev} : {root}"),
            Err(message) => {
                failures += 1;
                eprintln!("  {rev} : FAILED — {message}");
            }
        }
    }
    if failures > 0 {
        bail!("{failures} of {} imports failed", results.len());
    }
    Ok(())
}

fn cmd_import_one(
    opts: &Options,
    config: &PorterConfig,
    rev: &str,
    flat: bool,
) -> Result<()> {
    let store = open_store(config)?;
    let mut importer = spawn_importer(opts, config, store)?;
    let root = if flat {
        importer.import_flat_manifest(rev)?
    } else {
        importer.import_tree_manifest(rev)?
    };
    if opts.json {
        println!("{}", serde_json::json!({ "rev": rev, "root": root.to_hex() }));
    } else {
        println!("  {rev} : {root}");
    }
    Ok(())
}

fn cmd_resolve(opts: &Options, config: &PorterConfig, rev: &str) -> Result<()> {
    let store = open_store(config)?;
    let mut importer = spawn_importer(opts, config, store)?;
    let node = importer.resolve_manifest_node(rev)?;
    if opts.json {
        println!("{}", serde_json::json!({ "rev": rev, "node": node.to_hex() }));
    } else {
        println!("  {rev} : {node}");
    }
    Ok(())
}

fn cmd_tree(opts: &Options, config: &PorterConfig, id: &str) -> Result<()> {
    let store = open_store(config)?;
    let id = parse_object_id(id)?;
    let tree = Tree::load(store.as_ref(), &id)?
        .with_context(|| format!("no tree record for {id}"))?;

    if opts.json {
        let entries: Vec<_> = tree
            .entries()
            .iter()
            .map(|e| {
                serde_json::json!({
                    "name": e.name,
                    "id": e.id.to_hex(),
                    "kind": format!("{:?}", e.kind),
                })
            })
            .collect();
        println!("{}", serde_json::json!({ "id": id.to_hex(), "entries": entries }));
        return Ok(());
    }

    println!("═══════════════════════════════════════");
    println!("  Tree {}", &id.to_hex()[..16]);
    println!("═══════════════════════════════════════");
    if tree.is_empty() {
        println!("  (empty)");
    }
    for entry in tree.entries() {
        let kind = match entry.kind {
            porter_core::FileKind::Regular => "file",
            porter_core::FileKind::Executable => "exec",
            porter_core::FileKind::Symlink => "link",
            porter_core::FileKind::Tree => "tree",
        };
        println!("  {} {:<24} {}", kind, entry.name, &entry.id.to_hex()[..16]);
    }
    Ok(())
}

fn cmd_import_tree_dir(opts: &Options, config: &PorterConfig, id: &str) -> Result<()> {
    let store = open_store(config)?;
    let id = parse_object_id(id)?;
    let mut importer = spawn_importer(opts, config, Arc::clone(&store))?;
    let tree = importer.import_tree(&id)?;
    if opts.json {
        println!(
            "{}",
            serde_json::json!({ "id": id.to_hex(), "entries": tree.len() })
        );
    } else {
        println!("  imported {} ({} entries)", id, tree.len());
    }
    Ok(())
}

fn cmd_cat(opts: &Options, config: &PorterConfig, id: &str) -> Result<()> {
    let store = open_store(config)?;
    let id = parse_object_id(id)?;
    let mut importer = spawn_importer(opts, config, store)?;
    let contents = importer.import_file_contents(&id)?;

    use std::io::Write;
    std::io::stdout().write_all(&contents).context("failed to write file contents")?;
    Ok(())
}

fn cmd_config(opts: &Options, config: &PorterConfig) -> Result<()> {
    if opts.json {
        println!("{}", serde_json::to_string_pretty(config)?);
        return Ok(());
    }
    println!("═══════════════════════════════════════");
    println!("  Porter Configuration");
    println!("═══════════════════════════════════════");
    println!("  Config file    : {}", PorterConfig::file_path().display());
    println!("  Helper command : {}", config.helper.command.display());
    if !config.helper.args.is_empty() {
        println!("  Helper args    : {}", config.helper.args.join(" "));
    }
    println!("  Store path     : {}", config.store.path.display());
    println!("  Import lanes   : {}", config.import.lanes);
    Ok(())
}

fn cmd_stats(opts: &Options, config: &PorterConfig) -> Result<()> {
    let store = open_store(config)?;
    let trees = store.count(Family::Tree)?;
    let proxies = store.count(Family::Proxy)?;
    if opts.json {
        println!("{}", serde_json::json!({ "trees": trees, "proxies": proxies }));
        return Ok(());
    }
    println!("═══════════════════════════════════════");
    println!("  Store Stats");
    println!("═══════════════════════════════════════");
    println!("  Tree records  : {trees}");
    println!("  Proxy records : {proxies}");
    Ok(())
}

fn print_usage() {
    println!("Usage: porter-ctl [options] <command>");
    println!();
    println!("Commands:");
    println!("  import <rev>...     Import manifests (tree-granular when negotiated)");
    println!("  import-flat <rev>   Import one revision's flat manifest");
    println!("  import-tree <rev>   Import one revision's manifest root, tree-granular");
    println!("  tree <id>           Show a stored tree record");
    println!("  fetch-tree <id>     Import the single directory behind a local id");
    println!("  cat <id>            Print a file's contents fetched via the helper");
    println!("  resolve <rev>       Resolve a revision to its manifest node");
    println!("  stats               Show object store record counts");
    println!("  config              Show the effective configuration");
    println!();
    println!("Options:");
    println!("  --repo <path>     Repository path (required for helper commands)");
    println!("  --store <path>    Object store path (default: from config)");
    println!("  --helper <path>   Helper executable override");
    println!("  --lanes <n>       Parallel import lanes (default: from config)");
    println!("  --json            Machine-readable output");
}

// ── Entry point ──────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut opts = Options { repo: None, store: None, helper: None, lanes: None, json: false };
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--repo" => {
                i += 1;
                opts.repo = Some(PathBuf::from(args.get(i).context("--repo requires a value")?));
            }
            "--store" => {
                i += 1;
                opts.store = Some(PathBuf::from(args.get(i).context("--store requires a value")?));
            }
            "--helper" => {
                i += 1;
                opts.helper =
                    Some(PathBuf::from(args.get(i).context("--helper requires a value")?));
            }
            "--lanes" => {
                i += 1;
                opts.lanes = Some(
                    args.get(i)
                        .context("--lanes requires a value")?
                        .parse()
                        .context("--lanes must be a number")?,
                );
            }
            "--json" => opts.json = true,
            other => remaining.push(other),
        }
        i += 1;
    }

    let mut config = PorterConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        PorterConfig::default()
    });
    if let Some(path) = &opts.store {
        config.store.path = path.clone();
    }
    if let Some(command) = &opts.helper {
        config.helper = HelperConfig { command: command.clone(), args: Vec::new() };
    }
    if let Some(lanes) = opts.lanes {
        config.import.lanes = lanes;
    }

    match remaining.as_slice() {
        ["import", revs @ ..] if !revs.is_empty() => cmd_import(&opts, &config, revs),
        ["import-flat", rev] => cmd_import_one(&opts, &config, rev, true),
        ["import-tree", rev] => cmd_import_one(&opts, &config, rev, false),
        ["tree", id] => cmd_tree(&opts, &config, id),
        ["fetch-tree", id] => cmd_import_tree_dir(&opts, &config, id),
        ["cat", id] => cmd_cat(&opts, &config, id),
        ["resolve", rev] => cmd_resolve(&opts, &config, rev),
        ["stats"] => cmd_stats(&opts, &config),
        ["config"] => cmd_config(&opts, &config),
        ["help"] | ["--help"] | ["-h"] | [] => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
