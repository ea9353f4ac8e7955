use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::{Path, PathBuf};

use memosync::cache::{CacheStorage, LocalCache, NoopStorage, SlotKey, SqliteStorage};
use memosync::config::Config;
use memosync::model::MemoCard;
use memosync::remote::{HttpRemoteStore, OfflineRemote, RemoteStore};
use memosync::render;
use memosync::sync::{AddOutcome, LoadSource, RemoveOutcome, SyncCore};

#[derive(Parser, Debug)]
#[command(name = "memosync")]
#[command(about = "Browse and edit memo cards, with an offline fallback")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/memosync/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Backend base URL, overrides config and MEMOSYNC_API_URL
  #[arg(long, global = true)]
  url: Option<String>,

  /// Do not contact the backend; serve the local cache or defaults
  #[arg(long, global = true)]
  offline: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List memo cards, newest first
  List {
    /// Only cards with this theme id
    #[arg(long)]
    theme: Option<String>,
    /// Only cards with this body system id
    #[arg(long)]
    body_system: Option<String>,
  },
  /// Show one memo card
  Show { id: String },
  /// List themes and body systems
  Categories,
  /// Add a memo card from a JSON file
  Add { file: PathBuf },
  /// Remove a memo card
  Remove { id: String },
  /// Forget the locally cached dataset
  ClearCache,
}

type Core = SyncCore<Box<dyn CacheStorage>, Box<dyn RemoteStore>>;

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let mut config = Config::load(args.config.as_deref())?;

  // Override remote if specified on command line
  if let Some(url) = args.url {
    config.remote.url = url;
  }

  let _log_guard = memosync::logging::init(&config.log)?;
  tracing::info!(remote = %config.remote.url, offline = args.offline, "starting");

  let core = build_core(&config, args.offline)?;
  run(&core, args.command).await
}

fn build_core(config: &Config, offline: bool) -> Result<Core> {
  let storage: Box<dyn CacheStorage> = if config.cache.enabled {
    Box::new(SqliteStorage::open_at(&config.cache_path()?)?)
  } else {
    Box::new(NoopStorage)
  };
  let cache = LocalCache::new(storage, SlotKey::for_remote(&config.remote.url));

  let remote: Box<dyn RemoteStore> = if offline {
    Box::new(OfflineRemote)
  } else {
    Box::new(HttpRemoteStore::new(&config.remote.url)?)
  };

  Ok(SyncCore::new(cache, remote))
}

async fn run(core: &Core, command: Command) -> Result<()> {
  if let Command::ClearCache = command {
    core.cache().clear();
    println!("Local cache cleared");
    return Ok(());
  }

  let source = core.load().await;
  if source != LoadSource::Remote {
    print_notice(core);
  }

  match command {
    Command::List { theme, body_system } => {
      let dataset = core
        .snapshot()
        .ok_or_else(|| eyre!("Dataset not loaded"))?;
      let records: Vec<&MemoCard> = match (theme.as_deref(), body_system.as_deref()) {
        (Some(t), Some(s)) => dataset
          .records_for_theme(t)
          .filter(|r| r.body_system.id == s)
          .collect(),
        (Some(t), None) => dataset.records_for_theme(t).collect(),
        (None, Some(s)) => dataset.records_for_body_system(s).collect(),
        (None, None) => dataset.records.iter().collect(),
      };

      if records.is_empty() {
        println!("No memo cards");
      }
      for record in records {
        println!("{}", render::record_line(record));
      }
    }
    Command::Show { id } => match core.find_by_id(&id) {
      Some(record) => print!("{}", render::record_detail(&record)),
      None => return Err(eyre!("No memo card with id {}", id)),
    },
    Command::Categories => {
      let dataset = core
        .snapshot()
        .ok_or_else(|| eyre!("Dataset not loaded"))?;
      print!("{}", render::categories(&dataset));
    }
    Command::Add { file } => {
      let record = read_record(&file)?;
      let id = record.id.clone();
      match core.add(record).await? {
        AddOutcome::Synced => println!("Added {}", id),
        AddOutcome::KeptLocally(e) => {
          print_notice(core);
          println!("Added {} locally ({})", id, e);
        }
      }
    }
    Command::Remove { id } => match core.remove(&id).await? {
      RemoveOutcome::Synced => println!("Removed {}", id),
      RemoveOutcome::Reverted(e) => {
        print_notice(core);
        println!("Kept {} ({})", id, e);
      }
    },
    Command::ClearCache => {}
  }

  Ok(())
}

fn print_notice(core: &Core) {
  if let Some(notice) = core.notice() {
    eprintln!("{}", render::notice_line(notice));
  }
}

fn read_record(path: &Path) -> Result<MemoCard> {
  let contents = std::fs::read_to_string(path)
    .map_err(|e| eyre!("Failed to read {}: {}", path.display(), e))?;

  serde_json::from_str(&contents)
    .map_err(|e| eyre!("Failed to parse memo card {}: {}", path.display(), e))
}
