use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use t3vo_core::crypto::VaultIdentity;
use t3vo_core::parser::{self, NoteType, registry};
use t3vo_core::sync::sync_with;
use t3vo_core::types::{
    AppConfig, Config, ExportedRecord, MaintenanceConfig, NewAttachment, Record, RecordId,
    Timestamp,
};
use t3vo_core::{MaintenanceScheduler, PageQuery, VaultCore};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about = "Local-first encrypted notes and credentials vault")]
struct Cli {
    /// Directory holding the vault files and config.toml.
    #[arg(long, env = "T3VO_DATA_DIR", default_value = ".t3vo", value_name = "PATH")]
    data_dir: PathBuf,

    /// Vault passphrase. Each passphrase opens its own vault.
    #[arg(long, env = "T3VO_PASSPHRASE", hide_env_values = true, default_value = "")]
    passphrase: String,

    /// Accept an empty passphrase and store records unencrypted.
    #[arg(long)]
    allow_unencrypted: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store a new note. Reads stdin when TEXT is omitted.
    Add { text: Option<String> },
    /// Print a record with its parsed fields.
    Show { id: String },
    /// List live records, newest first.
    List(ListArgs),
    /// Replace the text of a record. Reads stdin when TEXT is omitted.
    Update { id: String, text: Option<String> },
    /// Soft-delete a record.
    Delete { id: String },
    /// Bring back a soft-deleted record.
    Restore { id: String },
    /// Delete a record and its attachments permanently.
    Purge { id: String },
    /// Attach files to a record.
    Attach {
        id: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(long, default_value = "application/octet-stream")]
        mime_type: String,
    },
    /// Remove an attachment from a record.
    Detach { id: String, attachment_id: String },
    /// Write a decrypted attachment to a file.
    Fetch {
        id: String,
        attachment_id: String,
        #[arg(long, short)]
        out: PathBuf,
    },
    /// Export every record (still encrypted) as JSON.
    Export {
        #[arg(long, short)]
        out: Option<PathBuf>,
    },
    /// Merge records exported by another device.
    Merge { file: PathBuf },
    /// Run maintenance now, or only when due with --if-due.
    Maintenance {
        #[arg(long)]
        if_due: bool,
    },
    /// Check a note's tags and print warnings. Reads stdin when TEXT is omitted.
    Validate { text: Option<String> },
    /// List the known tags.
    Tags,
}

#[derive(Args, Debug)]
struct ListArgs {
    #[arg(long, default_value_t = 1)]
    page: usize,
    /// Defaults to the configured page size.
    #[arg(long)]
    page_size: Option<usize>,
    #[arg(long)]
    search: Option<String>,
    #[arg(long = "type")]
    note_type: Option<NoteType>,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,t3vo_core=debug")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();

    // These don't touch the vault.
    match &cli.command {
        Command::Validate { text } => return validate(text.clone()),
        Command::Tags => {
            print_tags();
            return Ok(());
        }
        _ => {}
    }

    let app_config = load_config(&cli.data_dir)?;
    let mut core = open_vault(&cli, &app_config)?;
    let now = Timestamp::from(SystemTime::now());

    let maintenance = MaintenanceConfig::try_from(&app_config.lifecycle)?;
    let scheduler = MaintenanceScheduler::new(maintenance);
    if !matches!(cli.command, Command::Maintenance { .. }) {
        scheduler.run_logged(&mut core, now);
    }

    run(cli.command, &mut core, &app_config, scheduler, now)
}

fn load_config(data_dir: &Path) -> Result<AppConfig> {
    let config = AppConfig::load(&AppConfig::path(data_dir))
        .with_context(|| format!("reading config in {}", data_dir.display()))?;

    for error in config.validate() {
        warn!(%error, "invalid config value, using default");
    }
    Ok(config.with_defaults_for_invalid())
}

fn open_vault(cli: &Cli, app_config: &AppConfig) -> Result<VaultCore> {
    let prefix = &app_config.vault.namespace_prefix;
    let identity = if cli.allow_unencrypted {
        VaultIdentity::derive_with_prefix(&cli.passphrase, prefix)
    } else {
        VaultIdentity::derive_strict(&cli.passphrase, prefix)
            .context("set --passphrase or T3VO_PASSPHRASE, or pass --allow-unencrypted")?
    };

    let config = Config {
        base_path: cli.data_dir.clone(),
        namespace: identity.namespace().to_string(),
    };
    let core = VaultCore::open(config, &identity)?;

    let report = core.upgrade_report();
    if report.from_version != report.to_version {
        info!(
            from = report.from_version,
            to = report.to_version,
            migrated = report.migrated,
            "vault upgraded"
        );
    }
    Ok(core)
}

fn run(
    command: Command,
    core: &mut VaultCore,
    app_config: &AppConfig,
    scheduler: MaintenanceScheduler,
    now: Timestamp,
) -> Result<()> {
    match command {
        Command::Add { text } => {
            let id = core.add(&text_or_stdin(text)?, now)?;
            println!("{id}");
        }
        Command::Show { id } => {
            let id = record_id(id)?;
            let Some(record) = core.get(&id)? else {
                bail!("record {id} not found");
            };
            print_record(core, &record);
        }
        Command::List(args) => {
            let mut query = PageQuery::new(
                args.page,
                args.page_size.unwrap_or(app_config.vault.page_size),
            );
            query.search = args.search;
            query.note_type = args.note_type;

            for record in core.fetch_page(&query)? {
                print_summary(&record);
            }
        }
        Command::Update { id, text } => {
            let id = record_id(id)?;
            core.update(&id, &text_or_stdin(text)?, now)?;
        }
        Command::Delete { id } => core.soft_delete(&record_id(id)?, now)?,
        Command::Restore { id } => {
            core.restore(&record_id(id)?, now)?;
        }
        Command::Purge { id } => core.purge(&record_id(id)?)?,
        Command::Attach {
            id,
            files,
            mime_type,
        } => {
            let files = files
                .iter()
                .map(|path| read_attachment(path, &mime_type))
                .collect::<Result<Vec<_>>>()?;
            for attachment_id in core.add_attachments(&record_id(id)?, files, now)? {
                println!("{attachment_id}");
            }
        }
        Command::Detach { id, attachment_id } => {
            core.remove_attachment(&record_id(id)?, &attachment_id, now)?;
        }
        Command::Fetch {
            id,
            attachment_id,
            out,
        } => {
            let Some(bytes) = core.attachment_payload(&record_id(id)?, &attachment_id)? else {
                bail!("attachment {attachment_id} is unavailable");
            };
            fs::write(&out, bytes).with_context(|| format!("writing {}", out.display()))?;
        }
        Command::Export { out } => {
            let json = serde_json::to_string_pretty(&core.export()?)?;
            match out {
                Some(path) => {
                    fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?
                }
                None => println!("{json}"),
            }
        }
        Command::Merge { file } => {
            let json =
                fs::read_to_string(&file).with_context(|| format!("reading {}", file.display()))?;
            let remote: Vec<ExportedRecord> = serde_json::from_str(&json)?;
            let outcome = sync_with(core, &remote)?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::Maintenance { if_due } => {
            let outcome = if if_due {
                scheduler.maybe_run(core, now)?
            } else {
                Some(core.maintenance(now, scheduler.config().retention)?)
            };
            match outcome {
                Some(outcome) => println!(
                    "pruned {} record(s), removed {} orphaned dir(s)",
                    outcome.records_pruned.len(),
                    outcome.orphaned_dirs_removed
                ),
                None => println!("maintenance not due"),
            }
        }
        Command::Validate { text } => validate(text)?,
        Command::Tags => print_tags(),
    }

    Ok(())
}

fn record_id(id: String) -> Result<RecordId> {
    RecordId::try_new(id).context("invalid record id")
}

fn text_or_stdin(text: Option<String>) -> Result<String> {
    match text {
        Some(text) => Ok(text),
        None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok(buffer)
        }
    }
}

fn read_attachment(path: &Path, mime_type: &str) -> Result<NewAttachment> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "attachment".to_string());

    Ok(NewAttachment {
        name,
        mime_type: mime_type.to_string(),
        bytes,
    })
}

fn print_summary(record: &Record) {
    match record.parse() {
        Some(note) => println!("{}  {:<8}  {}", record.id, note.note_type.as_str(), note.title),
        None => println!("{}  <undecryptable>", record.id),
    }
}

fn print_record(core: &VaultCore, record: &Record) {
    let Some(note) = record.parse() else {
        println!("{}: cannot be decrypted with this passphrase", record.id);
        return;
    };

    println!("id:       {}", record.id);
    println!("type:     {}", note.note_type);
    println!("title:    {}", note.title);
    println!("updated:  {}", record.updated_at);
    for (key, value) in note.tags.iter() {
        println!("#@{key}: {}", value.as_str());
    }
    for reference in &note.references {
        println!("link:     {}", reference.url);
    }
    for address in &note.crypto_addresses {
        println!("{}:  {}", address.currency, address.address);
    }
    for attachment in &record.attachments {
        let available = core
            .attachment_payload(&record.id, &attachment.id)
            .ok()
            .flatten()
            .is_some();
        println!(
            "file:     {} {} ({} bytes){}",
            attachment.id,
            attachment.name,
            attachment.size,
            if available { "" } else { " [missing]" }
        );
    }
    if !note.clean_content.is_empty() {
        println!("\n{}", note.clean_content);
    }
}

fn validate(text: Option<String>) -> Result<()> {
    let raw = text_or_stdin(text)?;
    let warnings = parser::validate_note(&raw);
    if warnings.is_empty() {
        println!("ok");
    }
    for warning in warnings {
        println!("warning: {warning}");
    }
    Ok(())
}

fn print_tags() {
    for tag in registry::suggestions(None) {
        println!("#@{:<10} {:<12} {}", tag.name, tag.display_name, tag.description);
    }
}
