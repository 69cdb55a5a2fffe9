use anyhow::{bail, Context, Result};
use canvass_core::bulk::{import_rows, ImportContext};
use canvass_core::db::{self, VoterStore};
use canvass_core::normalize::{normalize_optional, normalize_text, normalize_voting_place};
use canvass_core::reconcile::voting_place_matches;
use canvass_core::registration::{register_voter, verify_for_registration};
use canvass_core::registry::FixtureRegistry;
use canvass_core::schema::{ManualRecord, NewLeader, VoterRow, VoterSubmission};
use canvass_core::validation::validate_national_id;
use canvass_core::CanvassConfig;
use clap::{Args, Parser, Subcommand};
use rusqlite::Connection;
use schemars::schema::RootSchema;
use schemars::schema_for;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "canvass")]
#[command(about = "Voter registration and registry reconciliation CLI", long_about = None)]
struct Cli {
    /// Configuration file; defaults apply when it does not exist
    #[arg(long, global = true, default_value = "canvass.toml")]
    config: PathBuf,

    /// SQLite database path, overriding the configuration
    #[arg(long, global = true)]
    db: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export canonical JSON Schemas to the ./schemas directory
    Schema {
        #[command(subcommand)]
        command: SchemaCommands,
    },
    /// Check a national ID against the registry, optionally reconciling manual data
    Verify(VerifyArgs),
    /// Register one voter from a JSON submission
    Register {
        #[arg(long)]
        input: PathBuf,
        /// Operator recorded as the registering user
        #[arg(long)]
        user: Option<String>,
    },
    /// Import voters from a JSON array of sheet rows
    Import {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        leader_id: Option<i64>,
        #[arg(long)]
        user: Option<String>,
    },
    /// Manage leaders
    Leader {
        #[command(subcommand)]
        command: LeaderCommands,
    },
    /// Show how two voting-place values normalize and whether they match
    Place {
        #[arg(long)]
        authoritative: String,
        #[arg(long)]
        manual: String,
    },
}

#[derive(Subcommand)]
enum SchemaCommands {
    /// Export JSON Schema files for canonical types
    Export {
        /// Output directory (default: ./schemas)
        #[arg(long, default_value = "schemas")]
        out_dir: PathBuf,
    },
}

#[derive(Subcommand)]
enum LeaderCommands {
    /// Register a leader
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        national_id: String,
        #[arg(long)]
        municipality: Option<String>,
    },
    /// Mark a leader inactive; inactive leaders cannot receive voters
    Deactivate {
        #[arg(long)]
        id: i64,
    },
}

#[derive(Args)]
struct VerifyArgs {
    #[arg(long)]
    cedula: String,
    #[arg(long)]
    department: Option<String>,
    #[arg(long)]
    municipality: Option<String>,
    #[arg(long)]
    voting_station: Option<String>,
    #[arg(long)]
    polling_table: Option<String>,
    #[arg(long)]
    address: Option<String>,
    /// Voter being re-verified, not counted as a duplicate
    #[arg(long)]
    exclude_voter_id: Option<i64>,
    /// Registry fixture file, overriding the configuration
    #[arg(long)]
    registry: Option<PathBuf>,
}

impl VerifyArgs {
    fn manual_record(&self) -> Option<ManualRecord> {
        let given = [
            &self.department,
            &self.municipality,
            &self.voting_station,
            &self.polling_table,
            &self.address,
        ]
        .iter()
        .any(|value| value.is_some());
        given.then(|| ManualRecord {
            department: self.department.clone(),
            municipality: self.municipality.clone(),
            voting_station: self.voting_station.clone(),
            polling_table: self.polling_table.clone(),
            address: self.address.clone(),
        })
    }
}

#[derive(Serialize)]
struct PlaceComparison {
    authoritative: String,
    manual: String,
    matches: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = CanvassConfig::load_or_default(&cli.config)?;
    init_tracing(&config.logging.filter);

    match cli.command {
        Commands::Schema { command } => match command {
            SchemaCommands::Export { out_dir } => schema_export(out_dir),
        },
        Commands::Verify(args) => verify(&config, cli.db.as_deref(), &args),
        Commands::Register { input, user } => register(&config, cli.db.as_deref(), &input, user.as_deref()),
        Commands::Import {
            input,
            leader_id,
            user,
        } => import(&config, cli.db.as_deref(), &input, leader_id, user),
        Commands::Leader { command } => leader(&config, cli.db.as_deref(), command),
        Commands::Place {
            authoritative,
            manual,
        } => place(&authoritative, &manual),
    }
}

fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    if let Err(e) = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }
}

fn open_db(config: &CanvassConfig, db_override: Option<&str>) -> Result<Connection> {
    db::open(db_override.unwrap_or(&config.database.path))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn verify(config: &CanvassConfig, db_override: Option<&str>, args: &VerifyArgs) -> Result<()> {
    let Some(fixtures) = args.registry.as_ref().or(config.registry.fixtures.as_ref()) else {
        bail!("no registry configured: pass --registry or set [registry] fixtures");
    };
    let registry = FixtureRegistry::load(fixtures)?;
    let conn = open_db(config, db_override)?;

    let manual = args.manual_record();
    let outcome = verify_for_registration(
        &conn,
        &registry,
        &args.cedula,
        manual.as_ref(),
        args.exclude_voter_id,
    )?;
    print_json(&outcome)
}

fn register(
    config: &CanvassConfig,
    db_override: Option<&str>,
    input: &Path,
    user: Option<&str>,
) -> Result<()> {
    let raw = fs::read_to_string(input).with_context(|| format!("reading {}", input.display()))?;
    let submission: VoterSubmission =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", input.display()))?;
    let conn = open_db(config, db_override)?;

    let id = register_voter(&conn, &submission, user)?;
    print_json(&serde_json::json!({ "id": id }))
}

fn import(
    config: &CanvassConfig,
    db_override: Option<&str>,
    input: &Path,
    leader_id: Option<i64>,
    user: Option<String>,
) -> Result<()> {
    let raw = fs::read_to_string(input).with_context(|| format!("reading {}", input.display()))?;
    let rows: Vec<VoterRow> =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", input.display()))?;
    if rows.is_empty() {
        bail!("{} has no data rows", input.display());
    }
    if rows.iter().any(|row| row.row == 0) {
        bail!("{}: row numbers start at 1", input.display());
    }

    let conn = open_db(config, db_override)?;
    if let Some(leader_id) = leader_id {
        if !conn.leader_is_active(leader_id)? {
            bail!("leader {leader_id} does not exist or is inactive");
        }
    }

    let source_name = input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());
    let context = ImportContext {
        leader_id,
        registered_by: user,
        source_name,
    };
    let report = import_rows(&conn, &context, &rows);

    if !report.errors.is_empty() {
        // losing the incident must not hide the import result
        if let Err(e) = db::record_import_incident(
            &conn,
            context.leader_id,
            context.registered_by.as_deref(),
            context.source_name.as_deref(),
            &report,
        ) {
            warn!(error = %e, "could not record import incident");
        }
    }
    print_json(&report)
}

fn leader(config: &CanvassConfig, db_override: Option<&str>, command: LeaderCommands) -> Result<()> {
    let conn = open_db(config, db_override)?;
    match command {
        LeaderCommands::Add {
            name,
            national_id,
            municipality,
        } => {
            let leader = NewLeader {
                name: normalize_text(&name),
                national_id: validate_national_id(&national_id)?,
                municipality: normalize_optional(municipality.as_deref()),
            };
            let id = db::insert_leader(&conn, &leader)?;
            print_json(&serde_json::json!({ "id": id }))
        }
        LeaderCommands::Deactivate { id } => {
            if !db::deactivate_leader(&conn, id)? {
                bail!("leader {id} not found");
            }
            print_json(&serde_json::json!({ "id": id, "active": false }))
        }
    }
}

fn place(authoritative: &str, manual: &str) -> Result<()> {
    print_json(&PlaceComparison {
        authoritative: normalize_voting_place(Some(authoritative)),
        manual: normalize_voting_place(Some(manual)),
        matches: voting_place_matches(Some(authoritative), Some(manual)),
    })
}

fn schema_export(out_dir: PathBuf) -> Result<()> {
    fs::create_dir_all(&out_dir)?;

    let schemas: [(&str, RootSchema); 7] = [
        ("AuthoritativeRecord", schema_for!(canvass_core::schema::AuthoritativeRecord)),
        ("ManualRecord", schema_for!(canvass_core::schema::ManualRecord)),
        ("ReconciliationResult", schema_for!(canvass_core::schema::ReconciliationResult)),
        ("VerificationOutcome", schema_for!(canvass_core::schema::VerificationOutcome)),
        ("VoterRow", schema_for!(canvass_core::schema::VoterRow)),
        ("VoterSubmission", schema_for!(canvass_core::schema::VoterSubmission)),
        ("BulkImportReport", schema_for!(canvass_core::schema::BulkImportReport)),
    ];
    for (name, schema) in &schemas {
        let json = serde_json::to_string_pretty(schema)?;
        fs::write(out_dir.join(format!("{name}.schema.json")), json)?;
    }

    println!("Exported schemas to {}", out_dir.display());
    Ok(())
}
