use clap::{Parser, Subcommand, ValueEnum};
use metadoc::migration::destructive_changes;
use metadoc::schema::parse_doctype;
use metadoc::{Data, Doctype, Document, SchemaChange, Store, StoreConfig, Value};
use std::path::PathBuf;
use std::process;

/// metadoc CLI: define doctypes and manage their documents from the command line
#[derive(Parser)]
#[command(name = "metadoc", version, about)]
struct Cli {
    /// SQLite database file (overrides config and METADOC_DATABASE)
    #[arg(long)]
    database: Option<PathBuf>,

    /// Config file (default: $METADOC_CONFIG or ./metadoc.yaml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Do not create the built-in Role/User doctypes on open
    #[arg(long)]
    no_seed: bool,

    /// Output format
    #[arg(long, default_value = "yaml")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Inspect and change doctype definitions
    Doctype {
        #[command(subcommand)]
        action: DoctypeAction,
    },

    /// Read and write documents
    Doc {
        #[command(subcommand)]
        action: DocAction,
    },

    /// Check stored documents against their doctypes
    Validate {
        /// Only check one doctype
        #[arg(long)]
        doctype: Option<String>,
    },

    /// Show the database location and per-doctype counts
    Status,

    /// Create the built-in Role/User doctypes and default records
    Seed,
}

#[derive(Subcommand)]
enum DoctypeAction {
    /// List all doctypes
    List,

    /// Show one doctype
    Show {
        /// Doctype name
        name: String,
    },

    /// Create a doctype from a YAML or JSON definition file
    Create {
        /// Definition file
        file: PathBuf,
    },

    /// Apply a changed definition to an existing doctype
    Update {
        /// Definition file
        file: PathBuf,
        /// Current name of the doctype, when the file has no id (needed for renames)
        #[arg(long)]
        current: Option<String>,
        /// Show what would change without applying
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
enum DocAction {
    /// List documents of a doctype
    List {
        /// Doctype name
        doctype: String,
    },

    /// Get a single document by ID
    Get {
        /// Doctype name
        doctype: String,
        /// Document ID
        id: i64,
    },

    /// Insert a new document
    Create {
        /// Doctype name
        doctype: String,
        /// Field values (e.g. --field title="write docs")
        #[arg(long = "field", value_parser = parse_key_value)]
        fields: Vec<(String, String)>,
        /// Field values as a JSON object
        #[arg(long)]
        json: Option<String>,
    },

    /// Update an existing document
    Update {
        /// Doctype name
        doctype: String,
        /// Document ID
        id: i64,
        /// Field values to update (e.g. --field done=true)
        #[arg(long = "field", value_parser = parse_key_value)]
        fields: Vec<(String, String)>,
        /// Field values as a JSON object
        #[arg(long)]
        json: Option<String>,
    },

    /// Delete a document
    Delete {
        /// Doctype name
        doctype: String,
        /// Document ID
        id: i64,
        /// Show what would be deleted without actually deleting
        #[arg(long)]
        dry_run: bool,
    },
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("Invalid key=value pair: no '=' found in '{s}'"))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("ERROR:{e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = StoreConfig::load(cli.config.as_deref())?;
    if let Some(database) = cli.database {
        config.database = database;
    }
    if cli.no_seed {
        config.seed = false;
    }
    log::debug!("Using database {} (seed: {})", config.database.display(), config.seed);
    let store = Store::open_with_config(&config)?;

    match cli.command {
        Command::Doctype { action } => run_doctype(&store, action, &cli.format)?,
        Command::Doc { action } => run_doc(&store, action, &cli.format)?,

        Command::Validate { doctype } => {
            let result = store.validate(doctype.as_deref())?;
            print_output(&result, &cli.format)?;
        }

        Command::Status => {
            let result = store.status()?;
            print_output(&result, &cli.format)?;
        }

        Command::Seed => {
            let report = store.seed(&config.seed_options())?;
            print_output(&serde_json::to_value(&report)?, &cli.format)?;
        }
    }

    Ok(())
}

fn run_doctype(
    store: &Store,
    action: DoctypeAction,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        DoctypeAction::List => {
            let doctypes = store.list_doctypes()?;
            print_output(&serde_json::to_value(&doctypes)?, format)?;
        }

        DoctypeAction::Show { name } => {
            let doctype = store.get_doctype_by_name(&name)?;
            print_output(&serde_json::to_value(&doctype)?, format)?;
        }

        DoctypeAction::Create { file } => {
            let definition = parse_doctype(&file)?;
            let created = store.create_doctype(&definition)?;
            print_output(&serde_json::to_value(&created)?, format)?;
        }

        DoctypeAction::Update {
            file,
            current,
            dry_run,
        } => {
            let mut definition = parse_doctype(&file)?;
            resolve_id(store, &mut definition, current.as_deref())?;

            if dry_run {
                let plan = store.plan_doctype_update(&definition)?;
                let destructive: Vec<String> = destructive_changes(&plan)
                    .into_iter()
                    .map(SchemaChange::describe)
                    .collect();
                print_output(
                    &serde_json::json!({
                        "dry_run": true,
                        "doctype": definition.name,
                        "changes": describe(&plan),
                        "destructive": destructive,
                    }),
                    format,
                )?;
            } else {
                let applied = store.update_doctype(&definition)?;
                print_output(
                    &serde_json::json!({
                        "ok": true,
                        "doctype": definition.name,
                        "changes": describe(&applied),
                    }),
                    format,
                )?;
            }
        }
    }
    Ok(())
}

fn run_doc(
    store: &Store,
    action: DocAction,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        DocAction::List { doctype } => {
            let docs = store.list_documents(&doctype)?;
            print_output(&serde_json::to_value(&docs)?, format)?;
        }

        DocAction::Get { doctype, id } => {
            let doc = store.get_document(&doctype, id)?;
            print_output(&serde_json::to_value(&doc)?, format)?;
        }

        DocAction::Create {
            doctype,
            fields,
            json,
        } => {
            let doc = Document {
                id: None,
                doctype,
                data: input_data(&fields, json.as_deref())?,
            };
            let created = store.create_document(&doc)?;
            print_output(&serde_json::to_value(&created)?, format)?;
        }

        DocAction::Update {
            doctype,
            id,
            fields,
            json,
        } => {
            let doc = Document {
                id: Some(id),
                doctype,
                data: input_data(&fields, json.as_deref())?,
            };
            store.update_document(&doc)?;
            print_output(&serde_json::json!({ "ok": true, "id": id }), format)?;
        }

        DocAction::Delete {
            doctype,
            id,
            dry_run,
        } => {
            if dry_run {
                let doc = store.get_document(&doctype, id)?;
                print_output(
                    &serde_json::json!({
                        "dry_run": true,
                        "would_delete": { "doctype": doctype, "id": id },
                        "document": doc,
                    }),
                    format,
                )?;
            } else {
                store.delete_document(&doctype, id)?;
                print_output(&serde_json::json!({ "ok": true, "deleted": id }), format)?;
            }
        }
    }
    Ok(())
}

/// Fill in the id of an update definition from the stored doctype named
/// `current` (or the definition's own name).
fn resolve_id(
    store: &Store,
    definition: &mut Doctype,
    current: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    if definition.id.is_none() {
        let name = current.unwrap_or(&definition.name).to_string();
        definition.id = store.get_doctype_by_name(&name)?.id;
    }
    Ok(())
}

fn describe(changes: &[SchemaChange]) -> Vec<String> {
    changes.iter().map(SchemaChange::describe).collect()
}

fn print_output(
    value: &serde_json::Value,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}

/// Build document data from `--json` and `--field` inputs; fields win.
fn input_data(
    fields: &[(String, String)],
    json: Option<&str>,
) -> Result<Data, Box<dyn std::error::Error>> {
    let mut data = match json {
        Some(body) => Value::map_from_json(serde_json::from_str(body)?)?,
        None => Data::new(),
    };
    for (key, val) in fields {
        data.insert(key.clone(), Value::parse_form(val));
    }
    Ok(data)
}
