use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use clap::Subcommand;
use sheet_insight::analyze::Analyst;
use sheet_insight::config::Config;
use sheet_insight::database::DuckDbStore;
use sheet_insight::database::StorageSink;
use sheet_insight::database::UploadRecord;
use sheet_insight::dataset::normalize;
use sheet_insight::ingest::IngestionCoordinator;
use sheet_insight::ingest::Upload;
use sheet_insight::llm::HttpJobService;
use sheet_insight::preview::preview_dataset;
use sheet_insight::preview::preview_grid;
use sheet_insight::preview::DATASET_PREVIEW_ROWS;
use sheet_insight::preview::RAW_PREVIEW_ROWS;
use sheet_insight::spreadsheet;
use std::path::Path;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "sheet-insight",
    version,
    about = "Load spreadsheets into DuckDB and ask questions about them"
)]
struct Cli {
    /// DuckDB database file (overrides INSIGHT_DATABASE)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store a spreadsheet as a new table
    Ingest {
        file: PathBuf,
        /// 1-based row holding the column labels
        #[arg(long)]
        header_row: usize,
        #[arg(long, default_value = "anonymous")]
        user: String,
    },
    /// Show the first rows of a spreadsheet without storing it
    Preview {
        file: PathBuf,
        #[arg(long, default_value_t = RAW_PREVIEW_ROWS)]
        rows: usize,
        /// Preview the table this header row would produce
        #[arg(long)]
        header_row: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// List uploads
    Uploads {
        /// Only uploads whose table was never created
        #[arg(long)]
        orphans: bool,
    },
    /// Show the first rows of a stored table
    Show {
        table: String,
        #[arg(long, default_value_t = DATASET_PREVIEW_ROWS)]
        rows: usize,
    },
    /// Ask a question about a stored table
    Ask {
        table: String,
        question: String,
        /// Translate the question to SQL and run it
        #[arg(long)]
        execute: bool,
        #[arg(long, default_value_t = DATASET_PREVIEW_ROWS)]
        rows: usize,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    if let Some(database) = cli.database {
        config.database = database;
    }

    match cli.command {
        Command::Ingest { file, header_row, user } => {
            let bytes = read(&file)?;
            let filename = file_name(&file);
            let mut store = DuckDbStore::open(&config.database)?;
            let outcome = IngestionCoordinator::new(&mut store).ingest(&Upload {
                bytes: &bytes,
                filename: &filename,
                header_row,
                uploaded_by: &user,
            })?;
            println!(
                "Upload {} stored {} rows in {}",
                outcome.record.id, outcome.record.row_count, outcome.record.table_name
            );
            print!("{}", preview_dataset(&outcome.dataset, DATASET_PREVIEW_ROWS));
        }
        Command::Preview { file, rows, header_row, json } => {
            let grid = spreadsheet::load(&read(&file)?)?;
            let preview = match header_row {
                Some(header_row) => preview_dataset(&normalize(&grid, header_row)?, rows),
                None => preview_grid(&grid, rows),
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&preview)?);
            } else {
                print!("{preview}");
            }
        }
        Command::Uploads { orphans } => {
            let store = DuckDbStore::open(&config.database)?;
            let uploads = if orphans { store.orphans()? } else { store.uploads()? };
            if uploads.is_empty() {
                println!("No uploads");
            }
            for upload in &uploads {
                print_upload(upload);
            }
        }
        Command::Show { table, rows } => {
            let store = DuckDbStore::open(&config.database)?;
            let dataset = store.query_table(&table, rows)?;
            print!("{}", preview_dataset(&dataset, rows));
        }
        Command::Ask { table, question, execute, rows } => {
            let store = DuckDbStore::open(&config.database)?;
            let service = HttpJobService::new(&config.api_url, config.api_token.clone());
            let analyst = Analyst::new(&service, &config.model, config.poll.clone());
            if execute {
                let sql = analyst.ask_sql(&store, &table, &question)?;
                println!("{sql}\n");
                let result = store
                    .run_query(&sql, rows)
                    .with_context(|| format!("running generated SQL: {sql}"))?;
                print!("{}", preview_dataset(&result, rows));
            } else {
                println!("{}", analyst.ask_about_table(&store, &table, &question)?);
            }
        }
    }

    Ok(())
}

fn read(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("reading {}", path.display()))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn print_upload(upload: &UploadRecord) {
    let table = if upload.is_orphan() { "(no table)" } else { upload.table_name.as_str() };
    println!(
        "{:>5}  {}  {}  header row {}  {} rows  by {}  -> {}",
        upload.id,
        upload.uploaded_at.format("%Y-%m-%d %H:%M:%S"),
        upload.filename,
        upload.header_row,
        upload.row_count,
        upload.uploaded_by,
        table
    );
}
