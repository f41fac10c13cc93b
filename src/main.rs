use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use size_pivot::config::ConversionConfig;
use size_pivot::convert::{self, ColumnSelection, MeltRequest, ValueColumns, WidenRequest};
use size_pivot::io::excel_read::{DEFAULT_HEADER_ROW, ReadOptions};
use size_pivot::layout::RESULT_SHEET;
use size_pivot::melt::{DEFAULT_VALUE_NAME, DEFAULT_VAR_NAME};
use size_pivot::model::format_number;
use size_pivot::pivot::{SizeMode, SizeRange};
use size_pivot::{Result, ToolError};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    if let Err(error) = run(cli) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    init_logging(cli.verbose, cli.quiet)?;
    match cli.command {
        Command::Widen(args) => execute_widen(args),
        Command::Melt(args) => execute_melt(args),
    }
}

fn init_logging(verbose: u8, quiet: bool) -> Result<()> {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,size_pivot={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|error| ToolError::Logging(error.to_string()))
}

fn execute_widen(args: WidenArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => ConversionConfig::load(path)?,
        None => ConversionConfig::default(),
    };
    args.apply_to(&mut config);
    config.validate()?;

    let mut request = WidenRequest::from_config(&config);
    request.columns = ColumnSelection {
        key: args.sku,
        size: args.size,
        quantity: args.qty,
    };
    request.report = args.report;

    let pivoted = convert::widen_workbook(&args.input, &args.output, &request)?;
    let reconciliation = &pivoted.reconciliation;

    println!(
        "{} items x {} sizes written to {}",
        pivoted.table.rows.len(),
        pivoted.table.sizes.len(),
        args.output.display()
    );
    println!("source total: {}", format_number(reconciliation.source_total));
    println!("output total: {}", format_number(reconciliation.output_total));
    if !reconciliation.dropped_rows.is_empty() {
        println!(
            "dropped rows: {} (qty {})",
            reconciliation.dropped_rows.len(),
            format_number(reconciliation.dropped_total)
        );
    }
    Ok(())
}

fn execute_melt(args: MeltArgs) -> Result<()> {
    let value_columns = match args.range {
        Some(range) => ValueColumns::Range(range),
        None => ValueColumns::Names(args.columns),
    };

    let request = MeltRequest {
        read: ReadOptions {
            sheet: args.sheet,
            header_row: args.header_row,
        },
        id_columns: args.id,
        value_columns,
        var_name: args.var_name,
        value_name: args.value_name,
        keep_missing: args.keep_empty,
        result_sheet: args.result_sheet,
    };

    let long = convert::melt_workbook(&args.input, &args.output, &request)?;
    println!("{} rows written to {}", long.len(), args.output.display());
    Ok(())
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Reshape inventory spreadsheets between one row per size and one column per size."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Pivot one row per (item, size) into one row per item with a column per size.
    Widen(WidenArgs),
    /// Unpivot a block of size columns back into one row per (item, size).
    Melt(MeltArgs),
}

#[derive(clap::Args)]
struct WidenArgs {
    /// Input workbook (.xlsx).
    #[arg(long)]
    input: PathBuf,

    /// Output workbook (.xlsx).
    #[arg(long)]
    output: PathBuf,

    /// Sheet to read. Defaults to the first sheet.
    #[arg(long)]
    sheet: Option<String>,

    /// 1-based row holding the column names.
    #[arg(long)]
    header_row: Option<usize>,

    /// Item key column. Guessed from the header when omitted.
    #[arg(long)]
    sku: Option<String>,

    /// Size column. Guessed from the header when omitted.
    #[arg(long)]
    size: Option<String>,

    /// Quantity column. Guessed from the header when omitted.
    #[arg(long)]
    qty: Option<String>,

    /// Smallest accepted size (inclusive).
    #[arg(long, allow_negative_numbers = true)]
    min: Option<f64>,

    /// Largest accepted size (inclusive).
    #[arg(long, allow_negative_numbers = true)]
    max: Option<f64>,

    /// Accept every parsable size.
    #[arg(long, conflicts_with_all = ["min", "max"])]
    no_range: bool,

    /// Do not add the TOT column.
    #[arg(long)]
    no_total: bool,

    /// Treat sizes as text instead of numbers.
    #[arg(long)]
    text_sizes: bool,

    /// Name of the output sheet.
    #[arg(long)]
    result_sheet: Option<String>,

    /// Also write the dropped rows to a DROPPED sheet.
    #[arg(long)]
    dropped_sheet: bool,

    /// Write a JSON reconciliation report to this path.
    #[arg(long)]
    report: Option<PathBuf>,

    /// JSON configuration file providing defaults for the flags above.
    #[arg(long)]
    config: Option<PathBuf>,
}

impl WidenArgs {
    fn apply_to(&self, config: &mut ConversionConfig) {
        if let Some(sheet) = &self.sheet {
            config.sheet = Some(sheet.clone());
        }
        if let Some(header_row) = self.header_row {
            config.header_row = header_row;
        }
        if self.no_range {
            config.size_range = SizeRange::unbounded();
        } else {
            config.size_range.min = self.min.or(config.size_range.min);
            config.size_range.max = self.max.or(config.size_range.max);
        }
        if self.no_total {
            config.include_total = false;
        }
        if self.text_sizes {
            config.size_mode = SizeMode::Text;
        }
        if let Some(result_sheet) = &self.result_sheet {
            config.result_sheet = result_sheet.clone();
        }
        if self.dropped_sheet {
            config.dropped_sheet = true;
        }
    }
}

#[derive(clap::Args)]
struct MeltArgs {
    /// Input workbook (.xlsx).
    #[arg(long)]
    input: PathBuf,

    /// Output workbook (.xlsx).
    #[arg(long)]
    output: PathBuf,

    /// Sheet to read. Defaults to the first sheet.
    #[arg(long)]
    sheet: Option<String>,

    /// 1-based row holding the column names.
    #[arg(long, default_value_t = DEFAULT_HEADER_ROW)]
    header_row: usize,

    /// Columns copied onto every output row.
    #[arg(long, required = true, num_args = 1..)]
    id: Vec<String>,

    /// Spreadsheet column letters to unpivot, e.g. `D:K`.
    #[arg(long, conflicts_with = "columns", required_unless_present = "columns")]
    range: Option<String>,

    /// Comma-separated header names to unpivot.
    #[arg(long, value_delimiter = ',')]
    columns: Vec<String>,

    /// Header of the column receiving the unpivoted column names.
    #[arg(long, default_value = DEFAULT_VAR_NAME)]
    var_name: String,

    /// Header of the column receiving the unpivoted values.
    #[arg(long, default_value = DEFAULT_VALUE_NAME)]
    value_name: String,

    /// Keep rows whose value cell is empty.
    #[arg(long)]
    keep_empty: bool,

    /// Name of the output sheet.
    #[arg(long, default_value = RESULT_SHEET)]
    result_sheet: String,
}
