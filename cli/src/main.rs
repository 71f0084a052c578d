//! redoc CLI - batch editing of Microsoft Office documents
//!
//! Applies the editing operations of the `redoc` library to DOCX, XLSX and
//! PPTX files from the command line.

use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use redoc::docx::{self, DocxDocument, RevisionMode};
use redoc::model::StyleSet;
use redoc::output::{images_dir, modified_path, side_file, timestamped_name, transposed_path};
use redoc::pptx::{self, PptxPresentation};
use redoc::xlsx::{self, XlsxWorkbook};
use redoc::{config, FormatType};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Batch editing of Word, Excel and PowerPoint files
#[derive(Parser)]
#[command(
    name = "redoc",
    version,
    about = "Batch editing of Office documents",
    long_about = "redoc - Batch editing of Microsoft Office documents.\n\n\
                  Restyles, cleans up, converts and merges DOCX, XLSX and PPTX files.\n\
                  Results are written next to the input unless -o is given."
)]
struct Cli {
    /// Log every change to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Word document operations
    Docx {
        #[command(subcommand)]
        command: DocxCommand,
    },

    /// Excel workbook operations
    Xlsx {
        #[command(subcommand)]
        command: XlsxCommand,
    },

    /// PowerPoint presentation operations
    Pptx {
        #[command(subcommand)]
        command: PptxCommand,
    },

    /// Extract the images of a document or presentation
    Images {
        /// Input file path
        input: PathBuf,

        /// Output directory (default: <name>_images next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Merge files of one format into a single file
    Merge {
        /// Input files, merged in the given order
        #[arg(required = true, num_args = 2..)]
        inputs: Vec<PathBuf>,

        /// Output file path (default: timestamped name in the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show what a package contains
    Info {
        /// Input file path
        input: PathBuf,
    },

    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum DocxCommand {
    /// Create or update paragraph styles from a style file
    ApplyStyles {
        input: PathBuf,

        /// Style definitions keyed by style name (TOML or JSON)
        #[arg(short, long)]
        config: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write the paragraph styles to <name>_styles.json
    ExtractStyles {
        input: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Restyle numbered titles and body paragraphs
    OutlineStyles {
        input: PathBuf,

        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Remove Markdown emphasis and heading marks
    StripMarkdown {
        input: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Turn Markdown marks into heading styles and run formatting
    ApplyMarkdown {
        input: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Replace text in paragraphs, tables, headers and footers
    Replace {
        input: PathBuf,

        /// Replacement pairs as OLD=NEW; takes precedence over --config
        #[arg(short = 'r', long = "replace", value_name = "OLD=NEW")]
        pairs: Vec<String>,

        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Remove empty paragraphs (in place unless -o is given)
    RemoveEmpty {
        input: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write comments to <name>_comments.json
    ExtractComments {
        input: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Remove all comments
    RemoveComments {
        input: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write tracked changes to <name>_revisions.json
    ExtractRevisions {
        input: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Accept or reject all tracked changes
    RemoveRevisions {
        input: PathBuf,

        #[arg(short, long, default_value = "accept")]
        mode: Mode,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum XlsxCommand {
    /// List worksheets with their used size
    Sheets {
        input: PathBuf,
    },

    /// Fill empty cells in configured areas
    FillEmpty {
        input: PathBuf,

        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Replace formulas in columns by their cached values
    FormulasToValues {
        input: PathBuf,

        /// Columns such as B or D:F; takes precedence over --config
        #[arg(long = "column", value_name = "COLUMNS")]
        columns: Vec<String>,

        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Swap rows and columns of a sheet into a new workbook
    Transpose {
        input: PathBuf,

        /// Sheet to transpose (default: first sheet)
        #[arg(short, long)]
        sheet: Option<String>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Reorder columns of sheets to match the first sheet's headers
    ReorderColumns {
        input: PathBuf,

        /// Sheets to align, reference first; takes precedence over --config
        #[arg(long = "sheet", value_name = "NAME")]
        sheets: Vec<String>,

        /// Write <name>_reordered copies instead of editing in place
        #[arg(long)]
        copy: bool,

        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Merge workbooks sheet by sheet
    Merge {
        #[arg(required = true, num_args = 2..)]
        inputs: Vec<PathBuf>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Style configured areas with fonts, fills, borders and filters
    FormatCells {
        input: PathBuf,

        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run a list of cell format operations
    CellFormat {
        input: PathBuf,

        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Create a data table and pivot table definition
    Pivot {
        input: PathBuf,

        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum PptxCommand {
    /// Write slide text to <name>_文本提取.txt
    Text {
        input: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// How tracked changes are resolved
#[derive(Clone, ValueEnum)]
enum Mode {
    /// Keep insertions, drop deletions
    Accept,
    /// Drop insertions, restore deletions
    Reject,
}

impl From<Mode> for RevisionMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Accept => RevisionMode::Accept,
            Mode::Reject => RevisionMode::Reject,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("redoc=debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("redoc=warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Docx { command } => run_docx(command)?,
        Commands::Xlsx { command } => run_xlsx(command)?,
        Commands::Pptx { command } => run_pptx(command)?,

        Commands::Images { input, output } => {
            let pb = create_spinner("Extracting images...");
            let dir = output.unwrap_or_else(|| images_dir(&input));
            let images = redoc::extract_images(&input, &dir)?;
            pb.finish_and_clear();

            if images.is_empty() {
                println!("{} No images found in document", "!".yellow().bold());
            } else {
                for image in &images {
                    println!(
                        "  {} ({})",
                        image.path.display(),
                        image.resource.dimensions_label()
                    );
                }
                done(&format!("Extracted {} images to", images.len()), &dir);
            }
        }

        Commands::Merge { inputs, output } => {
            let format = redoc::detect_format_from_path(&inputs[0])?;
            match format {
                FormatType::Docx => merge_docx(&inputs, output)?,
                FormatType::Xlsx => merge_xlsx(&inputs, output)?,
                FormatType::Pptx => merge_pptx(&inputs, output)?,
            }
        }

        Commands::Info { input } => {
            let pb = create_spinner("Analyzing document...");
            let summary = redoc::summarize(&input)?;
            pb.finish_and_clear();

            println!("{}", "Document Information".cyan().bold());
            println!("{}", "─".repeat(40));
            println!(
                "{}: {}",
                "File".bold(),
                input.file_name().unwrap_or_default().to_string_lossy()
            );
            println!("{}: {}", "Format".bold(), summary.format);
            println!("{}: {} bytes", "Size".bold(), summary.size);
            println!("{}: {}", "Parts".bold(), summary.parts);

            println!("\n{}", "Contents".cyan().bold());
            println!("{}", "─".repeat(40));
            for (label, value) in &summary.details {
                println!("{}: {}", label.bold(), value);
            }
        }

        Commands::Version => {
            print_version();
        }
    }

    Ok(())
}

fn run_docx(command: DocxCommand) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        DocxCommand::ApplyStyles {
            input,
            config,
            output,
        } => {
            let styles: StyleSet = config::load(&config)?;
            let pb = create_spinner("Applying styles...");
            let mut doc = DocxDocument::open(&input)?;
            let report = docx::apply_styles(&mut doc, &styles)?;
            let path = output.unwrap_or_else(|| modified_path(&input));
            doc.save(&path)?;
            pb.finish_and_clear();

            for name in &report.updated {
                println!("  {} {}", "updated".bold(), name);
            }
            for name in &report.created {
                println!("  {} {}", "created".bold(), name);
            }
            done("Styles applied:", &path);
        }

        DocxCommand::ExtractStyles { input, output } => {
            let pb = create_spinner("Reading styles...");
            let doc = DocxDocument::open(&input)?;
            let styles = docx::extract_styles(&doc);
            let path = output.unwrap_or_else(|| side_file(&input, "_styles.json"));
            write_json(&path, &styles)?;
            pb.finish_and_clear();

            if styles.is_empty() {
                println!("{} No paragraph styles found", "!".yellow().bold());
            }
            done(&format!("Extracted {} styles to", styles.len()), &path);
        }

        DocxCommand::OutlineStyles {
            input,
            config,
            output,
        } => {
            let settings: docx::OutlineStyleConfig = config::load_or_default(config.as_deref())?;
            let pb = create_spinner("Applying outline styles...");
            let mut doc = DocxDocument::open(&input)?;
            let report = docx::apply_outline_styles(&mut doc, &settings)?;
            let path = output.unwrap_or_else(|| side_file(&input, "_样式已应用.docx"));
            doc.save(&path)?;
            pb.finish_and_clear();

            println!(
                "  {} titles, {} body paragraphs, {} asterisks and {} empty paragraphs removed",
                report.titles, report.body_paragraphs, report.asterisks_removed, report.empty_removed
            );
            done("Outline styles applied:", &path);
        }

        DocxCommand::StripMarkdown { input, output } => {
            let pb = create_spinner("Removing Markdown marks...");
            let mut doc = DocxDocument::open(&input)?;
            let report = docx::strip_markdown(&mut doc)?;
            let path = output.unwrap_or_else(|| modified_path(&input));
            doc.save(&path)?;
            pb.finish_and_clear();

            println!(
                "  {} emphasis marks, {} heading marks",
                report.emphasis_marks, report.heading_marks
            );
            done("Markdown marks removed:", &path);
        }

        DocxCommand::ApplyMarkdown { input, output } => {
            let pb = create_spinner("Converting Markdown marks...");
            let mut doc = DocxDocument::open(&input)?;
            let report = docx::apply_markdown(&mut doc)?;
            let path = output.unwrap_or_else(|| modified_path(&input));
            doc.save(&path)?;
            pb.finish_and_clear();

            println!(
                "  {} headings, {} bold, {} italic, {} strikethrough, {} stray marks",
                report.headings,
                report.bold,
                report.italic,
                report.strikethrough,
                report.cleaned_marks
            );
            done("Markdown formatting applied:", &path);
        }

        DocxCommand::Replace {
            input,
            pairs,
            config,
            output,
        } => {
            let settings = if pairs.is_empty() {
                config::load_or_default(config.as_deref())?
            } else {
                docx::ReplaceConfig::from_pairs(&pairs)?
            };
            let pb = create_spinner("Replacing text...");
            let mut doc = DocxDocument::open(&input)?;
            let report = docx::replace_text(&mut doc, &settings)?;
            let path = output.unwrap_or_else(|| modified_path(&input));
            doc.save(&path)?;
            pb.finish_and_clear();

            for pair in &report.pairs {
                println!("  '{}' → '{}': {}", pair.old, pair.new, pair.count);
            }
            if report.total() == 0 {
                println!("{} No occurrences found", "!".yellow().bold());
            }
            done(&format!("Replaced {} occurrences:", report.total()), &path);
        }

        DocxCommand::RemoveEmpty { input, output } => {
            let pb = create_spinner("Removing empty paragraphs...");
            let mut doc = DocxDocument::open(&input)?;
            let removed = docx::remove_empty_paragraphs(&mut doc)?;
            let path = output.unwrap_or_else(|| input.clone());
            doc.save(&path)?;
            pb.finish_and_clear();

            done(&format!("Removed {} empty paragraphs:", removed), &path);
        }

        DocxCommand::ExtractComments { input, output } => {
            let pb = create_spinner("Reading comments...");
            let doc = DocxDocument::open(&input)?;
            let comments = docx::extract_comments(&doc)?;
            let path = output.unwrap_or_else(|| side_file(&input, "_comments.json"));
            write_json(&path, &comments)?;
            pb.finish_and_clear();

            if comments.is_empty() {
                println!("{} No comments found", "!".yellow().bold());
            }
            done(&format!("Extracted {} comments to", comments.len()), &path);
        }

        DocxCommand::RemoveComments { input, output } => {
            let pb = create_spinner("Removing comments...");
            let mut doc = DocxDocument::open(&input)?;
            let report = docx::remove_comments(&mut doc)?;
            let path = output.unwrap_or_else(|| modified_path(&input));
            doc.save(&path)?;
            pb.finish_and_clear();

            if report.total() == 0 {
                println!("{} No comments found", "!".yellow().bold());
            } else {
                println!(
                    "  {} references, {} ranges, {} parts",
                    report.references_removed, report.ranges_removed, report.parts_removed
                );
            }
            done("Comments removed:", &path);
        }

        DocxCommand::ExtractRevisions { input, output } => {
            let pb = create_spinner("Reading tracked changes...");
            let doc = DocxDocument::open(&input)?;
            let report = docx::extract_revisions(&doc)?;
            let path = output.unwrap_or_else(|| side_file(&input, "_revisions.json"));
            write_json(&path, &report)?;
            pb.finish_and_clear();

            for group in &report.revision_groups {
                println!(
                    "  {}. {} {} ({})",
                    group.group_id,
                    group.author,
                    group.date,
                    group.type_summary()
                );
                if let Some(sample) = group.sample(50) {
                    println!("     {}", sample.dimmed());
                }
            }
            done(
                &format!("Extracted {} tracked changes to", report.revisions.len()),
                &path,
            );
        }

        DocxCommand::RemoveRevisions {
            input,
            mode,
            output,
        } => {
            let pb = create_spinner("Resolving tracked changes...");
            let mut doc = DocxDocument::open(&input)?;
            let report = docx::remove_revisions(&mut doc, mode.into())?;
            let path = output.unwrap_or_else(|| modified_path(&input));
            if report.changes == 0 && !report.tracking_disabled {
                fs::copy(&input, &path)?;
                pb.finish_and_clear();
                println!("{} No tracked changes found, copied unchanged", "!".yellow().bold());
            } else {
                doc.save(&path)?;
                pb.finish_and_clear();
                let verb = match report.mode {
                    RevisionMode::Accept => "Accepted",
                    RevisionMode::Reject => "Rejected",
                };
                done(&format!("{} {} tracked changes:", verb, report.changes), &path);
            }
        }
    }

    Ok(())
}

fn run_xlsx(command: XlsxCommand) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        XlsxCommand::Sheets { input } => {
            let workbook = XlsxWorkbook::open(&input)?;
            let listing = xlsx::list_worksheets(&workbook);
            println!(
                "{} ({} sheets)",
                input.file_name().unwrap_or_default().to_string_lossy().cyan().bold(),
                listing.count()
            );
            print!("{}", listing);
        }

        XlsxCommand::FillEmpty {
            input,
            config,
            output,
        } => {
            let settings: xlsx::FillConfig = config::load_or_default(config.as_deref())?;
            let pb = create_spinner("Filling empty cells...");
            let mut workbook = XlsxWorkbook::open(&input)?;
            let report = xlsx::fill_empty_cells(&mut workbook, &settings)?;
            let path = output.unwrap_or_else(|| modified_path(&input));
            workbook.save(&path)?;
            pb.finish_and_clear();

            for sheet in &report.sheets {
                println!("  {}: {}", sheet.sheet, sheet.filled);
            }
            for name in &report.missing_sheets {
                println!("{} Sheet not found: {}", "!".yellow().bold(), name);
            }
            for area in &report.invalid_areas {
                println!("{} Invalid area: {}", "!".yellow().bold(), area);
            }
            done(&format!("Filled {} cells:", report.total()), &path);
        }

        XlsxCommand::FormulasToValues {
            input,
            columns,
            config,
            output,
        } => {
            let settings = if columns.is_empty() {
                config::load_or_default(config.as_deref())?
            } else {
                xlsx::FormulaConfig { columns }
            };
            let pb = create_spinner("Converting formulas...");
            let mut workbook = XlsxWorkbook::open(&input)?;
            let report = xlsx::formula_to_value(&mut workbook, &settings)?;
            let path = output.unwrap_or_else(|| modified_path(&input));
            workbook.save(&path)?;
            pb.finish_and_clear();

            for sheet in &report.sheets {
                println!("  {}: {}", sheet.sheet, sheet.converted);
                if !sheet.missing_values.is_empty() {
                    println!(
                        "{} No cached value: {}",
                        "!".yellow().bold(),
                        sheet.missing_values.join(", ")
                    );
                }
            }
            done(&format!("Converted {} formulas:", report.total()), &path);
        }

        XlsxCommand::Transpose {
            input,
            sheet,
            output,
        } => {
            let pb = create_spinner("Transposing sheet...");
            let workbook = XlsxWorkbook::open(&input)?;
            let sheet = match sheet {
                Some(name) => name,
                None => workbook
                    .sheet_names()
                    .first()
                    .map(|s| s.to_string())
                    .ok_or_else(|| redoc::Error::MissingComponent("worksheet".to_string()))?,
            };
            let (mut transposed, report) = xlsx::transpose_worksheet(&workbook, &sheet)?;
            let path = output.unwrap_or_else(|| transposed_path(&input));
            transposed.save(&path)?;
            pb.finish_and_clear();

            println!(
                "  {} {}×{} → {} {}×{}",
                report.sheet,
                report.before.0,
                report.before.1,
                report.target_sheet,
                report.after.0,
                report.after.1
            );
            done("Transposed:", &path);
        }

        XlsxCommand::ReorderColumns {
            input,
            sheets,
            copy,
            config,
            output,
        } => {
            let mut settings: xlsx::ReorderConfig = config::load_or_default(config.as_deref())?;
            if !sheets.is_empty() {
                settings.sheets = sheets;
            }
            settings.copy |= copy;
            let pb = create_spinner("Reordering columns...");
            let mut workbook = XlsxWorkbook::open(&input)?;
            let report = xlsx::reorder_columns(&mut workbook, &settings)?;
            let path = output.unwrap_or_else(|| modified_path(&input));
            workbook.save(&path)?;
            pb.finish_and_clear();

            println!(
                "  {}: {}",
                report.reference_sheet.bold(),
                report.reference_columns.join(", ")
            );
            for sheet in &report.sheets {
                println!("  {} → {}", sheet.sheet, sheet.target);
                if !sheet.inserted.is_empty() {
                    println!("     inserted: {}", sheet.inserted.join(", "));
                }
                if !sheet.appended.is_empty() {
                    println!("     appended: {}", sheet.appended.join(", "));
                }
            }
            done("Columns reordered:", &path);
        }

        XlsxCommand::Merge { inputs, output } => merge_xlsx(&inputs, output)?,

        XlsxCommand::FormatCells {
            input,
            config,
            output,
        } => {
            let settings: xlsx::FormatConfig = config::load_or_default(config.as_deref())?;
            let pb = create_spinner("Formatting cells...");
            let mut workbook = XlsxWorkbook::open(&input)?;
            let report = xlsx::format_cells(&mut workbook, &settings)?;
            let path = output.unwrap_or_else(|| modified_path(&input));
            workbook.save(&path)?;
            pb.finish_and_clear();

            for area in &report.areas {
                println!(
                    "  {} {}!{}: {} cells",
                    area.name, area.sheet, area.range, area.cells
                );
            }
            for (name, reason) in &report.skipped {
                println!("{} Skipped {}: {}", "!".yellow().bold(), name, reason);
            }
            done("Cells formatted:", &path);
        }

        XlsxCommand::CellFormat {
            input,
            config,
            output,
        } => {
            let settings: xlsx::CellFormatConfig = config::load_or_default(config.as_deref())?;
            let pb = create_spinner("Applying cell formats...");
            let mut workbook = XlsxWorkbook::open(&input)?;
            let report = xlsx::apply_cell_formats(&mut workbook, &settings)?;
            let path = output.unwrap_or_else(|| modified_path(&input));
            workbook.save(&path)?;
            pb.finish_and_clear();

            for result in &report.applied {
                println!(
                    "  {}. {} on {}: {}",
                    result.index, result.operation, result.sheet, result.count
                );
            }
            for (index, reason) in &report.skipped {
                println!("{} Skipped {}: {}", "!".yellow().bold(), index, reason);
            }
            done("Cell formats applied:", &path);
        }

        XlsxCommand::Pivot {
            input,
            config,
            output,
        } => {
            let settings: xlsx::PivotConfig = config::load_or_default(config.as_deref())?;
            let pb = create_spinner("Creating pivot table...");
            let mut workbook = XlsxWorkbook::open(&input)?;
            let report = xlsx::create_pivot_table(&mut workbook, &settings)?;
            let path = output.unwrap_or_else(|| modified_path(&input));
            workbook.save(&path)?;
            pb.finish_and_clear();

            println!("  source: {}", report.source);
            if !report.table_created {
                println!("{} Data table already present", "!".yellow().bold());
            }
            done(&format!("Pivot table on '{}':", report.pivot_sheet), &path);
        }
    }

    Ok(())
}

fn run_pptx(command: PptxCommand) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        PptxCommand::Text { input, output } => {
            let pb = create_spinner("Extracting slide text...");
            let deck = PptxPresentation::open(&input)?;
            let slides = pptx::extract_text(&deck)?;
            let path = output.unwrap_or_else(|| side_file(&input, "_文本提取.txt"));
            fs::write(&path, pptx::render_text(&slides))?;
            pb.finish_and_clear();

            done(&format!("Extracted text of {} slides to", slides.len()), &path);
        }
    }

    Ok(())
}

fn merge_docx(inputs: &[PathBuf], output: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let pb = create_spinner("Merging documents...");
    let (mut merged, report) = docx::merge_documents(inputs)?;
    let path = output.unwrap_or_else(|| timestamped_name("合并文档", "docx"));
    merged.save(&path)?;
    pb.finish_and_clear();

    for file in &report.files {
        println!(
            "  {}: {} paragraphs, {} tables",
            file.path.display(),
            file.paragraphs,
            file.tables
        );
    }
    done(&format!("Merged {} documents:", report.files.len()), &path);
    Ok(())
}

fn merge_xlsx(inputs: &[PathBuf], output: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let pb = create_spinner("Merging workbooks...");
    let (mut merged, report) = xlsx::merge_workbooks(inputs)?;
    let path = output.unwrap_or_else(|| timestamped_name("合并工作簿", "xlsx"));
    merged.save(&path)?;
    pb.finish_and_clear();

    for file in &report.files {
        for sheet in &file.sheets {
            println!("  {} / {} → {}", file.file, sheet.source, sheet.target);
        }
    }
    done(&format!("Merged {} sheets:", report.total_sheets()), &path);
    Ok(())
}

fn merge_pptx(inputs: &[PathBuf], output: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let pb = create_spinner("Merging presentations...");
    let (mut merged, report) = pptx::merge_presentations(inputs)?;
    let path = output.unwrap_or_else(|| timestamped_name("合并演示文稿", "pptx"));
    merged.save(&path)?;
    pb.finish_and_clear();

    for file in &report.files {
        println!("  {}: {} slides", file.file, file.slides);
    }
    done(
        &format!(
            "Merged {} slides and {} separators:",
            report.total_slides(),
            report.separators
        ),
        &path,
    );
    Ok(())
}

fn print_version() {
    println!("{} {}", "redoc".green().bold(), env!("CARGO_PKG_VERSION"));
    println!("Batch editing of Microsoft Office documents");
    println!();
    println!("Supported formats: DOCX, XLSX, PPTX");
}

fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
    pb.set_style(
        style
            .clone()
            .template("{spinner:.blue} {msg}")
            .unwrap_or(style),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), Box<dyn std::error::Error>> {
    fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

fn done(message: &str, path: &Path) {
    println!("{} {} {}", "✓".green().bold(), message, path.display());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_nested_subcommand() {
        let cli = Cli::try_parse_from([
            "redoc",
            "docx",
            "replace",
            "报告.docx",
            "-r",
            "旧=新",
            "-o",
            "out.docx",
        ])
        .unwrap();
        match cli.command {
            Commands::Docx {
                command: DocxCommand::Replace { pairs, output, .. },
            } => {
                assert_eq!(pairs, vec!["旧=新"]);
                assert_eq!(output, Some(PathBuf::from("out.docx")));
            }
            _ => panic!("expected docx replace"),
        }
    }

    #[test]
    fn test_merge_needs_two_inputs() {
        assert!(Cli::try_parse_from(["redoc", "merge", "a.docx"]).is_err());
        assert!(Cli::try_parse_from(["redoc", "merge", "a.docx", "b.docx"]).is_ok());
    }
}
