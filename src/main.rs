//! wp-pdf – command-line work package list exporter.
//!
//! Usage:
//!   wp-pdf <request.json> [output.pdf] [--config config.json] [--dump-layout]
//!   wp-pdf --sample <count> [output.pdf] [--descriptions] [--attachments]
//!
//! If `output.pdf` is omitted the PDF is written next to the request file with
//! the same stem (e.g. `export.json` → `export.pdf`). Sample exports are
//! written to the current directory under their download name.

use std::{
    env, fs,
    path::{Path, PathBuf},
    process,
};

use wp_pdf_export::{
    samples, ExportConfig, ExportContext, ExportOptions, ExportRequest, Locale,
    WorkPackageListExport,
};

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    let mut input_path: Option<PathBuf> = None;
    let mut output_path: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;
    let mut sample: Option<usize> = None;
    let mut dump_layout = false;
    let mut options = ExportOptions::default();
    let mut positional = 0usize;

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" | "-c" => match iter.next() {
                Some(v) => config_path = Some(PathBuf::from(v)),
                None => fail_usage(&args[0], "--config needs a file"),
            },
            "--sample" => match iter.next().and_then(|v| v.parse().ok()) {
                Some(n) => sample = Some(n),
                None => fail_usage(&args[0], "--sample needs a work package count"),
            },
            "--descriptions" => options.with_descriptions = true,
            "--attachments" => options.with_attachments = true,
            "--dump-layout" => dump_layout = true,
            "--help" | "-h" => {
                print_usage(&args[0]);
                process::exit(0);
            }
            other if other.starts_with('-') => {
                fail_usage(&args[0], &format!("Unknown flag: {other}"));
            }
            path => {
                if positional == 0 && sample.is_none() {
                    input_path = Some(PathBuf::from(path));
                } else if output_path.is_none() {
                    output_path = Some(PathBuf::from(path));
                } else {
                    fail_usage(&args[0], &format!("Unexpected argument: {path}"));
                }
                positional += 1;
            }
        }
    }

    let config = match &config_path {
        Some(path) => ExportConfig::from_file(path).unwrap_or_else(|e| {
            eprintln!("Error reading config '{}': {e}", path.display());
            process::exit(1);
        }),
        None => ExportConfig::default(),
    };

    let request = match (sample, &input_path) {
        (Some(n), _) => ExportRequest {
            query: samples::sample_query(n),
            options,
            context: ExportContext::new(Locale::En, chrono::Local::now().date_naive()),
        },
        (None, Some(input)) => read_request(input),
        (None, None) => fail_usage(&args[0], "Error: no request file specified."),
    };

    let export = WorkPackageListExport::new(
        &request.query,
        request.options,
        request.context.clone(),
        config,
    );

    if dump_layout {
        match export.layout_first_batch() {
            Ok(layout) => println!("{}", layout.to_json()),
            Err(e) => {
                eprintln!("Error laying out export: {e}");
                process::exit(1);
            }
        }
        return;
    }

    // Default output: request stem with .pdf, or the download name for samples.
    let output = output_path.unwrap_or_else(|| match &input_path {
        Some(input) => input.with_extension("pdf"),
        None => PathBuf::from(export.title()),
    });

    match export.export() {
        Ok(file) => {
            if let Some(parent) = output.parent() {
                if !parent.as_os_str().is_empty() {
                    if let Err(e) = fs::create_dir_all(parent) {
                        eprintln!("Error creating output directory: {e}");
                        process::exit(1);
                    }
                }
            }
            let pages = file.page_count();
            if let Err(e) = file.persist(&output) {
                eprintln!("Error writing '{}': {e}", output.display());
                process::exit(1);
            }
            eprintln!(
                "Wrote '{}' ({} page{})",
                output.display(),
                pages,
                if pages == 1 { "" } else { "s" }
            );
        }
        Err(failure) => {
            eprintln!("{failure}");
            process::exit(1);
        }
    }
}

fn read_request(input: &Path) -> ExportRequest {
    let json = fs::read_to_string(input).unwrap_or_else(|e| {
        eprintln!("Error reading '{}': {e}", input.display());
        process::exit(1);
    });
    serde_json::from_str(&json).unwrap_or_else(|e| {
        eprintln!("Error parsing '{}': {e}", input.display());
        process::exit(1);
    })
}

fn fail_usage(prog: &str, message: &str) -> ! {
    eprintln!("{message}");
    print_usage(prog);
    process::exit(1);
}

fn print_usage(prog: &str) {
    eprintln!("wp-pdf – work package list to PDF exporter");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  {prog} <request.json> [output.pdf] [--config config.json] [--dump-layout]");
    eprintln!("  {prog} --sample <count> [output.pdf] [--descriptions] [--attachments]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  <request.json>  Serialized export request (query, options, context)");
    eprintln!("  [output.pdf]    Output path  (default: same stem as request with .pdf)");
    eprintln!();
    eprintln!("Flags:");
    eprintln!("  --config, -c    Layout and batching settings as JSON");
    eprintln!("  --dump-layout   Print the first batch's layout as JSON instead of rendering");
    eprintln!("  --sample        Export generated work packages instead of a request");
    eprintln!("  --descriptions  With --sample: add detail sections");
    eprintln!("  --attachments   With --sample: embed image attachments");
    eprintln!("  --help          Print this message");
}
