use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ai_vs_real::config::DEFAULT_LOG_FILTER;
use ai_vs_real::forensics::analyze_bytes;
use ai_vs_real::{score_directory, score_file, FileScore, ForensicReport, ServerConfig};

#[derive(Parser)]
#[command(
    name = "ai-vs-real",
    about = "Classify images as real or AI-generated with a Laplacian sharpness heuristic",
    version,
    after_help = "NOTE: This is a heuristic, not a trained model. Sharp images score as real,\n\
                  smooth images as AI-generated."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP service (PORT, HOST, ALLOWED_ORIGINS, MAX_UPLOAD_BYTES)
    Serve {
        /// Address to bind (overrides HOST)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Score an image file or every supported image in a directory
    Score {
        /// Input image file or directory
        input: PathBuf,

        /// Print one JSON object per file instead of text
        #[arg(long)]
        json: bool,

        /// Suppress the summary line
        #[arg(short, long)]
        quiet: bool,

        /// Also report forensic statistics (EXIF, histogram, noise, size)
        #[arg(short, long)]
        verbose: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let code = match cli.command {
        Command::Serve { host, port } => run_server(host, port),
        Command::Score {
            input,
            json,
            quiet,
            verbose,
        } => run_score(&input, json, quiet, verbose),
    };
    process::exit(code);
}

fn run_server(host: Option<String>, port: Option<u16>) -> i32 {
    let mut config = match ServerConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            return 1;
        }
    };
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Fatal: Failed to start async runtime: {e}");
            return 1;
        }
    };

    match runtime.block_on(ai_vs_real::server::serve(config)) {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!("server error: {e}");
            1
        }
    }
}

fn run_score(input: &Path, json: bool, quiet: bool, verbose: bool) -> i32 {
    if !input.exists() {
        eprintln!("Error: Input path does not exist: {}", input.display());
        return 1;
    }

    let results = if input.is_dir() {
        match score_directory(input) {
            Ok(r) => r,
            Err(e) => {
                eprintln!("Error: Failed to read directory: {e}");
                return 1;
            }
        }
    } else {
        vec![score_file(input)]
    };

    let mut real_count = 0u32;
    let mut generated_count = 0u32;
    let mut fail_count = 0u32;

    for r in &results {
        let report = if verbose && r.success() {
            forensics_for(&r.path)
        } else {
            None
        };
        if !print_result(r, report.as_ref(), json) {
            fail_count += 1;
            continue;
        }
        match &r.prediction {
            Some(p) if p.label == ai_vs_real::Label::Real => real_count += 1,
            Some(_) => generated_count += 1,
            None => fail_count += 1,
        }
    }

    if results.len() > 1 && !quiet {
        eprintln!();
        eprint!("[Summary] Real: {real_count}, AI-Generated: {generated_count}");
        if fail_count > 0 {
            eprint!(", Failed: {fail_count}");
        }
        eprintln!(" (Total: {})", results.len());
    }

    i32::from(fail_count > 0)
}

fn forensics_for(path: &Path) -> Option<ForensicReport> {
    let outcome = std::fs::read(path)
        .map_err(ai_vs_real::Error::from)
        .and_then(|bytes| analyze_bytes(&bytes));
    match outcome {
        Ok(report) => Some(report),
        Err(e) => {
            tracing::warn!(path = %path.display(), "forensic analysis failed: {e}");
            None
        }
    }
}

/// JSON object for one file: the `/predict` body (or `error`), `file`, and
/// `forensics` when requested.
fn json_line(
    filename: &str,
    result: &FileScore,
    report: Option<&ForensicReport>,
) -> serde_json::Result<serde_json::Value> {
    let mut value = match &result.prediction {
        Some(p) => serde_json::to_value(p)?,
        None => serde_json::json!({ "error": result.message }),
    };
    value["file"] = serde_json::Value::from(filename);
    if let Some(report) = report {
        value["forensics"] = serde_json::to_value(report)?;
    }
    Ok(value)
}

/// Print one result. Returns `false` if the result could not be written.
fn print_result(result: &FileScore, report: Option<&ForensicReport>, json: bool) -> bool {
    let filename = result.path.file_name().map_or_else(
        || result.path.display().to_string(),
        |f| f.to_string_lossy().to_string(),
    );

    if json {
        return match json_line(&filename, result, report) {
            Ok(value) => {
                println!("{value}");
                true
            }
            Err(e) => {
                eprintln!("[FAIL] {filename}: failed to serialize result: {e}");
                false
            }
        };
    }

    match &result.prediction {
        Some(p) => println!(
            "[{}] {filename} ({:.1}% confidence, raw {:.4})",
            p.label,
            p.confidence * 100.0,
            p.raw_score
        ),
        None => eprintln!("[FAIL] {filename}: {}", result.message),
    }
    if let Some(r) = report {
        println!(
            "  -> {}x{} {}, {} bytes, exif fields: {}, noise std: {:.2}, laplacian var: {:.2}",
            r.width,
            r.height,
            r.format.as_deref().unwrap_or("unknown"),
            r.size_bytes,
            r.exif_fields,
            r.noise_std,
            r.laplacian_variance
        );
    }
    true
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use ai_vs_real::Prediction;

    use super::*;

    fn scored(prediction: Option<Prediction>, message: &str) -> FileScore {
        FileScore {
            path: PathBuf::from("dir/photo.png"),
            prediction,
            message: message.to_string(),
        }
    }

    #[test]
    fn json_line_carries_prediction_and_file() {
        let value = json_line("photo.png", &scored(Some(Prediction::from_score(0.25)), ""), None)
            .unwrap();
        assert_eq!(value["result"], "AI-Generated");
        assert_eq!(value["confidence"], 0.75);
        assert_eq!(value["raw_score"], 0.25);
        assert_eq!(value["file"], "photo.png");
        assert!(value.get("forensics").is_none());
    }

    #[test]
    fn json_line_reports_failures() {
        let value = json_line("photo.png", &scored(None, "failed to decode image"), None).unwrap();
        assert_eq!(value["error"], "failed to decode image");
        assert_eq!(value["file"], "photo.png");
        assert!(value.get("result").is_none());
    }

    #[test]
    fn json_line_embeds_forensics() {
        let img = image::RgbImage::from_pixel(4, 3, image::Rgb([10, 20, 30]));
        let mut buf = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, image::ImageFormat::Png)
            .unwrap();
        let report = analyze_bytes(buf.get_ref()).unwrap();

        let value = json_line(
            "photo.png",
            &scored(Some(Prediction::from_score(0.0)), ""),
            Some(&report),
        )
        .unwrap();
        assert_eq!(value["forensics"]["width"], 4);
        assert_eq!(value["forensics"]["format"], "png");
        assert_eq!(value["forensics"]["histogram"]["r"].as_array().unwrap().len(), 16);
    }
}
