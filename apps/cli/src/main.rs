use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use bpreplay_core::blob::{BlobStore, Catalogue};
use bpreplay_core::session::{DecodeConfig, DecoderSession};
use bpreplay_core::trace::load_capture;
use clap::Parser;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "Decode BP Microsystems USB captures into replay scripts", long_about = None)]
struct Args {
    /// Capture in usbrply JSON form
    trace: PathBuf,

    /// Directory of known firmware blobs
    #[arg(long)]
    firmware_dir: Option<PathBuf>,

    /// Decoder configuration (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Emit raw transfers only, no command classification
    #[arg(long)]
    dumb: bool,

    /// Keep read-only queries (ex: get SM info)
    #[arg(long)]
    keep_ro: bool,

    /// Minimum payload size treated as a firmware blob, 0 to disable
    #[arg(long)]
    big_thresh: Option<usize>,

    /// Save new firmware blobs (default: <firmware-dir>/tmp)
    #[arg(long)]
    save: bool,

    /// Write the effective configuration to this file and exit
    #[arg(long)]
    dump_config: Option<PathBuf>,

    /// Write <trace>.py instead of printing the script
    #[arg(short = 'w')]
    write: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(if args.verbose {
                    tracing::Level::DEBUG.into()
                } else {
                    tracing::Level::INFO.into()
                })
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    if let Err(e) = run(&args) {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    let config = effective_config(args)?;

    if let Some(path) = &args.dump_config {
        config
            .save_to_file(path)
            .with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "Configuration saved");
        return Ok(());
    }

    let trace = load_capture(&args.trace)
        .with_context(|| format!("loading capture {}", args.trace.display()))?;

    let catalogue = match &args.firmware_dir {
        Some(dir) => Catalogue::load_dir(dir)
            .with_context(|| format!("loading firmware from {}", dir.display()))?,
        None => Catalogue::new(),
    };
    let store = BlobStore::load(catalogue, config.big_payload_threshold);

    let decoded = DecoderSession::new(&trace, store, config).run()?;
    for path in &decoded.saved {
        info!(path = %path.display(), "Saved firmware");
    }

    if args.write {
        let out = output_path(&args.trace)?;
        info!(path = %out.display(), "Selected output file");
        std::fs::write(&out, &decoded.script)
            .with_context(|| format!("writing {}", out.display()))?;
    } else {
        print!("{}", decoded.script);
    }
    Ok(())
}

/// File configuration, then command line overrides.
fn effective_config(args: &Args) -> Result<DecodeConfig> {
    let mut config = match &args.config {
        Some(path) => DecodeConfig::load_from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => DecodeConfig::default(),
    };
    if args.dumb {
        config.dumb_mode = true;
    }
    if args.keep_ro {
        config.omit_read_only = false;
    }
    if let Some(thresh) = args.big_thresh {
        config.big_payload_threshold = thresh;
    }
    if args.save {
        config.persist_new_blobs = true;
        if config.blob_dir.is_none() {
            config.blob_dir = args.firmware_dir.as_ref().map(|d| d.join("tmp"));
        }
        if config.blob_dir.is_none() {
            bail!("--save needs --firmware-dir or blob_dir in the config");
        }
    }
    Ok(config)
}

fn output_path(trace: &Path) -> Result<PathBuf> {
    let out = trace.with_extension("py");
    if out == trace {
        bail!("refusing to overwrite input {}", trace.display());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::parse_from(std::iter::once("bpreplay").chain(argv.iter().copied()))
    }

    #[test]
    fn test_output_path() {
        assert_eq!(
            output_path(Path::new("captures/startup.json")).unwrap(),
            PathBuf::from("captures/startup.py")
        );
        assert!(output_path(Path::new("captures/startup.py")).is_err());
    }

    #[test]
    fn test_flags_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("decode.toml");
        std::fs::write(&path, "big_payload_threshold = 64\ndumb_mode = false\n").unwrap();

        let args = parse(&[
            "t.json",
            "--config",
            path.to_str().unwrap(),
            "--dumb",
            "--keep-ro",
        ]);
        let config = effective_config(&args).unwrap();
        assert!(config.dumb_mode);
        assert!(!config.omit_read_only);
        assert_eq!(config.big_payload_threshold, 64);

        let args = parse(&["t.json", "--big-thresh", "0"]);
        assert_eq!(effective_config(&args).unwrap().big_payload_threshold, 0);
    }

    #[test]
    fn test_save_defaults_to_firmware_tmp() {
        let args = parse(&["t.json", "--save", "--firmware-dir", "fw"]);
        let config = effective_config(&args).unwrap();
        assert!(config.persist_new_blobs);
        assert_eq!(config.blob_dir, Some(PathBuf::from("fw/tmp")));

        assert!(effective_config(&parse(&["t.json", "--save"])).is_err());
    }

    #[test]
    fn test_run_writes_script() {
        let dir = tempfile::tempdir().unwrap();
        let trace = dir.path().join("cap.json");
        std::fs::write(
            &trace,
            r#"{"data": [{"type": "bulkWrite", "endp": 2, "data": "0c0730", "packn": [1, 1]}]}"#,
        )
        .unwrap();
        let args = parse(&[trace.to_str().unwrap(), "-w"]);
        run(&args).unwrap();
        let script = std::fs::read_to_string(dir.path().join("cap.py")).unwrap();
        assert!(script.contains("cmd.led_mask(dev, \"all\")"));
    }
}
