mod cli;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::debug;
use targit::config::Config;
use targit::error::{ErrorKind, TargitError};
use targit::fetch::{self, FetchOptions, HttpTransport};
use targit::locator;

fn main() {
    let args = cli::Args::parse();

    let default_level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::new()
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "[{} {} {}:{}] {}",
                buf.timestamp_millis(),
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .filter_level(default_level)
        .parse_default_env()
        .init();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("FATAL: Failed to create Tokio runtime: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = rt.block_on(real_main(&args)) {
        debug!("{e:?}");
        eprintln!("Error: {e:#}");
        if let Some(advice) = e.downcast_ref::<TargitError>().and_then(|e| hint(e, &args)) {
            eprintln!("{advice}");
        }
        std::process::exit(1);
    }
}

async fn real_main(args: &cli::Args) -> Result<()> {
    let mut config = Config::load(args.config.as_deref())?;
    config.apply_env();
    args.apply(&mut config);

    let mut options = config.options()?;
    let bar = progress_bar();
    options = attach_progress(options, &bar);

    let transport = HttpTransport::new().context("Failed to build HTTP client")?;

    let result = if args.download_only {
        fetch::download(&transport, &args.repo, &options).await
    } else {
        let location = match &args.location {
            Some(location) => location.clone(),
            None => default_location(&args.repo, &options)?,
        };
        fetch::download_and_extract(&transport, &args.repo, &location, &options).await
    };
    bar.finish_and_clear();

    let place = result?;
    println!("{}", place.display());
    Ok(())
}

/// `./{repo}` for the repository named by `uri`
fn default_location(uri: &str, options: &FetchOptions) -> Result<PathBuf, TargitError> {
    let reference = locator::parse(uri, options.default_host)?;
    Ok(PathBuf::from(reference.repo()))
}

fn progress_bar() -> ProgressBar {
    let bar = if console_attached() {
        ProgressBar::no_length()
    } else {
        ProgressBar::hidden()
    };
    if let Ok(style) = ProgressStyle::with_template(
        "{spinner} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
    ) {
        bar.set_style(style.progress_chars("=> "));
    }
    bar
}

fn attach_progress(options: FetchOptions, bar: &ProgressBar) -> FetchOptions {
    if bar.is_hidden() {
        return options;
    }
    let bar = bar.clone();
    options.on_data(move |total, chunk| {
        if let Some(total) = total {
            bar.set_length(total);
        }
        bar.inc(chunk.len() as u64);
    })
}

fn console_attached() -> bool {
    use std::io::IsTerminal;
    std::io::stderr().is_terminal()
}

/// Follow-up advice for the failures users can act on
fn hint(error: &TargitError, args: &cli::Args) -> Option<String> {
    match error.kind() {
        ErrorKind::Parse => Some(format!("Failed to parse {}", args.repo)),
        ErrorKind::RepoLookupFailed | ErrorKind::DownloadFailed => Some(
            "Please ensure the provided uri is correct and that defaultHost is correct".to_string(),
        ),
        ErrorKind::RefNotFound => Some(format!(
            "Check that the ref exists, or retry online if {} has not been fetched before",
            args.repo
        )),
        ErrorKind::DestinationNotEmpty => {
            Some("Choose an empty or missing directory as the location".to_string())
        }
        _ => None,
    }
}
