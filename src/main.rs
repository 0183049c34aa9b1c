use rust_geo_pipeline::config::Config;
use rust_geo_pipeline::pipeline;
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn usage() -> ! {
    eprintln!("Usage:");
    eprintln!("  rust-geo-pipeline resolve <input.csv> <output.csv> [--resume <snapshot.csv>]");
    eprintln!("  rust-geo-pipeline geocode <input.csv> <output.csv>");
    eprintln!("  rust-geo-pipeline reconcile <canonical.csv> <scraped.csv> <comparison.csv> <unique.csv>");
    std::process::exit(2);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rust_geo_pipeline=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or_else(|| usage());

    match command {
        "resolve" => {
            if args.len() < 3 {
                usage();
            }
            let resume = match args.get(3).map(String::as_str) {
                Some("--resume") => match args.get(4) {
                    Some(p) => Some(Path::new(p.as_str()).to_path_buf()),
                    None => usage(),
                },
                Some(_) => usage(),
                None => None,
            };
            pipeline::run_resolve(
                &config,
                Path::new(&args[1]),
                Path::new(&args[2]),
                resume.as_deref(),
            )
            .await?;
        }
        "geocode" => {
            if args.len() < 3 {
                usage();
            }
            pipeline::run_geocode(&config, Path::new(&args[1]), Path::new(&args[2])).await?;
        }
        "reconcile" => {
            if args.len() < 5 {
                usage();
            }
            pipeline::run_reconcile(
                &config,
                Path::new(&args[1]),
                Path::new(&args[2]),
                Path::new(&args[3]),
                Path::new(&args[4]),
            )?;
        }
        _ => usage(),
    }

    Ok(())
}
