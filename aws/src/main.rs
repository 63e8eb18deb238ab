//! aws-sweeper: deletes resources left behind by acceptance tests

use aws::conns::{AwsClient, Config};
use aws::service::{service_packages_all, ServicePackageRegistry};
use aws::sweep::run_sweepers;
use clap::Parser;
use std::collections::BTreeMap;
use std::process::ExitCode;
use std::sync::Arc;
use tfplug::Context;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "aws-sweeper")]
#[command(about = "Sweep AWS resources created by acceptance tests")]
#[command(version)]
struct Args {
    /// Regions to sweep
    #[arg(long = "region", env = "AWS_DEFAULT_REGION", value_delimiter = ',', required = true)]
    regions: Vec<String>,

    /// Comma-separated sweepers to run, with their dependencies (default: all)
    #[arg(long, value_delimiter = ',')]
    sweep_run: Option<Vec<String>>,

    /// Keep going and exit successfully when sweepers fail
    #[arg(long)]
    sweep_allow_failures: bool,

    /// Endpoint override, e.g. osis=http://localhost:4566
    #[arg(long = "endpoint", value_parser = parse_endpoint)]
    endpoints: Vec<(String, String)>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

fn parse_endpoint(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((service, url)) if !service.is_empty() && !url.is_empty() => {
            Ok((service.to_string(), url.to_string()))
        }
        _ => Err(format!("expected SERVICE=URL, got {:?}", s)),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    match EnvFilter::try_from_default_env() {
        Ok(filter) => tracing_subscriber::fmt().with_env_filter(filter).init(),
        Err(_) => tracing_subscriber::fmt().with_max_level(level).init(),
    }

    match run(args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// `Ok(false)` when a sweeper failed and failures are not allowed.
async fn run(args: Args) -> aws::Result<bool> {
    let registry = Arc::new(ServicePackageRegistry::new(service_packages_all())?);
    let sweepers = registry.sweepers()?;
    let endpoints: BTreeMap<String, String> = args.endpoints.into_iter().collect();

    let ctx = Context::new();
    let interrupt = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling sweep");
            interrupt.cancel();
        }
    });

    let mut ok = true;
    for region in &args.regions {
        let config = Config {
            region: region.clone(),
            max_retries: aws::conns::config::DEFAULT_MAX_RETRIES,
            endpoints: endpoints.clone(),
            ..Default::default()
        };
        let client = Arc::new(AwsClient::load(&config, registry.clone()).await);

        let reports = run_sweepers(&ctx, &sweepers, client, args.sweep_run.as_deref()).await?;
        println!("Sweeper report for region {}:", region);
        for report in &reports {
            println!("  {}", report);
        }

        let failed = reports.iter().filter(|r| r.failed()).count();
        if failed > 0 {
            tracing::error!(region = %region, failed, "sweepers failed");
            ok &= args.sweep_allow_failures;
        }
    }
    Ok(ok)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_are_service_url_pairs() {
        assert_eq!(
            parse_endpoint("osis=http://localhost:4566").unwrap(),
            ("osis".to_string(), "http://localhost:4566".to_string())
        );
        assert!(parse_endpoint("http://localhost:4566").is_err());
        assert!(parse_endpoint("osis=").is_err());
    }

    #[test]
    fn args_parse() {
        let args = Args::try_parse_from([
            "aws-sweeper",
            "--region",
            "us-west-2,us-east-1",
            "--sweep-run",
            "aws_osis_pipeline",
            "--endpoint",
            "osis=http://localhost:4566",
            "--sweep-allow-failures",
        ])
        .unwrap();
        assert_eq!(args.regions, vec!["us-west-2", "us-east-1"]);
        assert_eq!(args.sweep_run, Some(vec!["aws_osis_pipeline".to_string()]));
        assert_eq!(args.endpoints.len(), 1);
        assert!(args.sweep_allow_failures);
        assert!(!args.verbose);
    }
}
