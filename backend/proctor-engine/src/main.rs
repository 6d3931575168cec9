use anyhow::{bail, Context};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use proctor_engine::config::Config;
use proctor_engine::metrics::render_metrics;
use proctor_engine::models::{AssessmentDefinition, UserContext};
use proctor_engine::replay::{run_script, ReplayStep};
use proctor_engine::services::{
    InMemoryCatalog, JsonLinesResultSink, ManualSignalSource, MemoryResultSink, ResultSink,
    SessionEngine,
};

const USAGE: &str =
    "usage: proctor-replay <assessment.json> <script.json> [user-id] [--subscribed] [--metrics]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = Args::parse(std::env::args().skip(1))?;
    let config = Config::load().context("Failed to load configuration")?;
    tracing::info!(
        "Configuration loaded for environment: {}",
        std::env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string())
    );

    let assessment: AssessmentDefinition = read_json(&args.assessment).await?;
    let steps: Vec<ReplayStep> = read_json(&args.script).await?;

    let sink: Arc<dyn ResultSink> = match &config.delivery.results_path {
        Some(path) => {
            tracing::info!("Writing scored attempts to {}", path.display());
            Arc::new(JsonLinesResultSink::new(path.clone()))
        }
        None => Arc::new(MemoryResultSink::new()),
    };
    let pass_policy = config.grading.pass_policy();
    let catalog = Arc::new(InMemoryCatalog::new(vec![assessment.clone()]));
    let engine = SessionEngine::new(catalog, sink, config);

    let user = UserContext::new(args.user_id, args.subscribed);
    let signals = Arc::new(ManualSignalSource::new());
    let session = engine
        .begin(Arc::new(assessment), &user, signals.clone())
        .await
        .context("Attempt was not authorized")?;

    let outcome = run_script(&session, &signals, &steps).await;
    let grade = outcome.attempt.as_ref().map(|a| pass_policy.grade(a));

    let report = serde_json::json!({
        "status": outcome.status,
        "attempt": outcome.attempt,
        "grade": grade,
        "rejectedSteps": outcome.rejected_steps,
        "delivery": session.delivery(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    if args.print_metrics {
        eprintln!("{}", render_metrics()?);
    }

    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "proctor_engine=debug,proctor_replay=debug".into());

    // Logs go to stderr; stdout carries the report.
    if std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")) {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

struct Args {
    assessment: PathBuf,
    script: PathBuf,
    user_id: String,
    subscribed: bool,
    print_metrics: bool,
}

impl Args {
    fn parse(args: impl Iterator<Item = String>) -> anyhow::Result<Self> {
        let mut positional = Vec::new();
        let mut subscribed = false;
        let mut print_metrics = false;

        for arg in args {
            match arg.as_str() {
                "--subscribed" => subscribed = true,
                "--metrics" => print_metrics = true,
                "-h" | "--help" => bail!(USAGE),
                _ => positional.push(arg),
            }
        }

        let mut positional = positional.into_iter();
        let (Some(assessment), Some(script)) = (positional.next(), positional.next()) else {
            bail!(USAGE);
        };

        Ok(Self {
            assessment: assessment.into(),
            script: script.into(),
            user_id: positional.next().unwrap_or_else(|| "replay-user".to_string()),
            subscribed,
            print_metrics,
        })
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}
