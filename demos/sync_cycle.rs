//! Drives one full scan -> reconcile -> transition cycle between two
//! real directories on disk, for manual verification. Not part of the
//! crate's public API (see `[[example]]` in `Cargo.toml`).
//!
//! Usage: `cargo run --example sync_cycle -- <alpha-dir> <beta-dir>`

use std::path::PathBuf;

use clap::Parser;

use sync_core::cache::Cache;
use sync_core::ignore::{Dialect, Matcher};
use sync_core::phantom::reify_phantom_directories;
use sync_core::policy::{PermissionsMode, ProbeMode, SymbolicLinkMode};
use sync_core::reconcile::{reconcile, Mode};
use sync_core::scan::{scan, ScanConfig, Sha1Hasher};
use sync_core::transition::{transition, Provider, ProviderError, TransitionConfig};
use sync_core::Cancellation;

#[derive(Parser)]
struct Args {
    /// Root of the alpha endpoint.
    alpha: PathBuf,
    /// Root of the beta endpoint.
    beta: PathBuf,
    #[arg(long, value_enum, default_value = "two-way-safe")]
    mode: CliMode,
}

#[derive(Clone, clap::ValueEnum)]
enum CliMode {
    TwoWaySafe,
    TwoWayResolved,
    OneWaySafe,
    OneWayReplica,
}

impl From<CliMode> for Mode {
    fn from(mode: CliMode) -> Self {
        match mode {
            CliMode::TwoWaySafe => Mode::TwoWaySafe,
            CliMode::TwoWayResolved => Mode::TwoWayResolved,
            CliMode::OneWaySafe => Mode::OneWaySafe,
            CliMode::OneWayReplica => Mode::OneWayReplica,
        }
    }
}

/// Stages content straight out of the opposite endpoint's own root,
/// since this demo has no transport: a real session manager would stage
/// content received over the wire instead.
struct LocalProvider {
    root: PathBuf,
}

#[async_trait::async_trait]
impl Provider for LocalProvider {
    async fn provide(&self, path: &str, _digest: &sync_core::entry::Digest) -> Result<PathBuf, ProviderError> {
        let candidate = self.root.join(path);
        if tokio::fs::metadata(&candidate).await.is_ok() {
            Ok(candidate)
        } else {
            Err(ProviderError::NotFound)
        }
    }
}

fn scan_config() -> ScanConfig {
    ScanConfig {
        probe_mode: ProbeMode::Probe,
        symbolic_link_mode: SymbolicLinkMode::Portable,
        permissions_mode: PermissionsMode::Portable,
    }
}

fn transition_config() -> TransitionConfig {
    TransitionConfig {
        symbolic_link_mode: SymbolicLinkMode::Portable,
        permissions_mode: PermissionsMode::Portable,
        default_file_mode: 0o644,
        default_directory_mode: 0o755,
        ownership: None,
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let ctx = Cancellation::new();
    let ignores = Matcher::compile(&[], Dialect::Default).expect("empty pattern list always compiles");

    println!("scanning alpha at {:?}", args.alpha);
    let alpha_scan = scan::<Sha1Hasher>(&ctx, &args.alpha, None, &[], None, &ignores, None, &scan_config())
        .await
        .expect("scan alpha");

    println!("scanning beta at {:?}", args.beta);
    let beta_scan = scan::<Sha1Hasher>(&ctx, &args.beta, None, &[], None, &ignores, None, &scan_config())
        .await
        .expect("scan beta");

    let reified = reify_phantom_directories(None, alpha_scan.snapshot.root(), beta_scan.snapshot.root());

    let out = reconcile(None, reified.alpha.as_ref(), reified.beta.as_ref(), args.mode.clone().into());

    println!(
        "reconcile: {} alpha change(s), {} beta change(s), {} conflict(s)",
        out.alpha_changes.len(),
        out.beta_changes.len(),
        out.conflicts.len()
    );
    for conflict in &out.conflicts {
        println!("  conflict at {:?}", conflict.root);
    }

    let alpha_provider = LocalProvider { root: args.beta.clone() };
    let alpha_transition = transition(
        &ctx,
        &args.alpha,
        &out.alpha_changes,
        Some(&Cache::new()),
        &transition_config(),
        &alpha_provider,
    )
    .await;

    let beta_provider = LocalProvider { root: args.alpha.clone() };
    let beta_transition = transition(
        &ctx,
        &args.beta,
        &out.beta_changes,
        Some(&Cache::new()),
        &transition_config(),
        &beta_provider,
    )
    .await;

    println!(
        "transition: alpha {} problem(s), beta {} problem(s), missing_files alpha={} beta={}",
        alpha_transition.problems.len(),
        beta_transition.problems.len(),
        alpha_transition.missing_files,
        beta_transition.missing_files,
    );
    for problem in alpha_transition.problems.iter().chain(beta_transition.problems.iter()) {
        println!("  problem at {:?}: {}", problem.path, problem.error);
    }
}
