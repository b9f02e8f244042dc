use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use anyhow::bail;
use clap::Parser;
use portfolio_dashboard::Dashboard;
use portfolio_dashboard::PortfolioId;
use portfolio_dashboard::ResultsCache;
use portfolio_dashboard::visualization::write_dashboard;
use prettytable::Table;
use prettytable::row;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Summarize an optimization results archive and write the dashboard figures.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
  /// Results archive (`.npz`) produced by the optimizer.
  #[arg(default_value = "data/optimization_results.npz")]
  path: PathBuf,

  /// Directory receiving the HTML figures.
  #[arg(long, default_value = "charts")]
  out_dir: PathBuf,

  /// Portfolio to drill into. Defaults to the highest id.
  #[arg(long)]
  portfolio: Option<u32>,
}

fn main() -> Result<ExitCode> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("portfolio_dashboard=info")),
    )
    .init();

  let args = Args::parse();
  let Some(dashboard) = Dashboard::open(ResultsCache::global(), &args.path)? else {
    eprintln!(
      "Results file {:?} not found. Run the optimizer to generate it first.",
      args.path
    );
    return Ok(ExitCode::FAILURE);
  };

  print_summary(&dashboard);

  let ids = dashboard.portfolio_ids();
  let Some(default_id) = ids.last().copied() else {
    info!(path = ?args.path, "archive holds no portfolios, nothing to plot");
    return Ok(ExitCode::SUCCESS);
  };
  let selected = args.portfolio.map(PortfolioId).unwrap_or(default_id);
  if dashboard.portfolio_result(selected).is_none() {
    bail!("portfolio {selected} not found, available: {ids:?}");
  }

  for path in write_dashboard(&dashboard, selected, &args.out_dir)? {
    println!("wrote {}", path.display());
  }
  Ok(ExitCode::SUCCESS)
}

fn print_summary(dashboard: &Dashboard) {
  let mut table = Table::new();
  table.add_row(row![
    "Portfolio",
    "Ann. return",
    "Ann. risk (cCVaR)",
    "Achieved wealth",
    "Avg. turnover",
    "Avg. HHI",
    "Efficient"
  ]);
  for m in dashboard.summary() {
    table.add_row(row![
      format!("P{}", m.id),
      format!("{:.2}%", m.annualized_return * 100.0),
      format!("{:.2}%", m.annualized_risk * 100.0),
      format!("{:.3}", m.achieved_wealth),
      format!("{:.4}", m.average_turnover),
      format!("{:.4}", m.average_concentration),
      if dashboard.is_efficient(m.id) { "yes" } else { "" }
    ]);
  }
  table.printstd();
}
