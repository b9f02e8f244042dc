//! # Visualization
//!
//! $$
//! (\sigma_a, r_a)_{p},\quad W_{tj},\quad L_c(e) \mapsto \text{plotly figures}
//! $$
//!
//! Efficient frontier, allocation-over-time and loss diagnostics figures.
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use anyhow::anyhow;
use plotly::Layout;
use plotly::Plot;
use plotly::Scatter;
use plotly::common::Anchor;
use plotly::common::Font;
use plotly::common::Line;
use plotly::common::Marker;
use plotly::common::Mode;
use plotly::common::Position;
use plotly::common::Title;
use plotly::layout::Annotation;
use plotly::layout::Axis;
use plotly::layout::GridPattern;
use plotly::layout::LayoutGrid;
use plotly::layout::Margin;
use tracing::info;

use crate::dashboard::Dashboard;
use crate::results::PortfolioId;
use crate::results::PortfolioResult;
use crate::schema::ResultsSchema;

const LOSS_GRID_COLS: usize = 4;

fn axis_name(subplot_idx: usize, axis: &str) -> String {
  if subplot_idx == 1 {
    axis.to_string()
  } else {
    format!("{axis}{subplot_idx}")
  }
}

/// Risk/return scatter of every portfolio with the frontier drawn as a line.
pub fn frontier_plot(dashboard: &Dashboard) -> Plot {
  let summary: Vec<_> = dashboard.summary().collect();
  let risk = summary.iter().map(|m| m.annualized_risk).collect::<Vec<f64>>();
  let ret = summary.iter().map(|m| m.annualized_return).collect::<Vec<f64>>();
  let labels = summary
    .iter()
    .map(|m| m.id.to_string())
    .collect::<Vec<String>>();

  let points = Scatter::new(risk, ret)
    .name("Portfolios")
    .mode(Mode::MarkersText)
    .text_array(labels)
    .text_position(Position::TopCenter)
    .marker(Marker::new().size(12).color("red").opacity(0.7));

  let (front_risk, front_ret): (Vec<f64>, Vec<f64>) = dashboard
    .efficient_frontier()
    .iter()
    .filter_map(|id| dashboard.derived_metrics(*id))
    .map(|m| (m.annualized_risk, m.annualized_return))
    .unzip();
  let frontier = Scatter::new(front_risk, front_ret)
    .name("Efficient frontier")
    .mode(Mode::Lines)
    .line(Line::new().color("#d62728").width(2.0));

  let mut plot = Plot::new();
  plot.add_trace(points);
  plot.add_trace(frontier);
  plot.set_layout(
    Layout::new()
      .title(Title::from("Efficient frontier: risk vs. return"))
      .x_axis(
        Axis::new()
          .title(Title::from("Annualized terminal risk (cCVaR)"))
          .tick_format(".2%"),
      )
      .y_axis(
        Axis::new()
          .title(Title::from("Annualized expected return"))
          .tick_format(".2%"),
      ),
  );
  plot
}

/// Stacked monthly weights of one portfolio, one area per asset.
pub fn allocation_plot(id: PortfolioId, result: &PortfolioResult, schema: &ResultsSchema) -> Plot {
  let months = (1..=result.n_months()).collect::<Vec<usize>>();
  let mut plot = Plot::new();

  for (j, asset) in schema.assets.iter().enumerate() {
    let weights = result.weights().column(j).to_vec();
    let trace = Scatter::new(months.clone(), weights)
      .name(asset.name.as_str())
      .mode(Mode::Lines)
      .stack_group("allocation");
    plot.add_trace(trace);
  }

  plot.set_layout(
    Layout::new()
      .title(Title::from(
        format!("Monthly asset allocation of portfolio P{id}").as_str(),
      ))
      .x_axis(Axis::new().title(Title::from("Month")))
      .y_axis(
        Axis::new()
          .title(Title::from("Weight"))
          .tick_format(".0%"),
      ),
  );
  plot
}

/// Convergence of every loss component against epoch, one subplot each.
pub fn loss_plot(id: PortfolioId, result: &PortfolioResult, schema: &ResultsSchema) -> Plot {
  let epochs = result.epochs().to_vec();
  let components = &schema.loss_columns[1..];
  let cols = LOSS_GRID_COLS.min(components.len()).max(1);
  let rows = components.len().div_ceil(cols);

  let mut plot = Plot::new();
  let mut annotations = Vec::with_capacity(components.len());
  for (idx, name) in components.iter().enumerate() {
    let subplot_idx = idx + 1;
    let xa = axis_name(subplot_idx, "x");
    let ya = axis_name(subplot_idx, "y");
    let values = result
      .loss_column(idx + 1)
      .map(|c| c.to_vec())
      .unwrap_or_default();

    plot.add_trace(
      Scatter::new(epochs.clone(), values)
        .name(name.as_str())
        .mode(Mode::Lines)
        .x_axis(&xa)
        .y_axis(&ya),
    );
    annotations.push(
      Annotation::new()
        .text(format!("<b>{name}</b>"))
        .x_ref(format!("{xa} domain"))
        .y_ref(format!("{ya} domain"))
        .x(0.5)
        .y(1.0)
        .x_anchor(Anchor::Center)
        .y_anchor(Anchor::Bottom)
        .font(Font::new().size(12))
        .show_arrow(false),
    );
  }

  plot.set_layout(
    Layout::new()
      .title(Title::from(
        format!("Loss component convergence of portfolio P{id}").as_str(),
      ))
      .height(rows * 320 + 120)
      .margin(Margin::new().left(56).right(24).top(96).bottom(44))
      .annotations(annotations)
      .grid(
        LayoutGrid::new()
          .rows(rows)
          .columns(cols)
          .pattern(GridPattern::Independent),
      ),
  );
  plot
}

/// Write `plot` as standalone HTML, creating parent directories.
pub fn write_html<P: AsRef<Path>>(plot: &Plot, output_html: P) -> Result<()> {
  let output_html = output_html.as_ref();
  if let Some(parent) = output_html.parent() {
    fs::create_dir_all(parent)
      .with_context(|| format!("failed creating plot output directory {:?}", parent))?;
  }
  plot.write_html(output_html);
  Ok(())
}

/// Write the frontier plus the allocation and loss figures of `id` into
/// `out_dir`, returning the written paths.
pub fn write_dashboard<P: AsRef<Path>>(
  dashboard: &Dashboard,
  id: PortfolioId,
  out_dir: P,
) -> Result<Vec<PathBuf>> {
  let out_dir = out_dir.as_ref();
  let result = dashboard
    .portfolio_result(id)
    .ok_or_else(|| anyhow!("portfolio {id} is not in the loaded results"))?;
  let schema = dashboard.schema();

  let figures = [
    ("frontier.html".to_string(), frontier_plot(dashboard)),
    (
      format!("allocation_p{id}.html"),
      allocation_plot(id, result, schema),
    ),
    (format!("loss_p{id}.html"), loss_plot(id, result, schema)),
  ];

  let mut written = Vec::with_capacity(figures.len());
  for (name, plot) in &figures {
    let path = out_dir.join(name);
    write_html(plot, &path)?;
    written.push(path);
  }
  info!(portfolio = %id, dir = ?out_dir, files = written.len(), "wrote dashboard figures");
  Ok(written)
}
