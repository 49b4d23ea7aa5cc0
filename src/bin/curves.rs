//! Batch chart builder. Reads a request document, loads the season data it
//! names, fits one curve per era and filter combination and writes a chart
//! document per request.

use std::env;
use std::error::Error;
use std::fs::{self, File};
use std::path::PathBuf;

use anyhow::bail;
use clap::Parser;
use serde::Deserialize;
use stanza::renderer::console::Console;
use stanza::renderer::Renderer;
use stanza::style::{HAlign, Header, MinWidth, Styles};
use stanza::table::{Col, Row, Table};
use tinyrand::{Seeded, StdRand};
use tracing::{debug, error, info, warn};

use comeback::aggregate::Statistic;
use comeback::chart::{self, AxisScale, ChartLine};
use comeback::curve::{Bound, Curve, CurveConfig, FitWindow};
use comeback::data::{Era, GameCollection, SeasonStore};
use comeback::filter::GameFilter;
use comeback::link::Link;
use comeback::series::SeriesMap;

const DEFAULT_SAMPLE_SEED: u64 = 1616;

#[derive(Debug, clap::Parser, Clone)]
struct Args {
    /// file containing the chart requests
    #[clap(short = 'r', long)]
    requests: PathBuf,

    /// directory containing the season documents
    #[clap(short = 'd', long)]
    data: PathBuf,

    /// directory to write the chart documents into
    #[clap(short = 'o', long)]
    out: PathBuf,

    /// log and skip lines whose curve fails instead of aborting the run
    #[clap(long = "keep-going")]
    keep_going: bool,
}
impl Args {
    fn validate(&self) -> anyhow::Result<()> {
        if !self.requests.is_file() {
            bail!("request file {:?} does not exist", self.requests);
        }
        if !self.data.is_dir() {
            bail!("data directory {:?} does not exist", self.data);
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Batch {
    charts: Vec<ChartRequest>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Kind {
    /// Statistic buckets against win (or occurrence) probability.
    #[default]
    Chart,
    /// Deficits matching fixed comeback probabilities, minute by minute.
    Timeline,
}

/// One requested output document. Unset knobs fall back to the statistic's
/// conventional defaults from [CurveConfig::new].
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ChartRequest {
    name: String,
    title: String,
    #[serde(default)]
    kind: Kind,
    statistic: Statistic,
    eras: Vec<Era>,
    #[serde(default)]
    filters: Vec<GameFilter>,
    #[serde(default)]
    cumulate: bool,
    #[serde(default)]
    occurrences: bool,
    #[serde(default)]
    min_value: Option<i32>,
    #[serde(default)]
    max_value: Option<Bound>,
    #[serde(default)]
    fit_window: Option<FitWindow>,
    #[serde(default)]
    min_fit_wins: Option<usize>,
    #[serde(default)]
    link: Option<Link>,
    #[serde(default)]
    scale: AxisScale,
    #[serde(default)]
    seed: Option<u64>,

    /// Comeback probabilities tracked by a timeline request.
    #[serde(default)]
    percents: Option<Vec<f64>>,

    /// Track the deepest deficit ever overcome alongside the percent lines.
    #[serde(default)]
    record: bool,

    /// `-k√t` guide line multipliers for a timeline request.
    #[serde(default)]
    guides: Option<Vec<f64>>,
}
impl ChartRequest {
    fn validate(&self) -> anyhow::Result<()> {
        if self.eras.is_empty() {
            bail!("chart '{}' names no eras", self.name);
        }
        match self.kind {
            Kind::Chart => {
                if self.percents.is_some() || self.guides.is_some() || self.record {
                    bail!(
                        "chart '{}': percents, record and guides only apply to timelines",
                        self.name
                    );
                }
            }
            Kind::Timeline => {
                if !matches!(self.statistic, Statistic::MarginAt(_)) {
                    bail!("timeline '{}' requires a margin_at statistic", self.name);
                }
                if self.percents.as_ref().map_or(true, Vec::is_empty) && !self.record {
                    bail!("timeline '{}' names no percents", self.name);
                }
                if self.eras.len() > 1 || self.filters.len() > 1 {
                    bail!("timeline '{}' admits a single era and filter", self.name);
                }
                if self.occurrences || self.cumulate {
                    bail!("timeline '{}' cannot cumulate or count occurrences", self.name);
                }
            }
        }
        Ok(())
    }

    fn config(&self) -> CurveConfig {
        let mut config = CurveConfig::new(self.statistic);
        config.cumulate = self.cumulate;
        config.occurrences = self.occurrences;
        config.min_value = self.min_value;
        if let Some(max_value) = self.max_value {
            config.max_value = max_value;
        }
        if let Some(fit_window) = self.fit_window {
            config.fit_window = fit_window;
        }
        if let Some(min_fit_wins) = self.min_fit_wins {
            config.min_fit_wins = min_fit_wins;
        }
        if let Some(link) = self.link {
            config.link = link;
        }
        config
    }

    fn requires_series(&self) -> bool {
        self.statistic.requires_series() || self.filters.iter().any(GameFilter::requires_series)
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    if env::var("RUST_BACKTRACE").is_err() {
        env::set_var("RUST_BACKTRACE", "full")
    }
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info")
    }
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    args.validate()?;
    debug!("args: {args:?}");

    let file = File::open(&args.requests)?;
    let batch: Batch = serde_json::from_reader(file)?;
    info!(
        "{} requests sourced from {:?}",
        batch.charts.len(),
        args.requests
    );
    fs::create_dir_all(&args.out)?;

    let mut store = SeasonStore::new(&args.data);
    let mut summary: Vec<LineSummary> = Vec::new();

    for request in &batch.charts {
        request.validate()?;
        for era in &request.eras {
            store.load_range(era.years())?;
        }
        let collections = request
            .eras
            .iter()
            .map(|era| store.collect(era.start_year, era.stop_year, era.season_type))
            .collect::<Result<Vec<_>, _>>()?;
        let series_maps = if request.requires_series() {
            collections
                .iter()
                .map(|collection| SeriesMap::build(collection).map(Some))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            collections.iter().map(|_| None).collect()
        };

        let path = args.out.join(format!("{}.json", request.name));
        let template = request.config();
        let filters = if request.filters.is_empty() {
            vec![GameFilter::default()]
        } else {
            request.filters.clone()
        };

        let line_count = match request.kind {
            Kind::Timeline => {
                let collection = &collections[0];
                let Statistic::MarginAt(start) = request.statistic else {
                    unreachable!("validated above");
                };
                let mut config = template.clone();
                config.filter = filters[0].clone();
                let document = match chart::deficit_timeline(
                    request.title.clone(),
                    collection,
                    &config,
                    start,
                    request.percents.as_deref().unwrap_or_default(),
                    request.record,
                    request.guides.as_deref().unwrap_or_default(),
                ) {
                    Ok(document) => document,
                    Err(err) if args.keep_going => {
                        error!("skipping timeline '{}': {err}", request.name);
                        continue;
                    }
                    Err(err) => return Err(err.into()),
                };
                document.write(&path)?;
                for line in &document.lines {
                    summary.push(LineSummary {
                        chart: request.name.clone(),
                        legend: line.legend.clone(),
                        line: None,
                        games: line.number_of_games,
                        window: None,
                    });
                }
                document.lines.len()
            }
            Kind::Chart => {
                let mut lines = Vec::new();
                for (index, collection) in collections.iter().enumerate() {
                    let series = series_maps[index].as_ref();
                    for filter in &filters {
                        let mut config = template.clone();
                        config.filter = filter.clone();
                        let base = legend_base(collection, filter, &request.eras, &filters);
                        let curve = match Curve::build(collection, &config, series) {
                            Ok(curve) => curve,
                            Err(err) if args.keep_going => {
                                error!("skipping '{base}' in chart '{}': {err}", request.name);
                                continue;
                            }
                            Err(err) => return Err(err.into()),
                        };
                        let legend = curve.legend(&base);
                        debug!(
                            "fitted '{legend}': {} buckets, line {:?}",
                            curve.values.len(),
                            curve.line
                        );
                        summary.push(LineSummary {
                            chart: request.name.clone(),
                            legend: legend.clone(),
                            line: curve.line,
                            games: curve.game_count,
                            window: curve.fit_cutoff,
                        });
                        lines.push(ChartLine {
                            curve,
                            legend,
                            games: collection,
                        });
                    }
                }
                if lines.is_empty() {
                    warn!("chart '{}' has no surviving lines; nothing written", request.name);
                    continue;
                }
                let mut rand = StdRand::seed(request.seed.unwrap_or(DEFAULT_SAMPLE_SEED));
                let document = chart::assemble(
                    request.title.clone(),
                    lines,
                    request.scale,
                    request.cumulate,
                    request.occurrences,
                    &mut rand,
                );
                document.write(&path)?;
                document.lines.len()
            }
        };
        info!(
            "wrote '{}' with {line_count} lines to {path:?}",
            request.name
        );
    }

    let table = tabulate_summary(&summary);
    info!(
        "{} lines fitted\n{}",
        summary.len(),
        Console::default().render(&table)
    );
    Ok(())
}

struct LineSummary {
    chart: String,
    legend: String,
    line: Option<comeback::regression::FittedLine>,
    games: usize,
    window: Option<i32>,
}

/// Legend stem for one era and filter combination. Whichever dimension the
/// request varies contributes its label; a lone line leads with the era.
fn legend_base(
    collection: &GameCollection,
    filter: &GameFilter,
    eras: &[Era],
    filters: &[GameFilter],
) -> String {
    let filter_label = filter.label();
    if filter_label.is_empty() {
        collection.era_label()
    } else if eras.len() == 1 && filters.len() > 1 {
        filter_label
    } else {
        format!("{} {filter_label}", collection.era_label())
    }
}

fn tabulate_summary(summary: &[LineSummary]) -> Table {
    let mut table = Table::default()
        .with_cols(vec![
            Col::new(Styles::default().with(MinWidth(16))),
            Col::new(Styles::default().with(MinWidth(28))),
            Col::new(Styles::default().with(MinWidth(10)).with(HAlign::Right)),
            Col::new(Styles::default().with(MinWidth(10)).with(HAlign::Right)),
            Col::new(Styles::default().with(MinWidth(9)).with(HAlign::Right)),
            Col::new(Styles::default().with(MinWidth(8)).with(HAlign::Right)),
        ])
        .with_row(Row::new(
            Styles::default().with(Header(true)),
            vec![
                "Chart".into(),
                "Legend".into(),
                "m".into(),
                "b".into(),
                "Games".into(),
                "Window".into(),
            ],
        ));
    for line in summary {
        let (m, b) = match line.line {
            Some(fitted) => (format!("{:.4}", fitted.slope), format!("{:.4}", fitted.intercept)),
            None => ("".into(), "".into()),
        };
        let window = line
            .window
            .map(|cutoff| cutoff.to_string())
            .unwrap_or_default();
        table.push_row(Row::new(
            Styles::default(),
            vec![
                line.chart.as_str().into(),
                line.legend.as_str().into(),
                m.into(),
                b.into(),
                format!("{}", line.games).into(),
                window.into(),
            ],
        ));
    }
    table
}
