#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the county spatial correlation analysis.

use std::collections::BTreeMap;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use covid_corr_analytics::Analysis;
use covid_corr_analytics_models::AnalysisConfig;
use covid_corr_cli_utils::{IndicatifProgress, MultiProgress};
use covid_corr_geography_models::DataGap;
use covid_corr_ingest::{export, read_counties, read_daily, read_population};
use covid_corr_signal::Granularity;
use covid_corr_spatial::{DistanceBinner, GeoIndex, PairwiseCorpus};

#[derive(Parser)]
#[command(
    name = "covid_corr",
    about = "Spatial correlation of county case growth as a function of distance"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Input files shared by the analysis commands.
#[derive(Args, Debug, Clone)]
struct Inputs {
    /// County reference table (`fips,name,state,land_area,lon,lat,population`)
    #[arg(long)]
    counties: PathBuf,
    /// Daily case/death records (`date,fips,cases,deaths`)
    #[arg(long)]
    cases: PathBuf,
    /// Population table (`fips` plus year columns). Overrides the county
    /// table's population column where both are present.
    #[arg(long)]
    population: Option<PathBuf>,
    /// TOML configuration file. Flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Command-line overrides for individual configuration values.
#[derive(Args, Debug, Clone, Default)]
struct Overrides {
    /// First day of week 1 (`YYYY-MM-DD`)
    #[arg(long)]
    anchor: Option<NaiveDate>,
    /// Bucket granularity (`weekly` or `monthly`)
    #[arg(long)]
    granularity: Option<Granularity>,
    /// Bucket width in days. Takes precedence over `--granularity`.
    #[arg(long)]
    bucket_days: Option<u32>,
    /// Comma-separated upper bounds of the distance bins in km
    #[arg(long, value_delimiter = ',')]
    bins: Option<Vec<f64>>,
    /// Counties below this population are excluded
    #[arg(long)]
    min_population: Option<u64>,
    /// First week of the batch
    #[arg(long)]
    first_week: Option<u32>,
    /// Last week of the batch (inclusive)
    #[arg(long)]
    last_week: Option<u32>,
    /// Weeks with fewer observed counties are skipped
    #[arg(long)]
    min_observed_counties: Option<usize>,
    /// Significance threshold for the single-week curve
    #[arg(long)]
    single_week_p: Option<f64>,
    /// Significance threshold for the weekly batch
    #[arg(long)]
    batch_p: Option<f64>,
    /// Largest accepted |C| at the interpolated root
    #[arg(long)]
    root_tolerance: Option<f64>,
}

impl Overrides {
    fn apply(self, config: &mut AnalysisConfig) {
        if let Some(anchor) = self.anchor {
            config.anchor_date = anchor;
        }
        if let Some(granularity) = self.granularity {
            config.bucket_days = granularity.days();
        }
        if let Some(days) = self.bucket_days {
            config.bucket_days = days;
        }
        if let Some(bins) = self.bins {
            config.bin_upper_bounds_km = Some(bins);
        }
        if let Some(floor) = self.min_population {
            config.min_population = floor;
        }
        if let Some(week) = self.first_week {
            config.first_week = Some(week);
        }
        if let Some(week) = self.last_week {
            config.last_week = Some(week);
        }
        if let Some(min) = self.min_observed_counties {
            config.min_observed_counties = min;
        }
        if let Some(p) = self.single_week_p {
            config.single_week_p_threshold = p;
        }
        if let Some(p) = self.batch_p {
            config.batch_p_threshold = p;
        }
        if let Some(tolerance) = self.root_tolerance {
            config.root_tolerance = tolerance;
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CurveFormat {
    Csv,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the weekly correlation series and correlation lengths
    Run {
        #[command(flatten)]
        inputs: Inputs,
        #[command(flatten)]
        overrides: Overrides,
        /// Weekly time-series CSV
        #[arg(long)]
        output: PathBuf,
        /// Write excluded identities and their reasons to this CSV
        #[arg(long)]
        exclusions: Option<PathBuf>,
        /// Also write the full series, curves included, as JSON
        #[arg(long)]
        json: Option<PathBuf>,
    },
    /// Compute the correlation curve of a single week
    Curve {
        #[command(flatten)]
        inputs: Inputs,
        #[command(flatten)]
        overrides: Overrides,
        /// Week index (1-based)
        #[arg(long)]
        week: u32,
        /// Output file for the curve
        #[arg(long)]
        output: PathBuf,
        /// Output format
        #[arg(long, value_enum, default_value_t = CurveFormat::Csv)]
        format: CurveFormat,
    },
    /// Build the pairwise distance corpus and report pairs per bin
    Corpus {
        /// County reference table
        #[arg(long)]
        counties: PathBuf,
        /// Population table overriding the county table's populations
        #[arg(long)]
        population: Option<PathBuf>,
        /// TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,
        #[command(flatten)]
        overrides: Overrides,
        /// Per-bin pair count CSV
        #[arg(long)]
        output: PathBuf,
        /// Also write every ordered pair with its distance and bin
        #[arg(long)]
        pairs: Option<PathBuf>,
    },
}

fn load_config(
    path: Option<&Path>,
    overrides: Overrides,
) -> Result<AnalysisConfig, Box<dyn std::error::Error>> {
    let mut config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| format!("Failed to read config {}: {e}", path.display()))?;
            AnalysisConfig::from_toml_str(&text)?
        }
        None => AnalysisConfig::default(),
    };
    overrides.apply(&mut config);
    config.validate()?;
    log::debug!("Configuration: {config:?}");
    Ok(config)
}

fn load_population(
    path: Option<&Path>,
) -> Result<BTreeMap<String, u64>, Box<dyn std::error::Error>> {
    Ok(match path {
        Some(path) => read_population(path)?,
        None => BTreeMap::new(),
    })
}

fn prepare(
    multi: &MultiProgress,
    inputs: &Inputs,
    overrides: Overrides,
) -> Result<(Analysis, Vec<DataGap>), Box<dyn std::error::Error>> {
    let config = load_config(inputs.config.as_deref(), overrides)?;

    let step = IndicatifProgress::step_spinner(multi, "Loading inputs");
    let (counties, unresolved) = read_counties(&inputs.counties)?;
    let records = read_daily(&inputs.cases)?;
    let population = load_population(inputs.population.as_deref())?;
    if !unresolved.is_empty() {
        log::warn!(
            "{} county rows have an unresolvable identity",
            unresolved.len()
        );
    }
    step.finish(format!(
        "Loaded {} counties, {} daily records",
        counties.len(),
        records.len()
    ));

    let step = IndicatifProgress::step_spinner(multi, "Building corpus and signals");
    let analysis = Analysis::prepare(config, counties, records, &population)?;
    step.finish(format!(
        "{} counties, {} pairs, {} weeks",
        analysis.index().len(),
        analysis.corpus().len(),
        analysis.signals().weeks().count()
    ));

    Ok((analysis, unresolved))
}

fn run(
    multi: &MultiProgress,
    inputs: &Inputs,
    overrides: Overrides,
    output: &Path,
    exclusions: Option<&Path>,
    json: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (analysis, unresolved) = prepare(multi, inputs, overrides)?;

    let bar = IndicatifProgress::weeks_bar(multi, "Correlating weeks");
    let series = analysis.run_batch(&bar);

    export::write_weekly_series(BufWriter::new(covid_corr_ingest::create(output)?), &series)?;
    log::info!(
        "Wrote {} weeks ({} computed) to {}",
        series.weeks.len(),
        series.computed_weeks(),
        output.display()
    );

    if let Some(path) = json {
        export::write_series_json(BufWriter::new(covid_corr_ingest::create(path)?), &series)?;
        log::info!("Wrote series JSON to {}", path.display());
    }

    write_exclusions(&analysis, unresolved, exclusions)
}

fn curve(
    multi: &MultiProgress,
    inputs: &Inputs,
    overrides: Overrides,
    week: u32,
    output: &Path,
    format: CurveFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let (analysis, _) = prepare(multi, inputs, overrides)?;
    let result = analysis.single_week(week)?;

    let writer = BufWriter::new(covid_corr_ingest::create(output)?);
    match format {
        CurveFormat::Csv => export::write_curve_csv(writer, &result)?,
        CurveFormat::Json => export::write_curve_json(writer, &result)?,
    }

    match (result.length.interpolation_km, result.length.significance_km) {
        (Some(xi), Some(xi_sig)) => {
            log::info!("Week {week}: xi = {xi:.1} km, xi_sig = {xi_sig:.1} km");
        }
        (xi, xi_sig) => log::info!("Week {week}: xi = {xi:?}, xi_sig = {xi_sig:?}"),
    }
    log::info!("Wrote curve to {}", output.display());

    Ok(())
}

fn corpus(
    multi: &MultiProgress,
    counties: &Path,
    population: Option<&Path>,
    config: Option<&Path>,
    overrides: Overrides,
    output: &Path,
    pairs: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config, overrides)?;
    let binner = match &config.bin_upper_bounds_km {
        Some(bounds) => DistanceBinner::new(bounds.clone())?,
        None => DistanceBinner::reference(),
    };

    let (records, _) = read_counties(counties)?;
    let population = load_population(population)?;
    let records = records.into_iter().map(|mut record| {
        if let Some(&pop) = population.get(&record.fips) {
            record.population = Some(pop);
        }
        record
    });
    let (index, _) = GeoIndex::from_records(records, config.min_population);

    let step = IndicatifProgress::step_spinner(multi, "Building pairwise corpus");
    let corpus = PairwiseCorpus::build(&index, &binner);
    step.finish(format!(
        "{} ordered pairs within {} km",
        corpus.len(),
        corpus.cutoff_km()
    ));

    export::write_corpus_summary(
        BufWriter::new(covid_corr_ingest::create(output)?),
        &binner,
        &corpus,
    )?;
    log::info!("Wrote per-bin pair counts to {}", output.display());

    if let Some(path) = pairs {
        export::write_corpus_pairs(
            BufWriter::new(covid_corr_ingest::create(path)?),
            &index,
            &corpus,
        )?;
        log::info!("Wrote pair list to {}", path.display());
    }

    Ok(())
}

/// Writes the analysis exclusions together with the county rows the loader
/// could not resolve.
fn write_exclusions(
    analysis: &Analysis,
    unresolved: Vec<DataGap>,
    path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut gaps = unresolved;
    gaps.extend(analysis.exclusions());
    gaps.sort_by(|a, b| a.fips.cmp(&b.fips).then(a.reason.cmp(&b.reason)));
    gaps.dedup();
    if gaps.is_empty() {
        return Ok(());
    }
    log::warn!("{} identities excluded from the analysis", gaps.len());

    if let Some(path) = path {
        export::write_exclusions(BufWriter::new(covid_corr_ingest::create(path)?), &gaps)?;
        log::info!("Wrote exclusions to {}", path.display());
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = covid_corr_cli_utils::init_logger();
    let cli = Cli::parse();
    let start = Instant::now();

    match cli.command {
        Commands::Run {
            inputs,
            overrides,
            output,
            exclusions,
            json,
        } => run(
            &multi,
            &inputs,
            overrides,
            &output,
            exclusions.as_deref(),
            json.as_deref(),
        )?,
        Commands::Curve {
            inputs,
            overrides,
            week,
            output,
            format,
        } => curve(&multi, &inputs, overrides, week, &output, format)?,
        Commands::Corpus {
            counties,
            population,
            config,
            overrides,
            output,
            pairs,
        } => corpus(
            &multi,
            &counties,
            population.as_deref(),
            config.as_deref(),
            overrides,
            &output,
            pairs.as_deref(),
        )?,
    }

    log::info!("Done in {:.2?}", start.elapsed());
    Ok(())
}
