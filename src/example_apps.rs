use std::error::Error;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Duration;
use clap::{Parser, error::ErrorKind};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::aggregate::round_for_display;
use crate::clock::{Clock, SystemClock};
use crate::config::{DepartmentRegistry, NotificationConfig, ViewConfig};
use crate::constants::entities::{DESCRIPTION, INSURER, METRIC_TYPE, VALUE};
use crate::data::DataRecord;
use crate::entities::{INSURERS, METRIC_ENTRY};
use crate::filter::DateRange;
use crate::notify::NotificationCenter;
use crate::store::IdSequence;
use crate::view::{SummarySpec, ViewController, ViewSummary};

const DEMO_OWNERS: [&str; 4] = ["sophie", "emmanuel", "amaka", "tunde"];

#[derive(Debug, Parser)]
#[command(
    name = "view_export_demo",
    disable_help_subcommand = true,
    about = "Filter, summarise, and export a department's metric entries",
    long_about = "Generate sample metric entries for a department, apply search/facet/date filters, print the summary, and export the filtered view as CSV."
)]
struct ViewExportDemoCli {
    #[arg(long, default_value = "dataops", help = "Department slug")]
    department: String,
    #[arg(
        long = "departments-file",
        value_name = "PATH",
        help = "JSON department registry; the built-in registry is used when omitted"
    )]
    departments_file: Option<PathBuf>,
    #[arg(
        long,
        default_value_t = 24,
        value_parser = parse_positive_usize,
        help = "Number of sample records to generate"
    )]
    records: usize,
    #[arg(long, default_value_t = 7, help = "Seed for sample data generation")]
    seed: u64,
    #[arg(long, help = "Case-insensitive search term")]
    search: Option<String>,
    #[arg(long = "metric-type", help = "Restrict to one metric type")]
    metric_type: Option<String>,
    #[arg(
        long,
        default_value = "all",
        value_parser = parse_date_range_arg,
        help = "Date range: all, today, yesterday, 7d, 30d, 90d, 365d"
    )]
    range: DateRange,
    #[arg(
        long = "output-dir",
        value_name = "DIR",
        help = "Write the export file here instead of printing CSV to stdout"
    )]
    output_dir: Option<PathBuf>,
}

pub fn run_view_export_demo<I>(args_iter: I) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let Some(cli) = parse_cli::<ViewExportDemoCli, _>(
        std::iter::once("view_export_demo".to_string()).chain(args_iter),
    )?
    else {
        return Ok(());
    };

    let registry = match &cli.departments_file {
        Some(path) => DepartmentRegistry::from_path(path)?,
        None => DepartmentRegistry::builtin(),
    };
    if !registry.is_enabled(&cli.department, "metrics") {
        return Err(format!("department '{}' has no metrics screen", cli.department).into());
    }
    let metric_types = registry.metric_types(&cli.department).to_vec();
    if metric_types.is_empty() {
        return Err(format!("department '{}' declares no metric types", cli.department).into());
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let notifications = Arc::new(NotificationCenter::new(
        SystemClock,
        NotificationConfig::default(),
    ));
    let mut view = ViewController::new(
        format!("{}-metrics", cli.department),
        registry.metric_schema(&cli.department)?,
        ViewConfig::default(),
        Arc::clone(&clock),
    )
    .with_notifier(notifications.clone())
    .with_summary(
        SummarySpec::value(VALUE)
            .breakdown(METRIC_TYPE)
            .rank_owners(vec![METRIC_TYPE.to_string(), INSURER.to_string()]),
    )?;

    let mut rng = StdRng::seed_from_u64(cli.seed);
    let mut ids = IdSequence::new("metric");
    let now = clock.now();
    for _ in 0..cli.records {
        let metric_type = &metric_types[rng.random_range(0..metric_types.len())];
        let owner = DEMO_OWNERS[rng.random_range(0..DEMO_OWNERS.len())];
        let insurer = INSURERS[rng.random_range(0..INSURERS.len())];
        let age = Duration::hours(rng.random_range(0..24 * 45));
        let record = DataRecord::new(ids.next_id(), METRIC_ENTRY, now - age)
            .with_owner(owner)
            .with_category(METRIC_TYPE, metric_type.as_str())
            .with_category(INSURER, insurer)
            .with_number(VALUE, f64::from(rng.random_range(1u32..=250)))
            .with_text(DESCRIPTION, format!("{metric_type} for {insurer}"));
        view.append(record)?;
    }

    if let Some(term) = &cli.search {
        view.set_search(term);
    }
    if let Some(metric_type) = &cli.metric_type {
        view.set_facet(METRIC_TYPE, metric_type)?;
    }
    view.set_date_range(cli.range);

    println!(
        "{} of {} records match (range: {})",
        view.records().len(),
        view.store().len(),
        cli.range
    );
    print_summary(view.summary());

    let columns = view.default_columns();
    match &cli.output_dir {
        Some(dir) => {
            let path = view.export_to_dir(dir, &columns)?;
            println!("Wrote {}", path.display());
        }
        None => {
            let stdout = io::stdout();
            view.export_csv(&mut stdout.lock(), &columns)?;
        }
    }

    for notification in notifications.visible() {
        println!("[{}] {}", notification.severity, notification.message);
    }
    Ok(())
}

fn print_summary(summary: &ViewSummary) {
    if let Some(totals) = &summary.totals {
        println!(
            "total={} mean={}",
            round_for_display(totals.sum, 2),
            round_for_display(totals.mean, 2)
        );
    }
    for breakdown in &summary.breakdowns {
        println!("by {}:", breakdown.group_field);
        for group in &breakdown.groups {
            println!(
                "  {:<32} count={:<4} sum={:<10} share={}%",
                group.key,
                group.count,
                round_for_display(group.sum, 2),
                round_for_display(group.share * 100.0, 1)
            );
        }
    }
    if !summary.owners.is_empty() {
        println!("owners:");
        for owner in &summary.owners {
            let touched = |field: &str| owner.distinct.get(field).copied().unwrap_or(0);
            println!(
                "  {:<12} entries={:<4} sum={:<10} metric types={} insurers={}",
                owner.owner,
                owner.count,
                round_for_display(owner.sum, 2),
                touched(METRIC_TYPE),
                touched(INSURER)
            );
        }
    }
}

fn parse_positive_usize(raw: &str) -> Result<usize, String> {
    let parsed = raw
        .parse::<usize>()
        .map_err(|_| format!("Could not parse --records value '{raw}' as a positive integer"))?;
    if parsed == 0 {
        return Err("--records must be greater than zero".to_string());
    }
    Ok(parsed)
}

fn parse_date_range_arg(raw: &str) -> Result<DateRange, String> {
    raw.parse::<DateRange>().map_err(|err| err.to_string())
}

fn parse_cli<T, I>(args: I) -> Result<Option<T>, Box<dyn Error>>
where
    T: Parser,
    I: IntoIterator,
    I::Item: Into<std::ffi::OsString> + Clone,
{
    match T::try_parse_from(args) {
        Ok(cli) => Ok(Some(cli)),
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                err.print()?;
                Ok(None)
            }
            _ => Err(err.into()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_cli_accepts_range_and_filters() {
        let cli = parse_cli::<ViewExportDemoCli, _>([
            "view_export_demo",
            "--department",
            "finance",
            "--range",
            "30d",
            "--metric-type",
            "Revenue Processed",
        ])
        .unwrap()
        .unwrap();
        assert_eq!(cli.department, "finance");
        assert_eq!(cli.range, DateRange::Last30Days);
        assert_eq!(cli.metric_type.as_deref(), Some("Revenue Processed"));
        assert_eq!(cli.records, 24);
    }

    #[test]
    fn parse_cli_rejects_zero_records_and_bad_ranges() {
        assert!(parse_cli::<ViewExportDemoCli, _>(["view_export_demo", "--records", "0"]).is_err());
        assert!(
            parse_cli::<ViewExportDemoCli, _>(["view_export_demo", "--range", "fortnight"])
                .is_err()
        );
    }

    #[test]
    fn demo_exports_into_directory() {
        let dir = tempfile::tempdir().unwrap();
        let args = vec![
            "--records".to_string(),
            "5".to_string(),
            "--output-dir".to_string(),
            dir.path().display().to_string(),
        ];
        run_view_export_demo(args.into_iter()).unwrap();
        let written: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(written.len(), 1);
    }

    #[test]
    fn demo_rejects_departments_without_metric_types() {
        let args = vec!["--department".to_string(), "engineering".to_string()];
        assert!(run_view_export_demo(args.into_iter()).is_err());
    }
}
