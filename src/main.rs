// Interactive driver for the seasonal analysis pipeline.
//
// - Option [1] loads a CSV export with a chosen profile and previews it.
// - Option [2] sets the categorical filters.
// - Option [3] generates the seasonal summaries and the commentary request.
// - Option [4] builds the forecast commentary request from a forecast CSV.
use once_cell::sync::Lazy;
use seasonal_report::config::{AnalysisProfile, ApiKey};
use seasonal_report::filter::{resolve_selector_choice, selector_options, SelectorChoice};
use seasonal_report::loader::read_table;
use seasonal_report::output;
use seasonal_report::pipeline::SeasonalAnalyzer;
use seasonal_report::reports;
use seasonal_report::services::FileForecaster;
use seasonal_report::types::{FilterSelection, NormalizedSeries};
use seasonal_report::util::format_int;
use seasonal_report::{PipelineError, Result};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const API_KEY_VAR: &str = "GROQ_API_KEY";
const LOG_VAR: &str = "ANALYZER_LOG";

// Loaded data is kept in memory so reports can be regenerated after filter
// changes without re-reading the file.
static APP_STATE: Lazy<Mutex<AppState>> = Lazy::new(|| Mutex::new(AppState::default()));

#[derive(Default)]
struct AppState {
    analyzer: Option<SeasonalAnalyzer>,
    series: Option<NormalizedSeries>,
    selection: FilterSelection,
}

fn state() -> MutexGuard<'static, AppState> {
    APP_STATE.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn setup_logging() {
    let filter = EnvFilter::try_from_env(LOG_VAR).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();
}

fn read_line(prompt: &str) -> String {
    print!("{}", prompt);
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

fn prompt_back_to_menu() -> bool {
    loop {
        match read_line("Back to menu (Y/N): ").to_uppercase().as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

fn resolve_profile(choice: &str) -> Result<AnalysisProfile> {
    if choice.ends_with(".json") {
        AnalysisProfile::from_json_file(Path::new(choice))
    } else {
        AnalysisProfile::preset(choice)
    }
}

fn handle_load(api_key: &ApiKey) -> Result<()> {
    let names = AnalysisProfile::preset_names().join("/");
    let profile = resolve_profile(&read_line(&format!("Profile ({} or a .json file): ", names)))?;
    let path = PathBuf::from(read_line("CSV file: "));

    let analyzer = SeasonalAnalyzer::new(profile, api_key.clone())?;
    let table = read_table(&path)?;
    let (series, report) = analyzer.load(&table)?;

    println!(
        "Processing dataset... ({} rows read, {} kept)",
        format_int(report.total_rows as u64),
        format_int(report.kept_rows as u64)
    );
    println!(
        "Note: {} rows skipped ({} invalid dates, {} missing values).",
        format_int(report.dropped_rows() as u64),
        format_int(report.invalid_timestamps as u64),
        format_int(report.missing_values as u64)
    );
    output::preview_table("Data preview", None, &reports::preview_rows(&series, 5), 5);

    let mut st = state();
    st.analyzer = Some(analyzer);
    st.series = Some(series);
    st.selection = FilterSelection::new();
    Ok(())
}

fn handle_filters() {
    let mut st = state();
    let (Some(analyzer), Some(series)) = (st.analyzer.clone(), st.series.clone()) else {
        println!("Error: No data loaded. Please load a file first (option 1).\n");
        return;
    };
    let profile = analyzer.profile();
    for field in profile.mapping.fields() {
        let options = selector_options(&series, field);
        if options.is_empty() {
            continue;
        }
        println!("\nFilter by {}:", field);
        println!("  [0] {}", profile.all_label);
        for (i, opt) in options.iter().enumerate() {
            println!("  [{}] {}", i + 1, opt);
        }
        let value = loop {
            match resolve_selector_choice(&read_line("Enter choice: "), &options, &profile.all_label) {
                SelectorChoice::All => break None,
                SelectorChoice::Value(v) => break Some(v),
                SelectorChoice::Invalid => {
                    println!("Invalid choice. Please enter 0-{}.", options.len())
                }
            }
        };
        st.selection.set(field, value);
    }
    println!();
}

fn handle_seasonal() -> Result<()> {
    let (analyzer, series, selection) = {
        let st = state();
        match (st.analyzer.clone(), st.series.clone()) {
            (Some(a), Some(s)) => (a, s, st.selection.clone()),
            _ => {
                println!("Error: No data loaded. Please load a file first (option 1).\n");
                return Ok(());
            }
        }
    };

    let analysis = analyzer.analyze(&series, &selection);
    let profile = analyzer.profile();
    let r = &analysis.report;

    let monthly = reports::month_rows(&r.monthly);
    let weekday = reports::weekday_rows(&r.weekday);
    let timeline = reports::timeline_rows(&r.timeline);
    let stats = reports::stat_rows(&r.stats, &profile.mapping.value, &profile.mapping.timestamp);

    output::preview_table("Average value by month", None, &monthly, 12);
    output::preview_table("Average value by weekday", None, &weekday, 7);
    output::preview_table("Daily totals", Some("first 10 days"), &timeline, 10);
    output::preview_table("Descriptive statistics", None, &stats, stats.len());

    output::write_csv(Path::new("monthly_summary.csv"), &monthly)?;
    output::write_csv(Path::new("weekday_summary.csv"), &weekday)?;
    output::write_csv(Path::new("daily_timeline.csv"), &timeline)?;
    output::write_csv(Path::new("descriptive_stats.csv"), &stats)?;

    let request = analyzer.commentary_request(&analysis.payload);
    output::write_json(Path::new("commentary_request.json"), &request.to_json())?;
    println!("(Tables exported to CSV; commentary request written to commentary_request.json)\n");
    Ok(())
}

fn handle_forecast() -> Result<()> {
    let (analyzer, series) = {
        let st = state();
        match (st.analyzer.clone(), st.series.clone()) {
            (Some(a), Some(s)) => (a, s),
            _ => {
                println!("Error: No data loaded. Please load a file first (option 1).\n");
                return Ok(());
            }
        }
    };

    let forecaster = FileForecaster::new(read_line("Forecast CSV (ds,yhat,yhat_lower,yhat_upper): "));
    let analysis = analyzer.forecast(&series, &forecaster)?;
    println!(
        "Forecast loaded: {} rows from {}",
        format_int(analysis.forecast.points.len() as u64),
        forecaster.path().display()
    );

    let request = analyzer.commentary_request(&analysis.payload);
    output::write_json(Path::new("forecast_commentary_request.json"), &request.to_json())?;
    println!("(Commentary request written to forecast_commentary_request.json)\n");
    Ok(())
}

fn report_error(err: PipelineError) {
    match err {
        PipelineError::Schema { .. } => eprintln!("{}. Please upload a file with the required columns.\n", err),
        other => eprintln!("Error: {}\n", other),
    }
}

fn main() {
    setup_logging();

    let api_key = match ApiKey::new(std::env::var(API_KEY_VAR).ok(), API_KEY_VAR) {
        Ok(key) => key,
        Err(e) => {
            eprintln!("{}. Set it in the environment before starting.", e);
            std::process::exit(1);
        }
    };
    tracing::info!("Seasonal report v{} starting", env!("CARGO_PKG_VERSION"));

    loop {
        println!("Select an option:");
        println!("[1] Load a file");
        println!("[2] Set filters");
        println!("[3] Generate seasonal report");
        println!("[4] Generate forecast commentary request");
        println!("[5] Exit\n");
        let result = match read_line("Enter choice: ").as_str() {
            "1" => handle_load(&api_key),
            "2" => {
                handle_filters();
                Ok(())
            }
            "3" => handle_seasonal(),
            "4" => handle_forecast(),
            "5" => {
                println!("Exiting the program.");
                break;
            }
            _ => {
                println!("Invalid choice. Please enter 1-5.\n");
                continue;
            }
        };
        if let Err(e) = result {
            report_error(e);
            continue;
        }
        if !prompt_back_to_menu() {
            println!("Exiting the program.");
            break;
        }
    }
}
