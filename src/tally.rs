use log::{debug, info, warn};

use snafu::{prelude::*, Snafu};
use survey_engine::aggregate::{ChoiceTally, GroupKey, GroupStats, TextTally};
use survey_engine::export::{export_summary_csv, results_file_name, write_raw_csv};
use survey_engine::*;

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::TallyArgs;
use crate::tally::config_reader::*;
use crate::tally::io_common::resolve_path;

pub mod config_reader;
pub mod io_common;
pub mod io_csv;
pub mod io_json;

#[derive(Debug, Snafu)]
pub enum AppError {
    #[snafu(display("Error opening file {path}"))]
    OpeningFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error writing file {path}"))]
    WritingFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON file {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error serializing JSON"))]
    SerializingJson { source: serde_json::Error },
    #[snafu(display("Error opening CSV file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error parsing line {lineno} of CSV file {path}"))]
    CsvLineParse {
        source: csv::Error,
        path: String,
        lineno: usize,
    },
    #[snafu(display("Survey error"))]
    Survey { source: SurveyError },
    #[snafu(display("The configuration file has no parent directory"))]
    MissingParentDir {},

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type AppResult<T> = Result<T, AppError>;

fn text_group_to_json(
    g: &QuestionGroup,
    tally: &TextTally,
    rules: &AggregationRules,
    page: usize,
) -> JSValue {
    let p = tally.page(page, rules.page_size);
    let entries: Vec<JSValue> = p
        .entries
        .iter()
        .map(|e| json!({"answer": e.answer, "count": e.count}))
        .collect();
    json!({
        "question": g.label,
        "kind": g.kind(),
        "responses": g.responses,
        "distinctAnswers": tally.distinct_count(),
        "page": p.index,
        "pageCount": p.page_count,
        "tally": entries,
    })
}

fn round_percentage(share: f64) -> f64 {
    (share * 1000.0).round() / 10.0
}

fn choice_group_to_json(g: &QuestionGroup, tally: &ChoiceTally) -> JSValue {
    let entries: Vec<JSValue> = tally
        .entries()
        .iter()
        .map(|e| {
            json!({
                "answer": e.choice,
                "count": e.count,
                "percentage": round_percentage(tally.share(e)),
            })
        })
        .collect();
    json!({
        "question": g.label,
        "kind": g.kind(),
        "responses": g.responses,
        "tally": entries,
    })
}

fn summary_to_json(s: &SurveySummary) -> JSValue {
    json!({
        "uniqueRespondents": s.unique_respondents,
        "totalRecords": s.total_records,
        "firstResponseAt": s.first_response_at.map(|t| t.to_rfc3339()),
        "lastResponseAt": s.last_response_at.map(|t| t.to_rfc3339()),
    })
}

fn build_summary_js(
    config: &OutputConfig,
    agg: &Aggregation,
    rules: &AggregationRules,
    page: usize,
) -> JSValue {
    let results: Vec<JSValue> = agg
        .groups
        .iter()
        .map(|g| {
            let mut js = match &g.stats {
                GroupStats::Text(t) => text_group_to_json(g, t, rules, page),
                GroupStats::Choice(c) => choice_group_to_json(g, c),
            };
            if let GroupKey::Id(id) = g.key {
                js["questionId"] = json!(id);
            }
            js
        })
        .collect();
    json!({
        "config": config,
        "summary": agg.summary.as_ref().map(summary_to_json),
        "results": results,
    })
}

fn read_survey(path: &str) -> AppResult<Survey> {
    let contents = fs::read_to_string(path).context(OpeningFileSnafu { path })?;
    let survey: Survey =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
    info!(
        "read_survey: {:?} with {} questions",
        survey.title(),
        survey.len()
    );
    Ok(survey)
}

fn read_records(provider: &str, path: &Path) -> AppResult<Vec<ResponseRecord>> {
    let p = match path.to_str() {
        Some(p) => p,
        None => whatever!("Path {:?} is not valid UTF-8", path),
    };
    match provider {
        "json" => io_json::read_json_records(p),
        "csv" => io_csv::read_csv_records(p),
        x => whatever!("Provider {:?} not implemented: expected json or csv", x),
    }
}

fn write_file(path: &Path, contents: &str) -> AppResult<()> {
    fs::write(path, contents).context(WritingFileSnafu {
        path: path.display().to_string(),
    })
}

fn write_exports(
    dir: &Path,
    survey_id: Option<SurveyId>,
    records: &[ResponseRecord],
    agg: &Aggregation,
) -> AppResult<()> {
    fs::create_dir_all(dir).context(WritingFileSnafu {
        path: dir.display().to_string(),
    })?;
    let (raw_name, summary_name) = match survey_id {
        Some(id) => (results_file_name(id), format!("summary_survey_{}.csv", id)),
        None => ("results.csv".to_string(), "summary.csv".to_string()),
    };
    let raw_path = dir.join(&raw_name);
    let raw_file = fs::File::create(&raw_path).context(WritingFileSnafu {
        path: raw_path.display().to_string(),
    })?;
    write_raw_csv(records, raw_file).context(SurveySnafu)?;
    let summary = export_summary_csv(agg).context(SurveySnafu)?;
    write_file(&dir.join(&summary_name), &summary)?;
    info!("write_exports: wrote {} and {} in {:?}", raw_name, summary_name, dir);
    Ok(())
}

pub fn run_tally(args: &TallyArgs) -> AppResult<()> {
    let (config, root) = match &args.config {
        Some(config_path) => {
            let config = read_config(config_path)?;
            let root = Path::new(config_path)
                .parent()
                .context(MissingParentDirSnafu {})?
                .to_path_buf();
            (config, root)
        }
        None => (TallyConfig::default(), PathBuf::from(".")),
    };
    debug!("run_tally: config: {:?}", config);

    let mut rules = validate_rules(&config.rules)?;
    if let Some(page_size) = args.page_size {
        if page_size == 0 {
            whatever!("--page-size must be at least 1");
        }
        rules.page_size = page_size;
    }

    // Command line values are relative to the working directory, values of the
    // configuration to the configuration file.
    let sources: Vec<(String, PathBuf)> = match &args.input {
        Some(input) => vec![(
            args.input_type.clone().unwrap_or_else(|| "json".to_string()),
            PathBuf::from(input),
        )],
        None => config
            .response_sources
            .iter()
            .map(|src| (src.provider.clone(), resolve_path(&root, &src.file_path)))
            .collect(),
    };
    if sources.is_empty() {
        whatever!("No response source: use --input or responseSources in the configuration");
    }

    let survey_path: Option<PathBuf> = match (&args.survey, &config.survey_file) {
        (Some(p), _) => Some(PathBuf::from(p)),
        (None, Some(p)) => Some(resolve_path(&root, p)),
        (None, None) => None,
    };
    let survey = match &survey_path {
        Some(p) => Some(read_survey(&p.display().to_string())?),
        None => None,
    };

    let mut records: Vec<ResponseRecord> = Vec::new();
    for (provider, path) in sources.iter() {
        let mut file_records = read_records(provider, path)?;
        info!("run_tally: {} records from {:?}", file_records.len(), path);
        records.append(&mut file_records);
    }

    let agg = match &survey {
        Some(s) => aggregate_for_survey(s, &records, &rules),
        None => aggregate(&records, &rules),
    };
    if agg.is_empty() {
        warn!("run_tally: no responses yet");
    }

    let survey_id: Option<SurveyId> = args
        .survey_id
        .or(config.survey_id)
        .map(SurveyId)
        .or_else(|| survey.as_ref().and_then(|s| s.id()));
    let survey_name = if !config.output_settings.survey_name.is_empty() {
        config.output_settings.survey_name.clone()
    } else {
        survey
            .as_ref()
            .map(|s| s.title().to_string())
            .unwrap_or_default()
    };
    let output_config = OutputConfig {
        survey: survey_name,
        survey_id: survey_id.map(|id| id.0),
        page_size: rules.page_size,
    };

    let result_js = build_summary_js(&output_config, &agg, &rules, args.page.unwrap_or(0));
    let pretty_js_stats = serde_json::to_string_pretty(&result_js).context(SerializingJsonSnafu)?;

    match args.out.as_deref() {
        None | Some("stdout") => println!("{}", pretty_js_stats),
        Some(out) => write_file(Path::new(out), &pretty_js_stats)?,
    }

    let export_dir: Option<PathBuf> = match (&args.export_dir, &config.output_settings.output_directory) {
        (Some(d), _) => Some(PathBuf::from(d)),
        (None, Some(d)) => Some(resolve_path(&root, d)),
        (None, None) => None,
    };
    if let Some(dir) = export_dir {
        write_exports(&dir, survey_id, &records, &agg)?;
    }

    // The reference summary, if provided for comparison
    if let Some(summary_p) = &args.reference {
        let summary_ref = read_summary(summary_p)?;
        let pretty_js_summary_ref =
            serde_json::to_string_pretty(&summary_ref).context(SerializingJsonSnafu)?;
        if pretty_js_summary_ref != pretty_js_stats {
            warn!("Found differences with the reference string");
            print_diff(
                pretty_js_summary_ref.as_str(),
                pretty_js_stats.as_ref(),
                "\n",
            );
            whatever!("Difference detected between calculated summary and reference summary")
        }
    }

    Ok(())
}

/// Prints the validated form of a survey definition.
pub fn run_validate(survey_path: &str) -> AppResult<()> {
    let survey = read_survey(survey_path)?;
    let pretty = serde_json::to_string_pretty(&survey).context(SerializingJsonSnafu)?;
    println!("{}", pretty);
    Ok(())
}

/// Prints the payload that would be stored for a set of answers.
pub fn run_check(survey_path: &str, answers_path: &str) -> AppResult<()> {
    let survey = read_survey(survey_path)?;
    let contents = fs::read_to_string(answers_path).context(OpeningFileSnafu {
        path: answers_path,
    })?;
    let answers: AnswerSet =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {
            path: answers_path,
        })?;
    let payload = prepare_submission(&survey, &answers).context(SurveySnafu)?;
    let pretty = serde_json::to_string_pretty(&payload).context(SerializingJsonSnafu)?;
    println!("{}", pretty);
    Ok(())
}

#[cfg(test)]
fn run_tally_test(test_name: &str, config_lpath: &str, summary_lpath: &str) {
    let _ = env_logger::builder().is_test(true).try_init();
    let test_dir = format!("{}/tests/data", env!("CARGO_MANIFEST_DIR"));
    info!("Running test {}", test_name);
    let args = TallyArgs {
        config: Some(format!("{}/{}/{}", test_dir, test_name, config_lpath)),
        reference: Some(format!("{}/{}/{}", test_dir, test_name, summary_lpath)),
        out: None,
        input: None,
        input_type: None,
        survey: None,
        survey_id: None,
        export_dir: None,
        page: None,
        page_size: None,
    };
    if let Err(e) = run_tally(&args) {
        panic!("test {} failed: {}", test_name, e);
    }
}

#[cfg(test)]
pub fn test_wrapper(test_name: &str) {
    run_tally_test(
        test_name,
        format!("{}_config.json", test_name).as_str(),
        format!("{}_expected_summary.json", test_name).as_str(),
    )
}
