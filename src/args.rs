use clap::{Parser, Subcommand};

/// This is a survey tabulation program.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Command,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, global = true, takes_value = false)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Aggregates the responses of a survey.
    Tally(TallyArgs),

    /// Checks a survey definition and prints it in its validated form.
    Validate {
        /// (file path) The survey definition in JSON format.
        #[clap(short, long, value_parser)]
        survey: String,
    },

    /// Checks the answers of one respondent against a survey.
    Check {
        /// (file path) The survey definition in JSON format.
        #[clap(short, long, value_parser)]
        survey: String,
        /// (file path) The answers in JSON format, keyed by question id.
        #[clap(short, long, value_parser)]
        answers: String,
    },
}

#[derive(clap::Args, Debug, Clone)]
pub struct TallyArgs {
    /// (file path, optional) The file containing the tally configuration in JSON format.
    /// See the manual of survey_engine for the format.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (file path) A reference file containing the summary of a survey in JSON format. If provided,
    /// surveytally will check that the computed summary matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the summary will be written in JSON format to the given
    /// location.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path or empty) If specified, the responses are read from this file. Setting this option
    /// overrides the sources of the configuration.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (default json) The type of the input: json or csv.
    #[clap(long, value_parser)]
    pub input_type: Option<String>,

    /// (file path, optional) The survey definition. With it, the results follow the order of the
    /// survey and list every declared choice.
    #[clap(long, value_parser)]
    pub survey: Option<String>,

    /// (number, optional) The identifier of the survey, used to name the CSV exports.
    #[clap(long, value_parser)]
    pub survey_id: Option<u64>,

    /// (directory, optional) If specified, the raw and summary CSV exports are written there.
    #[clap(long, value_parser)]
    pub export_dir: Option<String>,

    /// (default 0) The page of the text answers to show.
    #[clap(long, value_parser)]
    pub page: Option<usize>,

    /// (default 7) The number of text answers per page.
    #[clap(long, value_parser)]
    pub page_size: Option<usize>,
}
