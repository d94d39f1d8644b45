use crate::tally::*;

use serde::{Deserialize, Serialize};

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct OutputSettings {
    #[serde(rename = "surveyName")]
    pub survey_name: String,
    #[serde(rename = "outputDirectory")]
    pub output_directory: Option<String>,
}

/// The header of the summary.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub survey: String,
    #[serde(rename = "surveyId")]
    pub survey_id: Option<u64>,
    #[serde(rename = "pageSize")]
    pub page_size: usize,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct FileSource {
    pub provider: String,
    #[serde(rename = "filePath")]
    pub file_path: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct TallyRules {
    #[serde(rename = "pageSize")]
    pub page_size: Option<usize>,
    #[serde(rename = "emptyLabel")]
    pub empty_label: Option<String>,
    #[serde(rename = "groupBy")]
    pub group_by: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct TallyConfig {
    #[serde(rename = "outputSettings", default)]
    pub output_settings: OutputSettings,
    #[serde(rename = "surveyId")]
    pub survey_id: Option<u64>,
    #[serde(rename = "surveyFile")]
    pub survey_file: Option<String>,
    #[serde(rename = "responseSources", default)]
    pub response_sources: Vec<FileSource>,
    #[serde(default)]
    pub rules: TallyRules,
}

pub fn read_config(path: &str) -> AppResult<TallyConfig> {
    let contents = fs::read_to_string(path).context(OpeningFileSnafu { path })?;
    let config: TallyConfig =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
    Ok(config)
}

pub fn read_summary(path: &str) -> AppResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningFileSnafu { path })?;
    debug!("read_summary: {} bytes from {}", contents.len(), path);
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
    Ok(js)
}

pub fn validate_rules(rules: &TallyRules) -> AppResult<AggregationRules> {
    let defaults = AggregationRules::DEFAULT_RULES;
    let page_size = match rules.page_size {
        Some(0) => whatever!("pageSize must be at least 1"),
        Some(n) => n,
        None => defaults.page_size,
    };
    let grouping = match rules.group_by.as_deref() {
        None | Some("questionId") => GroupingKey::QuestionId,
        Some("questionText") => GroupingKey::QuestionText,
        Some(x) => {
            whatever!(
                "Cannot use groupBy mode {:?}: expected questionId or questionText",
                x
            )
        }
    };
    Ok(AggregationRules {
        page_size,
        empty_label: match &rules.empty_label {
            Some(l) => l.clone().into(),
            None => defaults.empty_label,
        },
        grouping,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_with_defaults() {
        let js = r#"{"responseSources": [{"provider": "json", "filePath": "r.json"}]}"#;
        let config: TallyConfig = serde_json::from_str(js).unwrap();
        assert_eq!(config.response_sources.len(), 1);
        assert_eq!(config.output_settings.survey_name, "");
        let rules = validate_rules(&config.rules).unwrap();
        assert_eq!(rules, AggregationRules::DEFAULT_RULES);
    }

    #[test]
    fn rules_from_config() {
        let rules = TallyRules {
            page_size: Some(3),
            empty_label: Some("-".to_string()),
            group_by: Some("questionText".to_string()),
        };
        let r = validate_rules(&rules).unwrap();
        assert_eq!(r.page_size, 3);
        assert_eq!(r.empty_label, "-");
        assert_eq!(r.grouping, GroupingKey::QuestionText);

        let bad = TallyRules {
            group_by: Some("color".to_string()),
            ..TallyRules::default()
        };
        assert!(validate_rules(&bad).is_err());
    }
}
