//! Workflows joining the core operations with the store interfaces.
//!
//! Each function first resolves the caller's token and checks the role, so an
//! unauthorized caller never gets partial data.

use std::collections::HashSet;
use std::io::Read;

use log::{debug, info, warn};
use snafu::prelude::*;

use crate::aggregate::{aggregate_for_survey, respondent_history, Aggregation, ResponseRecord};
use crate::config::*;
use crate::definition::*;
use crate::store::*;
use crate::submission::{prepare_submission, AnswerSet};

fn require_role<B: TokenResolver + ?Sized>(
    backend: &B,
    token: &str,
    allowed: &[Role],
) -> SurveyResult<Identity> {
    let identity = backend.resolve_token(token)?;
    if !allowed.contains(&identity.role) {
        debug!("require_role: role {:?} not in {:?}", identity.role, allowed);
        return UnauthorizedSnafu.fail();
    }
    Ok(identity)
}

/// Validates and stores the answers of a respondent.
pub fn submit_response<B>(
    backend: &mut B,
    token: &str,
    survey_id: SurveyId,
    answers: &AnswerSet,
) -> SurveyResult<()>
where
    B: TokenResolver + SurveyStore + ResponseStore,
{
    let identity = require_role(backend, token, &[Role::Respondent])?;
    ensure!(identity.may_answer(survey_id), UnauthorizedSnafu);
    let survey = backend.load_survey(survey_id)?;
    let payload = prepare_submission(&survey, answers)?;
    backend.append_response(survey_id, token, &payload)?;
    info!(
        "submit_response: survey {}: {} answers stored",
        survey_id,
        payload.len()
    );
    Ok(())
}

/// The aggregated results of a survey, for observers and creators.
pub fn survey_results<B>(
    backend: &B,
    token: &str,
    survey_id: SurveyId,
    rules: &AggregationRules,
) -> SurveyResult<Aggregation>
where
    B: TokenResolver + SurveyStore + ResponseStore,
{
    require_role(backend, token, &[Role::Observer, Role::Creator])?;
    let survey = backend.load_survey(survey_id)?;
    let records = backend.load_response_records(survey_id)?;
    Ok(aggregate_for_survey(&survey, &records, rules))
}

/// The records the caller submitted to a survey.
pub fn my_responses<B>(backend: &B, token: &str, survey_id: SurveyId) -> SurveyResult<Vec<ResponseRecord>>
where
    B: TokenResolver + ResponseStore,
{
    let identity = require_role(backend, token, &[Role::Respondent])?;
    let email = identity.email.context(UnauthorizedSnafu)?;
    let records = backend.load_response_records(survey_id)?;
    Ok(respondent_history(&records, &email)
        .into_iter()
        .cloned()
        .collect())
}

/// Reads a contact list: one address per row, in the first column.
///
/// A leading `email` header, blank rows and repeated addresses (ignoring case)
/// are skipped. Entries without `@` are rejected with a warning.
pub fn parse_contact_list<R: Read>(reader: R) -> SurveyResult<Vec<String>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut seen: HashSet<String> = HashSet::new();
    let mut emails: Vec<String> = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let record = result.context(CsvSnafu)?;
        let entry = record.get(0).unwrap_or("");
        if entry.is_empty() {
            continue;
        }
        if idx == 0 && entry.eq_ignore_ascii_case("email") {
            continue;
        }
        if !entry.contains('@') {
            warn!("parse_contact_list: line {}: not an address: {:?}", idx + 1, entry);
            continue;
        }
        if seen.insert(entry.to_lowercase()) {
            emails.push(entry.to_string());
        }
    }
    debug!("parse_contact_list: {} addresses", emails.len());
    Ok(emails)
}

/// Invites every address of a contact list to a survey. Returns the number of
/// new invitations.
pub fn invite_contacts<B, R>(
    backend: &mut B,
    token: &str,
    survey_id: SurveyId,
    contacts: R,
) -> SurveyResult<usize>
where
    B: TokenResolver + Inviter,
    R: Read,
{
    require_role(backend, token, &[Role::Creator])?;
    let emails = parse_contact_list(contacts)?;
    backend.bulk_invite(survey_id, &emails)
}
