use crate::config::launch::LaunchParams;
use crate::core::board::BoardSnapshot;
use crate::domain::model::SyntheticUser;
use crate::utils::error::Result;
use serde::Serialize;
use std::fmt::Write;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonReport<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    settings: Option<&'a LaunchParams>,
    flag_key: &'a str,
    generation: u64,
    tally: &'a crate::domain::model::EvaluationTally,
    users: &'a [SyntheticUser],
}

fn feature_label(user: &SyntheticUser) -> &'static str {
    if user.evaluation_failed {
        return "FAILED";
    }
    match (user.is_pending(), user.feature_enabled) {
        (true, _) => "pending",
        (false, true) => "ON",
        (false, false) => "OFF",
    }
}

pub fn render_table(params: &LaunchParams, flag_key: &str, snapshot: &BoardSnapshot) -> String {
    let mut out = String::new();

    // hideControls 時只顯示結果
    if !params.hide_controls {
        let _ = writeln!(
            out,
            "Environment: {}    Config: {}",
            params.environment.as_deref().unwrap_or("-"),
            params.config_name.as_deref().unwrap_or("-")
        );
        match &params.flag_url {
            Some(url) => {
                let _ = writeln!(out, "Feature flag: {} ({})", flag_key, url);
            }
            None => {
                let _ = writeln!(out, "Feature flag: {}", flag_key);
            }
        }
        let _ = writeln!(out, "{}", "-".repeat(78));
    }

    let email_width = snapshot
        .users
        .iter()
        .map(|u| u.user.email.len())
        .max()
        .unwrap_or(0)
        .max("EMAIL".len());

    let _ = writeln!(
        out,
        "{:<width$}  {:<7}  {:<10}  {:<10}  {}",
        "EMAIL",
        "COUNTRY",
        "TIER",
        "TENANT",
        "FEATURE",
        width = email_width
    );
    for synthetic in &snapshot.users {
        let user = &synthetic.user;
        let _ = writeln!(
            out,
            "{:<width$}  {:<7}  {:<10}  {:<10}  {}",
            user.email,
            user.country,
            user.custom.subscription_type,
            user.custom.tenant,
            feature_label(synthetic),
            width = email_width
        );
    }

    let tally = &snapshot.tally;
    let _ = writeln!(
        out,
        "ON: {}  OFF: {}  FAILED: {}  PENDING: {}  (users: {})",
        tally.enabled,
        tally.disabled,
        tally.failed,
        tally.pending,
        snapshot.users.len()
    );

    out
}

pub fn render_json(params: &LaunchParams, flag_key: &str, snapshot: &BoardSnapshot) -> Result<String> {
    let report = JsonReport {
        settings: (!params.hide_controls).then_some(params),
        flag_key,
        generation: snapshot.generation,
        tally: &snapshot.tally,
        users: &snapshot.users,
    };
    Ok(serde_json::to_string_pretty(&report)?)
}
