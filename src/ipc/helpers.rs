use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::period::{parse_date, DateRange, Period};
use chrono::NaiveDate;
use rusqlite::Connection;

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> HandlerErr {
        HandlerErr {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_params(message: impl Into<String>) -> HandlerErr {
        HandlerErr::new("bad_params", message)
    }

    pub fn not_found(message: impl Into<String>) -> HandlerErr {
        HandlerErr::new("not_found", message)
    }

    pub fn query_failed(e: anyhow::Error) -> HandlerErr {
        HandlerErr::new("db_query_failed", format!("{e:#}"))
    }

    pub fn update_failed(e: anyhow::Error) -> HandlerErr {
        HandlerErr::new("db_update_failed", format!("{e:#}"))
    }

    pub fn render_failed(e: anyhow::Error) -> HandlerErr {
        HandlerErr::new("render_failed", format!("{e:#}"))
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

pub fn db_conn(state: &AppState) -> Result<&Connection, HandlerErr> {
    state
        .db
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

/// Runs `f` against the open database and wraps its outcome in the response envelope.
pub fn with_conn<F>(state: &AppState, req: &Request, f: F) -> serde_json::Value
where
    F: FnOnce(&Connection, &serde_json::Value) -> Result<serde_json::Value, HandlerErr>,
{
    let result = db_conn(state).and_then(|conn| f(conn, &req.params));
    match result {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

/// A required display name: present, a string, and not blank after trimming.
pub fn get_required_name(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    let raw = get_required_str(params, key)?;
    let name = raw.trim();
    if name.is_empty() {
        return Err(HandlerErr::bad_params(format!("{} must not be empty", key)));
    }
    Ok(name.to_string())
}

pub fn get_required_i64(params: &serde_json::Value, key: &str) -> Result<i64, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_optional_i64(params: &serde_json::Value, key: &str) -> Result<Option<i64>, HandlerErr> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be an integer", key))),
    }
}

pub fn get_required_bool(params: &serde_json::Value, key: &str) -> Result<bool, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_bool())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

fn parse_date_param(raw: &str, key: &str) -> Result<NaiveDate, HandlerErr> {
    parse_date(raw).ok_or_else(|| HandlerErr {
        code: "bad_params",
        message: format!("{} must be YYYY-MM-DD", key),
        details: Some(serde_json::json!({ key: raw })),
    })
}

pub fn get_required_date(params: &serde_json::Value, key: &str) -> Result<NaiveDate, HandlerErr> {
    parse_date_param(&get_required_str(params, key)?, key)
}

fn get_optional_date(params: &serde_json::Value, key: &str) -> Result<Option<NaiveDate>, HandlerErr> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => parse_date_param(s, key).map(Some),
        Some(_) => Err(HandlerErr::bad_params(format!("{} must be YYYY-MM-DD", key))),
    }
}

/// Reads the report window: either `period` (all, week, month; ending today) or the optional
/// inclusive bounds `dateFrom` / `dateTo`. Both forms at once is rejected.
pub fn get_date_range(params: &serde_json::Value, today: NaiveDate) -> Result<DateRange, HandlerErr> {
    let from = get_optional_date(params, "dateFrom")?;
    let to = get_optional_date(params, "dateTo")?;
    match params.get("period").and_then(|v| v.as_str()) {
        Some(raw) => {
            if from.is_some() || to.is_some() {
                return Err(HandlerErr::bad_params(
                    "period cannot be combined with dateFrom/dateTo",
                ));
            }
            let period = Period::parse(raw).ok_or_else(|| HandlerErr {
                code: "bad_params",
                message: "period must be all, week or month".to_string(),
                details: Some(serde_json::json!({ "period": raw })),
            })?;
            Ok(period.range_ending(today))
        }
        None => Ok(DateRange::new(from, to)),
    }
}

/// Writes a rendered artifact to `params.outPath`, creating missing parent directories.
pub fn write_output(params: &serde_json::Value, bytes: &[u8]) -> Result<serde_json::Value, HandlerErr> {
    let out_path = get_required_str(params, "outPath")?;
    let path = std::path::PathBuf::from(out_path.trim());
    if path.as_os_str().is_empty() {
        return Err(HandlerErr::bad_params("outPath must not be empty"));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| HandlerErr::new("io_failed", format!("{}: {e}", parent.display())))?;
    }
    std::fs::write(&path, bytes)
        .map_err(|e| HandlerErr::new("io_failed", format!("{}: {e}", path.display())))?;
    Ok(serde_json::json!({
        "path": path.to_string_lossy(),
        "bytes": bytes.len(),
    }))
}

pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn d(s: &str) -> NaiveDate {
        parse_date(s).expect("date")
    }

    #[test]
    fn range_from_explicit_bounds() {
        let r = get_date_range(&json!({ "dateFrom": "2024-11-08" }), d("2024-12-01"))
            .unwrap_or_else(|e| panic!("{}", e.message));
        assert_eq!(r, DateRange::new(Some(d("2024-11-08")), None));

        let r = get_date_range(&json!({}), d("2024-12-01")).unwrap_or_else(|e| panic!("{}", e.message));
        assert_eq!(r, DateRange::ALL);
    }

    #[test]
    fn range_from_period_ends_today() {
        let r = get_date_range(&json!({ "period": "week" }), d("2024-11-15"))
            .unwrap_or_else(|e| panic!("{}", e.message));
        assert_eq!(r, DateRange::new(Some(d("2024-11-08")), Some(d("2024-11-15"))));
    }

    #[test]
    fn malformed_dates_and_periods_are_bad_params() {
        for params in [
            json!({ "dateFrom": "15.11.2024" }),
            json!({ "dateTo": 20241115 }),
            json!({ "period": "year" }),
            json!({ "period": "week", "dateTo": "2024-11-15" }),
        ] {
            match get_date_range(&params, d("2024-11-15")) {
                Err(e) => assert_eq!(e.code, "bad_params", "{params}"),
                Ok(_) => panic!("expected bad_params for {params}"),
            }
        }
    }

    #[test]
    fn blank_names_are_rejected() {
        match get_required_name(&json!({ "name": "   " }), "name") {
            Err(e) => assert_eq!(e.code, "bad_params"),
            Ok(_) => panic!("blank name accepted"),
        }
        assert!(matches!(
            get_required_name(&json!({ "name": " Anna " }), "name").as_deref(),
            Ok("Anna")
        ));
    }
}
