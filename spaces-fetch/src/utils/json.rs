//! JSON parsing/serialization helpers with consistent warning logs.

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub enum JsonContext<'a> {
    JobField {
        job_id: &'a str,
        field: &'static str,
    },
    JobLogLine {
        job_id: &'a str,
        line: usize,
    },
}

fn warn_parse_error(
    raw_len: usize,
    error: serde_json::Error,
    ctx: JsonContext<'_>,
    msg: &'static str,
) {
    match ctx {
        JsonContext::JobField { job_id, field } => {
            warn!(
                job_id = %job_id,
                field,
                raw_len,
                error = %error,
                "{msg}"
            );
        }
        JsonContext::JobLogLine { job_id, line } => {
            warn!(
                job_id = %job_id,
                line,
                raw_len,
                error = %error,
                "{msg}"
            );
        }
    }
}

fn warn_serialize_error(error: serde_json::Error, ctx: JsonContext<'_>, msg: &'static str) {
    match ctx {
        JsonContext::JobField { job_id, field } => {
            warn!(
                job_id = %job_id,
                field,
                error = %error,
                "{msg}"
            );
        }
        JsonContext::JobLogLine { job_id, line } => {
            warn!(
                job_id = %job_id,
                line,
                error = %error,
                "{msg}"
            );
        }
    }
}

pub fn parse_or_warn<T: DeserializeOwned>(
    raw: &str,
    ctx: JsonContext<'_>,
    msg: &'static str,
) -> Option<T> {
    match serde_json::from_str(raw) {
        Ok(parsed) => Some(parsed),
        Err(error) => {
            warn_parse_error(raw.len(), error, ctx, msg);
            None
        }
    }
}

pub fn to_string_or_fallback<T: Serialize + ?Sized>(
    value: &T,
    fallback: &'static str,
    ctx: JsonContext<'_>,
    msg: &'static str,
) -> String {
    match serde_json::to_string(value) {
        Ok(json) => json,
        Err(error) => {
            warn_serialize_error(error, ctx, msg);
            fallback.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_or_warn_returns_none_on_garbage() {
        let ctx = JsonContext::JobLogLine {
            job_id: "job_1",
            line: 3,
        };
        let parsed: Option<serde_json::Value> = parse_or_warn("{not json", ctx, "bad line");
        assert!(parsed.is_none());

        let parsed: Option<serde_json::Value> = parse_or_warn(r#"{"n":1}"#, ctx, "bad line");
        assert_eq!(parsed, Some(serde_json::json!({"n": 1})));
    }
}
