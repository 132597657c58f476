//! Subscriber setup. Logs always go to stderr: stdout carries CLI answers and
//! the MCP stdio stream.

pub(crate) const LOG_ENV: &str = "ANSWERPIPE_LOG";
pub(crate) const LOG_FORMAT_ENV: &str = "ANSWERPIPE_LOG_FORMAT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    pub(crate) fn parse(s: Option<&str>) -> Self {
        match s.map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if v == "json" => Self::Json,
            _ => Self::Text,
        }
    }
}

/// `ANSWERPIPE_LOG`, then `RUST_LOG`, then a quiet default.
pub(crate) fn filter_directive(explicit: Option<String>, verbose: bool) -> String {
    match explicit {
        Some(d) => d,
        None if verbose => "debug".to_string(),
        None => "warn".to_string(),
    }
}

pub(crate) fn init(verbose: bool) {
    let explicit = crate::env_nonempty(LOG_ENV).or_else(|| crate::env_nonempty("RUST_LOG"));
    let directive = filter_directive(explicit, verbose);
    let filter = tracing_subscriber::EnvFilter::try_new(&directive)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);
    let res = match LogFormat::parse(crate::env_nonempty(LOG_FORMAT_ENV).as_deref()) {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.with_ansi(false).try_init(),
    };
    if let Err(e) = res {
        eprintln!("answerpipe: logging disabled: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_filter_wins_over_verbose() {
        assert_eq!(
            filter_directive(Some("answerpipe=trace".into()), false),
            "answerpipe=trace"
        );
        assert_eq!(filter_directive(None, true), "debug");
        assert_eq!(filter_directive(None, false), "warn");
    }

    #[test]
    fn only_json_selects_json() {
        assert_eq!(LogFormat::parse(Some(" JSON ")), LogFormat::Json);
        assert_eq!(LogFormat::parse(Some("pretty")), LogFormat::Text);
        assert_eq!(LogFormat::parse(None), LogFormat::Text);
    }
}
