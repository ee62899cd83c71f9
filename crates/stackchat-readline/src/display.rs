//! Plain-text views of session state for the REPL.

use stackchat_core::backend::ModelDescriptor;
use stackchat_core::metrics::UsageStats;
use stackchat_core::session::Session;

/// Number of samples listed by `/stats`.
const RECENT_SAMPLES: usize = 5;

pub fn params_lines(session: &Session) -> Vec<String> {
    let params = session.params();
    vec![
        format!("model:       {}", session.active_model().unwrap_or("(none)")),
        format!("temperature: {:.2}", params.temperature()),
        format!("max_tokens:  {}", params.max_tokens()),
        format!("top_p:       {:.2}", params.top_p()),
        format!("system:      {}", session.system_prompt()),
        format!("started:     {}", session.created_at().format("%H:%M:%S")),
    ]
}

pub fn stats_lines(stats: &UsageStats) -> Vec<String> {
    if stats.request_count() == 0 {
        return vec!["No requests yet.".to_string()];
    }

    let mut lines = vec![
        format!("requests:         {}", stats.request_count()),
        format!("estimated tokens: {}", stats.total_estimated_tokens()),
    ];
    if let Some(last) = stats.last_sample() {
        lines.push(format!(
            "last response:    ~{} tokens in {:.2}s",
            last.estimated_tokens, last.elapsed_seconds
        ));
    }
    if let Some(average) = stats.average_tokens() {
        lines.push(format!("avg tokens:       {average:.1}"));
    }
    if let Some(elapsed) = stats.average_elapsed_seconds() {
        lines.push(format!("avg response:     {elapsed:.2}s"));
    }

    lines.push(String::new());
    lines.push(format!("{:<10} {:>7} {:>9}", "time", "tokens", "elapsed"));
    let skip = stats.samples().len().saturating_sub(RECENT_SAMPLES);
    for sample in stats.samples().iter().skip(skip) {
        lines.push(format!(
            "{:<10} {:>7} {:>8.2}s",
            sample.timestamp.format("%H:%M:%S"),
            sample.estimated_tokens,
            sample.elapsed_seconds
        ));
    }
    lines
}

pub fn model_lines(models: &[ModelDescriptor], active: Option<&str>) -> Vec<String> {
    if models.is_empty() {
        return vec!["No running models.".to_string()];
    }
    models
        .iter()
        .map(|model| {
            let marker = if Some(model.id.as_str()) == active { "*" } else { " " };
            format!("{marker} {}", model.id)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};
    use stackchat_core::metrics::UsageSample;
    use std::time::Duration;

    fn sample(text: &str, millis: u64) -> UsageSample {
        let at = Local.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        UsageSample::from_response(text, Duration::from_millis(millis), at)
    }

    #[test]
    fn test_stats_hide_average_for_single_sample() {
        let mut stats = UsageStats::new();
        stats.record(sample("Hello there friend", 500));

        let lines = stats_lines(&stats);

        assert!(lines.iter().any(|l| l.contains("requests:         1")));
        assert!(!lines.iter().any(|l| l.starts_with("avg tokens")));
        assert!(lines.contains(&"last response:    ~3 tokens in 0.50s".to_string()));
        assert!(lines.iter().any(|l| l.starts_with("09:30:00") && l.contains("0.50s")));
    }

    #[test]
    fn test_stats_list_recent_samples_only() {
        let mut stats = UsageStats::new();
        for _ in 0..7 {
            stats.record(sample("one two three four", 100));
        }

        let lines = stats_lines(&stats);

        assert!(lines.iter().any(|l| l.starts_with("avg tokens:       5.0")));
        let rows = lines.iter().filter(|l| l.starts_with("09:30:00")).count();
        assert_eq!(rows, RECENT_SAMPLES);
    }

    #[test]
    fn test_model_lines_mark_active() {
        let models = vec![
            ModelDescriptor::new("a", "RUNNING"),
            ModelDescriptor::new("b", "RUNNING"),
        ];

        assert_eq!(model_lines(&models, Some("b")), vec!["  a", "* b"]);
        assert_eq!(model_lines(&[], None), vec!["No running models."]);
    }

    #[test]
    fn test_params_lines_show_defaults() {
        let session = Session::new();
        let lines = params_lines(&session);
        assert_eq!(lines[0], "model:       (none)");
        assert_eq!(lines[2], "max_tokens:  500");
        assert_eq!(
            lines[5],
            format!("started:     {}", session.created_at().format("%H:%M:%S"))
        );
    }
}
