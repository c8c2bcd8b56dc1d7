//! `calrange query`: events overlapping a window.

use std::fmt::Write as _;

use chrono::{DateTime, Local, Utc};
use tracing::debug;

use calrange_core::{AnchorZone, EventRecord, TimeNormalizer};
use calrange_server::{CacheStats, QueryService};

use crate::cli::QueryArgs;
use crate::error::{CliError, CliResult};

/// Reads a command-line time: Unix seconds, `YYYY-MM-DD` or RFC 3339.
///
/// Dates resolve to midnight in the normalizer's anchor zone.
pub fn parse_time(raw: &str, normalizer: &TimeNormalizer) -> CliResult<i64> {
    let trimmed = raw.trim();
    if let Ok(seconds) = trimmed.parse::<i64>() {
        return Ok(seconds);
    }
    normalizer
        .parse(trimmed)
        .map(|time| time.timestamp)
        .map_err(|_| CliError::InvalidTime {
            value: raw.to_string(),
        })
}

/// Runs the query and renders its output.
pub async fn execute(
    service: &QueryService,
    args: &QueryArgs,
    normalizer: &TimeNormalizer,
) -> CliResult<String> {
    let since = parse_time(&args.since, normalizer)?;
    let until = parse_time(&args.until, normalizer)?;
    debug!(since, until, force_reload = args.force_reload, "Running query");

    let records = service.get_events(since, until, args.force_reload).await?;
    if args.json {
        let mut out = serde_json::to_string_pretty(&records)?;
        out.push('\n');
        Ok(out)
    } else {
        Ok(render_text(&records, normalizer.zone()))
    }
}

pub async fn run(
    service: &QueryService,
    args: &QueryArgs,
    normalizer: &TimeNormalizer,
) -> CliResult<()> {
    let out = execute(service, args, normalizer).await?;
    print!("{}", out);

    if args.stats {
        eprint!("{}", render_stats(&service.stats().await, args.json)?);
    }
    Ok(())
}

/// Cache statistics as one text line, or as a JSON object.
pub fn render_stats(stats: &CacheStats, json: bool) -> CliResult<String> {
    if json {
        let mut out = serde_json::to_string(stats)?;
        out.push('\n');
        return Ok(out);
    }
    Ok(format!(
        "cache: {}/{} entries, {} hits, {} rebuilds, {} coalesced, {} failed\n",
        stats.entries,
        stats.capacity,
        stats.hits,
        stats.rebuilds,
        stats.coalesced,
        stats.failed_rebuilds
    ))
}

/// One line per record: `start - end  summary`.
pub fn render_text(records: &[EventRecord], zone: AnchorZone) -> String {
    if records.is_empty() {
        return "No events.\n".to_string();
    }

    let mut out = String::new();
    for record in records {
        let _ = writeln!(
            out,
            "{} - {}  {}",
            format_timestamp(record.start, zone, record.all_day),
            format_timestamp(record.end, zone, record.all_day),
            record.summary
        );
    }
    out
}

fn format_timestamp(timestamp: i64, zone: AnchorZone, all_day: bool) -> String {
    let Some(instant) = DateTime::<Utc>::from_timestamp(timestamp, 0) else {
        return timestamp.to_string();
    };
    let format = if all_day { "%Y-%m-%d" } else { "%Y-%m-%d %H:%M" };
    match zone {
        AnchorZone::Local => instant.with_timezone(&Local).format(format).to_string(),
        AnchorZone::Fixed(offset) => instant.with_timezone(&offset).format(format).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Arc;

    use calrange_providers::FileClient;
    use calrange_server::ServiceConfig;
    use chrono::FixedOffset;
    use tempfile::NamedTempFile;

    const FIXTURE: &str = r#"{
        "calendars": [
            {
                "name": "Work",
                "feed": "feed://work",
                "events": [
                    {"id": "1", "title": "Standup", "spans": [{"start": "2024-01-03T09:00:00Z", "end": "2024-01-03T09:15:00Z"}]},
                    {"id": "2", "title": "Last year", "spans": [{"start": "2023-01-03T09:00:00Z", "end": "2023-01-03T09:15:00Z"}]},
                    {"id": "3", "title": "Broken", "spans": [{"start": "soon", "end": "later"}]}
                ]
            },
            {
                "name": "Holidays",
                "feed": "feed://holidays",
                "events": [
                    {"id": "h", "title": "Day off", "when": [{"start": "2024-01-04", "end": "2024-01-05"}]}
                ]
            }
        ]
    }"#;

    fn utc() -> TimeNormalizer {
        TimeNormalizer::with_fixed_offset(FixedOffset::east_opt(0).unwrap())
    }

    fn args(since: &str, until: &str, json: bool) -> QueryArgs {
        QueryArgs {
            since: since.to_string(),
            until: until.to_string(),
            force_reload: false,
            json,
            stats: false,
        }
    }

    async fn service(fixture: &NamedTempFile) -> QueryService {
        let client = Arc::new(FileClient::new(fixture.path()));
        QueryService::discover(client, ServiceConfig::new().with_normalizer(utc()))
            .await
            .unwrap()
    }

    fn fixture() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(FIXTURE.as_bytes()).unwrap();
        file
    }

    mod times {
        use super::*;

        #[test]
        fn unix_seconds() {
            assert_eq!(parse_time("1704240000", &utc()).unwrap(), 1_704_240_000);
            assert_eq!(parse_time("-60", &utc()).unwrap(), -60);
        }

        #[test]
        fn date_is_midnight_in_anchor_zone() {
            assert_eq!(parse_time("2024-01-03", &utc()).unwrap(), 1_704_240_000);

            let plus_two = TimeNormalizer::with_fixed_offset(FixedOffset::east_opt(7_200).unwrap());
            assert_eq!(
                parse_time("2024-01-03", &plus_two).unwrap(),
                1_704_240_000 - 7_200
            );
        }

        #[test]
        fn rfc3339() {
            assert_eq!(
                parse_time("2024-01-03T01:00:00+01:00", &utc()).unwrap(),
                1_704_240_000
            );
        }

        #[test]
        fn garbage() {
            let err = parse_time("tomorrow", &utc()).unwrap_err();
            assert!(matches!(err, CliError::InvalidTime { ref value } if value == "tomorrow"));
        }
    }

    mod output {
        use super::*;

        #[tokio::test]
        async fn text_lists_overlapping_events() {
            let file = fixture();
            let service = service(&file).await;

            let out = execute(&service, &args("2024-01-03", "2024-01-10", false), &utc())
                .await
                .unwrap();
            assert_eq!(
                out,
                "2024-01-03 09:00 - 2024-01-03 09:15  Standup\n\
                 2024-01-04 - 2024-01-05  Day off\n"
            );
        }

        #[tokio::test]
        async fn json_records() {
            let file = fixture();
            let service = service(&file).await;

            let out = execute(&service, &args("2024-01-03", "2024-01-04", true), &utc())
                .await
                .unwrap();
            let records: Vec<EventRecord> = serde_json::from_str(&out).unwrap();
            assert_eq!(records.len(), 1);
            assert_eq!(records[0].summary, "Standup");
            assert_eq!(records[0].start, 1_704_272_400);
        }

        #[tokio::test]
        async fn empty_window_output() {
            let file = fixture();
            let service = service(&file).await;

            let out = execute(&service, &args("2025-01-01", "2025-01-02", false), &utc())
                .await
                .unwrap();
            assert_eq!(out, "No events.\n");
        }

        #[tokio::test]
        async fn stats_after_a_hit() {
            let file = fixture();
            let service = service(&file).await;
            let query = args("2024-01-03", "2024-01-04", false);
            execute(&service, &query, &utc()).await.unwrap();
            execute(&service, &query, &utc()).await.unwrap();

            let stats = service.stats().await;
            assert_eq!(
                render_stats(&stats, false).unwrap(),
                "cache: 1/64 entries, 1 hits, 1 rebuilds, 0 coalesced, 0 failed\n"
            );

            let json: serde_json::Value =
                serde_json::from_str(&render_stats(&stats, true).unwrap()).unwrap();
            assert_eq!(json["entries"], 1);
            assert_eq!(json["hits"], 1);
            assert_eq!(json["rebuilds"], 1);
            assert_eq!(json["in_flight"], 0);
        }

        #[tokio::test]
        async fn inverted_window_is_an_error() {
            let file = fixture();
            let service = service(&file).await;

            let err = execute(&service, &args("2024-01-10", "2024-01-03", false), &utc())
                .await
                .unwrap_err();
            assert!(err.to_string().contains("Invalid window"));
        }
    }
}
