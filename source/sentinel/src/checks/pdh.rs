//! `check_pdh`: queries a Windows performance counter (spec.md §4.5),
//! gated to `Platform::Windows`. The real PDH API and the `perflib` crate
//! it was built on in the original implementation have no equivalent
//! outside Windows and outside this sample pack, so the counter sample is
//! fetched through the same mockable [`SystemUtility`] the NTP check uses
//! rather than a native PDH binding (see DESIGN.md). Per the open question
//! this resolves, the counter value is emitted raw, with no rate
//! computation applied.

use std::sync::Arc;

use super::dispatch::CheckArgs;
use super::registry::{Check, CheckDeclaration, CheckError, Platform};
use super::resolver::SystemUtility;
use super::result::{CheckResult, CheckState, Metric};

/// A parsed `\table(instance)\counter` query, ported from the original
/// implementation's `ParseQuery`.
pub struct PdhQuery {
    pub table: String,
    pub instance_filter: Option<String>,
    pub counter: String,
}

impl PdhQuery {
    pub fn parse(query: &str) -> Result<Self, CheckError> {
        let parts: Vec<&str> = query.split('\\').filter(|p| !p.is_empty()).collect();
        if parts.len() < 2 {
            return Err(CheckError::Invalid("query not in the correct format \\table\\counter".to_string()));
        }
        let (table, instance_filter) = match parts[0].split_once('(') {
            Some((name, rest)) => (name.to_string(), Some(rest.trim_end_matches(')').to_string())),
            None => (parts[0].to_string(), None),
        };
        Ok(Self { table, instance_filter, counter: parts[1].to_string() })
    }
}

pub struct CheckPdh {
    utility: Arc<dyn SystemUtility>,
}

impl CheckPdh {
    pub fn new(utility: Arc<dyn SystemUtility>) -> Self {
        Self { utility }
    }
}

impl Check for CheckPdh {
    fn declare(&self) -> CheckDeclaration {
        CheckDeclaration {
            name: "check_pdh",
            usage: "check_pdh <query>",
            description: "Queries a windows performance counter.",
            platform: Platform::Windows,
        }
    }

    fn run(&self, args: &CheckArgs) -> Result<CheckResult, CheckError> {
        let query = args
            .get("query")
            .or_else(|| args.positional(0))
            .map(str::to_string)
            .ok_or_else(|| CheckError::Invalid("perfcounter query required".to_string()))?;
        let parsed = PdhQuery::parse(&query)?;

        let raw = self.utility.capture("typeperf", &["-sc", "1", &query])?;
        let values = parse_typeperf_csv(&raw, parsed.instance_filter.as_deref());
        if values.is_empty() {
            return Ok(CheckResult::new(CheckState::Unknown, "query did not return any result."));
        }

        let metrics: Vec<Metric> = values
            .iter()
            .map(|(instance, value)| Metric::new(format!("\\{}({})\\{}", parsed.table, instance, parsed.counter), value.clone()))
            .collect();
        let list = values.iter().map(|(_, v)| v.clone()).collect::<Vec<_>>().join(", ");
        Ok(CheckResult::new(CheckState::Ok, list).with_metrics(metrics))
    }
}

/// Parses the two-line quoted CSV `typeperf -sc 1` emits: a header row of
/// `"\computer\object(instance)\counter"` fields and one data row of
/// values, pairing each header's instance name with its sampled value.
fn parse_typeperf_csv(raw: &str, instance_filter: Option<&str>) -> Vec<(String, String)> {
    let mut lines = raw.lines().filter(|l| !l.trim().is_empty());
    let Some(header) = lines.next() else { return Vec::new() };
    let Some(data) = lines.next() else { return Vec::new() };
    let header_fields = split_csv_quoted(header);
    let data_fields = split_csv_quoted(data);

    header_fields
        .into_iter()
        .skip(1)
        .zip(data_fields.into_iter().skip(1))
        .filter_map(|(h, v)| {
            let instance = h
                .rsplit_once('(')
                .map(|(_, rest)| rest.trim_end_matches(')').to_string())
                .unwrap_or_else(|| h.clone());
            match instance_filter {
                Some(filter) if filter != "*" && filter != instance => None,
                _ => Some((instance, v)),
            }
        })
        .collect()
}

fn split_csv_quoted(line: &str) -> Vec<String> {
    line.trim_matches('"').split("\",\"").map(str::to_string).collect()
}
