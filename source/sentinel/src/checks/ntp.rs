//! `check_ntp_offset`: compares the local clock offset against a
//! configured NTP/chrony/w32tm/sntp source (spec.md §4.5). Dispatches on a
//! `source` argument to one of five stdout parsers, grounded on the
//! fixtures in `check_ntp_offset_linux_test.go` of the original
//! implementation. Default thresholds are ±50ms warn / ±100ms crit on the
//! `offset` metric, overridable via `warn=`/`crit=` range expressions.

use std::sync::Arc;

use super::dispatch::{CheckArgs, ThresholdRange};
use super::registry::{Check, CheckDeclaration, CheckError, Platform};
use super::resolver::SystemUtility;
use super::result::{CheckResult, CheckState, Metric};

const DEFAULT_WARN: &str = "-50:50";
const DEFAULT_CRIT: &str = "-100:100";

struct NtpReading {
    offset_ms: f64,
    source_desc: String,
    stratum: Option<i64>,
    jitter_ms: Option<f64>,
}

pub struct CheckNtpOffset {
    utility: Arc<dyn SystemUtility>,
}

impl CheckNtpOffset {
    pub fn new(utility: Arc<dyn SystemUtility>) -> Self {
        Self { utility }
    }

    fn read(&self, source: &str) -> Result<NtpReading, CheckError> {
        match source {
            "timedatectl" => parse_timedatectl(&self.utility.capture("timedatectl", &["timesync-status"])?),
            "chronyc" => parse_chronyc(&self.utility.capture("chronyc", &["tracking"])?),
            "ntpq" => parse_ntpq(&self.utility.capture("ntpq", &["-p"])?),
            "w32tm" => parse_w32tm(&self.utility.capture("w32tm.exe", &["/query", "/status", "/verbose"])?),
            "osx" => {
                let systemsetup = self.utility.capture("systemsetup", &["-getusingnetworktime"])?;
                let sntp = self.utility.capture("sntp", &["-sS", "127.0.0.1"])?;
                parse_osx(&systemsetup, &sntp)
            }
            "auto" => self.read("timedatectl").or_else(|_| self.read("chronyc")).or_else(|_| self.read("ntpq")),
            other => Err(CheckError::Invalid(format!("unknown ntp source {other:?}"))),
        }
    }
}

impl Check for CheckNtpOffset {
    fn declare(&self) -> CheckDeclaration {
        CheckDeclaration {
            name: "check_ntp_offset",
            usage: "check_ntp_offset [source=auto|timedatectl|chronyc|ntpq|w32tm|osx] [warn=RANGE] [crit=RANGE]",
            description: "Checks the clock offset against the configured NTP source.",
            platform: Platform::All,
        }
    }

    fn run(&self, args: &CheckArgs) -> Result<CheckResult, CheckError> {
        let source = args.get("source").unwrap_or("auto");
        let warn = args.get("warn").and_then(ThresholdRange::parse).unwrap_or_else(|| ThresholdRange::parse(DEFAULT_WARN).expect("default warn range parses"));
        let crit = args.get("crit").and_then(ThresholdRange::parse).unwrap_or_else(|| ThresholdRange::parse(DEFAULT_CRIT).expect("default crit range parses"));

        let reading = match self.read(source) {
            Ok(reading) => reading,
            Err(CheckError::Invalid(message)) => return Ok(CheckResult::new(CheckState::Critical, message)),
            Err(other) => return Err(other),
        };

        let mut metrics =
            vec![Metric::new("offset", format_exact(reading.offset_ms)).uom("ms").warn(warn.as_str()).crit(crit.as_str())];
        if let Some(stratum) = reading.stratum {
            metrics.push(Metric::new("stratum", stratum.to_string()).min("0"));
        }
        if let Some(jitter_ms) = reading.jitter_ms {
            metrics.push(Metric::new("jitter", format_exact(jitter_ms)).uom("ms").min("0"));
        }

        let state = if crit.breaches(reading.offset_ms) {
            CheckState::Critical
        } else if warn.breaches(reading.offset_ms) {
            CheckState::Warning
        } else {
            CheckState::Ok
        };

        let message = if reading.source_desc.is_empty() {
            format!("offset {}ms", display_round(reading.offset_ms))
        } else {
            format!("offset {}ms from {}", display_round(reading.offset_ms), reading.source_desc)
        };

        Ok(CheckResult::new(state, message).with_metrics(metrics))
    }
}

/// Renders the human-readable offset: fewer decimals as the magnitude
/// grows, matching the original implementation's fixture output.
fn display_round(value: f64) -> String {
    let abs = value.abs();
    let decimals = if abs >= 100.0 {
        0
    } else if abs >= 10.0 {
        1
    } else {
        3
    };
    let s = format!("{value:.decimals$}");
    if decimals == 0 {
        s
    } else {
        let s = s.trim_end_matches('0');
        s.trim_end_matches('.').to_string()
    }
}

/// Renders a metric value at full precision, trimming only the trailing
/// zeros introduced by unit conversion.
fn format_exact(value: f64) -> String {
    let s = format!("{value:.9}");
    let s = s.trim_end_matches('0');
    let s = s.trim_end_matches('.');
    if s.is_empty() || s == "-" {
        "0".to_string()
    } else {
        s.to_string()
    }
}

fn line_kv(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(':')?;
    Some((key.trim(), value.trim()))
}

/// Parses a `<number><unit>` value where unit is `ms` or `us`, returning
/// milliseconds.
fn parse_ms_suffixed(value: &str) -> Result<f64, CheckError> {
    if let Some(n) = value.strip_suffix("ms") {
        n.trim().parse::<f64>().map_err(|_| CheckError::Invalid(format!("cannot parse {value:?} as a ms value")))
    } else if let Some(n) = value.strip_suffix("us") {
        let v: f64 = n.trim().parse().map_err(|_| CheckError::Invalid(format!("cannot parse {value:?} as a us value")))?;
        Ok(v / 1000.0)
    } else {
        value.parse::<f64>().map_err(|_| CheckError::Invalid(format!("cannot parse {value:?} as a numeric offset")))
    }
}

fn parse_timedatectl(text: &str) -> Result<NtpReading, CheckError> {
    let mut server = None;
    let mut offset_ms = None;
    let mut stratum = None;
    let mut jitter_ms = None;
    for line in text.lines() {
        let Some((key, value)) = line_kv(line) else { continue };
        match key {
            "Server" => server = Some(value.to_string()),
            "Offset" => offset_ms = Some(parse_ms_suffixed(value)?),
            "Stratum" => stratum = value.parse::<i64>().ok(),
            "Jitter" => jitter_ms = Some(parse_ms_suffixed(value)?),
            _ => {}
        }
    }
    let offset_ms = offset_ms.ok_or_else(|| CheckError::Invalid("timedatectl: no Offset line found".to_string()))?;
    Ok(NtpReading { offset_ms, source_desc: server.unwrap_or_default(), stratum, jitter_ms })
}

fn parse_chronyc(text: &str) -> Result<NtpReading, CheckError> {
    let mut reference = None;
    let mut stratum = None;
    let mut offset_seconds = None;
    let mut leap_status = None;
    for line in text.lines() {
        let Some((key, value)) = line_kv(line) else { continue };
        match key {
            "Reference ID" => reference = Some(value.to_string()),
            "Stratum" => stratum = value.parse::<i64>().ok(),
            "Last offset" => offset_seconds = value.strip_suffix("seconds").unwrap_or(value).trim().parse::<f64>().ok(),
            "Leap status" => leap_status = Some(value.to_string()),
            _ => {}
        }
    }
    if let Some(status) = &leap_status {
        if status != "Normal" {
            return Err(CheckError::Invalid(format!("chronyc: Leap status : {status}")));
        }
    }
    let offset_seconds = offset_seconds.ok_or_else(|| CheckError::Invalid("chronyc: no Last offset line found".to_string()))?;
    let source_desc = reference
        .as_deref()
        .and_then(|r| r.split_once('('))
        .map(|(_, rest)| rest.trim_end_matches(')').to_string())
        .unwrap_or_default();
    Ok(NtpReading { offset_ms: offset_seconds * 1000.0, source_desc, stratum, jitter_ms: None })
}

fn parse_ntpq(text: &str) -> Result<NtpReading, CheckError> {
    let mut rows: Vec<(char, Vec<String>)> = Vec::new();
    let mut past_header = false;
    for line in text.lines() {
        if line.starts_with('=') {
            past_header = true;
            continue;
        }
        if !past_header || line.trim().is_empty() {
            continue;
        }
        let marker = line.chars().next().unwrap_or(' ');
        let fields: Vec<String> = line[marker.len_utf8()..].split_whitespace().map(str::to_string).collect();
        if fields.len() >= 10 {
            rows.push((marker, fields));
        }
    }
    let selected =
        rows.iter().find(|(marker, _)| *marker == '*').or_else(|| if rows.len() == 1 { rows.first() } else { None });
    let Some((_, fields)) = selected else {
        return Err(CheckError::Invalid("ntpq did not return any usable server".to_string()));
    };
    let remote = fields[0].clone();
    let refid = fields[1].clone();
    let stratum = fields[2].parse::<i64>().ok();
    let offset_ms: f64 =
        fields[8].parse().map_err(|_| CheckError::Invalid("ntpq: cannot parse offset field".to_string()))?;
    let jitter_ms = fields[9].parse::<f64>().ok();
    Ok(NtpReading { offset_ms, source_desc: format!("{remote} ({refid})"), stratum, jitter_ms })
}

fn parse_w32tm(text: &str) -> Result<NtpReading, CheckError> {
    let mut stratum = None;
    let mut source_desc = String::new();
    let mut offset_ms = None;
    let mut state_machine = None;
    for line in text.lines() {
        let Some((key, value)) = line_kv(line) else { continue };
        match key {
            "Stratum" => stratum = value.split_whitespace().next().and_then(|s| s.parse::<i64>().ok()),
            "Source" => source_desc = value.split(',').next().unwrap_or(value).to_string(),
            "Phase Offset" => {
                let seconds: f64 = value
                    .strip_suffix('s')
                    .unwrap_or(value)
                    .parse()
                    .map_err(|_| CheckError::Invalid(format!("w32tm: cannot parse phase offset {value:?}")))?;
                offset_ms = Some(seconds * 1000.0);
            }
            "State Machine" => state_machine = Some(value.to_string()),
            _ => {}
        }
    }
    if let Some(state) = &state_machine {
        if !state.contains("Sync") {
            return Err(CheckError::Invalid(format!("w32tm.exe: State Machine: {state}")));
        }
    }
    let offset_ms =
        offset_ms.ok_or_else(|| CheckError::Invalid(format!("cannot parse offset from w32tm: {}", text.trim())))?;
    Ok(NtpReading { offset_ms, source_desc, stratum, jitter_ms: None })
}

fn extract_parenthetical(value: &str) -> Option<String> {
    let start = value.find('(')?;
    let end = value.find(')')?;
    if end <= start + 1 {
        return None;
    }
    Some(value[start + 1..end].to_string())
}

fn parse_osx(systemsetup_text: &str, sntp_text: &str) -> Result<NtpReading, CheckError> {
    let mut network_time_on = false;
    let mut server = String::new();
    for line in systemsetup_text.lines() {
        let Some((key, value)) = line_kv(line) else { continue };
        match key {
            "Network Time" => network_time_on = value.eq_ignore_ascii_case("on"),
            "Network Time Server" => server = value.to_string(),
            _ => {}
        }
    }
    if !network_time_on {
        return Err(CheckError::Invalid("systemsetup -getusingnetworktime: Network Time: Off".to_string()));
    }

    let mut result_line = None;
    let mut stratum = None;
    let mut offset_seconds = None;
    let mut addr = String::new();
    for raw_line in sntp_text.lines() {
        let line = raw_line.trim();
        if let Some(rest) = line.strip_prefix("result:") {
            result_line = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("stratum:") {
            stratum = extract_parenthetical(rest).and_then(|v| v.parse::<i64>().ok());
        } else if let Some(rest) = line.strip_prefix("offset:") {
            offset_seconds = extract_parenthetical(rest).and_then(|v| v.parse::<f64>().ok());
        } else if let Some(rest) = line.strip_prefix("addr:") {
            addr = rest.trim().to_string();
        }
    }
    let Some(result_line) = result_line else {
        return Err(CheckError::Invalid("sntp: no result line found".to_string()));
    };
    if !result_line.starts_with("0 ") {
        return Err(CheckError::Invalid(format!("sntp: result: {result_line}")));
    }
    let offset_seconds = offset_seconds.ok_or_else(|| CheckError::Invalid("sntp: no offset line found".to_string()))?;
    let source_desc = if addr.is_empty() { server } else { format!("{server} ({addr})") };
    Ok(NtpReading { offset_ms: offset_seconds * 1000.0, source_desc, stratum, jitter_ms: None })
}

#[cfg(test)]
mod tests {
    use super::super::resolver::FakeSystemUtility;
    use super::*;

    #[test]
    fn timedatectl_ok_reading_matches_fixture() {
        let utility = FakeSystemUtility::new(&[(
            "timedatectl",
            "Server: 62.225.132.250 (0.debian.pool.ntp.org)\n\
             Stratum: 2\n\
             Offset: -32.316ms\n\
             Jitter: 236.187ms",
        )]);
        let check = CheckNtpOffset::new(Arc::new(utility));
        let result = check.run(&CheckArgs::parse(&["source=timedatectl".to_string()])).unwrap();
        assert_eq!(result.state, CheckState::Ok);
        assert_eq!(
            result.build_plugin_output(),
            "OK - offset -32.3ms from 62.225.132.250 (0.debian.pool.ntp.org) |'offset'=-32.316ms;-50:50;-100:100 'stratum'=2;;;0 'jitter'=236.187ms;;;0"
        );
    }

    #[test]
    fn timedatectl_over_threshold_is_critical_and_converts_jitter_units() {
        let utility = FakeSystemUtility::new(&[(
            "timedatectl",
            "Server: 62.225.132.250 (0.debian.pool.ntp.org)\n\
             Stratum: 2\n\
             Offset: -132.316ms\n\
             Jitter: 236.187us",
        )]);
        let check = CheckNtpOffset::new(Arc::new(utility));
        let result = check.run(&CheckArgs::parse(&["source=timedatectl".to_string()])).unwrap();
        assert_eq!(result.state, CheckState::Critical);
        assert_eq!(
            result.build_plugin_output(),
            "CRITICAL - offset -132ms from 62.225.132.250 (0.debian.pool.ntp.org) |'offset'=-132.316ms;-50:50;-100:100 'stratum'=2;;;0 'jitter'=0.236187ms;;;0"
        );
    }

    #[test]
    fn chronyc_ok_reading() {
        let utility = FakeSystemUtility::new(&[(
            "chronyc",
            "Reference ID    : B9FC8C7D (test.ntp)\n\
             Stratum         : 3\n\
             Last offset     : +0.002065938 seconds\n\
             Leap status     : Normal",
        )]);
        let check = CheckNtpOffset::new(Arc::new(utility));
        let result = check.run(&CheckArgs::parse(&["source=chronyc".to_string()])).unwrap();
        assert_eq!(result.state, CheckState::Ok);
        assert_eq!(
            result.build_plugin_output(),
            "OK - offset 2.066ms from test.ntp |'offset'=2.065938ms;-50:50;-100:100 'stratum'=3;;;0"
        );
    }

    #[test]
    fn chronyc_not_synchronised_is_critical_with_a_fixed_message() {
        let utility = FakeSystemUtility::new(&[(
            "chronyc",
            "Reference ID    : 00000000 ()\n\
             Stratum         : 0\n\
             Last offset     : +0.000000000 seconds\n\
             Leap status     : Not synchronised",
        )]);
        let check = CheckNtpOffset::new(Arc::new(utility));
        let result = check.run(&CheckArgs::parse(&["source=chronyc".to_string()])).unwrap();
        assert_eq!(result.state, CheckState::Critical);
        assert_eq!(result.build_plugin_output(), "CRITICAL - chronyc: Leap status : Not synchronised");
    }

    #[test]
    fn ntpq_picks_the_starred_peer() {
        let utility = FakeSystemUtility::new(&[(
            "ntpq",
            "     remote                                   refid      st t when poll reach   delay   offset   jitter\n\
             =======================================================================================================\n\
              2.rhel.pool.ntp.org                     .POOL.          16 p    -  256    0   0.0000   0.0000   0.0001\n\
             *ntp3.sack.dev                           129.69.1.153     2 u   47   64  377  21.6749  -1.1641   0.8209",
        )]);
        let check = CheckNtpOffset::new(Arc::new(utility));
        let result = check.run(&CheckArgs::parse(&["source=ntpq".to_string()])).unwrap();
        assert_eq!(result.state, CheckState::Ok);
        assert_eq!(
            result.build_plugin_output(),
            "OK - offset -1.164ms from ntp3.sack.dev (129.69.1.153) |'offset'=-1.1641ms;-50:50;-100:100 'stratum'=2;;;0 'jitter'=0.8209ms;;;0"
        );
    }

    #[test]
    fn ntpq_with_no_starred_peer_is_critical() {
        let utility = FakeSystemUtility::new(&[(
            "ntpq",
            "     remote                                   refid      st t when poll reach   delay   offset   jitter\n\
             =======================================================================================================\n\
              2.rhel.pool.ntp.org                     .POOL.          16 p    -  256    0   0.0000   0.0000   0.0001\n\
              mail.gunnarhofmann.de                   192.53.103.103   2 u    1   64    1  27.1094  -0.8311   0.8566",
        )]);
        let check = CheckNtpOffset::new(Arc::new(utility));
        let result = check.run(&CheckArgs::parse(&["source=ntpq".to_string()])).unwrap();
        assert_eq!(result.state, CheckState::Critical);
        assert_eq!(result.build_plugin_output(), "CRITICAL - ntpq did not return any usable server");
    }

    #[test]
    fn w32tm_ok_reading() {
        let utility = FakeSystemUtility::new(&[(
            "w32tm.exe",
            "Stratum: 4 (secondary reference - syncd by (S)NTP)\n\
             Source: time.windows.com,0x8\n\
             Phase Offset: 0.0061517s\n\
             State Machine: 2 (Sync)",
        )]);
        let check = CheckNtpOffset::new(Arc::new(utility));
        let result = check.run(&CheckArgs::parse(&["source=w32tm".to_string()])).unwrap();
        assert_eq!(result.state, CheckState::Ok);
        assert_eq!(result.build_plugin_output(), "OK - offset 6.152ms from time.windows.com |'offset'=6.1517ms;-50:50;-100:100 'stratum'=4;;;0");
    }

    #[test]
    fn w32tm_hold_state_is_critical_with_a_fixed_message() {
        let utility = FakeSystemUtility::new(&[(
            "w32tm.exe",
            "Stratum: 4 (secondary reference - syncd by (S)NTP)\n\
             Source: time.windows.com,0x8\n\
             Phase Offset: 0.0000002s\n\
             State Machine: 1 (Hold)",
        )]);
        let check = CheckNtpOffset::new(Arc::new(utility));
        let result = check.run(&CheckArgs::parse(&["source=w32tm".to_string()])).unwrap();
        assert_eq!(result.state, CheckState::Critical);
        assert_eq!(result.build_plugin_output(), "CRITICAL - w32tm.exe: State Machine: 1 (Hold)");
    }

    #[test]
    fn osx_ok_reading() {
        let utility = FakeSystemUtility::new(&[
            ("systemsetup", "Network Time: On\nNetwork Time Server: time.euro.apple.com"),
            ("sntp", "result: 0 (Success)\nstratum: 02 (2)\noffset: FFFF (-0.007587078)\naddr: 10.1.1.1"),
        ]);
        let check = CheckNtpOffset::new(Arc::new(utility));
        let result = check.run(&CheckArgs::parse(&["source=osx".to_string()])).unwrap();
        assert_eq!(result.state, CheckState::Ok);
        assert_eq!(
            result.build_plugin_output(),
            "OK - offset -7.587ms from time.euro.apple.com (10.1.1.1) |'offset'=-7.587078ms;-50:50;-100:100 'stratum'=2;;;0"
        );
    }

    #[test]
    fn osx_network_time_off_is_critical() {
        let utility = FakeSystemUtility::new(&[
            ("systemsetup", "Network Time: Off\nNetwork Time Server: time.euro.apple.com"),
            ("sntp", ""),
        ]);
        let check = CheckNtpOffset::new(Arc::new(utility));
        let result = check.run(&CheckArgs::parse(&["source=osx".to_string()])).unwrap();
        assert_eq!(result.state, CheckState::Critical);
        assert_eq!(result.build_plugin_output(), "CRITICAL - systemsetup -getusingnetworktime: Network Time: Off");
    }
}
