//! Plugin-style check results: state, metrics, and Nagios-format output
//! rendering (spec.md §4.5).

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CheckState {
    Ok = 0,
    Warning = 1,
    Critical = 2,
    Unknown = 3,
}

impl CheckState {
    pub fn as_exit_code(self) -> i32 {
        self as i32
    }

    pub fn as_prefix(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Warning => "WARNING",
            Self::Critical => "CRITICAL",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// The worse of two states, by ordinal.
    pub fn worse(self, other: Self) -> Self {
        if other > self {
            other
        } else {
            self
        }
    }
}

impl Default for CheckState {
    fn default() -> Self {
        Self::Ok
    }
}

impl fmt::Display for CheckState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_prefix())
    }
}

/// One performance-data metric: `'name'=value[uom];warn;crit;min;max`, with
/// trailing empty fields dropped.
#[derive(Debug, Clone, Default)]
pub struct Metric {
    pub name: String,
    pub value: String,
    pub uom: String,
    pub warn: Option<String>,
    pub crit: Option<String>,
    pub min: Option<String>,
    pub max: Option<String>,
}

impl Metric {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), value: value.into(), ..Default::default() }
    }

    pub fn uom(mut self, uom: impl Into<String>) -> Self {
        self.uom = uom.into();
        self
    }

    pub fn warn(mut self, warn: impl Into<String>) -> Self {
        self.warn = Some(warn.into());
        self
    }

    pub fn crit(mut self, crit: impl Into<String>) -> Self {
        self.crit = Some(crit.into());
        self
    }

    pub fn min(mut self, min: impl Into<String>) -> Self {
        self.min = Some(min.into());
        self
    }

    fn render(&self) -> String {
        let fields = [
            self.warn.clone().unwrap_or_default(),
            self.crit.clone().unwrap_or_default(),
            self.min.clone().unwrap_or_default(),
            self.max.clone().unwrap_or_default(),
        ];
        let mut end = fields.len();
        while end > 0 && fields[end - 1].is_empty() {
            end -= 1;
        }
        let head = format!("'{}'={}{}", self.name, self.value, self.uom);
        if end == 0 {
            head
        } else {
            format!("{head};{}", fields[..end].join(";"))
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CheckResult {
    pub state: CheckState,
    pub message: String,
    pub metrics: Vec<Metric>,
}

impl CheckResult {
    pub fn new(state: CheckState, message: impl Into<String>) -> Self {
        Self { state, message: message.into(), metrics: Vec::new() }
    }

    pub fn with_metrics(mut self, metrics: Vec<Metric>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Renders the one-line plugin output: `STATE - message |metrics`.
    pub fn build_plugin_output(&self) -> String {
        let head = format!("{} - {}", self.state.as_prefix(), self.message);
        if self.metrics.is_empty() {
            head
        } else {
            let perf = self.metrics.iter().map(Metric::render).collect::<Vec<_>>().join(" ");
            format!("{head} |{perf}")
        }
    }
}
