//! Run identifiers

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Source of wall-clock time for run naming
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant, for reproducible run names
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    /// Clock fixed at the given unix timestamp (seconds)
    pub fn from_timestamp(secs: i64) -> Self {
        Self(Utc.timestamp_opt(secs, 0).single().unwrap_or_default())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Name of one training invocation: `{env_name}_{seed}_{unix_seconds}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunName(String);

impl RunName {
    /// Build a run name from its parts.
    ///
    /// Scalar seeds use the usual experiment-script spelling: strings
    /// unquoted, `True`/`False`, `None`, and floats such as `1e-05` or
    /// `3.0`. Lists and tables are rendered as JSON.
    pub fn new(env_name: &str, seed: &Value, clock: &impl Clock) -> Self {
        Self(format!(
            "{}_{}_{}",
            env_name,
            seed_text(seed),
            clock.now().timestamp()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn seed_text(seed: &Value) -> String {
    match seed {
        Value::String(s) => s.clone(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Null => "None".to_string(),
        Value::Number(n) => match n.as_f64().filter(|_| n.is_f64()) {
            Some(f) => float_text(f),
            None => n.to_string(),
        },
        other => other.to_string(),
    }
}

/// Shortest round-trip spelling, scientific below 1e-4 and from 1e16 up
fn float_text(f: f64) -> String {
    let sci = format!("{f:e}");
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return sci;
    };
    let exp: i32 = exp.parse().unwrap_or(0);

    if f == 0.0 || (-4..16).contains(&exp) {
        let fixed = f.to_string();
        if fixed.contains('.') {
            fixed
        } else {
            format!("{fixed}.0")
        }
    } else {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{mantissa}e{sign}{:02}", exp.abs())
    }
}

impl std::fmt::Display for RunName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for RunName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_run_name_format() {
        let clock = FixedClock::from_timestamp(1_700_000_000);
        let name = RunName::new("Ant-v4", &json!(7), &clock);
        assert_eq!(name.as_str(), "Ant-v4_7_1700000000");
    }

    #[test]
    fn test_string_seed_is_unquoted() {
        let clock = FixedClock::from_timestamp(5);
        let name = RunName::new("Hopper-v4", &json!("abc"), &clock);
        assert_eq!(name.to_string(), "Hopper-v4_abc_5");
    }

    #[test]
    fn test_scalar_seed_spelling() {
        let clock = FixedClock::from_timestamp(5);
        let name = |seed: Value| RunName::new("Ant-v4", &seed, &clock).to_string();

        assert_eq!(name(json!(true)), "Ant-v4_True_5");
        assert_eq!(name(Value::Null), "Ant-v4_None_5");
        assert_eq!(name(json!(1e-5)), "Ant-v4_1e-05_5");
        assert_eq!(name(json!(3.0)), "Ant-v4_3.0_5");
        assert_eq!(name(json!(0.25)), "Ant-v4_0.25_5");
        assert_eq!(name(json!(1e16)), "Ant-v4_1e+16_5");
        assert_eq!(name(json!(-42)), "Ant-v4_-42_5");
    }

    #[test]
    fn test_system_clock_is_current() {
        let before = Utc::now().timestamp();
        let name = RunName::new("Ant-v5", &json!(1), &SystemClock);
        let ts: i64 = name.as_str().rsplit('_').next().unwrap().parse().unwrap();
        assert!(ts >= before);
    }
}
