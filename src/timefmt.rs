//! Bidirectional conversion between duration strings and durations
//!
//! A duration template is a plain string containing any subset of the
//! placeholders %D (days), %H (hours), %M (minutes) and %S (seconds), each
//! standing for a run of decimal digits. `01-12:30:00` matches `%D-%H:%M:%S`.

use std::error::Error;
use std::fmt;
use std::time::Duration;

use regex::Regex;

const SECS_PER_DAY: u64 = 24 * 60 * 60;
const SECS_PER_HOUR: u64 = 60 * 60;
const SECS_PER_MINUTE: u64 = 60;

/// No template in the list matched the input text.
#[derive(Debug)]
pub struct InvalidDuration {
    pub text: String,
    pub templates: Vec<String>,
}

impl fmt::Display for InvalidDuration {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "`{}` is not a supported time format: {}",
            self.text,
            self.templates.join(", ")
        )
    }
}

impl Error for InvalidDuration {}

/// Parse a duration string against an ordered template list.
///
/// Templates are tried in order and the first one matching the full text
/// wins. Placeholders missing from a template contribute zero.
pub fn parse(text: &str, templates: &[&str]) -> Result<Duration, InvalidDuration> {
    for template in templates {
        let pattern = format!(
            "^{}$",
            template
                .replace("%D", "(?P<d>[0-9]+)")
                .replace("%H", "(?P<h>[0-9]+)")
                .replace("%M", "(?P<m>[0-9]+)")
                .replace("%S", "(?P<s>[0-9]+)")
        );
        let re = Regex::new(&pattern).expect("duration template builds a valid pattern");

        let Some(caps) = re.captures(text) else { continue };
        let field = |name: &str| -> u64 {
            caps.name(name)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(0)
        };

        let secs = field("d") * SECS_PER_DAY
            + field("h") * SECS_PER_HOUR
            + field("m") * SECS_PER_MINUTE
            + field("s");
        return Ok(Duration::from_secs(secs));
    }

    Err(InvalidDuration {
        text: text.to_string(),
        templates: templates.iter().map(|t| t.to_string()).collect(),
    })
}

/// Render a duration through a template.
///
/// Days are peeled off first if the template has a %D, then hours, then
/// minutes; whatever remains is rendered as seconds. A magnitude whose
/// placeholder is absent folds into the next larger field that is present,
/// so a %H:%M:%S template renders two days as 48 hours.
pub fn format(duration: Duration, template: &str) -> String {
    let mut secs = duration.as_secs();
    let mut days = 0;
    let mut hours = 0;
    let mut minutes = 0;

    if template.contains("%D") {
        days = secs / SECS_PER_DAY;
        secs %= SECS_PER_DAY;
    }
    if template.contains("%H") {
        hours = secs / SECS_PER_HOUR;
        secs %= SECS_PER_HOUR;
    }
    if template.contains("%M") {
        minutes = secs / SECS_PER_MINUTE;
        secs %= SECS_PER_MINUTE;
    }

    template
        .replace("%D", &format!("{days:02}"))
        .replace("%H", &format!("{hours:02}"))
        .replace("%M", &format!("{minutes:02}"))
        .replace("%S", &format!("{secs:02}"))
}
