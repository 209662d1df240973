//! Saved debugging sessions.
//!
//! A session file is a JSON document holding the settings that can also be
//! given on the command line:
//!
//! ```json
//! { "breakpoints": [3, 12], "watches": ["sum"], "reportExceptions": true }
//! ```

use std::{fs, path::Path};

use color_eyre::eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};

/// What to observe while a script runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub(crate) struct Session {
    /// Source lines to stop at.
    pub(crate) breakpoints: Vec<u32>,
    /// Expressions evaluated in the paused frame.
    pub(crate) watches: Vec<String>,
    /// Report every exception the debuggee throws.
    pub(crate) report_exceptions: bool,
}

impl Session {
    /// Reads a session file.
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .wrap_err_with(|| format!("could not read session file {}", path.display()))?;
        serde_json::from_str(&text).wrap_err_with(|| format!("invalid session file {}", path.display()))
    }

    /// Adds the settings of `other` to this session.
    pub(crate) fn merge(&mut self, other: Self) {
        for line in other.breakpoints {
            if !self.breakpoints.contains(&line) {
                self.breakpoints.push(line);
            }
        }
        self.watches.extend(other.watches);
        self.report_exceptions |= other.report_exceptions;
    }
}

#[cfg(test)]
mod tests {
    use super::Session;

    #[test]
    fn missing_fields_take_defaults() {
        let session: Session = serde_json::from_str(r#"{ "watches": ["x"] }"#).unwrap();
        assert_eq!(
            session,
            Session {
                watches: vec!["x".to_owned()],
                ..Session::default()
            }
        );
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(serde_json::from_str::<Session>(r#"{ "breakpoint": [1] }"#).is_err());
    }

    #[test]
    fn merging_keeps_breakpoints_unique() {
        let mut session = Session {
            breakpoints: vec![3, 5],
            ..Session::default()
        };
        session.merge(Session {
            breakpoints: vec![5, 7],
            watches: vec!["a".to_owned()],
            report_exceptions: true,
        });
        assert_eq!(session.breakpoints, [3, 5, 7]);
        assert_eq!(session.watches, ["a"]);
        assert!(session.report_exceptions);
    }
}
