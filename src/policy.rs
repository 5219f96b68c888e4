use std::str::FromStr;

use crate::Result;
use crate::error::Error;

/// Time policy used for `CB-ACCESS-TIMESTAMP`.
///
/// `Local` means "no `/time` call" and uses the local unix timestamp.
/// `Server` asks the exchange for its clock before every signed request,
/// which helps hosts whose clock has drifted outside the signature window.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum TimePolicy {
    #[default]
    Local,
    Server,
}

impl TimePolicy {
    pub fn parse(value: &str) -> Result<TimePolicy> {
        match value.trim().to_ascii_lowercase().as_str() {
            "local" | "fixed" => Ok(TimePolicy::Local),
            "server" | "remote" => Ok(TimePolicy::Server),
            other => Err(Error::configuration(format!(
                "invalid time policy `{other}`; expected one of: local|server"
            ))),
        }
    }
}

impl FromStr for TimePolicy {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        TimePolicy::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Kind;

    #[test]
    fn parses_known_policies() {
        assert_eq!(" Server ".parse::<TimePolicy>().ok(), Some(TimePolicy::Server));
        assert_eq!("local".parse::<TimePolicy>().ok(), Some(TimePolicy::Local));
        assert_eq!(TimePolicy::default(), TimePolicy::Local);
    }

    #[test]
    fn rejects_unknown_policy() {
        let err = TimePolicy::parse("ntp").unwrap_err();

        assert_eq!(err.kind(), Kind::Configuration);
        assert!(err.to_string().contains("`ntp`"));
    }
}
