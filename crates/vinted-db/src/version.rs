use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use vinted_common::Error;

/// A dotted release number such as `1.0.5.4`, ordered component by
/// component.
#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    parts: Vec<u64>,
}

impl Version {
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        if raw.is_empty() {
            return Err(Error::Config("version string is empty".into()));
        }

        let parts = raw
            .split('.')
            .map(|part| {
                part.parse::<u64>()
                    .map_err(|_| Error::Config(format!("invalid version {raw:?}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            raw: raw.to_string(),
            parts,
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.parts == other.parts
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.parts.hash(state);
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.parts.cmp(&other.parts)
    }
}

#[cfg(test)]
mod tests {
    use super::Version;

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    #[test]
    fn orders_numerically_per_component() {
        assert!(v("1.0.5.4") < v("1.0.5.5"));
        assert!(v("1.0.5.9") < v("1.0.5.10"));
        assert!(v("1.0.6") > v("1.0.5.7"));
        assert_eq!(v("1.0.05.4"), v("1.0.5.4"));
    }

    #[test]
    fn keeps_original_spelling_for_display() {
        assert_eq!(v(" 1.0.5.7 ").to_string(), "1.0.5.7");
        assert_eq!(v("1.0.5.7").as_str(), "1.0.5.7");
    }

    #[test]
    fn rejects_malformed_versions() {
        assert!("".parse::<Version>().is_err());
        assert!("1.0.x".parse::<Version>().is_err());
        assert!("1..0".parse::<Version>().is_err());
        assert!("v1.0".parse::<Version>().is_err());
    }
}
