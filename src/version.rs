//! Semantic-version comparison for import/preload compatibility (§4.4).
//!
//! Grammar: `v<M>.<m>.<p>(-(alpha|beta)(.pre-<N>)?)?`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PreLabel {
    Alpha,
    Beta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreRelease {
    pub label: PreLabel,
    /// Absent counts as greater than any present number.
    pub pre: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub pre_release: Option<PreRelease>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VersionParseError {
    #[error("version string must start with 'v': {0}")]
    MissingVPrefix(String),
    #[error("malformed version string: {0}")]
    Malformed(String),
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = &self.pre_release {
            let label = match pre.label {
                PreLabel::Alpha => "alpha",
                PreLabel::Beta => "beta",
            };
            write!(f, "-{label}")?;
            if let Some(n) = pre.pre {
                write!(f, ".pre-{n}")?;
            }
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix('v')
            .ok_or_else(|| VersionParseError::MissingVPrefix(s.to_string()))?;

        let (core, label_part) = match rest.split_once('-') {
            Some((core, label)) => (core, Some(label)),
            None => (rest, None),
        };

        let mut parts = core.split('.');
        let mut next_num = |what: &str| -> Result<u64, VersionParseError> {
            parts
                .next()
                .ok_or_else(|| VersionParseError::Malformed(s.to_string()))?
                .parse::<u64>()
                .map_err(|_| VersionParseError::Malformed(format!("{s} ({what})")))
        };
        let major = next_num("major")?;
        let minor = next_num("minor")?;
        let patch = next_num("patch")?;
        if parts.next().is_some() {
            return Err(VersionParseError::Malformed(s.to_string()));
        }

        let pre_release = match label_part {
            None => None,
            Some(label_part) => {
                let (label_str, pre_str) = match label_part.split_once('.') {
                    Some((label, pre)) => (label, Some(pre)),
                    None => (label_part, None),
                };
                let label = match label_str {
                    "alpha" => PreLabel::Alpha,
                    "beta" => PreLabel::Beta,
                    _ => return Err(VersionParseError::Malformed(s.to_string())),
                };
                let pre = match pre_str {
                    None => None,
                    Some(pre_str) => {
                        let n = pre_str
                            .strip_prefix("pre-")
                            .ok_or_else(|| VersionParseError::Malformed(s.to_string()))?;
                        Some(
                            n.parse::<u64>()
                                .map_err(|_| VersionParseError::Malformed(s.to_string()))?,
                        )
                    }
                };
                Some(PreRelease { label, pre })
            }
        };

        Ok(Version {
            major,
            minor,
            patch,
            pre_release,
        })
    }
}

/// Ordering of pre-release labels within the same (major, minor, patch):
/// an absent label is greater than any present label; `alpha < beta`;
/// absent `pre-N` is greater than any present number.
fn pre_release_order(pre: &Option<PreRelease>) -> (u8, u8, u64) {
    match pre {
        None => (1, 0, 0),
        Some(p) => {
            let label_rank = match p.label {
                PreLabel::Alpha => 0,
                PreLabel::Beta => 1,
            };
            (0, label_rank, p.pre.unwrap_or(u64::MAX))
        }
    }
}

/// `compatible(required, provided)` per §4.4.
///
/// Not necessarily transitive: it is not required that
/// `compatible(a, b) ∧ compatible(b, c) ⇒ compatible(a, c)`.
pub fn compatible(required: &Version, provided: &Version) -> bool {
    if provided.major < required.major || provided.minor < required.minor {
        return false;
    }
    if provided.patch != required.patch {
        // major/minor compatible: patch may float freely.
        return true;
    }
    pre_release_order(&provided.pre_release) >= pre_release_order(&required.pre_release)
}

/// Parses `provided` and checks it against `required`; a parse failure on
/// `provided` is treated as incompatible rather than propagated.
pub fn compatible_str(required: &Version, provided: &str) -> bool {
    match provided.parse::<Version>() {
        Ok(v) => compatible(required, &v),
        Err(_) => false,
    }
}

impl PartialOrd for PreRelease {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for PreRelease {
    fn cmp(&self, other: &Self) -> Ordering {
        pre_release_order(&Some(*self)).cmp(&pre_release_order(&Some(*other)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    #[test]
    fn parses_full_grammar() {
        assert_eq!(
            v("v1.0.0-alpha.pre-3"),
            Version {
                major: 1,
                minor: 0,
                patch: 0,
                pre_release: Some(PreRelease {
                    label: PreLabel::Alpha,
                    pre: Some(3)
                }),
            }
        );
        assert_eq!(
            v("v1.2.3"),
            Version {
                major: 1,
                minor: 2,
                patch: 3,
                pre_release: None
            }
        );
        assert_eq!(
            v("v1.0.0-beta"),
            Version {
                major: 1,
                minor: 0,
                patch: 0,
                pre_release: Some(PreRelease {
                    label: PreLabel::Beta,
                    pre: None
                }),
            }
        );
    }

    #[test]
    fn rejects_malformed() {
        assert!("1.0.0".parse::<Version>().is_err());
        assert!("v1.0".parse::<Version>().is_err());
        assert!("v1.0.0-gamma".parse::<Version>().is_err());
        assert!("v1.0.0-alpha.pre-x".parse::<Version>().is_err());
    }

    #[test]
    fn identical_versions_are_always_compatible() {
        for s in ["v1.0.0", "v1.0.0-alpha", "v1.0.0-beta.pre-2", "v2.3.4-alpha.pre-0"] {
            let version = v(s);
            assert!(compatible(&version, &version), "{s} not self-compatible");
        }
    }

    #[test]
    fn lower_major_or_minor_is_incompatible() {
        assert!(!compatible(&v("v1.1.0"), &v("v1.0.0")));
        assert!(!compatible(&v("v1.0.0"), &v("v0.9.9")));
    }

    #[test]
    fn higher_major_with_lower_minor_is_incompatible() {
        assert!(!compatible(&v("v1.5.0"), &v("v2.0.0")));
    }

    #[test]
    fn patch_floats_freely_when_major_minor_match() {
        assert!(compatible(&v("v1.0.5"), &v("v1.0.0")));
        assert!(compatible(&v("v1.0.0"), &v("v1.0.99")));
    }

    #[test]
    fn unlabeled_provided_beats_labeled_required() {
        assert!(compatible(&v("v1.0.0-beta"), &v("v1.0.0")));
        assert!(!compatible(&v("v1.0.0"), &v("v1.0.0-beta")));
    }

    #[test]
    fn alpha_is_less_than_beta() {
        assert!(!compatible(&v("v1.0.0-beta"), &v("v1.0.0-alpha")));
        assert!(compatible(&v("v1.0.0-alpha"), &v("v1.0.0-beta")));
    }

    #[test]
    fn alpha_into_beta_rejected_matches_s6() {
        let required = v("v1.0.0-beta.pre-2");
        assert!(!compatible_str(&required, "v1.0.0-alpha.pre-3"));
    }

    #[test]
    fn absent_pre_number_outranks_any_present_number() {
        assert!(compatible(&v("v1.0.0-beta.pre-5"), &v("v1.0.0-beta")));
        assert!(!compatible(&v("v1.0.0-beta"), &v("v1.0.0-beta.pre-5")));
    }

    #[test]
    fn malformed_provided_string_is_incompatible_not_an_error() {
        assert!(!compatible_str(&v("v1.0.0"), "not-a-version"));
    }

    proptest::proptest! {
        #[test]
        fn well_formed_versions_are_self_compatible(
            major in 0u64..50,
            minor in 0u64..50,
            patch in 0u64..50,
        ) {
            let version = Version { major, minor, patch, pre_release: None };
            proptest::prop_assert!(compatible(&version, &version));
        }

        #[test]
        fn display_then_parse_round_trips(
            major in 0u64..50,
            minor in 0u64..50,
            patch in 0u64..50,
            label in 0u8..3,
            pre in proptest::option::of(0u64..20),
        ) {
            let pre_release = match label {
                0 => None,
                1 => Some(PreRelease { label: PreLabel::Alpha, pre }),
                _ => Some(PreRelease { label: PreLabel::Beta, pre }),
            };
            let version = Version { major, minor, patch, pre_release };
            let round_tripped: Version = version.to_string().parse().unwrap();
            proptest::prop_assert_eq!(version, round_tripped);
        }
    }
}
