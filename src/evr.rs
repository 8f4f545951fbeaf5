use std::cmp::Ordering;
use std::fmt;

use crate::error::{Error, Result};

/// An RPM epoch-version-release triple.
///
/// Equality is field by field. Use [`rpm_cmp`](Evr::rpm_cmp) for rpm's
/// version ordering, under which an empty epoch is the same as `0` and
/// `1.0` is the same as `1_0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Evr {
    /// Epoch, empty when the package does not declare one.
    pub epoch: String,
    /// Upstream version.
    pub version: String,
    /// Distribution release.
    pub release: String,
}

impl Evr {
    /// Create an EVR from its three parts.
    pub fn new(
        epoch: impl Into<String>,
        version: impl Into<String>,
        release: impl Into<String>,
    ) -> Self {
        Evr {
            epoch: epoch.into(),
            version: version.into(),
            release: release.into(),
        }
    }

    /// Parse an `[E:]V[-R]` string.
    ///
    /// The epoch is everything before the first `:`, the release everything
    /// after the first `-` that follows it. Missing parts are empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use rpm_repodata::Evr;
    ///
    /// let evr = Evr::parse("1:2.3.4-5.el8");
    /// assert_eq!(evr.values(), ("1", "2.3.4", "5.el8"));
    ///
    /// let evr = Evr::parse("2.3.4");
    /// assert_eq!(evr.values(), ("", "2.3.4", ""));
    /// ```
    pub fn parse(evr: &str) -> Self {
        let (epoch, vr) = evr.split_once(':').unwrap_or(("", evr));
        let (version, release) = vr.split_once('-').unwrap_or((vr, ""));
        Evr::new(epoch, version, release)
    }

    pub fn epoch(&self) -> &str {
        &self.epoch
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn release(&self) -> &str {
        &self.release
    }

    /// Borrow the `(epoch, version, release)` parts.
    pub fn values(&self) -> (&str, &str, &str) {
        (&self.epoch, &self.version, &self.release)
    }

    /// The epoch as a number. An empty epoch is `0`.
    pub fn epoch_number(&self) -> Result<u32> {
        if self.epoch.is_empty() {
            return Ok(0);
        }
        self.epoch
            .parse()
            .map_err(|_| Error::InvalidEvr(self.to_string()))
    }

    /// Order two EVRs the way rpm does.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::cmp::Ordering;
    /// use rpm_repodata::Evr;
    ///
    /// let plain = Evr::new("", "1.0", "1");
    /// assert_eq!(plain.rpm_cmp(&Evr::new("0", "1.00", "01")), Ordering::Equal);
    /// assert_ne!(plain, Evr::new("0", "1.00", "01"));
    /// ```
    pub fn rpm_cmp(&self, other: &Evr) -> Ordering {
        compare_versions(normalized_epoch(&self.epoch), normalized_epoch(&other.epoch))
            .then_with(|| compare_versions(&self.version, &other.version))
            .then_with(|| compare_versions(&self.release, &other.release))
    }
}

impl From<(&str, &str, &str)> for Evr {
    fn from((epoch, version, release): (&str, &str, &str)) -> Self {
        Evr::new(epoch, version, release)
    }
}

impl fmt::Display for Evr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if !self.epoch.is_empty() {
            write!(f, "{}:", self.epoch)?;
        }
        f.write_str(&self.version)?;
        if !self.release.is_empty() {
            write!(f, "-{}", self.release)?;
        }
        Ok(())
    }
}

fn normalized_epoch(epoch: &str) -> &str {
    if epoch.is_empty() {
        "0"
    } else {
        epoch
    }
}

/// Compare two full `[E:]V-R` strings the way rpm does.
///
/// # Examples
///
/// ```
/// use std::cmp::Ordering;
/// use rpm_repodata::rpmvercmp;
///
/// assert_eq!(rpmvercmp("0:1.2.3-45", "1.2.3-45"), Ordering::Equal);
/// assert_eq!(rpmvercmp("1.2.3-45", "1:1.2.3-45"), Ordering::Less);
/// ```
pub fn rpmvercmp(evr1: &str, evr2: &str) -> Ordering {
    Evr::parse(evr1).rpm_cmp(&Evr::parse(evr2))
}

/// Compare a single version or release string the way rpm does.
///
/// Separators are any characters other than ASCII alphanumerics, `~` and
/// `^`. `~` sorts before everything including the end of the string, `^`
/// sorts after the end of the string but before any other segment. Digit
/// runs compare numerically and always beat alphabetic runs.
pub fn compare_versions(one: &str, two: &str) -> Ordering {
    if one == two {
        return Ordering::Equal;
    }

    let is_separator = |c: char| !c.is_ascii_alphanumeric() && c != '~' && c != '^';
    let mut one = one;
    let mut two = two;

    loop {
        one = one.trim_start_matches(is_separator);
        two = two.trim_start_matches(is_separator);

        match (one.strip_prefix('~'), two.strip_prefix('~')) {
            (Some(rest1), Some(rest2)) => {
                one = rest1;
                two = rest2;
                continue;
            }
            (Some(_), None) => return Ordering::Less,
            (None, Some(_)) => return Ordering::Greater,
            (None, None) => {}
        }

        match (one.strip_prefix('^'), two.strip_prefix('^')) {
            (Some(rest1), Some(rest2)) => {
                one = rest1;
                two = rest2;
                continue;
            }
            (Some(_), None) if two.is_empty() => return Ordering::Greater,
            (Some(_), None) => return Ordering::Less,
            (None, Some(_)) if one.is_empty() => return Ordering::Less,
            (None, Some(_)) => return Ordering::Greater,
            (None, None) => {}
        }

        if one.is_empty() || two.is_empty() {
            break;
        }

        let numeric = one.starts_with(|c: char| c.is_ascii_digit());
        let (segment1, rest1) = split_segment(one, numeric);
        let (segment2, rest2) = split_segment(two, numeric);

        // segments of different kinds: numbers are newer
        if segment2.is_empty() {
            return if numeric {
                Ordering::Greater
            } else {
                Ordering::Less
            };
        }

        let ordering = if numeric {
            let segment1 = segment1.trim_start_matches('0');
            let segment2 = segment2.trim_start_matches('0');
            segment1
                .len()
                .cmp(&segment2.len())
                .then_with(|| segment1.cmp(segment2))
        } else {
            segment1.cmp(segment2)
        };
        if ordering != Ordering::Equal {
            return ordering;
        }

        one = rest1;
        two = rest2;
    }

    match (one.is_empty(), two.is_empty()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        _ => Ordering::Greater,
    }
}

/// Split the leading run of digits (or letters) off `s`.
fn split_segment(s: &str, numeric: bool) -> (&str, &str) {
    let end = s
        .find(|c: char| {
            if numeric {
                !c.is_ascii_digit()
            } else {
                !c.is_ascii_alphabetic()
            }
        })
        .unwrap_or(s.len());
    s.split_at(end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(Evr::new("", "1.2.3", "45").to_string(), "1.2.3-45");
        assert_eq!(Evr::new("0", "1.2.3", "45").to_string(), "0:1.2.3-45");
    }

    #[test]
    fn display_without_release() {
        assert_eq!(Evr::new("", "1.0", "").to_string(), "1.0");
        assert_eq!(Evr::new("2", "1.0", "").to_string(), "2:1.0");
        assert_eq!(Evr::parse("3:1.0").to_string(), "3:1.0");
    }

    #[test]
    fn parse_edge_cases() {
        assert_eq!(Evr::parse("-").values(), ("", "", ""));
        assert_eq!(Evr::parse(".").values(), ("", ".", ""));
        assert_eq!(Evr::parse(":").values(), ("", "", ""));
        assert_eq!(Evr::parse(":-").values(), ("", "", ""));
        assert_eq!(Evr::parse("0").values(), ("", "0", ""));
        assert_eq!(Evr::parse("0-").values(), ("", "0", ""));
        assert_eq!(Evr::parse(":0").values(), ("", "0", ""));
        assert_eq!(Evr::parse("0:").values(), ("0", "", ""));
        assert_eq!(Evr::parse("asdf:").values(), ("asdf", "", ""));
        assert_eq!(Evr::parse("~:").values(), ("~", "", ""));
    }

    #[test]
    fn empty_epoch_sorts_as_zero() {
        let plain = Evr::parse("1.2.3-45");
        assert_eq!(plain.rpm_cmp(&Evr::parse("0:1.2.3-45")), Ordering::Equal);
        assert_eq!(plain.rpm_cmp(&Evr::parse("1:1.2.3-45")), Ordering::Less);
    }

    #[test]
    fn equality_is_field_wise() {
        let plain = Evr::new("", "1.0", "1");
        let padded = Evr::new("0", "1.00", "01");
        assert_eq!(plain.rpm_cmp(&padded), Ordering::Equal);
        assert_ne!(plain, padded);
        assert_eq!(plain, Evr::parse("1.0-1"));
    }

    #[test]
    fn epoch_number() {
        assert_eq!(Evr::parse("1.0-1").epoch_number().unwrap(), 0);
        assert_eq!(Evr::parse("7:1.0-1").epoch_number().unwrap(), 7);
        assert!(matches!(
            Evr::parse("x:1.0-1").epoch_number(),
            Err(Error::InvalidEvr(_))
        ));
    }

    #[test]
    fn evr_ordering() {
        assert_eq!(Evr::parse("1.2.3-45").rpm_cmp(&Evr::parse("1:1.2.3-45")), Ordering::Less);
        assert_eq!(Evr::parse("4.2.3-45").rpm_cmp(&Evr::parse("1:1.2.3-45")), Ordering::Less);
        assert_eq!(Evr::parse("1.2.3-45").rpm_cmp(&Evr::parse("1.2.4-45")), Ordering::Less);
        assert_eq!(Evr::parse("1.23.3-45").rpm_cmp(&Evr::parse("1.2.3-45")), Ordering::Greater);
        assert_eq!(Evr::parse("12.2.3-45").rpm_cmp(&Evr::parse("1.2.3-45")), Ordering::Greater);
        assert_eq!(Evr::parse("1.2.3-45").rpm_cmp(&Evr::parse("1.12.3-45")), Ordering::Less);
        assert_eq!(Evr::parse("~1.2.3-45").rpm_cmp(&Evr::parse("1.2.3-45")), Ordering::Less);
        assert_eq!(Evr::parse("~12.2.3-45").rpm_cmp(&Evr::parse("1.2.3-45")), Ordering::Less);
        assert_eq!(Evr::parse("~12.2.3-45").rpm_cmp(&Evr::parse("~1.2.3-45")), Ordering::Greater);
        assert_eq!(Evr::parse("~3:12.2.3-45").rpm_cmp(&Evr::parse("0:1.2.3-45")), Ordering::Less);
        assert_eq!(Evr::parse("1.2.3-45").rpm_cmp(&Evr::parse("1.2.3-46")), Ordering::Less);
        assert_eq!(Evr::parse("1.2.3-3").rpm_cmp(&Evr::parse("1.2.3-10")), Ordering::Less);
    }

    #[test]
    fn rpmvercmp_strings() {
        assert_eq!(rpmvercmp("0:1.2.3-45", "1.2.3-45"), Ordering::Equal);
        assert_eq!(rpmvercmp("1.2.3-45", "1:1.2.3-45"), Ordering::Less);
        assert_eq!(rpmvercmp("1.2.3-46", "1.2.3-45"), Ordering::Greater);
    }

    #[test]
    fn plain_versions() {
        assert_eq!(compare_versions("1.0", "2.0"), Ordering::Less);
        assert_eq!(compare_versions("2.0", "1.0"), Ordering::Greater);
        assert_eq!(compare_versions("2.0", "2.0.1"), Ordering::Less);
        assert_eq!(compare_versions("2.0.1", "2.0"), Ordering::Greater);
        assert_eq!(compare_versions("3.0.1a", "3.0.1"), Ordering::Greater);
        assert_eq!(compare_versions("4_0", "4.0"), Ordering::Equal);
        assert_eq!(compare_versions("4.999.9", "5.0"), Ordering::Less);
        assert_eq!(compare_versions("5.0", "4.999_9"), Ordering::Greater);
        assert_eq!(compare_versions("1.01", "1.1"), Ordering::Equal);
    }

    #[test]
    fn tilde_and_caret() {
        assert_eq!(compare_versions("1.0^", "1.0"), Ordering::Greater);
        assert_eq!(compare_versions("1.0", "1.0git1^"), Ordering::Less);
        assert_eq!(compare_versions("1.0^git1", "1.0^git2"), Ordering::Less);
        assert_eq!(compare_versions("1.01", "1.0^git1"), Ordering::Greater);
        assert_eq!(compare_versions("1.0^20210501", "1.0.1"), Ordering::Less);
        assert_eq!(
            compare_versions("1.0^20210502", "1.0^20210501^git1"),
            Ordering::Greater
        );
        assert_eq!(compare_versions("1.0~rc1^git1", "1.0~rc1"), Ordering::Greater);
        assert_eq!(compare_versions("1.0^git1", "1.0^git1~pre"), Ordering::Greater);
        assert_eq!(compare_versions("1.0~rc1", "1.0"), Ordering::Less);
    }

    #[test]
    fn letters_against_digits() {
        assert_eq!(compare_versions("1e.fc33", "1.fc33"), Ordering::Less);
        assert_eq!(compare_versions("1g.fc33", "1.fc33"), Ordering::Greater);
        assert_eq!(compare_versions("1.a", "1.1"), Ordering::Less);
        assert_eq!(compare_versions("1.1", "1.a"), Ordering::Greater);
    }

    #[test]
    fn non_ascii_is_separator() {
        assert_eq!(compare_versions("1.1.α", "1.1.β"), Ordering::Equal);
        assert_eq!(compare_versions("1.1.αα", "1.1.α"), Ordering::Equal);
    }
}
