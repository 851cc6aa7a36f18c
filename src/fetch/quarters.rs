// src/fetch/quarters.rs
//! Works out which archive under a year-partitioned listing holds which
//! fiscal quarter, and picks the newest distinct quarters.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, instrument};
use url::Url;

use super::listing::{list_archives, list_years, ListingClient};
use crate::error::DiscoveryError;

/// Fiscal quarter, 1 to 4.
pub type QuarterKey = u8;

/// `1T2023.zip`
static QUARTER_FIRST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([1-4])T\d{4}\.zip$").expect("quarter pattern should compile"));
/// `2023_1_trimestre.zip`
static YEAR_FIRST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}_([1-4])_trimestre\.zip$").expect("quarter pattern should compile")
});

/// One selected archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveLocation {
    pub year: i32,
    pub quarter: QuarterKey,
    pub filename: String,
}

impl ArchiveLocation {
    /// `<year>/<filename>`, relative to the listing root.
    pub fn relative_path(&self) -> String {
        format!("{}/{}", self.year, self.filename)
    }

    pub fn url(&self, base: &Url) -> Result<Url, DiscoveryError> {
        join(base, &self.relative_path())
    }
}

fn join(base: &Url, path: &str) -> Result<Url, DiscoveryError> {
    base.join(path).map_err(|source| DiscoveryError::InvalidUrl {
        url: format!("{}{}", base, path),
        source,
    })
}

/// Quarter named by an archive file name; the whole name must match.
pub fn parse_quarter(filename: &str) -> Option<QuarterKey> {
    [&*QUARTER_FIRST, &*YEAR_FIRST]
        .iter()
        .find_map(|re| re.captures(filename))
        .and_then(|caps| caps[1].parse().ok())
}

/// Claim every quarter found in one year's listing that no newer year holds.
/// Files are taken in listing order, so the first file listed for a quarter
/// wins.
fn claim_quarters(
    filenames: &[String],
    year: i32,
    claimed: &mut BTreeMap<QuarterKey, ArchiveLocation>,
) {
    for name in filenames {
        let Some(quarter) = parse_quarter(name) else {
            continue;
        };
        claimed.entry(quarter).or_insert_with(|| {
            debug!(year, quarter, filename = %name, "claimed quarter");
            ArchiveLocation {
                year,
                quarter,
                filename: name.clone(),
            }
        });
    }
}

/// Up to `count` archives for distinct quarters, highest quarter first.
///
/// Years are walked down from the newest listed one until `count` quarters
/// are claimed, so a quarter always comes from the newest year that has it.
/// The walk stops at the first year missing from the listing, which may leave
/// fewer than `count` results. A year listing with no recognisable archives
/// is passed over.
#[instrument(level = "info", skip(client, base), fields(base = %base))]
pub async fn resolve<C: ListingClient + ?Sized>(
    client: &C,
    base: &Url,
    count: usize,
) -> Result<Vec<ArchiveLocation>, DiscoveryError> {
    if count == 0 {
        return Ok(Vec::new());
    }

    let available: HashSet<i32> = list_years(client, base)
        .await?
        .iter()
        .filter_map(|y| y.parse().ok())
        .collect();
    let mut year = available
        .iter()
        .copied()
        .max()
        .ok_or_else(|| DiscoveryError::EmptyListing {
            url: base.to_string(),
        })?;

    let mut claimed: BTreeMap<QuarterKey, ArchiveLocation> = BTreeMap::new();
    while claimed.len() < count {
        if !available.contains(&year) {
            info!(year, found = claimed.len(), "no listing for year, stopping");
            break;
        }
        let dir = join(base, &format!("{}/", year))?;
        let names = list_archives(client, &dir).await?;
        claim_quarters(&names, year, &mut claimed);
        year -= 1;
    }

    let selected: Vec<ArchiveLocation> = claimed.into_values().rev().take(count).collect();
    info!(
        selected = ?selected.iter().map(ArchiveLocation::relative_path).collect::<Vec<_>>(),
        "resolved quarters"
    );
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const BASE: &str = "http://files.test/demonstracoes_contabeis/";

    /// Serves canned anchors per URL; unknown URLs are unreachable.
    struct FakeListing {
        pages: HashMap<String, Vec<String>>,
        calls: AtomicUsize,
    }

    impl FakeListing {
        fn new(pages: &[(&str, &[&str])]) -> Self {
            let pages = pages
                .iter()
                .map(|(path, anchors)| {
                    (
                        format!("{}{}", BASE, path),
                        anchors.iter().map(|a| a.to_string()).collect(),
                    )
                })
                .collect();
            Self {
                pages,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ListingClient for FakeListing {
        async fn anchors(&self, url: &Url) -> Result<Vec<String>, DiscoveryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.pages
                .get(url.as_str())
                .cloned()
                .ok_or_else(|| DiscoveryError::Unreachable {
                    url: url.to_string(),
                    reason: "404".into(),
                })
        }
    }

    fn base() -> Url {
        Url::parse(BASE).unwrap()
    }

    fn picked(locs: &[ArchiveLocation]) -> Vec<String> {
        locs.iter().map(ArchiveLocation::relative_path).collect()
    }

    fn three_years() -> FakeListing {
        FakeListing::new(&[
            ("", &["../", "2021/", "2022/", "2023/", "leiame/"]),
            ("2023/", &["../", "1T2023.zip", "2T2023.zip"]),
            (
                "2022/",
                &["1T2022.zip", "2T2022.zip", "3T2022.zip", "4T2022.zip"],
            ),
            ("2021/", &["2021_1_trimestre.zip"]),
        ])
    }

    #[test]
    fn parses_both_naming_conventions() {
        assert_eq!(parse_quarter("1T2023.zip"), Some(1));
        assert_eq!(parse_quarter("2023_4_trimestre.zip"), Some(4));
        assert_eq!(parse_quarter("x1T2023.zip"), None);
        assert_eq!(parse_quarter("1T2023.zip.bak"), None);
        assert_eq!(parse_quarter("5T2023.zip"), None);
        assert_eq!(parse_quarter("2023_1_trimestre.csv"), None);
    }

    #[test]
    fn location_paths() {
        let loc = ArchiveLocation {
            year: 2023,
            quarter: 1,
            filename: "1T2023.zip".into(),
        };
        assert_eq!(
            loc.url(&base()).unwrap().as_str(),
            "http://files.test/demonstracoes_contabeis/2023/1T2023.zip"
        );
    }

    #[tokio::test]
    async fn newest_three_quarters() {
        let client = three_years();
        let got = resolve(&client, &base(), 3).await.unwrap();
        assert_eq!(
            picked(&got),
            vec!["2022/4T2022.zip", "2022/3T2022.zip", "2023/2T2023.zip"]
        );
        // root + 2023 + 2022; 2021 never listed
        assert_eq!(client.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn newer_year_keeps_its_quarters() {
        let client = FakeListing::new(&[
            ("", &["2022/", "2023/"]),
            ("2023/", &["3T2023.zip"]),
            ("2022/", &["1T2022.zip", "3T2022.zip", "2T2022.zip"]),
        ]);
        let got = resolve(&client, &base(), 2).await.unwrap();
        assert_eq!(picked(&got), vec!["2023/3T2023.zip", "2022/2T2022.zip"]);
    }

    #[tokio::test]
    async fn resolving_twice_is_identical() {
        let client = three_years();
        let first = resolve(&client, &base(), 4).await.unwrap();
        let second = resolve(&client, &base(), 4).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 4);
    }

    #[tokio::test]
    async fn first_listed_duplicate_wins() {
        let client = FakeListing::new(&[
            ("", &["2023/"]),
            ("2023/", &["2023_1_trimestre.zip", "1T2023.zip"]),
        ]);
        let got = resolve(&client, &base(), 1).await.unwrap();
        assert_eq!(picked(&got), vec!["2023/2023_1_trimestre.zip"]);
    }

    #[tokio::test]
    async fn stops_at_missing_year_with_short_result() {
        let client = FakeListing::new(&[
            ("", &["2021/", "2023/"]),
            ("2023/", &["1T2023.zip", "2T2023.zip"]),
            ("2021/", &["1T2021.zip", "3T2021.zip"]),
        ]);
        let got = resolve(&client, &base(), 3).await.unwrap();
        assert_eq!(picked(&got), vec!["2023/2T2023.zip", "2023/1T2023.zip"]);
    }

    #[tokio::test]
    async fn year_without_archives_is_passed_over() {
        let client = FakeListing::new(&[
            ("", &["2022/", "2023/"]),
            ("2023/", &["leiame.txt"]),
            ("2022/", &["3T2022.zip"]),
        ]);
        let got = resolve(&client, &base(), 2).await.unwrap();
        assert_eq!(picked(&got), vec!["2022/3T2022.zip"]);
    }

    #[tokio::test]
    async fn empty_or_unreachable_listing_fails() {
        let empty = FakeListing::new(&[("", &["../", "leiame/"])]);
        assert!(matches!(
            resolve(&empty, &base(), 3).await,
            Err(DiscoveryError::EmptyListing { .. })
        ));

        let nothing = FakeListing::new(&[]);
        assert!(matches!(
            resolve(&nothing, &base(), 3).await,
            Err(DiscoveryError::Unreachable { .. })
        ));
    }

    #[tokio::test]
    async fn zero_count_fetches_nothing() {
        let client = three_years();
        assert!(resolve(&client, &base(), 0).await.unwrap().is_empty());
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }
}
