//! Grouping of classified records into hazard runs.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::classify::ClassifiedRecord;
use crate::domain::HazardDataType;

/// A single map file of a hazard run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HazardListing {
    #[serde(rename = "dataType")]
    pub data_type: HazardDataType,
    pub file: String,
    pub path: String,
}

/// All map files belonging to one run directory of one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HazardRun {
    pub user: String,
    pub bucket: String,
    pub result_prefix: String,
    pub listings: Vec<HazardListing>,
}

/// Partitions records into runs.
///
/// Runs are ordered by result prefix, then user and bucket; records that
/// share a prefix but belong to different users land in separate runs.
/// The `(result_prefix, user, bucket)` sequence is strictly increasing, so
/// the prefix alone repeats when two users chose the same run directory.
/// Listings keep the order in which the records arrive and are deduplicated
/// on data type and path.
pub fn group<I>(records: I, file: &str) -> Vec<HazardRun>
where
    I: IntoIterator<Item = ClassifiedRecord>,
{
    let mut runs: BTreeMap<(String, String, String), (HazardRun, HashSet<(HazardDataType, String)>)> =
        BTreeMap::new();

    for record in records {
        let ClassifiedRecord {
            user,
            bucket,
            path,
            result_prefix,
            data_type,
        } = record;
        let (run, seen) = runs
            .entry((result_prefix.clone(), user.clone(), bucket.clone()))
            .or_insert_with(|| {
                (
                    HazardRun {
                        user,
                        bucket,
                        result_prefix,
                        listings: Vec::new(),
                    },
                    HashSet::new(),
                )
            });
        if seen.insert((data_type, path.clone())) {
            run.listings.push(HazardListing {
                data_type,
                file: file.to_string(),
                path,
            });
        }
    }

    runs.into_values().map(|(run, _)| run).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Imt, SourceType};

    fn record(user: &str, prefix: &str, path: &str, data_type: HazardDataType) -> ClassifiedRecord {
        ClassifiedRecord {
            user: user.into(),
            bucket: "b".into(),
            path: path.into(),
            result_prefix: prefix.into(),
            data_type,
        }
    }

    #[test]
    fn runs_are_sorted_by_prefix_and_listings_keep_arrival_order() {
        let runs = group(
            vec![
                record("bob", "run2", "x/run2/SA1P0", HazardDataType::Total(Imt::SA1P0)),
                record("bob", "run1", "x/run1/PGA/FAULT", HazardDataType::Source(SourceType::FAULT, Imt::PGA)),
                record("bob", "run2", "x/run2/PGA", HazardDataType::Total(Imt::PGA)),
                record("bob", "run1", "x/run1/PGA", HazardDataType::Total(Imt::PGA)),
            ],
            "map.csv",
        );

        let prefixes: Vec<_> = runs.iter().map(|r| r.result_prefix.as_str()).collect();
        assert_eq!(prefixes, vec!["run1", "run2"]);
        let run2: Vec<_> = runs[1].listings.iter().map(|l| l.path.as_str()).collect();
        assert_eq!(run2, vec!["x/run2/SA1P0", "x/run2/PGA"]);
        assert_eq!(runs[0].listings[0].data_type.kind(), crate::domain::DataType::Source);
        assert!(runs.iter().flat_map(|r| &r.listings).all(|l| l.file == "map.csv"));
    }

    #[test]
    fn duplicate_listings_are_dropped() {
        let dup = record("bob", "run1", "x/run1/PGA", HazardDataType::Total(Imt::PGA));
        let runs = group(vec![dup.clone(), dup], "map.csv");
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].listings.len(), 1);
    }

    #[test]
    fn same_prefix_for_different_users_stays_separate() {
        let runs = group(
            vec![
                record("carol", "2018", "a/2018/PGA", HazardDataType::Total(Imt::PGA)),
                record("alice", "2018", "b/2018/PGA", HazardDataType::Total(Imt::PGA)),
            ],
            "map.csv",
        );
        let users: Vec<_> = runs.iter().map(|r| r.user.as_str()).collect();
        assert_eq!(users, vec!["alice", "carol"]);
    }

    #[test]
    fn run_keys_strictly_increase_by_prefix_then_user() {
        let runs = group(
            vec![
                record("bob", "2018", "c/2018/PGA", HazardDataType::Total(Imt::PGA)),
                record("alice", "2014", "a/2014/PGA", HazardDataType::Total(Imt::PGA)),
                record("alice", "2018", "b/2018/PGA", HazardDataType::Total(Imt::PGA)),
                record("bob", "2018", "c/2018/SA1P0", HazardDataType::Total(Imt::SA1P0)),
            ],
            "map.csv",
        );
        let keys: Vec<_> = runs
            .iter()
            .map(|r| (r.result_prefix.as_str(), r.user.as_str()))
            .collect();
        assert_eq!(keys, vec![("2014", "alice"), ("2018", "alice"), ("2018", "bob")]);
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(runs[2].listings.len(), 2);
    }

    #[test]
    fn result_prefix_is_not_serialized_inside_listings() {
        let runs = group(
            vec![record("bob", "run1", "x/run1/PGA", HazardDataType::Total(Imt::PGA))],
            "map.csv",
        );
        let json = serde_json::to_value(&runs[0]).unwrap();
        assert_eq!(json["resultPrefix"], "run1");
        assert_eq!(
            json["listings"][0],
            serde_json::json!({
                "dataType": {"imt": "PGA", "type": "TOTAL", "sourceType": "PGA"},
                "file": "map.csv",
                "path": "x/run1/PGA"
            })
        );
    }
}
