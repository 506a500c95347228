//! Key classifier: turns the path segments of a bucket key into a
//! [`ClassifiedRecord`].
//!
//! A qualifying key has the shape
//! `<user>/<run-dir-1>/.../<run-dir-k>/<imt>/<classifier>/<sentinel>`. Counting
//! from the tail, with the sentinel excluded:
//!
//! | position | total (`classifier` is an IMT) | source / gmm |
//! |----------|--------------------------------|--------------|
//! | -1       | classifier = imt               | classifier   |
//! | -2       | result prefix                  | imt          |
//! | -3       | -                              | result prefix|
//!
//! Classifier membership is checked in the order source type, ground motion
//! model, IMT.

use tracing::trace;

use crate::domain::{ensure_disjoint, Gmm, HazardDataType, Imt, SourceType};
use crate::error::{IndexError, Result};

/// Minimum number of segments after the user, sentinel included.
const MIN_SEGMENTS_AFTER_USER: usize = 4;

/// A classified bucket key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedRecord {
    pub user: String,
    pub bucket: String,
    /// Slash-joined segments between the user and the sentinel.
    pub path: String,
    /// Name of the run directory the result belongs to. Grouping key only.
    pub result_prefix: String,
    pub data_type: HazardDataType,
}

/// Classifies the segments of a key with the sentinel already removed.
///
/// `segments[0]` is the user; the last segment is the classifier.
pub fn classify_segments(bucket: &str, segments: &[&str]) -> Result<ClassifiedRecord> {
    ensure_disjoint()?;

    let key = || segments.join("/");
    if segments.iter().any(|s| s.is_empty()) {
        return Err(IndexError::malformed(key(), "empty path segment"));
    }
    // The sentinel counts towards the minimum but is not part of `segments`.
    if segments.len() < MIN_SEGMENTS_AFTER_USER {
        return Err(IndexError::malformed(
            key(),
            format!(
                "expected at least {MIN_SEGMENTS_AFTER_USER} segments after the user, found {}",
                segments.len()
            ),
        ));
    }

    let n = segments.len();
    let classifier = segments[n - 1];
    let parse_imt = |segment: &str| {
        Imt::lookup(segment).ok_or_else(|| {
            IndexError::malformed(key(), format!("[{segment}] is not an intensity measure type"))
        })
    };

    let (data_type, result_prefix) = if let Some(source) = SourceType::lookup(classifier) {
        let imt = parse_imt(segments[n - 2])?;
        (HazardDataType::Source(source, imt), segments[n - 3])
    } else if let Some(gmm) = Gmm::lookup(classifier) {
        let imt = parse_imt(segments[n - 2])?;
        (HazardDataType::Gmm(gmm, imt), segments[n - 3])
    } else if let Some(imt) = Imt::lookup(classifier) {
        (HazardDataType::Total(imt), segments[n - 2])
    } else {
        return Err(IndexError::UnknownClassifier(classifier.to_string()));
    };

    let record = ClassifiedRecord {
        user: segments[0].to_string(),
        bucket: bucket.to_string(),
        path: segments[1..].join("/"),
        result_prefix: result_prefix.to_string(),
        data_type,
    };
    trace!(?record, "Classified key");
    Ok(record)
}

/// Classifies a listed common prefix.
///
/// Returns `Ok(None)` when the terminal segment is not `sentinel`; such keys
/// are not hazard maps and are ignored.
pub fn classify_key(bucket: &str, key: &str, sentinel: &str) -> Result<Option<ClassifiedRecord>> {
    let key = key.strip_suffix('/').unwrap_or(key);
    let segments: Vec<&str> = key.split('/').collect();
    match segments.split_last() {
        Some((last, rest)) if *last == sentinel => classify_segments(bucket, rest).map(Some),
        _ => Ok(None),
    }
}
