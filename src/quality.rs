//! Record validity rules shared by every execution strategy.

use crate::constants::quality::{COUNTRY_CODE_LEN, FORBIDDEN_COUNTRY_CHARS};
use crate::data::{StreamRecord, ValidRecord};
use crate::errors::ChartError;

/// Accept `record` when no field is null and the country has exactly two characters,
/// none of them a path separator.
pub fn validate(record: StreamRecord) -> Option<ValidRecord> {
    let StreamRecord {
        song_id: Some(song_id),
        user_id: Some(user_id),
        country: Some(country),
    } = record
    else {
        return None;
    };
    if country.chars().count() != COUNTRY_CODE_LEN
        || country.contains(FORBIDDEN_COUNTRY_CHARS)
    {
        return None;
    }
    Some(ValidRecord::new(song_id, user_id, country))
}

/// Filter an in-memory record set, returning the valid records and the rejected count.
pub fn filter_records(records: Vec<StreamRecord>) -> (Vec<ValidRecord>, u64) {
    let total = records.len() as u64;
    let valid: Vec<ValidRecord> = records.into_iter().filter_map(validate).collect();
    let rejected = total - valid.len() as u64;
    (valid, rejected)
}

/// Lazy quality filter over a fallible record stream.
///
/// Errors from the underlying stream are passed through untouched.
pub struct QualityFilter<I> {
    inner: I,
    accepted: u64,
    rejected: u64,
}

impl<I> QualityFilter<I> {
    /// Wrap a record stream.
    pub fn new(inner: I) -> Self {
        Self {
            inner,
            accepted: 0,
            rejected: 0,
        }
    }

    /// Records passed through so far.
    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    /// Records excluded so far.
    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    /// Borrow the wrapped stream (for example to read its counters).
    pub fn get_ref(&self) -> &I {
        &self.inner
    }
}

impl<I> Iterator for QualityFilter<I>
where
    I: Iterator<Item = Result<StreamRecord, ChartError>>,
{
    type Item = Result<ValidRecord, ChartError>;

    fn next(&mut self) -> Option<Self::Item> {
        for item in self.inner.by_ref() {
            match item {
                Ok(record) => match validate(record) {
                    Some(valid) => {
                        self.accepted += 1;
                        return Some(Ok(valid));
                    }
                    None => self.rejected += 1,
                },
                Err(err) => return Some(Err(err)),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(song: Option<&str>, user: Option<&str>, country: Option<&str>) -> StreamRecord {
        StreamRecord::new(song, user, country)
    }

    #[test]
    fn accepts_complete_two_letter_records() {
        let valid = validate(record(Some("S1"), Some("U1"), Some("US"))).unwrap();
        assert_eq!(valid.song_id(), "S1");
        assert_eq!(valid.user_id(), "U1");
        assert_eq!(valid.country(), "US");
    }

    #[test]
    fn rejects_bad_country_lengths() {
        for country in ["U", "USA", "", "U S"] {
            assert!(validate(record(Some("S1"), Some("U1"), Some(country))).is_none());
        }
    }

    #[test]
    fn country_length_counts_characters_not_bytes() {
        assert!(validate(record(Some("S1"), Some("U1"), Some("ÉÜ"))).is_some());
    }

    #[test]
    fn rejects_countries_that_cannot_name_a_file() {
        for country in ["A/", "\\B", "/.", "C\0"] {
            assert!(
                validate(record(Some("S1"), Some("U1"), Some(country))).is_none(),
                "{country:?}"
            );
        }
        assert!(validate(record(Some("S1"), Some("U1"), Some(".."))).is_some());
    }

    #[test]
    fn rejects_any_null_field() {
        assert!(validate(record(None, Some("U1"), Some("US"))).is_none());
        assert!(validate(record(Some("S1"), None, Some("US"))).is_none());
        assert!(validate(record(Some("S1"), Some("U1"), None)).is_none());
    }

    #[test]
    fn lazy_and_batch_filters_agree() {
        let records = vec![
            record(Some("S1"), Some("U1"), Some("US")),
            record(Some("S2"), None, Some("US")),
            record(Some("S3"), Some("U3"), Some("GBR")),
            record(Some("S4"), Some("U4"), Some("FR")),
        ];
        let (batch, rejected) = filter_records(records.clone());
        let mut lazy = QualityFilter::new(records.into_iter().map(Ok::<_, ChartError>));
        let streamed: Vec<ValidRecord> = lazy.by_ref().map(Result::unwrap).collect();
        assert_eq!(batch, streamed);
        assert_eq!(rejected, 2);
        assert_eq!(lazy.rejected(), 2);
        assert_eq!(lazy.accepted(), 2);
    }

    #[test]
    fn lazy_filter_passes_errors_through() {
        let items: Vec<Result<StreamRecord, ChartError>> = vec![
            Err(ChartError::Configuration("boom".to_string())),
            Ok(record(Some("S1"), Some("U1"), Some("US"))),
        ];
        let mut filter = QualityFilter::new(items.into_iter());
        assert!(filter.next().unwrap().is_err());
        assert!(filter.next().unwrap().is_ok());
        assert!(filter.next().is_none());
    }
}
