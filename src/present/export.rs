//! CSV dump of the analysis records, one row per item.

use crate::analyze::record::{AnalysisRecord, RECORD_KEYS};

/// Header is always `RECORD_KEYS`, even with no records.
pub fn records_csv(records: &[AnalysisRecord]) -> Result<String, csv::Error> {
    let mut w = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    w.write_record(RECORD_KEYS)?;
    for r in records {
        w.serialize(r)?;
    }
    let bytes = w.into_inner().map_err(|e| csv::Error::from(e.into_error()))?;
    String::from_utf8(bytes)
        .map_err(|e| csv::Error::from(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::record::Sentiment;

    #[test]
    fn header_only_for_no_records() {
        let out = records_csv(&[]).unwrap();
        assert_eq!(out.trim_end(), RECORD_KEYS.join(","));
    }

    #[test]
    fn rows_follow_header_order_and_quote_commas() {
        let r = AnalysisRecord {
            sentiment: Sentiment::Negative,
            polarity_score: -0.4,
            recession_signal: "Orders slowing, layoffs".into(),
            sector: "Tech".into(),
            ..Default::default()
        };
        let out = records_csv(&[r, AnalysisRecord::default()]).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[1],
            "Negative,N/A,-0.4,Medium,N/A,\"Orders slowing, layoffs\",N/A,N/A,Tech"
        );
        assert!(lines[2].starts_with("Neutral,N/A,0.0,Medium,"));
    }
}
