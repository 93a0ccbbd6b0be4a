//! Cache member encoding.
//!
//! A member is `"{seq:020}|{json}"`. The zero-padded insertion sequence makes
//! lexicographic order among equal scores match insertion order, and keeps two
//! identical observations distinct inside a sorted set. The sequence prefix is
//! added server side by the append script in [`redis_cache`](super::redis_cache);
//! this module produces the JSON body and decodes whole members.

use serde::Serialize;

use crate::{Document, Error};

pub(crate) const SEQ_WIDTH: usize = 20;
const SEPARATOR: char = '|';

#[derive(Serialize)]
struct EncodedObservation<'a> {
    url: &'a str,
    pub_date: i64,
    fetch_time: i64,
    text: &'a str,
}

/// Encode the JSON body of a sorted-set member.
pub fn encode_body(doc: &Document) -> Result<String, Error> {
    let observation =
        EncodedObservation { url: &doc.url, pub_date: doc.pub_date, fetch_time: doc.fetch_time, text: &doc.text };
    serde_json::to_string(&observation).map_err(|e| Error::Codec(e.to_string()))
}

/// Decode a sorted-set member back into an observation.
pub fn decode_member(member: &str) -> Result<Document, Error> {
    let (seq, json) = member
        .split_once(SEPARATOR)
        .ok_or_else(|| Error::Codec(format!("member has no sequence prefix: {member:.40}")))?;

    if seq.len() != SEQ_WIDTH || !seq.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::Codec(format!("malformed member sequence: {seq:.40}")));
    }

    let mut doc: Document = serde_json::from_str(json).map_err(|e| Error::Codec(e.to_string()))?;
    doc.first_fetch_time = None;
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Member as the append script assembles it.
    fn encode_member(seq: u64, doc: &Document) -> Result<String, Error> {
        Ok(format!("{seq:0width$}{SEPARATOR}{}", encode_body(doc)?, width = SEQ_WIDTH))
    }

    #[test]
    fn test_member_layout() {
        let member = encode_member(7, &Document::new("/a", 90, 150, "v1")).unwrap();
        assert!(member.starts_with("00000000000000000007|"));
        assert!(member.contains(r#""text":"v1""#));
        assert_eq!(decode_member(&member).unwrap(), Document::new("/a", 90, 150, "v1"));
    }

    #[test]
    fn test_sequence_orders_lexicographically() {
        let doc = Document::new("/a", 1, 100, "same");
        let low = encode_member(9, &doc).unwrap();
        let high = encode_member(10, &doc).unwrap();
        assert!(low < high);
    }

    #[test]
    fn test_separator_inside_text() {
        let doc = Document::new("/a?x=1|2", 1, 2, "a|b|c");
        let member = encode_member(1, &doc).unwrap();
        assert_eq!(decode_member(&member).unwrap(), doc);
    }

    #[test]
    fn test_first_fetch_time_not_encoded() {
        let doc = Document { first_fetch_time: Some(5), ..Document::new("/a", 1, 2, "t") };
        let member = encode_member(1, &doc).unwrap();
        assert!(!member.contains("first_fetch_time"));
        assert_eq!(decode_member(&member).unwrap().first_fetch_time, None);
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(matches!(decode_member("no separator"), Err(Error::Codec(_))));
        assert!(matches!(decode_member("12|{}"), Err(Error::Codec(_))));
        assert!(matches!(decode_member("0000000000000000000x|{}"), Err(Error::Codec(_))));
        assert!(matches!(decode_member("00000000000000000001|not json"), Err(Error::Codec(_))));
    }
}
