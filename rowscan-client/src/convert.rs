/// Conversions between wire messages and core types
use bytes::Bytes;
use rowscan_core::{CellChunk, ChunkStatus, RowKey, RowRange, RowSet};
use rowscan_proto as proto;
use std::ops::Bound;

use crate::request::ReadParams;

/// Convert a core row set to its wire form. "All rows" is an unset field.
pub fn row_set_to_proto(set: &RowSet) -> Option<proto::RowSet> {
    if set.is_all_rows() {
        return None;
    }
    Some(proto::RowSet {
        row_keys: set.row_keys().map(|k| k.clone().into_bytes()).collect(),
        row_ranges: set.row_ranges().iter().map(row_range_to_proto).collect(),
    })
}

pub fn row_range_to_proto(range: &RowRange) -> proto::RowRange {
    use proto::row_range::{EndKey, StartKey};

    let start_key = match range.start() {
        Bound::Unbounded => None,
        Bound::Included(k) => Some(StartKey::StartKeyClosed(k.clone().into_bytes())),
        Bound::Excluded(k) => Some(StartKey::StartKeyOpen(k.clone().into_bytes())),
    };
    let end_key = match range.end() {
        Bound::Unbounded => None,
        Bound::Included(k) => Some(EndKey::EndKeyClosed(k.clone().into_bytes())),
        Bound::Excluded(k) => Some(EndKey::EndKeyOpen(k.clone().into_bytes())),
    };
    proto::RowRange { start_key, end_key }
}

pub fn proto_row_range_to_core(range: proto::RowRange) -> RowRange {
    use proto::row_range::{EndKey, StartKey};

    let start = match range.start_key {
        None => Bound::Unbounded,
        Some(StartKey::StartKeyClosed(k)) => Bound::Included(RowKey::from(k)),
        Some(StartKey::StartKeyOpen(k)) => Bound::Excluded(RowKey::from(k)),
    };
    let end = match range.end_key {
        None => Bound::Unbounded,
        Some(EndKey::EndKeyClosed(k)) => Bound::Included(RowKey::from(k)),
        Some(EndKey::EndKeyOpen(k)) => Bound::Excluded(RowKey::from(k)),
    };
    RowRange::new(start, end)
}

pub fn proto_row_set_to_core(set: Option<proto::RowSet>) -> RowSet {
    let Some(set) = set else {
        return RowSet::all_rows();
    };
    let mut result = RowSet::from_keys(set.row_keys);
    for range in set.row_ranges {
        result.append_range(proto_row_range_to_core(range));
    }
    result
}

/// Convert a wire chunk. Empty keys and unset wrappers mean "inherit".
pub fn proto_chunk_to_core(chunk: proto::CellChunk) -> CellChunk {
    use proto::cell_chunk::RowStatus;

    let status = match chunk.row_status {
        Some(RowStatus::CommitRow(true)) => ChunkStatus::CommitRow,
        Some(RowStatus::ResetRow(true)) => ChunkStatus::ResetRow,
        _ => ChunkStatus::InProgress,
    };
    CellChunk {
        row_key: non_empty(chunk.row_key).map(RowKey::from),
        family: chunk.family_name.map(|f| f.value),
        qualifier: chunk.qualifier.map(|q| q.value),
        timestamp_micros: chunk.timestamp_micros,
        labels: chunk.labels,
        value: chunk.value,
        value_size: chunk.value_size,
        status,
    }
}

/// Convert a core chunk to its wire form (used by test servers and fakes).
pub fn core_chunk_to_proto(chunk: CellChunk) -> proto::CellChunk {
    use proto::cell_chunk::RowStatus;

    let row_status = match chunk.status {
        ChunkStatus::InProgress => None,
        ChunkStatus::CommitRow => Some(RowStatus::CommitRow(true)),
        ChunkStatus::ResetRow => Some(RowStatus::ResetRow(true)),
    };
    proto::CellChunk {
        row_key: chunk.row_key.map(RowKey::into_bytes).unwrap_or_default(),
        family_name: chunk.family.map(|value| proto::StringValue { value }),
        qualifier: chunk.qualifier.map(|value| proto::BytesValue { value }),
        timestamp_micros: chunk.timestamp_micros,
        labels: chunk.labels,
        value: chunk.value,
        value_size: chunk.value_size,
        row_status,
    }
}

/// Split a response into core chunks and the scanned-key hint.
pub fn proto_response_to_core(response: proto::ReadRowsResponse) -> (Vec<CellChunk>, Option<RowKey>) {
    let chunks = response.chunks.into_iter().map(proto_chunk_to_core).collect();
    let scanned = non_empty(response.last_scanned_row_key).map(RowKey::from);
    (chunks, scanned)
}

/// Build the request of one attempt.
pub fn read_rows_request(
    params: &ReadParams,
    row_set: &RowSet,
    rows_limit: Option<u64>,
) -> proto::ReadRowsRequest {
    proto::ReadRowsRequest {
        table_name: params.table_name.clone(),
        rows: row_set_to_proto(row_set),
        filter: params.filter.clone(),
        rows_limit: rows_limit
            .map(|n| i64::try_from(n).unwrap_or(i64::MAX))
            .unwrap_or(0),
        app_profile_id: params.app_profile_id.clone().unwrap_or_default(),
    }
}

fn non_empty(bytes: Bytes) -> Option<Bytes> {
    if bytes.is_empty() {
        None
    } else {
        Some(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_rows_is_unset() {
        assert!(row_set_to_proto(&RowSet::all_rows()).is_none());
        assert!(proto_row_set_to_core(None).is_all_rows());
    }

    #[test]
    fn test_row_set_roundtrip() {
        let set = RowSet::from_keys(["a", "b"])
            .with_range(RowRange::right_open("c", "d"))
            .with_range(RowRange::after("x"))
            .with_range(RowRange::ending_at("b"));
        assert_eq!(proto_row_set_to_core(row_set_to_proto(&set)), set);
    }

    #[test]
    fn test_none_row_set_stays_empty_on_the_wire() {
        let wire = row_set_to_proto(&RowSet::none()).unwrap();
        assert_eq!(wire.row_ranges.len(), 1);
        assert!(proto_row_set_to_core(Some(wire)).is_empty());
    }

    #[test]
    fn test_chunk_conversion_inherits_on_empty_key() {
        let wire = proto::CellChunk {
            value: Bytes::from_static(b"v"),
            row_status: Some(proto::cell_chunk::RowStatus::CommitRow(true)),
            ..Default::default()
        };
        let chunk = proto_chunk_to_core(wire);
        assert_eq!(chunk.row_key, None);
        assert_eq!(chunk.family, None);
        assert!(chunk.is_commit());
    }

    #[test]
    fn test_chunk_roundtrip() {
        let chunk = CellChunk::new()
            .row_key("r1")
            .family("cf")
            .qualifier("q")
            .timestamp(7)
            .label("l")
            .value("abc")
            .split(6);
        assert_eq!(proto_chunk_to_core(core_chunk_to_proto(chunk.clone())), chunk);
    }

    #[test]
    fn test_false_row_status_is_in_progress() {
        let wire = proto::CellChunk {
            row_status: Some(proto::cell_chunk::RowStatus::CommitRow(false)),
            ..Default::default()
        };
        assert_eq!(proto_chunk_to_core(wire).status, ChunkStatus::InProgress);
    }

    #[test]
    fn test_request_limit_encoding() {
        let params = ReadParams::new("projects/p/instances/i/tables/t");
        let request = read_rows_request(&params, &RowSet::all_rows(), None);
        assert_eq!(request.rows_limit, 0);
        let request = read_rows_request(&params, &RowSet::all_rows(), Some(5));
        assert_eq!(request.rows_limit, 5);
        assert_eq!(request.table_name, "projects/p/instances/i/tables/t");
    }

    #[test]
    fn test_scanned_hint_extraction() {
        let response = proto::ReadRowsResponse {
            chunks: vec![],
            last_scanned_row_key: Bytes::from_static(b"r9"),
        };
        let (chunks, scanned) = proto_response_to_core(response);
        assert!(chunks.is_empty());
        assert_eq!(scanned, Some(RowKey::from("r9")));
    }
}
