/// Wire messages for the streaming row read
///
/// Field numbers and types follow the wide-column store's public
/// `google.bigtable.v2` definitions for `ReadRows`, so these messages talk to
/// a real server. Only the subset the reader needs is declared; prost skips
/// unknown fields on decode.

use bytes::Bytes;

/// Request for one streaming read attempt
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReadRowsRequest {
    /// Fully qualified table name
    #[prost(string, tag = "1")]
    pub table_name: String,
    /// Rows to read; unset means all rows
    #[prost(message, optional, tag = "2")]
    pub rows: Option<RowSet>,
    /// Pre-encoded row filter message.
    ///
    /// Declared as bytes: an embedded message and a bytes field share the
    /// same length-delimited encoding, so the filter passes through unparsed.
    #[prost(bytes = "bytes", optional, tag = "3")]
    pub filter: Option<Bytes>,
    /// Maximum rows to return; 0 means no limit
    #[prost(int64, tag = "4")]
    pub rows_limit: i64,
    #[prost(string, tag = "5")]
    pub app_profile_id: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RowSet {
    #[prost(bytes = "bytes", repeated, tag = "1")]
    pub row_keys: Vec<Bytes>,
    #[prost(message, repeated, tag = "2")]
    pub row_ranges: Vec<RowRange>,
}

/// A contiguous range of rows; an unset bound is unbounded
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RowRange {
    #[prost(oneof = "row_range::StartKey", tags = "1, 2")]
    pub start_key: Option<row_range::StartKey>,
    #[prost(oneof = "row_range::EndKey", tags = "3, 4")]
    pub end_key: Option<row_range::EndKey>,
}

pub mod row_range {
    use bytes::Bytes;

    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum StartKey {
        #[prost(bytes = "bytes", tag = "1")]
        StartKeyClosed(Bytes),
        #[prost(bytes = "bytes", tag = "2")]
        StartKeyOpen(Bytes),
    }

    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum EndKey {
        #[prost(bytes = "bytes", tag = "3")]
        EndKeyOpen(Bytes),
        #[prost(bytes = "bytes", tag = "4")]
        EndKeyClosed(Bytes),
    }
}

/// One message of the response stream
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReadRowsResponse {
    #[prost(message, repeated, tag = "1")]
    pub chunks: Vec<CellChunk>,
    /// Rows up to this key have been scanned, even if none were returned
    #[prost(bytes = "bytes", tag = "2")]
    pub last_scanned_row_key: Bytes,
}

/// A fragment of row data
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CellChunk {
    /// Empty when the chunk continues the previous row
    #[prost(bytes = "bytes", tag = "1")]
    pub row_key: Bytes,
    #[prost(message, optional, tag = "2")]
    pub family_name: Option<StringValue>,
    #[prost(message, optional, tag = "3")]
    pub qualifier: Option<BytesValue>,
    #[prost(int64, tag = "4")]
    pub timestamp_micros: i64,
    #[prost(string, repeated, tag = "5")]
    pub labels: Vec<String>,
    #[prost(bytes = "bytes", tag = "6")]
    pub value: Bytes,
    /// Total value size when the value is split across chunks, else 0
    #[prost(int32, tag = "7")]
    pub value_size: i32,
    #[prost(oneof = "cell_chunk::RowStatus", tags = "8, 9")]
    pub row_status: Option<cell_chunk::RowStatus>,
}

pub mod cell_chunk {
    #[derive(Clone, Copy, PartialEq, ::prost::Oneof)]
    pub enum RowStatus {
        #[prost(bool, tag = "8")]
        ResetRow(bool),
        #[prost(bool, tag = "9")]
        CommitRow(bool),
    }
}

/// `google.protobuf.StringValue`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StringValue {
    #[prost(string, tag = "1")]
    pub value: String,
}

/// `google.protobuf.BytesValue`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BytesValue {
    #[prost(bytes = "bytes", tag = "1")]
    pub value: Bytes,
}

/// Full gRPC method path of the streaming read
pub const READ_ROWS_PATH: &str = "/google.bigtable.v2.Bigtable/ReadRows";

/// Client stub for the server-streaming `ReadRows` method
pub mod bigtable_client {
    use tonic::codegen::*;

    #[derive(Debug, Clone)]
    pub struct BigtableClient<T> {
        inner: tonic::client::Grpc<T>,
    }

    impl BigtableClient<tonic::transport::Channel> {
        /// Attempt to create a new client by connecting to a given endpoint.
        pub async fn connect<D>(dst: D) -> Result<Self, tonic::transport::Error>
        where
            D: TryInto<tonic::transport::Endpoint>,
            D::Error: Into<StdError>,
        {
            let conn = tonic::transport::Endpoint::new(dst)?.connect().await?;
            Ok(Self::new(conn))
        }
    }

    impl<T> BigtableClient<T>
    where
        T: tonic::client::GrpcService<tonic::body::BoxBody>,
        T::Error: Into<StdError>,
        T::ResponseBody: Body<Data = Bytes> + Send + 'static,
        <T::ResponseBody as Body>::Error: Into<StdError> + Send,
    {
        pub fn new(inner: T) -> Self {
            let inner = tonic::client::Grpc::new(inner);
            Self { inner }
        }

        /// Open one streaming read.
        pub async fn read_rows(
            &mut self,
            request: impl tonic::IntoRequest<super::ReadRowsRequest>,
        ) -> Result<tonic::Response<tonic::codec::Streaming<super::ReadRowsResponse>>, tonic::Status>
        {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::new(
                    tonic::Code::Unknown,
                    format!("Service was not ready: {}", e.into()),
                )
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static(super::READ_ROWS_PATH);
            self.inner
                .server_streaming(request.into_request(), path, codec)
                .await
        }
    }
}

pub use bigtable_client::BigtableClient;

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn test_filter_bytes_match_embedded_message_encoding() {
        // Encode a StringValue as if it were an embedded filter message.
        let filter = StringValue {
            value: "family_name_regex".to_string(),
        };
        let embedded = filter.encode_to_vec();

        let request = ReadRowsRequest {
            table_name: "t".to_string(),
            filter: Some(Bytes::from(embedded.clone())),
            ..Default::default()
        };
        let decoded = ReadRowsRequest::decode(request.encode_to_vec().as_slice()).unwrap();
        let roundtrip = StringValue::decode(decoded.filter.unwrap().as_ref()).unwrap();
        assert_eq!(roundtrip, filter);
    }

    #[test]
    fn test_chunk_row_status_oneof() {
        let chunk = CellChunk {
            row_key: Bytes::from_static(b"r1"),
            family_name: Some(StringValue {
                value: "cf".to_string(),
            }),
            qualifier: Some(BytesValue {
                value: Bytes::from_static(b"q"),
            }),
            value: Bytes::from_static(b"v"),
            row_status: Some(cell_chunk::RowStatus::CommitRow(true)),
            ..Default::default()
        };
        let decoded = CellChunk::decode(chunk.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded.row_status, Some(cell_chunk::RowStatus::CommitRow(true)));
        assert_eq!(decoded.family_name.unwrap().value, "cf");
    }

    #[test]
    fn test_unset_rows_limit_is_zero() {
        let request = ReadRowsRequest::default();
        assert_eq!(request.rows_limit, 0);
        assert!(request.rows.is_none());
    }
}
