//! Client for the SkyWalking OAP GraphQL query API.
//!
//! Only the queries needed by the registered tools are implemented.

mod client;
mod model;

pub use client::{BackendError, GraphqlClient};
pub use model::{KeyValue, LogEntity, Ref, RefType, Span, Trace};

/// Fetches one trace with all of its spans.
pub const QUERY_TRACE: &str = r"query ($traceId: ID!) {
  result: queryTrace(traceId: $traceId) {
    spans {
      traceId
      segmentId
      spanId
      parentSpanId
      refs {
        traceId
        parentSegmentId
        parentSpanId
        type
      }
      serviceCode
      serviceInstanceName
      startTime
      endTime
      endpointName
      type
      peer
      component
      isError
      layer
      tags {
        key
        value
      }
      logs {
        time
        data {
          key
          value
        }
      }
    }
  }
}";
