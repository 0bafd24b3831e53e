///////////////////////////////////////////////////////////////////////////////
// Components /////////////////////////////////////////////////////////////////

/// An empty message.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Empty {}

///////////////////////////////////////////////////////////////////////////////
// Atomic Counter /////////////////////////////////////////////////////////////

/// The value of a counter.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CounterValue {
    #[prost(int64, tag = "1")]
    pub value: i64,
}
/// A request to set the value of a counter.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CounterSetRequest {
    #[prost(int64, tag = "1")]
    pub value: i64,
}
/// A request to set the value of a counter only if it holds the expected value.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CounterCompareAndSetRequest {
    #[prost(int64, tag = "1")]
    pub expect: i64,
    #[prost(int64, tag = "2")]
    pub update: i64,
}
/// The outcome of a compare-and-set request.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CounterCompareAndSetResponse {
    #[prost(bool, tag = "1")]
    pub succeeded: bool,
}
/// A request to add a delta to the value of a counter.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CounterAddRequest {
    #[prost(int64, tag = "1")]
    pub delta: i64,
}

///////////////////////////////////////////////////////////////////////////////
// Partition State ////////////////////////////////////////////////////////////

/// The state of all primitive services of a partition, as captured in a snapshot.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PartitionSnapshot {
    #[prost(message, repeated, tag = "1")]
    pub services: ::prost::alloc::vec::Vec<ServiceSnapshot>,
}
/// The state of a single primitive service.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ServiceSnapshot {
    /// The name of the primitive backed by the service.
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    /// The type of the primitive backed by the service.
    #[prost(string, tag = "2")]
    pub primitive_type: ::prost::alloc::string::String,
    /// The service's own encoding of its state.
    #[prost(bytes = "vec", tag = "3")]
    pub data: ::prost::alloc::vec::Vec<u8>,
}
