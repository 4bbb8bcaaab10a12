//! Wire types and gRPC stubs for the remote execution API surface served by the frontend.
//!
//! Messages are declared with `prost` derives and carry the field tags of the upstream
//! `.proto` definitions, so they interoperate with any conforming client or scheduler.
//! Client and server stubs for the `Capabilities` and `Execution` services are generated
//! at build time (see `build.rs`).
//!
//! Only the fields the routing layer reads are modelled. The generated stubs exchange
//! [`Envelope`]s through [`codec::EnvelopeCodec`], so messages decoded off the wire are
//! relayed byte for byte, including fields missing from the types below.
//! Operation payloads (`metadata`, `response`) stay opaque as [`prost_types::Any`].
pub mod codec;
mod envelope;
pub use envelope::Envelope;


pub mod google {
    pub mod rpc {
        /// `google.rpc.Status`.
        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct Status {
            #[prost(int32, tag = "1")]
            pub code: i32,
            #[prost(string, tag = "2")]
            pub message: String,
            #[prost(message, repeated, tag = "3")]
            pub details: Vec<::prost_types::Any>,
        }
    }

    pub mod longrunning {
        /// `google.longrunning.Operation`: one progress update of an execution.
        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct Operation {
            /// Server-assigned name, used by `WaitExecution` to reattach.
            #[prost(string, tag = "1")]
            pub name: String,
            #[prost(message, optional, tag = "2")]
            pub metadata: Option<::prost_types::Any>,
            #[prost(bool, tag = "3")]
            pub done: bool,
            #[prost(oneof = "operation::Result", tags = "4, 5")]
            pub result: Option<operation::Result>,
        }

        pub mod operation {
            #[derive(Clone, PartialEq, ::prost::Oneof)]
            pub enum Result {
                #[prost(message, tag = "4")]
                Error(super::super::rpc::Status),
                #[prost(message, tag = "5")]
                Response(::prost_types::Any),
            }
        }
    }
}

pub mod build {
    pub mod bazel {
        pub mod semver {
            /// `build.bazel.semver.SemVer`.
            #[derive(Clone, PartialEq, ::prost::Message)]
            pub struct SemVer {
                #[prost(int32, tag = "1")]
                pub major: i32,
                #[prost(int32, tag = "2")]
                pub minor: i32,
                #[prost(int32, tag = "3")]
                pub patch: i32,
                #[prost(string, tag = "4")]
                pub prerelease: String,
            }
        }

        pub mod remote {
            pub mod execution {
                pub mod v2 {
                    use super::super::super::semver::SemVer;

                    #[derive(Clone, PartialEq, ::prost::Message)]
                    pub struct Digest {
                        #[prost(string, tag = "1")]
                        pub hash: String,
                        #[prost(int64, tag = "2")]
                        pub size_bytes: i64,
                    }

                    pub mod digest_function {
                        #[derive(
                            Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration,
                        )]
                        #[repr(i32)]
                        pub enum Value {
                            Unknown = 0,
                            Sha256 = 1,
                            Sha1 = 2,
                            Md5 = 3,
                            Vso = 4,
                            Sha384 = 5,
                            Sha512 = 6,
                            Murmur3 = 7,
                            Sha256tree = 8,
                            Blake3 = 9,
                        }
                    }

                    pub mod symlink_absolute_path_strategy {
                        #[derive(
                            Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration,
                        )]
                        #[repr(i32)]
                        pub enum Value {
                            Unknown = 0,
                            Disallowed = 1,
                            Allowed = 2,
                        }
                    }

                    #[derive(Clone, PartialEq, ::prost::Message)]
                    pub struct ExecutionPolicy {
                        #[prost(int32, tag = "1")]
                        pub priority: i32,
                    }

                    #[derive(Clone, PartialEq, ::prost::Message)]
                    pub struct ResultsCachePolicy {
                        #[prost(int32, tag = "1")]
                        pub priority: i32,
                    }

                    /// Request to run an action, identified by its digest.
                    #[derive(Clone, PartialEq, ::prost::Message)]
                    pub struct ExecuteRequest {
                        #[prost(string, tag = "1")]
                        pub instance_name: String,
                        #[prost(bool, tag = "3")]
                        pub skip_cache_lookup: bool,
                        #[prost(message, optional, tag = "6")]
                        pub action_digest: Option<Digest>,
                        #[prost(message, optional, tag = "7")]
                        pub execution_policy: Option<ExecutionPolicy>,
                        #[prost(message, optional, tag = "8")]
                        pub results_cache_policy: Option<ResultsCachePolicy>,
                        #[prost(enumeration = "digest_function::Value", tag = "9")]
                        pub digest_function: i32,
                    }

                    /// Request to reattach to an operation started by an earlier `Execute`.
                    #[derive(Clone, PartialEq, ::prost::Message)]
                    pub struct WaitExecutionRequest {
                        #[prost(string, tag = "1")]
                        pub name: String,
                    }

                    #[derive(Clone, PartialEq, ::prost::Message)]
                    pub struct GetCapabilitiesRequest {
                        #[prost(string, tag = "1")]
                        pub instance_name: String,
                    }

                    #[derive(Clone, PartialEq, ::prost::Message)]
                    pub struct ServerCapabilities {
                        #[prost(message, optional, tag = "1")]
                        pub cache_capabilities: Option<CacheCapabilities>,
                        #[prost(message, optional, tag = "2")]
                        pub execution_capabilities: Option<ExecutionCapabilities>,
                        #[prost(message, optional, tag = "3")]
                        pub deprecated_api_version: Option<SemVer>,
                        #[prost(message, optional, tag = "4")]
                        pub low_api_version: Option<SemVer>,
                        #[prost(message, optional, tag = "5")]
                        pub high_api_version: Option<SemVer>,
                    }

                    #[derive(Clone, PartialEq, ::prost::Message)]
                    pub struct CacheCapabilities {
                        #[prost(enumeration = "digest_function::Value", repeated, tag = "1")]
                        pub digest_functions: Vec<i32>,
                        #[prost(message, optional, tag = "2")]
                        pub action_cache_update_capabilities: Option<ActionCacheUpdateCapabilities>,
                        #[prost(message, optional, tag = "3")]
                        pub cache_priority_capabilities: Option<PriorityCapabilities>,
                        #[prost(int64, tag = "4")]
                        pub max_batch_total_size_bytes: i64,
                        #[prost(enumeration = "symlink_absolute_path_strategy::Value", tag = "5")]
                        pub symlink_absolute_path_strategy: i32,
                    }

                    #[derive(Clone, PartialEq, ::prost::Message)]
                    pub struct ExecutionCapabilities {
                        #[prost(enumeration = "digest_function::Value", tag = "1")]
                        pub digest_function: i32,
                        #[prost(bool, tag = "2")]
                        pub exec_enabled: bool,
                        #[prost(message, optional, tag = "3")]
                        pub execution_priority_capabilities: Option<PriorityCapabilities>,
                        #[prost(string, repeated, tag = "4")]
                        pub supported_node_properties: Vec<String>,
                        #[prost(enumeration = "digest_function::Value", repeated, tag = "5")]
                        pub digest_functions: Vec<i32>,
                    }

                    #[derive(Clone, PartialEq, ::prost::Message)]
                    pub struct ActionCacheUpdateCapabilities {
                        #[prost(bool, tag = "1")]
                        pub update_enabled: bool,
                    }

                    #[derive(Clone, PartialEq, ::prost::Message)]
                    pub struct PriorityCapabilities {
                        #[prost(message, repeated, tag = "1")]
                        pub priorities: Vec<priority_capabilities::PriorityRange>,
                    }

                    pub mod priority_capabilities {
                        #[derive(Clone, PartialEq, ::prost::Message)]
                        pub struct PriorityRange {
                            #[prost(int32, tag = "1")]
                            pub min_priority: i32,
                            #[prost(int32, tag = "2")]
                            pub max_priority: i32,
                        }
                    }

                    include!(concat!(
                        env!("OUT_DIR"),
                        "/build.bazel.remote.execution.v2.Capabilities.rs"
                    ));
                    include!(concat!(
                        env!("OUT_DIR"),
                        "/build.bazel.remote.execution.v2.Execution.rs"
                    ));
                }
            }
        }
    }
}

pub use build::bazel::remote::execution::v2 as reapi;
pub use build::bazel::semver::SemVer;
pub use codec::EnvelopeCodec;
pub use google::longrunning::Operation;
