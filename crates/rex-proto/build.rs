use tonic_build::manual::{Builder, Method, Service};

const PACKAGE: &str = "build.bazel.remote.execution.v2";
const CODEC: &str = "crate::codec::EnvelopeCodec";
const V2: &str = "crate::build::bazel::remote::execution::v2";
const OPERATION: &str = "crate::google::longrunning::Operation";

/// Messages cross the generated stubs wrapped, so relayed bytes are never re-encoded.
fn envelope(message: &str) -> String {
    format!("crate::Envelope<{message}>")
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let capabilities = Service::builder()
        .name("Capabilities")
        .package(PACKAGE)
        .comment("Reports which remote execution features an instance supports.")
        .method(
            Method::builder()
                .name("get_capabilities")
                .route_name("GetCapabilities")
                .input_type(envelope(&format!("{V2}::GetCapabilitiesRequest")))
                .output_type(envelope(&format!("{V2}::ServerCapabilities")))
                .codec_path(CODEC)
                .build(),
        )
        .build();

    let execution = Service::builder()
        .name("Execution")
        .package(PACKAGE)
        .comment("Schedules actions and streams the progress of their operations.")
        .method(
            Method::builder()
                .name("execute")
                .route_name("Execute")
                .input_type(envelope(&format!("{V2}::ExecuteRequest")))
                .output_type(envelope(OPERATION))
                .codec_path(CODEC)
                .server_streaming()
                .build(),
        )
        .method(
            Method::builder()
                .name("wait_execution")
                .route_name("WaitExecution")
                .input_type(envelope(&format!("{V2}::WaitExecutionRequest")))
                .output_type(envelope(OPERATION))
                .codec_path(CODEC)
                .server_streaming()
                .build(),
        )
        .build();

    Builder::new().compile(&[capabilities, execution]);
}
