use std::process::ExitCode;
use surge_runtime::SurgeRuntime;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    surge_runtime::init_tracing();

    SurgeRuntime::new().with_args().run().await.into()
}
