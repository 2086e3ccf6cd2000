//! CLI command implementations.

mod agents;
mod analyze;
mod assemble;
mod config;
mod doctor;
mod generate;
mod refs;
mod run;
mod trends;

pub use agents::run_agents;
pub use analyze::run_analyze;
pub use assemble::run_assemble;
pub use config::run_config;
pub use doctor::run_doctor;
pub use generate::run_generate;
pub use refs::run_refs;
pub use run::run_pipeline;
pub use trends::run_trends;

use crate::cli::Output;
use tokio_util::sync::CancellationToken;

/// Token cancelled on the first Ctrl-C.
pub(crate) fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            Output::warning("Interrupted; stopping after in-flight polls are abandoned.");
            child.cancel();
        }
    });
    token
}
