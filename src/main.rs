//! Binary entrypoint for the chatbot API server.

use std::process::ExitCode;

use chatbot_api::start_chatbot_api;

/// Load configuration, open the user database and serve HTTP until Ctrl-C.
fn main() -> ExitCode {
    start_chatbot_api::run()
}
