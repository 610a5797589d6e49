extern crate log;
extern crate env_logger;
#[macro_use]
extern crate error_chain;
extern crate futures;
extern crate lapin;
extern crate serde;
extern crate serde_json;
extern crate tokio;

extern crate judge;
extern crate sandbox;

mod broker;
mod config;
mod init;
mod payload;

use judge::driver::JudgeDriver;
use judge::Submission;

use crate::payload::{JobMessage, ResultMessage};

error_chain! {
    types {
        Error, ErrorKind, ResultExt, Result;
    }

    links {
        Judge(judge::Error, judge::ErrorKind);
        Sandbox(sandbox::Error, sandbox::ErrorKind);
    }

    foreign_links {
        Io(::std::io::Error);
        Json(::serde_json::Error);
        Lapin(::lapin::Error);
    }

    errors {
        BrokerConnectFailed {
            description("failed to connect to broker")
        }
        BrokerPublishFailed {
            description("failed to publish result to broker")
        }
    }
}

/// Parses a delivery payload, judges the submission and returns the result
/// message to publish. Any failure here is a poison job: the message cannot
/// be meaningfully judged and should not be requeued.
fn handle_job(data: &[u8], driver: &JudgeDriver) -> std::result::Result<ResultMessage, String> {
    let job: JobMessage = serde_json::from_slice(data)
        .map_err(|e| format!("malformed job payload: {}", e))?;
    let id = job.id.clone();
    let submission: Submission = job.into();

    match driver.judge(&submission) {
        Ok(outcome) => Ok(outcome.into()),
        Err(e) => {
            log::error!("job {} failed with an internal error: {}", id, e);
            Ok(payload::internal_error_result(&id, e.to_string()))
        }
    }
}

#[tokio::main(basic_scheduler)]
async fn main() {
    let bootstrap = match init::bootstrap().await {
        Ok(b) => b,
        Err(e) => {
            eprintln!("failed to start judge worker: {}", e);
            std::process::exit(1);
        }
    };

    let init::Bootstrap { config, mut broker, controller } = bootstrap;
    let driver = JudgeDriver::new(config.data_dir.clone(), &controller);

    loop {
        let delivery = match broker.next_job().await {
            Some(d) => d,
            None => {
                log::error!("broker connection closed, shutting down");
                break;
            }
        };

        let result = handle_job(&delivery.data, &driver);

        match result {
            Ok(message) => {
                let payload = match serde_json::to_vec(&message) {
                    Ok(p) => p,
                    Err(e) => {
                        log::error!("failed to serialize result for job {}: {}", message.id, e);
                        let _ = broker.reject(&delivery, false).await;
                        continue;
                    }
                };

                match broker.publish_result(&payload).await {
                    Ok(()) => {
                        if let Err(e) = broker.ack(&delivery).await {
                            log::error!("failed to ack job {}: {}", message.id, e);
                        }
                    }
                    Err(e) => {
                        log::error!("failed to publish result for job {}: {}, requeueing", message.id, e);
                        let _ = broker.reject(&delivery, true).await;
                    }
                }
            }
            Err(reason) => {
                log::warn!("rejecting poison job: {}", reason);
                let _ = broker.reject(&delivery, false).await;
            }
        }
    }
}
