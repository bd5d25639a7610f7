//! Console reporting for the per-sticker outcomes of a pipeline pass.

use std::error::Error;
use std::fmt::Write;

use futures::{Stream, StreamExt};
use log::{error, info, warn};

use crate::apng::ApngError;
use crate::pipeline::{AssetOutcome, Saved};

/// What a pass left behind, as far as later passes care.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Stickers whose asset was written, in the order they were reported.
    pub succeeded: Vec<u64>,
    pub failed: usize,
}

/// Drains `outcomes`, logging one line per sticker.
pub async fn report_pass<S>(outcomes: S) -> PassReport
where
    S: Stream<Item = AssetOutcome>,
{
    let mut outcomes = std::pin::pin!(outcomes);
    let mut report = PassReport::default();
    let mut pass_format = None;

    while let Some(outcome) = outcomes.next().await {
        let label = outcome.format;
        pass_format.get_or_insert(label);
        let id = outcome.sticker_id;

        match outcome.result {
            Ok(Saved::Complete) => {
                info!("[{label}] {id} ... done");
                report.succeeded.push(id);
            }
            Ok(Saved::NotLooped(ApngError::ChunkNotFound)) => {
                warn!("[{label}] {id} ... done, but no animation control chunk was found to loop");
                report.succeeded.push(id);
            }
            Ok(Saved::NotLooped(err)) => {
                error!(
                    "[{label}] {id} ... saved, but could not make it loop: {}",
                    error_chain(&err)
                );
                report.succeeded.push(id);
            }
            Err(err) => {
                error!("[{label}] {id} ... {}", error_chain(&err));
                report.failed += 1;
            }
        }
    }

    if let Some(format) = pass_format {
        if report.failed > 0 {
            warn!(
                "[{format}] {} of {} stickers failed",
                report.failed,
                report.failed + report.succeeded.len()
            );
        }
    }

    report
}

/// Formats an error and all of its sources as `outer: inner: innermost`.
pub fn error_chain(err: &dyn Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();

    while let Some(cause) = source {
        let _ = write!(message, ": {cause}");
        source = cause.source();
    }

    message
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io;

    use futures::stream;

    use crate::data::AssetFormat;
    use crate::pipeline::AssetError;
    use crate::sticker_shop::StoreError;

    #[tokio::test]
    async fn counts_failures_and_keeps_successes() {
        let outcomes = vec![
            AssetOutcome {
                sticker_id: 1,
                format: AssetFormat::Apng,
                result: Ok(Saved::Complete),
            },
            AssetOutcome {
                sticker_id: 2,
                format: AssetFormat::Apng,
                result: Err(AssetError::SourceMissing),
            },
            AssetOutcome {
                sticker_id: 3,
                format: AssetFormat::Apng,
                result: Ok(Saved::NotLooped(ApngError::ChunkNotFound)),
            },
            AssetOutcome {
                sticker_id: 4,
                format: AssetFormat::Apng,
                result: Ok(Saved::NotLooped(ApngError::InvalidFormat)),
            },
        ];

        let report = report_pass(stream::iter(outcomes)).await;
        assert_eq!(
            report,
            PassReport {
                succeeded: vec![1, 3, 4],
                failed: 1,
            }
        );
    }

    #[test]
    fn chains_error_sources() {
        let err = AssetError::Download(StoreError::Io {
            source: io::Error::new(io::ErrorKind::ConnectionReset, "reset"),
        });
        assert_eq!(
            error_chain(&err),
            "download failed: could not write downloaded asset: reset"
        );
    }
}
