// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Splits a byte stream into lines and offers them to the line queue.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{debug, trace};

use crate::admission::{Admitted, Line, LineAdmitter};

const READ_BUFFER_SIZE: usize = 8192;

/// Reads `source` until it ends or fails, then closes it.
///
/// Only lines ending in `\n` are admitted. A trailing fragment without a
/// terminator is discarded and counted nowhere. Errors end this reader and
/// are not reported to the caller.
pub async fn read<R>(source: R, admitter: LineAdmitter)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, source);
    loop {
        let mut buf = Vec::new();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => {
                debug!("Source exhausted");
                break;
            }
            Ok(_) if buf.last() != Some(&b'\n') => {
                trace!("Discarding {} unterminated bytes at end of source", buf.len());
                break;
            }
            Ok(_) => {
                if admitter.admit(Line::new(buf)).await == Admitted::Closed {
                    debug!("Line queue closed, stopping reader");
                    break;
                }
            }
            Err(e) => {
                debug!("Error reading source: {}", e);
                break;
            }
        }
    }
    // Dropping the reader closes the source.
}
