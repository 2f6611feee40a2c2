//! Blocking acquisition loop.

use anyhow::{Context, Result};
use digitizer_core::{DigitizerSource, OutputBuffers, Produced, TagPayload};
use std::io::Write;
use tracing::{info, warn};

/// What to print for each produced block.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Stop after this many non-empty blocks (0 = until stopped)
    pub blocks: usize,
    /// Items requested per `produce` call (0 = sized from the settings)
    pub items: usize,
    /// Print every tag as a JSON line
    pub print_tags: bool,
}

/// Totals of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Non-empty blocks delivered
    pub blocks: usize,
    /// Items delivered per enabled output
    pub items: u64,
    /// Chunks lost to a slow consumer
    pub lost: u64,
    /// Trigger tags seen
    pub triggers: usize,
    /// Calls that returned no data (watchdog re-arm, interrupted wait)
    pub empty_calls: usize,
}

/// Items per call: one chunk in streaming mode, one waveform in rapid-block mode.
#[must_use]
pub fn default_items(source: &DigitizerSource) -> usize {
    let settings = source.active_settings();
    if settings.acquisition.is_streaming() {
        settings.buffer_size
    } else {
        settings.block_size_with_downsampling()
    }
}

/// Start `source` and produce until end of stream, an error or `options.blocks`.
///
/// The source is stopped on every exit path.
pub fn acquire(
    source: &mut DigitizerSource,
    options: RunOptions,
    out: &mut impl Write,
) -> Result<RunSummary> {
    source.start().context("Digitizer start failed")?;

    let items = if options.items == 0 {
        default_items(source)
    } else {
        options.items
    };
    let settings = source.active_settings();
    let mut buffers = OutputBuffers::new(settings.channels.len(), settings.ports.len(), items);
    info!(items, "Acquisition running");

    let result = produce_loop(source, &mut buffers, items, options, out);
    if let Err(e) = source.stop() {
        warn!(error = %e, "Stop failed");
    }
    result
}

fn produce_loop(
    source: &mut DigitizerSource,
    buffers: &mut OutputBuffers,
    items: usize,
    options: RunOptions,
    out: &mut impl Write,
) -> Result<RunSummary> {
    let mut summary = RunSummary::default();
    while options.blocks == 0 || summary.blocks < options.blocks {
        let (count, lost) = match source.produce(buffers, items)? {
            Produced::EndOfStream => {
                info!("End of stream");
                break;
            }
            Produced::Items { count: 0, .. } => {
                summary.empty_calls += 1;
                continue;
            }
            Produced::Items { count, lost } => (count, lost),
        };

        let start = source.items_written() - count as u64;
        let triggers = buffers
            .tags
            .iter()
            .filter(|t| matches!(t.payload, TagPayload::Trigger { .. }))
            .count();
        writeln!(
            out,
            "block {:>6}  items {start}..{}  lost {lost}  tags {}  triggers {triggers}",
            summary.blocks,
            start + count as u64,
            buffers.tags.len(),
        )?;
        if options.print_tags {
            for tag in &buffers.tags {
                writeln!(out, "{}", serde_json::to_string(tag)?)?;
            }
        }

        summary.blocks += 1;
        summary.items += count as u64;
        summary.lost += u64::from(lost);
        summary.triggers += triggers;
    }
    Ok(summary)
}

/// Print and return the number of errors recorded by `source`.
pub fn report_errors(source: &DigitizerSource, out: &mut impl Write) -> Result<usize> {
    let records = source.get_errors();
    for record in &records {
        writeln!(
            out,
            "error {}  code {:>4}  [{}]  {}",
            record.timestamp().to_rfc3339(),
            record.code,
            record.error().category(),
            record.message
        )?;
    }
    Ok(records.len())
}
