//! Rapid-block state machine driven through `produce`.

mod common;

use anyhow::Result;
use common::{ScriptedDriver, AI_CHANNELS, PORTS};
use digitizer_core::{
    Coupling, DigitizerSource, DownsamplingMode, OutputBuffers, Produced, TagPayload, TagTarget,
};
use serial_test::serial;

fn rapid_block_source(
    pre: u32,
    post: u32,
    waveforms: u32,
) -> Result<(DigitizerSource, std::sync::Arc<parking_lot::Mutex<common::ScriptLog>>)> {
    let (driver, log) = ScriptedDriver::new();
    let mut source = DigitizerSource::new(Box::new(driver));
    source.set_aichan("A", true, 2.0, Coupling::Dc1M, 0.0)?;
    source.set_samples(pre, post)?;
    source.set_rapid_block(waveforms)?;
    source.set_trigger_once(true)?;
    Ok((source, log))
}

#[test]
#[serial]
fn nine_calls_for_three_waveforms() -> Result<()> {
    let (mut source, log) = rapid_block_source(100, 900, 3)?;
    source.start()?;
    assert!(!source.is_armed(), "rapid block arms on first produce");

    let mut out = OutputBuffers::new(AI_CHANNELS, PORTS, 1000);
    let mut counts = Vec::new();
    let mut first_values = Vec::new();
    let mut trigger_offsets = Vec::new();
    for _ in 0..9 {
        let produced = source.produce(&mut out, 400)?;
        counts.push(produced.count());
        first_values.push(out.values[0][0]);
        trigger_offsets.extend(
            out.tags
                .iter()
                .filter(|t| t.is_trigger() && t.target == TagTarget::Channel(0))
                .map(|t| t.offset),
        );
    }

    assert_eq!(counts, vec![400, 400, 200, 400, 400, 200, 400, 400, 200]);
    for waveform in counts.chunks(3) {
        assert_eq!(waveform.iter().sum::<usize>(), 1000);
    }
    assert_eq!(
        first_values,
        vec![0.0, 400.0, 800.0, 10_000.0, 10_400.0, 10_800.0, 20_000.0, 20_400.0, 20_800.0]
    );
    assert_eq!(trigger_offsets, vec![100, 1100, 2100]);

    {
        let log = log.lock();
        assert_eq!(log.prefetches, vec![(1000, 0), (1000, 1), (1000, 2)]);
        assert_eq!(log.reads[..3], [(0, 400, 0), (400, 400, 0), (800, 200, 0)]);
        assert_eq!(log.arm, 1);
    }

    // Back in WAITING with trigger-once set: production ends.
    assert_eq!(source.produce(&mut out, 400)?, Produced::EndOfStream);
    Ok(())
}

#[test]
#[serial]
fn large_output_reads_whole_waveform() -> Result<()> {
    let (mut source, _log) = rapid_block_source(100, 900, 2)?;
    source.start()?;

    let mut out = OutputBuffers::new(AI_CHANNELS, PORTS, 4096);
    assert_eq!(source.produce(&mut out, 4096)?.count(), 1000);

    let timebase: Vec<_> = out
        .tags
        .iter()
        .filter_map(|t| match t.payload {
            TagPayload::TimebaseInfo { time_base } => Some((t.offset, time_base)),
            _ => None,
        })
        .collect();
    assert_eq!(timebase, vec![(0, 1e-4)]);

    assert_eq!(source.produce(&mut out, 4096)?.count(), 1000);
    assert!(out.tags.iter().all(|t| t.name() != "timebase_info"));
    assert!(source.produce(&mut out, 4096)?.is_end_of_stream());
    Ok(())
}

#[test]
#[serial]
fn downsampling_shrinks_delivered_waveform() -> Result<()> {
    let (mut source, log) = rapid_block_source(100, 900, 1)?;
    source.set_downsampling(DownsamplingMode::Decimate, 4)?;
    source.start()?;

    let mut out = OutputBuffers::new(AI_CHANNELS, PORTS, 1000);
    assert_eq!(source.produce(&mut out, 1000)?.count(), 250);

    let trigger = out
        .tags
        .iter()
        .find(|t| t.is_trigger())
        .expect("trigger tag");
    assert_eq!(trigger.offset, 25);
    assert!(matches!(
        trigger.payload,
        TagPayload::Trigger {
            downsampling_factor: 4,
            ..
        }
    ));

    // The driver still prefetches the raw block
    assert_eq!(log.lock().prefetches, vec![(1000, 0)]);
    Ok(())
}

#[test]
#[serial]
fn auto_rearm_between_captures() -> Result<()> {
    let (mut source, log) = rapid_block_source(10, 10, 1)?;
    source.set_trigger_once(false)?;
    source.start()?;

    let mut out = OutputBuffers::new(AI_CHANNELS, PORTS, 64);
    for _ in 0..3 {
        assert_eq!(source.produce(&mut out, 64)?.count(), 20);
    }
    assert_eq!(log.lock().arm, 3);

    // A stop releases the next wait
    let stop = source.stop_handle();
    stop.stop();
    assert!(source.produce(&mut out, 64)?.is_end_of_stream());
    Ok(())
}
