//! End-to-end streaming behavior against a scripted driver.
//!
//! | Test | Scenario |
//! |------|----------|
//! | `four_chunks_then_stop` | 4 published chunks come out in order, the 5th call blocks until stop |
//! | `software_trigger_tags` | analog edges in a delivered chunk become trigger tags |
//! | `watchdog_rearms_and_retries` | low rate estimate → disarm + re-arm, zero items |
//! | `poll_error_is_terminal` | driver poll failure surfaces from `produce` |

mod common;

use anyhow::Result;
use common::{ScriptedDriver, AI_CHANNELS, PORTS};
use digitizer_core::{
    Coupling, DigitizerError, DigitizerSource, ErrorKind, OutputBuffers, Produced, TagPayload,
    TagTarget, TriggerDirection,
};
use serial_test::serial;
use std::time::{Duration, Instant};
use tracing_test::traced_test;

const CHUNK_SIZE: usize = 8192;

fn streaming_source() -> Result<(DigitizerSource, std::sync::Arc<parking_lot::Mutex<common::ScriptLog>>)> {
    let (driver, log) = ScriptedDriver::new();
    let mut source = DigitizerSource::new(Box::new(driver));
    source.set_aichan("A", true, 2.0, Coupling::Dc1M, 0.0)?;
    source.set_diport("port0", true, 1.5)?;
    source.set_buffer_size(CHUNK_SIZE)?;
    source.set_nr_buffers(4)?;
    source.set_streaming(0.001)?;
    Ok((source, log))
}

fn publish(source: &DigitizerSource, fill: impl Fn(usize) -> f32, timestamp_ns: u64) {
    let pool = &source.context().pool;
    let mut chunk = pool.get_free_chunk().expect("free chunk");
    let (values, errors) = chunk.channel_mut(0);
    for (i, v) in values.iter_mut().enumerate() {
        *v = fill(i);
    }
    errors.fill(0.001);
    chunk.port_mut(0).fill(0);
    chunk.local_timestamp_ns = timestamp_ns;
    pool.publish_filled(chunk);
}

// =============================================================================
// Ordered delivery and cooperative stop
// =============================================================================

#[test]
#[serial]
#[traced_test]
fn four_chunks_then_stop() -> Result<()> {
    let (mut source, _log) = streaming_source()?;
    source.start()?;
    assert!(source.is_armed());
    assert!(logs_contain("Digitizer armed"));

    for i in 0..4u64 {
        publish(&source, |_| i as f32, 1_000 + i);
    }

    let mut out = OutputBuffers::new(AI_CHANNELS, PORTS, CHUNK_SIZE);
    for i in 0..4u64 {
        let produced = source.produce(&mut out, CHUNK_SIZE)?;
        assert_eq!(
            produced,
            Produced::Items {
                count: CHUNK_SIZE,
                lost: 0
            }
        );
        assert_eq!(out.values[0][0], i as f32);
        assert_eq!(out.values[0][CHUNK_SIZE - 1], i as f32);

        let acq_info: Vec<_> = out
            .tags
            .iter()
            .filter_map(|tag| match tag.payload {
                TagPayload::AcqInfo { timestamp_ns, .. } => Some((tag.target, tag.offset, timestamp_ns)),
                _ => None,
            })
            .collect();
        assert_eq!(
            acq_info,
            vec![
                (TagTarget::Channel(0), i * CHUNK_SIZE as u64, 1_000 + i),
                (TagTarget::Port(0), i * CHUNK_SIZE as u64, 1_000 + i),
            ]
        );

        let timebase_tags = out.tags.iter().filter(|t| t.name() == "timebase_info").count();
        assert_eq!(timebase_tags, if i == 0 { 2 } else { 0 });
    }
    assert_eq!(source.items_written(), 4 * CHUNK_SIZE as u64);

    let stop = source.stop_handle();
    let stopper = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(50));
        stop.stop();
    });

    let started = Instant::now();
    let produced = source.produce(&mut out, CHUNK_SIZE)?;
    assert_eq!(produced, Produced::EndOfStream);
    assert!(started.elapsed() >= Duration::from_millis(40));
    stopper.join().expect("stopper thread");

    let errors = source.get_errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, ErrorKind::STOPPED);
    assert!(source.get_errors().is_empty());

    source.stop()?;
    source.close()?;
    Ok(())
}

#[test]
#[serial]
fn output_smaller_than_chunk_is_rejected() -> Result<()> {
    let (mut source, _log) = streaming_source()?;
    source.start()?;

    let mut out = OutputBuffers::new(AI_CHANNELS, PORTS, CHUNK_SIZE);
    let err = source.produce(&mut out, CHUNK_SIZE - 1).unwrap_err();
    assert!(matches!(
        err,
        DigitizerError::OutputTooSmall {
            required: CHUNK_SIZE,
            available
        } if available == CHUNK_SIZE - 1
    ));
    source.stop()?;
    Ok(())
}

// =============================================================================
// Software trigger
// =============================================================================

#[test]
#[serial]
fn software_trigger_tags() -> Result<()> {
    let (mut source, _log) = streaming_source()?;
    source.set_aichan_trigger("A", TriggerDirection::Rising, 0.5)?;
    source.start()?;

    // Square wave: rising edges at 1000 and 5000
    publish(
        &source,
        |i| if (1000..3000).contains(&i) || i >= 5000 { 1.0 } else { -1.0 },
        10_000_000_000,
    );

    let mut out = OutputBuffers::new(AI_CHANNELS, PORTS, CHUNK_SIZE);
    source.produce(&mut out, CHUNK_SIZE)?;

    let triggers: Vec<_> = out
        .tags
        .iter()
        .filter(|t| t.is_trigger() && t.target == TagTarget::Channel(0))
        .collect();
    assert_eq!(triggers.len(), 2);
    assert_eq!(triggers[0].offset, 1000);
    assert_eq!(triggers[1].offset, 5000);

    // 10 kHz: each item is 100 us old relative to the chunk timestamp
    let TagPayload::Trigger { timestamp_ns, .. } = triggers[0].payload else {
        panic!("expected trigger payload");
    };
    let expected = 10_000_000_000 - (CHUNK_SIZE as u64 - 1000) * 100_000;
    assert!(timestamp_ns.abs_diff(expected) <= 1);

    // Port outputs get the markers too
    assert_eq!(
        out.tags
            .iter()
            .filter(|t| t.is_trigger() && t.target == TagTarget::Port(0))
            .count(),
        2
    );

    source.stop()?;
    Ok(())
}

// =============================================================================
// Runtime error classification
// =============================================================================

#[test]
#[serial]
fn watchdog_rearms_and_retries() -> Result<()> {
    let (mut source, log) = streaming_source()?;
    let mut settings = source.settings().clone();
    settings.watchdog_window = 10;
    source.set_settings(settings)?;
    source.start()?;
    assert_eq!(log.lock().arm, 1);

    // Half the configured rate for a full window
    for _ in 0..10 {
        source.context().rate_monitor.add_rate(5_000.0);
    }

    let mut out = OutputBuffers::new(AI_CHANNELS, PORTS, CHUNK_SIZE);
    let produced = source.produce(&mut out, CHUNK_SIZE)?;
    assert_eq!(produced, Produced::Items { count: 0, lost: 0 });
    assert!(source.is_armed());
    assert_eq!(log.lock().arm, 2);
    assert!(log.lock().disarm >= 1);

    let codes: Vec<i32> = source.get_errors().iter().map(|r| r.code).collect();
    assert!(codes.contains(&ErrorKind::WATCHDOG));

    // Re-seeded on arm; data flows again
    publish(&source, |_| 0.0, 1);
    let produced = source.produce(&mut out, CHUNK_SIZE)?;
    assert_eq!(produced.count(), CHUNK_SIZE);

    source.stop()?;
    Ok(())
}

#[test]
#[serial]
fn poll_error_is_terminal() -> Result<()> {
    let (mut source, log) = streaming_source()?;
    log.lock().fail_poll = true;
    source.start()?;

    let mut out = OutputBuffers::new(AI_CHANNELS, PORTS, CHUNK_SIZE);
    let err = source.produce(&mut out, CHUNK_SIZE).unwrap_err();
    let kind = err.error_kind().cloned().expect("acquisition error");
    assert_eq!(kind.code(), -7);
    assert_eq!(kind.category(), "scripted");

    log.lock().fail_poll = false;
    source.stop()?;
    Ok(())
}

#[test]
#[serial]
fn stop_before_produce_ends_stream() -> Result<()> {
    let (mut source, _log) = streaming_source()?;
    source.start()?;
    source.stop()?;
    assert!(!source.is_armed());

    let mut out = OutputBuffers::new(AI_CHANNELS, PORTS, CHUNK_SIZE);
    assert!(source.produce(&mut out, CHUNK_SIZE)?.is_end_of_stream());
    Ok(())
}
