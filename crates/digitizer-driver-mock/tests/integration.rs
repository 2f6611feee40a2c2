//! End-to-end tests: the acquisition engine driving the simulated digitizer.
//!
//! | Test | Scenario |
//! |------|----------|
//! | `streaming_delivers_sine_chunks` | Instant streaming, tags, stop ends the stream |
//! | `streaming_software_trigger` | sine crossings become trigger tags |
//! | `streaming_average_downsampling` | delivered time base and error estimate follow the factor |
//! | `rapid_block_three_waveforms` | one call per waveform, trigger at the pre-trigger offset |
//! | `realistic_rapid_block_waits_for_capture` | block-ready arrives after the capture time |
//! | `low_throughput_triggers_watchdog` | paced delivery at 40% re-arms via the watchdog |
//! | `poll_failure_ends_acquisition` | injected poll failure surfaces from `produce` |
//! | `arm_failure_recorded_by_start` | injected arm failure kept as configure exception |
//! | `prefetch_timeout_is_terminal` | injected rapid-block prefetch timeout |

use anyhow::Result;
use digitizer_core::{
    Coupling, DigitizerError, DigitizerSource, DownsamplingMode, DriverErrorKind, ErrorKind,
    OutputBuffers, Produced, TagPayload, TagTarget, TriggerDirection,
};
use digitizer_driver_mock::{
    ErrorConfig, ErrorScenario, MockDigitizer, MockDigitizerConfig, MockMode, TimingConfig,
    DRIVER_TYPE,
};
use serial_test::serial;
use std::time::{Duration, Instant};

const AI_CHANNELS: usize = 4;
const PORTS: usize = 2;

fn quiet() -> MockDigitizerConfig {
    MockDigitizerConfig {
        noise: 0.0,
        seed: Some(7),
        ..Default::default()
    }
}

fn streaming_source(config: MockDigitizerConfig, chunk_size: usize) -> Result<DigitizerSource> {
    let mut source = DigitizerSource::new(Box::new(MockDigitizer::new(config)));
    source.set_samp_rate(100_000.0)?;
    source.set_aichan("A", true, 1.0, Coupling::Dc1M, 0.0)?;
    source.set_diport("port0", true, 1.5)?;
    source.set_buffer_size(chunk_size)?;
    source.set_nr_buffers(32)?;
    source.set_streaming(0.001)?;
    Ok(source)
}

fn rapid_block_source(config: MockDigitizerConfig) -> Result<DigitizerSource> {
    let mut source = DigitizerSource::new(Box::new(MockDigitizer::new(config)));
    source.set_aichan("A", true, 1.0, Coupling::Dc1M, 0.0)?;
    source.set_samples(200, 800)?;
    source.set_rapid_block(3)?;
    source.set_trigger_once(true)?;
    Ok(source)
}

// =============================================================================
// Streaming
// =============================================================================

#[test]
#[serial]
fn streaming_delivers_sine_chunks() -> Result<()> {
    let mut source = streaming_source(quiet(), 1000)?;
    source.start()?;
    assert!(source.is_armed());

    let mut out = OutputBuffers::new(AI_CHANNELS, PORTS, 1000);
    for call in 0..5 {
        let produced = source.produce(&mut out, 1000)?;
        assert_eq!(produced.count(), 1000, "call {call}");

        let acq_info = out
            .tags
            .iter()
            .filter(|t| matches!(t.payload, TagPayload::AcqInfo { .. }))
            .count();
        assert_eq!(acq_info, 2, "one acquisition-info tag per enabled output");
        if call == 0 {
            assert!(out.tags.iter().any(|t| matches!(
                t.payload,
                TagPayload::TimebaseInfo { time_base } if (time_base - 1e-5).abs() < 1e-12
            )));
        }
    }

    assert!(out.values[0].iter().all(|v| v.abs() <= 0.8 + 1e-6));
    assert!(out.errors[0].iter().all(|e| (e - 0.001).abs() < 1e-6));
    assert_eq!(out.ports[0][1], out.ports[0][0].wrapping_add(1));
    assert_eq!(source.items_written(), 5000);

    source.stop()?;
    assert_eq!(source.produce(&mut out, 1000)?, Produced::EndOfStream);
    source.close()?;
    Ok(())
}

#[test]
#[serial]
fn streaming_software_trigger() -> Result<()> {
    let config = MockDigitizerConfig {
        signal_frequency_hz: 1_000.0,
        ..quiet()
    };
    let mut source = streaming_source(config, 1000)?;
    source.set_aichan_trigger("A", TriggerDirection::Rising, 0.0)?;
    source.start()?;

    let mut out = OutputBuffers::new(AI_CHANNELS, PORTS, 1000);
    let mut edges = Vec::new();
    for _ in 0..3 {
        source.produce(&mut out, 1000)?;
        edges.extend(
            out.tags
                .iter()
                .filter(|t| t.is_trigger() && t.target == TagTarget::Channel(0))
                .map(|t| t.offset),
        );
    }
    source.stop()?;

    // 1 kHz at 100 kS/s: a rising edge every 100 items.
    assert!(edges.len() >= 25, "got {} edges", edges.len());
    for pair in edges.windows(2) {
        assert!((99..=101).contains(&(pair[1] - pair[0])), "{pair:?}");
    }
    Ok(())
}

#[test]
#[serial]
fn streaming_average_downsampling() -> Result<()> {
    let mut source = streaming_source(quiet(), 250)?;
    source.set_downsampling(DownsamplingMode::Average, 4)?;
    source.start()?;

    let mut out = OutputBuffers::new(AI_CHANNELS, PORTS, 250);
    assert_eq!(source.produce(&mut out, 250)?.count(), 250);
    assert!((source.timebase() - 4e-5).abs() < 1e-12);
    // 1 V range * 0.001 precision / sqrt(4)
    assert!((out.errors[0][0] - 0.0005).abs() < 1e-7);
    source.stop()?;
    Ok(())
}

// =============================================================================
// Rapid block
// =============================================================================

#[test]
#[serial]
fn rapid_block_three_waveforms() -> Result<()> {
    let mut source = rapid_block_source(quiet())?;
    source.start()?;

    let mut out = OutputBuffers::new(AI_CHANNELS, PORTS, 1000);
    let mut trigger_offsets = Vec::new();
    for _ in 0..3 {
        let produced = source.produce(&mut out, 1000)?;
        assert_eq!(produced.count(), 1000);
        assert!(out.values[0][199] < 0.0 && out.values[0][201] > 0.0);
        trigger_offsets.extend(
            out.tags
                .iter()
                .filter(|t| t.is_trigger() && t.target == TagTarget::Channel(0))
                .map(|t| t.offset),
        );
    }
    assert_eq!(trigger_offsets, vec![200, 1200, 2200]);
    assert_eq!(source.produce(&mut out, 1000)?, Produced::EndOfStream);
    Ok(())
}

#[test]
#[serial]
fn realistic_rapid_block_waits_for_capture() -> Result<()> {
    let config = MockDigitizerConfig {
        mode: MockMode::Realistic,
        timing: TimingConfig {
            arm_latency_ms: 1,
            capture_overhead_ms: 20,
        },
        ..quiet()
    };
    let mut source = rapid_block_source(config)?;
    source.start()?;

    let mut out = OutputBuffers::new(AI_CHANNELS, PORTS, 1000);
    let started = Instant::now();
    assert_eq!(source.produce(&mut out, 1000)?.count(), 1000);
    // 3 x 1000 samples at 10 kS/s plus overhead
    assert!(started.elapsed() >= Duration::from_millis(300));
    Ok(())
}

// =============================================================================
// Watchdog and error injection
// =============================================================================

#[test]
#[serial]
fn low_throughput_triggers_watchdog() -> Result<()> {
    let config = MockDigitizerConfig {
        mode: MockMode::Realistic,
        throughput: 0.4,
        ..quiet()
    };
    let mut source = streaming_source(config, 100)?;
    let mut settings = source.settings().clone();
    settings.watchdog_window = 5;
    source.set_settings(settings)?;
    source.start()?;

    let mut out = OutputBuffers::new(AI_CHANNELS, PORTS, 100);
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut rearmed = false;
    while Instant::now() < deadline {
        if source.produce(&mut out, 100)? == (Produced::Items { count: 0, lost: 0 }) {
            rearmed = true;
            break;
        }
    }
    assert!(rearmed, "watchdog never fired");
    assert!(source.is_armed());
    assert!(source
        .get_errors()
        .iter()
        .any(|r| *r.error() == ErrorKind::Watchdog));

    source.stop()?;
    Ok(())
}

#[test]
#[serial]
fn poll_failure_ends_acquisition() -> Result<()> {
    let driver = MockDigitizer::new(quiet()).with_errors(ErrorConfig::scenario(
        ErrorScenario::FailAfterN {
            operation: "poll",
            count: 3,
        },
    ));
    let mut source = DigitizerSource::new(Box::new(driver));
    source.set_aichan("A", true, 1.0, Coupling::Dc1M, 0.0)?;
    source.set_buffer_size(100)?;
    source.set_streaming(0.001)?;
    source.start()?;

    let mut out = OutputBuffers::new(AI_CHANNELS, PORTS, 100);
    let mut delivered = 0;
    let err = loop {
        match source.produce(&mut out, 100) {
            Ok(produced) => {
                delivered += produced.count();
                assert!(delivered <= 300, "more chunks than successful polls");
            }
            Err(e) => break e,
        }
    };

    let DigitizerError::Acquisition(ErrorKind::Driver(driver_err)) = err else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(driver_err.driver_type, DRIVER_TYPE);
    assert_eq!(driver_err.kind, DriverErrorKind::Hardware);
    assert!(!source.get_errors().is_empty());
    source.stop()?;
    Ok(())
}

#[test]
#[serial]
fn arm_failure_recorded_by_start() -> Result<()> {
    let driver = MockDigitizer::new(quiet()).with_errors(ErrorConfig::scenario(
        ErrorScenario::FailAfterN {
            operation: "arm",
            count: 0,
        },
    ));
    let mut source = DigitizerSource::new(Box::new(driver));
    source.set_aichan("A", true, 1.0, Coupling::Dc1M, 0.0)?;
    source.set_buffer_size(100)?;

    let err = source.start().unwrap_err();
    assert!(matches!(err, DigitizerError::Operation { operation: "arm", .. }));
    assert!(!source.is_armed());
    assert!(source
        .configure_exception_message()
        .is_some_and(|m| m.contains("arm")));
    Ok(())
}

#[test]
#[serial]
fn prefetch_timeout_is_terminal() -> Result<()> {
    let driver = MockDigitizer::new(quiet())
        .with_errors(ErrorConfig::scenario(ErrorScenario::Timeout { operation: "prefetch" }));
    let mut source = DigitizerSource::new(Box::new(driver));
    source.set_aichan("A", true, 1.0, Coupling::Dc1M, 0.0)?;
    source.set_samples(10, 90)?;
    source.set_rapid_block(1)?;
    source.start()?;

    let mut out = OutputBuffers::new(AI_CHANNELS, PORTS, 100);
    let err = source.produce(&mut out, 100).unwrap_err();
    let kind = err.error_kind().cloned();
    assert!(matches!(
        kind,
        Some(ErrorKind::Driver(ref e)) if e.kind == DriverErrorKind::Timeout
    ));
    Ok(())
}

#[test]
fn config_from_toml() -> Result<()> {
    let config: MockDigitizerConfig = toml::from_str(
        r#"
        mode = "chaos"
        ai_channels = 2
        chaos_failure_rate = 0.5

        [timing]
        arm_latency_ms = 3
        "#,
    )?;
    assert_eq!(config.mode, MockMode::Chaos);
    assert_eq!(config.ai_channels, 2);
    assert_eq!(config.ports, 2);
    assert_eq!(config.timing.arm_latency_ms, 3);
    assert_eq!(config.timing.capture_overhead_ms, 0);
    Ok(())
}
