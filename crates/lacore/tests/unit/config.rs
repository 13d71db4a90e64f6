//! # Configuration Tests
//!
//! Defaults, JSON deserialization, file loading and validation of every
//! configuration block.

use std::io::Write;

use lacore_core::common::{ConfigError, Datatype};
use lacore_core::config::*;
use pretty_assertions::assert_eq;
use rstest::rstest;

// ══════════════════════════════════════════════════════════
// 1. Defaults
// ══════════════════════════════════════════════════════════

#[test]
fn test_config_default_validates() {
    let config = Config::default();
    assert!(config.validate().is_ok());
}

#[test]
fn test_scratchpad_defaults() {
    let spad = ScratchpadConfig::default();
    assert_eq!(spad.capacity, 64 * 1024);
    assert_eq!(spad.banks, 8);
    assert_eq!(spad.stripe_bytes, 8);
    assert_eq!(spad.latency, 2);
    assert_eq!(spad.line_bytes, 64);
}

#[test]
fn test_mem_unit_defaults() {
    let mu = MemUnitConfig::default();
    assert_eq!(mu.channels, 4);
    assert_eq!(mu.channel_capacity, 4);
    assert!(!mu.coalesce);
    assert_eq!(mu.read_pipes(), 3);
}

#[test]
fn test_core_defaults() {
    let core = CoreConfig::default();
    assert_eq!(core.exec_mode, ExecMode::Timing);
    assert_eq!(core.registers, 16);
    assert_eq!(core.drain_policy, DrainPolicy::Wait);
}

#[test]
fn test_datapath_latency_tables() {
    let dp = DatapathConfig::default();
    assert_eq!(dp.add.get(Datatype::Single), 3);
    assert_eq!(dp.add.get(Datatype::Double), 4);
    assert_eq!(dp.mul.get(Datatype::Double), 5);
    assert_eq!(dp.div.get(Datatype::Double), 20);
    assert!(dp.mixed_precision);
}

// ══════════════════════════════════════════════════════════
// 2. JSON
// ══════════════════════════════════════════════════════════

#[test]
fn test_empty_json_gives_defaults() {
    let config = Config::from_json("{}").unwrap();
    assert_eq!(config.scratchpad.banks, 8);
    assert_eq!(config.mem_unit.channels, 4);
}

#[test]
fn test_partial_json_overrides_fields() {
    let config = Config::from_json(
        r#"{
            "scratchpad": { "banks": 4, "latency": 3 },
            "mem_unit": { "channels": 2, "coalesce": true },
            "core": { "exec_mode": "atomic", "drain_policy": "discard" },
            "memory": { "controller": "Dram" }
        }"#,
    )
    .unwrap();
    assert_eq!(config.scratchpad.banks, 4);
    assert_eq!(config.scratchpad.latency, 3);
    assert_eq!(config.scratchpad.stripe_bytes, 8);
    assert_eq!(config.mem_unit.channels, 2);
    assert!(config.mem_unit.coalesce);
    assert_eq!(config.core.exec_mode, ExecMode::Atomic);
    assert_eq!(config.core.drain_policy, DrainPolicy::Discard);
    assert_eq!(config.memory.controller, MemoryController::Dram);
}

#[test]
fn test_malformed_json_is_parse_error() {
    let err = Config::from_json("{ not json").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn test_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{ "datapath": {{ "simd_width": 4 }} }}"#).unwrap();
    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.datapath.simd_width, 4);
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Config::from_file(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

// ══════════════════════════════════════════════════════════
// 3. Validation
// ══════════════════════════════════════════════════════════

#[rstest]
#[case::zero_banks(r#"{ "scratchpad": { "banks": 0 } }"#, "scratchpad.banks")]
#[case::ragged_capacity(r#"{ "scratchpad": { "capacity": 100 } }"#, "scratchpad.capacity")]
#[case::zero_latency(r#"{ "scratchpad": { "latency": 0 } }"#, "scratchpad.latency")]
#[case::one_channel(r#"{ "mem_unit": { "channels": 1 } }"#, "mem_unit.channels")]
#[case::five_channels(r#"{ "mem_unit": { "channels": 5 } }"#, "mem_unit.channels")]
#[case::zero_capacity(r#"{ "mem_unit": { "channel_capacity": 0 } }"#, "mem_unit.channel_capacity")]
#[case::zero_simd(r#"{ "datapath": { "simd_width": 0 } }"#, "datapath.simd_width")]
#[case::odd_page(r#"{ "tlb": { "page_size": 3000 } }"#, "tlb.page_size")]
#[case::no_registers(r#"{ "core": { "registers": 0 } }"#, "core.registers")]
fn test_invalid_configs_rejected(#[case] json: &str, #[case] expected_field: &str) {
    match Config::from_json(json) {
        Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, expected_field),
        other => panic!("expected invalid {expected_field}, got {other:?}"),
    }
}

#[test]
fn test_unaligned_mapping_rejected() {
    let err = Config::from_json(
        r#"{ "tlb": { "mappings": [ { "vbase": 4097, "pbase": 0, "size": 4096 } ] } }"#,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { field: "tlb.mappings", .. }));
}
