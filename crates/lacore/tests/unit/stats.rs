//! # Statistics Tests
//!
//! Counter updates from retired instructions and from real runs, plus the
//! section printer.

use lacore_core::common::{Datatype, Fault, Location, Value};
use lacore_core::core::Output;
use lacore_core::core::arch::{DataOp, InstKind, ReduceOp};
use lacore_core::soc::CacheTlbCounters;
use lacore_core::stats::{LaStats, STATS_SECTIONS};
use pretty_assertions::assert_eq;

use crate::common::harness::{TestContext, copy, data, set_scalar, set_vector};

// ══════════════════════════════════════════════════════════
// 1. Recording
// ══════════════════════════════════════════════════════════

#[test]
fn record_outcome_counts_by_kind_and_fault() {
    let mut stats = LaStats::default();
    stats.record_outcome(InstKind::Config, &Ok(Output::None));
    stats.record_outcome(InstKind::DataOp, &Ok(Output::Scalar(Value::F64(1.0))));
    stats.record_outcome(InstKind::XferOp, &Err(Fault::Drained));
    stats.record_outcome(InstKind::XferOp, &Ok(Output::Status(0)));
    assert_eq!(stats.inst_config, 1);
    assert_eq!(stats.inst_data, 1);
    assert_eq!(stats.inst_xfer, 2);
    assert_eq!(stats.faults, 1);
    assert_eq!(stats.instructions_retired(), 4);
}

// ══════════════════════════════════════════════════════════
// 2. Counters After A Run
// ══════════════════════════════════════════════════════════

#[test]
fn run_updates_every_counter_family() {
    let mut ctx = TestContext::new();
    ctx.poke_f64(Location::Scratchpad, 0, &[1.0, 2.0]);
    ctx.configure(set_vector(1, Location::Scratchpad, 0, Datatype::Double, 8, 2));
    ctx.configure(set_vector(2, Location::Memory, 0x1000, Datatype::Double, 8, 2));
    ctx.configure(set_scalar(3, Value::F64(0.0)));
    assert!(ctx.exec(copy(1, 2)).is_ok());
    assert!(ctx.exec(data(DataOp::reduce(3, 2, ReduceOp::Max))).is_ok());

    let core = ctx.core();
    let stats = &core.stats;
    assert_eq!(stats.cycles, core.now());
    assert_eq!(stats.inst_config, 3);
    assert_eq!(stats.inst_xfer, 1);
    assert_eq!(stats.inst_data, 1);
    assert_eq!(stats.faults, 0);
    assert_eq!(stats.spad_reads, 2);
    assert_eq!(stats.mem_writes, 2);
    assert_eq!(stats.mem_reads, 2);
    assert_eq!(stats.bytes_read, 32);
    assert_eq!(stats.bytes_written, 16);
    assert_eq!(stats.elements_transferred, 2);
    assert_eq!(stats.elements_computed, 2);
    assert_eq!(u64::from(core.status.retired()), stats.instructions_retired());

    let cache = core.cache().counters();
    assert!(cache.hits + cache.misses >= 4);
    assert!(cache.tlb_misses >= 1);
}

#[test]
fn stats_serialize_without_wall_clock() {
    let stats = LaStats::default();
    let json = serde_json::to_value(&stats).unwrap();
    assert_eq!(json["cycles"], serde_json::json!(0));
    assert!(json.get("start_time").is_none());
}

// ══════════════════════════════════════════════════════════
// 3. Printing
// ══════════════════════════════════════════════════════════

#[test]
fn print_sections_accepts_every_known_section() {
    let stats = LaStats::default();
    let all: Vec<String> = STATS_SECTIONS.iter().map(ToString::to_string).collect();
    stats.print_sections(&all, CacheTlbCounters::default());
    stats.print(CacheTlbCounters::default());
}
