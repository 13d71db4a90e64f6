//! # Transfer Unit Tests
//!
//! Verifies XFER_OP execution:
//! - Copies between the scratchpad and main memory, both modes
//! - Register scalars as copy source and destination
//! - Row layouts with a skip between rows, and scalars stored in memory
//! - Alias detection before any access
//! - Translation faults and refused requests from the Cache+TLB path
//! - Status register access
//! - Responses returning out of order through the Cache+TLB path

use lacore_core::common::{AccessReason, Datatype, Fault, Location, Value};
use lacore_core::config::{Config, ExecMode};
use lacore_core::core::Output;
use lacore_core::core::arch::{Instruction, XferOp};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rstest::rstest;

use crate::common::harness::{
    TestContext, config_with_mode, copy, set_rows, set_scalar, set_scalar_at, set_vector,
    test_config,
};
use crate::common::mocks::{flaky_cache_tlb, unmapped_cache_tlb};

const SPAD: Location = Location::Scratchpad;
const MEM: Location = Location::Memory;
const F64: Datatype = Datatype::Double;

// ══════════════════════════════════════════════════════════
// 1. Copies
// ══════════════════════════════════════════════════════════

#[rstest]
#[case::timing(ExecMode::Timing)]
#[case::atomic(ExecMode::Atomic)]
fn scratchpad_to_scratchpad(#[case] mode: ExecMode) {
    let mut ctx = TestContext::with_config(&config_with_mode(mode));
    ctx.poke_f64(SPAD, 0, &[1.0, 2.0, 3.0, 4.0]);
    ctx.configure(set_vector(1, SPAD, 0, F64, 8, 4));
    ctx.configure(set_vector(2, SPAD, 64, F64, 8, 4));

    assert_eq!(ctx.exec(copy(1, 2)), Ok(Output::None));
    assert_eq!(ctx.peek_f64(SPAD, 64, 4), vec![1.0, 2.0, 3.0, 4.0]);
    let stats = &ctx.core().stats;
    assert_eq!(stats.spad_reads, 4);
    assert_eq!(stats.spad_writes, 4);
    assert_eq!(stats.elements_transferred, 4);
    assert_eq!(stats.bytes_read, 32);
    assert_eq!(stats.bytes_written, 32);
}

#[rstest]
#[case::timing(ExecMode::Timing)]
#[case::atomic(ExecMode::Atomic)]
fn scratchpad_to_memory_and_back(#[case] mode: ExecMode) {
    let mut ctx = TestContext::with_config(&config_with_mode(mode));
    ctx.poke_f64(SPAD, 0, &[0.25, -8.0, 1e9]);
    ctx.configure(set_vector(1, SPAD, 0, F64, 8, 3));
    ctx.configure(set_vector(2, MEM, 0x8000, F64, 8, 3));
    ctx.configure(set_vector(3, SPAD, 512, F64, 8, 3));

    assert_eq!(ctx.exec(copy(1, 2)), Ok(Output::None));
    assert_eq!(ctx.peek_f64(MEM, 0x8000, 3), vec![0.25, -8.0, 1e9]);
    assert_eq!(ctx.exec(copy(2, 3)), Ok(Output::None));
    assert_eq!(ctx.peek_f64(SPAD, 512, 3), vec![0.25, -8.0, 1e9]);
    assert_eq!(ctx.core().stats.mem_writes, 3);
    assert_eq!(ctx.core().stats.mem_reads, 3);
}

#[test]
fn negative_stride_reverses() {
    let mut ctx = TestContext::new();
    ctx.poke_f64(SPAD, 0, &[1.0, 2.0, 3.0]);
    ctx.configure(set_vector(1, SPAD, 16, F64, -8, 3));
    ctx.configure(set_vector(2, SPAD, 128, F64, 8, 3));
    assert_eq!(ctx.exec(copy(1, 2)), Ok(Output::None));
    assert_eq!(ctx.peek_f64(SPAD, 128, 3), vec![3.0, 2.0, 1.0]);
}

#[test]
fn copy_narrows_double_to_single() {
    let mut ctx = TestContext::new();
    ctx.poke_f64(SPAD, 0, &[1.5, -0.5]);
    ctx.configure(set_vector(1, SPAD, 0, F64, 8, 2));
    ctx.configure(set_vector(2, SPAD, 64, Datatype::Single, 4, 2));
    assert_eq!(ctx.exec(copy(1, 2)), Ok(Output::None));
    let mut raw = [0u8; 8];
    ctx.core().scratchpad.peek(64, &mut raw).unwrap();
    assert_eq!(Value::decode(Datatype::Single, &raw[..4]), Some(Value::F32(1.5)));
    assert_eq!(Value::decode(Datatype::Single, &raw[4..]), Some(Value::F32(-0.5)));
}

// ══════════════════════════════════════════════════════════
// 2. Register Operands
// ══════════════════════════════════════════════════════════

#[rstest]
#[case::timing(ExecMode::Timing)]
#[case::atomic(ExecMode::Atomic)]
fn scalar_is_broadcast_to_every_element(#[case] mode: ExecMode) {
    let mut ctx = TestContext::with_config(&config_with_mode(mode));
    ctx.configure(set_scalar(1, Value::F64(2.5)));
    ctx.configure(set_vector(2, SPAD, 0, F64, 8, 4));
    assert_eq!(ctx.exec(copy(1, 2)), Ok(Output::None));
    assert_eq!(ctx.peek_f64(SPAD, 0, 4), vec![2.5; 4]);
    assert_eq!(ctx.core().stats.spad_reads, 0);
    assert_eq!(ctx.core().stats.spad_writes, 4);
}

#[rstest]
#[case::timing(ExecMode::Timing)]
#[case::atomic(ExecMode::Atomic)]
fn single_element_into_register(#[case] mode: ExecMode) {
    let mut ctx = TestContext::with_config(&config_with_mode(mode));
    ctx.poke_f64(SPAD, 40, &[7.0]);
    ctx.configure(set_vector(1, SPAD, 40, F64, 8, 1));
    ctx.configure(set_scalar(2, Value::F64(0.0)));
    assert_eq!(ctx.exec(copy(1, 2)), Ok(Output::Scalar(Value::F64(7.0))));
    assert_eq!(ctx.core().regs.get(2).unwrap().scalar, Some(Value::F64(7.0)));
}

// ══════════════════════════════════════════════════════════
// 3. Faults
// ══════════════════════════════════════════════════════════

#[test]
fn overlapping_copy_is_alias_fault() {
    let mut ctx = TestContext::new();
    ctx.poke_f64(SPAD, 0, &[1.0, 2.0, 3.0, 4.0]);
    ctx.configure(set_vector(1, SPAD, 0, F64, 8, 4));
    ctx.configure(set_vector(2, SPAD, 16, F64, 8, 4));
    assert_eq!(ctx.exec(copy(1, 2)), Err(Fault::Alias { src: 0, dst: 16 }));
    // Nothing moved.
    assert_eq!(ctx.peek_f64(SPAD, 0, 4), vec![1.0, 2.0, 3.0, 4.0]);
    assert_eq!(ctx.core().stats.spad_reads, 0);
}

#[test]
fn same_offsets_in_different_storage_do_not_alias() {
    let mut ctx = TestContext::new();
    ctx.configure(set_vector(1, SPAD, 0, F64, 8, 4));
    ctx.configure(set_vector(2, MEM, 0, F64, 8, 4));
    assert_eq!(ctx.exec(copy(1, 2)), Ok(Output::None));
}

#[test]
fn count_mismatch_is_configuration_fault() {
    let mut ctx = TestContext::new();
    ctx.configure(set_vector(1, SPAD, 0, F64, 8, 4));
    ctx.configure(set_vector(2, SPAD, 64, F64, 8, 2));
    assert!(matches!(ctx.exec(copy(1, 2)), Err(Fault::Configuration(_))));
}

#[rstest]
#[case::timing(ExecMode::Timing)]
#[case::atomic(ExecMode::Atomic)]
fn unmapped_destination_is_translation_fault(#[case] mode: ExecMode) {
    let config = config_with_mode(mode);
    let mut ctx = TestContext::with_cache_tlb(&config, Box::new(unmapped_cache_tlb()));
    ctx.configure(set_vector(1, SPAD, 0, F64, 8, 4));
    ctx.configure(set_vector(2, MEM, 0x1000, F64, 8, 4));
    assert_eq!(
        ctx.exec(copy(1, 2)),
        Err(Fault::Translation { addr: 0x1000 })
    );
    assert!(ctx.core().tracker().is_empty());
    assert_eq!(ctx.core().status.flags(), 1 << 1);
}

#[rstest]
#[case::timing(ExecMode::Timing)]
#[case::atomic(ExecMode::Atomic)]
fn element_crossing_a_page_is_access_fault(#[case] mode: ExecMode) {
    let mut ctx = TestContext::with_config(&config_with_mode(mode));
    ctx.configure(set_vector(1, SPAD, 0, F64, 8, 1));
    ctx.configure(set_vector(2, MEM, 4092, F64, 8, 1));
    assert_eq!(
        ctx.exec(copy(1, 2)),
        Err(Fault::Access {
            addr: 4092,
            len: 8,
            reason: AccessReason::PageCrossing
        })
    );
}

#[test]
fn refused_reads_are_retried() {
    let config = test_config();
    let mut ctx = TestContext::with_cache_tlb(&config, Box::new(flaky_cache_tlb(3)));
    ctx.poke_f64(SPAD, 0, &[9.0; 4]);
    ctx.configure(set_vector(1, MEM, 0x1000, F64, 8, 4));
    ctx.configure(set_vector(2, SPAD, 0, F64, 8, 4));
    assert_eq!(ctx.exec(copy(1, 2)), Ok(Output::None));
    assert_eq!(ctx.peek_f64(SPAD, 0, 4), vec![0.0; 4]);
    assert_eq!(ctx.core().stats.retries, 3);
    assert_eq!(ctx.core().stats.mem_reads, 4);
}

// ══════════════════════════════════════════════════════════
// 4. Status Register
// ══════════════════════════════════════════════════════════

#[test]
fn read_and_clear_status() {
    let mut ctx = TestContext::new();
    ctx.configure(set_vector(1, SPAD, 0, F64, 8, 4));
    ctx.configure(set_vector(2, SPAD, 8, F64, 8, 4));
    assert!(ctx.exec(copy(1, 2)).is_err());

    let read = Instruction::Xfer(XferOp::ReadStatus);
    let alias_bit = Fault::Alias { src: 0, dst: 0 }.status_bit();
    assert_eq!(ctx.exec(read.clone()), Ok(Output::Status((3 << 32) | alias_bit)));
    assert_eq!(
        ctx.exec(Instruction::Xfer(XferOp::ClearStatus)),
        Ok(Output::None)
    );
    assert_eq!(ctx.exec(read), Ok(Output::Status(5 << 32)));
}

#[test]
fn flags_accumulate_until_cleared() {
    let mut ctx = TestContext::new();
    assert!(ctx.exec(copy(0, 1)).is_err());
    ctx.configure(set_vector(1, SPAD, 0, F64, 8, 2));
    ctx.configure(set_vector(2, SPAD, 8, F64, 8, 2));
    assert!(ctx.exec(copy(1, 2)).is_err());
    let expected = Fault::Configuration(String::new()).status_bit()
        | Fault::Alias { src: 0, dst: 0 }.status_bit();
    assert_eq!(u64::from(ctx.core().status.flags()), expected);
}

// ══════════════════════════════════════════════════════════
// 5. Properties
// ══════════════════════════════════════════════════════════

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// A → B → C through main memory leaves C equal to A.
    #[test]
    fn prop_round_trip_through_memory(
        values in proptest::collection::vec(-1.0e6f64..1.0e6, 1..32),
        atomic in any::<bool>(),
        capacity in 1usize..5,
    ) {
        let mut config: Config = config_with_mode(if atomic { ExecMode::Atomic } else { ExecMode::Timing });
        config.mem_unit.channel_capacity = capacity;
        let n = values.len() as u64;
        let mut ctx = TestContext::with_config(&config);
        ctx.poke_f64(SPAD, 0, &values);
        ctx.configure(set_vector(1, SPAD, 0, F64, 8, n));
        ctx.configure(set_vector(2, MEM, 0x2_0000, F64, 8, n));
        ctx.configure(set_vector(3, SPAD, 1024, F64, 8, n));
        prop_assert_eq!(ctx.exec(copy(1, 2)), Ok(Output::None));
        prop_assert_eq!(ctx.exec(copy(2, 3)), Ok(Output::None));
        prop_assert_eq!(ctx.peek_f64(SPAD, 1024, values.len()), values);
    }
}

// ══════════════════════════════════════════════════════════
// 6. Row Layouts And Stored Scalars
// ══════════════════════════════════════════════════════════

#[rstest]
#[case::timing(ExecMode::Timing)]
#[case::atomic(ExecMode::Atomic)]
fn matrix_rows_skip_between_rows(#[case] mode: ExecMode) {
    // Two rows of three doubles, 64 bytes apart: a 3-column window of an
    // 8-column matrix.
    let mut ctx = TestContext::with_config(&config_with_mode(mode));
    ctx.poke_f64(SPAD, 0, &[1.0, 2.0, 3.0, -1.0, -1.0, -1.0, -1.0, -1.0]);
    ctx.poke_f64(SPAD, 64, &[4.0, 5.0, 6.0]);
    ctx.configure(set_vector(1, SPAD, 0, F64, 8, 6));
    ctx.configure(set_rows(1, 3, 40));
    ctx.configure(set_vector(2, SPAD, 512, F64, 8, 6));

    assert_eq!(ctx.exec(copy(1, 2)), Ok(Output::None));
    assert_eq!(ctx.peek_f64(SPAD, 512, 6), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
}

#[test]
fn matrix_destination_with_coalescing() {
    let mut config = test_config();
    config.mem_unit.coalesce = true;
    let mut ctx = TestContext::with_config(&config);
    ctx.poke_f64(SPAD, 0, &[1.0, 2.0, 3.0, 4.0]);
    ctx.configure(set_vector(1, SPAD, 0, F64, 8, 4));
    ctx.configure(set_vector(2, SPAD, 1024, F64, 8, 4));
    ctx.configure(set_rows(2, 2, 48));

    assert_eq!(ctx.exec(copy(1, 2)), Ok(Output::None));
    assert_eq!(ctx.peek_f64(SPAD, 1024, 2), vec![1.0, 2.0]);
    assert_eq!(ctx.peek_f64(SPAD, 1088, 2), vec![3.0, 4.0]);
    // One request per row.
    assert_eq!(ctx.core().stats.spad_writes, 2);
}

#[rstest]
#[case::timing(ExecMode::Timing)]
#[case::atomic(ExecMode::Atomic)]
fn stored_scalar_is_read_once_and_repeated(#[case] mode: ExecMode) {
    let mut ctx = TestContext::with_config(&config_with_mode(mode));
    ctx.poke_f64(MEM, 0x3000, &[2.5]);
    ctx.configure(set_scalar_at(1, MEM, 0x3000, F64));
    ctx.configure(set_vector(2, SPAD, 0, F64, 8, 5));

    assert_eq!(ctx.exec(copy(1, 2)), Ok(Output::None));
    assert_eq!(ctx.peek_f64(SPAD, 0, 5), vec![2.5; 5]);
    assert_eq!(ctx.core().stats.mem_reads, 1);
    assert_eq!(ctx.core().stats.elements_transferred, 5);
}

#[test]
fn stored_scalar_destination_takes_one_element() {
    let mut ctx = TestContext::new();
    ctx.poke_f64(SPAD, 0, &[7.0]);
    ctx.configure(set_vector(1, SPAD, 0, F64, 8, 1));
    ctx.configure(set_scalar_at(2, MEM, 0x3008, F64));
    assert_eq!(ctx.exec(copy(1, 2)), Ok(Output::None));
    assert_eq!(ctx.peek_f64(MEM, 0x3008, 1), vec![7.0]);
}

#[test]
fn huge_disjoint_copy_faults_without_materializing_elements() {
    let mut ctx = TestContext::new();
    ctx.configure(set_vector(1, SPAD, 0, F64, 8, 1 << 24));
    ctx.configure(set_vector(2, SPAD, 1 << 40, F64, 8, 1 << 24));
    let outcome = ctx.run(copy(1, 2));
    assert!(matches!(outcome.result, Err(Fault::Access { .. })));
    assert!(outcome.completed_at - outcome.issued_at < 1_000);
}

// ══════════════════════════════════════════════════════════
// 7. Out-Of-Order Responses
// ══════════════════════════════════════════════════════════

#[test]
fn copy_keeps_element_order_when_later_reads_hit() {
    // Stride 64 puts every element on its own line. Warming lines 1..3
    // makes element 0 the only miss, so its response comes back last.
    let mut ctx = TestContext::new();
    for (i, v) in [1.0, 2.0, 3.0, 4.0].into_iter().enumerate() {
        ctx.poke_f64(MEM, 0x1_0000 + 64 * i as u64, &[v]);
    }
    ctx.configure(set_vector(1, MEM, 0x1_0040, F64, 64, 3));
    ctx.configure(set_vector(2, SPAD, 0, F64, 8, 3));
    assert_eq!(ctx.exec(copy(1, 2)), Ok(Output::None));

    let before = ctx.core().cache().counters();
    ctx.configure(set_vector(1, MEM, 0x1_0000, F64, 64, 4));
    ctx.configure(set_vector(3, SPAD, 256, F64, 8, 4));
    assert_eq!(ctx.exec(copy(1, 3)), Ok(Output::None));
    let after = ctx.core().cache().counters();

    assert_eq!(after.misses - before.misses, 1);
    assert_eq!(after.hits - before.hits, 3);
    assert_eq!(ctx.peek_f64(SPAD, 256, 4), vec![1.0, 2.0, 3.0, 4.0]);
}

#[test]
fn core_with_mock_collaborator_is_debug() {
    let ctx = TestContext::with_cache_tlb(&test_config(), Box::new(unmapped_cache_tlb()));
    assert!(format!("{:?}", ctx.core()).contains("MockCollaborator"));
}
