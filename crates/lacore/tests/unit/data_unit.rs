//! # Data Compute Unit Tests
//!
//! Verifies DATA_OP execution in both modes:
//! - Elementwise arithmetic over scratchpad and memory streams
//! - Whole-vector and segmented reductions
//! - Register scalars broadcast as operands, and scalars stored in memory
//! - Row layouts as sources
//! - Reduction order when responses return out of order
//! - Timing of the pipelined datapath
//! - Configuration faults raised before any access

use lacore_core::common::{Datatype, Fault, Location, Value};
use lacore_core::config::{Config, ExecMode};
use lacore_core::core::Output;
use lacore_core::core::arch::{DataOp, Form, ReduceOp, Reduction};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rstest::rstest;

use crate::common::harness::{
    TestContext, config_with_mode, data, set_rows, set_scalar, set_scalar_at, set_vector,
};

const SPAD: Location = Location::Scratchpad;
const F64: Datatype = Datatype::Double;

// ══════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════

/// Loads `values` at scratchpad 0 into v1 and a scalar destination into v0.
fn reduction_setup(config: &Config, values: &[f64]) -> TestContext {
    let mut ctx = TestContext::with_config(config);
    ctx.poke_f64(SPAD, 0, values);
    ctx.configure(set_vector(1, SPAD, 0, F64, 8, values.len() as u64));
    ctx.configure(set_scalar(0, Value::F64(0.0)));
    ctx
}

/// v1 = [1,2,3,4] at 0, v2 = [10,20,30,40] at 64, v3 = 4 doubles at 128.
fn binary_setup(mode: ExecMode) -> TestContext {
    let mut ctx = TestContext::with_config(&config_with_mode(mode));
    ctx.poke_f64(SPAD, 0, &[1.0, 2.0, 3.0, 4.0]);
    ctx.poke_f64(SPAD, 64, &[10.0, 20.0, 30.0, 40.0]);
    ctx.configure(set_vector(1, SPAD, 0, F64, 8, 4));
    ctx.configure(set_vector(2, SPAD, 64, F64, 8, 4));
    ctx.configure(set_vector(3, SPAD, 128, F64, 8, 4));
    ctx
}

// ══════════════════════════════════════════════════════════
// 1. Reductions
// ══════════════════════════════════════════════════════════

#[rstest]
#[case::timing(ExecMode::Timing)]
#[case::atomic(ExecMode::Atomic)]
fn reduce_sum_into_register(#[case] mode: ExecMode) {
    let mut ctx = reduction_setup(&config_with_mode(mode), &[1.0, 2.0, 3.0, 4.0]);
    let outcome = ctx.run(data(DataOp::reduce(0, 1, ReduceOp::Sum)));
    assert_eq!(outcome.result, Ok(Output::Scalar(Value::F64(10.0))));
    assert!(outcome.completed_at >= outcome.issued_at + 7);
    assert_eq!(
        ctx.core().regs.get(0).unwrap().scalar,
        Some(Value::F64(10.0))
    );
    assert_eq!(ctx.core().stats.elements_computed, 4);
}

#[test]
fn timing_reduce_takes_read_vector_and_tree_latency() {
    // Reads land at +3, two batches of two lanes, vector stage 1 cycle,
    // reduction tree 4 cycles: the second batch clears the tree at +9.
    let mut ctx = reduction_setup(&config_with_mode(ExecMode::Timing), &[1.0, 2.0, 3.0, 4.0]);
    let outcome = ctx.run(data(DataOp::reduce(0, 1, ReduceOp::Sum)));
    assert_eq!(outcome.completed_at - outcome.issued_at, 9);
    assert_eq!(ctx.core().stats.spad_reads, 4);
}

#[test]
fn atomic_reduce_sums_access_latencies() {
    // 4 reads of 2 cycles, vector stage 1, reduction tree 4.
    let mut ctx = reduction_setup(&config_with_mode(ExecMode::Atomic), &[1.0, 2.0, 3.0, 4.0]);
    let outcome = ctx.run(data(DataOp::reduce(0, 1, ReduceOp::Sum)));
    assert_eq!(outcome.completed_at - outcome.issued_at, 14);
}

#[rstest]
#[case::min(ReduceOp::Min, -7.5)]
#[case::max(ReduceOp::Max, 9.0)]
fn min_max_reductions(#[case] op: ReduceOp, #[case] expected: f64) {
    let mut ctx = reduction_setup(&Config::default(), &[3.0, -7.5, 9.0, 0.5, 2.0]);
    assert_eq!(
        ctx.exec(data(DataOp::reduce(0, 1, op))),
        Ok(Output::Scalar(Value::F64(expected)))
    );
}

#[test]
fn single_element_min_is_that_element() {
    let mut ctx = reduction_setup(&Config::default(), &[42.0]);
    assert_eq!(
        ctx.exec(data(DataOp::reduce(0, 1, ReduceOp::Min))),
        Ok(Output::Scalar(Value::F64(42.0)))
    );
}

#[rstest]
#[case::timing(ExecMode::Timing)]
#[case::atomic(ExecMode::Atomic)]
fn segmented_reduce_writes_one_value_per_segment(#[case] mode: ExecMode) {
    let mut ctx = TestContext::with_config(&config_with_mode(mode));
    ctx.poke_f64(SPAD, 0, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    ctx.configure(set_vector(1, SPAD, 0, F64, 8, 6));
    ctx.configure(set_vector(2, SPAD, 256, F64, 8, 2));
    let mut op = DataOp::reduce(2, 1, ReduceOp::Sum);
    op.reduce = Some(Reduction {
        op: ReduceOp::Sum,
        segment: Some(3),
    });
    assert_eq!(ctx.exec(data(op)), Ok(Output::None));
    assert_eq!(ctx.peek_f64(SPAD, 256, 2), vec![6.0, 15.0]);
}

#[test]
fn segment_must_divide_count() {
    let mut ctx = TestContext::new();
    ctx.configure(set_vector(1, SPAD, 0, F64, 8, 6));
    ctx.configure(set_vector(2, SPAD, 256, F64, 8, 2));
    let mut op = DataOp::reduce(2, 1, ReduceOp::Sum);
    op.reduce = Some(Reduction {
        op: ReduceOp::Sum,
        segment: Some(4),
    });
    assert!(matches!(ctx.exec(data(op)), Err(Fault::Configuration(_))));
}

#[test]
fn reduce_keeps_element_order_when_later_reads_hit() {
    // In element order the sum is 1.0; folded in arrival order it is 0.0.
    // Lines 1..3 are warm, so element 0 (a miss) returns last.
    let mut ctx = TestContext::new();
    for (i, v) in [1e16, 1.0, -1e16, 1.0].into_iter().enumerate() {
        ctx.poke_f64(Location::Memory, 0x1_0000 + 64 * i as u64, &[v]);
    }
    ctx.configure(set_scalar(0, Value::F64(0.0)));
    ctx.configure(set_vector(1, Location::Memory, 0x1_0040, F64, 64, 3));
    assert!(ctx.exec(data(DataOp::reduce(0, 1, ReduceOp::Max))).is_ok());

    let before = ctx.core().cache().counters();
    ctx.configure(set_vector(1, Location::Memory, 0x1_0000, F64, 64, 4));
    assert_eq!(
        ctx.exec(data(DataOp::reduce(0, 1, ReduceOp::Sum))),
        Ok(Output::Scalar(Value::F64(1.0)))
    );
    let after = ctx.core().cache().counters();
    assert_eq!(after.misses - before.misses, 1);
    assert_eq!(after.hits - before.hits, 3);
}

#[rstest]
#[case::timing(ExecMode::Timing)]
#[case::atomic(ExecMode::Atomic)]
fn reduce_into_stored_scalar(#[case] mode: ExecMode) {
    let mut ctx = reduction_setup(&config_with_mode(mode), &[1.0, 2.0, 3.0, 4.0]);
    ctx.configure(set_scalar_at(5, Location::Memory, 0x3010, F64));
    assert_eq!(
        ctx.exec(data(DataOp::reduce(5, 1, ReduceOp::Sum))),
        Ok(Output::None)
    );
    assert_eq!(ctx.peek_f64(Location::Memory, 0x3010, 1), vec![10.0]);
}

#[rstest]
#[case::timing(ExecMode::Timing)]
#[case::atomic(ExecMode::Atomic)]
fn reduce_over_matrix_window(#[case] mode: ExecMode) {
    // The left 2x2 window of a 2x4 row-major matrix.
    let mut ctx = TestContext::with_config(&config_with_mode(mode));
    ctx.poke_f64(SPAD, 0, &[1.0, 2.0, 100.0, 100.0, 3.0, 4.0, 100.0, 100.0]);
    ctx.configure(set_vector(1, SPAD, 0, F64, 8, 4));
    ctx.configure(set_rows(1, 2, 16));
    ctx.configure(set_scalar(0, Value::F64(0.0)));
    assert_eq!(
        ctx.exec(data(DataOp::reduce(0, 1, ReduceOp::Sum))),
        Ok(Output::Scalar(Value::F64(10.0)))
    );
}

// ══════════════════════════════════════════════════════════
// 2. Elementwise
// ══════════════════════════════════════════════════════════

#[rstest]
#[case::timing(ExecMode::Timing)]
#[case::atomic(ExecMode::Atomic)]
fn elementwise_add(#[case] mode: ExecMode) {
    let mut ctx = binary_setup(mode);
    assert_eq!(ctx.exec(data(DataOp::add(3, 1, 2))), Ok(Output::None));
    assert_eq!(ctx.peek_f64(SPAD, 128, 4), vec![11.0, 22.0, 33.0, 44.0]);
}

#[rstest]
#[case::timing(ExecMode::Timing)]
#[case::atomic(ExecMode::Atomic)]
fn elementwise_mul(#[case] mode: ExecMode) {
    let mut ctx = binary_setup(mode);
    assert_eq!(ctx.exec(data(DataOp::mul(3, 1, 2))), Ok(Output::None));
    assert_eq!(ctx.peek_f64(SPAD, 128, 4), vec![10.0, 40.0, 90.0, 160.0]);
    assert_eq!(ctx.core().stats.elements_computed, 4);
}

#[test]
fn fused_multiply_subtract_with_scalar_broadcast() {
    let mut ctx = binary_setup(ExecMode::Timing);
    ctx.configure(set_scalar(4, Value::F64(1.0)));
    // v3 = v2 * v1 - 1.0
    let op = DataOp {
        c: Some(4),
        subtract: true,
        ..DataOp::mul(3, 2, 1)
    };
    assert_eq!(ctx.exec(data(op)), Ok(Output::None));
    assert_eq!(ctx.peek_f64(SPAD, 128, 4), vec![9.0, 39.0, 89.0, 159.0]);
}

#[test]
fn add_then_divide_form() {
    let mut ctx = binary_setup(ExecMode::Atomic);
    ctx.configure(set_scalar(4, Value::F64(2.0)));
    // v3 = (v1 + v2) / 2.0
    let op = DataOp {
        c: Some(4),
        divide: true,
        form: Form::AddMul,
        ..DataOp::add(3, 1, 2)
    };
    assert_eq!(ctx.exec(data(op)), Ok(Output::None));
    assert_eq!(ctx.peek_f64(SPAD, 128, 4), vec![5.5, 11.0, 16.5, 22.0]);
}

#[test]
fn memory_to_memory_add() {
    let mut ctx = TestContext::new();
    ctx.poke_f64(Location::Memory, 0x1000, &[0.5, 1.5]);
    ctx.poke_f64(Location::Memory, 0x2000, &[2.0, 4.0]);
    ctx.configure(set_vector(1, Location::Memory, 0x1000, F64, 8, 2));
    ctx.configure(set_vector(2, Location::Memory, 0x2000, F64, 8, 2));
    ctx.configure(set_vector(3, Location::Memory, 0x3000, F64, 8, 2));
    assert_eq!(ctx.exec(data(DataOp::add(3, 1, 2))), Ok(Output::None));
    assert_eq!(ctx.peek_f64(Location::Memory, 0x3000, 2), vec![2.5, 5.5]);
    assert_eq!(ctx.core().stats.mem_reads, 4);
    assert_eq!(ctx.core().stats.mem_writes, 2);
}

#[test]
fn strided_source_reads_every_other_element() {
    let mut ctx = binary_setup(ExecMode::Timing);
    ctx.configure(set_vector(1, SPAD, 0, F64, 16, 2));
    ctx.configure(set_vector(2, SPAD, 64, F64, 16, 2));
    ctx.configure(set_vector(3, SPAD, 128, F64, 8, 2));
    assert_eq!(ctx.exec(data(DataOp::add(3, 1, 2))), Ok(Output::None));
    assert_eq!(ctx.peek_f64(SPAD, 128, 2), vec![11.0, 33.0]);
}

#[test]
fn single_source_converts_to_destination_precision() {
    let mut ctx = TestContext::new();
    let bytes: Vec<u8> = [1.5f32, -2.0].iter().flat_map(|v| v.to_le_bytes()).collect();
    ctx.core_mut().scratchpad.poke(0, &bytes).unwrap();
    ctx.configure(set_vector(1, SPAD, 0, Datatype::Single, 4, 2));
    ctx.configure(set_vector(2, SPAD, 64, F64, 8, 2));
    let op = DataOp {
        b: None,
        ..DataOp::mul(2, 1, 1)
    };
    assert_eq!(ctx.exec(data(op)), Ok(Output::None));
    assert_eq!(ctx.peek_f64(SPAD, 64, 2), vec![1.5, -2.0]);
}

#[rstest]
#[case::timing(ExecMode::Timing)]
#[case::atomic(ExecMode::Atomic)]
fn stored_scalar_operand_is_read_once(#[case] mode: ExecMode) {
    let mut ctx = binary_setup(mode);
    ctx.poke_f64(Location::Memory, 0x3000, &[3.0]);
    ctx.configure(set_scalar_at(4, Location::Memory, 0x3000, F64));
    assert_eq!(ctx.exec(data(DataOp::mul(3, 1, 4))), Ok(Output::None));
    assert_eq!(ctx.peek_f64(SPAD, 128, 4), vec![3.0, 6.0, 9.0, 12.0]);
    assert_eq!(ctx.core().stats.mem_reads, 1);
}

// ══════════════════════════════════════════════════════════
// 3. Faults
// ══════════════════════════════════════════════════════════

#[test]
fn count_mismatch_is_configuration_fault() {
    let mut ctx = binary_setup(ExecMode::Timing);
    ctx.configure(set_vector(2, SPAD, 64, F64, 8, 3));
    assert!(matches!(
        ctx.exec(data(DataOp::add(3, 1, 2))),
        Err(Fault::Configuration(_))
    ));
    assert_eq!(ctx.core().stats.spad_reads, 0);
    assert_eq!(ctx.peek_f64(SPAD, 128, 4), vec![0.0; 4]);
}

#[test]
fn unconfigured_source_is_configuration_fault() {
    let mut ctx = TestContext::new();
    ctx.configure(set_vector(3, SPAD, 128, F64, 8, 4));
    assert!(matches!(
        ctx.exec(data(DataOp::add(3, 1, 2))),
        Err(Fault::Configuration(_))
    ));
}

#[test]
fn mixed_precision_disabled_rejects_conversion() {
    let mut config = Config::default();
    config.datapath.mixed_precision = false;
    let mut ctx = TestContext::with_config(&config);
    ctx.configure(set_vector(1, SPAD, 0, Datatype::Single, 4, 4));
    ctx.configure(set_vector(2, SPAD, 64, F64, 8, 4));
    let op = DataOp {
        b: None,
        ..DataOp::mul(2, 1, 1)
    };
    assert!(matches!(ctx.exec(data(op)), Err(Fault::Configuration(_))));
}

#[test]
fn more_streams_than_read_pipes_is_configuration_fault() {
    let mut config = Config::default();
    config.mem_unit.channels = 2;
    let mut ctx = TestContext::with_config(&config);
    ctx.configure(set_vector(1, SPAD, 0, F64, 8, 4));
    ctx.configure(set_vector(2, SPAD, 64, F64, 8, 4));
    ctx.configure(set_vector(3, SPAD, 128, F64, 8, 4));
    assert!(matches!(
        ctx.exec(data(DataOp::add(3, 1, 2))),
        Err(Fault::Configuration(_))
    ));
}

#[rstest]
#[case::timing(ExecMode::Timing)]
#[case::atomic(ExecMode::Atomic)]
fn out_of_range_source_is_access_fault(#[case] mode: ExecMode) {
    let mut ctx = TestContext::with_config(&config_with_mode(mode));
    let capacity = ctx.core().scratchpad.capacity();
    ctx.configure(set_vector(1, SPAD, capacity - 16, F64, 8, 4));
    ctx.configure(set_scalar(0, Value::F64(0.0)));
    let result = ctx.exec(data(DataOp::reduce(0, 1, ReduceOp::Sum)));
    assert!(matches!(result, Err(Fault::Access { .. })), "got {result:?}");
    assert!(ctx.core().tracker().is_empty());
    assert_eq!(ctx.core().status.flags(), 1 << 2);
}

// ══════════════════════════════════════════════════════════
// 4. Properties
// ══════════════════════════════════════════════════════════

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// The reduction result is the in-order sum no matter how responses
    /// interleave.
    #[test]
    fn prop_reduce_sum_is_in_order(
        values in proptest::collection::vec(-1.0e3f64..1.0e3, 1..24),
        latency in 1u64..6,
        capacity in 1usize..5,
        simd in 1usize..5,
        atomic in any::<bool>(),
    ) {
        let mut config = config_with_mode(if atomic { ExecMode::Atomic } else { ExecMode::Timing });
        config.scratchpad.latency = latency;
        config.mem_unit.channel_capacity = capacity;
        config.datapath.simd_width = simd;
        let expected = values.iter().fold(0.0f64, |acc, v| acc + v);

        let mut ctx = reduction_setup(&config, &values);
        let result = ctx.exec(data(DataOp::reduce(0, 1, ReduceOp::Sum)));
        prop_assert_eq!(result, Ok(Output::Scalar(Value::F64(expected))));
        prop_assert!(ctx.core().tracker().is_empty());
    }
}
