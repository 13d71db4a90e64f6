//! Test harness around one simulated LA-core.

use lacore_core::common::{Datatype, Fault, Location, Value};
use lacore_core::config::{Config, ExecMode};
use lacore_core::core::arch::{ConfigKind, ConfigOp, DataOp, Instruction, XferOp};
use lacore_core::core::{LaCore, Outcome, Output};
use lacore_core::soc::CacheTlb;
use lacore_core::sim::Simulator;

/// Installs a test-writer subscriber once; honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Default configuration in timing mode.
pub fn test_config() -> Config {
    Config::default()
}

/// Default configuration with the given execution mode.
pub fn config_with_mode(mode: ExecMode) -> Config {
    let mut config = test_config();
    config.core.exec_mode = mode;
    config
}

/// A CONFIG instruction setting a full vector descriptor.
pub fn set_vector(
    dst: usize,
    location: Location,
    base: u64,
    datatype: Datatype,
    stride: i64,
    count: u64,
) -> Instruction {
    Instruction::Config(ConfigOp {
        dst,
        kind: ConfigKind::Vector {
            location,
            base,
            datatype,
            stride,
            count,
        },
    })
}

/// A CONFIG instruction holding a scalar in the register.
pub fn set_scalar(dst: usize, value: Value) -> Instruction {
    Instruction::Config(ConfigOp {
        dst,
        kind: ConfigKind::Scalar { value },
    })
}

/// A CONFIG instruction splitting a configured vector into rows.
pub fn set_rows(dst: usize, row_len: u64, skip: i64) -> Instruction {
    Instruction::Config(ConfigOp {
        dst,
        kind: ConfigKind::Matrix { row_len, skip },
    })
}

/// A CONFIG instruction pointing the register at one stored scalar.
pub fn set_scalar_at(dst: usize, location: Location, base: u64, datatype: Datatype) -> Instruction {
    Instruction::Config(ConfigOp {
        dst,
        kind: ConfigKind::ScalarAt {
            location,
            base,
            datatype,
        },
    })
}

/// An XFER_OP copy.
pub fn copy(src: usize, dst: usize) -> Instruction {
    Instruction::Xfer(XferOp::Copy { src, dst })
}

/// A DATA_OP.
pub fn data(op: DataOp) -> Instruction {
    Instruction::Data(op)
}

/// Owns a simulator and runs instructions to completion.
pub struct TestContext {
    pub sim: Simulator,
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_config(&test_config())
    }

    pub fn with_config(config: &Config) -> Self {
        init_tracing();
        let mut sim = Simulator::new(config).unwrap();
        sim.max_cycles = 100_000;
        Self { sim }
    }

    pub fn with_cache_tlb(config: &Config, cache: Box<dyn CacheTlb>) -> Self {
        init_tracing();
        let core = LaCore::with_cache_tlb(config, cache).unwrap();
        let mut sim = Simulator::with_core(core);
        sim.max_cycles = 100_000;
        Self { sim }
    }

    /// Convenience accessor for the core.
    pub fn core(&self) -> &LaCore {
        &self.sim.core
    }

    /// Mutable convenience accessor for the core.
    pub fn core_mut(&mut self) -> &mut LaCore {
        &mut self.sim.core
    }

    /// Runs one instruction and returns its outcome.
    pub fn run(&mut self, insn: Instruction) -> Outcome {
        self.sim.run_instruction(insn).unwrap()
    }

    /// Runs one instruction and returns its result.
    pub fn exec(&mut self, insn: Instruction) -> Result<Output, Fault> {
        self.run(insn).result
    }

    /// Runs a CONFIG instruction that must succeed.
    pub fn configure(&mut self, insn: Instruction) {
        assert_eq!(self.exec(insn), Ok(Output::None));
    }

    /// Writes doubles contiguously into `location`.
    pub fn poke_f64(&mut self, location: Location, addr: u64, values: &[f64]) {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        match location {
            Location::Scratchpad => self.sim.core.scratchpad.poke(addr, &bytes).unwrap(),
            Location::Memory => self.sim.core.write_memory(addr, &bytes).unwrap(),
            Location::Register => panic!("registers hold no bytes"),
        }
    }

    /// Reads `count` contiguous doubles from `location`.
    pub fn peek_f64(&mut self, location: Location, addr: u64, count: usize) -> Vec<f64> {
        let mut bytes = vec![0u8; count * 8];
        match location {
            Location::Scratchpad => self.sim.core.scratchpad.peek(addr, &mut bytes).unwrap(),
            Location::Memory => self.sim.core.read_memory(addr, &mut bytes).unwrap(),
            Location::Register => panic!("registers hold no bytes"),
        }
        bytes
            .chunks_exact(8)
            .map(|c| f64::from_le_bytes(c.try_into().unwrap()))
            .collect()
    }
}
