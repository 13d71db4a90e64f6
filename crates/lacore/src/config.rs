//! Configuration system for the LA-core model.
//!
//! This module defines every construction-time parameter of the coprocessor. It provides:
//! 1. **Defaults:** Baseline hardware constants (scratchpad geometry, latencies, channels).
//! 2. **Structures:** One config block per component (scratchpad, cache, TLB, memory, pipes, datapath, core).
//! 3. **Enums:** Memory controller, execution mode and drain policy selectors.
//! 4. **Validation:** `Config::validate` rejects geometries the model cannot be built with.
//!
//! Configuration is supplied as JSON (`Config::from_json`, `Config::from_file`) or
//! built from `Config::default()`. Every field is optional in JSON.

use std::path::Path;

use serde::Deserialize;

use crate::common::{ConfigError, Datatype};

/// Default configuration constants.
mod defaults {
    /// Scratchpad capacity in bytes (64 KiB).
    pub const SPAD_CAPACITY: u64 = 64 * 1024;

    /// Number of independently addressable scratchpad banks.
    pub const SPAD_BANKS: usize = 8;

    /// Interleave granule in bytes; consecutive granules go to consecutive banks.
    pub const SPAD_STRIPE: u64 = 8;

    /// Cycles per scratchpad bank access.
    pub const SPAD_LATENCY: u64 = 2;

    /// Scratchpad line size used when grouping element requests.
    pub const SPAD_LINE: u64 = 64;

    /// L1 cache size in bytes (32 KiB).
    pub const CACHE_SIZE: usize = 32 * 1024;

    /// L1 cache line size in bytes.
    pub const CACHE_LINE: usize = 64;

    /// L1 cache associativity.
    pub const CACHE_WAYS: usize = 4;

    /// Number of L1 banks (line-interleaved).
    pub const CACHE_BANKS: usize = 4;

    /// Timing requests each L1 bank accepts per cycle.
    pub const CACHE_PORTS: usize = 2;

    /// L1 hit latency in cycles.
    pub const CACHE_LATENCY: u64 = 2;

    /// TLB entry count.
    pub const TLB_SIZE: usize = 32;

    /// TLB hit latency in cycles.
    pub const TLB_LATENCY: u64 = 1;

    /// Extra cycles for a TLB miss (page walk).
    pub const TLB_WALK_LATENCY: u64 = 20;

    /// Page size in bytes.
    pub const PAGE_SIZE: u64 = 4096;

    /// Main memory size in bytes (256 MiB, sparsely allocated).
    pub const RAM_SIZE: u64 = 256 * 1024 * 1024;

    /// Fixed latency of the simple memory controller.
    pub const MEM_LATENCY: u64 = 60;

    /// CAS latency in DRAM cycles.
    pub const T_CAS: u64 = 14;

    /// RAS latency in DRAM cycles.
    pub const T_RAS: u64 = 14;

    /// Precharge latency in DRAM cycles.
    pub const T_PRE: u64 = 14;

    /// Memory channels (pipes) per hardware thread.
    pub const CHANNELS: usize = 4;

    /// Outstanding requests allowed per channel.
    pub const CHANNEL_CAPACITY: usize = 4;

    /// Add latency, single / double precision.
    pub const ADD_LATENCY: (u64, u64) = (3, 4);

    /// Multiply latency, single / double precision.
    pub const MUL_LATENCY: (u64, u64) = (4, 5);

    /// Divide latency, single / double precision.
    pub const DIV_LATENCY: (u64, u64) = (12, 20);

    /// Double precision elements accepted by the datapath per cycle.
    pub const SIMD_WIDTH: usize = 2;

    /// Vector registers per hardware thread.
    pub const REGISTERS: usize = 16;
}

/// Memory controller implementation types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum MemoryController {
    /// Every access takes `MemoryConfig::latency` cycles.
    #[default]
    Simple,
    /// DRAM controller with row buffer modeling (CAS, RAS, precharge).
    #[serde(alias = "DRAM")]
    Dram,
}

/// Selects the atomic or timing variant of the execution units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecMode {
    /// Synchronous accesses; each instruction reports an accumulated latency.
    Atomic,
    /// Scheduled accesses through the pipes and the per-element datapath.
    #[default]
    Timing,
}

/// What happens to in-flight requests when the core is drained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainPolicy {
    /// In-flight requests complete normally before the core reports drained.
    #[default]
    Wait,
    /// Outstanding requests are dropped; the in-flight instruction completes with a drain fault.
    Discard,
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Banked scratchpad geometry and latency.
    #[serde(default)]
    pub scratchpad: ScratchpadConfig,
    /// L1 cache tag model.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Address translation.
    #[serde(default)]
    pub tlb: TlbConfig,
    /// Main memory behind the L1.
    #[serde(default)]
    pub memory: MemoryConfig,
    /// Read/write pipes and their channels.
    #[serde(default)]
    pub mem_unit: MemUnitConfig,
    /// Arithmetic latencies and SIMD width.
    #[serde(default)]
    pub datapath: DatapathConfig,
    /// Register file, execution mode and drain policy.
    #[serde(default)]
    pub core: CoreConfig,
}

impl Config {
    /// Parses a configuration from JSON text and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON and
    /// [`ConfigError::Invalid`] when validation fails.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`Config::from_json`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Checks that every component can be built from this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let spad = &self.scratchpad;
        if spad.banks == 0 {
            return Err(ConfigError::invalid("scratchpad.banks", "must be non-zero"));
        }
        if spad.stripe_bytes == 0 {
            return Err(ConfigError::invalid(
                "scratchpad.stripe_bytes",
                "must be non-zero",
            ));
        }
        let row = spad.banks as u64 * spad.stripe_bytes;
        if spad.capacity == 0 || spad.capacity % row != 0 {
            return Err(ConfigError::invalid(
                "scratchpad.capacity",
                format!("must be a non-zero multiple of banks * stripe_bytes ({row})"),
            ));
        }
        if spad.latency == 0 {
            return Err(ConfigError::invalid("scratchpad.latency", "must be at least 1"));
        }
        if !spad.line_bytes.is_power_of_two() {
            return Err(ConfigError::invalid(
                "scratchpad.line_bytes",
                "must be a power of two",
            ));
        }

        let cache = &self.cache;
        if !cache.line_bytes.is_power_of_two() || cache.ways == 0 {
            return Err(ConfigError::invalid(
                "cache",
                "line_bytes must be a power of two and ways non-zero",
            ));
        }
        let sets = cache.size_bytes / (cache.line_bytes * cache.ways).max(1);
        if sets == 0 || !sets.is_power_of_two() {
            return Err(ConfigError::invalid(
                "cache.size_bytes",
                "must give a power-of-two number of sets",
            ));
        }
        if cache.banks == 0 || cache.ports == 0 || cache.latency == 0 {
            return Err(ConfigError::invalid(
                "cache",
                "banks, ports and latency must be non-zero",
            ));
        }

        if !self.tlb.page_size.is_power_of_two() {
            return Err(ConfigError::invalid("tlb.page_size", "must be a power of two"));
        }
        for m in &self.tlb.mappings {
            let mask = self.tlb.page_size - 1;
            if m.vbase & mask != 0 || m.pbase & mask != 0 || m.size & mask != 0 {
                return Err(ConfigError::invalid(
                    "tlb.mappings",
                    format!("mapping at {:#x} is not page aligned", m.vbase),
                ));
            }
        }

        let mu = &self.mem_unit;
        if !(2..=4).contains(&mu.channels) {
            return Err(ConfigError::invalid(
                "mem_unit.channels",
                "must be between 2 and 4",
            ));
        }
        if mu.channel_capacity == 0 {
            return Err(ConfigError::invalid(
                "mem_unit.channel_capacity",
                "must be non-zero",
            ));
        }

        if self.datapath.simd_width == 0 {
            return Err(ConfigError::invalid("datapath.simd_width", "must be non-zero"));
        }
        if self.core.registers == 0 {
            return Err(ConfigError::invalid("core.registers", "must be non-zero"));
        }
        Ok(())
    }
}

/// Banked scratchpad configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ScratchpadConfig {
    /// Capacity in bytes; a multiple of `banks * stripe_bytes`.
    #[serde(default = "ScratchpadConfig::default_capacity")]
    pub capacity: u64,

    /// Number of banks.
    #[serde(default = "ScratchpadConfig::default_banks")]
    pub banks: usize,

    /// Interleave granule in bytes.
    #[serde(default = "ScratchpadConfig::default_stripe")]
    pub stripe_bytes: u64,

    /// Cycles per bank access.
    #[serde(default = "ScratchpadConfig::default_latency")]
    pub latency: u64,

    /// Line size used to group element requests.
    #[serde(default = "ScratchpadConfig::default_line")]
    pub line_bytes: u64,
}

impl ScratchpadConfig {
    fn default_capacity() -> u64 {
        defaults::SPAD_CAPACITY
    }

    fn default_banks() -> usize {
        defaults::SPAD_BANKS
    }

    fn default_stripe() -> u64 {
        defaults::SPAD_STRIPE
    }

    fn default_latency() -> u64 {
        defaults::SPAD_LATENCY
    }

    fn default_line() -> u64 {
        defaults::SPAD_LINE
    }
}

impl Default for ScratchpadConfig {
    fn default() -> Self {
        Self {
            capacity: defaults::SPAD_CAPACITY,
            banks: defaults::SPAD_BANKS,
            stripe_bytes: defaults::SPAD_STRIPE,
            latency: defaults::SPAD_LATENCY,
            line_bytes: defaults::SPAD_LINE,
        }
    }
}

/// L1 cache tag model configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Total capacity in bytes.
    #[serde(default = "CacheConfig::default_size")]
    pub size_bytes: usize,

    /// Line size in bytes.
    #[serde(default = "CacheConfig::default_line")]
    pub line_bytes: usize,

    /// Associativity.
    #[serde(default = "CacheConfig::default_ways")]
    pub ways: usize,

    /// Line-interleaved banks.
    #[serde(default = "CacheConfig::default_banks")]
    pub banks: usize,

    /// Timing requests accepted per bank per cycle.
    #[serde(default = "CacheConfig::default_ports")]
    pub ports: usize,

    /// Hit latency in cycles.
    #[serde(default = "CacheConfig::default_latency")]
    pub latency: u64,
}

impl CacheConfig {
    fn default_size() -> usize {
        defaults::CACHE_SIZE
    }

    fn default_line() -> usize {
        defaults::CACHE_LINE
    }

    fn default_ways() -> usize {
        defaults::CACHE_WAYS
    }

    fn default_banks() -> usize {
        defaults::CACHE_BANKS
    }

    fn default_ports() -> usize {
        defaults::CACHE_PORTS
    }

    fn default_latency() -> u64 {
        defaults::CACHE_LATENCY
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            size_bytes: defaults::CACHE_SIZE,
            line_bytes: defaults::CACHE_LINE,
            ways: defaults::CACHE_WAYS,
            banks: defaults::CACHE_BANKS,
            ports: defaults::CACHE_PORTS,
            latency: defaults::CACHE_LATENCY,
        }
    }
}

/// One contiguous virtual-to-physical mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PageMapping {
    /// First virtual address of the region (page aligned).
    pub vbase: u64,
    /// First physical address of the region (page aligned).
    pub pbase: u64,
    /// Region size in bytes (page multiple).
    pub size: u64,
}

/// Address translation configuration.
///
/// With no `mappings` every page is identity mapped.
#[derive(Debug, Clone, Deserialize)]
pub struct TlbConfig {
    /// TLB entry count (rounded up to a power of two).
    #[serde(default = "TlbConfig::default_entries")]
    pub entries: usize,

    /// Hit latency in cycles.
    #[serde(default = "TlbConfig::default_latency")]
    pub latency: u64,

    /// Extra cycles spent walking the page map on a miss.
    #[serde(default = "TlbConfig::default_walk_latency")]
    pub walk_latency: u64,

    /// Page size in bytes.
    #[serde(default = "TlbConfig::default_page_size")]
    pub page_size: u64,

    /// Explicit page map; empty means identity mapping.
    #[serde(default)]
    pub mappings: Vec<PageMapping>,
}

impl TlbConfig {
    fn default_entries() -> usize {
        defaults::TLB_SIZE
    }

    fn default_latency() -> u64 {
        defaults::TLB_LATENCY
    }

    fn default_walk_latency() -> u64 {
        defaults::TLB_WALK_LATENCY
    }

    fn default_page_size() -> u64 {
        defaults::PAGE_SIZE
    }
}

impl Default for TlbConfig {
    fn default() -> Self {
        Self {
            entries: defaults::TLB_SIZE,
            latency: defaults::TLB_LATENCY,
            walk_latency: defaults::TLB_WALK_LATENCY,
            page_size: defaults::PAGE_SIZE,
            mappings: Vec::new(),
        }
    }
}

/// Main memory configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryConfig {
    /// Physical memory size in bytes.
    #[serde(default = "MemoryConfig::default_ram_size")]
    pub ram_size: u64,

    /// Memory controller type.
    #[serde(default)]
    pub controller: MemoryController,

    /// Fixed latency of the simple controller.
    #[serde(default = "MemoryConfig::default_latency")]
    pub latency: u64,

    /// CAS latency (column access strobe)
    #[serde(default = "MemoryConfig::default_t_cas")]
    pub t_cas: u64,

    /// RAS latency (row access strobe)
    #[serde(default = "MemoryConfig::default_t_ras")]
    pub t_ras: u64,

    /// Precharge latency
    #[serde(default = "MemoryConfig::default_t_pre")]
    pub t_pre: u64,
}

impl MemoryConfig {
    fn default_ram_size() -> u64 {
        defaults::RAM_SIZE
    }

    fn default_latency() -> u64 {
        defaults::MEM_LATENCY
    }

    fn default_t_cas() -> u64 {
        defaults::T_CAS
    }

    fn default_t_ras() -> u64 {
        defaults::T_RAS
    }

    fn default_t_pre() -> u64 {
        defaults::T_PRE
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            ram_size: defaults::RAM_SIZE,
            controller: MemoryController::default(),
            latency: defaults::MEM_LATENCY,
            t_cas: defaults::T_CAS,
            t_ras: defaults::T_RAS,
            t_pre: defaults::T_PRE,
        }
    }
}

/// Read/write pipe configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MemUnitConfig {
    /// Channels per hardware thread: `channels - 1` read pipes and one write pipe.
    #[serde(default = "MemUnitConfig::default_channels")]
    pub channels: usize,

    /// Outstanding requests per channel.
    #[serde(default = "MemUnitConfig::default_capacity")]
    pub channel_capacity: usize,

    /// Group consecutive elements sharing a line into one request.
    #[serde(default)]
    pub coalesce: bool,
}

impl MemUnitConfig {
    fn default_channels() -> usize {
        defaults::CHANNELS
    }

    fn default_capacity() -> usize {
        defaults::CHANNEL_CAPACITY
    }

    /// Number of read pipes.
    pub const fn read_pipes(&self) -> usize {
        self.channels.saturating_sub(1)
    }
}

impl Default for MemUnitConfig {
    fn default() -> Self {
        Self {
            channels: defaults::CHANNELS,
            channel_capacity: defaults::CHANNEL_CAPACITY,
            coalesce: false,
        }
    }
}

/// Latency of one arithmetic operator for each precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct LatencyPair {
    /// Single precision latency in cycles.
    pub single: u64,
    /// Double precision latency in cycles.
    pub double: u64,
}

impl LatencyPair {
    /// Latency for the given datatype.
    pub const fn get(&self, datatype: Datatype) -> u64 {
        match datatype {
            Datatype::Single => self.single,
            Datatype::Double => self.double,
        }
    }

    const fn from_tuple((single, double): (u64, u64)) -> Self {
        Self { single, double }
    }
}

/// Data compute datapath configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatapathConfig {
    /// Add/subtract latency table.
    #[serde(default = "DatapathConfig::default_add")]
    pub add: LatencyPair,

    /// Multiply latency table.
    #[serde(default = "DatapathConfig::default_mul")]
    pub mul: LatencyPair,

    /// Divide latency table.
    #[serde(default = "DatapathConfig::default_div")]
    pub div: LatencyPair,

    /// Double precision elements accepted per cycle; single precision gets twice as many.
    #[serde(default = "DatapathConfig::default_simd_width")]
    pub simd_width: usize,

    /// Convert operands of the other precision instead of faulting.
    #[serde(default = "DatapathConfig::default_mixed_precision")]
    pub mixed_precision: bool,
}

impl DatapathConfig {
    fn default_add() -> LatencyPair {
        LatencyPair::from_tuple(defaults::ADD_LATENCY)
    }

    fn default_mul() -> LatencyPair {
        LatencyPair::from_tuple(defaults::MUL_LATENCY)
    }

    fn default_div() -> LatencyPair {
        LatencyPair::from_tuple(defaults::DIV_LATENCY)
    }

    fn default_simd_width() -> usize {
        defaults::SIMD_WIDTH
    }

    const fn default_mixed_precision() -> bool {
        true
    }
}

impl Default for DatapathConfig {
    fn default() -> Self {
        Self {
            add: LatencyPair::from_tuple(defaults::ADD_LATENCY),
            mul: LatencyPair::from_tuple(defaults::MUL_LATENCY),
            div: LatencyPair::from_tuple(defaults::DIV_LATENCY),
            simd_width: defaults::SIMD_WIDTH,
            mixed_precision: true,
        }
    }
}

/// Per-hardware-thread core configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CoreConfig {
    /// Atomic or timing execution units.
    #[serde(default)]
    pub exec_mode: ExecMode,

    /// Number of vector registers.
    #[serde(default = "CoreConfig::default_registers")]
    pub registers: usize,

    /// Drain policy for in-flight requests.
    #[serde(default)]
    pub drain_policy: DrainPolicy,
}

impl CoreConfig {
    fn default_registers() -> usize {
        defaults::REGISTERS
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            exec_mode: ExecMode::default(),
            registers: defaults::REGISTERS,
            drain_policy: DrainPolicy::default(),
        }
    }
}
