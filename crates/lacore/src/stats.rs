//! Simulation statistics collection and reporting.
//!
//! This module tracks event counters of one LA-core. It provides:
//! 1. **Instructions:** Retired counts per instruction class and faults.
//! 2. **Scratchpad:** Accesses and bank-conflict stall cycles.
//! 3. **Memory:** Requests, bytes moved, refused requests and discarded requests.
//! 4. **Datapath:** Elements computed and transferred.

use std::time::Instant;

use serde::Serialize;

use crate::common::Fault;
use crate::core::arch::InstKind;
use crate::core::exec::Output;
use crate::soc::CacheTlbCounters;

/// Event counters of one LA-core.
#[derive(Clone, Debug, Serialize)]
pub struct LaStats {
    #[serde(skip)]
    start_time: Instant,
    /// Cycles ticked.
    pub cycles: u64,
    /// CONFIG instructions retired.
    pub inst_config: u64,
    /// DATA_OP instructions retired.
    pub inst_data: u64,
    /// XFER_OP instructions retired.
    pub inst_xfer: u64,
    /// Instructions that retired with a fault.
    pub faults: u64,

    /// Scratchpad read requests.
    pub spad_reads: u64,
    /// Scratchpad write requests.
    pub spad_writes: u64,
    /// Cycles requests waited for a busy bank.
    pub bank_stall_cycles: u64,

    /// Main memory read requests.
    pub mem_reads: u64,
    /// Main memory write requests.
    pub mem_writes: u64,
    /// Bytes read from either storage.
    pub bytes_read: u64,
    /// Bytes written to either storage.
    pub bytes_written: u64,
    /// Timing requests refused by the Cache+TLB and issued again later.
    pub retries: u64,
    /// Outstanding requests dropped by a discarding drain.
    pub requests_discarded: u64,

    /// Elements through the arithmetic datapath.
    pub elements_computed: u64,
    /// Elements moved by the Transfer Unit.
    pub elements_transferred: u64,
}

impl Default for LaStats {
    fn default() -> Self {
        Self {
            start_time: Instant::now(),
            cycles: 0,
            inst_config: 0,
            inst_data: 0,
            inst_xfer: 0,
            faults: 0,
            spad_reads: 0,
            spad_writes: 0,
            bank_stall_cycles: 0,
            mem_reads: 0,
            mem_writes: 0,
            bytes_read: 0,
            bytes_written: 0,
            retries: 0,
            requests_discarded: 0,
            elements_computed: 0,
            elements_transferred: 0,
        }
    }
}

impl LaStats {
    /// Counts one retired instruction.
    pub const fn record_outcome(&mut self, kind: InstKind, result: &Result<Output, Fault>) {
        match kind {
            InstKind::Config => self.inst_config += 1,
            InstKind::DataOp => self.inst_data += 1,
            InstKind::XferOp => self.inst_xfer += 1,
        }
        if result.is_err() {
            self.faults += 1;
        }
    }

    /// Instructions retired across all classes.
    pub const fn instructions_retired(&self) -> u64 {
        self.inst_config + self.inst_data + self.inst_xfer
    }
}

/// Section names for selective stats output.
///
/// Valid section identifiers: `"summary"`, `"instruction_mix"`, `"scratchpad"`, `"memory"`.
/// Pass an empty slice to `print_sections` to print all sections.
pub const STATS_SECTIONS: &[&str] = &["summary", "instruction_mix", "scratchpad", "memory"];

impl LaStats {
    /// Prints only the requested statistics sections to stdout.
    ///
    /// # Arguments
    ///
    /// * `sections` - Slice of section names to print, or empty for all.
    /// * `cache` - Counters of the Cache+TLB collaborator.
    pub fn print_sections(&self, sections: &[String], cache: CacheTlbCounters) {
        let want = |s: &str| sections.is_empty() || sections.iter().any(|x| x == s);
        let seconds = self.start_time.elapsed().as_secs_f64();
        let cyc = self.cycles.max(1);
        let retired = self.instructions_retired();
        let instr = retired.max(1);

        if want("summary") {
            let khz = (self.cycles as f64 / seconds) / 1000.0;
            println!("\n==========================================================");
            println!("LA-CORE SIMULATION STATISTICS");
            println!("==========================================================");
            println!("host_seconds             {seconds:.4} s");
            println!("sim_cycles               {}", self.cycles);
            println!("sim_freq                 {khz:.2} kHz");
            println!("sim_insts                {retired}");
            println!("sim_cpi                  {:.4}", cyc as f64 / instr as f64);
            println!("sim_faults               {}", self.faults);
            println!("----------------------------------------------------------");
        }
        if want("instruction_mix") {
            let total = instr as f64;
            println!("INSTRUCTION MIX");
            println!(
                "  op.config              {} ({:.2}%)",
                self.inst_config,
                (self.inst_config as f64 / total) * 100.0
            );
            println!(
                "  op.data                {} ({:.2}%)",
                self.inst_data,
                (self.inst_data as f64 / total) * 100.0
            );
            println!(
                "  op.xfer                {} ({:.2}%)",
                self.inst_xfer,
                (self.inst_xfer as f64 / total) * 100.0
            );
            println!("  elements.computed      {}", self.elements_computed);
            println!("  elements.transferred   {}", self.elements_transferred);
            println!("----------------------------------------------------------");
        }
        if want("scratchpad") {
            println!("SCRATCHPAD");
            println!("  spad.reads             {}", self.spad_reads);
            println!("  spad.writes            {}", self.spad_writes);
            println!(
                "  spad.bank_stalls       {} ({:.2}%)",
                self.bank_stall_cycles,
                (self.bank_stall_cycles as f64 / cyc as f64) * 100.0
            );
            println!("----------------------------------------------------------");
        }
        if want("memory") {
            let total = cache.hits + cache.misses;
            let miss_rate = if total > 0 {
                (cache.misses as f64 / total as f64) * 100.0
            } else {
                0.0
            };
            let tlb_total = cache.tlb_hits + cache.tlb_misses;
            println!("MEMORY");
            println!("  mem.reads              {}", self.mem_reads);
            println!("  mem.writes             {}", self.mem_writes);
            println!("  mem.bytes_read         {}", self.bytes_read);
            println!("  mem.bytes_written      {}", self.bytes_written);
            println!("  mem.retries            {}", self.retries);
            println!("  mem.discarded          {}", self.requests_discarded);
            println!(
                "  L1     accesses: {total:<10} | hits: {:<10} | miss_rate: {miss_rate:.2}%",
                cache.hits
            );
            println!("  L1     writebacks: {}", cache.writebacks);
            println!(
                "  TLB    accesses: {tlb_total:<10} | hits: {:<10} | misses: {}",
                cache.tlb_hits, cache.tlb_misses
            );
        }
        println!("==========================================================");
    }

    /// Prints all statistics sections to stdout.
    ///
    /// Equivalent to `print_sections(&[], cache)`.
    pub fn print(&self, cache: CacheTlbCounters) {
        self.print_sections(&[], cache);
    }
}
