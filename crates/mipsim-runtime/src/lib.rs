pub mod loader;

pub use loader::{LoadError, ProgramFormat, ProgramLoader};

use log::info;
use mipsim_vm::{ExitReason, UartDevice, VirtualMachine, VmConfig, VmError, UART_BASE};
use std::io::{self, Write};
use std::path::Path;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub vm: VmConfig,
    pub uart_base: u32,
    /// Log a performance line every this many cycles; 0 disables.
    pub report_interval: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            vm: VmConfig::default(),
            uart_base: UART_BASE,
            report_interval: 10_000_000,
        }
    }
}

/// A VM wired to the standard device map.
pub struct Runtime {
    vm: VirtualMachine,
    report_interval: u64,
}

impl Runtime {
    /// Console output goes to stdout.
    pub fn new(config: RuntimeConfig) -> Result<Self, VmError> {
        Self::with_console(config, Box::new(io::stdout()))
    }

    pub fn with_console(
        config: RuntimeConfig,
        console: Box<dyn Write + Send>,
    ) -> Result<Self, VmError> {
        let mut vm = VirtualMachine::new(config.vm)?;
        vm.attach_device(Box::new(UartDevice::with_output(config.uart_base, console)))?;

        Ok(Self {
            vm,
            report_interval: config.report_interval,
        })
    }

    pub fn load_program(
        &mut self,
        path: &Path,
        format: ProgramFormat,
        base: u32,
    ) -> Result<u32, LoadError> {
        ProgramLoader::load_file(&mut self.vm, path, format, base)
    }

    /// Run until the VM exits or `max_cycles` have elapsed, logging
    /// throughput at every report interval.
    pub fn run(&mut self, max_cycles: Option<u64>) -> Result<ExitReason, VmError> {
        let started = Instant::now();
        let first_cycle = self.vm.cycle_count();

        let reason = loop {
            let elapsed = self.vm.cycle_count() - first_cycle;
            let remaining = max_cycles.map(|max| max.saturating_sub(elapsed));
            let chunk = match (self.report_interval, remaining) {
                (0, remaining) => remaining,
                (interval, Some(remaining)) => Some(interval.min(remaining)),
                (interval, None) => Some(interval),
            };

            let reason = self.vm.run(chunk)?;
            if reason != ExitReason::CycleLimit || chunk == remaining {
                break reason;
            }
            self.report(first_cycle, started);
        };

        self.report(first_cycle, started);
        Ok(reason)
    }

    fn report(&self, first_cycle: u64, started: Instant) {
        let cycles = self.vm.cycle_count() - first_cycle;
        let secs = started.elapsed().as_secs_f64();
        let rate = if secs > 0.0 { cycles as f64 / secs } else { 0.0 };
        info!("{} cycles in {:.3}s ({:.0} cycles/s)", cycles, secs, rate);
    }

    pub fn vm(&self) -> &VirtualMachine {
        &self.vm
    }

    pub fn vm_mut(&mut self) -> &mut VirtualMachine {
        &mut self.vm
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Console(Arc<Mutex<Vec<u8>>>);

    impl Write for Console {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn runtime(report_interval: u64) -> (Runtime, Console) {
        let _ = env_logger::builder().is_test(true).try_init();
        let console = Console::default();
        let config = RuntimeConfig {
            report_interval,
            ..RuntimeConfig::default()
        };
        let runtime = Runtime::with_console(config, Box::new(console.clone())).unwrap();
        (runtime, console)
    }

    #[test]
    fn run_stops_at_cycle_limit_across_report_chunks() {
        let (mut rt, _) = runtime(7);
        rt.vm_mut().set_pc(0x0040_0000);
        assert_eq!(rt.run(Some(20)).unwrap(), ExitReason::CycleLimit);
        assert_eq!(rt.vm().cycle_count(), 20);
    }

    #[test]
    fn hello_through_the_console() {
        let (mut rt, console) = runtime(0);
        rt.vm_mut().config.stop_on_break = true;
        let mut program = vec![
            0x3C08_B400, // lui  $t0, 0xb400
            0x3508_03F8, // ori  $t0, $t0, 0x03f8
        ];
        for byte in b"hi\n" {
            program.push(0x2009_0000 | u32::from(*byte)); // addi $t1, $zero, byte
            program.push(0xA109_0000); // sb   $t1, 0($t0)
        }
        program.push(0x0000_000D); // break

        let image: Vec<u8> = program.iter().flat_map(|w| w.to_be_bytes()).collect();
        ProgramLoader::load_binary(rt.vm_mut(), &image, 0x0040_0000);
        rt.vm_mut().set_pc(0x0040_0000);

        assert_eq!(rt.run(Some(1000)).unwrap(), ExitReason::Breakpoint);
        assert_eq!(console.0.lock().unwrap().as_slice(), b"hi\n");
    }
}
