use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{info, LevelFilter};
use mipsim_runtime::{ProgramFormat, Runtime, RuntimeConfig};
use mipsim_vm::{Cop0Reg, ExitReason, LogTracer, Register, StepResult, VirtualMachine, VmConfig};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program until BREAK or a cycle limit
    Run {
        #[command(flatten)]
        program: ProgramArgs,

        /// Stop after this many cycles
        #[arg(long)]
        max_cycles: Option<u64>,

        /// Log every fetch and architectural write
        #[arg(long)]
        trace: bool,

        /// Exit on BREAK instead of taking the breakpoint exception
        #[arg(long)]
        stop_on_break: bool,

        /// Cycles between performance reports (0 disables)
        #[arg(long, default_value_t = 10_000_000)]
        report_interval: u64,
    },
    /// Execute a fixed number of cycles and dump the register state
    Step {
        #[command(flatten)]
        program: ProgramArgs,

        /// Cycles to execute
        #[arg(short = 'n', long, default_value_t = 1)]
        cycles: u64,
    },
}

#[derive(Args)]
struct ProgramArgs {
    /// Program image
    file: PathBuf,

    #[arg(long, value_enum, default_value_t = Format::Elf)]
    format: Format,

    /// Load address for raw binaries
    #[arg(long, value_parser = parse_address, default_value = "0xbfc00000")]
    base: u32,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Bin,
    Elf,
}

impl From<Format> for ProgramFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Bin => ProgramFormat::Binary,
            Format::Elf => ProgramFormat::Elf,
        }
    }
}

fn parse_address(s: &str) -> Result<u32, std::num::ParseIntError> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(&hex.replace('_', ""), 16),
        None => s.parse(),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let trace = matches!(cli.command, Commands::Run { trace: true, .. });
    let mut logger = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if trace {
        logger.filter_module("mipsim::trace", LevelFilter::Trace);
    }
    logger.init();

    match cli.command {
        Commands::Run {
            program,
            max_cycles,
            trace,
            stop_on_break,
            report_interval,
        } => {
            let config = RuntimeConfig {
                vm: VmConfig {
                    stop_on_break,
                    ..VmConfig::default()
                },
                report_interval,
                ..RuntimeConfig::default()
            };
            let mut runtime = load(config, &program)?;
            if trace {
                runtime.vm_mut().set_tracer(Box::new(LogTracer));
            }

            let reason = runtime.run(max_cycles).context("emulation failed")?;
            match reason {
                ExitReason::Breakpoint => info!("stopped at BREAK, pc {:#010x}", runtime.vm().pc()),
                ExitReason::CycleLimit => info!("cycle limit reached"),
            }
        }
        Commands::Step { program, cycles } => {
            let config = RuntimeConfig {
                report_interval: 0,
                ..RuntimeConfig::default()
            };
            let mut runtime = load(config, &program)?;
            let vm = runtime.vm_mut();
            for _ in 0..cycles {
                match vm.step().context("emulation failed")? {
                    StepResult::Executed(instruction) => println!("{}", instruction),
                    StepResult::Serviced(outcome) => println!("{:?}", outcome),
                    StepResult::Exit(_) => break,
                }
            }
            dump(vm);
        }
    }

    Ok(())
}

fn load(config: RuntimeConfig, program: &ProgramArgs) -> Result<Runtime> {
    let mut runtime = Runtime::new(config).context("failed to build the machine")?;
    runtime
        .load_program(&program.file, program.format.into(), program.base)
        .with_context(|| format!("failed to load {}", program.file.display()))?;
    Ok(runtime)
}

fn dump(vm: &VirtualMachine) {
    let regs = vm.cpu().regs();
    for row in 0..8 {
        let line: Vec<String> = (0..4)
            .map(|col| {
                let num = row + 8 * col;
                let name = Register::from_field(num as u32).abi_name();
                format!("{:>4} {:08x}", name, regs[num])
            })
            .collect();
        println!("{}", line.join("  "));
    }
    println!("  hi {:08x}    lo {:08x}    pc {:08x}", vm.hi(), vm.lo(), vm.pc());

    let cop0 = vm.cop0();
    for reg in [
        Cop0Reg::STATUS,
        Cop0Reg::CAUSE,
        Cop0Reg::EPC,
        Cop0Reg::BAD_VADDR,
        Cop0Reg::COUNT,
        Cop0Reg::COMPARE,
    ] {
        println!("{:>10} {:08x}", reg.to_string(), cop0.read(reg));
    }
}
