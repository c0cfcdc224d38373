use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use masm::config::{MemoryBackendKind, RuntimeConfig};
use masm::console::{BoxKind, box_message};
use masm::loader::preprocess::expand_includes;
use masm::loader::load_program;
use masm::memory::open_backend;
use masm::package::{ProjectManifest, init_project};
use masm::server;
use masm::vm::{ExitStatus, Program, Vm};

// Wrapper type for clap ValueEnum support
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum BackendArg {
    #[default]
    Array,
    Mapped,
}

impl From<BackendArg> for MemoryBackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Array => MemoryBackendKind::Array,
            BackendArg::Mapped => MemoryBackendKind::Mapped,
        }
    }
}

#[derive(Parser)]
#[command(name = "masm")]
#[command(about = "A Micro-Assembly register machine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new masm project
    Init {
        /// Project name (defaults to directory name)
        name: Option<String>,
    },
    /// Run a Micro-Assembly source file
    Run {
        /// The source file to run (defaults to masm.toml entry if in a project)
        file: Option<PathBuf>,

        /// Memory backend (array, mapped)
        #[arg(long, value_enum)]
        backend: Option<BackendArg>,

        /// Cell-store size in bytes (array backend)
        #[arg(long)]
        memory_size: Option<usize>,

        /// Backing file for the mapped backend
        #[arg(long)]
        memory_file: Option<PathBuf>,

        /// Treat HLT as a no-op instead of terminating
        #[arg(long)]
        no_exit_on_hlt: bool,

        /// Print load/run progress messages
        #[arg(short, long)]
        verbose: bool,

        /// Trace every executed instruction to stderr
        #[arg(long)]
        trace: bool,

        /// Dump the decoded program as JSON to stderr, or to a file
        /// with --dump-program=path
        #[arg(long, value_name = "FILE", num_args = 0..=1)]
        dump_program: Option<Option<PathBuf>>,
    },
    /// Serve the documentation directory over HTTP
    Serve {
        /// Port to listen on
        #[arg(long, default_value_t = server::DEFAULT_PORT)]
        port: u16,

        /// Directory of documentation files
        #[arg(long, default_value = "root")]
        root: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init { name } => {
            let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            if let Err(e) = init_project(&cwd, name.as_deref()) {
                eprintln!("{}", e);
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Commands::Run {
            file,
            backend,
            memory_size,
            memory_file,
            no_exit_on_hlt,
            verbose,
            trace,
            dump_program,
        } => {
            let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            let manifest = ProjectManifest::load(&cwd).ok();

            let mut config = RuntimeConfig::default();
            if let Some(ref manifest) = manifest {
                if let Err(e) = manifest.apply(&mut config) {
                    box_message("Configuration", &e, BoxKind::Error);
                    return ExitCode::FAILURE;
                }
            }
            if let Some(backend) = backend {
                config.backend = backend.into();
            }
            if let Some(size) = memory_size {
                config.memory_size = size;
            }
            if let Some(path) = memory_file {
                config.memory_file = path;
            }
            config.exit_on_hlt = !no_exit_on_hlt;
            config.verbose = verbose;
            config.trace = trace;

            let path = match file {
                Some(p) => p,
                None => match manifest {
                    Some(ref manifest) => cwd.join(&manifest.program.entry),
                    None => {
                        eprintln!("error: no file specified and no masm.toml found");
                        eprintln!("usage: masm run <file> or run from a masm project directory");
                        return ExitCode::FAILURE;
                    }
                },
            };

            let include_root = match manifest {
                Some(ref manifest) => cwd.join(&manifest.program.root),
                None => path.parent().unwrap_or(Path::new(".")).to_path_buf(),
            };

            match run_file(&path, &include_root, &config, &dump_program) {
                Ok(status) => ExitCode::from((status.code() & 0xff) as u8),
                Err(e) => {
                    box_message("Run", &e, BoxKind::Error);
                    ExitCode::FAILURE
                }
            }
        }
        Commands::Serve { port, root } => {
            if let Err(e) = server::prepare_root(&root) {
                eprintln!("error starting server: {}", e);
                return ExitCode::FAILURE;
            }
            let rt = match tokio::runtime::Runtime::new() {
                Ok(rt) => rt,
                Err(e) => {
                    eprintln!("error starting server: {}", e);
                    return ExitCode::FAILURE;
                }
            };
            if let Err(e) = rt.block_on(server::run_server(root, port)) {
                eprintln!("server error: {}", e);
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
    }
}

fn run_file(
    path: &Path,
    include_root: &Path,
    config: &RuntimeConfig,
    dump_program: &Option<Option<PathBuf>>,
) -> Result<ExitStatus, String> {
    if !path.is_file() {
        return Err(format!("file not found: {}", path.display()));
    }
    let source = std::fs::read_to_string(path).map_err(|e| e.to_string())?;

    let expanded = expand_includes(&source, include_root).map_err(|e| e.to_string())?;
    let program = load_program(&expanded).map_err(|e| e.to_string())?;

    if config.verbose {
        eprintln!(
            "[load] {} instructions, {} labels",
            program.instructions.len(),
            program.labels.len()
        );
    }

    if let Some(target) = dump_program {
        dump(&program, target)?;
    }

    let memory = open_backend(config).map_err(|e| e.to_string())?;
    let mut vm = Vm::with_config(memory, config);
    let status = vm.run(&program).map_err(|e| e.to_string())?;

    if config.verbose {
        match status {
            ExitStatus::Halted => eprintln!("[run] halted"),
            ExitStatus::Exited(code) => eprintln!("[run] exited with code {}", code),
        }
    }
    Ok(status)
}

fn dump(program: &Program, target: &Option<PathBuf>) -> Result<(), String> {
    let json = serde_json::to_string_pretty(program).map_err(|e| e.to_string())?;
    match target {
        Some(path) => std::fs::write(path, json).map_err(|e| e.to_string()),
        None => {
            eprintln!("{}", json);
            Ok(())
        }
    }
}
