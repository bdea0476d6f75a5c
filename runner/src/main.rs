use std::{fs, io};
use std::error::Error;
use std::path::PathBuf;

use clap::Parser;
use prvm::vm::{self, Config, EdictStore, StateFields, WorldWrites, MAX_PARMS};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod builtins;

/// Run a function from a compiled QuakeC program.
#[derive(Parser, Debug)]
#[command(name = "prvm-run", version)]
struct Cli {
    /// Path to a progs.dat file
    progs: PathBuf,

    /// The function to run
    #[arg(short, long, default_value = "main")]
    function: String,

    /// Float arguments, passed in the parameter globals
    #[arg(short, long = "arg", allow_negative_numbers = true)]
    args: Vec<f32>,

    /// Line number file; defaults to the progs path with an `.lno` extension, if it exists
    #[arg(long)]
    lines: Option<PathBuf>,

    /// TOML file of interpreter settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    runaway_limit: Option<u64>,

    #[arg(long)]
    max_depth: Option<usize>,

    /// Policy for pointer stores into the world entity: allow, warn or forbid
    #[arg(long, value_parser = world_writes)]
    world_writes: Option<WorldWrites>,

    /// Warn about division by zero and similar mistakes
    #[arg(long)]
    developer: bool,

    /// Log every executed statement at trace level
    #[arg(long)]
    trace: bool,

    /// Record and report statement coverage
    #[arg(long)]
    coverage: bool,

    /// Entities to spawn before running
    #[arg(long, default_value = "0")]
    entities: usize,

    /// How many functions to list in the profile report
    #[arg(long, default_value = "10")]
    top: usize,

    /// Print every statement and exit
    #[arg(long)]
    disassemble: bool,
}

fn world_writes(value: &str) -> Result<WorldWrites, String> {
    match value {
        "allow" => Ok(WorldWrites::Allow),
        "warn" => Ok(WorldWrites::Warn),
        "forbid" => Ok(WorldWrites::Forbid),
        _ => Err(format!("expected allow, warn or forbid, found {}", value)),
    }
}

impl Cli {
    fn config(&self) -> Result<Config, Box<dyn Error>> {
        let mut config = match self.config {
            Some(ref path) => toml::from_str(&fs::read_to_string(path)?)?,
            None => Config::default(),
        };
        if let Some(limit) = self.runaway_limit {
            config.runaway_limit = limit;
        }
        if let Some(depth) = self.max_depth {
            config.max_depth = depth;
        }
        if let Some(policy) = self.world_writes {
            config.world_writes = policy;
        }
        config.developer |= self.developer;
        config.trace |= self.trace;
        if self.coverage {
            config.coverage = vm::Coverage { functions: true, statements: true };
        }
        Ok(config)
    }

    fn lines(&self) -> io::Result<Option<Vec<u8>>> {
        match self.lines {
            Some(ref path) => fs::read(path).map(Some),
            None => match fs::read(self.progs.with_extension("lno")) {
                Ok(lines) => Ok(Some(lines)),
                Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
                Err(error) => Err(error),
            },
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let mut config = cli.config()?;

    let name = cli.progs.file_name().unwrap_or_default().to_string_lossy().into_owned();
    let data = fs::read(&cli.progs)?;
    let lines = cli.lines()?;
    let mut program = prvm::load(&name, &data, lines.as_deref())?;
    info!(
        program = %name, crc = program.crc,
        statements = program.statements().len(), functions = program.functions().len(),
        globals = program.globals().len(), fields = program.entity_fields,
        strings = program.strings.table_len(),
        "loaded"
    );

    if cli.disassemble {
        for statement in 0..program.statements().len() {
            println!("{}", program.disassemble(statement));
        }
        return Ok(());
    }

    let function = program.find_function(&cli.function)
        .ok_or_else(|| format!("no function named {}", cli.function))?;
    if cli.args.len() > MAX_PARMS {
        Err(format!("at most {} arguments can be passed", MAX_PARMS))?;
    }
    for (parm, &value) in cli.args.iter().enumerate() {
        program.set_parm(parm, value);
    }

    if config.state.is_none() {
        config.state = StateFields::from_program(&program);
    }

    let mut world = EdictStore::new(program.entity_fields);
    for _ in 0..cli.entities {
        world.spawn();
    }

    let builtins = builtins::quake();
    let mut thread = vm::Thread::new(config);
    let result = thread.execute_program(&mut program, &mut world, &builtins, function);

    let profile = thread.profile();
    println!("{:>12} {:>8} {:>8}  function", "statements", "calls", "builtins");
    for (id, function) in profile.top(cli.top) {
        println!(
            "{:>12} {:>8} {:>8}  {}",
            function.statements, function.calls, function.builtin_calls, program.function_name(id)
        );
    }
    if cli.coverage {
        let (functions, statements) = profile.coverage();
        println!(
            "coverage: {}/{} functions, {}/{} statements",
            functions, program.functions().len(), statements, program.statements().len()
        );
    }

    match result {
        Ok(()) => {
            let value = program.return_value();
            info!(float = value.as_float(), vector = ?program.return_vector(), "returned");
            Ok(())
        }
        Err(error) => {
            for frame in &error.backtrace {
                warn!("  in {}", frame);
            }
            Err(error.into())
        }
    }
}
