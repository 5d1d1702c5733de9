use std::process::exit;
use std::rc::Rc;
use std::path::PathBuf;

use log::debug;
use structopt::StructOpt;

use crate::config::{load_core_config, CoreConfig};
use crate::engine::proc::Core;
use crate::instructions::{load_program, LoadError, Program};
use crate::pipeline::{Frontend, PipeQueue};

mod config;
mod dinst;
mod engine;
mod instructions;
mod pipeline;


#[derive(StructOpt, Debug)]
#[structopt(name = "Out-of-Order Core Simulator")]
struct Opt {
    /// Path of the workload trace to run
    #[structopt(short, long, parse(from_os_str))]
    file: PathBuf,

    /// Sets a custom config file
    #[structopt(short, long, parse(from_os_str), default_value = "core.yaml")]
    config: PathBuf,

    /// Maximum number of cycles to simulate
    #[structopt(long, default_value = "1000000")]
    cycles: u64,
}

fn main() {
    env_logger::init();

    let opt = Opt::from_args();

    let config_path = opt.config.to_str().unwrap();
    let config = match load_core_config(config_path) {
        Ok(config) => config,
        Err(error) => {
            println!("Failed to load {}. Cause: {}", config_path, error);
            exit(1);
        }
    };

    let path = opt.file.to_str().unwrap();
    println!("Loading {}", path);
    let program = match load_program(path) {
        Ok(program) => Rc::new(program),
        Err(err) => {
            println!("Loading workload '{}' failed.", path);
            match err {
                LoadError::ParseError(msg) => println!("{}", msg),
                LoadError::NotFoundError(msg) => println!("{}", msg),
            }
            exit(1);
        }
    };

    run(&config, program, opt.cycles);
}

fn run(config: &CoreConfig, program: Rc<Program>, max_cycles: u64) {
    let mut core = match Core::new(config, 0, None) {
        Ok(core) => core,
        Err(error) => {
            println!("Refusing to start: {}", error);
            exit(1);
        }
    };

    let mut frontend = Frontend::new(config, program);
    let mut pipe_q = PipeQueue::new();

    for _ in 0..max_cycles {
        core.new_cycle();
        core.retire();
        core.execute();

        if !pipe_q.is_empty() {
            core.issue(&mut pipe_q);
        } else if !core.replay_q_is_empty() {
            core.issue_from_replay_q();
        }

        frontend.fetch(&mut pipe_q);

        if config.trace.cycle {
            debug!("[Cycle:{}][ROB:{}][Retired:{}][IPC={:.2}]",
                   core.clock(),
                   core.rob_size(),
                   core.stats.total_retired(),
                   core.stats.total_retired() as f64 / core.clock() as f64);
        }

        if frontend.done() && pipe_q.is_empty()
            && core.rob_is_empty() && core.replay_q_is_empty() {
            break;
        }
    }

    core.report();
    println!("Workload complete after {} cycles, {} instructions retired.",
             core.clock(), core.stats.total_retired());
}
