use clap::{Parser, Subcommand};
use dotenv::dotenv;
use stepflow_rs::stepflow::config::AppConfig;
use stepflow_rs::stepflow::nodes;
use stepflow_rs::stepflow::server;
use stepflow_rs::stepflow::workflow::graph::WorkflowEngine;
use stepflow_rs::stepflow::workflow::loader::GraphLoader;
use stepflow_rs::stepflow::workflow::state::WorkflowState;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a graph from a file and print the result
    Run {
        /// Path to the graph file (.yaml, .yml or .json)
        #[arg(short, long)]
        file: String,

        /// Initial state as a JSON object
        #[arg(short, long, default_value = "{}")]
        state: String,

        /// Step ceiling for this run
        #[arg(long)]
        max_steps: Option<usize>,
    },
    /// Serve the HTTP API
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    let mut config = AppConfig::from_env()?;

    match args.command {
        Commands::Run {
            file,
            state,
            max_steps,
        } => {
            if let Some(max_steps) = max_steps {
                config = config.with_max_steps(max_steps)?;
            }

            let graph = GraphLoader::new().load(&file)?;
            let initial = WorkflowState::from_json(serde_json::from_str(&state)?)?;
            let engine = WorkflowEngine::from_config(nodes::default_registry(), &config);

            log::info!("Running graph {} from '{}'", file, graph.start_node);
            let (final_state, log) = engine.execute(&graph, &initial)?;

            for entry in &log {
                println!(
                    "{:>4}  {:<24} {:>9.6}s  -> {:?}",
                    entry.step, entry.node_name, entry.duration, entry.decision
                );
            }
            println!("{}", serde_json::to_string_pretty(&final_state)?);
        }
        Commands::Serve { port } => {
            if let Some(port) = port {
                config = config.with_port(port);
            }
            server::serve(&config, nodes::default_registry()).await?;
        }
    }

    Ok(())
}
